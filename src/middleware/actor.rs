// src/middleware/actor.rs

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::common::error::AppError;

// Cabeçalho com o id do usuário que executa a operação
pub const USER_ID_HEADER: &str = "x-user-id";

/// Usuário responsável pela operação (gravado em compras, vendas e movimentações).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub i64);

impl ActingUser {
    pub fn from_parts(parts: &Parts) -> Result<Self, AppError> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(ActingUser)
            .ok_or(AppError::MissingActor)
    }
}

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts)
    }
}
