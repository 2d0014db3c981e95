use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

// Todos os erros do núcleo de estoque/preços.
// Cada variante carrega os identificadores e valores que o cliente precisa para agir.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("A apresentação '{presentation}' não está habilitada para o produto {product}")]
    InvalidPresentation { presentation: String, product: String },

    #[error("A apresentação '{presentation}' do produto {product} tem fator de conversão inválido ({factor})")]
    InvalidConversionFactor {
        presentation: String,
        product: String,
        factor: Decimal,
    },

    #[error("O produto {product} só aceita unidades inteiras (total resolvido: {total})")]
    FractionalUnitViolation { product: String, total: Decimal },

    #[error("Movimentação sem quantidade positiva para o produto {product} (total: {total})")]
    EmptyOrNonPositiveMovement { product: String, total: Decimal },

    #[error("O documento não possui itens")]
    EmptyDocument,

    #[error("Quantidade inválida ({quantity}) para o produto {product}")]
    InvalidQuantity { product: String, quantity: Decimal },

    #[error("Estoque insuficiente para o produto {product}: disponível {available}, solicitado {requested}")]
    InsufficientStock {
        product: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Não é possível {action} o documento {document} #{id} no estado '{state}'")]
    InvalidDocumentState {
        document: &'static str,
        id: i64,
        state: String,
        action: &'static str,
    },

    #[error("{entity} #{id} não encontrado ou inativo")]
    EntityNotFound { entity: &'static str, id: i64 },

    #[error("A emissão de fatura exige um cliente")]
    InvoiceRequiresCustomer,

    #[error("Tipo de movimentação desconhecido: '{0}'")]
    UnknownMovementType(String),

    #[error("O produto {product} não tem preço unitário informado nem preço de compra cadastrado")]
    MissingUnitPrice { product: String },

    #[error("Valor fora do limite permitido em {context} ({value})")]
    AmountOutOfRange { context: String, value: Decimal },

    #[error("Preço unitário negativo ({price}) para o produto {product}")]
    NegativeUnitPrice { product: String, price: Decimal },

    #[error("A apresentação '{presentation}' já existe para o produto {product}")]
    DuplicatePresentation { presentation: String, product: String },

    #[error("Usuário responsável não identificado")]
    MissingActor,

    // Qualquer falha do banco vira PersistenceFailure via `?`.
    #[error("Erro de banco de dados: {0}")]
    PersistenceFailure(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Código estável usado pelo cliente para identificar o tipo de erro.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidPresentation { .. } => "INVALID_PRESENTATION",
            AppError::InvalidConversionFactor { .. } => "INVALID_CONVERSION_FACTOR",
            AppError::FractionalUnitViolation { .. } => "FRACTIONAL_UNIT_VIOLATION",
            AppError::EmptyOrNonPositiveMovement { .. } => "EMPTY_OR_NON_POSITIVE_MOVEMENT",
            AppError::EmptyDocument => "EMPTY_DOCUMENT",
            AppError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::InvalidDocumentState { .. } => "INVALID_DOCUMENT_STATE",
            AppError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            AppError::InvoiceRequiresCustomer => "INVOICE_REQUIRES_CUSTOMER",
            AppError::UnknownMovementType(_) => "UNKNOWN_MOVEMENT_TYPE",
            AppError::MissingUnitPrice { .. } => "MISSING_UNIT_PRICE",
            AppError::NegativeUnitPrice { .. } => "NEGATIVE_UNIT_PRICE",
            AppError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            AppError::DuplicatePresentation { .. } => "DUPLICATE_PRESENTATION",
            AppError::MissingActor => "MISSING_ACTOR",
            AppError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::EmptyDocument
            | AppError::InvalidQuantity { .. }
            | AppError::UnknownMovementType(_)
            | AppError::MissingUnitPrice { .. }
            | AppError::NegativeUnitPrice { .. }
            | AppError::AmountOutOfRange { .. }
            | AppError::InvoiceRequiresCustomer => StatusCode::BAD_REQUEST,
            AppError::MissingActor => StatusCode::UNAUTHORIZED,
            AppError::EntityNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::DuplicatePresentation { .. } | AppError::InvalidDocumentState { .. } => {
                StatusCode::CONFLICT
            }
            AppError::InvalidPresentation { .. }
            | AppError::InvalidConversionFactor { .. }
            | AppError::FractionalUnitViolation { .. }
            | AppError::EmptyOrNonPositiveMovement { .. }
            | AppError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PersistenceFailure(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(ref errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                json!({
                    "error": code,
                    "message": "Um ou mais campos são inválidos.",
                    "details": details,
                })
            }

            // Erros de infraestrutura não vazam detalhes para o cliente.
            ref e @ (AppError::PersistenceFailure(_) | AppError::InternalServerError(_)) => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                json!({ "error": code, "message": "Ocorreu um erro inesperado." })
            }

            ref e => json!({ "error": code, "message": e.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
