pub mod common;
pub mod config;
pub mod db;
pub mod engine;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
