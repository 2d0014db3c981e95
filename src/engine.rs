// src/engine.rs
//
// Regras puras de estoque e preço: nada aqui acessa o banco.

pub mod conversion;
pub mod documents;
pub mod ledger;
pub mod pricing;
