pub mod inventory_service;
pub mod jobs;
pub mod pricing_service;
pub mod purchase_service;
pub mod sale_service;
