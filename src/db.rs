pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod purchase_repo;
pub use purchase_repo::PurchaseRepository;
pub mod sale_repo;
pub use sale_repo::SaleRepository;
pub mod party_repo;
pub use party_repo::PartyRepository;
