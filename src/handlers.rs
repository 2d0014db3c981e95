pub mod inventory;
pub mod purchases;
pub mod sales;
