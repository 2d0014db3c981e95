pub mod inventory;
pub mod parties;
pub mod purchases;
pub mod sales;
