pub mod catalog;
pub mod purchase;
