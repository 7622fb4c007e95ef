pub mod bulk_service;
pub mod catalog_service;
pub mod posting_service;
pub mod purchase_service;
pub mod reversal_service;
