// src/services/catalog_service.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::store::PurchaseStore,
    models::catalog::{NewProduct, Product},
};

// Superfície mínima do catálogo: o suficiente para provisionar os
// produtos que o motor de lançamentos mutaciona.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn PurchaseStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn PurchaseStore>) -> Self {
        Self { store }
    }

    pub async fn create_product(&self, new: NewProduct) -> Result<Product, AppError> {
        let mut tx = self.store.begin().await?;
        let product = tx.insert_product(&new).await?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let mut tx = self.store.begin().await?;
        let products = tx.list_products().await?;
        tx.commit().await?;
        Ok(products)
    }
}
