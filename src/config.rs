// src/config.rs

use std::{env, sync::Arc, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    db::{PgStore, PurchaseStore},
    services::{
        bulk_service::BulkCoordinator, catalog_service::CatalogService,
        purchase_service::PurchaseService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub purchase_service: PurchaseService,
    pub catalog_service: CatalogService,
    pub bulk_coordinator: BulkCoordinator,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let store: Arc<dyn PurchaseStore> = Arc::new(PgStore::new(db_pool.clone()));
        let purchase_service = PurchaseService::new(store.clone());
        let catalog_service = CatalogService::new(store);
        let bulk_coordinator = BulkCoordinator::new(purchase_service.clone());

        Ok(Self {
            db_pool,
            purchase_service,
            catalog_service,
            bulk_coordinator,
        })
    }
}
