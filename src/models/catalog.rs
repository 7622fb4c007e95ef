// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Produto (Catálogo) ---
// O produto é a entidade externa que o motor de lançamentos mutaciona:
// estoque físico, custo médio ponderado e preço de venda.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(example = "CAFE-500G")]
    pub sku: String,
    #[schema(example = "Café Torrado 500g")]
    pub name: String,

    pub stock: i64, // Quantidade FÍSICA total (nunca negativa)

    pub cost: Decimal,  // Custo Médio Unitário (média ponderada)
    pub price: Decimal, // Preço de Venda

    // Política de markup: quando presente, o preço é recalculado a partir
    // do custo a cada lançamento (preço = custo * (1 + markup/100)).
    pub markup_percent: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub cost: Decimal,
    pub price: Decimal,
    pub markup_percent: Option<Decimal>,
}
