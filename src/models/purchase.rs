// src/models/purchase.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Status do Pedido de Compra ---
// Máquina de estados fechada. FINALIZED e STOCK_REVERSED são equivalentes
// a DRAFT para fins de lançamento (relançáveis); apenas STOCK_POSTED
// bloqueia um novo lançamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "purchase_order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Finalized,
    StockPosted,
    StockReversed,
}

impl PurchaseOrderStatus {
    // Estados a partir dos quais o lançamento de estoque é legal.
    pub const POSTABLE: [PurchaseOrderStatus; 3] = [
        PurchaseOrderStatus::Draft,
        PurchaseOrderStatus::Finalized,
        PurchaseOrderStatus::StockReversed,
    ];

    pub fn can_post(self) -> bool {
        Self::POSTABLE.contains(&self)
    }

    pub fn can_reverse(self) -> bool {
        self == PurchaseOrderStatus::StockPosted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Finalized => "FINALIZED",
            PurchaseOrderStatus::StockPosted => "STOCK_POSTED",
            PurchaseOrderStatus::StockReversed => "STOCK_REVERSED",
        }
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Pedido de Compra (cabeçalho) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: Uuid,
    #[schema(example = "PC-000123")]
    pub number: String,
    // Fornecedor avulso permitido (sem cadastro)
    pub supplier_id: Option<Uuid>,
    pub status: PurchaseOrderStatus,
    #[schema(example = "1500.00")]
    pub total_value: Decimal,
    pub created_at: DateTime<Utc>,
}

// --- Item do Pedido de Compra ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub product_id: Uuid,
    pub position: i32, // ordem do item dentro do pedido
    #[schema(example = 10)]
    pub quantity: i64,
    #[schema(example = "5.00")]
    pub unit_cost: Decimal,
    #[schema(example = "50.00")]
    pub line_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub header: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

// --- Entrada para criação de pedido ---
#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub number: String,
    pub supplier_id: Option<Uuid>,
    pub items: Vec<NewPurchaseOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewPurchaseOrderItem {
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_cost: Decimal,
}

// --- Movimentação de Estoque (livro-razão) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stock_movement_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Posting,
    Reversal,
}

// Registro imutável de um efeito do pedido sobre um produto. O razão é a
// única fonte de verdade sobre "o que exatamente aconteceu": os snapshots
// de estoque/custo/preço antes e depois são o que torna o estorno exato
// mesmo com lançamentos de outros pedidos no meio do caminho.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    // Posição cronológica total por produto (timestamps podem empatar)
    pub seq: i64,
    pub purchase_order_id: Uuid,
    pub product_id: Uuid,
    pub kind: MovementKind,
    // Marcada quando uma entrada de estorno compensou esta movimentação
    pub reversed: bool,
    pub quantity_applied: i64,
    pub unit_cost_applied: Decimal,
    pub product_stock_before: i64,
    pub product_stock_after: i64,
    pub product_cost_before: Decimal,
    pub product_cost_after: Decimal,
    pub product_price_before: Decimal,
    pub product_price_after: Decimal,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStockMovement {
    pub purchase_order_id: Uuid,
    pub product_id: Uuid,
    pub kind: MovementKind,
    pub quantity_applied: i64,
    pub unit_cost_applied: Decimal,
    pub product_stock_before: i64,
    pub product_stock_after: i64,
    pub product_cost_before: Decimal,
    pub product_cost_after: Decimal,
    pub product_price_before: Decimal,
    pub product_price_after: Decimal,
}

// --- Relatórios para o chamador ---

// Linha do resumo devolvido ao chamador após lançar/estornar: canal de
// exibição, não uma fonte de verdade separada.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedProduct {
    pub product_id: Uuid,
    pub name: String,
    pub new_stock: i64,
    pub updated_cost: bool,
    pub cost: Decimal,
    pub updated_price: bool,
    pub price: Decimal,
}

// União por produto: a entrada mais recente vence nos valores, as flags
// de alteração acumulam.
pub fn merge_updated_product(summary: &mut Vec<UpdatedProduct>, entry: UpdatedProduct) {
    match summary.iter_mut().find(|u| u.product_id == entry.product_id) {
        Some(existing) => {
            existing.new_stock = entry.new_stock;
            existing.updated_cost = existing.updated_cost || entry.updated_cost;
            existing.cost = entry.cost;
            existing.updated_price = existing.updated_price || entry.updated_price;
            existing.price = entry.price;
        }
        None => summary.push(entry),
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostingSummary {
    pub updated_products: Vec<UpdatedProduct>,
}

// --- Operações em lote ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkOperation {
    Post,
    Reverse,
    Delete,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub order_id: Uuid,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
    pub updated_products: Vec<UpdatedProduct>,
}
