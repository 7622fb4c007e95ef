// src/services/posting_service.rs

use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    db::store::StoreTx,
    models::purchase::{
        MovementKind, NewStockMovement, PurchaseOrder, PurchaseOrderItem, UpdatedProduct,
        merge_updated_product,
    },
};

// Escala do NUMERIC(14,4) das tabelas; mantém o store em memória e o
// Postgres com os mesmos valores.
const MONEY_SCALE: u32 = 4;

/// Custo médio ponderado após uma entrada. Estoque zerado (ou negativo,
/// que não deveria ocorrer) assume o custo da entrada.
pub fn weighted_average_cost(
    current_stock: i64,
    current_cost: Decimal,
    incoming_qty: i64,
    incoming_cost: Decimal,
) -> Decimal {
    let new_stock = current_stock + incoming_qty;
    if new_stock <= 0 {
        return Decimal::ZERO;
    }
    if current_stock <= 0 {
        return incoming_cost;
    }
    let blended = (Decimal::from(current_stock) * current_cost
        + Decimal::from(incoming_qty) * incoming_cost)
        / Decimal::from(new_stock);
    blended.round_dp(MONEY_SCALE)
}

/// Preço derivado do custo pela política de markup (percentual).
pub fn price_from_markup(cost: Decimal, markup_percent: Decimal) -> Decimal {
    (cost * (Decimal::ONE + markup_percent / Decimal::from(100))).round_dp(MONEY_SCALE)
}

// ---
// Motor de Lançamento: aplica o movimento direto de um pedido sobre o
// catálogo (entrada de estoque, recálculo do custo médio, preço via
// markup quando habilitado) e grava o razão. Roda sempre dentro da
// transação aberta pelo controlador de ciclo de vida.
// ---
#[derive(Clone, Default)]
pub struct PostingEngine;

impl PostingEngine {
    pub fn new() -> Self {
        Self
    }

    pub async fn post_order(
        &self,
        tx: &mut dyn StoreTx,
        order: &PurchaseOrder,
        items: &[PurchaseOrderItem],
    ) -> Result<Vec<UpdatedProduct>, AppError> {
        let mut summary: Vec<UpdatedProduct> = Vec::new();

        for item in items {
            // 1. Lê o estado atual do produto com exclusividade de linha
            let product = tx
                .get_product_for_update(item.product_id)
                .await?
                .ok_or(AppError::ProductNotFound(item.product_id))?;

            // 2/3. Novo estoque e novo custo médio ponderado
            let new_stock = product.stock + item.quantity;
            let new_cost =
                weighted_average_cost(product.stock, product.cost, item.quantity, item.unit_cost);

            // 4. Preço só muda quando a política de markup está habilitada
            let new_price = match product.markup_percent {
                Some(markup) => price_from_markup(new_cost, markup),
                None => product.price,
            };

            // 5. Razão primeiro: snapshots de antes/depois são o que
            // permite o estorno exato mais tarde
            tx.append_movement(NewStockMovement {
                purchase_order_id: order.id,
                product_id: product.id,
                kind: MovementKind::Posting,
                quantity_applied: item.quantity,
                unit_cost_applied: item.unit_cost,
                product_stock_before: product.stock,
                product_stock_after: new_stock,
                product_cost_before: product.cost,
                product_cost_after: new_cost,
                product_price_before: product.price,
                product_price_after: new_price,
            })
            .await?;

            // 6. Persiste o produto
            tx.update_product(product.id, new_stock, new_cost, new_price)
                .await?;

            merge_updated_product(
                &mut summary,
                UpdatedProduct {
                    product_id: product.id,
                    name: product.name.clone(),
                    new_stock,
                    updated_cost: new_cost != product.cost,
                    cost: new_cost,
                    updated_price: new_price != product.price,
                    price: new_price,
                },
            );
        }

        Ok(summary)
    }
}
