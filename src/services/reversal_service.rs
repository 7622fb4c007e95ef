// src/services/reversal_service.rs

use anyhow::anyhow;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::StoreTx,
    models::purchase::{
        MovementKind, NewStockMovement, PurchaseOrder, StockMovement, UpdatedProduct,
        merge_updated_product,
    },
    services::posting_service::{price_from_markup, weighted_average_cost},
};

// ---
// Motor de Estorno: desfaz exatamente o lançamento de um pedido a partir
// do razão. Quando nenhum outro pedido tocou o produto depois (lançamento
// ou estorno), restaura os snapshots de antes; caso contrário NÃO
// sobrescreve cegamente o valor mais novo: remove a contribuição deste
// pedido e reaplica (strip-and-replay) a história sobrevivente do custo
// médio, partindo do estado anterior à primeira entrada do razão.
// ---
#[derive(Clone, Default)]
pub struct ReversalEngine;

impl ReversalEngine {
    pub fn new() -> Self {
        Self
    }

    pub async fn reverse_order(
        &self,
        tx: &mut dyn StoreTx,
        order: &PurchaseOrder,
    ) -> Result<Vec<UpdatedProduct>, AppError> {
        let movements = tx.movements_for_order(order.id).await?;
        if movements.is_empty() {
            // O guard de status deveria ter impedido: razão vazio para um
            // pedido lançado indica store corrompido.
            return Err(anyhow!(
                "pedido {} marcado como lançado mas sem movimentações no razão",
                order.id
            )
            .into());
        }

        // Agrupa por produto preservando a ordem de lançamento, para que
        // pedidos com vários itens do mesmo produto estornem de uma vez.
        let mut groups: Vec<(Uuid, Vec<StockMovement>)> = Vec::new();
        for movement in movements {
            match groups.iter_mut().find(|(pid, _)| *pid == movement.product_id) {
                Some((_, group)) => group.push(movement),
                None => groups.push((movement.product_id, vec![movement])),
            }
        }

        let mut summary: Vec<UpdatedProduct> = Vec::new();

        for (product_id, group) in groups {
            let product = tx
                .get_product_for_update(product_id)
                .await?
                .ok_or(AppError::ProductNotFound(product_id))?;

            // 1. Baixa do estoque, nunca abaixo de zero: estoque já
            // consumido por vendas não pode ser retirado cegamente.
            let total_qty: i64 = group.iter().map(|m| m.quantity_applied).sum();
            let new_stock = product.stock - total_qty;
            if new_stock < 0 {
                return Err(AppError::InsufficientStockForReversal {
                    product_id,
                    available: product.stock,
                    required: total_qty,
                });
            }

            // 2. Custo/preço: restauração exata ou strip-and-replay.
            let first = &group[0];
            let history = tx.ledger_for_product(product_id).await?;

            // Qualquer entrada posterior de outro pedido invalida os
            // snapshots deste: estornos também mudam custo/preço, então o
            // teste não pode se limitar a lançamentos.
            let touched_since = history
                .iter()
                .any(|m| m.seq > first.seq && m.purchase_order_id != order.id);

            let (new_cost, new_price) = if !touched_since {
                // Produto intocado desde este lançamento: os valores de
                // antes ainda são válidos.
                (first.product_cost_before, first.product_price_before)
            } else {
                // Reaplica a história sobrevivente do custo médio: parte do
                // estado anterior à primeira entrada do produto no razão e
                // reaplica os lançamentos ainda não compensados dos outros
                // pedidos, como se este pedido nunca tivesse lançado.
                let mut stock = history[0].product_stock_before;
                let mut cost = history[0].product_cost_before;
                let survivors = history.iter().filter(|m| {
                    m.kind == MovementKind::Posting
                        && !m.reversed
                        && m.purchase_order_id != order.id
                });
                for m in survivors {
                    cost =
                        weighted_average_cost(stock, cost, m.quantity_applied, m.unit_cost_applied);
                    stock += m.quantity_applied;
                }
                let price = match product.markup_percent {
                    Some(markup) => price_from_markup(cost, markup),
                    // Sem política de markup não há como saber que preço a
                    // história sobrevivente teria produzido: mantém o atual.
                    None => product.price,
                };
                (cost, price)
            };

            // 3. Entradas compensatórias + marca as originais, para que o
            // mesmo pedido nunca seja estornado duas vezes.
            for m in &group {
                tx.append_movement(NewStockMovement {
                    purchase_order_id: order.id,
                    product_id,
                    kind: MovementKind::Reversal,
                    quantity_applied: -m.quantity_applied,
                    unit_cost_applied: m.unit_cost_applied,
                    product_stock_before: product.stock,
                    product_stock_after: new_stock,
                    product_cost_before: product.cost,
                    product_cost_after: new_cost,
                    product_price_before: product.price,
                    product_price_after: new_price,
                })
                .await?;
                tx.mark_movement_reversed(m.id).await?;
            }

            tx.update_product(product_id, new_stock, new_cost, new_price)
                .await?;

            merge_updated_product(
                &mut summary,
                UpdatedProduct {
                    product_id,
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
