// src/services/purchase_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::PurchaseStore,
    models::purchase::{
        NewPurchaseOrder, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderStatus, StockMovement,
        UpdatedProduct,
    },
    services::{posting_service::PostingEngine, reversal_service::ReversalEngine},
};

// ---
// Controlador de Ciclo de Vida: dono da máquina de estados do pedido e o
// único componente que chama os motores de lançamento/estorno. Cada
// operação roda em UMA transação do store; o CAS de status executa antes
// de qualquer efeito e é o ponto de exclusão mútua — no máximo um
// lançamento e um estorno por ciclo, mesmo sob requisições concorrentes.
// ---
#[derive(Clone)]
pub struct PurchaseService {
    store: Arc<dyn PurchaseStore>,
    posting: PostingEngine,
    reversal: ReversalEngine,
}

impl PurchaseService {
    pub fn new(store: Arc<dyn PurchaseStore>) -> Self {
        Self {
            store,
            posting: PostingEngine::new(),
            reversal: ReversalEngine::new(),
        }
    }

    // --- Entrada de pedidos ---

    pub async fn create_order(
        &self,
        new: NewPurchaseOrder,
    ) -> Result<PurchaseOrderDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let order = tx.insert_order(&new).await?;
        let items = tx.list_order_items(order.id).await?;
        tx.commit().await?;
        Ok(PurchaseOrderDetail {
            header: order,
            items,
        })
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<PurchaseOrderDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .get_order(order_id)
            .await?
            .ok_or(AppError::OrderNotFound(order_id))?;
        let items = tx.list_order_items(order_id).await?;
        tx.commit().await?;
        Ok(PurchaseOrderDetail {
            header: order,
            items,
        })
    }

    pub async fn list_orders(&self) -> Result<Vec<PurchaseOrder>, AppError> {
        let mut tx = self.store.begin().await?;
        let orders = tx.list_orders().await?;
        tx.commit().await?;
        Ok(orders)
    }

    /// Razão completo de um pedido. Continua consultável depois que o
    /// pedido foi excluído (o razão sobrevive à exclusão).
    pub async fn ledger(&self, order_id: Uuid) -> Result<Vec<StockMovement>, AppError> {
        let mut tx = self.store.begin().await?;
        let order = tx.get_order(order_id).await?;
        let movements = tx.ledger_for_order(order_id).await?;
        tx.commit().await?;
        if order.is_none() && movements.is_empty() {
            return Err(AppError::OrderNotFound(order_id));
        }
        Ok(movements)
    }

    // --- Ciclo de vida ---

    /// Lança o estoque do pedido. Legal a partir de DRAFT, FINALIZED ou
    /// STOCK_REVERSED; lançar duas vezes é rejeitado, não ignorado.
    pub async fn post_stock(&self, order_id: Uuid) -> Result<Vec<UpdatedProduct>, AppError> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .get_order(order_id)
            .await?
            .ok_or(AppError::OrderNotFound(order_id))?;

        // CAS primeiro: de duas requisições concorrentes exatamente uma
        // vence; a outra observa InvalidTransition.
        let swapped = tx
            .update_order_status(
                order_id,
                &PurchaseOrderStatus::POSTABLE,
                PurchaseOrderStatus::StockPosted,
            )
            .await?;
        if !swapped {
            return Err(AppError::InvalidTransition {
                action: "post-stock",
                status: order.status,
            });
        }

        let items = tx.list_order_items(order_id).await?;
        let summary = self.posting.post_order(&mut *tx, &order, &items).await?;

        // Recalcula o total a partir dos itens efetivamente lançados
        let total: Decimal = items.iter().map(|i| i.line_total).sum();
        tx.update_order_total(order_id, total).await?;

        tx.commit().await?;
        Ok(summary)
    }

    /// Estorna o lançamento do pedido. Legal apenas a partir de
    /// STOCK_POSTED; o pedido volta a ser editável/relançável (DRAFT).
    pub async fn reverse_stock(&self, order_id: Uuid) -> Result<Vec<UpdatedProduct>, AppError> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .get_order(order_id)
            .await?
            .ok_or(AppError::OrderNotFound(order_id))?;

        let swapped = tx
            .update_order_status(
                order_id,
                &[PurchaseOrderStatus::StockPosted],
                PurchaseOrderStatus::Draft,
            )
            .await?;
        if !swapped {
            return Err(AppError::InvalidTransition {
                action: "reverse-stock",
                status: order.status,
            });
        }

        let summary = self.reversal.reverse_order(&mut *tx, &order).await?;

        tx.commit().await?;
        Ok(summary)
    }

    /// Exclui o pedido a partir de qualquer status. Se estiver lançado,
    /// o estorno completo roda antes, na MESMA transação: se o estorno
    /// falhar, a exclusão é abortada (excluir não é licença para
    /// corromper o inventário).
    pub async fn delete_order(&self, order_id: Uuid) -> Result<Vec<UpdatedProduct>, AppError> {
        let mut tx = self.store.begin().await?;

        // Leitura com lock de linha: um lançamento concorrente não pode
        // virar o status entre esta decisão e o DELETE. Sem isso o pedido
        // sumiria sem o estorno implícito, deixando estoque lançado sem dono.
        let order = tx
            .get_order_for_update(order_id)
            .await?
            .ok_or(AppError::OrderNotFound(order_id))?;

        let mut summary = Vec::new();
        if order.status == PurchaseOrderStatus::StockPosted {
            let swapped = tx
                .update_order_status(
                    order_id,
                    &[PurchaseOrderStatus::StockPosted],
                    PurchaseOrderStatus::Draft,
                )
                .await?;
            if !swapped {
                // Outra transação mexeu no status entre a leitura e o CAS
                return Err(AppError::ConcurrencyConflict);
            }
            summary = self.reversal.reverse_order(&mut *tx, &order).await?;
        }

        tx.delete_order(order_id).await?;
        tx.commit().await?;
        Ok(summary)
    }
}
