// src/db/memory.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{PurchaseStore, StoreTx},
    models::{
        catalog::{NewProduct, Product},
        purchase::{
            MovementKind, NewPurchaseOrder, NewStockMovement, PurchaseOrder, PurchaseOrderItem,
            PurchaseOrderStatus, StockMovement,
        },
    },
};

// ---
// Store em memória, usado pela suíte de testes (e por execuções locais
// sem Postgres). As transações trabalham sobre uma cópia do estado e só a
// promovem no commit, então o "nenhum efeito parcial observável" vale
// exatamente como no Postgres. O mutex serializa as transações inteiras.
// ---

#[derive(Debug, Clone, Default)]
struct MemState {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, PurchaseOrder>,
    items: HashMap<Uuid, Vec<PurchaseOrderItem>>,
    movements: Vec<StockMovement>,
    next_seq: i64,
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState {
                next_seq: 1,
                ..MemState::default()
            })),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PurchaseStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let work = (*guard).clone();
        Ok(Box::new(MemTx { guard, work }))
    }
}

pub struct MemTx {
    guard: OwnedMutexGuard<MemState>,
    work: MemState,
}

#[async_trait]
impl StoreTx for MemTx {
    async fn get_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.work.products.get(&id).cloned())
    }

    async fn get_product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        // O mutex do store já dá exclusividade total.
        Ok(self.work.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, new: &NewProduct) -> Result<Product, AppError> {
        if self.work.products.values().any(|p| p.sku == new.sku) {
            return Err(AppError::SkuAlreadyExists(new.sku.clone()));
        }
        let product = Product {
            id: Uuid::new_v4(),
            sku: new.sku.clone(),
            name: new.name.clone(),
            stock: new.stock,
            cost: new.cost,
            price: new.price,
            markup_percent: new.markup_percent,
            created_at: Utc::now(),
        };
        self.work.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn list_products(&mut self) -> Result<Vec<Product>, AppError> {
        let mut products: Vec<Product> = self.work.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn update_product(
        &mut self,
        id: Uuid,
        stock: i64,
        cost: Decimal,
        price: Decimal,
    ) -> Result<(), AppError> {
        let product = self
            .work
            .products
            .get_mut(&id)
            .ok_or(AppError::ProductNotFound(id))?;
        product.stock = stock;
        product.cost = cost;
        product.price = price;
        Ok(())
    }

    async fn insert_order(&mut self, new: &NewPurchaseOrder) -> Result<PurchaseOrder, AppError> {
        if self.work.orders.values().any(|o| o.number == new.number) {
            return Err(AppError::OrderNumberAlreadyExists(new.number.clone()));
        }
        let order_id = Uuid::new_v4();
        let mut total = Decimal::ZERO;
        let mut items = Vec::with_capacity(new.items.len());
        for (idx, item) in new.items.iter().enumerate() {
            let line_total = Decimal::from(item.quantity) * item.unit_cost;
            total += line_total;
            items.push(PurchaseOrderItem {
                id: Uuid::new_v4(),
                purchase_order_id: order_id,
                product_id: item.product_id,
                position: idx as i32,
                quantity: item.quantity,
                unit_cost: item.unit_cost,
                line_total,
            });
        }
        let order = PurchaseOrder {
            id: order_id,
            number: new.number.clone(),
            supplier_id: new.supplier_id,
            status: PurchaseOrderStatus::Draft,
            total_value: total,
            created_at: Utc::now(),
        };
        self.work.orders.insert(order_id, order.clone());
        self.work.items.insert(order_id, items);
        Ok(order)
    }

    async fn get_order(&mut self, id: Uuid) -> Result<Option<PurchaseOrder>, AppError> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn get_order_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<PurchaseOrder>, AppError> {
        // O mutex do store já dá exclusividade total.
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn list_orders(&mut self) -> Result<Vec<PurchaseOrder>, AppError> {
        let mut orders: Vec<PurchaseOrder> = self.work.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_order_items(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<PurchaseOrderItem>, AppError> {
        Ok(self.work.items.get(&order_id).cloned().unwrap_or_default())
    }

    async fn update_order_total(&mut self, id: Uuid, total: Decimal) -> Result<(), AppError> {
        if let Some(order) = self.work.orders.get_mut(&id) {
            order.total_value = total;
        }
        Ok(())
    }

    async fn update_order_status(
        &mut self,
        id: Uuid,
        expected: &[PurchaseOrderStatus],
        to: PurchaseOrderStatus,
    ) -> Result<bool, AppError> {
        match self.work.orders.get_mut(&id) {
            Some(order) if expected.contains(&order.status) => {
                order.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<(), AppError> {
        self.work.orders.remove(&id);
        self.work.items.remove(&id);
        // O razão permanece: registro durável de tudo que já foi aplicado.
        Ok(())
    }

    async fn append_movement(
        &mut self,
        new: NewStockMovement,
    ) -> Result<StockMovement, AppError> {
        let movement = StockMovement {
            id: Uuid::new_v4(),
            seq: self.work.next_seq,
            purchase_order_id: new.purchase_order_id,
            product_id: new.product_id,
            kind: new.kind,
            reversed: false,
            quantity_applied: new.quantity_applied,
            unit_cost_applied: new.unit_cost_applied,
            product_stock_before: new.product_stock_before,
            product_stock_after: new.product_stock_after,
            product_cost_before: new.product_cost_before,
            product_cost_after: new.product_cost_after,
            product_price_before: new.product_price_before,
            product_price_after: new.product_price_after,
            applied_at: Utc::now(),
        };
        self.work.next_seq += 1;
        self.work.movements.push(movement.clone());
        Ok(movement)
    }

    async fn mark_movement_reversed(&mut self, id: Uuid) -> Result<(), AppError> {
        if let Some(movement) = self.work.movements.iter_mut().find(|m| m.id == id) {
            movement.reversed = true;
        }
        Ok(())
    }

    async fn movements_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        Ok(self
            .work
            .movements
            .iter()
            .filter(|m| {
                m.purchase_order_id == order_id && m.kind == MovementKind::Posting && !m.reversed
            })
            .cloned()
            .collect())
    }

    async fn ledger_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        Ok(self
            .work
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn ledger_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        Ok(self
            .work
            .movements
            .iter()
            .filter(|m| m.purchase_order_id == order_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn descartar_transacao_sem_commit_desfaz_tudo() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&NewProduct {
            sku: "SKU-1".into(),
            name: "Produto".into(),
            stock: 0,
            cost: Decimal::ZERO,
            price: Decimal::ZERO,
            markup_percent: None,
        })
        .await
        .unwrap();
        drop(tx); // rollback

        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_promove_o_estado() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&NewProduct {
            sku: "SKU-1".into(),
            name: "Produto".into(),
            stock: 5,
            cost: Decimal::from(2),
            price: Decimal::from(4),
            markup_percent: None,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let products = tx.list_products().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].stock, 5);
    }
}
