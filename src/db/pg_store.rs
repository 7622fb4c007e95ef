// src/db/pg_store.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{PurchaseStore, StoreTx},
    models::{
        catalog::{NewProduct, Product},
        purchase::{
            NewPurchaseOrder, NewStockMovement, PurchaseOrder, PurchaseOrderItem,
            PurchaseOrderStatus, StockMovement,
        },
    },
};

// Falha de serialização do Postgres (SQLSTATE 40001): a transação inteira
// pode ser repetida com segurança.
fn map_sqlx(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("40001") {
            return AppError::ConcurrencyConflict;
        }
    }
    AppError::DatabaseError(e)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn get_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(product)
    }

    async fn get_product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        // Trava a linha até o fim da transação: lançamentos concorrentes de
        // pedidos diferentes sobre o mesmo produto serializam aqui.
        let product =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_sqlx)?;
        Ok(product)
    }

    async fn insert_product(&mut self, new: &NewProduct) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (sku, name, stock, cost, price, markup_percent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new.sku)
        .bind(&new.name)
        .bind(new.stock)
        .bind(new.cost)
        .bind(new.price)
        .bind(new.markup_percent)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::SkuAlreadyExists(new.sku.clone());
                }
            }
            map_sqlx(e)
        })
    }

    async fn list_products(&mut self) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY name ASC")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(products)
    }

    async fn update_product(
        &mut self,
        id: Uuid,
        stock: i64,
        cost: Decimal,
        price: Decimal,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE products SET stock = $2, cost = $3, price = $4 WHERE id = $1")
            .bind(id)
            .bind(stock)
            .bind(cost)
            .bind(price)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn insert_order(&mut self, new: &NewPurchaseOrder) -> Result<PurchaseOrder, AppError> {
        let total: Decimal = new
            .items
            .iter()
            .map(|i| Decimal::from(i.quantity) * i.unit_cost)
            .sum();

        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            INSERT INTO purchase_orders (number, supplier_id, status, total_value)
            VALUES ($1, $2, 'DRAFT', $3)
            RETURNING *
            "#,
        )
        .bind(&new.number)
        .bind(new.supplier_id)
        .bind(total)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::OrderNumberAlreadyExists(new.number.clone());
                }
            }
            map_sqlx(e)
        })?;

        for (idx, item) in new.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_items
                    (purchase_order_id, product_id, position, quantity, unit_cost, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(idx as i32)
            .bind(item.quantity)
            .bind(item.unit_cost)
            .bind(Decimal::from(item.quantity) * item.unit_cost)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        }

        Ok(order)
    }

    async fn get_order(&mut self, id: Uuid) -> Result<Option<PurchaseOrder>, AppError> {
        let order =
            sqlx::query_as::<_, PurchaseOrder>("SELECT * FROM purchase_orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_sqlx)?;
        Ok(order)
    }

    async fn get_order_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<PurchaseOrder>, AppError> {
        // Trava a linha do pedido até o fim da transação: o status visto
        // aqui não pode mudar por baixo entre a decisão e a exclusão.
        let order = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(order)
    }

    async fn list_orders(&mut self) -> Result<Vec<PurchaseOrder>, AppError> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders ORDER BY created_at DESC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(orders)
    }

    async fn list_order_items(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<PurchaseOrderItem>, AppError> {
        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            "SELECT * FROM purchase_order_items WHERE purchase_order_id = $1 ORDER BY position ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(items)
    }

    async fn update_order_total(&mut self, id: Uuid, total: Decimal) -> Result<(), AppError> {
        sqlx::query("UPDATE purchase_orders SET total_value = $2 WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_order_status(
        &mut self,
        id: Uuid,
        expected: &[PurchaseOrderStatus],
        to: PurchaseOrderStatus,
    ) -> Result<bool, AppError> {
        // CAS atômico: o UPDATE só enxerga a linha se o status atual ainda
        // estiver entre os esperados.
        let result =
            sqlx::query("UPDATE purchase_orders SET status = $2 WHERE id = $1 AND status = ANY($3)")
                .bind(id)
                .bind(to)
                .bind(expected.to_vec())
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn append_movement(
        &mut self,
        new: NewStockMovement,
    ) -> Result<StockMovement, AppError> {
        let movement = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements
                (purchase_order_id, product_id, kind, quantity_applied, unit_cost_applied,
                 product_stock_before, product_stock_after,
                 product_cost_before, product_cost_after,
                 product_price_before, product_price_after)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(new.purchase_order_id)
        .bind(new.product_id)
        .bind(new.kind)
        .bind(new.quantity_applied)
        .bind(new.unit_cost_applied)
        .bind(new.product_stock_before)
        .bind(new.product_stock_after)
        .bind(new.product_cost_before)
        .bind(new.product_cost_after)
        .bind(new.product_price_before)
        .bind(new.product_price_after)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(movement)
    }

    async fn mark_movement_reversed(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE stock_movements SET reversed = true WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn movements_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE purchase_order_id = $1 AND kind = 'POSTING' AND reversed = false
            ORDER BY seq ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(movements)
    }

    async fn ledger_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE product_id = $1 ORDER BY seq ASC",
        )
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(movements)
    }

    async fn ledger_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE purchase_order_id = $1 ORDER BY seq ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(movements)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct FakeDbError(&'static str);

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "erro simulado (SQLSTATE {})", self.0)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "erro simulado"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(self.0.into())
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn falha_de_serializacao_vira_conflito_de_concorrencia() {
        let e = sqlx::Error::Database(Box::new(FakeDbError("40001")));
        assert!(matches!(map_sqlx(e), AppError::ConcurrencyConflict));
    }

    #[test]
    fn outros_codigos_permanecem_erro_de_banco() {
        let e = sqlx::Error::Database(Box::new(FakeDbError("23505")));
        assert!(matches!(map_sqlx(e), AppError::DatabaseError(_)));
    }
}
