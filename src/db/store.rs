// src/db/store.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        catalog::{NewProduct, Product},
        purchase::{
            NewPurchaseOrder, NewStockMovement, PurchaseOrder, PurchaseOrderItem,
            PurchaseOrderStatus, StockMovement,
        },
    },
};

// ---
// Contrato de persistência do motor de lançamentos.
// ---
// Uma transação por operação de negócio: `begin` abre, `commit` confirma,
// descartar a transação sem commit desfaz tudo. É isso que garante que um
// lançamento/estorno parcial nunca seja observável.

#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;
}

#[async_trait]
pub trait StoreTx: Send {
    // --- Produtos ---
    async fn get_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError>;

    /// Leitura com exclusividade de linha: dois lançamentos concorrentes
    /// sobre o mesmo produto serializam o read-modify-write aqui.
    async fn get_product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, AppError>;

    async fn insert_product(&mut self, new: &NewProduct) -> Result<Product, AppError>;
    async fn list_products(&mut self) -> Result<Vec<Product>, AppError>;
    async fn update_product(
        &mut self,
        id: Uuid,
        stock: i64,
        cost: Decimal,
        price: Decimal,
    ) -> Result<(), AppError>;

    // --- Pedidos de compra ---
    async fn insert_order(&mut self, new: &NewPurchaseOrder) -> Result<PurchaseOrder, AppError>;
    async fn get_order(&mut self, id: Uuid) -> Result<Option<PurchaseOrder>, AppError>;

    /// Leitura com exclusividade de linha: o status visto aqui continua
    /// válido até o fim da transação (um lançamento concorrente não pode
    /// mudar o pedido entre a leitura e a exclusão).
    async fn get_order_for_update(&mut self, id: Uuid)
    -> Result<Option<PurchaseOrder>, AppError>;
    async fn list_orders(&mut self) -> Result<Vec<PurchaseOrder>, AppError>;
    async fn list_order_items(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<PurchaseOrderItem>, AppError>;
    async fn update_order_total(&mut self, id: Uuid, total: Decimal) -> Result<(), AppError>;

    /// Compare-and-swap de status: só troca se o status atual estiver em
    /// `expected`, devolvendo se trocou. É o ponto de exclusão mútua do
    /// ciclo de vida (no máximo um lançamento e um estorno por ciclo).
    async fn update_order_status(
        &mut self,
        id: Uuid,
        expected: &[PurchaseOrderStatus],
        to: PurchaseOrderStatus,
    ) -> Result<bool, AppError>;

    /// Remove o pedido e seus itens. O razão NÃO é apagado: ele é o
    /// registro durável de tudo que já foi aplicado.
    async fn delete_order(&mut self, id: Uuid) -> Result<(), AppError>;

    // --- Razão de movimentações ---
    async fn append_movement(
        &mut self,
        new: NewStockMovement,
    ) -> Result<StockMovement, AppError>;
    async fn mark_movement_reversed(&mut self, id: Uuid) -> Result<(), AppError>;

    /// Entradas diretas (POSTING) ainda não compensadas de um pedido, na
    /// ordem em que foram lançadas.
    async fn movements_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError>;

    /// Razão completo de um produto (todas as entradas, inclusive as já
    /// compensadas), em ordem cronológica. Base do strip-and-replay do
    /// estorno: estornos de outros pedidos também mudam custo/preço, então
    /// o motor precisa enxergar a história inteira, não só os lançamentos.
    async fn ledger_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError>;

    /// Razão completo de um pedido (lançamentos e estornos), para auditoria.
    async fn ledger_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
