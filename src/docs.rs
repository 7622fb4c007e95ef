// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Products ---
        handlers::products::create_product,
        handlers::products::list_products,

        // --- Purchases ---
        handlers::purchases::create_purchase,
        handlers::purchases::list_purchases,
        handlers::purchases::get_purchase,
        handlers::purchases::list_movements,
        handlers::purchases::post_stock,
        handlers::purchases::reverse_stock,
        handlers::purchases::delete_purchase,
        handlers::purchases::bulk_operation,
    ),
    components(
        schemas(
            models::catalog::Product,
            models::purchase::PurchaseOrder,
            models::purchase::PurchaseOrderItem,
            models::purchase::PurchaseOrderDetail,
            models::purchase::PurchaseOrderStatus,
            models::purchase::StockMovement,
            models::purchase::MovementKind,
            models::purchase::UpdatedProduct,
            models::purchase::PostingSummary,
            models::purchase::BulkOperation,
            models::purchase::BulkFailure,
            models::purchase::BulkReport,
            handlers::products::CreateProductPayload,
            handlers::purchases::CreatePurchasePayload,
            handlers::purchases::PurchaseItemPayload,
            handlers::purchases::BulkPayload,
        )
    ),
    tags(
        (name = "Products", description = "Catálogo de produtos"),
        (name = "Purchases", description = "Pedidos de compra: lançamento e estorno de estoque")
    )
)]
pub struct ApiDoc;
