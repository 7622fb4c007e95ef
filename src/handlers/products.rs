// src/handlers/products.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError, config::AppState, handlers::validate_not_negative,
    models::catalog::NewProduct,
};

// ---
// Payload: CreateProduct
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    #[validate(length(min = 1, message = "O SKU é obrigatório."))]
    #[schema(example = "CAFE-500G")]
    pub sku: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Café Torrado 500g")]
    pub name: String,

    // Estoque/custo iniciais são opcionais: produto pode nascer zerado
    #[validate(range(min = 0, message = "O estoque não pode ser negativo."))]
    #[serde(default)]
    pub stock: i64,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub cost: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub price: Decimal,

    // Quando presente, o preço passa a ser derivado do custo a cada
    // lançamento (preço = custo * (1 + markup/100)).
    #[validate(custom(function = "validate_not_negative"))]
    pub markup_percent: Option<Decimal>,
}

// POST /api/products
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Products",
    request_body = CreateProductPayload,
    responses(
        (status = 201, description = "Produto criado", body = crate::models::catalog::Product),
        (status = 409, description = "SKU já existe")
    )
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let product = app_state
        .catalog_service
        .create_product(NewProduct {
            sku: payload.sku,
            name: payload.name,
            stock: payload.stock,
            cost: payload.cost,
            price: payload.price,
            markup_percent: payload.markup_percent,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

// GET /api/products
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    responses(
        (status = 200, description = "Lista de produtos", body = [crate::models::catalog::Product])
    )
)]
pub async fn list_products(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let products = app_state.catalog_service.list_products().await?;
    Ok((StatusCode::OK, Json(products)))
}
