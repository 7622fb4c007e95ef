// src/common/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::purchase::PurchaseOrderStatus;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Todos os erros de negócio são por pedido: em modo lote eles são isolados
// e reportados ao lado dos pedidos que deram certo.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Transição inválida: '{action}' não é permitido com status {status}")]
    InvalidTransition {
        action: &'static str,
        status: PurchaseOrderStatus,
    },

    #[error("Pedido de compra não encontrado: {0}")]
    OrderNotFound(Uuid),

    #[error("Produto não encontrado: {0}")]
    ProductNotFound(Uuid),

    // O estoque deste lançamento já foi consumido/vendido e não pode ser
    // retirado cegamente; o pedido permanece STOCK_POSTED.
    #[error(
        "Estoque insuficiente para estornar o produto {product_id}: disponível {available}, necessário {required}"
    )]
    InsufficientStockForReversal {
        product_id: Uuid,
        available: i64,
        required: i64,
    },

    // Lost-update detectado na linha do produto; seguro repetir a
    // transação inteira.
    #[error("Conflito de concorrência, tente novamente")]
    ConcurrencyConflict,

    #[error("Já existe um pedido com o número '{0}'")]
    OrderNumberAlreadyExists(String),

    #[error("Já existe um produto com o SKU '{0}'")]
    SkuAlreadyExists(String),

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            AppError::InvalidTransition { .. } | AppError::ConcurrencyConflict => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::OrderNotFound(_) | AppError::ProductNotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::InsufficientStockForReversal { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::OrderNumberAlreadyExists(_) | AppError::SkuAlreadyExists(_) => {
                (StatusCode::CONFLICT, self.to_string())
            }

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
