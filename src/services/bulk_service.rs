// src/services/bulk_service.rs

use uuid::Uuid;

use crate::{
    models::purchase::{BulkFailure, BulkOperation, BulkReport, merge_updated_product},
    services::purchase_service::PurchaseService,
};

// ---
// Coordenador de Operações em Lote: aplica uma operação sobre um conjunto
// de pedidos, cada um na sua própria transação via o controlador de ciclo
// de vida. A falha de um pedido não bloqueia nem desfaz os demais; os
// erros são isolados e reportados ao lado dos sucessos.
// ---
#[derive(Clone)]
pub struct BulkCoordinator {
    purchases: PurchaseService,
}

impl BulkCoordinator {
    pub fn new(purchases: PurchaseService) -> Self {
        Self { purchases }
    }

    pub async fn run(&self, operation: BulkOperation, order_ids: &[Uuid]) -> BulkReport {
        let mut report = BulkReport {
            succeeded: Vec::new(),
            failed: Vec::new(),
            updated_products: Vec::new(),
        };

        // Sequencial: uma transação por pedido já dá o isolamento exigido
        // e mantém o resumo agregado determinístico.
        for &order_id in order_ids {
            let result = match operation {
                BulkOperation::Post => self.purchases.post_stock(order_id).await,
                BulkOperation::Reverse => self.purchases.reverse_stock(order_id).await,
                BulkOperation::Delete => self.purchases.delete_order(order_id).await,
            };

            match result {
                Ok(updated) => {
                    report.succeeded.push(order_id);
                    for entry in updated {
                        merge_updated_product(&mut report.updated_products, entry);
                    }
                }
                Err(e) => {
                    tracing::warn!("Operação em lote falhou para o pedido {}: {}", order_id, e);
                    report.failed.push(BulkFailure {
                        order_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
