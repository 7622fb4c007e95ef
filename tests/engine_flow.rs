// tests/engine_flow.rs
//
// Exercita o motor completo (controlador + motores + razão) sobre o store
// em memória, que tem a mesma semântica transacional do Postgres.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use compras_backend::common::error::AppError;
use compras_backend::db::{MemoryStore, PurchaseStore};
use compras_backend::models::catalog::{NewProduct, Product};
use compras_backend::models::purchase::{
    BulkOperation, MovementKind, NewPurchaseOrder, NewPurchaseOrderItem, PurchaseOrderStatus,
};
use compras_backend::services::bulk_service::BulkCoordinator;
use compras_backend::services::purchase_service::PurchaseService;

fn setup() -> (MemoryStore, PurchaseService) {
    let store = MemoryStore::new();
    let service = PurchaseService::new(Arc::new(store.clone()));
    (store, service)
}

async fn seed_product(
    store: &MemoryStore,
    sku: &str,
    stock: i64,
    cost: i64,
    price: i64,
    markup: Option<i64>,
) -> Product {
    let mut tx = store.begin().await.unwrap();
    let product = tx
        .insert_product(&NewProduct {
            sku: sku.into(),
            name: format!("Produto {sku}"),
            stock,
            cost: Decimal::from(cost),
            price: Decimal::from(price),
            markup_percent: markup.map(Decimal::from),
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    product
}

async fn fetch_product(store: &MemoryStore, id: Uuid) -> Product {
    let mut tx = store.begin().await.unwrap();
    tx.get_product(id).await.unwrap().unwrap()
}

async fn order_status(store: &MemoryStore, id: Uuid) -> Option<PurchaseOrderStatus> {
    let mut tx = store.begin().await.unwrap();
    tx.get_order(id).await.unwrap().map(|o| o.status)
}

// Simula consumo externo do estoque (venda fora deste motor).
async fn set_stock(store: &MemoryStore, product_id: Uuid, stock: i64) {
    let mut tx = store.begin().await.unwrap();
    let product = tx.get_product(product_id).await.unwrap().unwrap();
    tx.update_product(product_id, stock, product.cost, product.price)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

async fn create_order(
    service: &PurchaseService,
    number: &str,
    items: Vec<(Uuid, i64, i64)>,
) -> Uuid {
    service
        .create_order(NewPurchaseOrder {
            number: number.into(),
            supplier_id: None,
            items: items
                .into_iter()
                .map(|(product_id, quantity, unit_cost)| NewPurchaseOrderItem {
                    product_id,
                    quantity,
                    unit_cost: Decimal::from(unit_cost),
                })
                .collect(),
        })
        .await
        .unwrap()
        .header
        .id
}

#[tokio::test]
async fn lancar_duas_vezes_rejeita_a_segunda() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    service.post_stock(order).await.unwrap();
    let second = service.post_stock(order).await;
    assert!(matches!(second, Err(AppError::InvalidTransition { .. })));

    // O estoque foi incrementado exatamente uma vez
    let p = fetch_product(&store, product.id).await;
    assert_eq!(p.stock, 10);
    assert_eq!(p.cost, Decimal::from(5));
    assert_eq!(
        order_status(&store, order).await,
        Some(PurchaseOrderStatus::StockPosted)
    );
}

#[tokio::test]
async fn estorno_exato_restaura_o_estado_anterior() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    service.post_stock(order).await.unwrap();
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (10, Decimal::from(5)));

    service.reverse_stock(order).await.unwrap();
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (0, Decimal::ZERO));

    // O pedido volta a ser relançável
    assert_eq!(
        order_status(&store, order).await,
        Some(PurchaseOrderStatus::Draft)
    );
    service.post_stock(order).await.unwrap();
    assert_eq!(fetch_product(&store, product.id).await.stock, 10);
}

#[tokio::test]
async fn custo_medio_ponderado_no_lancamento() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 10, 4, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 6)]).await;

    let summary = service.post_stock(order).await.unwrap();

    let p = fetch_product(&store, product.id).await;
    assert_eq!(p.stock, 20);
    assert_eq!(p.cost, Decimal::from(5)); // (10*4 + 10*6) / 20

    assert_eq!(summary.len(), 1);
    assert!(summary[0].updated_cost);
    assert_eq!(summary[0].cost, Decimal::from(5));
    assert!(!summary[0].updated_price);
}

#[tokio::test]
async fn estorno_com_intercalacao_nao_restaura_cegamente() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order_a = create_order(&service, "PC-A", vec![(product.id, 10, 4)]).await;
    let order_b = create_order(&service, "PC-B", vec![(product.id, 10, 6)]).await;

    service.post_stock(order_a).await.unwrap();
    service.post_stock(order_b).await.unwrap();
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (20, Decimal::from(5)));

    // Estornar A não pode zerar o custo: o produto deve ficar consistente
    // apenas com a contribuição de B.
    service.reverse_stock(order_a).await.unwrap();
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (10, Decimal::from(6)));

    assert_eq!(
        order_status(&store, order_b).await,
        Some(PurchaseOrderStatus::StockPosted)
    );
}

#[tokio::test]
async fn estornos_sucessivos_apos_intercalacao_voltam_ao_estado_original() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 10, 2, 0, None).await;
    let order_a = create_order(&service, "PC-A", vec![(product.id, 10, 4)]).await;
    let order_b = create_order(&service, "PC-B", vec![(product.id, 10, 6)]).await;

    service.post_stock(order_a).await.unwrap(); // 20 un a 3,00
    service.post_stock(order_b).await.unwrap(); // 30 un a 4,00

    // Estornar A com B no meio: sobra a contribuição de B sobre o estado
    // original, wavg(10 un a 2,00; 10 un a 6,00) = 4,00
    service.reverse_stock(order_a).await.unwrap();
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (20, Decimal::from(4)));

    // Estornar B em seguida: o snapshot de B (custo 3,00) embute a
    // contribuição de A, que já foi estornada. O produto deve voltar ao
    // estado original, não ao snapshot envelhecido.
    service.reverse_stock(order_b).await.unwrap();
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (10, Decimal::from(2)));
}

#[tokio::test]
async fn estorno_bloqueado_quando_o_estoque_ja_foi_consumido() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    service.post_stock(order).await.unwrap();
    set_stock(&store, product.id, 3).await; // 7 unidades vendidas

    let result = service.reverse_stock(order).await;
    assert!(matches!(
        result,
        Err(AppError::InsufficientStockForReversal {
            available: 3,
            required: 10,
            ..
        })
    ));

    // Nada foi mutado; o pedido exige intervenção manual
    assert_eq!(
        order_status(&store, order).await,
        Some(PurchaseOrderStatus::StockPosted)
    );
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (3, Decimal::from(5)));
}

#[tokio::test]
async fn excluir_pedido_lancado_estorna_antes() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    service.post_stock(order).await.unwrap();
    let summary = service.delete_order(order).await.unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].new_stock, 0);

    // Produto exatamente como se reverse_stock tivesse sido chamado antes
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (0, Decimal::ZERO));

    // O pedido sumiu, mas o razão sobrevive para auditoria
    assert!(matches!(
        service.get_order(order).await,
        Err(AppError::OrderNotFound(_))
    ));
    let ledger = service.ledger(order).await.unwrap();
    assert_eq!(ledger.len(), 2); // lançamento + estorno
}

#[tokio::test]
async fn exclusao_abortada_se_o_estorno_implicito_falha() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    service.post_stock(order).await.unwrap();
    set_stock(&store, product.id, 0).await;

    let result = service.delete_order(order).await;
    assert!(matches!(
        result,
        Err(AppError::InsufficientStockForReversal { .. })
    ));

    // Excluir não é licença para corromper o inventário: o pedido continua lá
    assert_eq!(
        order_status(&store, order).await,
        Some(PurchaseOrderStatus::StockPosted)
    );
}

#[tokio::test]
async fn excluir_rascunho_nao_toca_no_estoque() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 7, 2, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    let summary = service.delete_order(order).await.unwrap();
    assert!(summary.is_empty());
    assert_eq!(order_status(&store, order).await, None);
    assert_eq!(fetch_product(&store, product.id).await.stock, 7);
}

#[tokio::test]
async fn lote_isola_a_falha_de_um_pedido() {
    let (store, service) = setup();
    let p1 = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let p2 = seed_product(&store, "P-2", 0, 0, 0, None).await;
    let p3 = seed_product(&store, "P-3", 0, 0, 0, None).await;
    let o1 = create_order(&service, "PC-1", vec![(p1.id, 10, 5)]).await;
    let o2 = create_order(&service, "PC-2", vec![(p2.id, 10, 5)]).await;
    let o3 = create_order(&service, "PC-3", vec![(p3.id, 10, 5)]).await;

    let bulk = BulkCoordinator::new(service.clone());
    let report = bulk.run(BulkOperation::Post, &[o1, o2, o3]).await;
    assert_eq!(report.succeeded.len(), 3);

    // Consome o estoque do produto do pedido 2: o estorno dele vai falhar
    set_stock(&store, p2.id, 0).await;

    let report = bulk.run(BulkOperation::Reverse, &[o1, o2, o3]).await;
    assert_eq!(report.succeeded, vec![o1, o3]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].order_id, o2);

    // Pedidos 1 e 3 completaram e seus efeitos são visíveis
    assert_eq!(fetch_product(&store, p1.id).await.stock, 0);
    assert_eq!(fetch_product(&store, p3.id).await.stock, 0);
    assert_eq!(
        order_status(&store, o2).await,
        Some(PurchaseOrderStatus::StockPosted)
    );

    // Resumo agregado cobre só os pedidos que deram certo
    assert_eq!(report.updated_products.len(), 2);
}

#[tokio::test]
async fn lancamento_falho_nao_deixa_efeito_parcial() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(
        &service,
        "PC-1",
        vec![(product.id, 10, 5), (Uuid::new_v4(), 1, 1)],
    )
    .await;

    let result = service.post_stock(order).await;
    assert!(matches!(result, Err(AppError::ProductNotFound(_))));

    // Nem o primeiro item foi aplicado, nem o status mudou, nem há razão
    assert_eq!(fetch_product(&store, product.id).await.stock, 0);
    assert_eq!(
        order_status(&store, order).await,
        Some(PurchaseOrderStatus::Draft)
    );
    assert!(service.ledger(order).await.unwrap().is_empty());
}

#[tokio::test]
async fn corrida_de_lancamento_tem_exatamente_um_vencedor() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    let s1 = service.clone();
    let s2 = service.clone();
    let (r1, r2) = tokio::join!(s1.post_stock(order), s2.post_stock(order));

    let winners = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = if r1.is_err() { r1 } else { r2 };
    assert!(matches!(loser, Err(AppError::InvalidTransition { .. })));

    assert_eq!(fetch_product(&store, product.id).await.stock, 10);
}

#[tokio::test]
async fn corrida_entre_excluir_e_lancar_nunca_deixa_estoque_sem_dono() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    let s1 = service.clone();
    let s2 = service.clone();
    let (posted, deleted) = tokio::join!(s1.post_stock(order), s2.delete_order(order));

    // Qualquer serialização é aceitável: ou a exclusão venceu e o
    // lançamento não achou o pedido, ou o lançamento venceu e a exclusão
    // estornou antes de excluir. Nunca pode sobrar estoque lançado de um
    // pedido que não existe mais.
    assert!(deleted.is_ok());
    if let Err(e) = posted {
        assert!(matches!(e, AppError::OrderNotFound(_)));
    }
    assert_eq!(order_status(&store, order).await, None);
    assert_eq!(fetch_product(&store, product.id).await.stock, 0);
}

#[tokio::test]
async fn politica_de_markup_recalcula_o_preco() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, Some(50)).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 10)]).await;

    let summary = service.post_stock(order).await.unwrap();
    assert!(summary[0].updated_price);
    assert_eq!(summary[0].price, Decimal::from(15)); // 10 * (1 + 50%)

    let p = fetch_product(&store, product.id).await;
    assert_eq!(p.price, Decimal::from(15));

    // O estorno sem intercalação restaura o preço anterior
    service.reverse_stock(order).await.unwrap();
    assert_eq!(fetch_product(&store, product.id).await.price, Decimal::ZERO);
}

#[tokio::test]
async fn estorno_exige_pedido_lancado() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    let result = service.reverse_stock(order).await;
    assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    assert_eq!(
        order_status(&store, order).await,
        Some(PurchaseOrderStatus::Draft)
    );
}

#[tokio::test]
async fn pedido_finalizado_e_relancavel_como_rascunho() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(&service, "PC-1", vec![(product.id, 10, 5)]).await;

    // Simula a variante de front-end que grava FINALIZED
    let mut tx = store.begin().await.unwrap();
    assert!(
        tx.update_order_status(
            order,
            &[PurchaseOrderStatus::Draft],
            PurchaseOrderStatus::Finalized,
        )
        .await
        .unwrap()
    );
    tx.commit().await.unwrap();

    service.post_stock(order).await.unwrap();
    assert_eq!(fetch_product(&store, product.id).await.stock, 10);
}

#[tokio::test]
async fn varios_itens_do_mesmo_produto_estornam_exatamente() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let order = create_order(
        &service,
        "PC-1",
        vec![(product.id, 5, 4), (product.id, 5, 8)],
    )
    .await;

    service.post_stock(order).await.unwrap();
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (10, Decimal::from(6))); // (5*4 + 5*8) / 10

    service.reverse_stock(order).await.unwrap();
    let p = fetch_product(&store, product.id).await;
    assert_eq!((p.stock, p.cost), (0, Decimal::ZERO));

    // Razão: duas entradas diretas compensadas + duas compensatórias
    let ledger = service.ledger(order).await.unwrap();
    let postings: Vec<_> = ledger
        .iter()
        .filter(|m| m.kind == MovementKind::Posting)
        .collect();
    let reversals: Vec<_> = ledger
        .iter()
        .filter(|m| m.kind == MovementKind::Reversal)
        .collect();
    assert_eq!(postings.len(), 2);
    assert!(postings.iter().all(|m| m.reversed));
    assert_eq!(reversals.len(), 2);
    assert!(reversals.iter().all(|m| m.quantity_applied < 0));
}

#[tokio::test]
async fn total_do_pedido_e_a_soma_das_linhas() {
    let (store, service) = setup();
    let p1 = seed_product(&store, "P-1", 0, 0, 0, None).await;
    let p2 = seed_product(&store, "P-2", 0, 0, 0, None).await;

    let detail = service
        .create_order(NewPurchaseOrder {
            number: "PC-1".into(),
            supplier_id: None,
            items: vec![
                NewPurchaseOrderItem {
                    product_id: p1.id,
                    quantity: 10,
                    unit_cost: Decimal::from(5),
                },
                NewPurchaseOrderItem {
                    product_id: p2.id,
                    quantity: 3,
                    unit_cost: Decimal::from(7),
                },
            ],
        })
        .await
        .unwrap();

    assert_eq!(detail.header.total_value, Decimal::from(71)); // 50 + 21
    assert_eq!(detail.items.len(), 2);
    assert_eq!(detail.items[0].line_total, Decimal::from(50));
    assert_eq!(detail.header.status, PurchaseOrderStatus::Draft);
}

#[tokio::test]
async fn numero_de_pedido_duplicado_e_rejeitado() {
    let (store, service) = setup();
    let product = seed_product(&store, "P-1", 0, 0, 0, None).await;
    create_order(&service, "PC-1", vec![(product.id, 1, 1)]).await;

    let duplicate = service
        .create_order(NewPurchaseOrder {
            number: "PC-1".into(),
            supplier_id: None,
            items: vec![NewPurchaseOrderItem {
                product_id: product.id,
                quantity: 1,
                unit_cost: Decimal::ONE,
            }],
        })
        .await;
    assert!(matches!(
        duplicate,
        Err(AppError::OrderNumberAlreadyExists(_))
    ));
}
