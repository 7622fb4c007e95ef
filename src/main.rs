// src/main.rs

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use compras_backend::{config::AppState, docs::ApiDoc, handlers};

#[tokio::main]
async fn main() {
    // Inicializa o logger
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let product_routes = Router::new().route(
        "/",
        post(handlers::products::create_product).get(handlers::products::list_products),
    );

    let purchase_routes = Router::new()
        .route(
            "/",
            post(handlers::purchases::create_purchase).get(handlers::purchases::list_purchases),
        )
        .route("/bulk", post(handlers::purchases::bulk_operation))
        .route(
            "/{id}",
            get(handlers::purchases::get_purchase).delete(handlers::purchases::delete_purchase),
        )
        .route("/{id}/movements", get(handlers::purchases::list_movements))
        .route("/{id}/post-stock", post(handlers::purchases::post_stock))
        .route(
            "/{id}/reverse-stock",
            post(handlers::purchases::reverse_stock),
        );

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/products", product_routes)
        .nest("/api/purchases", purchase_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.expect("Erro no servidor Axum");
}
