//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, HttpStorageAdapter, MockOcrAdapter, OpenRouterAnalysisAdapter,
        OpenRouterChatAdapter, StripeBillingAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        middleware::require_auth,
        rest::{
            chat_history_handler, chat_send_handler, checkout_handler, delete_contract_handler,
            get_contract_handler, get_profile_handler, list_contracts_handler, me_handler,
            scan_contract_handler, stats_handler, update_profile_handler, ApiDoc,
        },
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    // The LLM client is optional: without a key the adapters answer with a
    // missing-configuration error instead of the process refusing to boot.
    let openrouter_client = config.openrouter_api_key.as_ref().map(|key| {
        let openai_config = OpenAIConfig::new()
            .with_api_key(key)
            .with_api_base(&config.openrouter_api_base);
        Client::with_config(openai_config)
    });
    if openrouter_client.is_none() {
        tracing::warn!("OPENROUTER_API_KEY not configured - analysis and chat are disabled");
    }
    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not configured - billing features are disabled");
    }

    let http_client = reqwest::Client::new();

    let analysis_adapter = Arc::new(OpenRouterAnalysisAdapter::new(
        openrouter_client.clone(),
        config.analysis_model.clone(),
    ));
    let chat_adapter = Arc::new(OpenRouterChatAdapter::new(
        openrouter_client,
        config.chat_model.clone(),
    ));
    let storage_adapter = Arc::new(HttpStorageAdapter::new(
        http_client.clone(),
        config.storage_endpoint.clone(),
        config.storage_token.clone(),
    ));
    let billing_adapter = Arc::new(StripeBillingAdapter::new(
        http_client,
        config.stripe_api_base.clone(),
        config.stripe_secret_key.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        storage: storage_adapter,
        extractor: Arc::new(MockOcrAdapter::new()),
        analysis: analysis_adapter,
        chat: chat_adapter,
        billing: billing_adapter,
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .app_url
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid APP_URL: {}", e)))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let protected_routes = Router::new()
        .route("/auth/me", get(me_handler))
        .route(
            "/profile",
            get(get_profile_handler).patch(update_profile_handler),
        )
        .route("/contracts/scan", post(scan_contract_handler))
        .route("/contracts", get(list_contracts_handler))
        .route("/contracts/stats", get(stats_handler))
        .route(
            "/contracts/{id}",
            get(get_contract_handler).delete(delete_contract_handler),
        )
        .route("/chat/send", post(chat_send_handler))
        .route("/chat/{contract_id}/history", get(chat_history_handler))
        .route("/billing/checkout", post(checkout_handler))
        .layer(axum_middleware::from_fn(require_auth));

    let api_router = Router::new()
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
