//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LogNotifier, OpenAiEmbeddingAdapter},
    config::Config,
    error::ApiError,
    scheduler::{run_workflow_poller, spawn_jobs},
    web::{
        intake::{
            approve_assessment_handler, convert_assessment_handler, create_assessment_handler,
            create_client_handler, create_tenant_handler, get_assessment_handler,
            list_tenant_assessments_handler, list_tenant_clients_handler, my_tenant_handler,
            review_assessment_handler, submit_assessment_handler, tenant_by_qr_handler,
            tenant_by_slug_handler, tenant_stats_handler, update_condition_handler,
            update_services_handler, update_tenant_settings_handler,
        },
        middleware::{require_identity, EMAIL_HEADER, NAME_HEADER, PHONE_HEADER, SUBJECT_HEADER},
        rest::{
            add_vehicle_handler, admin_create_service_handler, admin_list_bookings_handler,
            admin_update_booking_status_handler, admin_update_service_handler,
            create_booking_handler, delete_vehicle_handler, get_booking_handler,
            get_service_handler, get_vehicle_handler, list_my_bookings_handler,
            list_services_handler, list_vehicles_handler, me_handler, pricing_analytics_handler,
            quote_handler, run_cleanup_handler, run_daily_analytics_handler,
            run_knowledge_refresh_handler, update_profile_handler, update_vehicle_handler,
            ApiDoc,
        },
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use detailing_core::knowledge::seed_knowledge;
use detailing_core::ports::{Clock, SystemClock};
use detailing_core::pricing::InsightSource;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
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
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Knowledge Side Channel ---
    // Without an API key, quotes are still priced; they just carry no insights.
    let insights = match &config.openai_api_key {
        Some(key) => {
            let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(key));
            let embedder = Arc::new(OpenAiEmbeddingAdapter::new(
                openai_client,
                config.embedding_model.clone(),
            ));
            if let Err(e) = seed_knowledge(embedder.as_ref(), db_adapter.as_ref()).await {
                warn!("Failed to seed pricing knowledge: {:?}", e);
            }
            Some(InsightSource {
                embedder,
                store: db_adapter.clone(),
            })
        }
        None => {
            warn!("OPENAI_API_KEY not set; pricing insights are disabled.");
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_adapter.clone(),
        db_adapter.clone(),
        Arc::new(LogNotifier::new()),
        insights,
        clock.clone(),
    ));

    // --- 5. Start Background Work ---
    let shutdown = CancellationToken::new();
    let poller = tokio::spawn(run_workflow_poller(
        db_adapter.clone(),
        app_state.workflow.clone(),
        clock,
        config.workflow.clone(),
        shutdown.clone(),
    ));
    let job_loops = spawn_jobs(app_state.jobs.clone(), &config.jobs, shutdown.clone());

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(SUBJECT_HEADER),
            HeaderName::from_static(EMAIL_HEADER),
            HeaderName::from_static(NAME_HEADER),
            HeaderName::from_static(PHONE_HEADER),
        ]);

    // --- 6. Create the Web Router ---
    // Public routes (no identity required)
    let public_routes = Router::new()
        .route("/services", get(list_services_handler))
        .route("/services/{id}", get(get_service_handler))
        .route("/intake/tenants/slug/{slug}", get(tenant_by_slug_handler))
        .route("/intake/tenants/qr/{code}", get(tenant_by_qr_handler))
        .route("/intake/tenants/{id}/clients", post(create_client_handler))
        .route("/intake/assessments", post(create_assessment_handler))
        .route("/intake/assessments/{id}", get(get_assessment_handler))
        .route("/intake/assessments/{id}/condition", put(update_condition_handler))
        .route("/intake/assessments/{id}/services", put(update_services_handler))
        .route("/intake/assessments/{id}/submit", post(submit_assessment_handler));

    // Protected routes (identity required)
    let protected_routes = Router::new()
        .route("/me", get(me_handler).patch(update_profile_handler))
        .route("/vehicles", get(list_vehicles_handler).post(add_vehicle_handler))
        .route(
            "/vehicles/{id}",
            get(get_vehicle_handler)
                .patch(update_vehicle_handler)
                .delete(delete_vehicle_handler),
        )
        .route("/quotes", post(quote_handler))
        .route("/bookings", get(list_my_bookings_handler).post(create_booking_handler))
        .route("/bookings/{id}", get(get_booking_handler))
        .route("/admin/bookings", get(admin_list_bookings_handler))
        .route(
            "/admin/bookings/{id}/status",
            patch(admin_update_booking_status_handler),
        )
        .route("/admin/services", post(admin_create_service_handler))
        .route("/admin/services/{id}", patch(admin_update_service_handler))
        .route("/admin/analytics/pricing", get(pricing_analytics_handler))
        .route("/admin/jobs/knowledge-refresh", post(run_knowledge_refresh_handler))
        .route("/admin/jobs/daily-analytics", post(run_daily_analytics_handler))
        .route("/admin/jobs/cleanup", post(run_cleanup_handler))
        .route("/tenants", post(create_tenant_handler))
        .route("/tenants/me", get(my_tenant_handler))
        .route("/tenants/{id}/settings", patch(update_tenant_settings_handler))
        .route("/tenants/{id}/stats", get(tenant_stats_handler))
        .route("/tenants/{id}/clients", get(list_tenant_clients_handler))
        .route("/tenants/{id}/assessments", get(list_tenant_assessments_handler))
        .route("/tenants/assessments/{id}/review", post(review_assessment_handler))
        .route("/tenants/assessments/{id}/approve", post(approve_assessment_handler))
        .route("/tenants/assessments/{id}/convert", post(convert_assessment_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_identity,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            server_shutdown.cancel();
        })
        .await?;

    // --- 8. Drain Background Work ---
    shutdown.cancel();
    if let Err(e) = poller.await {
        warn!("Workflow poller ended abnormally: {}", e);
    }
    for handle in job_loops {
        if let Err(e) = handle.await {
            warn!("Job loop ended abnormally: {}", e);
        }
    }
    info!("Server stopped.");
    Ok(())
}
