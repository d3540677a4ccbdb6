#[tokio::main]
async fn main() {
    use axum::{Router, routing::get};
    use hitobito_login_server::{
        auth::{self, AppState, OidcClient},
        config::ServerConfig,
        cron,
    };
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Cleanup expired correlation records on startup, then periodically
    cron::reap_once(&db_pool).await;
    cron::spawn_expiry_reaper(db_pool.clone(), config.reap_interval_seconds);

    let policy = config.policy();
    let oidc_client = OidcClient::new(config.provider.clone()).expect("invalid provider config");

    let app_state = Arc::new(AppState::new(
        db_pool,
        oidc_client,
        policy,
        config.secure_cookies,
    ));

    let app = Router::new()
        .route("/oidc/{scope}/start", get(auth::start))
        .route("/oidc/{scope}/callback", get(auth::callback))
        .route("/oidc/{scope}/logout", get(auth::logout))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
