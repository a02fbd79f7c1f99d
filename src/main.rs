use authpost::{
    build_router,
    post::repository::{InMemoryPostRepository, PostRepository, PostgresPostRepository},
    router::{cors_layer, timeout_layer},
    session::{
        password::PasswordHasher,
        revocation::{start_purge_task, InMemoryRevocationList, RevocationList},
        token::TokenService,
    },
    user::repository::{InMemoryUserRepository, PostgresUserRepository, UserRepository},
    AppConfig, AppState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Repositories = (
    Arc<dyn UserRepository + Send + Sync>,
    Arc<dyn PostRepository + Send + Sync>,
);

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authpost=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Server failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    info!(?config, "Starting authpost server");

    let (user_repository, post_repository) = connect_repositories(&config).await?;

    let revocation_list: Arc<dyn RevocationList + Send + Sync> =
        Arc::new(InMemoryRevocationList::new());
    tokio::spawn(start_purge_task(
        Arc::clone(&revocation_list),
        config.revocation_purge_interval,
    ));

    let app_state = AppState::new(
        user_repository,
        post_repository,
        TokenService::new(&config.jwt_secret, config.token_ttl),
        revocation_list,
        PasswordHasher::new(config.bcrypt_cost),
    );

    let app = build_router(app_state)
        .layer(timeout_layer(config.request_timeout))
        .layer(cors_layer(&config.allowed_origins));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Postgres when DATABASE_URL is set, otherwise in-memory stores
async fn connect_repositories(config: &AppConfig) -> Result<Repositories, Box<dyn std::error::Error>> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL not set, using in-memory storage (data is lost on restart)");
        return Ok((
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryPostRepository::new()),
        ));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.database_acquire_timeout)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Connected to PostgreSQL and applied migrations");

    Ok((
        Arc::new(PostgresUserRepository::new(pool.clone())),
        Arc::new(PostgresPostRepository::new(pool)),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
