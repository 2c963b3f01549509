use keygate_access::AuthBroker;
use keygate_notify::{NoopNotifier, Notifier, SmtpNotifier};
use keygate_server::{app, auth::AppState, config::ServerConfig, proxy::TenantProxy};
use keygate_store::{DocumentStore, MemoryStore, PgStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Token/session store: Postgres when configured, in-memory otherwise
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(database_url) => {
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .expect("failed to connect to database");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&db_pool)
                .await
                .expect("failed to run migrations");

            Arc::new(PgStore::new(db_pool))
        }
        None => {
            tracing::warn!(
                "No database configured; tokens and sessions are held in memory \
                 and will not survive a restart"
            );
            Arc::new(MemoryStore::new())
        }
    };

    // Token delivery: SMTP when configured, skipped otherwise
    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(
            SmtpNotifier::new(smtp, config.public_url.clone())
                .expect("failed to build SMTP notifier"),
        ),
        None => {
            tracing::warn!("No SMTP transport configured; token delivery is skipped");
            Arc::new(NoopNotifier)
        }
    };

    let broker = AuthBroker::new(store, notifier, config.broker_config());
    let proxy = TenantProxy::new(&config.tenant).expect("failed to build tenant proxy");
    let state = Arc::new(
        AppState::new(broker, config.cookie.clone(), proxy)
            .expect("failed to build application state"),
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app::router(state).into_make_service())
        .await
        .expect("server error");
}
