use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use webhook_core::dispatcher::Dispatcher;
use webhook_core::maintenance::Maintenance;
use webhook_core::memory::{MemoryDispatcher, MemoryStore};
use webhook_core::retry_scheduler::RetryScheduler;
use webhook_core::store::Store;
use webhook_core::worker::DeliveryWorker;

#[derive(Parser)]
#[command(
    name = "webhookd",
    version = "0.1.0",
    about = "Webhook delivery engine \u{2014} signed, retried, at-least-once webhook dispatch"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook delivery engine (default)
    Start {
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cmd = cli.command.unwrap_or(Commands::Start { config: None, port: None });

    match cmd {
        Commands::Start { config, port } => {
            // 1. Load config file, then let env vars and CLI flags override it.
            let mut file_config = webhook_core::config::load_config_file(config.as_deref())?;

            let port = port.unwrap_or(file_config.http_port);

            if let Ok(url) = std::env::var("WEBHOOK_POSTGRES_URL") {
                file_config.postgres_url = Some(url);
            }
            if let Ok(url) = std::env::var("WEBHOOK_REDIS_URL") {
                file_config.redis_url = Some(url);
            }
            let config = Arc::new(file_config);

            // 2. Build the Store: Postgres if configured, in-process memory otherwise.
            let store: Arc<dyn Store> = if let Some(ref url) = config.postgres_url {
                let pool = sqlx::PgPool::connect(url).await?;
                let pg_store = webhook_postgres::PostgresStore::new(pool, config.table_prefix.as_deref());
                pg_store.migrate().await?;
                Arc::new(pg_store)
            } else {
                tracing::warn!("no postgresUrl configured, using in-memory store (not durable)");
                Arc::new(MemoryStore::new())
            };

            // 3. Build the Dispatcher: Redis broker unless direct (in-process) mode is forced.
            let dispatcher: Arc<dyn Dispatcher> = if !config.direct_mode {
                if let Some(ref url) = config.redis_url {
                    let client = redis::Client::open(url.as_str())?;
                    let conn = client.get_multiplexed_async_connection().await?;
                    Arc::new(webhook_redis::RedisDispatcher::new(
                        conn,
                        &config.webhook_events_topic,
                        &config.webhook_retries_topic,
                        &config.webhook_balancing_topic,
                    ))
                } else {
                    tracing::warn!("no redisUrl configured, falling back to direct in-process dispatch");
                    Arc::new(MemoryDispatcher::new(config.max_in_flight * 4))
                }
            } else {
                Arc::new(MemoryDispatcher::new(config.max_in_flight * 4))
            };

            // 4. Auth mode for the inbound HTTP surface.
            let auth_mode = match std::env::var("WEBHOOK_AUTH_MODE").as_deref() {
                Ok("jwt") => {
                    let algorithm = std::env::var("WEBHOOK_JWT_ALGORITHM")
                        .ok()
                        .and_then(|a| match a.as_str() {
                            "RS256" => Some(jsonwebtoken::Algorithm::RS256),
                            "RS384" => Some(jsonwebtoken::Algorithm::RS384),
                            "RS512" => Some(jsonwebtoken::Algorithm::RS512),
                            "ES256" => Some(jsonwebtoken::Algorithm::ES256),
                            "ES384" => Some(jsonwebtoken::Algorithm::ES384),
                            _ => None,
                        })
                        .unwrap_or(jsonwebtoken::Algorithm::HS256);

                    webhook_server::AuthMode::Jwt(webhook_server::JwtConfig {
                        algorithm,
                        secret: std::env::var("WEBHOOK_JWT_SECRET").ok(),
                        public_key: std::env::var("WEBHOOK_JWT_PUBLIC_KEY").ok(),
                        issuer: std::env::var("WEBHOOK_JWT_ISSUER").ok(),
                        audience: std::env::var("WEBHOOK_JWT_AUDIENCE").ok(),
                    })
                }
                _ => webhook_server::AuthMode::None,
            };

            // 5. Spawn the delivery worker pool, retry scheduler, and maintenance loops.
            let client = Arc::new(
                reqwest::Client::builder()
                    .connect_timeout(std::time::Duration::from_millis(config.connection_timeout_ms))
                    .build()?,
            );
            let worker = Arc::new(DeliveryWorker::new(Arc::clone(&store), client, Arc::clone(&config)));
            for _ in 0..config.max_in_flight {
                let worker = Arc::clone(&worker);
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    loop {
                        match dispatcher.next().await {
                            Ok(Some((message_id, op))) => worker.handle(&message_id, op).await,
                            Ok(None) => continue,
                            Err(e) => {
                                tracing::warn!(error = %e, "dispatcher poll failed");
                            }
                        }
                    }
                });
            }

            let retry_scheduler = RetryScheduler::new(Arc::clone(&store), Arc::clone(&dispatcher), Arc::clone(&config));
            tokio::spawn(async move { retry_scheduler.run().await });

            let maintenance = Arc::new(Maintenance::new(Arc::clone(&store), Arc::clone(&config)));
            {
                let maintenance = Arc::clone(&maintenance);
                tokio::spawn(async move { maintenance.run_stuck_detector().await });
            }
            tokio::spawn(async move { maintenance.run_retention_cleanup().await });

            // 6. Create and serve the HTTP app.
            let app = webhook_server::create_app(store, dispatcher, config, auth_mode);
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
            tracing::info!(port, "webhook delivery engine started");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
