use crate::catalogue::{CatalogueClient, TescoClient};
use crate::challenge::{CatalogueLayout, ChallengeService, Mode};
use crate::clock::today_in;
use crate::config::Config;
use crate::state::AppState;
use crate::store::{ChallengeStore, PgStore};
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How often expired rows are swept from the durable store.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    pg_store: Option<PgStore>,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let layout = CatalogueLayout::DEFAULT
            .validate()
            .context("Invalid catalogue layout")?;

        let pg_store = match &config.database_url {
            Some(url) => Some(Self::connect_store(url).await?),
            None => {
                warn!("DATABASE_URL not set, daily challenges will not survive restarts");
                None
            }
        };

        let catalogue: Arc<dyn CatalogueClient> = Arc::new(
            TescoClient::new(config.tesco_options(), layout.window)
                .context("Failed to create catalogue client")?,
        );
        if config.catalogue_csrf_token.is_none() {
            warn!("CATALOGUE_CSRF_TOKEN not set, the catalogue may reject requests");
        }

        let store = pg_store
            .clone()
            .map(|store| Arc::new(store) as Arc<dyn ChallengeStore>);
        let service = Arc::new(ChallengeService::new(
            layout,
            catalogue,
            store,
            config.read_deadline,
            config.default_timezone,
        ));

        info!(
            max_page = layout.max_page,
            page_size = layout.page_size,
            window = layout.window,
            read_deadline = fmt_duration(config.read_deadline),
            default_timezone = %config.default_timezone,
            durable_store = pg_store.is_some(),
            "challenge service configured"
        );

        let app_state = AppState::new(service, config.default_timezone);

        Ok(App {
            config,
            app_state,
            pg_store,
        })
    }

    async fn connect_store(url: &str) -> Result<PgStore, anyhow::Error> {
        let connect_options = PgConnectOptions::from_str(url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_slow_threshold(Duration::from_millis(500))
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 4,
            acquire_timeout = "4s",
            idle_timeout = "2m",
            max_lifetime = "30m",
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        Ok(PgStore::new(db_pool))
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Load today's challenge ahead of the first visitor.
    ///
    /// Non-fatal: on failure the first request retries.
    pub async fn warm_start(&self) {
        let tz = self.config.default_timezone;
        let start = Instant::now();
        match self.app_state.challenge.read(Mode::Daily, tz, today_in).await {
            Ok(challenge) => info!(
                date = %challenge.day,
                duration = fmt_duration(start.elapsed()),
                "daily challenge warmed"
            ),
            Err(e) => warn!(error = %e, "Failed to warm daily challenge (non-fatal)"),
        }
    }

    /// Periodically delete expired rows from the durable store.
    fn spawn_store_purge(&self, mut shutdown: watch::Receiver<bool>) {
        let Some(store) = self.pg_store.clone() else {
            return;
        };

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.changed() => break,
                }
                match store.purge_expired().await {
                    Ok(0) => debug!("no expired challenges to purge"),
                    Ok(n) => info!(count = n, "purged expired challenges"),
                    Err(e) => warn!(error = %e, "Failed to purge expired challenges"),
                }
            }
        });
    }

    /// Serve until a shutdown signal, then drain within the shutdown timeout.
    pub async fn run(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(%addr, error = %e, "Failed to bind listener");
                return ExitCode::FAILURE;
            }
        };
        info!(%addr, "web server listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.spawn_store_purge(shutdown_rx.clone());

        let router = create_router(self.app_state.clone());
        let mut server_shutdown = shutdown_rx;
        let mut server = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
        });

        tokio::select! {
            result = &mut server => {
                error!(result = ?result, "web server exited unexpectedly");
                return ExitCode::FAILURE;
            }
            signal = shutdown_signal() => {
                info!(signal, "shutdown requested");
            }
        }

        let _ = shutdown_tx.send(true);
        let timeout = self.config.shutdown_timeout;
        match tokio::time::timeout(timeout, &mut server).await {
            Ok(Ok(Ok(()))) => {
                info!("web server stopped gracefully");
                ExitCode::SUCCESS
            }
            Ok(Ok(Err(e))) => {
                error!(error = %e, "web server failed during shutdown");
                ExitCode::FAILURE
            }
            Ok(Err(e)) => {
                error!(error = %e, "web server task panicked");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!(
                    timeout = fmt_duration(timeout),
                    "graceful shutdown timed out, exiting"
                );
                ExitCode::FAILURE
            }
        }
    }
}

/// Resolves with the name of the first shutdown signal received.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
