pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod reconcile;
pub mod resolver;
pub mod scheduler;
pub mod services;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;

use api::{AppState, ProfileRuntime};
use cli::{Cli, Commands};
use clients::anilist::AnilistClient;
use constants::DATABASE_FILENAME;
use domain::events::NotificationEvent;
use scheduler::database_sync::DatabaseSyncJob;
use scheduler::ProfileSupervisor;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let prometheus_handle = init_prometheus(&config)?;
    init_logging(&config)?;

    let cli = Cli::parse();
    execute_command(cli, config, prometheus_handle).await
}

fn init_prometheus(
    config: &Config,
) -> anyhow::Result<Option<metrics_exporter_prometheus::PrometheusHandle>> {
    if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("failed to install Prometheus recorder")?;
        info!("prometheus metrics recorder initialized");
        Ok(Some(handle))
    } else {
        Ok(None)
    }
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let mut log_level = config.general.log_level.clone();
    if config.general.suppress_connection_errors {
        log_level.push_str(",reqwest::retry=off,hyper_util=off");
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let use_json =
        config.observability.loki_enabled || std::env::var("LOG_FORMAT").unwrap_or_default() == "json";

    if use_json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false);

        if config.observability.loki_enabled {
            let url = url::Url::parse(&config.observability.loki_url).context("invalid Loki URL")?;

            let (loki_layer, task) = tracing_loki::builder()
                .label("app", "plexanibridge")?
                .extra_field("env", "production")?
                .extra_field("version", env!("CARGO_PKG_VERSION"))?
                .build_url(url)?;

            tokio::spawn(task);
            registry.with(fmt_layer).with(loki_layer).init();
            info!("loki logging initialized at {}", config.observability.loki_url);
        } else {
            registry.with(fmt_layer).init();
        }
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().pretty();
        registry.with(fmt_layer).init();
    }
    Ok(())
}

async fn execute_command(
    cli: Cli,
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }

        Some(Commands::Daemon) => run_daemon(config, prometheus_handle).await,

        Some(Commands::Sync { profile, full, dry_run }) => {
            cli::cmd_sync(&config, &profile, full, dry_run).await
        }

        Some(Commands::History { profile, limit }) => cli::cmd_history(&config, &profile, limit).await,

        Some(Commands::Undo { event_id }) => cli::cmd_undo(&config, event_id).await,

        Some(Commands::Backup { command }) => match command {
            cli::BackupCommands::List { profile } => cli::cmd_backup_list(&config, &profile).await,
            cli::BackupCommands::Restore { profile, id } => {
                cli::cmd_backup_restore(&config, &profile, id).await
            }
        },

        Some(Commands::Mappings { query }) => {
            let query_str = query.join(" ");
            cli::cmd_mappings_search(&config, &query_str).await
        }
    }
}

/// Builds the `Store` + `ProfileSupervisor` for every configured profile,
/// each with its own database connection rooted at that profile's
/// effective `data_path` (profiles may share a `data_path`, in which case
/// they share a `Store`).
async fn build_profiles(
    config: &Config,
    events: &broadcast::Sender<NotificationEvent>,
) -> anyhow::Result<HashMap<String, (ProfileSupervisor, ProfileRuntime)>> {
    let mut stores: HashMap<String, db::Store> = HashMap::new();
    let mut profiles = HashMap::new();

    for (name, profile_config) in &config.profiles {
        let data_path = profile_config.data_path(&config.general).to_string();
        let store = match stores.get(&data_path) {
            Some(store) => store.clone(),
            None => {
                let db_path = format!("{data_path}/{DATABASE_FILENAME}");
                let store = db::Store::new(&format!("sqlite:{db_path}")).await?;
                stores.insert(data_path, store.clone());
                store
            }
        };

        let anilist = AnilistClient::new(&profile_config.anilist_token);
        let supervisor = ProfileSupervisor::new(
            name.clone(),
            profile_config.clone(),
            store,
            events.clone(),
        );

        let runtime = ProfileRuntime {
            handle: supervisor.handle(),
            state: supervisor.state_handle(),
            anilist,
            destructive_sync: profile_config.destructive_sync,
        };

        profiles.insert(name.clone(), (supervisor, runtime));
    }

    Ok(profiles)
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "plexanibridge v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let (events_tx, _events_rx) = broadcast::channel::<NotificationEvent>(config.general.event_bus_buffer_size);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    let built = build_profiles(&config, &events_tx).await?;

    let mut runtimes = HashMap::new();
    let mut supervisor_handles = Vec::new();
    for (name, (supervisor, runtime)) in built {
        runtimes.insert(name, runtime);
        let shutdown_rx = shutdown_tx.subscribe();
        supervisor_handles.push(tokio::spawn(supervisor.run(shutdown_rx)));
    }

    let app_state = Arc::new(AppState {
        store: db::Store::new(&format!(
            "sqlite:{}/{DATABASE_FILENAME}",
            config.general.data_path
        ))
        .await?,
        events: events_tx,
        profiles: runtimes,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    });

    let sync_job = DatabaseSyncJob::new(
        app_state.store.clone(),
        constants::DEFAULT_MAPPINGS_SOURCE_URL.to_string(),
        config.general.data_path.clone(),
    );
    let sync_handle = tokio::spawn(async move {
        sync_job.run_forever(constants::intervals::DATABASE_SYNC).await;
    });

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("starting web API on port {}", port);

        let app = api::router(app_state.clone(), &config).await;
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("web API listening at http://0.0.0.0:{port}");
            if let Err(err) = axum::serve(listener, app).await {
                error!(?err, "web API server error");
            }
        }))
    } else {
        None
    };

    info!("daemon running, press Ctrl+C to stop");

    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => error!(?err, "error listening for shutdown signal"),
    }

    let _ = shutdown_tx.send(());
    for handle in supervisor_handles {
        let _ = handle.await;
    }
    sync_handle.abort();
    if let Some(handle) = server_handle {
        handle.abort();
    }

    info!("daemon stopped");
    Ok(())
}
