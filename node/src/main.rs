mod config;
mod version;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use drive_registry::ContentRegistry;
use drive_rpc::{start_server, AppState};
use drive_storage::{MemoryRegistryStore, RegistryStore, SledRegistryStore};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;
use crate::version::{git_commit_hash, DRIVE_VERSION};

fn build_cli() -> Command {
    Command::new("drive-node")
        .version(DRIVE_VERSION)
        .about("Drive content registry node")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (default: config/drive.toml if present)"),
        )
        .arg(
            Arg::new("version_flag")
                .short('V')
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print detailed version information and exit"),
        )
        .arg(
            Arg::new("db-path")
                .long("db-path")
                .value_name("DIR")
                .help("Registry database directory"),
        )
        .arg(
            Arg::new("memory")
                .long("memory")
                .action(ArgAction::SetTrue)
                .help("Keep registry state in memory only (lost on exit)"),
        )
        .arg(
            Arg::new("rpc-host")
                .long("rpc-host")
                .value_name("HOST")
                .help("Override the RPC bind host"),
        )
        .arg(
            Arg::new("rpc-port")
                .long("rpc-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Override the RPC bind port"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Override the log format"),
        )
}

fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if let Some(db_path) = matches.get_one::<String>("db-path") {
        config.db_path = db_path.clone();
    }

    if matches.get_flag("memory") {
        config.memory = true;
    }

    if let Some(rpc_host) = matches.get_one::<String>("rpc-host") {
        config.rpc_host = rpc_host.clone();
    }

    if let Some(rpc_port) = matches.get_one::<u16>("rpc-port") {
        config.rpc_port = *rpc_port;
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

fn init_prometheus() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics exporter registered");
            describe_counter!(
                "drive_registry_publish_total",
                "Content references published"
            );
            describe_counter!("drive_registry_grant_total", "New access grants recorded");
            describe_counter!("drive_registry_list_total", "Gallery list requests");
            describe_counter!(
                "drive_registry_denied_total",
                "List requests rejected for missing access"
            );
            Some(handle)
        }
        Err(err) => {
            warn!("Failed to install Prometheus metrics exporter: {}", err);
            None
        }
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn RegistryStore>> {
    if config.memory {
        warn!("Using in-memory registry store; state is lost on exit");
        return Ok(Arc::new(MemoryRegistryStore::new()));
    }

    let path = Path::new(&config.db_path);
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create database directory {}", path.display()))?;
    let store = SledRegistryStore::open(path)
        .with_context(|| format!("failed to open registry database at {}", path.display()))?;
    info!("Opened registry database at {}", path.display());
    Ok(Arc::new(store))
}

fn print_version_info() {
    println!("drive-node {} (commit {})", DRIVE_VERSION, git_commit_hash());
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    if matches.get_flag("version_flag") {
        print_version_info();
        return Ok(());
    }

    let config = load_config_with_overrides(&matches)?;
    init_logging(&config)?;

    info!(
        node_id = %config.node_id,
        version = DRIVE_VERSION,
        commit = git_commit_hash(),
        "Starting drive node"
    );

    let metrics = if config.prometheus_enabled {
        init_prometheus()
    } else {
        None
    };

    let store = open_store(&config)?;
    let registry = Arc::new(ContentRegistry::new(store.clone(), config.registry_config()));
    if let Some(limit) = config.max_entries_per_owner {
        info!(limit, "Per-owner content quota enabled");
    }

    let mut state = AppState::new(registry, config.node_id.clone());
    state.max_clock_skew_ms = config.max_clock_skew_secs.saturating_mul(1_000);
    state.metrics = metrics;

    let rpc_addr = config.rpc_addr();
    tokio::select! {
        result = start_server(state, &rpc_addr) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    store
        .flush()
        .await
        .context("failed to flush registry store on shutdown")?;
    info!("Drive node stopped");
    Ok(())
}
