//! Analytics service entrypoint.
//!
//! # Startup
//!
//! ```text
//!   WEB_URL, REDIS_URL checked ──▶ config file + env overlay ──▶ logging, metrics
//!                                                                     │
//!   run until SIGINT/SIGTERM ◀── start ◀── sockets ◀── routes ◀── modules
//! ```
//!
//! Any failure before the listener opens prints `Failed to start: <reason>`
//! and exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use app_bootstrap::config::{load_config, validate_config, AppConfig, ConfigError, EnvConfig};
use app_bootstrap::http::middleware::apply_standard;
use app_bootstrap::module::{CacheModule, StoreModule, TraceModule};
use app_bootstrap::observability::{init_logging, metrics};
use app_bootstrap::{site, App, StartupError};

const REQUIRED_ENV: &[&str] = &["WEB_URL", "REDIS_URL"];
const DEFAULT_MONGO_URL: &str = "mongodb://localhost:27017/analytics";

#[derive(Debug, Parser)]
#[command(name = "app-bootstrap", version, about = "Analytics service over HTTP and WebSocket")]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, env = "APP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (env, config) = match prepare(&cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _logging = init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), mode = %config.mode, "app-bootstrap starting");

    if config.observability.metrics_enabled {
        // Address was checked by validate_config
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let running = match build(env, config) {
        Ok(app) => app.start().await,
        Err(e) => Err(e),
    };

    match running {
        Ok(running) => {
            tracing::info!(address = %running.local_addr(), "Listening for connections");
            let summary = running.run_until_signal().await;
            if !summary.failed_teardowns.is_empty() {
                tracing::warn!(modules = ?summary.failed_teardowns, "Some modules failed to tear down");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("Failed to start: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Validate the environment and assemble the configuration.
fn prepare(cli: &Cli) -> Result<(EnvConfig, AppConfig), ConfigError> {
    let env = EnvConfig::from_process(REQUIRED_ENV)?;

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    config.apply_env(&env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok((env, config))
}

/// Register modules, middleware, routes and socket events.
fn build(env: EnvConfig, config: AppConfig) -> Result<App, StartupError> {
    let http = config.http.clone();
    let sockets_enabled = config.sockets.enabled;
    let redis_url = env.get("REDIS_URL").unwrap_or_default().to_string();
    let mongo_url = env
        .get("MONGO_URL")
        .filter(|url| !url.is_empty())
        .unwrap_or(DEFAULT_MONGO_URL)
        .to_string();

    let mut app = App::new(config);
    app.register_module(TraceModule::new())?
        .register_module(CacheModule::new(redis_url))?
        .register_module(StoreModule::new(mongo_url))?;

    app.apply_middleware(move |router| apply_standard(router, &http))
        .apply_routes(site::register_routes);

    if sockets_enabled {
        site::register_sockets(&mut app)?;
    }

    Ok(app)
}
