use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use qwatch_adapters::http::HttpGateway;
use qwatch_core::config::{config_dir, DashboardConfig};
use qwatch_core::local_store::{load_servers, save_servers, FileLocalStore, LocalStore};
use qwatch_tui::{RunOptions, TuiError};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "QWATCH_LOG";
const LOG_FILE_NAME: &str = "qwatch.log";

/// Terminal dashboard for a JDBC query logging proxy.
#[derive(Debug, Default, Parser)]
#[command(name = "qwatch", version, about)]
struct Args {
    /// Base URL of the monitoring UI, overrides the config file.
    #[arg(long)]
    base_url: Option<String>,
    /// Config file to read instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Comma separated server list; stored for later runs.
    #[arg(long)]
    servers: Option<String>,
}

fn load_config(args: &Args) -> Result<DashboardConfig, Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => DashboardConfig::load_from_path(path)?,
        None => DashboardConfig::load_default()?,
    };
    Ok(config)
}

fn resolve_servers(
    servers: Option<&str>,
    store: &mut impl LocalStore,
) -> Result<String, Box<dyn Error>> {
    if let Some(servers) = servers {
        save_servers(store, Some(servers))?;
    }
    Ok(load_servers(store))
}

fn run_app(
    args: &Args,
    mut store: FileLocalStore,
    run_tui: impl FnOnce(RunOptions<HttpGateway>) -> Result<(), TuiError>,
) -> Result<(), Box<dyn Error>> {
    let config = load_config(args)?;
    let base_url = args.base_url.as_deref().unwrap_or(&config.base_url);
    let gateway = HttpGateway::new(base_url, config.request_timeout())?;
    let servers = resolve_servers(args.servers.as_deref(), &mut store)?;

    info!(
        base_url = %gateway.base_url(),
        servers = %servers,
        poll_secs = config.poll_interval().as_secs(),
        "starting dashboard"
    );

    run_tui(RunOptions {
        gateway: Arc::new(gateway),
        store,
        servers,
        reload_period: config.poll_interval(),
    })?;
    Ok(())
}

fn init_tracing() -> Option<WorkerGuard> {
    let log_dir = config_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Some(guard)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let _log_guard = init_tracing();
    let store = FileLocalStore::load_default()?;

    let result = run_app(&args, store, |options| {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(qwatch_tui::run(options))
    });
    if let Err(error) = &result {
        warn!(%error, "dashboard exited with an error");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::time::Duration;

    use qwatch_core::local_store::{load_servers, FileLocalStore};
    use tempfile::TempDir;

    use super::{run_app, Args};

    fn store(dir: &Path) -> FileLocalStore {
        FileLocalStore::load_from_path(dir.join("local.toml")).expect("failed to load store")
    }

    fn args_with_config(dir: &Path) -> Args {
        let config = dir.join("config.toml");
        fs::write(
            &config,
            "base_url = \"http://proxy:9000/ui\"\npoll_interval_secs = 3\n",
        )
        .expect("write config");
        Args {
            config: Some(config),
            ..Args::default()
        }
    }

    #[test]
    fn run_app_passes_config_to_tui_runner() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let args = args_with_config(temp_dir.path());

        let mut seen = None;
        let result = run_app(&args, store(temp_dir.path()), |options| {
            seen = Some((
                options.gateway.base_url().to_string(),
                options.reload_period,
                options.servers,
            ));
            Ok(())
        });

        assert!(result.is_ok());
        let (base_url, period, servers) = seen.expect("runner should be called");
        assert_eq!(base_url, "http://proxy:9000/ui/");
        assert_eq!(period, Duration::from_secs(3));
        assert_eq!(servers, "");
    }

    #[test]
    fn cli_overrides_base_url_and_persists_servers() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let args = Args {
            base_url: Some("http://other:8080/logger/".to_string()),
            servers: Some("app01:8080,app02:8080".to_string()),
            ..args_with_config(temp_dir.path())
        };

        let mut seen = None;
        run_app(&args, store(temp_dir.path()), |options| {
            seen = Some((options.gateway.base_url().to_string(), options.servers));
            Ok(())
        })
        .expect("run should succeed");

        let (base_url, servers) = seen.expect("runner should be called");
        assert_eq!(base_url, "http://other:8080/logger/");
        assert_eq!(servers, "app01:8080,app02:8080");
        assert_eq!(load_servers(&store(temp_dir.path())), "app01:8080,app02:8080");
    }

    #[test]
    fn run_app_propagates_tui_errors() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let args = args_with_config(temp_dir.path());

        let result = run_app(&args, store(temp_dir.path()), |_| {
            Err(qwatch_tui::TuiError::Io(io::Error::other("boom")))
        });
        assert!(result.is_err());
    }

    #[test]
    fn invalid_base_url_fails_before_tui_starts() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let args = Args {
            base_url: Some("not a url".to_string()),
            ..args_with_config(temp_dir.path())
        };

        let mut called = false;
        let result = run_app(&args, store(temp_dir.path()), |_| {
            called = true;
            Ok(())
        });
        assert!(result.is_err());
        assert!(!called);
    }
}
