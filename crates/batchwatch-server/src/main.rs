use anyhow::Result;
use batchwatch_server::app;
use batchwatch_server::config::ServerConfig;
use tokio::signal;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config/batchwatch.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  batchwatch [config.toml]                  Evaluate the configured event log (default: {DEFAULT_CONFIG})");
    eprintln!("  batchwatch check-config <config.toml>     Validate a configuration file and exit");
    eprintln!("  batchwatch --help                         Show this message");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("batchwatch=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("check-config") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("check-config requires a <config.toml> argument")
            })?;
            run_check_config(config_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args.get(1).map(|s| s.as_str()).unwrap_or(DEFAULT_CONFIG);
            run_monitor(config_path).await
        }
    }
}

fn load_config(path: &str) -> Result<ServerConfig> {
    if std::path::Path::new(path).exists() {
        ServerConfig::load(path)
    } else if path == DEFAULT_CONFIG {
        tracing::info!(path, "No config file found, using built-in defaults");
        Ok(ServerConfig::default())
    } else {
        anyhow::bail!("Config file '{}' does not exist", path)
    }
}

fn run_check_config(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    config.validate()?;
    for rule in &config.rules {
        tracing::info!(name = %rule.name, kind = %rule.kind(), "Rule ok");
    }
    for sink in &config.sinks {
        tracing::info!(sink = %sink.sink_type, "Sink ok");
    }
    tracing::info!(
        path = config_path,
        window_secs = config.window_secs,
        feed = %config.feed.path,
        follow = config.feed.follow,
        "Configuration is valid"
    );
    Ok(())
}

async fn run_monitor(config_path: &str) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let summary = app::run(&config, shutdown).await?;

    if summary.alerts == 0 {
        tracing::info!("No alerts raised");
    }
    Ok(())
}
