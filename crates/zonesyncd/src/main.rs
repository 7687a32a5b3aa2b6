// # zonesyncd - zonesync Daemon
//
// Thin integration layer over zonesync-core:
//
// 1. Read configuration (a JSON document, located via environment)
// 2. Initialize tracing and the runtime
// 3. Register providers and sources
// 4. Build the source chain, the ownership registry and the controller
// 5. Run the reconcile loop until SIGTERM/SIGINT
//
// All reconciliation logic lives in zonesync-core; nothing here decides
// what to change.
//
// ## Configuration
//
// - `ZONESYNC_CONFIG`: path to the JSON configuration file (required)
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `ZONESYNC_HEALTH_PORT`: port for the /healthz endpoint (unset = off)
// - `ZONESYNC_ONCE`: "true" runs a single reconcile and exits
//
// ## Example
//
// ```bash
// export ZONESYNC_CONFIG=/etc/zonesync/config.json
// export ZONESYNC_LOG_LEVEL=debug
// export ZONESYNC_HEALTH_PORT=8080
//
// zonesyncd
// ```

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::config::RegistryConfig;
use zonesync_core::registry::txt::AffixNameMapper;
use zonesync_core::source::{DedupSource, MultiSource};
use zonesync_core::traits::{Provider, Source};
use zonesync_core::{
    Controller, NoopRegistry, PluginRegistry, Registry, TxtRegistry, ZonesyncConfig,
};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit codes following systemd conventions:
/// - 0: clean shutdown
/// - 1: configuration or startup error
/// - 2: runtime error
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Environment-level settings; everything else lives in the config file.
struct Settings {
    config_path: String,
    log_level: String,
    health_port: Option<u16>,
    once: bool,
}

impl Settings {
    fn from_env() -> Result<Self> {
        let config_path = env::var("ZONESYNC_CONFIG")
            .context("ZONESYNC_CONFIG is required; point it at the JSON configuration file")?;

        let health_port = match env::var("ZONESYNC_HEALTH_PORT") {
            Ok(raw) => Some(
                raw.parse::<u16>()
                    .with_context(|| format!("ZONESYNC_HEALTH_PORT is not a port: {}", raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            config_path,
            log_level: env::var("ZONESYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            health_port,
            once: env::var("ZONESYNC_ONCE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    fn tracing_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            ),
        }
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let level = match settings.tracing_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let config = match load_config(&settings.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    info!("starting zonesyncd");

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        if let Err(e) = run_daemon(settings, config).await {
            error!("daemon error: {:#}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    })
    .into()
}

/// Load and validate the configuration file.
fn load_config(path: &str) -> Result<ZonesyncConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path))?;
    let config: ZonesyncConfig =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path))?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Run the daemon
async fn run_daemon(settings: Settings, config: ZonesyncConfig) -> Result<()> {
    // Register built-in providers and sources.
    let plugins = PluginRegistry::new();
    plugins.register_source("static", Box::new(zonesync_core::plugins::StaticSourceFactory));
    zonesync_provider_inmemory::register(&plugins);
    zonesync_provider_cloudflare::register(&plugins);

    info!(provider = config.provider.type_name(), "creating provider");
    let provider = plugins.create_provider(&config.provider)?;

    let mut sources: Vec<Box<dyn Source>> = Vec::new();
    for source_config in &config.sources {
        info!(source = source_config.type_name(), "creating source");
        sources.push(plugins.create_source(source_config)?);
    }
    let source: Box<dyn Source> =
        Box::new(DedupSource::new(Box::new(MultiSource::new(sources))));

    let registry = build_registry(&config.registry, provider)?;

    let (mut controller, mut event_rx) =
        Controller::new(source, registry, &config.controller)?;

    // Drain controller events into the log.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "controller event");
        }
    });

    if let Some(port) = settings.health_port {
        tokio::spawn(serve_healthz(port));
    }

    if settings.once || config.controller.once {
        info!("running a single reconcile");
        controller.run_once().await?;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("received {}, terminating", signal),
            Err(e) => error!("shutdown handler error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    controller.run_with_shutdown(Some(shutdown_rx)).await?;
    info!("zonesyncd stopped");
    Ok(())
}

/// Build the configured ownership registry around the provider.
fn build_registry(
    config: &RegistryConfig,
    provider: Box<dyn Provider>,
) -> Result<Box<dyn Registry>> {
    match config {
        RegistryConfig::Txt {
            owner_id,
            txt_prefix,
            txt_suffix,
        } => {
            let mapper = match (txt_prefix, txt_suffix) {
                (_, Some(suffix)) => AffixNameMapper::Suffix(suffix.clone()),
                (Some(prefix), None) => AffixNameMapper::Prefix(prefix.clone()),
                (None, None) => AffixNameMapper::default(),
            };
            info!(owner_id = %owner_id, "using TXT ownership registry");
            Ok(Box::new(TxtRegistry::with_mapper(
                provider,
                owner_id.clone(),
                mapper,
            )?))
        }
        RegistryConfig::Noop => {
            info!("ownership disabled, using noop registry");
            Ok(Box::new(NoopRegistry::new(provider)))
        }
    }
}

/// Serve a minimal `GET /healthz` endpoint.
async fn serve_healthz(port: u16) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind health endpoint on port {}: {}", port, e);
            return;
        }
    };
    info!(port, "health endpoint listening");

    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            continue;
        };
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK")
                .await;
        });
    }
}

/// Wait for SIGTERM or SIGINT.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to set up SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Fallback for non-Unix platforms: SIGINT only.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
