// # tailflared - one-shot Tailscale to DNS sync
//
// Thin integration layer: reads the environment and the alias file, sets up
// logging and the runtime, wires the registered store and directory into a
// `SyncOrchestrator`, runs one pass and exits. No reconciliation logic lives
// here.
//
// ## Configuration
//
// ### Files
// - `TAILFLARE_CONFIG`: Path of the YAML alias file (default `config.yaml`)
//
// ### Record store
// - `TAILFLARE_STORE`: `cloudflare` (default) or `memory`
// - `TAILFLARE_MODE`: `live` (default) or `dry-run`
// - `CLOUDFLARE_API_TOKEN`: API token with Zone:Read and DNS:Edit
//
// ### Directory
// - `TAILSCALE_TAILNET`: Tailnet name (default `-`)
// - `TAILSCALE_OAUTH_CLIENT_ID`: OAuth client id
// - `TAILSCALE_OAUTH_CLIENT_SECRET`: OAuth client secret
//
// ### Logging
// - `TAILFLARE_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=...
// export TAILSCALE_OAUTH_CLIENT_ID=...
// export TAILSCALE_OAUTH_CLIENT_SECRET=...
// TAILFLARE_MODE=dry-run tailflared
// ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tailflare_core::{DirectoryConfig, ProviderRegistry, StoreConfig, SyncConfig, SyncOrchestrator};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes of a single pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailflareExitCode {
    /// Every alias reconciled
    Success = 0,
    /// Configuration error, no remote call was made
    ConfigError = 1,
    /// The run failed
    RunFailed = 2,
}

impl From<TailflareExitCode> for ExitCode {
    fn from(code: TailflareExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreKind {
    Cloudflare,
    Memory,
}

/// Process settings taken from the environment
struct Settings {
    config_path: PathBuf,
    store: StoreKind,
    dry_run: bool,
    log_level: Level,
    cloudflare_token: Option<String>,
    tailnet: String,
    oauth_client_id: Option<String>,
    oauth_client_secret: Option<String>,
}

// Custom Debug implementation that hides credentials
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("config_path", &self.config_path)
            .field("store", &self.store)
            .field("dry_run", &self.dry_run)
            .field("log_level", &self.log_level)
            .field("cloudflare_token", &self.cloudflare_token.as_ref().map(|_| "<REDACTED>"))
            .field("tailnet", &self.tailnet)
            .field("oauth_client_id", &self.oauth_client_id)
            .field(
                "oauth_client_secret",
                &self.oauth_client_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl Settings {
    /// Read settings through `lookup`, normally `std::env::var`
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let store = match var("TAILFLARE_STORE").as_deref() {
            None | Some("cloudflare") => StoreKind::Cloudflare,
            Some("memory") => StoreKind::Memory,
            Some(other) => anyhow::bail!(
                "TAILFLARE_STORE '{}' is not supported. Supported stores: cloudflare, memory",
                other
            ),
        };

        let dry_run = match var("TAILFLARE_MODE").as_deref() {
            None | Some("live") => false,
            Some("dry-run") => true,
            Some(other) => anyhow::bail!(
                "TAILFLARE_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        let log_level = match var("TAILFLARE_LOG_LEVEL")
            .map(|level| level.to_lowercase())
            .as_deref()
        {
            Some("trace") => Level::TRACE,
            Some("debug") => Level::DEBUG,
            None | Some("info") => Level::INFO,
            Some("warn") => Level::WARN,
            Some("error") => Level::ERROR,
            Some(other) => anyhow::bail!(
                "TAILFLARE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        };

        let settings = Self {
            config_path: var("TAILFLARE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.yaml")),
            store,
            dry_run,
            log_level,
            cloudflare_token: var("CLOUDFLARE_API_TOKEN"),
            tailnet: var("TAILSCALE_TAILNET").unwrap_or_else(|| "-".to_string()),
            oauth_client_id: var("TAILSCALE_OAUTH_CLIENT_ID"),
            oauth_client_secret: var("TAILSCALE_OAUTH_CLIENT_SECRET"),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.store == StoreKind::Cloudflare && self.cloudflare_token.is_none() {
            anyhow::bail!(
                "CLOUDFLARE_API_TOKEN is required when TAILFLARE_STORE=cloudflare. \
                Set it via: export CLOUDFLARE_API_TOKEN=your_token"
            );
        }

        if self.oauth_client_id.is_none() || self.oauth_client_secret.is_none() {
            anyhow::bail!(
                "TAILSCALE_OAUTH_CLIENT_ID and TAILSCALE_OAUTH_CLIENT_SECRET are required"
            );
        }

        Ok(())
    }

    fn store_config(&self, sync: &SyncConfig) -> StoreConfig {
        match self.store {
            StoreKind::Cloudflare => StoreConfig::Cloudflare {
                api_token: self.cloudflare_token.clone().unwrap_or_default(),
                dry_run: self.dry_run,
            },
            StoreKind::Memory => StoreConfig::Memory {
                zones: vec![sync.zone.clone()],
            },
        }
    }

    fn directory_config(&self) -> DirectoryConfig {
        DirectoryConfig::Tailscale {
            tailnet: self.tailnet.clone(),
            client_id: self.oauth_client_id.clone().unwrap_or_default(),
            client_secret: self.oauth_client_secret.clone().unwrap_or_default(),
        }
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_lookup(|key| std::env::var(key).ok()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return TailflareExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TailflareExitCode::ConfigError.into();
    }

    let sync = match load_sync_config(&settings) {
        Ok(sync) => sync,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return TailflareExitCode::ConfigError.into();
        }
    };

    info!(
        "Starting tailflared: zone {}, {} alias(es), store {:?}{}",
        sync.zone,
        sync.aliases.len(),
        settings.store,
        if settings.dry_run { " (dry-run)" } else { "" }
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TailflareExitCode::RunFailed.into();
        }
    };

    rt.block_on(run_once(settings, sync)).into()
}

fn load_sync_config(settings: &Settings) -> Result<SyncConfig> {
    let sync = SyncConfig::load(&settings.config_path)
        .with_context(|| format!("loading {}", settings.config_path.display()))?;
    sync.validate()?;
    Ok(sync)
}

fn registry() -> ProviderRegistry {
    let registry = ProviderRegistry::with_builtins();

    #[cfg(feature = "cloudflare")]
    tailflare_provider_cloudflare::register(&registry);

    #[cfg(feature = "tailscale")]
    tailflare_directory_tailscale::register(&registry);

    debug!(
        "Registered stores {:?}, directories {:?}",
        registry.list_stores(),
        registry.list_directories()
    );
    registry
}

/// Wire the collaborators and run one pass
async fn run_once(settings: Settings, sync: SyncConfig) -> TailflareExitCode {
    let registry = registry();

    let wired = registry
        .create_store(&settings.store_config(&sync))
        .and_then(|store| {
            let directory = registry.create_directory(&settings.directory_config())?;
            SyncOrchestrator::new(directory, store, sync)
        });

    let (orchestrator, mut events) = match wired {
        Ok(wired) => wired,
        Err(e) => {
            error!("Configuration error: {}", e);
            return TailflareExitCode::ConfigError;
        }
    };

    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Event: {:?}", event);
        }
    });

    let cancel = CancellationToken::new();
    let report = {
        let run = orchestrator.run(&cancel);
        tokio::pin!(run);

        tokio::select! {
            report = &mut run => report,
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling in-flight calls");
                cancel.cancel();
                run.await
            }
        }
    };

    // closes the event channel
    drop(orchestrator);
    let _ = drain.await;

    info!("Run finished in {}ms", report.duration().num_milliseconds());

    match report.into_result() {
        Ok(_) => TailflareExitCode::Success,
        Err(e) => {
            error!("Run failed:\n{}", e);
            TailflareExitCode::RunFailed
        }
    }
}
