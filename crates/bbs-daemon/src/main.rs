#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use bbs_core::JobsConfig;
use bbs_daemon::{connection, Cadence, JobWorker, OrchestratorManager};
use bbs_http::OrchestratorHandle;
use bbs_runner::{Orchestrator, PodmanEngine, PolicyOptions};
use bbs_store::{FileBackend, Store};
use bbs_transport::{DirectoryBouncer, DirectoryRole, DirectoryTransport};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bbs-daemon", version, about = "Packet-radio bulletin board server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the HTTP façade's bind address.
    #[arg(long)]
    http_bind: Option<String>,

    /// Enable verbose diagnostic output.
    #[arg(long)]
    debug: bool,
}

const BOUNCER_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = bbs_config::load_config(args.config.as_deref()).context("loading configuration")?;
    if args.debug {
        config.debug = true;
    }
    if let Some(bind) = args.http_bind.clone() {
        config.http_bind = Some(bind);
    }

    let filter = if config.debug {
        EnvFilter::new("bbs=debug,bbs_daemon=debug,tower_http=debug")
    } else {
        EnvFilter::new(config.log_level.clone().unwrap_or_else(|| "info".to_string()))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in bbs_config::validate_config(&config).context("validating configuration")? {
        tracing::warn!(%warning, "configuration warning");
    }

    let store_path = match (&config.store_path, &config.zeo_address_file) {
        (Some(path), _) => path.clone(),
        (None, Some(_)) => bail!(
            "client-server store mode (zeo_address_file only) is configured, but the ZEO backend does not \
             implement networking in this build; set store_path to run with the embedded file backend"
        ),
        (None, None) => bail!("configuration must set store_path"),
    };

    let store = Arc::new(Store::new(FileBackend::new(store_path)));
    store.open().context("opening store")?;

    if let Some(operator) = config.operator.clone() {
        store
            .transaction(|root| {
                root.config.operator = operator.clone();
                Ok(())
            })
            .context("seeding operator into store")?;
    }

    let jobs_config = store.snapshot().config.jobs_config.clone();
    let policy = build_policy(&jobs_config, &config);
    let orchestrator = Arc::new(Orchestrator::new(PodmanEngine::default(), policy));

    let cadence = Arc::new(Cadence::new());

    let worker = JobWorker::new(Arc::clone(&store), Arc::clone(&orchestrator), Arc::clone(&cadence));
    std::thread::spawn(move || worker.run());

    let manager = OrchestratorManager::new(Arc::clone(&orchestrator));
    std::thread::spawn(move || manager.run());

    if let Some(root) = config.directory_transport_root.clone() {
        let store_for_bouncer = Arc::clone(&store);
        let cadence_for_bouncer = Arc::clone(&cadence);
        std::thread::spawn(move || run_bouncer(root.into(), store_for_bouncer, cadence_for_bouncer));
    } else {
        tracing::warn!("directory_transport_root not configured; no radio connections will be accepted");
    }

    let http_bind = config.http_bind.clone().unwrap_or_else(|| "127.0.0.1:8080".to_string());
    let orchestrator_handle: Arc<dyn OrchestratorHandle> = orchestrator;
    let app = bbs_http::build_app_with_orchestrator(Arc::clone(&store), orchestrator_handle);
    let listener = tokio::net::TcpListener::bind(&http_bind)
        .await
        .with_context(|| format!("bind {http_bind}"))?;
    tracing::info!(bind = %http_bind, "bbs-daemon listening");

    axum::serve(listener, app).await.context("serve")
}

fn build_policy(jobs_config: &JobsConfig, config: &bbs_config::BbsConfig) -> PolicyOptions {
    let mut policy = PolicyOptions::from(jobs_config.clone());
    if let Some(image) = config.default_runner_image.clone() {
        policy.image_name = image;
    }
    policy.container_keepalive_secs = config.default_container_keepalive_secs;
    policy
}

/// Polls `root` for new connection directories at [`BOUNCER_POLL_INTERVAL`]
/// and spawns one thread per newly discovered rendezvous.
fn run_bouncer(root: PathBuf, store: Arc<Store>, cadence: Arc<Cadence>) {
    let mut bouncer = DirectoryBouncer::new(root.clone());
    loop {
        match bouncer.scan_once() {
            Ok(pairs) => {
                for (src, dst) in pairs {
                    let root = root.clone();
                    let store = Arc::clone(&store);
                    let cadence = Arc::clone(&cadence);
                    std::thread::spawn(move || match DirectoryTransport::open(&root, &src, &dst, DirectoryRole::Server) {
                        Ok(mut transport) => connection::serve_connection(&store, &cadence, &src, &mut transport),
                        Err(err) => tracing::warn!(%src, %dst, error = %err, "failed to open directory transport"),
                    });
                }
            }
            Err(err) => tracing::warn!(error = %err, "directory bouncer scan failed"),
        }
        std::thread::sleep(BOUNCER_POLL_INTERVAL);
    }
}
