//! peerfind
//!
//! Watches the SRV records of a clustered service and reacts to membership
//! changes.
//!
//! # Usage
//!
//! ```bash
//! # Derive the domain from /etc/resolv.conf, namespace from POD_NAMESPACE
//! peerfind --service db
//!
//! # Explicit cluster suffix and a hook fed with the peer list on stdin
//! peerfind --service db --namespace prod --domain cluster.local \
//!     --on-change /opt/db/reconfigure.sh
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use peerfind::{
    DiscoveryConfig, DnsLookup, DomainResolver, FinderConfig, OnChangeHook, PeerFindError,
    PeerFinder, RESOLV_CONF,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Discover the peers of a clustered service from DNS SRV records
#[derive(Parser, Debug)]
#[command(name = "peerfind")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service name to query for SRV records
    #[arg(short, long, default_value = "")]
    service: String,

    /// Namespace of the service (falls back to POD_NAMESPACE)
    #[arg(short, long, default_value = "")]
    namespace: String,

    /// Cluster DNS suffix; derived from the resolver search list when absent
    #[arg(short, long)]
    domain: Option<String>,

    /// Milliseconds between two polls
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    poll_period_ms: u64,

    /// Resolver configuration to read search domains from
    #[arg(long, default_value = RESOLV_CONF)]
    resolv_conf: PathBuf,

    /// Shell command run on every change, peers on stdin one per line
    #[arg(long)]
    on_change: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "peerfind failed");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Configuration errors exit with 2, everything else with 1.
fn exit_status(err: &PeerFindError) -> u8 {
    if err.is_fatal() { 2 } else { 1 }
}

async fn run(args: Args) -> Result<(), PeerFindError> {
    let config = DiscoveryConfig::new(args.namespace, args.domain, args.service)?;
    let domains = DomainResolver::new().with_resolv_conf(args.resolv_conf);
    let lookup = DnsLookup::from_system_conf()?;

    let finder = PeerFinder::from_config(lookup, &config, &domains)?.with_config(
        FinderConfig::new().poll_period(Duration::from_millis(args.poll_period_ms)),
    );

    info!(
        service = finder.service(),
        domain = finder.domain().unwrap_or_default(),
        "Watching service peers"
    );

    let hook = args.on_change.map(OnChangeHook::new);
    let cancel = CancellationToken::new();
    let (handle, mut changes) = finder.spawn(cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping discovery...");
        shutdown.cancel();
    });

    while let Some(peers) = changes.recv().await {
        info!(count = peers.len(), peers = %peers, "Peers updated");

        if let Some(hook) = &hook {
            if let Err(e) = hook.run(&peers).await {
                warn!(command = hook.command(), error = %e, "On-change hook failed");
            }
        }
    }

    match handle.await {
        Ok(result) => result?,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => {}
    }

    info!("Peer finder exiting");
    Ok(())
}
