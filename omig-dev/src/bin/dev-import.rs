use std::{sync::Arc, time::Duration};

use clap::Parser;
use envconfig::Envconfig;
use omig_dest::{DestinationConfig, DestinationRef, MemoryTransport};
use omig_dev::{copy_to_destination, init_log, seed_records};
use omig_migrator::{HookRegistry, Migrator, MigratorConfig};
use omig_store::{LogJobStatus, MemoryHostStore};
use tokio::signal;
use tracing::{info, warn};

/// Seed an in-memory host store and run the import sweep against a
/// destination.
#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct DevImportArgs {
    /// Class of the seeded records
    #[arg(long, default_value = "Score")]
    class: String,
    /// Number of records to seed before the first pass
    #[arg(long, default_value_t = 100)]
    records: usize,
    /// Re-run the sweep at this interval until Ctrl-C
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_log();
    let args = DevImportArgs::parse();
    let config = MigratorConfig::init_from_env()?;
    let dest_config = DestinationConfig::init_from_env()?;

    let dest = match &dest_config.url {
        Some(url) => {
            info!("migrating to {}", url);
            dest_config.connect()?
        }
        None => {
            warn!("OMIG_DEST_URL is not set; migrating to memory");
            DestinationRef::new(
                "http://localhost/dev",
                None,
                Arc::new(MemoryTransport::new()),
            )
        }
    };

    let store = MemoryHostStore::new();
    seed_records(&store, &args.class, args.records).await;
    let mut registry = HookRegistry::new();
    copy_to_destination(&mut registry, &args.class, dest)?;
    let migrator = Migrator::new(registry, Arc::new(store.clone()), config);
    migrator.export_triggers(&store);

    let job_name = migrator.config().job_name.clone();
    let status = Arc::new(LogJobStatus::new(job_name.clone()));
    let Some(interval_secs) = args.interval_secs else {
        store.run_job(&job_name, status).await?;
        return Ok(());
    };

    let period = Duration::from_secs(interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                store.run_job(&job_name, status.clone()).await?;
            }
            result = signal::ctrl_c() => {
                if let Err(err) = result {
                    eprintln!("Unable to listen for shutdown signal: {}", err);
                }
                break;
            }
        }
    }
    info!("stopped after Ctrl-C");
    Ok(())
}
