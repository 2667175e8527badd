mod api;
mod cli;
mod router;
mod state;
mod watchdog;
mod ws;

use std::future::IntoFuture;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hypergrid_core::{codec, Block};
use hypergrid_scheduler::{Scheduler, SchedulerError};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cli::Cli;
use crate::state::AppState;

/// Wait for the partition task, then for the merged product.
async fn finished_product(
    scheduler: Arc<Scheduler>,
    partition: JoinHandle<Result<usize, SchedulerError>>,
) -> anyhow::Result<Arc<Block>> {
    let jobs = partition.await.context("partition task panicked")??;
    info!(jobs, "all jobs queued; waiting for workers");
    scheduler
        .wait_for_product()
        .await
        .context("product channel closed before the merge")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let (a, b) = codec::read_matrices(&cli.input)
        .with_context(|| format!("failed to read input {}", cli.input.display()))?;
    info!(path = %cli.input.display(), side = a.side(), "loaded operands");

    let scheduler = Arc::new(Scheduler::new(cli.scheduler_config(), a.side())?);

    let listener = TcpListener::bind(&cli.addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.addr))?;
    info!(addr = %listener.local_addr()?, "listening for workers");

    let partition = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run_partition(a, b).await })
    };
    tokio::spawn(watchdog::run(
        Arc::clone(&scheduler),
        cli.stall_check_interval(),
        cli.lease_warn_after(),
    ));

    let app = router::build_router(Arc::new(AppState::new(Arc::clone(&scheduler))));

    let product = tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            served?;
            anyhow::bail!("server stopped before the product was ready");
        }
        product = finished_product(Arc::clone(&scheduler), partition) => product?,
    };

    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{product}")?;
    stdout.flush()?;
    info!("product written; exiting");
    Ok(())
}
