use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hypergrid_scheduler::SchedulerConfig;

/// Distributed Strassen multiplication: hands leaf blocks to WebSocket
/// workers and prints the merged product.
#[derive(Parser, Debug)]
#[command(name = "hypergrid-server", version, about)]
pub struct Cli {
    /// Listen address for worker connections.
    #[arg(long, env = "HYPERGRID_ADDR", default_value = "localhost:8080")]
    pub addr: String,

    /// Input file: side N, then N² values of A, then N² values of B.
    #[arg(long, env = "HYPERGRID_INPUT", default_value = "64.in")]
    pub input: PathBuf,

    /// Side length of the blocks sent to workers.
    #[arg(long, env = "HYPERGRID_BLOCK_SIZE", default_value_t = 64)]
    pub block_size: usize,

    /// Maximum number of pending jobs.
    #[arg(long, env = "HYPERGRID_QUEUE_CAPACITY", default_value_t = 512)]
    pub queue_capacity: usize,

    /// Requeue a worker's job when its connection fails instead of dropping it.
    #[arg(long, env = "HYPERGRID_REQUEUE")]
    pub requeue_on_disconnect: bool,

    /// Seconds between stuck-job checks.
    #[arg(
        long,
        env = "HYPERGRID_STALL_CHECK_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub stall_check_secs: u64,

    /// Warn about leases older than this many seconds.
    #[arg(long, env = "HYPERGRID_LEASE_WARN_SECS", default_value_t = 120)]
    pub lease_warn_secs: u32,
}

impl Cli {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            block_size: self.block_size,
            queue_capacity: self.queue_capacity,
            requeue_on_disconnect: self.requeue_on_disconnect,
        }
    }

    pub fn stall_check_interval(&self) -> Duration {
        Duration::from_secs(self.stall_check_secs)
    }

    pub fn lease_warn_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.lease_warn_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let cli = Cli::try_parse_from(["hypergrid-server"]).unwrap();
        assert_eq!(cli.addr, "localhost:8080");
        assert_eq!(cli.input, PathBuf::from("64.in"));
        let config = cli.scheduler_config();
        assert_eq!(config.block_size, 64);
        assert_eq!(config.queue_capacity, 512);
        assert!(!config.requeue_on_disconnect);
        assert_eq!(cli.stall_check_interval(), Duration::from_secs(30));
        assert_eq!(cli.lease_warn_after(), chrono::Duration::seconds(120));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "hypergrid-server",
            "--block-size",
            "8",
            "--queue-capacity",
            "16",
            "--requeue-on-disconnect",
            "--input",
            "small.in",
        ])
        .unwrap();
        let config = cli.scheduler_config();
        assert_eq!(config.block_size, 8);
        assert_eq!(config.queue_capacity, 16);
        assert!(config.requeue_on_disconnect);
        assert_eq!(cli.input, PathBuf::from("small.in"));
    }

    #[test]
    fn zero_stall_interval_is_rejected() {
        assert!(Cli::try_parse_from(["hypergrid-server", "--stall-check-secs", "0"]).is_err());
    }
}
