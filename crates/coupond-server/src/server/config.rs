use std::time::Duration;

use anyhow::bail;
use clap::Parser;

/// Runtime configuration for the `coupond-server` binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults suitable for a single-node deployment. The batch and period
/// knobs tune the issuance core; everything else is connectivity.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "coupond-server",
    version,
    about = "A gRPC service issuing time-scheduled, quantity-limited coupons"
)]
pub struct CliArgs {
    /// Postgres connection string for the durable store.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Redis connection string for the counter store.
    ///
    /// Environment variable: `REDIS_URL`
    #[arg(long, env = "REDIS_URL", default_value_t = String::from("redis://127.0.0.1:6379/"))]
    pub redis_url: String,

    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Maximum number of pooled Postgres connections.
    ///
    /// Environment variable: `DB_MAX_CONNECTIONS`
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 16)]
    pub db_max_connections: u32,

    /// Number of candidate codes reserved per pool refill.
    ///
    /// Environment variable: `CODE_BATCH_SIZE`
    #[arg(long, env = "CODE_BATCH_SIZE", default_value_t = 1000)]
    pub code_batch_size: usize,

    /// Pool size at or below which a refill is triggered. Defaults to a
    /// quarter of the batch size.
    ///
    /// Environment variable: `REFILL_THRESHOLD`
    #[arg(long, env = "REFILL_THRESHOLD")]
    pub refill_threshold: Option<usize>,

    /// Period of the batched issuance writer, in milliseconds.
    ///
    /// Environment variable: `WRITER_PERIOD_MS`
    #[arg(long, env = "WRITER_PERIOD_MS", default_value_t = 1000)]
    pub writer_period_ms: u64,

    /// Period of the activation scheduler, in milliseconds.
    ///
    /// Environment variable: `SCHEDULER_PERIOD_MS`
    #[arg(long, env = "SCHEDULER_PERIOD_MS", default_value_t = 1000)]
    pub scheduler_period_ms: u64,

    /// Seconds to wait for background tasks during graceful shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub redis_url: String,
    pub server_addr: String,
    pub db_max_connections: u32,
    pub code_batch_size: usize,
    pub refill_threshold: usize,
    pub writer_period: Duration,
    pub scheduler_period: Duration,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.code_batch_size == 0 {
            bail!("CODE_BATCH_SIZE must be greater than 0");
        }

        let refill_threshold = args
            .refill_threshold
            .unwrap_or(args.code_batch_size / 4);

        if refill_threshold >= args.code_batch_size {
            bail!(
                "REFILL_THRESHOLD ({}) must be smaller than CODE_BATCH_SIZE ({})",
                refill_threshold,
                args.code_batch_size
            );
        }

        if args.writer_period_ms == 0 {
            bail!("WRITER_PERIOD_MS must be greater than 0");
        }

        if args.scheduler_period_ms == 0 {
            bail!("SCHEDULER_PERIOD_MS must be greater than 0");
        }

        if args.db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be greater than 0");
        }

        Ok(Self {
            database_url: args.database_url,
            redis_url: args.redis_url,
            server_addr: args.server_addr,
            db_max_connections: args.db_max_connections,
            code_batch_size: args.code_batch_size,
            refill_threshold,
            writer_period: Duration::from_millis(args.writer_period_ms),
            scheduler_period: Duration::from_millis(args.scheduler_period_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}
