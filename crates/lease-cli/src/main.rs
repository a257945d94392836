//! `lease` CLI — grant, renew, revoke, and inspect leases against a running
//! Redis instance.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lease_core::{Lessor, Timestamp};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Command-line client for the `redis-lease` coordination engine.
#[derive(Parser)]
#[command(
    name = "lease",
    version,
    about = "redis-lease CLI — grant, renew, revoke, and inspect leases",
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         LEASE_REDIS_URL   Redis connection string (default: redis://127.0.0.1:6379)"
    )
)]
struct Cli {
    /// Redis connection string.
    #[arg(long, env = "LEASE_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or refresh a lease.
    Grant {
        workspace: String,
        lease_id: String,
        /// Time-to-live in seconds.
        #[arg(long, default_value_t = 30)]
        ttl: u64,
    },
    /// Refresh a lease's timestamp without changing its TTL.
    KeepAlive { workspace: String, lease_id: String },
    /// Unconditionally remove a lease.
    Revoke { workspace: String, lease_id: String },
    /// Fetch a lease's current attributes.
    Lease { workspace: String, lease_id: String },
    /// Print the time remaining until a lease expires.
    Ttl { workspace: String, lease_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let lessor = match Lessor::connect(&cli.redis_url).await {
        Ok(lessor) => lessor,
        Err(e) => {
            eprintln!("{RED}error:{RESET} failed to connect to {}: {e}", cli.redis_url);
            return ExitCode::FAILURE;
        }
    };

    match run(&lessor, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{RED}error:{RESET} {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(lessor: &Lessor, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Grant { workspace, lease_id, ttl } => cmd_grant(lessor, &workspace, &lease_id, ttl).await,
        Commands::KeepAlive { workspace, lease_id } => cmd_keep_alive(lessor, &workspace, &lease_id).await,
        Commands::Revoke { workspace, lease_id } => cmd_revoke(lessor, &workspace, &lease_id).await,
        Commands::Lease { workspace, lease_id } => cmd_lease(lessor, &workspace, &lease_id).await,
        Commands::Ttl { workspace, lease_id } => cmd_ttl(lessor, &workspace, &lease_id).await,
    }
}

async fn cmd_grant(lessor: &Lessor, workspace: &str, lease_id: &str, ttl_secs: u64) -> Result<()> {
    let accepted = lessor
        .grant(workspace, lease_id, Duration::from_secs(ttl_secs), Timestamp::now())
        .await
        .context("grant failed")?;

    if accepted {
        println!("{GREEN}granted{RESET} '{lease_id}' in '{workspace}' for {ttl_secs}s");
    } else {
        println!("{DIM}stale request ignored for '{lease_id}' in '{workspace}'{RESET}");
    }
    Ok(())
}

async fn cmd_keep_alive(lessor: &Lessor, workspace: &str, lease_id: &str) -> Result<()> {
    let expire_at = lessor.keep_alive(workspace, lease_id, Timestamp::now()).await.context("keep-alive failed")?;
    println!("{GREEN}renewed{RESET} '{lease_id}' in '{workspace}', expires at {expire_at}");
    Ok(())
}

async fn cmd_revoke(lessor: &Lessor, workspace: &str, lease_id: &str) -> Result<()> {
    let removed = lessor.revoke(workspace, lease_id).await.context("revoke failed")?;
    if removed {
        println!("{GREEN}revoked{RESET} '{lease_id}' in '{workspace}'");
    } else {
        println!("{DIM}'{lease_id}' was not present in '{workspace}'{RESET}");
    }
    Ok(())
}

async fn cmd_lease(lessor: &Lessor, workspace: &str, lease_id: &str) -> Result<()> {
    match lessor.lease(workspace, lease_id).await.context("lease lookup failed")? {
        Some(lease) => {
            println!("id:         {}", lease.id);
            println!("ttl:        {:?}", lease.ttl);
            match lease.expire_at {
                Some(expire_at) => println!("expire_at:  {expire_at}"),
                None => println!("expire_at:  {DIM}(unset){RESET}"),
            }
        }
        None => println!("{DIM}'{lease_id}' not found in '{workspace}'{RESET}"),
    }
    Ok(())
}

async fn cmd_ttl(lessor: &Lessor, workspace: &str, lease_id: &str) -> Result<()> {
    match lessor.time_to_live(workspace, lease_id).await.context("ttl lookup failed")? {
        Some(ttl) => println!("{} ms", ttl.num_milliseconds()),
        None => println!("{DIM}'{lease_id}' not found in '{workspace}'{RESET}"),
    }
    Ok(())
}
