//! Command-line interface for vault tasks.
//!
//! Provides commands for calling the configured task, inspecting its
//! effective policies, replaying execution records and showing the
//! resolved configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config;
use crate::core::RecordStore;
use crate::domain::{Address, Amount, Slippage};

pub mod deployment;

pub use deployment::Deployment;

/// vault-tasks - Authorization-gated task executor
#[derive(Parser, Debug)]
#[command(name = "vault-tasks")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Call the configured task
    Call {
        /// Token to join with (0x-prefixed address)
        #[arg(short, long)]
        token: Address,

        /// Amount in token base units
        #[arg(short, long)]
        amount: Amount,

        /// Slippage as a fraction (e.g. 0.01 for 1%)
        #[arg(short, long, default_value = "0")]
        slippage: Slippage,

        /// Caller identity (defaults to the configured operator)
        #[arg(long)]
        caller: Option<Address>,
    },

    /// Show the effective threshold and max slippage for a token
    Policy {
        /// Token address
        #[arg(short, long)]
        token: Address,
    },

    /// Replay execution records of a task
    Records {
        /// Task address (defaults to the configured task)
        #[arg(long)]
        task: Option<Address>,

        /// Maximum number of records to show (most recent first)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Call {
                token,
                amount,
                slippage,
                caller,
            } => call_task(token, amount, slippage, caller).await,
            Commands::Policy { token } => show_policy(token).await,
            Commands::Records { task, limit } => list_records(task, limit).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Call the configured task once
async fn call_task(
    token: Address,
    amount: Amount,
    slippage: Slippage,
    caller: Option<Address>,
) -> Result<()> {
    let cfg = config::config()?;
    let deployment = Deployment::from_config(cfg).await?;

    let caller = caller
        .or_else(|| cfg.task.as_ref().and_then(|t| t.operator))
        .context("No caller given (use --caller or set task.operator)")?;

    match deployment.task.call(caller, token, amount, slippage).await {
        Ok(record) => {
            println!("Executed");
            println!("  Record:    {}", record.id);
            println!("  Vault:     {}", deployment.task.vault_address());
            println!("  Connector: {}", record.connector);
            println!("  Selector:  {}", record.selector);
            println!("  Data:      {}", record.data);
            Ok(())
        }
        Err(e) => anyhow::bail!("{}: {}", e.code(), e),
    }
}

/// Show effective policies for a token
async fn show_policy(token: Address) -> Result<()> {
    let cfg = config::config()?;
    let section = cfg.task.as_ref().context("No task configured")?;
    let deployment = Deployment::wire(section, cfg)?;

    let threshold = deployment.task.threshold_for(token).await;
    let max_slippage = deployment.task.max_slippage_for(token).await;
    let snapshot = deployment.task.config().await;

    println!("Task:      {}", deployment.task.address());
    println!("Connector: {}", snapshot.connector);
    println!("Token:     {}", token);
    println!();
    println!(
        "Threshold:    min {} / max {}{}",
        threshold.min,
        if threshold.max == 0 {
            "unbounded".to_string()
        } else {
            threshold.max.to_string()
        },
        if snapshot.thresholds.custom.contains_key(&token) {
            " (custom)"
        } else {
            " (default)"
        }
    );
    println!(
        "Max slippage: {}{}",
        max_slippage,
        if snapshot.slippage.custom.contains_key(&token) {
            " (custom)"
        } else {
            " (default)"
        }
    );

    Ok(())
}

/// List recent execution records, or the tasks that have any
async fn list_records(task: Option<Address>, limit: usize) -> Result<()> {
    let cfg = config::config()?;

    let Some(task) = task.or_else(|| cfg.task.as_ref().map(|t| t.address)) else {
        let tasks = RecordStore::list_tasks(&cfg.tasks_dir()).await?;
        if tasks.is_empty() {
            println!("No task records found.");
        } else {
            println!("Tasks with records:");
            for task in tasks {
                println!("  {}", task);
            }
            println!();
            println!("Use --task <address> to replay one of them.");
        }
        return Ok(());
    };

    let store = RecordStore::open(task).await?;

    let records = store.replay().await?;
    if records.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<25}  {:<42}  {:>20}  {:>8}",
        "RECORD ID", "TIMESTAMP", "TOKEN", "AMOUNT", "SLIPPAGE"
    );
    println!("{}", "-".repeat(139));

    for record in records.iter().rev().take(limit) {
        println!(
            "{:<36}  {:<25}  {:<42}  {:>20}  {:>8}",
            record.id,
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            record.token,
            record.amount,
            record.slippage
        );
    }

    Ok(())
}

/// Show resolved configuration, re-read from disk
async fn show_config() -> Result<()> {
    let cfg = config::reload_config()?;

    println!("vault-tasks configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  Records: {}", cfg.tasks_dir().display());
    println!();

    match &cfg.task {
        Some(task) => {
            println!("Task:");
            println!("  Address:   {}", task.address);
            println!("  Vault:     {}", task.vault);
            println!("  Connector: {}", task.config.connector);
            if let Some(operator) = task.operator {
                println!("  Operator:  {}", operator);
            }
            println!(
                "  Default threshold:    min {} / max {}",
                task.config.thresholds.default.min, task.config.thresholds.default.max
            );
            println!("  Default max slippage: {}", task.config.slippage.default_max);
            println!(
                "  Overrides: {} threshold, {} slippage",
                task.config.thresholds.custom.len(),
                task.config.slippage.custom.len()
            );
        }
        None => println!("Task: (not configured)"),
    }

    println!();
    println!("Grants: {}", cfg.grants.len());
    for grant in &cfg.grants {
        println!("  {} -> {} : {} ({} params)", grant.who, grant.target, grant.what, grant.params.len());
    }

    Ok(())
}
