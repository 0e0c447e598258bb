//! hashkv-admin - inspect hash containers and the binlog of a data directory
//!
//! All subcommands are read-only.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use hashkv_admin::config::Config;
use hashkv_storage::HashEngine;

/// hashkv admin tool
#[derive(Parser, Debug)]
#[command(name = "hashkv-admin")]
#[command(about = "Inspect hashkv hash containers and binlog")]
struct Args {
    /// Configuration file path (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data storage directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the number of fields of a hash
    Hsize { name: String },
    /// Print every field and value of a hash
    Hgetall { name: String },
    /// Print one page of matching fields
    Hscan {
        name: String,
        /// Numeric cursor, "0" to start
        #[arg(long, default_value = "0")]
        cursor: String,
        /// Glob pattern over field names
        #[arg(long, default_value = "*")]
        pattern: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Print binlog records after a sequence
    Binlog {
        #[arg(long, default_value = "0")]
        after: u64,
        #[arg(long, default_value = "100")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration from file if specified, otherwise use defaults
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)
            .with_context(|| format!("loading configuration from {:?}", config_path))?,
        None => Config::default(),
    };

    // Override config with command line arguments
    if let Some(data_dir) = &args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log.max_level())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Data directory: {:?}", config.storage.data_dir);
    let engine = HashEngine::open(&config.storage).context("opening storage")?;

    match args.command {
        Command::Hsize { name } => {
            println!("{}", engine.hsize(name.as_bytes())?);
        }
        Command::Hgetall { name } => {
            for (field, value) in engine.hgetall(name.as_bytes())? {
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(&field),
                    String::from_utf8_lossy(&value)
                );
            }
        }
        Command::Hscan {
            name,
            cursor,
            pattern,
            limit,
        } => {
            let page = engine.hscan(
                name.as_bytes(),
                cursor.as_bytes(),
                pattern.as_bytes(),
                limit,
            )?;
            for (field, value) in &page.pairs {
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(field),
                    String::from_utf8_lossy(value)
                );
            }
            match page.cursor {
                Some(cursor) => println!("next: {}", String::from_utf8_lossy(&cursor)),
                None => println!("next: (end)"),
            }
        }
        Command::Binlog { after, limit } => {
            for record in engine.binlog().records_after(after, limit)? {
                println!(
                    "{}\t{:?}\t{:?}\t{}\t{}",
                    record.seq,
                    record.kind,
                    record.command,
                    String::from_utf8_lossy(&record.key),
                    String::from_utf8_lossy(&record.value)
                );
            }
            info!("Last binlog sequence: {}", engine.binlog().last_seq());
        }
    }

    Ok(())
}
