// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! cask — embedded Bitcask-style key-value store
//!
//! Usage:
//!   cask set      <key> <value> [--config config.toml] [--dir ./caskdb-data]
//!   cask get      <key>
//!   cask remove   <key>
//!   cask take     <key>
//!   cask contains <key>
//!   cask status
//!
//! The CLI opens the store, performs one verb, and exits. It is a thin
//! front-end; all storage semantics live in the library.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use caskdb::config::Config;
use caskdb::error::CaskError;
use caskdb::kernel::Kernel;
use caskdb::storage::segment::SEGMENT_EXT;
use caskdb::store::Cask;

#[derive(Parser)]
#[command(name = "cask", about = "Embedded Bitcask-style key-value store", version)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Store directory, overriding the configured one.
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert or overwrite a key.
    Set { key: String, value: String },
    /// Print the value stored under a key.
    Get { key: String },
    /// Delete a key. Prints whether anything was deleted.
    Remove { key: String },
    /// Delete a key and print the value it held.
    Take { key: String },
    /// Check whether a key is present.
    Contains { key: String },
    /// Print a brief status snapshot and exit.
    Status,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => match Config::from_file(&path) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "Failed to load config");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    let max_file_size = config.storage.max_file_size;

    let open = match cli.dir {
        Some(dir) => Cask::open_at(config, dir),
        None => Cask::open(config),
    };
    let mut store = match open {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to open store");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Set { key, value } => {
            if let Err(e) = store.set(key.as_bytes(), value.as_bytes()) {
                fail(&e);
            }
        }
        Command::Get { key } => match store.get(key.as_bytes()) {
            Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
            Err(e) => fail(&e),
        },
        Command::Remove { key } => match store.remove(key.as_bytes()) {
            Ok(true) => println!("removed '{key}'"),
            Ok(false) => println!("'{key}' was not present"),
            Err(e) => fail(&e),
        },
        Command::Take { key } => match store.remove_with_get(key.as_bytes()) {
            Ok(Some(value)) => println!("{}", String::from_utf8_lossy(&value)),
            Ok(None) => println!("'{key}' was not present"),
            Err(e) => fail(&e),
        },
        Command::Contains { key } => match store.contains(key.as_bytes()) {
            Ok(present) => println!("{present}"),
            Err(e) => fail(&e),
        },
        Command::Status => {
            let stats = store.stats();
            println!("=== cask status ===");
            println!("Live keys  : {}", stats.live_keys);
            println!("Segments   : {}", stats.segments);
            println!(
                "Active seg : {}.{}  ({:.1}% of {} bytes)",
                stats.current_gen,
                SEGMENT_EXT,
                (stats.write_pos as f64 / max_file_size as f64) * 100.0,
                max_file_size,
            );
        }
    }
}

fn fail(e: &CaskError) -> ! {
    eprintln!("Error: {e}");
    std::process::exit(1)
}
