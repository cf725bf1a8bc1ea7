#![allow(clippy::expect_used)]
mod cat;
mod schema;

use std::path::PathBuf;

use cat::exec_cat;
use clap::Parser;
use log::LevelFilter;
use schema::exec_schema;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

#[derive(clap::Parser)]
struct Cli {
    /// Log to stderr. Repeat for more detail.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Print the resolved shape, schema and column locations of a document.
    Schema {
        file: PathBuf,
        /// Infer column types from at most this many rows.
        #[clap(long)]
        inference_row_limit: Option<u64>,
    },
    /// Print the rows of a document as tables, one per batch.
    Cat {
        file: PathBuf,
        #[clap(long, default_value_t = jsontab::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Stop after this many rows.
        #[clap(long)]
        limit: Option<usize>,
        /// Reader options as JSON, applied after the other flags.
        #[clap(long)]
        options: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let filter = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        filter,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .ok();

    match cli.command {
        Commands::Schema {
            file,
            inference_row_limit,
        } => exec_schema(file, inference_row_limit).expect("exec_schema"),
        Commands::Cat {
            file,
            batch_size,
            limit,
            options,
        } => exec_cat(file, batch_size, limit, options.as_deref()).expect("exec_cat"),
    }
}
