//! # studyrec CLI
//!
//! The `studyrec` binary drives the recommender pipeline. It accepts one or
//! more action flags (case-insensitive) and executes them in pipeline order.
//! Unknown flags print an error and are skipped; the remaining flags still
//! run.
//!
//! ## Actions
//!
//! | Flag | Action |
//! |------|--------|
//! | `--displayHelp` | Print help text |
//! | `--computeRelationalDistance` | Fingerprint every token JSON in the input directory |
//! | `--updateDatabaseInformation` | Record every resource file in `file_info` |
//! | `--processPrompt` | Score the query buffer and write the top-N report |
//! | `--computeTFIDF` | Rebuild corpus term statistics |
//! | `--mapItemMatrix` | Build the item-item similarity triangle |
//! | `--createRoutes` | Generate learning routes interactively |
//! | `--showComponents` | Print a database overview |
//!
//! Plus `--config <path>` (default `./config/studyrec.toml`; missing file
//! falls back to the default `data/` layout) and `--topN <n>` for the prompt
//! action.
//!
//! Exit code 0 when at least one action executed successfully, 1 when no
//! action flag was supplied or every action failed.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use studyrec::config;
use studyrec::db;
use studyrec::fingerprint::{self, FingerprintOptions};
use studyrec::matrix::{self, MatrixOptions};
use studyrec::progress::{ProgressMode, ProgressReporter};
use studyrec::prompt;
use studyrec::resources::{self, ResourceOptions};
use studyrec::routes;
use studyrec::stats;
use studyrec::tfidf;

#[derive(Parser)]
#[command(
    name = "studyrec",
    about = "Offline content-based document recommender and learning-route engine",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file falls back to the
    /// default data/ layout.
    #[arg(long, default_value = "./config/studyrec.toml")]
    config: PathBuf,

    /// Print help text.
    #[arg(long = "displayHelp")]
    display_help: bool,

    /// Fingerprint every token JSON in the configured input directory.
    #[arg(long = "computeRelationalDistance")]
    compute_relational_distance: bool,

    /// Record every resource file in file_info.
    #[arg(long = "updateDatabaseInformation")]
    update_database_information: bool,

    /// Score the query buffer and write the ranked report.
    #[arg(long = "processPrompt")]
    process_prompt: bool,

    /// Rebuild corpus term statistics.
    #[arg(long = "computeTFIDF")]
    compute_tf_idf: bool,

    /// Build the item-item similarity triangle.
    #[arg(long = "mapItemMatrix")]
    map_item_matrix: bool,

    /// Generate learning routes interactively.
    #[arg(long = "createRoutes")]
    create_routes: bool,

    /// Print a database overview.
    #[arg(long = "showComponents")]
    show_components: bool,

    /// Maximum number of prompt results to emit (overrides config).
    #[arg(long = "topN")]
    top_n: Option<usize>,
}

impl Cli {
    fn any_action(&self) -> bool {
        self.display_help
            || self.compute_relational_distance
            || self.update_database_information
            || self.process_prompt
            || self.compute_tf_idf
            || self.map_item_matrix
            || self.create_routes
            || self.show_components
    }

    fn needs_database(&self) -> bool {
        self.compute_relational_distance
            || self.update_database_information
            || self.process_prompt
            || self.compute_tf_idf
            || self.map_item_matrix
            || self.create_routes
            || self.show_components
    }
}

const ACTION_FLAGS: &[&str] = &[
    "--displayHelp",
    "--computeRelationalDistance",
    "--updateDatabaseInformation",
    "--processPrompt",
    "--computeTFIDF",
    "--mapItemMatrix",
    "--createRoutes",
    "--showComponents",
];

const VALUE_FLAGS: &[&str] = &["--config", "--topN"];

const BUILTIN_FLAGS: &[&str] = &["--help", "--version"];

/// Match flags case-insensitively against their canonical spellings and drop
/// anything unknown with an error, so the remaining flags still run.
fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.into_iter();
    if let Some(program) = iter.next() {
        out.push(program);
    }

    let mut expect_value = false;
    for arg in iter {
        if expect_value {
            out.push(arg);
            expect_value = false;
            continue;
        }

        if !arg.starts_with("--") {
            if arg == "-h" || arg == "-V" {
                out.push(arg);
            } else {
                eprintln!("Unknown argument: {} (skipped)", arg);
            }
            continue;
        }

        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (arg.clone(), None),
        };

        let canonical = ACTION_FLAGS
            .iter()
            .chain(VALUE_FLAGS.iter())
            .chain(BUILTIN_FLAGS.iter())
            .find(|flag| flag.eq_ignore_ascii_case(&name));

        match canonical {
            Some(flag) => match value {
                Some(value) => out.push(format!("{}={}", flag, value)),
                None => {
                    out.push((*flag).to_string());
                    if VALUE_FLAGS.contains(flag) {
                        expect_value = true;
                    }
                }
            },
            None => eprintln!("Unknown flag: {} (skipped)", name),
        }
    }

    out
}

fn print_help() {
    println!(
        "studyrec — offline document recommender and learning-route engine

Fingerprints PDF-derived token JSONs into SQLite, builds corpus TF-IDF,
precomputes an item-item similarity matrix, and serves prompt-based
retrieval plus greedy learning routes through related documents.

Actions (case-insensitive, combinable):
  --displayHelp                 Print this help text
  --computeRelationalDistance   Fingerprint every token JSON input
  --updateDatabaseInformation   Record resource files in file_info
  --processPrompt               Score the query buffer, write the top-N report
  --computeTFIDF                Rebuild corpus term statistics
  --mapItemMatrix               Build the item-item similarity triangle
  --createRoutes                Generate learning routes interactively
  --showComponents              Print a database overview

Options:
  --config <path>               Configuration file (TOML)
  --topN <n>                    Prompt result cap (overrides config)"
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_from(normalize_args(std::env::args()));

    if !cli.any_action() {
        eprintln!("No action flags supplied. Try --displayHelp.");
        std::process::exit(1);
    }

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut succeeded = false;

    if cli.display_help {
        print_help();
        succeeded = true;
    }

    if cli.needs_database() {
        let pool = match db::connect(&config).await {
            Ok(pool) => pool,
            Err(e) => {
                eprintln!("Error: cannot open database: {:#}", e);
                std::process::exit(if succeeded { 0 } else { 1 });
            }
        };

        let mode = ProgressMode::default_for_tty();
        let reporter = mode.reporter();

        if cli.compute_relational_distance {
            let options = FingerprintOptions::from_config(&config);
            match fingerprint::write_fingerprints(&config, &pool, &options, reporter.as_ref())
                .await
            {
                Ok(_) => succeeded = true,
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }

        if cli.update_database_information {
            let options = ResourceOptions::from_config(&config);
            match resources::record_resources(&config, &pool, &options, reporter.as_ref()).await {
                Ok(_) => succeeded = true,
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }

        if cli.process_prompt {
            match prompt::process_prompt(&config, &pool, cli.top_n).await {
                Ok(_) => succeeded = true,
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }

        if cli.compute_tf_idf {
            match tfidf::compute_tf_idf(&config, &pool).await {
                Ok(_) => succeeded = true,
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }

        if cli.map_item_matrix {
            let options = MatrixOptions::from_config(&config);
            let shared: Arc<dyn ProgressReporter> = Arc::from(mode.reporter());
            match matrix::map_item_matrix(&config, &pool, &options, shared).await {
                Ok(_) => succeeded = true,
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }

        if cli.create_routes {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            match routes::run_route_session(&config, &pool, &mut input).await {
                Ok(_) => succeeded = true,
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }

        if cli.show_components {
            match stats::show_components(&config, &pool).await {
                Ok(()) => succeeded = true,
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }

        pool.close().await;
    }

    std::process::exit(if succeeded { 0 } else { 1 });
}
