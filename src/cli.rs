//! refindex - CLI for the shared reference index
//!
//! Runs single index operations against a snapshot file.
//!
//! # Usage
//!
//! ```bash
//! # Associate a reference with a term
//! refindex add onion "Page 5"
//!
//! # Case-insensitive pattern search over terms
//! refindex search oni
//!
//! # Drop a reference everywhere
//! refindex remove "Page 5" --snapshot /tmp/recipes.dat
//! ```
//!
//! Mutating commands load the snapshot (if it exists), apply the change and
//! save it back. Errors go to stderr, results to stdout. Exit codes:
//! 0 = success, 1 = error.
//!
//! Each run owns a private in-memory index, so the lock modes only order work
//! inside one process. Separate runs against the same snapshot are not
//! serialized: a reader always sees a complete snapshot, but when two runs
//! edit concurrently the last save wins.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ref_index::{Entries, IndexConfig, IndexStats, SharedIndex, Wait, create_index};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "refindex")]
#[command(version)]
#[command(about = "Shared term -> reference index with cooperative locking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Snapshot file (defaults to $REFINDEX_SNAPSHOT or index.dat)
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Associate a reference with a term
    Add {
        /// Term to index
        term: String,
        /// Reference the term points at
        reference: String,
    },

    /// Remove a reference from every term
    Remove {
        /// Reference to drop
        reference: String,
    },

    /// Find references of all terms matching a pattern
    Search {
        /// Case-insensitive regular expression matched against terms
        pattern: String,
    },

    /// List the terms that point at a reference
    Terms {
        /// Reference to look up
        reference: String,
    },

    /// Check whether any term points at a reference
    HasReference {
        /// Reference to look up
        reference: String,
    },

    /// Check whether a term is indexed (exact match)
    HasTerm {
        /// Term to look up
        term: String,
    },

    /// Show index statistics
    Stats,

    /// Print the whole mapping
    Dump,
}

fn main() -> Result<()> {
    // Initialize logging (only to stderr to keep stdout clean)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match run_command(&cli) {
        Ok(output) => {
            if cli.json {
                let mut value = serde_json::to_value(&output)?;
                value["ok"] = serde_json::Value::Bool(true);
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_human_readable(&output);
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                let err = serde_json::json!({
                    "ok": false,
                    "error": {
                        "message": format!("{:#}", e),
                    }
                });
                eprintln!("{}", serde_json::to_string_pretty(&err)?);
            } else {
                eprintln!("Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

fn config_for(cli: &Cli) -> IndexConfig {
    let mut config = IndexConfig::from_env();
    if let Some(path) = &cli.snapshot {
        config.snapshot_path = path.clone();
    }
    config
}

// A run's index is never shared, so blocking acquisition always succeeds
// without waiting.
const WAIT: Wait = Wait::Block;

fn open_index(config: IndexConfig) -> Result<SharedIndex> {
    let index = create_index(config);
    let path = &index.config().snapshot_path;
    if path.exists() {
        index
            .load_default(WAIT)
            .with_context(|| format!("Failed to load snapshot: {}", path.display()))?;
    }
    Ok(index)
}

fn save_index(index: &SharedIndex) -> Result<()> {
    let path = &index.config().snapshot_path;
    index
        .save_default(WAIT)
        .with_context(|| format!("Failed to save snapshot: {}", path.display()))?;
    Ok(())
}

fn run_command(cli: &Cli) -> Result<Output> {
    let index = open_index(config_for(cli))?;
    let snapshot = index.config().snapshot_path.display().to_string();

    match &cli.command {
        Commands::Add { term, reference } => {
            index.add(term, reference, WAIT);
            save_index(&index)?;
            Ok(Output::Add {
                term: term.clone(),
                reference: reference.clone(),
                snapshot,
            })
        }

        Commands::Remove { reference } => {
            index.remove(reference, WAIT);
            save_index(&index)?;
            Ok(Output::Remove {
                reference: reference.clone(),
                snapshot,
            })
        }

        Commands::Search { pattern } => {
            let mut results = Vec::new();
            index
                .search(pattern, &mut results, WAIT)
                .with_context(|| format!("Search failed for pattern: {}", pattern))?;
            Ok(Output::Search {
                pattern: pattern.clone(),
                results,
            })
        }

        Commands::Terms { reference } => Ok(Output::Terms {
            reference: reference.clone(),
            terms: index.all_terms(reference, WAIT),
        }),

        Commands::HasReference { reference } => Ok(Output::HasReference {
            reference: reference.clone(),
            exists: index.reference_exists(reference, WAIT),
        }),

        Commands::HasTerm { term } => Ok(Output::HasTerm {
            term: term.clone(),
            exists: index.term_exists(term, WAIT),
        }),

        Commands::Stats => {
            let stats = index.stats(WAIT).context("Index lock unavailable")?;
            Ok(Output::Stats { snapshot, stats })
        }

        Commands::Dump => {
            let entries = index.entries(WAIT).context("Index lock unavailable")?;
            Ok(Output::Dump { entries })
        }
    }
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Output {
    Add {
        term: String,
        reference: String,
        snapshot: String,
    },
    Remove {
        reference: String,
        snapshot: String,
    },
    Search {
        pattern: String,
        results: Vec<String>,
    },
    Terms {
        reference: String,
        terms: Vec<String>,
    },
    HasReference {
        reference: String,
        exists: bool,
    },
    HasTerm {
        term: String,
        exists: bool,
    },
    Stats {
        snapshot: String,
        stats: IndexStats,
    },
    Dump {
        entries: Entries,
    },
}

fn print_human_readable(output: &Output) {
    match output {
        Output::Add {
            term,
            reference,
            snapshot,
        } => {
            println!("Added \"{}\" -> \"{}\"", term, reference);
            println!("Snapshot: {}", snapshot);
        }
        Output::Remove {
            reference,
            snapshot,
        } => {
            println!("Removed \"{}\"", reference);
            println!("Snapshot: {}", snapshot);
        }
        Output::Search { pattern, results } => {
            println!("Search: \"{}\"", pattern);
            println!("Found {} references:", results.len());
            for r in results {
                println!("  {}", r);
            }
        }
        Output::Terms { reference, terms } => {
            println!("Terms for \"{}\":", reference);
            for t in terms {
                println!("  {}", t);
            }
        }
        Output::HasReference { reference, exists } => {
            println!("Reference \"{}\": {}", reference, presence(*exists));
        }
        Output::HasTerm { term, exists } => {
            println!("Term \"{}\": {}", term, presence(*exists));
        }
        Output::Stats { snapshot, stats } => {
            println!("Snapshot: {}", snapshot);
            println!(
                "{} terms, {} references, {} postings",
                stats.terms, stats.references, stats.postings
            );
        }
        Output::Dump { entries } => {
            for (term, refs) in entries {
                println!("{}: {}", term, refs.join(", "));
            }
        }
    }
}

fn presence(exists: bool) -> &'static str {
    if exists { "present" } else { "absent" }
}
