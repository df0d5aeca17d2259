//! Anno Production Calculator
//!
//! A production chain calculator for Anno 1800.

mod calculator;
mod catalog;
mod db;
mod effects;
mod import;
mod models;
mod sample;
mod selection;
mod summary;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use rusqlite::Connection;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::calculator::ChainResolver;
use crate::models::Mode;
use crate::selection::{ModifierSelection, PriorityHeuristic};

#[derive(Parser)]
#[command(name = "anno-calculator")]
#[command(about = "Production chain calculator for Anno 1800")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "anno_data.db")]
    database: PathBuf,

    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import goods, buildings and modifiers from JSON catalog files
    Import {
        /// A catalog file or a directory of them
        path: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// Calculate production chain for a target good
    Calc {
        /// Target good to produce (e.g., "Bread", "Chocolate")
        good: String,

        /// Target production rate in t/min
        #[arg(short, long, default_value = "1.0", value_parser = parse_rate)]
        rate: f64,

        /// Apply the best available modifiers to every building
        #[arg(short, long)]
        optimized: bool,

        /// Show detailed production tree
        #[arg(short, long)]
        tree: bool,

        /// Print the production tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare base and optimized chains for a target good
    Compare {
        good: String,

        /// Target production rate in t/min
        #[arg(short, long, default_value = "1.0", value_parser = parse_rate)]
        rate: f64,
    },

    /// List all goods in the database
    ListGoods,

    /// List all buildings in the database
    ListFacilities,

    /// List all modifiers in the database
    ListModifiers,

    /// Show details for a specific building
    Facility {
        /// Building name
        name: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (bread and chocolate chains)
    LoadSample,
}

fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err("rate must be a positive number".to_string())
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .init();

    debug!("anno-calculator started with verbosity level: {}", verbose);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Import { path, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_catalog(&conn)?;
            }

            let stats = import::import_to_database(&conn, &path)?;
            println!("{}", stats);
        }

        Commands::Calc {
            good,
            rate,
            optimized,
            tree,
            json,
        } => {
            let catalog = db::load_catalog(&conn)?;
            let mode = if optimized { Mode::Optimized } else { Mode::Base };
            info!("Calculating {} @ {} t/min ({})", good, rate, mode);

            let chain = ChainResolver::new(&catalog).resolve(&good, rate, mode);

            if json {
                println!("{}", serde_json::to_string_pretty(&chain)?);
                return Ok(());
            }
            if let Some(err) = chain.error() {
                return Err(anyhow!(err.clone()));
            }

            if tree {
                println!("Production chain ({}):\n", mode);
                println!("{}", summary::format_production_chain(&chain, 0));
            }

            let summary = summary::summarize_chain(&chain, &good, rate, mode);
            println!("{}", summary);
        }

        Commands::Compare { good, rate } => {
            let catalog = db::load_catalog(&conn)?;
            let resolver = ChainResolver::new(&catalog);

            let base = resolver.resolve(&good, rate, Mode::Base);
            if let Some(err) = base.error() {
                return Err(anyhow!(err.clone()));
            }
            let optimized = resolver.resolve(&good, rate, Mode::Optimized);

            let comparison = summary::compare_chains(
                summary::summarize_chain(&base, &good, rate, Mode::Base),
                summary::summarize_chain(&optimized, &good, rate, Mode::Optimized),
            );
            println!("{}", comparison);
        }

        Commands::ListGoods => {
            let goods = db::list_goods(&conn)?;
            if goods.is_empty() {
                println!("No goods in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<30} {:>8}", "Good", "Raw");
                println!("{}", "-".repeat(39));
                for g in goods {
                    println!("{:<30} {:>8}", g.name, if g.is_raw { "yes" } else { "no" });
                }
            }
        }

        Commands::ListFacilities => {
            let facilities = db::list_facilities(&conn)?;
            if facilities.is_empty() {
                println!("No buildings in database. Run 'import' or 'load-sample' first.");
            } else {
                println!(
                    "{:<25} {:>9} {:>10}  {}",
                    "Building", "Cycle (s)", "Workforce", "Recipe"
                );
                println!("{}", "-".repeat(72));
                for f in facilities {
                    println!(
                        "{:<25} {:>9.0} {:>10}  {}",
                        f.name,
                        f.cycle_time_secs,
                        format!("{} {}", f.workforce, f.workforce_kind),
                        f.base_recipe
                    );
                }
            }
        }

        Commands::ListModifiers => {
            let modifiers = db::list_modifiers(&conn)?;
            if modifiers.is_empty() {
                println!("No modifiers in database. Run 'import' or 'load-sample' first.");
            } else {
                for m in modifiers {
                    let tags: Vec<_> = m.target_tags.iter().map(String::as_str).collect();
                    let effects: Vec<_> = m.effects.iter().map(|e| e.kind()).collect();
                    println!("{} [{}]: {}", m.name, tags.join(", "), effects.join(", "));
                }
            }
        }

        Commands::Facility { name } => {
            let catalog = db::load_catalog(&conn)?;
            if let Some(f) = catalog.facility(&name) {
                println!("Building: {}", f.name);
                println!("  Recipe: {}", f.base_recipe);
                println!("  Cycle time: {}s", f.cycle_time_secs);
                println!("  Workforce: {} {}", f.workforce, f.workforce_kind);
                println!("  Electrifiable: {}", if f.enhanceable { "yes" } else { "no" });

                let tags: Vec<_> = f.tags.iter().map(String::as_str).collect();
                println!("  Tags: {}", tags.join(", "));
                println!("  Locations: {}", f.locations.join(", "));

                let compatible = catalog.compatible_modifiers(&f.tags);
                if !compatible.is_empty() {
                    let names: Vec<_> = compatible.iter().map(|m| m.name.as_str()).collect();
                    println!("  Compatible modifiers: {}", names.join(", "));

                    let selected = PriorityHeuristic.select(f, &compatible);
                    let profile = effects::apply_modifiers(f, &selected);
                    let names: Vec<_> = selected.iter().map(|m| m.name.as_str()).collect();
                    println!("  Optimized with: {}", names.join(", "));
                    println!("    Recipe: {}", profile.recipe);
                    println!("    Productivity: {:.1}%", profile.productivity * 100.0);
                    println!("    Workforce: {} {}", profile.workforce, f.workforce_kind);
                }
            } else {
                println!("Building '{}' not found", name);
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

/// Replace the database contents with the built-in sample catalog
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_catalog(conn)?;

    let catalog = sample::catalog()?;
    db::save_catalog(conn, &catalog)?;

    println!(
        "Loaded {} goods, {} sample buildings and {} modifiers",
        catalog.goods().len(),
        catalog.facilities().len(),
        catalog.modifiers().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_must_be_positive() {
        assert_eq!(parse_rate("8"), Ok(8.0));
        assert_eq!(parse_rate("0.5"), Ok(0.5));
        assert!(parse_rate("0").is_err());
        assert!(parse_rate("-1").is_err());
        assert!(parse_rate("inf").is_err());
        assert!(parse_rate("lots").is_err());
    }

    #[test]
    fn cli_parses_calc() {
        let cli = Cli::try_parse_from([
            "anno-calculator",
            "-vv",
            "calc",
            "Chocolate",
            "--rate",
            "8",
            "--optimized",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Calc {
                good,
                rate,
                optimized,
                tree,
                json,
            } => {
                assert_eq!(good, "Chocolate");
                assert_eq!(rate, 8.0);
                assert!(optimized && json && !tree);
            }
            _ => panic!("expected calc"),
        }
    }

    #[test]
    fn cli_rejects_negative_rate() {
        assert!(Cli::try_parse_from(["anno-calculator", "calc", "Bread", "-r", "-2"]).is_err());
    }

    #[test]
    fn clap_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
