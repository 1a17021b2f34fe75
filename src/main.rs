//! Roast Calculator
//!
//! Round allocation and totals tracking for coffee roasting batches.

mod allocator;
mod db;
mod machine;
mod models;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::allocator::BatchSummary;

#[derive(Parser)]
#[command(name = "roast-calculator")]
#[command(about = "Round allocation and totals tracking for coffee roasting batches")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "roaster_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Create a roast batch
    NewBatch {
        /// Batch name (e.g. "RB-2025-001")
        name: String,

        /// Green bean input weight in kg
        #[arg(short, long)]
        qty: f64,

        /// Drum capacity per round in kg (0 = unbounded)
        #[arg(short, long, default_value = "0")]
        capacity: f64,

        /// Roast date (e.g. "2025-06-01")
        #[arg(long)]
        date: Option<String>,
    },

    /// Split the batch charge evenly across rounds (replaces existing rounds)
    Distribute {
        /// Batch name
        batch: String,

        /// Number of rounds; derived from drum capacity when omitted
        #[arg(short, long)]
        rounds: Option<usize>,
    },

    /// Fill rounds to drum capacity (replaces existing rounds)
    Fill {
        /// Batch name
        batch: String,
    },

    /// Record measured weights for one round
    Record {
        /// Batch name
        batch: String,

        /// Round number (1-based)
        round_no: usize,

        /// Adjusted green input weight in kg
        #[arg(short, long)]
        input: Option<f64>,

        /// Roasted output weight in kg
        #[arg(short, long)]
        output: Option<f64>,

        /// Quacker (defect) weight in kg
        #[arg(short, long)]
        quacker: Option<f64>,
    },

    /// Show a batch's rounds and totals
    Show {
        /// Batch name
        batch: String,
    },

    /// List all batches
    ListBatches,

    /// Summarize machine roast logs into round notes
    ImportLogs {
        /// Batch name
        batch: String,

        /// Directory of CSV log exports, files tagged "-R##"
        log_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::NewBatch {
            name,
            qty,
            capacity,
            date,
        } => {
            if qty <= 0.0 {
                return Err(anyhow!("input weight must be > 0 kg"));
            }
            if capacity < 0.0 {
                return Err(anyhow!("drum capacity must be >= 0 kg"));
            }
            db::insert_batch(&conn, &name, date.as_deref(), qty, capacity)?;
            println!("Created batch '{}' ({:.3} kg to roast)", name, qty);
        }

        Commands::Distribute { batch, rounds } => {
            let b = db::get_batch(&conn, &batch)?;
            let n = match rounds {
                Some(n) => n,
                None => allocator::derived_round_count(b.qty_to_roast, b.cylinder_capacity_kg)?,
            };

            let mut allocated =
                allocator::distribute_equal(b.qty_to_roast, n, b.cylinder_capacity_kg)?;
            let totals = allocator::reconcile(&mut allocated);
            db::replace_rounds(&mut conn, &batch, &allocated)?;
            db::save_totals(&conn, &batch, &totals)?;

            println!("Distributed {:.3} kg across {} rounds:", b.qty_to_roast, n);
            for r in &allocated {
                println!("  R{}: {:.3} kg", r.round_no, r.input_qty);
            }
            if let Some(diff) =
                allocator::allocation_mismatch(b.qty_to_roast, totals.total_input)
            {
                println!(
                    "Warning: drum capacity clamped the split; {:.3} kg left unallocated",
                    diff
                );
            }
        }

        Commands::Fill { batch } => {
            let b = db::get_batch(&conn, &batch)?;
            let mut allocated =
                allocator::fill_to_capacity(b.qty_to_roast, b.cylinder_capacity_kg)?;
            let totals = allocator::reconcile(&mut allocated);
            db::replace_rounds(&mut conn, &batch, &allocated)?;
            db::save_totals(&conn, &batch, &totals)?;

            println!(
                "Filled {} rounds to {:.3} kg capacity:",
                allocated.len(),
                b.cylinder_capacity_kg
            );
            for r in &allocated {
                println!("  R{}: {:.3} kg", r.round_no, r.input_qty);
            }
        }

        Commands::Record {
            batch,
            round_no,
            input,
            output,
            quacker,
        } => {
            let mut rounds = db::get_rounds(&conn, &batch)?;
            let round = rounds
                .iter_mut()
                .find(|r| r.round_no == round_no)
                .ok_or_else(|| anyhow!("round {} not found in batch '{}'", round_no, batch))?;

            if let Some(v) = input {
                round.input_qty = v;
            }
            if let Some(v) = output {
                round.output_qty = v;
            }
            if let Some(v) = quacker {
                round.quacker = v;
            }

            // Full recompute: per-round derived fields, then batch totals
            let totals = allocator::reconcile(&mut rounds);
            let updated = rounds
                .iter()
                .find(|r| r.round_no == round_no)
                .cloned()
                .ok_or_else(|| anyhow!("round {} vanished during recompute", round_no))?;
            db::update_round(&conn, &batch, &updated)?;
            db::save_totals(&conn, &batch, &totals)?;

            println!(
                "R{}: in {:.3} kg, out {:.3} kg, loss {:.3} kg, net {:.3} kg",
                updated.round_no,
                updated.input_qty,
                updated.output_qty,
                updated.loss_qty,
                updated.net_qty
            );
            println!(
                "Batch totals: in {:.3} kg, out {:.3} kg, loss {:.2}%",
                totals.total_input, totals.total_output, totals.loss_percentage
            );
        }

        Commands::Show { batch } => {
            let b = db::get_batch(&conn, &batch)?;
            let mut rounds = db::get_rounds(&conn, &batch)?;
            let totals = allocator::reconcile(&mut rounds);

            let summary = BatchSummary {
                batch_name: b.name,
                roast_date: b.roast_date,
                qty_to_roast: b.qty_to_roast,
                cylinder_capacity_kg: b.cylinder_capacity_kg,
                rounds,
                totals,
            };
            println!("{}", summary);
        }

        Commands::ListBatches => {
            let batches = db::list_batches(&conn)?;
            if batches.is_empty() {
                println!("No batches in database. Run 'new-batch' first.");
            } else {
                println!(
                    "{:<20} {:>8} {:>10} {:>10} {:>10} {:>8}",
                    "Batch", "Rounds", "In (kg)", "Out (kg)", "Loss (kg)", "Loss %"
                );
                println!("{}", "-".repeat(70));
                for b in batches {
                    println!(
                        "{:<20} {:>8} {:>10.3} {:>10.3} {:>10.3} {:>7.2}%",
                        b.name,
                        b.rounds_count,
                        b.totals.total_input,
                        b.totals.total_output,
                        b.totals.total_loss,
                        b.totals.loss_percentage
                    );
                }
            }
        }

        Commands::ImportLogs { batch, log_dir } => {
            let rounds = db::get_rounds(&conn, &batch)?;
            if rounds.is_empty() {
                return Err(anyhow!(
                    "batch '{}' has no rounds; run 'distribute' or 'fill' first",
                    batch
                ));
            }

            println!("Scanning {} for roast logs...", log_dir.display());
            let (summaries, stats) = machine::summarize_logs(&log_dir, rounds.len())?;
            for s in &summaries {
                db::update_round_notes(&conn, &batch, s.round_no, &s.notes())?;
                println!("  R{}: {}", s.round_no, s.notes());
            }
            println!("\n{}", stats);
        }
    }

    Ok(())
}
