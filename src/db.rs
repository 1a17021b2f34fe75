//! Database schema and operations
//!
//! Rounds live only as children of their batch: allocation replaces the
//! whole set in one transaction, and nothing reads them independently.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Batch, BatchTotals, Round};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Roast batches with cached totals
        CREATE TABLE IF NOT EXISTS batches (
            name TEXT PRIMARY KEY,
            roast_date TEXT,
            qty_to_roast REAL NOT NULL,
            cylinder_capacity_kg REAL NOT NULL DEFAULT 0,
            rounds_count INTEGER NOT NULL DEFAULT 0,
            total_input_qty REAL NOT NULL DEFAULT 0,
            total_output_qty REAL NOT NULL DEFAULT 0,
            total_loss_qty REAL NOT NULL DEFAULT 0,
            total_quacker REAL NOT NULL DEFAULT 0,
            loss_percentage REAL NOT NULL DEFAULT 0
        );

        -- Per-round measurements, owned by the parent batch
        CREATE TABLE IF NOT EXISTS rounds (
            batch_name TEXT NOT NULL,
            round_no INTEGER NOT NULL,
            input_qty REAL NOT NULL DEFAULT 0,
            output_qty REAL NOT NULL DEFAULT 0,
            quacker REAL NOT NULL DEFAULT 0,
            loss_qty REAL NOT NULL DEFAULT 0,
            net_qty REAL NOT NULL DEFAULT 0,
            notes TEXT,
            PRIMARY KEY (batch_name, round_no)
        );

        CREATE INDEX IF NOT EXISTS idx_rounds_batch ON rounds(batch_name);
        "#,
    )?;
    Ok(())
}

/// Create a new batch with no rounds
pub fn insert_batch(
    conn: &Connection,
    name: &str,
    roast_date: Option<&str>,
    qty_to_roast: f64,
    cylinder_capacity_kg: f64,
) -> Result<()> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO batches (name, roast_date, qty_to_roast, cylinder_capacity_kg)
         VALUES (?1, ?2, ?3, ?4)",
        params![name, roast_date, qty_to_roast, cylinder_capacity_kg],
    )?;
    if inserted == 0 {
        return Err(anyhow!("batch '{}' already exists", name));
    }
    Ok(())
}

pub fn get_batch(conn: &Connection, name: &str) -> Result<Batch> {
    let batch = conn
        .query_row(
            "SELECT name, roast_date, qty_to_roast, cylinder_capacity_kg, rounds_count,
                    total_input_qty, total_output_qty, total_loss_qty, total_quacker,
                    loss_percentage
             FROM batches WHERE name = ?1",
            [name],
            |row| {
                Ok(Batch {
                    name: row.get(0)?,
                    roast_date: row.get(1)?,
                    qty_to_roast: row.get(2)?,
                    cylinder_capacity_kg: row.get(3)?,
                    rounds_count: row.get::<_, i64>(4)? as usize,
                    totals: BatchTotals {
                        total_input: row.get(5)?,
                        total_output: row.get(6)?,
                        total_loss: row.get(7)?,
                        total_quacker: row.get(8)?,
                        loss_percentage: row.get(9)?,
                    },
                })
            },
        )
        .optional()?;

    batch.ok_or_else(|| anyhow!("batch '{}' not found", name))
}

pub fn list_batches(conn: &Connection) -> Result<Vec<Batch>> {
    let mut stmt = conn.prepare(
        "SELECT name, roast_date, qty_to_roast, cylinder_capacity_kg, rounds_count,
                total_input_qty, total_output_qty, total_loss_qty, total_quacker,
                loss_percentage
         FROM batches ORDER BY name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Batch {
            name: row.get(0)?,
            roast_date: row.get(1)?,
            qty_to_roast: row.get(2)?,
            cylinder_capacity_kg: row.get(3)?,
            rounds_count: row.get::<_, i64>(4)? as usize,
            totals: BatchTotals {
                total_input: row.get(5)?,
                total_output: row.get(6)?,
                total_loss: row.get(7)?,
                total_quacker: row.get(8)?,
                loss_percentage: row.get(9)?,
            },
        })
    })?;

    let mut batches = Vec::new();
    for row in rows {
        batches.push(row?);
    }
    Ok(batches)
}

/// Replace a batch's whole round collection in one transaction
pub fn replace_rounds(conn: &mut Connection, batch_name: &str, rounds: &[Round]) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM rounds WHERE batch_name = ?1", [batch_name])?;
    for r in rounds {
        tx.execute(
            "INSERT INTO rounds (batch_name, round_no, input_qty, output_qty, quacker,
                                 loss_qty, net_qty, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                batch_name,
                r.round_no as i64,
                r.input_qty,
                r.output_qty,
                r.quacker,
                r.loss_qty,
                r.net_qty,
                r.notes
            ],
        )?;
    }
    tx.execute(
        "UPDATE batches SET rounds_count = ?2 WHERE name = ?1",
        params![batch_name, rounds.len() as i64],
    )?;
    tx.commit()?;
    Ok(())
}

/// Get a batch's rounds in roasting order
pub fn get_rounds(conn: &Connection, batch_name: &str) -> Result<Vec<Round>> {
    let mut stmt = conn.prepare(
        "SELECT round_no, input_qty, output_qty, quacker, loss_qty, net_qty, notes
         FROM rounds WHERE batch_name = ?1 ORDER BY round_no",
    )?;

    let rows = stmt.query_map([batch_name], |row| {
        Ok(Round {
            round_no: row.get::<_, i64>(0)? as usize,
            input_qty: row.get(1)?,
            output_qty: row.get(2)?,
            quacker: row.get(3)?,
            loss_qty: row.get(4)?,
            net_qty: row.get(5)?,
            notes: row.get(6)?,
        })
    })?;

    let mut rounds = Vec::new();
    for row in rows {
        rounds.push(row?);
    }
    Ok(rounds)
}

/// Write back one round's measured and derived fields
pub fn update_round(conn: &Connection, batch_name: &str, round: &Round) -> Result<()> {
    let updated = conn.execute(
        "UPDATE rounds
         SET input_qty = ?3, output_qty = ?4, quacker = ?5, loss_qty = ?6, net_qty = ?7
         WHERE batch_name = ?1 AND round_no = ?2",
        params![
            batch_name,
            round.round_no as i64,
            round.input_qty,
            round.output_qty,
            round.quacker,
            round.loss_qty,
            round.net_qty
        ],
    )?;
    if updated == 0 {
        return Err(anyhow!(
            "round {} not found in batch '{}'",
            round.round_no,
            batch_name
        ));
    }
    Ok(())
}

pub fn update_round_notes(
    conn: &Connection,
    batch_name: &str,
    round_no: usize,
    notes: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE rounds SET notes = ?3 WHERE batch_name = ?1 AND round_no = ?2",
        params![batch_name, round_no as i64, notes],
    )?;
    Ok(())
}

/// Cache the reconciled aggregates on the parent batch
pub fn save_totals(conn: &Connection, batch_name: &str, totals: &BatchTotals) -> Result<()> {
    conn.execute(
        "UPDATE batches
         SET total_input_qty = ?2, total_output_qty = ?3, total_loss_qty = ?4,
             total_quacker = ?5, loss_percentage = ?6
         WHERE name = ?1",
        params![
            batch_name,
            totals.total_input,
            totals.total_output,
            totals.total_loss,
            totals.total_quacker,
            totals.loss_percentage
        ],
    )?;
    Ok(())
}
