//! Round allocation and totals reconciliation logic
//!
//! Splits a batch charge across roasting rounds and keeps the per-round
//! derived fields and batch aggregates consistent as rounds are edited.

use thiserror::Error;

use crate::models::{BatchTotals, Round};

/// Tolerance for comparing round sums against the batch charge, kg
pub const TOLERANCE_KG: f64 = 0.001;

/// Largest slice of the split remainder handed to a single round, grams
const REMAINDER_CHUNK_G: i64 = 200;

#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("quantity to roast must be > 0 kg (got {0})")]
    InvalidQuantity(f64),
    #[error("round count must be > 0")]
    InvalidRoundCount,
    #[error("cylinder capacity must be > 0 kg (got {0})")]
    InvalidCapacity(f64),
}

/// Number of rounds needed to fit `qty` kg in a drum of `cap` kg
pub fn derived_round_count(qty: f64, cap: f64) -> Result<usize, AllocationError> {
    if !qty.is_finite() || qty <= 0.0 {
        return Err(AllocationError::InvalidQuantity(qty));
    }
    if !cap.is_finite() || cap <= 0.0 {
        return Err(AllocationError::InvalidCapacity(cap));
    }
    Ok((qty / cap).ceil() as usize)
}

/// Split `qty` kg evenly across `n` rounds.
///
/// Each round gets an equal base share truncated to 3 decimals; the leftover
/// grams are handed out front-to-back in chunks of up to 0.2 kg. With no
/// capacity bound (`cap == 0`) the allocations sum to `qty` within 0.001 kg.
/// Rounds above a positive `cap` are clamped down to it; the clamped mass is
/// not redistributed to other rounds.
pub fn distribute_equal(qty: f64, n: usize, cap: f64) -> Result<Vec<Round>, AllocationError> {
    if !qty.is_finite() || qty <= 0.0 {
        return Err(AllocationError::InvalidQuantity(qty));
    }
    if n == 0 {
        return Err(AllocationError::InvalidRoundCount);
    }

    // Equal base split, truncated to whole grams
    let base = ((qty / n as f64) * 1000.0).floor() / 1000.0;
    let mut remainder_g = ((qty - base * n as f64) * 1000.0).round() as i64;

    let mut rounds = Vec::with_capacity(n);
    for round_no in 1..=n {
        let mut in_kg = base;
        if remainder_g > 0 {
            let add_g = remainder_g.min(REMAINDER_CHUNK_G);
            in_kg += add_g as f64 / 1000.0;
            remainder_g -= add_g;
        }
        if cap > 0.0 && in_kg > cap {
            in_kg = cap;
        }
        rounds.push(Round::allocated(round_no, in_kg));
    }
    Ok(rounds)
}

/// Fill rounds to drum capacity: each round takes min(remaining, cap)
/// until the whole charge is placed. The last round carries the remainder.
pub fn fill_to_capacity(qty: f64, cap: f64) -> Result<Vec<Round>, AllocationError> {
    let n = derived_round_count(qty, cap)?;

    let mut rounds = Vec::with_capacity(n);
    let mut remaining = qty;
    for round_no in 1..=n {
        let take = remaining.min(cap);
        rounds.push(Round::allocated(round_no, take));
        remaining -= take;
    }
    Ok(rounds)
}

/// Recompute one round's derived masses from its measured fields
pub fn recalc_round(round: &mut Round) {
    round.loss_qty = (round.input_qty - round.output_qty).max(0.0);
    round.net_qty = (round.output_qty - round.quacker).max(0.0);
}

/// Recompute every round's derived fields, then the batch aggregates.
///
/// Always runs from scratch over the full round list, so the result is
/// the same no matter what order edits arrived in.
pub fn reconcile(rounds: &mut [Round]) -> BatchTotals {
    let mut totals = BatchTotals::default();
    for round in rounds.iter_mut() {
        recalc_round(round);
        totals.total_input += round.input_qty;
        totals.total_output += round.output_qty;
        totals.total_loss += round.loss_qty;
        totals.total_quacker += round.quacker;
    }

    totals.total_input = round3(totals.total_input);
    totals.total_output = round3(totals.total_output);
    totals.total_loss = round3(totals.total_loss);
    totals.total_quacker = round3(totals.total_quacker);
    totals.loss_percentage = if totals.total_input > 0.0 {
        totals.total_loss / totals.total_input * 100.0
    } else {
        0.0
    };
    totals
}

/// How far the allocated inputs drift from the batch charge.
///
/// Returns the absolute difference when it exceeds the 0.001 kg tolerance,
/// e.g. after a capacity clamp truncated a round. None = sums match.
pub fn allocation_mismatch(qty_to_roast: f64, total_input: f64) -> Option<f64> {
    if qty_to_roast <= 0.0 {
        return None;
    }
    let diff = (qty_to_roast - total_input).abs();
    (diff > TOLERANCE_KG).then_some(diff)
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Printable batch summary: rounds table plus aggregate block
#[derive(Debug)]
pub struct BatchSummary {
    pub batch_name: String,
    pub roast_date: Option<String>,
    pub qty_to_roast: f64,
    pub cylinder_capacity_kg: f64,
    pub rounds: Vec<Round>,
    pub totals: BatchTotals,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Roast Batch: {} ===", self.batch_name)?;
        if let Some(date) = &self.roast_date {
            writeln!(f, "Date: {}", date)?;
        }
        if self.cylinder_capacity_kg > 0.0 {
            writeln!(
                f,
                "Charge: {:.3} kg (drum capacity {:.3} kg/round)",
                self.qty_to_roast, self.cylinder_capacity_kg
            )?;
        } else {
            writeln!(f, "Charge: {:.3} kg", self.qty_to_roast)?;
        }
        writeln!(f)?;

        if self.rounds.is_empty() {
            writeln!(f, "No rounds allocated yet.")?;
        } else {
            writeln!(
                f,
                "{:>5} {:>10} {:>10} {:>10} {:>10} {:>10}",
                "Round", "In (kg)", "Out (kg)", "Loss (kg)", "Quacker", "Net (kg)"
            )?;
            for r in &self.rounds {
                writeln!(
                    f,
                    "{:>5} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
                    r.round_no, r.input_qty, r.output_qty, r.loss_qty, r.quacker, r.net_qty
                )?;
            }
            for r in &self.rounds {
                if let Some(notes) = &r.notes {
                    writeln!(f, "  R{}: {}", r.round_no, notes)?;
                }
            }
        }
        writeln!(f)?;

        writeln!(f, "Totals:")?;
        writeln!(f, "  Input:   {:.3} kg", self.totals.total_input)?;
        writeln!(f, "  Output:  {:.3} kg", self.totals.total_output)?;
        writeln!(f, "  Loss:    {:.3} kg", self.totals.total_loss)?;
        writeln!(f, "  Quacker: {:.3} kg", self.totals.total_quacker)?;
        writeln!(f, "  Loss %:  {:.2}%", self.totals.loss_percentage)?;

        if let Some(diff) = allocation_mismatch(self.qty_to_roast, self.totals.total_input) {
            writeln!(
                f,
                "Warning: round inputs differ from batch charge by {:.3} kg",
                diff
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn input_sum(rounds: &[Round]) -> f64 {
        rounds.iter().map(|r| r.input_qty).sum()
    }

    #[test]
    fn equal_split_sums_to_charge_without_capacity() {
        for &(qty, n) in &[(10.0, 3), (7.777, 4), (0.005, 2), (25.0, 5), (1.0, 7)] {
            let rounds = distribute_equal(qty, n, 0.0).unwrap();
            assert_eq!(rounds.len(), n);
            assert!(
                (input_sum(&rounds) - qty).abs() <= TOLERANCE_KG,
                "qty={} n={} sum={}",
                qty,
                n,
                input_sum(&rounds)
            );
        }
    }

    #[test]
    fn equal_split_ten_kg_three_rounds() {
        let rounds = distribute_equal(10.0, 3, 0.0).unwrap();
        // base 3.333, one leftover gram goes to the first round
        assert!(close(rounds[0].input_qty, 3.334));
        assert!(close(rounds[1].input_qty, 3.333));
        assert!(close(rounds[2].input_qty, 3.333));
        assert!(close(input_sum(&rounds), 10.0));
    }

    #[test]
    fn equal_split_gives_remainder_to_leading_rounds() {
        // base = floor(10.9/4 * 1000)/1000 = 2.725 exactly, no remainder
        let rounds = distribute_equal(10.9, 4, 0.0).unwrap();
        for r in &rounds {
            assert!(close(r.input_qty, 2.725));
        }

        // base = 0.335, remainder 2 g, all within one 0.2 kg chunk
        let rounds = distribute_equal(1.007, 3, 0.0).unwrap();
        assert!(close(rounds[0].input_qty, 0.337));
        assert!(close(rounds[1].input_qty, 0.335));
        assert!(close(rounds[2].input_qty, 0.335));
        assert!(close(input_sum(&rounds), 1.007));
    }

    #[test]
    fn equal_split_clamps_to_capacity_without_redistributing() {
        let rounds = distribute_equal(10.0, 3, 3.0).unwrap();
        for r in &rounds {
            assert!(close(r.input_qty, 3.0));
        }
        // clamped excess is dropped, so the sum falls short of the charge
        assert!(close(input_sum(&rounds), 9.0));
        assert!(allocation_mismatch(10.0, input_sum(&rounds)).is_some());
    }

    #[test]
    fn equal_split_rejects_bad_input() {
        assert_eq!(
            distribute_equal(0.0, 3, 0.0),
            Err(AllocationError::InvalidQuantity(0.0))
        );
        assert_eq!(
            distribute_equal(-1.5, 3, 0.0),
            Err(AllocationError::InvalidQuantity(-1.5))
        );
        assert_eq!(
            distribute_equal(10.0, 0, 0.0),
            Err(AllocationError::InvalidRoundCount)
        );
    }

    #[test]
    fn derived_round_count_is_ceiling() {
        assert_eq!(derived_round_count(10.0, 4.0).unwrap(), 3);
        assert_eq!(derived_round_count(8.0, 4.0).unwrap(), 2);
        assert_eq!(derived_round_count(0.1, 4.0).unwrap(), 1);
        assert_eq!(
            derived_round_count(10.0, 0.0),
            Err(AllocationError::InvalidCapacity(0.0))
        );
    }

    #[test]
    fn capacity_fill_takes_full_drums_then_remainder() {
        let rounds = fill_to_capacity(10.0, 4.0).unwrap();
        assert_eq!(rounds.len(), 3);
        assert!(close(rounds[0].input_qty, 4.0));
        assert!(close(rounds[1].input_qty, 4.0));
        assert!(close(rounds[2].input_qty, 2.0));
        assert!(close(input_sum(&rounds), 10.0));
    }

    #[test]
    fn capacity_fill_never_exceeds_capacity() {
        let rounds = fill_to_capacity(17.3, 5.5).unwrap();
        for r in &rounds {
            assert!(r.input_qty <= 5.5 + 1e-9);
        }
        assert!((input_sum(&rounds) - 17.3).abs() <= TOLERANCE_KG);
    }

    #[test]
    fn capacity_fill_rejects_bad_input() {
        assert_eq!(
            fill_to_capacity(10.0, 0.0),
            Err(AllocationError::InvalidCapacity(0.0))
        );
        assert_eq!(
            fill_to_capacity(0.0, 4.0),
            Err(AllocationError::InvalidQuantity(0.0))
        );
    }

    #[test]
    fn reconcile_derives_loss_and_net_per_round() {
        let mut rounds = vec![
            Round {
                round_no: 1,
                input_qty: 4.0,
                output_qty: 3.4,
                quacker: 0.1,
                loss_qty: 0.0,
                net_qty: 0.0,
                notes: None,
            },
            Round {
                round_no: 2,
                input_qty: 4.0,
                output_qty: 4.2, // gained mass: loss clamps at 0
                quacker: 5.0,    // quacker above output: net clamps at 0
                loss_qty: 9.9,   // stale derived values get overwritten
                net_qty: 9.9,
                notes: None,
            },
        ];
        let totals = reconcile(&mut rounds);

        assert!(close(rounds[0].loss_qty, 0.6));
        assert!(close(rounds[0].net_qty, 3.3));
        assert!(close(rounds[1].loss_qty, 0.0));
        assert!(close(rounds[1].net_qty, 0.0));

        assert!(close(totals.total_input, 8.0));
        assert!(close(totals.total_output, 7.6));
        assert!(close(totals.total_loss, 0.6));
        assert!(close(totals.total_quacker, 5.1));
        assert!(close(totals.loss_percentage, 0.6 / 8.0 * 100.0));
    }

    #[test]
    fn reconcile_is_order_independent() {
        let mut a = distribute_equal(12.0, 4, 0.0).unwrap();
        a[2].output_qty = 2.5;
        a[0].output_qty = 2.8;
        a[3].quacker = 0.2;
        let mut b = a.clone();
        b.reverse();

        let ta = reconcile(&mut a);
        let tb = reconcile(&mut b);
        assert_eq!(ta, tb);
    }

    #[test]
    fn empty_rounds_give_zero_totals() {
        let totals = reconcile(&mut []);
        assert_eq!(totals, BatchTotals::default());
        assert!(close(totals.loss_percentage, 0.0));
    }

    #[test]
    fn loss_percentage_zero_when_no_input() {
        let mut rounds = vec![Round {
            round_no: 1,
            input_qty: 0.0,
            output_qty: 0.0,
            quacker: 0.5,
            loss_qty: 0.0,
            net_qty: 0.0,
            notes: None,
        }];
        let totals = reconcile(&mut rounds);
        assert!(close(totals.loss_percentage, 0.0));
    }

    #[test]
    fn allocation_mismatch_respects_tolerance() {
        assert!(allocation_mismatch(10.0, 10.0).is_none());
        assert!(allocation_mismatch(10.0, 9.9995).is_none());
        assert!(allocation_mismatch(10.0, 9.0).is_some());
        // unset charge never mismatches
        assert!(allocation_mismatch(0.0, 9.0).is_none());
    }
}
