//! Data models for roast batches and their rounds

/// A roasting batch: one charge of green beans split into rounds
#[derive(Debug, Clone)]
pub struct Batch {
    pub name: String,
    pub roast_date: Option<String>,
    /// Total green bean mass to roast, kg
    pub qty_to_roast: f64,
    /// Drum capacity per round, kg. 0 = no capacity bound
    pub cylinder_capacity_kg: f64,
    pub rounds_count: usize,
    pub totals: BatchTotals,
}

/// One roasting cycle within a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    /// 1-based position within the batch
    pub round_no: usize,
    /// Green mass charged, kg
    pub input_qty: f64,
    /// Roasted mass discharged, kg
    pub output_qty: f64,
    /// Defect/chaff mass removed, kg
    pub quacker: f64,
    /// Derived: max(0, input - output)
    pub loss_qty: f64,
    /// Derived: max(0, output - quacker)
    pub net_qty: f64,
    /// Free-form notes, e.g. machine log summary
    pub notes: Option<String>,
}

impl Round {
    /// Fresh round with only the allocated input mass set
    pub fn allocated(round_no: usize, input_qty: f64) -> Self {
        Round {
            round_no,
            input_qty,
            output_qty: 0.0,
            quacker: 0.0,
            loss_qty: 0.0,
            net_qty: 0.0,
            notes: None,
        }
    }
}

/// Aggregates over a batch's rounds, recomputed from scratch on every change
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchTotals {
    pub total_input: f64,
    pub total_output: f64,
    pub total_loss: f64,
    pub total_quacker: f64,
    /// total_loss / total_input * 100, or 0 when there is no input
    pub loss_percentage: f64,
}
