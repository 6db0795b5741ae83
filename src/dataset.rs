//! Domain records for the three ingested collections.
//!
//! A [`Dataset`] is the unit of ingestion: either a whole workbook parses
//! into one, or nothing is applied. The loaded dataset is held behind the
//! API state handle and replaced wholesale on each upload.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A cost entity is only ever allocated across the first 10 programs of its
/// department; later programs are silently ignored.
pub const MAX_PROGRAMS_PER_DEPARTMENT: usize = 10;

/// One program in the program inventory, unique by (department, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub department: String,
    pub name: String,
}

/// A personnel position carrying a salary cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub department: String,
    pub position: String,
    pub cost: Decimal,
}

/// A non-personnel budget line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub department: String,
    pub line_item: String,
    pub cost: Decimal,
}

/// The three collections loaded from one workbook upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub programs: Vec<Program>,
    pub positions: Vec<Position>,
    pub items: Vec<LineItem>,
}

impl Dataset {
    /// Programs a cost entity of `department` may be allocated to, in
    /// inventory order, capped at [`MAX_PROGRAMS_PER_DEPARTMENT`].
    pub fn eligible_programs(&self, department: &str) -> Vec<&Program> {
        self.programs
            .iter()
            .filter(|p| p.department == department)
            .take(MAX_PROGRAMS_PER_DEPARTMENT)
            .collect()
    }
}
