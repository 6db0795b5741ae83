//! Allocation module - distributing costs across department programs.
//!
//! # Key Concepts
//! - Equal split: deterministic fallback distribution in 5% increments
//! - Source: capability interface proposing a percentage distribution
//! - Engine: runs a full pass over the dataset and aggregates the results
//!
//! The engine accepts whatever a source returns as long as the percentages
//! total exactly 100; anything else (including a source error) is replaced by
//! the equal split over the same programs.

mod engine;
mod equal;
mod source;

pub use engine::{
    AllocationEngine, AllocationOutcome, LineItemAllocation, PersonnelAllocation, ProgramTotals,
};
pub use equal::equal_split;
pub use source::LlmAllocationSource;

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::dataset::Program;
use crate::llm::LlmError;

/// Percentage distribution for one cost entity, keyed by program name.
///
/// Valid iff the values sum to exactly 100. Values are plain integers so an
/// out-of-range proposal survives parsing and is judged by the sum rule
/// alone; programs absent from the map allocate 0%.
pub type AllocationMap = BTreeMap<String, i64>;

/// What kind of cost a [`CostEntity`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Personnel,
    NonPersonnel,
}

/// Borrowed view of one cost-bearing entity, as handed to a source.
#[derive(Debug, Clone, Copy)]
pub struct CostEntity<'a> {
    pub kind: EntityKind,
    pub department: &'a str,
    /// Position title or line-item label, depending on `kind`.
    pub name: &'a str,
    pub cost: Decimal,
}

/// Failure modes of obtaining a distribution from a source.
///
/// Never surfaces past the engine: every variant is recovered by
/// substituting the equal split.
#[derive(Debug, Error)]
pub enum AllocationSourceError {
    #[error("allocation source unavailable: {0}")]
    Unavailable(#[from] LlmError),

    #[error("allocation response not usable: {0}")]
    Malformed(String),

    #[error("allocation percentages sum to {total}, expected exactly 100")]
    BadTotal { total: i64 },
}

/// Capability interface for proposing a percentage distribution.
///
/// Implementations include the LLM-backed [`LlmAllocationSource`] and
/// deterministic stubs in tests. `programs` is already filtered to the
/// entity's department and capped; implementations must not reorder it.
#[async_trait]
pub trait AllocationSource: Send + Sync {
    async fn propose(
        &self,
        entity: &CostEntity<'_>,
        programs: &[&Program],
    ) -> Result<AllocationMap, AllocationSourceError>;
}

/// Enforce the total-sum invariant on a proposed distribution.
///
/// This is deliberately the only check: values that are not multiples of 5,
/// negative values, and names outside the eligible set all pass as long as
/// the total is right.
pub fn validate_total(map: &AllocationMap) -> Result<(), AllocationSourceError> {
    let total: i64 = map.values().sum();
    if total == 100 {
        Ok(())
    } else {
        Err(AllocationSourceError::BadTotal { total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_total_accepts_exact_hundred() {
        let map: AllocationMap = [("A".to_string(), 60), ("B".to_string(), 40)].into();
        assert!(validate_total(&map).is_ok());
    }

    #[test]
    fn validate_total_rejects_shortfall() {
        let map: AllocationMap = [("A".to_string(), 60), ("B".to_string(), 35)].into();
        match validate_total(&map) {
            Err(AllocationSourceError::BadTotal { total }) => assert_eq!(total, 95),
            other => panic!("expected BadTotal, got {other:?}"),
        }
    }

    #[test]
    fn validate_total_rejects_empty_map() {
        assert!(validate_total(&AllocationMap::new()).is_err());
    }

    #[test]
    fn validate_total_ignores_increment_and_range() {
        // Only the sum is enforced; 7 + 93 and -50 + 150 both pass.
        let odd: AllocationMap = [("A".to_string(), 7), ("B".to_string(), 93)].into();
        assert!(validate_total(&odd).is_ok());

        let wild: AllocationMap = [("A".to_string(), -50), ("B".to_string(), 150)].into();
        assert!(validate_total(&wild).is_ok());
    }
}
