//! Allocation pass: one sweep over the loaded dataset.
//!
//! Positions and line items are processed independently and sequentially,
//! one source call per entity. Source failures never escape the pass; the
//! affected entity just falls back to the equal split.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::dataset::{Dataset, Program};

use super::{equal_split, validate_total, AllocationMap, AllocationSource, CostEntity, EntityKind};

/// One personnel position's share of one program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonnelAllocation {
    pub department: String,
    pub program: String,
    pub position: String,
    pub allocation_pct: i64,
    pub cost: Decimal,
    pub fte: Decimal,
}

/// One line item's share of one program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemAllocation {
    pub department: String,
    pub program: String,
    pub line_item: String,
    pub allocation_pct: i64,
    pub cost: Decimal,
}

/// Accumulated totals for one program.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgramTotals {
    pub personnel_cost: Decimal,
    pub non_personnel_cost: Decimal,
    pub total_cost: Decimal,
    pub fte: Decimal,
}

/// The three outputs of a pass.
///
/// The summary is keyed by program name; only programs that actually
/// received an allocation record appear in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllocationOutcome {
    pub personnel: Vec<PersonnelAllocation>,
    pub non_personnel: Vec<LineItemAllocation>,
    pub summary: BTreeMap<String, ProgramTotals>,
}

/// Runs allocation passes against a fixed source.
pub struct AllocationEngine {
    source: Arc<dyn AllocationSource>,
}

impl AllocationEngine {
    pub fn new(source: Arc<dyn AllocationSource>) -> Self {
        Self { source }
    }

    /// Allocate every position and line item in `dataset` and aggregate the
    /// per-program summary.
    ///
    /// Entities whose department has no programs in the inventory are
    /// skipped outright and contribute to neither output.
    pub async fn run(&self, dataset: &Dataset) -> AllocationOutcome {
        let mut outcome = AllocationOutcome::default();

        for position in &dataset.positions {
            let programs = dataset.eligible_programs(&position.department);
            if programs.is_empty() {
                warn!(
                    department = %position.department,
                    position = %position.position,
                    "no eligible programs, dropping position from allocation"
                );
                continue;
            }

            let entity = CostEntity {
                kind: EntityKind::Personnel,
                department: &position.department,
                name: &position.position,
                cost: position.cost,
            };
            let map = self.resolve(&entity, &programs).await;

            for program in &programs {
                let pct = map.get(&program.name).copied().unwrap_or(0);
                let cost = position.cost * Decimal::from(pct) / Decimal::ONE_HUNDRED;
                let fte = Decimal::from(pct) / Decimal::ONE_HUNDRED;

                outcome.personnel.push(PersonnelAllocation {
                    department: position.department.clone(),
                    program: program.name.clone(),
                    position: position.position.clone(),
                    allocation_pct: pct,
                    cost,
                    fte,
                });

                let totals = outcome.summary.entry(program.name.clone()).or_default();
                totals.personnel_cost += cost;
                totals.fte += fte;
            }
        }

        for item in &dataset.items {
            let programs = dataset.eligible_programs(&item.department);
            if programs.is_empty() {
                warn!(
                    department = %item.department,
                    line_item = %item.line_item,
                    "no eligible programs, dropping line item from allocation"
                );
                continue;
            }

            let entity = CostEntity {
                kind: EntityKind::NonPersonnel,
                department: &item.department,
                name: &item.line_item,
                cost: item.cost,
            };
            let map = self.resolve(&entity, &programs).await;

            for program in &programs {
                let pct = map.get(&program.name).copied().unwrap_or(0);
                let cost = item.cost * Decimal::from(pct) / Decimal::ONE_HUNDRED;

                outcome.non_personnel.push(LineItemAllocation {
                    department: item.department.clone(),
                    program: program.name.clone(),
                    line_item: item.line_item.clone(),
                    allocation_pct: pct,
                    cost,
                });

                outcome
                    .summary
                    .entry(program.name.clone())
                    .or_default()
                    .non_personnel_cost += cost;
            }
        }

        for totals in outcome.summary.values_mut() {
            totals.total_cost = totals.personnel_cost + totals.non_personnel_cost;
        }

        outcome
    }

    /// Obtain a distribution for one entity, substituting the equal split on
    /// any source failure or a total other than 100. The source is never
    /// retried.
    async fn resolve(&self, entity: &CostEntity<'_>, programs: &[&Program]) -> AllocationMap {
        let proposed = match self.source.propose(entity, programs).await {
            Ok(map) => validate_total(&map).map(|()| map),
            Err(err) => Err(err),
        };

        match proposed {
            Ok(map) => map,
            Err(err) => {
                warn!(
                    department = entity.department,
                    entity = entity.name,
                    error = %err,
                    "allocation source failed, substituting equal split"
                );
                programs
                    .iter()
                    .zip(equal_split(programs.len()))
                    .map(|(program, pct)| (program.name.clone(), pct))
                    .collect()
            }
        }
    }
}
