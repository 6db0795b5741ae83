//! CSV rendering of the program summary.

use std::collections::BTreeMap;

use anyhow::Context;

use crate::allocation::ProgramTotals;

/// Render the per-program summary as CSV, one row per program in name order.
pub fn summary_csv(summary: &BTreeMap<String, ProgramTotals>) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "Program",
        "Personnel Cost",
        "Non-Personnel Cost",
        "Total Cost",
        "FTE",
    ])?;

    for (program, totals) in summary {
        wtr.write_record([
            program.clone(),
            totals.personnel_cost.to_string(),
            totals.non_personnel_cost.to_string(),
            totals.total_cost.to_string(),
            totals.fte.to_string(),
        ])?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("CSV writer error: {e}"))?;
    String::from_utf8(data).context("UTF-8 conversion error")
}
