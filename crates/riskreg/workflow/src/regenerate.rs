use std::collections::{HashMap, HashSet};

use riskreg_types::{ProcessId, RiskId, Row};

/// Cross product of risk and process leaves, risk-major.
///
/// Pairs already present in `existing` keep their row unchanged (id, gross
/// scores, appetite, embedded controls). New pairs get a fresh unscored row
/// with `default_appetite`. Rows whose pair is gone are not returned.
/// Repeated leaf ids are taken once.
pub fn regenerate_rows(
    risk_ids: &[RiskId],
    process_ids: &[ProcessId],
    existing: &[Row],
    default_appetite: u8,
) -> Vec<Row> {
    let by_pair: HashMap<(&RiskId, &ProcessId), &Row> = existing
        .iter()
        .map(|row| ((&row.risk_id, &row.process_id), row))
        .collect();

    let mut seen_risks = HashSet::new();
    let mut rows = Vec::with_capacity(risk_ids.len() * process_ids.len());
    for risk_id in risk_ids.iter().filter(|r| seen_risks.insert(*r)) {
        let mut seen_processes = HashSet::new();
        for process_id in process_ids.iter().filter(|p| seen_processes.insert(*p)) {
            let row = match by_pair.get(&(risk_id, process_id)) {
                Some(row) => (*row).clone(),
                None => Row::new(risk_id.clone(), process_id.clone(), default_appetite),
            };
            rows.push(row);
        }
    }
    rows
}
