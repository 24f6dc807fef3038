//! Consistency checks over the mappings of one entity type.

use std::collections::{BTreeMap, HashSet};

use crate::types::{IssueKind, IssueSeverity, Mapping, ValidationIssue};

/// Reports every external id held by more than one active mapping row.
///
/// Deactivated rows are audit history and never count toward a duplicate.
pub fn find_duplicates(mappings: &[Mapping]) -> Vec<ValidationIssue> {
    let mut groups: BTreeMap<&str, Vec<&Mapping>> = BTreeMap::new();
    for m in mappings.iter().filter(|m| m.is_active) {
        groups.entry(m.external_id.as_str()).or_default().push(m);
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(external_id, members)| {
            let internal_ids: Vec<&str> = members.iter().map(|m| m.internal_id.as_str()).collect();
            ValidationIssue {
                kind: IssueKind::Duplicate,
                severity: IssueSeverity::High,
                external_id: external_id.to_string(),
                internal_id: None,
                message: format!(
                    "external id '{}' is mapped {} times (internal ids: {})",
                    external_id,
                    members.len(),
                    internal_ids.join(", ")
                ),
            }
        })
        .collect()
}

/// Outcome of the orphan check.
#[derive(Debug, Default)]
pub struct OrphanReport {
    pub valid: usize,
    pub invalid: usize,
    pub issues: Vec<ValidationIssue>,
}

/// Flags mappings whose internal id is missing from `existing`.
pub fn find_orphans(mappings: &[Mapping], existing: &HashSet<String>) -> OrphanReport {
    let mut report = OrphanReport::default();
    for m in mappings {
        if existing.contains(&m.internal_id) {
            report.valid += 1;
            continue;
        }
        report.invalid += 1;
        report.issues.push(ValidationIssue {
            kind: IssueKind::Orphaned,
            severity: IssueSeverity::Medium,
            external_id: m.external_id.clone(),
            internal_id: Some(m.internal_id.clone()),
            message: format!(
                "internal id '{}' no longer exists in {}",
                m.internal_id,
                m.entity_type.table()
            ),
        });
    }
    report
}

/// Distinct internal ids in first-seen order, for a single batched existence query.
pub fn distinct_internal_ids(mappings: &[Mapping]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(mappings.len());
    mappings
        .iter()
        .filter(|m| seen.insert(m.internal_id.as_str()))
        .map(|m| m.internal_id.clone())
        .collect()
}
