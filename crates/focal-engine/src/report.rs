//! Markdown metrics report rendering.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write;

use focal_core::SessionResource;

/// Render the session metrics report.
///
/// `token_estimate` supplies the displayed token cost per resource; `None`
/// renders as `Unknown` (and contributes nothing to the included total), so
/// a degraded report is visibly degraded.
pub fn render_metrics<F>(session_id: &str, rows: &[SessionResource], token_estimate: F) -> String
where
    F: Fn(&SessionResource) -> Option<u64>,
{
    let included_count = rows.iter().filter(|r| r.included_in_context).count();
    let total_included_tokens: u64 = rows
        .iter()
        .filter(|r| r.included_in_context)
        .filter_map(&token_estimate)
        .sum();

    let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
    for row in rows {
        *by_type.entry(row.resource_type.as_str()).or_insert(0) += 1;
    }

    let mut top: Vec<&SessionResource> = rows.iter().collect();
    top.sort_by(|a, b| {
        b.importance_score
            .partial_cmp(&a.importance_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    top.truncate(5);

    let mut out = String::new();
    out.push_str("# Context Metrics Report\n\n");

    out.push_str("## Overview\n\n");
    let _ = writeln!(out, "- Session: {session_id}");
    let _ = writeln!(out, "- Total Resources: {}", rows.len());
    let _ = writeln!(out, "- Included in Context: {included_count}");
    let _ = writeln!(out, "- Total Included Tokens: {total_included_tokens}");

    out.push_str("\n## Resources by Type\n\n");
    for (resource_type, count) in &by_type {
        let _ = writeln!(out, "- {resource_type}: {count}");
    }

    out.push_str("\n## Top Resources by Importance\n\n");
    for (index, row) in top.iter().enumerate() {
        let tokens = token_estimate(row)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let _ = writeln!(
            out,
            "{}. {} (Importance: {}, Tokens: {})",
            index + 1,
            row.path,
            row.importance_score.round() as i64,
            tokens
        );
    }

    out
}
