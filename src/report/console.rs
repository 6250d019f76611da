use crate::registry::field::Field;
use crate::report::report_model::DetectionSummary;

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// Format a detection summary for terminal output.
///
/// Produces output like:
/// ```text
/// === Form detection: https://shop.test/checkout ===
/// Documents: 2 (1 inaccessible)
/// Passes: immediate 1* | fast 1 | medium 2*
/// Stopped: strong candidates after medium
///
/// ✓ container-0-4  score 100.0  3 fields  [native-form, field-count, submit-control]
///     text      Email          #email
///     radio     Plan           radio-group-plan (2 options)
///
/// === Results: 1 containers, 3 fields, 2 actions ===
/// ```
pub fn format_console_report(summary: &DetectionSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Form detection: {} ===\n", summary.url));
    out.push_str(&format!("Documents: {}", summary.documents));
    if !summary.inaccessible.is_empty() {
        out.push_str(&format!(" ({} inaccessible)", summary.inaccessible.len()));
    }
    out.push('\n');

    let passes: Vec<String> = summary
        .detection
        .passes
        .iter()
        .map(|p| format!("{} {}{}", p.name, p.candidates, if p.adopted { "*" } else { "" }))
        .collect();
    out.push_str(&format!("Passes: {}\n", passes.join(" | ")));
    out.push_str(&format!("Stopped: {}\n", summary.detection.termination));
    if !summary.schemas.is_empty() {
        out.push_str(&format!("Schemas captured: {}\n", summary.schemas.len()));
    }
    out.push('\n');

    for (info, candidate) in summary.containers.iter().zip(&summary.detection.containers) {
        let marker = if info.resolved_count > 0 { "\u{2713}" } else { "\u{2717}" };
        out.push_str(&format!(
            "{} {}  score {:.1}  {} fields  [{}]\n",
            marker,
            info.container_id,
            candidate.score,
            info.field_count,
            candidate.reasons.join(", ")
        ));
        if info.skipped_duplicates > 0 {
            out.push_str(&format!("    ({} already claimed elsewhere)\n", info.skipped_duplicates));
        }

        for button in summary
            .buttons
            .iter()
            .filter(|b| summary.fields.iter().any(|f| f.field.id == b.field.id && f.container_id == info.container_id))
        {
            let target = match &button.group_id {
                Some(group) => format!("{} ({} options)", group, button.field.options.len()),
                None => primary_selector(&button.field),
            };
            out.push_str(&format!(
                "    {:<9} {:<14} {}\n",
                button.field_type.as_str(),
                button.field.label.as_deref().unwrap_or("-"),
                target
            ));
        }
    }

    let unresolved = summary.unresolved();
    out.push_str(&format!(
        "\n=== Results: {} containers, {} fields, {} actions",
        summary.containers.len(),
        summary.fields.len(),
        summary.buttons.len()
    ));
    if unresolved > 0 {
        out.push_str(&format!(", {} unresolved", unresolved));
    }
    if let Some(ms) = summary.duration_ms {
        let secs = ms as f64 / 1000.0;
        out.push_str(&format!(" in {:.1}s", secs));
    }
    out.push_str(" ===\n");

    out
}

fn primary_selector(field: &Field) -> String {
    field
        .selectors
        .first()
        .cloned()
        .or_else(|| field.name.as_ref().map(|n| format!("name={n}")))
        .unwrap_or_else(|| field.id.clone())
}
