use std::{fmt::Write, path::Path};

use anyhow::Result;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};
use tracksync_engine::sync_types::{
    ExternalOrderRef,
    OutcomeStatus,
    PlatformOrder,
    ResolvedOrder,
    RowOutcome,
    SyncSummary,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

fn markdown_style(table: &mut Table) {
    table.set_format(markdown_format());
}

fn status_icon(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Success => "✅️",
        OutcomeStatus::Skipped => "⏭️",
        OutcomeStatus::Failed => "❌️",
    }
}

pub fn format_outcome(outcome: &RowOutcome) -> String {
    format!(
        "{} {} -> {} [{}] {}",
        status_icon(outcome.status),
        outcome.external_id,
        outcome.order_name_or_na(),
        outcome.tracking_number,
        outcome.message
    )
}

pub fn format_summary(summary: &SyncSummary, report: Option<&Path>) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "===============================================================================")?;
    if summary.aborted {
        writeln!(f, "Sync aborted. Rows after the last one shown were not processed.")?;
    }
    let mut table = Table::new();
    table.set_titles(row!["Processed", "Succeeded", "Failed", "Previously synced"]);
    table.add_row(row![
        summary.processed_count(),
        summary.success_count(),
        summary.fail_count(),
        summary.already_processed
    ]);
    markdown_style(&mut table);
    writeln!(f, "{table}")?;
    let failures = summary.outcomes.iter().filter(|o| o.is_failure()).collect::<Vec<_>>();
    if !failures.is_empty() {
        writeln!(f, "Failed rows:")?;
        writeln!(f, "{}", format_outcomes(&failures))?;
    }
    if let Some(path) = report {
        writeln!(f, "Report saved to {}", path.display())?;
    }
    writeln!(f, "===============================================================================")?;
    Ok(f)
}

pub fn format_outcomes(outcomes: &[&RowOutcome]) -> String {
    let mut table = Table::new();
    table.set_titles(row!["External ID", "Tracking Number", "Order", "Status", "Message"]);
    outcomes.iter().for_each(|o| {
        table.add_row(row![o.external_id, o.tracking_number, o.order_name_or_na(), o.status, o.message]);
    });
    markdown_style(&mut table);
    table.to_string()
}

pub fn format_resolved(id: &str, resolved: Option<&ResolvedOrder>) -> Result<String> {
    let mut f = String::new();
    let Some(resolved) = resolved else {
        writeln!(f, "No order found for {id}")?;
        return Ok(f);
    };
    let order = &resolved.order;
    writeln!(f, "{id} matched {} via {}", order.display_name, resolved.tier)?;
    writeln!(f, "{}", format_orders(std::slice::from_ref(order)))?;
    Ok(f)
}

fn join_attributes(order: &PlatformOrder) -> String {
    order.custom_attributes.iter().map(|a| format!("{}={}", a.key, a.value)).collect::<Vec<_>>().join("\n")
}

fn join_fulfillment_orders(order: &PlatformOrder) -> String {
    order.fulfillment_orders.iter().map(|fo| format!("{} ({})", fo.id, fo.status)).collect::<Vec<_>>().join("\n")
}

pub fn format_orders(orders: &[PlatformOrder]) -> String {
    if orders.is_empty() {
        return "No orders".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["Order", "Id", "Tags", "Note", "Attributes", "Fulfillment orders", "Tracking"]);
    orders.iter().for_each(|o| {
        table.add_row(row![
            o.display_name,
            o.legacy_id,
            o.tags.join(", "),
            o.note,
            join_attributes(o),
            join_fulfillment_orders(o),
            o.tracking_numbers.join("\n")
        ]);
    });
    markdown_style(&mut table);
    table.to_string()
}

pub fn format_ledger(entries: &[ExternalOrderRef], path: &Path) -> String {
    if entries.is_empty() {
        return format!("The ledger at {} is empty", path.display());
    }
    let mut f = entries.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
    f.push_str(&format!("\n{} references in {}", entries.len(), path.display()));
    f
}

#[cfg(test)]
mod test {
    use tracksync_engine::sync_types::SyncRow;

    use super::*;

    #[test]
    fn summary_lists_failures() {
        let ok = SyncRow::new("8123456789", Some("LP000111222CN"));
        let bad = SyncRow::new("8123456790", None);
        let summary = SyncSummary {
            outcomes: vec![
                RowOutcome::new(&ok, OutcomeStatus::Success, "Successfully updated tracking.").with_order_name("#1042"),
                RowOutcome::new(&bad, OutcomeStatus::Failed, "No tracking number found in row."),
            ],
            already_processed: 3,
            aborted: false,
        };
        let text = format_summary(&summary, Some(Path::new("logs/report.csv"))).unwrap();
        let counts = text.lines().find(|l| l.starts_with("| 2 ")).expect("counts row");
        let counts = counts.split('|').map(str::trim).filter(|c| !c.is_empty()).collect::<Vec<_>>();
        assert_eq!(counts, vec!["2", "1", "1", "3"]);
        assert!(text.contains("8123456790"));
        assert!(!text.contains("#1042"));
        assert!(text.contains("Report saved to logs/report.csv"));
    }

    #[test]
    fn outcome_line() {
        let row = SyncRow::new("8123456789", Some("LP000111222CN"));
        let outcome = RowOutcome::new(&row, OutcomeStatus::Failed, "Could not find a platform order for this reference.");
        assert_eq!(
            format_outcome(&outcome),
            "❌️ 8123456789 -> N/A [LP000111222CN] Could not find a platform order for this reference."
        );
    }
}
