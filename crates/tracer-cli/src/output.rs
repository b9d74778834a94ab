use serde_json::Value;
use tracer_client::{PollSnapshot, Session};
use tracer_common::{
    CatalogEntry, ColumnDef, Job, PolicyRow, PolicySetSummary, ReportBundle, UploadReceipt,
};

pub fn print_jobs(jobs: &[Job]) {
    println!("\n=== Calculation Jobs ===\n");
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!(
        "{:<12} {:<30} {:<12} {:<22} {:<8}",
        "Job ID", "Products", "Status", "Requested", "Report"
    );
    println!("{:-<88}", "");
    for job in jobs {
        let requested = job
            .requested_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<30} {:<12} {:<22} {:<8}",
            job.id.as_str(),
            truncate(&job.product_codes.join(", "), 30),
            job.status.label(),
            requested,
            if job.report_available() { "ready" } else { "-" }
        );
    }
    println!();
}

pub fn print_snapshot(snap: &PollSnapshot) {
    let at = snap
        .fetched_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    println!("[{at}] refresh #{}", snap.fetches);
    if let Some(err) = &snap.last_error {
        eprintln!("✗ Could not refresh job status: {err}");
    }
    print_jobs(&snap.jobs);
}

pub fn print_catalog(title: &str, entries: &[CatalogEntry]) {
    println!("\n=== {title} ===\n");
    if entries.is_empty() {
        println!("(none)");
        return;
    }
    println!("{:<20} {:<40}", "ID", "Name");
    println!("{:-<60}", "");
    for e in entries {
        println!("{:<20} {:<40}", e.id, e.display_name());
    }
    println!();
}

pub fn print_policy_sets(sets: &[PolicySetSummary]) {
    println!("\n=== Policy Sets ===\n");
    if sets.is_empty() {
        println!("(none)");
        return;
    }
    println!("{:<12} {:<36} {:<10} {:<12}", "ID", "Name", "Records", "Uploaded");
    println!("{:-<72}", "");
    for set in sets {
        let records = set.record_count.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
        let uploaded = set
            .created_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<12} {:<36} {:<10} {:<12}",
            set.id,
            truncate(&set.name, 36),
            records,
            uploaded
        );
    }
    println!();
}

pub fn print_product_codes(codes: &[String]) {
    println!("\n=== Product Codes ===\n");
    if codes.is_empty() {
        println!("(none)");
        return;
    }
    for code in codes {
        println!("  {code}");
    }
    println!();
}

pub fn print_policies(columns: &[ColumnDef], rows: &[PolicyRow]) {
    println!("\n=== Policies ===\n");
    if rows.is_empty() {
        println!("No policies in this set.");
        return;
    }
    let header: Vec<String> = columns
        .iter()
        .map(|c| {
            let name = if c.editable { c.header_name.clone() } else { format!("{}*", c.header_name) };
            format!("{:<16}", truncate(&name, 16))
        })
        .collect();
    println!("{}", header.join(" "));
    println!("{:-<width$}", "", width = columns.len() * 17);
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| format!("{:<16}", truncate(&cell(row.get(&c.field)), 16)))
            .collect();
        println!("{}", cells.join(" "));
    }
    println!("\n{} rows (* read-only)", rows.len());
}

pub fn print_report(report: &ReportBundle) {
    println!("\n=== Report for job {} ===\n", report.job_id);
    if let Some(cfg) = &report.config {
        println!("  Products:    {}", cfg.product_codes.join(", "));
        println!("  Scenario:    {}", cfg.scenario_id.as_deref().unwrap_or("-"));
        println!("  Stochastic:  {}", cfg.calculate_stochastic);
        println!("  Attribution: {}", cfg.perform_attribution);
        if let Some(a) = &cfg.assumptions_text {
            println!("  Assumptions: {a}");
        }
        println!();
    }
    if !report.summary.is_empty() {
        println!("[Summary]");
        println!("{}\n", report.summary);
    }
    println!("[Results]");
    match serde_json::to_string_pretty(&report.results) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{}", report.results),
    }
    println!("\n[Visualization]");
    println!("  Embed URL: {}", report.embed.embed_url);
    if let Some(id) = &report.embed.report_id {
        println!("  Report ID: {id}");
    }
    if let Some(exp) = report.embed.expires_at {
        println!("  Expires:   {}", exp.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();
}

pub fn print_upload_receipt(receipt: &UploadReceipt) {
    println!(
        "✓ Uploaded '{}' ({} bytes, storage status {})",
        receipt.file_name, receipt.bytes, receipt.status
    );
    println!("  Processing continues on the server.");
}

pub fn print_session(session: &Session) {
    println!("Account: {}", session.account.username);
    if let Some(id) = &session.account.home_account_id {
        println!("Home account: {id}");
    }
    println!("Token expires: {}", session.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
}

fn cell(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("TERM10", 10), "TERM10");
        assert_eq!(truncate("TERM10, UL, WL", 8), "TERM10,…");
    }

    #[test]
    fn test_cell() {
        assert_eq!(cell(Some(&Value::from("UL"))), "UL");
        assert_eq!(cell(Some(&Value::from(12.5))), "12.5");
        assert_eq!(cell(None), "");
    }
}
