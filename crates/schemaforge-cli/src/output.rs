//! Output formatting for compile results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use schemaforge_core::grants::AccessGrant;
use schemaforge_core::PassReport;
use std::fmt::Write;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable text and tables
    Text,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

type RenderResult = Result<String, Box<dyn std::error::Error>>;

/// Emitted sources followed by the diagnostics.
pub fn render_report(report: &PassReport, format: OutputFormat) -> RenderResult {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }

    let mut output = String::new();
    for unit in &report.units {
        let short = unit.fingerprint.get(..12).unwrap_or(&unit.fingerprint);
        writeln!(output, "// {} ({})", unit.type_name, short)?;
        writeln!(output, "{}", unit.source)?;
    }
    output.push_str(&render_summary(report));
    Ok(output)
}

/// One row per emitted type.
pub fn render_types(report: &PassReport, format: OutputFormat) -> RenderResult {
    if format == OutputFormat::Json {
        let descriptors: Vec<_> = report.units.iter().map(|u| &u.descriptor).collect();
        return Ok(serde_json::to_string_pretty(&descriptors)?);
    }

    let mut table = Table::new();
    table.set_header(vec!["Type", "Supertype", "Contracts", "Properties", "Views", "Methods"]);
    for unit in &report.units {
        let d = &unit.descriptor;
        table.add_row(vec![
            Cell::new(&d.name),
            Cell::new(&d.supertype),
            Cell::new(d.contracts.join(", ")),
            Cell::new(d.properties.len()),
            Cell::new(d.views.iter().map(|v| v.name.as_str()).collect::<Vec<_>>().join(", ")),
            Cell::new(d.methods.len()),
        ]);
    }

    let mut output = table.to_string();
    output.push('\n');
    output.push_str(&render_summary(report));
    Ok(output)
}

/// Signature table of the synchronised grants.
pub fn render_grants(grants: &[AccessGrant], format: OutputFormat) -> RenderResult {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(grants)?);
    }
    if grants.is_empty() {
        return Ok("No grants".to_string());
    }

    let mut table = Table::new();
    table.set_header(vec!["Signature", "Flags", "Dynamic"]);
    for grant in grants {
        table.add_row(vec![
            Cell::new(&grant.signature),
            Cell::new(format!("{:#x}", grant.flags)),
            Cell::new(if grant.dynamic { "yes" } else { "no" }),
        ]);
    }
    Ok(table.to_string())
}

fn render_summary(report: &PassReport) -> String {
    let mut output = format!(
        "{} unit(s), version {}, state {}",
        report.units.len(),
        report.version,
        report.state
    );
    if !report.excluded.is_empty() {
        output.push_str(&format!("\nexcluded: {}", report.excluded.join(", ")));
    }
    for diagnostic in &report.diagnostics {
        output.push('\n');
        output.push_str(&diagnostic.to_string());
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_core::{Diagnostic, Stage};

    #[test]
    fn test_summary_lists_diagnostics() {
        let report = PassReport {
            excluded: vec!["Broken".into()],
            diagnostics: vec![Diagnostic::new("Broken", Stage::Emission, "unknown value type Nope")],
            ..Default::default()
        };

        let text = render_report(&report, OutputFormat::Text).unwrap();
        assert!(text.contains("excluded: Broken"));
        assert!(text.contains("[Emission] Broken: unknown value type Nope"));
    }

    #[test]
    fn test_grant_table() {
        let grants = vec![AccessGrant::dynamic("_schema/Order"), AccessGrant::fixed("Order", 3)];
        let text = render_grants(&grants, OutputFormat::Text).unwrap();
        assert!(text.contains("_schema/Order"));
        assert!(text.contains("0x3"));

        assert_eq!(render_grants(&[], OutputFormat::Text).unwrap(), "No grants");
        let json = render_grants(&grants, OutputFormat::Json).unwrap();
        assert!(json.contains("\"dynamic\": true"));
    }
}
