//! Rendering of analysis results.

use std::fs;
use std::path::Path;

use inforce_core::AnalysisResult;

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV of the by-year series
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_result(result: &AnalysisResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per policy year.
fn format_csv(result: &AnalysisResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "year",
        "planned_premium",
        "cash_value",
        "surrender_charge",
        "net_surrender_value",
    ])?;

    for (year, [premium, cash, charge, net]) in result.series.by_year() {
        wtr.write_record([
            year.to_string(),
            cell(premium),
            cell(cash),
            cell(charge),
            cell(net),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &AnalysisResult) -> String {
    let mut output = String::new();

    let status = if result.decision_ready {
        "decision ready"
    } else {
        "needs manual review"
    };
    output.push_str(&format!(
        "Confidence: {:.2} ({})\n",
        result.confidence_overall, status
    ));

    if let Some(table) = &result.table {
        output.push_str(&format!(
            "Table: page {} ({}), {} rows\n",
            table.page + 1,
            table.strategy,
            table.rows
        ));
        output.push_str(&format!(
            "  header {:.2}  shape {:.2}  reconciliation {:.2}  parsed {:.2}\n",
            table.metrics.header_strength,
            table.metrics.shape_fit,
            table.metrics.recon_success,
            table.metrics.rows_parsed_pct
        ));
    }
    output.push('\n');

    let fields = &result.fields;
    output.push_str("Fields:\n");
    if let Some(rate) = &fields.crediting_rate {
        output.push_str(&format!("  Crediting rate:   {}%\n", rate.value));
    }
    if let Some(loan) = &fields.loan_balance_today {
        output.push_str(&format!("  Loan balance:     {:.2}\n", loan.value));
    }
    if let Some(rate) = &fields.loan_interest_today {
        output.push_str(&format!("  Loan interest:    {}%\n", rate.value));
    }
    if let Some(pattern) = &fields.death_benefit_pattern {
        output.push_str(&format!("  Death benefit:    {}\n", pattern));
    }
    if let Some(face) = &fields.face_amount_structure {
        output.push_str(&format!("  Face amount:      {}\n", face));
    }
    if let Some(age) = fields.age_at_issue {
        output.push_str(&format!("  Issue age:        {}\n", age));
    }
    if let Some(age) = fields.current_age {
        output.push_str(&format!("  Current age:      {}\n", age));
    }

    let rows = result.series.by_year();
    if !rows.is_empty() {
        output.push_str("\nLedger:\n");
        output.push_str(&format!(
            "  {:>6} {:>14} {:>14} {:>14} {:>14}\n",
            "Year", "Premium", "Cash value", "Surr. charge", "Net surrender"
        ));
        for (year, values) in rows {
            output.push_str(&format!("  {:>6}", year));
            for value in values {
                output.push_str(&format!(" {:>14}", cell(value)));
            }
            output.push('\n');
        }
    }

    if !result.notes.is_empty() {
        output.push_str("\nNotes:\n");
        for note in &result.notes {
            output.push_str(&format!("  - {}\n", note));
        }
    }

    output
}

/// Write the redacted PDF and proof snips into `dir`.
///
/// Returns the number of files written.
pub fn write_artifacts(result: &AnalysisResult, dir: &Path, stem: &str) -> anyhow::Result<usize> {
    fs::create_dir_all(dir)?;

    fs::write(dir.join(format!("{}.redacted.pdf", stem)), &result.redacted_document)?;
    for snip in &result.proof_snips {
        fs::write(dir.join(format!("{}.{}.png", stem, snip.label)), &snip.image)?;
    }
    Ok(1 + result.proof_snips.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inforce_core::YearValue;

    fn sample() -> AnalysisResult {
        let mut result = AnalysisResult {
            confidence_overall: 0.88,
            decision_ready: true,
            notes: vec!["Columns found: year, cash_value".to_string()],
            ..Default::default()
        };
        result.series.cash_value_by_year = vec![
            YearValue { year: 2025, value: 100.0 },
            YearValue { year: 2026, value: 120.5 },
        ];
        result.series.net_surrender_value_by_year = vec![YearValue { year: 2026, value: 115.0 }];
        result
    }

    #[test]
    fn test_csv_one_row_per_year() {
        let csv = format_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "year,planned_premium,cash_value,surrender_charge,net_surrender_value"
        );
        assert_eq!(lines[1], "2025,,100,,");
        assert_eq!(lines[2], "2026,,120.5,,115");
    }

    #[test]
    fn test_text_summary() {
        let text = format_text(&sample());
        assert!(text.starts_with("Confidence: 0.88 (decision ready)"));
        assert!(text.contains("  - Columns found: year, cash_value"));
        assert!(text.contains("2026"));
    }

    #[test]
    fn test_json_encodes_document_as_base64() {
        let mut result = sample();
        result.redacted_document = b"%PDF".to_vec();
        let json = format_result(&result, OutputFormat::Json).unwrap();
        assert!(json.contains("\"redacted_document\": \"JVBERg==\""));
    }
}
