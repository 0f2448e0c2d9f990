//! CSV output and the logged model comparison for evaluation runs

use crate::evaluation::EvaluationReport;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Written in place of an undefined metric.
pub const UNDEFINED: &str = "NA";

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.6}"),
        None => UNDEFINED.to_string(),
    }
}

/// Rows of `model,metric,value`, followed by the evaluated and skipped counts.
pub fn write_metrics<W: Write>(reports: &[EvaluationReport], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["model", "metric", "value"])?;

    for report in reports {
        let model = report.model.as_str();
        for (metric, value) in report.metrics.entries() {
            csv.write_record([model, metric, format_value(value).as_str()])?;
        }
        csv.write_record([model, "evaluated", report.evaluated.to_string().as_str()])?;
        csv.write_record([model, "skipped", report.skipped_count().to_string().as_str()])?;
    }

    csv.flush()?;
    Ok(())
}

/// Rows of `model,threshold,fpr,tpr`, one per ROC point.
pub fn write_roc<W: Write>(reports: &[EvaluationReport], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["model", "threshold", "fpr", "tpr"])?;

    for report in reports {
        for point in &report.roc.points {
            csv.write_record(&[
                report.model.as_str().to_string(),
                point.threshold.to_string(),
                format!("{:.6}", point.false_positive_rate),
                format!("{:.6}", point.true_positive_rate),
            ])?;
        }
    }

    csv.flush()?;
    Ok(())
}

pub fn save_metrics<P: AsRef<Path>>(reports: &[EvaluationReport], path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create metrics file {}", path.display()))?;
    write_metrics(reports, file)?;
    info!(path = %path.display(), "Metrics written");
    Ok(())
}

pub fn save_roc<P: AsRef<Path>>(reports: &[EvaluationReport], path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create ROC file {}", path.display()))?;
    write_roc(reports, file)?;
    info!(path = %path.display(), "ROC curves written");
    Ok(())
}

/// Log one line per model, side by side.
pub fn log_comparison(reports: &[EvaluationReport]) {
    info!("┌──────────┬──────────┬───────────┬──────────┬─────────────┬──────────┬──────────┬─────────┐");
    info!("│ model    │ accuracy │ precision │   recall │ specificity │       f1 │      auc │ skipped │");
    info!("├──────────┼──────────┼───────────┼──────────┼─────────────┼──────────┼──────────┼─────────┤");
    for report in reports {
        let m = &report.metrics;
        info!(
            "│ {:<8} │ {:>8} │ {:>9} │ {:>8} │ {:>11} │ {:>8} │ {:>8} │ {:>7} │",
            report.model.as_str(),
            short(m.accuracy),
            short(m.precision),
            short(m.recall),
            short(m.specificity),
            short(m.f1),
            short(m.auc),
            report.skipped_count()
        );
    }
    info!("└──────────┴──────────┴───────────┴──────────┴─────────────┴──────────┴──────────┴─────────┘");
}

fn short(value: Option<f64>) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), |v| format!("{v:.4}"))
}
