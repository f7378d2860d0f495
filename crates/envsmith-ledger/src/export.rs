//! Multi-format history export.
//!
//! Supports JSON, CSV, HTML, XML and ZIP (the ZIP bundles JSON, CSV and
//! a plain-text summary). Output paths default to
//! `reports/operation_history_<timestamp>.<ext>`; parent directories are
//! created on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::record::{OperationRecord, OperationStatus};

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Structured JSON with export metadata.
    Json,
    /// Flat CSV.
    Csv,
    /// Self-contained HTML document.
    Html,
    /// XML with CDATA-wrapped free text.
    Xml,
    /// ZIP bundling JSON, CSV and a summary.
    Zip,
}

impl ReportFormat {
    /// File extension for the format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Zip => "zip",
        }
    }

    /// Parse a format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "html" => Some(Self::Html),
            "xml" => Some(Self::Xml),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Result of an export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    /// Whether the export succeeded.
    pub success: bool,
    /// Where the report was written.
    pub file_path: Option<PathBuf>,
    /// Report size in bytes.
    pub file_size: Option<u64>,
    /// Format exported.
    pub format: ReportFormat,
    /// Number of records exported.
    pub records_exported: usize,
    /// Failure description.
    pub error: Option<String>,
    /// When the export ran.
    pub exported_at: DateTime<Utc>,
}

/// Export records in the given format.
///
/// Failures are captured in the result, never raised.
#[must_use]
pub fn export_records(
    records: &[OperationRecord],
    format: ReportFormat,
    output: Option<&Path>,
) -> ExportResult {
    let path = output.map_or_else(|| default_path(format), Path::to_path_buf);

    let write = || -> Result<(), String> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        match format {
            ReportFormat::Json => std::fs::write(&path, to_json(records)?),
            ReportFormat::Csv => std::fs::write(&path, to_csv(records)),
            ReportFormat::Html => std::fs::write(&path, to_html(records)),
            ReportFormat::Xml => std::fs::write(&path, to_xml(records)),
            ReportFormat::Zip => return write_zip(records, &path),
        }
        .map_err(|e| e.to_string())
    };

    match write() {
        Ok(()) => {
            let file_size = std::fs::metadata(&path).map(|m| m.len()).ok();
            info!(path = %path.display(), records = records.len(), %format, "history exported");
            ExportResult {
                success: true,
                file_path: Some(path),
                file_size,
                format,
                records_exported: records.len(),
                error: None,
                exported_at: Utc::now(),
            }
        }
        Err(error) => ExportResult {
            success: false,
            file_path: None,
            file_size: None,
            format,
            records_exported: 0,
            error: Some(error),
            exported_at: Utc::now(),
        },
    }
}

/// Re-import a JSON export, recovering the records.
///
/// # Errors
/// Returns a description when the file cannot be read or parsed.
pub fn import_json(path: &Path) -> Result<Vec<OperationRecord>, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let document: JsonExport = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    Ok(document.records)
}

fn default_path(format: ReportFormat) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    PathBuf::from("reports").join(format!(
        "operation_history_{stamp}.{}",
        format.extension()
    ))
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportInfo {
    generated_at: DateTime<Utc>,
    record_count: usize,
    tool: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonExport {
    export_info: ExportInfo,
    records: Vec<OperationRecord>,
}

fn to_json(records: &[OperationRecord]) -> Result<String, String> {
    let document = JsonExport {
        export_info: ExportInfo {
            generated_at: Utc::now(),
            record_count: records.len(),
            tool: format!("envsmith/{}", env!("CARGO_PKG_VERSION")),
        },
        records: records.to_vec(),
    };
    serde_json::to_string_pretty(&document).map_err(|e| e.to_string())
}

const CSV_HEADER: &str = "OperationID,Type,Status,Component,Title,StartTime,EndTime,Duration,\
Progress,CurrentStep,DetailsCount,WarningsCount,ErrorsCount";

fn to_csv(records: &[OperationRecord]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for record in records {
        let fields = [
            csv_quote(&record.id),
            csv_quote(&record.kind.to_string()),
            csv_quote(&record.status.to_string()),
            csv_quote(record.component_name.as_deref().unwrap_or("")),
            csv_quote(&record.title),
            csv_quote(&record.start_time.to_rfc3339()),
            csv_quote(
                &record
                    .end_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            ),
            record
                .duration_seconds
                .map_or_else(String::new, |d| format!("{d:.3}")),
            format!("{:.1}", record.progress_percent),
            csv_quote(&record.current_step),
            record.details.len().to_string(),
            record.warnings.len().to_string(),
            record.errors.len().to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn csv_quote(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn to_html(records: &[OperationRecord]) -> String {
    let mut rows = String::new();
    for record in records {
        let status_class = format!("status-{}", record.status);
        rows.push_str(&format!(
            "      <tr>\
             <td>{}</td><td>{}</td><td class=\"{status_class}\">{}</td>\
             <td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.1}%</td>\
             </tr>\n",
            html_escape(&record.id),
            record.kind,
            record.status,
            html_escape(record.component_name.as_deref().unwrap_or("-")),
            html_escape(&record.title),
            record.start_time.to_rfc3339(),
            record
                .duration_seconds
                .map_or_else(|| "-".to_string(), |d| format!("{d:.1}s")),
            record.progress_percent,
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Operation History</title>\n<style>\n\
         body {{ font-family: sans-serif; margin: 2em; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         th, td {{ border: 1px solid #ccc; padding: 6px 10px; text-align: left; }}\n\
         th {{ background: #f0f0f0; }}\n\
         .status-completed {{ color: #207520; font-weight: bold; }}\n\
         .status-failed {{ color: #b02020; font-weight: bold; }}\n\
         .status-cancelled {{ color: #806020; }}\n\
         .status-running {{ color: #2050a0; }}\n\
         .status-pending {{ color: #666; }}\n\
         .status-timeout {{ color: #b02020; }}\n\
         </style>\n</head>\n<body>\n\
         <h1>Operation History</h1>\n\
         <p>Generated {} - {} records</p>\n\
         <table>\n  <thead>\n    <tr><th>ID</th><th>Type</th><th>Status</th>\
         <th>Component</th><th>Title</th><th>Start</th><th>Duration</th>\
         <th>Progress</th></tr>\n  </thead>\n  <tbody>\n{rows}  </tbody>\n</table>\n\
         </body>\n</html>\n",
        Utc::now().to_rfc3339(),
        records.len(),
    )
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn to_xml(records: &[OperationRecord]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<operation_history>\n");
    out.push_str(&format!(
        "  <export_info generated_at=\"{}\" record_count=\"{}\"/>\n",
        Utc::now().to_rfc3339(),
        records.len()
    ));
    out.push_str("  <records>\n");

    for record in records {
        out.push_str("    <record>\n");
        out.push_str(&format!("      <operation_id>{}</operation_id>\n", xml_escape(&record.id)));
        out.push_str(&format!("      <type>{}</type>\n", record.kind));
        out.push_str(&format!("      <status>{}</status>\n", record.status));
        if let Some(ref component) = record.component_name {
            out.push_str(&format!(
                "      <component>{}</component>\n",
                xml_escape(component)
            ));
        }
        out.push_str(&format!("      <title><![CDATA[{}]]></title>\n", cdata(&record.title)));
        out.push_str(&format!(
            "      <description><![CDATA[{}]]></description>\n",
            cdata(&record.description)
        ));
        out.push_str(&format!(
            "      <start_time>{}</start_time>\n",
            record.start_time.to_rfc3339()
        ));
        if let Some(end_time) = record.end_time {
            out.push_str(&format!("      <end_time>{}</end_time>\n", end_time.to_rfc3339()));
        }
        if let Some(duration) = record.duration_seconds {
            out.push_str(&format!(
                "      <duration_seconds>{duration:.3}</duration_seconds>\n"
            ));
        }
        out.push_str(&format!(
            "      <progress_percentage>{:.1}</progress_percentage>\n",
            record.progress_percent
        ));
        for error in &record.errors {
            out.push_str(&format!("      <error><![CDATA[{}]]></error>\n", cdata(error)));
        }
        out.push_str("    </record>\n");
    }

    out.push_str("  </records>\n</operation_history>\n");
    out
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Keep CDATA well-formed by splitting any `]]>` in the payload.
fn cdata(value: &str) -> String {
    value.replace("]]>", "]]]]><![CDATA[>")
}

fn write_zip(records: &[OperationRecord], path: &Path) -> Result<(), String> {
    let file = std::fs::File::create(path).map_err(|e| e.to_string())?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    zip.start_file("operation_history.json", options)
        .map_err(|e| e.to_string())?;
    zip.write_all(to_json(records)?.as_bytes())
        .map_err(|e| e.to_string())?;

    zip.start_file("operation_history.csv", options)
        .map_err(|e| e.to_string())?;
    zip.write_all(to_csv(records).as_bytes())
        .map_err(|e| e.to_string())?;

    zip.start_file("summary.txt", options)
        .map_err(|e| e.to_string())?;
    zip.write_all(summary_text(records).as_bytes())
        .map_err(|e| e.to_string())?;

    zip.finish().map_err(|e| e.to_string())?;
    Ok(())
}

fn summary_text(records: &[OperationRecord]) -> String {
    let completed = records
        .iter()
        .filter(|r| r.status == OperationStatus::Completed)
        .count();
    let failed = records
        .iter()
        .filter(|r| r.status == OperationStatus::Failed)
        .count();
    format!(
        "Operation History Summary\n\
         =========================\n\
         Generated: {}\n\
         Total records: {}\n\
         Completed: {completed}\n\
         Failed: {failed}\n\
         Success rate: {:.1}%\n",
        Utc::now().to_rfc3339(),
        records.len(),
        if records.is_empty() {
            0.0
        } else {
            completed as f64 / records.len() as f64 * 100.0
        }
    )
}
