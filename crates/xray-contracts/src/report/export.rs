use std::path::Path;

use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};

pub const REPORT_TITLE: &str = "AI-Generated Radiology Report";

/// Renders the report as a titled plain-text document.
pub fn render_report_export(report: &str, generated_at: &str) -> String {
    let underline = "=".repeat(REPORT_TITLE.chars().count());
    format!(
        "{REPORT_TITLE}\n{underline}\nGenerated: {generated_at}\n\n{}\n",
        report.trim_end()
    )
}

pub fn write_report_export(path: &Path, report: &str) -> anyhow::Result<()> {
    if report.trim().is_empty() {
        bail!("no report to export");
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    std::fs::write(path, render_report_export(report, &generated_at))
        .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{render_report_export, write_report_export, REPORT_TITLE};

    #[test]
    fn render_places_title_timestamp_and_body() {
        let rendered = render_report_export("Findings: none.\n\n", "2026-10-16T00:00:00Z");
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], REPORT_TITLE);
        assert_eq!(lines[1].len(), REPORT_TITLE.len());
        assert_eq!(lines[2], "Generated: 2026-10-16T00:00:00Z");
        assert_eq!(lines[4], "Findings: none.");
        assert!(rendered.ends_with("Findings: none.\n"));
    }

    #[test]
    fn write_creates_parent_dirs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("exports").join("radiology-report.txt");
        write_report_export(&path, "Impression: normal study.")?;
        let raw = std::fs::read_to_string(path)?;
        assert!(raw.starts_with(REPORT_TITLE));
        assert!(raw.contains("Impression: normal study."));
        Ok(())
    }

    #[test]
    fn empty_report_is_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("report.txt");
        assert!(write_report_export(&path, "  \n").is_err());
        assert!(!path.exists());
        Ok(())
    }
}
