//! Report rendering for stdout.

use std::fmt::Write as _;

use clap::ValueEnum;

use crate::pipeline::InstallReport;

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render `report` in `format`.
pub fn render(report: &InstallReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Text => Ok(render_text(report)),
    }
}

/// Human-readable summary, one line per plugin.
pub fn render_text(report: &InstallReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "artifact: {}", report.artifact);
    let _ = writeln!(out, "bin: {}", report.bin_dir.display());

    if report.installed.is_empty() {
        let _ = writeln!(out, "no plugins installed");
    }
    for plugin in &report.installed {
        let verb = if plugin.replaced { "replaced" } else { "installed" };
        let _ = writeln!(
            out,
            "{verb} {} ({} bytes, sha256 {})",
            plugin.name, plugin.size, plugin.sha256
        );
    }
    for entry in &report.skipped {
        let _ = writeln!(
            out,
            "skipped {} ({})",
            entry.path.display(),
            entry.reason.as_str()
        );
    }
    if let Some(work) = &report.work_dir {
        let _ = writeln!(out, "work: {}", work.display());
    }
    out
}
