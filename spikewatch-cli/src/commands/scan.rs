//! `spikewatch scan` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use spikewatch_core::config::SpikewatchConfig;
use spikewatch_core::pipeline::AlertSink;
use spikewatch_monitor::{
    JsonLinesSink, MonitorConfig, MonitoringEngine, ScanOutcome, ScanReport, TracingSink,
    WindowMode,
};

use crate::cli::{AlertOutput, ScanArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::settings;

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    mut config: SpikewatchConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    apply_overrides(&mut config, &args);
    settings::validate(&config)?;

    let monitor_config = MonitorConfig::from_core(&config.monitor)?;
    let window_mode = monitor_config.window_mode;
    let mut engine = MonitoringEngine::from_config(monitor_config)?;

    info!(
        path = %config.monitor.data_path,
        chunk_size = config.monitor.chunk_size,
        rules = engine.rules().len(),
        "starting scan"
    );

    let mut sink: Box<dyn AlertSink> = match args.alerts {
        AlertOutput::Log => Box::new(TracingSink::new()),
        AlertOutput::JsonLines => Box::new(JsonLinesSink::new(std::io::stdout())),
    };
    let report = engine.scan(sink.as_mut()).await?;

    let summary = ScanSummary {
        window_mode,
        rules: engine.rules().iter().map(|r| r.name().to_owned()).collect(),
        report,
    };

    // stdout carries only alert lines in json-lines mode
    if args.alerts == AlertOutput::JsonLines {
        writer.render_to(&summary, &mut std::io::stderr().lock())?;
    } else {
        writer.render(&summary)?;
    }

    finish(&summary.report, args.fail_on_alert)
}

/// CLI flags override every other configuration layer.
pub fn apply_overrides(config: &mut SpikewatchConfig, args: &ScanArgs) {
    if let Some(path) = &args.path {
        config.monitor.data_path = path.display().to_string();
    }
    if let Some(size) = args.chunk_size {
        config.monitor.chunk_size = size;
    }
    if let Some(mode) = args.window_mode {
        config.monitor.window_mode = mode.as_config_str().to_owned();
    }
    if let Some(verbosity) = args.verbosity {
        config.monitor.verbosity = verbosity.as_config_str().to_owned();
    }
}

/// Map the scan outcome to the command result.
fn finish(report: &ScanReport, fail_on_alert: bool) -> Result<(), CliError> {
    if report.outcome == ScanOutcome::Rejected {
        return Err(CliError::Rejected {
            path: report.path.clone(),
        });
    }
    if fail_on_alert && report.alert_groups > 0 {
        return Err(CliError::AlertsRaised {
            groups: report.alert_groups,
        });
    }
    Ok(())
}

#[derive(Serialize)]
struct ScanSummary {
    window_mode: WindowMode,
    rules: Vec<String>,
    #[serde(flatten)]
    report: ScanReport,
}

impl Render for ScanSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let r = &self.report;
        let outcome = match r.outcome {
            ScanOutcome::Done => "done",
            ScanOutcome::Rejected => "rejected (missing or empty source)",
        };
        let mode = match self.window_mode {
            WindowMode::ChunkLocal => "chunk_local",
            WindowMode::CarryOver => "carry_over",
        };

        writeln!(w, "Scan {}", r.scan_id)?;
        writeln!(w, "  Source:             {}", r.path)?;
        writeln!(w, "  Outcome:            {}", outcome)?;
        writeln!(w, "  Window mode:        {}", mode)?;
        writeln!(w, "  Rules:              {}", self.rules.join(", "))?;
        writeln!(w, "  Lines:              {}", r.total_lines)?;
        writeln!(
            w,
            "  Chunks:             {} processed, {} skipped",
            r.chunks_processed, r.chunks_skipped
        )?;
        writeln!(w, "  Rows read:          {}", r.rows_read)?;
        writeln!(w, "  Malformed rows:     {}", r.malformed_rows)?;
        writeln!(w, "  Invalid timestamps: {}", r.invalid_timestamps)?;
        writeln!(w, "  Rows evaluated:     {}", r.rows_evaluated)?;
        writeln!(
            w,
            "  Alerts:             {} group(s) in {} report(s)",
            r.alert_groups, r.sink_calls
        )?;
        writeln!(w, "  Elapsed:            {} ms", r.elapsed_ms)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::cli::{VerbosityArg, WindowModeArg};

    fn report(outcome: ScanOutcome, alert_groups: u64) -> ScanReport {
        ScanReport {
            scan_id: uuid::Uuid::nil(),
            outcome,
            path: "/data/export.csv".to_owned(),
            total_lines: 30,
            chunks_processed: 2,
            chunks_skipped: 0,
            rows_read: 30,
            malformed_rows: 1,
            invalid_timestamps: 2,
            rows_evaluated: 27,
            sink_calls: 1,
            alert_groups,
            elapsed_ms: 3,
        }
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = SpikewatchConfig::default();
        let args = ScanArgs {
            path: Some(PathBuf::from("/tmp/x.csv")),
            chunk_size: Some(7),
            window_mode: Some(WindowModeArg::CarryOver),
            verbosity: Some(VerbosityArg::Quiet),
            ..ScanArgs::default()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.monitor.data_path, "/tmp/x.csv");
        assert_eq!(config.monitor.chunk_size, 7);
        assert_eq!(config.monitor.window_mode, "carry_over");
        assert_eq!(config.monitor.verbosity, "quiet");
    }

    #[test]
    fn test_absent_overrides_keep_config_values() {
        let mut config = SpikewatchConfig::default();
        apply_overrides(&mut config, &ScanArgs::default());
        assert_eq!(config.monitor.chunk_size, 1_000_000);
        assert_eq!(config.monitor.window_mode, "chunk_local");
    }

    #[test]
    fn test_rejected_outcome_is_an_error() {
        let err = finish(&report(ScanOutcome::Rejected, 0), false).expect_err("rejected");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_alerts_fail_only_when_requested() {
        assert!(finish(&report(ScanOutcome::Done, 2), false).is_ok());
        let err = finish(&report(ScanOutcome::Done, 2), true).expect_err("alerts raised");
        assert_eq!(err.exit_code(), 4);
        assert!(finish(&report(ScanOutcome::Done, 0), true).is_ok());
    }

    #[test]
    fn test_summary_text_and_json() {
        let summary = ScanSummary {
            window_mode: WindowMode::CarryOver,
            rules: vec!["fatal_error_rate".to_owned(), "bundle_fatal_error".to_owned()],
            report: report(ScanOutcome::Done, 1),
        };

        let mut text = Vec::new();
        summary.render_text(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("carry_over"));
        assert!(text.contains("fatal_error_rate, bundle_fatal_error"));
        assert!(text.contains("2 processed, 0 skipped"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["window_mode"], "carry_over");
        assert_eq!(json["outcome"], "done");
        assert_eq!(json["rows_evaluated"], 27);
    }
}
