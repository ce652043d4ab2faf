//! `spikewatch rules` command handler

use std::io::Write;

use serde::Serialize;

use spikewatch_core::config::SpikewatchConfig;
use spikewatch_monitor::{AlertRule, MonitorConfig};

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub fn execute(
    args: RulesArgs,
    config: SpikewatchConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List => {
            // rule semantics are validated by the monitor config conversion
            let monitor_config = MonitorConfig::from_core(&config.monitor)?;
            let list = RuleList::from_rules(&monitor_config.rules);
            writer.render(&list)
        }
    }
}

#[derive(Serialize)]
struct RuleList {
    total: usize,
    rules: Vec<RuleEntry>,
}

#[derive(Serialize)]
struct RuleEntry {
    name: String,
    kind: String,
    threshold: u64,
    window_secs: u64,
    match_field: String,
    match_value: String,
    group_field: Option<String>,
}

impl RuleList {
    fn from_rules(rules: &[AlertRule]) -> Self {
        let rules: Vec<RuleEntry> = rules
            .iter()
            .map(|rule| RuleEntry {
                name: rule.name().to_owned(),
                kind: rule.kind().to_string(),
                threshold: rule.threshold(),
                window_secs: rule.window().secs(),
                match_field: rule.predicate().field.clone(),
                match_value: rule.predicate().value.clone(),
                group_field: rule.group_field().map(str::to_owned),
            })
            .collect();
        Self {
            total: rules.len(),
            rules,
        }
    }
}

impl Render for RuleList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.rules.is_empty() {
            writeln!(w, "No rules configured.")?;
            return Ok(());
        }

        writeln!(
            w,
            "{:<24} {:<18} {:>9} {:>9}  {:<22} {:<12}",
            "Name", "Kind", "Threshold", "Window", "Match", "Group By"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;
        for rule in &self.rules {
            writeln!(
                w,
                "{:<24} {:<18} {:>9} {:>8}s  {:<22} {:<12}",
                rule.name,
                rule.kind,
                rule.threshold,
                rule.window_secs,
                format!("{}={}", rule.match_field, rule.match_value),
                rule.group_field.as_deref().unwrap_or("-"),
            )?;
        }
        writeln!(w)?;
        writeln!(w, "Total: {} rule(s)", self.total)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_list() -> RuleList {
        let config = SpikewatchConfig::default();
        let monitor = MonitorConfig::from_core(&config.monitor).expect("defaults are valid");
        RuleList::from_rules(&monitor.rules)
    }

    #[test]
    fn test_default_rules_are_listed_in_order() {
        let list = default_list();
        assert_eq!(list.total, 2);
        assert_eq!(list.rules[0].name, "fatal_error_rate");
        assert_eq!(list.rules[0].kind, "rate_threshold");
        assert_eq!(list.rules[0].window_secs, 60);
        assert!(list.rules[0].group_field.is_none());

        assert_eq!(list.rules[1].name, "bundle_fatal_error");
        assert_eq!(list.rules[1].window_secs, 3600);
        assert_eq!(list.rules[1].group_field.as_deref(), Some("bundle_id"));
    }

    #[test]
    fn test_render_text_table() {
        let mut buffer = Vec::new();
        default_list().render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("fatal_error_rate"));
        assert!(output.contains("severity=Error"));
        assert!(output.contains("bundle_id"));
        assert!(output.contains("Total: 2 rule(s)"));
    }

    #[test]
    fn test_render_text_empty() {
        let list = RuleList::from_rules(&[]);
        let mut buffer = Vec::new();
        list.render_text(&mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap().trim(), "No rules configured.");
    }

    #[test]
    fn test_invalid_rule_is_a_config_exit() {
        let mut config = SpikewatchConfig::default();
        config.monitor.rules[0].match_field.clear();
        let writer = OutputWriter::new(crate::cli::OutputFormat::Json);
        let err = execute(
            RulesArgs {
                action: RulesAction::List,
            },
            config,
            &writer,
        )
        .expect_err("empty match field is invalid");
        assert_eq!(err.exit_code(), 2);
    }
}
