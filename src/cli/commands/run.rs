//! `run`: execute the meter scenario against the simulated dataplane.

use anyhow::Result;
use clap::Args;
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::adapters::SimulatedDataplane;
use crate::application::{Harness, MeterFixture, MeterScenario, ScenarioReport, StepOutcome};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{Config, PollingConfig};

/// Poll interval used by `--fast`.
const FAST_INTERVAL_MS: u64 = 50;
const FAST_SETTLE_MS: u64 = 1_000;
const FAST_DELAY_MS: u64 = 20;
const FAST_TICK_MS: u64 = 10;

/// Arguments of `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Short intervals, settle wait and materialization delay
    #[arg(long)]
    pub fast: bool,

    /// Override the settle wait before checking a blocked removal
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Override the simulated materialization delay
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if self.fast {
            let polling = &mut config.polling;
            for profile in [&mut polling.creation, &mut polling.removal, &mut polling.counter] {
                *profile = PollingConfig {
                    interval_ms: FAST_INTERVAL_MS,
                    timeout_ms: profile.timeout_ms,
                };
            }
            polling.settle_ms = FAST_SETTLE_MS;
            config.simulator.materialize_delay_ms = FAST_DELAY_MS;
            config.simulator.tick_ms = FAST_TICK_MS;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.polling.settle_ms = settle_ms;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.simulator.materialize_delay_ms = delay_ms;
        }
    }
}

/// Output of `run`.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    /// Report of the finished scenario.
    #[serde(flatten)]
    pub report: ScenarioReport,
}

fn outcome_cell(outcome: &StepOutcome) -> Cell {
    let color = match outcome {
        StepOutcome::Passed => Color::Green,
        StepOutcome::Failed { .. } => Color::Red,
        StepOutcome::Skipped => Color::DarkGrey,
    };
    Cell::new(outcome.as_str()).fg(color)
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Step").add_attribute(Attribute::Bold),
            Cell::new("Outcome").add_attribute(Attribute::Bold),
            Cell::new("Elapsed").add_attribute(Attribute::Bold),
            Cell::new("Resolved / Error").add_attribute(Attribute::Bold),
        ]);

        for step in &self.report.steps {
            let detail = match &step.outcome {
                StepOutcome::Failed { error } => truncate(error, 120),
                _ => step
                    .resolved
                    .iter()
                    .map(|(label, key)| format!("{label}={key}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            };
            table.add_row(vec![
                Cell::new(&step.name),
                outcome_cell(&step.outcome),
                Cell::new(format!("{}ms", step.elapsed_ms)),
                Cell::new(detail),
            ]);
        }

        let verdict = if self.report.passed { "PASSED" } else { "FAILED" };
        format!(
            "Scenario {} started {}\n{table}\n{verdict}",
            self.report.scenario,
            self.report.started_at.to_rfc3339(),
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run the scenario; returns whether it passed.
pub async fn execute(args: RunArgs, mut config: Config, json_mode: bool) -> Result<bool> {
    args.apply(&mut config);

    let dataplane = SimulatedDataplane::start(config.simulator);
    let harness = Harness::simulated(&dataplane, config.polling);
    let mut scenario = MeterScenario::new(harness, MeterFixture::default());

    let report = scenario.run().await;
    let passed = report.passed;
    output(&RunOutput { report }, json_mode);
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_keeps_timeouts() {
        let mut config = Config::default();
        RunArgs {
            fast: true,
            settle_ms: Some(300),
            delay_ms: None,
        }
        .apply(&mut config);

        assert_eq!(config.polling.creation.interval_ms, FAST_INTERVAL_MS);
        assert_eq!(config.polling.removal.timeout_ms, 60_000);
        assert_eq!(config.polling.settle_ms, 300);
        assert_eq!(config.simulator.materialize_delay_ms, FAST_DELAY_MS);
    }

    #[test]
    fn test_human_output_lists_steps() {
        let mut report = ScenarioReport::new("dash-meter");
        report.record(
            "vnet",
            Ok([("vnet".to_string(), "oid:0x1".to_string())].into()),
            std::time::Duration::from_millis(12),
        );
        report.skip("eni");
        let text = RunOutput { report }.to_human();
        assert!(text.contains("vnet=oid:0x1"));
        assert!(text.contains("skipped"));
        assert!(text.contains("PASSED"));
    }
}
