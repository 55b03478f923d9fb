//! Operator-facing rendering of a run.

use comfy_table::{Table, presets::UTF8_FULL};

use crate::{
    error::{ExecutionError, Halted},
    report::{CallOutcome, ExecutionReport},
    sequencer::{ExecutionEvent, ExecutionListener},
};

/// Logs every sequencer event as it happens.
#[derive(Debug, Default)]
pub struct Reporter {
    finished: usize,
    halted: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps that completed so far.
    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn halted(&self) -> bool {
        self.halted
    }
}

impl ExecutionListener for Reporter {
    fn on_event(&mut self, event: &ExecutionEvent<'_>) {
        match event {
            ExecutionEvent::StepStarted { index, total, step } => {
                tracing::info!(
                    step = index,
                    total,
                    name = step.name(),
                    resource_type = %step.resource_type,
                    args = step.constructor_args.len(),
                    "Deploying {}...",
                    step.name()
                );
            }
            ExecutionEvent::Created {
                index,
                step,
                address,
                tx_hash,
            } => {
                tracing::info!(
                    step = index,
                    %address,
                    tx_hash = ?tx_hash,
                    "{} deployed to {}",
                    step.name(),
                    address
                );
            }
            ExecutionEvent::CallFinished { index, call } => match &call.outcome {
                CallOutcome::Read { values } => {
                    tracing::info!(
                        step = index,
                        method = %call.method,
                        values = ?values,
                        "Read {}",
                        call
                    );
                }
                CallOutcome::Receipt { tx_hash } => {
                    tracing::info!(
                        step = index,
                        method = %call.method,
                        %tx_hash,
                        "Called {}",
                        call
                    );
                }
            },
            ExecutionEvent::StepFinished { entry } => {
                self.finished += 1;
                tracing::debug!(
                    step = entry.index,
                    calls = entry.calls.len(),
                    "Step complete"
                );
            }
            ExecutionEvent::Halted { error, report } => {
                self.halted = true;
                tracing::error!(
                    step = ?error.step(),
                    call = ?error.call(),
                    recorded_steps = report.len(),
                    error = %error,
                    "Deployment halted"
                );
            }
        }
    }
}

/// Summary table of every recorded step.
pub fn summary_table(report: &ExecutionReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Step", "Type", "Address", "Calls", "Status"]);

    for step in report.steps() {
        let calls = step
            .calls
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        table.add_row(vec![
            step.index.to_string(),
            step.name.clone(),
            step.resource_type.to_string(),
            step.address.to_string(),
            calls,
            if step.complete { "ok" } else { "PARTIAL" }.to_string(),
        ]);
    }

    table
}

/// Render a halted run: what was recorded, then the error.
///
/// The last line always names the failing step, and call when there is one.
pub fn render_failure(halted: &Halted) -> String {
    let mut out = String::new();

    if !halted.report.is_empty() {
        out.push_str("Recorded before the failure:\n");
        out.push_str(&halted.report.to_string());
    }

    out.push_str(&format!("Error: {}\n", halted.error));
    out.push_str(&failure_location(&halted.error));
    out
}

fn failure_location(error: &ExecutionError) -> String {
    match (error.step(), error.call()) {
        (Some(step), Some(call)) => format!("Halted at step {}, call {}", step, call),
        (Some(step), None) => format!("Halted at step {}", step),
        (None, _) => "Halted before any step ran".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::Address;

    use super::*;
    use crate::{
        accounts::Accounts,
        gateway::SimulatedGateway,
        plan::{Arg, InitCall, Step},
        sequencer::Sequencer,
    };

    fn accounts() -> Accounts {
        Accounts::single(Address::repeat_byte(0xaa))
    }

    #[tokio::test]
    async fn test_reporter_counts_finished_steps() {
        let gateway = SimulatedGateway::new();
        let accounts = accounts();
        let mut reporter = Reporter::new();

        let report = Sequencer::new(&gateway, &accounts)
            .with_listener(&mut reporter)
            .execute_steps(vec![Step::new("TokenA"), Step::new("Pool").arg(Arg::step(0))])
            .await
            .unwrap();

        assert_eq!(reporter.finished(), 2);
        assert!(!reporter.halted());

        let table = summary_table(&report).to_string();
        assert!(table.contains("TokenA"));
        assert!(table.contains(&report.steps()[1].address.to_string()));
    }

    #[tokio::test]
    async fn test_render_failure_names_failing_call() {
        let gateway = SimulatedGateway::new().fail_call("deposit", "execution reverted");
        let accounts = accounts();
        let mut reporter = Reporter::new();

        let halted = Sequencer::new(&gateway, &accounts)
            .with_listener(&mut reporter)
            .execute_steps(vec![
                Step::new("RubiToken"),
                Step::new("VaultRubiBNB")
                    .call(InitCall::write("initialize", vec![Arg::value(0i64), Arg::step(0)]))
                    .call(InitCall::write("deposit", vec![Arg::value(1000i64)])),
            ])
            .await
            .unwrap_err();

        assert!(reporter.halted());
        assert_eq!(reporter.finished(), 1);

        let rendered = render_failure(&halted);
        assert!(rendered.contains("[1] VaultRubiBNB"));
        assert!(rendered.contains("[PARTIAL]"));
        assert_eq!(rendered.lines().last(), Some("Halted at step 1, call 1"));
    }

    #[tokio::test]
    async fn test_render_failure_for_invalid_plan() {
        let gateway = SimulatedGateway::new();
        let accounts = accounts();

        let halted = Sequencer::new(&gateway, &accounts)
            .execute_steps(vec![])
            .await
            .unwrap_err();

        let rendered = render_failure(&halted);
        assert!(rendered.starts_with("Error: invalid plan"));
        assert_eq!(rendered.lines().last(), Some("Halted before any step ran"));
    }
}
