//! Execution report: what a run created, in the order it was created.

use std::{fmt, path::Path};

use alloy_core::primitives::{Address, TxHash};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::{ArgValue, ResourceType};

/// Result of a single init call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CallOutcome {
    /// Values returned by a read, rendered for display.
    Read { values: Vec<String> },
    /// A confirmed state-mutating transaction.
    Receipt { tx_hash: TxHash },
}

/// One init call as it was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReport {
    pub method: String,
    pub args: Vec<ArgValue>,
    pub outcome: CallOutcome,
}

/// Everything recorded for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Position of the step in the plan.
    pub index: usize,
    pub name: String,
    pub resource_type: ResourceType,
    /// Address returned by the creation call of this step.
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_tx: Option<TxHash>,
    /// Constructor arguments after back-references were resolved.
    pub constructor_args: Vec<ArgValue>,
    pub calls: Vec<CallReport>,
    pub completed_at: DateTime<Utc>,
    /// False when the run halted during this step's init calls.
    pub complete: bool,
}

/// Append-only record of a run.
///
/// Only the sequencer writes to it, one entry per step, once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    plan_digest: String,
    started_at: DateTime<Utc>,
    steps: Vec<StepReport>,
}

impl ExecutionReport {
    pub(crate) fn new(plan_digest: String) -> Self {
        Self {
            plan_digest,
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: StepReport) {
        debug_assert_eq!(entry.index, self.steps.len());
        self.steps.push(entry);
    }

    pub fn plan_digest(&self) -> &str {
        &self.plan_digest
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&StepReport> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The address created by step `index`, if that step has been recorded.
    pub fn address_of(&self, index: usize) -> Option<Address> {
        self.steps
            .get(index)
            .filter(|entry| entry.index == index)
            .map(|entry| entry.address)
    }

    /// Save the report as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Report saved");
        Ok(())
    }

    /// Load a report previously written by [`Self::save_to_file`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse report JSON")
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for CallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method, join(&self.args))?;
        match &self.outcome {
            CallOutcome::Read { values } => write!(f, " = {}", values.join(", ")),
            CallOutcome::Receipt { tx_hash } => write!(f, " tx={}", tx_hash),
        }
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  [{}] {}", self.index, self.name)?;
        if self.name != self.resource_type.as_str() {
            write!(f, " ({})", self.resource_type)?;
        }
        write!(f, " at {}", self.address)?;
        if !self.complete {
            write!(f, " [PARTIAL]")?;
        }
        for call in &self.calls {
            write!(f, "\n      {}", call)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan sha256:{}", self.plan_digest)?;
        for step in &self.steps {
            writeln!(f, "{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn entry(index: usize, name: &str, address: Address) -> StepReport {
        StepReport {
            index,
            name: name.to_string(),
            resource_type: ResourceType::new(name),
            address,
            creation_tx: None,
            constructor_args: vec![],
            calls: vec![],
            completed_at: Utc::now(),
            complete: true,
        }
    }

    #[test]
    fn test_address_of() {
        let mut report = ExecutionReport::new("00".to_string());
        report.push(entry(0, "TokenA", Address::repeat_byte(0x11)));
        report.push(entry(1, "Pool", Address::repeat_byte(0x22)));

        assert_eq!(report.address_of(0), Some(Address::repeat_byte(0x11)));
        assert_eq!(report.address_of(1), Some(Address::repeat_byte(0x22)));
        assert_eq!(report.address_of(2), None);
    }

    #[test]
    fn test_display_lists_calls_and_partial_steps() {
        let mut report = ExecutionReport::new("abcd".to_string());
        let mut minter = entry(0, "minter", Address::repeat_byte(0x33));
        minter.resource_type = ResourceType::new("RubiMinterV2");
        minter.complete = false;
        minter.calls.push(CallReport {
            method: "withdrawalFee".to_string(),
            args: vec![ArgValue::Int(1000), ArgValue::Int(1)],
            outcome: CallOutcome::Read {
                values: vec!["5".to_string()],
            },
        });
        report.push(minter);

        let rendered = report.to_string();
        assert!(rendered.starts_with("Plan sha256:abcd"));
        assert!(rendered.contains("[0] minter (RubiMinterV2) at 0x3333"));
        assert!(rendered.contains("[PARTIAL]"));
        assert!(rendered.contains("withdrawalFee(1000, 1) = 5"));
    }

    #[test]
    fn test_save_and_load_report() {
        let dir = TempDir::new("kiln-report").unwrap();
        let path = dir.path().join("report.json");

        let mut report = ExecutionReport::new("beef".to_string());
        let mut token = entry(0, "RubiToken", Address::repeat_byte(0x44));
        token.calls.push(CallReport {
            method: "delegate".to_string(),
            args: vec![ArgValue::Address(Address::repeat_byte(0x55))],
            outcome: CallOutcome::Receipt {
                tx_hash: TxHash::repeat_byte(0x66),
            },
        });
        report.push(token);

        report.save_to_file(&path).unwrap();
        let loaded = ExecutionReport::load_from_file(&path).unwrap();
        assert_eq!(loaded, report);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["steps"][0]["calls"][0]["outcome"]["kind"], "receipt");
    }
}
