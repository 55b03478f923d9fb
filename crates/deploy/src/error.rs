//! Error taxonomy for plan validation, gateway calls and plan execution.

use std::time::Duration;

use alloy_core::primitives::TxHash;
use thiserror::Error;

use crate::{
    plan::{ResourceType, StepRef},
    report::ExecutionReport,
};

/// Structural problems with a plan, detected before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("plan has no steps")]
    EmptyPlan,

    #[error("step {step} has an empty resource type")]
    EmptyResourceType { step: usize },

    #[error("step name '{name}' is used by both step {first} and step {second}")]
    DuplicateStepName {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("step {step} references unknown step '{name}'")]
    UnknownStepName { step: usize, name: String },

    #[error("step {step} references step {target}, but the plan only has {len} steps")]
    StepIndexOutOfRange {
        step: usize,
        target: usize,
        len: usize,
    },

    #[error(
        "constructor argument {arg} of step {step} references step {target}, which does not run before it"
    )]
    ForwardReference {
        step: usize,
        arg: usize,
        target: usize,
    },

    #[error("call {call} of step {step} references step {target}, which runs after it")]
    CallForwardReference {
        step: usize,
        call: usize,
        target: usize,
    },

    #[error("call {call} of step {step} has an empty method name")]
    EmptyMethod { step: usize, call: usize },
}

/// Failures reported by a [`FactoryGateway`](crate::FactoryGateway).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown resource type '{0}'")]
    UnknownResourceType(ResourceType),

    #[error("'{resource_type}' has no method '{method}' taking {arity} argument(s)")]
    UnknownMethod {
        resource_type: ResourceType,
        method: String,
        arity: usize,
    },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("rejected by the ledger: {0}")]
    Rejected(String),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },

    #[error("transaction {tx_hash} not confirmed after {timeout:?}")]
    Timeout { tx_hash: TxHash, timeout: Duration },

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// The error that terminates a run. Every variant past `InvalidPlan` names the failing step.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    #[error("step {step}: unknown resource type '{resource_type}'")]
    UnknownResourceType {
        step: usize,
        resource_type: ResourceType,
    },

    #[error("step {step}: creating '{resource_type}' failed: {source}")]
    CreationRejected {
        step: usize,
        resource_type: ResourceType,
        source: GatewayError,
    },

    #[error("step {step}: reference to step {target} has no recorded address")]
    UnresolvedReference { step: usize, target: StepRef },

    #[error("step {step}: no account at index {index}")]
    UnknownAccount { step: usize, index: usize },

    #[error("step {step}: call {call} '{method}' failed: {source}")]
    CallFailed {
        step: usize,
        call: usize,
        method: String,
        source: GatewayError,
    },
}

impl ExecutionError {
    /// The index of the step that failed, if the failure happened while running one.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::InvalidPlan(_) => None,
            Self::UnknownResourceType { step, .. }
            | Self::CreationRejected { step, .. }
            | Self::UnresolvedReference { step, .. }
            | Self::UnknownAccount { step, .. }
            | Self::CallFailed { step, .. } => Some(*step),
        }
    }

    /// The index of the init call that failed, if any.
    pub fn call(&self) -> Option<usize> {
        match self {
            Self::CallFailed { call, .. } => Some(*call),
            _ => None,
        }
    }
}

/// A run that stopped early, with everything recorded before the failure.
#[derive(Debug, Error)]
#[error("deployment halted: {error}")]
pub struct Halted {
    /// Entries for every step that finished, plus a partial entry for the
    /// failing step when its resource was already created.
    pub report: ExecutionReport,
    #[source]
    pub error: ExecutionError,
}
