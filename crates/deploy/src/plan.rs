//! Deployment plan: the ordered list of resources to create and the calls to make on them.
//!
//! A plan is pure data. Its authoring order is its execution order; the only
//! structure validated here is that every back-reference points backwards.
//!
//! Plans are usually authored as TOML:
//!
//! ```toml
//! [[steps]]
//! type = "RubiToken"
//! calls = [{ method = "delegate", args = [{ account = 1 }] }]
//!
//! [[steps]]
//! type = "RubiPool"
//! args = [{ step = "RubiToken" }]
//! ```

use std::{collections::HashMap, fmt};

use alloy_core::primitives::Address;
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PlanError;

/// Name of a creatable resource kind, as known by the factory gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Deref, Display, From)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A literal argument value, or the resolved form of any argument.
///
/// Values are coerced against the target parameter type by the gateway, so
/// `Text` covers numbers too large for `Int` as well as strings and bytes.
/// Text that parses as an address becomes `Address` when the plan is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Address(Address),
    Text(String),
}

impl From<&str> for ArgValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Address(a) => write!(f, "{}", a),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Points at an earlier step, by position or by name.
///
/// Names are rewritten to positions when the plan is validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    Index(usize),
    Name(String),
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{}", i),
            Self::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// A constructor or call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    /// The address created by an earlier step.
    Ref { step: StepRef },
    /// The address of the N-th account known to the ledger node.
    Account { account: usize },
    Value(ArgValue),
}

impl Arg {
    pub fn step(index: usize) -> Self {
        Self::Ref {
            step: StepRef::Index(index),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Ref {
            step: StepRef::Name(name.into()),
        }
    }

    pub fn account(index: usize) -> Self {
        Self::Account { account: index }
    }

    pub fn value(value: impl Into<ArgValue>) -> Self {
        Self::Value(value.into())
    }
}

/// Whether an init call mutates state or only reads a derived value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CallKind {
    #[default]
    Write,
    Read,
}

/// A call issued against a step's own resource once its creation is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCall {
    /// A bare function name, or a full signature such as
    /// `withdrawalFee(uint256,uint256) returns (uint256)`.
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,
    #[serde(default)]
    pub kind: CallKind,
}

impl InitCall {
    pub fn write(method: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            method: method.into(),
            args,
            kind: CallKind::Write,
        }
    }

    pub fn read(method: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            method: method.into(),
            args,
            kind: CallKind::Read,
        }
    }
}

/// One resource creation plus its init calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Defaults to the resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, rename = "args", skip_serializing_if = "Vec::is_empty")]
    pub constructor_args: Vec<Arg>,
    #[serde(default, rename = "calls", skip_serializing_if = "Vec::is_empty")]
    pub init_calls: Vec<InitCall>,
}

impl Step {
    pub fn new(resource_type: impl Into<ResourceType>) -> Self {
        Self {
            name: None,
            resource_type: resource_type.into(),
            constructor_args: Vec::new(),
            init_calls: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.constructor_args.push(arg);
        self
    }

    pub fn call(mut self, call: InitCall) -> Self {
        self.init_calls.push(call);
        self
    }

    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.resource_type.as_str())
    }
}

/// A validated, immutable sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPlan")]
pub struct DeploymentPlan {
    steps: Vec<Step>,
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    steps: Vec<Step>,
}

impl TryFrom<RawPlan> for DeploymentPlan {
    type Error = PlanError;

    fn try_from(raw: RawPlan) -> Result<Self, Self::Error> {
        Self::new(raw.steps)
    }
}

impl DeploymentPlan {
    /// Validate `steps`, rewrite named back-references to step indices and turn
    /// address-shaped text into addresses.
    pub fn new(mut steps: Vec<Step>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::EmptyPlan);
        }

        let mut names: HashMap<String, usize> = HashMap::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            if step.resource_type.trim().is_empty() {
                return Err(PlanError::EmptyResourceType { step: index });
            }
            if let Some(first) = names.insert(step.name().to_string(), index) {
                return Err(PlanError::DuplicateStepName {
                    name: step.name().to_string(),
                    first,
                    second: index,
                });
            }
        }

        let len = steps.len();
        for (index, step) in steps.iter_mut().enumerate() {
            for (arg_index, arg) in step.constructor_args.iter_mut().enumerate() {
                normalize_value(arg);
                let Some(target) = normalize_ref(arg, index, len, &names)? else {
                    continue;
                };
                if target >= index {
                    return Err(PlanError::ForwardReference {
                        step: index,
                        arg: arg_index,
                        target,
                    });
                }
            }

            for (call_index, call) in step.init_calls.iter_mut().enumerate() {
                if call.method.trim().is_empty() {
                    return Err(PlanError::EmptyMethod {
                        step: index,
                        call: call_index,
                    });
                }
                for arg in call.args.iter_mut() {
                    normalize_value(arg);
                    let Some(target) = normalize_ref(arg, index, len, &names)? else {
                        continue;
                    };
                    // The step's own address exists by the time its calls run.
                    if target > index {
                        return Err(PlanError::CallForwardReference {
                            step: index,
                            call: call_index,
                            target,
                        });
                    }
                }
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Hex-encoded SHA-256 of the plan's JSON form.
    ///
    /// Used to tie a report to the plan that produced it.
    pub fn digest(&self) -> String {
        let json = serde_json::to_vec(&self.steps).expect("plan serialization should never fail");
        hex::encode(Sha256::digest(json))
    }
}

/// Literal text reads back from JSON as an address when it has an address's shape.
fn normalize_value(arg: &mut Arg) {
    if let Arg::Value(ArgValue::Text(text)) = arg {
        if let Ok(address) = text.parse::<Address>() {
            *arg = Arg::Value(ArgValue::Address(address));
        }
    }
}

/// Rewrite a named reference to its index and bounds-check it.
///
/// Returns the target index for references, `None` for other arguments.
fn normalize_ref(
    arg: &mut Arg,
    step: usize,
    len: usize,
    names: &HashMap<String, usize>,
) -> Result<Option<usize>, PlanError> {
    let Arg::Ref { step: step_ref } = arg else {
        return Ok(None);
    };

    let target = match step_ref {
        StepRef::Index(target) => *target,
        StepRef::Name(name) => *names.get(name.as_str()).ok_or_else(|| PlanError::UnknownStepName {
            step,
            name: name.clone(),
        })?,
    };

    if target >= len {
        return Err(PlanError::StepIndexOutOfRange { step, target, len });
    }

    *step_ref = StepRef::Index(target);
    Ok(Some(target))
}
