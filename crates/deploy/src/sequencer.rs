//! Sequencer: runs a plan step by step against a factory gateway.
//!
//! Steps run strictly in plan order, one at a time. Each creation and each
//! init call is awaited until confirmed before the next one starts. The first
//! failure halts the run; nothing already created is rolled back.

use alloy_core::primitives::{Address, TxHash};
use chrono::Utc;

use crate::{
    accounts::Accounts,
    error::{ExecutionError, GatewayError, Halted},
    gateway::{FactoryGateway, ResolvedCall},
    plan::{Arg, ArgValue, DeploymentPlan, Step, StepRef},
    report::{CallReport, ExecutionReport, StepReport},
};

/// Progress published by the sequencer.
///
/// `StepStarted`, `Created` and `CallFinished` are progress notices for the
/// running step; its report entry does not exist yet when they are published.
/// `StepFinished` and `Halted` are published after the entry is written.
#[derive(Debug)]
pub enum ExecutionEvent<'a> {
    StepStarted {
        index: usize,
        total: usize,
        step: &'a Step,
    },
    /// The step's resource was created; its entry is still being built.
    Created {
        index: usize,
        step: &'a Step,
        address: Address,
        tx_hash: Option<TxHash>,
    },
    CallFinished {
        index: usize,
        call: &'a CallReport,
    },
    StepFinished {
        entry: &'a StepReport,
    },
    Halted {
        error: &'a ExecutionError,
        report: &'a ExecutionReport,
    },
}

/// Receives [`ExecutionEvent`]s as the run progresses.
pub trait ExecutionListener {
    fn on_event(&mut self, event: &ExecutionEvent<'_>);
}

impl ExecutionListener for () {
    fn on_event(&mut self, _event: &ExecutionEvent<'_>) {}
}

impl<T: ExecutionListener + ?Sized> ExecutionListener for &mut T {
    fn on_event(&mut self, event: &ExecutionEvent<'_>) {
        (**self).on_event(event);
    }
}

/// A step that failed, with whatever it recorded before failing.
struct StepFailure {
    partial: Option<StepReport>,
    error: ExecutionError,
}

impl From<ExecutionError> for StepFailure {
    fn from(error: ExecutionError) -> Self {
        Self {
            partial: None,
            error,
        }
    }
}

/// Executes one plan. Holds no state beyond the current run.
pub struct Sequencer<'a, G, L = ()> {
    gateway: &'a G,
    accounts: &'a Accounts,
    listener: L,
}

impl<'a, G: FactoryGateway> Sequencer<'a, G> {
    pub fn new(gateway: &'a G, accounts: &'a Accounts) -> Self {
        Self {
            gateway,
            accounts,
            listener: (),
        }
    }
}

impl<'a, G: FactoryGateway, L: ExecutionListener> Sequencer<'a, G, L> {
    /// Publish progress to `listener`.
    pub fn with_listener<L2: ExecutionListener>(self, listener: L2) -> Sequencer<'a, G, L2> {
        Sequencer {
            gateway: self.gateway,
            accounts: self.accounts,
            listener,
        }
    }

    /// Validate `steps` into a plan, then run it.
    ///
    /// An invalid plan halts with an empty report before the gateway is touched.
    pub async fn execute_steps(self, steps: Vec<Step>) -> Result<ExecutionReport, Halted> {
        match DeploymentPlan::new(steps) {
            Ok(plan) => self.execute(&plan).await,
            Err(e) => {
                let mut this = self;
                let report = ExecutionReport::new(String::new());
                let error = ExecutionError::InvalidPlan(e);
                this.listener.on_event(&ExecutionEvent::Halted {
                    error: &error,
                    report: &report,
                });
                Err(Halted { report, error })
            }
        }
    }

    /// Run every step of `plan` in order.
    pub async fn execute(mut self, plan: &DeploymentPlan) -> Result<ExecutionReport, Halted> {
        let mut report = ExecutionReport::new(plan.digest());
        let total = plan.len();

        tracing::info!(
            steps = total,
            signer = %self.accounts.signer(),
            plan_digest = report.plan_digest(),
            "Executing deployment plan..."
        );

        for (index, step) in plan.steps().iter().enumerate() {
            self.listener
                .on_event(&ExecutionEvent::StepStarted { index, total, step });

            match self.run_step(index, step, &report).await {
                Ok(entry) => {
                    report.push(entry);
                    if let Some(entry) = report.get(index) {
                        self.listener
                            .on_event(&ExecutionEvent::StepFinished { entry });
                    }
                }
                Err(StepFailure { partial, error }) => {
                    if let Some(partial) = partial {
                        report.push(partial);
                    }
                    self.listener.on_event(&ExecutionEvent::Halted {
                        error: &error,
                        report: &report,
                    });
                    return Err(Halted { report, error });
                }
            }
        }

        tracing::info!(steps = report.len(), "Deployment plan executed");

        Ok(report)
    }

    async fn run_step(
        &mut self,
        index: usize,
        step: &Step,
        report: &ExecutionReport,
    ) -> Result<StepReport, StepFailure> {
        let gateway = self.gateway;
        let signer = self.accounts.signer();

        let constructor_args = self.resolve_args(index, &step.constructor_args, report, None)?;

        let creation = gateway
            .create_instance(&step.resource_type, &constructor_args, signer)
            .await
            .map_err(|source| match source {
                GatewayError::UnknownResourceType(resource_type) => {
                    ExecutionError::UnknownResourceType {
                        step: index,
                        resource_type,
                    }
                }
                source => ExecutionError::CreationRejected {
                    step: index,
                    resource_type: step.resource_type.clone(),
                    source,
                },
            })?;

        self.listener.on_event(&ExecutionEvent::Created {
            index,
            step,
            address: creation.address,
            tx_hash: creation.tx_hash,
        });

        let mut entry = StepReport {
            index,
            name: step.name().to_string(),
            resource_type: step.resource_type.clone(),
            address: creation.address,
            creation_tx: creation.tx_hash,
            constructor_args,
            calls: Vec::with_capacity(step.init_calls.len()),
            completed_at: Utc::now(),
            complete: false,
        };

        let handle = gateway.at(&step.resource_type, creation.address);

        for (call_index, call) in step.init_calls.iter().enumerate() {
            let args = match self.resolve_args(index, &call.args, report, Some(creation.address)) {
                Ok(args) => args,
                Err(error) => {
                    return Err(StepFailure {
                        partial: Some(entry),
                        error,
                    });
                }
            };

            let resolved = ResolvedCall {
                method: call.method.clone(),
                args,
                kind: call.kind,
            };

            match handle.invoke(&resolved, signer).await {
                Ok(outcome) => {
                    entry.calls.push(CallReport {
                        method: resolved.method,
                        args: resolved.args,
                        outcome,
                    });
                    if let Some(call) = entry.calls.last() {
                        self.listener
                            .on_event(&ExecutionEvent::CallFinished { index, call });
                    }
                }
                Err(source) => {
                    return Err(StepFailure {
                        partial: Some(entry),
                        error: ExecutionError::CallFailed {
                            step: index,
                            call: call_index,
                            method: resolved.method,
                            source,
                        },
                    });
                }
            }
        }

        entry.completed_at = Utc::now();
        entry.complete = true;
        Ok(entry)
    }

    /// Resolve arguments against the report so far.
    ///
    /// `own` is the address of the running step once it has been created;
    /// only init calls may refer to it.
    fn resolve_args(
        &self,
        index: usize,
        args: &[Arg],
        report: &ExecutionReport,
        own: Option<Address>,
    ) -> Result<Vec<ArgValue>, ExecutionError> {
        args.iter()
            .map(|arg| match arg {
                Arg::Value(value) => Ok(value.clone()),
                Arg::Account { account } => self
                    .accounts
                    .get(*account)
                    .map(ArgValue::Address)
                    .ok_or(ExecutionError::UnknownAccount {
                        step: index,
                        index: *account,
                    }),
                Arg::Ref { step: target } => {
                    let address = match target {
                        StepRef::Index(t) if *t == index => own,
                        StepRef::Index(t) if *t < index => report.address_of(*t),
                        // Names are rewritten by plan validation and forward
                        // references are rejected there.
                        _ => None,
                    };
                    address
                        .map(ArgValue::Address)
                        .ok_or_else(|| ExecutionError::UnresolvedReference {
                            step: index,
                            target: target.clone(),
                        })
                }
            })
            .collect()
    }
}

/// Run `plan` against `gateway`, signing with the accounts' signer.
pub async fn execute<G: FactoryGateway>(
    plan: &DeploymentPlan,
    gateway: &G,
    accounts: &Accounts,
) -> Result<ExecutionReport, Halted> {
    Sequencer::new(gateway, accounts).execute(plan).await
}
