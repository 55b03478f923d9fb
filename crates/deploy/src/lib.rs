//! kiln-deploy - Ordered contract deployment with back-references.
//!
//! A [`DeploymentPlan`] lists steps. Each step creates one resource through a
//! [`FactoryGateway`], possibly passing the addresses of earlier steps, then
//! runs its init calls against the new resource. The [`Sequencer`] executes
//! steps strictly in order and halts on the first failure, leaving whatever
//! was created in place.

pub mod abi;

mod accounts;
pub use accounts::Accounts;

mod artifacts;
pub use artifacts::{Artifact, ArtifactStore};

mod config;
pub use config::{
    AccountConfig, DEFAULT_RPC_URL, DeploymentConfig, KILN_CONFIG_FILENAME, RpcConfig,
};

mod error;
pub use error::{ExecutionError, GatewayError, Halted, PlanError};

pub mod gateway;
pub use gateway::{
    Confirmation, Creation, FactoryGateway, ResolvedCall, ResourceHandle, RpcGateway,
    SimulatedGateway,
};

mod plan;
pub use plan::{Arg, ArgValue, CallKind, DeploymentPlan, InitCall, ResourceType, Step, StepRef};

pub mod presets;
pub use presets::Preset;

mod report;
pub use report::{CallOutcome, CallReport, ExecutionReport, StepReport};

mod reporter;
pub use reporter::{Reporter, render_failure, summary_table};

mod rpc;
pub use rpc::{DEFAULT_REQUEST_TIMEOUT, RpcClient};

mod sequencer;
pub use sequencer::{ExecutionEvent, ExecutionListener, Sequencer, execute};
