//! Capabilities the sequencer drives: creating resources and calling them.

use std::future::Future;

use alloy_core::primitives::{Address, TxHash};

use crate::{
    error::GatewayError,
    plan::{ArgValue, CallKind, ResourceType},
    report::CallOutcome,
};

pub mod rpc;
pub mod simulated;

pub use rpc::{Confirmation, RpcGateway};
pub use simulated::{SimulatedCall, SimulatedCreation, SimulatedGateway};

/// A confirmed resource creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Creation {
    pub address: Address,
    pub tx_hash: Option<TxHash>,
}

/// An init call with every argument resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub method: String,
    pub args: Vec<ArgValue>,
    pub kind: CallKind,
}

/// Factory capability of the external ledger.
///
/// Both operations block until the ledger confirms them. Implementations must
/// not retry or cache: each call is one fresh round trip.
pub trait FactoryGateway: Sync {
    /// Create a new instance of `resource_type`, signed by `signer`.
    fn create_instance(
        &self,
        resource_type: &ResourceType,
        args: &[ArgValue],
        signer: Address,
    ) -> impl Future<Output = Result<Creation, GatewayError>> + Send;

    /// Invoke a method on the resource at `address`.
    fn invoke(
        &self,
        resource_type: &ResourceType,
        address: Address,
        call: &ResolvedCall,
        signer: Address,
    ) -> impl Future<Output = Result<CallOutcome, GatewayError>> + Send;

    /// A handle to the resource of type `resource_type` living at `address`.
    fn at<'a>(&'a self, resource_type: &'a ResourceType, address: Address) -> ResourceHandle<'a, Self>
    where
        Self: Sized,
    {
        ResourceHandle {
            gateway: self,
            resource_type,
            address,
        }
    }
}

/// Reference to one created or pre-existing resource.
#[derive(Debug)]
pub struct ResourceHandle<'a, G> {
    gateway: &'a G,
    resource_type: &'a ResourceType,
    address: Address,
}

impl<G: FactoryGateway> ResourceHandle<'_, G> {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn resource_type(&self) -> &ResourceType {
        self.resource_type
    }

    /// Invoke `call` on this resource.
    pub async fn invoke(
        &self,
        call: &ResolvedCall,
        signer: Address,
    ) -> Result<CallOutcome, GatewayError> {
        self.gateway
            .invoke(self.resource_type, self.address, call, signer)
            .await
    }
}
