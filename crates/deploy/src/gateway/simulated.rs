//! In-memory ledger for dry runs and tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use alloy_core::primitives::{Address, TxHash};

use super::{Creation, FactoryGateway, ResolvedCall};
use crate::{
    error::GatewayError,
    plan::{ArgValue, CallKind, ResourceType},
    report::CallOutcome,
};

/// A creation the simulated ledger accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedCreation {
    pub resource_type: ResourceType,
    pub args: Vec<ArgValue>,
    pub address: Address,
    pub signer: Address,
}

/// A call the simulated ledger received, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedCall {
    pub address: Address,
    pub method: String,
    pub args: Vec<ArgValue>,
    pub kind: CallKind,
    pub signer: Address,
}

#[derive(Debug, Default)]
struct Ledger {
    creations: Vec<SimulatedCreation>,
    calls: Vec<SimulatedCall>,
    resources: HashMap<Address, ResourceType>,
}

/// Gateway that creates resources in memory at random addresses.
///
/// Every resource type is accepted unless [`Self::known_types`] restricts them.
/// Rejections, call failures and read results can be scripted up front.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    known_types: Option<HashSet<ResourceType>>,
    rejections: HashMap<ResourceType, String>,
    call_failures: HashMap<String, String>,
    read_results: HashMap<String, Vec<String>>,
    ledger: Mutex<Ledger>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept these resource types; anything else is unknown.
    pub fn known_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ResourceType>,
    {
        self.known_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Reject every creation of `resource_type` with `reason`.
    pub fn reject(mut self, resource_type: impl Into<ResourceType>, reason: impl Into<String>) -> Self {
        self.rejections.insert(resource_type.into(), reason.into());
        self
    }

    /// Fail every call to `method` with `reason`.
    pub fn fail_call(mut self, method: impl Into<String>, reason: impl Into<String>) -> Self {
        self.call_failures.insert(method.into(), reason.into());
        self
    }

    /// Values returned by reads of `method`. Reads without a scripted result return nothing.
    pub fn read_result<I, S>(mut self, method: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_results
            .insert(method.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Every accepted creation, in order.
    pub fn creations(&self) -> Vec<SimulatedCreation> {
        self.ledger().creations.clone()
    }

    /// Every received call, in order.
    pub fn calls(&self) -> Vec<SimulatedCall> {
        self.ledger().calls.clone()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn random_address() -> Address {
    Address::from(rand::random::<[u8; 20]>())
}

fn random_tx_hash() -> TxHash {
    TxHash::from(rand::random::<[u8; 32]>())
}

impl FactoryGateway for SimulatedGateway {
    async fn create_instance(
        &self,
        resource_type: &ResourceType,
        args: &[ArgValue],
        signer: Address,
    ) -> Result<Creation, GatewayError> {
        if let Some(known) = &self.known_types {
            if !known.contains(resource_type) {
                return Err(GatewayError::UnknownResourceType(resource_type.clone()));
            }
        }

        if let Some(reason) = self.rejections.get(resource_type) {
            return Err(GatewayError::Rejected(reason.clone()));
        }

        let address = random_address();
        let mut ledger = self.ledger();
        ledger.resources.insert(address, resource_type.clone());
        ledger.creations.push(SimulatedCreation {
            resource_type: resource_type.clone(),
            args: args.to_vec(),
            address,
            signer,
        });

        tracing::debug!(%resource_type, %address, "Simulated creation");

        Ok(Creation {
            address,
            tx_hash: Some(random_tx_hash()),
        })
    }

    async fn invoke(
        &self,
        resource_type: &ResourceType,
        address: Address,
        call: &ResolvedCall,
        signer: Address,
    ) -> Result<CallOutcome, GatewayError> {
        let mut ledger = self.ledger();
        ledger.calls.push(SimulatedCall {
            address,
            method: call.method.clone(),
            args: call.args.clone(),
            kind: call.kind,
            signer,
        });

        if ledger.resources.get(&address) != Some(resource_type) {
            return Err(GatewayError::Rejected(format!(
                "no {} at {}",
                resource_type, address
            )));
        }

        if let Some(reason) = self.call_failures.get(&call.method) {
            return Err(GatewayError::Rejected(reason.clone()));
        }

        Ok(match call.kind {
            CallKind::Read => CallOutcome::Read {
                values: self.read_results.get(&call.method).cloned().unwrap_or_default(),
            },
            CallKind::Write => CallOutcome::Receipt {
                tx_hash: random_tx_hash(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_creations_and_calls() {
        let gateway = SimulatedGateway::new().read_result("getReward", ["42"]);
        let vault = ResourceType::new("VaultFlipToCake");
        let signer = Address::repeat_byte(0xaa);

        let creation = gateway
            .create_instance(&vault, &[ArgValue::Int(0)], signer)
            .await
            .unwrap();

        let read = ResolvedCall {
            method: "getReward".to_string(),
            args: vec![],
            kind: CallKind::Read,
        };
        let outcome = gateway
            .at(&vault, creation.address)
            .invoke(&read, signer)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CallOutcome::Read {
                values: vec!["42".to_string()]
            }
        );
        assert_eq!(gateway.creations().len(), 1);
        assert_eq!(gateway.creations()[0].signer, signer);
        assert_eq!(gateway.calls()[0].method, "getReward");
    }

    #[tokio::test]
    async fn test_unknown_and_rejected_types() {
        let gateway = SimulatedGateway::new()
            .known_types(["BunnyToken", "BunnyPool"])
            .reject("BunnyPool", "duplicate name");

        let unknown = gateway
            .create_instance(&ResourceType::new("Nope"), &[], Address::ZERO)
            .await;
        assert!(matches!(unknown, Err(GatewayError::UnknownResourceType(_))));

        let rejected = gateway
            .create_instance(&ResourceType::new("BunnyPool"), &[], Address::ZERO)
            .await;
        assert!(matches!(rejected, Err(GatewayError::Rejected(reason)) if reason == "duplicate name"));

        assert!(gateway.creations().is_empty());
    }

    #[tokio::test]
    async fn test_call_on_missing_resource_fails() {
        let gateway = SimulatedGateway::new();
        let call = ResolvedCall {
            method: "initialize".to_string(),
            args: vec![],
            kind: CallKind::Write,
        };
        let result = gateway
            .invoke(&ResourceType::new("Vault"), Address::ZERO, &call, Address::ZERO)
            .await;
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
    }
}
