//! Factory gateway backed by an Ethereum JSON-RPC node.
//!
//! Transactions are sent with `eth_sendTransaction`, so the signer must be an
//! account unlocked on the node (a Hardhat or Anvil dev node, for instance).

use std::time::Duration;

use alloy_core::primitives::{Address, Bytes, TxHash};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::json;

use super::{Creation, FactoryGateway, ResolvedCall};
use crate::{
    abi,
    artifacts::ArtifactStore,
    error::GatewayError,
    plan::{ArgValue, CallKind, ResourceType},
    report::CallOutcome,
    rpc::RpcClient,
};

/// How confirmations are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// Delay between two `eth_getTransactionReceipt` polls.
    pub poll_interval: Duration,
    /// Give up on a transaction that has no receipt after this long.
    pub timeout: Duration,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

impl Confirmation {
    fn max_polls(&self) -> usize {
        let interval = self.poll_interval.as_millis().max(1);
        (self.timeout.as_millis() / interval).max(1) as usize
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    transaction_hash: TxHash,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    contract_address: Option<Address>,
}

/// Outcome of one receipt poll.
#[derive(Debug)]
enum ReceiptPoll {
    Pending,
    Failed(anyhow::Error),
}

/// Gateway that deploys artifacts and calls contracts through a JSON-RPC node.
#[derive(Debug)]
pub struct RpcGateway {
    rpc: RpcClient,
    artifacts: ArtifactStore,
    confirmation: Confirmation,
}

impl RpcGateway {
    pub fn new(rpc: RpcClient, artifacts: ArtifactStore, confirmation: Confirmation) -> Self {
        Self {
            rpc,
            artifacts,
            confirmation,
        }
    }

    /// Send a transaction and block until it is mined successfully.
    async fn transact(
        &self,
        signer: Address,
        to: Option<Address>,
        data: Bytes,
    ) -> Result<Receipt, GatewayError> {
        let mut tx = json!({ "from": signer, "data": data });
        if let Some(to) = to {
            tx["to"] = json!(to);
        }

        let tx_hash: TxHash = self
            .rpc
            .call("eth_sendTransaction", vec![tx])
            .await
            .map_err(|e| GatewayError::Rejected(format!("{:#}", e)))?;

        tracing::debug!(%tx_hash, from = %signer, to = ?to, "Transaction sent, awaiting confirmation");

        let receipt = self.wait_for_receipt(tx_hash).await?;

        if receipt.status.as_deref() == Some("0x0") {
            return Err(GatewayError::Reverted {
                tx_hash: receipt.transaction_hash,
            });
        }

        Ok(receipt)
    }

    /// Poll for the receipt of `tx_hash` at a fixed interval until it shows up.
    ///
    /// Only a missing receipt is polled again; any RPC failure ends the wait.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, GatewayError> {
        let poll = move || async move {
            let receipt: Option<Receipt> = self
                .rpc
                .call("eth_getTransactionReceipt", vec![json!(tx_hash)])
                .await
                .map_err(ReceiptPoll::Failed)?;
            receipt.ok_or(ReceiptPoll::Pending)
        };

        poll.retry(
            ConstantBuilder::default()
                .with_delay(self.confirmation.poll_interval)
                .with_max_times(self.confirmation.max_polls()),
        )
        .when(|e| matches!(e, ReceiptPoll::Pending))
        .await
        .map_err(|e| match e {
            ReceiptPoll::Pending => GatewayError::Timeout {
                tx_hash,
                timeout: self.confirmation.timeout,
            },
            ReceiptPoll::Failed(e) => GatewayError::Transport(e),
        })
    }

    async fn read(
        &self,
        signer: Address,
        to: Address,
        data: Bytes,
    ) -> Result<Bytes, GatewayError> {
        self.rpc
            .call(
                "eth_call",
                vec![json!({ "from": signer, "to": to, "data": data }), json!("latest")],
            )
            .await
            .map_err(|e| GatewayError::Rejected(format!("{:#}", e)))
    }
}

impl FactoryGateway for RpcGateway {
    async fn create_instance(
        &self,
        resource_type: &ResourceType,
        args: &[ArgValue],
        signer: Address,
    ) -> Result<Creation, GatewayError> {
        let artifact = self
            .artifacts
            .get(resource_type.as_str())
            .ok_or_else(|| GatewayError::UnknownResourceType(resource_type.clone()))?;

        let data = abi::encode_constructor(artifact, args)?;
        let receipt = self.transact(signer, None, data).await?;

        let address = receipt.contract_address.ok_or_else(|| {
            GatewayError::Rejected(format!(
                "receipt of {} has no contract address",
                receipt.transaction_hash
            ))
        })?;

        Ok(Creation {
            address,
            tx_hash: Some(receipt.transaction_hash),
        })
    }

    async fn invoke(
        &self,
        resource_type: &ResourceType,
        address: Address,
        call: &ResolvedCall,
        signer: Address,
    ) -> Result<CallOutcome, GatewayError> {
        let function = abi::resolve_function(
            self.artifacts.get(resource_type.as_str()),
            resource_type,
            &call.method,
            call.args.len(),
        )?;
        let data = abi::encode_call(&function, &call.args)?;

        match call.kind {
            CallKind::Read => {
                let output = self.read(signer, address, data).await?;
                let values = abi::decode_output(&function, &output)?;
                Ok(CallOutcome::Read { values })
            }
            CallKind::Write => {
                let receipt = self.transact(signer, Some(address), data).await?;
                Ok(CallOutcome::Receipt {
                    tx_hash: receipt.transaction_hash,
                })
            }
        }
    }
}
