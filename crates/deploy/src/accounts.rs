//! Accounts managed by the ledger node.

use alloy_core::primitives::Address;

use crate::rpc::RpcClient;

/// The accounts a run may sign with or name in arguments.
///
/// Index `signer_index` is the signer used for every creation and mutating call.
/// Plans name the others through `{ account = N }` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accounts {
    available: Vec<Address>,
    signer_index: usize,
}

impl Accounts {
    /// Create an account set. Fails if `signer_index` is not one of `available`.
    pub fn new(available: Vec<Address>, signer_index: usize) -> Result<Self, anyhow::Error> {
        if signer_index >= available.len() {
            anyhow::bail!(
                "Signer index {} is out of range ({} account(s) available)",
                signer_index,
                available.len()
            );
        }

        Ok(Self {
            available,
            signer_index,
        })
    }

    /// A set holding only the signer.
    pub fn single(signer: Address) -> Self {
        Self {
            available: vec![signer],
            signer_index: 0,
        }
    }

    /// `count` random accounts, for dry runs.
    pub fn random(count: usize, signer_index: usize) -> Result<Self, anyhow::Error> {
        let available = (0..count)
            .map(|_| Address::from(rand::random::<[u8; 20]>()))
            .collect();
        Self::new(available, signer_index)
    }

    /// Fetch the node-managed accounts with `eth_accounts`.
    pub async fn fetch(rpc: &RpcClient, signer_index: usize) -> Result<Self, anyhow::Error> {
        let available: Vec<Address> = rpc.call("eth_accounts", vec![]).await?;

        tracing::debug!(
            accounts = available.len(),
            signer_index,
            "Fetched node accounts"
        );

        Self::new(available, signer_index)
    }

    /// The address used to sign every mutating operation.
    pub fn signer(&self) -> Address {
        self.available[self.signer_index]
    }

    pub fn get(&self, index: usize) -> Option<Address> {
        self.available.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_and_lookup() {
        let accounts = Accounts::new(
            vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            1,
        )
        .unwrap();
        assert_eq!(accounts.signer(), Address::repeat_byte(2));
        assert_eq!(accounts.get(0), Some(Address::repeat_byte(1)));
        assert_eq!(accounts.get(2), None);
    }

    #[test]
    fn test_signer_out_of_range() {
        assert!(Accounts::new(vec![Address::repeat_byte(1)], 1).is_err());
        assert!(Accounts::new(vec![], 0).is_err());
    }

    #[test]
    fn test_random_accounts() {
        let accounts = Accounts::random(10, 3).unwrap();
        assert_eq!(accounts.len(), 10);
        assert_eq!(accounts.get(3), Some(accounts.signer()));
        assert!(Accounts::random(2, 2).is_err());
    }
}
