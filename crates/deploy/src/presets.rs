//! Built-in plans for the Bunny and Rubi contract suites.

use serde::{Deserialize, Serialize};

use crate::plan::{Arg, InitCall, Step};

/// Deposit used to seed the reward vaults.
const VAULT_SEED_DEPOSIT: i64 = 1000;

/// A named, ready-to-run plan.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Bunny token, pool, minter and flip-to-flip vault.
    Bunny,
    /// Rubi governance token, minter with fee readouts, and two reward vaults.
    #[default]
    Rubi,
}

impl Preset {
    pub fn steps(&self) -> Vec<Step> {
        match self {
            Self::Bunny => bunny(),
            Self::Rubi => rubi(),
        }
    }
}

/// BunnyToken, BunnyPool(token), BunnyMinterV2(token, pool), VaultFlipToFlip.
pub fn bunny() -> Vec<Step> {
    vec![
        Step::new("BunnyToken"),
        Step::new("BunnyPool").arg(Arg::named("BunnyToken")),
        Step::new("BunnyMinterV2")
            .arg(Arg::named("BunnyToken"))
            .arg(Arg::named("BunnyPool")),
        Step::new("VaultFlipToFlip"),
    ]
}

/// The Rubi suite.
///
/// Governance of the token is delegated to account 1. The minter is initialized
/// and its fee parameters are read back. Both vaults are initialized against the
/// token and seeded with a deposit, then their reward is claimed.
pub fn rubi() -> Vec<Step> {
    vec![
        Step::new("RubiToken").call(InitCall::write("delegate", vec![Arg::account(1)])),
        Step::new("RubiPool").arg(Arg::named("RubiToken")),
        Step::new("RubiMinterV2")
            .arg(Arg::named("RubiToken"))
            .arg(Arg::named("RubiPool"))
            .call(InitCall::write("initialize", vec![]))
            .call(InitCall::read("getWithdrawalFeeFreePeriod", vec![]))
            .call(InitCall::read(
                "withdrawalFee",
                vec![Arg::value(1000i64), Arg::value(1i64)],
            )),
        reward_vault("VaultFlipToCake"),
        reward_vault("VaultRubiBNB"),
    ]
}

fn reward_vault(resource_type: &str) -> Step {
    Step::new(resource_type)
        .call(InitCall::write(
            "initialize",
            vec![Arg::value(0i64), Arg::named("RubiToken")],
        ))
        .call(InitCall::write(
            "deposit",
            vec![Arg::value(VAULT_SEED_DEPOSIT)],
        ))
        .call(InitCall::write("getReward", vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{CallKind, DeploymentPlan};

    #[test]
    fn test_presets_are_valid_plans() {
        let bunny = DeploymentPlan::new(bunny()).unwrap();
        assert_eq!(bunny.len(), 4);
        assert_eq!(
            bunny.steps()[2].constructor_args,
            vec![Arg::step(0), Arg::step(1)]
        );

        let rubi = DeploymentPlan::new(rubi()).unwrap();
        assert_eq!(rubi.len(), 5);

        let minter = &rubi.steps()[2];
        let kinds: Vec<_> = minter.init_calls.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CallKind::Write, CallKind::Read, CallKind::Read]);

        // Vaults are initialized against the token, not the step before them.
        let vault = &rubi.steps()[4];
        assert_eq!(vault.init_calls[0].args[1], Arg::step(0));

        // Claiming the reward is a transaction.
        assert_eq!(vault.init_calls[2].method, "getReward");
        assert_eq!(vault.init_calls[2].kind, CallKind::Write);
    }

    #[test]
    fn test_preset_names() {
        assert_eq!("bunny".parse::<Preset>().unwrap(), Preset::Bunny);
        assert_eq!(Preset::Rubi.to_string(), "rubi");
        assert!("cake".parse::<Preset>().is_err());
    }
}
