//! Holder Distribution Fetcher
//!
//! Reads top-holder concentration straight from the chain: largest token
//! accounts against total supply. The largest-accounts RPC returns at most
//! twenty entries, so the holder count is a lower bound - enough for the
//! tiny-holder-set floor the scorer applies.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;

use crate::domain::signal::{RiskSignal, SignalSource, SignalValue};
use crate::ports::signals::{SignalError, SignalFetcher};

pub struct HolderFetcher {
    rpc: Arc<RpcClient>,
}

impl HolderFetcher {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

/// Concentration from raw largest-account amounts against total supply.
pub(crate) fn concentration(amounts: &[u64], supply: u64) -> (u64, f64) {
    let holder_count = amounts.iter().filter(|a| **a > 0).count() as u64;
    if supply == 0 {
        return (holder_count, 0.0);
    }
    let top = amounts.iter().copied().max().unwrap_or(0);
    (holder_count, top as f64 / supply as f64 * 100.0)
}

#[async_trait]
impl SignalFetcher for HolderFetcher {
    fn source(&self) -> SignalSource {
        SignalSource::HolderDistribution
    }

    async fn fetch(&self, token_mint: &str) -> Result<RiskSignal, SignalError> {
        let mint = Pubkey::from_str(token_mint)
            .map_err(|e| SignalError::Malformed(format!("bad mint '{token_mint}': {e}")))?;

        let supply = self
            .rpc
            .get_token_supply(&mint)
            .await
            .map_err(|e| SignalError::Transport(e.to_string()))?;
        let largest = self
            .rpc
            .get_token_largest_accounts(&mint)
            .await
            .map_err(|e| SignalError::Transport(e.to_string()))?;

        let supply_raw = supply
            .amount
            .parse::<u64>()
            .map_err(|_| SignalError::Malformed(format!("unparseable supply: {}", supply.amount)))?;
        let amounts: Vec<u64> = largest
            .iter()
            .filter_map(|account| account.amount.amount.parse::<u64>().ok())
            .collect();

        let (holder_count, top_holder_pct) = concentration(&amounts, supply_raw);
        Ok(RiskSignal::new(
            token_mint,
            SignalValue::Holders {
                holder_count,
                top_holder_pct,
                // Creator attribution comes from the dev-wallet source
                creator_pct: 0.0,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concentration_basic() {
        let (count, top) = concentration(&[500, 300, 200], 1_000);
        assert_eq!(count, 3);
        assert_eq!(top, 50.0);
    }

    #[test]
    fn test_concentration_ignores_empty_accounts() {
        let (count, top) = concentration(&[900, 0, 0, 100], 1_000);
        assert_eq!(count, 2);
        assert_eq!(top, 90.0);
    }

    #[test]
    fn test_concentration_zero_supply() {
        let (count, top) = concentration(&[0, 0], 0);
        assert_eq!(count, 0);
        assert_eq!(top, 0.0);
    }

    #[test]
    fn test_concentration_no_accounts() {
        let (count, top) = concentration(&[], 1_000);
        assert_eq!(count, 0);
        assert_eq!(top, 0.0);
    }
}
