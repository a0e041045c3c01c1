//! Solana Wallet
//!
//! Keypair-backed implementation of the wallet port. The keypair loads once
//! at startup; a missing or corrupt file is a configuration error surfaced
//! at enable time.

use std::sync::Arc;

use async_trait::async_trait;
use solana_account_decoder::UiAccountData;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::str::FromStr;

use crate::ports::wallet::{WalletError, WalletPort};

pub struct SolanaWallet {
    keypair: Keypair,
    rpc: Arc<RpcClient>,
}

impl std::fmt::Debug for SolanaWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaWallet")
            .field("pubkey", &self.keypair.pubkey())
            .finish_non_exhaustive()
    }
}

impl SolanaWallet {
    /// Load the signing keypair from a JSON byte-array file. Supports `~`
    /// expansion.
    pub fn from_file(path: &str, rpc: Arc<RpcClient>) -> Result<Self, WalletError> {
        let expanded = shellexpand::tilde(path).to_string();
        let keypair = solana_sdk::signature::read_keypair_file(&expanded).map_err(|e| {
            WalletError::Credentials(format!("cannot load keypair from '{expanded}': {e}"))
        })?;
        Ok(Self { keypair, rpc })
    }

    /// Random keypair, for tests and dry runs.
    pub fn new_random(rpc: Arc<RpcClient>) -> Self {
        Self {
            keypair: Keypair::new(),
            rpc,
        }
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl WalletPort for SolanaWallet {
    fn address(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    fn verify_credentials(&self) -> Result<(), WalletError> {
        // The keypair was validated when it was loaded.
        Ok(())
    }

    async fn token_balance(&self, mint: &str) -> Result<u64, WalletError> {
        let mint_key = Pubkey::from_str(mint)
            .map_err(|e| WalletError::Rpc(format!("bad mint '{mint}': {e}")))?;
        let accounts = self
            .rpc
            .get_token_accounts_by_owner(&self.keypair.pubkey(), TokenAccountsFilter::Mint(mint_key))
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        if accounts.is_empty() {
            return Err(WalletError::NoTokenAccount(mint.to_string()));
        }

        let mut total: u64 = 0;
        for keyed in accounts {
            if let UiAccountData::Json(parsed) = keyed.account.data {
                let amount = parsed.parsed["info"]["tokenAmount"]["amount"]
                    .as_str()
                    .and_then(|raw| raw.parse::<u64>().ok())
                    .unwrap_or(0);
                total = total.saturating_add(amount);
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rpc() -> Arc<RpcClient> {
        Arc::new(RpcClient::new("http://127.0.0.1:8899".to_string()))
    }

    #[test]
    fn test_from_file_roundtrip() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bytes: Vec<u8> = keypair.to_bytes().to_vec();
        write!(file, "{:?}", bytes).unwrap();

        let wallet = SolanaWallet::from_file(file.path().to_str().unwrap(), rpc()).unwrap();
        assert_eq!(wallet.address(), keypair.pubkey().to_string());
        assert!(wallet.verify_credentials().is_ok());
    }

    #[test]
    fn test_from_missing_file() {
        let err = SolanaWallet::from_file("/nonexistent/keypair.json", rpc()).unwrap_err();
        assert!(matches!(err, WalletError::Credentials(_)));
    }

    #[test]
    fn test_random_wallet_has_address() {
        let wallet = SolanaWallet::new_random(rpc());
        assert!(!wallet.address().is_empty());
    }
}
