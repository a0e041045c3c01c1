//! Wallet Port
//!
//! Signing identity and balance lookups. Credential problems are
//! configuration errors caught at enable time, never inside the hot loop.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("wallet credentials unavailable: {0}")]
    Credentials(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("no token account for mint {0}")]
    NoTokenAccount(String),
}

#[async_trait]
pub trait WalletPort: Send + Sync {
    /// Base58 wallet address.
    fn address(&self) -> String;

    /// Check that signing credentials are present and readable.
    fn verify_credentials(&self) -> Result<(), WalletError>;

    /// Current balance of `mint` in base units.
    async fn token_balance(&self, mint: &str) -> Result<u64, WalletError>;
}
