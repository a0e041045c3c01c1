//! Jupiter Swap Router
//!
//! Implements [`SwapRoutingPort`] against the Jupiter V6 swap API: quote via
//! GET /quote, transaction build via POST /swap, submission and signature
//! lookup through the Solana RPC. The quote's full JSON is carried opaquely
//! in [`Route::payload`] so the /swap call replays it unmodified.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionConfirmationStatus;

use crate::adapters::wallet::SolanaWallet;
use crate::ports::swap::{Route, SwapError, SwapRoutingPort, TxStatus};
use crate::ports::wallet::WalletPort;

/// Wrapped SOL mint, the exit output for every emergency swap.
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Base network fee estimate (one signature) used for priority fee scaling.
const BASE_FEE_LAMPORTS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct JupiterConfig {
    /// Base URL for the Jupiter swap API
    pub api_base_url: String,
    /// Optional API key for higher rate limits
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.jup.ag/swap/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Subset of the Jupiter /quote response the router needs; the complete
/// body rides along in `payload`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    input_mint: String,
    output_mint: String,
    in_amount: String,
    out_amount: String,
    other_amount_threshold: String,
    slippage_bps: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    /// Base64 encoded transaction, ready to sign and send
    swap_transaction: String,
}

pub struct JupiterRouter {
    config: JupiterConfig,
    http: Client,
    rpc: Arc<RpcClient>,
    wallet: Arc<SolanaWallet>,
}

impl JupiterRouter {
    pub fn new(
        config: JupiterConfig,
        rpc: Arc<RpcClient>,
        wallet: Arc<SolanaWallet>,
    ) -> Result<Self, SwapError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SwapError::Transport(format!("http client: {e}")))?;
        Ok(Self {
            config,
            http,
            rpc,
            wallet,
        })
    }

    fn with_api_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => req.header("x-api-key", key),
            _ => req,
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, SwapError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SwapError::Transport(e.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(map_http_error(status, &body))
        }
    }
}

/// Classify an HTTP failure into retryable and terminal swap errors.
fn map_http_error(status: StatusCode, body: &str) -> SwapError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SwapError::RateLimited(format!("jupiter returned 429: {body}"));
    }
    if body.contains("COULD_NOT_FIND_ANY_ROUTE") || body.contains("NO_ROUTES_FOUND") {
        return SwapError::RouteUnavailable(body.to_string());
    }
    if status.is_client_error() {
        return SwapError::InvalidParameters(format!("{status}: {body}"));
    }
    SwapError::Transport(format!("{status}: {body}"))
}

fn map_request_error(e: reqwest::Error) -> SwapError {
    if e.is_timeout() {
        SwapError::Timeout(e.to_string())
    } else {
        SwapError::Transport(e.to_string())
    }
}

fn parse_amount(raw: &str, field: &str) -> Result<u64, SwapError> {
    raw.parse::<u64>()
        .map_err(|_| SwapError::InvalidParameters(format!("unparseable {field}: {raw}")))
}

/// Build a [`Route`] from a raw quote body.
fn route_from_quote(body: &str) -> Result<Route, SwapError> {
    let quote: QuoteResponse = serde_json::from_str(body)
        .map_err(|e| SwapError::InvalidParameters(format!("malformed quote: {e}")))?;
    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| SwapError::InvalidParameters(format!("malformed quote: {e}")))?;

    Ok(Route {
        input_mint: quote.input_mint,
        output_mint: quote.output_mint,
        in_amount: parse_amount(&quote.in_amount, "inAmount")?,
        out_amount: parse_amount(&quote.out_amount, "outAmount")?,
        min_out_amount: parse_amount(&quote.other_amount_threshold, "otherAmountThreshold")?,
        slippage_bps: quote.slippage_bps,
        base_fee_lamports: BASE_FEE_LAMPORTS,
        payload,
    })
}

#[async_trait]
impl SwapRoutingPort for JupiterRouter {
    async fn quote(
        &self,
        token_mint: &str,
        amount: u64,
        max_slippage_bps: u16,
    ) -> Result<Route, SwapError> {
        let url = format!("{}/quote", self.config.api_base_url);
        let req = self.http.get(&url).query(&[
            ("inputMint", token_mint),
            ("outputMint", SOL_MINT),
            ("amount", &amount.to_string()),
            ("slippageBps", &max_slippage_bps.to_string()),
        ]);

        let response = self
            .with_api_key(req)
            .send()
            .await
            .map_err(map_request_error)?;
        let body = Self::read_body(response).await?;
        route_from_quote(&body)
    }

    async fn submit(&self, route: &Route, priority_fee_lamports: u64) -> Result<String, SwapError> {
        let url = format!("{}/swap", self.config.api_base_url);
        let req = self.http.post(&url).json(&serde_json::json!({
            "userPublicKey": self.wallet.address(),
            "quoteResponse": route.payload,
            "prioritizationFeeLamports": priority_fee_lamports,
            "dynamicComputeUnitLimit": true,
        }));

        let response = self
            .with_api_key(req)
            .send()
            .await
            .map_err(map_request_error)?;
        let body = Self::read_body(response).await?;
        let swap: SwapResponse = serde_json::from_str(&body)
            .map_err(|e| SwapError::InvalidParameters(format!("malformed swap response: {e}")))?;

        let tx_bytes = base64::engine::general_purpose::STANDARD
            .decode(&swap.swap_transaction)
            .map_err(|e| SwapError::InvalidParameters(format!("transaction decode: {e}")))?;
        let unsigned: VersionedTransaction = bincode::deserialize(&tx_bytes)
            .map_err(|e| SwapError::InvalidParameters(format!("transaction deserialize: {e}")))?;
        let signed = VersionedTransaction::try_new(unsigned.message, &[self.wallet.keypair()])
            .map_err(|e| SwapError::InvalidParameters(format!("signing failed: {e}")))?;

        let signature = self
            .rpc
            .send_transaction(&signed)
            .await
            .map_err(|e| classify_rpc_send_error(&e.to_string()))?;
        Ok(signature.to_string())
    }

    async fn status(&self, signature: &str) -> Result<TxStatus, SwapError> {
        let sig = Signature::from_str(signature)
            .map_err(|e| SwapError::InvalidParameters(format!("bad signature: {e}")))?;
        let statuses = self
            .rpc
            .get_signature_statuses(&[sig])
            .await
            .map_err(|e| SwapError::Transport(e.to_string()))?;

        match statuses.value.into_iter().next().flatten() {
            None => Ok(TxStatus::Pending),
            Some(status) if status.err.is_some() => Ok(TxStatus::Failed),
            Some(status) => match status.confirmation_status {
                Some(TransactionConfirmationStatus::Confirmed)
                | Some(TransactionConfirmationStatus::Finalized) => Ok(TxStatus::Confirmed),
                _ => Ok(TxStatus::Pending),
            },
        }
    }
}

/// Submission errors from the RPC: balance and slippage program errors are
/// terminal, everything else is a transport problem worth retrying.
fn classify_rpc_send_error(message: &str) -> SwapError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient") {
        SwapError::InsufficientBalance(message.to_string())
    } else if lower.contains("slippage") || lower.contains("0x1771") {
        SwapError::SlippageExceeded
    } else {
        SwapError::Transport(message.to_string())
    }
}
