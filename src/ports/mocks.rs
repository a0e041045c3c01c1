//! Recording mocks for the port traits
//!
//! Scripted, deterministic implementations used by engine tests. Each mock
//! records its calls and plays back queued outcomes; when the queue is
//! empty a benign default is returned.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::signal::{RiskSignal, SignalSource};
use crate::domain::token::TokenKey;
use crate::ports::notify::{Notifier, ProtectionEvent};
use crate::ports::signals::{SignalError, SignalFetcher};
use crate::ports::swap::{Route, SwapError, SwapRoutingPort, TxStatus};
use crate::ports::wallet::{WalletError, WalletPort};

/// Swap router mock with scripted outcomes and a submission log.
#[derive(Default)]
pub struct MockSwapRouter {
    quote_outcomes: Mutex<VecDeque<Result<Route, SwapError>>>,
    submit_outcomes: Mutex<VecDeque<Result<String, SwapError>>>,
    status_outcomes: Mutex<VecDeque<Result<TxStatus, SwapError>>>,
    submissions: Arc<Mutex<Vec<(String, u64)>>>,
    sig_counter: AtomicU64,
}

impl MockSwapRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_quote(&self, outcome: Result<Route, SwapError>) {
        self.quote_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn push_submit(&self, outcome: Result<String, SwapError>) {
        self.submit_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn push_status(&self, outcome: Result<TxStatus, SwapError>) {
        self.status_outcomes.lock().unwrap().push_back(outcome);
    }

    /// Every accepted submit as (input_mint, priority_fee_lamports).
    pub fn submissions(&self) -> Vec<(String, u64)> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    fn default_route(token_mint: &str, amount: u64, slippage_bps: u16) -> Route {
        Route {
            input_mint: token_mint.to_string(),
            output_mint: "So11111111111111111111111111111111111111112".to_string(),
            in_amount: amount,
            out_amount: amount / 2,
            min_out_amount: amount / 2 - (amount as u128 * slippage_bps as u128 / 20_000) as u64,
            slippage_bps,
            base_fee_lamports: 5_000,
            payload: serde_json::json!({"mock": true}),
        }
    }
}

#[async_trait]
impl SwapRoutingPort for MockSwapRouter {
    async fn quote(
        &self,
        token_mint: &str,
        amount: u64,
        max_slippage_bps: u16,
    ) -> Result<Route, SwapError> {
        match self.quote_outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(Self::default_route(token_mint, amount, max_slippage_bps)),
        }
    }

    async fn submit(
        &self,
        route: &Route,
        priority_fee_lamports: u64,
    ) -> Result<String, SwapError> {
        let outcome = match self.submit_outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(format!(
                "mock_sig_{}",
                self.sig_counter.fetch_add(1, Ordering::SeqCst)
            )),
        };
        if outcome.is_ok() {
            self.submissions
                .lock()
                .unwrap()
                .push((route.input_mint.clone(), priority_fee_lamports));
        }
        outcome
    }

    async fn status(&self, _signature: &str) -> Result<TxStatus, SwapError> {
        match self.status_outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(TxStatus::Confirmed),
        }
    }
}

/// Signal fetcher mock returning a fixed signal per call.
pub struct MockSignalFetcher {
    source: SignalSource,
    outcomes: Mutex<VecDeque<Result<RiskSignal, SignalError>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSignalFetcher {
    pub fn new(source: SignalSource) -> Self {
        Self {
            source,
            outcomes: Mutex::new(VecDeque::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, outcome: Result<RiskSignal, SignalError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignalFetcher for MockSignalFetcher {
    fn source(&self) -> SignalSource {
        self.source
    }

    async fn fetch(&self, token_mint: &str) -> Result<RiskSignal, SignalError> {
        self.calls.lock().unwrap().push(token_mint.to_string());
        match self.outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Err(SignalError::UnknownToken(token_mint.to_string())),
        }
    }
}

/// Wallet mock with settable per-mint balances.
pub struct MockWallet {
    address: String,
    balances: Mutex<std::collections::HashMap<String, u64>>,
    credentials_ok: Mutex<bool>,
}

impl MockWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balances: Mutex::new(std::collections::HashMap::new()),
            credentials_ok: Mutex::new(true),
        }
    }

    pub fn set_balance(&self, mint: &str, amount: u64) {
        self.balances.lock().unwrap().insert(mint.to_string(), amount);
    }

    pub fn break_credentials(&self) {
        *self.credentials_ok.lock().unwrap() = false;
    }

    pub fn restore_credentials(&self) {
        *self.credentials_ok.lock().unwrap() = true;
    }
}

#[async_trait]
impl WalletPort for MockWallet {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn verify_credentials(&self) -> Result<(), WalletError> {
        if *self.credentials_ok.lock().unwrap() {
            Ok(())
        } else {
            Err(WalletError::Credentials("keypair file missing".to_string()))
        }
    }

    async fn token_balance(&self, mint: &str) -> Result<u64, WalletError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(mint)
            .copied()
            .unwrap_or(0))
    }
}

/// Notifier mock recording every delivered event.
#[derive(Default)]
pub struct MockNotifier {
    events: Arc<Mutex<Vec<(TokenKey, ProtectionEvent)>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(TokenKey, ProtectionEvent)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, key: &TokenKey, event: ProtectionEvent) {
        self.events.lock().unwrap().push((key.clone(), event));
    }
}
