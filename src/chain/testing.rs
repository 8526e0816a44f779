//! In-memory chain used by the pool and engine tests

use super::{ChainClient, SignedTransfer};
use crate::error::{FaucetError, FaucetResult};

use async_trait::async_trait;
use ethers::types::{Address, BlockNumber, H256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// What the fake node does once asked for a receipt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReceiptPlan {
    /// Mined with status 1 after `pending_polls` not-found answers
    Success { pending_polls: u32 },
    /// Mined with status 0
    Revert { pending_polls: u32 },
    /// Receipt lookup fails with a node error
    NodeError,
    /// Never mined
    Pending,
}

#[derive(Default)]
struct State {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, U256>,
    failing_balance: HashSet<Address>,
    failing_broadcast: HashSet<Address>,
    receipt_plans: HashMap<Address, ReceiptPlan>,
    pending: HashMap<H256, (Address, ReceiptPlan)>,
    broadcasts: Vec<SignedTransfer>,
    balance_queries: Vec<Address>,
    in_flight: HashSet<Address>,
    max_in_flight: usize,
    double_sends: usize,
}

pub struct FakeChain {
    chain_id: u64,
    gas_price: Mutex<Option<U256>>,
    default_plan: Mutex<ReceiptPlan>,
    latency: Duration,
    state: Mutex<State>,
}

impl FakeChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            gas_price: Mutex::new(Some(U256::from(1_000_000_000u64))),
            default_plan: Mutex::new(ReceiptPlan::Success { pending_polls: 0 }),
            latency: Duration::ZERO,
            state: Mutex::new(State::default()),
        }
    }

    /// Delay every node call, widening the window for races
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(address, balance);
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state
            .lock()
            .unwrap()
            .nonces
            .insert(address, U256::from(nonce));
    }

    pub fn set_gas_price(&self, price: Option<U256>) {
        *self.gas_price.lock().unwrap() = price;
    }

    pub fn set_default_plan(&self, plan: ReceiptPlan) {
        *self.default_plan.lock().unwrap() = plan;
    }

    pub fn set_receipt_plan(&self, sender: Address, plan: ReceiptPlan) {
        self.state.lock().unwrap().receipt_plans.insert(sender, plan);
    }

    pub fn fail_balance_queries(&self, address: Address) {
        self.state.lock().unwrap().failing_balance.insert(address);
    }

    pub fn fail_broadcasts(&self, sender: Address) {
        self.state.lock().unwrap().failing_broadcast.insert(sender);
    }

    pub fn broadcasts(&self) -> Vec<SignedTransfer> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn balance_queries(&self) -> Vec<Address> {
        self.state.lock().unwrap().balance_queries.clone()
    }

    /// Highest number of senders with an unmined transaction at once
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    /// Broadcasts from a sender that already had an unmined transaction
    pub fn double_sends(&self) -> usize {
        self.state.lock().unwrap().double_sends
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn balance_of(&self, address: Address, _block: BlockNumber) -> FaucetResult<U256> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        state.balance_queries.push(address);
        if state.failing_balance.contains(&address) {
            return Err(FaucetError::Query {
                operation: "balance".to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }

    async fn suggest_gas_price(&self) -> FaucetResult<U256> {
        self.gas_price
            .lock()
            .unwrap()
            .ok_or_else(|| FaucetError::Query {
                operation: "gas price".to_string(),
                message: "injected failure".to_string(),
            })
    }

    async fn next_nonce(&self, address: Address) -> FaucetResult<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nonces
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn broadcast(&self, transfer: &SignedTransfer) -> FaucetResult<H256> {
        self.delay().await;
        let default_plan = *self.default_plan.lock().unwrap();
        let mut state = self.state.lock().unwrap();

        if state.failing_broadcast.contains(&transfer.from) {
            return Err(FaucetError::Broadcast {
                signer: format!("{:?}", transfer.from),
                message: "injected failure".to_string(),
            });
        }

        let expected = state.nonces.get(&transfer.from).copied().unwrap_or_default();
        if transfer.nonce < expected {
            return Err(FaucetError::Broadcast {
                signer: format!("{:?}", transfer.from),
                message: "nonce too low".to_string(),
            });
        }

        if !state.in_flight.insert(transfer.from) {
            state.double_sends += 1;
        }
        state.max_in_flight = state.max_in_flight.max(state.in_flight.len());

        state.nonces.insert(transfer.from, transfer.nonce + 1);
        let from_balance = state.balances.entry(transfer.from).or_default();
        *from_balance = from_balance.saturating_sub(transfer.value);
        *state.balances.entry(transfer.to).or_default() += transfer.value;

        let plan = state
            .receipt_plans
            .get(&transfer.from)
            .copied()
            .unwrap_or(default_plan);
        state.pending.insert(transfer.hash, (transfer.from, plan));
        state.broadcasts.push(transfer.clone());

        Ok(transfer.hash)
    }

    async fn receipt_status(&self, tx_hash: H256) -> FaucetResult<bool> {
        let mut state = self.state.lock().unwrap();
        let not_found = || FaucetError::ReceiptNotFound {
            tx_hash: format!("{:?}", tx_hash),
        };

        let (sender, plan) = match state.pending.get_mut(&tx_hash) {
            Some(entry) => entry,
            None => return Err(not_found()),
        };
        let sender = *sender;

        let outcome = match plan {
            ReceiptPlan::Pending => return Err(not_found()),
            ReceiptPlan::Success { pending_polls } | ReceiptPlan::Revert { pending_polls }
                if *pending_polls > 0 =>
            {
                *pending_polls -= 1;
                return Err(not_found());
            }
            ReceiptPlan::Success { .. } => Ok(true),
            ReceiptPlan::Revert { .. } => Ok(false),
            ReceiptPlan::NodeError => Err(FaucetError::Query {
                operation: "receipt".to_string(),
                message: "injected failure".to_string(),
            }),
        };

        state.pending.remove(&tx_hash);
        state.in_flight.remove(&sender);
        outcome
    }
}
