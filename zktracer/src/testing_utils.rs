//! A set of utility functions and types to be used by `zktracer` unit and
//! integration tests, and by hosts testing their own callback wiring.

use bytes::Bytes;
use env_logger::{try_init_from_env, Env, DEFAULT_FILTER_ENV};
use ethereum_types::{Address, U256};
use hashbrown::{HashMap, HashSet};

use crate::host::WorldView;

pub fn init_logger() {
    let _ = try_init_from_env(Env::default().filter_or(DEFAULT_FILTER_ENV, "info"));
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockAccount {
    pub nonce: u64,
    pub balance: U256,
    pub code: Bytes,
}

/// An in-memory world state. Unknown accounts read as empty and cold.
#[derive(Clone, Debug, Default)]
pub struct MockWorld {
    accounts: HashMap<Address, MockAccount>,
    warm: HashSet<Address>,
}

impl MockWorld {
    pub fn account_mut(&mut self, address: Address) -> &mut MockAccount {
        self.accounts.entry(address).or_default()
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.account_mut(address).nonce = nonce;
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.account_mut(address).balance = balance;
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) {
        self.account_mut(address).code = code;
    }

    /// Marks an address as accessed in the current transaction.
    pub fn warm(&mut self, address: Address) {
        self.warm.insert(address);
    }
}

impl WorldView for MockWorld {
    fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |a| a.nonce)
    }

    fn balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map_or_else(U256::zero, |a| a.balance)
    }

    fn code(&self, address: &Address) -> Bytes {
        self.accounts
            .get(address)
            .map(|a| a.code.clone())
            .unwrap_or_default()
    }

    fn is_warm(&self, address: &Address) -> bool {
        self.warm.contains(address)
    }
}
