//! Counting modules bounding precompile usage.
//!
//! These modules have no trace of their own: their line count is a resource
//! counter checked against the configured limits, like the line count of any
//! other module.

use std::fmt;

use zktracer_common::constants::PRECOMPILE_CALL_DATA_UNIT_SIZE_ECPAIRING;
use zktracer_common::PrecompileKind;

use crate::column::ColumnHeader;
use crate::container::StackedList;
use crate::error::TraceError;
use crate::module::Module;
use crate::table::TraceTable;

/// The resources counted for precompiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CountedResource {
    EcRecoverEffectiveCalls,
    Sha2Blocks,
    RipemdBlocks,
    ModexpEffectiveCalls,
    EcAddEffectiveCalls,
    EcMulEffectiveCalls,
    EcPairingEffectiveCalls,
    EcPairingMillerLoops,
    Blake2fRounds,
}

impl CountedResource {
    pub const ALL: [CountedResource; 9] = [
        CountedResource::EcRecoverEffectiveCalls,
        CountedResource::Sha2Blocks,
        CountedResource::RipemdBlocks,
        CountedResource::ModexpEffectiveCalls,
        CountedResource::EcAddEffectiveCalls,
        CountedResource::EcMulEffectiveCalls,
        CountedResource::EcPairingEffectiveCalls,
        CountedResource::EcPairingMillerLoops,
        CountedResource::Blake2fRounds,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            CountedResource::EcRecoverEffectiveCalls => "PRECOMPILE_ECRECOVER_EFFECTIVE_CALLS",
            CountedResource::Sha2Blocks => "PRECOMPILE_SHA2_BLOCKS",
            CountedResource::RipemdBlocks => "PRECOMPILE_RIPEMD_BLOCKS",
            CountedResource::ModexpEffectiveCalls => "PRECOMPILE_MODEXP_EFFECTIVE_CALLS",
            CountedResource::EcAddEffectiveCalls => "PRECOMPILE_ECADD_EFFECTIVE_CALLS",
            CountedResource::EcMulEffectiveCalls => "PRECOMPILE_ECMUL_EFFECTIVE_CALLS",
            CountedResource::EcPairingEffectiveCalls => "PRECOMPILE_ECPAIRING_EFFECTIVE_CALLS",
            CountedResource::EcPairingMillerLoops => "PRECOMPILE_ECPAIRING_MILLER_LOOPS",
            CountedResource::Blake2fRounds => "PRECOMPILE_BLAKE_ROUNDS",
        }
    }
}

impl fmt::Display for CountedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Number of 64-byte blocks SHA2-256 and RIPEMD-160 process for an input of
/// `len` bytes, padding included.
pub const fn hash_blocks(len: usize) -> usize {
    (len + 8) / 64 + 1
}

/// Number of rounds requested from BLAKE2F: the first 4 bytes of its input,
/// big-endian.
pub fn blake2f_rounds(call_data: &[u8]) -> u32 {
    let mut rounds = [0u8; 4];
    let len = call_data.len().min(4);
    rounds[..len].copy_from_slice(&call_data[..len]);
    u32::from_be_bytes(rounds)
}

/// Resources used by one successful call to `kind` with `call_data`.
pub fn resource_usage(kind: PrecompileKind, call_data: &[u8]) -> Vec<(CountedResource, usize)> {
    use CountedResource as R;
    match kind {
        PrecompileKind::EcRecover => vec![(R::EcRecoverEffectiveCalls, 1)],
        PrecompileKind::Sha2_256 => vec![(R::Sha2Blocks, hash_blocks(call_data.len()))],
        PrecompileKind::Ripemd160 => vec![(R::RipemdBlocks, hash_blocks(call_data.len()))],
        PrecompileKind::Identity => vec![],
        PrecompileKind::ModExp => vec![(R::ModexpEffectiveCalls, 1)],
        PrecompileKind::EcAdd => vec![(R::EcAddEffectiveCalls, 1)],
        PrecompileKind::EcMul => vec![(R::EcMulEffectiveCalls, 1)],
        PrecompileKind::EcPairing => vec![
            (R::EcPairingEffectiveCalls, 1),
            (
                R::EcPairingMillerLoops,
                call_data.len() / PRECOMPILE_CALL_DATA_UNIT_SIZE_ECPAIRING,
            ),
        ],
        PrecompileKind::Blake2f => vec![(R::Blake2fRounds, blake2f_rounds(call_data) as usize)],
    }
}

/// A module whose line count is a counter.
#[derive(Debug)]
pub struct CountingModule {
    resource: CountedResource,
    increments: StackedList<usize>,
}

impl CountingModule {
    pub const fn new(resource: CountedResource) -> Self {
        Self {
            resource,
            increments: StackedList::new(),
        }
    }

    pub const fn resource(&self) -> CountedResource {
        self.resource
    }

    pub fn add(&mut self, amount: usize) {
        if amount > 0 {
            self.increments.push(amount);
        }
    }
}

impl Module for CountingModule {
    fn module_key(&self) -> &'static str {
        self.resource.key()
    }

    fn enter_transaction(&mut self) {
        self.increments.enter();
    }

    fn pop_transaction(&mut self) {
        self.increments.pop();
    }

    fn line_count(&self) -> usize {
        self.increments.iter().sum()
    }

    fn columns_headers(&self) -> Vec<ColumnHeader> {
        vec![]
    }

    fn commit(&self, _table: &mut TraceTable) -> Result<(), TraceError> {
        Ok(())
    }
}

/// One [`CountingModule`] per [`CountedResource`].
#[derive(Debug)]
pub struct PrecompileLimits {
    counters: Vec<CountingModule>,
}

impl Default for PrecompileLimits {
    fn default() -> Self {
        Self {
            counters: CountedResource::ALL
                .into_iter()
                .map(CountingModule::new)
                .collect(),
        }
    }
}

impl PrecompileLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one successful precompile call.
    pub fn record(&mut self, kind: PrecompileKind, call_data: &[u8]) {
        for (resource, amount) in resource_usage(kind, call_data) {
            self.counter_mut(resource).add(amount);
        }
    }

    pub fn count(&self, resource: CountedResource) -> usize {
        self.counters
            .iter()
            .find(|counter| counter.resource == resource)
            .map_or(0, Module::line_count)
    }

    pub fn counters(&self) -> &[CountingModule] {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut [CountingModule] {
        &mut self.counters
    }

    fn counter_mut(&mut self, resource: CountedResource) -> &mut CountingModule {
        // `counters` holds every resource, in declaration order.
        &mut self.counters[resource as usize]
    }
}
