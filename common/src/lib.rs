//! Constants and tables of the Ethereum protocol that every tracer crate
//! needs to agree on: gas schedule, RLP prefixes, precompile addresses and
//! the opcode table.

use ethereum_types::{Address, H256};
use hex_literal::hex;

pub mod constants;
pub mod opcode;

pub use opcode::{InstructionFamily, OpCode, OpCodeInfo};

/// The hash value of an account empty EVM code.
/// 0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470
pub const EMPTY_CODE_HASH: H256 = H256([
    197, 210, 70, 1, 134, 247, 35, 60, 146, 126, 125, 178, 220, 199, 3, 192, 229, 0, 182, 83, 202,
    130, 39, 59, 123, 250, 216, 4, 93, 133, 164, 112,
]);

/// SHA2-256 digest of the empty byte string.
pub const EMPTY_SHA2_HASH: H256 = H256(hex!(
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
));

/// RIPEMD-160 digest of the empty byte string, left-padded to a word.
pub const EMPTY_RIPEMD_HASH: H256 = H256(hex!(
    "0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31"
));

/// Precompiled contracts, indexed by their address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrecompileKind {
    EcRecover = 0x01,
    Sha2_256 = 0x02,
    Ripemd160 = 0x03,
    Identity = 0x04,
    ModExp = 0x05,
    EcAdd = 0x06,
    EcMul = 0x07,
    EcPairing = 0x08,
    Blake2f = 0x09,
}

impl PrecompileKind {
    pub const ALL: [PrecompileKind; 9] = [
        PrecompileKind::EcRecover,
        PrecompileKind::Sha2_256,
        PrecompileKind::Ripemd160,
        PrecompileKind::Identity,
        PrecompileKind::ModExp,
        PrecompileKind::EcAdd,
        PrecompileKind::EcMul,
        PrecompileKind::EcPairing,
        PrecompileKind::Blake2f,
    ];

    /// Returns the precompile living at `address`, if any.
    pub fn from_address(address: &Address) -> Option<Self> {
        let bytes = address.as_bytes();
        if bytes[..19].iter().any(|&b| b != 0) {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|kind| *kind as u8 == bytes[19])
    }

    pub fn address(self) -> Address {
        Address::from_low_u64_be(self as u64)
    }

    /// The elliptic curve precompiles handled by the `EC_DATA` module.
    pub const fn is_ec_data(self) -> bool {
        matches!(
            self,
            PrecompileKind::EcRecover
                | PrecompileKind::EcAdd
                | PrecompileKind::EcMul
                | PrecompileKind::EcPairing
        )
    }
}

#[cfg(test)]
mod tests {
    use sha2::Digest;

    use super::*;

    #[test]
    fn test_empty_code_hash() {
        assert_eq!(EMPTY_CODE_HASH, keccak_hash::keccak([]));
    }

    #[test]
    fn test_empty_precompile_hashes() {
        assert_eq!(
            EMPTY_SHA2_HASH.as_bytes(),
            sha2::Sha256::digest(b"").as_slice()
        );
        assert_eq!(
            &EMPTY_RIPEMD_HASH.as_bytes()[12..],
            ripemd::Ripemd160::digest(b"").as_slice()
        );
    }

    #[test]
    fn test_null_rlp_is_short_string_prefix() {
        assert_eq!(
            bytes::Bytes::from_static(&rlp::NULL_RLP)[0],
            constants::RLP_PREFIX_INT_SHORT
        );
    }

    #[test]
    fn precompile_addresses() {
        for kind in PrecompileKind::ALL {
            assert_eq!(PrecompileKind::from_address(&kind.address()), Some(kind));
        }
        assert_eq!(PrecompileKind::from_address(&Address::zero()), None);
        assert_eq!(
            PrecompileKind::from_address(&Address::from_low_u64_be(0x0a)),
            None
        );
        assert_eq!(
            PrecompileKind::from_address(&Address::from_low_u64_be(0x0101)),
            None
        );
    }
}
