//! RLP tracing of contract address derivation.
//!
//! Every contract creation (CREATE, CREATE2 and deployment transactions)
//! derives the new contract's address by hashing an RLP or concatenated
//! encoding of the deployer's address. This module traces the limbs fed to
//! that hash: 8 rows for the CREATE recipe, 6 rows for the CREATE2 recipe.

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use rlp::RlpStream;
use static_assertions::const_assert_eq;
use zktracer_common::constants::{
    CREATE2_SHIFT, LLARGE, RLP_ADDR_RECIPE_1, RLP_ADDR_RECIPE_2, RLP_PREFIX_INT_SHORT,
    RLP_PREFIX_LIST_SHORT,
};
use zktracer_proc_macro::TraceRow;

use crate::column::ColumnHeader;
use crate::container::StackedList;
use crate::encoding::{bit_decomposition, byte_counting, minimal_bytes, pad_left, pad_right};
use crate::error::TraceError;
use crate::module::Module;
use crate::table::{TraceRow, TraceTable};

pub const MODULE_KEY: &str = "rlpAddr";
/// Number of columns of the `rlpAddr` table.
pub const NUM_COLUMNS: usize = 25;

const CREATE_ROWS: usize = 8;
const CREATE2_ROWS: usize = 6;
/// RLP prefix of a 20-byte string.
const ADDRESS_PREFIX: u8 = RLP_PREFIX_INT_SHORT + 20;

/// The inputs of one contract address derivation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RlpAddrChunk {
    /// `keccak(rlp([deployer, nonce]))`.
    Create {
        deployer: Address,
        nonce: u64,
        deployed: Address,
    },
    /// `keccak(0xff ‖ deployer ‖ salt ‖ keccak(init_code))`.
    Create2 {
        deployer: Address,
        salt: H256,
        init_code_hash: H256,
        deployed: Address,
    },
}

impl RlpAddrChunk {
    pub fn create(deployer: Address, nonce: u64) -> Self {
        Self::Create {
            deployer,
            nonce,
            deployed: create_address(&deployer, nonce),
        }
    }

    pub fn create2(deployer: Address, salt: H256, init_code: &[u8]) -> Self {
        let init_code_hash = keccak(init_code);
        Self::Create2 {
            deployer,
            salt,
            init_code_hash,
            deployed: create2_address(&deployer, &salt, &init_code_hash),
        }
    }

    pub const fn deployed(&self) -> Address {
        match self {
            Self::Create { deployed, .. } | Self::Create2 { deployed, .. } => *deployed,
        }
    }

    /// Number of rows the chunk expands to.
    pub const fn row_count(&self) -> usize {
        match self {
            Self::Create { .. } => CREATE_ROWS,
            Self::Create2 { .. } => CREATE2_ROWS,
        }
    }
}

/// Address of a contract created with CREATE, or by a deployment
/// transaction.
pub fn create_address(deployer: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(deployer);
    stream.append(&nonce);
    Address::from_slice(&keccak(stream.out()).as_bytes()[12..])
}

/// Address of a contract created with CREATE2.
pub fn create2_address(deployer: &Address, salt: &H256, init_code_hash: &H256) -> Address {
    let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(CREATE2_SHIFT);
    preimage.extend_from_slice(deployer.as_bytes());
    preimage.extend_from_slice(salt.as_bytes());
    preimage.extend_from_slice(init_code_hash.as_bytes());
    Address::from_slice(&keccak(preimage).as_bytes()[12..])
}

/// RLP encoding of a CREATE nonce: a nonce in `1..128` is its own encoding,
/// anything else (zero included) gets a short string prefix.
pub fn rlp_nonce(nonce: u64) -> Vec<u8> {
    let bytes = minimal_bytes(nonce);
    if is_tiny_non_zero(nonce) {
        return bytes;
    }
    let mut encoded = vec![RLP_PREFIX_INT_SHORT + bytes.len() as u8];
    encoded.extend(bytes);
    encoded
}

const fn is_tiny_non_zero(nonce: u64) -> bool {
    0 < nonce && nonce < 128
}

/// High 4 bytes and low 16 bytes of an address.
fn address_hi_lo(address: &Address) -> (U256, U256) {
    let bytes = address.as_bytes();
    (
        U256::from_big_endian(&bytes[..4]),
        U256::from_big_endian(&bytes[4..]),
    )
}

fn word_hi_lo(word: &H256) -> (U256, U256) {
    let bytes = word.as_bytes();
    (
        U256::from_big_endian(&bytes[..LLARGE]),
        U256::from_big_endian(&bytes[LLARGE..]),
    )
}

/// A limb: `bytes` placed at the front of a 16-byte cell.
fn limb(bytes: &[u8]) -> Vec<u8> {
    pad_right(bytes, LLARGE)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, TraceRow)]
pub struct RlpAddrRow {
    pub acc: U256,
    pub acc_bytesize: u64,
    pub addr_hi: U256,
    pub addr_lo: U256,
    pub bit1: bool,
    pub bit_acc: u8,
    pub byte1: u8,
    pub counter: u64,
    pub dep_addr_hi: U256,
    pub dep_addr_lo: U256,
    pub index: u64,
    pub kec_hi: U256,
    pub kec_lo: U256,
    pub lc: bool,
    pub limb: Vec<u8>,
    #[column(name = "nBYTES")]
    pub n_bytes: u64,
    pub nonce: u64,
    pub power: U256,
    pub recipe: u64,
    pub recipe_1: bool,
    pub recipe_2: bool,
    pub salt_hi: U256,
    pub salt_lo: U256,
    pub stamp: u64,
    pub tiny_non_zero_nonce: bool,
}

const_assert_eq!(<RlpAddrRow as TraceRow>::COLUMN_COUNT, NUM_COLUMNS);

/// Expands one chunk into its rows. `stamp` numbers chunks from 1.
pub fn chunk_rows(chunk: &RlpAddrChunk, stamp: u64) -> Vec<RlpAddrRow> {
    match chunk {
        RlpAddrChunk::Create {
            deployer,
            nonce,
            deployed,
        } => create_rows(deployer, *nonce, deployed, stamp),
        RlpAddrChunk::Create2 {
            deployer,
            salt,
            init_code_hash,
            deployed,
        } => create2_rows(deployer, salt, init_code_hash, deployed, stamp),
    }
}

fn create_rows(deployer: &Address, nonce: u64, deployed: &Address, stamp: u64) -> Vec<RlpAddrRow> {
    let (addr_hi, addr_lo) = address_hi_lo(deployer);
    let (dep_addr_hi, dep_addr_lo) = address_hi_lo(deployed);
    let nonce_bytes = minimal_bytes(nonce);
    let nonce8 = pad_left(&nonce_bytes, CREATE_ROWS);
    let rlp_nonce = rlp_nonce(nonce);
    let tiny_non_zero_nonce = is_tiny_non_zero(nonce);
    let counting = byte_counting(nonce_bytes.len(), CREATE_ROWS);
    let bits = bit_decomposition(nonce8[CREATE_ROWS - 1], CREATE_ROWS);
    let deployer = deployer.as_bytes();

    (0..CREATE_ROWS)
        .map(|ct| {
            let (lc, limb, n_bytes, index) = match ct {
                4 => (
                    true,
                    self::limb(&[RLP_PREFIX_LIST_SHORT + 21 + rlp_nonce.len() as u8]),
                    1,
                    0,
                ),
                5 => {
                    let mut bytes = vec![ADDRESS_PREFIX];
                    bytes.extend_from_slice(&deployer[..4]);
                    (true, self::limb(&bytes), 5, 1)
                }
                6 => (true, deployer[4..].to_vec(), LLARGE as u64, 2),
                7 => (true, self::limb(&rlp_nonce), rlp_nonce.len() as u64, 3),
                _ => (false, vec![], 0, 0),
            };
            RlpAddrRow {
                acc: U256::from_big_endian(&nonce8[..=ct]),
                acc_bytesize: counting.acc_byte_size[ct] as u64,
                addr_hi,
                addr_lo,
                bit1: bits.bits[ct],
                bit_acc: bits.bit_acc[ct],
                byte1: nonce8[ct],
                counter: ct as u64,
                dep_addr_hi,
                dep_addr_lo,
                index,
                lc,
                limb,
                n_bytes,
                nonce,
                power: counting.power[ct],
                recipe: RLP_ADDR_RECIPE_1.into(),
                recipe_1: true,
                stamp,
                tiny_non_zero_nonce,
                ..Default::default()
            }
        })
        .collect()
}

fn create2_rows(
    deployer: &Address,
    salt: &H256,
    init_code_hash: &H256,
    deployed: &Address,
    stamp: u64,
) -> Vec<RlpAddrRow> {
    let (addr_hi, addr_lo) = address_hi_lo(deployer);
    let (dep_addr_hi, dep_addr_lo) = address_hi_lo(deployed);
    let (salt_hi, salt_lo) = word_hi_lo(salt);
    let (kec_hi, kec_lo) = word_hi_lo(init_code_hash);
    let deployer = deployer.as_bytes();

    (0..CREATE2_ROWS)
        .map(|ct| {
            let (limb, n_bytes) = match ct {
                0 => {
                    let mut bytes = vec![CREATE2_SHIFT];
                    bytes.extend_from_slice(&deployer[..4]);
                    (self::limb(&bytes), 5)
                }
                1 => (deployer[4..].to_vec(), LLARGE),
                2 => (salt[..LLARGE].to_vec(), LLARGE),
                3 => (salt[LLARGE..].to_vec(), LLARGE),
                4 => (init_code_hash[..LLARGE].to_vec(), LLARGE),
                _ => (init_code_hash[LLARGE..].to_vec(), LLARGE),
            };
            RlpAddrRow {
                addr_hi,
                addr_lo,
                counter: ct as u64,
                dep_addr_hi,
                dep_addr_lo,
                index: ct as u64,
                kec_hi,
                kec_lo,
                lc: true,
                limb,
                n_bytes: n_bytes as u64,
                recipe: RLP_ADDR_RECIPE_2.into(),
                recipe_2: true,
                salt_hi,
                salt_lo,
                stamp,
                ..Default::default()
            }
        })
        .collect()
}

/// The `rlpAddr` module.
#[derive(Debug, Default)]
pub struct RlpAddr {
    chunks: StackedList<RlpAddrChunk>,
}

impl RlpAddr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_create(&mut self, deployer: Address, nonce: u64) -> Address {
        self.push(RlpAddrChunk::create(deployer, nonce))
    }

    pub fn call_create2(&mut self, deployer: Address, salt: H256, init_code: &[u8]) -> Address {
        self.push(RlpAddrChunk::create2(deployer, salt, init_code))
    }

    /// Records a chunk and returns the derived address.
    pub fn push(&mut self, chunk: RlpAddrChunk) -> Address {
        let deployed = chunk.deployed();
        self.chunks.push(chunk);
        deployed
    }

    pub fn chunks(&self) -> impl Iterator<Item = &RlpAddrChunk> {
        self.chunks.iter()
    }
}

impl Module for RlpAddr {
    fn module_key(&self) -> &'static str {
        MODULE_KEY
    }

    fn enter_transaction(&mut self) {
        self.chunks.enter();
    }

    fn pop_transaction(&mut self) {
        self.chunks.pop();
    }

    fn line_count(&self) -> usize {
        self.chunks.iter().map(RlpAddrChunk::row_count).sum()
    }

    fn columns_headers(&self) -> Vec<ColumnHeader> {
        RlpAddrRow::headers(MODULE_KEY, self.line_count())
    }

    fn commit(&self, table: &mut TraceTable) -> Result<(), TraceError> {
        for (i, chunk) in self.chunks.iter().enumerate() {
            for row in chunk_rows(chunk, i as u64 + 1) {
                row.write_row(table)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    fn commit(module: &RlpAddr) -> crate::table::ModuleTrace {
        let mut table = TraceTable::new(MODULE_KEY, module.columns_headers());
        module.commit(&mut table).unwrap();
        table.build().unwrap()
    }

    #[test]
    fn create_address_matches_known_vector() {
        let deployer = Address::from(hex!("6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0"));
        assert_eq!(
            create_address(&deployer, 0),
            Address::from(hex!("cd234a471b72ba2f1ccf0a70fcaba648a5eecd8d"))
        );
        assert_eq!(
            create_address(&deployer, 1),
            Address::from(hex!("343c43a37d37dff08ae8c4a11544c718abb4fcf8"))
        );
    }

    #[test]
    fn create2_address_matches_eip_1014_vector() {
        // Example 5 of EIP-1014.
        let deployer = Address::from(hex!("00000000000000000000000000000000deadbeef"));
        let salt = H256(hex!(
            "00000000000000000000000000000000000000000000000000000000cafebabe"
        ));
        let chunk = RlpAddrChunk::create2(deployer, salt, &hex!("deadbeef"));
        assert_eq!(
            chunk.deployed(),
            Address::from(hex!("60f3f640a8508fc6a86d45df051962668e1e8ac7"))
        );
    }

    #[test]
    fn rlp_nonce_encoding() {
        assert_eq!(rlp_nonce(0), [0x80]);
        assert_eq!(rlp_nonce(1), [0x01]);
        assert_eq!(rlp_nonce(127), [0x7f]);
        assert_eq!(rlp_nonce(128), [0x81, 0x80]);
        assert_eq!(rlp_nonce(0x0400), [0x82, 0x04, 0x00]);
        for nonce in [0u64, 1, 127, 128, 0x0400, u64::MAX] {
            assert_eq!(rlp_nonce(nonce), rlp::encode(&nonce).to_vec());
        }
    }

    #[test]
    fn zero_nonce_create_yields_eight_rows() {
        let deployer = Address::repeat_byte(0x11);
        let mut module = RlpAddr::new();
        module.call_create(deployer, 0);
        assert_eq!(module.line_count(), 8);

        let trace = commit(&module);
        assert_eq!(trace.rows(), 8);
        let limb = trace.column("LIMB").unwrap();
        let n_bytes = trace.column("nBYTES").unwrap();
        let lc = trace.column("LC").unwrap();
        // Rows 0..4 construct nothing.
        for ct in 0..4 {
            assert_eq!(lc.value(ct), Some(U256::zero()));
            assert_eq!(limb.value(ct), Some(U256::zero()));
        }
        // List prefix: 0xc0 + 21 + 1.
        assert_eq!(limb.value(4), Some(U256::from(0xd6) << 120));
        // The tiny nonce special case does not apply to zero.
        assert_eq!(limb.value(7), Some(U256::from(0x80) << 120));
        assert_eq!(n_bytes.value(7), Some(U256::one()));
        assert_eq!(
            trace.column("TINY_NON_ZERO_NONCE").unwrap().value(7),
            Some(U256::zero())
        );
    }

    #[test]
    fn create_limbs_spell_the_rlp_preimage() {
        let deployer = Address::from(hex!("6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0"));
        let nonce = 0x0102u64;
        let mut module = RlpAddr::new();
        let deployed = module.call_create(deployer, nonce);
        let trace = commit(&module);

        let limb = trace.column("LIMB").unwrap();
        let n_bytes = trace.column("nBYTES").unwrap();
        let mut preimage = vec![];
        for ct in 4..8 {
            let cell = limb.row(ct).unwrap();
            let len = n_bytes.value(ct).unwrap().as_usize();
            preimage.extend_from_slice(&cell[16..16 + len]);
        }
        let mut stream = RlpStream::new_list(2);
        stream.append(&deployer);
        stream.append(&nonce);
        assert_eq!(preimage, stream.out().to_vec());
        assert_eq!(Address::from_slice(&keccak(&preimage)[12..]), deployed);

        let acc = trace.column("ACC").unwrap();
        assert_eq!(acc.value(7), Some(U256::from(nonce)));
        let acc_bytesize = trace.column("ACC_BYTESIZE").unwrap();
        assert_eq!(acc_bytesize.value(7), Some(U256::from(2)));
        let bit_acc = trace.column("BIT_ACC").unwrap();
        assert_eq!(bit_acc.value(7), Some(U256::from(0x02)));
    }

    #[test]
    fn create2_always_yields_six_rows() {
        let mut module = RlpAddr::new();
        module.call_create2(Address::zero(), H256::zero(), &[]);
        module.call_create2(Address::repeat_byte(0xff), H256::repeat_byte(0xee), &[0; 1000]);
        assert_eq!(module.line_count(), 12);

        let trace = commit(&module);
        let stamp = trace.column("STAMP").unwrap();
        assert_eq!(stamp.value(0), Some(U256::one()));
        assert_eq!(stamp.value(6), Some(U256::from(2)));
        let limb = trace.column("LIMB").unwrap();
        assert_eq!(
            limb.value(6),
            Some(U256::from_big_endian(&hex!("ffffffffff")) << 88)
        );
        assert_eq!(
            trace.column("RECIPE").unwrap().value(11),
            Some(U256::from(RLP_ADDR_RECIPE_2))
        );
    }

    #[test]
    fn popped_transactions_leave_no_rows() {
        let mut module = RlpAddr::new();
        module.enter_transaction();
        module.call_create(Address::zero(), 3);
        module.enter_transaction();
        module.call_create2(Address::zero(), H256::zero(), &[]);
        module.call_create(Address::zero(), 4);
        module.pop_transaction();
        assert_eq!(module.line_count(), 8);
        assert_eq!(commit(&module).rows(), 8);
    }
}
