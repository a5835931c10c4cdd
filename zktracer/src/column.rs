//! Fixed-width column buffers.
//!
//! A column is an append-only byte region holding `length` values of
//! `byte_width` bytes each. Numeric values are stored big-endian and
//! left-padded with zeros up to the column width.

use bytes::Bytes;
use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};

/// Width of boolean and single byte columns.
pub const BYTE_COLUMN_WIDTH: usize = 1;
/// Width of every other column.
pub const WORD_COLUMN_WIDTH: usize = 32;

/// Static description of a column, as declared by a row struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub byte_width: usize,
}

/// A column as it appears in a trace file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHeader {
    /// Fully qualified name, `<module key>.<column name>`.
    pub name: String,
    pub byte_width: usize,
    /// Number of rows.
    pub length: usize,
}

impl ColumnHeader {
    pub fn new(module_key: &str, spec: &ColumnSpec, length: usize) -> Self {
        Self {
            name: format!("{module_key}.{}", spec.name),
            byte_width: spec.byte_width,
            length,
        }
    }

    /// Number of bytes taken by the column data.
    pub const fn data_size(&self) -> usize {
        self.byte_width * self.length
    }
}

/// Values that can be stored in a column.
pub trait ColumnValue {
    /// Width of the columns holding values of this type.
    const BYTE_WIDTH: usize;

    /// Writes the value right-aligned into `out`, which is zeroed and exactly
    /// one column cell wide. Returns the byte length of the value if it does
    /// not fit.
    fn write_into(&self, out: &mut [u8]) -> Result<(), usize>;
}

impl ColumnValue for bool {
    const BYTE_WIDTH: usize = BYTE_COLUMN_WIDTH;

    fn write_into(&self, out: &mut [u8]) -> Result<(), usize> {
        out[out.len() - 1] = u8::from(*self);
        Ok(())
    }
}

impl ColumnValue for u8 {
    const BYTE_WIDTH: usize = BYTE_COLUMN_WIDTH;

    fn write_into(&self, out: &mut [u8]) -> Result<(), usize> {
        out[out.len() - 1] = *self;
        Ok(())
    }
}

macro_rules! impl_word_column_value {
    ($($t:ty),*) => {
        $(
            impl ColumnValue for $t {
                const BYTE_WIDTH: usize = WORD_COLUMN_WIDTH;

                fn write_into(&self, out: &mut [u8]) -> Result<(), usize> {
                    write_right_aligned(&self.to_be_bytes(), out)
                }
            }
        )*
    };
}

impl_word_column_value!(u16, u32, u64, u128, usize);

impl ColumnValue for U256 {
    const BYTE_WIDTH: usize = WORD_COLUMN_WIDTH;

    fn write_into(&self, out: &mut [u8]) -> Result<(), usize> {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        write_right_aligned(&bytes, out)
    }
}

impl ColumnValue for H256 {
    const BYTE_WIDTH: usize = WORD_COLUMN_WIDTH;

    fn write_into(&self, out: &mut [u8]) -> Result<(), usize> {
        write_right_aligned(self.as_bytes(), out)
    }
}

impl ColumnValue for [u8] {
    const BYTE_WIDTH: usize = WORD_COLUMN_WIDTH;

    fn write_into(&self, out: &mut [u8]) -> Result<(), usize> {
        write_right_aligned(self, out)
    }
}

impl ColumnValue for Vec<u8> {
    const BYTE_WIDTH: usize = WORD_COLUMN_WIDTH;

    fn write_into(&self, out: &mut [u8]) -> Result<(), usize> {
        write_right_aligned(self, out)
    }
}

impl ColumnValue for Bytes {
    const BYTE_WIDTH: usize = WORD_COLUMN_WIDTH;

    fn write_into(&self, out: &mut [u8]) -> Result<(), usize> {
        write_right_aligned(self, out)
    }
}

fn write_right_aligned(value: &[u8], out: &mut [u8]) -> Result<(), usize> {
    // Leading zeros never count against the width.
    let start = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    let significant = &value[start..];
    if significant.len() > out.len() {
        return Err(significant.len());
    }
    let offset = out.len() - significant.len();
    out[offset..].copy_from_slice(significant);
    Ok(())
}

/// The bytes of one column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnBuffer {
    header: ColumnHeader,
    data: Vec<u8>,
}

impl ColumnBuffer {
    pub fn new(header: ColumnHeader) -> Self {
        let data = Vec::with_capacity(header.data_size());
        Self { header, data }
    }

    /// Wraps column bytes read back from a trace file.
    pub(crate) fn from_parts(header: ColumnHeader, data: Vec<u8>) -> Self {
        Self { header, data }
    }

    pub const fn header(&self) -> &ColumnHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub const fn byte_width(&self) -> usize {
        self.header.byte_width
    }

    /// Number of rows written so far.
    pub fn rows(&self) -> usize {
        self.data.len() / self.header.byte_width
    }

    /// All the rows, back to back.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, row: usize) -> Option<&[u8]> {
        let width = self.header.byte_width;
        self.data.get(row * width..(row + 1) * width)
    }

    /// Reads back a cell as a big-endian integer.
    pub fn value(&self, row: usize) -> Option<U256> {
        self.row(row).map(U256::from_big_endian)
    }

    /// Appends one cell holding `value`.
    pub(crate) fn push<V: ColumnValue + ?Sized>(&mut self, value: &V) -> Result<(), usize> {
        let start = self.data.len();
        self.data.resize(start + self.header.byte_width, 0);
        value.write_into(&mut self.data[start..]).inspect_err(|_| {
            self.data.truncate(start);
        })
    }

    /// Appends one zeroed cell.
    pub(crate) fn push_zero(&mut self) {
        let len = self.data.len() + self.header.byte_width;
        self.data.resize(len, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(width: usize) -> ColumnBuffer {
        ColumnBuffer::new(ColumnHeader {
            name: "test.COLUMN".into(),
            byte_width: width,
            length: 4,
        })
    }

    #[test]
    fn numbers_are_left_padded() {
        let mut column = buffer(32);
        column.push(&0x0102u64).unwrap();
        column.push(&U256::MAX).unwrap();
        assert_eq!(column.rows(), 2);
        let first = column.row(0).unwrap();
        assert!(first[..30].iter().all(|&b| b == 0));
        assert_eq!(&first[30..], &[1, 2]);
        assert_eq!(column.value(1), Some(U256::MAX));
    }

    #[test]
    fn bytes_longer_than_the_width_are_rejected() {
        let mut column = buffer(1);
        assert_eq!(column.push(&vec![1u8, 2]), Err(2));
        assert_eq!(column.rows(), 0);
        // Leading zeros are not significant.
        column.push(&vec![0u8, 0, 7]).unwrap();
        assert_eq!(column.value(0), Some(U256::from(7)));
    }

    #[test]
    fn zero_cells() {
        let mut column = buffer(32);
        column.push_zero();
        column.push(&true).unwrap();
        assert_eq!(column.value(0), Some(U256::zero()));
        assert_eq!(column.value(1), Some(U256::one()));
        assert_eq!(column.data().len(), 64);
    }
}
