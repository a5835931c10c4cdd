//! The binary trace file.
//!
//! ```text
//! u32 BE   number of columns
//! per column:
//!   u16 BE   name length
//!   [u8]     UTF-8 name, `<module key>.<COLUMN>`
//!   u8       byte width
//!   u32 BE   row count
//! per column, in header order:
//!   [u8]     row count * byte width bytes
//! ```

use std::io::{Read, Write};

use crate::column::{ColumnBuffer, ColumnHeader};
use crate::error::TraceError;
use crate::table::ModuleTrace;

/// Writes the columns of `traces`, in order.
pub fn write_trace_file<W: Write>(mut out: W, traces: &[ModuleTrace]) -> Result<(), TraceError> {
    let columns: Vec<&ColumnBuffer> = traces.iter().flat_map(ModuleTrace::columns).collect();

    out.write_all(&header_field::<u32>(columns.len(), "column count")?.to_be_bytes())?;
    for column in &columns {
        let header = column.header();
        let name = header.name.as_bytes();
        out.write_all(&header_field::<u16>(name.len(), &header.name)?.to_be_bytes())?;
        out.write_all(name)?;
        out.write_all(&[header_field::<u8>(header.byte_width, &header.name)?])?;
        out.write_all(&header_field::<u32>(column.rows(), &header.name)?.to_be_bytes())?;
    }
    for column in &columns {
        out.write_all(column.data())?;
    }
    out.flush()?;
    Ok(())
}

/// Reads a trace file back into its columns.
pub fn read_trace_file<R: Read>(mut input: R) -> Result<Vec<ColumnBuffer>, TraceError> {
    let count = u32::from_be_bytes(read_array(&mut input)?) as usize;
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        let name_len = u16::from_be_bytes(read_array(&mut input)?) as usize;
        let mut name = vec![0; name_len];
        input.read_exact(&mut name)?;
        let name = String::from_utf8(name).map_err(|err| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, err)
        })?;
        let [byte_width] = read_array(&mut input)?;
        let length = u32::from_be_bytes(read_array(&mut input)?) as usize;
        headers.push(ColumnHeader {
            name,
            byte_width: byte_width as usize,
            length,
        });
    }

    headers
        .into_iter()
        .map(|header| {
            let mut data = vec![0; header.data_size()];
            input.read_exact(&mut data)?;
            Ok(ColumnBuffer::from_parts(header, data))
        })
        .collect()
}

fn read_array<const N: usize, R: Read>(input: &mut R) -> Result<[u8; N], TraceError> {
    let mut bytes = [0; N];
    input.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn header_field<T: TryFrom<usize>>(value: usize, what: &str) -> Result<T, TraceError> {
    T::try_from(value).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{what}: {value} does not fit in the trace file header"),
        )
        .into()
    })
}
