//! This library provides a derive macro for describing one row of a trace
//! table as a plain Rust struct.
//!
//! Deriving [`TraceRow`] on a struct with named fields implements
//! `zktracer::table::TraceRow` for it: the struct's fields become the
//! table's columns, in declaration order, each named after its field in
//! upper case and as wide as the field type's `ColumnValue::BYTE_WIDTH`. A
//! row is then written in a single call, with every column supplied at once,
//! so a partially filled row cannot be expressed.
//!
//! A column may be given an explicit name with `#[column(name = "...")]`.
//!
//! ```ignore
//! #[derive(TraceRow)]
//! pub struct Row {
//!     counter: u8,
//!     #[column(name = "nBYTES")]
//!     n_bytes: u8,
//!     limb: U256,
//! }
//! ```

pub(crate) mod common;
mod impls;

use impls::trace_row;

#[proc_macro_derive(TraceRow, attributes(column))]
pub fn derive_trace_row(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast = syn::parse_macro_input!(input as syn::DeriveInput);
    trace_row::try_derive(ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
