use syn::{Field, LitStr, Result};

/// Prefixes an error message and generates a `syn::Error` from the message.
macro_rules! span_err {
    ($ast:expr, $msg:literal $(,)?) => {
        ::syn::Error::new_spanned($ast, ::core::concat!("zktracer_proc_macro error: ", $msg))
    };
}
pub(crate) use span_err;

/// Checks the condition and returns early with a prefixed error message if
/// false.
macro_rules! ensure {
    ($cond:expr, $ast:expr, $msg:literal $(,)?) => {
        if !$cond {
            return Err($crate::common::span_err!($ast, $msg));
        }
    };
}
pub(crate) use ensure;

/// Returns the column name of a field: the value of a `#[column(name = "..")]`
/// attribute if present, the upper-cased field identifier otherwise.
pub(crate) fn column_name(field: &Field) -> Result<String> {
    let mut name = None;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                name = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported column attribute, expected `name`"))
            }
        })?;
    }
    match (name, &field.ident) {
        (Some(name), _) => Ok(name),
        (None, Some(ident)) => Ok(ident.to_string().to_uppercase()),
        (None, None) => Err(span_err!(field, "expected a named field")),
    }
}
