use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

use crate::common::{column_name, ensure};

/// Implements `zktracer::table::TraceRow`.
pub(crate) fn try_derive(ast: DeriveInput) -> Result<proc_macro2::TokenStream> {
    let Data::Struct(data) = &ast.data else {
        return Err(crate::common::span_err!(&ast, "expected `struct`"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(crate::common::span_err!(
            &ast,
            "row struct must have named fields"
        ));
    };
    ensure!(
        ast.generics.params.is_empty(),
        &ast.generics,
        "row struct must not be generic"
    );
    ensure!(
        !fields.named.is_empty(),
        &ast,
        "row struct must have at least one column"
    );

    // The name of the struct.
    let name = &ast.ident;

    let mut specs = Vec::with_capacity(fields.named.len());
    let mut setters = Vec::with_capacity(fields.named.len());
    for (index, field) in fields.named.iter().enumerate() {
        let column = column_name(field)?;
        let ty = &field.ty;
        let ident = &field.ident;
        specs.push(quote! {
            ::zktracer::column::ColumnSpec {
                name: #column,
                byte_width: <#ty as ::zktracer::column::ColumnValue>::BYTE_WIDTH,
            }
        });
        setters.push(quote! {
            table.set(#index, &self.#ident)?;
        });
    }

    Ok(quote! {
        impl ::zktracer::table::TraceRow for #name {
            const COLUMNS: &'static [::zktracer::column::ColumnSpec] = &[#(#specs),*];

            fn write_row(
                &self,
                table: &mut ::zktracer::table::TraceTable,
            ) -> ::core::result::Result<(), ::zktracer::TraceError> {
                #(#setters)*
                table.validate_row()
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    #[test]
    fn columns_follow_field_order() {
        let ast: DeriveInput = parse_quote! {
            struct Row {
                counter: u8,
                #[column(name = "nBYTES")]
                n_bytes: u8,
                limb: Vec<u8>,
            }
        };
        let tokens = try_derive(ast).unwrap().to_string();
        let counter = tokens.find("\"COUNTER\"").unwrap();
        let n_bytes = tokens.find("\"nBYTES\"").unwrap();
        let limb = tokens.find("\"LIMB\"").unwrap();
        assert!(counter < n_bytes && n_bytes < limb);
        assert!(tokens.contains("validate_row"));
    }

    #[test]
    fn rejects_what_is_not_a_row() {
        let not_struct: DeriveInput = parse_quote! {
            enum Row { A }
        };
        let err = try_derive(not_struct).unwrap_err().to_string();
        assert_eq!(err, "zktracer_proc_macro error: expected `struct`");

        let tuple: DeriveInput = parse_quote! {
            struct Row(u8);
        };
        assert!(try_derive(tuple).is_err());

        let generic: DeriveInput = parse_quote! {
            struct Row<T> { value: T }
        };
        assert!(try_derive(generic).is_err());
    }

    #[test]
    fn unknown_column_attributes_are_errors() {
        let ast: DeriveInput = parse_quote! {
            struct Row {
                #[column(width = 3)]
                value: u8,
            }
        };
        assert!(try_derive(ast).is_err());
    }
}
