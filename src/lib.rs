use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DataEnum, DataStruct, DeriveInput, Fields, Ident};

/// Builds a struct from a `tokio_postgres::Row`, matching fields to columns by name.
/// Columns missing from the row (partial projections) leave the field at its default.
#[proc_macro_derive(FromPgRow)]
pub fn derive_from_pg_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let struct_name = &input.ident;
    let fields = get_struct_idents(&input.data);
    let v: Vec<_> = fields
        .into_iter()
        .map(|ident| {
            quote! {
                if let Ok(v) = row.try_get(stringify!(#ident)) {
                    x.#ident = v;
                }
            }
        })
        .collect();
    let expanded = quote! {
        impl std::convert::From<tokio_postgres::Row> for #struct_name {
            fn from(row: tokio_postgres::Row) -> Self {
                let mut x = Self::default();
                #(#v)*
                x
            }
        }
    };
    expanded.into()
}

/// Stores a fieldless enum as its integer discriminant (`INT` column).
#[proc_macro_derive(PgEnum)]
pub fn derive_pg_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let enum_name = &input.ident;
    let variants = get_enum_idents(&input.data);
    let expanded = quote! {
        impl std::convert::From<#enum_name> for i32 {
            fn from(v: #enum_name) -> i32 {
                v as i32
            }
        }

        impl std::convert::TryFrom<i32> for #enum_name {
            type Error = String;
            fn try_from(v: i32) -> std::result::Result<Self, Self::Error> {
                match v {
                    #(x if x == #enum_name::#variants as i32 => Ok(#enum_name::#variants),)*
                    other => Err(format!("{} is not a valid {}", other, stringify!(#enum_name))),
                }
            }
        }

        impl<'a> tokio_postgres::types::FromSql<'a> for #enum_name {
            fn from_sql(
                ty: &tokio_postgres::types::Type,
                raw: &'a [u8],
            ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
                let v = <i32 as tokio_postgres::types::FromSql>::from_sql(ty, raw)?;
                <#enum_name as std::convert::TryFrom<i32>>::try_from(v).map_err(|e| e.into())
            }
            fn accepts(ty: &tokio_postgres::types::Type) -> bool {
                <i32 as tokio_postgres::types::FromSql>::accepts(ty)
            }
        }

        impl tokio_postgres::types::ToSql for #enum_name {
            fn to_sql(
                &self,
                ty: &tokio_postgres::types::Type,
                out: &mut bytes::BytesMut,
            ) -> std::result::Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
                <i32 as tokio_postgres::types::ToSql>::to_sql(&(*self as i32), ty, out)
            }
            fn accepts(ty: &tokio_postgres::types::Type) -> bool {
                <i32 as tokio_postgres::types::ToSql>::accepts(ty)
            }
            tokio_postgres::types::to_sql_checked!();
        }
    };
    expanded.into()
}

fn get_struct_idents(data: &Data) -> Vec<&Ident> {
    match data {
        Data::Struct(DataStruct { ref fields, .. }) => match fields {
            Fields::Named(ref named_fields) => named_fields
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .collect(),
            _ => panic!("FromPgRow needs named fields"),
        },
        _ => panic!("FromPgRow is only for structs"),
    }
}

fn get_enum_idents(data: &Data) -> Vec<&Ident> {
    match data {
        Data::Enum(DataEnum { ref variants, .. }) => variants
            .iter()
            .map(|variant| {
                if !matches!(variant.fields, Fields::Unit) {
                    panic!("PgEnum variants must be fieldless");
                }
                &variant.ident
            })
            .collect(),
        _ => panic!("PgEnum is only for enums"),
    }
}
