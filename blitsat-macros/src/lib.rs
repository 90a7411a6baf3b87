//! Derive macros for the solver configuration.
//!
//! Configuration structs document their default value inline, e.g. `(Default: 128)` in a field's
//! doc comment. The derives here turn those doc comments into code, so documentation and defaults
//! can't drift apart.
use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;
use syn::{parse_quote, Attribute, Expr, Field, Lit, LitStr, Meta, MetaNameValue};
use synstructure::{decl_derive, Structure};

/// All doc comment lines of a field or item.
fn doc_lines(attrs: &[Attribute]) -> Vec<LitStr> {
    let mut lines = vec![];
    for attr in attrs.iter() {
        if let Ok(Meta::NameValue(MetaNameValue {
            ident,
            lit: Lit::Str(doc_str),
            ..
        })) = attr.parse_meta()
        {
            if ident == "doc" {
                lines.push(doc_str);
            }
        }
    }
    lines
}

/// The named fields of a derive input that must be a struct.
fn struct_fields<'a>(s: &'a Structure, derive_name: &str) -> Vec<&'a Field> {
    match s.variants() {
        [variant] => variant
            .bindings()
            .iter()
            .map(|binding| {
                let field = binding.ast();
                if field.ident.is_none() {
                    panic!("{} requires named fields", derive_name);
                }
                field
            })
            .collect(),
        _ => panic!("{} requires a struct", derive_name),
    }
}

/// Derives a default instance from the documentation.
fn derive_doc_default(s: Structure) -> TokenStream {
    let variant = match s.variants() {
        [variant] => variant,
        _ => panic!("DocDefault requires a struct"),
    };

    let default_re = regex::Regex::new(r"\(Default: (.*)\)").unwrap();

    let body = variant.construct(|field, _| {
        let mut default_value: Expr = parse_quote!(Default::default());
        for doc_str in doc_lines(&field.attrs) {
            if let Some(captures) = default_re.captures(&doc_str.value()) {
                let default_str = LitStr::new(&captures[1], doc_str.span());
                default_value = default_str
                    .parse()
                    .expect("error parsing default expression");
            }
        }
        default_value
    });

    s.gen_impl(quote! {
        gen impl Default for @Self {
            fn default() -> Self {
                #body
            }
        }
    })
}

/// Derives a companion `<Name>Update` struct holding optional values for every field.
///
/// The update struct can be deserialized (it is what configuration files are parsed into), merged
/// with other updates and applied to the configuration. The configuration itself gains a `help`
/// function listing every option together with its documentation.
fn derive_config_update(s: Structure) -> TokenStream {
    let fields = struct_fields(&s, "ConfigUpdate");

    let name = &s.ast().ident;
    let update_name = Ident::new(&format!("{}Update", name), Span::call_site());

    let mut update_fields = vec![];
    let mut apply_stmts = vec![];
    let mut merge_stmts = vec![];
    let mut help_stmts = vec![];

    for field in fields {
        let ident = field.ident.as_ref().unwrap();
        let ty = &field.ty;
        let docs = doc_lines(&field.attrs);
        let help_docs = docs.clone();

        update_fields.push(quote! {
            #(#[doc = #docs])*
            pub #ident: Option<#ty>,
        });

        apply_stmts.push(quote! {
            if let Some(value) = &self.#ident {
                config.#ident = value.clone();
            }
        });

        merge_stmts.push(quote! {
            if other.#ident.is_some() {
                self.#ident = other.#ident;
            }
        });

        let ident_str = LitStr::new(&ident.to_string(), Span::call_site());

        help_stmts.push(quote! {
            help.push_str(#ident_str);
            help.push_str(":\n");
            #(
                help.push_str("   ");
                help.push_str(#help_docs);
                help.push('\n');
            )*
            help.push('\n');
        });
    }

    quote! {
        /// Partial update of a configuration, all unset values are kept.
        #[derive(Default, Clone, Debug, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct #update_name {
            #(#update_fields)*
        }

        impl #update_name {
            /// An update that doesn't change anything.
            pub fn new() -> #update_name {
                #update_name::default()
            }

            /// Overwrite the configuration with all values set in this update.
            pub fn apply(&self, config: &mut #name) {
                #(#apply_stmts)*
            }

            /// Combine with a later update, values set in `other` take precedence.
            pub fn merge(&mut self, other: #update_name) {
                #(#merge_stmts)*
            }
        }

        impl #name {
            /// Description of all configuration options.
            pub fn help() -> String {
                let mut help = String::new();
                #(#help_stmts)*
                help
            }
        }
    }
}

decl_derive!([DocDefault] => derive_doc_default);
decl_derive!([ConfigUpdate] => derive_config_update);
