use crate::derive_utils::apply_derives;
use crate::naming::{check_priority_label, default_event_name};
use proc_macro::TokenStream;
use quote::{ToTokens, quote};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Item, LitStr, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[queued_event] 宏实现
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as QueuedEventAttrConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[queued_event] only on struct")
                .to_compile_error()
                .into();
        }
    };

    // 参数必须序列化为 JSON 对象
    if !matches!(st.fields, syn::Fields::Named(_)) {
        return syn::Error::new(
            st.span(),
            "#[queued_event] supports only named-field structs, e.g., struct E { x: T }",
        )
        .to_compile_error()
        .into();
    }

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    apply_derives(&mut st.attrs, required);

    let ident = &st.ident;
    let name = cfg
        .name
        .map(|lit| lit.value())
        .unwrap_or_else(|| default_event_name(&ident.to_string()));
    let priority = match cfg.priority {
        Some(lit) => {
            let value = lit.value();
            quote! { ::core::option::Option::Some(#value) }
        }
        None => quote! { ::core::option::Option::None },
    };
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    let out = quote! {
        #st

        impl #impl_generics ::eventq_domain::event::QueuedEvent for #ident #ty_generics #where_clause {
            const NAME: &'static str = #name;
            const PRIORITY: ::core::option::Option<&'static str> = #priority;
        }
    };

    TokenStream::from(out)
}

struct QueuedEventAttrConfig {
    name: Option<LitStr>,
    priority: Option<LitStr>,
}

impl Parse for QueuedEventAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut name: Option<LitStr> = None;
        let mut priority: Option<LitStr> = None;

        if input.is_empty() {
            return Ok(Self { name, priority });
        }

        let pairs: Punctuated<syn::ExprAssign, Token![,]> =
            Punctuated::<syn::ExprAssign, Token![,]>::parse_terminated(input)?;

        for assign in pairs {
            let key_ident = match *assign.left {
                syn::Expr::Path(p) if p.path.segments.len() == 1 => {
                    p.path.segments[0].ident.clone()
                }
                other => return Err(syn::Error::new(other.span(), "invalid attribute key")),
            };
            let lit: LitStr = syn::parse2(assign.right.to_token_stream())
                .map_err(|e| syn::Error::new(e.span(), "expected string literal"))?;

            match key_ident.to_string().as_str() {
                "name" => {
                    if name.is_some() {
                        return Err(syn::Error::new(
                            key_ident.span(),
                            "duplicate key 'name' in attribute",
                        ));
                    }
                    if lit.value().trim().is_empty() {
                        return Err(syn::Error::new(lit.span(), "event name must not be empty"));
                    }
                    name = Some(lit);
                }
                "priority" => {
                    if priority.is_some() {
                        return Err(syn::Error::new(
                            key_ident.span(),
                            "duplicate key 'priority' in attribute",
                        ));
                    }
                    if let Err(reason) = check_priority_label(&lit.value()) {
                        return Err(syn::Error::new(lit.span(), reason));
                    }
                    priority = Some(lit);
                }
                _ => {
                    return Err(syn::Error::new(
                        key_ident.span(),
                        "unknown key; expected 'name' | 'priority'",
                    ));
                }
            }
        }

        Ok(Self { name, priority })
    }
}
