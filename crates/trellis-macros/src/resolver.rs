//! `#[resolver]` attribute implementation.
//!
//! # Resolver-level options `#[resolver(...)]`
//!
//! | Key | Example | Description |
//! |-----|---------|-------------|
//! | `middlewares` | `[require_license, audit]` | Resolver-wide middlewares, in order |
//! | `error_handler` | `report` | Resolver-wide error handler |
//! | `name` | `"Issues"` | Class name reported to error handlers (default: type name) |
//!
//! # Method-level options `#[resolver_fn(...)]`
//!
//! | Form | Description |
//! |------|-------------|
//! | `#[resolver_fn("key")]` | Bare key |
//! | `#[resolver_fn(key = "key", middlewares = [..], error_handler = h)]` | Full configuration |
//!
//! A leading string literal may be combined with the other options:
//! `#[resolver_fn("key", middlewares = [audit])]`.
//!
//! Annotated methods take `&self` and at most one further argument, the
//! request. They may be sync or async and return anything implementing
//! `HandlerOutput`.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    Attribute, Expr, ExprArray, FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, LitStr, Token,
    meta::ParseNestedMeta,
    parse::{Parse, ParseStream, Result},
    spanned::Spanned,
};

const FN_ATTR: &str = "resolver_fn";

// ============================================================================
// Attribute structures
// ============================================================================

/// Options of the `#[resolver(...)]` attribute itself.
#[derive(Default)]
pub struct ResolverArgs {
    middlewares: Vec<Expr>,
    error_handler: Option<Expr>,
    name: Option<LitStr>,
}

impl ResolverArgs {
    /// Handles one `key = value` entry; used with `syn::meta::parser`.
    pub fn parse_meta(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("middlewares") {
            let array: ExprArray = meta.value()?.parse()?;
            self.middlewares = array.elems.into_iter().collect();
        } else if meta.path.is_ident("error_handler") {
            self.error_handler = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error("unknown resolver option; expected middlewares, error_handler, or name"));
        }
        Ok(())
    }
}

/// Options of one `#[resolver_fn(...)]` attribute.
#[derive(Default)]
struct FnArgs {
    key: Option<LitStr>,
    middlewares: Vec<Expr>,
    error_handler: Option<Expr>,
}

impl Parse for FnArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = FnArgs::default();

        if input.peek(LitStr) {
            args.key = Some(input.parse()?);
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            match key.to_string().as_str() {
                "key" => args.key = Some(input.parse()?),
                "middlewares" => {
                    let array: ExprArray = input.parse()?;
                    args.middlewares = array.elems.into_iter().collect();
                }
                "error_handler" => args.error_handler = Some(input.parse()?),
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!("unknown resolver_fn option `{other}`; expected key, middlewares, or error_handler"),
                    ));
                }
            }
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

/// How the wrapped method is called.
struct MethodShape {
    ident: Ident,
    is_async: bool,
    takes_request: bool,
}

// ============================================================================
// Entry point
// ============================================================================

pub fn expand(args: ResolverArgs, mut item: ItemImpl) -> Result<TokenStream> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[resolver] must be placed on an inherent impl block",
        ));
    }

    let mut fns = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let Some(fn_args) = take_fn_attr(method)? else {
            continue;
        };
        let shape = method_shape(method)?;
        fns.push(generate_resolver_fn(fn_args, &shape));
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    let class_name = args.name.as_ref().map(|name| {
        quote! {
            fn class_name() -> &'static str {
                #name
            }
        }
    });
    let config = config_chain(
        quote!(::trellis::core::ResolverConfig::new()),
        &args.middlewares,
        args.error_handler.as_ref(),
    );

    Ok(quote! {
        #item

        impl #impl_generics ::trellis::core::Resolver for #self_ty #where_clause {
            #class_name

            fn config() -> ::trellis::core::ResolverConfig {
                #config
            }

            fn resolver_fns() -> ::std::vec::Vec<::trellis::core::ResolverFn<Self>> {
                ::std::vec![#(#fns),*]
            }
        }
    })
}

// ============================================================================
// Method handling
// ============================================================================

/// Removes the `#[resolver_fn]` attribute from `method` and parses it.
fn take_fn_attr(method: &mut ImplItemFn) -> Result<Option<FnArgs>> {
    let mut found: Option<(FnArgs, Span)> = None;
    let mut kept: Vec<Attribute> = Vec::with_capacity(method.attrs.len());

    for attr in method.attrs.drain(..) {
        if !attr.path().is_ident(FN_ATTR) {
            kept.push(attr);
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                &attr,
                "a method can carry only one #[resolver_fn] attribute",
            ));
        }
        let args: FnArgs = attr.parse_args()?;
        found = Some((args, attr.span()));
    }
    method.attrs = kept;

    let Some((args, span)) = found else {
        return Ok(None);
    };
    match &args.key {
        None => Err(syn::Error::new(span, "#[resolver_fn] requires a key")),
        Some(key) if key.value().is_empty() => {
            Err(syn::Error::new(key.span(), "resolver function key must not be empty"))
        }
        Some(_) => Ok(Some(args)),
    }
}

fn method_shape(method: &ImplItemFn) -> Result<MethodShape> {
    let sig = &method.sig;

    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "resolver functions cannot be generic",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new(
                sig.ident.span(),
                "resolver functions must take `&self`",
            ));
        }
    }

    let takes_request = match (inputs.next(), inputs.next()) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(_), Some(extra)) => {
            return Err(syn::Error::new(
                extra.span(),
                "resolver functions take at most one argument besides `&self`: the request",
            ));
        }
    };

    Ok(MethodShape {
        ident: sig.ident.clone(),
        is_async: sig.asyncness.is_some(),
        takes_request,
    })
}

fn generate_resolver_fn(args: FnArgs, shape: &MethodShape) -> TokenStream {
    let FnArgs {
        key,
        middlewares,
        error_handler,
    } = args;
    let ident = &shape.ident;
    let method_name = LitStr::new(&ident.to_string(), ident.span());
    let this = format_ident!("__trellis_this");
    let req = format_ident!("__trellis_req");

    let config = config_chain(
        quote!(::trellis::core::ResolverFnConfig::new(#key)),
        &middlewares,
        error_handler.as_ref(),
    );

    let request = shape.takes_request.then(|| quote!(#req));
    let await_call = shape.is_async.then(|| quote!(.await));

    quote! {
        ::trellis::core::ResolverFn::new(
            #config,
            #method_name,
            |#this: ::std::sync::Arc<Self>, #req: ::trellis::core::Request| async move { #this.#ident(#request) #await_call },
        )
    }
}

fn config_chain(base: TokenStream, middlewares: &[Expr], error_handler: Option<&Expr>) -> TokenStream {
    let error_handler = error_handler.map(|handler| quote!(.error_handler(#handler)));
    quote! {
        #base
            #(.middleware(#middlewares))*
            #error_handler
    }
}
