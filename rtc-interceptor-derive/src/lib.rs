//! Derive macros for the RTC `Interceptor` trait.
//!
//! An interceptor wraps the next interceptor of its chain and usually only
//! cares about a few of the thirteen methods of `sansio::Protocol` and
//! `Interceptor`. These macros write the rest: every method that is not
//! overridden hands the call to the next interceptor unchanged.
//!
//! ```ignore
//! use rtc_interceptor::{Interceptor, StreamInfo, TaggedPacket, interceptor};
//!
//! #[derive(Interceptor)]
//! pub struct Counter<P> {
//!     #[next]
//!     next: P,
//!     reads: usize,
//! }
//!
//! #[interceptor]
//! impl<P: Interceptor> Counter<P> {
//!     #[overrides]
//!     fn handle_read(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
//!         self.reads += 1;
//!         self.next.handle_read(msg)
//!     }
//! }
//! ```
//!
//! The generated code names `Interceptor`, `TaggedPacket` and `StreamInfo`
//! as they are imported at the use site, and the `sansio` and `shared`
//! crates by their absolute paths.

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    Data, DeriveInput, Fields, ImplItem, ImplItemFn, ItemImpl, Member, parse_macro_input,
};

const NEXT_ACCESSOR: &str = "__next_interceptor";

const PROTOCOL_METHODS: [&str; 9] = [
    "handle_read",
    "poll_read",
    "handle_write",
    "poll_write",
    "handle_event",
    "poll_event",
    "handle_timeout",
    "poll_timeout",
    "close",
];

const STREAM_METHODS: [&str; 4] = [
    "bind_local_stream",
    "unbind_local_stream",
    "bind_remote_stream",
    "unbind_remote_stream",
];

/// Marks the field holding the next interceptor of the chain with `#[next]`.
#[proc_macro_derive(Interceptor, attributes(next))]
pub fn derive_interceptor(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_derive(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `sansio::Protocol` and `Interceptor` for the type of the
/// annotated impl block. Methods tagged `#[overrides]` replace the
/// forwarding default; untagged items stay inherent.
#[proc_macro_attribute]
pub fn interceptor(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(Span::call_site(), "#[interceptor] takes no arguments")
            .to_compile_error()
            .into();
    }
    let item = parse_macro_input!(item as ItemImpl);
    match expand_interceptor(item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_derive(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "#[derive(Interceptor)] only supports structs",
        ));
    };

    let fields: Vec<_> = match &data.fields {
        Fields::Named(fields) => fields.named.iter().collect(),
        Fields::Unnamed(fields) => fields.unnamed.iter().collect(),
        Fields::Unit => vec![],
    };

    let mut next = None;
    for (index, field) in fields.iter().enumerate() {
        if !field.attrs.iter().any(|a| a.path().is_ident("next")) {
            continue;
        }
        if next.is_some() {
            return Err(syn::Error::new(
                field.span(),
                "only one field may be marked #[next]",
            ));
        }
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(index.into()),
        };
        next = Some((member, &field.ty));
    }
    let Some((member, ty)) = next else {
        return Err(syn::Error::new(
            input.span(),
            "#[derive(Interceptor)] needs a field marked #[next]",
        ));
    };

    let name = &input.ident;
    let accessor = Ident::new(NEXT_ACCESSOR, Span::call_site());
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #[doc(hidden)]
            #[inline]
            fn #accessor(&mut self) -> &mut #ty {
                &mut self.#member
            }
        }
    })
}

fn expand_interceptor(mut item: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new(
            path.span(),
            "#[interceptor] goes on an inherent impl block",
        ));
    }

    let mut protocol_overrides: Vec<ImplItemFn> = vec![];
    let mut stream_overrides: Vec<ImplItemFn> = vec![];
    let mut inherent = vec![];
    for impl_item in item.items.drain(..) {
        let ImplItem::Fn(mut method) = impl_item else {
            inherent.push(impl_item);
            continue;
        };
        let before = method.attrs.len();
        method.attrs.retain(|a| !a.path().is_ident("overrides"));
        if method.attrs.len() == before {
            inherent.push(ImplItem::Fn(method));
            continue;
        }

        let name = method.sig.ident.to_string();
        if PROTOCOL_METHODS.contains(&name.as_str()) {
            protocol_overrides.push(method);
        } else if STREAM_METHODS.contains(&name.as_str()) {
            stream_overrides.push(method);
        } else {
            return Err(syn::Error::new(
                method.sig.ident.span(),
                format!("`{name}` is not a method of sansio::Protocol or Interceptor"),
            ));
        }
    }

    let overridden = |list: &[ImplItemFn], name: &str| {
        list.iter().any(|m| m.sig.ident == name)
    };
    let protocol_defaults: Vec<TokenStream2> = PROTOCOL_METHODS
        .iter()
        .filter(|name| !overridden(&protocol_overrides, name))
        .map(|name| protocol_default(name))
        .collect();
    let stream_defaults: Vec<TokenStream2> = STREAM_METHODS
        .iter()
        .filter(|name| !overridden(&stream_overrides, name))
        .map(|name| stream_default(name))
        .collect();

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();
    let attrs = &item.attrs;

    let inherent_impl = if inherent.is_empty() {
        quote! {}
    } else {
        quote! {
            #(#attrs)*
            impl #impl_generics #self_ty #where_clause {
                #(#inherent)*
            }
        }
    };

    Ok(quote! {
        #inherent_impl

        impl #impl_generics ::sansio::Protocol<TaggedPacket, TaggedPacket, ()> for #self_ty #where_clause {
            type Rout = TaggedPacket;
            type Wout = TaggedPacket;
            type Eout = ();
            type Error = ::shared::error::Error;
            type Time = ::std::time::Instant;

            #(#protocol_overrides)*
            #(#protocol_defaults)*
        }

        impl #impl_generics Interceptor for #self_ty #where_clause {
            #(#stream_overrides)*
            #(#stream_defaults)*
        }
    })
}

fn protocol_default(name: &str) -> TokenStream2 {
    let accessor = Ident::new(NEXT_ACCESSOR, Span::call_site());
    let method = Ident::new(name, Span::call_site());
    let protocol = quote! { <_ as ::sansio::Protocol<TaggedPacket, TaggedPacket, ()>> };
    match name {
        "handle_read" | "handle_write" => quote! {
            fn #method(&mut self, msg: TaggedPacket) -> ::std::result::Result<(), Self::Error> {
                #protocol::#method(self.#accessor(), msg)
            }
        },
        "poll_read" => quote! {
            fn poll_read(&mut self) -> ::std::option::Option<Self::Rout> {
                #protocol::poll_read(self.#accessor())
            }
        },
        "poll_write" => quote! {
            fn poll_write(&mut self) -> ::std::option::Option<Self::Wout> {
                #protocol::poll_write(self.#accessor())
            }
        },
        "handle_event" => quote! {
            fn handle_event(&mut self, evt: ()) -> ::std::result::Result<(), Self::Error> {
                #protocol::handle_event(self.#accessor(), evt)
            }
        },
        "poll_event" => quote! {
            fn poll_event(&mut self) -> ::std::option::Option<Self::Eout> {
                #protocol::poll_event(self.#accessor())
            }
        },
        "handle_timeout" => quote! {
            fn handle_timeout(&mut self, now: Self::Time) -> ::std::result::Result<(), Self::Error> {
                #protocol::handle_timeout(self.#accessor(), now)
            }
        },
        "poll_timeout" => quote! {
            fn poll_timeout(&mut self) -> ::std::option::Option<Self::Time> {
                #protocol::poll_timeout(self.#accessor())
            }
        },
        _ => quote! {
            fn close(&mut self) -> ::std::result::Result<(), Self::Error> {
                #protocol::close(self.#accessor())
            }
        },
    }
}

fn stream_default(name: &str) -> TokenStream2 {
    let accessor = Ident::new(NEXT_ACCESSOR, Span::call_site());
    let method = Ident::new(name, Span::call_site());
    quote! {
        fn #method(&mut self, info: &StreamInfo) {
            <_ as Interceptor>::#method(self.#accessor(), info)
        }
    }
}
