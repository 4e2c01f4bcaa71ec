//! Procedural macros for state-dispatch

use std::collections::HashSet;

use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, DeriveInput, FnArg, ImplItem, ItemImpl, ReturnType, Token};

/// Container-level attributes for #[derive(ActionSet)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(action_set), supports(struct_named))]
struct ActionSetOpts {
    ident: syn::Ident,
    generics: syn::Generics,
    data: darling::ast::Data<(), SlotField>,

    /// Skip generating `Default` and `new()`
    #[darling(default)]
    no_default: bool,
}

/// Field-level attributes
#[derive(Debug, FromField)]
#[darling(attributes(action))]
struct SlotField {
    ident: Option<syn::Ident>,
    ty: syn::Type,

    /// Action name override (defaults to the field name)
    #[darling(default)]
    name: Option<String>,

    /// Not an action slot, even if typed `Action`
    #[darling(default)]
    skip: bool,
}

/// Whether a field type names `Action` (bare or path-qualified, no generics).
fn is_action_type(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Path(path) if path.qself.is_none() => path
            .path
            .segments
            .last()
            .map(|seg| seg.ident == "Action" && seg.arguments.is_none())
            .unwrap_or(false),
        syn::Type::Group(group) => is_action_type(&group.elem),
        syn::Type::Paren(paren) => is_action_type(&paren.elem),
        _ => false,
    }
}

/// Derive macro for the ActionSetDescriptor trait
///
/// Every field of type `Action` is one action slot, named after the field.
/// Generates `Default` and `new()` filling each slot with a fresh action,
/// and an `ActionSetDescriptor` impl listing the slots in field order.
/// Other fields are left to their own `Default`.
///
/// # Attributes
///
/// - `#[action(name = "...")]`: use another action name
/// - `#[action(skip)]`: not a slot; the field still gets a fresh action
/// - `#[action_set(no_default)]` on the struct: write `Default` yourself
///
/// # Example
/// ```ignore
/// #[derive(ActionSet)]
/// struct TodoActions {
///     add: Action,
///     #[action(name = "removeAll")]
///     clear: Action,
/// }
///
/// let actions = TodoActions::new();
/// assert_eq!(actions.clear.name(), "removeAll");
/// let set = actions.action_set()?;
/// ```
#[proc_macro_derive(ActionSet, attributes(action, action_set))]
pub fn derive_action_set(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match ActionSetOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let name = &opts.ident;
    let fields = match &opts.data {
        darling::ast::Data::Struct(fields) => &fields.fields,
        _ => {
            return syn::Error::new_spanned(&input, "ActionSet can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut slots = Vec::new();
    let mut seen = HashSet::new();
    let mut defaults = Vec::new();

    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };

        let is_action = is_action_type(&field.ty);
        if !is_action {
            if field.name.is_some() {
                return syn::Error::new_spanned(
                    ident,
                    "#[action(name = ...)] only applies to `Action` fields",
                )
                .to_compile_error()
                .into();
            }
            defaults.push(quote! { #ident: ::core::default::Default::default() });
            continue;
        }

        let action_name = field
            .name
            .clone()
            .unwrap_or_else(|| ident.unraw().to_string());
        if field.skip {
            // Still a usable action, just not part of the set
            defaults.push(quote! { #ident: ::state_dispatch::Action::new(#action_name) });
            continue;
        }
        if action_name.is_empty() {
            return syn::Error::new_spanned(ident, "action name cannot be empty")
                .to_compile_error()
                .into();
        }
        if !seen.insert(action_name.clone()) {
            return syn::Error::new_spanned(
                ident,
                format!("duplicate action name `{action_name}`"),
            )
            .to_compile_error()
            .into();
        }

        defaults.push(quote! { #ident: ::state_dispatch::Action::new(#action_name) });
        slots.push(ident);
    }

    if slots.is_empty() {
        return syn::Error::new_spanned(
            &input.ident,
            "ActionSet requires at least one field of type `Action`",
        )
        .to_compile_error()
        .into();
    }

    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    let mut expanded = quote! {
        impl #impl_generics ::state_dispatch::ActionSetDescriptor for #name #ty_generics #where_clause {
            fn actions(&self) -> ::std::vec::Vec<::state_dispatch::Action> {
                ::std::vec![#(::core::clone::Clone::clone(&self.#slots)),*]
            }
        }
    };

    if !opts.no_default {
        expanded = quote! {
            #expanded

            impl #impl_generics ::core::default::Default for #name #ty_generics #where_clause {
                fn default() -> Self {
                    Self {
                        #(#defaults),*
                    }
                }
            }

            impl #impl_generics #name #ty_generics #where_clause {
                /// Fresh actions for every slot.
                pub fn new() -> Self {
                    ::core::default::Default::default()
                }
            }
        };
    }

    TokenStream::from(expanded)
}

// ============================================================================
// #[action_logic]
// ============================================================================

/// `state = <type>`
struct LogicArgs {
    state: syn::Type,
}

impl Parse for LogicArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let key: syn::Ident = input.parse()?;
        if key != "state" {
            return Err(syn::Error::new(key.span(), "expected `state = <type>`"));
        }
        input.parse::<Token![=]>()?;
        let state = input.parse()?;
        input.parse::<Option<Token![,]>>()?;
        if !input.is_empty() {
            return Err(input.error("expected only `state = <type>`"));
        }
        Ok(Self { state })
    }
}

/// One method that fits the reducer contract.
struct LogicMethod {
    method: syn::Ident,
    action_name: String,
    payload: Option<syn::Type>,
}

fn same_type(a: &syn::Type, b: &syn::Type) -> bool {
    a.to_token_stream().to_string() == b.to_token_stream().to_string()
}

/// Pull `#[action(name = "...")]` off a method, returning the override.
fn take_name_override(attrs: &mut Vec<syn::Attribute>) -> syn::Result<Option<String>> {
    let mut name = None;
    let mut error = None;
    attrs.retain(|attr| {
        if !attr.path().is_ident("action") {
            return true;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: syn::LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        });
        if let Err(e) = parsed {
            error = Some(e);
        }
        false
    });
    match error {
        Some(e) => Err(e),
        None => Ok(name),
    }
}

/// Match `pub fn name(&self, state: S[, payload: P]) -> S`.
fn logic_method(func: &syn::ImplItemFn, state: &syn::Type) -> Option<(syn::Ident, Option<syn::Type>)> {
    let sig = &func.sig;
    if !matches!(func.vis, syn::Visibility::Public(_))
        || sig.asyncness.is_some()
        || sig.unsafety.is_some()
        || !sig.generics.params.is_empty()
    {
        return None;
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next()? {
        FnArg::Receiver(recv) if recv.reference.is_some() && recv.mutability.is_none() => {}
        _ => return None,
    }

    let typed: Vec<&syn::PatType> = inputs
        .map(|arg| match arg {
            FnArg::Typed(pat) => Some(pat),
            FnArg::Receiver(_) => None,
        })
        .collect::<Option<_>>()?;

    match &sig.output {
        ReturnType::Type(_, ty) if same_type(ty, state) => {}
        _ => return None,
    }

    match typed.as_slice() {
        [first] if same_type(&first.ty, state) => Some((sig.ident.clone(), None)),
        [first, second] if same_type(&first.ty, state) => {
            Some((sig.ident.clone(), Some((*second.ty).clone())))
        }
        _ => None,
    }
}

/// Attribute macro implementing `ActionLogic` for an inherent impl block
///
/// Each `pub fn name(&self, state: S) -> S` or
/// `pub fn name(&self, state: S, payload: P) -> S` becomes a logic entry
/// bound by name to the action of the same name. Methods of any other shape
/// are left alone. Rename an entry with `#[action(name = "...")]`.
///
/// # Example
/// ```ignore
/// struct Counter;
///
/// #[action_logic(state = i32)]
/// impl Counter {
///     pub fn increment(&self, state: i32, by: i32) -> i32 {
///         state + by
///     }
///
///     #[action(name = "reset")]
///     pub fn zero(&self, _state: i32) -> i32 {
///         0
///     }
/// }
///
/// let unit = BusinessUnitBuilder::from_descriptor(0, &actions)?
///     .logic(Counter)?
///     .build()?;
/// ```
#[proc_macro_attribute]
pub fn action_logic(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as LogicArgs);
    let mut item = parse_macro_input!(item as ItemImpl);

    match expand_action_logic(&args, &mut item) {
        Ok(expanded) => expanded.into(),
        Err(e) => {
            let original = item.to_token_stream();
            let error = e.to_compile_error();
            quote! { #original #error }.into()
        }
    }
}

fn expand_action_logic(args: &LogicArgs, item: &mut ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[action_logic] applies to inherent impl blocks only",
        ));
    }

    let state = &args.state;
    let mut methods = Vec::new();
    let mut seen = HashSet::new();

    for impl_item in &mut item.items {
        let ImplItem::Fn(func) = impl_item else {
            continue;
        };
        let rename = take_name_override(&mut func.attrs)?;
        let Some((method, payload)) = logic_method(func, state) else {
            if rename.is_some() {
                return Err(syn::Error::new_spanned(
                    &func.sig,
                    "#[action(name = ...)] requires `pub fn(&self, state: S[, payload: P]) -> S`",
                ));
            }
            continue;
        };
        let action_name = rename.unwrap_or_else(|| method.unraw().to_string());
        if !seen.insert(action_name.clone()) {
            return Err(syn::Error::new_spanned(
                &func.sig.ident,
                format!("duplicate logic entry `{action_name}`"),
            ));
        }
        methods.push(LogicMethod {
            method,
            action_name,
            payload,
        });
    }

    let entries = methods.iter().map(|m| {
        let method = &m.method;
        let action_name = &m.action_name;
        match &m.payload {
            None => quote! {{
                let this = ::std::sync::Arc::clone(&self);
                ::state_dispatch::LogicEntry::new(#action_name, move |state: #state| this.#method(state))
            }},
            Some(payload) => quote! {{
                let this = ::std::sync::Arc::clone(&self);
                ::state_dispatch::LogicEntry::new(
                    #action_name,
                    move |state: #state, payload: #payload| this.#method(state, payload),
                )
            }},
        }
    });

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics ::state_dispatch::ActionLogic<#state> for #self_ty #where_clause {
            fn entries(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::vec::Vec<::state_dispatch::LogicEntry<#state>> {
                ::std::vec![#(#entries),*]
            }
        }
    })
}
