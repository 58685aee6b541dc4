// vim: tw=80
//! Code generation for `#[mock]`.

use cfg_if::cfg_if;
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use syn::{
    Error,
    FnArg,
    Ident,
    ItemTrait,
    Pat,
    Result,
    Signature,
    TraitItem,
    TraitItemFn,
    Type,
    parse2,
    parse_quote,
    spanned::Spanned
};

use crate::types::{check_static, output_type, type_string, vec_element};

/// Remove a `#[variadic]` attribute, reporting whether there was one.
fn take_variadic(attrs: &mut Vec<syn::Attribute>) -> bool {
    let before = attrs.len();
    attrs.retain(|a| !a.path().is_ident("variadic"));
    attrs.len() != before
}

/// One trait method, as the mock sees it.
struct MockedMethod {
    name: Ident,
    /// Fixed parameters
    args: Vec<(Ident, Type)>,
    /// Name and element type of the `#[variadic]` parameter
    variadic: Option<(Ident, Type)>,
    output: Option<Type>,
    /// The method's signature with every parameter given a plain name
    sig: Signature,
}

impl MockedMethod {
    fn parse(f: &TraitItemFn) -> Result<Self> {
        let sig = &f.sig;
        if let Some(a) = &sig.asyncness {
            return Err(Error::new(a.span(), "async methods are not supported"));
        }
        if !sig.generics.params.is_empty() {
            return Err(Error::new(sig.generics.span(),
                "Generic methods are not supported"));
        }
        if let Some(v) = &sig.variadic {
            return Err(Error::new(v.span(),
                "C-variadic methods are not supported.  Mark the last \
                 parameter #[variadic] instead"));
        }
        if sig.receiver().is_none() {
            return Err(Error::new(sig.ident.span(),
                "Static methods are not supported: a mock needs a receiver"));
        }

        let mut impl_sig = sig.clone();
        let ninputs = impl_sig.inputs.len();
        let mut args = Vec::new();
        let mut variadic = None;
        for (i, input) in impl_sig.inputs.iter_mut().enumerate() {
            let FnArg::Typed(pt) = input else { continue; };
            let is_variadic = take_variadic(&mut pt.attrs);
            check_static(&pt.ty)?;
            let ident = match &*pt.pat {
                Pat::Ident(pi) => pi.ident.clone(),
                _ => format_ident!("arg{}", i)
            };
            pt.pat = Box::new(parse_quote!(#ident));
            if is_variadic {
                if i + 1 != ninputs {
                    return Err(Error::new(pt.span(),
                        "Only the last parameter may be #[variadic]"));
                }
                let elem = vec_element(&pt.ty)
                    .ok_or_else(|| Error::new(pt.ty.span(),
                        "A #[variadic] parameter must be a Vec"))?;
                variadic = Some((ident, elem.clone()));
            } else {
                args.push((ident, (*pt.ty).clone()));
            }
        }

        let output = output_type(&sig.output).cloned();
        if let Some(ty) = &output {
            check_static(ty)?;
        }
        Ok(MockedMethod {
            name: sig.ident.clone(),
            args,
            variadic,
            output,
            sig: impl_sig
        })
    }

    fn method_type(&self) -> TokenStream {
        let params = Literal::usize_unsuffixed(
            self.args.len() + usize::from(self.variadic.is_some()));
        let results = Literal::usize_unsuffixed(
            usize::from(self.output.is_some()));
        let variadic = self.variadic.is_some();
        quote!(::mockctl::MethodType::new(#params, #results, #variadic))
    }

    /// The registration method on the recorder.
    fn gen_recorder(&self) -> TokenStream {
        let name = &self.name;
        let name_str = name.to_string();
        let argnames = self.args.iter().map(|(id, _)| id).collect::<Vec<_>>();
        let mtypes = (0..self.args.len())
            .map(|i| format_ident!("M{}", i))
            .collect::<Vec<_>>();
        let (vparam, vextend) = match &self.variadic {
            Some((id, _)) => (
                quote!(, #id: ::std::vec::Vec<
                       ::std::boxed::Box<dyn ::mockctl::Matcher>>),
                quote!(__matchers.extend(#id);)
            ),
            None => (TokenStream::new(), TokenStream::new())
        };
        let method_type = self.method_type();
        quote! {
            #[track_caller]
            pub fn #name<#(#mtypes: ::mockctl::Matcher),*>(
                &self #(, #argnames: #mtypes)* #vparam) -> ::mockctl::Call
            {
                #[allow(unused_mut)]
                let mut __matchers = ::std::vec![#(
                    ::std::boxed::Box::new(#argnames)
                        as ::std::boxed::Box<dyn ::mockctl::Matcher>
                ),*];
                #vextend
                self.mock.ctrl.record_expectation_with_method_type(
                    &self.mock.receiver, #name_str, #method_type, __matchers)
            }
        }
    }

    /// The trait method's implementation on the mock.
    fn gen_impl(&self) -> TokenStream {
        let sig = &self.sig;
        let name_str = self.name.to_string();
        let argnames = self.args.iter().map(|(id, _)| id);
        let collect = match &self.variadic {
            Some((id, _)) => quote! {
                let mut __args = ::std::vec![#(::mockctl::value!(#argnames)),*];
                for __a in #id {
                    __args.push(::mockctl::value!(__a));
                }
            },
            None => quote! {
                let __args = ::std::vec![#(::mockctl::value!(#argnames)),*];
            }
        };
        let call = match &self.output {
            Some(ty) => quote! {
                self.ctrl.call_returning::<#ty>(&self.receiver, #name_str,
                                                __args)
            },
            None => quote! {
                self.ctrl.call(&self.receiver, #name_str, __args);
            }
        };
        quote! {
            #[track_caller]
            #sig {
                #collect
                #call
            }
        }
    }

    /// Builder expression for the method's `::mockctl::Method` descriptor.
    fn gen_model(&self) -> TokenStream {
        let name_str = self.name.to_string();
        let params = self.args.iter().map(|(id, ty)| {
            let n = id.to_string();
            let t = type_string(ty);
            quote!(.param(::mockctl::Parameter::new(#n, #t)))
        });
        let variadic = self.variadic.iter().map(|(id, ty)| {
            let n = id.to_string();
            let t = type_string(ty);
            quote!(.variadic(::mockctl::Parameter::new(#n, #t)))
        });
        let result = self.output.iter().map(|ty| {
            let t = type_string(ty);
            quote!(.result(::mockctl::Parameter::new("", #t)))
        });
        quote! {
            ::mockctl::Method::new(#name_str) #(#params)* #(#variadic)*
                #(#result)*
        }
    }
}

struct MockedTrait {
    item: ItemTrait,
    mock_name: Ident,
    methods: Vec<MockedMethod>,
}

impl MockedTrait {
    fn parse(mock_name: Option<Ident>, mut item: ItemTrait) -> Result<Self> {
        if !item.generics.params.is_empty() {
            return Err(Error::new(item.generics.span(),
                "Generic traits are not supported"));
        }
        let mut methods = Vec::new();
        for ti in item.items.iter_mut() {
            match ti {
                TraitItem::Fn(f) => {
                    methods.push(MockedMethod::parse(f)?);
                    // The emitted trait must not keep #[variadic]
                    for input in f.sig.inputs.iter_mut() {
                        if let FnArg::Typed(pt) = input {
                            take_variadic(&mut pt.attrs);
                        }
                    }
                },
                TraitItem::Type(t) => return Err(Error::new(t.span(),
                    "Associated types are not supported")),
                TraitItem::Const(c) => return Err(Error::new(c.span(),
                    "Associated constants are not supported")),
                other => return Err(Error::new(other.span(),
                    "Unsupported trait item"))
            }
        }
        let mock_name = mock_name
            .unwrap_or_else(|| format_ident!("Mock{}", item.ident));
        Ok(MockedTrait { item, mock_name, methods })
    }

    fn gen(&self) -> TokenStream {
        let item = &self.item;
        let vis = &item.vis;
        let trait_name = &item.ident;
        let unsafety = &item.unsafety;
        let trait_str = trait_name.to_string();
        let mock_name = &self.mock_name;
        let mock_str = mock_name.to_string();
        let recorder = format_ident!("{}Recorder", mock_name);
        let recorder_methods = self.methods.iter()
            .map(MockedMethod::gen_recorder);
        let impl_methods = self.methods.iter().map(MockedMethod::gen_impl);
        let models = self.methods.iter().map(MockedMethod::gen_model);
        quote! {
            #item

            #vis struct #mock_name {
                ctrl: ::mockctl::Controller,
                receiver: ::mockctl::Receiver,
            }

            impl #mock_name {
                /// Create a mock whose calls are checked by `ctrl`.
                pub fn new(ctrl: &::mockctl::Controller) -> Self {
                    #mock_name {
                        ctrl: ctrl.clone(),
                        receiver: ::mockctl::Receiver::new::<Self>(),
                    }
                }

                /// Register expectations for this mock.
                pub fn expect(&self) -> #recorder<'_> {
                    #recorder { mock: self }
                }

                pub fn receiver(&self) -> &::mockctl::Receiver {
                    &self.receiver
                }

                /// Description of the mocked trait.
                pub fn interface() -> ::mockctl::Interface {
                    #[allow(unused_mut)]
                    let mut __interface = ::mockctl::Interface::new(#trait_str);
                    #(__interface.add_method(#models);)*
                    __interface
                }
            }

            #vis struct #recorder<'a> {
                mock: &'a #mock_name,
            }

            impl<'a> #recorder<'a> {
                #(#recorder_methods)*
            }

            #unsafety impl #trait_name for #mock_name {
                #(#impl_methods)*
            }

            impl ::std::fmt::Debug for #mock_name {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>)
                    -> ::std::fmt::Result
                {
                    f.write_str(#mock_str)
                }
            }

            impl ::mockctl::MockInstance for #mock_name {}

            impl ::std::ops::Drop for #mock_name {
                fn drop(&mut self) {
                    self.ctrl.release(&self.receiver);
                }
            }
        }
    }
}

fn try_mock(attrs: TokenStream, input: TokenStream) -> Result<TokenStream> {
    let mock_name = if attrs.is_empty() {
        None
    } else {
        Some(parse2::<Ident>(attrs)?)
    };
    let item: ItemTrait = parse2(input)?;
    Ok(MockedTrait::parse(mock_name, item)?.gen())
}

cfg_if! {
    // proc_macro::Span only exists within a real macro invocation, never in
    // unit tests.
    if #[cfg(all(feature = "nightly_derive", not(test)))] {
        fn report(e: Error) -> TokenStream {
            for e in e {
                e.span().unwrap().error(e.to_string()).emit();
            }
            TokenStream::new()
        }
    } else {
        fn report(e: Error) -> TokenStream {
            e.to_compile_error()
        }
    }
}

pub(crate) fn do_mock(attrs: TokenStream, input: TokenStream) -> TokenStream {
    match try_mock(attrs, input.clone()) {
        Ok(ts) => ts,
        Err(e) => {
            // Keep the original item, so the error is the only one reported
            let mut ts = input;
            ts.extend(report(e));
            ts
        }
    }
}
