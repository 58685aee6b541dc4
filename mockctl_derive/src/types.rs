// vim: tw=80
//! Helpers that inspect `syn::Type`s.

use quote::ToTokens;
use syn::{
    Error,
    GenericArgument,
    PathArguments,
    Result,
    ReturnType,
    Type,
    spanned::Spanned
};

/// Render a type the way a person would write it.
pub(crate) fn type_string(ty: &Type) -> String {
    // proc_macro2 separates every token with a space
    const FIXUPS: &[(&str, &str)] = &[
        (" :: ", "::"),
        (":: ", "::"),
        (" < ", "<"),
        ("< ", "<"),
        (" <", "<"),
        (" >", ">"),
        (" , ", ", "),
        (" ,", ","),
        ("& ", "&"),
        ("( ", "("),
        (" )", ")"),
        ("[ ", "["),
        (" ]", "]"),
        (" ;", ";"),
    ];
    let mut s = ty.to_token_stream().to_string();
    for (from, to) in FIXUPS {
        s = s.replace(from, to);
    }
    s
}

/// Is this `()`?
pub(crate) fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(t) if t.elems.is_empty())
}

/// The type a method returns, unless that is `()`.
pub(crate) fn output_type(output: &ReturnType) -> Option<&Type> {
    match output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) if is_unit(ty) => None,
        ReturnType::Type(_, ty) => Some(ty)
    }
}

/// The element type of a `Vec<T>`.
pub(crate) fn vec_element(ty: &Type) -> Option<&Type> {
    let Type::Path(tp) = ty else { return None; };
    let seg = tp.path.segments.last()?;
    if seg.ident != "Vec" {
        return None;
    }
    let PathArguments::AngleBracketed(abga) = &seg.arguments else {
        return None;
    };
    match abga.args.first() {
        Some(GenericArgument::Type(t)) if abga.args.len() == 1 => Some(t),
        _ => None
    }
}

/// Values cross into the controller as `Box<dyn Any>`, so every type must be
/// `'static`.
pub(crate) fn check_static(ty: &Type) -> Result<()> {
    match ty {
        Type::Reference(r) => {
            match &r.lifetime {
                Some(lt) if lt.ident == "static" => check_static(&r.elem),
                _ => Err(Error::new(r.span(),
                    "Non-'static references are not supported.  Use an owned \
                     type or a &'static reference"))
            }
        },
        Type::ImplTrait(it) => Err(Error::new(it.span(),
            "impl Trait types are not supported")),
        Type::Path(tp) => {
            if let Some(qself) = &tp.qself {
                check_static(&qself.ty)?;
            }
            for seg in tp.path.segments.iter() {
                if let PathArguments::AngleBracketed(abga) = &seg.arguments {
                    for arg in abga.args.iter() {
                        match arg {
                            GenericArgument::Type(t) => check_static(t)?,
                            GenericArgument::Lifetime(lt)
                                if lt.ident != "static" =>
                            {
                                return Err(Error::new(lt.span(),
                                    "Non-'static lifetimes are not supported"));
                            },
                            _ => ()
                        }
                    }
                }
            }
            Ok(())
        },
        Type::Array(a) => check_static(&a.elem),
        Type::Group(g) => check_static(&g.elem),
        Type::Paren(p) => check_static(&p.elem),
        Type::Slice(s) => check_static(&s.elem),
        Type::Tuple(t) => t.elems.iter().try_for_each(check_static),
        _ => Ok(())
    }
}
