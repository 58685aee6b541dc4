// vim: tw=80
//! Descriptors of mocked interfaces.
//!
//! These are produced by `#[mock]` (or by hand, for code that forwards into a
//! [`Controller`](crate::Controller) without the attribute) and consumed by
//! dispatch only through [`MethodType`], which tells it how many arguments a
//! method takes and whether the last of them is variadic.

use std::fmt;

/// Shape of a method as seen by dispatch.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MethodType {
    /// Number of parameters, counting the variadic one (if any) as one.
    pub params: usize,
    /// Number of return values.
    pub results: usize,
    /// Is the final parameter variadic?
    pub variadic: bool,
}

impl MethodType {
    pub fn new(params: usize, results: usize, variadic: bool) -> Self {
        MethodType { params, results, variadic }
    }

    /// A method with a fixed number of parameters and a single result.
    pub fn fixed(params: usize) -> Self {
        MethodType::new(params, 1, false)
    }

    /// Number of parameters that precede the variadic tail.
    pub fn fixed_params(&self) -> usize {
        if self.variadic {
            self.params.saturating_sub(1)
        } else {
            self.params
        }
    }
}

/// A method argument or result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Parameter {
    /// May be empty
    pub name: String,
    /// Rendered type, such as `Vec<u8>`
    pub ty: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Parameter { name: name.into(), ty: ty.into() }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "\"\"" } else { &self.name };
        writeln!(f, "    - {}: {}", name, self.ty)
    }
}

/// A single method of an interface.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Method {
    pub name: String,
    pub params: Vec<Parameter>,
    pub results: Vec<Parameter>,
    pub variadic: Option<Parameter>,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Method { name: name.into(), ..Default::default() }
    }

    pub fn param(mut self, p: Parameter) -> Self {
        self.params.push(p);
        self
    }

    pub fn result(mut self, p: Parameter) -> Self {
        self.results.push(p);
        self
    }

    pub fn variadic(mut self, p: Parameter) -> Self {
        self.variadic = Some(p);
        self
    }

    pub fn method_type(&self) -> MethodType {
        let variadic = self.variadic.is_some();
        MethodType {
            params: self.params.len() + usize::from(variadic),
            results: self.results.len(),
            variadic
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  - method {}", self.name)?;
        if !self.params.is_empty() {
            writeln!(f, "    in:")?;
            for p in self.params.iter() {
                write!(f, "{}", p)?;
            }
        }
        if let Some(v) = &self.variadic {
            writeln!(f, "    ...:")?;
            write!(f, "{}", v)?;
        }
        if !self.results.is_empty() {
            writeln!(f, "    out:")?;
            for p in self.results.iter() {
                write!(f, "{}", p)?;
            }
        }
        Ok(())
    }
}

/// A mockable interface: a trait, for Rust.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Interface {
    pub name: String,
    pub type_params: Vec<Parameter>,
    pub methods: Vec<Method>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Interface { name: name.into(), ..Default::default() }
    }

    /// Add a method, unless one with the same name is already present.
    pub fn add_method(&mut self, m: Method) {
        if self.methods.iter().all(|me| me.name != m.name) {
            self.methods.push(m);
        }
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "interface {}", self.name)?;
        for m in self.methods.iter() {
            write!(f, "{}", m)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod t {
    use super::*;

    fn sample() -> Interface {
        let mut i = Interface::new("Store");
        i.add_method(Method::new("get")
            .param(Parameter::new("key", "String"))
            .result(Parameter::new("", "Option<u32>")));
        i.add_method(Method::new("log")
            .param(Parameter::new("fmt", "&'static str"))
            .variadic(Parameter::new("args", "u32")));
        i
    }

    #[test]
    fn add_method_dedups_by_name() {
        let mut i = sample();
        i.add_method(Method::new("get"));
        assert_eq!(2, i.methods.len());
        assert_eq!(1, i.method("get").unwrap().params.len());
    }

    #[test]
    fn method_type_counts_variadic_once() {
        let i = sample();
        let mt = i.method("log").unwrap().method_type();
        assert_eq!(MethodType::new(2, 0, true), mt);
        assert_eq!(1, mt.fixed_params());
        assert_eq!(MethodType::fixed(1),
                   i.method("get").unwrap().method_type());
    }

    #[test]
    fn outline() {
        let expected = "interface Store\n\
                        \x20 - method get\n\
                        \x20   in:\n\
                        \x20   - key: String\n\
                        \x20   out:\n\
                        \x20   - \"\": Option<u32>\n\
                        \x20 - method log\n\
                        \x20   in:\n\
                        \x20   - fmt: &'static str\n\
                        \x20   ...:\n\
                        \x20   - args: u32\n";
        assert_eq!(expected, sample().to_string());
    }
}
