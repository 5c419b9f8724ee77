//! Minimal type and size inference over flattened declarations.
//!
//! Only what the C generator needs: the type of every global, the resolved
//! underlying type of every named type, and byte sizes for a [`Target`].

use crate::flatten::FlatDecl;
use crate::{Error, Result};
use parser::ast::{Decl, Expr, Field, FuncType, Lit};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub int_size: usize,
    pub pointer_size: usize,
}

impl Default for Target {
    fn default() -> Self {
        Target {
            int_size: 8,
            pointer_size: 8,
        }
    }
}

pub fn align_size(size: usize, align: usize) -> usize {
    (size + align - 1) / align * align
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    String,
    Pointer(Box<Type>),
    Function {
        params: Vec<Type>,
        results: Vec<Type>,
    },
    Method {
        receiver: Box<Type>,
        params: Vec<Type>,
        results: Vec<Type>,
    },
    /// The type of a name that denotes a type.
    TypeType,
}

impl Type {
    pub fn size(&self, target: Target) -> usize {
        let ptr = target.pointer_size;
        match self {
            Type::Int => target.int_size,
            Type::Bool => 1,
            Type::String => align_size(target.int_size + ptr, ptr),
            Type::Pointer(_) | Type::Method { .. } | Type::TypeType => ptr,
            Type::Function { .. } => align_size(target.int_size + 2 * ptr, ptr),
        }
    }

    pub fn align(&self, target: Target) -> usize {
        match self {
            Type::Int => target.int_size,
            Type::Bool => 1,
            _ => target.pointer_size,
        }
    }

    /// The type written as a Go type expression, for annotations.
    pub fn to_expr(&self) -> Expr {
        fn fields(ts: &[Type]) -> Vec<Field> {
            ts.iter()
                .map(|t| Field {
                    names: Vec::new(),
                    ty: t.to_expr(),
                })
                .collect()
        }
        match self {
            Type::Int => Expr::ident("int"),
            Type::Bool => Expr::ident("bool"),
            Type::String => Expr::ident("string"),
            Type::Pointer(t) => Expr::Star(Box::new(t.to_expr())),
            Type::Function { params, results } | Type::Method {
                params, results, ..
            } => Expr::FuncType(FuncType {
                params: fields(params),
                results: fields(results),
            }),
            Type::TypeType => Expr::ident("type"),
        }
    }
}

/// Types of flattened globals, keyed by mangled name.
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    types: BTreeMap<String, Type>,
    underlying: BTreeMap<String, Type>,
}

impl TypeMap {
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// The resolved underlying type of the named type `name`.
    pub fn underlying(&self, name: &str) -> Option<&Type> {
        self.underlying.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.types.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Evaluates a type expression. Named types must already be resolved.
    pub fn eval_type_expr(&self, e: &Expr) -> Result<Type> {
        Resolver {
            map: self,
            specs: &FxHashMap::default(),
            resolving: &mut FxHashSet::default(),
            resolved: &mut Vec::new(),
        }
        .eval(e)
    }

    /// Infers the type of every declaration not yet in the map. Variables
    /// without an annotation get one written back.
    pub fn check(&mut self, decls: &mut [FlatDecl]) -> Result<()> {
        let specs: FxHashMap<String, Expr> = decls
            .iter()
            .filter_map(|d| match &d.decl {
                Decl::Type(specs) => Some(specs),
                _ => None,
            })
            .flatten()
            .map(|s| (s.name.clone(), s.ty.clone()))
            .collect();
        let mut names: Vec<&String> = specs.keys().collect();
        names.sort();
        let mut resolved = Vec::new();
        {
            let mut r = Resolver {
                map: self,
                specs: &specs,
                resolving: &mut FxHashSet::default(),
                resolved: &mut resolved,
            };
            for name in names {
                r.named(name)?;
            }
        }
        for (name, t) in resolved {
            log::debug!("type {name} = {t:?}");
            self.underlying.insert(name.clone(), t);
            self.types.insert(name, Type::TypeType);
        }
        for d in decls.iter_mut() {
            match &mut d.decl {
                Decl::Func(f) => {
                    if self.types.contains_key(&f.name) {
                        continue;
                    }
                    let (params, results) = self.signature(&f.ty)?;
                    let t = match &f.recv {
                        Some(recv) => Type::Method {
                            receiver: Box::new(self.eval_type_expr(&recv.ty)?),
                            params,
                            results,
                        },
                        None => Type::Function { params, results },
                    };
                    self.types.insert(f.name.clone(), t);
                }
                Decl::Var(specs) => {
                    for spec in specs {
                        for (i, name) in spec.names.iter().enumerate() {
                            if self.types.contains_key(name) {
                                continue;
                            }
                            let t = match &spec.ty {
                                Some(ty) => self.eval_type_expr(ty)?,
                                None => literal_type(name, spec.values.get(i))?,
                            };
                            self.types.insert(name.clone(), t);
                        }
                        if spec.ty.is_none() {
                            if let Some(t) = spec.names.first().and_then(|n| self.types.get(n)) {
                                spec.ty = Some(t.to_expr());
                            }
                        }
                    }
                }
                Decl::Type(_) => (),
                Decl::Const(_) => {
                    return Err(Error::unsupported("const declaration", d.key.to_string()));
                }
            }
        }
        Ok(())
    }

    fn signature(&self, ty: &FuncType) -> Result<(Vec<Type>, Vec<Type>)> {
        Ok((self.fields(&ty.params)?, self.fields(&ty.results)?))
    }

    fn fields(&self, fields: &[Field]) -> Result<Vec<Type>> {
        let mut ts = Vec::new();
        for f in fields {
            let t = self.eval_type_expr(&f.ty)?;
            ts.extend(std::iter::repeat(t).take(f.names.len().max(1)));
        }
        Ok(ts)
    }
}

/// The type of an unannotated global from its initializer.
fn literal_type(name: &str, value: Option<&Expr>) -> Result<Type> {
    match value {
        Some(Expr::Lit(Lit::Str(_))) => Ok(Type::String),
        Some(Expr::Lit(Lit::Int(_))) => Ok(Type::Int),
        Some(Expr::Ident(b)) if b == "true" || b == "false" => Ok(Type::Bool),
        Some(e) => Err(Error::unsupported(
            e.kind(),
            format!("cannot infer the type of `{name}`; add a type annotation"),
        )),
        None => Err(Error::Malformed(format!("`{name}` has neither type nor value"))),
    }
}

/// Evaluates type expressions, resolving named types on demand.
struct Resolver<'a> {
    map: &'a TypeMap,
    specs: &'a FxHashMap<String, Expr>,
    resolving: &'a mut FxHashSet<String>,
    /// Named types resolved by this run, in resolution order.
    resolved: &'a mut Vec<(String, Type)>,
}

impl Resolver<'_> {
    fn named(&mut self, name: &str) -> Result<Type> {
        if let Some(t) = self.map.underlying(name) {
            return Ok(t.clone());
        }
        if let Some((_, t)) = self.resolved.iter().find(|(n, _)| n == name) {
            return Ok(t.clone());
        }
        let Some(spec) = self.specs.get(name) else {
            return Err(Error::UnknownIdentifier(name.to_string()));
        };
        if !self.resolving.insert(name.to_string()) {
            return Err(Error::unsupported(
                "type declaration",
                format!("`{name}` refers to itself"),
            ));
        }
        let t = self.eval(spec)?;
        self.resolving.remove(name);
        self.resolved.push((name.to_string(), t.clone()));
        Ok(t)
    }

    fn eval(&mut self, e: &Expr) -> Result<Type> {
        match e {
            Expr::Ident(n) => match n.as_str() {
                "int" => Ok(Type::Int),
                "bool" => Ok(Type::Bool),
                "string" => Ok(Type::String),
                _ => self.named(n),
            },
            Expr::Paren(t) => self.eval(t),
            Expr::Star(t) => Ok(Type::Pointer(Box::new(self.eval(t)?))),
            Expr::FuncType(f) => {
                let mut params = Vec::new();
                let mut results = Vec::new();
                for (fields, ts) in [(&f.params, &mut params), (&f.results, &mut results)] {
                    for field in fields {
                        let t = self.eval(&field.ty)?;
                        ts.extend(std::iter::repeat(t).take(field.names.len().max(1)));
                    }
                }
                Ok(Type::Function { params, results })
            }
            _ => Err(Error::unsupported(e.kind(), format!("type `{e}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{align_size, Target, Type, TypeMap};
    use crate::flatten::{FlatDecl, SymbolKey};
    use parser::ast::{Decl, Expr};

    fn decls(src: &str) -> Vec<FlatDecl> {
        let file = parser::parse(&format!("package main\n{src}")).unwrap();
        file.decls
            .into_iter()
            .map(|decl| FlatDecl {
                key: SymbolKey::new("main", decl.names()[0]),
                decl,
                refs: Default::default(),
            })
            .collect()
    }

    #[test]
    fn sizes() {
        let t = Target {
            int_size: 4,
            pointer_size: 4,
        };
        assert_eq!(Type::Int.size(t), 4);
        assert_eq!(Type::String.size(t), 8);
        assert_eq!(
            Type::Function {
                params: vec![],
                results: vec![]
            }
            .size(t),
            12
        );
        assert_eq!(Type::TypeType.size(t), 4);
        let t = Target {
            int_size: 4,
            pointer_size: 8,
        };
        assert_eq!(Type::String.size(t), 16);
        assert_eq!(align_size(13, 8), 16);
        assert_eq!(align_size(16, 8), 16);
    }

    #[test]
    fn functions_and_variables() {
        let mut ds = decls(
            "type main_T int\nvar main_s = \"x\"\nvar main_n = 3\nvar main_t main_T\nfunc main_f(a, b int, s string) (main_T, *int) { return 0, nil }",
        );
        let mut map = TypeMap::default();
        map.check(&mut ds).unwrap();
        assert_eq!(map.get("main_T"), Some(&Type::TypeType));
        assert_eq!(map.underlying("main_T"), Some(&Type::Int));
        assert_eq!(map.get("main_s"), Some(&Type::String));
        assert_eq!(map.get("main_n"), Some(&Type::Int));
        assert_eq!(map.get("main_t"), Some(&Type::Int));
        assert_eq!(
            map.get("main_f"),
            Some(&Type::Function {
                params: vec![Type::Int, Type::Int, Type::String],
                results: vec![Type::Int, Type::Pointer(Box::new(Type::Int))],
            })
        );
        let Decl::Var(specs) = &ds[1].decl else {
            panic!()
        };
        assert_eq!(specs[0].ty, Some(Expr::ident("string")));
    }

    #[test]
    fn named_types_resolve_out_of_order() {
        let mut ds = decls("type main_A main_B\ntype main_B *main_C\ntype main_C bool");
        let mut map = TypeMap::default();
        map.check(&mut ds).unwrap();
        assert_eq!(
            map.underlying("main_A"),
            Some(&Type::Pointer(Box::new(Type::Bool)))
        );
    }

    #[test]
    fn recursive_type_is_rejected() {
        let mut ds = decls("type main_L *main_L");
        assert!(TypeMap::default().check(&mut ds).is_err());
    }

    #[test]
    fn uninferable_variable() {
        let mut ds = decls("var main_x = main_f()");
        let e = TypeMap::default().check(&mut ds).unwrap_err();
        assert!(e.to_string().contains("call expression"), "{e}");
    }

    #[test]
    fn checking_twice_is_idempotent() {
        let mut ds = decls("var main_x = 1\nfunc main_f() int { return main_x }");
        let mut map = TypeMap::default();
        map.check(&mut ds).unwrap();
        let first = map.iter().map(|(n, t)| (n.to_string(), t.clone())).collect::<Vec<_>>();
        let annotated = ds.clone();
        map.check(&mut ds).unwrap();
        let second = map.iter().map(|(n, t)| (n.to_string(), t.clone())).collect::<Vec<_>>();
        assert_eq!(first, second);
        assert_eq!(annotated, ds);
    }

    #[test]
    fn unsupported_type_names_the_node() {
        let mut ds = decls("var main_x []int");
        let e = TypeMap::default().check(&mut ds).unwrap_err();
        assert!(e.to_string().contains("array type"), "{e}");
    }
}
