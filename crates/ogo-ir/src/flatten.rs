//! Whole-program flattening: starting from `main.init` and `main.main`,
//! collects every reachable declaration of every package, renames package
//! level identifiers to `package_name` and orders the result so that C can
//! compile it top to bottom.

use crate::runtime::RuntimeSymbol;
use crate::util::scc::scc;
use crate::{DeclGraph, Error, Package, Result};
use parser::ast::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

pub const ENTRY_PACKAGE: &str = "main";

/// Where flattening starts: the command's initializer, then its `main`.
const SEEDS: [&str; 2] = ["main.init", "main.main"];

/// Identity of a package level declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolKey {
    pub package: String,
    pub name: String,
}

impl SymbolKey {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        SymbolKey {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn mangled(&self) -> String {
        mangle(&self.package, &self.name)
    }
}

impl Display for SymbolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

/// Splits at the last `.`, so `example.com/x.F` is `F` in `example.com/x`.
impl FromStr for SymbolKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once('.') {
            Some((package, name)) if !package.is_empty() && !name.is_empty() => {
                Ok(SymbolKey::new(package, name))
            }
            _ => Err(Error::Malformed(format!("`{s}` is not a symbol key"))),
        }
    }
}

/// A worklist item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Global(SymbolKey),
    Runtime(RuntimeSymbol),
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Global(k) => write!(f, "{k}"),
            Symbol::Runtime(r) => write!(f, "{r}"),
        }
    }
}

pub fn mangle(package: &str, name: &str) -> String {
    format!("{package}_{name}").replace(['/', '.', '-'], "_")
}

fn call(name: String) -> Stmt {
    Stmt::Expr(Expr::Call {
        fun: Box::new(Expr::ident(name)),
        args: Vec::new(),
        ellipsis: false,
    })
}

/// A renamed declaration together with the globals its body refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatDecl {
    pub key: SymbolKey,
    pub decl: Decl,
    pub refs: BTreeSet<SymbolKey>,
}

#[derive(Debug, Clone)]
pub struct Program {
    /// Reachable declarations, each after everything it refers to unless
    /// they are mutually recursive.
    pub decls: Vec<FlatDecl>,
    /// The synthesized `main` that runs the initializers and then
    /// [`Program::main`].
    pub entry: FuncDecl,
    /// Mangled initializer names in call order.
    pub inits: Vec<String>,
    /// Mangled name of the original `main.main`.
    pub main: String,
    pub runtime: BTreeSet<RuntimeSymbol>,
}

impl Program {
    /// The flattened program as a single Go file.
    pub fn to_file(&self) -> File {
        File {
            package: ENTRY_PACKAGE.to_string(),
            imports: Vec::new(),
            decls: self
                .decls
                .iter()
                .map(|d| d.decl.clone())
                .chain([Decl::Func(self.entry.clone())])
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FlatDecl> {
        self.decls.iter().find(|d| d.key.mangled() == name)
    }
}

pub fn flatten(graph: &DeclGraph) -> Result<Program> {
    Flattener {
        graph,
        todo: Vec::new(),
        done: FxHashSet::default(),
        out: Vec::new(),
        runtime: BTreeSet::new(),
        mangled: FxHashMap::default(),
        packages: Vec::new(),
    }
    .run()
}

struct Flattener<'g> {
    graph: &'g DeclGraph,
    todo: Vec<Symbol>,
    /// Everything ever pushed onto `todo`.
    done: FxHashSet<Symbol>,
    out: Vec<FlatDecl>,
    runtime: BTreeSet<RuntimeSymbol>,
    mangled: FxHashMap<String, SymbolKey>,
    /// Reachable packages in discovery order.
    packages: Vec<String>,
}

impl<'g> Flattener<'g> {
    fn run(mut self) -> Result<Program> {
        let mut entry = None;
        for seed in SEEDS {
            let key: SymbolKey = seed.parse()?;
            entry = Some(key.clone());
            self.schedule(Symbol::Global(key));
        }
        let entry = entry.ok_or_else(|| Error::Malformed("no entry point".to_string()))?;
        while let Some(s) = self.todo.pop() {
            match s {
                Symbol::Runtime(r) => {
                    self.runtime.insert(r);
                }
                Symbol::Global(key) => self.visit(&key)?,
            }
        }
        let inits = self.init_order()?;
        let main = entry.mangled();
        let body = inits.iter().chain([&main]).cloned().map(call).collect();
        let mut decls = self.out;
        decls.reverse();
        let decls = declare_before_use(decls);
        log::info!(
            "flattened {} declarations from {} packages",
            decls.len(),
            self.packages.len()
        );
        Ok(Program {
            decls,
            entry: FuncDecl {
                name: "main".to_string(),
                recv: None,
                ty: FuncType::default(),
                body: Some(Block { stmts: body }),
            },
            inits,
            main,
            runtime: self.runtime,
        })
    }

    fn schedule(&mut self, s: Symbol) {
        if self.done.insert(s.clone()) {
            log::debug!("scheduling {s}");
            if let Symbol::Global(k) = &s {
                if k.name == "init" {
                    self.packages.push(k.package.clone());
                }
            }
            self.todo.push(s);
        }
    }

    /// Reserves the mangled name of `key`.
    fn register(&mut self, key: &SymbolKey) -> Result<String> {
        let mangled = key.mangled();
        match self.mangled.get(&mangled) {
            Some(first) if first != key => Err(Error::ManglingCollision {
                mangled,
                first: first.clone(),
                second: key.clone(),
            }),
            Some(_) => Ok(mangled),
            None => {
                self.mangled.insert(mangled.clone(), key.clone());
                Ok(mangled)
            }
        }
    }

    fn emit(&mut self, key: SymbolKey, decl: Decl, refs: BTreeSet<SymbolKey>) -> Result<()> {
        self.register(&key)?;
        self.out.push(FlatDecl { key, decl, refs });
        Ok(())
    }

    /// Emits the single initializer of a package. Several `init` functions
    /// each become `pkg_init_<i>`, called from `pkg_init` in file order, so a
    /// `return` in one of them does not skip the others.
    fn emit_init(
        &mut self,
        key: &SymbolKey,
        mut inits: Vec<(Block, BTreeSet<SymbolKey>)>,
    ) -> Result<()> {
        let func = |name, body| FuncDecl {
            name,
            recv: None,
            ty: FuncType::default(),
            body: Some(body),
        };
        let name = self.register(key)?;
        let (body, refs) = if inits.len() <= 1 {
            inits.pop().unwrap_or_default()
        } else {
            let mut stmts = Vec::with_capacity(inits.len());
            let mut refs = BTreeSet::new();
            for (i, (body, body_refs)) in inits.into_iter().enumerate() {
                let part = SymbolKey::new(key.package.as_str(), format!("init.{i}"));
                let part_name = self.register(&part)?;
                stmts.push(call(part_name.clone()));
                self.emit(part.clone(), Decl::Func(func(part_name, body)), body_refs)?;
                refs.insert(part);
            }
            (Block { stmts }, refs)
        };
        self.emit(key.clone(), Decl::Func(func(name, body)), refs)
    }

    fn visit(&mut self, key: &SymbolKey) -> Result<()> {
        let graph = self.graph;
        let (package_path, package) = graph
            .packages
            .get_key_value(&key.package)
            .ok_or_else(|| Error::MissingPackage(key.package.clone()))?;
        let package_path = package_path.as_str();
        if key.name != "init" {
            self.schedule(Symbol::Global(SymbolKey::new(package_path, "init")));
        }
        let globals = package_globals(package_path, package)?;
        let mut found = false;
        let mut inits = Vec::new();
        for file in package.files.values() {
            let imports = file_imports(graph, file)?;
            let mut r = Rewriter {
                flattener: self,
                package: package_path,
                globals: &globals,
                imports: &imports,
                locals: Vec::new(),
                refs: BTreeSet::new(),
            };
            for decl in &file.decls {
                match decl {
                    Decl::Func(f) if f.recv.is_none() && f.name == key.name => {
                        found = true;
                        if key.name == "init" {
                            if !f.ty.params.is_empty() || !f.ty.results.is_empty() {
                                return Err(Error::Malformed(format!(
                                    "func init in {package_path} must have no arguments and no return values"
                                )));
                            }
                            let body = f.body.as_ref().ok_or_else(|| {
                                Error::Malformed(format!("func init in {package_path} has no body"))
                            })?;
                            let body = r.block(body)?;
                            inits.push((body, std::mem::take(&mut r.refs)));
                        } else {
                            let name = r.flattener.register(key)?;
                            let f = r.func(f, name)?;
                            let refs = std::mem::take(&mut r.refs);
                            r.flattener.emit(key.clone(), Decl::Func(f), refs)?;
                        }
                    }
                    Decl::Var(specs) => {
                        for spec in specs {
                            let Some(i) = spec.names.iter().position(|n| *n == key.name) else {
                                continue;
                            };
                            found = true;
                            let value = match (spec.values.len(), spec.values.get(i)) {
                                (0, _) => None,
                                (n, Some(v)) if n == spec.names.len() => Some(v),
                                (n, _) => {
                                    return Err(Error::unsupported(
                                        "var declaration",
                                        format!(
                                            "{key}: {} names assigned from {n} values",
                                            spec.names.len()
                                        ),
                                    ))
                                }
                            };
                            let spec = ValueSpec {
                                names: vec![r.flattener.register(key)?],
                                ty: spec.ty.as_ref().map(|t| r.expr(t)).transpose()?,
                                values: value.map(|v| r.expr(v)).transpose()?.into_iter().collect(),
                            };
                            let refs = std::mem::take(&mut r.refs);
                            r.flattener.emit(key.clone(), Decl::Var(vec![spec]), refs)?;
                        }
                    }
                    Decl::Type(specs) => {
                        for spec in specs.iter().filter(|s| s.name == key.name) {
                            found = true;
                            let spec = TypeSpec {
                                name: r.flattener.register(key)?,
                                ty: r.expr(&spec.ty)?,
                            };
                            let refs = std::mem::take(&mut r.refs);
                            r.flattener.emit(key.clone(), Decl::Type(vec![spec]), refs)?;
                        }
                    }
                    Decl::Const(specs)
                        if specs.iter().any(|s| s.names.contains(&key.name)) =>
                    {
                        found = true;
                        log::warn!("skipping {key}: const declarations are not supported");
                    }
                    Decl::Func(_) | Decl::Const(_) => (),
                }
            }
        }
        if key.name == "init" {
            return self.emit_init(key, inits);
        }
        if found {
            Ok(())
        } else {
            Err(Error::Unresolved(key.clone()))
        }
    }

    /// Initializers of reachable packages, each after those of the packages
    /// it imports.
    fn init_order(&self) -> Result<Vec<String>> {
        let graph = self.graph;
        let discovery: FxHashMap<&str, usize> = self
            .packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();
        let mut state = FxHashMap::default();
        let mut stack = Vec::new();
        let mut order = Vec::new();
        for p in &self.packages {
            if let Some((p, _)) = graph.packages.get_key_value(p) {
                order_packages(graph, p, &discovery, &mut state, &mut stack, &mut order)?;
            }
        }
        Ok(order.into_iter().map(|p| mangle(p, "init")).collect())
    }
}

fn order_packages<'g>(
    graph: &'g DeclGraph,
    p: &'g str,
    discovery: &FxHashMap<&str, usize>,
    state: &mut FxHashMap<&'g str, bool>,
    stack: &mut Vec<&'g str>,
    order: &mut Vec<&'g str>,
) -> Result<()> {
    match state.get(p) {
        Some(true) => return Ok(()),
        Some(false) => {
            let start = stack.iter().position(|q| *q == p).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..].iter().map(|q| q.to_string()).collect();
            cycle.push(p.to_string());
            return Err(Error::ImportCycle(cycle));
        }
        None => (),
    }
    state.insert(p, false);
    stack.push(p);
    if let Some(package) = graph.packages.get(p) {
        let mut imports: Vec<&str> = package
            .files
            .values()
            .flat_map(|f| &f.imports)
            .map(|i| i.path.as_str())
            .collect();
        imports.sort_by_key(|q| discovery.get(q).copied().unwrap_or(usize::MAX));
        for q in imports {
            order_packages(graph, q, discovery, state, stack, order)?;
        }
    }
    stack.pop();
    state.insert(p, true);
    if discovery.contains_key(p) {
        order.push(p);
    }
    Ok(())
}

/// Reorders `decls` so that every declaration follows the ones it refers
/// to. Mutually recursive declarations stay adjacent.
fn declare_before_use(decls: Vec<FlatDecl>) -> Vec<FlatDecl> {
    let order = {
        let index: FxHashMap<&SymbolKey, usize> =
            decls.iter().enumerate().map(|(i, d)| (&d.key, i)).collect();
        let mut used_by = vec![Vec::new(); decls.len()];
        for (i, d) in decls.iter().enumerate() {
            for r in &d.refs {
                if let Some(&j) = index.get(r) {
                    if j != i {
                        used_by[j].push(i);
                    }
                }
            }
        }
        scc(&used_by).concat()
    };
    let mut slots: Vec<Option<FlatDecl>> = decls.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Names declared at package level in any file of the package.
fn package_globals<'g>(path: &str, package: &'g Package) -> Result<FxHashSet<&'g str>> {
    let mut globals = FxHashSet::default();
    for file in package.files.values() {
        for decl in &file.decls {
            if let Decl::Func(FuncDecl {
                recv: Some(recv),
                name,
                ..
            }) = decl
            {
                return Err(Error::unsupported(
                    "method",
                    format!("{path}: func ({recv}) {name}"),
                ));
            }
            globals.extend(
                decl.names()
                    .into_iter()
                    .filter(|n| *n != "_" && *n != "init"),
            );
        }
    }
    Ok(globals)
}

/// Import name to import path for one file. Without an alias the name is
/// the imported package's own package clause.
fn file_imports<'g>(graph: &'g DeclGraph, file: &'g File) -> Result<FxHashMap<&'g str, &'g str>> {
    let mut imports = FxHashMap::default();
    for import in &file.imports {
        let name = match &import.alias {
            Some(alias) => alias.as_str(),
            None => graph
                .packages
                .get(&import.path)
                .and_then(Package::name)
                .ok_or_else(|| Error::MissingPackage(import.path.clone()))?,
        };
        if name != "_" {
            imports.insert(name, import.path.as_str());
        }
    }
    Ok(imports)
}

/// Copy-on-rewrite renaming of one declaration.
struct Rewriter<'a, 'g> {
    flattener: &'a mut Flattener<'g>,
    package: &'g str,
    globals: &'a FxHashSet<&'g str>,
    imports: &'a FxHashMap<&'g str, &'g str>,
    /// Enclosing block scopes, innermost last.
    locals: Vec<FxHashSet<String>>,
    refs: BTreeSet<SymbolKey>,
}

impl Rewriter<'_, '_> {
    fn is_local(&self, name: &str) -> bool {
        self.locals.iter().any(|s| s.contains(name))
    }

    fn is_builtin(&self, name: &str) -> bool {
        !self.is_local(name) && !self.globals.contains(name)
    }

    fn bind(&mut self, name: &str) -> Result<()> {
        if name == "_" {
            return Ok(());
        }
        if let Some(global) = self.mangled_global(name) {
            return Err(Error::Malformed(format!(
                "local `{name}` in {} is spelled like the mangled name of {global}",
                self.package
            )));
        }
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string());
        }
        Ok(())
    }

    /// The package level declaration whose mangled name is `name`, if any.
    fn mangled_global(&self, name: &str) -> Option<SymbolKey> {
        self.flattener
            .graph
            .packages
            .iter()
            .find_map(|(path, package)| {
                let rest = name.strip_prefix(&mangle(path, ""))?;
                let declared = rest == "init"
                    || package
                        .files
                        .values()
                        .flat_map(|f| &f.decls)
                        .any(|d| d.names().contains(&rest));
                declared.then(|| SymbolKey::new(path.as_str(), rest))
            })
    }

    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.locals.push(FxHashSet::default());
        let r = f(self);
        self.locals.pop();
        r
    }

    fn reference(&mut self, package: &str, name: &str) -> Result<String> {
        let key = SymbolKey::new(package, name);
        let mangled = self.flattener.register(&key)?;
        log::debug!("{key} -> {mangled}");
        self.flattener.schedule(Symbol::Global(key.clone()));
        self.refs.insert(key);
        Ok(mangled)
    }

    fn require(&mut self, r: RuntimeSymbol) {
        self.flattener.schedule(Symbol::Runtime(r));
    }

    fn ident(&mut self, name: &str) -> Result<String> {
        if !self.is_local(name) && self.globals.contains(name) {
            let package = self.package;
            self.reference(package, name)
        } else {
            Ok(name.to_string())
        }
    }

    fn func(&mut self, f: &FuncDecl, name: String) -> Result<FuncDecl> {
        self.scoped(|r| {
            let ty = r.signature(&f.ty)?;
            let body = f.body.as_ref().map(|b| r.block(b)).transpose()?;
            Ok(FuncDecl {
                name,
                recv: None,
                ty,
                body,
            })
        })
    }

    /// Rewrites parameter types and binds parameter and result names.
    fn signature(&mut self, ty: &FuncType) -> Result<FuncType> {
        let ty = self.func_type(ty)?;
        for f in ty.params.iter().chain(&ty.results) {
            for n in &f.names {
                self.bind(n)?;
            }
        }
        Ok(ty)
    }

    fn func_type(&mut self, ty: &FuncType) -> Result<FuncType> {
        Ok(FuncType {
            params: self.fields(&ty.params)?,
            results: self.fields(&ty.results)?,
        })
    }

    fn fields(&mut self, fields: &[Field]) -> Result<Vec<Field>> {
        fields
            .iter()
            .map(|f| {
                Ok(Field {
                    names: f.names.clone(),
                    ty: self.expr(&f.ty)?,
                })
            })
            .collect()
    }

    fn boxed(&mut self, e: &Expr) -> Result<Box<Expr>> {
        Ok(Box::new(self.expr(e)?))
    }

    fn opt(&mut self, e: &Option<Box<Expr>>) -> Result<Option<Box<Expr>>> {
        e.as_deref().map(|e| self.boxed(e)).transpose()
    }

    fn exprs(&mut self, es: &[Expr]) -> Result<Vec<Expr>> {
        es.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&mut self, e: &Expr) -> Result<Expr> {
        Ok(match e {
            Expr::Ident(n) => Expr::Ident(self.ident(n)?),
            Expr::Lit(_) => e.clone(),
            Expr::Binary { op, x, y } => {
                match op {
                    BinOp::Eq => self.require(RuntimeSymbol::StringsEqual),
                    BinOp::Ne => self.require(RuntimeSymbol::StringsUnequal),
                    _ => (),
                }
                Expr::Binary {
                    op: *op,
                    x: self.boxed(x)?,
                    y: self.boxed(y)?,
                }
            }
            Expr::Unary { op, x } => Expr::Unary {
                op: *op,
                x: self.boxed(x)?,
            },
            Expr::Paren(x) => Expr::Paren(self.boxed(x)?),
            Expr::Call {
                fun,
                args,
                ellipsis,
            } => {
                if let Expr::Ident(n) = &**fun {
                    if self.is_builtin(n) {
                        match n.as_str() {
                            "print" | "println" => {
                                self.require(RuntimeSymbol::Print);
                                self.require(RuntimeSymbol::PrintInt);
                            }
                            "new" => self.require(RuntimeSymbol::Malloc),
                            _ => (),
                        }
                    }
                }
                Expr::Call {
                    fun: self.boxed(fun)?,
                    args: self.exprs(args)?,
                    ellipsis: *ellipsis,
                }
            }
            Expr::Selector { x, sel } => {
                if let Expr::Ident(alias) = &**x {
                    if !self.is_local(alias) {
                        if let Some(path) = self.imports.get(alias.as_str()).copied() {
                            return Ok(Expr::Ident(self.reference(path, sel)?));
                        }
                    }
                }
                Expr::Selector {
                    x: self.boxed(x)?,
                    sel: sel.clone(),
                }
            }
            Expr::Index { x, index } => Expr::Index {
                x: self.boxed(x)?,
                index: self.boxed(index)?,
            },
            Expr::Slice { x, low, high } => {
                self.require(RuntimeSymbol::SliceString);
                Expr::Slice {
                    x: self.boxed(x)?,
                    low: self.opt(low)?,
                    high: self.opt(high)?,
                }
            }
            Expr::Star(x) => Expr::Star(self.boxed(x)?),
            Expr::CompositeLit { ty, elts } => {
                let is_struct = matches!(**ty, Expr::StructType(_));
                let ty = self.boxed(ty)?;
                let mut new_elts = Vec::with_capacity(elts.len());
                for e in elts {
                    new_elts.push(match e {
                        // Field keys name struct fields, not variables.
                        Expr::KeyValue { key, value } if is_struct => Expr::KeyValue {
                            key: key.clone(),
                            value: self.boxed(value)?,
                        },
                        e => self.expr(e)?,
                    });
                }
                Expr::CompositeLit { ty, elts: new_elts }
            }
            Expr::KeyValue { key, value } => Expr::KeyValue {
                key: self.boxed(key)?,
                value: self.boxed(value)?,
            },
            Expr::FuncLit { ty, body } => self.scoped(|r| {
                Ok(Expr::FuncLit {
                    ty: r.signature(ty)?,
                    body: r.block(body)?,
                })
            })?,
            Expr::TypeAssert { x, ty } => Expr::TypeAssert {
                x: self.boxed(x)?,
                ty: self.opt(ty)?,
            },
            Expr::ArrayType { len, elt } => Expr::ArrayType {
                len: self.opt(len)?,
                elt: self.boxed(elt)?,
            },
            Expr::MapType { key, value } => Expr::MapType {
                key: self.boxed(key)?,
                value: self.boxed(value)?,
            },
            Expr::StructType(fields) => Expr::StructType(self.fields(fields)?),
            Expr::InterfaceType(methods) => Expr::InterfaceType(self.fields(methods)?),
            Expr::FuncType(ty) => Expr::FuncType(self.func_type(ty)?),
            Expr::Ellipsis(t) => Expr::Ellipsis(self.opt(t)?),
        })
    }

    fn block(&mut self, b: &Block) -> Result<Block> {
        self.scoped(|r| Ok(Block { stmts: r.stmts(&b.stmts)? }))
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<Vec<Stmt>> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn boxed_stmt(&mut self, s: &Option<Box<Stmt>>) -> Result<Option<Box<Stmt>>> {
        s.as_deref()
            .map(|s| Ok(Box::new(self.stmt(s)?)))
            .transpose()
    }

    fn stmt(&mut self, s: &Stmt) -> Result<Stmt> {
        Ok(match s {
            Stmt::Expr(e) => Stmt::Expr(self.expr(e)?),
            Stmt::Assign {
                lhs,
                op: AssignOp::Define,
                rhs,
            } => {
                let rhs = self.exprs(rhs)?;
                for l in lhs {
                    match l {
                        Expr::Ident(n) => self.bind(n)?,
                        _ => {
                            return Err(Error::Malformed(format!(
                                "non-name {l} on left side of :="
                            )))
                        }
                    }
                }
                Stmt::Assign {
                    lhs: lhs.clone(),
                    op: AssignOp::Define,
                    rhs,
                }
            }
            Stmt::Assign { lhs, op, rhs } => Stmt::Assign {
                lhs: self.exprs(lhs)?,
                op: *op,
                rhs: self.exprs(rhs)?,
            },
            Stmt::IncDec { x, inc } => Stmt::IncDec {
                x: self.expr(x)?,
                inc: *inc,
            },
            Stmt::Var(specs) => {
                let mut new_specs = Vec::with_capacity(specs.len());
                for spec in specs {
                    let ty = spec.ty.as_ref().map(|t| self.expr(t)).transpose()?;
                    let values = self.exprs(&spec.values)?;
                    for n in &spec.names {
                        self.bind(n)?;
                    }
                    new_specs.push(ValueSpec {
                        names: spec.names.clone(),
                        ty,
                        values,
                    });
                }
                Stmt::Var(new_specs)
            }
            Stmt::Const(_) => {
                return Err(Error::unsupported(
                    "const declaration",
                    "constants declared inside functions",
                ))
            }
            Stmt::Return(results) => Stmt::Return(self.exprs(results)?),
            Stmt::Block(b) => Stmt::Block(self.block(b)?),
            Stmt::If {
                init,
                cond,
                body,
                els,
            } => self.scoped(|r| {
                Ok(Stmt::If {
                    init: r.boxed_stmt(init)?,
                    cond: r.expr(cond)?,
                    body: r.block(body)?,
                    els: r.boxed_stmt(els)?,
                })
            })?,
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => self.scoped(|r| {
                Ok(Stmt::For {
                    init: r.boxed_stmt(init)?,
                    cond: cond.as_ref().map(|c| r.expr(c)).transpose()?,
                    post: r.boxed_stmt(post)?,
                    body: r.block(body)?,
                })
            })?,
            Stmt::Range {
                key,
                value,
                define,
                x,
                body,
            } => self.scoped(|r| {
                let x = r.expr(x)?;
                let (key, value) = if *define {
                    for v in key.iter().chain(value) {
                        match v {
                            Expr::Ident(n) => r.bind(n)?,
                            _ => {
                                return Err(Error::Malformed(format!(
                                    "non-name {v} on left side of :="
                                )))
                            }
                        }
                    }
                    (key.clone(), value.clone())
                } else {
                    (
                        key.as_ref().map(|k| r.expr(k)).transpose()?,
                        value.as_ref().map(|v| r.expr(v)).transpose()?,
                    )
                };
                Ok(Stmt::Range {
                    key,
                    value,
                    define: *define,
                    x,
                    body: r.block(body)?,
                })
            })?,
            Stmt::Switch { init, tag, clauses } => self.scoped(|r| {
                let init = r.boxed_stmt(init)?;
                let tag = tag.as_ref().map(|t| r.expr(t)).transpose()?;
                if tag.is_some() {
                    // Each case is compared to the tag with `==`.
                    r.require(RuntimeSymbol::StringsEqual);
                }
                let mut new_clauses = Vec::with_capacity(clauses.len());
                for c in clauses {
                    let list = c.list.as_ref().map(|l| r.exprs(l)).transpose()?;
                    let body = r.scoped(|r| r.stmts(&c.body))?;
                    new_clauses.push(CaseClause { list, body });
                }
                Ok(Stmt::Switch {
                    init,
                    tag,
                    clauses: new_clauses,
                })
            })?,
            Stmt::Break => Stmt::Break,
            Stmt::Continue => Stmt::Continue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{flatten, mangle, Program, SymbolKey};
    use crate::runtime::RuntimeSymbol;
    use crate::{DeclGraph, Error};
    use parser::ast::Decl;

    pub(crate) fn graph(files: &[(&str, &str, &str)]) -> DeclGraph {
        let mut g = DeclGraph::default();
        for (path, file_name, src) in files {
            g.packages
                .entry(path.to_string())
                .or_default()
                .files
                .insert(file_name.to_string(), parser::parse(src).unwrap());
        }
        g
    }

    fn names(p: &Program) -> Vec<String> {
        p.decls.iter().map(|d| d.key.mangled()).collect()
    }

    fn entry_calls(p: &Program) -> Vec<String> {
        p.entry
            .body
            .iter()
            .flat_map(|b| &b.stmts)
            .map(|s| s.to_string().trim_end_matches("()").to_string())
            .collect()
    }

    #[test]
    fn single_package_hello() {
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nfunc main() {\n\tprintln(\"hello\")\n}\n",
        )]))
        .unwrap();
        let mut ns = names(&p);
        ns.sort();
        assert_eq!(ns, ["main_init", "main_main"]);
        assert_eq!(entry_calls(&p), ["main_init", "main_main"]);
        assert_eq!(p.main, "main_main");
        let Some(Decl::Func(init)) = p.get("main_init").map(|d| &d.decl) else {
            panic!()
        };
        assert_eq!(init.body.as_ref().map(|b| b.stmts.len()), Some(0));
        assert!(p.runtime.contains(&RuntimeSymbol::Print));
        assert!(p.runtime.contains(&RuntimeSymbol::PrintInt));
    }

    #[test]
    fn imported_package() {
        let p = flatten(&graph(&[
            (
                "main",
                "main.go",
                "package main\nimport \"p\"\nfunc main() {\n\tp.F()\n}\n",
            ),
            ("p", "p.go", "package p\nfunc F() {\n\tprint(\"F\")\n}\n"),
        ]))
        .unwrap();
        let mut ns = names(&p);
        ns.sort();
        assert_eq!(ns, ["main_init", "main_main", "p_F", "p_init"]);
        assert_eq!(entry_calls(&p), ["p_init", "main_init", "main_main"]);
        assert!(p.runtime.contains(&RuntimeSymbol::Print));
        let main = p.get("main_main").unwrap();
        assert!(main.decl.to_string().contains("p_F()"));
        assert!(main.refs.contains(&SymbolKey::new("p", "F")));
    }

    #[test]
    fn unreferenced_functions_are_dropped() {
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nfunc used() {}\nfunc unused() { used() }\nfunc main() { used() }\n",
        )]))
        .unwrap();
        assert!(p.get("main_used").is_some());
        assert!(p.get("main_unused").is_none());
    }

    #[test]
    fn every_reachable_symbol_once() {
        let p = flatten(&graph(&[
            (
                "main",
                "a.go",
                "package main\nimport q \"example.com/lib\"\nvar count int\nfunc main() { a(); q.G() }\n",
            ),
            (
                "main",
                "b.go",
                "package main\nfunc a() { b(); count++ }\nfunc b() { a() }\n",
            ),
            (
                "example.com/lib",
                "lib.go",
                "package lib\ntype T int\nfunc G() T { return H() }\nfunc H() T { return T(1) }\n",
            ),
        ]))
        .unwrap();
        let mut ns = names(&p);
        ns.sort();
        assert_eq!(
            ns,
            [
                "example_com_lib_G",
                "example_com_lib_H",
                "example_com_lib_T",
                "example_com_lib_init",
                "main_a",
                "main_b",
                "main_count",
                "main_init",
                "main_main",
            ]
        );
    }

    #[test]
    fn declarations_follow_their_dependencies() {
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\ntype T int\nvar x T\nfunc f() T { return g() }\nfunc g() T { return x }\nfunc main() { f() }\n",
        )]))
        .unwrap();
        let ns = names(&p);
        let pos = |n: &str| ns.iter().position(|m| m == n).unwrap();
        assert!(pos("main_T") < pos("main_x"));
        assert!(pos("main_x") < pos("main_g"));
        assert!(pos("main_g") < pos("main_f"));
        assert!(pos("main_f") < pos("main_main"));
        for (i, d) in p.decls.iter().enumerate() {
            for r in &d.refs {
                let j = pos(&r.mangled());
                assert!(j <= i, "{} refers forward to {r}", d.key);
            }
        }
    }

    #[test]
    fn initializers_run_after_their_imports() {
        let p = flatten(&graph(&[
            (
                "main",
                "main.go",
                "package main\nimport (\n\t\"a\"\n\t\"b\"\n)\nfunc main() { a.F(); b.F() }\n",
            ),
            ("a", "a.go", "package a\nimport \"b\"\nfunc F() { b.F() }\n"),
            ("b", "b.go", "package b\nfunc init() { println(1) }\nfunc F() {}\n"),
        ]))
        .unwrap();
        assert_eq!(p.inits, ["b_init", "a_init", "main_init"]);
        assert_eq!(entry_calls(&p), ["b_init", "a_init", "main_init", "main_main"]);
    }

    #[test]
    fn multiple_inits_run_in_file_order() {
        let p = flatten(&graph(&[
            (
                "main",
                "a.go",
                "package main\nfunc init() {\n\tprintln(1)\n\treturn\n}\nfunc main() {}\n",
            ),
            ("main", "b.go", "package main\nfunc init() { println(2) }\n"),
        ]))
        .unwrap();
        let Decl::Func(init) = &p.get("main_init").unwrap().decl else {
            panic!()
        };
        let calls: Vec<String> = init
            .body
            .iter()
            .flat_map(|b| &b.stmts)
            .map(|s| s.to_string())
            .collect();
        assert_eq!(calls, ["main_init_0()", "main_init_1()"]);
        let first = p.get("main_init_0").unwrap().decl.to_string();
        assert!(first.contains("return"), "{first}");
        assert!(p.get("main_init_1").unwrap().decl.to_string().contains("println(2)"));
        let ns = names(&p);
        let pos = |n: &str| ns.iter().position(|m| m == n).unwrap();
        assert!(pos("main_init_0") < pos("main_init"));
        assert!(pos("main_init_1") < pos("main_init"));
    }

    #[test]
    fn init_parts_collide_with_user_names() {
        let e = flatten(&graph(&[
            ("main", "a.go", "package main\nfunc init() {}\nfunc main() { init_0() }\n"),
            ("main", "b.go", "package main\nfunc init() {}\nfunc init_0() {}\n"),
        ]))
        .unwrap_err();
        assert!(
            matches!(e, Error::ManglingCollision { ref mangled, .. } if mangled == "main_init_0"),
            "{e}"
        );
    }

    #[test]
    fn locals_spelled_like_mangled_globals_are_rejected() {
        let e = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nvar x = 1\nfunc main() {\n\tmain_x := 2\n\tprintln(x, main_x)\n}\n",
        )]))
        .unwrap_err();
        assert!(
            matches!(e, Error::Malformed(ref m) if m.contains("main.x")),
            "{e}"
        );
        let e = flatten(&graph(&[
            (
                "main",
                "main.go",
                "package main\nimport \"p\"\nfunc main() { p.F(0) }\n",
            ),
            ("p", "p.go", "package p\nfunc G() {}\nfunc F(p_G int) {}\n"),
        ]))
        .unwrap_err();
        assert!(matches!(e, Error::Malformed(ref m) if m.contains("p.G")), "{e}");
        flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nfunc main() {\n\tmain_y := 2\n\tprintln(main_y)\n}\n",
        )]))
        .unwrap();
    }

    #[test]
    fn locals_shadow_globals() {
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nvar x = 1\nfunc f(x int) int { return x }\nfunc main() {\n\tx := 2\n\tprintln(x, f(x))\n}\n",
        )]))
        .unwrap();
        assert!(p.get("main_x").is_none());
        let f = p.get("main_f").unwrap().decl.to_string();
        assert!(f.contains("return x"), "{f}");
    }

    #[test]
    fn struct_literal_keys_are_not_mangled() {
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nvar a = 1\nfunc main() {\n\t_ = struct{ a int }{a: a}\n}\n",
        )]))
        .unwrap();
        let main = p.get("main_main").unwrap().decl.to_string();
        assert!(main.contains("{a: main_a}"), "{main}");
    }

    #[test]
    fn methods_are_rejected() {
        let e = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\ntype T int\nfunc (t T) M() {}\nfunc main() {}\n",
        )]))
        .unwrap_err();
        assert!(matches!(e, Error::Unsupported { ref kind, .. } if kind == "method"), "{e}");
    }

    #[test]
    fn consts_are_skipped() {
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nconst k = 1\nfunc main() { println(k) }\n",
        )]))
        .unwrap();
        assert!(p.get("main_k").is_none());
    }

    #[test]
    fn unresolved_symbols() {
        let e = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nimport \"p\"\nfunc main() { p.Missing() }\n",
        ),
        ("p", "p.go", "package p\n")]))
        .unwrap_err();
        assert!(matches!(e, Error::Unresolved(ref k) if k.to_string() == "p.Missing"), "{e}");
        let e = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nimport \"p\"\nfunc main() { p.F() }\n",
        )]))
        .unwrap_err();
        assert!(matches!(e, Error::MissingPackage(ref p) if p == "p"), "{e}");
    }

    #[test]
    fn mangling_collisions_are_detected() {
        let e = flatten(&graph(&[
            (
                "main",
                "main.go",
                "package main\nimport (\n\tx \"a/b\"\n\ty \"a.b\"\n)\nfunc main() { x.F(); y.F() }\n",
            ),
            ("a/b", "f.go", "package b\nfunc F() {}\n"),
            ("a.b", "f.go", "package b\nfunc F() {}\n"),
        ]))
        .unwrap_err();
        assert!(
            matches!(e, Error::ManglingCollision { ref mangled, .. } if mangled == "a_b_F"),
            "{e}"
        );
    }

    #[test]
    fn import_cycles_are_fatal() {
        let e = flatten(&graph(&[
            (
                "main",
                "main.go",
                "package main\nimport \"a\"\nfunc main() { a.F() }\n",
            ),
            ("a", "a.go", "package a\nimport \"b\"\nfunc F() { b.F() }\n"),
            ("b", "b.go", "package b\nimport \"a\"\nfunc F() { a.F() }\n"),
        ]))
        .unwrap_err();
        assert!(matches!(e, Error::ImportCycle(_)), "{e}");
    }

    #[test]
    fn symbol_keys() {
        let k: SymbolKey = "example.com/x.F".parse().unwrap();
        assert_eq!(k, SymbolKey::new("example.com/x", "F"));
        assert_eq!(k.to_string(), "example.com/x.F");
        assert!("F".parse::<SymbolKey>().is_err());
        assert_eq!(mangle("example.com/my-lib", "F"), "example_com_my_lib_F");
    }

    #[test]
    fn equality_requires_both_string_helpers() {
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nfunc main() {\n\tif 1 == 2 {\n\t}\n\tif 1 != 2 {\n\t}\n}\n",
        )]))
        .unwrap();
        assert!(p.runtime.contains(&RuntimeSymbol::StringsEqual));
        assert!(p.runtime.contains(&RuntimeSymbol::StringsUnequal));
        assert!(!p.runtime.contains(&RuntimeSymbol::SliceString));
    }

    #[test]
    fn tagged_switch_requires_string_equality() {
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nfunc main() {\n\ts := \"a\"\n\tswitch s {\n\tcase \"a\":\n\t\tprintln(1)\n\t}\n}\n",
        )]))
        .unwrap();
        assert!(p.runtime.contains(&RuntimeSymbol::StringsEqual));
        let p = flatten(&graph(&[(
            "main",
            "main.go",
            "package main\nfunc main() {\n\tswitch {\n\tdefault:\n\t}\n}\n",
        )]))
        .unwrap();
        assert!(!p.runtime.contains(&RuntimeSymbol::StringsEqual));
    }
}
