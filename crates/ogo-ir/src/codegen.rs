//! C generation from a flattened, type checked [`Program`].

use crate::flatten::{mangle, Program};
use crate::runtime::{prelude, IntoEnumIterator, RuntimeSymbol};
use crate::types::{Target, Type, TypeMap};
use crate::{Error, Result};
use easy_ext::ext;
use itertools::Itertools;
use parser::ast::{AssignOp, BinOp, Decl, Expr, FuncDecl, Lit, Stmt, UnOp};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::{Display, Write};
use unic_ucd_category::GeneralCategory;

#[ext(TypeExt)]
impl Type {
    /// C declaration of `inner` as a value of this type. An empty `inner`
    /// gives the abstract declarator, as used in casts and `sizeof`.
    fn declare(&self, inner: &str) -> Result<String> {
        let named = |c: &str| {
            if inner.is_empty() {
                c.to_string()
            } else {
                format!("{c} {inner}")
            }
        };
        match self {
            Type::Int => Ok(named("ogo_int")),
            Type::Bool => Ok(named("ogo_bool")),
            Type::String => Ok(named("ogo_string")),
            Type::Pointer(t) => t.declare(&format!("*{inner}")),
            Type::Function { params, results } => {
                let params = params
                    .iter()
                    .map(|p| p.declare(""))
                    .collect::<Result<Vec<_>>>()?;
                function_declarator(&format!("(*{inner})"), &params, results)
            }
            Type::Method { .. } => Err(Error::unsupported("method value", inner.to_string())),
            Type::TypeType => Err(Error::unsupported(
                "type",
                format!("a type cannot be stored in `{inner}`"),
            )),
        }
    }

    fn zero(&self) -> &'static str {
        match self {
            Type::String => "{0}",
            _ => "0",
        }
    }
}

fn function_declarator(name: &str, params: &[String], results: &[Type]) -> Result<String> {
    let inner = if params.is_empty() {
        format!("{name}(void)")
    } else {
        format!("{name}({})", params.iter().format(", "))
    };
    match results {
        [] => Ok(format!("void {inner}")),
        [r] => r.declare(&inner),
        _ => Err(Error::unsupported(
            "multiple return values",
            format!("`{name}` returns {} values", results.len()),
        )),
    }
}

/// Generates the complete C translation unit for `program`.
pub fn generate(program: &Program, types: &TypeMap, target: Target) -> Result<String> {
    let mut globals = FxHashSet::default();
    let mut functions = FxHashSet::default();
    for d in &program.decls {
        let name = d.decl.names();
        for n in name {
            if !is_c_identifier(n) {
                return Err(Error::Malformed(format!(
                    "`{}` mangles to `{n}`, which is not a C identifier",
                    d.key
                )));
            }
            let c = global_name(n);
            if c.starts_with("ogo_") {
                return Err(Error::Malformed(format!(
                    "`{}` collides with the runtime name `{c}`",
                    d.key
                )));
            }
            globals.insert(n);
            if matches!(d.decl, Decl::Func(_)) {
                functions.insert(n);
            }
        }
    }
    let mut g = Codegen {
        program,
        types,
        globals,
        functions,
        out: String::new(),
        indent: 0,
        scope: Scope::default(),
    };
    g.out.push_str(&prelude(target));
    for r in RuntimeSymbol::iter().filter(|r| program.runtime.contains(r)) {
        writeln!(g.out)?;
        g.out.push_str(&r.definition());
    }
    g.typedefs()?;
    let deferred = g.globals()?;
    g.prototypes(&deferred)?;
    g.functions(deferred)?;
    g.entry()?;
    log::info!("generated {} bytes of C", g.out.len());
    Ok(g.out)
}

fn global_name(mangled: &str) -> String {
    convert_name(mangled)
}

/// C spelling of a name: ASCII is kept and every other character becomes a
/// universal character name.
fn convert_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c as u32 {
            _ if c.is_ascii() => out.push(c),
            n @ 0..=0xffff => out.push_str(&format!("\\u{n:04X}")),
            n => out.push_str(&format!("\\U{n:08X}")),
        }
    }
    out
}

/// Whether a mangled name spells a C identifier once converted. Import
/// paths may bring in characters Go identifiers cannot contain.
fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let letter = |c: char| c == '_' || GeneralCategory::of(c).is_letter();
    chars.next().map_or(false, letter)
        && chars.all(|c| letter(c) || GeneralCategory::of(c) == GeneralCategory::DecimalNumber)
}

/// Decimal form of a Go integer literal.
fn int_literal(lit: &str) -> Result<String> {
    let cleaned = lit.replace('_', "");
    let (radix, digits) = match cleaned.get(..2) {
        Some("0x" | "0X") => (16, &cleaned[2..]),
        Some("0o" | "0O") => (8, &cleaned[2..]),
        Some("0b" | "0B") => (2, &cleaned[2..]),
        _ if cleaned.len() > 1 && cleaned.starts_with('0') => (8, &cleaned[1..]),
        _ => (10, &cleaned[..]),
    };
    let n = i64::from_str_radix(digits, radix)
        .map_err(|_| Error::unsupported("integer literal", format!("`{lit}` overflows int")))?;
    if n > i64::from(i32::MAX) {
        Ok(format!("{n}LL"))
    } else {
        Ok(n.to_string())
    }
}

/// A C string literal holding the bytes of `s`.
fn c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for b in s.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'?' => out.push_str("\\?"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(b)),
            _ => out.push_str(&format!("\\{b:03o}")),
        }
    }
    out.push('"');
    out
}

fn string_value(s: &str) -> String {
    format!("OGO_STR({})", c_string(s))
}

#[derive(Debug, Clone)]
struct Local {
    c_name: String,
    ty: Type,
}

/// Per-function state.
#[derive(Debug, Default)]
struct Scope {
    blocks: Vec<FxHashMap<String, Local>>,
    /// C names already used in this function.
    c_names: FxHashSet<String>,
    /// `None` for a loop, the end label of a switch otherwise.
    breaks: Vec<Option<usize>>,
    labels: usize,
    temps: usize,
    results: Vec<Type>,
    named_result: Option<String>,
}

struct Codegen<'a> {
    program: &'a Program,
    types: &'a TypeMap,
    /// Mangled names of every flattened declaration.
    globals: FxHashSet<&'a str>,
    functions: FxHashSet<&'a str>,
    out: String,
    indent: usize,
    scope: Scope,
}

/// Global initializers that are not C constants, keyed by the initializer
/// function of their package. They run before its body.
type Deferred<'a> = FxHashMap<String, Vec<(String, &'a Expr, Vec<String>)>>;

impl<'a> Codegen<'a> {
    fn line(&mut self, s: impl Display) -> Result<()> {
        writeln!(self.out, "{}{s}", "    ".repeat(self.indent))?;
        Ok(())
    }

    fn open(&mut self, head: impl Display) -> Result<()> {
        self.line(format!("{head}{{"))?;
        self.indent += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.indent = self.indent.saturating_sub(1);
        self.line("}")
    }

    fn runtime(&self, r: RuntimeSymbol) -> Result<String> {
        if self.program.runtime.contains(&r) {
            Ok(r.c_name())
        } else {
            Err(Error::MissingRuntime(r))
        }
    }

    fn global_type(&self, name: &str) -> Result<&'a Type> {
        self.types
            .get(name)
            .ok_or_else(|| Error::Untyped(name.to_string()))
    }

    fn typedefs(&mut self) -> Result<()> {
        let mut typedefs = Vec::new();
        for d in &self.program.decls {
            if let Decl::Type(specs) = &d.decl {
                for s in specs {
                    let t = self
                        .types
                        .underlying(&s.name)
                        .ok_or_else(|| Error::Untyped(s.name.clone()))?;
                    typedefs.push(format!("typedef {};", t.declare(&global_name(&s.name))?));
                }
            }
        }
        if !typedefs.is_empty() {
            writeln!(self.out)?;
        }
        for t in typedefs {
            self.line(t)?;
        }
        Ok(())
    }

    /// Emits every global variable and returns the initializers that have
    /// to run as code.
    fn globals(&mut self) -> Result<Deferred<'a>> {
        let program = self.program;
        let mut deferred: Deferred<'a> = FxHashMap::default();
        let mut lines = Vec::new();
        for d in &program.decls {
            let Decl::Var(specs) = &d.decl else {
                continue;
            };
            for spec in specs {
                for (i, name) in spec.names.iter().enumerate() {
                    let t = self.global_type(name)?;
                    let c_name = global_name(name);
                    let decl = t.declare(&c_name)?;
                    match spec.values.get(i) {
                        Some(v) => match constant(v, t)? {
                            Some(c) => lines.push(format!("static {decl} = {c};")),
                            None => {
                                lines.push(format!("static {decl} = {};", t.zero()));
                                let refs = d.refs.iter().map(|r| r.mangled()).collect();
                                deferred
                                    .entry(mangle(&d.key.package, "init"))
                                    .or_default()
                                    .push((c_name, v, refs));
                            }
                        },
                        None => lines.push(format!("static {decl} = {};", t.zero())),
                    }
                }
            }
        }
        if !lines.is_empty() {
            writeln!(self.out)?;
        }
        for l in lines {
            self.line(l)?;
        }
        Ok(deferred)
    }

    /// Prototypes for functions used before their definition.
    fn prototypes(&mut self, deferred: &Deferred<'a>) -> Result<()> {
        let program = self.program;
        let mut defined = FxHashSet::default();
        let mut needed = Vec::new();
        for d in &program.decls {
            let Decl::Func(f) = &d.decl else {
                continue;
            };
            defined.insert(f.name.as_str());
            let late = deferred.get(&f.name).into_iter().flatten();
            for r in d
                .refs
                .iter()
                .map(|r| r.mangled())
                .chain(late.flat_map(|(_, _, refs)| refs.iter().cloned()))
            {
                if self.functions.contains(r.as_str())
                    && !defined.contains(r.as_str())
                    && !needed.contains(&r)
                {
                    needed.push(r);
                }
            }
        }
        if !needed.is_empty() {
            writeln!(self.out)?;
        }
        for name in needed {
            let Type::Function { params, results } = self.global_type(&name)? else {
                return Err(Error::Malformed(format!("`{name}` is not a function")));
            };
            let params = params
                .iter()
                .map(|p| p.declare(""))
                .collect::<Result<Vec<_>>>()?;
            let sig = function_declarator(&global_name(&name), &params, results)?;
            self.line(format!("static {sig};"))?;
        }
        Ok(())
    }

    fn functions(&mut self, mut deferred: Deferred<'a>) -> Result<()> {
        let program = self.program;
        for d in &program.decls {
            if let Decl::Func(f) = &d.decl {
                let init = deferred.remove(&f.name).unwrap_or_default();
                writeln!(self.out)?;
                self.function(f, &init)?;
            }
        }
        if let Some(init) = deferred.keys().next() {
            return Err(Error::Malformed(format!(
                "package initializer `{init}` is missing"
            )));
        }
        Ok(())
    }

    fn function(&mut self, f: &FuncDecl, init: &[(String, &Expr, Vec<String>)]) -> Result<()> {
        let Type::Function { params, results } = self.global_type(&f.name)? else {
            return Err(Error::Malformed(format!("`{}` is not a function", f.name)));
        };
        let body = f
            .body
            .as_ref()
            .ok_or_else(|| Error::Malformed(format!("`{}` has no body", f.name)))?;
        self.scope = Scope {
            blocks: vec![FxHashMap::default()],
            results: results.clone(),
            ..Default::default()
        };
        let mut param_types = params.iter();
        let mut c_params = Vec::new();
        for field in &f.ty.params {
            let names: Vec<&str> = if field.names.is_empty() {
                vec!["_"]
            } else {
                field.names.iter().map(String::as_str).collect()
            };
            for n in names {
                let t = param_types
                    .next()
                    .ok_or_else(|| Error::Malformed(format!("`{}` has a bad signature", f.name)))?;
                let c_name = if n == "_" {
                    self.temp()
                } else {
                    self.bind(n, t.clone())
                };
                c_params.push(t.declare(&c_name)?);
            }
        }
        let named_result = match &f.ty.results[..] {
            [field] if field.names.len() == 1 && field.names[0] != "_" => {
                let t = results.first().cloned().ok_or_else(|| {
                    Error::Malformed(format!("`{}` has a bad signature", f.name))
                })?;
                Some((self.bind(&field.names[0], t.clone()), t))
            }
            [field] if !field.names.is_empty() => {
                let t = results.first().cloned().ok_or_else(|| {
                    Error::Malformed(format!("`{}` has a bad signature", f.name))
                })?;
                Some((self.temp(), t))
            }
            _ => None,
        };
        let sig = function_declarator(&global_name(&f.name), &c_params, results)?;
        self.open(format!("static {sig} "))?;
        if let Some((c_name, t)) = named_result {
            self.line(format!("{} = {};", t.declare(&c_name)?, t.zero()))?;
            self.scope.named_result = Some(c_name);
        }
        for (c_name, value, _) in init {
            let (v, _) = self.value(value)?;
            self.line(format!("{c_name} = {v};"))?;
        }
        for s in &body.stmts {
            self.stmt(s)?;
        }
        self.close()
    }

    fn entry(&mut self) -> Result<()> {
        self.scope = Scope {
            blocks: vec![FxHashMap::default()],
            ..Default::default()
        };
        writeln!(self.out)?;
        self.open("int main(void) ")?;
        let program = self.program;
        for s in program.entry.body.iter().flat_map(|b| &b.stmts) {
            self.stmt(s)?;
        }
        self.line("return 0;")?;
        self.close()
    }

    fn lookup(&self, name: &str) -> Option<&Local> {
        self.scope.blocks.iter().rev().find_map(|b| b.get(name))
    }

    fn is_builtin(&self, name: &str) -> bool {
        self.lookup(name).is_none() && !self.globals.contains(name)
    }

    fn bind(&mut self, name: &str, ty: Type) -> String {
        let converted = convert_name(name);
        let mut c_name = format!("l_{converted}");
        let mut n = 0;
        while !self.scope.c_names.insert(c_name.clone()) {
            n += 1;
            c_name = format!("l{n}_{converted}");
        }
        if let Some(b) = self.scope.blocks.last_mut() {
            b.insert(
                name.to_string(),
                Local {
                    c_name: c_name.clone(),
                    ty,
                },
            );
        }
        c_name
    }

    fn temp(&mut self) -> String {
        self.scope.temps += 1;
        format!("t_{}", self.scope.temps)
    }

    fn push(&mut self) {
        self.scope.blocks.push(FxHashMap::default());
    }

    fn pop(&mut self) {
        self.scope.blocks.pop();
    }

    fn block(&mut self, head: impl Display, stmts: &[Stmt]) -> Result<()> {
        self.open(head)?;
        self.push();
        for s in stmts {
            self.stmt(s)?;
        }
        self.pop();
        self.close()
    }

    fn stmt(&mut self, s: &Stmt) -> Result<()> {
        match s {
            Stmt::Expr(Expr::Call {
                fun,
                args,
                ellipsis,
            }) => {
                if *ellipsis {
                    return Err(Error::unsupported("variadic call", s.to_string()));
                }
                if let Expr::Ident(n) = &**fun {
                    if self.is_builtin(n) && (n == "print" || n == "println") {
                        return self.print(args, n == "println");
                    }
                }
                let (c, _) = self.call(fun, args)?;
                self.line(format!("{c};"))
            }
            Stmt::Expr(e) => Err(Error::Malformed(format!("{e} is not used"))),
            Stmt::Assign {
                lhs,
                op: AssignOp::Define,
                rhs,
            } => self.define(lhs, rhs),
            Stmt::Assign {
                lhs,
                op: AssignOp::Assign,
                rhs,
            } if lhs.len() > 1 => self.assign(lhs, rhs),
            Stmt::Assign { .. } | Stmt::IncDec { .. } => {
                let c = self.simple(s)?;
                self.line(format!("{c};"))
            }
            Stmt::Var(specs) => {
                for spec in specs {
                    let ty = spec
                        .ty
                        .as_ref()
                        .map(|t| self.types.eval_type_expr(t))
                        .transpose()?;
                    let values = spec
                        .values
                        .iter()
                        .map(|v| self.value(v))
                        .collect::<Result<Vec<_>>>()?;
                    if !values.is_empty() && values.len() != spec.names.len() {
                        return Err(Error::unsupported(
                            "var declaration",
                            format!(
                                "{} names assigned from {} values",
                                spec.names.len(),
                                values.len()
                            ),
                        ));
                    }
                    for (i, name) in spec.names.iter().enumerate() {
                        let (code, t) = match (values.get(i), &ty) {
                            (Some((c, _)), Some(t)) => (c.clone(), t.clone()),
                            (Some((c, t)), None) => (c.clone(), t.clone()),
                            (None, Some(t)) => (t.zero().to_string(), t.clone()),
                            (None, None) => {
                                return Err(Error::Malformed(format!(
                                    "`{name}` has neither type nor value"
                                )))
                            }
                        };
                        if name == "_" {
                            self.line(format!("(void)({code});"))?;
                        } else {
                            let c_name = self.bind(name, t.clone());
                            self.line(format!("{} = {code};", t.declare(&c_name)?))?;
                        }
                    }
                }
                Ok(())
            }
            Stmt::Const(_) => Err(Error::unsupported(
                "const declaration",
                "constants declared inside functions",
            )),
            Stmt::Return(results) => match &results[..] {
                [] => match &self.scope.named_result {
                    Some(r) => {
                        let r = format!("return {r};");
                        self.line(r)
                    }
                    None if self.scope.results.is_empty() => self.line("return;"),
                    None => Err(Error::Malformed("missing return value".to_string())),
                },
                [r] => {
                    let (c, _) = self.value(r)?;
                    self.line(format!("return {c};"))
                }
                _ => Err(Error::unsupported(
                    "multiple return values",
                    s.to_string(),
                )),
            },
            Stmt::Block(b) => self.block("", &b.stmts),
            Stmt::If {
                init,
                cond,
                body,
                els,
            } => {
                if let Some(init) = init {
                    self.open("")?;
                    self.push();
                    self.stmt(init)?;
                }
                let c = self.condition(cond)?;
                self.block(format!("if ({c}) "), &body.stmts)?;
                match els.as_deref() {
                    Some(Stmt::Block(b)) => self.block("else ", &b.stmts)?,
                    Some(els) => {
                        self.open("else ")?;
                        self.stmt(els)?;
                        self.close()?;
                    }
                    None => (),
                }
                if init.is_some() {
                    self.pop();
                    self.close()?;
                }
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                self.open("")?;
                self.push();
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                let cond = match cond {
                    Some(c) => self.condition(c)?,
                    None => "1".to_string(),
                };
                let post = match post.as_deref() {
                    Some(p) => self.simple(p)?,
                    None => String::new(),
                };
                self.scope.breaks.push(None);
                self.block(format!("for (; {cond}; {post}) "), &body.stmts)?;
                self.scope.breaks.pop();
                self.pop();
                self.close()
            }
            Stmt::Range {
                key,
                value,
                define,
                x,
                body,
            } => {
                let (n, t) = self.value(x)?;
                if t != Type::Int {
                    return Err(Error::unsupported(
                        "range statement",
                        format!("range over {}", t.to_expr()),
                    ));
                }
                if value.is_some() {
                    return Err(Error::Malformed(format!(
                        "range over {x} permits only one iteration variable"
                    )));
                }
                self.open("")?;
                self.push();
                let limit = self.temp();
                self.line(format!("{} = {n};", Type::Int.declare(&limit)?))?;
                let (counter, assign) = match key {
                    Some(Expr::Ident(k)) if *define && k != "_" => {
                        (self.bind(k, Type::Int), None)
                    }
                    Some(k) if !*define => (self.temp(), Some(self.lvalue(k)?.0)),
                    Some(Expr::Ident(_)) | None => (self.temp(), None),
                    Some(k) => {
                        return Err(Error::Malformed(format!(
                            "non-name {k} on left side of :="
                        )))
                    }
                };
                self.scope.breaks.push(None);
                self.open(format!(
                    "for ({} = 0; {counter} < {limit}; {counter}++) ",
                    Type::Int.declare(&counter)?
                ))?;
                self.push();
                if let Some(k) = assign {
                    self.line(format!("{k} = {counter};"))?;
                }
                for s in &body.stmts {
                    self.stmt(s)?;
                }
                self.pop();
                self.close()?;
                self.scope.breaks.pop();
                self.pop();
                self.close()
            }
            Stmt::Switch { init, tag, clauses } => self.switch(init.as_deref(), tag.as_ref(), clauses),
            Stmt::Break => match self.scope.breaks.last() {
                Some(Some(label)) => {
                    let l = format!("goto switch_end_{label};");
                    self.line(l)
                }
                Some(None) => self.line("break;"),
                None => Err(Error::Malformed("break is not in a loop or switch".to_string())),
            },
            Stmt::Continue => {
                if self.scope.breaks.iter().any(Option::is_none) {
                    self.line("continue;")
                } else {
                    Err(Error::Malformed("continue is not in a loop".to_string()))
                }
            }
        }
    }

    fn switch(
        &mut self,
        init: Option<&Stmt>,
        tag: Option<&Expr>,
        clauses: &[parser::ast::CaseClause],
    ) -> Result<()> {
        let label = self.scope.labels;
        self.scope.labels += 1;
        self.open("")?;
        self.push();
        if let Some(init) = init {
            self.stmt(init)?;
        }
        let tag = match tag {
            Some(tag) => {
                let (c, t) = self.value(tag)?;
                let tmp = self.temp();
                self.line(format!("{} = {c};", t.declare(&tmp)?))?;
                Some((tmp, t))
            }
            None => None,
        };
        let mut default = None;
        let mut first = true;
        self.scope.breaks.push(Some(label));
        for clause in clauses {
            let Some(list) = &clause.list else {
                default = Some(&clause.body);
                continue;
            };
            let mut conds = Vec::with_capacity(list.len());
            for e in list {
                conds.push(match &tag {
                    Some((tmp, t)) => {
                        let (c, et) = self.value(e)?;
                        self.equality(BinOp::Eq, tmp.clone(), t, c, &et)?
                    }
                    None => self.condition(e)?,
                });
            }
            let head = format!(
                "{}if ({}) ",
                if first { "" } else { "else " },
                conds.iter().format(" || ")
            );
            first = false;
            self.block(head, &clause.body)?;
        }
        if let Some(body) = default {
            self.block(if first { "" } else { "else " }, body)?;
        }
        self.scope.breaks.pop();
        self.line(format!("switch_end_{label}:;"))?;
        self.pop();
        self.close()
    }

    fn print(&mut self, args: &[Expr], newline: bool) -> Result<()> {
        let print = self.runtime(RuntimeSymbol::Print)?;
        for (i, a) in args.iter().enumerate() {
            if newline && i > 0 {
                self.line(format!("{print}({});", string_value(" ")))?;
            }
            let (c, t) = self.value(a)?;
            match t {
                Type::Int => {
                    let print_int = self.runtime(RuntimeSymbol::PrintInt)?;
                    self.line(format!("{print_int}({c});"))?;
                }
                Type::String => self.line(format!("{print}({c});"))?,
                Type::Bool => self.line(format!(
                    "{print}(({c}) ? {} : {});",
                    string_value("true"),
                    string_value("false")
                ))?,
                t => {
                    return Err(Error::unsupported(
                        "print argument",
                        format!("cannot print {a} of type {}", t.to_expr()),
                    ))
                }
            }
        }
        if newline {
            self.line(format!("{print}({});", string_value("\n")))?;
        }
        Ok(())
    }

    fn define(&mut self, lhs: &[Expr], rhs: &[Expr]) -> Result<()> {
        check_arity(lhs, rhs)?;
        let mut values = Vec::with_capacity(rhs.len());
        for r in rhs {
            let (c, t) = self.value(r)?;
            if lhs.len() > 1 {
                let tmp = self.temp();
                self.line(format!("{} = {c};", t.declare(&tmp)?))?;
                values.push((tmp, t));
            } else {
                values.push((c, t));
            }
        }
        for (l, (c, t)) in lhs.iter().zip(values) {
            let Expr::Ident(name) = l else {
                return Err(Error::Malformed(format!("non-name {l} on left side of :=")));
            };
            if name == "_" {
                self.line(format!("(void)({c});"))?;
                continue;
            }
            let existing = self
                .scope
                .blocks
                .last()
                .and_then(|b| b.get(name.as_str()))
                .map(|l| l.c_name.clone());
            match existing {
                Some(c_name) => self.line(format!("{c_name} = {c};"))?,
                None => {
                    let c_name = self.bind(name, t.clone());
                    self.line(format!("{} = {c};", t.declare(&c_name)?))?;
                }
            }
        }
        Ok(())
    }

    /// Parallel assignment through temporaries.
    fn assign(&mut self, lhs: &[Expr], rhs: &[Expr]) -> Result<()> {
        check_arity(lhs, rhs)?;
        let mut temps = Vec::with_capacity(rhs.len());
        for r in rhs {
            let (c, t) = self.value(r)?;
            let tmp = self.temp();
            self.line(format!("{} = {c};", t.declare(&tmp)?))?;
            temps.push(tmp);
        }
        for (l, tmp) in lhs.iter().zip(temps) {
            if !is_blank(l) {
                let (c, _) = self.lvalue(l)?;
                self.line(format!("{c} = {tmp};"))?;
            }
        }
        Ok(())
    }

    /// A statement that C can also write as an expression.
    fn simple(&self, s: &Stmt) -> Result<String> {
        match s {
            Stmt::IncDec { x, inc } => {
                let (c, t) = self.lvalue(x)?;
                if t != Type::Int {
                    return Err(Error::Malformed(format!("{s}: non-numeric operand")));
                }
                Ok(format!("{c}{}", if *inc { "++" } else { "--" }))
            }
            Stmt::Assign { lhs, op, rhs } if lhs.len() == 1 && rhs.len() == 1 => {
                let (r, rt) = self.value(&rhs[0])?;
                if is_blank(&lhs[0]) && *op == AssignOp::Assign {
                    return Ok(format!("(void)({r})"));
                }
                let (l, lt) = self.lvalue(&lhs[0])?;
                if lt != rt {
                    return Err(Error::Malformed(format!("mismatched types in {s}")));
                }
                match op {
                    AssignOp::Assign => Ok(format!("{l} = {r}")),
                    AssignOp::Op(BinOp::AndNot) if lt == Type::Int => Ok(format!("{l} &= ~{r}")),
                    AssignOp::Op(op @ (BinOp::Div | BinOp::Rem | BinOp::Shl | BinOp::Shr))
                        if lt == Type::Int =>
                    {
                        Ok(format!("{l} = {}", int_binary(*op, &l, &r)))
                    }
                    AssignOp::Op(
                        op @ (BinOp::Add
                        | BinOp::Sub
                        | BinOp::Mul
                        | BinOp::And
                        | BinOp::Or
                        | BinOp::Xor),
                    ) if lt == Type::Int => Ok(format!("{l} {}= {r}", op.as_str())),
                    _ => Err(Error::unsupported("assignment", s.to_string())),
                }
            }
            _ => Err(Error::unsupported(s.kind(), format!("{s} as a simple statement"))),
        }
    }

    fn condition(&self, e: &Expr) -> Result<String> {
        match self.value(e)? {
            (c, Type::Bool) => Ok(c),
            (_, t) => Err(Error::Malformed(format!(
                "non-boolean condition {e} of type {}",
                t.to_expr()
            ))),
        }
    }

    fn lvalue(&self, e: &Expr) -> Result<(String, Type)> {
        match e {
            Expr::Ident(n) if self.functions.contains(n.as_str()) && self.lookup(n).is_none() => {
                Err(Error::Malformed(format!("cannot assign to function {n}")))
            }
            Expr::Ident(_) | Expr::Star(_) => self.value(e),
            Expr::Paren(x) => self.lvalue(x),
            _ => Err(Error::unsupported(
                e.kind(),
                format!("assignment to {e}"),
            )),
        }
    }

    fn value(&self, e: &Expr) -> Result<(String, Type)> {
        match e {
            Expr::Ident(name) => self.ident(name),
            Expr::Lit(Lit::Int(s)) => Ok((int_literal(s)?, Type::Int)),
            Expr::Lit(Lit::Char(c)) => Ok(((*c as u32).to_string(), Type::Int)),
            Expr::Lit(Lit::Str(s)) => Ok((string_value(s), Type::String)),
            Expr::Binary { op, x, y } => {
                let (xc, xt) = self.value(x)?;
                let (yc, yt) = self.value(y)?;
                if xt != yt {
                    return Err(Error::Malformed(format!("mismatched types in {e}")));
                }
                let t = match op {
                    BinOp::Eq | BinOp::Ne => {
                        return Ok((self.equality(*op, xc, &xt, yc, &yt)?, Type::Bool))
                    }
                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge if xt == Type::Int => Type::Bool,
                    BinOp::LAnd | BinOp::LOr if xt == Type::Bool => Type::Bool,
                    BinOp::AndNot if xt == Type::Int => {
                        return Ok((format!("({xc} & ~{yc})"), Type::Int))
                    }
                    BinOp::Add
                    | BinOp::Sub
                    | BinOp::Mul
                    | BinOp::Div
                    | BinOp::Rem
                    | BinOp::And
                    | BinOp::Or
                    | BinOp::Xor
                    | BinOp::Shl
                    | BinOp::Shr
                        if xt == Type::Int =>
                    {
                        Type::Int
                    }
                    _ => {
                        return Err(Error::unsupported(
                            e.kind(),
                            format!("operator {} on {}", op.as_str(), xt.to_expr()),
                        ))
                    }
                };
                if t == Type::Int {
                    Ok((int_binary(*op, &xc, &yc), t))
                } else {
                    Ok((format!("({xc} {} {yc})", op.as_str()), t))
                }
            }
            Expr::Unary { op, x } => {
                let (c, t) = self.value(x)?;
                match (op, &t) {
                    (UnOp::Neg | UnOp::Plus, Type::Int) => {
                        Ok((format!("({}{c})", op.as_str()), Type::Int))
                    }
                    (UnOp::BitNot, Type::Int) => Ok((format!("(~{c})"), Type::Int)),
                    (UnOp::Not, Type::Bool) => Ok((format!("(!{c})"), Type::Bool)),
                    _ => Err(Error::unsupported(e.kind(), e.to_string())),
                }
            }
            Expr::Star(x) => match self.value(x)? {
                (c, Type::Pointer(t)) => Ok((format!("(*{c})"), *t)),
                (_, t) => Err(Error::Malformed(format!(
                    "invalid indirect of {x} of type {}",
                    t.to_expr()
                ))),
            },
            Expr::Paren(x) => {
                let (c, t) = self.value(x)?;
                Ok((format!("({c})"), t))
            }
            Expr::Call {
                fun,
                args,
                ellipsis: false,
            } => match self.call(fun, args)? {
                (c, Some(t)) => Ok((c, t)),
                (_, None) => Err(Error::Malformed(format!("{e} (no value) used as value"))),
            },
            Expr::Slice { x, low, high } => {
                let (xc, xt) = self.value(x)?;
                if xt != Type::String {
                    return Err(Error::unsupported(
                        e.kind(),
                        format!("slicing {}", xt.to_expr()),
                    ));
                }
                let int = |i: &Option<Box<Expr>>| -> Result<Option<String>> {
                    match i.as_deref() {
                        Some(i) => match self.value(i)? {
                            (c, Type::Int) => Ok(Some(c)),
                            _ => Err(Error::Malformed(format!("non-integer slice index {i}"))),
                        },
                        None => Ok(None),
                    }
                };
                let low = int(low)?.unwrap_or_else(|| "0".to_string());
                let high = int(high)?;
                let slice = self.runtime(RuntimeSymbol::SliceString)?;
                let (high, has_high) = match high {
                    Some(h) => (h, "true"),
                    None => ("0".to_string(), "false"),
                };
                Ok((format!("{slice}({xc}, {low}, {high}, {has_high})"), Type::String))
            }
            _ => Err(Error::unsupported(e.kind(), e.to_string())),
        }
    }

    fn equality(&self, op: BinOp, x: String, xt: &Type, y: String, yt: &Type) -> Result<String> {
        if xt != yt {
            return Err(Error::Malformed(format!(
                "mismatched types {} and {}",
                xt.to_expr(),
                yt.to_expr()
            )));
        }
        match xt {
            Type::String => {
                let f = self.runtime(if op == BinOp::Eq {
                    RuntimeSymbol::StringsEqual
                } else {
                    RuntimeSymbol::StringsUnequal
                })?;
                Ok(format!("{f}({x}, {y})"))
            }
            Type::Int | Type::Bool | Type::Pointer(_) | Type::Function { .. } => {
                Ok(format!("({x} {} {y})", op.as_str()))
            }
            t => Err(Error::unsupported(
                "comparison",
                format!("cannot compare values of type {}", t.to_expr()),
            )),
        }
    }

    fn ident(&self, name: &str) -> Result<(String, Type)> {
        if let Some(l) = self.lookup(name) {
            return Ok((l.c_name.clone(), l.ty.clone()));
        }
        if name == "true" || name == "false" {
            return Ok((name.to_string(), Type::Bool));
        }
        match self.types.get(name) {
            Some(Type::TypeType) => Err(Error::unsupported(
                "type",
                format!("`{name}` is a type, not a value"),
            )),
            Some(t) => Ok((global_name(name), t.clone())),
            None if self.globals.contains(name) => Err(Error::Untyped(name.to_string())),
            None => Err(Error::UnknownIdentifier(name.to_string())),
        }
    }

    /// A call, builtin or conversion. The type is `None` for calls of
    /// functions without results.
    fn call(&self, fun: &Expr, args: &[Expr]) -> Result<(String, Option<Type>)> {
        if let Expr::Ident(name) = fun {
            if self.is_builtin(name) {
                let builtin = match name.as_str() {
                    "len" => Some(self.builtin_len(args)?),
                    "new" => Some(self.builtin_new(args)?),
                    "int" => Some(self.conversion(name, Type::Int, args)?),
                    "bool" => Some(self.conversion(name, Type::Bool, args)?),
                    "string" => Some(self.conversion(name, Type::String, args)?),
                    "print" | "println" => {
                        return Err(Error::Malformed(format!("{name}() (no value) used as value")))
                    }
                    _ => None,
                };
                if let Some(b) = builtin {
                    return Ok((b.0, Some(b.1)));
                }
            } else if self.lookup(name).is_none() && self.types.get(name) == Some(&Type::TypeType) {
                let t = self
                    .types
                    .underlying(name)
                    .ok_or_else(|| Error::Untyped(name.clone()))?;
                let (c, t) = self.conversion(name, t.clone(), args)?;
                return Ok((c, Some(t)));
            }
        }
        let (f, t) = self.value(fun)?;
        let Type::Function { params, results } = t else {
            return Err(Error::unsupported(
                "call expression",
                format!("cannot call non-function {fun}"),
            ));
        };
        if params.len() != args.len() {
            return Err(Error::Malformed(format!(
                "wrong number of arguments in call to {fun}: have {}, want {}",
                args.len(),
                params.len()
            )));
        }
        let mut cs = Vec::with_capacity(args.len());
        for (a, p) in args.iter().zip(&params) {
            let (c, t) = self.value(a)?;
            if t != *p {
                return Err(Error::Malformed(format!(
                    "cannot use {a} as {} value in call to {fun}",
                    p.to_expr()
                )));
            }
            cs.push(c);
        }
        let result = match &results[..] {
            [] => None,
            [r] => Some(r.clone()),
            _ => {
                return Err(Error::unsupported(
                    "multiple return values",
                    format!("call to {fun}"),
                ))
            }
        };
        Ok((format!("{f}({})", cs.iter().format(", ")), result))
    }

    fn conversion(&self, name: &str, to: Type, args: &[Expr]) -> Result<(String, Type)> {
        let [arg] = args else {
            return Err(Error::Malformed(format!("conversion to {name} takes one argument")));
        };
        let (c, t) = self.value(arg)?;
        if t == to {
            Ok((c, to))
        } else {
            Err(Error::unsupported(
                "conversion",
                format!("cannot convert {arg} ({}) to {name}", t.to_expr()),
            ))
        }
    }

    fn builtin_len(&self, args: &[Expr]) -> Result<(String, Type)> {
        let [arg] = args else {
            return Err(Error::Malformed("len takes one argument".to_string()));
        };
        match self.value(arg)? {
            (c, Type::String) => Ok((format!("({c}).len"), Type::Int)),
            (_, t) => Err(Error::unsupported(
                "len",
                format!("len of {}", t.to_expr()),
            )),
        }
    }

    fn builtin_new(&self, args: &[Expr]) -> Result<(String, Type)> {
        let [arg] = args else {
            return Err(Error::Malformed("new takes one argument".to_string()));
        };
        let t = self.types.eval_type_expr(arg)?;
        let malloc = self.runtime(RuntimeSymbol::Malloc)?;
        let p = Type::Pointer(Box::new(t.clone()));
        Ok((
            format!("(({}){malloc}(sizeof({})))", p.declare("")?, t.declare("")?),
            p,
        ))
    }
}

/// An integer operation. Division by anything but a positive constant and
/// every shift go through the checked helpers of the prelude.
fn int_binary(op: BinOp, x: &str, y: &str) -> String {
    let positive = y
        .trim_end_matches("LL")
        .parse::<u64>()
        .map_or(false, |n| n > 0);
    match op {
        BinOp::Div | BinOp::Rem if positive => format!("({x} {} {y})", op.as_str()),
        BinOp::Div => format!("ogo_div({x}, {y})"),
        BinOp::Rem => format!("ogo_rem({x}, {y})"),
        BinOp::Shl => format!("ogo_shl({x}, {y})"),
        BinOp::Shr => format!("ogo_shr({x}, {y})"),
        _ => format!("({x} {} {y})", op.as_str()),
    }
}

fn is_blank(e: &Expr) -> bool {
    matches!(e, Expr::Ident(n) if n == "_")
}

fn check_arity(lhs: &[Expr], rhs: &[Expr]) -> Result<()> {
    match (lhs.len(), rhs.len()) {
        (l, r) if l == r => Ok(()),
        (_, 1) => Err(Error::unsupported(
            "multiple return values",
            format!("{} assigned from {}", lhs.iter().format(", "), rhs[0]),
        )),
        (l, r) => Err(Error::Malformed(format!(
            "assignment mismatch: {l} variables but {r} values"
        ))),
    }
}

/// The C constant initializing a global of type `t`, if `e` is one.
fn constant(e: &Expr, t: &Type) -> Result<Option<String>> {
    Ok(match (e, t) {
        (Expr::Lit(Lit::Int(s)), Type::Int) => Some(int_literal(s)?),
        (Expr::Lit(Lit::Char(c)), Type::Int) => Some((*c as u32).to_string()),
        (Expr::Lit(Lit::Str(s)), Type::String) => Some(format!("{{{}, {}}}", c_string(s), s.len())),
        (Expr::Ident(b), Type::Bool) if b == "true" || b == "false" => Some(b.clone()),
        (
            Expr::Unary {
                op: UnOp::Neg,
                x,
            },
            Type::Int,
        ) => constant(x, t)?.map(|c| format!("(-{c})")),
        (Expr::Paren(x), _) => constant(x, t)?,
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::{c_string, convert_name, generate, int_binary, int_literal, is_c_identifier};
    use crate::flatten::flatten;
    use crate::runtime::RuntimeSymbol;
    use crate::types::{Target, TypeMap};
    use crate::{DeclGraph, Error, Result};
    use parser::ast::BinOp;

    fn gen(src: &str) -> Result<String> {
        let mut g = DeclGraph::default();
        g.packages
            .entry("main".to_string())
            .or_default()
            .files
            .insert("main.go".to_string(), parser::parse(src).unwrap());
        crate::gen_c(&g, Target::default())
    }

    fn main_body(body: &str) -> String {
        gen(&format!("package main\nfunc main() {{\n{body}\n}}\n")).unwrap()
    }

    #[test]
    fn sections_in_order() {
        let c = main_body("\tprintln(\"hello\")");
        let prelude = c.find("typedef int64_t ogo_int;").unwrap();
        let runtime = c.find("static inline void ogo_print(").unwrap();
        let main_main = c.find("static void main_main(void) {").unwrap();
        let entry = c.find("int main(void) {").unwrap();
        assert!(prelude < runtime && runtime < main_main && main_main < entry);
        let init = c[entry..].find("main_init();").unwrap();
        let main = c[entry..].find("main_main();").unwrap();
        assert!(init < main);
        assert!(c[entry..].contains("return 0;"));
        assert!(!c.contains("ogo_slice_string"));
        assert!(!c.contains("ogo_malloc"));
    }

    #[test]
    fn string_equality_uses_the_runtime() {
        let c = main_body("\tif \"a\" == \"b\" {\n\t\tprintln(1)\n\t}");
        assert!(
            c.contains("if (ogo_strings_equal(OGO_STR(\"a\"), OGO_STR(\"b\"))) {"),
            "{c}"
        );
        let c = main_body("\tif 1 != 2 {\n\t}");
        assert!(c.contains("if ((1 != 2)) {"), "{c}");
    }

    #[test]
    fn println_lowering() {
        let c = main_body("\tprintln(\"x\", 1, true)");
        let expected = [
            "ogo_print(OGO_STR(\"x\"));",
            "ogo_print(OGO_STR(\" \"));",
            "ogo_print_int(1);",
            "ogo_print(OGO_STR(\" \"));",
            "ogo_print((true) ? OGO_STR(\"true\") : OGO_STR(\"false\"));",
            "ogo_print(OGO_STR(\"\\n\"));",
        ];
        let lines: Vec<&str> = c.lines().map(str::trim).collect();
        let start = lines.iter().position(|l| *l == expected[0]).unwrap();
        assert_eq!(&lines[start..start + expected.len()], expected);
    }

    #[test]
    fn untyped_globals_are_rejected() {
        let mut g = DeclGraph::default();
        g.packages.entry("main".to_string()).or_default().files.insert(
            "main.go".to_string(),
            parser::parse("package main\nfunc main() {}\n").unwrap(),
        );
        let program = flatten(&g).unwrap();
        let e = generate(&program, &TypeMap::default(), Target::default()).unwrap_err();
        assert!(matches!(e, Error::Untyped(_)), "{e}");
    }

    #[test]
    fn runtime_calls_must_be_required() {
        let mut g = DeclGraph::default();
        g.packages.entry("main".to_string()).or_default().files.insert(
            "main.go".to_string(),
            parser::parse("package main\nfunc main() {\n\tif \"a\" == \"b\" {\n\t}\n}\n")
                .unwrap(),
        );
        let mut program = flatten(&g).unwrap();
        let mut types = TypeMap::default();
        types.check(&mut program.decls).unwrap();
        program.runtime.remove(&RuntimeSymbol::StringsEqual);
        let e = generate(&program, &types, Target::default()).unwrap_err();
        assert!(
            matches!(e, Error::MissingRuntime(RuntimeSymbol::StringsEqual)),
            "{e}"
        );
    }

    #[test]
    fn mutual_recursion_gets_one_prototype() {
        let c = gen(
            "package main\n\
             func even(n int) bool {\n\tif n == 0 {\n\t\treturn true\n\t}\n\treturn odd(n - 1)\n}\n\
             func odd(n int) bool {\n\tif n == 0 {\n\t\treturn false\n\t}\n\treturn even(n - 1)\n}\n\
             func main() {\n\tprintln(even(10))\n}\n",
        )
        .unwrap();
        let prototypes = c
            .lines()
            .filter(|l| {
                *l == "static ogo_bool main_even(ogo_int);"
                    || *l == "static ogo_bool main_odd(ogo_int);"
            })
            .count();
        assert_eq!(prototypes, 1, "{c}");
        assert!(c.contains("static ogo_bool main_even(ogo_int l_n) {"), "{c}");
    }

    #[test]
    fn loops() {
        let c = main_body("\tfor i := 0; i < 3; i++ {\n\t\tif i == 1 {\n\t\t\tcontinue\n\t\t}\n\t\tbreak\n\t}");
        assert!(c.contains("ogo_int l_i = 0;"), "{c}");
        assert!(c.contains("for (; (l_i < 3); l_i++) {"), "{c}");
        assert!(c.contains("continue;"));
        assert!(c.contains("break;"));
        let c = main_body("\tn := 0\n\tfor i := range 10 {\n\t\tn += i\n\t}\n\tfor n < 100 {\n\t\tn *= 2\n\t}");
        assert!(c.contains("for (ogo_int l_i = 0; l_i < t_1; l_i++) {"), "{c}");
        assert!(c.contains("l_n += l_i;"), "{c}");
        assert!(c.contains("for (; (l_n < 100); ) {"), "{c}");
    }

    #[test]
    fn switch_is_an_if_chain() {
        let c = main_body(
            "\tx := 2\n\tswitch x {\n\tdefault:\n\t\tprintln(0)\n\tcase 1, 2:\n\t\tprintln(1)\n\t\tbreak\n\tcase 3:\n\t}",
        );
        assert!(c.contains("ogo_int t_1 = l_x;"), "{c}");
        assert!(c.contains("if ((t_1 == 1) || (t_1 == 2)) {"), "{c}");
        assert!(c.contains("else if ((t_1 == 3)) {"), "{c}");
        assert!(c.contains("goto switch_end_0;"), "{c}");
        assert!(c.contains("switch_end_0:;"), "{c}");
        let default = c.find("else {").unwrap();
        assert!(default > c.find("else if").unwrap());
    }

    #[test]
    fn shadowing_gets_fresh_names() {
        let c = main_body("\tx := 1\n\t{\n\t\tx := x + 1\n\t\tprintln(x)\n\t}\n\tprintln(x)");
        assert!(c.contains("ogo_int l1_x = (l_x + 1);"), "{c}");
        assert!(c.contains("ogo_print_int(l1_x);"), "{c}");
        assert!(c.contains("ogo_print_int(l_x);"), "{c}");
    }

    #[test]
    fn parallel_assignment_uses_temporaries() {
        let c = main_body("\ta, b := 1, 2\n\ta, b = b, a\n\tprintln(a, b)");
        assert!(c.contains("ogo_int t_3 = l_b;"), "{c}");
        assert!(c.contains("ogo_int t_4 = l_a;"), "{c}");
        assert!(c.contains("l_a = t_3;"), "{c}");
        assert!(c.contains("l_b = t_4;"), "{c}");
    }

    #[test]
    fn globals() {
        let c = gen(
            "package main\n\
             var s = \"hi\"\n\
             var n int = f()\n\
             var b bool\n\
             func f() int { return -1 }\n\
             func main() {\n\tprintln(s, n, b)\n}\n",
        )
        .unwrap();
        assert!(c.contains("static ogo_string main_s = {\"hi\", 2};"), "{c}");
        assert!(c.contains("static ogo_int main_n = 0;"), "{c}");
        assert!(c.contains("static ogo_bool main_b = 0;"), "{c}");
        let init = c.find("static void main_init(void) {").unwrap();
        assert!(c[init..].contains("main_n = main_f();"), "{c}");
    }

    #[test]
    fn pointers_and_strings() {
        let c = gen(
            "package main\n\
             type T int\n\
             func main() {\n\tp := new(T)\n\t*p = T(3)\n\ts := \"hello\"\n\tprintln(*p, len(s[1:]), s[:2])\n}\n",
        )
        .unwrap();
        assert!(c.contains("typedef ogo_int main_T;"), "{c}");
        assert!(
            c.contains("ogo_int *l_p = ((ogo_int *)ogo_malloc(sizeof(ogo_int)));"),
            "{c}"
        );
        assert!(c.contains("(*l_p) = 3;"), "{c}");
        assert!(c.contains("((ogo_slice_string(l_s, 1, 0, false)).len)"), "{c}");
        assert!(c.contains("ogo_slice_string(l_s, 0, 2, true)"), "{c}");
    }

    #[test]
    fn function_values() {
        let c = gen(
            "package main\n\
             var op func(int, int) int\n\
             func add(a, b int) int { return a + b }\n\
             func apply(f func(int, int) int) (r int) {\n\tr = f(1, 2)\n\treturn\n}\n\
             func main() {\n\top = add\n\tprintln(apply(op))\n}\n",
        )
        .unwrap();
        assert!(c.contains("static ogo_int (*main_op)(ogo_int, ogo_int) = 0;"), "{c}");
        assert!(
            c.contains("static ogo_int main_apply(ogo_int (*l_f)(ogo_int, ogo_int)) {"),
            "{c}"
        );
        assert!(c.contains("ogo_int l_r = 0;"), "{c}");
        assert!(c.contains("return l_r;"), "{c}");
    }

    #[test]
    fn unsupported_constructs_name_their_kind() {
        let e = gen("package main\nfunc main() {\n\tx := 1.5\n\t_ = x\n}\n").unwrap_err();
        assert!(matches!(e, Error::Unsupported { ref kind, .. } if kind == "float literal"), "{e}");
        let e = gen("package main\nfunc main() {\n\tx := 1\n\tp := &x\n\t_ = p\n}\n").unwrap_err();
        assert!(matches!(e, Error::Unsupported { ref kind, .. } if kind == "unary expression"), "{e}");
        let e = gen("package main\nfunc main() {\n\tprintln(y)\n}\n").unwrap_err();
        assert!(matches!(e, Error::UnknownIdentifier(ref n) if n == "y"), "{e}");
    }

    #[test]
    fn literals() {
        assert_eq!(int_literal("0x10").unwrap(), "16");
        assert_eq!(int_literal("017").unwrap(), "15");
        assert_eq!(int_literal("0b101").unwrap(), "5");
        assert_eq!(int_literal("1_000").unwrap(), "1000");
        assert_eq!(int_literal("3000000000").unwrap(), "3000000000LL");
        assert!(int_literal("99999999999999999999").is_err());
        assert_eq!(c_string("a\"b\\c?\n\u{e9}"), "\"a\\\"b\\\\c\\?\\n\\303\\251\"");
    }

    #[test]
    fn names() {
        assert_eq!(convert_name("main_x"), "main_x");
        assert_eq!(convert_name("main_π"), "main_\\u03C0");
        assert_eq!(convert_name("main_𝑥"), "main_\\U0001D465");
        assert!(is_c_identifier("main_π2"));
        assert!(!is_c_identifier("a+b_F"));
        assert!(!is_c_identifier("9fans_F"));
        let mut g = DeclGraph::default();
        for (path, src) in [
            ("main", "package main\nimport \"x+y\"\nfunc main() { y.F() }\n"),
            ("x+y", "package y\nfunc F() {}\n"),
        ] {
            g.packages
                .entry(path.to_string())
                .or_default()
                .files
                .insert("f.go".to_string(), parser::parse(src).unwrap());
        }
        let e = crate::gen_c(&g, Target::default()).unwrap_err();
        assert!(matches!(e, Error::Malformed(ref m) if m.contains("not a C identifier")), "{e}");
    }

    #[test]
    fn string_switch_compares_through_the_runtime() {
        let c = main_body("\ts := \"a\"\n\tswitch s {\n\tcase \"a\":\n\t\tprintln(1)\n\t}");
        assert!(c.contains("ogo_string t_1 = l_s;"), "{c}");
        assert!(
            c.contains("if (ogo_strings_equal(t_1, OGO_STR(\"a\"))) {"),
            "{c}"
        );
    }

    #[test]
    fn integer_division_and_shifts_are_checked() {
        let c = main_body(
            "\tx := 7\n\ty := 0\n\tprintln(x / y, x % 2, x << y, x >> 70)\n\tx /= y\n\tx <<= 1\n\tx -= 1",
        );
        assert!(c.contains("ogo_print_int(ogo_div(l_x, l_y));"), "{c}");
        assert!(c.contains("ogo_print_int((l_x % 2));"), "{c}");
        assert!(c.contains("ogo_print_int(ogo_shl(l_x, l_y));"), "{c}");
        assert!(c.contains("ogo_print_int(ogo_shr(l_x, 70));"), "{c}");
        assert!(c.contains("l_x = ogo_div(l_x, l_y);"), "{c}");
        assert!(c.contains("l_x = ogo_shl(l_x, 1);"), "{c}");
        assert!(c.contains("l_x -= 1;"), "{c}");
        assert_eq!(int_binary(BinOp::Rem, "a", "(-1)"), "ogo_rem(a, (-1))");
        assert_eq!(int_binary(BinOp::Div, "a", "3000000000LL"), "(a / 3000000000LL)");
    }
}
