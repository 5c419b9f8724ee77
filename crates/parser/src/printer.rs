//! Go source printing. The output is gofmt-like but not byte-identical to
//! gofmt; it reparses to the same tree.

use crate::ast::*;
use itertools::Itertools;
use std::fmt::{self, Display, Formatter, Write};

impl Display for File {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut p = Printer::default();
        p.file(self)?;
        f.write_str(&p.out)
    }
}

impl Display for Decl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut p = Printer::default();
        p.decl(self)?;
        f.write_str(&p.out)
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut p = Printer::default();
        p.stmt(self)?;
        f.write_str(&p.out)
    }
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn newline(&mut self) -> fmt::Result {
        writeln!(self.out)?;
        write!(self.out, "{}", "\t".repeat(self.indent))
    }

    fn file(&mut self, file: &File) -> fmt::Result {
        write!(self.out, "package {}", file.package)?;
        match &file.imports[..] {
            [] => (),
            [i] => write!(self.out, "\n\nimport {i}")?,
            is => {
                write!(self.out, "\n\nimport (")?;
                for i in is {
                    write!(self.out, "\n\t{i}")?;
                }
                write!(self.out, "\n)")?;
            }
        }
        for d in &file.decls {
            write!(self.out, "\n\n")?;
            self.decl(d)?;
        }
        writeln!(self.out)
    }

    fn decl(&mut self, d: &Decl) -> fmt::Result {
        match d {
            Decl::Func(func) => {
                write!(self.out, "func ")?;
                if let Some(recv) = &func.recv {
                    write!(self.out, "({recv}) ")?;
                }
                write!(self.out, "{}{}", func.name, func.ty)?;
                if let Some(body) = &func.body {
                    write!(self.out, " ")?;
                    self.block(body)?;
                }
                Ok(())
            }
            Decl::Var(specs) => self.specs("var", specs),
            Decl::Const(specs) => self.specs("const", specs),
            Decl::Type(specs) => {
                if let [s] = &specs[..] {
                    return write!(self.out, "type {} {}", s.name, s.ty);
                }
                write!(self.out, "type (")?;
                self.indent += 1;
                for s in specs {
                    self.newline()?;
                    write!(self.out, "{} {}", s.name, s.ty)?;
                }
                self.indent -= 1;
                self.newline()?;
                write!(self.out, ")")
            }
        }
    }

    fn specs(&mut self, keyword: &str, specs: &[ValueSpec]) -> fmt::Result {
        if let [s] = specs {
            return write!(self.out, "{keyword} {s}");
        }
        write!(self.out, "{keyword} (")?;
        self.indent += 1;
        for s in specs {
            self.newline()?;
            write!(self.out, "{s}")?;
        }
        self.indent -= 1;
        self.newline()?;
        write!(self.out, ")")
    }

    fn block(&mut self, b: &Block) -> fmt::Result {
        write!(self.out, "{{")?;
        self.stmts(&b.stmts)?;
        self.newline()?;
        write!(self.out, "}}")
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> fmt::Result {
        self.indent += 1;
        for s in stmts {
            self.newline()?;
            self.stmt(s)?;
        }
        self.indent -= 1;
        Ok(())
    }

    fn stmt(&mut self, s: &Stmt) -> fmt::Result {
        match s {
            Stmt::Expr(e) => write!(self.out, "{e}"),
            Stmt::Assign { lhs, op, rhs } => {
                write!(self.out, "{} {op} {}", lhs.iter().format(", "), rhs.iter().format(", "))
            }
            Stmt::IncDec { x, inc } => write!(self.out, "{x}{}", if *inc { "++" } else { "--" }),
            Stmt::Var(specs) => self.specs("var", specs),
            Stmt::Const(specs) => self.specs("const", specs),
            Stmt::Return(results) if results.is_empty() => write!(self.out, "return"),
            Stmt::Return(results) => write!(self.out, "return {}", results.iter().format(", ")),
            Stmt::Block(b) => self.block(b),
            Stmt::If {
                init,
                cond,
                body,
                els,
            } => {
                write!(self.out, "if ")?;
                if let Some(init) = init {
                    self.stmt(init)?;
                    write!(self.out, "; ")?;
                }
                write!(self.out, "{cond} ")?;
                self.block(body)?;
                if let Some(els) = els {
                    write!(self.out, " else ")?;
                    self.stmt(els)?;
                }
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                write!(self.out, "for ")?;
                if init.is_some() || post.is_some() {
                    if let Some(init) = init {
                        self.stmt(init)?;
                    }
                    write!(self.out, "; ")?;
                    if let Some(cond) = cond {
                        write!(self.out, "{cond}")?;
                    }
                    write!(self.out, "; ")?;
                    if let Some(post) = post {
                        self.stmt(post)?;
                        write!(self.out, " ")?;
                    }
                } else if let Some(cond) = cond {
                    write!(self.out, "{cond} ")?;
                }
                self.block(body)
            }
            Stmt::Range {
                key,
                value,
                define,
                x,
                body,
            } => {
                write!(self.out, "for ")?;
                if let Some(key) = key {
                    write!(self.out, "{key}")?;
                    if let Some(value) = value {
                        write!(self.out, ", {value}")?;
                    }
                    write!(self.out, " {} ", if *define { ":=" } else { "=" })?;
                }
                write!(self.out, "range {x} ")?;
                self.block(body)
            }
            Stmt::Switch {
                init,
                tag,
                clauses,
            } => {
                write!(self.out, "switch ")?;
                if let Some(init) = init {
                    self.stmt(init)?;
                    write!(self.out, "; ")?;
                }
                if let Some(tag) = tag {
                    write!(self.out, "{tag} ")?;
                }
                write!(self.out, "{{")?;
                for c in clauses {
                    self.newline()?;
                    match &c.list {
                        Some(list) => write!(self.out, "case {}:", list.iter().format(", "))?,
                        None => write!(self.out, "default:")?,
                    }
                    self.stmts(&c.body)?;
                }
                self.newline()?;
                write!(self.out, "}}")
            }
            Stmt::Break => write!(self.out, "break"),
            Stmt::Continue => write!(self.out, "continue"),
        }
    }
}

impl Display for Import {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{alias} ")?;
        }
        write!(f, "{}", Quoted(&self.path))
    }
}

impl Display for ValueSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.iter().format(", "))?;
        if let Some(ty) = &self.ty {
            write!(f, " {ty}")?;
        }
        if !self.values.is_empty() {
            write!(f, " = {}", self.values.iter().format(", "))?;
        }
        Ok(())
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.names.is_empty() {
            write!(f, "{}", self.ty)
        } else {
            write!(f, "{} {}", self.names.iter().format(", "), self.ty)
        }
    }
}

/// Prints the signature part that follows `func` or the function name.
impl Display for FuncType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.params.iter().format(", "))?;
        match &self.results[..] {
            [] => Ok(()),
            [r] if r.names.is_empty() => write!(f, " {r}"),
            rs => write!(f, " ({})", rs.iter().format(", ")),
        }
    }
}

impl Display for AssignOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AssignOp::Assign => write!(f, "="),
            AssignOp::Define => write!(f, ":="),
            AssignOp::Op(op) => write!(f, "{}=", op.as_str()),
        }
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Lit::Int(s) | Lit::Float(s) => write!(f, "{s}"),
            Lit::Str(s) => write!(f, "{}", Quoted(s)),
            Lit::Char('\'') => write!(f, r"'\''"),
            Lit::Char('"') => write!(f, "'\"'"),
            Lit::Char(c) => {
                let mut buf = [0; 4];
                let q = Quoted(c.encode_utf8(&mut buf)).to_string();
                write!(f, "'{}'", &q[1..q.len() - 1])
            }
        }
    }
}

struct Quoted<'a>(&'a str);

impl Display for Quoted<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                c if c.is_control() && (c as u32) < 0x80 => write!(f, "\\x{:02x}", c as u32)?,
                c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
                c => f.write_char(c)?,
            }
        }
        f.write_char('"')
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(s) => write!(f, "{s}"),
            Expr::Lit(l) => write!(f, "{l}"),
            Expr::Binary { op, x, y } => write!(f, "{x} {} {y}", op.as_str()),
            Expr::Unary { op, x } => {
                let op = op.as_str();
                let x = x.to_string();
                // `- -1` must not become `--1`.
                if x.starts_with(op) {
                    write!(f, "{op} {x}")
                } else {
                    write!(f, "{op}{x}")
                }
            }
            Expr::Paren(x) => write!(f, "({x})"),
            Expr::Call {
                fun,
                args,
                ellipsis,
            } => write!(
                f,
                "{fun}({}{})",
                args.iter().format(", "),
                if *ellipsis { "..." } else { "" }
            ),
            Expr::Selector { x, sel } => write!(f, "{x}.{sel}"),
            Expr::Index { x, index } => write!(f, "{x}[{index}]"),
            Expr::Slice { x, low, high } => {
                write!(f, "{x}[")?;
                if let Some(low) = low {
                    write!(f, "{low}")?;
                }
                write!(f, ":")?;
                if let Some(high) = high {
                    write!(f, "{high}")?;
                }
                write!(f, "]")
            }
            Expr::Star(x) => write!(f, "*{x}"),
            Expr::CompositeLit { ty, elts } => write!(f, "{ty}{{{}}}", elts.iter().format(", ")),
            Expr::KeyValue { key, value } => write!(f, "{key}: {value}"),
            Expr::FuncLit { ty, body } => {
                let mut p = Printer::default();
                p.block(body)?;
                write!(f, "func{ty} {}", p.out)
            }
            Expr::TypeAssert { x, ty: Some(ty) } => write!(f, "{x}.({ty})"),
            Expr::TypeAssert { x, ty: None } => write!(f, "{x}.(type)"),
            Expr::ArrayType { len, elt } => {
                write!(f, "[")?;
                if let Some(len) = len {
                    write!(f, "{len}")?;
                }
                write!(f, "]{elt}")
            }
            Expr::MapType { key, value } => write!(f, "map[{key}]{value}"),
            Expr::StructType(fields) if fields.is_empty() => write!(f, "struct{{}}"),
            Expr::StructType(fields) => write!(f, "struct {{ {} }}", fields.iter().format("; ")),
            Expr::InterfaceType(methods) if methods.is_empty() => write!(f, "interface{{}}"),
            Expr::InterfaceType(methods) => write!(
                f,
                "interface {{ {} }}",
                methods.iter().format_with("; ", |m, f| match (&m.names[..], &m.ty) {
                    ([name], Expr::FuncType(sig)) => f(&format_args!("{name}{sig}")),
                    _ => f(&m.ty),
                })
            ),
            Expr::FuncType(sig) => write!(f, "func{sig}"),
            Expr::Ellipsis(Some(t)) => write!(f, "...{t}"),
            Expr::Ellipsis(None) => write!(f, "..."),
        }
    }
}
