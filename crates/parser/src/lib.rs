pub mod ast;
mod grammar;
mod lexer;
mod printer;

use ariadne::{sources, Color, Label, Report, ReportKind};
use chumsky::Parser;
use std::io::Write;
use std::ops::Range;
use thiserror::Error;

pub use lexer::Token;

/// A lexical or syntax error with its byte range in the source file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub span: Range<usize>,
    pub message: String,
}

impl ParseError {
    pub fn write(&self, mut w: impl Write, file_name: &str, src: &str) -> std::io::Result<()> {
        Report::build(ReportKind::Error, file_name.to_string(), self.span.start)
            .with_message("could not parse file")
            .with_label(
                Label::new((file_name.to_string(), self.span.clone()))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            )
            .finish()
            .write(sources([(file_name.to_string(), src)]), &mut w)
    }
}

pub fn parse(src: &str) -> Result<ast::File, ParseError> {
    let (tokens, spans) = lexer::lex(src)?;
    let result = grammar::file()
        .parse(&tokens[..])
        .into_result()
        .map_err(|errs| {
            let Some(e) = errs.into_iter().next() else {
                return ParseError {
                    span: 0..0,
                    message: "could not parse file".to_string(),
                };
            };
            // Token indices back to byte offsets.
            let tokens = e.span().into_range();
            let start = spans.get(tokens.start).map_or(src.len(), |r| r.start);
            let end = tokens
                .end
                .checked_sub(1)
                .and_then(|i| spans.get(i))
                .map_or(start, |r| r.end)
                .max(start);
            ParseError {
                span: start..end,
                message: e.to_string(),
            }
        });
    result
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parse;

    fn func_body(src: &str) -> Vec<Stmt> {
        let file = parse(&format!("package main\nfunc f() {{\n{src}\n}}\n")).unwrap();
        match file.decls.into_iter().next() {
            Some(Decl::Func(FuncDecl {
                body: Some(body), ..
            })) => body.stmts,
            d => panic!("{d:?}"),
        }
    }

    #[test]
    fn package_and_imports() {
        let file = parse(
            r#"package main

import (
	"fmt"
	s "example.com/strs"
)

import "os"

func main() {}
"#,
        )
        .unwrap();
        assert_eq!(file.package, "main");
        assert_eq!(
            file.imports,
            vec![
                Import {
                    alias: None,
                    path: "fmt".to_string()
                },
                Import {
                    alias: Some("s".to_string()),
                    path: "example.com/strs".to_string()
                },
                Import {
                    alias: None,
                    path: "os".to_string()
                },
            ]
        );
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn grouped_parameters() {
        let file = parse("package p\nfunc f(a, b int, s string) (int, bool) { return a, true }\n")
            .unwrap();
        let Decl::Func(f) = &file.decls[0] else {
            panic!()
        };
        assert_eq!(f.ty.params.len(), 2);
        assert_eq!(f.ty.params[0].names, vec!["a", "b"]);
        assert_eq!(f.ty.params[1].ty, Expr::ident("string"));
        assert_eq!(f.ty.results.len(), 2);
        assert!(f.ty.results.iter().all(|r| r.names.is_empty()));
    }

    #[test]
    fn mixed_parameters_are_rejected() {
        assert!(parse("package p\nfunc f(a int, string) {}\n").is_err());
    }

    #[test]
    fn methods_keep_their_receiver() {
        let file = parse("package p\ntype T int\nfunc (t *T) Get() int { return 1 }\n").unwrap();
        assert_eq!(file.decls[1].kind(), "method");
    }

    #[test]
    fn operator_precedence() {
        let stmts = func_body("x := 1 + 2*3 == 7 && !b");
        let Stmt::Assign { rhs, .. } = &stmts[0] else {
            panic!()
        };
        let Expr::Binary { op, x, .. } = &rhs[0] else {
            panic!()
        };
        assert_eq!(*op, BinOp::LAnd);
        let Expr::Binary { op, x, .. } = &**x else {
            panic!()
        };
        assert_eq!(*op, BinOp::Eq);
        let Expr::Binary { op, y, .. } = &**x else {
            panic!()
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(&**y, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn control_flow() {
        let stmts = func_body(
            r#"for i := 0; i < 10; i++ {
	if x := i % 2; x == 0 {
		continue
	} else if i > 5 {
		break
	}
}
for {
}
for k, v := range xs {
}
switch s {
case "a", "b":
	println(s)
default:
}"#,
        );
        assert_eq!(
            stmts.iter().map(Stmt::kind).collect::<Vec<_>>(),
            vec![
                "for statement",
                "for statement",
                "range statement",
                "switch statement"
            ]
        );
        let Stmt::Switch { clauses, .. } = &stmts[3] else {
            panic!()
        };
        assert_eq!(clauses[0].list.as_ref().map(Vec::len), Some(2));
        assert_eq!(clauses[0].body.len(), 1);
        assert_eq!(clauses[1].list, None);
    }

    #[test]
    fn selectors_slices_and_literals() {
        let stmts = func_body("y := strs.Upper(s[1:])[0]\nz := []int{1, 2,\n}\nw := struct{ a int }{a: 1}");
        let Stmt::Assign { rhs, .. } = &stmts[0] else {
            panic!()
        };
        assert!(matches!(&rhs[0], Expr::Index { .. }));
        let Stmt::Assign { rhs, .. } = &stmts[1] else {
            panic!()
        };
        assert!(matches!(&rhs[0], Expr::CompositeLit { elts, .. } if elts.len() == 2));
        let Stmt::Assign { rhs, .. } = &stmts[2] else {
            panic!()
        };
        assert!(matches!(&rhs[0], Expr::CompositeLit { elts, .. }
            if matches!(elts[0], Expr::KeyValue { .. })));
    }

    #[test]
    fn syntax_error_has_byte_span() {
        let src = "package main\nfunc main() {\n\tx := \n}\n";
        let e = parse(src).unwrap_err();
        assert!(e.span.start >= src.find("x :=").unwrap());
        let mut out = Vec::new();
        e.write(&mut out, "main.go", src).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("main.go"));
    }

    #[test]
    fn printing_reparses_to_the_same_tree() {
        let src = r#"package main

import "fmt"

type Celsius int

var (
	a, b int = 1, 2
	s = "q\"\n"
)

func add(x, y int) int {
	return x + y
}

func main() {
	var c Celsius = Celsius(a)
	f := func(n int) int { return -n }
	for i := 0; i < 3; i++ {
		c += Celsius(add(i, f(-1)))
	}
	switch {
	case c > 2:
		fmt.Println(s[1:])
	}
}
"#;
        let file = parse(src).unwrap();
        let printed = file.to_string();
        assert_eq!(parse(&printed).unwrap(), file, "{printed}");
    }
}
