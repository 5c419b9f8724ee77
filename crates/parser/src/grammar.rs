use crate::ast::*;
use crate::lexer::Token;
use chumsky::prelude::*;
use chumsky::recursive::{Indirect, Recursive};

type Err<'a> = extra::Err<Rich<'a, Token>>;
type Tokens<'a> = &'a [Token];
type Boxed<'a, O> = chumsky::Boxed<'a, 'a, Tokens<'a>, O, Err<'a>>;

fn kw<'a>(k: &'static str) -> impl Parser<'a, Tokens<'a>, (), Err<'a>> + Clone {
    just(Token::Keyword(k)).ignored()
}

fn punct<'a>(p: &'static str) -> impl Parser<'a, Tokens<'a>, (), Err<'a>> + Clone {
    just(Token::Punct(p)).ignored()
}

fn ident<'a>() -> impl Parser<'a, Tokens<'a>, String, Err<'a>> + Clone {
    select! { Token::Ident(s) => s }
}

fn semis<'a>() -> impl Parser<'a, Tokens<'a>, (), Err<'a>> + Clone {
    punct(";").repeated().at_least(1)
}

/// A single spec or a parenthesized, semicolon separated group of them.
fn group<'a, T: 'a>(
    spec: impl Parser<'a, Tokens<'a>, T, Err<'a>> + Clone + 'a,
) -> impl Parser<'a, Tokens<'a>, Vec<T>, Err<'a>> + Clone + 'a {
    choice((
        spec.clone()
            .separated_by(semis())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(punct("("), punct(")")),
        spec.map(|s| vec![s]),
    ))
}

enum Param {
    Named(String, Expr),
    Anon(Expr),
}

/// `(a, b int, c string)` groups names sharing a type; `(int, string)` has
/// no names. Mixing the two forms is an error.
fn group_params(entries: Vec<Param>) -> Result<Vec<Field>, &'static str> {
    if entries.iter().all(|p| matches!(p, Param::Anon(_))) {
        return Ok(entries
            .into_iter()
            .map(|p| match p {
                Param::Anon(ty) | Param::Named(_, ty) => Field { names: Vec::new(), ty },
            })
            .collect());
    }
    let mut fields = Vec::new();
    let mut pending = Vec::new();
    for p in entries {
        match p {
            Param::Anon(Expr::Ident(name)) => pending.push(name),
            Param::Anon(_) => return Err("mixed named and unnamed parameters"),
            Param::Named(name, ty) => {
                pending.push(name);
                fields.push(Field {
                    names: std::mem::take(&mut pending),
                    ty,
                });
            }
        }
    }
    if pending.is_empty() {
        Ok(fields)
    } else {
        Err("mixed named and unnamed parameters")
    }
}

fn params<'a>(ty: Boxed<'a, Expr>) -> impl Parser<'a, Tokens<'a>, Vec<Field>, Err<'a>> + Clone {
    let param_ty = choice((
        punct("...")
            .ignore_then(ty.clone())
            .map(|t| Expr::Ellipsis(Some(Box::new(t)))),
        ty,
    ));
    choice((
        ident()
            .then(param_ty.clone())
            .map(|(name, ty)| Param::Named(name, ty)),
        param_ty.map(Param::Anon),
    ))
    .separated_by(punct(","))
    .allow_trailing()
    .collect::<Vec<_>>()
    .delimited_by(punct("("), punct(")"))
    .try_map(|entries, span| group_params(entries).map_err(|m| Rich::custom(span, m)))
}

/// Parameters and results, after the `func` keyword and name.
fn signature<'a>(ty: Boxed<'a, Expr>) -> impl Parser<'a, Tokens<'a>, FuncType, Err<'a>> + Clone {
    let results = choice((
        params(ty.clone()),
        ty.clone().map(|ty| {
            vec![Field {
                names: Vec::new(),
                ty,
            }]
        }),
    ))
    .or_not()
    .map(Option::unwrap_or_default);
    params(ty)
        .then(results)
        .map(|(params, results)| FuncType { params, results })
}

fn ty<'a>() -> Boxed<'a, Expr> {
    recursive(|ty: Recursive<chumsky::recursive::Direct<'a, 'a, Tokens<'a>, Expr, Err<'a>>>| {
        let ty = ty.boxed();
        let array_len = choice((
            select! { Token::Int(s) => Expr::Lit(Lit::Int(s)) },
            ident().map(Expr::Ident),
            punct("...").to(Expr::Ellipsis(None)),
        ));
        let named = ident()
            .then(punct(".").ignore_then(ident()).or_not())
            .map(|(x, sel)| match sel {
                Some(sel) => Expr::Selector {
                    x: Box::new(Expr::Ident(x)),
                    sel,
                },
                None => Expr::Ident(x),
            });
        let pointer = punct("*")
            .ignore_then(ty.clone())
            .map(|t| Expr::Star(Box::new(t)));
        let array = array_len
            .or_not()
            .delimited_by(punct("["), punct("]"))
            .then(ty.clone())
            .map(|(len, elt)| Expr::ArrayType {
                len: len.map(Box::new),
                elt: Box::new(elt),
            });
        let map = kw("map")
            .ignore_then(ty.clone().delimited_by(punct("["), punct("]")))
            .then(ty.clone())
            .map(|(key, value)| Expr::MapType {
                key: Box::new(key),
                value: Box::new(value),
            });
        let func = kw("func")
            .ignore_then(signature(ty.clone()))
            .map(Expr::FuncType);
        let tag = select! { Token::Str(_) => () }.or_not();
        let field = ident()
            .separated_by(punct(","))
            .at_least(1)
            .collect::<Vec<_>>()
            .then(ty.clone())
            .then_ignore(tag)
            .map(|(names, ty)| Field { names, ty });
        let structure = kw("struct")
            .ignore_then(
                field
                    .separated_by(semis())
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(punct("{"), punct("}")),
            )
            .map(Expr::StructType);
        let method = choice((
            ident()
                .then(signature(ty.clone()))
                .map(|(name, sig)| Field {
                    names: vec![name],
                    ty: Expr::FuncType(sig),
                }),
            named.clone().map(|ty| Field {
                names: Vec::new(),
                ty,
            }),
        ));
        let interface = kw("interface")
            .ignore_then(
                method
                    .separated_by(semis())
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(punct("{"), punct("}")),
            )
            .map(Expr::InterfaceType);
        let paren = ty.delimited_by(punct("("), punct(")"));
        choice((named, pointer, array, map, func, structure, interface, paren))
    })
    .boxed()
}

#[derive(Clone)]
enum Suffix {
    Sel(String),
    Assert(Option<Expr>),
    Index(Expr),
    Slice(Option<Expr>, Option<Expr>),
    Call(Vec<Expr>, bool),
}

#[derive(Clone)]
enum SimpleTail {
    Assign(AssignOp, Vec<Expr>),
    Inc(bool),
}

fn binary<'a>(
    operand: Boxed<'a, Expr>,
    op: impl Parser<'a, Tokens<'a>, BinOp, Err<'a>> + Clone + 'a,
) -> Boxed<'a, Expr> {
    operand
        .clone()
        .foldl(op.then(operand).repeated(), |x, (op, y)| Expr::Binary {
            op,
            x: Box::new(x),
            y: Box::new(y),
        })
        .boxed()
}

pub(crate) fn file<'a>() -> impl Parser<'a, Tokens<'a>, File, Err<'a>> {
    let ty = ty();
    let mut expr: Recursive<Indirect<'a, 'a, Tokens<'a>, Expr, Err<'a>>> = Recursive::declare();
    let mut block: Recursive<Indirect<'a, 'a, Tokens<'a>, Block, Err<'a>>> = Recursive::declare();

    let expr_list = expr
        .clone()
        .separated_by(punct(","))
        .at_least(1)
        .collect::<Vec<_>>();

    {
        let lit = select! {
            Token::Int(s) => Expr::Lit(Lit::Int(s)),
            Token::Float(s) => Expr::Lit(Lit::Float(s)),
            Token::Str(s) => Expr::Lit(Lit::Str(s)),
            Token::Char(c) => Expr::Lit(Lit::Char(c)),
        };
        let func_lit = kw("func")
            .ignore_then(signature(ty.clone()))
            .then(block.clone())
            .map(|(ty, body)| Expr::FuncLit { ty, body });
        let element = choice((
            expr.clone()
                .then_ignore(punct(":"))
                .then(expr.clone())
                .map(|(key, value)| Expr::KeyValue {
                    key: Box::new(key),
                    value: Box::new(value),
                }),
            expr.clone(),
        ));
        let literal_type = ty.clone().try_map(|t, span| match t {
            Expr::ArrayType { .. } | Expr::MapType { .. } | Expr::StructType(_) => Ok(t),
            _ => Err(Rich::custom(span, "expected array, map or struct type")),
        });
        let composite = literal_type
            .clone()
            .then(
                element
                    .separated_by(punct(","))
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(punct("{"), punct("}")),
            )
            .map(|(ty, elts)| Expr::CompositeLit {
                ty: Box::new(ty),
                elts,
            });
        let operand = choice((
            lit,
            func_lit,
            composite,
            literal_type,
            ident().map(Expr::Ident),
            expr.clone()
                .delimited_by(punct("("), punct(")"))
                .map(|e| Expr::Paren(Box::new(e))),
        ));
        let call_args = expr
            .clone()
            .separated_by(punct(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .then(punct("...").or_not().map(|e| e.is_some()))
            .then_ignore(punct(",").or_not())
            .delimited_by(punct("("), punct(")"));
        let suffix = choice((
            punct(".").ignore_then(ident()).map(Suffix::Sel),
            punct(".")
                .ignore_then(
                    choice((kw("type").to(None), ty.clone().map(Some)))
                        .delimited_by(punct("("), punct(")")),
                )
                .map(Suffix::Assert),
            expr.clone()
                .or_not()
                .then_ignore(punct(":"))
                .then(expr.clone().or_not())
                .delimited_by(punct("["), punct("]"))
                .map(|(low, high)| Suffix::Slice(low, high)),
            expr.clone()
                .delimited_by(punct("["), punct("]"))
                .map(Suffix::Index),
            call_args.map(|(args, ellipsis)| Suffix::Call(args, ellipsis)),
        ));
        let primary = operand
            .foldl(suffix.repeated(), |x, s| {
                let x = Box::new(x);
                match s {
                    Suffix::Sel(sel) => Expr::Selector { x, sel },
                    Suffix::Assert(ty) => Expr::TypeAssert {
                        x,
                        ty: ty.map(Box::new),
                    },
                    Suffix::Index(index) => Expr::Index {
                        x,
                        index: Box::new(index),
                    },
                    Suffix::Slice(low, high) => Expr::Slice {
                        x,
                        low: low.map(Box::new),
                        high: high.map(Box::new),
                    },
                    Suffix::Call(args, ellipsis) => Expr::Call {
                        fun: x,
                        args,
                        ellipsis,
                    },
                }
            })
            .boxed();
        let unary = recursive(|unary| {
            let op = select! {
                Token::Punct("-") => UnOp::Neg,
                Token::Punct("+") => UnOp::Plus,
                Token::Punct("!") => UnOp::Not,
                Token::Punct("^") => UnOp::BitNot,
                Token::Punct("&") => UnOp::Addr,
            };
            choice((
                op.then(unary.clone()).map(|(op, x)| Expr::Unary {
                    op,
                    x: Box::new(x),
                }),
                punct("*")
                    .ignore_then(unary)
                    .map(|x| Expr::Star(Box::new(x))),
                primary,
            ))
        })
        .boxed();
        let product = binary(
            unary,
            select! {
                Token::Punct("*") => BinOp::Mul,
                Token::Punct("/") => BinOp::Div,
                Token::Punct("%") => BinOp::Rem,
                Token::Punct("<<") => BinOp::Shl,
                Token::Punct(">>") => BinOp::Shr,
                Token::Punct("&") => BinOp::And,
                Token::Punct("&^") => BinOp::AndNot,
            },
        );
        let sum = binary(
            product,
            select! {
                Token::Punct("+") => BinOp::Add,
                Token::Punct("-") => BinOp::Sub,
                Token::Punct("|") => BinOp::Or,
                Token::Punct("^") => BinOp::Xor,
            },
        );
        let comparison = binary(
            sum,
            select! {
                Token::Punct("==") => BinOp::Eq,
                Token::Punct("!=") => BinOp::Ne,
                Token::Punct("<") => BinOp::Lt,
                Token::Punct("<=") => BinOp::Le,
                Token::Punct(">") => BinOp::Gt,
                Token::Punct(">=") => BinOp::Ge,
            },
        );
        let and = binary(comparison, select! { Token::Punct("&&") => BinOp::LAnd });
        let or = binary(and, select! { Token::Punct("||") => BinOp::LOr });
        expr.define(or);
    }

    let value_spec = ident()
        .separated_by(punct(","))
        .at_least(1)
        .collect::<Vec<_>>()
        .then(ty.clone().or_not())
        .then(punct("=").ignore_then(expr_list.clone()).or_not())
        .map(|((names, ty), values)| ValueSpec {
            names,
            ty,
            values: values.unwrap_or_default(),
        })
        .boxed();
    let var_decl = kw("var").ignore_then(group(value_spec.clone()));
    let const_decl = kw("const").ignore_then(group(value_spec));

    let stmt = {
        let assign_op = select! {
            Token::Punct("=") => AssignOp::Assign,
            Token::Punct(":=") => AssignOp::Define,
            Token::Punct("+=") => AssignOp::Op(BinOp::Add),
            Token::Punct("-=") => AssignOp::Op(BinOp::Sub),
            Token::Punct("*=") => AssignOp::Op(BinOp::Mul),
            Token::Punct("/=") => AssignOp::Op(BinOp::Div),
            Token::Punct("%=") => AssignOp::Op(BinOp::Rem),
            Token::Punct("&=") => AssignOp::Op(BinOp::And),
            Token::Punct("|=") => AssignOp::Op(BinOp::Or),
            Token::Punct("^=") => AssignOp::Op(BinOp::Xor),
            Token::Punct("<<=") => AssignOp::Op(BinOp::Shl),
            Token::Punct(">>=") => AssignOp::Op(BinOp::Shr),
            Token::Punct("&^=") => AssignOp::Op(BinOp::AndNot),
        };
        let simple = expr_list
            .clone()
            .then(
                choice((
                    assign_op
                        .then(expr_list.clone())
                        .map(|(op, rhs)| SimpleTail::Assign(op, rhs)),
                    punct("++").to(SimpleTail::Inc(true)),
                    punct("--").to(SimpleTail::Inc(false)),
                ))
                .or_not(),
            )
            .try_map(|(mut lhs, tail), span| match tail {
                Some(SimpleTail::Assign(op, rhs)) => Ok(Stmt::Assign { lhs, op, rhs }),
                Some(SimpleTail::Inc(inc)) if lhs.len() == 1 => Ok(Stmt::IncDec {
                    x: lhs.remove(0),
                    inc,
                }),
                None if lhs.len() == 1 => Ok(Stmt::Expr(lhs.remove(0))),
                _ => Err(Rich::custom(span, "expected assignment")),
            })
            .boxed();
        let init = simple.clone().then_ignore(punct(";")).or_not();

        let if_stmt = recursive(|if_stmt| {
            kw("if")
                .ignore_then(init.clone())
                .then(expr.clone())
                .then(block.clone())
                .then(
                    kw("else")
                        .ignore_then(choice((if_stmt, block.clone().map(Stmt::Block))))
                        .or_not(),
                )
                .map(|(((init, cond), body), els)| Stmt::If {
                    init: init.map(Box::new),
                    cond,
                    body,
                    els: els.map(Box::new),
                })
        });
        let for_range = kw("for")
            .ignore_then(
                expr_list
                    .clone()
                    .then(choice((punct("=").to(false), punct(":=").to(true))))
                    .or_not(),
            )
            .then_ignore(kw("range"))
            .then(expr.clone())
            .then(block.clone())
            .try_map(|((lhs, x), body), span| {
                let (lhs, define) = lhs.unwrap_or_default();
                if lhs.len() > 2 {
                    return Err(Rich::custom(span, "range permits at most two iteration variables"));
                }
                let mut lhs = lhs.into_iter();
                Ok(Stmt::Range {
                    key: lhs.next(),
                    value: lhs.next(),
                    define,
                    x,
                    body,
                })
            });
        let for_clause = kw("for")
            .ignore_then(simple.clone().or_not())
            .then_ignore(punct(";"))
            .then(expr.clone().or_not())
            .then_ignore(punct(";"))
            .then(simple.clone().or_not())
            .then(block.clone())
            .map(|(((init, cond), post), body)| Stmt::For {
                init: init.map(Box::new),
                cond,
                post: post.map(Box::new),
                body,
            });
        let for_cond = kw("for")
            .ignore_then(expr.clone().or_not())
            .then(block.clone())
            .map(|(cond, body)| Stmt::For {
                init: None,
                cond,
                post: None,
                body,
            });

        let stmt = recursive(|stmt| {
            let case_clause = choice((
                kw("case").ignore_then(expr_list.clone()).map(Some),
                kw("default").to(None),
            ))
            .then_ignore(punct(":"))
            .then(
                stmt.separated_by(semis())
                    .allow_leading()
                    .allow_trailing()
                    .collect::<Vec<_>>(),
            )
            .map(|(list, body)| CaseClause { list, body });
            let switch = kw("switch")
                .ignore_then(init.clone())
                .then(expr.clone().or_not())
                .then(
                    case_clause
                        .repeated()
                        .collect::<Vec<_>>()
                        .delimited_by(punct("{"), punct("}")),
                )
                .map(|((init, tag), clauses)| Stmt::Switch {
                    init: init.map(Box::new),
                    tag,
                    clauses,
                });
            choice((
                var_decl.clone().map(Stmt::Var),
                const_decl.clone().map(Stmt::Const),
                kw("return")
                    .ignore_then(expr_list.clone().or_not())
                    .map(|v| Stmt::Return(v.unwrap_or_default())),
                kw("break").to(Stmt::Break),
                kw("continue").to(Stmt::Continue),
                block.clone().map(Stmt::Block),
                if_stmt,
                for_range,
                for_clause,
                for_cond,
                switch,
                simple,
            ))
        });

        stmt.boxed()
    };

    block.define(
        stmt.separated_by(semis())
            .allow_leading()
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(punct("{"), punct("}"))
            .map(|stmts| Block { stmts }),
    );

    let import = ident()
        .or_not()
        .then(select! { Token::Str(s) => s })
        .map(|(alias, path)| Import { alias, path });
    let imports = kw("import")
        .ignore_then(group(import))
        .then_ignore(semis())
        .repeated()
        .collect::<Vec<_>>()
        .map(|groups| groups.into_iter().flatten().collect::<Vec<_>>());
    let package = kw("package").ignore_then(ident()).then_ignore(semis());

    let receiver = params(ty.clone()).try_map(|mut fields, span| {
        if fields.len() == 1 && fields[0].names.len() <= 1 {
            Ok(fields.remove(0))
        } else {
            Err(Rich::custom(span, "method has multiple receivers"))
        }
    });
    let func_decl = kw("func")
        .ignore_then(receiver.or_not())
        .then(ident())
        .then(signature(ty.clone()))
        .then(block.clone().or_not())
        .map(|(((recv, name), ty), body)| FuncDecl {
            name,
            recv,
            ty,
            body,
        });
    let type_spec = ident()
        .then_ignore(punct("=").or_not())
        .then(ty)
        .map(|(name, ty)| TypeSpec { name, ty });
    let decl = choice((
        func_decl.map(Decl::Func),
        var_decl.map(Decl::Var),
        const_decl.map(Decl::Const),
        kw("type").ignore_then(group(type_spec)).map(Decl::Type),
    ));

    punct(";")
        .repeated()
        .ignore_then(package)
        .then(imports)
        .then(
            decl.separated_by(semis())
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(end())
        .map(|((package, imports), decls)| File {
            package,
            imports,
            decls,
        })
}
