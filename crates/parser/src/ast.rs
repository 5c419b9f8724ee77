//! Declaration trees for the supported Go subset.
//!
//! Types are expressions, as in Go's own `go/ast`: a parameter's type, a
//! conversion's callee and `new`'s argument all use [`Expr`].

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct File {
    /// Name from the package clause.
    pub package: String,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    pub alias: Option<String>,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decl {
    Func(FuncDecl),
    Var(Vec<ValueSpec>),
    Const(Vec<ValueSpec>),
    Type(Vec<TypeSpec>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub recv: Option<Field>,
    pub ty: FuncType,
    pub body: Option<Block>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FuncType {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

/// A parameter, result, struct field or interface method. `names` is empty
/// for unnamed parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub names: Vec<String>,
    pub ty: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueSpec {
    pub names: Vec<String>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSpec {
    pub name: String,
    pub ty: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    IncDec {
        x: Expr,
        inc: bool,
    },
    Var(Vec<ValueSpec>),
    Const(Vec<ValueSpec>),
    Return(Vec<Expr>),
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: Block,
        els: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        x: Expr,
        body: Block,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
    },
    Break,
    Continue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseClause {
    /// `None` for `default`.
    pub list: Option<Vec<Expr>>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Define,
    Op(BinOp),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lit {
    Int(String),
    Float(String),
    /// Decoded contents, without quotes.
    Str(String),
    Char(char),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    Lit(Lit),
    Binary {
        op: BinOp,
        x: Box<Expr>,
        y: Box<Expr>,
    },
    Unary {
        op: UnOp,
        x: Box<Expr>,
    },
    Paren(Box<Expr>),
    Call {
        fun: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: bool,
    },
    Selector {
        x: Box<Expr>,
        sel: String,
    },
    Index {
        x: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
    },
    /// Pointer type or dereference.
    Star(Box<Expr>),
    CompositeLit {
        ty: Box<Expr>,
        elts: Vec<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    FuncLit {
        ty: FuncType,
        body: Block,
    },
    /// `x.(T)`; `ty` is `None` for `x.(type)`.
    TypeAssert {
        x: Box<Expr>,
        ty: Option<Box<Expr>>,
    },
    ArrayType {
        len: Option<Box<Expr>>,
        elt: Box<Expr>,
    },
    MapType {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    StructType(Vec<Field>),
    InterfaceType(Vec<Field>),
    FuncType(FuncType),
    Ellipsis(Option<Box<Expr>>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Addr,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        use BinOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
            And => "&",
            Or => "|",
            Xor => "^",
            Shl => "<<",
            Shr => ">>",
            AndNot => "&^",
            LAnd => "&&",
            LOr => "||",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
        }
    }

    pub fn precedence(self) -> u8 {
        use BinOp::*;
        match self {
            Mul | Div | Rem | Shl | Shr | And | AndNot => 5,
            Add | Sub | Or | Xor => 4,
            Eq | Ne | Lt | Le | Gt | Ge => 3,
            LAnd => 2,
            LOr => 1,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 3
    }
}

impl UnOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Plus => "+",
            UnOp::Not => "!",
            UnOp::BitNot => "^",
            UnOp::Addr => "&",
        }
    }
}

impl Decl {
    /// Names this declaration binds at package level.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Decl::Func(f) => vec![f.name.as_str()],
            Decl::Var(specs) | Decl::Const(specs) => specs
                .iter()
                .flat_map(|s| s.names.iter().map(String::as_str))
                .collect(),
            Decl::Type(specs) => specs.iter().map(|s| s.name.as_str()).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Decl::Func(f) if f.recv.is_some() => "method",
            Decl::Func(_) => "function",
            Decl::Var(_) => "var declaration",
            Decl::Const(_) => "const declaration",
            Decl::Type(_) => "type declaration",
        }
    }
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    /// Node kind used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Ident(_) => "identifier",
            Expr::Lit(Lit::Int(_)) => "integer literal",
            Expr::Lit(Lit::Float(_)) => "float literal",
            Expr::Lit(Lit::Str(_)) => "string literal",
            Expr::Lit(Lit::Char(_)) => "rune literal",
            Expr::Binary { .. } => "binary expression",
            Expr::Unary { .. } => "unary expression",
            Expr::Paren(_) => "parenthesized expression",
            Expr::Call { .. } => "call expression",
            Expr::Selector { .. } => "selector expression",
            Expr::Index { .. } => "index expression",
            Expr::Slice { .. } => "slice expression",
            Expr::Star(_) => "star expression",
            Expr::CompositeLit { .. } => "composite literal",
            Expr::KeyValue { .. } => "key-value expression",
            Expr::FuncLit { .. } => "function literal",
            Expr::TypeAssert { .. } => "type assertion",
            Expr::ArrayType { .. } => "array type",
            Expr::MapType { .. } => "map type",
            Expr::StructType(_) => "struct type",
            Expr::InterfaceType(_) => "interface type",
            Expr::FuncType(_) => "function type",
            Expr::Ellipsis(_) => "ellipsis",
        }
    }
}

impl Stmt {
    pub fn kind(&self) -> &'static str {
        match self {
            Stmt::Expr(_) => "expression statement",
            Stmt::Assign { .. } => "assignment",
            Stmt::IncDec { .. } => "inc/dec statement",
            Stmt::Var(_) => "var declaration",
            Stmt::Const(_) => "const declaration",
            Stmt::Return(_) => "return statement",
            Stmt::Block(_) => "block",
            Stmt::If { .. } => "if statement",
            Stmt::For { .. } => "for statement",
            Stmt::Range { .. } => "range statement",
            Stmt::Switch { .. } => "switch statement",
            Stmt::Break => "break statement",
            Stmt::Continue => "continue statement",
        }
    }
}
