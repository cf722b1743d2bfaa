//! The AST shapes this back end consumes (§6 "AST input").
//!
//! Lexing and parsing are out of scope; these types exist so the
//! lowering pass in [`super::lower`] is independently testable without
//! a real front end, the same role the textual IR parser plays for
//! `cranelift-codegen`'s own unit tests. Nothing here does anything —
//! it's plain data produced by a parser this crate does not implement.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageClass {
    Typedef,
    Extern,
    Static,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSpecifier {
    Void,
    Char,
    Int,
    Long,
    /// A previously-`typedef`'d name.
    TypedefName(String),
    Struct(String),
}

#[derive(Clone, Debug, Default)]
pub struct DeclSpecifiers {
    pub storage_class: Option<StorageClass>,
    pub type_specifiers: Vec<TypeSpecifier>,
}

/// A declarator, read outside-in from the identifier: `resolve_declarator`
/// (in [`super::lower`]) applies whichever node is outermost to the base
/// type first, then recurses toward the identifier. `int *f(int)` —
/// "`f` is a function taking `int` returning `int *`" — is therefore
/// `Pointer(Function(Identifier("f"), [int], false))`: the `Pointer` is
/// outermost because it applies to the function's *return* type, not to
/// `f` itself.
#[derive(Clone, Debug)]
pub enum Declarator {
    Identifier(String),
    Pointer(Box<Declarator>),
    Array(Box<Declarator>, Option<u64>),
    Function(Box<Declarator>, Vec<ParamDecl>, bool /* variadic */),
}

impl Declarator {
    pub fn name(&self) -> &str {
        match self {
            Declarator::Identifier(name) => name,
            Declarator::Pointer(inner)
            | Declarator::Array(inner, _)
            | Declarator::Function(inner, _, _) => inner.name(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParamDecl {
    pub specifiers: DeclSpecifiers,
    pub declarator: Option<Declarator>,
}

#[derive(Clone, Debug)]
pub struct Decl {
    pub specifiers: DeclSpecifiers,
    pub declarator: Declarator,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug)]
pub struct StructMember {
    pub specifiers: DeclSpecifiers,
    pub declarator: Declarator,
}

#[derive(Clone, Debug)]
pub enum TopLevelItem {
    FunctionDef {
        specifiers: DeclSpecifiers,
        declarator: Declarator,
        body: Stmt,
    },
    FunctionDecl {
        specifiers: DeclSpecifiers,
        declarator: Declarator,
    },
    VarDecl(Decl),
    Typedef(Decl),
    StructDef { tag: String, members: Vec<StructMember> },
}

#[derive(Clone, Debug)]
pub enum BlockItem {
    Decl(Decl),
    Stmt(Stmt),
}

#[derive(Clone, Debug)]
pub enum ForInit {
    Decl(Decl),
    Expr(Expr),
    None,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Compound(Vec<BlockItem>),
    Expr(Expr),
    Empty,
    Return(Option<Expr>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    For(ForInit, Option<Expr>, Option<Expr>, Box<Stmt>),
    Break,
    Continue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogAnd,
    LogOr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    AddrOf,
    Deref,
    Plus,
    Neg,
    BitNot,
    LogNot,
    PreInc,
    PreDec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostOp {
    Inc,
    Dec,
}

#[derive(Clone, Debug)]
pub enum Expr {
    IntLiteral(u64),
    Ident(String),
    Field(Box<Expr>, String),
    Arrow(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    PostIncDec(PostOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Plain `=` (op is `None`) or a compound assignment like `+=`
    /// (op is `Some(BinOp::Add)`).
    Assign(Option<BinOp>, Box<Expr>, Box<Expr>),
    Comma(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}
