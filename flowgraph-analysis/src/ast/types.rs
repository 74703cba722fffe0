//! Syntax tree node types — uniform `Stmt`/`Expr` wrappers over closed
//! kind enums.

use serde::{Deserialize, Serialize};

use flowgraph_core::types::Span;

/// Identity of a syntax node within one compilation unit.
///
/// Scope and frame trees key their children by these ids so the two
/// analysis passes walk the same structure without re-deriving it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u32);

/// Monotonic id source, one per compilation unit.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// A (possibly generic, possibly array) type reference as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeName {
    pub name: String,
    #[serde(default)]
    pub args: Vec<TypeName>,
    /// Array dimensions stacked on top of the base type.
    #[serde(default)]
    pub dims: u32,
}

impl TypeName {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            dims: 0,
        }
    }

    pub fn array(mut self, dims: u32) -> Self {
        self.dims += dims;
        self
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        for _ in 0..self.dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// One parsed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub package: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    pub types: Vec<TypeDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
}

/// A class, interface, or enum declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    pub superclass: Option<TypeName>,
    #[serde(default)]
    pub interfaces: Vec<TypeName>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub nested: Vec<TypeDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeName,
    pub is_static: bool,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeName,
    /// True on a trailing `Type... name` parameter.
    #[serde(default)]
    pub varargs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub id: NodeId,
    pub name: String,
    pub is_constructor: bool,
    pub is_static: bool,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    /// `None` for constructors.
    pub return_type: Option<TypeName>,
    #[serde(default)]
    pub throws: Vec<TypeName>,
    /// `None` for abstract/interface prototypes.
    pub body: Option<Stmt>,
    pub span: Span,
}

/// A statement with identity and source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    Empty,
    LocalDecl {
        ty: TypeName,
        decls: Vec<(String, Option<Expr>)>,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    Switch {
        value: Expr,
        cases: Vec<SwitchCase>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Do {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        var_ty: TypeName,
        var_name: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Synchronized {
        lock: Expr,
        body: Box<Stmt>,
    },
    Try {
        resources: Vec<Stmt>,
        body: Box<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Box<Stmt>>,
    },
    Throw(Expr),
    Assert {
        cond: Expr,
        message: Option<Expr>,
    },
    /// `this(args)` constructor delegation.
    ThisCall(Vec<Expr>),
    /// `super(args)` constructor delegation.
    SuperCall(Vec<Expr>),
    /// A construct outside the modeled set; the raw grammar kind.
    Unsupported(String),
}

impl StmtKind {
    pub fn kind(&self) -> &str {
        match self {
            Self::Block(_) => "block",
            Self::Empty => "empty",
            Self::LocalDecl { .. } => "local_decl",
            Self::Expr(_) => "expr_stmt",
            Self::If { .. } => "if",
            Self::Switch { .. } => "switch",
            Self::While { .. } => "while",
            Self::Do { .. } => "do",
            Self::For { .. } => "for",
            Self::ForEach { .. } => "for_each",
            Self::Return(_) => "return",
            Self::Break(_) => "break",
            Self::Continue(_) => "continue",
            Self::Labeled { .. } => "labeled",
            Self::Synchronized { .. } => "synchronized",
            Self::Try { .. } => "try",
            Self::Throw(_) => "throw",
            Self::Assert { .. } => "assert",
            Self::ThisCall(_) => "this_call",
            Self::SuperCall(_) => "super_call",
            Self::Unsupported(kind) => kind,
        }
    }
}

/// One `case`/`default` group of a switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub id: NodeId,
    pub span: Span,
    /// Match expressions; `None` is the `default` label.
    pub labels: Vec<Option<Expr>>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub id: NodeId,
    pub span: Span,
    pub ty: TypeName,
    pub name: String,
    pub body: Stmt,
}

/// An expression with identity and source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralKind {
    Bool,
    Char,
    Int,
    Float,
    Str,
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Literal with its raw textual form preserved.
    Literal {
        kind: LiteralKind,
        text: String,
    },
    Name(String),
    This,
    Super,
    /// `A.class`
    TypeLit(TypeName),
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
        prefix: bool,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Paren(Box<Expr>),
    /// `target = value`, or compound when `op` is `Some` (`+=` carries "+").
    Assign {
        op: Option<String>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    MethodCall {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },
    New {
        ty: TypeName,
        args: Vec<Expr>,
    },
    ArrayNew {
        elem_ty: TypeName,
        dims: Vec<Expr>,
        init: Option<Box<Expr>>,
    },
    ArrayInit(Vec<Expr>),
    Cast {
        ty: TypeName,
        value: Box<Expr>,
    },
    InstanceOf {
        value: Box<Expr>,
        ty: TypeName,
    },
    Ternary {
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: LambdaBody,
    },
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Box<Stmt>),
}

impl ExprKind {
    pub fn kind(&self) -> &str {
        match self {
            Self::Literal { .. } => "literal",
            Self::Name(_) => "name",
            Self::This => "this",
            Self::Super => "super",
            Self::TypeLit(_) => "type_literal",
            Self::FieldAccess { .. } => "field_access",
            Self::ArrayAccess { .. } => "array_access",
            Self::Unary { .. } => "unary",
            Self::Binary { .. } => "binary",
            Self::Paren(_) => "paren",
            Self::Assign { .. } => "assign",
            Self::MethodCall { .. } => "method_call",
            Self::New { .. } => "new",
            Self::ArrayNew { .. } => "array_new",
            Self::ArrayInit(_) => "array_init",
            Self::Cast { .. } => "cast",
            Self::InstanceOf { .. } => "instanceof",
            Self::Ternary { .. } => "ternary",
            Self::Lambda { .. } => "lambda",
            Self::Unsupported(kind) => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_display() {
        let ty = TypeName {
            name: "Map".into(),
            args: vec![TypeName::simple("String"), TypeName::simple("Integer")],
            dims: 1,
        };
        assert_eq!(ty.to_string(), "Map<String,Integer>[]");
    }

    #[test]
    fn test_id_gen_is_monotonic() {
        let mut gen = NodeIdGen::new();
        let a = gen.fresh();
        let b = gen.fresh();
        assert!(a < b);
    }
}
