use crate::language::span::{Span, Spanned};
use crate::runtime::resolver::Resolved;
use crate::runtime::value::RuntimeType;
use once_cell::unsync::OnceCell;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Write-once memo filled in the first time a node runs. Resolution is a
/// function of the operand shapes seen on that first visit; later visits
/// replay the cached decision without consulting the host type system.
#[derive(Clone, Debug, Default)]
pub struct ResolutionCache {
    pub ty: OnceCell<RuntimeType>,
    pub binding: OnceCell<Resolved>,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
    pub cache: ResolutionCache,
}

impl Expr {
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Literal(_) => "literal",
            ExprKind::Identifier(_) => "identifier",
            ExprKind::Unary { .. } => "unary expression",
            ExprKind::IncDec { .. } => "increment expression",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Logical { .. } => "logical expression",
            ExprKind::Ternary { .. } => "conditional expression",
            ExprKind::NullCoalesce { .. } => "null-coalescing expression",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::Call { .. } => "call",
            ExprKind::Index { .. } => "index expression",
            ExprKind::Member { .. } => "member access",
            ExprKind::ArrayLiteral(_) => "array literal",
            ExprKind::ObjectLiteral(_) => "object literal",
        }
    }
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(Rc<str>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    IncDec {
        op: IncDecOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    NullCoalesce {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        target: Box<Expr>,
        name: Rc<str>,
    },
    ArrayLiteral(Vec<Expr>),
    ObjectLiteral(Vec<(Rc<str>, Expr)>),
}

#[derive(Clone, Debug)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncDecOp {
    Increment,
    Decrement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            StmtKind::Expr(_) => "expression statement",
            StmtKind::Declare { .. } => "variable declaration",
            StmtKind::Block(_) => "block",
            StmtKind::If { .. } => "if statement",
            StmtKind::While { check_after: false, .. } => "while loop",
            StmtKind::While { check_after: true, .. } => "do-while loop",
            StmtKind::For { .. } => "for loop",
            StmtKind::Return(_) => "return statement",
            StmtKind::Throw(_) => "throw statement",
            StmtKind::Break => "break statement",
            StmtKind::Continue => "continue statement",
        }
    }
}

impl Spanned for Stmt {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Expr(Expr),
    Declare {
        name: Rc<str>,
        init: Option<Expr>,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        /// Condition checked after the body (`do { .. } while (..)`).
        check_after: bool,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Break,
    Continue,
}

/// Constructor surface the external parser targets. Hands out sequential
/// node ids so error traces can name the nodes they passed through.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: Cell<u32>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    pub fn expr(&self, kind: ExprKind) -> Expr {
        Expr {
            id: self.next(),
            span: Span::default(),
            kind,
            cache: ResolutionCache::default(),
        }
    }

    pub fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.next(),
            span: Span::default(),
            kind,
        }
    }

    pub fn null(&self) -> Expr {
        self.expr(ExprKind::Literal(Literal::Null))
    }

    pub fn bool_lit(&self, value: bool) -> Expr {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn int(&self, value: i64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int(value)))
    }

    pub fn float(&self, value: f64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Float(value)))
    }

    pub fn str_lit(&self, value: &str) -> Expr {
        self.expr(ExprKind::Literal(Literal::Str(value.into())))
    }

    pub fn ident(&self, name: &str) -> Expr {
        self.expr(ExprKind::Identifier(name.into()))
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn inc_dec(&self, op: IncDecOp, prefix: bool, target: Expr) -> Expr {
        self.expr(ExprKind::IncDec {
            op,
            prefix,
            target: Box::new(target),
        })
    }

    pub fn binary(&self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn logical(&self, op: LogicalOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn ternary(&self, condition: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
        self.expr(ExprKind::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    pub fn coalesce(&self, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::NullCoalesce {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn assign(&self, target: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn call(&self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn index(&self, target: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Index {
            target: Box::new(target),
            args,
        })
    }

    pub fn member(&self, target: Expr, name: &str) -> Expr {
        self.expr(ExprKind::Member {
            target: Box::new(target),
            name: name.into(),
        })
    }

    pub fn array(&self, items: Vec<Expr>) -> Expr {
        self.expr(ExprKind::ArrayLiteral(items))
    }

    pub fn object(&self, entries: Vec<(&str, Expr)>) -> Expr {
        self.expr(ExprKind::ObjectLiteral(
            entries
                .into_iter()
                .map(|(name, value)| (Rc::from(name), value))
                .collect(),
        ))
    }

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn declare(&self, name: &str, init: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Declare {
            name: name.into(),
            init,
        })
    }

    pub fn block(&self, stmts: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(stmts))
    }

    pub fn if_stmt(&self, condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_stmt(&self, condition: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While {
            condition,
            body: Box::new(body),
            check_after: false,
        })
    }

    pub fn do_while(&self, body: Stmt, condition: Expr) -> Stmt {
        self.stmt(StmtKind::While {
            condition,
            body: Box::new(body),
            check_after: true,
        })
    }

    pub fn for_stmt(
        &self,
        init: Option<Stmt>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Stmt,
    ) -> Stmt {
        self.stmt(StmtKind::For {
            init: init.map(Box::new),
            condition,
            step,
            body: Box::new(body),
        })
    }

    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(value))
    }

    pub fn throw(&self, value: Expr) -> Stmt {
        self.stmt(StmtKind::Throw(value))
    }

    pub fn brk(&self) -> Stmt {
        self.stmt(StmtKind::Break)
    }

    pub fn cont(&self) -> Stmt {
        self.stmt(StmtKind::Continue)
    }
}
