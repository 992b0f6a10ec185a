//! Three-address IR: functions as lists of labeled basic blocks holding
//! atomized statements and a single block-terminating tail.

use crate::ast::{ExprType, Type};

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Int(i64),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrBinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrCmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrUnOp {
    Neg,
    Not,
}

/// Except for `Assign`'s value, every sub-expression here is an `Atom`
/// (the A-normal-form invariant) — see `ir_builder::atomize_expr`.
#[derive(Debug, Clone, PartialEq)]
pub enum IrExpr {
    Bin { op: IrBinOp, lhs: Atom, rhs: Atom },
    Cmp { cmp: IrCmp, lhs: Atom, rhs: Atom },
    Unary { op: IrUnOp, arg: Atom },
    AtomE(Atom),
    Call { callee: String, args: Vec<Atom> },
    Assign { target: String, value: Box<IrExpr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrStmt {
    Decl {
        label: String,
        ty: ExprType,
        init: Option<IrExpr>,
    },
    ExprStmt(IrExpr),
    Print(Atom),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrTail {
    Goto(String),
    Ret(Option<Atom>),
    If {
        atom: Atom,
        then_label: String,
        else_label: String,
    },
}

#[derive(Debug, Clone)]
pub struct IrBlock {
    pub label: String,
    pub stmts: Vec<IrStmt>,
    pub tail: Option<IrTail>,
}

impl IrBlock {
    pub fn new(label: impl Into<String>) -> Self {
        IrBlock {
            label: label.into(),
            stmts: Vec::new(),
            tail: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IrParam {
    pub label: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct IrFun {
    pub label: String,
    pub ret_ty: Type,
    pub params: Vec<IrParam>,
    pub blocks: Vec<IrBlock>,
}

#[derive(Debug, Clone, Default)]
pub struct IrProgram {
    pub funs: Vec<IrFun>,
}
