//! Lowers a typechecked AST into `IrProgram`: A-normal-form expressions,
//! explicit basic blocks, and short-circuit lowering of `and`/`or` into
//! control flow (`lower_pred`).

use std::collections::HashMap;

use crate::arena::Arena;
use crate::ast::{BinOp, Decl, Expr, ExprType, FunDecl, Literal, Program, Stmt, UnOp};
use crate::ir::{Atom, IrBinOp, IrBlock, IrCmp, IrExpr, IrFun, IrParam, IrProgram, IrStmt, IrTail, IrUnOp};
use crate::scope::ScopeTable;

pub fn lower_program(program: &Program) -> IrProgram {
    let arena = Arena::new();
    let mut builder = IrBuilder::new(&arena, program);
    let funs = program
        .funs
        .iter()
        .map(|fun| builder.translate_fun(fun))
        .collect();
    IrProgram { funs }
}

struct IrBuilder<'a> {
    /// Source function name -> IR function label. Function labels equal
    /// the source name, but the table is kept as its own piece of state
    /// (rather than read straight off the AST at call sites) to mirror
    /// the rest of the lowering's name-resolution pattern.
    fn_labels: HashMap<String, String>,
    vars: ScopeTable<'a, String>,
    current_fun: String,
    label_counter: usize,
    var_counter: usize,
    current: IrBlock,
    finished: Vec<IrBlock>,
}

impl<'a> IrBuilder<'a> {
    fn new(arena: &'a Arena, program: &Program) -> Self {
        let fn_labels = program
            .funs
            .iter()
            .map(|f| (f.name.clone(), f.name.clone()))
            .collect();
        IrBuilder {
            fn_labels,
            vars: ScopeTable::new(arena),
            current_fun: String::new(),
            label_counter: 0,
            var_counter: 0,
            current: IrBlock::new(String::new()),
            finished: Vec::new(),
        }
    }

    fn fresh_label(&mut self) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!("{}_lab_{}", self.current_fun, n)
    }

    fn fresh_var(&mut self) -> String {
        let n = self.var_counter;
        self.var_counter += 1;
        format!("{}_var_{}", self.current_fun, n)
    }

    fn emit_stmt(&mut self, stmt: IrStmt) {
        self.current.stmts.push(stmt);
    }

    /// Set the current block's tail unless it already has one — a block
    /// that already terminated (e.g. a `then` branch ending in `return`)
    /// must not be overwritten by the caller's fallthrough `Goto`; at
    /// most one tail per block (testable property 2a).
    fn terminate(&mut self, tail: IrTail) {
        if self.current.tail.is_none() {
            self.current.tail = Some(tail);
        }
    }

    fn start_block(&mut self, label: String) {
        let finished = std::mem::replace(&mut self.current, IrBlock::new(label));
        self.finished.push(finished);
    }

    fn translate_fun(&mut self, fun: &FunDecl) -> IrFun {
        self.current_fun = fun.name.clone();
        self.label_counter = 0;
        self.var_counter = 0;
        self.finished.clear();

        let entry_label = self.fresh_label();
        self.current = IrBlock::new(entry_label);

        self.vars.push_scope();
        let mut params = Vec::new();
        for p in &fun.params {
            let label = self.fresh_var();
            self.vars
                .declare(&p.name, label.clone())
                .expect("typechecked: parameters have no duplicate names");
            params.push(IrParam { label, ty: p.ty });
        }

        for decl in &fun.body {
            self.translate_decl(decl);
        }
        self.vars.pop_scope();

        let last = std::mem::replace(&mut self.current, IrBlock::new(String::new()));
        self.finished.push(last);

        IrFun {
            label: fun.name.clone(),
            ret_ty: fun.ret_ty,
            params,
            blocks: std::mem::take(&mut self.finished),
        }
    }

    fn translate_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Var {
                ty: _, name, init, ..
            } => {
                let label = self.fresh_var();
                let ir_init = init.as_ref().map(|e| self.translate_expr(e));
                let value_ty = init.as_ref().and_then(|e| e.ty()).unwrap_or(ExprType::Int);
                self.emit_stmt(IrStmt::Decl {
                    label: label.clone(),
                    ty: value_ty,
                    init: ir_init,
                });
                self.vars
                    .declare(name, label)
                    .expect("typechecked: no redefinition within a scope");
            }
            Decl::Stmt(stmt) => self.translate_stmt(stmt),
        }
    }

    fn translate_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                let ir = self.translate_expr(e);
                self.emit_stmt(IrStmt::ExprStmt(ir));
            }
            Stmt::Print { expr, .. } => {
                let atom = self.atomize_expr(expr);
                self.emit_stmt(IrStmt::Print(atom));
            }
            Stmt::Return { expr, .. } => {
                let atom = expr.as_ref().map(|e| self.atomize_expr(e));
                self.terminate(IrTail::Ret(atom));
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let then_label = self.fresh_label();
                let else_label = self.fresh_label();
                let cont_label = self.fresh_label();

                self.lower_pred(cond, &then_label, &else_label);

                self.start_block(then_label);
                self.translate_stmt(then_branch);
                self.terminate(IrTail::Goto(cont_label.clone()));

                self.start_block(else_label);
                if let Some(else_b) = else_branch {
                    self.translate_stmt(else_b);
                }
                self.terminate(IrTail::Goto(cont_label.clone()));

                self.start_block(cont_label);
            }
            Stmt::While { cond, body, .. } => {
                let loop_start = self.fresh_label();
                let loop_body = self.fresh_label();
                let cont = self.fresh_label();

                self.terminate(IrTail::Goto(loop_start.clone()));

                self.start_block(loop_start.clone());
                self.lower_pred(cond, &loop_body, &cont);

                self.start_block(loop_body);
                self.translate_stmt(body);
                self.terminate(IrTail::Goto(loop_start));

                self.start_block(cont);
            }
            Stmt::Block(decls) => {
                self.vars.push_scope();
                for d in decls {
                    self.translate_decl(d);
                }
                self.vars.pop_scope();
            }
        }
    }

    /// Translate a boolean expression into control flow: on success jump
    /// to `success`, on failure jump to `fail`. `and`/`or` never survive
    /// into `IrExpr` — they are flattened entirely here.
    fn lower_pred(&mut self, expr: &Expr, success: &str, fail: &str) {
        match expr {
            Expr::Binary {
                op: BinOp::And,
                left,
                right,
                ..
            } => {
                let mid = self.fresh_label();
                self.lower_pred(left, &mid, fail);
                self.start_block(mid);
                self.lower_pred(right, success, fail);
            }
            Expr::Binary {
                op: BinOp::Or,
                left,
                right,
                ..
            } => {
                let mid = self.fresh_label();
                self.lower_pred(left, success, &mid);
                self.start_block(mid);
                self.lower_pred(right, success, fail);
            }
            _ => {
                let atom = self.atomize_expr(expr);
                self.terminate(IrTail::If {
                    atom,
                    then_label: success.to_string(),
                    else_label: fail.to_string(),
                });
            }
        }
    }

    /// Materialize a boolean expression as a 0/1-valued temporary, for the
    /// (rare, but grammatically legal) case where `and`/`or` appears
    /// somewhere other than directly as an `if`/`while` condition — e.g.
    /// `print(a and b)` or `!(a and b)`. Generalizes `lower_pred` by
    /// joining both outcomes into a single variable before continuing.
    fn materialize_pred(&mut self, expr: &Expr) -> Atom {
        let temp = self.fresh_var();
        self.emit_stmt(IrStmt::Decl {
            label: temp.clone(),
            ty: ExprType::Bool,
            init: None,
        });

        let true_label = self.fresh_label();
        let false_label = self.fresh_label();
        let join_label = self.fresh_label();

        self.lower_pred(expr, &true_label, &false_label);

        self.start_block(true_label);
        self.emit_stmt(IrStmt::ExprStmt(IrExpr::Assign {
            target: temp.clone(),
            value: Box::new(IrExpr::AtomE(Atom::Int(1))),
        }));
        self.terminate(IrTail::Goto(join_label.clone()));

        self.start_block(false_label);
        self.emit_stmt(IrStmt::ExprStmt(IrExpr::Assign {
            target: temp.clone(),
            value: Box::new(IrExpr::AtomE(Atom::Int(0))),
        }));
        self.terminate(IrTail::Goto(join_label.clone()));

        self.start_block(join_label);
        Atom::Name(temp)
    }

    fn translate_expr(&mut self, expr: &Expr) -> IrExpr {
        if matches!(
            expr,
            Expr::Binary {
                op: BinOp::And | BinOp::Or,
                ..
            }
        ) {
            return IrExpr::AtomE(self.materialize_pred(expr));
        }

        match expr {
            Expr::Literal {
                lit: Literal::Int(v),
                ..
            } => IrExpr::AtomE(Atom::Int(*v)),
            Expr::Literal {
                lit: Literal::Ident(name),
                ..
            } => {
                let label = self
                    .vars
                    .lookup(name)
                    .expect("typechecked: every identifier resolves to a binding");
                IrExpr::AtomE(Atom::Name(label))
            }
            Expr::Grouping { inner, .. } => self.translate_expr(inner),
            Expr::Unary { op, operand, .. } => {
                let arg = self.atomize_expr(operand);
                let ir_op = match op {
                    UnOp::Neg => IrUnOp::Neg,
                    UnOp::Not => IrUnOp::Not,
                };
                IrExpr::Unary { op: ir_op, arg }
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let lhs = self.atomize_expr(left);
                let rhs = self.atomize_expr(right);
                match bin_op_kind(*op) {
                    BinOpKind::Arith(iop) => IrExpr::Bin { op: iop, lhs, rhs },
                    BinOpKind::Cmp(icmp) => IrExpr::Cmp {
                        cmp: icmp,
                        lhs,
                        rhs,
                    },
                }
            }
            Expr::Call { callee, args, .. } => {
                let arg_atoms: Vec<Atom> = args.iter().map(|a| self.atomize_expr(a)).collect();
                let label = self
                    .fn_labels
                    .get(callee)
                    .cloned()
                    .unwrap_or_else(|| callee.clone());
                IrExpr::Call {
                    callee: label,
                    args: arg_atoms,
                }
            }
            Expr::Assign { target, value, .. } => {
                let ir_value = self.translate_expr(value);
                let label = self
                    .vars
                    .lookup(target)
                    .expect("typechecked: assignment target resolves to a binding");
                IrExpr::Assign {
                    target: label,
                    value: Box::new(ir_value),
                }
            }
        }
    }

    /// Atomize `expr`: if its translation is already an `Atom`, return it
    /// directly; otherwise hoist it into a fresh temporary declaration in
    /// the current block and return a reference to that temporary.
    fn atomize_expr(&mut self, expr: &Expr) -> Atom {
        let ir = self.translate_expr(expr);
        if let IrExpr::AtomE(a) = ir {
            a
        } else {
            let ty = expr.ty().expect("typechecked: expr has an inferred type");
            let temp = self.fresh_var();
            self.emit_stmt(IrStmt::Decl {
                label: temp.clone(),
                ty,
                init: Some(ir),
            });
            Atom::Name(temp)
        }
    }
}

enum BinOpKind {
    Arith(IrBinOp),
    Cmp(IrCmp),
}

fn bin_op_kind(op: BinOp) -> BinOpKind {
    match op {
        BinOp::Add => BinOpKind::Arith(IrBinOp::Add),
        BinOp::Sub => BinOpKind::Arith(IrBinOp::Sub),
        BinOp::Mul => BinOpKind::Arith(IrBinOp::Mul),
        BinOp::Div => BinOpKind::Arith(IrBinOp::Div),
        BinOp::Eq => BinOpKind::Cmp(IrCmp::Eq),
        BinOp::Ne => BinOpKind::Cmp(IrCmp::Ne),
        BinOp::Lt => BinOpKind::Cmp(IrCmp::Lt),
        BinOp::Le => BinOpKind::Cmp(IrCmp::Le),
        BinOp::Gt => BinOpKind::Cmp(IrCmp::Gt),
        BinOp::Ge => BinOpKind::Cmp(IrCmp::Ge),
        BinOp::And | BinOp::Or => unreachable!("and/or are handled by lower_pred"),
    }
}
