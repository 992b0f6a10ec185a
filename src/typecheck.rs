//! Two-environment typechecker: value bindings and function signatures,
//! each a `ScopeTable` over the same arena.

use crate::arena::Arena;
use crate::ast::{BinOp, Decl, Expr, ExprType, FunDecl, Literal, Program, Stmt, Type, UnOp};
use crate::error::{CompileError, DiagKind, Diagnostic};
use crate::scope::ScopeTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunSig {
    pub ret_ty: Type,
    pub params: Vec<Type>,
}

pub struct TypeChecker<'a> {
    functions: ScopeTable<'a, FunSig>,
    values: ScopeTable<'a, Type>,
    has_error: bool,
    diagnostics: Vec<Diagnostic>,
    current_ret_ty: Type,
}

impl<'a> TypeChecker<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        let mut functions = ScopeTable::new(arena);
        functions.push_scope();
        let mut values = ScopeTable::new(arena);
        values.push_scope();
        TypeChecker {
            functions,
            values,
            has_error: false,
            diagnostics: Vec::new(),
            current_ret_ty: Type::Void,
        }
    }

    pub fn check(&mut self, program: &mut Program) -> Result<(), CompileError> {
        let mut redefined = std::collections::HashSet::new();
        for fun in &program.funs {
            let sig = FunSig {
                ret_ty: fun.ret_ty,
                params: fun.params.iter().map(|p| p.ty).collect(),
            };
            if self.functions.declare(&fun.name, sig).is_err() {
                self.error(fun.line, format!("{} defined multiple times", fun.name));
                redefined.insert(fun.name.clone());
            }
        }
        self.check_main(program);
        for fun in &mut program.funs {
            if redefined.contains(&fun.name) {
                continue;
            }
            self.check_fun(fun);
        }
        if self.has_error {
            Err(CompileError::new(self.diagnostics.clone()))
        } else {
            Ok(())
        }
    }

    fn check_main(&mut self, program: &Program) {
        match program.funs.iter().find(|f| f.name == "main") {
            Some(fun) => {
                if fun.ret_ty != Type::Void {
                    self.error(fun.line, "'main' must return void");
                }
                if !fun.params.is_empty() {
                    self.error(fun.line, "'main' must take zero parameters");
                }
            }
            None => self.error_no_line("program has no 'main' function"),
        }
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.has_error = true;
        self.diagnostics
            .push(Diagnostic::new(DiagKind::Type, line, message));
    }

    fn error_no_line(&mut self, message: impl Into<String>) {
        self.has_error = true;
        self.diagnostics
            .push(Diagnostic::without_line(DiagKind::Type, message));
    }

    fn check_fun(&mut self, fun: &mut FunDecl) {
        self.current_ret_ty = fun.ret_ty;
        self.values.push_scope();
        for p in &fun.params {
            if p.ty == Type::Void {
                self.error(p.line, format!("parameter '{}' cannot have type void", p.name));
            }
            if self.values.declare(&p.name, p.ty).is_err() {
                self.error(p.line, format!("{} defined multiple times", p.name));
            }
        }
        for decl in &mut fun.body {
            self.check_decl(decl);
        }
        if fun.ret_ty != Type::Void && !block_definitely_returns(&fun.body) {
            self.error(
                fun.line,
                format!("function '{}' does not return on all paths", fun.name),
            );
        }
        self.values.pop_scope();
    }

    fn check_decl(&mut self, decl: &mut Decl) {
        match decl {
            Decl::Var {
                ty,
                name,
                init,
                line,
            } => {
                if *ty == Type::Void {
                    self.error(*line, format!("variable '{}' cannot have type void", name));
                }
                if let Some(init_expr) = init {
                    let init_ty = self.check_expr(init_expr);
                    if let Some(it) = init_ty {
                        if !expr_type_matches(*ty, it) {
                            self.error(
                                *line,
                                format!("cannot initialize '{}' with a mismatched type", name),
                            );
                        }
                    }
                }
                if self.values.declare(name, *ty).is_err() {
                    self.error(*line, format!("{} defined multiple times", name));
                }
            }
            Decl::Stmt(stmt) => self.check_stmt(stmt),
        }
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                self.check_expr(e);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                line,
            } => {
                let cond_ty = self.check_expr(cond);
                if cond_ty != Some(ExprType::Bool) {
                    self.error(*line, "if condition must be bool");
                }
                self.check_stmt(then_branch);
                if let Some(else_b) = else_branch {
                    self.check_stmt(else_b);
                }
            }
            Stmt::While { cond, body, line } => {
                let cond_ty = self.check_expr(cond);
                if cond_ty != Some(ExprType::Bool) {
                    self.error(*line, "while condition must be bool");
                }
                self.check_stmt(body);
            }
            Stmt::Block(decls) => {
                self.values.push_scope();
                for d in decls {
                    self.check_decl(d);
                }
                self.values.pop_scope();
            }
            Stmt::Print { expr, line } => {
                let ty = self.check_expr(expr);
                if ty.is_none() {
                    self.error(*line, "print argument must not be void");
                }
            }
            Stmt::Return { expr, line } => match (self.current_ret_ty, expr) {
                (Type::Void, None) => {}
                (Type::Void, Some(_)) => {
                    self.error(*line, "cannot return a value from a void function")
                }
                (Type::Int, None) => {
                    self.error(*line, "must return a value from a non-void function")
                }
                (Type::Int, Some(e)) => {
                    let ty = self.check_expr(e);
                    if ty != Some(ExprType::Int) {
                        self.error(*line, "return type does not match function return type");
                    }
                }
            },
        }
    }

    fn check_expr(&mut self, expr: &mut Expr) -> Option<ExprType> {
        let ty = match expr {
            Expr::Literal { lit, line, .. } => match lit {
                Literal::Int(_) => Some(ExprType::Int),
                Literal::Ident(name) => match self.values.lookup(name) {
                    Some(Type::Int) => Some(ExprType::Int),
                    Some(Type::Void) => {
                        unreachable!("void-typed variables are rejected at declaration")
                    }
                    None => {
                        self.error(*line, format!("undefined variable '{}'", name));
                        None
                    }
                },
            },
            Expr::Grouping { inner, .. } => self.check_expr(inner),
            Expr::Unary {
                op, operand, line, ..
            } => {
                let operand_ty = self.check_expr(operand);
                match (*op, operand_ty) {
                    (UnOp::Neg, Some(ExprType::Int)) => Some(ExprType::Int),
                    (UnOp::Not, Some(ExprType::Bool)) => Some(ExprType::Bool),
                    (UnOp::Neg, Some(_)) => {
                        self.error(*line, "'-' requires an int operand");
                        None
                    }
                    (UnOp::Not, Some(_)) => {
                        self.error(*line, "'!' requires a bool operand");
                        None
                    }
                    (_, None) => None,
                }
            }
            Expr::Binary {
                op,
                left,
                right,
                line,
                ..
            } => {
                let lt = self.check_expr(left);
                let rt = self.check_expr(right);
                self.check_binary(*op, lt, rt, *line)
            }
            Expr::Call {
                callee, args, line, ..
            } => {
                let sig = self.functions.lookup(callee);
                let arg_tys: Vec<Option<ExprType>> =
                    args.iter_mut().map(|a| self.check_expr(a)).collect();
                match sig {
                    None => {
                        self.error(*line, format!("undefined function '{}'", callee));
                        None
                    }
                    Some(sig) => {
                        if sig.params.len() != args.len() {
                            self.error(
                                *line,
                                format!(
                                    "'{}' expects {} argument(s), got {}",
                                    callee,
                                    sig.params.len(),
                                    args.len()
                                ),
                            );
                        } else {
                            for (param_ty, arg_ty) in sig.params.iter().zip(arg_tys.iter()) {
                                let ok = arg_ty.map_or(false, |a| expr_type_matches(*param_ty, a));
                                if !ok {
                                    self.error(
                                        *line,
                                        format!("argument type mismatch in call to '{}'", callee),
                                    );
                                }
                            }
                        }
                        decl_ty_to_expr_ty(sig.ret_ty)
                    }
                }
            }
            Expr::Assign {
                target,
                value,
                line,
                ..
            } => {
                let value_ty = self.check_expr(value);
                match self.values.lookup(target) {
                    None => {
                        self.error(*line, format!("undefined variable '{}'", target));
                        None
                    }
                    Some(var_ty) => {
                        let ok = value_ty.map_or(false, |v| expr_type_matches(var_ty, v));
                        if !ok {
                            self.error(
                                *line,
                                format!("cannot assign a mismatched type to '{}'", target),
                            );
                        }
                        decl_ty_to_expr_ty(var_ty)
                    }
                }
            }
        };
        if let Some(t) = ty {
            expr.set_ty(t);
        }
        ty
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        lt: Option<ExprType>,
        rt: Option<ExprType>,
        line: usize,
    ) -> Option<ExprType> {
        use BinOp::*;
        match op {
            And | Or => {
                if lt != Some(ExprType::Bool) || rt != Some(ExprType::Bool) {
                    self.error(line, "'and'/'or' require bool operands");
                    None
                } else {
                    Some(ExprType::Bool)
                }
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                if lt != Some(ExprType::Int) || rt != Some(ExprType::Int) {
                    self.error(line, "comparison requires int operands");
                    None
                } else {
                    Some(ExprType::Bool)
                }
            }
            Add | Sub | Mul | Div => {
                if lt != Some(ExprType::Int) || rt != Some(ExprType::Int) {
                    self.error(line, "arithmetic requires int operands");
                    None
                } else {
                    Some(ExprType::Int)
                }
            }
        }
    }
}

fn expr_type_matches(decl_ty: Type, expr_ty: ExprType) -> bool {
    matches!((decl_ty, expr_ty), (Type::Int, ExprType::Int))
}

fn decl_ty_to_expr_ty(ty: Type) -> Option<ExprType> {
    match ty {
        Type::Int => Some(ExprType::Int),
        Type::Void => None,
    }
}

/// Structural "definitely returns" check: a function whose declared
/// return type is non-`Void` must have a `return` on every control-flow
/// path.
fn block_definitely_returns(decls: &[Decl]) -> bool {
    decls.iter().any(decl_definitely_returns)
}

fn decl_definitely_returns(decl: &Decl) -> bool {
    match decl {
        Decl::Var { .. } => false,
        Decl::Stmt(stmt) => stmt_definitely_returns(stmt),
    }
}

fn stmt_definitely_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } => true,
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => match else_branch {
            Some(else_b) => {
                stmt_definitely_returns(then_branch) && stmt_definitely_returns(else_b)
            }
            None => false,
        },
        Stmt::While { .. } => false,
        Stmt::Block(decls) => block_definitely_returns(decls),
        Stmt::Expr(_) | Stmt::Print { .. } => false,
    }
}
