//! Lowers `IrProgram` into pseudo-x64 (`X64Program`): every variable is
//! still a symbolic `Str` placeholder, homed to a concrete register or
//! stack slot only by the register allocator + patch passes.

use crate::ir::{Atom, IrBinOp, IrBlock, IrCmp, IrExpr, IrFun, IrProgram, IrStmt, IrTail, IrUnOp};
use crate::x64::{Arg, Cc, Instr, Reg, X64Block, X64Fun, X64Program, PARAM_REGS};

pub fn select_program(ir: &IrProgram) -> X64Program {
    X64Program {
        funs: ir.funs.iter().map(select_fun).collect(),
    }
}

fn atom_to_arg(atom: &Atom) -> Arg {
    match atom {
        Atom::Int(v) => Arg::Imm(*v),
        Atom::Name(n) => Arg::Str(n.clone()),
    }
}

fn select_fun(fun: &IrFun) -> X64Fun {
    let epilogue_label = format!("{}_epilogue", fun.label);
    let mut blocks = Vec::with_capacity(fun.blocks.len());

    for (i, ir_block) in fun.blocks.iter().enumerate() {
        let mut block = X64Block::new(ir_block.label.clone());
        if i == 0 {
            home_params(fun, &mut block);
        }
        select_block_body(ir_block, &mut block);
        select_tail(ir_block.tail.as_ref(), &epilogue_label, &mut block);
        blocks.push(block);
    }

    X64Fun {
        label: fun.label.clone(),
        blocks,
    }
}

/// Parameters 1..6 arrive in `RDI, RSI, RDX, RCX, R8, R9`; parameters 7+
/// were pushed by the caller (right-to-left) and live at positive
/// `%rbp` offsets starting at `+16`.
fn home_params(fun: &IrFun, block: &mut X64Block) {
    for (i, p) in fun.params.iter().enumerate() {
        if i < PARAM_REGS.len() {
            block
                .instrs
                .push(Instr::Movq(Arg::Reg(PARAM_REGS[i]), Arg::Str(p.label.clone())));
        } else {
            let offset = 16 + ((i - PARAM_REGS.len()) as i64) * 8;
            block.instrs.push(Instr::Movq(
                Arg::Deref {
                    reg: Reg::Rbp,
                    offset,
                },
                Arg::Str(p.label.clone()),
            ));
        }
    }
}

fn select_block_body(ir_block: &IrBlock, block: &mut X64Block) {
    for stmt in &ir_block.stmts {
        select_stmt(stmt, block);
    }
}

fn select_stmt(stmt: &IrStmt, block: &mut X64Block) {
    match stmt {
        IrStmt::Decl {
            label, init: Some(e), ..
        } => {
            select_expr(e, block);
            block
                .instrs
                .push(Instr::Movq(Arg::Reg(Reg::Rax), Arg::Str(label.clone())));
        }
        IrStmt::Decl { init: None, .. } => {}
        IrStmt::ExprStmt(e) => select_expr(e, block),
        IrStmt::Print(atom) => select_print(atom, block),
    }
}

/// `subq $8, %rsp` / `addq $8, %rsp` brackets the `callq printf` as a
/// 16-byte alignment pad, rather than a `pushq %rbp` / `popq %rbp` pair,
/// which reads as (and risks being mistaken for) an actual
/// frame-pointer save/restore.
fn select_print(atom: &Atom, block: &mut X64Block) {
    block
        .instrs
        .push(Instr::Subq(Arg::Imm(8), Arg::Reg(Reg::Rsp)));
    block
        .instrs
        .push(Instr::Leaq("format_string".to_string(), Arg::Reg(Reg::Rdi)));
    block
        .instrs
        .push(Instr::Movq(atom_to_arg(atom), Arg::Reg(Reg::Rsi)));
    block
        .instrs
        .push(Instr::Movq(Arg::Imm(0), Arg::Reg(Reg::Rax)));
    block.instrs.push(Instr::Callq("printf".to_string()));
    block
        .instrs
        .push(Instr::Addq(Arg::Imm(8), Arg::Reg(Reg::Rsp)));
}

/// Evaluate `expr`, leaving the result in `%rax`.
fn select_expr(expr: &IrExpr, block: &mut X64Block) {
    match expr {
        IrExpr::AtomE(a) => block
            .instrs
            .push(Instr::Movq(atom_to_arg(a), Arg::Reg(Reg::Rax))),
        IrExpr::Bin { op, lhs, rhs } => match op {
            IrBinOp::Add => {
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(lhs), Arg::Reg(Reg::Rax)));
                block
                    .instrs
                    .push(Instr::Addq(atom_to_arg(rhs), Arg::Reg(Reg::Rax)));
            }
            IrBinOp::Sub => {
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(lhs), Arg::Reg(Reg::Rax)));
                block
                    .instrs
                    .push(Instr::Subq(atom_to_arg(rhs), Arg::Reg(Reg::Rax)));
            }
            IrBinOp::Mul => {
                block
                    .instrs
                    .push(Instr::Xorq(Arg::Reg(Reg::Rdx), Arg::Reg(Reg::Rdx)));
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(lhs), Arg::Reg(Reg::Rax)));
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(rhs), Arg::Reg(Reg::R15)));
                block.instrs.push(Instr::Imulq(Arg::Reg(Reg::R15)));
            }
            IrBinOp::Div => {
                block
                    .instrs
                    .push(Instr::Xorq(Arg::Reg(Reg::Rdx), Arg::Reg(Reg::Rdx)));
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(lhs), Arg::Reg(Reg::Rax)));
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(rhs), Arg::Reg(Reg::R15)));
                block.instrs.push(Instr::Idivq(Arg::Reg(Reg::R15)));
            }
        },
        IrExpr::Cmp { cmp, lhs, rhs } => {
            block
                .instrs
                .push(Instr::Movq(atom_to_arg(lhs), Arg::Reg(Reg::Rax)));
            block
                .instrs
                .push(Instr::Cmpq(atom_to_arg(rhs), Arg::Reg(Reg::Rax)));
            block.instrs.push(Instr::Setcc(cc_of(*cmp)));
            block.instrs.push(Instr::Movzbq(Arg::Reg(Reg::Rax)));
        }
        IrExpr::Unary { op, arg } => match op {
            IrUnOp::Neg => {
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(arg), Arg::Reg(Reg::Rax)));
                block.instrs.push(Instr::Negq(Arg::Reg(Reg::Rax)));
            }
            IrUnOp::Not => {
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(arg), Arg::Reg(Reg::Rax)));
                block
                    .instrs
                    .push(Instr::Xorq(Arg::Imm(1), Arg::Reg(Reg::Rax)));
            }
        },
        IrExpr::Call { callee, args } => select_call(callee, args, block),
        IrExpr::Assign { target, value } => {
            select_expr(value, block);
            block
                .instrs
                .push(Instr::Movq(Arg::Reg(Reg::Rax), Arg::Str(target.clone())));
        }
    }
}

fn cc_of(cmp: IrCmp) -> Cc {
    match cmp {
        IrCmp::Eq => Cc::E,
        IrCmp::Ne => Cc::Ne,
        IrCmp::Lt => Cc::L,
        IrCmp::Le => Cc::Le,
        IrCmp::Gt => Cc::G,
        IrCmp::Ge => Cc::Ge,
    }
}

/// First six arguments go in `RDI, RSI, RDX, RCX, R8, R9`; the rest are
/// pushed right-to-left (so the first stack argument ends up closest to
/// `%rbp`, at `+16`, matching `home_params`'s offset formula). If the
/// stack-argument count is odd, a `subq $8, %rsp` filler keeps the stack
/// 16-byte aligned at the `callq` (same convention as `select_print`).
fn select_call(callee: &str, args: &[Atom], block: &mut X64Block) {
    let n = args.len();
    let reg_args = n.min(PARAM_REGS.len());
    for (i, atom) in args.iter().enumerate().take(reg_args) {
        block
            .instrs
            .push(Instr::Movq(atom_to_arg(atom), Arg::Reg(PARAM_REGS[i])));
    }

    let stack_arg_count = n.saturating_sub(PARAM_REGS.len());
    let mut pushed_bytes: i64 = 0;
    if stack_arg_count % 2 == 1 {
        block
            .instrs
            .push(Instr::Subq(Arg::Imm(8), Arg::Reg(Reg::Rsp)));
        pushed_bytes += 8;
    }
    for i in (PARAM_REGS.len()..n).rev() {
        block.instrs.push(Instr::Pushq(atom_to_arg(&args[i])));
        pushed_bytes += 8;
    }

    block.instrs.push(Instr::Callq(callee.to_string()));

    if pushed_bytes > 0 {
        block
            .instrs
            .push(Instr::Addq(Arg::Imm(pushed_bytes), Arg::Reg(Reg::Rsp)));
    }
}

/// A block with no tail is backfilled with a jump to the function's
/// epilogue, covering both a `void` function falling off the end and an
/// unreachable block left behind by dead-but-well-formed branches.
fn select_tail(tail: Option<&IrTail>, epilogue_label: &str, block: &mut X64Block) {
    match tail {
        Some(IrTail::Goto(label)) => block.instrs.push(Instr::Jmp(label.clone())),
        Some(IrTail::Ret(atom)) => {
            if let Some(a) = atom {
                block
                    .instrs
                    .push(Instr::Movq(atom_to_arg(a), Arg::Reg(Reg::Rax)));
            }
            block.instrs.push(Instr::Jmp(epilogue_label.to_string()));
        }
        Some(IrTail::If {
            atom,
            then_label,
            else_label,
        }) => {
            block
                .instrs
                .push(Instr::Cmpq(Arg::Imm(1), atom_to_arg(atom)));
            block.instrs.push(Instr::Jcc(Cc::E, then_label.clone()));
            block.instrs.push(Instr::Jmp(else_label.clone()));
        }
        None => block.instrs.push(Instr::Jmp(epilogue_label.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::ir_builder::lower_program;
    use crate::parser::Parser;
    use crate::typecheck::TypeChecker;

    fn select_src(src: &str) -> X64Program {
        let mut program = Parser::new(src).parse().expect("should parse");
        let arena = Arena::new();
        let mut checker = TypeChecker::new(&arena);
        checker.check(&mut program).expect("should typecheck");
        let ir = lower_program(&program);
        select_program(&ir)
    }

    #[test]
    fn eighth_argument_is_homed_from_a_positive_rbp_offset() {
        let x64 = select_src(
            "int add8(int a,int b,int c,int d,int e,int f,int g,int h){return a+b+c+d+e+f+g+h;} void main() { print(add8(1,2,3,4,5,6,7,8)); }",
        );
        let add8 = x64.funs.iter().find(|f| f.label == "add8").unwrap();
        let homes: Vec<_> = add8.blocks[0]
            .instrs
            .iter()
            .filter_map(|i| match i {
                Instr::Movq(Arg::Deref { reg: Reg::Rbp, offset }, Arg::Str(_)) => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(homes, vec![16, 24]);
    }

    #[test]
    fn call_with_odd_stack_arg_count_gets_an_alignment_filler() {
        // 7 args -> 1 stack-passed arg (odd) -> filler expected.
        let x64 = select_src(
            "int add7(int a,int b,int c,int d,int e,int f,int g){return a+b+c+d+e+f+g;} void main() { print(add7(1,2,3,4,5,6,7)); }",
        );
        let main_fun = x64.funs.iter().find(|f| f.label == "main").unwrap();
        let has_filler = main_fun.blocks[0]
            .instrs
            .windows(1)
            .any(|w| matches!(&w[0], Instr::Subq(Arg::Imm(8), Arg::Reg(Reg::Rsp))));
        assert!(has_filler);
    }

    #[test]
    fn print_brackets_the_call_with_subq_addq_not_push_pop_rbp() {
        let x64 = select_src("void main() { print(1); }");
        let main_fun = &x64.funs[0];
        let instrs = &main_fun.blocks[0].instrs;
        assert!(instrs
            .iter()
            .any(|i| matches!(i, Instr::Subq(Arg::Imm(8), Arg::Reg(Reg::Rsp)))));
        assert!(!instrs.iter().any(|i| matches!(i, Instr::Pushq(Arg::Reg(Reg::Rbp)))));
    }

    #[test]
    fn if_tail_compares_against_one_and_branches() {
        let x64 = select_src("void main() { int x = 10; if (x > 5) print(1); else print(0); }");
        let main_fun = &x64.funs[0];
        assert!(main_fun.blocks.len() >= 4);
        let has_cmp_je = main_fun.blocks.iter().any(|b| {
            b.instrs
                .iter()
                .any(|i| matches!(i, Instr::Jcc(Cc::E, _)))
        });
        assert!(has_cmp_je);
    }

    #[test]
    fn block_with_no_tail_jumps_to_the_epilogue() {
        let x64 = select_src("void main() { print(1); }");
        let main_fun = &x64.funs[0];
        let last = main_fun.blocks.last().unwrap();
        assert!(matches!(last.instrs.last(), Some(Instr::Jmp(l)) if l == "main_epilogue"));
    }
}
