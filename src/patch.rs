//! Patches a selected `X64Program` into final form: every `Str` is
//! replaced by its allocated home, no instruction is left with two
//! `Deref` operands, and every function gains a real prologue/epilogue.

use crate::regalloc::{self, AllocationResult};
use crate::x64::{Arg, Instr, Reg, X64Block, X64Fun, X64Program};

/// Patch every function in `program` in place.
pub fn patch_program(program: &mut X64Program) {
    for fun in &mut program.funs {
        patch_fun(fun);
    }
}

fn patch_fun(fun: &mut X64Fun) {
    let alloc = regalloc::allocate(fun);
    home_fun(fun, &alloc);
    fix_memory_operands(fun);
    wrap_prologue_epilogue(fun, &alloc);
}

/// Replace every `Arg::Str(name)` with the register or stack slot
/// `regalloc::allocate` assigned it. After this pass no `Str` survives
/// anywhere in the function.
fn home_fun(fun: &mut X64Fun, alloc: &AllocationResult) {
    for block in &mut fun.blocks {
        for instr in &mut block.instrs {
            for arg in instr.args_mut() {
                if let Arg::Str(name) = arg {
                    let home = alloc
                        .homes
                        .get(name)
                        .unwrap_or_else(|| panic!("unhomed variable `{name}`"));
                    *arg = home.clone();
                }
            }
        }
    }
}

/// x86-64 forbids memory-to-memory operands. Home assignment can produce
/// exactly that when both sides of a binary instruction spilled; insert a
/// `movq src, %rax` ahead of it and rewrite the instruction to read from
/// `%rax` instead.
fn fix_memory_operands(fun: &mut X64Fun) {
    for block in &mut fun.blocks {
        let mut patched = Vec::with_capacity(block.instrs.len());
        for mut instr in block.instrs.drain(..) {
            if let Some((src, dst)) = instr.binary_operands_mut() {
                if src.is_deref() && dst.is_deref() {
                    let original_src = src.clone();
                    *src = Arg::Reg(Reg::Rax);
                    patched.push(Instr::Movq(original_src, Arg::Reg(Reg::Rax)));
                }
            }
            patched.push(instr);
        }
        block.instrs = patched;
    }
}

/// Bytes of local stack space to reserve beyond the callee-saved pushes,
/// so the frame as a whole keeps `%rsp` 16-byte aligned at every `callq`.
/// With `n` spill slots and `k` callee-saved pushes, the frame holds
/// `(n + k + 1) * 8` bytes of pushes (the `+1` is the `pushq %rbp`); `pad`
/// is whatever's needed to bring that total to a multiple of 16.
fn alignment_padding(num_spilled: usize, num_callee_saved: usize) -> i64 {
    let pushed = (num_spilled + num_callee_saved + 1) * 8;
    let rem = pushed % 16;
    if rem == 0 {
        0
    } else {
        (16 - rem) as i64
    }
}

/// Rebuild `fun`'s blocks with a prologue entry block and a
/// `<fun>_epilogue` exit block. The prologue is labeled with the bare
/// function name (not `<fun>_prelude`): `Call` selection emits `callq
/// <callee>` against that same bare label (`src/ir_builder.rs` binds a
/// function's IR label to its source name unchanged), and `.globl <fun>`
/// in the printer must name a symbol a `callq` can actually land on.
fn wrap_prologue_epilogue(fun: &mut X64Fun, alloc: &AllocationResult) {
    let pad = alignment_padding(alloc.num_spilled, alloc.callee_saved.len());

    let prelude_label = fun.label.clone();
    let epilogue_label = format!("{}_epilogue", fun.label);

    let mut prelude = X64Block::new(prelude_label);
    prelude.instrs.push(Instr::Pushq(Arg::Reg(Reg::Rbp)));
    prelude
        .instrs
        .push(Instr::Movq(Arg::Reg(Reg::Rsp), Arg::Reg(Reg::Rbp)));
    for r in &alloc.callee_saved {
        prelude.instrs.push(Instr::Pushq(Arg::Reg(*r)));
    }
    let reserve = (alloc.num_spilled as i64) * 8 + pad;
    if reserve > 0 {
        prelude
            .instrs
            .push(Instr::Subq(Arg::Imm(reserve), Arg::Reg(Reg::Rsp)));
    }
    if let Some(first) = fun.blocks.first() {
        prelude.instrs.push(Instr::Jmp(first.label.clone()));
    }

    let mut epilogue = X64Block::new(epilogue_label);
    if reserve > 0 {
        epilogue
            .instrs
            .push(Instr::Addq(Arg::Imm(reserve), Arg::Reg(Reg::Rsp)));
    }
    for r in alloc.callee_saved.iter().rev() {
        epilogue.instrs.push(Instr::Popq(Arg::Reg(*r)));
    }
    epilogue.instrs.push(Instr::Popq(Arg::Reg(Reg::Rbp)));
    epilogue.instrs.push(Instr::Retq);

    let mut blocks = Vec::with_capacity(fun.blocks.len() + 2);
    blocks.push(prelude);
    blocks.append(&mut fun.blocks);
    blocks.push(epilogue);
    fun.blocks = blocks;
}
