//! Linear-scan register allocation over block-granularity live ranges.
//!
//! A variable's (or a fixed register's) live range is `[first, last]`,
//! where `first`/`last` are indices into a function's flat block list —
//! not individual instructions. Two ranges that share any block are
//! treated as fully overlapping for that whole block, even if the two
//! underlying uses never appear next to each other. This is coarse by
//! design: correct-but-imprecise over a handful of basic blocks is a
//! fair trade for a single linear-scan pass with no dataflow fixpoint.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::vec::ArenaVec;
use crate::x64::{Arg, Instr, Reg, X64Fun, ALLOC_CALLEE_SAVED, ALLOC_CALLER_SAVED, CALLQ_CLOBBERS};

#[derive(Debug, Clone)]
struct VarRange {
    name: String,
    start: usize,
    end: usize,
}

fn extend(map: &mut HashMap<String, (usize, usize)>, name: &str, i: usize) {
    map.entry(name.to_string())
        .and_modify(|(s, e)| {
            if i < *s {
                *s = i;
            }
            if i > *e {
                *e = i;
            }
        })
        .or_insert((i, i));
}

fn extend_reg(map: &mut HashMap<Reg, (usize, usize)>, r: Reg, i: usize) {
    map.entry(r)
        .and_modify(|(s, e)| {
            if i < *s {
                *s = i;
            }
            if i > *e {
                *e = i;
            }
        })
        .or_insert((i, i));
}

fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// Homes assigned by the allocator, plus the bookkeeping `src/patch.rs`
/// needs to build the prologue/epilogue (which callee-saved registers
/// were actually touched, and how many stack slots were spilled).
#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    pub homes: HashMap<String, Arg>,
    /// Callee-saved registers used, in first-allocation order — the
    /// order the prologue pushes them and the epilogue pops them back.
    pub callee_saved: Vec<Reg>,
    pub num_spilled: usize,
}

/// Every `Arg::Str(name)` use/def and every literal `Arg::Reg`/`Arg::Deref`
/// register mention, indexed by the position of its enclosing block in
/// `fun.blocks`. `idivq`'s implicit `RAX:RDX` clobber and `callq`'s
/// implicit caller-saved clobber don't appear as explicit operands, so
/// they're recorded here by instruction shape instead.
fn compute_ranges(fun: &X64Fun) -> (HashMap<String, (usize, usize)>, HashMap<Reg, (usize, usize)>) {
    let mut vars: HashMap<String, (usize, usize)> = HashMap::new();
    let mut regs: HashMap<Reg, (usize, usize)> = HashMap::new();

    for (i, block) in fun.blocks.iter().enumerate() {
        for instr in &block.instrs {
            for arg in instr_args(instr) {
                match arg {
                    Arg::Str(name) => extend(&mut vars, name, i),
                    Arg::Reg(r) => extend_reg(&mut regs, *r, i),
                    Arg::Deref { reg, .. } => extend_reg(&mut regs, *reg, i),
                    Arg::Imm(_) => {}
                }
            }
            match instr {
                Instr::Idivq(_) => {
                    extend_reg(&mut regs, Reg::Rax, i);
                    extend_reg(&mut regs, Reg::Rdx, i);
                }
                Instr::Callq(_) => {
                    for r in CALLQ_CLOBBERS {
                        extend_reg(&mut regs, r, i);
                    }
                }
                _ => {}
            }
        }
    }

    (vars, regs)
}

/// Read-only view of an instruction's `Arg` slots, mirroring
/// `Instr::args_mut` for the allocator's scan (which never mutates).
fn instr_args(instr: &Instr) -> Vec<&Arg> {
    match instr {
        Instr::Addq(a, b)
        | Instr::Subq(a, b)
        | Instr::Xorq(a, b)
        | Instr::Movq(a, b)
        | Instr::Cmpq(a, b) => vec![a, b],
        Instr::Imulq(a) | Instr::Idivq(a) | Instr::Pushq(a) | Instr::Popq(a) => vec![a],
        Instr::Leaveq | Instr::Retq | Instr::Movzbq(_) | Instr::Setcc(_) => vec![],
        Instr::Leaq(_, dst) => vec![dst],
        Instr::Negq(a) => vec![a],
        Instr::Jmp(_) | Instr::Jcc(_, _) | Instr::Callq(_) => vec![],
    }
}

/// Assign every `Str` variable in `fun` a register or a spill slot.
/// Caller-saved registers are preferred over callee-saved ones (fewer
/// prologue/epilogue saves); a variable whose range overlaps a fixed
/// register's constraint range (an `idivq`/`callq` clobber window, or a
/// literal `%rax`/`%rdi`/... mention) is never assigned that register.
pub fn allocate(fun: &X64Fun) -> AllocationResult {
    let (var_ranges, reg_ranges) = compute_ranges(fun);

    let arena = Arena::new();
    let mut sorted: ArenaVec<VarRange> = ArenaVec::new_in(&arena);
    let mut names: Vec<&String> = var_ranges.keys().collect();
    names.sort();
    for name in names {
        let (start, end) = var_ranges[name];
        sorted.push(VarRange {
            name: name.clone(),
            start,
            end,
        });
    }
    let mut entries: Vec<&VarRange> = sorted.iter().collect();
    entries.sort_by_key(|r| (r.start, r.name.clone()));

    let mut active: Vec<(Reg, usize)> = Vec::new(); // (reg, end) of currently live allocations
    let mut homes: HashMap<String, Arg> = HashMap::new();
    let mut callee_saved: Vec<Reg> = Vec::new();
    let mut num_spilled = 0usize;

    for range in entries {
        active.retain(|(_, end)| *end >= range.start);

        let pool = ALLOC_CALLER_SAVED.iter().chain(ALLOC_CALLEE_SAVED.iter());
        let mut chosen = None;
        for &r in pool {
            if active.iter().any(|(ar, _)| *ar == r) {
                continue;
            }
            if let Some(&constraint) = reg_ranges.get(&r) {
                if overlaps((range.start, range.end), constraint) {
                    continue;
                }
            }
            chosen = Some(r);
            break;
        }

        match chosen {
            Some(r) => {
                homes.insert(range.name.clone(), Arg::Reg(r));
                active.push((r, range.end));
                if r.is_callee_saved() && !callee_saved.contains(&r) {
                    callee_saved.push(r);
                }
            }
            None => {
                let offset = -((num_spilled + 1) as i64) * 8;
                num_spilled += 1;
                homes.insert(
                    range.name.clone(),
                    Arg::Deref {
                        reg: Reg::Rbp,
                        offset,
                    },
                );
            }
        }
    }

    AllocationResult {
        homes,
        callee_saved,
        num_spilled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x64::{Cc, X64Block};

    fn block(label: &str, instrs: Vec<Instr>) -> X64Block {
        X64Block {
            label: label.to_string(),
            instrs,
        }
    }

    #[test]
    fn disjoint_variables_can_share_a_register() {
        // f_var_0 lives only in block 0, f_var_1 only in block 1: no overlap.
        let fun = X64Fun {
            label: "f".to_string(),
            blocks: vec![
                block(
                    "f_lab_0",
                    vec![
                        Instr::Movq(Arg::Imm(1), Arg::Str("f_var_0".to_string())),
                        Instr::Jmp("f_lab_1".to_string()),
                    ],
                ),
                block(
                    "f_lab_1",
                    vec![
                        Instr::Movq(Arg::Imm(2), Arg::Str("f_var_1".to_string())),
                        Instr::Retq,
                    ],
                ),
            ],
        };

        let result = allocate(&fun);
        assert_eq!(result.homes.get("f_var_0"), result.homes.get("f_var_1"));
        assert_eq!(result.num_spilled, 0);
    }

    #[test]
    fn overlapping_variables_get_distinct_registers() {
        // Both variables are alive across the same single block.
        let fun = X64Fun {
            label: "f".to_string(),
            blocks: vec![block(
                "f_lab_0",
                vec![
                    Instr::Movq(Arg::Imm(1), Arg::Str("f_var_0".to_string())),
                    Instr::Movq(Arg::Imm(2), Arg::Str("f_var_1".to_string())),
                    Instr::Addq(
                        Arg::Str("f_var_0".to_string()),
                        Arg::Str("f_var_1".to_string()),
                    ),
                    Instr::Retq,
                ],
            )],
        };

        let result = allocate(&fun);
        assert_ne!(result.homes.get("f_var_0"), result.homes.get("f_var_1"));
    }

    #[test]
    fn a_variable_live_across_a_call_avoids_caller_saved_registers() {
        let fun = X64Fun {
            label: "f".to_string(),
            blocks: vec![
                block(
                    "f_lab_0",
                    vec![Instr::Movq(Arg::Imm(9), Arg::Str("f_var_0".to_string()))],
                ),
                block("f_lab_1", vec![Instr::Callq("g".to_string())]),
                block(
                    "f_lab_2",
                    vec![
                        Instr::Movq(Arg::Str("f_var_0".to_string()), Arg::Reg(Reg::Rax)),
                        Instr::Retq,
                    ],
                ),
            ],
        };

        let result = allocate(&fun);
        match result.homes.get("f_var_0") {
            Some(Arg::Reg(r)) => assert!(r.is_callee_saved()),
            Some(Arg::Deref { .. }) => {}
            other => panic!("unexpected home: {other:?}"),
        }
    }

    #[test]
    fn a_register_assigned_to_callee_saved_is_recorded_once() {
        // Force every caller-saved register to be busy in the block where
        // this variable is live, so it must spill to a callee-saved slot.
        let mut instrs = vec![];
        for (i, r) in ALLOC_CALLER_SAVED.iter().enumerate() {
            instrs.push(Instr::Movq(Arg::Imm(i as i64), Arg::Reg(*r)));
        }
        instrs.push(Instr::Movq(Arg::Imm(1), Arg::Str("f_var_0".to_string())));
        instrs.push(Instr::Movq(Arg::Imm(1), Arg::Str("f_var_1".to_string())));
        instrs.push(Instr::Retq);

        let fun = X64Fun {
            label: "f".to_string(),
            blocks: vec![block("f_lab_0", instrs)],
        };

        let result = allocate(&fun);
        let homed_callee_saved = |name: &str| matches!(
            result.homes.get(name),
            Some(Arg::Reg(r)) if r.is_callee_saved()
        );
        assert!(homed_callee_saved("f_var_0") || homed_callee_saved("f_var_1"));
        assert!(result.callee_saved.len() <= 2);
    }

    #[test]
    fn more_live_variables_than_registers_spill_with_descending_offsets() {
        let total_regs = ALLOC_CALLER_SAVED.len() + ALLOC_CALLEE_SAVED.len();
        let mut instrs = Vec::new();
        for i in 0..(total_regs + 2) {
            instrs.push(Instr::Movq(
                Arg::Imm(i as i64),
                Arg::Str(format!("f_var_{i}")),
            ));
        }
        // Keep every variable alive simultaneously with one big sum.
        let mut sum_instrs = Vec::new();
        for i in 0..(total_regs + 2) {
            sum_instrs.push(Instr::Addq(
                Arg::Str(format!("f_var_{i}")),
                Arg::Reg(Reg::Rax),
            ));
        }
        instrs.extend(sum_instrs);
        instrs.push(Instr::Retq);

        let fun = X64Fun {
            label: "f".to_string(),
            blocks: vec![block("f_lab_0", instrs)],
        };

        let result = allocate(&fun);
        assert_eq!(result.num_spilled, 2);
        let mut offsets: Vec<i64> = result
            .homes
            .values()
            .filter_map(|a| match a {
                Arg::Deref { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![-16, -8]);
    }

    #[test]
    fn setcc_and_movzbq_contribute_no_home() {
        // Regression guard: instr_args must not panic on fixed-operand
        // instructions that carry no Str.
        let fun = X64Fun {
            label: "f".to_string(),
            blocks: vec![block(
                "f_lab_0",
                vec![
                    Instr::Cmpq(Arg::Imm(1), Arg::Reg(Reg::Rax)),
                    Instr::Setcc(Cc::E),
                    Instr::Movzbq(Arg::Reg(Reg::Rax)),
                    Instr::Retq,
                ],
            )],
        };

        let result = allocate(&fun);
        assert!(result.homes.is_empty());
    }
}
