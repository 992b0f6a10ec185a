//! Pseudo/final x86-64 instruction IR (AT&T operand order: `src, dst`).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rsp,
    Rbp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

/// Allocatable caller-saved registers, in tie-break preference order
/// (also the System V integer argument order for the first six).
pub const ALLOC_CALLER_SAVED: [Reg; 8] = [
    Reg::Rdi,
    Reg::Rsi,
    Reg::Rdx,
    Reg::Rcx,
    Reg::R8,
    Reg::R9,
    Reg::R10,
    Reg::R11,
];

/// Allocatable callee-saved registers, in preference order once the
/// caller-saved pool is exhausted.
pub const ALLOC_CALLEE_SAVED: [Reg; 4] = [Reg::Rbx, Reg::R12, Reg::R13, Reg::R14];

/// Never allocated: `RAX` is the result/accumulator register, `R15` is
/// `idivq`'s scratch, `RSP`/`RBP` hold the stack/frame pointers.
pub const RESERVED: [Reg; 4] = [Reg::Rax, Reg::R15, Reg::Rsp, Reg::Rbp];

/// Registers clobbered by `idivq` (implicit `RAX:RDX` dividend/remainder).
pub const IDIVQ_CLOBBERS: [Reg; 2] = [Reg::Rax, Reg::Rdx];

/// Registers clobbered by `callq` under the System V convention.
pub const CALLQ_CLOBBERS: [Reg; 9] = [
    Reg::Rax,
    Reg::Rcx,
    Reg::Rdx,
    Reg::Rsi,
    Reg::Rdi,
    Reg::R8,
    Reg::R9,
    Reg::R10,
    Reg::R11,
];

/// Parameter registers 1..6, System V integer calling convention.
pub const PARAM_REGS: [Reg; 6] = [
    Reg::Rdi,
    Reg::Rsi,
    Reg::Rdx,
    Reg::Rcx,
    Reg::R8,
    Reg::R9,
];

impl Reg {
    pub fn is_callee_saved(self) -> bool {
        ALLOC_CALLEE_SAVED.contains(&self)
    }

    /// AT&T register name, without the leading `_` label convention
    /// (that convention applies to symbols, not registers).
    pub fn att_name(self) -> &'static str {
        match self {
            Reg::Rax => "%rax",
            Reg::Rbx => "%rbx",
            Reg::Rcx => "%rcx",
            Reg::Rdx => "%rdx",
            Reg::Rsi => "%rsi",
            Reg::Rdi => "%rdi",
            Reg::Rsp => "%rsp",
            Reg::Rbp => "%rbp",
            Reg::R8 => "%r8",
            Reg::R9 => "%r9",
            Reg::R10 => "%r10",
            Reg::R11 => "%r11",
            Reg::R12 => "%r12",
            Reg::R13 => "%r13",
            Reg::R14 => "%r14",
            Reg::R15 => "%r15",
        }
    }
}

/// `Str` is a placeholder occupied by a symbolic name before register
/// allocation; after allocation + home assignment, no `Str` survives.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Reg(Reg),
    Imm(i64),
    Deref { reg: Reg, offset: i64 },
}

impl Arg {
    pub fn is_deref(&self) -> bool {
        matches!(self, Arg::Deref { .. })
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Arg::Str(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cc {
    E,
    Ne,
    L,
    Le,
    G,
    Ge,
}

impl Cc {
    pub fn suffix(self) -> &'static str {
        match self {
            Cc::E => "e",
            Cc::Ne => "ne",
            Cc::L => "l",
            Cc::Le => "le",
            Cc::G => "g",
            Cc::Ge => "ge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Addq(Arg, Arg),
    Subq(Arg, Arg),
    Xorq(Arg, Arg),
    Movq(Arg, Arg),
    Cmpq(Arg, Arg),
    Imulq(Arg),
    Idivq(Arg),
    Pushq(Arg),
    Popq(Arg),
    Leaveq,
    Retq,
    /// `movzbq %al, dst`.
    Movzbq(Arg),
    /// `leaq label(%rip), dst`.
    Leaq(String, Arg),
    Negq(Arg),
    /// `setcc %al`.
    Setcc(Cc),
    Jmp(String),
    Jcc(Cc, String),
    Callq(String),
}

impl Instr {
    /// The two operands of a binary `Str`/`Arg`-homed instruction, for the
    /// home-assignment and memory-memory patch passes. Returns `None` for
    /// instructions with a different operand shape.
    pub fn binary_operands_mut(&mut self) -> Option<(&mut Arg, &mut Arg)> {
        match self {
            Instr::Addq(a, b)
            | Instr::Subq(a, b)
            | Instr::Xorq(a, b)
            | Instr::Movq(a, b)
            | Instr::Cmpq(a, b) => Some((a, b)),
            _ => None,
        }
    }

    /// Every `Arg` slot in this instruction, for home substitution.
    pub fn args_mut(&mut self) -> Vec<&mut Arg> {
        match self {
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
}

#[derive(Debug, Clone)]
pub struct X64Block {
    pub label: String,
    pub instrs: Vec<Instr>,
}

impl X64Block {
    pub fn new(label: impl Into<String>) -> Self {
        X64Block {
            label: label.into(),
            instrs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct X64Fun {
    pub label: String,
    pub blocks: Vec<X64Block>,
}

#[derive(Debug, Clone, Default)]
pub struct X64Program {
    pub funs: Vec<X64Fun>,
}
