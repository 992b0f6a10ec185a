//! Renders a patched `X64Program` as AT&T-syntax assembly text.
//!
//! Output is built incrementally with `writeln!` into a `String` rather
//! than a templating crate: the shape is fixed (one `.data` constant,
//! then one block per function phase) and everything needed to print it
//! is known up front, so there's no benefit to a buffered/two-pass
//! emitter.

use std::fmt::Write as _;

use crate::x64::{Arg, Cc, Instr, X64Block, X64Fun, X64Program};

/// On macOS, the C symbol-mangling convention prefixes every external
/// and user-defined label with `_`; ELF targets use the bare name. The
/// caller picks (`main.rs` defaults from `cfg!(target_os = "macos")`);
/// the printer never sniffs the host itself, so both conventions stay
/// testable from one binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Elf,
}

impl Platform {
    fn symbol(self, name: &str) -> String {
        match self {
            Platform::MacOs => format!("_{name}"),
            Platform::Elf => name.to_string(),
        }
    }
}

pub fn print_program(program: &X64Program, platform: Platform) -> String {
    let mut out = String::new();
    writeln!(out, ".data").expect("writing to a String cannot fail");
    writeln!(out, "format_string: .asciz \"%ld\\n\"").expect("writing to a String cannot fail");
    writeln!(out).expect("writing to a String cannot fail");
    writeln!(out, ".text").expect("writing to a String cannot fail");
    writeln!(out, ".globl {}", platform.symbol("main")).expect("writing to a String cannot fail");
    writeln!(out).expect("writing to a String cannot fail");

    for fun in &program.funs {
        print_fun(&mut out, fun, platform);
    }

    out
}

fn print_fun(out: &mut String, fun: &X64Fun, platform: Platform) {
    for block in &fun.blocks {
        print_block(out, block, platform);
    }
}

fn print_block(out: &mut String, block: &X64Block, platform: Platform) {
    writeln!(out, "{}:", platform.symbol(&block.label)).expect("writing to a String cannot fail");
    for instr in &block.instrs {
        print_instr(out, instr, platform);
    }
    writeln!(out).expect("writing to a String cannot fail");
}

fn print_instr(out: &mut String, instr: &Instr, platform: Platform) {
    match instr {
        Instr::Addq(src, dst) => emit2(out, "addq", src, dst, platform),
        Instr::Subq(src, dst) => emit2(out, "subq", src, dst, platform),
        Instr::Xorq(src, dst) => emit2(out, "xorq", src, dst, platform),
        Instr::Movq(src, dst) => emit2(out, "movq", src, dst, platform),
        Instr::Cmpq(src, dst) => emit2(out, "cmpq", src, dst, platform),
        Instr::Imulq(src) => emit1(out, "imulq", src, platform),
        Instr::Idivq(src) => emit1(out, "idivq", src, platform),
        Instr::Pushq(src) => emit1(out, "pushq", src, platform),
        Instr::Popq(dst) => emit1(out, "popq", dst, platform),
        Instr::Leaveq => writeln!(out, "    leaveq").expect("writing to a String cannot fail"),
        Instr::Retq => writeln!(out, "    retq").expect("writing to a String cannot fail"),
        Instr::Movzbq(dst) => {
            writeln!(out, "    movzbq %al, {}", print_arg(dst, platform))
                .expect("writing to a String cannot fail");
        }
        Instr::Leaq(label, dst) => {
            writeln!(
                out,
                "    leaq {}(%rip), {}",
                platform.symbol(label),
                print_arg(dst, platform)
            )
            .expect("writing to a String cannot fail");
        }
        Instr::Negq(dst) => emit1(out, "negq", dst, platform),
        Instr::Setcc(cc) => {
            writeln!(out, "    set{} %al", cc.suffix()).expect("writing to a String cannot fail");
        }
        Instr::Jmp(label) => {
            writeln!(out, "    jmp {}", platform.symbol(label)).expect("writing to a String cannot fail");
        }
        Instr::Jcc(cc, label) => {
            writeln!(out, "    j{} {}", cc_suffix(*cc), platform.symbol(label))
                .expect("writing to a String cannot fail");
        }
        Instr::Callq(label) => {
            writeln!(out, "    callq {}", platform.symbol(label)).expect("writing to a String cannot fail");
        }
    }
}

fn cc_suffix(cc: Cc) -> &'static str {
    cc.suffix()
}

fn emit2(out: &mut String, mnemonic: &str, src: &Arg, dst: &Arg, platform: Platform) {
    writeln!(
        out,
        "    {} {}, {}",
        mnemonic,
        print_arg(src, platform),
        print_arg(dst, platform)
    )
    .expect("writing to a String cannot fail");
}

fn emit1(out: &mut String, mnemonic: &str, arg: &Arg, platform: Platform) {
    writeln!(out, "    {} {}", mnemonic, print_arg(arg, platform))
        .expect("writing to a String cannot fail");
}

/// Renders a homed `Arg`; `Str` should never reach the printer (home
/// assignment in `src/patch.rs` replaces every occurrence), so hitting
/// one here is an internal invariant violation, not a user-facing error.
fn print_arg(arg: &Arg, _platform: Platform) -> String {
    match arg {
        Arg::Str(name) => panic!("unhomed variable `{name}` reached the printer"),
        Arg::Reg(r) => r.att_name().to_string(),
        Arg::Imm(v) => format!("${v}"),
        Arg::Deref { reg, offset } => {
            if *offset == 0 {
                format!("({})", reg.att_name())
            } else {
                format!("{offset}({})", reg.att_name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x64::Reg;

    fn sample_program() -> X64Program {
        X64Program {
            funs: vec![X64Fun {
                label: "main".to_string(),
                blocks: vec![
                    X64Block {
                        label: "main".to_string(),
                        instrs: vec![
                            Instr::Pushq(Arg::Reg(Reg::Rbp)),
                            Instr::Movq(Arg::Reg(Reg::Rsp), Arg::Reg(Reg::Rbp)),
                            Instr::Jmp("main_lab_0".to_string()),
                        ],
                    },
                    X64Block {
                        label: "main_lab_0".to_string(),
                        instrs: vec![
                            Instr::Subq(Arg::Imm(8), Arg::Reg(Reg::Rsp)),
                            Instr::Leaq("format_string".to_string(), Arg::Reg(Reg::Rdi)),
                            Instr::Movq(Arg::Imm(42), Arg::Reg(Reg::Rsi)),
                            Instr::Movq(Arg::Imm(0), Arg::Reg(Reg::Rax)),
                            Instr::Callq("printf".to_string()),
                            Instr::Addq(Arg::Imm(8), Arg::Reg(Reg::Rsp)),
                            Instr::Jmp("main_epilogue".to_string()),
                        ],
                    },
                    X64Block {
                        label: "main_epilogue".to_string(),
                        instrs: vec![Instr::Popq(Arg::Reg(Reg::Rbp)), Instr::Retq],
                    },
                ],
            }],
        }
    }

    #[test]
    fn elf_output_has_no_leading_underscores() {
        let text = print_program(&sample_program(), Platform::Elf);
        assert!(text.contains(".globl main\n"));
        assert!(text.contains("callq printf"));
        assert!(!text.contains("_main"));
        assert!(!text.contains("_printf"));
    }

    #[test]
    fn macos_output_prefixes_every_label_and_call_target() {
        let text = print_program(&sample_program(), Platform::MacOs);
        assert!(text.contains(".globl _main\n"));
        assert!(text.contains("_main:"));
        assert!(text.contains("_main_lab_0:"));
        assert!(text.contains("_main_epilogue:"));
        assert!(text.contains("callq _printf"));
        assert!(text.contains("jmp _main_lab_0"));
    }

    #[test]
    fn data_section_declares_the_format_string() {
        let text = print_program(&sample_program(), Platform::Elf);
        let data_pos = text.find(".data").unwrap();
        let text_pos = text.find(".text").unwrap();
        assert!(data_pos < text_pos);
        assert!(text.contains("format_string: .asciz \"%ld\\n\""));
    }

    #[test]
    fn negative_displacement_is_rendered_before_the_register() {
        let program = X64Program {
            funs: vec![X64Fun {
                label: "f".to_string(),
                blocks: vec![X64Block {
                    label: "f".to_string(),
                    instrs: vec![Instr::Movq(
                        Arg::Imm(1),
                        Arg::Deref {
                            reg: Reg::Rbp,
                            offset: -8,
                        },
                    )],
                }],
            }],
        };
        let text = print_program(&program, Platform::Elf);
        assert!(text.contains("-8(%rbp)"));
    }

    #[test]
    #[should_panic(expected = "unhomed variable")]
    fn an_unhomed_str_panics_rather_than_silently_printing() {
        let program = X64Program {
            funs: vec![X64Fun {
                label: "f".to_string(),
                blocks: vec![X64Block {
                    label: "f".to_string(),
                    instrs: vec![Instr::Movq(Arg::Imm(1), Arg::Str("f_var_0".to_string()))],
                }],
            }],
        };
        print_program(&program, Platform::Elf);
    }
}
