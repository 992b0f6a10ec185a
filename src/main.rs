//! `ablc` CLI: a thin front-end over the `ablc` library's pipeline
//! stages. A `clap`-derive struct, `eprintln!` + `process::exit` on
//! failure, and a manual exclusion check rather than an `ArgGroup` for
//! a two-flag case this small.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use ablc::{ir_builder, patch, selector, Platform};

#[derive(Parser)]
#[command(name = "ablc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile ABC source to x86-64 AT&T assembly", long_about = None)]
struct Cli {
    /// ABC source file (`.al`)
    input: PathBuf,

    /// Print the typechecked AST to stdout
    #[arg(short = 'a', long = "print-ast")]
    print_ast: bool,

    /// Print the lowered IR to stdout
    #[arg(short = 'i', long = "print-ir")]
    print_ir: bool,

    /// Print the emitted assembly to stdout
    #[arg(short = 'x', long = "print-asm")]
    print_asm: bool,

    /// Run the pipeline but write no output file
    #[arg(short = 's', long = "skip-output")]
    skip_output: bool,

    /// Assembly output path
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if cli.output.is_some() == cli.skip_output {
        eprintln!("ablc: exactly one of --output/-o or --skip-output/-s is required");
        process::exit(2);
    }

    let source = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ablc: error reading {}: {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let program = match ablc::check_source(&source) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    if cli.print_ast {
        println!("{program:#?}");
    }

    let ir = ir_builder::lower_program(&program);
    if cli.print_ir {
        println!("{ir:#?}");
    }

    let mut x64 = selector::select_program(&ir);
    patch::patch_program(&mut x64);

    let platform = if cfg!(target_os = "macos") {
        Platform::MacOs
    } else {
        Platform::Elf
    };
    let asm = ablc::printer::print_program(&x64, platform);
    if cli.print_asm {
        println!("{asm}");
    }

    if cli.skip_output {
        return;
    }

    let output = cli.output.expect("checked above: output or skip_output is set");
    if let Err(e) = fs::write(&output, &asm) {
        eprintln!("ablc: error writing {}: {}", output.display(), e);
        process::exit(1);
    }
}
