//! Diagnostics shared by every pipeline stage.
//!
//! A small hand-rolled enum with a manual `Display` impl, rather than
//! `thiserror` — this compiler batches user-facing diagnostics rather
//! than propagating a single typed error per call, so the aggregate
//! (`CompileError`) is the thing that needs `Display`/`Error`, not each
//! individual variant.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    Lex,
    Parse,
    Type,
    Io,
}

impl fmt::Display for DiagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagKind::Lex => "lex error",
            DiagKind::Parse => "parse error",
            DiagKind::Type => "type error",
            DiagKind::Io => "I/O error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagKind, line: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            line: Some(line),
            message: message.into(),
        }
    }

    pub fn without_line(kind: DiagKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            line: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Error at line {}: {}", line, self.message),
            None => write!(f, "Error: {}", self.message),
        }
    }
}

/// An aggregate of every diagnostic collected during a failed compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        CompileError { diagnostics }
    }

    pub fn has_kind(&self, kind: DiagKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::new(vec![Diagnostic::without_line(DiagKind::Io, e.to_string())])
    }
}
