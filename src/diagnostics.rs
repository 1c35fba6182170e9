use std::fmt;

use thiserror::Error;

/// Line/column position of a token within a source unit (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
}

impl SourceSpan {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Classification of a diagnostic event.
///
/// `Lexer` and `Parser` are fatal to the source unit being read; every other
/// kind is raised while evaluating and can be caught by `try`/`catch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    UndefinedVariable,
    AttributeError,
    NotCallable,
    TypeMismatch,
    DivisionByZero,
    ModuloByZero,
    InvalidLoopStep,
    IndexOutOfRange,
    RecursionLimit,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ReturnOutsideFunction,
    Input,
}

impl DiagnosticKind {
    pub fn is_runtime(self) -> bool {
        !matches!(self, DiagnosticKind::Lexer | DiagnosticKind::Parser)
    }

    pub fn name(self) -> &'static str {
        match self {
            DiagnosticKind::Lexer => "LexError",
            DiagnosticKind::Parser => "ParseError",
            DiagnosticKind::UndefinedVariable => "UndefinedVariable",
            DiagnosticKind::AttributeError => "AttributeError",
            DiagnosticKind::NotCallable => "NotCallable",
            DiagnosticKind::TypeMismatch => "TypeMismatch",
            DiagnosticKind::DivisionByZero => "DivisionByZero",
            DiagnosticKind::ModuloByZero => "ModuloByZero",
            DiagnosticKind::InvalidLoopStep => "InvalidLoopStep",
            DiagnosticKind::IndexOutOfRange => "IndexError",
            DiagnosticKind::RecursionLimit => "RecursionLimit",
            DiagnosticKind::BreakOutsideLoop => "BreakOutsideLoop",
            DiagnosticKind::ContinueOutsideLoop => "ContinueOutsideLoop",
            DiagnosticKind::ReturnOutsideFunction => "ReturnOutsideFunction",
            DiagnosticKind::Input => "InputError",
        }
    }

    fn hint(self) -> Option<&'static str> {
        match self {
            DiagnosticKind::UndefinedVariable => {
                Some("variable not defined; did you assign it before use?")
            }
            DiagnosticKind::AttributeError => {
                Some("check the field names assigned in the class body or `init`")
            }
            DiagnosticKind::TypeMismatch => Some("check the operand types or convert them first"),
            DiagnosticKind::DivisionByZero | DiagnosticKind::ModuloByZero => {
                Some("ensure the right-hand operand is non-zero")
            }
            DiagnosticKind::InvalidLoopStep => Some("a loop step of 0 would never terminate"),
            DiagnosticKind::RecursionLimit => Some("rewrite deep recursion as an iterative loop"),
            _ => None,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    /// Runtime diagnostic carrying the standard hint for its kind.
    pub fn runtime(kind: DiagnosticKind, message: impl Into<String>, span: SourceSpan) -> Self {
        let diagnostic = Self::new(kind, message).with_span(span);
        match kind.hint() {
            Some(hint) => diagnostic.with_note(hint),
            None => diagnostic,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({span})")?;
        }
        for note in &self.notes {
            write!(f, "\n  hint: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the Unik toolchain.
#[derive(Debug, Error)]
pub enum UnikError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("suggestion cache error: {0}")]
    Cache(#[from] serde_json::Error),
}

impl UnikError {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            UnikError::Diagnostic(diag) => Some(diag),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<DiagnosticKind> {
        self.diagnostic().map(|diag| diag.kind)
    }
}

pub type Result<T> = std::result::Result<T, UnikError>;
