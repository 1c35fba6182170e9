//! Runtime for the Unik scripting language: lexer, parser, tree-walking
//! evaluator, native builtins, the `aik` code-generation collaborator and an
//! interactive shell.

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use codegen::{CodeGen, CodeGenerator, JsonFileStore, MemoryStore, SuggestionStore, TemplateGenerator};
pub use diagnostics::{Diagnostic, DiagnosticKind, SourceSpan, UnikError};
pub use repl::Repl;
pub use runtime::Interpreter;
pub use value::{Value, ValueKind};
