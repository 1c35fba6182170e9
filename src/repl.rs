use log::debug;
use rustyline::{DefaultEditor, error::ReadlineError};

use crate::{
    diagnostics::{Result, UnikError},
    environment::Environment,
    runtime::Interpreter,
    value::ValueKind,
};

const PROMPT: &str = "unik> ";
const CONTINUATION_PROMPT: &str = "...> ";

/// Interactive session over one persistent [`Interpreter`].
pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new(Interpreter::new())
    }
}

impl Repl {
    pub fn new(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(|err| UnikError::from(std::io::Error::other(err)))?;
        let mut buffer = String::new();
        loop {
            let prompt = if buffer.is_empty() {
                PROMPT
            } else {
                CONTINUATION_PROMPT
            };
            match editor.readline(prompt) {
                Ok(line) => {
                    buffer.push_str(&line);
                    buffer.push('\n');
                    if !is_complete(&buffer) {
                        continue;
                    }
                    let unit = std::mem::take(&mut buffer);
                    let unit = unit.trim();
                    if unit.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(unit).ok();
                    if !self.submit(unit) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(UnikError::from(std::io::Error::other(err))),
            }
        }
        Ok(())
    }

    /// Handles one complete input unit. Returns `false` once the session
    /// should end.
    pub fn submit(&mut self, input: &str) -> bool {
        let input = input.trim();
        if matches!(input, ".exit" | "exit") {
            return false;
        }
        if input == ".vars" {
            let names = self.bound_names().join(", ");
            if let Err(err) = self.interpreter.write_line(&names) {
                eprintln!("{err}");
            }
            return true;
        }
        let result = match input.strip_prefix(".load") {
            Some(path) if path.is_empty() || path.starts_with(char::is_whitespace) => {
                let path = path.trim();
                if path.is_empty() {
                    eprintln!("usage: .load <path>");
                    return true;
                }
                self.interpreter.load_file(path)
            }
            _ => self.interpreter.eval_source(input),
        };
        match result {
            Ok(value) if value.is_nil() => {}
            Ok(value) => {
                if let Err(err) = self.interpreter.write_line(&value.to_string()) {
                    eprintln!("{err}");
                }
            }
            Err(err) => {
                debug!("input failed: {err:?}");
                eprintln!("{err}");
            }
        }
        true
    }

    /// Global names bound by the session, skipping the native builtins.
    pub fn bound_names(&self) -> Vec<String> {
        let globals = self.interpreter.globals();
        let scope = globals.borrow();
        let names = scope
            .names()
            .filter(|name| {
                !matches!(
                    Environment::lookup(globals, name).as_ref().map(|value| value.0.as_ref()),
                    Some(ValueKind::NativeFunction(_))
                )
            })
            .map(str::to_string)
            .collect();
        names
    }
}

/// Whether every `(`, `[` and `{` in `source` is closed, ignoring string
/// literals and comments.
pub fn is_complete(source: &str) -> bool {
    let mut depth = 0i64;
    let mut chars = source.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '"' => {
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            chars.next();
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '#' => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    depth <= 0
}
