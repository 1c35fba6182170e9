use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan, UnikError},
    value::Value,
};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One scope in the lexical chain: its own bindings plus an optional parent.
#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    /// Creates or overwrites a binding in this scope only.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn get(env: &EnvironmentRef, name: &str, span: SourceSpan) -> Result<Value, UnikError> {
        Environment::lookup(env, name).ok_or_else(|| {
            UnikError::from(Diagnostic::runtime(
                DiagnosticKind::UndefinedVariable,
                format!("undefined variable `{name}`"),
                span,
            ))
        })
    }

    pub fn lookup(env: &EnvironmentRef, name: &str) -> Option<Value> {
        let scope = env.borrow();
        if let Some(value) = scope.bindings.get(name) {
            return Some(value.clone());
        }
        let parent = scope.parent.clone()?;
        drop(scope);
        Environment::lookup(&parent, name)
    }

    pub fn is_defined(env: &EnvironmentRef, name: &str) -> bool {
        Environment::find_scope(env, name).is_some()
    }

    /// Mutates the nearest scope that already binds `name`; when no scope
    /// does, the binding is created in the outermost (global) scope.
    pub fn assign_existing(env: &EnvironmentRef, name: &str, value: Value) {
        let target = Environment::find_scope(env, name).unwrap_or_else(|| Environment::root(env));
        target.borrow_mut().define(name, value);
    }

    /// Assignment statement semantics: update the nearest existing binding,
    /// otherwise introduce the name in the current scope.
    pub fn assign(env: &EnvironmentRef, name: &str, value: Value) {
        if Environment::is_defined(env, name) {
            Environment::assign_existing(env, name, value);
        } else {
            env.borrow_mut().define(name, value);
        }
    }

    pub fn root(env: &EnvironmentRef) -> EnvironmentRef {
        let mut current = Rc::clone(env);
        loop {
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    fn find_scope(env: &EnvironmentRef, name: &str) -> Option<EnvironmentRef> {
        let mut current = Rc::clone(env);
        loop {
            if current.borrow().bindings.contains_key(name) {
                return Some(current);
            }
            let parent = current.borrow().parent.clone()?;
            current = parent;
        }
    }
}
