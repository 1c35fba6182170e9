use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::{FunctionDecl, Stmt},
    diagnostics::{Diagnostic, DiagnosticKind, Result, SourceSpan},
    environment::EnvironmentRef,
    runtime::Interpreter,
};

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn nil() -> Self {
        Self::new(ValueKind::Nil)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::new(ValueKind::List(values))
    }

    pub fn map(entries: IndexMap<MapKey, Value>) -> Self {
        Self::new(ValueKind::Map(entries))
    }

    pub fn instance(instance: InstanceRef) -> Self {
        Self::new(ValueKind::Instance(instance))
    }

    /// Nil, `false`, numeric zero and the empty string are falsy. Empty
    /// lists and maps are truthy.
    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Nil => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Int(n) => *n != 0,
            ValueKind::Float(f) => *f != 0.0,
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::List(_)
            | ValueKind::Map(_)
            | ValueKind::Function(_)
            | ValueKind::NativeFunction(_)
            | ValueKind::Class(_)
            | ValueKind::Instance(_)
            | ValueKind::Task(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Nil => "Nil",
            ValueKind::Bool(_) => "Bool",
            ValueKind::Int(_) => "Int",
            ValueKind::Float(_) => "Float",
            ValueKind::String(_) => "String",
            ValueKind::List(_) => "List",
            ValueKind::Map(_) => "Map",
            ValueKind::Function(_) | ValueKind::NativeFunction(_) => "Function",
            ValueKind::Class(_) => "Class",
            ValueKind::Instance(_) => "Instance",
            ValueKind::Task(_) => "Task",
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(&*self.0, ValueKind::Int(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(&*self.0, ValueKind::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n as f64),
            ValueKind::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Structural equality; Int and Float compare by numeric value and
    /// instances by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Nil, ValueKind::Nil) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::Int(_) | ValueKind::Float(_), ValueKind::Int(_) | ValueKind::Float(_)) => {
                self.as_number() == other.as_number()
            }
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::List(a), ValueKind::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(l, r)| l.equals(r))
            }
            (ValueKind::Map(a), ValueKind::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|rhs| value.equals(rhs)))
            }
            (ValueKind::Instance(a), ValueKind::Instance(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Task(a), ValueKind::Task(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Class(a), ValueKind::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "\"{s}\""),
            ValueKind::List(values) => f.debug_list().entries(values.iter()).finish(),
            ValueKind::Map(map) => f.debug_map().entries(map.iter()).finish(),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Nil => write!(f, "nil"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            ValueKind::Map(map) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            ValueKind::Function(fun) => write!(f, "<func {}>", fun.decl.name),
            ValueKind::NativeFunction(fun) => write!(f, "<native func {}>", fun.name),
            ValueKind::Class(class) => write!(f, "<class {}>", class.name),
            ValueKind::Instance(instance) => write!(f, "<{} instance>", instance.borrow().class_name),
            ValueKind::Task(task) => write!(f, "<task {}>", task.borrow().name),
        }
    }
}

pub enum ValueKind {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<MapKey, Value>),
    Function(UserFunction),
    NativeFunction(NativeFunction),
    Class(ClassRef),
    Instance(InstanceRef),
    Task(TaskRef),
}

/// Hashable subset of values usable as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Nil,
    Bool(bool),
    Int(i64),
    String(String),
}

impl MapKey {
    pub fn from_value(value: &Value, span: SourceSpan) -> Result<MapKey> {
        match &*value.0 {
            ValueKind::Nil => Ok(MapKey::Nil),
            ValueKind::Bool(b) => Ok(MapKey::Bool(*b)),
            ValueKind::Int(n) => Ok(MapKey::Int(*n)),
            ValueKind::Float(n) if n.fract() == 0.0 => Ok(MapKey::Int(*n as i64)),
            ValueKind::String(s) => Ok(MapKey::String(s.clone())),
            _ => Err(Diagnostic::runtime(
                DiagnosticKind::TypeMismatch,
                format!("{} cannot be used as a map key", value.type_name()),
                span,
            )
            .into()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Nil => Value::nil(),
            MapKey::Bool(b) => Value::bool(*b),
            MapKey::Int(n) => Value::int(*n),
            MapKey::String(s) => Value::string(s.clone()),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// A closure: the function's definition plus the scope it was defined in.
#[derive(Clone)]
pub struct UserFunction {
    pub decl: Rc<FunctionDecl>,
    pub env: EnvironmentRef,
}

pub type NativeCallback = fn(&mut Interpreter, &[Value], SourceSpan) -> Result<Value>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    /// `usize::MAX` accepts any number of arguments.
    pub arity: usize,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: &[Value],
        span: SourceSpan,
    ) -> Result<Value> {
        if self.arity != usize::MAX && args.len() != self.arity {
            return Err(Diagnostic::runtime(
                DiagnosticKind::TypeMismatch,
                format!(
                    "function `{}` expected {} arguments but received {}",
                    self.name,
                    self.arity,
                    args.len()
                ),
                span,
            )
            .into());
        }
        (self.callback)(interpreter, args, span)
    }
}

pub type ClassRef = Rc<ClassTemplate>;

/// Built once when a `class` statement runs; every instance copies `fields`
/// and binds `methods` against itself.
pub struct ClassTemplate {
    pub name: String,
    pub fields: IndexMap<String, Value>,
    pub methods: IndexMap<String, Rc<FunctionDecl>>,
    pub env: EnvironmentRef,
}

pub type InstanceRef = Rc<RefCell<Instance>>;

pub struct Instance {
    pub class_name: String,
    pub fields: IndexMap<String, Value>,
    pub methods: IndexMap<String, Value>,
}

impl Instance {
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        self.fields
            .get(name)
            .or_else(|| self.methods.get(name))
            .cloned()
    }
}

pub type TaskRef = Rc<RefCell<TaskState>>;

pub struct TaskState {
    pub name: String,
    pub status: TaskStatus,
}

#[derive(Clone)]
pub enum TaskStatus {
    Pending {
        body: Rc<Vec<Stmt>>,
        env: EnvironmentRef,
    },
    Running,
    Done(Value),
}
