use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::VecDeque,
    fs,
    io::{self, BufRead, Write},
    path::Path,
    rc::Rc,
};

use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::{
    ast::{BinaryOp, ClassDecl, Expr, ExprKind, FunctionBody, Literal, Program, Stmt, StmtKind, UnaryOp},
    codegen::CodeGen,
    diagnostics::{Diagnostic, DiagnosticKind, Result, SourceSpan, UnikError},
    environment::{Environment, EnvironmentRef},
    parser, stdlib,
    value::{
        ClassTemplate, Instance, MapKey, TaskRef, TaskState, TaskStatus, UserFunction, Value,
        ValueKind,
    },
};

/// Deepest nesting of user function calls before evaluation gives up with
/// a `RecursionLimit` diagnostic instead of exhausting the native stack.
pub const MAX_CALL_DEPTH: usize = 64;

/// Outcome of executing a statement. The signal variants carry the span of
/// the statement that raised them so an escaping signal can be reported.
enum FlowControl {
    Next,
    NextValue(Value),
    Break(SourceSpan),
    Continue(SourceSpan),
    Return(Value, SourceSpan),
}

pub struct Interpreter {
    globals: EnvironmentRef,
    env: EnvironmentRef,
    codegen: CodeGen,
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
    tasks: VecDeque<TaskRef>,
    call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::new();
        stdlib::install(&globals);
        Self {
            env: Rc::clone(&globals),
            globals,
            codegen: CodeGen::default(),
            output: Box::new(io::stdout()),
            input: Box::new(io::BufReader::new(io::stdin())),
            tasks: VecDeque::new(),
            call_depth: 0,
        }
    }

    pub fn with_codegen(mut self, codegen: CodeGen) -> Self {
        self.codegen = codegen;
        self
    }

    /// Redirects `give`, `print` and `ask` prompts.
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn with_input(mut self, input: impl BufRead + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn globals(&self) -> &EnvironmentRef {
        &self.globals
    }

    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse_program(source)?;
        self.eval_program(&program)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        debug!("loading {}", path.display());
        let source = fs::read_to_string(path)?;
        self.eval_source(&source)
    }

    /// Evaluates one top-level unit against the global scope, then runs any
    /// tasks it left pending. Returns the value of the last expression
    /// statement, or Nil.
    ///
    /// When the unit fails, the tasks it scheduled are dropped from the queue
    /// without running. Their handles stay bound and can still be awaited.
    pub fn eval_program(&mut self, program: &Program) -> Result<Value> {
        self.env = Rc::clone(&self.globals);
        self.call_depth = 0;
        let value = match self.run_unit(&program.items) {
            Ok(value) => value,
            Err(err) => {
                if !self.tasks.is_empty() {
                    debug!("discarding {} pending task(s) after error", self.tasks.len());
                    self.tasks.clear();
                }
                return Err(err);
            }
        };
        self.drain_tasks()?;
        Ok(value)
    }

    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match &*callee.0 {
            ValueKind::Function(function) => self.call_function(function, args, span),
            ValueKind::NativeFunction(native) => native.call(self, &args, span),
            ValueKind::Class(class) => self.instantiate(class, args, span),
            _ => Err(runtime_error(
                DiagnosticKind::NotCallable,
                format!("value of type {} is not callable", callee.type_name()),
                span,
            )),
        }
    }

    pub(crate) fn write_line(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}")?;
        self.output.flush()?;
        Ok(())
    }

    fn read_line(&mut self, prompt: Option<&str>, span: SourceSpan) -> Result<Value> {
        if let Some(prompt) = prompt {
            write!(self.output, "{prompt}")?;
            self.output.flush()?;
        }
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(|err| {
            runtime_error(DiagnosticKind::Input, format!("failed to read input: {err}"), span)
        })?;
        if read == 0 {
            return Ok(Value::nil());
        }
        Ok(Value::string(line.trim_end_matches(['\n', '\r'])))
    }

    /// Runs `f` with `env` as the current scope and restores the previous
    /// scope afterwards, whether `f` succeeds or not.
    fn in_scope<T>(&mut self, env: EnvironmentRef, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let previous = std::mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = previous;
        result
    }

    fn run_unit(&mut self, items: &[Stmt]) -> Result<Value> {
        let mut last = Value::nil();
        for stmt in items {
            let flow = self.execute_statement(stmt)?;
            reject_signal(&flow)?;
            if let FlowControl::NextValue(value) = flow {
                last = value;
            }
        }
        Ok(last)
    }

    /// Body of a block-form function or a task: `return` supplies the result,
    /// otherwise Nil.
    fn run_body(&mut self, body: &[Stmt]) -> Result<Value> {
        for stmt in body {
            let flow = self.execute_statement(stmt)?;
            if let FlowControl::Return(value, _) = flow {
                return Ok(value);
            }
            reject_signal(&flow)?;
        }
        Ok(Value::nil())
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let scope = Environment::with_parent(Rc::clone(&self.env));
        self.in_scope(scope, |this| this.execute_sequence(statements))
    }

    fn execute_sequence(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let mut last = None;
        for stmt in statements {
            match self.execute_statement(stmt)? {
                FlowControl::Next => {}
                FlowControl::NextValue(value) => last = Some(value),
                signal => return Ok(signal),
            }
        }
        Ok(last.map_or(FlowControl::Next, FlowControl::NextValue))
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        match &stmt.kind {
            StmtKind::Assign { target, op, value } => {
                let assigned = match op {
                    Some(op) => {
                        let current = self.evaluate(target)?;
                        let rhs = self.evaluate(value)?;
                        self.binary(*op, current, rhs, stmt.span)?
                    }
                    None => self.evaluate(value)?,
                };
                self.assign(target, assigned)?;
                Ok(FlowControl::Next)
            }
            StmtKind::Print(parts) => {
                let mut line = String::new();
                for part in parts {
                    line.push_str(&self.evaluate(part)?.to_string());
                }
                self.write_line(&line)?;
                Ok(FlowControl::Next)
            }
            StmtKind::Expr(expr) => Ok(FlowControl::NextValue(self.evaluate(expr)?)),
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_block(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_block(branch)
                } else {
                    Ok(FlowControl::Next)
                }
            }
            StmtKind::NumericFor {
                binding,
                start,
                end,
                step,
                body,
            } => self.numeric_for(binding, start, end, step.as_ref(), body),
            StmtKind::ForEach {
                binding,
                iterable,
                body,
            } => {
                let iterable_value = self.evaluate(iterable)?;
                for item in iterate(&iterable_value, iterable.span)? {
                    if let Some(flow) = self.run_iteration(binding, item, body)? {
                        return Ok(flow);
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Repeat { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    let flow = self.execute_block(body)?;
                    if let Some(flow) = loop_exit(flow) {
                        return Ok(flow);
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Function(decl) => {
                let function = UserFunction {
                    decl: Rc::clone(decl),
                    env: Rc::clone(&self.env),
                };
                self.env
                    .borrow_mut()
                    .define(decl.name.clone(), Value::new(ValueKind::Function(function)));
                Ok(FlowControl::Next)
            }
            StmtKind::Class(decl) => {
                self.define_class(decl)?;
                Ok(FlowControl::Next)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::nil(),
                };
                Ok(FlowControl::Return(value, stmt.span))
            }
            StmtKind::Break => Ok(FlowControl::Break(stmt.span)),
            StmtKind::Continue => Ok(FlowControl::Continue(stmt.span)),
            StmtKind::Try {
                body,
                catch,
                finally,
            } => self.execute_try(body, catch.as_deref(), finally.as_deref()),
            StmtKind::Alter {
                subject,
                arms,
                default,
            } => {
                let value = self.evaluate(subject)?;
                for arm in arms {
                    if self.evaluate(&arm.case)?.equals(&value) {
                        return self.execute_block(&arm.body);
                    }
                }
                match default {
                    Some(body) => self.execute_block(body),
                    None => Ok(FlowControl::Next),
                }
            }
            StmtKind::Task { name, body } => {
                let task = Rc::new(RefCell::new(TaskState {
                    name: name.clone(),
                    status: TaskStatus::Pending {
                        body: Rc::clone(body),
                        env: Rc::clone(&self.env),
                    },
                }));
                debug!("scheduled task `{name}`");
                self.tasks.push_back(Rc::clone(&task));
                self.env
                    .borrow_mut()
                    .define(name.clone(), Value::new(ValueKind::Task(task)));
                Ok(FlowControl::Next)
            }
            StmtKind::CodeGen(prompt) => {
                let source = self.codegen.resolve(prompt)?;
                trace!("generated source for {prompt:?}:\n{source}");
                let fragment = parser::parse_program(&source)?;
                let globals = Rc::clone(&self.globals);
                let value = self.in_scope(globals, |this| this.run_unit(&fragment.items))?;
                Ok(FlowControl::NextValue(value))
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<()> {
        match &target.kind {
            ExprKind::Variable(name) => {
                Environment::assign(&self.env, name, value);
                Ok(())
            }
            ExprKind::Attribute {
                target: owner,
                name,
            } => {
                let owner_value = self.evaluate(owner)?;
                match &*owner_value.0 {
                    ValueKind::Instance(instance) => {
                        instance.borrow_mut().fields.insert(name.clone(), value);
                        Ok(())
                    }
                    ValueKind::Map(map) => {
                        let mut updated = map.clone();
                        updated.insert(MapKey::String(name.clone()), value);
                        self.assign(owner, Value::map(updated))
                    }
                    _ => Err(runtime_error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "cannot set attribute `{name}` on a value of type {}",
                            owner_value.type_name()
                        ),
                        target.span,
                    )),
                }
            }
            _ => Err(runtime_error(
                DiagnosticKind::TypeMismatch,
                "cannot assign to computed expression",
                target.span,
            )),
        }
    }

    fn numeric_for(
        &mut self,
        binding: &str,
        start: &Expr,
        end: &Expr,
        step_expr: Option<&Expr>,
        body: &[Stmt],
    ) -> Result<FlowControl> {
        let start_value = self.evaluate(start)?;
        let end_value = self.evaluate(end)?;
        let mut integral = start_value.is_int() && end_value.is_int();
        let from = number(&start_value, start.span)?;
        let to = number(&end_value, end.span)?;
        let step = match step_expr {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                integral &= value.is_int();
                let step = number(&value, expr.span)?;
                if step == 0.0 {
                    return Err(runtime_error(
                        DiagnosticKind::InvalidLoopStep,
                        "loop step cannot be 0",
                        expr.span,
                    ));
                }
                step
            }
            None if from <= to => 1.0,
            None => -1.0,
        };

        // Each value is computed from the iteration count so fractional steps
        // do not accumulate rounding error.
        let mut iteration = 0u64;
        loop {
            let current = from + iteration as f64 * step;
            if (step > 0.0 && current > to) || (step < 0.0 && current < to) {
                return Ok(FlowControl::Next);
            }
            let item = if integral {
                Value::int(current as i64)
            } else {
                Value::float(current)
            };
            if let Some(flow) = self.run_iteration(binding, item, body)? {
                return Ok(flow);
            }
            iteration += 1;
        }
    }

    /// Runs one loop iteration in a fresh scope with `binding` bound to
    /// `item`. `Some` carries the flow that ends the loop.
    fn run_iteration(&mut self, binding: &str, item: Value, body: &[Stmt]) -> Result<Option<FlowControl>> {
        let scope = Environment::with_parent(Rc::clone(&self.env));
        scope.borrow_mut().define(binding, item);
        let flow = self.in_scope(scope, |this| this.execute_sequence(body))?;
        Ok(loop_exit(flow))
    }

    fn execute_try(
        &mut self,
        body: &[Stmt],
        catch: Option<&[Stmt]>,
        finally: Option<&[Stmt]>,
    ) -> Result<FlowControl> {
        let outcome = match (self.execute_block(body), catch) {
            (Err(UnikError::Diagnostic(diagnostic)), Some(handler)) if diagnostic.kind.is_runtime() => {
                debug!("caught {}: {}", diagnostic.kind, diagnostic.message);
                let scope = Environment::with_parent(Rc::clone(&self.env));
                scope.borrow_mut().define("error", error_value(&diagnostic));
                self.in_scope(scope, |this| this.execute_sequence(handler))
            }
            (outcome, _) => outcome,
        };
        if let Some(finally) = finally {
            let flow = self.execute_block(finally)?;
            if matches!(
                flow,
                FlowControl::Break(_) | FlowControl::Continue(_) | FlowControl::Return(..)
            ) {
                return Ok(flow);
            }
        }
        outcome
    }

    fn define_class(&mut self, decl: &ClassDecl) -> Result<()> {
        let globals = Rc::clone(&self.globals);
        let fields = self.in_scope(Rc::clone(&globals), |this| {
            let mut fields = IndexMap::new();
            for (name, initializer) in &decl.fields {
                fields.insert(name.clone(), this.evaluate(initializer)?);
            }
            Ok(fields)
        })?;
        let methods = decl
            .methods
            .iter()
            .map(|method| (method.name.clone(), Rc::clone(method)))
            .collect();
        let template = ClassTemplate {
            name: decl.name.clone(),
            fields,
            methods,
            env: globals,
        };
        self.env
            .borrow_mut()
            .define(decl.name.clone(), Value::new(ValueKind::Class(Rc::new(template))));
        Ok(())
    }

    fn instantiate(&mut self, class: &ClassTemplate, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        self.with_call_frame(&class.name, span, |this| this.construct(class, args, span))
    }

    fn construct(&mut self, class: &ClassTemplate, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        let instance = Rc::new(RefCell::new(Instance {
            class_name: class.name.clone(),
            fields: class.fields.clone(),
            methods: IndexMap::new(),
        }));
        let receiver = Value::instance(Rc::clone(&instance));
        let scope = Environment::with_parent(Rc::clone(&class.env));
        scope.borrow_mut().define("self", receiver.clone());
        instance.borrow_mut().methods = class
            .methods
            .iter()
            .map(|(name, decl)| {
                let method = UserFunction {
                    decl: Rc::clone(decl),
                    env: Rc::clone(&scope),
                };
                (name.clone(), Value::new(ValueKind::Function(method)))
            })
            .collect();

        let init = instance.borrow().methods.get("init").cloned();
        if let Some(init) = init {
            self.call_value(&init, args, span)?;
        }
        Ok(receiver)
    }

    /// Tracks nesting of user calls so runaway recursion becomes a catchable
    /// diagnostic.
    fn with_call_frame<T>(
        &mut self,
        name: &str,
        span: SourceSpan,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(runtime_error(
                DiagnosticKind::RecursionLimit,
                format!("call depth exceeded limit ({MAX_CALL_DEPTH}) while calling `{name}`"),
                span,
            ));
        }
        self.call_depth += 1;
        let result = f(self);
        self.call_depth -= 1;
        result
    }

    fn call_function(&mut self, function: &UserFunction, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        let decl = &function.decl;
        trace!("calling `{}` with {} argument(s)", decl.name, args.len());
        let scope = Environment::with_parent(Rc::clone(&function.env));
        {
            let mut frame = scope.borrow_mut();
            let mut args = args.into_iter();
            for param in &decl.params {
                frame.define(param.clone(), args.next().unwrap_or_else(Value::nil));
            }
        }
        self.with_call_frame(&decl.name, span, |this| {
            this.in_scope(scope, |this| match &decl.body {
                FunctionBody::Expr(expr) => this.evaluate(expr),
                FunctionBody::Block(body) => this.run_body(body),
            })
        })
    }

    fn run_task(&mut self, task: &TaskRef, span: SourceSpan) -> Result<Value> {
        let status = task.borrow().status.clone();
        let (body, env) = match status {
            TaskStatus::Done(value) => return Ok(value),
            TaskStatus::Running => {
                return Err(runtime_error(
                    DiagnosticKind::TypeMismatch,
                    format!("task `{}` awaited while it is running", task.borrow().name),
                    span,
                ));
            }
            TaskStatus::Pending { body, env } => (body, env),
        };
        debug!("running task `{}`", task.borrow().name);
        task.borrow_mut().status = TaskStatus::Running;
        let scope = Environment::with_parent(env);
        let result = self.in_scope(scope, |this| this.run_body(&body));
        task.borrow_mut().status =
            TaskStatus::Done(result.as_ref().map_or_else(|_| Value::nil(), Value::clone));
        result
    }

    fn drain_tasks(&mut self) -> Result<()> {
        while let Some(task) = self.tasks.pop_front() {
            let pending = matches!(task.borrow().status, TaskStatus::Pending { .. });
            if !pending {
                continue;
            }
            if let Err(err) = self.run_task(&task, SourceSpan::default()) {
                warn!("task `{}` failed: {err}", task.borrow().name);
                return Err(err);
            }
        }
        Ok(())
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal_value(literal)),
            ExprKind::Variable(name) => Environment::get(&self.env, name, expr.span),
            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                if !self.evaluate(left)?.is_truthy() {
                    return Ok(Value::bool(false));
                }
                Ok(Value::bool(self.evaluate(right)?.is_truthy()))
            }
            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                if self.evaluate(left)?.is_truthy() {
                    return Ok(Value::bool(true));
                }
                Ok(Value::bool(self.evaluate(right)?.is_truthy()))
            }
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                self.binary(*op, left_value, right_value, expr.span)
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                unary(*op, value, expr.span)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.call_value(&callee_value, args, expr.span)
            }
            ExprKind::Attribute { target, name } => {
                let target_value = self.evaluate(target)?;
                attribute(&target_value, name, expr.span)
            }
            ExprKind::Index { target, index } => {
                let target_value = self.evaluate(target)?;
                let index_value = self.evaluate(index)?;
                index_into(&target_value, &index_value, expr.span)
            }
            ExprKind::ListLiteral(elements) => {
                let values = elements
                    .iter()
                    .map(|element| self.evaluate(element))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::list(values))
            }
            ExprKind::MapLiteral(entries) => {
                let mut map = IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key = MapKey::from_value(&self.evaluate(key_expr)?, key_expr.span)?;
                    let value = self.evaluate(value_expr)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            ExprKind::Input(prompt) => {
                let prompt = match prompt {
                    Some(prompt) => Some(self.evaluate(prompt)?.to_string()),
                    None => None,
                };
                self.read_line(prompt.as_deref(), expr.span)
            }
            ExprKind::Await(operand) => {
                let value = self.evaluate(operand)?;
                match &*value.0 {
                    ValueKind::Task(task) => self.run_task(task, expr.span),
                    _ => Err(runtime_error(
                        DiagnosticKind::TypeMismatch,
                        format!("cannot await a value of type {}", value.type_name()),
                        expr.span,
                    )),
                }
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, left: Value, right: Value, span: SourceSpan) -> Result<Value> {
        use BinaryOp::*;
        match op {
            Add => add(&left, &right, span),
            Sub => arithmetic(op, &left, &right, span, i64::checked_sub, |a, b| a - b),
            Mul => arithmetic(op, &left, &right, span, i64::checked_mul, |a, b| a * b),
            Div => divide(&left, &right, span),
            Mod => modulo(&left, &right, span),
            Equal => Ok(Value::bool(left.equals(&right))),
            NotEqual => Ok(Value::bool(!left.equals(&right))),
            Less => compare(op, &left, &right, span).map(|ord| Value::bool(ord.is_lt())),
            LessEqual => compare(op, &left, &right, span).map(|ord| Value::bool(ord.is_le())),
            Greater => compare(op, &left, &right, span).map(|ord| Value::bool(ord.is_gt())),
            GreaterEqual => compare(op, &left, &right, span).map(|ord| Value::bool(ord.is_ge())),
            And => Ok(Value::bool(left.is_truthy() && right.is_truthy())),
            Or => Ok(Value::bool(left.is_truthy() || right.is_truthy())),
            Pipeline => self.call_value(&right, vec![left], span),
        }
    }
}

pub(crate) fn runtime_error(kind: DiagnosticKind, message: impl Into<String>, span: SourceSpan) -> UnikError {
    Diagnostic::runtime(kind, message, span).into()
}

/// Reports a Break/Continue/Return that reached a boundary it may not cross.
fn reject_signal(flow: &FlowControl) -> Result<()> {
    match flow {
        FlowControl::Next | FlowControl::NextValue(_) => Ok(()),
        FlowControl::Break(span) => Err(runtime_error(
            DiagnosticKind::BreakOutsideLoop,
            "`break` outside of a loop",
            *span,
        )),
        FlowControl::Continue(span) => Err(runtime_error(
            DiagnosticKind::ContinueOutsideLoop,
            "`continue` outside of a loop",
            *span,
        )),
        FlowControl::Return(_, span) => Err(runtime_error(
            DiagnosticKind::ReturnOutsideFunction,
            "`return` outside of a function",
            *span,
        )),
    }
}

fn loop_exit(flow: FlowControl) -> Option<FlowControl> {
    match flow {
        FlowControl::Next | FlowControl::NextValue(_) | FlowControl::Continue(_) => None,
        FlowControl::Break(_) => Some(FlowControl::Next),
        FlowControl::Return(..) => Some(flow),
    }
}

fn error_value(diagnostic: &Diagnostic) -> Value {
    let mut fields = IndexMap::new();
    fields.insert(
        MapKey::String("kind".to_string()),
        Value::string(diagnostic.kind.name()),
    );
    fields.insert(
        MapKey::String("message".to_string()),
        Value::string(diagnostic.message.clone()),
    );
    Value::map(fields)
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::int(*n),
        Literal::Float(n) => Value::float(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Nil => Value::nil(),
    }
}

fn number(value: &Value, span: SourceSpan) -> Result<f64> {
    value.as_number().ok_or_else(|| {
        runtime_error(
            DiagnosticKind::TypeMismatch,
            format!("expected a number, found {}", value.type_name()),
            span,
        )
    })
}

fn operands(op: BinaryOp, left: &Value, right: &Value, span: SourceSpan) -> Result<(f64, f64)> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(runtime_error(
            DiagnosticKind::TypeMismatch,
            format!(
                "unsupported operand types for `{}`: {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

fn add(left: &Value, right: &Value, span: SourceSpan) -> Result<Value> {
    match (&*left.0, &*right.0) {
        (ValueKind::String(_), _) | (_, ValueKind::String(_)) => {
            Ok(Value::string(format!("{left}{right}")))
        }
        (ValueKind::List(a), ValueKind::List(b)) => {
            Ok(Value::list(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => arithmetic(BinaryOp::Add, left, right, span, i64::checked_add, |a, b| a + b),
    }
}

/// Int op Int stays integral unless it overflows; anything else is computed
/// in floating point.
fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    span: SourceSpan,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    if let (ValueKind::Int(a), ValueKind::Int(b)) = (&*left.0, &*right.0) {
        if let Some(result) = int_op(*a, *b) {
            return Ok(Value::int(result));
        }
    }
    let (a, b) = operands(op, left, right, span)?;
    Ok(Value::float(float_op(a, b)))
}

fn divide(left: &Value, right: &Value, span: SourceSpan) -> Result<Value> {
    let (a, b) = operands(BinaryOp::Div, left, right, span)?;
    if b == 0.0 {
        return Err(runtime_error(DiagnosticKind::DivisionByZero, "division by zero", span));
    }
    if let (ValueKind::Int(x), ValueKind::Int(y)) = (&*left.0, &*right.0) {
        if x.checked_rem(*y) == Some(0) {
            if let Some(quotient) = x.checked_div(*y) {
                return Ok(Value::int(quotient));
            }
        }
    }
    Ok(Value::float(a / b))
}

/// The result takes the sign of the divisor.
fn modulo(left: &Value, right: &Value, span: SourceSpan) -> Result<Value> {
    let (a, b) = operands(BinaryOp::Mod, left, right, span)?;
    if b == 0.0 {
        return Err(runtime_error(DiagnosticKind::ModuloByZero, "modulo by zero", span));
    }
    if let (ValueKind::Int(x), ValueKind::Int(y)) = (&*left.0, &*right.0) {
        if let Some(rem) = x.checked_rem(*y) {
            let rem = if rem != 0 && (rem < 0) != (*y < 0) { rem + y } else { rem };
            return Ok(Value::int(rem));
        }
    }
    Ok(Value::float(a - b * (a / b).floor()))
}

fn compare(op: BinaryOp, left: &Value, right: &Value, span: SourceSpan) -> Result<Ordering> {
    let ordering = match (&*left.0, &*right.0) {
        (ValueKind::Int(a), ValueKind::Int(b)) => Some(a.cmp(b)),
        (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    ordering.ok_or_else(|| {
        runtime_error(
            DiagnosticKind::TypeMismatch,
            format!(
                "cannot compare {} and {} with `{}`",
                left.type_name(),
                right.type_name(),
                op.symbol()
            ),
            span,
        )
    })
}

fn unary(op: UnaryOp, value: Value, span: SourceSpan) -> Result<Value> {
    match (op, &*value.0) {
        (UnaryOp::Not, _) => Ok(Value::bool(!value.is_truthy())),
        (UnaryOp::Negate, ValueKind::Int(n)) => {
            Ok(n.checked_neg().map_or_else(|| Value::float(-(*n as f64)), Value::int))
        }
        (UnaryOp::Negate, ValueKind::Float(n)) => Ok(Value::float(-n)),
        (UnaryOp::Plus, ValueKind::Int(_) | ValueKind::Float(_)) => Ok(value.clone()),
        (UnaryOp::Negate | UnaryOp::Plus, _) => {
            let symbol = if op == UnaryOp::Negate { "-" } else { "+" };
            Err(runtime_error(
                DiagnosticKind::TypeMismatch,
                format!("unary `{symbol}` expects a number, found {}", value.type_name()),
                span,
            ))
        }
    }
}

/// Instance fields shadow instance methods; maps expose their string keys.
fn attribute(target: &Value, name: &str, span: SourceSpan) -> Result<Value> {
    match &*target.0 {
        ValueKind::Instance(instance) => {
            let instance = instance.borrow();
            instance.get_attr(name).ok_or_else(|| {
                runtime_error(
                    DiagnosticKind::AttributeError,
                    format!("`{}` instance has no attribute `{name}`", instance.class_name),
                    span,
                )
            })
        }
        ValueKind::Map(map) => map
            .get(&MapKey::String(name.to_string()))
            .cloned()
            .ok_or_else(|| {
                runtime_error(
                    DiagnosticKind::AttributeError,
                    format!("map has no key `{name}`"),
                    span,
                )
            }),
        _ => Err(runtime_error(
            DiagnosticKind::AttributeError,
            format!("value of type {} has no attribute `{name}`", target.type_name()),
            span,
        )),
    }
}

fn index_into(target: &Value, index: &Value, span: SourceSpan) -> Result<Value> {
    let out_of_range = || {
        runtime_error(
            DiagnosticKind::IndexOutOfRange,
            format!("index {index:?} is out of range for {}", target.type_name()),
            span,
        )
    };
    match (&*target.0, &*index.0) {
        (ValueKind::List(values), ValueKind::Int(idx)) => position(values.len(), *idx)
            .map(|idx| values[idx].clone())
            .ok_or_else(out_of_range),
        (ValueKind::String(text), ValueKind::Int(idx)) => {
            let chars: Vec<char> = text.chars().collect();
            position(chars.len(), *idx)
                .map(|idx| Value::string(chars[idx].to_string()))
                .ok_or_else(out_of_range)
        }
        (ValueKind::Map(map), _) => {
            let key = MapKey::from_value(index, span)?;
            map.get(&key).cloned().ok_or_else(out_of_range)
        }
        _ => Err(runtime_error(
            DiagnosticKind::TypeMismatch,
            format!(
                "cannot index {} with {}",
                target.type_name(),
                index.type_name()
            ),
            span,
        )),
    }
}

/// Negative indexes count from the end.
fn position(len: usize, index: i64) -> Option<usize> {
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs() as usize)?
    } else {
        index as usize
    };
    (resolved < len).then_some(resolved)
}

fn iterate(value: &Value, span: SourceSpan) -> Result<Vec<Value>> {
    match &*value.0 {
        ValueKind::List(values) => Ok(values.clone()),
        ValueKind::Map(map) => Ok(map.keys().map(MapKey::to_value).collect()),
        ValueKind::String(text) => Ok(text.chars().map(|ch| Value::string(ch.to_string())).collect()),
        _ => Err(runtime_error(
            DiagnosticKind::TypeMismatch,
            format!("value of type {} is not iterable", value.type_name()),
            span,
        )),
    }
}
