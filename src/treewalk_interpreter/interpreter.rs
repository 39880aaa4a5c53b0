use super::builtin_class::BuiltinRegistry;
use super::class::{RadonClass, RadonInstance};
use super::context::Context;
use super::errors::{ErrorKind, Eval, RuntimeError, Signal};
use super::function::RadonFn;
use super::module_resolver::{self, ModuleResolver, RadonModule};
use super::native_function::global_table;
use super::operations;
use super::symbol_table::SymbolTable;
use super::value::{Number, Value};
use crate::config::Config;
use crate::radon_frontend::grammar::{
    AssignTarget, Body, Expr, ExprType, Fixity, FuncInfo, IfCase, Literal, ModuleName, Qualifier,
    SliceInfo, SwitchCase,
};
use crate::radon_frontend::operator::{BinaryOperator, LogicalOperator, StepOperator, UnaryOperator};
use crate::radon_frontend::span::Span;
use crate::radon_frontend::{parse, tokenize};
use crate::{RadonError, RunOutcome};

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use tracing::debug;

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

pub struct Interpreter {
    pub env: SymbolTable,
    pub context: Rc<Context>,
    pub config: Rc<Config>,
    pub registry: Rc<BuiltinRegistry>,
    pub(crate) resolver: ModuleResolver,
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
    call_depth: usize,
}

/// An assignable location, evaluated once so that compound assignment and
/// `++`/`--` don't evaluate the target expression twice.
enum Place {
    Variable(String),
    Attribute(Value, String),
    Index(Value, Value),
}

enum LoopFlow {
    Next(Option<Value>),
    Stop,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Interpreter::with_io(
            config,
            Box::new(io::stdout()),
            Box::new(io::stdin().lock()),
        )
    }

    pub fn with_io(config: Config, output: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        let registry = Rc::new(BuiltinRegistry::default());
        let globals = global_table(&registry);

        Interpreter {
            env: SymbolTable::with_parent(&globals),
            context: Context::root("<program>", None),
            config: Rc::new(config),
            registry,
            resolver: ModuleResolver::new(),
            output,
            input,
            call_depth: 0,
        }
    }

    /// Runs source text in the interpreter's current scope. Bindings made
    /// by the program stay visible to the next call.
    pub fn run(&mut self, source_name: &str, text: &str) -> RunOutcome {
        debug!(source = source_name, "running program");

        let tokens = match tokenize(source_name, text) {
            Ok(tokens) => tokens,
            Err(e) => return RunOutcome::failed(RadonError::Lexer(e)),
        };
        let ast = match parse(tokens) {
            Ok(ast) => ast,
            Err(e) => return RunOutcome::failed(RadonError::Parser(e)),
        };

        match self.eval_program(&ast) {
            Ok(value) | Err(Signal::Return(value)) => RunOutcome::finished(value),
            Err(Signal::Exit(code)) => {
                debug!(code, "program exited");
                RunOutcome::exited(code)
            }
            Err(Signal::Error(e)) => RunOutcome::failed(RadonError::Runtime(e)),
            Err(signal) => {
                let kind = signal
                    .stray_control()
                    .unwrap_or(ErrorKind::StrayControl("signal", "construct"));
                let error = RuntimeError::new(kind, ast.span.clone(), self.context.clone());
                RunOutcome::failed(RadonError::Runtime(error))
            }
        }
    }

    /// Top-level statements, with loop and switch signals that escape a
    /// statement reported at that statement.
    fn eval_program(&mut self, ast: &Expr) -> Eval {
        let stmts = match &ast.expr {
            ExprType::Statements(stmts) => stmts,
            _ => return self.eval_expression(ast),
        };

        let mut last = Value::Null;
        for stmt in stmts.iter() {
            last = match self.eval_expression(stmt) {
                Ok(value) => value,
                Err(signal) => match signal.stray_control() {
                    Some(kind) => return Err(self.error(kind, &stmt.span)),
                    None => return Err(signal),
                },
            };
        }
        Ok(last)
    }

    pub fn error(&self, kind: ErrorKind, span: &Span) -> Signal {
        Signal::Error(RuntimeError::new(kind, span.clone(), self.context.clone()))
    }

    pub fn check<T>(&self, result: Result<T, ErrorKind>, span: &Span) -> Eval<T> {
        result.map_err(|kind| self.error(kind, span))
    }

    /// Runs `f` with the given scope and context, restoring the current ones
    /// afterwards whatever the outcome.
    pub fn run_in<T>(
        &mut self,
        env: SymbolTable,
        context: Rc<Context>,
        f: impl FnOnce(&mut Self) -> Eval<T>,
    ) -> Eval<T> {
        let prev_env = std::mem::replace(&mut self.env, env);
        let prev_context = std::mem::replace(&mut self.context, context);
        let result = f(self);
        self.env = prev_env;
        self.context = prev_context;
        result
    }

    /// `run_in` for a function call, bounded by the configured call depth.
    pub fn run_frame<T>(
        &mut self,
        env: SymbolTable,
        context: Rc<Context>,
        call_span: &Span,
        f: impl FnOnce(&mut Self) -> Eval<T>,
    ) -> Eval<T> {
        let limit = self.config.max_call_depth;
        if self.call_depth >= limit {
            return Err(self.error(ErrorKind::CallDepth(limit), call_span));
        }
        self.call_depth += 1;
        let result = self.run_in(env, context, f);
        self.call_depth -= 1;
        result
    }

    fn in_block<T>(&mut self, f: impl FnOnce(&mut Self) -> Eval<T>) -> Eval<T> {
        let env = SymbolTable::with_parent(&self.env);
        let context = self.context.clone();
        self.run_in(env, context, f)
    }

    pub fn load_module(&mut self, name: &ModuleName, span: &Span) -> Eval<RadonModule> {
        module_resolver::load_module(self, name, span)
    }

    pub fn write_output(&mut self, text: &str) -> Result<(), ErrorKind> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|_| self.output.flush())
            .map_err(|e| ErrorKind::Io(e.to_string()))
    }

    /// One line of input without its line ending. Empty at end of input.
    pub fn read_line(&mut self) -> Result<String, ErrorKind> {
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .map_err(|e| ErrorKind::Io(e.to_string()))?;
        let trimmed = line.trim_end_matches(&['\n', '\r'][..]).len();
        line.truncate(trimmed);
        Ok(line)
    }

    /// Evaluates one node, growing the host stack when it runs low so that
    /// deep recursion stops at the call depth limit instead of overflowing.
    pub fn eval_expression(&mut self, expr: &Expr) -> Eval {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_node(expr))
    }

    fn eval_node(&mut self, expr: &Expr) -> Eval {
        let span = &expr.span;
        match &expr.expr {
            ExprType::Literal(l) => Ok(self.eval_literal(l)),
            ExprType::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items.iter() {
                    values.push(self.eval_expression(item)?);
                }
                Ok(Value::array(values))
            }
            ExprType::HashMap(pairs) => self.eval_hashmap(pairs),
            ExprType::Statements(stmts) => {
                let mut last = Value::Null;
                for stmt in stmts.iter() {
                    last = self.eval_expression(stmt)?;
                }
                Ok(last)
            }
            ExprType::Variable(name) => match self.env.get(name) {
                Some(value) => Ok(value),
                None => Err(self.error(ErrorKind::NameNotDefined(name.clone()), span)),
            },
            ExprType::Assign(target, qualifier, value) => {
                let place = self.eval_place(target)?;
                let value = self.eval_expression(value)?;
                self.write_place(&place, value.clone(), *qualifier, span)?;
                Ok(value)
            }
            ExprType::CompoundAssign(target, op, value) => {
                let place = self.eval_place(target)?;
                let current = self.read_place(&place, span)?;
                let rhs = self.eval_expression(value)?;
                let updated = self.binary_op(*op, &current, &rhs, span)?;
                self.write_place(&place, updated.clone(), Qualifier::Static, span)?;
                Ok(updated)
            }
            ExprType::Step(target, op, fixity) => self.eval_step(target, *op, *fixity, span),
            ExprType::Binary(op, lhs, rhs) => {
                let lhs = self.eval_expression(lhs)?;
                let rhs = self.eval_expression(rhs)?;
                self.binary_op(*op, &lhs, &rhs, span)
            }
            ExprType::Logical(op, lhs, rhs) => self.eval_logical_operator(*op, lhs, rhs, span),
            ExprType::Unary(op, operand) => {
                let value = self.eval_expression(operand)?;
                self.unary_op(*op, &value, span)
            }
            ExprType::If(cases, else_body) => self.eval_if(cases, else_body.as_ref()),
            ExprType::For {
                var,
                start,
                end,
                step,
                body,
            } => self.eval_for(var, start, end, step.as_deref(), body),
            ExprType::ForIn {
                var,
                iterable,
                body,
            } => {
                let iterable = self.eval_expression(iterable)?;
                let items = self.loop_items(&iterable, span)?;
                self.run_loop(body, Some(var.as_str()), items.map(Some))
            }
            ExprType::While(condition, body) => self.eval_while(condition, body),
            ExprType::FuncDef(info, qualifier) => self.eval_func_def(info, *qualifier, span),
            ExprType::Call(callee, args, kwargs) => {
                let callee = self.eval_expression(callee)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args.iter() {
                    arg_values.push(self.eval_expression(arg)?);
                }
                let mut kwarg_values = Vec::with_capacity(kwargs.len());
                for (name, arg) in kwargs.iter() {
                    kwarg_values.push((name.clone(), self.eval_expression(arg)?));
                }
                self.call_value(&callee, arg_values, kwarg_values, span)
            }
            ExprType::Return(value) => {
                let value = match value {
                    Some(value) => self.eval_expression(value)?,
                    None => Value::Null,
                };
                Err(Signal::Return(value))
            }
            ExprType::Continue => Err(Signal::Continue),
            ExprType::Break => Err(Signal::Break),
            ExprType::Fallthrough => Err(Signal::Fallthrough),
            ExprType::Fallout => Err(Signal::Fallout),
            ExprType::Try {
                body,
                catch_var,
                handler,
            } => self.eval_try(body, catch_var.as_deref(), handler.as_deref()),
            ExprType::Switch {
                subject,
                cases,
                default,
            } => self.eval_switch(subject, cases, default.as_deref(), span),
            ExprType::ClassDef(name, body) => self.eval_class_def(name, body, span),
            ExprType::Index(target, index) => {
                let target = self.eval_expression(target)?;
                let index = self.eval_expression(index)?;
                self.get_index(&target, &index, span)
            }
            ExprType::Slice(target, slice) => self.eval_slice(target, slice, span),
            ExprType::Attribute(target, name) => {
                let target = self.eval_expression(target)?;
                self.get_attribute(&target, name, span)
            }
            ExprType::Import(module, alias) => {
                let module = self.load_module(module, span)?;
                let name = alias.clone().unwrap_or_else(|| module.name().to_owned());
                let value = Value::Module(module);
                self.check(self.env.define_const(&name, value.clone()), span)?;
                Ok(value)
            }
            ExprType::FromImport(module, names) => {
                let module = self.load_module(module, span)?;
                for name in names.iter() {
                    let value = match module.get(name) {
                        Some(value) => value,
                        None => {
                            return Err(self.error(
                                ErrorKind::AttributeNotDefined(name.clone(), format!("{:?}", module)),
                                span,
                            ))
                        }
                    };
                    self.check(self.env.define_const(name, value), span)?;
                }
                Ok(Value::Null)
            }
            ExprType::Include(module) => {
                let module = self.load_module(module, span)?;
                for (name, value) in module.table().entries() {
                    self.check(self.env.set(&name, value), span)?;
                }
                Ok(Value::Null)
            }
            ExprType::Raise(name, message) => {
                let message = match message {
                    Some(message) => self.eval_expression(message)?.to_string(),
                    None => String::new(),
                };
                Err(self.error(ErrorKind::Raised(name.clone(), message), span))
            }
            ExprType::Assert(condition, message) => {
                let condition = self.eval_expression(condition)?;
                if self.truthy(&condition, span)? {
                    return Ok(Value::Null);
                }
                let message = match message {
                    Some(message) => self.eval_expression(message)?.to_string(),
                    None => "Assertion failed".to_owned(),
                };
                Err(self.error(ErrorKind::AssertionFailed(message), span))
            }
            ExprType::Del(name) => {
                self.check(self.env.remove(name), span)?;
                Ok(Value::Null)
            }
        }
    }

    fn eval_literal(&self, l: &Literal) -> Value {
        match l {
            Literal::Int(n) => Value::int(*n),
            Literal::Float(n) => Value::float(*n),
            Literal::Str(s) => Value::String(s.clone()),
        }
    }

    fn eval_hashmap(&mut self, pairs: &[(Expr, Expr)]) -> Eval {
        let mut map = BTreeMap::new();
        for (key_expr, value_expr) in pairs.iter() {
            let key = self.eval_expression(key_expr)?;
            let key = self.check(operations::map_key(&key), &key_expr.span)?;
            let value = self.eval_expression(value_expr)?;
            map.insert(key, value);
        }
        Ok(Value::hashmap(map))
    }

    fn eval_place(&mut self, target: &AssignTarget) -> Eval<Place> {
        Ok(match target {
            AssignTarget::Variable(name) => Place::Variable(name.clone()),
            AssignTarget::Attribute(object, name) => {
                Place::Attribute(self.eval_expression(object)?, name.clone())
            }
            AssignTarget::Index(object, index) => {
                let object = self.eval_expression(object)?;
                Place::Index(object, self.eval_expression(index)?)
            }
        })
    }

    fn read_place(&mut self, place: &Place, span: &Span) -> Eval {
        match place {
            Place::Variable(name) => match self.env.get(name) {
                Some(value) => Ok(value),
                None => Err(self.error(ErrorKind::NameNotDefined(name.clone()), span)),
            },
            Place::Attribute(object, name) => self.get_attribute(object, name, span),
            Place::Index(object, index) => self.get_index(object, index, span),
        }
    }

    fn write_place(&mut self, place: &Place, value: Value, qualifier: Qualifier, span: &Span) -> Eval<()> {
        match place {
            Place::Variable(name) => {
                let written = match qualifier {
                    Qualifier::Local => self.env.set(name, value),
                    Qualifier::Const => self.env.define_const(name, value),
                    Qualifier::Static => self.env.set_static(name, value),
                };
                self.check(written, span)
            }
            Place::Attribute(object, name) => self.set_attribute(object, name, value, span),
            Place::Index(object, index) => self.set_index(object, index, value, span),
        }
    }

    fn eval_step(&mut self, target: &AssignTarget, op: StepOperator, fixity: Fixity, span: &Span) -> Eval {
        let place = self.eval_place(target)?;
        let current = self.read_place(&place, span)?;
        let updated = self.binary_op(op.as_binary(), &current, &Value::int(1), span)?;
        self.write_place(&place, updated.clone(), Qualifier::Static, span)?;
        Ok(match fixity {
            Fixity::Prefix => updated,
            Fixity::Postfix => current,
        })
    }

    fn eval_logical_operator(
        &mut self,
        op: LogicalOperator,
        lhs: &Expr,
        rhs: &Expr,
        span: &Span,
    ) -> Eval {
        let lhs = self.eval_expression(lhs)?;

        if let Value::Instance(instance) = &lhs {
            if let Some(method) = instance.method(op.dunder()) {
                let rhs = self.eval_expression(rhs)?;
                return method.execute(vec![rhs], vec![], self, span);
            }
        }

        // Handle short circuiting.
        let lhs = self.truthy(&lhs, span)?;
        let result = match op {
            LogicalOperator::And if !lhs => false,
            LogicalOperator::Or if lhs => true,
            _ => {
                let rhs = self.eval_expression(rhs)?;
                self.truthy(&rhs, span)?
            }
        };
        Ok(Value::Boolean(result))
    }

    fn eval_body(&mut self, body: &Body) -> Eval {
        let value = self.in_block(|i| i.eval_expression(&body.expr))?;
        Ok(if body.braced { Value::Null } else { value })
    }

    fn eval_if(&mut self, cases: &[IfCase], else_body: Option<&Body>) -> Eval {
        for case in cases.iter() {
            let condition = self.eval_expression(&case.condition)?;
            if self.truthy(&condition, &case.condition.span)? {
                return self.eval_body(&case.body);
            }
        }
        match else_body {
            Some(body) => self.eval_body(body),
            None => Ok(Value::Null),
        }
    }

    fn eval_number(&mut self, expr: &Expr, what: &str) -> Eval<Number> {
        match self.eval_expression(expr)? {
            Value::Number(n) => Ok(n),
            other => Err(self.error(
                ErrorKind::TypeMismatch(format!(
                    "Loop {} must be a number, got {}",
                    what,
                    other.type_name()
                )),
                &expr.span,
            )),
        }
    }

    /// `for i = start to end step s`: half-open, counting in the direction
    /// of the step.
    fn eval_for(&mut self, var: &str, start: &Expr, end: &Expr, step: Option<&Expr>, body: &Body) -> Eval {
        let start = self.eval_number(start, "start")?;
        let end = self.eval_number(end, "end")?;
        let step = match step {
            Some(step_expr) => {
                let step = self.eval_number(step_expr, "step")?;
                if step.is_zero() {
                    return Err(self.error(
                        ErrorKind::InvalidValue("Loop step cannot be zero".to_owned()),
                        &step_expr.span,
                    ));
                }
                step
            }
            None => Number::Int(1),
        };

        let ascending = step.as_f64() > 0.0;
        let counter = std::iter::successors(Some(start), move |i| {
            operations::arith_add(*i, step).ok()
        })
        .take_while(move |i| if ascending { *i < end } else { *i > end })
        .map(|i| Some(Value::Number(i)));

        self.run_loop(body, Some(var), counter)
    }

    fn eval_while(&mut self, condition: &Expr, body: &Body) -> Eval {
        let mut results = vec![];
        loop {
            let value = self.eval_expression(condition)?;
            if !self.truthy(&value, &condition.span)? {
                break;
            }
            match self.run_iteration(body, None, None)? {
                LoopFlow::Next(Some(value)) => results.push(value),
                LoopFlow::Next(None) => {}
                LoopFlow::Stop => break,
            }
        }
        Ok(if body.braced { Value::Null } else { Value::array(results) })
    }

    /// Drives a loop body over `items`, rebinding the loop variable in the
    /// enclosing scope. Brace bodies yield null, statement bodies collect
    /// their values into an array.
    fn run_loop(
        &mut self,
        body: &Body,
        var: Option<&str>,
        items: impl Iterator<Item = Option<Value>>,
    ) -> Eval {
        let mut results = vec![];
        for item in items {
            match self.run_iteration(body, var, item)? {
                LoopFlow::Next(Some(value)) => results.push(value),
                LoopFlow::Next(None) => {}
                LoopFlow::Stop => break,
            }
        }
        Ok(if body.braced { Value::Null } else { Value::array(results) })
    }

    fn run_iteration(&mut self, body: &Body, var: Option<&str>, item: Option<Value>) -> Eval<LoopFlow> {
        if let (Some(var), Some(item)) = (var, item) {
            let bound = self.env.set(var, item);
            self.check(bound, &body.expr.span)?;
        }

        match self.in_block(|i| i.eval_expression(&body.expr)) {
            Ok(value) => Ok(LoopFlow::Next(Some(value))),
            Err(Signal::Continue) => Ok(LoopFlow::Next(None)),
            Err(Signal::Break) => Ok(LoopFlow::Stop),
            Err(signal) => Err(signal),
        }
    }

    fn eval_func_def(&mut self, info: &Rc<FuncInfo>, qualifier: Qualifier, span: &Span) -> Eval {
        let mut defaults = Vec::with_capacity(info.params.len());
        for param in info.params.iter() {
            defaults.push(match &param.default {
                Some(default) => Some(self.eval_expression(default)?),
                None => None,
            });
        }

        let func = Value::Function(RadonFn::new(info.clone(), defaults, self.env.clone()));
        if let Some(name) = &info.name {
            let bound = match qualifier {
                Qualifier::Static => self.env.set_static(name, func.clone()),
                Qualifier::Const => self.env.define_const(name, func.clone()),
                Qualifier::Local => self.env.set(name, func.clone()),
            };
            self.check(bound, span)?;
        }
        Ok(func)
    }

    fn eval_try(&mut self, body: &Expr, catch_var: Option<&str>, handler: Option<&Expr>) -> Eval {
        let error = match self.in_block(|i| i.eval_expression(body)) {
            Ok(_) => return Ok(Value::Null),
            Err(Signal::Error(error)) => error,
            Err(signal) => return Err(signal),
        };

        let handler = match handler {
            Some(handler) => handler,
            None => return Ok(Value::Null),
        };

        let scope = SymbolTable::with_parent(&self.env);
        if let Some(var) = catch_var {
            scope.seed(var, Value::String(error.kind.to_string()), false);
        }
        let context = self.context.clone();

        match self.run_in(scope, context, |i| i.eval_expression(handler)) {
            Ok(_) => Ok(Value::Null),
            Err(Signal::Error(new_error)) => Err(Signal::Error(new_error.chained(error))),
            Err(signal) => Err(signal),
        }
    }

    /// Cases are compared lazily in order. `break` leaves the switch,
    /// `fallthrough` runs the next body once, and `fallout` keeps falling
    /// until a `break` or the end. `default` runs when nothing matched or
    /// when control falls off the last case.
    fn eval_switch(
        &mut self,
        subject: &Expr,
        cases: &[SwitchCase],
        default: Option<&Expr>,
        span: &Span,
    ) -> Eval {
        let subject = self.eval_expression(subject)?;
        let mut matched = false;
        let mut falling = false;
        let mut sticky = false;

        for case in cases.iter() {
            if !falling {
                let value = self.eval_expression(&case.value)?;
                if !self.values_equal(&subject, &value, span)? {
                    continue;
                }
            }
            matched = true;

            match self.in_block(|i| i.eval_expression(&case.body)) {
                Ok(_) if sticky => falling = true,
                Ok(_) | Err(Signal::Break) => return Ok(Value::Null),
                Err(Signal::Fallthrough) => falling = true,
                Err(Signal::Fallout) => {
                    sticky = true;
                    falling = true;
                }
                Err(signal) => return Err(signal),
            }
        }

        if let Some(default) = default {
            if !matched || falling {
                match self.in_block(|i| i.eval_expression(default)) {
                    Ok(_) | Err(Signal::Break) | Err(Signal::Fallthrough) | Err(Signal::Fallout) => {}
                    Err(signal) => return Err(signal),
                }
            }
        }
        Ok(Value::Null)
    }

    fn eval_class_def(&mut self, name: &str, body: &Expr, span: &Span) -> Eval {
        let members = SymbolTable::with_parent(&self.env);
        let context = Context::child(&self.context, &format!("<class {}>", name), span.clone());
        self.run_in(members.clone(), context, |i| i.eval_expression(body))?;

        let class = Value::Class(RadonClass::new(name.to_owned(), members));
        self.check(self.env.set(name, class.clone()), span)?;
        Ok(class)
    }

    fn eval_slice(&mut self, target: &Expr, slice: &SliceInfo, span: &Span) -> Eval {
        let target = self.eval_expression(target)?;
        let mut bounds = Vec::with_capacity(3);
        for part in [&slice.start, &slice.end, &slice.step] {
            bounds.push(match part {
                Some(expr) => Some(self.eval_expression(expr)?),
                None => None,
            });
        }
        let result = operations::slice(&target, bounds[0].as_ref(), bounds[1].as_ref(), bounds[2].as_ref());
        self.check(result, span)
    }

    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        span: &Span,
    ) -> Eval {
        match callee {
            Value::Function(func) => func.execute(args, kwargs, self, span),
            Value::BuiltinFunction(func) => func.execute(args, kwargs, self, span),
            Value::Class(class) => class.execute(args, kwargs, self, span),
            Value::BuiltinClass(class) => class.instantiate(args, kwargs, self, span),
            Value::Instance(instance) => match instance.method("__call__") {
                Some(method) => method.execute(args, kwargs, self, span),
                None => Err(self.error(ErrorKind::NotCallable(callee.type_name()), span)),
            },
            other => Err(self.error(ErrorKind::NotCallable(other.type_name()), span)),
        }
    }

    fn call_dunder(&mut self, instance: &RadonInstance, name: &str, args: Vec<Value>, span: &Span) -> Option<Eval> {
        let method = instance.method(name)?;
        Some(method.execute(args, vec![], self, span))
    }

    /// The dunder behind a protocol hook on either kind of instance.
    fn dispatch(&mut self, target: &Value, name: &str, args: Vec<Value>, span: &Span) -> Option<Eval> {
        match target {
            Value::Instance(instance) => self.call_dunder(instance, name, args, span),
            Value::BuiltinInstance(instance) => instance.call_operator(name, args, vec![], self, span),
            _ => None,
        }
    }

    pub fn truthy(&mut self, value: &Value, span: &Span) -> Eval<bool> {
        match self.dispatch(value, "__truthy__", vec![], span) {
            Some(result) => Ok(result?.is_true()),
            None => Ok(value.is_true()),
        }
    }

    pub fn length_of(&mut self, value: &Value, span: &Span) -> Eval<usize> {
        match self.dispatch(value, "__len__", vec![], span) {
            Some(result) => match result? {
                Value::Number(Number::Int(n)) if n >= 0 => Ok(n as usize),
                other => Err(self.error(
                    ErrorKind::TypeMismatch(format!(
                        "__len__ must return a non-negative Int, got {}",
                        other.type_name()
                    )),
                    span,
                )),
            },
            None => self.check(operations::length(value), span),
        }
    }

    /// The items a `for ... in` loop visits. `__iter__` returns any
    /// iterable value.
    pub fn iterate(&mut self, value: &Value, span: &Span) -> Eval<Vec<Value>> {
        match self.dispatch(value, "__iter__", vec![], span) {
            Some(result) => {
                let iterable = result?;
                self.check(operations::iterate(&iterable), span)
            }
            None => self.check(operations::iterate(value), span),
        }
    }

    /// Like `iterate`, but an array (or an array returned by `__iter__`)
    /// is walked live.
    pub fn loop_items(&mut self, value: &Value, span: &Span) -> Eval<operations::LoopItems> {
        match self.dispatch(value, "__iter__", vec![], span) {
            Some(result) => {
                let iterable = result?;
                self.check(operations::loop_items(&iterable), span)
            }
            None => self.check(operations::loop_items(value), span),
        }
    }

    pub fn copy_value(&mut self, value: &Value, span: &Span) -> Eval {
        if let Some(result) = self.dispatch(value, "__copy__", vec![], span) {
            return result;
        }
        match value {
            Value::Instance(instance) => {
                let copy = self.check(instance.shallow_copy(), span)?;
                Ok(Value::Instance(copy))
            }
            other => Ok(other.shallow_copy()),
        }
    }

    pub fn values_equal(&mut self, lhs: &Value, rhs: &Value, span: &Span) -> Eval<bool> {
        match lhs {
            Value::Instance(_) | Value::BuiltinInstance(_) => {
                let result = self.binary_op(BinaryOperator::EqualTo, lhs, rhs, span)?;
                Ok(result.is_true())
            }
            _ => Ok(lhs == rhs),
        }
    }

    pub fn binary_op(&mut self, op: BinaryOperator, lhs: &Value, rhs: &Value, span: &Span) -> Eval {
        // `in` is answered by the container on the right.
        if op == BinaryOperator::In {
            if let Some(result) = self.dispatch(rhs, op.dunder(), vec![lhs.clone()], span) {
                return result;
            }
        } else if let Some(result) = self.dispatch(lhs, op.dunder(), vec![rhs.clone()], span) {
            return result;
        }

        match lhs {
            Value::Instance(_) | Value::BuiltinInstance(_) => match op {
                _ if operations::divides_by_zero(op, rhs) => Err(self.error(ErrorKind::DivisionByZero, span)),
                BinaryOperator::EqualTo => Ok(Value::Boolean(lhs == rhs)),
                BinaryOperator::NotEqualTo => {
                    match self.dispatch(lhs, BinaryOperator::EqualTo.dunder(), vec![rhs.clone()], span) {
                        Some(result) => Ok(Value::Boolean(!result?.is_true())),
                        None => Ok(Value::Boolean(lhs != rhs)),
                    }
                }
                BinaryOperator::In => self.check(operations::binary_op(op, lhs, rhs), span),
                _ => Err(self.error(ErrorKind::illegal_binary(op.symbol(), lhs, rhs), span)),
            },
            _ => self.check(operations::binary_op(op, lhs, rhs), span),
        }
    }

    fn unary_op(&mut self, op: UnaryOperator, value: &Value, span: &Span) -> Eval {
        match op {
            UnaryOperator::LogicalNot => Ok(Value::Boolean(!self.truthy(value, span)?)),
            _ => self.check(operations::unary_op(op, value), span),
        }
    }

    pub fn get_index(&mut self, target: &Value, index: &Value, span: &Span) -> Eval {
        match self.dispatch(target, "__getitem__", vec![index.clone()], span) {
            Some(result) => result,
            None => self.check(operations::get_index(target, index), span),
        }
    }

    pub fn set_index(&mut self, target: &Value, index: &Value, value: Value, span: &Span) -> Eval<()> {
        match self.dispatch(target, "__setitem__", vec![index.clone(), value.clone()], span) {
            Some(result) => result.map(|_| ()),
            None => self.check(operations::set_index(target, index, value), span),
        }
    }

    pub fn get_attribute(&mut self, target: &Value, name: &str, span: &Span) -> Eval {
        let found = match target {
            Value::Instance(instance) => instance.get(name),
            Value::Class(class) => class.members().get_local(name),
            Value::Module(module) => module.get(name),
            Value::BuiltinInstance(instance) => instance
                .members()
                .get_local(name)
                .or_else(|| instance.get_method(name).map(Value::BuiltinFunction)),
            other => {
                return Err(self.error(
                    ErrorKind::IllegalOperation(format!(
                        "'.{}' on {}",
                        name,
                        other.type_name()
                    )),
                    span,
                ))
            }
        };

        match found {
            Some(value) => Ok(value),
            None => Err(self.error(
                ErrorKind::AttributeNotDefined(name.to_owned(), describe_target(target)),
                span,
            )),
        }
    }

    pub fn set_attribute(&mut self, target: &Value, name: &str, value: Value, span: &Span) -> Eval<()> {
        let written = match target {
            Value::Instance(instance) => instance.set(name, value),
            Value::Class(class) => class.members().set(name, value),
            Value::Module(module) => module.table().set(name, value),
            Value::BuiltinInstance(instance) => instance.members().set(name, value),
            other => Err(ErrorKind::IllegalOperation(format!(
                "'.{} =' on {}",
                name,
                other.type_name()
            ))),
        };
        self.check(written, span)
    }
}

fn describe_target(target: &Value) -> String {
    match target {
        Value::BuiltinInstance(instance) => format!("<instance of {}>", instance.def().name),
        other => other.to_string(),
    }
}
