use super::builtin_class::{BuiltinClass, BuiltinInstance, BuiltinRegistry, MethodDef};
use super::errors::{ErrorKind, Eval, Signal};
use super::function::bind_arguments;
use super::interpreter::Interpreter;
use super::operations;
use super::symbol_table::SymbolTable;
use super::value::{ArrayRef, Number, Value};
use crate::radon_frontend::grammar::ModuleName;
use crate::radon_frontend::span::Span;

use std::fmt;
use std::rc::Rc;
use tracing::trace;

pub type NativeFnPtr = fn(&mut Interpreter, Vec<Value>, &Span) -> Eval;

/// A default that can live in a static parameter table.
#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Null,
    Int(i64),
    Str(&'static str),
}

impl DefaultValue {
    fn to_value(self) -> Value {
        match self {
            DefaultValue::Null => Value::Null,
            DefaultValue::Int(n) => Value::int(n),
            DefaultValue::Str(s) => Value::str(s),
        }
    }
}

#[derive(Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<DefaultValue>,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        ParamSpec {
            name,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, default: DefaultValue) -> Self {
        ParamSpec {
            name,
            default: Some(default),
        }
    }
}

/// An entry of the global builtin table.
pub struct NativeDef {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    pub func: NativeFnPtr,
}

enum Callable {
    Free(NativeFnPtr),
    Method(&'static MethodDef, BuiltinInstance),
}

pub struct NativeFnData {
    name: &'static str,
    params: &'static [ParamSpec],
    callable: Callable,
}

#[derive(Clone)]
pub struct NativeFn(Rc<NativeFnData>);

impl NativeFn {
    pub fn new(def: &'static NativeDef) -> Self {
        let data = NativeFnData {
            name: def.name,
            params: def.params,
            callable: Callable::Free(def.func),
        };
        NativeFn(Rc::new(data))
    }

    /// A method of a built-in instance, bound to that instance.
    pub fn method(def: &'static MethodDef, receiver: BuiltinInstance) -> Self {
        let data = NativeFnData {
            name: def.name,
            params: def.params,
            callable: Callable::Method(def, receiver),
        };
        NativeFn(Rc::new(data))
    }

    pub fn name(&self) -> &str {
        self.0.name
    }

    pub fn execute(
        &self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        interpreter: &mut Interpreter,
        call_span: &Span,
    ) -> Eval {
        let args = bind_static_params(self.0.params, args, kwargs, &format!("{:?}", self))
            .map_err(|kind| interpreter.error(kind, call_span))?;

        match &self.0.callable {
            Callable::Free(func) => func(interpreter, args, call_span),
            Callable::Method(def, receiver) => (def.func)(interpreter, receiver, args, call_span),
        }
    }
}

/// Argument binding against a static parameter table.
pub fn bind_static_params(
    params: &'static [ParamSpec],
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    callee: &str,
) -> Result<Vec<Value>, ErrorKind> {
    let params: Vec<_> = params
        .iter()
        .map(|p| (p.name, p.default.map(DefaultValue::to_value)))
        .collect();
    bind_arguments(&params, args, kwargs, callee)
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<built-in function {}>", self.0.name)
    }
}

impl PartialEq<NativeFn> for NativeFn {
    // Function pointers can't be compared reliably, so compare the Rcs.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// The global scope every program and module starts from.
pub fn global_table(registry: &BuiltinRegistry) -> SymbolTable {
    let globals = SymbolTable::new();
    globals.seed("null", Value::Null, true);
    globals.seed("true", Value::Boolean(true), true);
    globals.seed("false", Value::Boolean(false), true);

    for def in BUILTINS {
        globals.seed(def.name, Value::BuiltinFunction(NativeFn::new(def)), false);
    }
    for class in registry.classes() {
        globals.seed(class.name, Value::BuiltinClass(BuiltinClass::new(class)), false);
    }

    trace!(
        functions = BUILTINS.len(),
        classes = registry.classes().len(),
        "built global table"
    );
    globals
}

use DefaultValue as D;
use ParamSpec as P;

const VALUE: &[ParamSpec] = &[P::required("value")];
const PROMPT: &[ParamSpec] = &[P::optional("prompt", D::Str(""))];
const NONE: &[ParamSpec] = &[];

static BUILTINS: &[NativeDef] = &[
    NativeDef { name: "print", params: VALUE, func: print },
    NativeDef { name: "print_ret", params: VALUE, func: print_ret },
    NativeDef { name: "input", params: PROMPT, func: input },
    NativeDef { name: "input_int", params: PROMPT, func: input_int },
    NativeDef { name: "clear", params: NONE, func: clear },
    NativeDef { name: "len", params: VALUE, func: len },
    NativeDef { name: "str", params: VALUE, func: to_str },
    NativeDef { name: "int", params: VALUE, func: to_int },
    NativeDef { name: "float", params: VALUE, func: to_float },
    NativeDef { name: "bool", params: VALUE, func: to_bool },
    NativeDef { name: "type", params: VALUE, func: type_of },
    NativeDef { name: "is_num", params: VALUE, func: is_num },
    NativeDef { name: "is_int", params: VALUE, func: is_int },
    NativeDef { name: "is_float", params: VALUE, func: is_float },
    NativeDef { name: "is_str", params: VALUE, func: is_str },
    NativeDef { name: "is_bool", params: VALUE, func: is_bool },
    NativeDef { name: "is_array", params: VALUE, func: is_array },
    NativeDef { name: "is_map", params: VALUE, func: is_map },
    NativeDef { name: "is_fun", params: VALUE, func: is_fun },
    NativeDef { name: "is_null", params: VALUE, func: is_null },
    NativeDef {
        name: "arr_append",
        params: &[P::required("array"), P::required("item")],
        func: arr_append,
    },
    NativeDef {
        name: "arr_pop",
        params: &[P::required("array"), P::optional("index", D::Int(-1))],
        func: arr_pop,
    },
    NativeDef {
        name: "arr_extend",
        params: &[P::required("array"), P::required("other")],
        func: arr_extend,
    },
    NativeDef {
        name: "arr_find",
        params: &[P::required("array"), P::required("item")],
        func: arr_find,
    },
    NativeDef { name: "arr_len", params: &[P::required("array")], func: arr_len },
    NativeDef {
        name: "str_find",
        params: &[P::required("string"), P::required("sub")],
        func: str_find,
    },
    NativeDef {
        name: "range",
        params: &[
            P::required("start"),
            P::optional("end", D::Null),
            P::optional("step", D::Int(1)),
        ],
        func: range,
    },
    NativeDef { name: "copy", params: VALUE, func: copy },
    NativeDef { name: "dir", params: &[P::optional("value", D::Null)], func: dir },
    NativeDef { name: "require", params: &[P::required("path")], func: require },
    NativeDef { name: "exit", params: &[P::optional("code", D::Int(0))], func: exit },
    NativeDef { name: "time_now", params: NONE, func: time_now },
    NativeDef { name: "sys_args", params: NONE, func: sys_args },
];

fn type_error(expected: &str, param: &str, got: &Value) -> ErrorKind {
    ErrorKind::TypeMismatch(format!(
        "Expected {} for '{}', got {}",
        expected,
        param,
        got.type_name()
    ))
}

pub fn expect_string(value: &Value, param: &str) -> Result<String, ErrorKind> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(type_error("String", param, other)),
    }
}

pub fn expect_int(value: &Value, param: &str) -> Result<i64, ErrorKind> {
    match value {
        Value::Number(Number::Int(n)) => Ok(*n),
        other => Err(type_error("Int", param, other)),
    }
}

pub fn expect_array(value: &Value, param: &str) -> Result<ArrayRef, ErrorKind> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        other => Err(type_error("Array", param, other)),
    }
}

fn print(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let written = interp.write_output(&format!("{}\n", args[0]));
    interp.check(written, span)?;
    Ok(Value::Null)
}

fn print_ret(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::String(args[0].to_string()))
}

fn prompt_line(interp: &mut Interpreter, prompt: &Value, span: &Span) -> Eval<String> {
    let written = interp.write_output(&prompt.to_string());
    interp.check(written, span)?;
    let line = interp.read_line();
    interp.check(line, span)
}

fn input(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    prompt_line(interp, &args[0], span).map(Value::String)
}

fn input_int(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let line = prompt_line(interp, &args[0], span)?;
    let parsed = line.trim().parse::<i64>().map_err(|_| {
        ErrorKind::TypeMismatch(format!("'{}' is not an integer", line.trim()))
    });
    interp.check(parsed, span).map(Value::int)
}

fn clear(interp: &mut Interpreter, _args: Vec<Value>, span: &Span) -> Eval {
    let written = interp.write_output("\x1b[2J\x1b[1;1H");
    interp.check(written, span)?;
    Ok(Value::Null)
}

fn len(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let length = interp.length_of(&args[0], span)?;
    Ok(Value::int(length as i64))
}

fn to_str(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::String(args[0].to_string()))
}

fn to_int(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let converted = match &args[0] {
        Value::Number(Number::Int(n)) => Ok(*n),
        Value::Number(Number::Float(n)) => Ok(n.trunc() as i64),
        Value::Boolean(b) => Ok(*b as i64),
        Value::String(s) => {
            let text = s.trim();
            text.parse::<i64>()
                .or_else(|_| text.parse::<f64>().map(|n| n.trunc() as i64))
                .map_err(|_| ErrorKind::InvalidValue(format!("Cannot convert {:?} to Int", s)))
        }
        other => Err(type_error("a number or string", "value", other)),
    };
    interp.check(converted, span).map(Value::int)
}

fn to_float(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let converted = match &args[0] {
        Value::Number(n) => Ok(n.as_f64()),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ErrorKind::InvalidValue(format!("Cannot convert {:?} to Float", s))),
        other => Err(type_error("a number or string", "value", other)),
    };
    interp.check(converted, span).map(Value::float)
}

fn to_bool(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    interp.truthy(&args[0], span).map(Value::Boolean)
}

fn type_of(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::String(args[0].type_name()))
}

fn is_num(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(args[0], Value::Number(_))))
}

fn is_int(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(args[0], Value::Number(Number::Int(_)))))
}

fn is_float(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(args[0], Value::Number(Number::Float(_)))))
}

fn is_str(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(args[0], Value::String(_))))
}

fn is_bool(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(args[0], Value::Boolean(_))))
}

fn is_array(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(args[0], Value::Array(_))))
}

fn is_map(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(args[0], Value::HashMap(_))))
}

fn is_fun(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(
        args[0],
        Value::Function(_) | Value::BuiltinFunction(_)
    )))
}

fn is_null(_interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Boolean(matches!(args[0], Value::Null)))
}

fn arr_append(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let items = interp.check(expect_array(&args[0], "array"), span)?;
    items.borrow_mut().push(args[1].clone());
    Ok(args[0].clone())
}

fn arr_pop(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let items = interp.check(expect_array(&args[0], "array"), span)?;
    let len = items.borrow().len();
    let idx = interp.check(operations::resolve_index(&args[1], len, "array"), span)?;
    let popped = items.borrow_mut().remove(idx);
    Ok(popped)
}

fn arr_extend(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let items = interp.check(expect_array(&args[0], "array"), span)?;
    let extra = interp.iterate(&args[1], span)?;
    items.borrow_mut().extend(extra);
    Ok(args[0].clone())
}

fn arr_find(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let items = interp.check(expect_array(&args[0], "array"), span)?;
    let snapshot = items.borrow().clone();
    for (idx, item) in snapshot.iter().enumerate() {
        if interp.values_equal(item, &args[1], span)? {
            return Ok(Value::int(idx as i64));
        }
    }
    Ok(Value::int(-1))
}

fn arr_len(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let items = interp.check(expect_array(&args[0], "array"), span)?;
    let len = items.borrow().len();
    Ok(Value::int(len as i64))
}

fn str_find(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let haystack = interp.check(expect_string(&args[0], "string"), span)?;
    let needle = interp.check(expect_string(&args[1], "sub"), span)?;
    let position = match haystack.find(needle.as_str()) {
        Some(byte_idx) => haystack[..byte_idx].chars().count() as i64,
        None => -1,
    };
    Ok(Value::int(position))
}

fn range(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let first = interp.check(expect_int(&args[0], "start"), span)?;
    let (start, end) = match &args[1] {
        Value::Null => (0, first),
        end => (first, interp.check(expect_int(end, "end"), span)?),
    };
    let step = interp.check(expect_int(&args[2], "step"), span)?;
    if step == 0 {
        return Err(interp.error(
            ErrorKind::InvalidValue("range() step cannot be zero".to_owned()),
            span,
        ));
    }

    let mut items = vec![];
    let mut i = start;
    while (step > 0 && i < end) || (step < 0 && i > end) {
        items.push(Value::int(i));
        i = match i.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::array(items))
}

fn copy(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    interp.copy_value(&args[0], span)
}

fn dir(interp: &mut Interpreter, args: Vec<Value>, _span: &Span) -> Eval {
    let names: Vec<String> = match &args[0] {
        Value::Null => interp.env.visible_names(),
        Value::Instance(instance) => member_names(instance.members()),
        Value::Class(class) => member_names(class.members()),
        Value::Module(module) => member_names(module.table()),
        Value::BuiltinInstance(instance) => {
            instance.def().methods.iter().map(|m| m.name.to_owned()).collect()
        }
        Value::HashMap(map) => map.borrow().keys().cloned().collect(),
        _ => vec![],
    };
    Ok(Value::array(names.into_iter().map(Value::String).collect()))
}

fn member_names(table: &SymbolTable) -> Vec<String> {
    table.entries().into_iter().map(|(name, _)| name).collect()
}

fn require(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let path = interp.check(expect_string(&args[0], "path"), span)?;
    let name = if path.ends_with(".rn") {
        ModuleName::Path(path)
    } else {
        ModuleName::Named(path)
    };
    interp.load_module(&name, span).map(Value::Module)
}

fn exit(interp: &mut Interpreter, args: Vec<Value>, span: &Span) -> Eval {
    let code = interp.check(expect_int(&args[0], "code"), span)?;
    let code = i32::try_from(code)
        .map_err(|_| ErrorKind::InvalidValue(format!("Exit code {} is out of range", code)));
    Err(Signal::Exit(interp.check(code, span)?))
}

fn time_now(interp: &mut Interpreter, _args: Vec<Value>, span: &Span) -> Eval {
    use std::time::{SystemTime, UNIX_EPOCH};
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ErrorKind::Io(e.to_string()));
    let duration = interp.check(elapsed, span)?;
    Ok(Value::float(duration.as_secs_f64()))
}

fn sys_args(interp: &mut Interpreter, _args: Vec<Value>, _span: &Span) -> Eval {
    let args = interp
        .config
        .program_args
        .iter()
        .map(|a| Value::str(a))
        .collect();
    Ok(Value::array(args))
}
