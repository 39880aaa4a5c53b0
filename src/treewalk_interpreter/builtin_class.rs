//! Host-implemented classes. Each capability is declared once as a static
//! table of operators and methods, and a registry built at interpreter start
//! decides which of them the global scope exposes.

use super::builtin_objects::{FILE_CLASS, JSON_CLASS, STRING_CLASS};
use super::class::CONSTRUCTOR_STR;
use super::errors::{ErrorKind, Eval};
use super::interpreter::Interpreter;
use super::native_function::{bind_static_params, NativeFn, ParamSpec};
use super::symbol_table::SymbolTable;
use super::value::Value;
use crate::radon_frontend::span::Span;

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

pub type MethodFn = fn(&mut Interpreter, &BuiltinInstance, Vec<Value>, &Span) -> Eval;

pub struct MethodDef {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    pub func: MethodFn,
}

pub struct BuiltinClassDef {
    pub name: &'static str,
    /// Dunder operators, `__constructor__` included.
    pub operators: &'static [MethodDef],
    pub methods: &'static [MethodDef],
    pub describe: fn(&BuiltinInstance) -> String,
}

#[derive(Clone, Copy)]
pub struct BuiltinClass(&'static BuiltinClassDef);

impl BuiltinClass {
    pub fn new(def: &'static BuiltinClassDef) -> Self {
        BuiltinClass(def)
    }

    pub fn def(&self) -> &'static BuiltinClassDef {
        self.0
    }

    pub fn instantiate(
        &self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        interpreter: &mut Interpreter,
        call_span: &Span,
    ) -> Eval {
        debug!(class = self.0.name, "instantiating built-in class");

        let instance = BuiltinInstance::new(self.0);
        match instance.call_operator(CONSTRUCTOR_STR, args, kwargs, interpreter, call_span) {
            Some(result) => result?,
            None => {
                return Err(interpreter.error(
                    ErrorKind::AttributeNotDefined(CONSTRUCTOR_STR.to_owned(), format!("{:?}", self)),
                    call_span,
                ))
            }
        };
        Ok(Value::BuiltinInstance(instance))
    }
}

struct BuiltinInstanceData {
    def: &'static BuiltinClassDef,
    state: RefCell<Box<dyn Any>>,
    /// Attributes assigned from Radon code.
    members: SymbolTable,
}

#[derive(Clone)]
pub struct BuiltinInstance(Rc<BuiltinInstanceData>);

impl BuiltinInstance {
    pub fn new(def: &'static BuiltinClassDef) -> Self {
        let data = BuiltinInstanceData {
            def,
            state: RefCell::new(Box::new(())),
            members: SymbolTable::new(),
        };
        BuiltinInstance(Rc::new(data))
    }

    pub fn def(&self) -> &'static BuiltinClassDef {
        self.0.def
    }

    pub fn members(&self) -> &SymbolTable {
        &self.0.members
    }

    pub fn set_state<T: Any>(&self, state: T) {
        *self.0.state.borrow_mut() = Box::new(state);
    }

    /// Runs `f` on the host state, if it has type `T`.
    pub fn with_state<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut state = self.0.state.borrow_mut();
        state.downcast_mut::<T>().map(f)
    }

    pub fn describe(&self) -> String {
        (self.0.def.describe)(self)
    }

    pub fn get_method(&self, name: &str) -> Option<NativeFn> {
        self.0
            .def
            .methods
            .iter()
            .find(|m| m.name == name)
            .map(|m| NativeFn::method(m, self.clone()))
    }

    /// Calls the operator if this class declares it.
    pub fn call_operator(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        interpreter: &mut Interpreter,
        call_span: &Span,
    ) -> Option<Eval> {
        let op = self.0.def.operators.iter().find(|op| op.name == name)?;
        let callee = format!("<built-in operator {}.{}>", self.0.def.name, op.name);
        let result = match bind_static_params(op.params, args, kwargs, &callee) {
            Ok(args) => (op.func)(interpreter, self, args, call_span),
            Err(kind) => Err(interpreter.error(kind, call_span)),
        };
        Some(result)
    }
}

impl PartialEq<BuiltinClass> for BuiltinClass {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl PartialEq<BuiltinInstance> for BuiltinInstance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for BuiltinClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<class {}>", self.0.name)
    }
}

impl fmt::Debug for BuiltinInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// The capability classes made visible to programs.
pub struct BuiltinRegistry {
    classes: Vec<&'static BuiltinClassDef>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        BuiltinRegistry { classes: vec![] }
    }

    /// Adds a class, replacing any earlier one with the same name.
    pub fn register(&mut self, def: &'static BuiltinClassDef) {
        debug!(class = def.name, "registering built-in class");
        self.classes.retain(|c| c.name != def.name);
        self.classes.push(def);
    }

    pub fn classes(&self) -> &[&'static BuiltinClassDef] {
        &self.classes
    }

    pub fn get(&self, name: &str) -> Option<&'static BuiltinClassDef> {
        self.classes.iter().find(|c| c.name == name).copied()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        let mut registry = BuiltinRegistry::new();
        registry.register(&STRING_CLASS);
        registry.register(&FILE_CLASS);
        registry.register(&JSON_CLASS);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = BuiltinRegistry::default();
        let names: Vec<_> = registry.classes().iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["String", "File", "Json"]);
        assert!(registry.get("Json").is_some());
        assert!(registry.get("Socket").is_none());
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = BuiltinRegistry::default();
        registry.register(&JSON_CLASS);
        assert_eq!(registry.classes().len(), 3);
        assert_eq!(registry.classes()[2].name, "Json");
    }

    #[test]
    fn test_host_state() {
        let instance = BuiltinInstance::new(&JSON_CLASS);
        instance.set_state(41_i64);
        assert_eq!(instance.with_state(|n: &mut i64| { *n += 1; *n }), Some(42));
        assert_eq!(instance.with_state(|s: &mut String| s.len()), None);
        assert!(instance.get_method("dumps").is_some());
        assert!(instance.get_method("nope").is_none());
    }
}
