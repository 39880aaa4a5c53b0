use super::errors::{ErrorKind, Eval};
use super::function::RadonFn;
use super::interpreter::Interpreter;
use super::symbol_table::SymbolTable;
use super::value::Value;
use crate::radon_frontend::span::Span;

use std::fmt;
use std::rc::Rc;
use tracing::debug;

pub const CONSTRUCTOR_STR: &str = "__constructor__";
pub const THIS_STR: &str = "this";

struct RadonClassData {
    name: String,
    members: SymbolTable,
}

#[derive(Clone)]
pub struct RadonClass(Rc<RadonClassData>);

pub struct RadonInstanceData {
    class: RadonClass,
    members: SymbolTable,
}

#[derive(Clone)]
pub struct RadonInstance(Rc<RadonInstanceData>);

impl RadonClass {
    pub fn new(name: String, members: SymbolTable) -> Self {
        let data = RadonClassData { name, members };
        RadonClass(Rc::new(data))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn members(&self) -> &SymbolTable {
        &self.0.members
    }

    /// Creates an instance with its own copy of every member, then runs
    /// `__constructor__` on it.
    pub fn execute(
        &self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        interpreter: &mut Interpreter,
        call_span: &Span,
    ) -> Eval {
        debug!(class = self.name(), "instantiating class");

        let members = SymbolTable::new();
        for (name, value) in self.0.members.entries() {
            members
                .set(&name, value.shallow_copy())
                .map_err(|kind| interpreter.error(kind, call_span))?;
        }
        let instance = RadonInstance::new(self, members);

        match instance.method(CONSTRUCTOR_STR) {
            Some(constructor) => constructor.execute(args, kwargs, interpreter, call_span)?,
            None => {
                return Err(interpreter.error(
                    ErrorKind::AttributeNotDefined(CONSTRUCTOR_STR.to_owned(), format!("{:?}", self)),
                    call_span,
                ))
            }
        };

        Ok(Value::Instance(instance))
    }
}

impl RadonInstance {
    pub fn new(class: &RadonClass, members: SymbolTable) -> Self {
        let data = RadonInstanceData {
            class: class.clone(),
            members,
        };
        RadonInstance(Rc::new(data))
    }

    pub fn class(&self) -> &RadonClass {
        &self.0.class
    }

    pub fn members(&self) -> &SymbolTable {
        &self.0.members
    }

    /// Member lookup. `this` is answered without being stored, and
    /// functions come back bound to the instance.
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == THIS_STR {
            return Some(Value::Instance(self.clone()));
        }
        match self.0.members.get_local(name) {
            Some(Value::Function(method)) => Some(Value::Function(self.bind(&method))),
            other => other,
        }
    }

    pub fn set(&self, name: &str, value: Value) -> Result<(), ErrorKind> {
        self.0.members.set(name, value)
    }

    /// The bound method behind a dunder or regular method name.
    pub fn method(&self, name: &str) -> Option<RadonFn> {
        match self.0.members.get_local(name) {
            Some(Value::Function(method)) => Some(self.bind(&method)),
            _ => None,
        }
    }

    fn bind(&self, method: &RadonFn) -> RadonFn {
        method.bind(Value::Instance(self.clone()))
    }

    /// A new instance of the same class whose members are shallow copies.
    pub fn shallow_copy(&self) -> Result<RadonInstance, ErrorKind> {
        let members = SymbolTable::new();
        for (name, value) in self.0.members.entries() {
            members.set(&name, value.shallow_copy())?;
        }
        Ok(RadonInstance::new(&self.0.class, members))
    }
}

impl PartialEq<RadonClass> for RadonClass {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq<RadonInstance> for RadonInstance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RadonClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<class {}>", self.0.name)
    }
}

impl fmt::Debug for RadonInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<instance of {}>", self.0.class.0.name)
    }
}
