use super::builtin_class::{BuiltinClass, BuiltinInstance};
use super::class::{RadonClass, RadonInstance};
use super::function::RadonFn;
use super::module_resolver::RadonModule;
use super::native_function::NativeFn;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<BTreeMap<String, Value>>>;

#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Clone)]
pub enum Value {
    Null,
    Number(Number),
    Boolean(bool),
    String(String),
    Array(ArrayRef),
    HashMap(MapRef),
    Function(RadonFn),
    BuiltinFunction(NativeFn),
    Class(RadonClass),
    Instance(RadonInstance),
    BuiltinClass(BuiltinClass),
    BuiltinInstance(BuiltinInstance),
    Module(RadonModule),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    /// The integer value, if this number has no fractional part.
    pub fn as_int(self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(n),
            Number::Float(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Some(n as i64),
            Number::Float(_) => None,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.partial_cmp(b),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 => {
                write!(f, "{:.1}", n)
            }
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Number(Number::Int(n))
    }

    pub fn float(n: f64) -> Self {
        Value::Number(Number::Float(n))
    }

    pub fn str(s: &str) -> Self {
        Value::String(s.to_owned())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn hashmap(map: BTreeMap<String, Value>) -> Self {
        Value::HashMap(Rc::new(RefCell::new(map)))
    }

    pub fn type_name(&self) -> String {
        let name = match self {
            Value::Null => "Null",
            Value::Number(Number::Int(_)) => "Int",
            Value::Number(Number::Float(_)) => "Float",
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::HashMap(_) => "HashMap",
            Value::Function(_) => "Function",
            Value::BuiltinFunction(_) => "BuiltinFunction",
            Value::Class(_) | Value::BuiltinClass(_) => "Class",
            Value::Instance(instance) => return instance.class().name().to_owned(),
            Value::BuiltinInstance(instance) => return instance.def().name.to_owned(),
            Value::Module(_) => "Module",
        };
        name.to_owned()
    }

    /// Truthiness without consulting `__truthy__`.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => !n.is_zero(),
            Value::Boolean(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.borrow().is_empty(),
            Value::HashMap(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }

    /// New containers holding the same elements; everything else is
    /// immutable or shared by identity and clones as is.
    pub fn shallow_copy(&self) -> Value {
        match self {
            Value::Array(items) => Value::array(items.borrow().clone()),
            Value::HashMap(map) => Value::hashmap(map.borrow().clone()),
            other => other.clone(),
        }
    }

    /// The form a value takes inside a container: strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let items: Vec<_> = items.borrow().iter().map(|v| v.repr()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::HashMap(map) => {
                let pairs: Vec<_> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k, v.repr()))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Value::Function(func) => write!(f, "{:?}", func),
            Value::BuiltinFunction(func) => write!(f, "{:?}", func),
            Value::Class(class) => write!(f, "{:?}", class),
            Value::Instance(instance) => write!(f, "{:?}", instance),
            Value::BuiltinClass(class) => write!(f, "{:?}", class),
            Value::BuiltinInstance(instance) => write!(f, "{}", instance.describe()),
            Value::Module(module) => write!(f, "{:?}", module),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

/// Structural equality for data, identity for everything else. A string
/// compared with a number compares against the number's printed form.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
                *s == n.to_string()
            }
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::HashMap(a), Value::HashMap(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::BuiltinFunction(a), Value::BuiltinFunction(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => a == b,
            (Value::BuiltinClass(a), Value::BuiltinClass(b)) => a == b,
            (Value::BuiltinInstance(a), Value::BuiltinInstance(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_printing() {
        assert_eq!(Value::int(3).to_string(), "3");
        assert_eq!(Value::float(3.0).to_string(), "3.0");
        assert_eq!(Value::float(0.5).to_string(), "0.5");
        assert_eq!(Value::float(-2.0).to_string(), "-2.0");
    }

    #[test]
    fn test_container_printing() {
        let mut map = BTreeMap::new();
        map.insert("a".to_owned(), Value::array(vec![Value::int(1), Value::str("x")]));
        map.insert("b".to_owned(), Value::Null);
        assert_eq!(Value::hashmap(map).to_string(), r#"{"a": [1, "x"], "b": null}"#);
        assert_eq!(Value::str("top").to_string(), "top");
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::int(1), Value::float(1.0));
        assert_eq!(Value::str("5"), Value::int(5));
        assert_ne!(Value::str("5.0"), Value::int(5));
        assert_ne!(Value::Boolean(true), Value::int(1));
        assert_eq!(
            Value::array(vec![Value::int(1)]),
            Value::array(vec![Value::int(1)])
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_true());
        assert!(!Value::int(0).is_true());
        assert!(!Value::str("").is_true());
        assert!(!Value::array(vec![]).is_true());
        assert!(Value::float(0.1).is_true());
    }

    #[test]
    fn test_shallow_copy_is_independent() {
        let original = Value::array(vec![Value::int(1)]);
        let copy = original.shallow_copy();
        if let Value::Array(items) = &copy {
            items.borrow_mut().push(Value::int(2));
        }
        assert_eq!(original.to_string(), "[1]");
        assert_eq!(copy.to_string(), "[1, 2]");
    }
}
