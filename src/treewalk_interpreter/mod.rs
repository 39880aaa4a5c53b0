mod builtin_class;
mod builtin_objects;
mod class;
mod context;
mod errors;
mod function;
mod host;
mod interpreter;
mod module_resolver;
mod native_function;
mod operations;
mod symbol_table;
mod value;

pub use builtin_class::{BuiltinClassDef, BuiltinInstance, BuiltinRegistry, MethodDef};
pub use context::Context;
pub use errors::{ErrorKind, RuntimeError, Signal};
pub use host::{lift, lower};
pub use interpreter::Interpreter;
pub use module_resolver::RadonModule;
pub use native_function::{global_table, DefaultValue, ParamSpec};
pub use symbol_table::SymbolTable;
pub use value::{Number, Value};
