use super::errors::ErrorKind;
use super::value::Value;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// A scope of bindings. Clones share the same scope.
#[derive(Clone)]
pub struct SymbolTable {
    table_ptr: Rc<RefCell<TableData>>,
}

struct TableData {
    values: HashMap<String, Value>,
    consts: HashSet<String>,
    parent: Option<SymbolTable>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::from_data(None)
    }

    pub fn with_parent(parent: &SymbolTable) -> Self {
        SymbolTable::from_data(Some(parent.clone()))
    }

    fn from_data(parent: Option<SymbolTable>) -> Self {
        let table_data = TableData {
            values: HashMap::new(),
            consts: HashSet::new(),
            parent,
        };
        SymbolTable {
            table_ptr: Rc::new(RefCell::new(table_data)),
        }
    }

    pub fn parent(&self) -> Option<SymbolTable> {
        self.table_ptr.borrow().parent.clone()
    }

    /// Looks the name up here, then along the parent chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        let data = self.table_ptr.borrow();
        match data.values.get(name) {
            Some(value) => Some(value.clone()),
            None => data.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.table_ptr.borrow().values.get(name).cloned()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.table_ptr.borrow().values.contains_key(name)
    }

    /// Binds in this scope. Fails only if the name is a constant here.
    pub fn set(&self, name: &str, value: Value) -> Result<(), ErrorKind> {
        let mut data = self.table_ptr.borrow_mut();
        if data.consts.contains(name) {
            return Err(ErrorKind::ConstReassign(name.to_owned()));
        }
        data.values.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn define_const(&self, name: &str, value: Value) -> Result<(), ErrorKind> {
        self.set(name, value)?;
        self.table_ptr.borrow_mut().consts.insert(name.to_owned());
        Ok(())
    }

    /// Unchecked insert used to populate a fresh table.
    pub fn seed(&self, name: &str, value: Value, constant: bool) {
        let mut data = self.table_ptr.borrow_mut();
        data.values.insert(name.to_owned(), value);
        if constant {
            data.consts.insert(name.to_owned());
        }
    }

    /// Rebinds the name in the nearest scope that already declares it.
    pub fn set_static(&self, name: &str, value: Value) -> Result<(), ErrorKind> {
        if self.contains_local(name) {
            return self.set(name, value);
        }
        match self.parent() {
            Some(parent) => parent.set_static(name, value),
            None => Err(ErrorKind::NameNotDefined(name.to_owned())),
        }
    }

    /// Removes the nearest binding of the name.
    pub fn remove(&self, name: &str) -> Result<Value, ErrorKind> {
        let removed = {
            let mut data = self.table_ptr.borrow_mut();
            data.consts.remove(name);
            data.values.remove(name)
        };
        match (removed, self.parent()) {
            (Some(value), _) => Ok(value),
            (None, Some(parent)) => parent.remove(name),
            (None, None) => Err(ErrorKind::NameNotDefined(name.to_owned())),
        }
    }

    /// Local bindings in name order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<_> = self
            .table_ptr
            .borrow()
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Every name visible from this scope, sorted and deduplicated.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = HashSet::new();
        let mut scope = Some(self.clone());
        while let Some(table) = scope {
            names.extend(table.table_ptr.borrow().values.keys().cloned());
            scope = table.parent();
        }
        let mut names: Vec<_> = names.into_iter().collect();
        names.sort();
        names
    }

    pub fn ptr_eq(&self, other: &SymbolTable) -> bool {
        Rc::ptr_eq(&self.table_ptr, &other.table_ptr)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<_> = self.entries().into_iter().map(|(k, _)| k).collect();
        write!(f, "<scope {}>", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let globals = SymbolTable::new();
        globals.set("x", Value::int(1)).unwrap();
        let inner = SymbolTable::with_parent(&globals);

        assert_eq!(inner.get("x"), Some(Value::int(1)));
        assert_eq!(inner.get_local("x"), None);
        assert_eq!(inner.get("missing"), None);
    }

    #[test]
    fn test_set_is_local() {
        let globals = SymbolTable::new();
        globals.set("x", Value::int(1)).unwrap();
        let inner = SymbolTable::with_parent(&globals);
        inner.set("x", Value::int(2)).unwrap();

        assert_eq!(globals.get("x"), Some(Value::int(1)));
        assert_eq!(inner.get("x"), Some(Value::int(2)));
    }

    #[test]
    fn test_set_static_writes_to_declaring_scope() {
        let globals = SymbolTable::new();
        globals.set("total", Value::int(0)).unwrap();
        let block = SymbolTable::with_parent(&SymbolTable::with_parent(&globals));

        block.set_static("total", Value::int(5)).unwrap();
        assert_eq!(globals.get_local("total"), Some(Value::int(5)));
        assert!(!block.contains_local("total"));

        assert_eq!(
            block.set_static("nope", Value::Null),
            Err(ErrorKind::NameNotDefined("nope".to_owned()))
        );
    }

    #[test]
    fn test_constants() {
        let scope = SymbolTable::new();
        scope.define_const("PI", Value::float(3.14)).unwrap();
        assert_eq!(
            scope.set("PI", Value::int(3)),
            Err(ErrorKind::ConstReassign("PI".to_owned()))
        );

        let inner = SymbolTable::with_parent(&scope);
        assert!(inner.set("PI", Value::int(3)).is_ok());
        assert!(inner.set_static("PI", Value::int(4)).is_ok());
        assert!(SymbolTable::with_parent(&scope).set_static("PI", Value::int(4)).is_err());
    }

    #[test]
    fn test_remove_nearest() {
        let globals = SymbolTable::new();
        globals.set("x", Value::int(1)).unwrap();
        let inner = SymbolTable::with_parent(&globals);
        inner.set("x", Value::int(2)).unwrap();

        assert_eq!(inner.remove("x"), Ok(Value::int(2)));
        assert_eq!(inner.get("x"), Some(Value::int(1)));
        assert_eq!(inner.remove("x"), Ok(Value::int(1)));
        assert!(inner.remove("x").is_err());
    }
}
