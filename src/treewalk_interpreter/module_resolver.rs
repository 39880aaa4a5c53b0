use super::context::Context;
use super::errors::{ErrorKind, Eval, Signal};
use super::interpreter::Interpreter;
use super::native_function::global_table;
use super::symbol_table::SymbolTable;
use super::value::Value;
use crate::config::Config;
use crate::radon_frontend::grammar::ModuleName;
use crate::radon_frontend::span::Span;
use crate::radon_frontend::{parse, tokenize};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace};

pub const SOURCE_EXTENSION: &str = "rn";

struct RadonModuleData {
    name: String,
    path: PathBuf,
    docstring: Option<String>,
    table: SymbolTable,
}

/// A loaded module: the scope its top level ran in.
#[derive(Clone)]
pub struct RadonModule(Rc<RadonModuleData>);

impl RadonModule {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }

    pub fn docstring(&self) -> Option<&str> {
        self.0.docstring.as_deref()
    }

    pub fn table(&self) -> &SymbolTable {
        &self.0.table
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "__name__" => Some(Value::str(&self.0.name)),
            "__doc__" => Some(self.0.docstring.as_deref().map(Value::str).unwrap_or(Value::Null)),
            _ => self.0.table.get_local(name),
        }
    }
}

impl fmt::Debug for RadonModule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<module {}>", self.0.name)
    }
}

impl PartialEq<RadonModule> for RadonModule {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Tracks the modules currently being loaded, outermost first.
#[derive(Debug, Default)]
pub struct ModuleResolver {
    loading: Vec<PathBuf>,
}

impl ModuleResolver {
    pub fn new() -> Self {
        ModuleResolver::default()
    }

    pub fn is_loading(&self, path: &Path) -> bool {
        self.loading.iter().any(|p| p == path)
    }
}

/// Where the source for `name` lives, before checking that it exists.
pub fn resolve_path(config: &Config, import_dir: Option<&Path>, name: &ModuleName) -> Result<PathBuf, ErrorKind> {
    match name {
        ModuleName::Named(module) if config.is_stdlib(module) => Ok(config
            .stdlib_root
            .join(format!("{}.{}", module, SOURCE_EXTENSION))),
        ModuleName::Named(module) => Err(ErrorKind::InvalidSyntax(format!(
            "'{}' is not a standard library module, import a file with a quoted \".rn\" path",
            module
        ))),
        ModuleName::Path(path) => {
            let relative = Path::new(path);
            if relative.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
                return Err(ErrorKind::InvalidSyntax(format!(
                    "Module path \"{}\" must end in \".rn\"",
                    path
                )));
            }
            let base = match import_dir {
                Some(dir) => dir.to_path_buf(),
                None => std::env::current_dir().map_err(|e| ErrorKind::Io(e.to_string()))?,
            };
            Ok(base.join(relative))
        }
    }
}

/// The text between the first pair of double quotes in the source.
pub fn docstring(text: &str) -> Option<String> {
    text.split('"').nth(1).map(str::to_owned)
}

/// Runs a module's source in a fresh global scope and returns its bindings.
/// Modules are not cached: every import runs the file again.
pub fn load_module(interp: &mut Interpreter, name: &ModuleName, span: &Span) -> Eval<RadonModule> {
    let import_dir = interp.context.import_dir.clone();
    let path = resolve_path(&interp.config, import_dir.as_deref(), name)
        .map_err(|kind| interp.error(kind, span))?;

    if !path.is_file() {
        return Err(interp.error(ErrorKind::ModuleNotFound(name.to_string()), span));
    }
    let canonical = path
        .canonicalize()
        .map_err(|e| interp.error(ErrorKind::Io(e.to_string()), span))?;
    if interp.resolver.is_loading(&canonical) {
        return Err(interp.error(
            ErrorKind::CircularImport(path.display().to_string()),
            span,
        ));
    }

    let text = fs::read_to_string(&path)
        .map_err(|e| interp.error(ErrorKind::Io(format!("{}: {}", path.display(), e)), span))?;
    let source_name = path.display().to_string();
    debug!(module = %source_name, "loading module");

    let load_error = |reason: String| ErrorKind::ModuleLoad {
        path: source_name.clone(),
        reason,
    };
    let tokens = tokenize(&source_name, &text)
        .map_err(|e| interp.error(load_error(format!("{}: {}", e.name(), e)), span))?;
    let ast = parse(tokens)
        .map_err(|e| interp.error(load_error(format!("{}: {}", e.name(), e)), span))?;

    let module_name = canonical
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.clone());
    let module_dir = canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let globals = global_table(&interp.registry);
    let table = SymbolTable::with_parent(&globals);
    let context = Context::module(
        &interp.context,
        &format!("<module {}>", module_name),
        span.clone(),
        &module_dir,
    );

    interp.resolver.loading.push(canonical.clone());
    let result = interp.run_in(table.clone(), context, |i| i.eval_expression(&ast));
    interp.resolver.loading.pop();

    match result {
        Ok(_) | Err(Signal::Return(_)) => {}
        Err(signal) => {
            return Err(match signal.stray_control() {
                Some(kind) => interp.error(kind, span),
                None => signal,
            })
        }
    }

    trace!(module = %module_name, bindings = table.entries().len(), "module loaded");
    Ok(RadonModule(Rc::new(RadonModuleData {
        name: module_name,
        path: canonical,
        docstring: docstring(&text),
        table,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docstring_is_first_quoted_field() {
        assert_eq!(docstring("\"Math helpers\"\nfun sq(x) -> x * x"), Some("Math helpers".to_owned()));
        assert_eq!(docstring("var x = 1"), None);
        assert_eq!(docstring("print(\"hi\")"), Some("hi".to_owned()));
    }

    #[test]
    fn test_resolve_paths() {
        let config = Config::new(PathBuf::from("/lib/radon"));
        assert_eq!(
            resolve_path(&config, None, &ModuleName::Named("math".to_owned())),
            Ok(PathBuf::from("/lib/radon/math.rn"))
        );
        assert_eq!(
            resolve_path(
                &config,
                Some(Path::new("/work")),
                &ModuleName::Path("util/helpers.rn".to_owned())
            ),
            Ok(PathBuf::from("/work/util/helpers.rn"))
        );
        assert!(matches!(
            resolve_path(&config, None, &ModuleName::Named("os".to_owned())),
            Err(ErrorKind::InvalidSyntax(_))
        ));
        assert!(matches!(
            resolve_path(&config, None, &ModuleName::Path("notes.txt".to_owned())),
            Err(ErrorKind::InvalidSyntax(_))
        ));
    }
}
