use crate::radon_frontend::span::Span;

use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One link of the dynamic call chain: the program, a module, a class body
/// or a function call. Only used to build tracebacks and to resolve
/// relative imports.
#[derive(Debug)]
pub struct Context {
    pub display_name: String,
    pub parent: Option<Rc<Context>>,
    /// Where in the parent this context was entered.
    pub entry: Option<Span>,
    pub import_dir: Option<PathBuf>,
}

impl Context {
    pub fn root(display_name: &str, import_dir: Option<PathBuf>) -> Rc<Self> {
        Rc::new(Context {
            display_name: display_name.to_owned(),
            parent: None,
            entry: None,
            import_dir,
        })
    }

    /// A root context hung below an existing chain, used when a host runs
    /// a nested program.
    pub fn nested(
        parent: Option<Rc<Context>>,
        display_name: &str,
        import_dir: Option<PathBuf>,
    ) -> Rc<Self> {
        let import_dir = import_dir.or_else(|| parent.as_ref().and_then(|p| p.import_dir.clone()));
        Rc::new(Context {
            display_name: display_name.to_owned(),
            parent,
            entry: None,
            import_dir,
        })
    }

    pub fn child(parent: &Rc<Context>, display_name: &str, entry: Span) -> Rc<Self> {
        Rc::new(Context {
            display_name: display_name.to_owned(),
            parent: Some(parent.clone()),
            entry: Some(entry),
            import_dir: parent.import_dir.clone(),
        })
    }

    /// Context for a module body; nested imports resolve against `import_dir`.
    pub fn module(parent: &Rc<Context>, display_name: &str, entry: Span, import_dir: &Path) -> Rc<Self> {
        Rc::new(Context {
            display_name: display_name.to_owned(),
            parent: Some(parent.clone()),
            entry: Some(entry),
            import_dir: Some(import_dir.to_path_buf()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radon_frontend::span::SourceFile;

    #[test]
    fn test_child_inherits_import_dir() {
        let source = SourceFile::new("<test>", "");
        let root = Context::root("<program>", Some(PathBuf::from("/scripts")));
        let call = Context::child(&root, "<function f>", Span::empty(&source));
        assert_eq!(call.import_dir, Some(PathBuf::from("/scripts")));

        let module = Context::module(&call, "<module lib>", Span::empty(&source), Path::new("/lib"));
        assert_eq!(module.import_dir, Some(PathBuf::from("/lib")));
    }
}
