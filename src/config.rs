use std::env;
use std::path::PathBuf;

pub const STDLIB_ENV: &str = "RADON_STDLIB";
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Settings fixed at startup and shared read-only by the interpreter and
/// every module it loads.
#[derive(Debug, Clone)]
pub struct Config {
    pub stdlib_root: PathBuf,
    /// Bare names that `import NAME` accepts.
    pub stdlib_names: Vec<String>,
    /// Arguments after `--`, returned by `sys_args()`.
    pub program_args: Vec<String>,
    pub max_call_depth: usize,
}

impl Config {
    pub fn new(stdlib_root: PathBuf) -> Self {
        Config {
            stdlib_root,
            stdlib_names: ["math", "array", "string"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            program_args: vec![],
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn with_args(mut self, program_args: Vec<String>) -> Self {
        self.program_args = program_args;
        self
    }

    pub fn is_stdlib(&self, name: &str) -> bool {
        self.stdlib_names.iter().any(|n| n == name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(locate_stdlib(None))
    }
}

/// Picks the standard library root: an explicit flag, then `RADON_STDLIB`,
/// then `stdlib/` beside the executable, then the crate's own copy.
pub fn locate_stdlib(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if let Some(dir) = env::var_os(STDLIB_ENV) {
        return PathBuf::from(dir);
    }

    let beside_exe = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("stdlib")));
    match beside_exe {
        Some(dir) if dir.is_dir() => dir,
        _ => PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("stdlib"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins() {
        let root = locate_stdlib(Some(PathBuf::from("/opt/radon/lib")));
        assert_eq!(root, PathBuf::from("/opt/radon/lib"));
    }

    #[test]
    fn test_recognized_names() {
        let config = Config::new(PathBuf::from("stdlib"));
        assert!(config.is_stdlib("math"));
        assert!(config.is_stdlib("string"));
        assert!(!config.is_stdlib("os"));
        assert!(config.program_args.is_empty());
    }
}
