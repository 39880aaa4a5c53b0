use rusty_radon::config::Config;
use rusty_radon::treewalk_interpreter::{Context, ErrorKind, Interpreter, Value};
use rusty_radon::{RadonError, RunOutcome};

use ::more_asserts::*;
use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn stdlib_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("stdlib")
}

fn interpreter_in(config: Config, import_dir: Option<&Path>) -> (Interpreter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::with_io(
        config,
        Box::new(buffer.clone()),
        Box::new(io::Cursor::new(b"Ada\n41\n".to_vec())),
    );
    interpreter.context = Context::root("<program>", import_dir.map(Path::to_path_buf));
    (interpreter, buffer)
}

fn run(source: &str) -> (RunOutcome, String) {
    run_in_dir(source, None)
}

fn run_in_dir(source: &str, dir: Option<&Path>) -> (RunOutcome, String) {
    let (mut interpreter, buffer) = interpreter_in(Config::new(stdlib_root()), dir);
    let outcome = interpreter.run("<test>", source);
    (outcome, buffer.text())
}

fn runtime_kind(outcome: &RunOutcome) -> ErrorKind {
    match &outcome.error {
        Some(RadonError::Runtime(e)) => e.kind.clone(),
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

fn write_module(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_multiplication_binds_tighter() {
    let (outcome, _) = run("var x = 1 + 2 * 3\nx == 7");
    assert_eq!(outcome.value, Some(Value::Boolean(true)));
    assert!(outcome.error.is_none());
}

#[test]
fn test_half_open_range_loop() {
    let (outcome, output) = run("for i = 0 to 3 { print(i) }");
    assert_eq!(output, "0\n1\n2\n");
    assert_eq!(outcome.value, Some(Value::Null));
}

#[test]
fn test_default_arguments_and_arity() {
    let prelude = "fun add(a, b=10) { return a + b }\n";

    let (outcome, _) = run(&format!("{}add(5)", prelude));
    assert_eq!(outcome.value, Some(Value::int(15)));

    let (outcome, _) = run(&format!("{}add(5, 1)", prelude));
    assert_eq!(outcome.value, Some(Value::int(6)));

    let (outcome, _) = run(&format!("{}add()", prelude));
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::TooFewArgs(1, "<function add>".to_owned())
    );

    let (outcome, _) = run(&format!("{}add(1, 2, 3)", prelude));
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::TooManyArgs(1, "<function add>".to_owned())
    );
}

#[test]
fn test_try_catch_yields_null() {
    let (outcome, output) = run("try { var y = 1/0 } catch as e { print(e) }");
    assert!(output.contains("Division by zero"));
    assert!(outcome.error.is_none());
    assert_eq!(outcome.value, Some(Value::Null));
}

#[test]
fn test_instances_do_not_share_fields() {
    let source = "class C { fun __constructor__(v) { var this.v = v } fun get() { return this.v } }
var c = C(5)
var first = c.get()
var d = C(9)
[first, c.get(), d.get()]";
    let (outcome, _) = run(source);
    assert_eq!(
        outcome.value.map(|v| v.to_string()),
        Some("[5, 5, 9]".to_owned())
    );
}

#[test]
fn test_missing_module_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (outcome, _) = run_in_dir("from \"missing.rn\" import x", Some(dir.path()));
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::ModuleNotFound("\"missing.rn\"".to_owned())
    );
    let headline = outcome.error.unwrap().headline();
    assert_eq!(headline, "Module Not Found: Module \"missing.rn\" could not be found");
}

#[test]
fn test_import_file_module() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        &dir,
        "shapes.rn",
        "\"Shape helpers\"\nconst SIDES = 4\nfun area(w, h=3) -> w * h\n",
    );

    let source = "import \"shapes.rn\"
import \"shapes.rn\" as geo
print(shapes.area(3))
print(geo.area(2, 5))
print(shapes.SIDES)
print(shapes.__doc__)
print(shapes.__name__)";
    let (outcome, output) = run_in_dir(source, Some(dir.path()));
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(output, "9\n10\n4\nShape helpers\nshapes\n");
}

#[test]
fn test_from_import_and_include() {
    let dir = tempfile::tempdir().unwrap();
    write_module(&dir, "util.rn", "var greeting = \"hi\"\nfun shout(s) -> s + \"!\"\n");

    let (outcome, output) = run_in_dir(
        "from \"util.rn\" import shout, greeting\nprint(shout(greeting))\ngreeting = \"hello\"",
        Some(dir.path()),
    );
    assert_eq!(output, "hi!\n");
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::ConstReassign("greeting".to_owned())
    );

    let (outcome, output) = run_in_dir(
        "include \"util.rn\"\ngreeting = \"hello\"\nprint(shout(greeting))",
        Some(dir.path()),
    );
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(output, "hello!\n");
}

#[test]
fn test_missing_from_import_name() {
    let dir = tempfile::tempdir().unwrap();
    write_module(&dir, "small.rn", "var a = 1\n");
    let (outcome, _) = run_in_dir("from \"small.rn\" import b", Some(dir.path()));
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::AttributeNotDefined("b".to_owned(), "<module small>".to_owned())
    );
}

#[test]
fn test_nested_imports_resolve_against_their_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    write_module(&dir, "lib/inner.rn", "const VALUE = 42\n");
    write_module(&dir, "lib/outer.rn", "import \"inner.rn\"\nvar value = inner.VALUE\n");

    let (outcome, output) = run_in_dir(
        "import \"lib/outer.rn\"\nprint(outer.value)",
        Some(dir.path()),
    );
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(output, "42\n");
}

#[test]
fn test_circular_import() {
    let dir = tempfile::tempdir().unwrap();
    write_module(&dir, "a.rn", "import \"b.rn\"\n");
    write_module(&dir, "b.rn", "import \"a.rn\"\n");

    let (outcome, _) = run_in_dir("import \"a.rn\"", Some(dir.path()));
    match runtime_kind(&outcome) {
        ErrorKind::CircularImport(path) => assert!(path.ends_with("a.rn"), "{}", path),
        other => panic!("expected a circular import, got {:?}", other),
    }
}

#[test]
fn test_module_syntax_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(&dir, "broken.rn", "var x = (1 +\n");

    let (outcome, _) = run_in_dir("import \"broken.rn\"", Some(dir.path()));
    match runtime_kind(&outcome) {
        ErrorKind::ModuleLoad { path: failed, reason } => {
            assert_eq!(failed, path.display().to_string());
            assert!(reason.starts_with("Invalid Syntax: "), "{}", reason);
        }
        other => panic!("expected a module load error, got {:?}", other),
    }
}

#[test]
fn test_module_runtime_error_traceback() {
    let dir = tempfile::tempdir().unwrap();
    write_module(&dir, "faulty.rn", "fun fail() -> 1 / 0\nfail()\n");

    let (outcome, _) = run_in_dir("print(\"start\")\nimport \"faulty.rn\"", Some(dir.path()));
    let rendered = outcome.error.unwrap().render_diagnostic();

    let program_at = rendered.find("in <program>").unwrap();
    let module_at = rendered.find("in <module faulty>").unwrap();
    let function_at = rendered.find("in <function fail>").unwrap();
    assert_lt!(program_at, module_at);
    assert_lt!(module_at, function_at);
    assert!(rendered.contains("Runtime Error: Division by zero"));
}

#[test]
fn test_modules_get_fresh_globals() {
    let dir = tempfile::tempdir().unwrap();
    write_module(&dir, "reader.rn", "var leaked = 1\nfun check() -> secret\n");

    let (outcome, _) = run_in_dir(
        "var secret = 1\nimport \"reader.rn\"\nreader.check()",
        Some(dir.path()),
    );
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::NameNotDefined("secret".to_owned())
    );
}

#[test]
fn test_exit_code() {
    let (outcome, output) = run("print(\"bye\")\nexit(3)\nprint(\"unreachable\")");
    assert!(outcome.should_exit);
    assert_eq!(outcome.exit_code, 3);
    assert_eq!(output, "bye\n");

    let dir = tempfile::tempdir().unwrap();
    write_module(&dir, "quits.rn", "exit(7)\n");
    let (outcome, _) = run_in_dir("import \"quits.rn\"\nprint(\"after\")", Some(dir.path()));
    assert!(outcome.should_exit);
    assert_eq!(outcome.exit_code, 7);
}

#[test]
fn test_uncaught_error_exit_code() {
    let (outcome, _) = run("raise Oops(\"no\")");
    assert!(!outcome.should_exit);
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.error.unwrap().headline(), "Oops: no");
}

#[test]
fn test_session_keeps_bindings() {
    let (mut interpreter, buffer) = interpreter_in(Config::new(stdlib_root()), None);

    let outcome = interpreter.run("<stdin>", "var total = 40");
    assert_eq!(outcome.value, Some(Value::int(40)));
    let outcome = interpreter.run("<stdin>", "total += 2");
    assert_eq!(outcome.value, Some(Value::int(42)));
    let outcome = interpreter.run("<stdin>", "print(total)");
    assert_eq!(outcome.value, Some(Value::Null));
    assert_eq!(buffer.text(), "42\n");

    let outcome = interpreter.run("<stdin>", "undefined");
    assert!(outcome.error.is_some());
    let outcome = interpreter.run("<stdin>", "total");
    assert_eq!(outcome.value, Some(Value::int(42)));
}

#[test]
fn test_input_reads_lines() {
    let (outcome, output) = run("var name = input(\"name: \")\nvar age = input_int()\nname + \" \" + (age + 1)");
    assert_eq!(outcome.value, Some(Value::str("Ada 42")));
    assert_eq!(output, "name: ");
}

#[test]
fn test_call_depth_limit() {
    let mut config = Config::new(stdlib_root());
    config.max_call_depth = 16;
    let (mut interpreter, _) = interpreter_in(config, None);

    let outcome = interpreter.run("<test>", "fun down(n) -> down(n + 1)\ndown(0)");
    assert_eq!(runtime_kind(&outcome), ErrorKind::CallDepth(16));

    let outcome = interpreter.run("<test>", "fun count(n) {\n  if n == 0 { return 0 }\n  return 1 + count(n - 1)\n}\ncount(10)");
    assert_eq!(outcome.value, Some(Value::int(10)));
}

#[test]
fn test_deep_recursion_on_default_stack() {
    let (outcome, _) = run("fun count(n) {\n  if n == 0 { return 0 }\n  return 1 + count(n - 1)\n}\ncount(400)");
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(outcome.value, Some(Value::int(400)));

    let (outcome, _) = run("fun down(n) -> down(n + 1)\ndown(0)");
    assert_eq!(runtime_kind(&outcome), ErrorKind::CallDepth(512));
    assert_eq!(
        outcome.error.unwrap().headline(),
        "Runtime Error: Maximum call depth of 512 exceeded"
    );
}

#[test]
fn test_library_run_survives_deep_recursion() {
    let outcome = rusty_radon::run(
        "<test>",
        "fun down(n) -> down(n + 1)\ndown(0)",
        None,
        None,
        Config::new(stdlib_root()),
    );
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(runtime_kind(&outcome), ErrorKind::CallDepth(512));
}

#[test]
fn test_exit_code_must_fit() {
    let (outcome, _) = run("exit(4294967296)");
    assert!(!outcome.should_exit);
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::InvalidValue("Exit code 4294967296 is out of range".to_owned())
    );

    let (outcome, _) = run("exit(-2)");
    assert!(outcome.should_exit);
    assert_eq!(outcome.exit_code, -2);
}

#[test]
fn test_program_arguments() {
    let config = Config::new(stdlib_root()).with_args(vec!["-x".to_owned(), "data.txt".to_owned()]);
    let (mut interpreter, _) = interpreter_in(config, None);
    let outcome = interpreter.run("<test>", "sys_args()");
    assert_eq!(
        outcome.value.map(|v| v.to_string()),
        Some("[\"-x\", \"data.txt\"]".to_owned())
    );
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    let source = format!(
        r#"var out = File("{path}", "w")
print(out.write("line one\n"))
out.write("line two\n")
out.close()
print(out.is_closed())
var extra = File("{path}", mode="a")
extra.write("line three")
extra.close()
var f = File("{path}")
print(f.readline())
print(f.readlines())
print(f.readline())
f.close()
print(File("{path}").read() == "line one\nline two\nline three")"#,
        path = path.display()
    );

    let (outcome, output) = run(&source);
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(
        output,
        "9\ntrue\nline one\n[\"line two\", \"line three\"]\nnull\ntrue\n"
    );
}

#[test]
fn test_file_errors_are_runtime_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");

    let (outcome, _) = run(&format!("File(\"{}\")", path.display()));
    assert!(matches!(runtime_kind(&outcome), ErrorKind::Io(_)));

    let written = dir.path().join("written.txt");
    let (outcome, _) = run(&format!(
        "var f = File(\"{}\", \"w\")\nf.close()\nf.write(\"late\")",
        written.display()
    ));
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::Io("I/O operation on closed file".to_owned())
    );

    let (outcome, _) = run(&format!("File(\"{}\", \"x\")", written.display()));
    assert_eq!(
        runtime_kind(&outcome),
        ErrorKind::InvalidValue("Invalid file mode 'x'".to_owned())
    );
}

#[test]
fn test_chained_error_renders_both() {
    let (outcome, _) = run("try {\n  1 / 0\n} catch {\n  missing_name\n}");
    let error = match outcome.error {
        Some(RadonError::Runtime(e)) => e,
        other => panic!("expected a runtime error, got {:?}", other),
    };
    assert_eq!(error.kind, ErrorKind::NameNotDefined("missing_name".to_owned()));
    let previous = error.previous.as_ref().unwrap();
    assert_eq!(previous.kind, ErrorKind::DivisionByZero);

    let rendered = error.render();
    let first = rendered.find("Division by zero").unwrap();
    let second = rendered.find("'missing_name' is not defined").unwrap();
    assert_lt!(first, second);
}

#[test]
fn test_nested_run_hangs_below_parent_context() {
    let parent = Context::root("<host>", None);
    let outcome = rusty_radon::run(
        "<nested>",
        "fun f() -> 1 / 0\nf()",
        Some(parent),
        None,
        Config::new(stdlib_root()),
    );
    let error = match outcome.error {
        Some(RadonError::Runtime(e)) => e,
        other => panic!("expected a runtime error, got {:?}", other),
    };

    let mut names = vec![];
    let mut context = Some(error.context.clone());
    while let Some(ctx) = context {
        names.push(ctx.display_name.clone());
        context = ctx.parent.clone();
    }
    assert_eq!(names, vec!["<function f>", "<program>", "<host>"]);
    assert!(error.render().contains("in <function f>"));
}

#[test]
fn test_lexer_and_parser_errors() {
    let (outcome, _) = run("var a = 1 @ 2");
    assert!(matches!(outcome.error, Some(RadonError::Lexer(_))));
    assert_eq!(outcome.exit_code, 1);

    let (outcome, _) = run("fun f(a=1, b) -> a");
    let error = outcome.error.unwrap();
    assert_eq!(error.name(), "Invalid Syntax");
    assert_eq!(
        error.headline(),
        "Invalid Syntax: Parameter 'b' must have a default value, as an earlier parameter has one"
    );
}
