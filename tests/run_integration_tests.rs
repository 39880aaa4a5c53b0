use rusty_radon::config::Config;
use rusty_radon::treewalk_interpreter::{Context, Interpreter};

use regex::Regex;
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use test_generator::test_resources;

#[derive(Debug, PartialEq)]
struct Output {
    output: Vec<String>,
    error: Option<String>,
}

/// Everything the program prints, kept after the interpreter is dropped.
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test_resources("tests/rn_test_cases/**/*.rn")]
fn test_treewalk_interpreter(file: &str) {
    let source = std::fs::read_to_string(file).unwrap();

    let expected_output = get_expected_output(&source);
    let output = run_interpreter_on_source(file, &source);

    assert_eq!(expected_output, output);
}

fn run_interpreter_on_source(file: &str, source: &str) -> Output {
    let buffer = SharedBuffer::default();
    let stdlib = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("stdlib");
    let mut interpreter = Interpreter::with_io(
        Config::new(stdlib),
        Box::new(buffer.clone()),
        Box::new(io::Cursor::new(Vec::new())),
    );
    let import_dir = Path::new(file).parent().map(Path::to_path_buf);
    interpreter.context = Context::root("<program>", import_dir);

    let outcome = interpreter.run(file, source);

    let printed = buffer.0.borrow().clone();
    Output {
        output: String::from_utf8(printed)
            .unwrap()
            .lines()
            .map(|l| l.to_owned())
            .collect(),
        error: outcome.error.map(|e| e.headline()),
    }
}

fn get_expected_output(source: &str) -> Output {
    let output_regexer = Regex::new(r"# expect: (.*)$").unwrap();
    let error_regexer = Regex::new(r"# expect error: (.*)$").unwrap();

    let mut result = Output {
        output: vec![],
        error: None,
    };

    for line in source.lines() {
        if let Some(r) = output_regexer.captures(line) {
            result.output.push(r.get(1).unwrap().as_str().to_owned());
        }
        if let Some(r) = error_regexer.captures(line) {
            result.error.replace(r.get(1).unwrap().as_str().to_owned());
        }
    }

    result
}
