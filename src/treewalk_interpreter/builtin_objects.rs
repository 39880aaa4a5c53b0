use super::builtin_class::{BuiltinClassDef, BuiltinInstance, MethodDef};
use super::errors::{ErrorKind, Eval};
use super::host;
use super::interpreter::Interpreter;
use super::native_function::{expect_int, expect_string, DefaultValue as D, ParamSpec as P};
use super::operations;
use super::value::Value;
use crate::radon_frontend::span::Span;

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};

const NONE: &[P] = &[];
const OTHER: &[P] = &[P::required("other")];

fn missing_state(instance: &BuiltinInstance) -> ErrorKind {
    ErrorKind::TypeMismatch(format!(
        "{} instance was not constructed",
        instance.def().name
    ))
}

// String

pub static STRING_CLASS: BuiltinClassDef = BuiltinClassDef {
    name: "String",
    operators: &[
        MethodDef {
            name: "__constructor__",
            params: &[P::optional("value", D::Str(""))],
            func: string_new,
        },
        MethodDef { name: "__add__", params: OTHER, func: string_add },
        MethodDef { name: "__eq__", params: OTHER, func: string_eq },
        MethodDef {
            name: "__getitem__",
            params: &[P::required("index")],
            func: string_getitem,
        },
        MethodDef { name: "__iter__", params: NONE, func: string_iter },
        MethodDef { name: "__len__", params: NONE, func: string_len },
        MethodDef { name: "__truthy__", params: NONE, func: string_truthy },
    ],
    methods: &[
        MethodDef { name: "upper", params: NONE, func: string_upper },
        MethodDef { name: "lower", params: NONE, func: string_lower },
        MethodDef { name: "strip", params: NONE, func: string_strip },
        MethodDef {
            name: "split",
            params: &[P::optional("sep", D::Null)],
            func: string_split,
        },
        MethodDef {
            name: "replace",
            params: &[P::required("old"), P::required("new")],
            func: string_replace,
        },
        MethodDef {
            name: "startswith",
            params: &[P::required("prefix")],
            func: string_startswith,
        },
        MethodDef {
            name: "endswith",
            params: &[P::required("suffix")],
            func: string_endswith,
        },
        MethodDef { name: "len", params: NONE, func: string_len },
        MethodDef { name: "value", params: NONE, func: string_value },
    ],
    describe: describe_string,
};

fn describe_string(instance: &BuiltinInstance) -> String {
    instance
        .with_state(|s: &mut String| s.clone())
        .unwrap_or_default()
}

fn text_of(interp: &Interpreter, instance: &BuiltinInstance, span: &Span) -> Eval<String> {
    instance
        .with_state(|s: &mut String| s.clone())
        .ok_or_else(|| interp.error(missing_state(instance), span))
}

fn wrap_string(text: String) -> Value {
    let instance = BuiltinInstance::new(&STRING_CLASS);
    instance.set_state(text);
    Value::BuiltinInstance(instance)
}

fn string_new(_interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, _span: &Span) -> Eval {
    this.set_state(args[0].to_string());
    Ok(Value::Null)
}

fn string_add(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    Ok(wrap_string(format!("{}{}", text, args[0])))
}

fn string_eq(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    let equal = match &args[0] {
        Value::String(other) => *other == text,
        Value::BuiltinInstance(other) if other.def().name == STRING_CLASS.name => {
            describe_string(other) == text
        }
        _ => false,
    };
    Ok(Value::Boolean(equal))
}

fn string_getitem(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    interp.check(operations::get_index(&Value::String(text), &args[0]), span)
}

fn string_iter(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    let chars = text.chars().map(|c| Value::String(c.to_string())).collect();
    Ok(Value::array(chars))
}

fn string_len(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    Ok(Value::int(text.chars().count() as i64))
}

fn string_truthy(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    Ok(Value::Boolean(!text.is_empty()))
}

fn string_upper(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    Ok(wrap_string(text_of(interp, this, span)?.to_uppercase()))
}

fn string_lower(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    Ok(wrap_string(text_of(interp, this, span)?.to_lowercase()))
}

fn string_strip(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    Ok(wrap_string(text_of(interp, this, span)?.trim().to_owned()))
}

fn string_split(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    let parts: Vec<Value> = match &args[0] {
        Value::Null => text.split_whitespace().map(Value::str).collect(),
        sep => {
            let sep = interp.check(expect_string(sep, "sep"), span)?;
            if sep.is_empty() {
                return Err(interp.error(
                    ErrorKind::InvalidValue("Empty separator".to_owned()),
                    span,
                ));
            }
            text.split(sep.as_str()).map(Value::str).collect()
        }
    };
    Ok(Value::array(parts))
}

fn string_replace(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    let old = interp.check(expect_string(&args[0], "old"), span)?;
    let new = interp.check(expect_string(&args[1], "new"), span)?;
    Ok(wrap_string(text.replace(old.as_str(), &new)))
}

fn string_startswith(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    let prefix = interp.check(expect_string(&args[0], "prefix"), span)?;
    Ok(Value::Boolean(text.starts_with(prefix.as_str())))
}

fn string_endswith(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = text_of(interp, this, span)?;
    let suffix = interp.check(expect_string(&args[0], "suffix"), span)?;
    Ok(Value::Boolean(text.ends_with(suffix.as_str())))
}

fn string_value(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    text_of(interp, this, span).map(Value::String)
}

// File

pub static FILE_CLASS: BuiltinClassDef = BuiltinClassDef {
    name: "File",
    operators: &[MethodDef {
        name: "__constructor__",
        params: &[P::required("path"), P::optional("mode", D::Str("r"))],
        func: file_open,
    }],
    methods: &[
        MethodDef { name: "read", params: NONE, func: file_read },
        MethodDef { name: "readline", params: NONE, func: file_readline },
        MethodDef { name: "readlines", params: NONE, func: file_readlines },
        MethodDef {
            name: "write",
            params: &[P::required("text")],
            func: file_write,
        },
        MethodDef { name: "close", params: NONE, func: file_close },
        MethodDef { name: "is_closed", params: NONE, func: file_is_closed },
    ],
    describe: describe_file,
};

enum FileHandle {
    Reader(BufReader<File>),
    Writer(File),
}

struct FileState {
    path: String,
    mode: String,
    /// `None` once closed.
    handle: Option<FileHandle>,
}

fn io_error(path: &str, err: std::io::Error) -> ErrorKind {
    ErrorKind::Io(format!("{}: {}", path, err))
}

fn describe_file(instance: &BuiltinInstance) -> String {
    instance
        .with_state(|state: &mut FileState| {
            let status = if state.handle.is_some() { "open" } else { "closed" };
            format!("<File {:?} mode {:?} ({})>", state.path, state.mode, status)
        })
        .unwrap_or_else(|| "<File>".to_owned())
}

/// Runs `f` against the open handle of a File instance.
fn with_handle<R>(
    interp: &Interpreter,
    this: &BuiltinInstance,
    span: &Span,
    f: impl FnOnce(&str, &mut FileHandle) -> Result<R, ErrorKind>,
) -> Eval<R> {
    let result = this.with_state(|state: &mut FileState| match &mut state.handle {
        Some(handle) => f(&state.path, handle),
        None => Err(ErrorKind::Io("I/O operation on closed file".to_owned())),
    });
    match result {
        Some(result) => interp.check(result, span),
        None => Err(interp.error(missing_state(this), span)),
    }
}

fn not_readable() -> ErrorKind {
    ErrorKind::Io("File not open for reading".to_owned())
}

fn file_open(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let path = interp.check(expect_string(&args[0], "path"), span)?;
    let mode = interp.check(expect_string(&args[1], "mode"), span)?;

    let opened = match mode.as_str() {
        "r" => File::open(&path).map(|f| FileHandle::Reader(BufReader::new(f))),
        "w" => File::create(&path).map(FileHandle::Writer),
        "a" => OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map(FileHandle::Writer),
        other => {
            return Err(interp.error(
                ErrorKind::InvalidValue(format!("Invalid file mode '{}'", other)),
                span,
            ))
        }
    };
    let handle = interp.check(opened.map_err(|e| io_error(&path, e)), span)?;

    this.set_state(FileState {
        path,
        mode,
        handle: Some(handle),
    });
    Ok(Value::Null)
}

fn file_read(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    let text = with_handle(interp, this, span, |path, handle| match handle {
        FileHandle::Reader(reader) => {
            let mut text = String::new();
            reader
                .read_to_string(&mut text)
                .map_err(|e| io_error(path, e))?;
            Ok(text)
        }
        FileHandle::Writer(_) => Err(not_readable()),
    })?;
    Ok(Value::String(text))
}

fn read_one_line(path: &str, reader: &mut BufReader<File>) -> Result<Option<String>, ErrorKind> {
    let mut line = String::new();
    let read = reader.read_line(&mut line).map_err(|e| io_error(path, e))?;
    if read == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(&['\n', '\r'][..]).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

fn file_readline(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    let line = with_handle(interp, this, span, |path, handle| match handle {
        FileHandle::Reader(reader) => read_one_line(path, reader),
        FileHandle::Writer(_) => Err(not_readable()),
    })?;
    Ok(line.map(Value::String).unwrap_or(Value::Null))
}

fn file_readlines(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    let lines = with_handle(interp, this, span, |path, handle| match handle {
        FileHandle::Reader(reader) => {
            let mut lines = vec![];
            while let Some(line) = read_one_line(path, reader)? {
                lines.push(Value::String(line));
            }
            Ok(lines)
        }
        FileHandle::Writer(_) => Err(not_readable()),
    })?;
    Ok(Value::array(lines))
}

fn file_write(interp: &mut Interpreter, this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = args[0].to_string();
    let written = with_handle(interp, this, span, |path, handle| match handle {
        FileHandle::Writer(file) => {
            file.write_all(text.as_bytes())
                .map_err(|e| io_error(path, e))?;
            Ok(text.len())
        }
        FileHandle::Reader(_) => Err(ErrorKind::Io("File not open for writing".to_owned())),
    })?;
    Ok(Value::int(written as i64))
}

fn file_close(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    let closed = this.with_state(|state: &mut FileState| -> Result<(), ErrorKind> {
        if let Some(FileHandle::Writer(file)) = &mut state.handle {
            file.flush().map_err(|e| io_error(&state.path, e))?;
        }
        state.handle = None;
        Ok(())
    });
    match closed {
        Some(result) => interp.check(result, span).map(|_| Value::Null),
        None => Err(interp.error(missing_state(this), span)),
    }
}

fn file_is_closed(interp: &mut Interpreter, this: &BuiltinInstance, _args: Vec<Value>, span: &Span) -> Eval {
    this.with_state(|state: &mut FileState| Value::Boolean(state.handle.is_none()))
        .ok_or_else(|| interp.error(missing_state(this), span))
}

// Json

pub static JSON_CLASS: BuiltinClassDef = BuiltinClassDef {
    name: "Json",
    operators: &[MethodDef {
        name: "__constructor__",
        params: NONE,
        func: json_new,
    }],
    methods: &[
        MethodDef {
            name: "dumps",
            params: &[P::required("value"), P::optional("indent", D::Null)],
            func: json_dumps,
        },
        MethodDef {
            name: "loads",
            params: &[P::required("text")],
            func: json_loads,
        },
    ],
    describe: describe_json,
};

fn describe_json(_instance: &BuiltinInstance) -> String {
    "<Json>".to_owned()
}

fn json_new(_interp: &mut Interpreter, _this: &BuiltinInstance, _args: Vec<Value>, _span: &Span) -> Eval {
    Ok(Value::Null)
}

fn json_dumps(interp: &mut Interpreter, _this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let json = interp.check(host::lower(&args[0]), span)?;

    let text = match &args[1] {
        Value::Null => serde_json::to_string(&json).map_err(|e| ErrorKind::InvalidValue(e.to_string())),
        indent => {
            let width = interp.check(expect_int(indent, "indent"), span)?;
            pretty_json(&json, width.max(0) as usize)
        }
    };
    interp.check(text, span).map(Value::String)
}

fn pretty_json(json: &serde_json::Value, width: usize) -> Result<String, ErrorKind> {
    let indent = " ".repeat(width);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut out = vec![];
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    json.serialize(&mut serializer)
        .map_err(|e| ErrorKind::InvalidValue(e.to_string()))?;
    String::from_utf8(out).map_err(|e| ErrorKind::InvalidValue(e.to_string()))
}

fn json_loads(interp: &mut Interpreter, _this: &BuiltinInstance, args: Vec<Value>, span: &Span) -> Eval {
    let text = interp.check(expect_string(&args[0], "text"), span)?;
    let parsed = serde_json::from_str::<serde_json::Value>(&text)
        .map_err(|e| ErrorKind::InvalidValue(format!("Invalid JSON: {}", e)));
    interp.check(parsed, span).map(host::lift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pretty_json_width() {
        let text = pretty_json(&json!({"a": [1]}), 4).unwrap();
        assert_eq!(text, "{\n    \"a\": [\n        1\n    ]\n}");
    }

    #[test]
    fn test_string_describe() {
        assert_eq!(describe_string(&BuiltinInstance::new(&STRING_CLASS)), "");
        if let Value::BuiltinInstance(s) = wrap_string("hey".to_owned()) {
            assert_eq!(s.describe(), "hey");
        }
    }
}
