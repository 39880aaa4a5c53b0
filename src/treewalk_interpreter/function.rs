use super::context::Context;
use super::errors::{ErrorKind, Eval, Signal};
use super::interpreter::Interpreter;
use super::symbol_table::SymbolTable;
use super::value::Value;
use crate::radon_frontend::grammar::FuncInfo;
use crate::radon_frontend::span::Span;

use std::fmt;
use std::rc::Rc;

pub struct RadonFnData {
    info: Rc<FuncInfo>,
    /// Default values, evaluated once when the function was defined.
    defaults: Vec<Option<Value>>,
    closure: SymbolTable,
    receiver: Option<Value>,
}

#[derive(Clone)]
pub struct RadonFn(Rc<RadonFnData>);

impl RadonFn {
    pub fn new(info: Rc<FuncInfo>, defaults: Vec<Option<Value>>, closure: SymbolTable) -> Self {
        let data = RadonFnData {
            info,
            defaults,
            closure,
            receiver: None,
        };
        RadonFn(Rc::new(data))
    }

    pub fn name(&self) -> &str {
        self.0.info.name.as_deref().unwrap_or("<anonymous>")
    }

    /// A copy of this function whose `this` is `receiver`.
    pub fn bind(&self, receiver: Value) -> RadonFn {
        let data = RadonFnData {
            info: self.0.info.clone(),
            defaults: self.0.defaults.clone(),
            closure: self.0.closure.clone(),
            receiver: Some(receiver),
        };
        RadonFn(Rc::new(data))
    }

    pub fn execute(
        &self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        interpreter: &mut Interpreter,
        call_span: &Span,
    ) -> Eval {
        let describe = format!("{:?}", self);
        let params: Vec<_> = self
            .0
            .info
            .params
            .iter()
            .zip(self.0.defaults.iter())
            .map(|(param, default)| (param.name.as_str(), default.clone()))
            .collect();

        let values = bind_arguments(&params, args, kwargs, &describe)
            .map_err(|kind| interpreter.error(kind, call_span))?;

        // Create a new scope pointing to the captured closure.
        let env = SymbolTable::with_parent(&self.0.closure);
        if let Some(receiver) = &self.0.receiver {
            env.set("this", receiver.clone())
                .map_err(|kind| interpreter.error(kind, call_span))?;
        }
        for ((name, _), value) in params.iter().zip(values.into_iter()) {
            env.set(name, value)
                .map_err(|kind| interpreter.error(kind, call_span))?;
        }

        let context = Context::child(&interpreter.context, &describe, call_span.clone());
        let body = &self.0.info.body;
        let result = interpreter.run_frame(env, context, call_span, |interp| {
            interp.eval_expression(&body.expr)
        });

        match result {
            Ok(value) if !body.braced => Ok(value),
            Ok(_) => Ok(Value::Null),
            Err(Signal::Return(value)) => Ok(value),
            Err(signal) => match signal.stray_control() {
                Some(kind) => Err(interpreter.error(kind, call_span)),
                None => Err(signal),
            },
        }
    }
}

/// Matches positional then keyword arguments to parameters, filling the
/// rest from defaults. `params` pairs each name with its default.
pub fn bind_arguments(
    params: &[(&str, Option<Value>)],
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    callee: &str,
) -> Result<Vec<Value>, ErrorKind> {
    if args.len() > params.len() {
        return Err(ErrorKind::TooManyArgs(
            args.len() - params.len(),
            callee.to_owned(),
        ));
    }

    let mut slots: Vec<Option<Value>> = args.into_iter().map(Some).collect();
    slots.resize(params.len(), None);

    for (name, value) in kwargs {
        let idx = match params.iter().position(|(param, _)| *param == name) {
            Some(idx) => idx,
            None => return Err(ErrorKind::UnknownKeyword(name, callee.to_owned())),
        };
        if slots[idx].is_some() {
            return Err(ErrorKind::DuplicateArgument(name, callee.to_owned()));
        }
        slots[idx] = Some(value);
    }

    let mut missing = 0;
    let mut bound = Vec::with_capacity(params.len());
    for (slot, (_, default)) in slots.into_iter().zip(params.iter()) {
        match slot.or_else(|| default.clone()) {
            Some(value) => bound.push(value),
            None => missing += 1,
        }
    }

    if missing > 0 {
        return Err(ErrorKind::TooFewArgs(missing, callee.to_owned()));
    }
    Ok(bound)
}

impl fmt::Debug for RadonFn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

impl PartialEq<RadonFn> for RadonFn {
    // Bound copies of one method compare equal when bound to the same receiver.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (Rc::ptr_eq(&self.0.info, &other.0.info)
                && self.0.closure.ptr_eq(&other.0.closure)
                && self.0.receiver == other.0.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<(&'static str, Option<Value>)> {
        vec![("a", None), ("b", Some(Value::int(10)))]
    }

    #[test]
    fn test_defaults_fill_trailing() {
        let bound = bind_arguments(&params(), vec![Value::int(5)], vec![], "f").unwrap();
        assert_eq!(bound, vec![Value::int(5), Value::int(10)]);
    }

    #[test]
    fn test_keywords() {
        let bound = bind_arguments(
            &params(),
            vec![],
            vec![("b".to_owned(), Value::int(1)), ("a".to_owned(), Value::int(2))],
            "f",
        )
        .unwrap();
        assert_eq!(bound, vec![Value::int(2), Value::int(1)]);

        assert_eq!(
            bind_arguments(&params(), vec![], vec![("c".to_owned(), Value::Null)], "f"),
            Err(ErrorKind::UnknownKeyword("c".to_owned(), "f".to_owned()))
        );
        assert_eq!(
            bind_arguments(&params(), vec![Value::int(1)], vec![("a".to_owned(), Value::Null)], "f"),
            Err(ErrorKind::DuplicateArgument("a".to_owned(), "f".to_owned()))
        );
    }

    #[test]
    fn test_arity_errors_count_exactly() {
        assert_eq!(
            bind_arguments(&params(), vec![], vec![], "f"),
            Err(ErrorKind::TooFewArgs(1, "f".to_owned()))
        );
        assert_eq!(
            bind_arguments(&params(), vec![Value::Null; 5], vec![], "f"),
            Err(ErrorKind::TooManyArgs(3, "f".to_owned()))
        );
    }
}
