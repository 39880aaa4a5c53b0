use super::operator::{BinaryOperator, LogicalOperator, StepOperator, UnaryOperator};
use super::span::Span;
use std::rc::Rc;

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
}

/// How a binding is written: into the current scope, as a constant, or
/// through to the enclosing scope that already declares the name.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Qualifier {
    Local,
    Const,
    Static,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Fixity {
    Prefix,
    Postfix,
}

#[derive(Debug, PartialEq, Clone)]
pub enum AssignTarget {
    Variable(String),
    Attribute(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
}

/// The body of a block form: a `{ }` block, whose value is discarded, or a
/// single statement, whose value is the result.
#[derive(Debug, PartialEq, Clone)]
pub struct Body {
    pub expr: Box<Expr>,
    pub braced: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub struct IfCase {
    pub condition: Expr,
    pub body: Body,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FuncInfo {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Body,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Expr,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SliceInfo {
    pub start: Option<Box<Expr>>,
    pub end: Option<Box<Expr>>,
    pub step: Option<Box<Expr>>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ModuleName {
    /// A bare identifier, resolved against the standard library.
    Named(String),
    /// A quoted `.rn` path, resolved against the importing module's directory.
    Path(String),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expr {
    pub expr: ExprType,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExprType {
    Literal(Literal),
    Array(Vec<Expr>),
    HashMap(Vec<(Expr, Expr)>),
    Statements(Vec<Expr>),
    Variable(String),
    Assign(AssignTarget, Qualifier, Box<Expr>),
    CompoundAssign(AssignTarget, BinaryOperator, Box<Expr>),
    Step(AssignTarget, StepOperator, Fixity),
    Binary(BinaryOperator, Box<Expr>, Box<Expr>),
    Logical(LogicalOperator, Box<Expr>, Box<Expr>),
    Unary(UnaryOperator, Box<Expr>),
    If(Vec<IfCase>, Option<Body>),
    For {
        var: String,
        start: Box<Expr>,
        end: Box<Expr>,
        step: Option<Box<Expr>>,
        body: Body,
    },
    ForIn {
        var: String,
        iterable: Box<Expr>,
        body: Body,
    },
    While(Box<Expr>, Body),
    FuncDef(Rc<FuncInfo>, Qualifier),
    Call(Box<Expr>, Vec<Expr>, Vec<(String, Expr)>),
    Return(Option<Box<Expr>>),
    Continue,
    Break,
    Fallthrough,
    Fallout,
    Try {
        body: Box<Expr>,
        catch_var: Option<String>,
        handler: Option<Box<Expr>>,
    },
    Switch {
        subject: Box<Expr>,
        cases: Vec<SwitchCase>,
        default: Option<Box<Expr>>,
    },
    ClassDef(String, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Slice(Box<Expr>, SliceInfo),
    Attribute(Box<Expr>, String),
    Import(ModuleName, Option<String>),
    FromImport(ModuleName, Vec<String>),
    Include(ModuleName),
    Raise(String, Option<Box<Expr>>),
    Assert(Box<Expr>, Option<Box<Expr>>),
    Del(String),
}

impl Expr {
    pub fn new(expr: ExprType, span: Span) -> Self {
        Expr { expr, span }
    }

    /// Compact s-expression rendering, used to check parses.
    pub fn ast_string(&self) -> String {
        match &self.expr {
            ExprType::Literal(l) => match l {
                Literal::Int(n) => n.to_string(),
                Literal::Float(n) => format!("{:?}", n),
                Literal::Str(s) => format!("\"{}\"", s),
            },
            ExprType::Array(items) => format!("[{}]", join(items)),
            ExprType::HashMap(pairs) => {
                let pairs: Vec<_> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.ast_string(), v.ast_string()))
                    .collect();
                format!("{{{}}}", pairs.join(", "))
            }
            ExprType::Statements(stmts) => format!("(do {})", join(stmts)),
            ExprType::Variable(name) => name.clone(),
            ExprType::Assign(target, qualifier, value) => {
                let keyword = match qualifier {
                    Qualifier::Local => "var",
                    Qualifier::Const => "const",
                    Qualifier::Static => "static",
                };
                format!("({} {} {})", keyword, target.ast_string(), value.ast_string())
            }
            ExprType::CompoundAssign(target, op, value) => {
                format!("({}= {} {})", op.symbol(), target.ast_string(), value.ast_string())
            }
            ExprType::Step(target, op, fixity) => match fixity {
                Fixity::Prefix => format!("({}pre {})", op.symbol(), target.ast_string()),
                Fixity::Postfix => format!("({}post {})", op.symbol(), target.ast_string()),
            },
            ExprType::Binary(op, lhs, rhs) => {
                format!("({} {} {})", op.symbol(), lhs.ast_string(), rhs.ast_string())
            }
            ExprType::Logical(op, lhs, rhs) => {
                format!("({} {} {})", op.symbol(), lhs.ast_string(), rhs.ast_string())
            }
            ExprType::Unary(op, expr) => format!("({} {})", op.symbol(), expr.ast_string()),
            ExprType::If(cases, else_body) => {
                let mut parts: Vec<_> = cases
                    .iter()
                    .map(|c| format!("{} {}", c.condition.ast_string(), c.body.ast_string()))
                    .collect();
                if let Some(body) = else_body {
                    parts.push(format!("else {}", body.ast_string()));
                }
                format!("(if {})", parts.join(" "))
            }
            ExprType::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                let step = step
                    .as_ref()
                    .map(|s| format!(" step {}", s.ast_string()))
                    .unwrap_or_default();
                format!(
                    "(for {} {} {}{} {})",
                    var,
                    start.ast_string(),
                    end.ast_string(),
                    step,
                    body.ast_string()
                )
            }
            ExprType::ForIn {
                var,
                iterable,
                body,
            } => format!("(for {} in {} {})", var, iterable.ast_string(), body.ast_string()),
            ExprType::While(cond, body) => {
                format!("(while {} {})", cond.ast_string(), body.ast_string())
            }
            ExprType::FuncDef(info, _) => {
                let params: Vec<_> = info
                    .params
                    .iter()
                    .map(|p| match &p.default {
                        Some(d) => format!("{}={}", p.name, d.ast_string()),
                        None => p.name.clone(),
                    })
                    .collect();
                format!(
                    "(fun {} ({}) {})",
                    info.name.as_deref().unwrap_or("<anonymous>"),
                    params.join(" "),
                    info.body.ast_string()
                )
            }
            ExprType::Call(callee, args, kwargs) => {
                let mut parts: Vec<_> = args.iter().map(|a| a.ast_string()).collect();
                parts.extend(
                    kwargs
                        .iter()
                        .map(|(name, value)| format!("{}={}", name, value.ast_string())),
                );
                format!("(call {} {})", callee.ast_string(), parts.join(" "))
            }
            ExprType::Return(Some(expr)) => format!("(return {})", expr.ast_string()),
            ExprType::Return(None) => "(return)".to_owned(),
            ExprType::Continue => "continue".to_owned(),
            ExprType::Break => "break".to_owned(),
            ExprType::Fallthrough => "fallthrough".to_owned(),
            ExprType::Fallout => "fallout".to_owned(),
            ExprType::Try {
                body,
                catch_var,
                handler,
            } => match handler {
                Some(handler) => format!(
                    "(try {} catch {} {})",
                    body.ast_string(),
                    catch_var.as_deref().unwrap_or("_"),
                    handler.ast_string()
                ),
                None => format!("(try {})", body.ast_string()),
            },
            ExprType::Switch {
                subject,
                cases,
                default,
            } => {
                let mut parts: Vec<_> = cases
                    .iter()
                    .map(|c| format!("(case {} {})", c.value.ast_string(), c.body.ast_string()))
                    .collect();
                if let Some(default) = default {
                    parts.push(format!("(default {})", default.ast_string()));
                }
                format!("(switch {} {})", subject.ast_string(), parts.join(" "))
            }
            ExprType::ClassDef(name, body) => format!("(class {} {})", name, body.ast_string()),
            ExprType::Index(target, index) => {
                format!("(index {} {})", target.ast_string(), index.ast_string())
            }
            ExprType::Slice(target, slice) => {
                let part = |p: &Option<Box<Expr>>| {
                    p.as_ref().map(|e| e.ast_string()).unwrap_or_else(|| "_".to_owned())
                };
                format!(
                    "(slice {} {} {} {})",
                    target.ast_string(),
                    part(&slice.start),
                    part(&slice.end),
                    part(&slice.step)
                )
            }
            ExprType::Attribute(target, name) => format!("(get {} {})", target.ast_string(), name),
            ExprType::Import(module, alias) => match alias {
                Some(alias) => format!("(import {} as {})", module, alias),
                None => format!("(import {})", module),
            },
            ExprType::FromImport(module, names) => {
                format!("(from {} import {})", module, names.join(" "))
            }
            ExprType::Include(module) => format!("(include {})", module),
            ExprType::Raise(name, message) => match message {
                Some(message) => format!("(raise {} {})", name, message.ast_string()),
                None => format!("(raise {})", name),
            },
            ExprType::Assert(cond, message) => match message {
                Some(message) => format!("(assert {} {})", cond.ast_string(), message.ast_string()),
                None => format!("(assert {})", cond.ast_string()),
            },
            ExprType::Del(name) => format!("(del {})", name),
        }
    }
}

impl Body {
    pub fn ast_string(&self) -> String {
        if self.braced {
            format!("{{{}}}", self.expr.ast_string())
        } else {
            self.expr.ast_string()
        }
    }
}

impl AssignTarget {
    pub fn ast_string(&self) -> String {
        match self {
            AssignTarget::Variable(name) => name.clone(),
            AssignTarget::Attribute(target, name) => format!("{}.{}", target.ast_string(), name),
            AssignTarget::Index(target, index) => {
                format!("{}[{}]", target.ast_string(), index.ast_string())
            }
        }
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ModuleName::Named(name) => write!(f, "{}", name),
            ModuleName::Path(path) => write!(f, "\"{}\"", path),
        }
    }
}

fn join(exprs: &[Expr]) -> String {
    let parts: Vec<_> = exprs.iter().map(|e| e.ast_string()).collect();
    parts.join(" ")
}
