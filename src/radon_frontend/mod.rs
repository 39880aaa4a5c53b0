pub mod cursor;
pub mod errors;
pub mod grammar;
pub mod lexer;
pub mod operator;
pub mod parser;
pub mod span;
pub mod token;

pub use lexer::{tokenize, tokenize_source, Lexer};
pub use parser::{parse, Parser};
