//! Front end for the Quill language: tokens, AST, the two
//! recursive-descent parsers (syntax-only checker and AST builder), the
//! pretty printer, and source-located diagnostics.

pub mod ast;
pub(crate) mod cursor;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod pretty;
pub mod validate;

pub use ast::{Program, Span};
pub use errors::{offset_to_line_col, ErrorKind, SourceError};
pub use lexer::{lex, Token};
pub use parser::parse;
pub use pretty::print_program;
pub use validate::validate;
