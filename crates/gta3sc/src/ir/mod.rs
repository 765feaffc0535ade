//! Intermediate representations.
//!
//! The parser produces [`ParserIr`] lines, which semantic analysis lowers
//! into [`SemaIr`] lines with every name resolved. Both flow through
//! [`LinkedIr`], an insertion-ordered list that supports the splicing the
//! parser's desugarings rely on.

pub use linked::LinkedIr;
pub use parser_ir::{ParserIr, ParserIrBuilder};
pub use sema_ir::SemaIr;

pub mod linked;
pub mod parser_ir;
pub mod sema_ir;
