//! The front-end: preprocessing, scanning, parsing and semantic analysis.

pub use preprocessor::Preprocessor;
pub use scanner::{Category, Scanner, Token};

pub mod parser;
pub mod preprocessor;
pub mod scanner;
pub mod sema;

pub use parser::Parser;
pub use sema::Sema;

/// Parses a decimal integer literal lexeme.
///
/// The lexeme is assumed to match the integer grammar; out-of-range values
/// yield `None`.
pub(crate) fn parse_integer_literal(lexeme: &str) -> Option<i32> {
    lexeme.parse::<i32>().ok()
}

/// Parses a floating-point literal lexeme.
///
/// The literal grammar admits trailing garbage after the first float (for
/// example `1.5.3` or `1f0`), which parses as the longest valid prefix.
/// Out-of-range values yield `None`.
pub(crate) fn parse_float_literal(lexeme: &str) -> Option<f32> {
    let mut end = lexeme.len();
    let mut seen_dot = false;
    for (i, c) in lexeme.char_indices() {
        match c {
            'f' | 'F' => {
                end = i;
                break;
            }
            '.' if seen_dot => {
                end = i;
                break;
            }
            '.' => seen_dot = true,
            _ => {}
        }
    }

    let prefix = &lexeme[..end];
    let value = prefix.parse::<f32>().ok()?;
    if value.is_infinite() {
        return None;
    }
    Some(value)
}
