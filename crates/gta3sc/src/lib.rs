#![doc = include_str!("../../../README.md")]

pub mod arena;
pub mod cmdtable;
pub mod codegen;
pub mod diag;
pub mod ir;
pub mod models;
pub mod sourceman;
pub mod symtable;
pub mod syntax;

pub use crate::{
    cmdtable::{CommandTable, CommandTableBuilder},
    diag::{Diag, DiagArg, Diagnostic, DiagnosticHandler},
    ir::{LinkedIr, ParserIr, SemaIr},
    models::{ModelTable, ModelTableBuilder},
    sourceman::{SourceFile, SourceLocation, SourceManager, SourceRange},
    symtable::SymbolTable,
    syntax::{Parser, Preprocessor, Scanner, Sema},
};
