//! The semantically checked IR.
//!
//! Lines mirror the parser's IR but every name is resolved: commands point
//! at their definition in the command table, identifiers became variable
//! references, labels, constants, files or used objects. Code generation
//! consumes this IR without further validation.

use crate::cmdtable::{CommandId, CommandTable, ConstantId};
use crate::sourceman::SourceRange;
use crate::symtable::{FileId, LabelId, UsedObjectId, VarId};

/// One line of checked program.
#[derive(Debug, Clone, PartialEq)]
pub struct SemaIr {
    pub label: Option<LabelId>,
    pub command: Option<Command>,
}

impl SemaIr {
    #[must_use]
    pub fn new(label: Option<LabelId>, command: Option<Command>) -> Self {
        Self { label, command }
    }

    #[must_use]
    pub fn has_label(&self) -> bool {
        self.label.is_some()
    }

    #[must_use]
    pub fn has_command(&self) -> bool {
        self.command.is_some()
    }
}

/// A resolved command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    def: CommandId,
    source: SourceRange,
    not_flag: bool,
    args: Vec<Argument>,
}

impl Command {
    #[must_use]
    pub fn new(def: CommandId, source: SourceRange, not_flag: bool, args: Vec<Argument>) -> Self {
        Self {
            def,
            source,
            not_flag,
            args,
        }
    }

    /// The command definition this invocation resolved to.
    #[must_use]
    pub fn def(&self) -> CommandId {
        self.def
    }

    #[must_use]
    pub fn source(&self) -> SourceRange {
        self.source
    }

    #[must_use]
    pub fn not_flag(&self) -> bool {
        self.not_flag
    }

    #[must_use]
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    #[must_use]
    pub fn arg(&self, i: usize) -> &Argument {
        &self.args[i]
    }

    #[must_use]
    pub fn num_args(&self) -> usize {
        self.args.len()
    }
}

/// A reference to a variable, possibly through an array subscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarRef {
    var: VarId,
    index: Option<VarIndex>,
}

/// An array subscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarIndex {
    Literal(i32),
    Variable(VarId),
}

impl VarRef {
    #[must_use]
    pub fn new(var: VarId) -> Self {
        Self { var, index: None }
    }

    #[must_use]
    pub fn with_literal_index(var: VarId, index: i32) -> Self {
        Self {
            var,
            index: Some(VarIndex::Literal(index)),
        }
    }

    #[must_use]
    pub fn with_variable_index(var: VarId, index: VarId) -> Self {
        Self {
            var,
            index: Some(VarIndex::Variable(index)),
        }
    }

    /// The referenced variable.
    #[must_use]
    pub fn var(&self) -> VarId {
        self.var
    }

    #[must_use]
    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    #[must_use]
    pub fn index(&self) -> Option<VarIndex> {
        self.index
    }

    #[must_use]
    pub fn index_as_int(&self) -> Option<i32> {
        match self.index {
            Some(VarIndex::Literal(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn index_as_variable(&self) -> Option<VarId> {
        match self.index {
            Some(VarIndex::Variable(var)) => Some(var),
            _ => None,
        }
    }
}

/// A resolved command argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    value: ArgValue,
    source: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
enum ArgValue {
    Int(i32),
    Float(f32),
    TextLabel(String),
    String(String),
    Label(LabelId),
    Filename(FileId),
    VarRef(VarRef),
    Constant(ConstantId),
    UsedObject(UsedObjectId),
}

impl Argument {
    #[must_use]
    pub fn int(value: i32, source: SourceRange) -> Self {
        Self {
            value: ArgValue::Int(value),
            source,
        }
    }

    #[must_use]
    pub fn float(value: f32, source: SourceRange) -> Self {
        Self {
            value: ArgValue::Float(value),
            source,
        }
    }

    /// Creates a text label argument, normalising to uppercase.
    #[must_use]
    pub fn text_label(value: &str, source: SourceRange) -> Self {
        Self {
            value: ArgValue::TextLabel(value.to_ascii_uppercase()),
            source,
        }
    }

    #[must_use]
    pub fn string(value: &str, source: SourceRange) -> Self {
        Self {
            value: ArgValue::String(value.to_owned()),
            source,
        }
    }

    #[must_use]
    pub fn label(label: LabelId, source: SourceRange) -> Self {
        Self {
            value: ArgValue::Label(label),
            source,
        }
    }

    #[must_use]
    pub fn filename(file: FileId, source: SourceRange) -> Self {
        Self {
            value: ArgValue::Filename(file),
            source,
        }
    }

    #[must_use]
    pub fn var_ref(var_ref: VarRef, source: SourceRange) -> Self {
        Self {
            value: ArgValue::VarRef(var_ref),
            source,
        }
    }

    #[must_use]
    pub fn constant(constant: ConstantId, source: SourceRange) -> Self {
        Self {
            value: ArgValue::Constant(constant),
            source,
        }
    }

    #[must_use]
    pub fn used_object(used_object: UsedObjectId, source: SourceRange) -> Self {
        Self {
            value: ArgValue::UsedObject(used_object),
            source,
        }
    }

    #[must_use]
    pub fn source(&self) -> SourceRange {
        self.source
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self.value {
            ArgValue::Int(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self.value {
            ArgValue::Float(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text_label(&self) -> Option<&str> {
        match &self.value {
            ArgValue::TextLabel(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match &self.value {
            ArgValue::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_label(&self) -> Option<LabelId> {
        match self.value {
            ArgValue::Label(label) => Some(label),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_filename(&self) -> Option<FileId> {
        match self.value {
            ArgValue::Filename(file) => Some(file),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_var_ref(&self) -> Option<&VarRef> {
        match &self.value {
            ArgValue::VarRef(var_ref) => Some(var_ref),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_constant(&self) -> Option<ConstantId> {
        match self.value {
            ArgValue::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_used_object(&self) -> Option<UsedObjectId> {
        match self.value {
            ArgValue::UsedObject(used_object) => Some(used_object),
            _ => None,
        }
    }

    /// The argument as an integer, looking through string constants.
    #[must_use]
    pub fn pun_as_int(&self, cmdtable: &CommandTable) -> Option<i32> {
        match self.value {
            ArgValue::Int(value) => Some(value),
            ArgValue::Constant(constant) => Some(cmdtable.constant(constant).value()),
            _ => None,
        }
    }

    /// The argument as a float.
    #[must_use]
    pub fn pun_as_float(&self) -> Option<f32> {
        self.as_float()
    }
}
