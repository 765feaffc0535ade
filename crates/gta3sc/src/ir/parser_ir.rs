//! The parser's IR.
//!
//! Each line holds an optional label definition and an optional command.
//! Command and identifier names are stored uppercase, so later phases can
//! compare them directly. Arguments keep their source range for
//! diagnostics.

use crate::sourceman::SourceRange;

/// One line of parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserIr {
    pub label: Option<LabelDef>,
    pub command: Option<Command>,
}

impl ParserIr {
    #[must_use]
    pub fn new(label: Option<LabelDef>, command: Option<Command>) -> Self {
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

/// A label definition at the front of a line.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDef {
    pub name: String,
    pub source: SourceRange,
}

impl LabelDef {
    /// Creates a label definition, normalising the name to uppercase.
    #[must_use]
    pub fn new(name: &str, source: SourceRange) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            source,
        }
    }
}

/// An unresolved command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub source: SourceRange,
    pub not_flag: bool,
    pub args: Vec<Argument>,
}

impl Command {
    #[must_use]
    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn has_args(&self) -> bool {
        !self.args.is_empty()
    }

    #[must_use]
    pub fn arg(&self, i: usize) -> &Argument {
        &self.args[i]
    }
}

/// An unresolved command argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    value: ArgValue,
    source: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
enum ArgValue {
    Int(i32),
    Float(f32),
    Identifier(String),
    Filename(String),
    String(String),
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

    /// Creates an identifier argument, normalising to uppercase.
    #[must_use]
    pub fn identifier(name: &str, source: SourceRange) -> Self {
        Self {
            value: ArgValue::Identifier(name.to_ascii_uppercase()),
            source,
        }
    }

    /// Creates a filename argument, normalising to uppercase.
    #[must_use]
    pub fn filename(name: &str, source: SourceRange) -> Self {
        Self {
            value: ArgValue::Filename(name.to_ascii_uppercase()),
            source,
        }
    }

    /// Creates a string literal argument. The quotes are not included.
    #[must_use]
    pub fn string(value: &str, source: SourceRange) -> Self {
        Self {
            value: ArgValue::String(value.to_owned()),
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
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.value {
            ArgValue::Identifier(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_filename(&self) -> Option<&str> {
        match &self.value {
            ArgValue::Filename(name) => Some(name),
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
    pub fn is_identifier(&self) -> bool {
        matches!(self.value, ArgValue::Identifier(_))
    }

    /// Whether two arguments hold the same value, ignoring source ranges.
    #[must_use]
    pub fn is_same_value(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// Assembles a [`ParserIr`] line.
#[derive(Debug, Default)]
pub struct ParserIrBuilder {
    label: Option<LabelDef>,
    command_name: Option<String>,
    command_source: SourceRange,
    not_flag: bool,
    args: Vec<Argument>,
}

impl ParserIrBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, name: &str, source: SourceRange) -> Self {
        self.label = Some(LabelDef::new(name, source));
        self
    }

    /// Sets the command name (normalised to uppercase) and source.
    pub fn command(mut self, name: &str, source: SourceRange) -> Self {
        self.command_name = Some(name.to_ascii_uppercase());
        self.command_source = source;
        self
    }

    pub fn not_flag(mut self, not_flag: bool) -> Self {
        self.not_flag = not_flag;
        self
    }

    pub fn arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    pub fn arg_int(self, value: i32, source: SourceRange) -> Self {
        self.arg(Argument::int(value, source))
    }

    pub fn arg_filename(self, name: &str, source: SourceRange) -> Self {
        self.arg(Argument::filename(name, source))
    }

    #[must_use]
    pub fn build(self) -> ParserIr {
        let command = self.command_name.map(|name| Command {
            name,
            source: self.command_source,
            not_flag: self.not_flag,
            args: self.args,
        });
        ParserIr::new(self.label, command)
    }
}
