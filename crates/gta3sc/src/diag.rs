//! Structured diagnostics.
//!
//! The compiler reports problems as [`Diagnostic`] values routed through a
//! caller-supplied emitter callback. Rendering is entirely up to the
//! embedder; the core never formats messages.

use strum::{Display, IntoStaticStr};

use crate::sourceman::{SourceLocation, SourceRange};
use crate::syntax::Category;

/// Every kind of diagnostic the compiler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Diag {
    InternalCompilerError,
    CannotNestScopes,
    CannotMixAndor,
    CannotUseStringConstantHere,
    TooManyConditions,
    /// args: expected, got
    TooFewArguments,
    /// args: expected, got
    TooManyArguments,
    /// args: the expected token category
    ExpectedToken,
    /// args: the expected word
    ExpectedWord,
    /// args: the list of acceptable words
    ExpectedWords,
    ExpectedCommand,
    ExpectedRequireCommand,
    ExpectedArgument,
    ExpectedIdentifier,
    ExpectedInteger,
    ExpectedFloat,
    ExpectedTextLabel,
    ExpectedLabel,
    ExpectedString,
    ExpectedInputInt,
    ExpectedInputFloat,
    ExpectedInputOpt,
    ExpectedVariable,
    ExpectedSubscript,
    ExpectedVarnameAfterDollar,
    ExpectedGvarGotLvar,
    ExpectedLvarGotGvar,
    ExpectedConditionalExpression,
    ExpectedConditionalOperator,
    ExpectedAssignmentOperator,
    ExpectedTernaryOperator,
    ExpectedMissionStartAtTop,
    /// args: the offending name
    UnexpectedSpecialName,
    InvalidChar,
    InvalidFilename,
    InvalidExpression,
    /// args: the non-associative operator category
    InvalidExpressionUnassociative,
    UnterminatedComment,
    UnterminatedStringLiteral,
    IntegerLiteralTooBig,
    FloatLiteralTooBig,
    LimitBlockComments,
    DuplicateVarGlobal,
    DuplicateVarInScope,
    DuplicateVarLvar,
    DuplicateVarStringConstant,
    DuplicateVarTimer,
    DuplicateLabel,
    DuplicateScriptName,
    VarDeclOutsideOfScope,
    VarDeclSubscriptMustBeLiteral,
    VarDeclSubscriptMustBeNonzero,
    VarTypeMismatch,
    VarEntityTypeMismatch,
    SubscriptMustBePositive,
    SubscriptOutOfRange,
    SubscriptButVarIsNotArray,
    SubscriptVarMustBeInt,
    SubscriptVarMustNotBeArray,
    UndefinedLabel,
    UndefinedCommand,
    UndefinedVariable,
    AlternatorMismatch,
    TargetLabelNotWithinScope,
    TargetScopeNotEnoughVars,
    TargetVarTypeMismatch,
    TargetVarEntityTypeMismatch,
    CodegenTargetDoesNotSupportCommand,
    CodegenLabelRefAcrossSegments,
    CodegenLabelAtLocalZeroOffset,
    /// args: the path that could not be opened
    ConfigModelsCouldNotOpenFile,
    ConfigModelsInvalidIdeLine,
}

/// A value attached to a diagnostic for message formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagArg {
    Category(Category),
    Str(String),
    StrList(Vec<String>),
    Int(i64),
}

impl From<Category> for DiagArg {
    fn from(category: Category) -> Self {
        Self::Category(category)
    }
}

impl From<&str> for DiagArg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for DiagArg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<String>> for DiagArg {
    fn from(value: Vec<String>) -> Self {
        Self::StrList(value)
    }
}

impl From<i64> for DiagArg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for DiagArg {
    fn from(value: usize) -> Self {
        Self::Int(value.try_into().unwrap_or(i64::MAX))
    }
}

/// A reported problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: Diag,
    /// Where it was detected.
    pub location: SourceLocation,
    /// Source ranges giving extra context.
    pub ranges: Vec<SourceRange>,
    /// Arguments for message formatting.
    pub args: Vec<DiagArg>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(location: SourceLocation, kind: Diag) -> Self {
        Self {
            kind,
            location,
            ranges: Vec::new(),
            args: Vec::new(),
        }
    }
}

type Emitter = Box<dyn FnMut(&Diagnostic)>;

/// Receives diagnostics and forwards them to an emitter callback.
///
/// The emitter may do anything with the diagnostic, from ignoring it to
/// rendering it into a stream. The handler itself never interprets the
/// report.
pub struct DiagnosticHandler {
    emitter: Emitter,
}

impl std::fmt::Debug for DiagnosticHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticHandler").finish_non_exhaustive()
    }
}

impl DiagnosticHandler {
    pub fn new(emitter: impl FnMut(&Diagnostic) + 'static) -> Self {
        Self {
            emitter: Box::new(emitter),
        }
    }

    /// Starts a diagnostic report; it is emitted when the builder drops.
    pub fn report(&mut self, location: SourceLocation, kind: Diag) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            handler: self,
            diag: Some(Diagnostic::new(location, kind)),
        }
    }

    pub fn set_emitter(&mut self, emitter: impl FnMut(&Diagnostic) + 'static) {
        self.emitter = Box::new(emitter);
    }

    fn emit(&mut self, diag: &Diagnostic) {
        (self.emitter)(diag);
    }
}

/// Accumulates the optional parts of a diagnostic.
///
/// The finished diagnostic is handed to the handler when this value goes out
/// of scope.
#[derive(Debug)]
pub struct DiagnosticBuilder<'h> {
    handler: &'h mut DiagnosticHandler,
    diag: Option<Diagnostic>,
}

impl DiagnosticBuilder<'_> {
    /// Attaches a source range for extra context.
    pub fn range(mut self, range: SourceRange) -> Self {
        if let Some(diag) = self.diag.as_mut() {
            diag.ranges.push(range);
        }
        self
    }

    /// Attaches a formatting argument.
    pub fn arg(mut self, arg: impl Into<DiagArg>) -> Self {
        if let Some(diag) = self.diag.as_mut() {
            diag.args.push(arg.into());
        }
        self
    }

    /// Emits the diagnostic now instead of at scope end.
    pub fn emit(self) {}
}

impl Drop for DiagnosticBuilder<'_> {
    fn drop(&mut self) {
        if let Some(diag) = self.diag.take() {
            self.handler.emit(&diag);
        }
    }
}
