//! Semantic analysis.
//!
//! A two-pass walk over the parser's IR. The first pass discovers every
//! declaration: labels, variable scopes, variables and the reserved timer
//! variables. The second pass re-walks the input, resolves each command
//! against the command table (going through alternators where applicable),
//! validates every argument and produces the checked IR.
//!
//! Analysis keeps going after an error; the walk returns `None` at the end
//! iff anything was reported.

use crate::cmdtable::{
    AlternatorId, CommandId, CommandTable, ConstantId, EntityId, EnumId, ParamDef, ParamType,
    GLOBAL_ENUM, NO_ENTITY_TYPE,
};
use crate::diag::{Diag, DiagnosticBuilder, DiagnosticHandler};
use crate::ir::parser_ir::{Argument as ParserArgument, Command as ParserCommand, LabelDef};
use crate::ir::sema_ir::{Argument, Command, VarRef};
use crate::ir::{LinkedIr, ParserIr, SemaIr};
use crate::models::ModelTable;
use crate::sourceman::{SourceLocation, SourceRange};
use crate::symtable::{LabelId, ScopeId, SymbolTable, VarId, VarType, GLOBAL_SCOPE};
use crate::syntax::parse_integer_literal;

const VARNAME_TIMERA: &str = "TIMERA";
const VARNAME_TIMERB: &str = "TIMERB";

/// An array subscript split off an identifier.
#[derive(Debug, Clone, Copy)]
struct VarSubscript<'i> {
    value: &'i str,
    source: SourceRange,
    /// Set when the subscript is an integer literal.
    literal: Option<i32>,
}

/// An identifier split into variable name and optional subscript.
#[derive(Debug, Clone, Copy)]
struct ParsedVarRef<'i> {
    name: &'i str,
    source: SourceRange,
    subscript: Option<VarSubscript<'i>>,
}

/// The semantic analyzer. See the module docs.
#[derive(Debug)]
pub struct Sema<'a> {
    cmdtable: &'a CommandTable,
    modeltable: &'a ModelTable,
    symtable: &'a mut SymbolTable,
    diag: &'a mut DiagnosticHandler,

    report_count: usize,
    current_scope: Option<ScopeId>,
    /// The first scope this analysis created, used to enumerate scopes in
    /// source order during the second pass.
    first_scope: Option<ScopeId>,

    /// Entity type of each variable, keyed by scope and variable id.
    vars_entity_type: Vec<Vec<EntityId>>,
    seen_script_names: Vec<String>,

    analyzing_var_decl: bool,
    analyzing_alternative_command: bool,
    analyzing_repeat_command: bool,

    alternator_set: Option<AlternatorId>,
    command_script_name: Option<CommandId>,
    command_start_new_script: Option<CommandId>,
    model_enum: Option<EnumId>,
    defaultmodel_enum: Option<EnumId>,
}

impl<'a> Sema<'a> {
    pub fn new(
        cmdtable: &'a CommandTable,
        modeltable: &'a ModelTable,
        symtable: &'a mut SymbolTable,
        diag: &'a mut DiagnosticHandler,
    ) -> Self {
        Self {
            cmdtable,
            modeltable,
            symtable,
            diag,
            report_count: 0,
            current_scope: None,
            first_scope: None,
            vars_entity_type: Vec::new(),
            seen_script_names: Vec::new(),
            analyzing_var_decl: false,
            analyzing_alternative_command: false,
            analyzing_repeat_command: false,
            alternator_set: None,
            command_script_name: None,
            command_start_new_script: None,
            model_enum: None,
            defaultmodel_enum: None,
        }
    }

    /// Runs both analysis passes over the input.
    ///
    /// Returns the checked IR, or `None` if any diagnostic was reported.
    pub fn validate(mut self, parser_ir: &LinkedIr<ParserIr>) -> Option<LinkedIr<SemaIr>> {
        if self.discover_declarations_pass(parser_ir) {
            self.check_semantics_pass(parser_ir)
        } else {
            None
        }
    }

    fn report(&mut self, source: SourceRange, kind: Diag) -> DiagnosticBuilder<'_> {
        self.report_count += 1;
        self.diag.report(source.begin, kind).range(source)
    }

    fn report_at(&mut self, location: SourceLocation, kind: Diag) -> DiagnosticBuilder<'_> {
        self.report_count += 1;
        self.diag.report(location, kind)
    }

    fn discover_declarations_pass(&mut self, parser_ir: &LinkedIr<ParserIr>) -> bool {
        debug_assert!(self.report_count == 0);
        let mut scope_enter_source = SourceRange::default();
        self.current_scope = None;

        for line in parser_ir {
            if let Some(label) = &line.label {
                self.declare_label(label);
            }

            let Some(command) = &line.command else {
                continue;
            };

            match command.name.as_str() {
                "{" => {
                    debug_assert!(self.current_scope.is_none());
                    self.current_scope = Some(self.symtable.new_scope());
                    scope_enter_source = command.source;

                    if self.first_scope.is_none() {
                        self.first_scope = self.current_scope;
                    }
                }
                "}" => {
                    // The timers are inserted at scope closing, rather than
                    // opening, so they take the last ids of the scope.
                    if let Some(scope) = self.current_scope {
                        let (_, inserted_a) = self.symtable.insert_var(
                            VARNAME_TIMERA,
                            scope,
                            VarType::Int,
                            None,
                            scope_enter_source,
                        );
                        let (_, inserted_b) = self.symtable.insert_var(
                            VARNAME_TIMERB,
                            scope,
                            VarType::Int,
                            None,
                            scope_enter_source,
                        );
                        debug_assert!(inserted_a && inserted_b);
                    }
                    self.current_scope = None;
                    scope_enter_source = SourceRange::default();
                }
                "VAR_INT" => {
                    self.declare_variable(command, Some(GLOBAL_SCOPE), VarType::Int);
                }
                "LVAR_INT" => {
                    let scope = self.current_scope;
                    self.declare_variable(command, scope, VarType::Int);
                }
                "VAR_FLOAT" => {
                    self.declare_variable(command, Some(GLOBAL_SCOPE), VarType::Float);
                }
                "LVAR_FLOAT" => {
                    let scope = self.current_scope;
                    self.declare_variable(command, scope, VarType::Float);
                }
                "VAR_TEXT_LABEL" => {
                    self.declare_variable(command, Some(GLOBAL_SCOPE), VarType::TextLabel);
                }
                "LVAR_TEXT_LABEL" => {
                    let scope = self.current_scope;
                    self.declare_variable(command, scope, VarType::TextLabel);
                }
                _ => {}
            }
        }

        // Allocate entity type tracking for every scope discovered so far.
        self.vars_entity_type = (0..self.symtable.num_scopes())
            .map(|i| vec![NO_ENTITY_TYPE; self.symtable.scope_len(ScopeId::from_u32(i))])
            .collect();

        // Variables must not collide with names in adjacent namespaces.
        let mut collisions: Vec<(SourceRange, Diag)> = Vec::new();
        for i in 0..self.symtable.num_scopes() {
            let scope_id = ScopeId::from_u32(i);
            let ours = scope_id == GLOBAL_SCOPE
                || self.first_scope.is_some_and(|first| scope_id >= first);
            if !ours {
                continue;
            }

            for var in self.symtable.scope_vars(scope_id) {
                if scope_id != GLOBAL_SCOPE
                    && self.symtable.lookup_var(var.name(), GLOBAL_SCOPE).is_some()
                {
                    collisions.push((var.source(), Diag::DuplicateVarLvar));
                }

                if self.cmdtable.find_constant_any_means(var.name()).is_some() {
                    collisions.push((var.source(), Diag::DuplicateVarStringConstant));
                }
            }
        }
        for (source, kind) in collisions {
            self.report(source, kind);
        }

        self.report_count == 0
    }

    fn check_semantics_pass(&mut self, parser_ir: &LinkedIr<ParserIr>) -> Option<LinkedIr<SemaIr>> {
        debug_assert!(self.report_count == 0);

        let mut linked = LinkedIr::new();

        self.current_scope = None;
        let mut scope_accum = self.first_scope;

        self.alternator_set = self.cmdtable.find_alternator("SET");
        self.command_script_name = self.cmdtable.find_command("SCRIPT_NAME");
        self.command_start_new_script = self.cmdtable.find_command("START_NEW_SCRIPT");
        self.model_enum = self.cmdtable.find_enumeration("MODEL");
        self.defaultmodel_enum = self.cmdtable.find_enumeration("DEFAULTMODEL");

        for line in parser_ir {
            self.analyzing_var_decl = false;
            self.analyzing_alternative_command = false;
            self.analyzing_repeat_command = false;

            if let Some(command) = &line.command {
                match command.name.as_str() {
                    "{" => {
                        debug_assert!(self.current_scope.is_none());
                        // Scopes appear in source order, so the cursor set
                        // up by the first pass enumerates them.
                        self.current_scope = scope_accum;
                        scope_accum = scope_accum.map(ScopeId::next);
                    }
                    "}" => {
                        debug_assert!(self.current_scope.is_some());
                        self.current_scope = None;
                    }
                    "VAR_INT" | "LVAR_INT" | "VAR_FLOAT" | "LVAR_FLOAT" | "VAR_TEXT_LABEL"
                    | "LVAR_TEXT_LABEL" => {
                        self.analyzing_var_decl = true;
                    }
                    "REPEAT" => {
                        self.analyzing_repeat_command = true;
                    }
                    _ => {}
                }
            }

            let label = line
                .label
                .as_ref()
                .and_then(|label_def| self.validate_label_def(label_def));

            let command = line
                .command
                .as_ref()
                .and_then(|command| self.validate_command(command));

            linked.push_back(SemaIr::new(label, command));
        }

        if self.report_count != 0 {
            return None;
        }

        Some(linked)
    }

    fn validate_label_def(&mut self, label_def: &LabelDef) -> Option<LabelId> {
        let label = self.symtable.lookup_label(&label_def.name);
        if label.is_none() {
            // All labels were declared in the first pass; this means the
            // passes disagree about the input.
            self.report(label_def.source, Diag::UndefinedLabel);
        }
        label
    }

    fn validate_command(&mut self, command: &ParserCommand) -> Option<Command> {
        let cmdtable = self.cmdtable;
        let mut failed = false;

        let command_def = if let Some(alternator) = cmdtable.find_alternator(&command.name) {
            let matching = cmdtable
                .alternator(alternator)
                .alternatives()
                .iter()
                .copied()
                .find(|&alternative| self.is_matching_alternative(command, alternative));

            let Some(matching) = matching else {
                self.report(command.source, Diag::AlternatorMismatch);
                return None;
            };

            self.analyzing_alternative_command = true;
            matching
        } else if let Some(def) = cmdtable.find_command(&command.name) {
            def
        } else {
            self.report(command.source, Diag::UndefinedCommand);
            return None;
        };

        let def = cmdtable.command(command_def);
        let params = def.params();

        let mut args = Vec::with_capacity(command.num_args());
        let mut arg_index = 0;
        let mut param_index = 0;

        while arg_index < command.num_args() && param_index < params.len() {
            let param = &params[param_index];

            if let Some(ir_arg) = self.validate_argument(param, command.arg(arg_index)) {
                if !failed {
                    args.push(ir_arg);
                }
            } else {
                failed = true;
            }

            arg_index += 1;
            if !param.is_optional() {
                param_index += 1;
            }
        }

        let expected_args = def.num_min_params();
        let got_args = command.num_args();

        if arg_index < command.num_args() {
            failed = true;
            self.report(command.source, Diag::TooManyArguments)
                .arg(expected_args)
                .arg(got_args);
        } else if param_index < params.len() && !params[param_index].is_optional() {
            failed = true;
            self.report(command.source, Diag::TooFewArguments)
                .arg(expected_args)
                .arg(got_args);
        }

        let result = Command::new(command_def, command.source, command.not_flag, args);

        if !failed && !self.validate_hardcoded_command(&result) {
            failed = true;
        }

        if failed { None } else { Some(result) }
    }

    fn validate_argument(&mut self, param: &ParamDef, arg: &ParserArgument) -> Option<Argument> {
        let cmdtable = self.cmdtable;

        match param.param_type {
            ParamType::Int => {
                if self.analyzing_alternative_command {
                    if let Some(ident) = arg.as_identifier() {
                        // Matched during alternation, so the identifier is
                        // a valid global string constant.
                        if let Some(cdef) = cmdtable.find_constant(GLOBAL_ENUM, ident) {
                            return Some(Argument::constant(cdef, arg.source()));
                        }
                    }
                }
                self.validate_integer_literal(arg)
            }
            ParamType::Float => self.validate_float_literal(arg),
            ParamType::TextLabel => {
                let Some(ident) = arg.as_identifier() else {
                    self.report(arg.source(), Diag::ExpectedTextLabel);
                    return None;
                };

                if cmdtable.find_constant(GLOBAL_ENUM, ident).is_some() {
                    self.report(arg.source(), Diag::CannotUseStringConstantHere);
                    return None;
                }

                if ident.starts_with('$') {
                    self.validate_var_ref(param, arg)
                } else {
                    self.validate_text_label(arg)
                }
            }
            ParamType::Label => {
                if let Some(filename) = arg.as_filename() {
                    return match self.symtable.lookup_file(filename) {
                        Some(file) => Some(Argument::filename(file, arg.source())),
                        None => {
                            self.report(arg.source(), Diag::UndefinedLabel);
                            None
                        }
                    };
                }
                self.validate_label(arg)
            }
            ParamType::String => self.validate_string_literal(arg),
            ParamType::VarInt
            | ParamType::LvarInt
            | ParamType::VarFloat
            | ParamType::LvarFloat
            | ParamType::VarTextLabel
            | ParamType::LvarTextLabel
            | ParamType::VarIntOpt
            | ParamType::LvarIntOpt
            | ParamType::VarFloatOpt
            | ParamType::LvarFloatOpt
            | ParamType::VarTextLabelOpt
            | ParamType::LvarTextLabelOpt => self.validate_var_ref(param, arg),
            ParamType::InputInt => {
                if self.analyzing_alternative_command {
                    // Matched during alternation, so the identifier is a
                    // string constant from some enumeration.
                    if let Some(cdef) = arg
                        .as_identifier()
                        .and_then(|ident| cmdtable.find_constant_any_means(ident))
                    {
                        return Some(Argument::constant(cdef, arg.source()));
                    }
                }

                if arg.as_int().is_some() {
                    return self.validate_integer_literal(arg);
                }

                if let Some(ident) = arg.as_identifier() {
                    if self.is_object_param(param) {
                        if let Some(cdef) = self.find_defaultmodel_constant(ident) {
                            return Some(Argument::constant(cdef, arg.source()));
                        }
                        if self.modeltable.find_model(ident).is_some() {
                            let (uobj, _) = self.symtable.insert_used_object(ident, arg.source());
                            return Some(Argument::used_object(uobj, arg.source()));
                        }
                    } else if let Some(cdef) = cmdtable.find_constant(param.enum_type, ident) {
                        return Some(Argument::constant(cdef, arg.source()));
                    }
                    return self.validate_var_ref(param, arg);
                }

                self.report(arg.source(), Diag::ExpectedInputInt);
                None
            }
            ParamType::InputFloat => {
                if arg.as_float().is_some() {
                    return self.validate_float_literal(arg);
                }

                if let Some(ident) = arg.as_identifier() {
                    if cmdtable.find_constant(GLOBAL_ENUM, ident).is_some() {
                        self.report(arg.source(), Diag::CannotUseStringConstantHere);
                        return None;
                    }
                    return self.validate_var_ref(param, arg);
                }

                self.report(arg.source(), Diag::ExpectedInputFloat);
                None
            }
            ParamType::InputOpt => {
                if arg.as_int().is_some() {
                    return self.validate_integer_literal(arg);
                }
                if arg.as_float().is_some() {
                    return self.validate_float_literal(arg);
                }

                if let Some(ident) = arg.as_identifier() {
                    if let Some(cdef) = cmdtable.find_constant(GLOBAL_ENUM, ident) {
                        return Some(Argument::constant(cdef, arg.source()));
                    }
                    return self.validate_var_ref(param, arg);
                }

                self.report(arg.source(), Diag::ExpectedInputOpt);
                None
            }
            ParamType::OutputInt | ParamType::OutputFloat => {
                if arg
                    .as_identifier()
                    .is_some_and(|ident| cmdtable.find_constant(GLOBAL_ENUM, ident).is_some())
                {
                    self.report(arg.source(), Diag::CannotUseStringConstantHere);
                    return None;
                }
                self.validate_var_ref(param, arg)
            }
        }
    }

    fn validate_integer_literal(&mut self, arg: &ParserArgument) -> Option<Argument> {
        let value = match arg.as_int() {
            Some(value) => value,
            None => {
                self.report(arg.source(), Diag::ExpectedInteger);
                0 // recover
            }
        };
        Some(Argument::int(value, arg.source()))
    }

    fn validate_float_literal(&mut self, arg: &ParserArgument) -> Option<Argument> {
        let value = match arg.as_float() {
            Some(value) => value,
            None => {
                self.report(arg.source(), Diag::ExpectedFloat);
                0.0 // recover
            }
        };
        Some(Argument::float(value, arg.source()))
    }

    fn validate_text_label(&mut self, arg: &ParserArgument) -> Option<Argument> {
        let value = match arg.as_identifier() {
            Some(value) => value,
            None => {
                self.report(arg.source(), Diag::ExpectedTextLabel);
                "DUMMY" // recover
            }
        };
        Some(Argument::text_label(value, arg.source()))
    }

    fn validate_label(&mut self, arg: &ParserArgument) -> Option<Argument> {
        let Some(ident) = arg.as_identifier() else {
            self.report(arg.source(), Diag::ExpectedLabel);
            return None;
        };

        let Some(label) = self.symtable.lookup_label(ident) else {
            self.report(arg.source(), Diag::UndefinedLabel);
            return None;
        };

        Some(Argument::label(label, arg.source()))
    }

    fn validate_string_literal(&mut self, arg: &ParserArgument) -> Option<Argument> {
        let Some(value) = arg.as_string() else {
            self.report(arg.source(), Diag::ExpectedString);
            return None;
        };
        Some(Argument::string(value, arg.source()))
    }

    fn validate_var_ref(&mut self, param: &ParamDef, arg: &ParserArgument) -> Option<Argument> {
        let mut failed = false;

        let Some(mut arg_ident) = arg.as_identifier() else {
            self.report(arg.source(), Diag::ExpectedVariable);
            return None;
        };
        let mut arg_source = arg.source();

        // For text label parameters the identifier begins with a dollar and
        // its suffix references a variable of text label type.
        if param.param_type == ParamType::TextLabel {
            debug_assert!(arg_ident.starts_with('$'));

            if arg_ident.len() == 1 || matches!(arg_ident.as_bytes()[1], b'[' | b']') {
                self.report(arg.source(), Diag::ExpectedVarnameAfterDollar);
                return None;
            }

            arg_ident = &arg_ident[1..];
            arg_source = arg_source.suffix(1);
        }

        let parsed = self.parse_var_ref(arg_ident, arg_source);
        let var_name = parsed.name;
        let var_source = parsed.source;
        let mut subscript = parsed.subscript;

        let Some(sym_var) = self.lookup_var_lvar(var_name) else {
            self.report(var_source, Diag::UndefinedVariable);
            return None;
        };

        let (var_scope, var_type, var_is_array, var_dims) = {
            let var = self.symtable.variable(sym_var);
            (var.scope(), var.var_type(), var.is_array(), var.dimensions())
        };

        // The storage of the variable must match the parameter.
        if Self::is_gvar_param(param.param_type) && var_scope != GLOBAL_SCOPE {
            if !self.analyzing_repeat_command {
                // REPEAT hardcodes the acceptance of local counters.
                failed = true;
                self.report(var_source, Diag::ExpectedGvarGotLvar);
            }
        } else if Self::is_lvar_param(param.param_type) && var_scope == GLOBAL_SCOPE {
            failed = true;
            self.report(var_source, Diag::ExpectedLvarGotGvar);
        }

        // The type of the variable must match the parameter.
        if !Self::matches_var_type(param.param_type, var_type) {
            failed = true;
            self.report(var_source, Diag::VarTypeMismatch);
        }

        // An array name without a subscript references element zero.
        if subscript.is_none() && var_is_array {
            subscript = Some(VarSubscript {
                value: var_name,
                source: var_source,
                literal: Some(0),
            });
        }

        if subscript.is_some() && !var_is_array {
            failed = true;
            self.report(var_source, Diag::SubscriptButVarIsNotArray);
        }

        if let Some(sub) = &mut subscript {
            if let Some(literal) = sub.literal {
                // A declaration's own subscript equals the dimension and
                // would otherwise diagnose.
                if !self.analyzing_var_decl
                    && (literal < 0 || literal >= i32::from(var_dims.unwrap_or(1)))
                {
                    failed = true;
                    let source = sub.source;
                    self.report(source, Diag::SubscriptOutOfRange);
                    sub.literal = Some(0); // recover
                }
            }
        }

        let mut sym_subscript: Option<VarId> = None;
        if let Some(sub) = &mut subscript {
            if sub.literal.is_none() {
                match self.lookup_var_lvar(sub.value) {
                    None => {
                        failed = true;
                        let source = sub.source;
                        self.report(source, Diag::UndefinedVariable);
                        sub.literal = Some(0); // recover
                    }
                    Some(sub_var) => {
                        let (sub_type, sub_is_array) = {
                            let var = self.symtable.variable(sub_var);
                            (var.var_type(), var.is_array())
                        };

                        if sub_type != VarType::Int {
                            failed = true;
                            let source = sub.source;
                            self.report(source, Diag::SubscriptVarMustBeInt);
                            sub.literal = Some(0); // recover
                        } else if sub_is_array {
                            failed = true;
                            let source = sub.source;
                            self.report(source, Diag::SubscriptVarMustNotBeArray);
                            sub.literal = Some(0); // recover
                        } else {
                            sym_subscript = Some(sub_var);
                        }
                    }
                }
            }
        }

        if param.entity_type != NO_ENTITY_TYPE {
            if param.param_type == ParamType::OutputInt
                && self.var_entity_type(sym_var) == NO_ENTITY_TYPE
            {
                self.set_var_entity_type(sym_var, param.entity_type);
            }

            if self.var_entity_type(sym_var) != param.entity_type {
                failed = true;
                self.report(var_source, Diag::VarEntityTypeMismatch);
            }
        }

        if failed {
            None
        } else if let Some(sub_var) = sym_subscript {
            Some(Argument::var_ref(
                VarRef::with_variable_index(sym_var, sub_var),
                arg_source,
            ))
        } else if let Some(literal) = subscript.and_then(|sub| sub.literal) {
            Some(Argument::var_ref(
                VarRef::with_literal_index(sym_var, literal),
                arg_source,
            ))
        } else {
            Some(Argument::var_ref(VarRef::new(sym_var), arg_source))
        }
    }

    fn validate_hardcoded_command(&mut self, command: &Command) -> bool {
        if Some(command.def()) == self.command_script_name {
            self.validate_script_name(command)
        } else if Some(command.def()) == self.command_start_new_script {
            self.validate_start_new_script(command)
        } else if self
            .alternator_set
            .is_some_and(|set| self.is_alternative_command(command.def(), set))
        {
            self.validate_set(command)
        } else {
            true
        }
    }

    /// Propagates entity types through assignments.
    fn validate_set(&mut self, command: &Command) -> bool {
        if command.num_args() == 2 {
            let lhs = command.arg(0).as_var_ref().copied();
            let rhs = command.arg(1).as_var_ref().copied();
            if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                let lhs_entity_type = self.var_entity_type(lhs.var());
                let rhs_entity_type = self.var_entity_type(rhs.var());

                if lhs_entity_type == NO_ENTITY_TYPE && rhs_entity_type != NO_ENTITY_TYPE {
                    self.set_var_entity_type(lhs.var(), rhs_entity_type);
                } else if lhs_entity_type != rhs_entity_type {
                    let arg0_source = command.arg(0).source();
                    let arg1_source = command.arg(1).source();
                    self.report(command.source(), Diag::VarEntityTypeMismatch)
                        .range(arg0_source)
                        .range(arg1_source);
                    return false;
                }
            }
        }

        true
    }

    /// Script names must be unique across the whole multifile.
    fn validate_script_name(&mut self, command: &Command) -> bool {
        if command.num_args() == 1 {
            if let Some(name) = command.arg(0).as_text_label() {
                if self.seen_script_names.iter().any(|seen| seen == name) {
                    let source = command.arg(0).source();
                    self.report(source, Diag::DuplicateScriptName);
                    return false;
                }
                self.seen_script_names.push(name.to_owned());
            }
        }

        true
    }

    fn validate_start_new_script(&mut self, command: &Command) -> bool {
        if command.num_args() == 0 {
            return true;
        }

        let Some(target_label) = command.arg(0).as_label() else {
            return true;
        };

        let target_scope = self.symtable.label(target_label).scope();
        if target_scope == GLOBAL_SCOPE {
            let source = command.arg(0).source();
            self.report(source, Diag::TargetLabelNotWithinScope);
            return false;
        }

        self.validate_target_scope_vars(&command.args()[1..], target_scope)
    }

    /// Arguments of `START_NEW_SCRIPT` map positionally onto the first
    /// local variables of the target scope, excluding the timers.
    fn validate_target_scope_vars(&mut self, args: &[Argument], target_scope: ScopeId) -> bool {
        debug_assert!(target_scope != GLOBAL_SCOPE);

        if args.is_empty() {
            return true;
        }

        let timera = self.symtable.lookup_var(VARNAME_TIMERA, target_scope);
        let timerb = self.symtable.lookup_var(VARNAME_TIMERB, target_scope);

        let mut target_vars: Vec<Option<VarId>> = vec![None; args.len()];
        for var in self.symtable.scope_vars(target_scope) {
            let var_id = var.var_id();
            if Some(var_id) == timera || Some(var_id) == timerb {
                continue;
            }
            if (var.id() as usize) < target_vars.len() {
                target_vars[var.id() as usize] = Some(var_id);
            }
        }

        let mut failed = false;

        for (i, arg) in args.iter().enumerate() {
            let Some(target_var) = target_vars[i] else {
                failed = true;
                self.report(arg.source(), Diag::TargetScopeNotEnoughVars);
                continue;
            };

            let target_type = self.symtable.variable(target_var).var_type();

            if arg.pun_as_int(self.cmdtable).is_some() {
                if target_type != VarType::Int {
                    failed = true;
                    self.report(arg.source(), Diag::TargetVarTypeMismatch);
                }
            } else if arg.pun_as_float().is_some() {
                if target_type != VarType::Float {
                    failed = true;
                    self.report(arg.source(), Diag::TargetVarTypeMismatch);
                }
            } else if arg.as_text_label().is_some() {
                if target_type != VarType::TextLabel {
                    failed = true;
                    self.report(arg.source(), Diag::TargetVarTypeMismatch);
                }
            } else if let Some(var_ref) = arg.as_var_ref() {
                let source_var = var_ref.var();
                let source_type = self.symtable.variable(source_var).var_type();

                if target_type != source_type {
                    failed = true;
                    self.report(arg.source(), Diag::TargetVarTypeMismatch);
                } else if self.var_entity_type(target_var) == NO_ENTITY_TYPE
                    && self.var_entity_type(source_var) != NO_ENTITY_TYPE
                {
                    let entity_type = self.var_entity_type(source_var);
                    self.set_var_entity_type(target_var, entity_type);
                } else if self.var_entity_type(target_var) != self.var_entity_type(source_var) {
                    failed = true;
                    self.report(arg.source(), Diag::TargetVarEntityTypeMismatch);
                }
            } else {
                failed = true;
                self.report(arg.source(), Diag::InternalCompilerError);
            }
        }

        !failed
    }

    fn declare_label(&mut self, label_def: &LabelDef) {
        let scope_id = self.current_scope.unwrap_or(GLOBAL_SCOPE);
        let (_, inserted) = self
            .symtable
            .insert_label(&label_def.name, scope_id, label_def.source);
        if !inserted {
            self.report(label_def.source, Diag::DuplicateLabel);
        }
    }

    fn declare_variable(
        &mut self,
        command: &ParserCommand,
        scope_id: Option<ScopeId>,
        var_type: VarType,
    ) {
        for arg in &command.args {
            let Some(ident) = arg.as_identifier() else {
                self.report(arg.source(), Diag::ExpectedIdentifier);
                continue;
            };

            let parsed = self.parse_var_ref(ident, arg.source());
            let mut subscript = parsed.subscript;

            if let Some(sub) = &mut subscript {
                if sub.literal.is_none() {
                    let source = sub.source;
                    self.report(source, Diag::VarDeclSubscriptMustBeLiteral);
                    sub.literal = Some(1); // recover
                }
                if sub.literal.is_some_and(|literal| literal <= 0) {
                    let source = sub.source;
                    self.report(source, Diag::VarDeclSubscriptMustBeNonzero);
                    sub.literal = Some(1); // recover
                }
            }

            let var_scope = match scope_id {
                Some(scope) => scope,
                None => {
                    self.report(arg.source(), Diag::VarDeclOutsideOfScope);
                    GLOBAL_SCOPE // recover
                }
            };

            let dimensions = subscript
                .and_then(|sub| sub.literal)
                .map(|literal| u16::try_from(literal).unwrap_or(u16::MAX));

            if parsed.name == VARNAME_TIMERA || parsed.name == VARNAME_TIMERB {
                self.report(parsed.source, Diag::DuplicateVarTimer);
            } else {
                let (_, inserted) = self.symtable.insert_var(
                    parsed.name,
                    var_scope,
                    var_type,
                    dimensions,
                    arg.source(),
                );
                if !inserted {
                    if var_scope == GLOBAL_SCOPE {
                        self.report(parsed.source, Diag::DuplicateVarGlobal);
                    } else {
                        self.report(parsed.source, Diag::DuplicateVarInScope);
                    }
                }
            }
        }
    }

    /// Looks up a variable first in the global scope, then in the scope
    /// being analyzed.
    fn lookup_var_lvar(&self, name: &str) -> Option<VarId> {
        if let Some(gvar) = self.symtable.lookup_var(name, GLOBAL_SCOPE) {
            return Some(gvar);
        }
        self.current_scope
            .and_then(|scope| self.symtable.lookup_var(name, scope))
    }

    fn var_entity_type(&self, var: VarId) -> EntityId {
        self.vars_entity_type[var.scope().to_u32() as usize][var.id() as usize]
    }

    fn set_var_entity_type(&mut self, var: VarId, entity_type: EntityId) {
        self.vars_entity_type[var.scope().to_u32() as usize][var.id() as usize] = entity_type;
    }

    fn find_defaultmodel_constant(&self, name: &str) -> Option<ConstantId> {
        self.defaultmodel_enum
            .and_then(|enum_id| self.cmdtable.find_constant(enum_id, name))
    }

    fn is_object_param(&self, param: &ParamDef) -> bool {
        self.model_enum.is_some_and(|model| param.enum_type == model)
    }

    fn is_gvar_param(param_type: ParamType) -> bool {
        matches!(
            param_type,
            ParamType::VarInt
                | ParamType::VarFloat
                | ParamType::VarTextLabel
                | ParamType::VarIntOpt
                | ParamType::VarFloatOpt
                | ParamType::VarTextLabelOpt
        )
    }

    fn is_lvar_param(param_type: ParamType) -> bool {
        matches!(
            param_type,
            ParamType::LvarInt
                | ParamType::LvarFloat
                | ParamType::LvarTextLabel
                | ParamType::LvarIntOpt
                | ParamType::LvarFloatOpt
                | ParamType::LvarTextLabelOpt
        )
    }

    fn matches_var_type(param_type: ParamType, var_type: VarType) -> bool {
        match param_type {
            ParamType::VarInt
            | ParamType::LvarInt
            | ParamType::VarIntOpt
            | ParamType::LvarIntOpt
            | ParamType::InputInt
            | ParamType::OutputInt => var_type == VarType::Int,
            ParamType::VarFloat
            | ParamType::LvarFloat
            | ParamType::VarFloatOpt
            | ParamType::LvarFloatOpt
            | ParamType::InputFloat
            | ParamType::OutputFloat => var_type == VarType::Float,
            ParamType::VarTextLabel
            | ParamType::LvarTextLabel
            | ParamType::VarTextLabelOpt
            | ParamType::LvarTextLabelOpt
            | ParamType::TextLabel => var_type == VarType::TextLabel,
            ParamType::InputOpt => var_type == VarType::Int || var_type == VarType::Float,
            ParamType::Int | ParamType::Float | ParamType::Label | ParamType::String => false,
        }
    }

    fn is_alternative_command(&self, command_def: CommandId, alternator: AlternatorId) -> bool {
        self.cmdtable
            .alternator(alternator)
            .alternatives()
            .contains(&command_def)
    }

    /// Whether a parsed command's arguments match an alternative's
    /// parameters under the alternator matching rules.
    fn is_matching_alternative(
        &mut self,
        command: &ParserCommand,
        alternative: CommandId,
    ) -> bool {
        let cmdtable = self.cmdtable;
        let def = cmdtable.command(alternative);

        // Alternators do not admit optional parameters.
        if command.num_args() != def.num_min_params() {
            return false;
        }

        for i in 0..command.num_args() {
            let arg = command.arg(i);
            let param = def.param(i);

            // Global string constants take precedence over anything that is
            // an identifier and may only match plain integer parameters.
            if param.param_type != ParamType::Int
                && arg
                    .as_identifier()
                    .is_some_and(|ident| cmdtable.find_constant(GLOBAL_ENUM, ident).is_some())
            {
                return false;
            }

            match param.param_type {
                ParamType::Int => {
                    if let Some(ident) = arg.as_identifier() {
                        if cmdtable.find_constant(GLOBAL_ENUM, ident).is_none() {
                            return false;
                        }
                    } else if arg.as_int().is_none() {
                        return false;
                    }
                }
                ParamType::Float => {
                    if arg.as_float().is_none() {
                        return false;
                    }
                }
                ParamType::VarInt | ParamType::VarFloat | ParamType::VarTextLabel => {
                    let Some(ident) = arg.as_identifier() else {
                        return false;
                    };
                    let parsed = self.parse_var_ref(ident, arg.source());
                    let Some(var) = self.symtable.lookup_var(parsed.name, GLOBAL_SCOPE) else {
                        return false;
                    };
                    let var_type = self.symtable.variable(var).var_type();
                    if !Self::matches_var_type(param.param_type, var_type) {
                        return false;
                    }
                }
                ParamType::LvarInt | ParamType::LvarFloat | ParamType::LvarTextLabel => {
                    let Some(scope) = self.current_scope else {
                        return false;
                    };
                    let Some(ident) = arg.as_identifier() else {
                        return false;
                    };
                    let parsed = self.parse_var_ref(ident, arg.source());
                    let Some(var) = self.symtable.lookup_var(parsed.name, scope) else {
                        return false;
                    };
                    let var_type = self.symtable.variable(var).var_type();
                    if !Self::matches_var_type(param.param_type, var_type) {
                        return false;
                    }
                }
                ParamType::InputInt => {
                    let Some(ident) = arg.as_identifier() else {
                        return false;
                    };
                    if cmdtable.find_constant_any_means(ident).is_none() {
                        return false;
                    }
                }
                ParamType::TextLabel => {
                    if arg.as_identifier().is_none() {
                        return false;
                    }
                }
                _ => return false,
            }
        }

        true
    }

    /// Splits an identifier into variable name and subscript.
    ///
    /// This lives in the semantic phase because until now an identifier
    /// could not be classified as a variable; label names, for example, may
    /// legally contain brackets.
    fn parse_var_ref<'i>(&mut self, identifier: &'i str, source: SourceRange) -> ParsedVarRef<'i> {
        let is_bracket = |c: u8| c == b'[' || c == b']';
        let bytes = identifier.as_bytes();

        debug_assert!(!bytes.is_empty());
        debug_assert!(!is_bracket(bytes[0]));

        let var_name;
        let var_source;
        let mut subscript = None;

        if let Some(open_pos) = bytes.iter().position(|&c| is_bracket(c)) {
            if bytes[open_pos] == b']' {
                self.report_at(source.begin + open_pos, Diag::ExpectedWord)
                    .arg("[");
                // Recovery: treat it as the opening bracket.
            }

            let close_rel = bytes[open_pos + 1..].iter().position(|&c| is_bracket(c));
            let close_pos = close_rel.map_or(bytes.len(), |rel| open_pos + 1 + rel);

            if close_rel.is_none() || bytes[close_pos] == b'[' {
                self.report_at(source.begin + close_pos, Diag::ExpectedWord)
                    .arg("]");
                // Recovery: treat it as the closing bracket.
            }

            var_name = &identifier[..open_pos];
            var_source = source.subrange(0, open_pos);

            if close_pos - open_pos <= 1 {
                self.report_at(source.begin + open_pos + 1, Diag::ExpectedSubscript);
                // Recovery: assume there is no subscript.
            } else {
                let sub_len = close_pos - open_pos - 1;
                subscript = Some(VarSubscript {
                    value: &identifier[open_pos + 1..close_pos],
                    source: source.subrange(open_pos + 1, sub_len),
                    literal: None,
                });
            }
        } else {
            var_name = identifier;
            var_source = source;
        }

        debug_assert!(!var_name.is_empty());

        // The subscript must be either an identifier or a positive integer
        // literal. An identifier is resolved later, when the subscript
        // itself is semantically checked.
        subscript = match subscript {
            Some(mut sub) => {
                let first = sub.value.as_bytes()[0];
                if first == b'-' {
                    self.report(sub.source, Diag::SubscriptMustBePositive);
                    None // recover: no subscript
                } else if first.is_ascii_digit() {
                    if sub.value.bytes().all(|c| c.is_ascii_digit()) {
                        match parse_integer_literal(sub.value) {
                            Some(value) => {
                                sub.literal = Some(value);
                                Some(sub)
                            }
                            None => {
                                self.report(sub.source, Diag::IntegerLiteralTooBig);
                                None // recover: no subscript
                            }
                        }
                    } else {
                        self.report(sub.source, Diag::ExpectedInteger);
                        None // recover: no subscript
                    }
                } else {
                    Some(sub)
                }
            }
            None => None,
        };

        ParsedVarRef {
            name: var_name,
            source: var_source,
            subscript,
        }
    }
}
