//! The parser.
//!
//! A recursive-descent parser with a small fixed lookahead buffer. It emits
//! [`ParserIr`] lines and performs every syntactic lowering: expression
//! statements become command form, conditional lists grow their and/or
//! count, and `IF ... GOTO` turns into an `ANDOR` prefix plus a conditional
//! jump.
//!
//! The parser knows nothing about the command table; the handful of names
//! it special-cases here are part of the language grammar itself.
//!
//! On failure a production returns `None` after reporting; the caller is
//! expected to [`Parser::skip_current_line`] and carry on.

use smallvec::SmallVec;

use crate::diag::{Diag, DiagnosticBuilder, DiagnosticHandler};
use crate::ir::parser_ir::{Argument, LabelDef};
use crate::ir::{LinkedIr, ParserIr, ParserIrBuilder};
use crate::sourceman::{SourceFile, SourceRange};
use crate::syntax::scanner::{Category, Scanner, Token};
use crate::syntax::{parse_float_literal, parse_integer_literal};

const COMMAND_MISSION_START: &str = "MISSION_START";
const COMMAND_MISSION_END: &str = "MISSION_END";
const COMMAND_GOSUB_FILE: &str = "GOSUB_FILE";
const COMMAND_LAUNCH_MISSION: &str = "LAUNCH_MISSION";
const COMMAND_LOAD_AND_LAUNCH_MISSION: &str = "LOAD_AND_LAUNCH_MISSION";
const COMMAND_ANDOR: &str = "ANDOR";
const COMMAND_GOTO_IF_FALSE: &str = "GOTO_IF_FALSE";
const COMMAND_GOTO_IF_TRUE: &str = "GOTO_IF_TRUE";
const COMMAND_SET: &str = "SET";
const COMMAND_CSET: &str = "CSET";
const COMMAND_ABS: &str = "ABS";
const COMMAND_ADD_THING_TO_THING: &str = "ADD_THING_TO_THING";
const COMMAND_SUB_THING_FROM_THING: &str = "SUB_THING_FROM_THING";
const COMMAND_MULT_THING_BY_THING: &str = "MULT_THING_BY_THING";
const COMMAND_DIV_THING_BY_THING: &str = "DIV_THING_BY_THING";
const COMMAND_ADD_THING_TO_THING_TIMED: &str = "ADD_THING_TO_THING_TIMED";
const COMMAND_SUB_THING_FROM_THING_TIMED: &str = "SUB_THING_FROM_THING_TIMED";
const COMMAND_IS_THING_EQUAL_TO_THING: &str = "IS_THING_EQUAL_TO_THING";
const COMMAND_IS_THING_GREATER_THAN_THING: &str = "IS_THING_GREATER_THAN_THING";
const COMMAND_IS_THING_GREATER_OR_EQUAL_TO_THING: &str = "IS_THING_GREATER_OR_EQUAL_TO_THING";

/// Size of the lookahead buffer. The deepest peek is the `GOTO` detection
/// on conditional lines, which looks five tokens ahead.
const MAX_PEEK: usize = 6;

/// The recursive-descent parser. See the module docs.
#[derive(Debug)]
pub struct Parser<'d> {
    scanner: Scanner<'d>,
    /// Pending lookahead. A `None` slot records a scan failure.
    peek_buf: SmallVec<[Option<Token>; MAX_PEEK]>,
    in_lexical_scope: bool,
}

impl<'d> Parser<'d> {
    pub fn new(scanner: Scanner<'d>) -> Self {
        Self {
            scanner,
            peek_buf: SmallVec::new(),
            in_lexical_scope: false,
        }
    }

    /// Whether everything has been consumed.
    #[must_use]
    pub fn eof(&self) -> bool {
        if !self.peek_buf.is_empty() {
            return false;
        }
        self.scanner.eof()
    }

    #[must_use]
    pub fn source_file(&self) -> &SourceFile {
        self.scanner.source_file()
    }

    pub fn diagnostics(&mut self) -> &mut DiagnosticHandler {
        self.scanner.diagnostics()
    }

    fn report(&mut self, source: SourceRange, kind: Diag) -> DiagnosticBuilder<'_> {
        self.scanner
            .diagnostics()
            .report(source.begin, kind)
            .range(source)
    }

    fn report_special_name(&mut self, source: SourceRange) {
        let name = self.source_file().view_of(source).to_owned();
        self.report(source, Diag::UnexpectedSpecialName).arg(name);
    }

    /// Whether a name is reserved by the grammar and cannot be used as an
    /// ordinary command or as the left-hand side of an expression.
    fn is_special_name(name: &str, check_var_decl: bool) -> bool {
        if check_var_decl && Self::is_var_decl_command(name) {
            return true;
        }
        matches!(
            name,
            "{" | "}"
                | "NOT"
                | "AND"
                | "OR"
                | "IF"
                | "IFNOT"
                | "ELSE"
                | "ENDIF"
                | "WHILE"
                | "WHILENOT"
                | "ENDWHILE"
                | "REPEAT"
                | "ENDREPEAT"
                | COMMAND_GOSUB_FILE
                | COMMAND_LAUNCH_MISSION
                | COMMAND_LOAD_AND_LAUNCH_MISSION
                | COMMAND_MISSION_START
                | COMMAND_MISSION_END
        )
    }

    fn is_var_decl_command(name: &str) -> bool {
        matches!(
            name,
            "VAR_INT" | "LVAR_INT" | "VAR_FLOAT" | "LVAR_FLOAT" | "VAR_TEXT_LABEL"
                | "LVAR_TEXT_LABEL"
        )
    }

    fn is_relational_operator(category: Category) -> bool {
        matches!(
            category,
            Category::Less | Category::LessEqual | Category::Greater | Category::GreaterEqual
        )
    }

    /// The n-th token of lookahead.
    ///
    /// Peeking never crosses a line: tokens past an end-of-line replicate
    /// the end-of-line token instead of touching the next line.
    fn peek(&mut self, n: usize) -> Option<Token> {
        debug_assert!(n < MAX_PEEK);
        while self.peek_buf.len() <= n {
            let replicated = self
                .peek_buf
                .last()
                .copied()
                .flatten()
                .filter(|token| token.category == Category::EndOfLine);
            match replicated {
                Some(token) if !self.peek_buf.is_empty() => self.peek_buf.push(Some(token)),
                _ => {
                    let token = self.scanner.next();
                    self.peek_buf.push(token);
                }
            }
        }
        self.peek_buf[n]
    }

    fn is_peek(&mut self, category: Category, n: usize) -> bool {
        self.peek(n).is_some_and(|token| token.category == category)
    }

    fn is_peek_word(&mut self, lexeme: &str, n: usize) -> bool {
        match self.peek(n) {
            Some(token) if token.category == Category::Word => {
                self.scanner.spelling(token).eq_ignore_ascii_case(lexeme)
            }
            _ => false,
        }
    }

    /// Classifies the upcoming line as an expression statement.
    ///
    /// Returns the operator category when the line begins with a unary
    /// operator, or when the token after the leading word is an assignment,
    /// unary or relational operator.
    fn peek_expression_type(&mut self) -> Option<Category> {
        if self.is_peek(Category::PlusPlus, 0) || self.is_peek(Category::MinusMinus, 0) {
            return self.peek(0).map(|token| token.category);
        }

        // We want the next token ignoring whitespace.
        let opos = if self.is_peek(Category::Whitespace, 1) {
            2
        } else {
            1
        };

        let category = self.peek(opos)?.category;
        match category {
            Category::Equal
            | Category::EqualHash
            | Category::PlusEqual
            | Category::MinusEqual
            | Category::StarEqual
            | Category::SlashEqual
            | Category::PlusEqualAt
            | Category::MinusEqualAt
            | Category::PlusPlus
            | Category::MinusMinus
            | Category::Less
            | Category::LessEqual
            | Category::Greater
            | Category::GreaterEqual => Some(category),
            _ => None,
        }
    }

    fn consume(&mut self) -> Option<Token> {
        if self.peek_buf.is_empty() {
            return self.scanner.next();
        }
        self.peek_buf.remove(0)
    }

    fn consume_filename(&mut self) -> Option<Token> {
        // `consume_whitespace` leaves a peeked end-of-line untouched, so a
        // missing filename shows up as that peeked token here.
        if let Some(Some(token)) = self.peek_buf.first().copied() {
            if token.category == Category::EndOfLine {
                self.report(token.source, Diag::ExpectedIdentifier);
                return None;
            }
        }

        debug_assert!(self.peek_buf.is_empty());
        self.peek_buf.clear();
        self.scanner.next_filename()
    }

    fn consume_expecting(&mut self, category: Category) -> Option<Token> {
        let token = self.consume()?;
        if token.category != category {
            self.report(token.source, Diag::ExpectedToken).arg(category);
            return None;
        }
        Some(token)
    }

    fn consume_word(&mut self, lexeme: &str) -> Option<Token> {
        let token = self.consume_expecting(Category::Word)?;
        if !self.scanner.spelling(token).eq_ignore_ascii_case(lexeme) {
            let expected = lexeme.to_owned();
            self.report(token.source, Diag::ExpectedWord).arg(expected);
            return None;
        }
        Some(token)
    }

    fn consume_whitespace(&mut self) -> Option<Token> {
        // Consider `IF \n`. Failing on the missing whitespace would ask the
        // user for a separator when the line is actually missing a command,
        // so an end-of-line is left for the caller to trip over.
        if self.is_peek(Category::EndOfLine, 0) {
            return self.peek(0);
        }
        self.consume_expecting(Category::Whitespace)
    }

    fn consume_command(&mut self) -> Option<Token> {
        let token = self.consume()?;
        if token.category != Category::Word {
            self.report(token.source, Diag::ExpectedCommand);
            return None;
        }
        Some(token)
    }

    /// Discards tokens up to and including the next end-of-line.
    pub fn skip_current_line(&mut self) {
        loop {
            // The scanner is guaranteed to produce an end-of-line at some
            // point.
            if let Some(token) = self.consume() {
                if token.category == Category::EndOfLine {
                    break;
                }
            }
        }
    }

    fn is_integer(lexeme: &str) -> bool {
        let mut num_digits = 0;
        for (i, byte) in lexeme.bytes().enumerate() {
            if byte == b'-' && i == 0 {
                continue;
            }
            if byte.is_ascii_digit() {
                num_digits += 1;
            } else {
                return false;
            }
        }
        num_digits > 0
    }

    fn is_float(lexeme: &str) -> bool {
        let bytes = lexeme.as_bytes();
        let mut i = 0;

        if bytes.len() >= 2 && bytes[0] == b'-' {
            i = 1;
        }

        match bytes.get(i) {
            Some(b'.') => {
                i += 1;
                if !bytes.get(i).is_some_and(u8::is_ascii_digit) {
                    return false;
                }
                i += 1;
            }
            Some(byte) if byte.is_ascii_digit() => {
                i += 1;
                while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                    i += 1;
                }
                if !matches!(bytes.get(i), Some(b'.' | b'f' | b'F')) {
                    return false;
                }
                i += 1;
            }
            _ => return false,
        }

        while matches!(bytes.get(i), Some(b'.' | b'f' | b'F'))
            || bytes.get(i).is_some_and(u8::is_ascii_digit)
        {
            i += 1;
        }

        i == bytes.len()
    }

    fn is_identifier(lexeme: &str) -> bool {
        let bytes = lexeme.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(&first), Some(&last)) => {
                (first == b'$' || first.is_ascii_alphabetic()) && last != b':'
            }
            _ => false,
        }
    }

    fn parse_argument(&mut self) -> Option<Argument> {
        let token = self.consume()?;
        let lexeme = self.scanner.spelling(token).to_owned();

        if token.category == Category::String {
            let inner = &lexeme[1..lexeme.len() - 1];
            return Some(Argument::string(inner, token.source));
        }

        if token.category == Category::Word && Self::is_integer(&lexeme) {
            let Some(value) = parse_integer_literal(&lexeme) else {
                self.report(token.source, Diag::IntegerLiteralTooBig);
                return None;
            };
            return Some(Argument::int(value, token.source));
        }

        if token.category == Category::Word && Self::is_float(&lexeme) {
            let Some(value) = parse_float_literal(&lexeme) else {
                self.report(token.source, Diag::FloatLiteralTooBig);
                return None;
            };
            return Some(Argument::float(value, token.source));
        }

        if token.category == Category::Word && Self::is_identifier(&lexeme) {
            return Some(Argument::identifier(&lexeme, token.source));
        }

        self.report(token.source, Diag::ExpectedArgument);
        None
    }

    fn parse_command(&mut self, is_if_line: bool, not_flag: bool) -> Option<ParserIr> {
        let token = self.consume_command()?;
        let name = self.scanner.spelling(token).to_owned();

        let mut builder = ParserIrBuilder::new()
            .not_flag(not_flag)
            .command(&name, token.source);

        while !self.is_peek(Category::EndOfLine, 0) {
            if is_if_line && self.at_goto_suffix() {
                break;
            }

            self.consume_whitespace()?;
            let arg = self.parse_argument()?;
            builder = builder.arg(arg);
        }

        Some(builder.build())
    }

    /// Whether the lookahead sits at the ` GOTO label` tail of a
    /// single-condition `IF`/`IFNOT` line.
    fn at_goto_suffix(&mut self) -> bool {
        self.is_peek(Category::Whitespace, 0)
            && self.is_peek_word("GOTO", 1)
            && self.is_peek(Category::Whitespace, 2)
            && self.is_peek(Category::Word, 3)
            && self.is_peek(Category::EndOfLine, 4)
    }

    /// Parses the toplevel of the main script file.
    pub fn parse_main_script_file(&mut self) -> Option<LinkedIr<ParserIr>> {
        self.parse_statement_list(&[])
    }

    /// Parses the toplevel of a main extension (foreign gosub) file.
    pub fn parse_main_extension_file(&mut self) -> Option<LinkedIr<ParserIr>> {
        self.parse_statement_list(&[])
    }

    /// Parses the toplevel of a subscript file.
    pub fn parse_subscript_file(&mut self) -> Option<LinkedIr<ParserIr>> {
        if !self.ensure_mission_start_at_top_of_file() {
            return None;
        }

        let mission_start = self.parse_command(false, false)?;
        if let Some(command) = &mission_start.command {
            if command.has_args() {
                let source = command.source;
                self.report(source, Diag::TooManyArguments);
                return None;
            }
        }
        self.consume_expecting(Category::EndOfLine)?;

        let body_stms = self.parse_statement_list(&[COMMAND_MISSION_END])?;
        if let Some(source) = Self::last_command_with_args(&body_stms) {
            self.report(source, Diag::TooManyArguments);
            return None;
        }

        let rest_stms = self.parse_statement_list(&[])?;

        let mut linked = LinkedIr::new();
        linked.push_back(mission_start);
        linked.splice_back(body_stms);
        linked.splice_back(rest_stms);
        Some(linked)
    }

    /// Parses the toplevel of a mission script file.
    ///
    /// Mission scripts have the same structure as subscript files.
    pub fn parse_mission_script_file(&mut self) -> Option<LinkedIr<ParserIr>> {
        self.parse_subscript_file()
    }

    /// Source range of the trailing command if it carries arguments.
    fn last_command_with_args(list: &LinkedIr<ParserIr>) -> Option<SourceRange> {
        let command = list.back()?.command.as_ref()?;
        command.has_args().then_some(command.source)
    }

    /// Parses a (possibly labeled) statement.
    pub fn parse_statement(&mut self) -> Option<LinkedIr<ParserIr>> {
        self.parse_statement_impl(false)
    }

    fn parse_statement_impl(&mut self, allow_special_name: bool) -> Option<LinkedIr<ParserIr>> {
        let mut label = None;

        let at_label = match self.peek(0) {
            Some(token) if token.category == Category::Word => {
                self.scanner.spelling(token).ends_with(':')
            }
            _ => false,
        };

        if at_label {
            let label_token = self.consume()?;
            let spelling = self.scanner.spelling(label_token).to_owned();
            let name = &spelling[..spelling.len() - 1];

            if !Self::is_identifier(name) {
                self.report(label_token.source, Diag::ExpectedIdentifier);
                return None;
            }

            if !self.is_peek(Category::EndOfLine, 0) {
                self.consume_whitespace()?;
            }

            label = Some(LabelDef::new(name, label_token.source));
        }

        let mut linked = self.parse_embedded_statement(allow_special_name)?;

        if let Some(label) = label {
            if linked.is_empty() {
                linked.push_back(ParserIr::new(Some(label), None));
            } else if let Some(front) = linked.front_mut() {
                debug_assert!(front.label.is_none());
                front.label = Some(label);
            }
        }

        Some(linked)
    }

    fn parse_statement_list(&mut self, stop_when: &[&str]) -> Option<LinkedIr<ParserIr>> {
        let mut linked = LinkedIr::new();

        while !self.eof() {
            // Special names are allowed at the statement level here because
            // the stop words usually are special names; anything else
            // special is rejected below.
            let stmt_list = self.parse_statement_impl(true)?;

            if stmt_list.len() == 1 {
                if let Some(command) = stmt_list.front().and_then(|node| node.command.as_ref()) {
                    if stop_when.iter().any(|stop| command.name == *stop) {
                        linked.splice_back(stmt_list);
                        return Some(linked);
                    }

                    if Self::is_special_name(&command.name, false) {
                        let source = command.source;
                        self.report_special_name(source);
                        return None;
                    }
                }
            }

            linked.splice_back(stmt_list);
        }

        match stop_when {
            [] => Some(linked),
            [only] => {
                let location = self.scanner.location();
                let expected = (*only).to_owned();
                self.diagnostics()
                    .report(location, Diag::ExpectedWord)
                    .arg(expected);
                None
            }
            _ => {
                let location = self.scanner.location();
                let expected: Vec<String> = stop_when.iter().map(|s| (*s).to_owned()).collect();
                self.diagnostics()
                    .report(location, Diag::ExpectedWords)
                    .arg(expected);
                None
            }
        }
    }

    fn parse_embedded_statement(&mut self, allow_special_name: bool) -> Option<LinkedIr<ParserIr>> {
        if self.is_peek(Category::EndOfLine, 0) {
            self.consume();
            return Some(LinkedIr::new());
        }

        if self.is_peek_word(COMMAND_GOSUB_FILE, 0)
            || self.is_peek_word(COMMAND_LAUNCH_MISSION, 0)
            || self.is_peek_word(COMMAND_LOAD_AND_LAUNCH_MISSION, 0)
        {
            let require_ir = self.parse_require_statement()?;
            return Some([require_ir].into_iter().collect());
        }

        if let Some(category) = self.peek_expression_type() {
            let expr_ir = if Self::is_relational_operator(category) {
                self.parse_conditional_expression(false, false)?
            } else {
                self.parse_assignment_expression()?
            };

            self.consume_expecting(Category::EndOfLine)?;
            return Some(expr_ir);
        }

        if self.is_peek_word("{", 0) {
            return self.parse_scope_statement();
        }
        if self.is_peek_word("IF", 0) {
            return self.parse_if_statement_detail(false);
        }
        if self.is_peek_word("IFNOT", 0) {
            return self.parse_if_statement_detail(true);
        }
        if self.is_peek_word("WHILE", 0) {
            return self.parse_while_statement_detail(false);
        }
        if self.is_peek_word("WHILENOT", 0) {
            return self.parse_while_statement_detail(true);
        }
        if self.is_peek_word("REPEAT", 0) {
            return self.parse_repeat_statement();
        }

        let ir = self.parse_command(false, false)?;
        if let Some(command) = &ir.command {
            if !allow_special_name && Self::is_special_name(&command.name, false) {
                let source = command.source;
                self.report_special_name(source);
                return None;
            }

            if Self::is_var_decl_command(&command.name) && !command.has_args() {
                let source = command.source;
                self.report(source, Diag::TooFewArguments);
                return None;
            }
        }

        self.consume_expecting(Category::EndOfLine)?;
        Some([ir].into_iter().collect())
    }

    fn parse_scope_statement(&mut self) -> Option<LinkedIr<ParserIr>> {
        // Lexical scopes cannot be nested.

        if !self.is_peek_word("{", 0) {
            self.consume_word("{"); // produces a diagnostic
            return None;
        }

        let open_command = self.parse_command(false, false)?;
        self.consume_expecting(Category::EndOfLine)?;

        if self.in_lexical_scope {
            if let Some(command) = &open_command.command {
                let source = command.source;
                self.report(source, Diag::CannotNestScopes);
            }
            return None;
        }

        self.in_lexical_scope = true;
        let body = self.parse_statement_list(&["}"]);
        self.in_lexical_scope = false;

        let mut linked = body?;
        linked.push_front(open_command);
        Some(linked)
    }

    fn parse_conditional_element(&mut self, is_if_line: bool) -> Option<ParserIr> {
        let mut not_flag = false;

        if self.is_peek_word("NOT", 0) {
            self.consume()?;
            self.consume_whitespace()?;
            not_flag = true;
        }

        if self.peek_expression_type().is_some() {
            let mut linked = self.parse_conditional_expression(is_if_line, not_flag)?;
            // Expressions in conditional context have a single command.
            debug_assert!(linked.len() == 1);
            linked.pop_front()
        } else {
            let ir = self.parse_command(is_if_line, not_flag)?;
            if let Some(command) = &ir.command {
                if Self::is_special_name(&command.name, true) {
                    let source = command.source;
                    self.report_special_name(source);
                    return None;
                }
            }
            Some(ir)
        }
    }

    fn parse_conditional_list(&mut self) -> Option<(LinkedIr<ParserIr>, i32)> {
        let cond0 = self.parse_conditional_element(false)?;
        self.consume_expecting(Category::EndOfLine)?;
        self.parse_conditional_list_from(cond0)
    }

    /// Parses the `AND`/`OR` continuation of a conditional list whose first
    /// element was already consumed.
    ///
    /// Returns the list and the and/or count to be encoded.
    fn parse_conditional_list_from(&mut self, cond0: ParserIr) -> Option<(LinkedIr<ParserIr>, i32)> {
        debug_assert!(cond0.has_command());

        let mut andor_list = LinkedIr::new();
        andor_list.push_back(cond0);

        let mut num_conds: i32 = 1;
        let mut andor_count: i32 = 0;

        if self.is_peek_word("AND", 0) || self.is_peek_word("OR", 0) {
            let is_and = self.is_peek_word("AND", 0);
            let andor_prefix = if is_and { "AND" } else { "OR" };
            let anti_prefix = if is_and { "OR" } else { "AND" };

            while self.is_peek_word(andor_prefix, 0) {
                self.consume()?;
                self.consume_whitespace()?;

                let elem = self.parse_conditional_element(false)?;
                self.consume_expecting(Category::EndOfLine)?;

                andor_list.push_back(elem);
                num_conds += 1;
            }

            if self.is_peek_word(anti_prefix, 0) {
                if let Some(token) = self.peek(0) {
                    self.report(token.source, Diag::CannotMixAndor);
                }
                return None;
            }

            andor_count = if is_and {
                num_conds - 1
            } else {
                20 + num_conds - 1
            };
        }

        // The runtime has a limit of six conditions per list, and the
        // generated ANDOR value has that limit embedded in it.
        if num_conds > 6 {
            if let Some(command) = andor_list.back().and_then(|node| node.command.as_ref()) {
                let source = command.source;
                self.report(source, Diag::TooManyConditions);
            }
            return None;
        }

        Some((andor_list, andor_count))
    }

    fn parse_if_statement_detail(&mut self, is_ifnot: bool) -> Option<LinkedIr<ParserIr>> {
        let if_command = if is_ifnot { "IFNOT" } else { "IF" };
        let if_true_command = if is_ifnot {
            COMMAND_GOTO_IF_FALSE
        } else {
            COMMAND_GOTO_IF_TRUE
        };

        let if_token = self.consume_word(if_command)?;
        self.consume_whitespace()?;

        let cond0 = self.parse_conditional_element(true)?;
        let src_info = if_token.source;

        if self.is_peek(Category::Whitespace, 0) {
            // The `IF cond GOTO label` form.
            self.consume()?;
            self.consume_word("GOTO")?;
            self.consume_whitespace()?;

            let arg_label = self.parse_argument()?;
            self.consume_expecting(Category::EndOfLine)?;

            let mut linked = LinkedIr::new();
            linked.push_back(
                ParserIrBuilder::new()
                    .command(COMMAND_ANDOR, src_info)
                    .arg_int(0, src_info)
                    .build(),
            );
            linked.push_back(cond0);
            linked.push_back(
                ParserIrBuilder::new()
                    .command(if_true_command, src_info)
                    .arg(arg_label)
                    .build(),
            );
            return Some(linked);
        }

        self.consume_expecting(Category::EndOfLine)?;

        let (andor_list, andor_count) = self.parse_conditional_list_from(cond0)?;

        let mut body_stms = self.parse_statement_list(&["ELSE", "ENDIF"])?;

        let ends_with_else = body_stms
            .back()
            .and_then(|node| node.command.as_ref())
            .is_some_and(|command| command.name == "ELSE");

        if ends_with_else {
            if let Some(source) = Self::last_command_with_args(&body_stms) {
                self.report(source, Diag::TooManyArguments);
                return None;
            }

            let else_stms = self.parse_statement_list(&["ENDIF"])?;
            body_stms.splice_back(else_stms);
        }

        if let Some(source) = Self::last_command_with_args(&body_stms) {
            self.report(source, Diag::TooManyArguments);
            return None;
        }

        body_stms.splice_front(andor_list);
        body_stms.push_front(
            ParserIrBuilder::new()
                .command(if_command, src_info)
                .arg_int(andor_count, src_info)
                .build(),
        );

        Some(body_stms)
    }

    fn parse_while_statement_detail(&mut self, is_whilenot: bool) -> Option<LinkedIr<ParserIr>> {
        let while_command = if is_whilenot { "WHILENOT" } else { "WHILE" };

        let while_token = self.consume_word(while_command)?;
        self.consume_whitespace()?;

        let (andor_list, andor_count) = self.parse_conditional_list()?;

        let mut body_stms = self.parse_statement_list(&["ENDWHILE"])?;

        if let Some(source) = Self::last_command_with_args(&body_stms) {
            self.report(source, Diag::TooManyArguments);
            return None;
        }

        let src_info = while_token.source;

        body_stms.splice_front(andor_list);
        body_stms.push_front(
            ParserIrBuilder::new()
                .command(while_command, src_info)
                .arg_int(andor_count, src_info)
                .build(),
        );

        Some(body_stms)
    }

    fn parse_repeat_statement(&mut self) -> Option<LinkedIr<ParserIr>> {
        if !self.is_peek_word("REPEAT", 0) {
            self.consume_word("REPEAT"); // produces a diagnostic
            return None;
        }

        let repeat_command = self.parse_command(false, false)?;
        self.consume_expecting(Category::EndOfLine)?;

        let repeat_source = match &repeat_command.command {
            Some(command) => command.source,
            None => return None,
        };

        let repeat_num_args = repeat_command
            .command
            .as_ref()
            .map_or(0, |command| command.num_args());
        if repeat_num_args < 2 {
            self.report(repeat_source, Diag::TooFewArguments);
            return None;
        }
        if repeat_num_args > 2 {
            self.report(repeat_source, Diag::TooManyArguments);
            return None;
        }

        let mut body_stms = self.parse_statement_list(&["ENDREPEAT"])?;

        if Self::last_command_with_args(&body_stms).is_some() {
            self.report(repeat_source, Diag::TooManyArguments);
            return None;
        }

        body_stms.push_front(repeat_command);
        Some(body_stms)
    }

    fn parse_require_statement(&mut self) -> Option<ParserIr> {
        let command = self.consume_command()?;
        let name = self.scanner.spelling(command).to_owned();

        let mut builder = ParserIrBuilder::new().command(&name, command.source);

        if name.eq_ignore_ascii_case(COMMAND_GOSUB_FILE) {
            self.consume_whitespace()?;
            let arg_label = self.parse_argument()?;
            builder = builder.arg(arg_label);
        } else if !name.eq_ignore_ascii_case(COMMAND_LAUNCH_MISSION)
            && !name.eq_ignore_ascii_case(COMMAND_LOAD_AND_LAUNCH_MISSION)
        {
            self.report(command.source, Diag::ExpectedRequireCommand);
            return None;
        }

        self.consume_whitespace()?;

        let tok_filename = self.consume_filename()?;
        let filename = self.scanner.spelling(tok_filename).to_owned();

        self.consume_expecting(Category::EndOfLine)?;

        builder = builder.arg_filename(&filename, tok_filename.source);
        Some(builder.build())
    }

    fn parse_assignment_expression(&mut self) -> Option<LinkedIr<ParserIr>> {
        self.parse_expression_detail(false, false, false)
    }

    fn parse_conditional_expression(
        &mut self,
        is_if_line: bool,
        not_flag: bool,
    ) -> Option<LinkedIr<ParserIr>> {
        self.parse_expression_detail(true, is_if_line, not_flag)
    }

    /// Parses an expression line by pattern matching its tokens.
    ///
    /// The expression grammar admits only a handful of shapes (unary
    /// increment, binary assignment, relational comparison and the ternary
    /// `a = b op c`), so the whole line is collected and matched at once.
    fn parse_expression_detail(
        &mut self,
        is_conditional: bool,
        is_if_line: bool,
        not_flag: bool,
    ) -> Option<LinkedIr<ParserIr>> {
        const MAX_EXPR_TOKS: usize = 6;

        let mut cats: [Category; MAX_EXPR_TOKS] = [Category::Word; MAX_EXPR_TOKS];
        let mut spans: [SourceRange; MAX_EXPR_TOKS] = [SourceRange::default(); MAX_EXPR_TOKS];
        let mut args: [Option<Argument>; MAX_EXPR_TOKS] = [None, None, None, None, None, None];

        let mut num_toks = 0;
        let mut num_args = 0;

        while !self.is_peek(Category::EndOfLine, 0) {
            if is_if_line && self.at_goto_suffix() {
                break;
            }

            // Going over this number of tokens implies no production can
            // match.
            if num_toks == MAX_EXPR_TOKS {
                let location = spans[0].begin;
                self.diagnostics()
                    .report(location, Diag::InvalidExpression);
                return None;
            }

            let Some(token) = self.peek(0) else {
                self.consume(); // the scanner already reported
                return None;
            };

            match token.category {
                Category::Whitespace => {
                    self.consume();
                }
                Category::Word => {
                    spans[num_toks] = token.source;
                    cats[num_toks] = Category::Word;
                    num_toks += 1;

                    let arg = self.parse_argument()?;
                    args[num_args] = Some(arg);
                    num_args += 1;
                }
                Category::String | Category::EndOfLine => {
                    self.report(token.source, Diag::InvalidExpression);
                    return None;
                }
                category => {
                    spans[num_toks] = token.source;
                    cats[num_toks] = category;
                    num_toks += 1;
                    self.consume();
                }
            }
        }

        if num_toks == 0 {
            if let Some(token) = self.peek(0) {
                self.report(token.source, Diag::InvalidExpression);
            }
            return None;
        }

        // Only binary expressions can be matched in conditional contexts.
        if is_conditional && num_toks != 3 {
            let location = spans[0].begin;
            if num_toks >= 2 && Self::is_relational_operator(cats[1]) {
                self.diagnostics()
                    .report(location, Diag::InvalidExpression);
            } else {
                self.diagnostics()
                    .report(location, Diag::ExpectedConditionalExpression);
            }
            return None;
        }

        // Require commands and mission directives cannot be the left-hand
        // side of an expression.
        if num_args > 0 && cats[0] == Category::Word {
            if let Some(lhs) = args[0].as_ref().and_then(Argument::as_identifier) {
                if matches!(
                    lhs,
                    COMMAND_GOSUB_FILE
                        | COMMAND_LAUNCH_MISSION
                        | COMMAND_LOAD_AND_LAUNCH_MISSION
                        | COMMAND_MISSION_START
                        | COMMAND_MISSION_END
                ) {
                    let source = args[0].as_ref().map(Argument::source).unwrap_or_default();
                    self.report_special_name(source);
                    return None;
                }
            }
        }

        let mut linked = LinkedIr::new();
        let src_info = SourceRange::new(spans[0].begin, spans[num_toks - 1].end);

        let take_arg = |slot: &mut Option<Argument>| slot.take();

        if num_toks == 2
            && ((cats[0] == Category::Word && cats[1] == Category::PlusPlus)
                || (cats[0] == Category::PlusPlus && cats[1] == Category::Word))
        {
            let a = take_arg(&mut args[0])?;
            linked.push_back(
                ParserIrBuilder::new()
                    .not_flag(not_flag)
                    .command(COMMAND_ADD_THING_TO_THING, src_info)
                    .arg(a)
                    .arg_int(1, src_info)
                    .build(),
            );
        } else if num_toks == 2
            && ((cats[0] == Category::Word && cats[1] == Category::MinusMinus)
                || (cats[0] == Category::MinusMinus && cats[1] == Category::Word))
        {
            let a = take_arg(&mut args[0])?;
            linked.push_back(
                ParserIrBuilder::new()
                    .not_flag(not_flag)
                    .command(COMMAND_SUB_THING_FROM_THING, src_info)
                    .arg(a)
                    .arg_int(1, src_info)
                    .build(),
            );
        } else if num_toks == 4
            && cats[0] == Category::Word
            && cats[1] == Category::Equal
            && cats[2] == Category::Word
            && args[1].as_ref().and_then(Argument::as_identifier) == Some(COMMAND_ABS)
            && cats[3] == Category::Word
        {
            let a = take_arg(&mut args[0])?;
            let b = take_arg(&mut args[2])?;

            if a.is_same_value(&b) {
                linked.push_back(
                    ParserIrBuilder::new()
                        .not_flag(not_flag)
                        .command(COMMAND_ABS, src_info)
                        .arg(a)
                        .build(),
                );
            } else {
                linked.push_back(
                    ParserIrBuilder::new()
                        .not_flag(not_flag)
                        .command(COMMAND_SET, src_info)
                        .arg(a.clone())
                        .arg(b)
                        .build(),
                );
                linked.push_back(
                    ParserIrBuilder::new()
                        .not_flag(not_flag)
                        .command(COMMAND_ABS, src_info)
                        .arg(a)
                        .build(),
                );
            }
        } else if num_toks == 3
            && cats[0] == Category::Word
            && cats[1] != Category::Word
            && cats[2] == Category::Word
        {
            let conditional_command = match cats[1] {
                Category::Equal => Some((COMMAND_IS_THING_EQUAL_TO_THING, false)),
                Category::Less => Some((COMMAND_IS_THING_GREATER_THAN_THING, true)),
                Category::LessEqual => Some((COMMAND_IS_THING_GREATER_OR_EQUAL_TO_THING, true)),
                Category::Greater => Some((COMMAND_IS_THING_GREATER_THAN_THING, false)),
                Category::GreaterEqual => {
                    Some((COMMAND_IS_THING_GREATER_OR_EQUAL_TO_THING, false))
                }
                _ => None,
            };

            let assignment_command = match cats[1] {
                Category::Equal => Some(COMMAND_SET),
                Category::EqualHash => Some(COMMAND_CSET),
                Category::PlusEqual => Some(COMMAND_ADD_THING_TO_THING),
                Category::MinusEqual => Some(COMMAND_SUB_THING_FROM_THING),
                Category::StarEqual => Some(COMMAND_MULT_THING_BY_THING),
                Category::SlashEqual => Some(COMMAND_DIV_THING_BY_THING),
                Category::PlusEqualAt => Some(COMMAND_ADD_THING_TO_THING_TIMED),
                Category::MinusEqualAt => Some(COMMAND_SUB_THING_FROM_THING_TIMED),
                _ => None,
            };

            if conditional_command.is_none() && assignment_command.is_none() {
                let location = spans[0].begin;
                self.diagnostics()
                    .report(location, Diag::InvalidExpression);
                return None;
            }

            let mut a = take_arg(&mut args[0])?;
            let mut b = take_arg(&mut args[1])?;

            let command_name = if is_conditional {
                let Some((name, swap_args)) = conditional_command else {
                    self.report(spans[1], Diag::ExpectedConditionalOperator);
                    return None;
                };

                // Less (and less than) uses the greater (and greater than)
                // command to perform its comparison.
                if swap_args {
                    std::mem::swap(&mut a, &mut b);
                }
                name
            } else {
                let Some(name) = assignment_command else {
                    self.report(spans[1], Diag::ExpectedAssignmentOperator);
                    return None;
                };
                name
            };

            linked.push_back(
                ParserIrBuilder::new()
                    .not_flag(not_flag)
                    .command(command_name, src_info)
                    .arg(a)
                    .arg(b)
                    .build(),
            );
        } else if num_toks == 5
            && cats[0] == Category::Word
            && cats[1] == Category::Equal
            && cats[2] == Category::Word
            && cats[3] != Category::Word
            && cats[4] == Category::Word
        {
            let ternary_command = match cats[3] {
                Category::Plus => Some(COMMAND_ADD_THING_TO_THING),
                Category::Minus => Some(COMMAND_SUB_THING_FROM_THING),
                Category::Star => Some(COMMAND_MULT_THING_BY_THING),
                Category::Slash => Some(COMMAND_DIV_THING_BY_THING),
                Category::PlusAt => Some(COMMAND_ADD_THING_TO_THING_TIMED),
                Category::MinusAt => Some(COMMAND_SUB_THING_FROM_THING_TIMED),
                _ => None,
            };

            let Some(command_name) = ternary_command else {
                self.report(spans[3], Diag::ExpectedTernaryOperator);
                return None;
            };

            let a = take_arg(&mut args[0])?;
            let b = take_arg(&mut args[1])?;
            let c = take_arg(&mut args[2])?;

            let is_associative = matches!(cats[3], Category::Plus | Category::Star);

            if a.is_same_value(&b) {
                linked.push_back(
                    ParserIrBuilder::new()
                        .command(command_name, src_info)
                        .arg(a)
                        .arg(c)
                        .build(),
                );
            } else if a.is_same_value(&c) {
                if !is_associative {
                    let location = spans[0].begin;
                    self.diagnostics()
                        .report(location, Diag::InvalidExpressionUnassociative)
                        .arg(cats[3]);
                    return None;
                }

                linked.push_back(
                    ParserIrBuilder::new()
                        .command(command_name, src_info)
                        .arg(a)
                        .arg(b)
                        .build(),
                );
            } else {
                linked.push_back(
                    ParserIrBuilder::new()
                        .command(COMMAND_SET, src_info)
                        .arg(a.clone())
                        .arg(b)
                        .build(),
                );
                linked.push_back(
                    ParserIrBuilder::new()
                        .command(command_name, src_info)
                        .arg(a)
                        .arg(c)
                        .build(),
                );
            }
        } else {
            let location = spans[0].begin;
            self.diagnostics()
                .report(location, Diag::InvalidExpression);
            return None;
        }

        Some(linked)
    }

    /// Verifies that `MISSION_START` opens the file, preceded only by
    /// spaces and tabs. Comments do not count as whitespace here.
    fn ensure_mission_start_at_top_of_file(&mut self) -> bool {
        let mut has_mission_start = self.is_peek_word(COMMAND_MISSION_START, 0);

        if has_mission_start {
            for byte in self.source_file().code().bytes() {
                if byte == b'M' || byte == b'm' {
                    break;
                }
                if byte != b' ' && byte != b'\t' {
                    has_mission_start = false;
                    break;
                }
            }
        }

        if !has_mission_start {
            let location = self.source_file().start_location();
            self.diagnostics()
                .report(location, Diag::ExpectedMissionStartAtTop);
            return false;
        }

        true
    }
}
