//! The scanner.
//!
//! Produces tokens over the preprocessed character stream. The grammar is
//! line oriented, so the end of a line is itself a token, and a run of
//! trailing whitespace folds into it. Words are runs of graphic characters;
//! classifying them into integers, floats or identifiers is the parser's
//! business.
//!
//! Operator characters split words, with one exception: a `-` immediately
//! followed by a digit or `.` starts a word, so negative numeric literals
//! scan as single words.

use strum::{Display, IntoStaticStr};

use crate::diag::{Diag, DiagnosticHandler};
use crate::sourceman::{SourceFile, SourceLocation, SourceRange};
use crate::syntax::preprocessor::Preprocessor;

/// The category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Word,
    String,
    Whitespace,
    EndOfLine,

    Plus,
    Minus,
    Star,
    Slash,
    PlusAt,
    MinusAt,
    PlusPlus,
    MinusMinus,
    Equal,
    EqualHash,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PlusEqualAt,
    MinusEqualAt,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// A lexed token. The text is recovered through [`Scanner::spelling`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub category: Category,
    pub source: SourceRange,
}

impl Token {
    #[must_use]
    pub fn new(category: Category, source: SourceRange) -> Self {
        Self { category, source }
    }
}

/// The token stream. See the module docs.
#[derive(Debug)]
pub struct Scanner<'d> {
    pp: Preprocessor<'d>,
    peeked: Option<(char, SourceLocation)>,
}

impl<'d> Scanner<'d> {
    pub fn new(pp: Preprocessor<'d>) -> Self {
        Self { pp, peeked: None }
    }

    #[must_use]
    pub fn source_file(&self) -> &SourceFile {
        self.pp.source_file()
    }

    pub fn diagnostics(&mut self) -> &mut DiagnosticHandler {
        self.pp.diagnostics()
    }

    /// The source text of a token.
    #[must_use]
    pub fn spelling(&self, token: Token) -> &str {
        self.source_file().view_of(token.source)
    }

    /// Whether the character stream is exhausted.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.pp.eof() && !matches!(self.peeked, Some((c, _)) if c != '\0')
    }

    /// The location of the next character to be scanned.
    pub fn location(&mut self) -> SourceLocation {
        self.fill_peek();
        match self.peeked {
            Some((_, loc)) => loc,
            None => self.pp.location(),
        }
    }

    fn fill_peek(&mut self) {
        if self.peeked.is_none() {
            let c = self.pp.next();
            self.peeked = Some((c, self.pp.last_char_location()));
        }
    }

    fn peek(&mut self) -> char {
        self.fill_peek();
        match self.peeked {
            Some((c, _)) => c,
            None => '\0',
        }
    }

    fn bump(&mut self) -> char {
        self.fill_peek();
        match self.peeked.take() {
            Some((c, _)) => c,
            None => '\0',
        }
    }

    fn is_whitespace(c: char) -> bool {
        matches!(c, ' ' | '\t' | '(' | ')' | ',')
    }

    fn is_newline(c: char) -> bool {
        matches!(c, '\n' | '\0')
    }

    fn is_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    fn is_operator_char(c: char) -> bool {
        matches!(c, '+' | '-' | '*' | '/' | '=' | '<' | '>')
    }

    fn is_graph(c: char) -> bool {
        c != '"' && (c as u32) >= 33 && (c as u32) <= 126
    }

    /// Whether a character may continue a word.
    fn is_word_char(c: char) -> bool {
        Self::is_graph(c) && !Self::is_operator_char(c)
    }

    fn token_from(&mut self, category: Category, begin: SourceLocation) -> Token {
        Token::new(category, SourceRange::new(begin, self.location()))
    }

    /// Scans the next token.
    ///
    /// Returns `None` when the upcoming characters form no valid token, in
    /// which case a diagnostic has been reported. At end of stream the
    /// scanner keeps producing end-of-line tokens.
    pub fn next(&mut self) -> Option<Token> {
        let begin = self.location();

        match self.peek() {
            '\0' | '\n' => {
                self.bump();
                Some(self.token_from(Category::EndOfLine, begin))
            }
            c if Self::is_whitespace(c) => {
                while Self::is_whitespace(self.peek()) {
                    self.bump();
                }
                // Trailing whitespace belongs to the line terminator.
                if Self::is_newline(self.peek()) {
                    self.bump();
                    return Some(self.token_from(Category::EndOfLine, begin));
                }
                Some(self.token_from(Category::Whitespace, begin))
            }
            '"' => self.scan_string(begin),
            '-' => {
                self.bump();
                if Self::is_digit(self.peek()) || self.peek() == '.' {
                    return self.scan_word(begin);
                }
                let category = match self.peek() {
                    '-' => {
                        self.bump();
                        Category::MinusMinus
                    }
                    '@' => {
                        self.bump();
                        Category::MinusAt
                    }
                    '=' => {
                        self.bump();
                        if self.peek() == '@' {
                            self.bump();
                            Category::MinusEqualAt
                        } else {
                            Category::MinusEqual
                        }
                    }
                    _ => Category::Minus,
                };
                Some(self.token_from(category, begin))
            }
            '+' => {
                self.bump();
                let category = match self.peek() {
                    '+' => {
                        self.bump();
                        Category::PlusPlus
                    }
                    '@' => {
                        self.bump();
                        Category::PlusAt
                    }
                    '=' => {
                        self.bump();
                        if self.peek() == '@' {
                            self.bump();
                            Category::PlusEqualAt
                        } else {
                            Category::PlusEqual
                        }
                    }
                    _ => Category::Plus,
                };
                Some(self.token_from(category, begin))
            }
            '*' => {
                self.bump();
                let category = if self.peek() == '=' {
                    self.bump();
                    Category::StarEqual
                } else {
                    Category::Star
                };
                Some(self.token_from(category, begin))
            }
            '/' => {
                self.bump();
                let category = if self.peek() == '=' {
                    self.bump();
                    Category::SlashEqual
                } else {
                    Category::Slash
                };
                Some(self.token_from(category, begin))
            }
            '=' => {
                self.bump();
                let category = if self.peek() == '#' {
                    self.bump();
                    Category::EqualHash
                } else {
                    Category::Equal
                };
                Some(self.token_from(category, begin))
            }
            '<' => {
                self.bump();
                let category = if self.peek() == '=' {
                    self.bump();
                    Category::LessEqual
                } else {
                    Category::Less
                };
                Some(self.token_from(category, begin))
            }
            '>' => {
                self.bump();
                let category = if self.peek() == '=' {
                    self.bump();
                    Category::GreaterEqual
                } else {
                    Category::Greater
                };
                Some(self.token_from(category, begin))
            }
            c if Self::is_word_char(c) => {
                self.bump();
                self.scan_word(begin)
            }
            _ => {
                self.diag_invalid_char(begin)
            }
        }
    }

    fn scan_word(&mut self, begin: SourceLocation) -> Option<Token> {
        while Self::is_word_char(self.peek()) {
            self.bump();
        }
        Some(self.token_from(Category::Word, begin))
    }

    fn scan_string(&mut self, begin: SourceLocation) -> Option<Token> {
        self.bump();
        loop {
            if Self::is_newline(self.peek()) {
                let range = SourceRange::new(begin, self.location());
                self.diagnostics()
                    .report(begin, Diag::UnterminatedStringLiteral)
                    .range(range);
                return None;
            }
            if self.bump() == '"' {
                return Some(self.token_from(Category::String, begin));
            }
        }
    }

    fn diag_invalid_char(&mut self, begin: SourceLocation) -> Option<Token> {
        self.bump();
        let range = SourceRange::new(begin, self.location());
        self.diagnostics()
            .report(begin, Diag::InvalidChar)
            .range(range);
        None
    }

    /// Scans the next whitespace-delimited word as a script filename.
    ///
    /// Unlike [`Scanner::next`], operator characters do not split the
    /// lexeme. The word must end with a case-insensitive `.sc` suffix, or
    /// `invalid_filename` is diagnosed.
    pub fn next_filename(&mut self) -> Option<Token> {
        let begin = self.location();
        while Self::is_graph(self.peek()) {
            self.bump();
        }
        let token = self.token_from(Category::Word, begin);

        if Self::is_filename(self.spelling(token)) {
            return Some(token);
        }

        let range = token.source;
        self.diagnostics()
            .report(begin, Diag::InvalidFilename)
            .range(range);
        None
    }

    fn is_filename(lexeme: &str) -> bool {
        lexeme.len() >= 3 && lexeme[lexeme.len() - 3..].eq_ignore_ascii_case(".sc")
    }
}
