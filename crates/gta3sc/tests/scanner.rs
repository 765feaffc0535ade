mod common;

use common::{assert_no_diag, consume_diag, diagnostics, DiagQueue};
use gta3sc::diag::Diag;
use gta3sc::sourceman::{SourceFile, SourceManager};
use gta3sc::syntax::{Category, Preprocessor, Scanner};
use pretty_assertions::assert_eq;

struct Fixture<'d> {
    scanner: Scanner<'d>,
    file: SourceFile,
    diags: DiagQueue,
}

/// Runs a test body against a scanner over the given source.
fn scan(source: &str, run: impl FnOnce(Fixture<'_>)) {
    let (mut handler, diags) = diagnostics();
    let mut sourceman = SourceManager::new();
    let file = sourceman.load_string(source);
    let scanner = Scanner::new(Preprocessor::new(file.clone(), &mut handler));

    run(Fixture {
        scanner,
        file,
        diags,
    });
}

impl Fixture<'_> {
    fn next_category(&mut self) -> Category {
        self.scanner.next().expect("expected a token").category
    }

    #[track_caller]
    fn expect(&mut self, category: Category, spelling: &str) {
        let token = self.scanner.next().expect("expected a token");
        assert_eq!(token.category, category);
        assert_eq!(self.file.view_of(token.source), spelling);
    }

    #[track_caller]
    fn expect_ws(&mut self) {
        assert_eq!(self.next_category(), Category::Whitespace);
    }

    #[track_caller]
    fn expect_eol(&mut self) {
        assert_eq!(self.next_category(), Category::EndOfLine);
    }

    #[track_caller]
    fn expect_fail(&mut self, kind: Diag) {
        assert!(self.scanner.next().is_none());
        assert_eq!(consume_diag(&self.diags).kind, kind);
    }

    #[track_caller]
    fn expect_filename(&mut self, spelling: &str) {
        let token = self.scanner.next_filename().expect("expected a filename");
        assert_eq!(token.category, Category::Word);
        assert_eq!(self.file.view_of(token.source), spelling);
    }

    #[track_caller]
    fn expect_filename_fail(&mut self) {
        assert!(self.scanner.next_filename().is_none());
        assert_eq!(consume_diag(&self.diags).kind, Diag::InvalidFilename);
    }
}

#[test]
fn scanner_with_empty_stream() {
    scan("", |mut fx| {
        assert!(!fx.scanner.eof());
        fx.expect_eol();
        assert!(fx.scanner.eof());
        fx.expect(Category::EndOfLine, "");
        assert!(fx.scanner.eof());
        assert_no_diag(&fx.diags);
    });
}

#[test]
fn scanner_with_leading_and_trailing_whitespace() {
    scan("  , COMMAND  (\t)  \n", |mut fx| {
        assert_eq!(fx.next_category(), Category::Word);
        fx.expect_eol();
        assert_no_diag(&fx.diags);
    });
}

#[test]
fn scanner_with_whitespace_in_the_middle() {
    scan("  , COMMAND  1,\t,2  (\t)  ", |mut fx| {
        assert_eq!(fx.next_category(), Category::Word);
        fx.expect_ws();
        assert_eq!(fx.next_category(), Category::Word);
        fx.expect_ws();
        assert_eq!(fx.next_category(), Category::Word);
        fx.expect_eol();
        assert_no_diag(&fx.diags);
    });
}

#[test]
fn scanner_with_word() {
    let source = "1234 123a -123a -.abc         \n\
                  4x4.sc .sc                    \n\
                  word: word: word              \n\
                  %$&~ AbC {}                   \n";

    scan(source, |mut fx| {
        fx.expect(Category::Word, "1234");
        fx.expect_ws();
        fx.expect(Category::Word, "123a");
        fx.expect_ws();
        fx.expect(Category::Word, "-123a");
        fx.expect_ws();
        fx.expect(Category::Word, "-.abc");
        fx.expect_eol();

        fx.expect(Category::Word, "4x4.sc");
        fx.expect_ws();
        fx.expect(Category::Word, ".sc");
        fx.expect_eol();

        fx.expect(Category::Word, "word:");
        fx.expect_ws();
        fx.expect(Category::Word, "word:");
        fx.expect_ws();
        fx.expect(Category::Word, "word");
        fx.expect_eol();

        fx.expect(Category::Word, "%$&~");
        fx.expect_ws();
        fx.expect(Category::Word, "AbC");
        fx.expect_ws();
        fx.expect(Category::Word, "{}");
        fx.expect_eol();

        assert!(fx.scanner.eof());
        assert_no_diag(&fx.diags);
    });
}

#[test]
fn scanner_with_string_literal() {
    let source = " \"this\tI$ /* a // \\n (%1teral),\" \n\
                  \x20\"                                  \n\
                  \x20\"\"                                \n\
                  \x20\"string\"abc                       \n\
                  \x20not_string                          \n";

    scan(source, |mut fx| {
        fx.expect(Category::String, "\"this\tI$ /* a // \\n (%1teral),\"");
        fx.expect_eol();

        fx.expect_fail(Diag::UnterminatedStringLiteral);
        fx.expect_eol();

        fx.expect(Category::String, "\"\"");
        fx.expect_eol();

        fx.expect(Category::String, "\"string\"");
        fx.expect(Category::Word, "abc"); // fine at scanning time
        fx.expect_eol();

        fx.expect(Category::Word, "not_string");
        fx.expect_eol();

        assert!(fx.scanner.eof());
        assert_no_diag(&fx.diags);
    });
}

#[test]
fn scanner_with_filename() {
    let source = " .sc a.SC @.sc 1.sc 1.0sc SC   \n\
                  \x20b\"a\".sc                     \n\
                  \x20file-nam+@e.sc                \n\
                  \x20file-nam+@e.sc                \n";

    scan(source, |mut fx| {
        fx.expect_filename(".sc");
        fx.expect_ws();
        fx.expect_filename("a.SC");
        fx.expect_ws();
        fx.expect_filename("@.sc");
        fx.expect_ws();
        fx.expect_filename("1.sc");
        fx.expect_ws();

        fx.expect_filename_fail(); // 1.0sc
        fx.expect_ws();
        fx.expect_filename_fail(); // SC
        fx.expect_eol();

        fx.expect_filename_fail(); // b
        fx.expect(Category::String, "\"a\"");
        fx.expect_filename(".sc");
        fx.expect_eol();

        fx.expect_filename("file-nam+@e.sc");
        fx.expect_eol();

        fx.expect(Category::Word, "file");
        fx.expect(Category::Minus, "-");
        fx.expect(Category::Word, "nam");
        fx.expect(Category::PlusAt, "+@");
        fx.expect(Category::Word, "e.sc");
        fx.expect_eol();

        assert!(fx.scanner.eof());
        assert_no_diag(&fx.diags);
    });
}

#[test]
fn scanner_with_operators() {
    let source = "+ - * / +@ -@        \n\
                  += -= *= /= +=@ -=@  \n\
                  <= < = =# > >=       \n\
                  --++ - -             \n\
                  << <=> +-*/+@-@      \n\
                  1--1 1- -1 +1        \n\
                  -. -.1 -1.0          \n\
                  + @   - @   = #  + = \n";

    scan(source, |mut fx| {
        for (category, spelling) in [
            (Category::Plus, "+"),
            (Category::Minus, "-"),
            (Category::Star, "*"),
            (Category::Slash, "/"),
            (Category::PlusAt, "+@"),
        ] {
            fx.expect(category, spelling);
            fx.expect_ws();
        }
        fx.expect(Category::MinusAt, "-@");
        fx.expect_eol();

        for (category, spelling) in [
            (Category::PlusEqual, "+="),
            (Category::MinusEqual, "-="),
            (Category::StarEqual, "*="),
            (Category::SlashEqual, "/="),
            (Category::PlusEqualAt, "+=@"),
        ] {
            fx.expect(category, spelling);
            fx.expect_ws();
        }
        fx.expect(Category::MinusEqualAt, "-=@");
        fx.expect_eol();

        for (category, spelling) in [
            (Category::LessEqual, "<="),
            (Category::Less, "<"),
            (Category::Equal, "="),
            (Category::EqualHash, "=#"),
            (Category::Greater, ">"),
        ] {
            fx.expect(category, spelling);
            fx.expect_ws();
        }
        fx.expect(Category::GreaterEqual, ">=");
        fx.expect_eol();

        fx.expect(Category::MinusMinus, "--");
        fx.expect(Category::PlusPlus, "++");
        fx.expect_ws();
        fx.expect(Category::Minus, "-");
        fx.expect_ws();
        fx.expect(Category::Minus, "-");
        fx.expect_eol();

        fx.expect(Category::Less, "<");
        fx.expect(Category::Less, "<");
        fx.expect_ws();
        fx.expect(Category::LessEqual, "<=");
        fx.expect(Category::Greater, ">");
        fx.expect_ws();
        fx.expect(Category::Plus, "+");
        fx.expect(Category::Minus, "-");
        fx.expect(Category::Star, "*");
        fx.expect(Category::Slash, "/");
        fx.expect(Category::PlusAt, "+@");
        fx.expect(Category::MinusAt, "-@");
        fx.expect_eol();

        fx.expect(Category::Word, "1");
        fx.expect(Category::MinusMinus, "--");
        fx.expect(Category::Word, "1");
        fx.expect_ws();
        fx.expect(Category::Word, "1");
        fx.expect(Category::Minus, "-");
        fx.expect_ws();
        fx.expect(Category::Word, "-1");
        fx.expect_ws();
        fx.expect(Category::Plus, "+");
        fx.expect(Category::Word, "1");
        fx.expect_eol();

        fx.expect(Category::Word, "-.");
        fx.expect_ws();
        fx.expect(Category::Word, "-.1");
        fx.expect_ws();
        fx.expect(Category::Word, "-1.0");
        fx.expect_eol();

        fx.expect(Category::Plus, "+");
        fx.expect_ws();
        fx.expect(Category::Word, "@");
        fx.expect_ws();
        fx.expect(Category::Minus, "-");
        fx.expect_ws();
        fx.expect(Category::Word, "@");
        fx.expect_ws();
        fx.expect(Category::Equal, "=");
        fx.expect_ws();
        fx.expect(Category::Word, "#");
        fx.expect_ws();
        fx.expect(Category::Plus, "+");
        fx.expect_ws();
        fx.expect(Category::Equal, "=");
        fx.expect_eol();

        assert!(fx.scanner.eof());
        assert_no_diag(&fx.diags);
    });
}

#[test]
fn scanner_with_invalid_ascii() {
    scan("HI \x01 BYE\n\"HI \x02 BYE\"\n", |mut fx| {
        assert_eq!(fx.next_category(), Category::Word);
        fx.expect_ws();
        fx.expect_fail(Diag::InvalidChar);
        fx.expect_ws();
        assert_eq!(fx.next_category(), Category::Word);
        fx.expect_eol();

        // Strings tolerate out-of-range bytes at scanning time.
        assert_eq!(fx.next_category(), Category::String);
        fx.expect_eol();

        assert!(fx.scanner.eof());
        assert_no_diag(&fx.diags);
    });
}
