//! The preprocessor.
//!
//! A single-pass character stream over a loaded source file. It normalises
//! line endings, strips comments and trims the leading whitespace of each
//! line, so the scanner only ever sees logical characters.
//!
//! Comments are replaced by whitespace in a way that keeps every produced
//! character mapping back into the original buffer: a comment confined to
//! one line becomes a single space, while a comment spanning lines
//! contributes its interior newlines (whatever follows is then at the start
//! of a line, where leading trimming applies).

use crate::diag::{Diag, DiagnosticHandler};
use crate::sourceman::{SourceFile, SourceLocation};

/// Block comments nesting deeper than this are diagnosed.
const MAX_COMMENT_NESTING: u32 = 32;

/// Restores a [`Preprocessor`] to a previous position.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessorSnapshot {
    pos: usize,
    char_start: usize,
    at_line_start: bool,
    comment_depth: u32,
    comment_has_newline: bool,
    comment_start_pos: usize,
    reached_end: bool,
}

/// The character stream. See the module docs.
#[derive(Debug)]
pub struct Preprocessor<'d> {
    source: SourceFile,
    diag: &'d mut DiagnosticHandler,
    pos: usize,
    /// Byte position where the most recently produced character began.
    ///
    /// A character may span several source bytes (`\r\n` folds into one
    /// newline, a one-line comment folds into one space), so consumers that
    /// build source ranges need the true start, not `pos - 1`.
    char_start: usize,
    at_line_start: bool,
    /// Nesting depth of the block comment being consumed, zero outside.
    comment_depth: u32,
    /// Whether the current block comment produced a newline already.
    comment_has_newline: bool,
    comment_start_pos: usize,
    reached_end: bool,
}

impl<'d> Preprocessor<'d> {
    pub fn new(source: SourceFile, diag: &'d mut DiagnosticHandler) -> Self {
        Self {
            source,
            diag,
            pos: 0,
            char_start: 0,
            at_line_start: true,
            comment_depth: 0,
            comment_has_newline: false,
            comment_start_pos: 0,
            reached_end: false,
        }
    }

    /// The file this stream reads from.
    #[must_use]
    pub fn source_file(&self) -> &SourceFile {
        &self.source
    }

    pub fn diagnostics(&mut self) -> &mut DiagnosticHandler {
        self.diag
    }

    /// Whether the stream already produced its end-of-file character.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.reached_end
    }

    /// The location of the next character to be produced.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.source.location_at(self.pos)
    }

    /// The location where the most recently produced character began.
    #[must_use]
    pub fn last_char_location(&self) -> SourceLocation {
        self.source.location_at(self.char_start)
    }

    /// Captures the stream state for a later [`Preprocessor::seek`].
    #[must_use]
    pub fn tell(&self) -> PreprocessorSnapshot {
        PreprocessorSnapshot {
            pos: self.pos,
            char_start: self.char_start,
            at_line_start: self.at_line_start,
            comment_depth: self.comment_depth,
            comment_has_newline: self.comment_has_newline,
            comment_start_pos: self.comment_start_pos,
            reached_end: self.reached_end,
        }
    }

    /// Rewinds to a previously captured state.
    pub fn seek(&mut self, snapshot: PreprocessorSnapshot) {
        self.pos = snapshot.pos;
        self.char_start = snapshot.char_start;
        self.at_line_start = snapshot.at_line_start;
        self.comment_depth = snapshot.comment_depth;
        self.comment_has_newline = snapshot.comment_has_newline;
        self.comment_start_pos = snapshot.comment_start_pos;
        self.reached_end = snapshot.reached_end;
    }

    fn peek_byte(&self) -> Option<u8> {
        self.source.code().as_bytes().get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.source.code().as_bytes().get(self.pos + offset).copied()
    }

    /// Consumes a newline at the current position. Handles `\r`, `\n` and
    /// `\r\n` alike.
    fn bump_newline(&mut self) {
        if self.peek_byte() == Some(b'\r') && self.peek_byte_at(1) == Some(b'\n') {
            self.pos += 2;
        } else {
            self.pos += 1;
        }
        self.at_line_start = true;
    }

    fn is_newline_byte(byte: u8) -> bool {
        byte == b'\r' || byte == b'\n'
    }

    fn is_trim_byte(byte: u8) -> bool {
        matches!(byte, b' ' | b'\t' | b'(' | b')' | b',')
    }

    fn at_block_comment_open(&self) -> bool {
        self.peek_byte() == Some(b'/') && self.peek_byte_at(1) == Some(b'*')
    }

    fn at_block_comment_close(&self) -> bool {
        self.peek_byte() == Some(b'*') && self.peek_byte_at(1) == Some(b'/')
    }

    fn at_line_comment(&self) -> bool {
        self.peek_byte() == Some(b'/') && self.peek_byte_at(1) == Some(b'/')
    }

    fn open_block_comment(&mut self) {
        self.comment_start_pos = self.pos;
        self.comment_depth = 1;
        self.comment_has_newline = false;
        self.pos += 2;
    }

    /// Returns the next logical character, or `\0` at end of stream.
    pub fn next(&mut self) -> char {
        loop {
            if self.comment_depth > 0 {
                if let Some(c) = self.next_inside_comment() {
                    return c;
                }
                continue;
            }

            let Some(byte) = self.peek_byte() else {
                self.char_start = self.pos;
                self.reached_end = true;
                return '\0';
            };

            if self.at_line_start {
                if Self::is_trim_byte(byte) {
                    self.pos += 1;
                    continue;
                }
                if self.at_block_comment_open() {
                    self.open_block_comment();
                    continue;
                }
                if self.at_line_comment() {
                    self.skip_line_comment();
                    continue;
                }
                if Self::is_newline_byte(byte) {
                    self.char_start = self.pos;
                    self.bump_newline();
                    return '\n';
                }
                self.at_line_start = false;
                continue;
            }

            if self.at_block_comment_open() {
                self.open_block_comment();
                continue;
            }
            if self.at_line_comment() {
                self.char_start = self.pos;
                self.skip_line_comment();
                return ' ';
            }
            if Self::is_newline_byte(byte) {
                self.char_start = self.pos;
                self.bump_newline();
                return '\n';
            }

            self.char_start = self.pos;
            self.pos += 1;
            return byte as char;
        }
    }

    /// Advances within a block comment, producing its interior newlines.
    ///
    /// Returns `None` when the comment ends without a character to produce.
    fn next_inside_comment(&mut self) -> Option<char> {
        loop {
            let Some(byte) = self.peek_byte() else {
                let loc = self.source.location_at(self.comment_start_pos);
                self.diag.report(loc, Diag::UnterminatedComment);
                self.comment_depth = 0;
                return None;
            };

            if Self::is_newline_byte(byte) {
                self.char_start = self.pos;
                self.bump_newline();
                self.comment_has_newline = true;
                return Some('\n');
            }

            if self.at_block_comment_open() {
                if self.comment_depth >= MAX_COMMENT_NESTING {
                    self.diag.report(self.location(), Diag::LimitBlockComments);
                } else {
                    self.comment_depth += 1;
                }
                self.pos += 2;
                continue;
            }

            if self.at_block_comment_close() {
                self.pos += 2;
                self.comment_depth -= 1;
                if self.comment_depth == 0 {
                    if self.comment_has_newline || self.at_line_start {
                        return None;
                    }
                    self.char_start = self.comment_start_pos;
                    return Some(' ');
                }
                continue;
            }

            self.pos += 1;
        }
    }

    /// Skips a `//` comment up to, but not including, the line terminator.
    fn skip_line_comment(&mut self) {
        self.pos += 2;
        while let Some(byte) = self.peek_byte() {
            if Self::is_newline_byte(byte) {
                break;
            }
            self.pos += 1;
        }
    }
}
