//! Source files, locations and ranges.
//!
//! Every loaded file is assigned a half-open window in a single monotonic
//! `u32` location space, so a bare [`SourceLocation`] identifies a byte of
//! some loaded file without naming it. Ranges are pairs of locations and
//! support the little arithmetic the front-end needs for span manipulation.

use std::fmt;
use std::io::Read;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Handle to a byte in some loaded source file.
///
/// The zero location is reserved to mean "no location".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceLocation(u32);

/// The location used when a diagnostic has no meaningful position.
pub const NO_SOURCE_LOC: SourceLocation = SourceLocation(0);

/// The range used when a symbol has no meaningful source span.
pub const NO_SOURCE_RANGE: SourceRange = SourceRange {
    begin: NO_SOURCE_LOC,
    end: NO_SOURCE_LOC,
};

impl SourceLocation {
    #[must_use]
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

impl Add<usize> for SourceLocation {
    type Output = Self;

    fn add(self, rhs: usize) -> Self {
        Self(self.0 + u32::try_from(rhs).expect("location offset out of range"))
    }
}

impl AddAssign<usize> for SourceLocation {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl Sub<usize> for SourceLocation {
    type Output = Self;

    fn sub(self, rhs: usize) -> Self {
        Self(self.0 - u32::try_from(rhs).expect("location offset out of range"))
    }
}

impl SubAssign<usize> for SourceLocation {
    fn sub_assign(&mut self, rhs: usize) {
        *self = *self - rhs;
    }
}

impl Sub for SourceLocation {
    type Output = usize;

    /// Distance in bytes between two locations of the same file.
    fn sub(self, rhs: Self) -> usize {
        (self.0 - rhs.0) as usize
    }
}

/// A half-open `[begin, end)` range of source locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceRange {
    pub begin: SourceLocation,
    pub end: SourceLocation,
}

impl SourceRange {
    #[must_use]
    pub fn new(begin: SourceLocation, end: SourceLocation) -> Self {
        Self { begin, end }
    }

    /// Builds a range from its begin location and byte length.
    #[must_use]
    pub fn from_len(begin: SourceLocation, len: usize) -> Self {
        Self {
            begin,
            end: begin + len,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Returns a subrange starting `offset` bytes in, clamped to this range.
    #[must_use]
    pub fn subrange(&self, offset: usize, count: usize) -> Self {
        let offset = offset.min(self.len());
        let count = count.min(self.len() - offset);
        Self::from_len(self.begin + offset, count)
    }

    /// Shorthand for `subrange(offset, ..)` up to the end of this range.
    #[must_use]
    pub fn suffix(&self, offset: usize) -> Self {
        self.subrange(offset, usize::MAX)
    }
}

#[derive(Debug)]
struct SourceInfo {
    path: Option<PathBuf>,
    start: SourceLocation,
    text: String,
}

/// Cheap handle to a loaded source file.
///
/// Clones share the underlying buffer. The compiler core is single-threaded,
/// so plain reference counting suffices.
#[derive(Debug, Clone)]
pub struct SourceFile {
    info: Rc<SourceInfo>,
}

impl SourceFile {
    /// The full text of the file.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.info.text
    }

    #[must_use]
    pub fn code_len(&self) -> usize {
        self.info.text.len()
    }

    /// The first location of this file's window.
    #[must_use]
    pub fn start_location(&self) -> SourceLocation {
        self.info.start
    }

    /// Location of the byte at `offset` within this file.
    #[must_use]
    pub fn location_at(&self, offset: usize) -> SourceLocation {
        self.info.start + offset
    }

    /// The text covered by a range of this file.
    ///
    /// Returns an empty string if the range does not fall on character
    /// boundaries of this file, which cannot happen for ranges produced by
    /// the scanner.
    #[must_use]
    pub fn view_of(&self, range: SourceRange) -> &str {
        let begin = range.begin - self.info.start;
        let end = range.end - self.info.start;
        self.info.text.get(begin..end).unwrap_or("")
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.info.path.as_deref()
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info.path {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("<memory>"),
        }
    }
}

/// Owns the loaded file buffers and hands out location windows.
#[derive(Debug)]
pub struct SourceManager {
    files: Vec<Rc<SourceInfo>>,
    next_loc: u32,
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            next_loc: 1,
        }
    }

    /// Loads a source file from an in-memory string.
    pub fn load_string(&mut self, text: impl Into<String>) -> SourceFile {
        self.insert(None, text.into())
    }

    /// Loads a source file from the filesystem.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> std::io::Result<SourceFile> {
        let path = path.as_ref();
        let mut bytes = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut bytes)?;
        // Source files are ASCII by contract. Out-of-range bytes are kept so
        // the scanner can diagnose them at their precise location.
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => err
                .into_bytes()
                .into_iter()
                .map(|b| if b.is_ascii() { b as char } else { '\u{1}' })
                .collect(),
        };
        Ok(self.insert(Some(path.to_path_buf()), text))
    }

    fn insert(&mut self, path: Option<PathBuf>, text: String) -> SourceFile {
        let start = SourceLocation(self.next_loc);
        // One extra location covers the end-of-file sentinel.
        let window = u32::try_from(text.len()).expect("source file too large") + 1;
        self.next_loc += window;
        let info = Rc::new(SourceInfo { path, start, text });
        self.files.push(Rc::clone(&info));
        SourceFile { info }
    }
}
