//! The model table and its level-file loaders.
//!
//! Object model names come from the game's IDE definition files, which are
//! listed by a level file. The compiler only consumes the resulting
//! [`ModelTable`]; loading happens up front, before any script is compiled.

use std::path::Path;

use ahash::AHashMap;

use crate::diag::{Diag, DiagnosticHandler};
use crate::sourceman::{SourceFile, SourceManager, SourceRange, NO_SOURCE_LOC};

/// Maps known model names to their in-game object ids.
#[derive(Debug, Default)]
pub struct ModelTable {
    models: AHashMap<String, u32>,
}

impl ModelTable {
    /// Finds a model by its uppercase name.
    #[must_use]
    pub fn find_model(&self, name: &str) -> Option<u32> {
        self.models.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Builds a [`ModelTable`].
#[derive(Debug, Default)]
pub struct ModelTableBuilder {
    table: ModelTable,
}

impl ModelTableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a model, normalising the name to uppercase.
    ///
    /// The first insertion of a name wins.
    pub fn insert_model(&mut self, name: &str, id: u32) {
        self.table
            .models
            .entry(name.to_ascii_uppercase())
            .or_insert(id);
    }

    #[must_use]
    pub fn build(self) -> ModelTable {
        self.table
    }
}

/// Loads every IDE file named by a level file into the builder.
///
/// Lines of the level file beginning with `IDE` name definition files
/// relative to `root_path`; other lines are ignored. A `#` starts a comment
/// line.
pub fn load_models_from_level(
    root_path: &Path,
    level_path: &Path,
    objs_only: bool,
    fileman: &mut SourceManager,
    diag: &mut DiagnosticHandler,
    mut builder: ModelTableBuilder,
) -> ModelTableBuilder {
    let Ok(level_file) = fileman.load_file(level_path) else {
        diag.report(NO_SOURCE_LOC, Diag::ConfigModelsCouldNotOpenFile)
            .arg(level_path.display().to_string());
        return builder;
    };

    let mut lines = LineReader::new(&level_file);
    while let Some(line) = lines.next_line() {
        if !line.text.starts_with("IDE") {
            continue;
        }

        let Some(ide_relative) = line.text.get(4..) else {
            continue;
        };
        let ide_path = root_path.join(ide_relative);

        match fileman.load_file(&ide_path) {
            Ok(ide_file) => {
                builder = load_models_from_ide(&ide_file, objs_only, diag, builder);
            }
            Err(_) => {
                diag.report(line.source.begin, Diag::ConfigModelsCouldNotOpenFile)
                    .range(line.source)
                    .arg(ide_path.display().to_string());
            }
        }
    }

    builder
}

/// Loads the models of a single IDE file into the builder.
///
/// The file is split into sections. The `objs`, `tobj` and `anim` sections
/// always contribute models; other sections contribute only when `objs_only`
/// is false. Each line of a readable section carries an object id and a
/// model name as its first two fields.
pub fn load_models_from_ide(
    ide_file: &SourceFile,
    objs_only: bool,
    diag: &mut DiagnosticHandler,
    mut builder: ModelTableBuilder,
) -> ModelTableBuilder {
    let mut in_section = false;
    let mut readable_section = false;

    let mut lines = LineReader::new(ide_file);
    while let Some(line) = lines.next_line() {
        if !in_section {
            in_section = true;
            readable_section = line.text.starts_with("objs")
                || line.text.starts_with("tobj")
                || line.text.starts_with("anim")
                || !objs_only;
            continue;
        }

        if line.text.starts_with("end") {
            in_section = false;
            readable_section = false;
            continue;
        }

        if !readable_section {
            continue;
        }

        let mut fields = line.text.split_ascii_whitespace();
        let id = fields.next().and_then(|f| f.parse::<u32>().ok());
        let name = fields.next();
        match (id, name) {
            (Some(id), Some(name)) => builder.insert_model(name, id),
            _ => {
                diag.report(line.source.begin, Diag::ConfigModelsInvalidIdeLine)
                    .range(line.source);
            }
        }
    }

    builder
}

struct Line {
    text: String,
    source: SourceRange,
}

/// Reads non-empty, non-comment lines from a configuration file.
///
/// Commas, tabs and carriage returns become spaces, leading and trailing
/// spaces are trimmed, and `#` comment lines are skipped.
struct LineReader<'f> {
    file: &'f SourceFile,
    pos: usize,
}

impl<'f> LineReader<'f> {
    fn new(file: &'f SourceFile) -> Self {
        Self { file, pos: 0 }
    }

    fn next_line(&mut self) -> Option<Line> {
        let code = self.file.code().as_bytes();

        while self.pos < code.len() {
            let line_start = self.pos;
            let mut line_end = self.pos;
            while line_end < code.len() && code[line_end] != b'\n' {
                line_end += 1;
            }
            self.pos = if line_end < code.len() {
                line_end + 1
            } else {
                code.len()
            };

            let raw = &self.file.code()[line_start..line_end];
            let cleaned: String = raw
                .chars()
                .map(|c| if matches!(c, ',' | '\t' | '\r') { ' ' } else { c })
                .collect();
            let cleaned = cleaned.trim_matches(' ');

            if cleaned.is_empty() || cleaned.starts_with('#') {
                if line_end == code.len() {
                    break;
                }
                continue;
            }

            return Some(Line {
                text: cleaned.to_owned(),
                source: SourceRange::new(
                    self.file.location_at(line_start),
                    self.file.location_at(line_end),
                ),
            });
        }

        None
    }
}
