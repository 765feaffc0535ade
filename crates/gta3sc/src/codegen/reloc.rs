//! The relocation table.
//!
//! Code generation records three kinds of facts here: where each label was
//! defined, where each file's segment starts in the final image, and every
//! bytecode site whose operand must be patched once the layout is known.
//! After all files are generated, [`RelocationTable::relocate`] resolves
//! each fixup into its final operand value.

use ahash::AHashMap;

use crate::diag::{Diag, DiagnosticHandler};
use crate::symtable::{FileId, FileType, LabelId, SymbolTable};

/// An absolute byte offset into the final image.
pub type AbsoluteOffset = u32;

/// A resolved operand value, absolute or segment-relative.
pub type RelativeOffset = i32;

/// Where a label was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelLoc {
    pub label: LabelId,
    pub origin_file: FileId,
    pub offset: AbsoluteOffset,
}

/// Where a file's segment starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLoc {
    pub file: FileId,
    pub offset: AbsoluteOffset,
}

/// A bytecode site referencing a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixupEntry {
    pub label: LabelId,
    /// The file whose code contains the reference.
    pub origin_file: FileId,
    /// The offset of the operand bytes to patch.
    pub offset: AbsoluteOffset,
}

/// A bytecode site referencing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFixupEntry {
    pub file: FileId,
    /// The offset of the operand bytes to patch.
    pub offset: AbsoluteOffset,
}

/// Accumulates label/file locations and fixups. See the module docs.
#[derive(Debug, Default)]
pub struct RelocationTable {
    labels: Vec<LabelLoc>,
    labels_map: AHashMap<LabelId, usize>,
    files: Vec<FileLoc>,
    files_map: AHashMap<FileId, usize>,
    fixups: Vec<FixupEntry>,
    file_fixups: Vec<FileFixupEntry>,
}

impl RelocationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the definition point of a label.
    ///
    /// Insertion is idempotent; returns false iff the label was already
    /// recorded at a different location.
    pub fn insert_label_loc(
        &mut self,
        label: LabelId,
        origin_file: FileId,
        offset: AbsoluteOffset,
    ) -> bool {
        let entry = LabelLoc {
            label,
            origin_file,
            offset,
        };
        if let Some(&index) = self.labels_map.get(&label) {
            return self.labels[index] == entry;
        }
        self.labels_map.insert(label, self.labels.len());
        self.labels.push(entry);
        true
    }

    /// Records the load offset of a file segment.
    ///
    /// Insertion is idempotent; returns false iff the file was already
    /// recorded at a different offset.
    pub fn insert_file_loc(&mut self, file: FileId, offset: AbsoluteOffset) -> bool {
        let entry = FileLoc { file, offset };
        if let Some(&index) = self.files_map.get(&file) {
            return self.files[index] == entry;
        }
        self.files_map.insert(file, self.files.len());
        self.files.push(entry);
        true
    }

    /// Records a bytecode site referencing a label.
    pub fn insert_fixup_entry(
        &mut self,
        label: LabelId,
        origin_file: FileId,
        offset: AbsoluteOffset,
    ) {
        self.fixups.push(FixupEntry {
            label,
            origin_file,
            offset,
        });
    }

    /// Records a bytecode site referencing a file.
    pub fn insert_file_fixup_entry(&mut self, file: FileId, offset: AbsoluteOffset) {
        self.file_fixups.push(FileFixupEntry { file, offset });
    }

    #[must_use]
    pub fn labels(&self) -> &[LabelLoc] {
        &self.labels
    }

    #[must_use]
    pub fn files(&self) -> &[FileLoc] {
        &self.files
    }

    #[must_use]
    pub fn fixup_table(&self) -> &[FixupEntry] {
        &self.fixups
    }

    #[must_use]
    pub fn file_fixup_table(&self) -> &[FileFixupEntry] {
        &self.file_fixups
    }

    fn label_loc(&self, label: LabelId) -> Option<&LabelLoc> {
        self.labels_map.get(&label).map(|&index| &self.labels[index])
    }

    fn file_loc(&self, file: FileId) -> Option<&FileLoc> {
        self.files_map.get(&file).map(|&index| &self.files[index])
    }

    /// Resolves a label fixup into its operand value.
    ///
    /// Labels in mission files resolve to an offset relative to their
    /// segment, negated, and may only be referenced from within that very
    /// file. Labels anywhere else resolve to their absolute offset.
    pub fn relocate(
        &self,
        fixup: &FixupEntry,
        symtable: &SymbolTable,
        diag: &mut DiagnosticHandler,
    ) -> Option<RelativeOffset> {
        let Some(label_loc) = self.label_loc(fixup.label) else {
            let source = symtable.label(fixup.label).source();
            diag.report(source.begin, Diag::InternalCompilerError);
            return None;
        };

        let def_file = symtable.file(label_loc.origin_file);

        if def_file.file_type() == FileType::Mission {
            if fixup.origin_file != label_loc.origin_file {
                let source = symtable.label(fixup.label).source();
                diag.report(source.begin, Diag::CodegenLabelRefAcrossSegments)
                    .range(source);
                return None;
            }

            let Some(file_loc) = self.file_loc(label_loc.origin_file) else {
                let source = symtable.label(fixup.label).source();
                diag.report(source.begin, Diag::InternalCompilerError);
                return None;
            };

            let relative = i64::from(label_loc.offset) - i64::from(file_loc.offset);
            if relative == 0 {
                // A zero local offset is indistinguishable from a null
                // operand in the target engine.
                let source = symtable.label(fixup.label).source();
                diag.report(source.begin, Diag::CodegenLabelAtLocalZeroOffset)
                    .range(source);
                return None;
            }

            return i32::try_from(-relative).ok();
        }

        i32::try_from(label_loc.offset).ok()
    }

    /// Resolves a file fixup to the file's absolute offset.
    pub fn relocate_file(
        &self,
        fixup: &FileFixupEntry,
        symtable: &SymbolTable,
        diag: &mut DiagnosticHandler,
    ) -> Option<RelativeOffset> {
        let Some(file_loc) = self.file_loc(fixup.file) else {
            let source = symtable.file(fixup.file).source();
            diag.report(source.begin, Diag::InternalCompilerError);
            return None;
        };

        i32::try_from(file_loc.offset).ok()
    }
}
