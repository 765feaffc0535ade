//! The code generator.
//!
//! Walks the checked IR of one file and emits its bytecode, recording label
//! definitions and unresolved label/file references in the relocation
//! table. Offsets recorded there are absolute: the generator is told at
//! which offset of the final image this file's segment begins.

use crate::cmdtable::CommandTable;
use crate::diag::{Diag, DiagnosticHandler};
use crate::ir::sema_ir::{Argument, Command, VarIndex};
use crate::ir::{LinkedIr, SemaIr};
use crate::symtable::{FileId, SymbolTable, VarType, GLOBAL_SCOPE};

use super::emitter::CodeEmitter;
use super::reloc::RelocationTable;
use super::storage::StorageTable;

/// Bytes a text label argument occupies in the output.
const TEXT_LABEL_OUTPUT_SIZE: usize = 8;
/// Bytes a string argument occupies in the output.
const STRING_OUTPUT_SIZE: usize = 128;

/// Generates bytecode for a single file. See the module docs.
#[derive(Debug)]
pub struct CodeGen<'a> {
    cmdtable: &'a CommandTable,
    symtable: &'a SymbolTable,
    storage: &'a StorageTable,
    diag: &'a mut DiagnosticHandler,
    /// The file being generated.
    file: FileId,
    /// Absolute offset at which this file's segment begins.
    base_offset: u32,
    emitter: CodeEmitter,
}

impl<'a> CodeGen<'a> {
    pub fn new(
        file: FileId,
        base_offset: u32,
        cmdtable: &'a CommandTable,
        symtable: &'a SymbolTable,
        storage: &'a StorageTable,
        diag: &'a mut DiagnosticHandler,
    ) -> Self {
        Self {
            cmdtable,
            symtable,
            storage,
            diag,
            file,
            base_offset,
            emitter: CodeEmitter::new(),
        }
    }

    /// The absolute offset of the next emitted byte.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.base_offset + self.emitter.offset()
    }

    /// Emits bytecode for the whole IR into `output`.
    ///
    /// Returns `None` on the first command the target cannot encode.
    pub fn generate(
        &mut self,
        ir: &LinkedIr<SemaIr>,
        reloc: &mut RelocationTable,
        output: &mut Vec<u8>,
    ) -> Option<()> {
        for line in ir {
            if let Some(label) = line.label {
                let inserted = reloc.insert_label_loc(label, self.file, self.offset());
                debug_assert!(inserted);
            }

            if let Some(command) = &line.command {
                self.generate_command(command, reloc)?;
            }
        }

        self.emitter.drain(output);
        Some(())
    }

    fn generate_command(&mut self, command: &Command, reloc: &mut RelocationTable) -> Option<()> {
        let def = self.cmdtable.command(command.def());

        let Some(target_id) = def.target_id() else {
            self.report_unsupported(command);
            return None;
        };
        if !def.target_handled() {
            self.report_unsupported(command);
            return None;
        }

        self.emitter
            .emit_opcode(target_id as u16, command.not_flag());

        for arg in command.args() {
            self.generate_argument(arg, reloc);
        }

        if def.has_optional_param() {
            self.emitter.emit_eoal();
        }

        Some(())
    }

    fn report_unsupported(&mut self, command: &Command) {
        self.diag
            .report(command.source().begin, Diag::CodegenTargetDoesNotSupportCommand)
            .range(command.source());
    }

    fn generate_argument(&mut self, arg: &Argument, reloc: &mut RelocationTable) {
        if let Some(value) = arg.as_int() {
            self.emitter.emit_int(value);
        } else if let Some(value) = arg.as_float() {
            self.emitter.emit_q11_4(value);
        } else if let Some(value) = arg.as_text_label() {
            self.emitter
                .emit_raw_bytes(value.as_bytes(), TEXT_LABEL_OUTPUT_SIZE);
        } else if let Some(value) = arg.as_string() {
            self.emitter
                .emit_raw_bytes(value.as_bytes(), STRING_OUTPUT_SIZE);
        } else if let Some(label) = arg.as_label() {
            // Placeholder patched by the relocation pass. The fixup points
            // at the payload, past the datatype byte.
            reloc.insert_fixup_entry(label, self.file, self.offset() + 1);
            self.emitter.emit_i32(0);
        } else if let Some(file) = arg.as_filename() {
            reloc.insert_file_fixup_entry(file, self.offset() + 1);
            self.emitter.emit_i32(0);
        } else if let Some(constant) = arg.as_constant() {
            self.emitter.emit_int(self.cmdtable.constant(constant).value());
        } else if let Some(used_object) = arg.as_used_object() {
            let id = self.symtable.used_object(used_object).id();
            self.emitter.emit_int(-(id as i32 + 1));
        } else if let Some(var_ref) = arg.as_var_ref() {
            let var = self.symtable.variable(var_ref.var());
            let mut index = self.storage.var_index(var);

            // A literal subscript bakes the element offset into the index.
            if let Some(VarIndex::Literal(subscript)) = var_ref.index() {
                let element_width = match var.var_type() {
                    VarType::Int | VarType::Float => 1,
                    VarType::TextLabel => 2,
                };
                index += subscript as u32 * element_width;
            }

            if var.scope() == GLOBAL_SCOPE {
                self.emitter.emit_var((index * 4) as u16);
            } else {
                self.emitter.emit_lvar(index as u16);
            }
        } else {
            debug_assert!(false, "unhandled argument kind");
        }
    }
}
