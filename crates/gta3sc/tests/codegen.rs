mod common;

use common::{assert_no_diag, build_command_table, consume_diag, diagnostics, DiagQueue};
use gta3sc::cmdtable::{CommandId, CommandTable};
use gta3sc::codegen::{CodeEmitter, CodeGen, RelocationTable, StorageOptions, StorageTable};
use gta3sc::diag::{Diag, DiagnosticHandler};
use gta3sc::ir::sema_ir::{Argument, Command};
use gta3sc::ir::{LinkedIr, SemaIr};
use gta3sc::models::ModelTable;
use gta3sc::sourceman::{SourceManager, NO_SOURCE_RANGE};
use gta3sc::symtable::{
    FileId, FileType, LabelId, ScopeId, SymbolTable, UsedObjectId, VarId, VarType, GLOBAL_SCOPE,
};
use gta3sc::syntax::{Parser, Preprocessor, Scanner, Sema};
use pretty_assertions::assert_eq;

struct Fixture {
    cmdtable: CommandTable,
    symtable: SymbolTable,
    reloc: RelocationTable,
    handler: DiagnosticHandler,
    diags: DiagQueue,
    next_id: u32,
}

impl Fixture {
    fn new() -> Self {
        let (handler, diags) = diagnostics();
        Self {
            cmdtable: build_command_table(),
            symtable: SymbolTable::new(),
            reloc: RelocationTable::new(),
            handler,
            diags,
            next_id: 0,
        }
    }

    fn command(&self, name: &str) -> CommandId {
        self.cmdtable.find_command(name).expect("command not defined")
    }

    fn opcode(&self, name: &str) -> u16 {
        self.cmdtable
            .command(self.command(name))
            .target_id()
            .expect("command has no opcode") as u16
    }

    fn codegen_file(&mut self) -> FileId {
        let (file, _) = self
            .symtable
            .insert_file("A.SC", FileType::Main, NO_SOURCE_RANGE);
        file
    }

    fn make_file(&mut self, file_type: FileType) -> FileId {
        let name = format!("FILE_{}.SC", self.next_id);
        self.next_id += 1;
        let (file, _) = self.symtable.insert_file(&name, file_type, NO_SOURCE_RANGE);
        file
    }

    fn make_label(&mut self) -> LabelId {
        let name = format!("LABEL_{}", self.next_id);
        self.next_id += 1;
        let (label, _) = self
            .symtable
            .insert_label(&name, GLOBAL_SCOPE, NO_SOURCE_RANGE);
        label
    }

    fn make_scope(&mut self) -> ScopeId {
        self.symtable.new_scope()
    }

    fn make_lvar(&mut self, var_type: VarType, scope: ScopeId) -> VarId {
        let name = format!("VAR_{}", self.next_id);
        self.next_id += 1;
        let (var, _) = self
            .symtable
            .insert_var(&name, scope, var_type, None, NO_SOURCE_RANGE);
        var
    }

    fn make_var(&mut self, var_type: VarType) -> VarId {
        self.make_lvar(var_type, GLOBAL_SCOPE)
    }

    fn make_used_object(&mut self) -> UsedObjectId {
        let name = format!("OBJECT_{}", self.next_id);
        self.next_id += 1;
        let (uobj, _) = self.symtable.insert_used_object(&name, NO_SOURCE_RANGE);
        uobj
    }

    fn storage(&self) -> StorageTable {
        StorageTable::from_symbols(&self.symtable, &StorageOptions::default())
            .expect("storage allocation should succeed")
    }

    fn var_index(&self, var: VarId) -> u32 {
        self.storage().var_index(self.symtable.variable(var))
    }

    fn command_line(&self, name: &str, args: Vec<Argument>) -> SemaIr {
        SemaIr::new(
            None,
            Some(Command::new(self.command(name), NO_SOURCE_RANGE, false, args)),
        )
    }

    fn generate_at(&mut self, base_offset: u32, ir: &LinkedIr<SemaIr>) -> Vec<u8> {
        let file = self.codegen_file();
        let storage = self.storage();

        let mut codegen = CodeGen::new(
            file,
            base_offset,
            &self.cmdtable,
            &self.symtable,
            &storage,
            &mut self.handler,
        );

        let mut output = Vec::new();
        let result = codegen.generate(ir, &mut self.reloc, &mut output);
        assert!(result.is_some());
        assert_no_diag(&self.diags);
        output
    }

    fn generate(&mut self, ir: &LinkedIr<SemaIr>) -> Vec<u8> {
        self.generate_at(0, ir)
    }

    fn fail_to_generate(&mut self, ir: &LinkedIr<SemaIr>, reason: Diag) {
        let file = self.codegen_file();
        let storage = self.storage();

        let mut codegen = CodeGen::new(
            file,
            0,
            &self.cmdtable,
            &self.symtable,
            &storage,
            &mut self.handler,
        );

        let mut output = Vec::new();
        assert!(codegen.generate(ir, &mut self.reloc, &mut output).is_none());
        assert_eq!(consume_diag(&self.diags).kind, reason);
    }
}

fn expected(build: impl FnOnce(&mut CodeEmitter)) -> Vec<u8> {
    let mut emitter = CodeEmitter::new();
    build(&mut emitter);
    let mut output = Vec::new();
    emitter.drain(&mut output);
    output
}

fn single(line: SemaIr) -> LinkedIr<SemaIr> {
    [line].into_iter().collect()
}

#[test]
fn generating_a_command() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("RETURN");
    assert_eq!(opcode, 0x0051);

    let ir = single(fx.command_line("RETURN", vec![]));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false);
    }));

    assert!(fx.reloc.labels().is_empty());
    assert!(fx.reloc.files().is_empty());
    assert!(fx.reloc.fixup_table().is_empty());
    assert!(fx.reloc.file_fixup_table().is_empty());
}

#[test]
fn generating_a_noted_command() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("RETURN");

    let line = SemaIr::new(
        None,
        Some(Command::new(fx.command("RETURN"), NO_SOURCE_RANGE, true, vec![])),
    );
    let output = fx.generate(&single(line));
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, true);
    }));
}

#[test]
fn generating_an_unhandled_command() {
    let mut fx = Fixture::new();

    let def = fx.cmdtable.command(fx.command("FLASH_RADAR_BLIP"));
    assert!(def.target_id().is_some());
    assert!(!def.target_handled());

    let ir = single(fx.command_line("FLASH_RADAR_BLIP", vec![Argument::int(0, NO_SOURCE_RANGE)]));
    fx.fail_to_generate(&ir, Diag::CodegenTargetDoesNotSupportCommand);
}

#[test]
fn generating_a_command_without_target_id() {
    let mut fx = Fixture::new();

    let def = fx.cmdtable.command(fx.command("COMMAND_WITHOUT_ID"));
    assert!(def.target_id().is_none());
    assert!(def.target_handled());

    let ir = single(fx.command_line("COMMAND_WITHOUT_ID", vec![Argument::int(0, NO_SOURCE_RANGE)]));
    fx.fail_to_generate(&ir, Diag::CodegenTargetDoesNotSupportCommand);
}

#[test]
fn generating_label_definitions() {
    let base_offset = 100;
    let mut fx = Fixture::new();
    let file = fx.codegen_file();

    let label_before = fx.make_label();
    let label_in_command = fx.make_label();
    let label_after = fx.make_label();

    let ir: LinkedIr<SemaIr> = [
        SemaIr::new(Some(label_before), None),
        SemaIr::new(
            Some(label_in_command),
            Some(Command::new(fx.command("RETURN"), NO_SOURCE_RANGE, false, vec![])),
        ),
        SemaIr::new(Some(label_after), None),
    ]
    .into_iter()
    .collect();

    let output = fx.generate_at(base_offset, &ir);
    assert_eq!(output.len(), 2);

    let labels = fx.reloc.labels();
    assert_eq!(labels.len(), 3);
    assert_eq!(labels[0].label, label_before);
    assert_eq!(labels[0].offset, base_offset);
    assert_eq!(labels[0].origin_file, file);

    // A label on the same line as a command sits just before it.
    assert_eq!(labels[1].label, label_in_command);
    assert_eq!(labels[1].offset, base_offset);

    assert_eq!(labels[2].label, label_after);
    assert_eq!(labels[2].offset, base_offset + 2);
}

#[test]
fn generating_an_integer_argument() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("WAIT");
    assert_eq!(opcode, 0x0001);

    let ir = single(fx.command_line("WAIT", vec![Argument::int(1000, NO_SOURCE_RANGE)]));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false).emit_int(1000);
    }));
}

#[test]
fn generating_a_float_argument() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("SET_TIME_SCALE");
    assert_eq!(opcode, 0x015D);

    let ir = single(fx.command_line("SET_TIME_SCALE", vec![Argument::float(0.3, NO_SOURCE_RANGE)]));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false).emit_q11_4(0.3);
    }));
}

#[test]
fn generating_a_text_label_argument() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("PRINT_HELP");
    assert_eq!(opcode, 0x03E5);

    let ir = single(fx.command_line(
        "PRINT_HELP",
        vec![Argument::text_label("HELLO", NO_SOURCE_RANGE)],
    ));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false).emit_raw_bytes(b"HELLO", 8);
    }));
}

#[test]
fn generating_a_string_argument() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("SAVE_STRING_TO_DEBUG_FILE");
    assert_eq!(opcode, 0x05B6);

    let ir = single(fx.command_line(
        "SAVE_STRING_TO_DEBUG_FILE",
        vec![Argument::string("Hello World", NO_SOURCE_RANGE)],
    ));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false).emit_raw_bytes(b"Hello World", 128);
    }));
}

#[test]
fn generating_global_variable_arguments() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("DO_FADE");
    assert_eq!(opcode, 0x016A);

    let var_int = fx.make_var(VarType::Int);
    let var_float = fx.make_var(VarType::Float);
    let int_offset = fx.var_index(var_int) * 4;
    let float_offset = fx.var_index(var_float) * 4;

    let ir = single(fx.command_line(
        "DO_FADE",
        vec![
            Argument::var_ref(gta3sc::ir::sema_ir::VarRef::new(var_int), NO_SOURCE_RANGE),
            Argument::var_ref(gta3sc::ir::sema_ir::VarRef::new(var_float), NO_SOURCE_RANGE),
        ],
    ));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false)
            .emit_var(int_offset as u16)
            .emit_var(float_offset as u16);
    }));
}

#[test]
fn generating_local_variable_arguments() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("DO_FADE");

    let scope1 = fx.make_scope();
    let scope2 = fx.make_scope();
    let lvar_scope1 = fx.make_lvar(VarType::Int, scope1);
    let lvar_scope2 = fx.make_lvar(VarType::Float, scope2);
    let index1 = fx.var_index(lvar_scope1);
    let index2 = fx.var_index(lvar_scope2);

    let ir = single(fx.command_line(
        "DO_FADE",
        vec![
            Argument::var_ref(gta3sc::ir::sema_ir::VarRef::new(lvar_scope1), NO_SOURCE_RANGE),
            Argument::var_ref(gta3sc::ir::sema_ir::VarRef::new(lvar_scope2), NO_SOURCE_RANGE),
        ],
    ));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false)
            .emit_lvar(index1 as u16)
            .emit_lvar(index2 as u16);
    }));
}

#[test]
fn generating_a_string_constant_argument() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("DO_FADE");

    let fade = fx.cmdtable.find_enumeration("FADE").unwrap();
    let fade_in = fx.cmdtable.find_constant(fade, "FADE_IN").unwrap();

    let ir = single(fx.command_line(
        "DO_FADE",
        vec![
            Argument::int(1000, NO_SOURCE_RANGE),
            Argument::constant(fade_in, NO_SOURCE_RANGE),
        ],
    ));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false).emit_int(1000).emit_int(1);
    }));
}

#[test]
fn generating_used_object_arguments() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("CREATE_OBJECT");
    assert_eq!(opcode, 0x0107);

    let obj1 = fx.make_used_object();
    let obj2 = fx.make_used_object();
    let obj3 = fx.make_used_object();

    // The parameter types of CREATE_OBJECT are disrespected here, which is
    // fine: code generation does not care about semantics.
    let ir = single(fx.command_line(
        "CREATE_OBJECT",
        vec![
            Argument::used_object(obj3, NO_SOURCE_RANGE),
            Argument::used_object(obj1, NO_SOURCE_RANGE),
            Argument::used_object(obj2, NO_SOURCE_RANGE),
            Argument::int(0, NO_SOURCE_RANGE),
            Argument::int(0, NO_SOURCE_RANGE),
        ],
    ));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false)
            .emit_int(-3)
            .emit_int(-1)
            .emit_int(-2)
            .emit_int(0)
            .emit_int(0);
    }));
}

#[test]
fn generating_a_label_argument() {
    let base_offset = 100;
    let mut fx = Fixture::new();
    let opcode = fx.opcode("GOTO");
    assert_eq!(opcode, 0x0002);

    let file = fx.codegen_file();
    let label = fx.make_label();

    let line = SemaIr::new(
        Some(label),
        Some(Command::new(
            fx.command("GOTO"),
            NO_SOURCE_RANGE,
            false,
            vec![Argument::label(label, NO_SOURCE_RANGE)],
        )),
    );
    let output = fx.generate_at(base_offset, &single(line));
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false).emit_i32(0);
    }));

    let fixups = fx.reloc.fixup_table();
    assert_eq!(fixups.len(), 1);
    assert_eq!(fixups[0].label, label);
    assert_eq!(fixups[0].origin_file, file);
    // The fixup points past the opcode and the datatype byte.
    assert_eq!(fixups[0].offset, base_offset + 2 + 1);
    assert!(fx.reloc.file_fixup_table().is_empty());
}

#[test]
fn generating_a_filename_argument() {
    let base_offset = 100;
    let mut fx = Fixture::new();
    let opcode = fx.opcode("LAUNCH_MISSION");
    assert_eq!(opcode, 0x00D7);

    let other_file = fx.make_file(FileType::Subscript);

    let ir = single(fx.command_line(
        "LAUNCH_MISSION",
        vec![Argument::filename(other_file, NO_SOURCE_RANGE)],
    ));
    let output = fx.generate_at(base_offset, &ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false).emit_i32(0);
    }));

    let fixups = fx.reloc.file_fixup_table();
    assert_eq!(fixups.len(), 1);
    assert_eq!(fixups[0].file, other_file);
    assert_eq!(fixups[0].offset, base_offset + 2 + 1);
    assert!(fx.reloc.fixup_table().is_empty());
}

#[test]
fn generating_variadic_arguments_emits_a_terminator() {
    let mut fx = Fixture::new();
    let opcode = fx.opcode("START_NEW_SCRIPT");
    let label = fx.make_label();

    let ir = single(fx.command_line(
        "START_NEW_SCRIPT",
        vec![Argument::label(label, NO_SOURCE_RANGE)],
    ));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false).emit_i32(0).emit_eoal();
    }));

    let ir = single(fx.command_line(
        "START_NEW_SCRIPT",
        vec![
            Argument::label(label, NO_SOURCE_RANGE),
            Argument::int(1, NO_SOURCE_RANGE),
            Argument::int(2, NO_SOURCE_RANGE),
            Argument::int(3, NO_SOURCE_RANGE),
        ],
    ));
    let output = fx.generate(&ir);
    assert_eq!(output, expected(|e| {
        e.emit_opcode(opcode, false)
            .emit_i32(0)
            .emit_int(1)
            .emit_int(2)
            .emit_int(3)
            .emit_eoal();
    }));
}

#[test]
fn compiling_a_wait_command_end_to_end() {
    let cmdtable = build_command_table();
    let models = ModelTable::default();
    let (mut handler, diags) = diagnostics();

    let mut sourceman = SourceManager::new();
    let file = sourceman.load_string("WAIT 0\n");

    let parser_ir = {
        let mut parser = Parser::new(Scanner::new(Preprocessor::new(file, &mut handler)));
        parser.parse_main_script_file().expect("parse should succeed")
    };

    let mut symtable = SymbolTable::new();
    let sema_ir = Sema::new(&cmdtable, &models, &mut symtable, &mut handler)
        .validate(&parser_ir)
        .expect("analysis should succeed");

    let (script_file, _) = symtable.insert_file("MAIN.SC", FileType::Main, NO_SOURCE_RANGE);
    let storage = StorageTable::from_symbols(&symtable, &StorageOptions::default()).unwrap();

    let mut reloc = RelocationTable::new();
    let mut output = Vec::new();
    let mut codegen = CodeGen::new(
        script_file,
        0,
        &cmdtable,
        &symtable,
        &storage,
        &mut handler,
    );
    codegen
        .generate(&sema_ir, &mut reloc, &mut output)
        .expect("generation should succeed");

    assert_eq!(output, [0x01, 0x00, 0x04, 0x00]);
    assert_no_diag(&diags);
}
