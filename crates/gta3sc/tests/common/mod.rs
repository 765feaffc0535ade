//! Shared fixture for the compiler tests.
//!
//! Provides a diagnostic handler backed by a queue the tests can drain, and
//! a command table with a representative slice of the in-game command
//! definitions.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use gta3sc::cmdtable::{
    CommandId, CommandTable, CommandTableBuilder, EnumId, EntityId, ParamDef, ParamType,
    GLOBAL_ENUM, NO_ENTITY_TYPE,
};
use gta3sc::diag::{Diag, Diagnostic, DiagnosticHandler};

/// Queue of diagnostics reported so far.
pub type DiagQueue = Rc<RefCell<VecDeque<Diagnostic>>>;

/// Builds a handler whose reports land in the returned queue.
pub fn diagnostics() -> (DiagnosticHandler, DiagQueue) {
    let queue: DiagQueue = Rc::default();
    let sink = Rc::clone(&queue);
    let handler = DiagnosticHandler::new(move |diag| sink.borrow_mut().push_back(diag.clone()));
    (handler, queue)
}

/// Pops the oldest reported diagnostic.
#[track_caller]
pub fn consume_diag(queue: &DiagQueue) -> Diagnostic {
    queue
        .borrow_mut()
        .pop_front()
        .expect("expected a diagnostic to have been reported")
}

/// Pops the oldest diagnostic and asserts its kind.
#[track_caller]
pub fn expect_diag(queue: &DiagQueue, kind: Diag) {
    let diag = consume_diag(queue);
    assert_eq!(diag.kind, kind);
}

#[track_caller]
pub fn assert_no_diag(queue: &DiagQueue) {
    assert!(
        queue.borrow().is_empty(),
        "unexpected diagnostics: {:?}",
        queue.borrow()
    );
}

fn param(param_type: ParamType) -> ParamDef {
    ParamDef::new(param_type)
}

fn param_enum(param_type: ParamType, enum_type: EnumId) -> ParamDef {
    ParamDef {
        param_type,
        entity_type: NO_ENTITY_TYPE,
        enum_type,
    }
}

fn param_entity(param_type: ParamType, entity_type: EntityId) -> ParamDef {
    ParamDef {
        param_type,
        entity_type,
        enum_type: GLOBAL_ENUM,
    }
}

fn add_command(builder: &mut CommandTableBuilder, name: &str, params: Vec<ParamDef>) -> CommandId {
    let (command, _) = builder.insert_command(name);
    builder.set_command_params(command, params);
    command
}

fn add_alternator(builder: &mut CommandTableBuilder, name: &str, alternatives: &[&str]) {
    let (alternator, _) = builder.insert_alternator(name);
    for alternative in alternatives {
        let command = builder
            .find_command(alternative)
            .expect("alternative not defined");
        builder.insert_alternative(alternator, command);
    }
}

fn set_command_id(builder: &mut CommandTableBuilder, name: &str, id: Option<i16>, handled: bool) {
    let command = builder.find_command(name).expect("command not defined");
    builder.set_command_id(command, id, handled);
}

/// Builds a command table mirroring the definitions the tests exercise.
pub fn build_command_table() -> CommandTable {
    use ParamType::{
        Float, InputFloat, InputInt, InputOpt, Int, Label, LvarFloat, LvarFloatOpt, LvarInt,
        LvarIntOpt, LvarTextLabel, LvarTextLabelOpt, OutputFloat, OutputInt, String, TextLabel,
        VarFloat, VarFloatOpt, VarInt, VarIntOpt, VarTextLabel, VarTextLabelOpt,
    };

    let mut builder = CommandTableBuilder::new();

    let (car, _) = builder.insert_entity_type("CAR");
    let (char_, _) = builder.insert_entity_type("CHAR");
    let (object, _) = builder.insert_entity_type("OBJECT");

    let (pedtype, _) = builder.insert_enumeration("PEDTYPE");
    let (defaultmodel, _) = builder.insert_enumeration("DEFAULTMODEL");
    let (fade, _) = builder.insert_enumeration("FADE");
    let (model, _) = builder.insert_enumeration("MODEL"); // special

    builder.insert_or_assign_constant(GLOBAL_ENUM, "FALSE", 0);
    builder.insert_or_assign_constant(GLOBAL_ENUM, "TRUE", 1);
    builder.insert_or_assign_constant(GLOBAL_ENUM, "OFF", 0);
    builder.insert_or_assign_constant(GLOBAL_ENUM, "ON", 1);

    builder.insert_or_assign_constant(pedtype, "PEDTYPE_CIVMALE", 4);
    builder.insert_or_assign_constant(pedtype, "PEDTYPE_CIVFEMALE", 5);
    builder.insert_or_assign_constant(pedtype, "PEDTYPE_MEDIC", 16);

    builder.insert_or_assign_constant(fade, "FADE_OUT", 0);
    builder.insert_or_assign_constant(fade, "FADE_IN", 1);

    builder.insert_or_assign_constant(defaultmodel, "MEDIC", 5);
    builder.insert_or_assign_constant(defaultmodel, "HFYST", 9);
    builder.insert_or_assign_constant(defaultmodel, "CHEETAH", 145);
    builder.insert_or_assign_constant(defaultmodel, "LOVEFIST", 201);

    add_command(&mut builder, "{", vec![]);
    add_command(&mut builder, "}", vec![]);
    add_command(&mut builder, "IF", vec![param(Int)]);
    add_command(&mut builder, "IFNOT", vec![param(Int)]);
    add_command(&mut builder, "ELSE", vec![]);
    add_command(&mut builder, "ENDIF", vec![]);
    add_command(&mut builder, "WHILE", vec![param(Int)]);
    add_command(&mut builder, "WHILENOT", vec![param(Int)]);
    add_command(&mut builder, "ENDWHILE", vec![]);
    add_command(&mut builder, "REPEAT", vec![param(Int), param(VarInt)]);
    add_command(&mut builder, "ENDREPEAT", vec![]);
    add_command(&mut builder, "ANDOR", vec![param(Int)]);
    add_command(&mut builder, "MISSION_START", vec![]);
    add_command(&mut builder, "MISSION_END", vec![]);
    add_command(&mut builder, "WAIT", vec![param(InputInt)]);
    add_command(&mut builder, "SET_TIME_SCALE", vec![param(InputFloat)]);
    add_command(&mut builder, "GOTO", vec![param(Label)]);
    add_command(&mut builder, "GOSUB", vec![param(Label)]);
    add_command(&mut builder, "GOTO_IF_TRUE", vec![param(Label)]);
    add_command(&mut builder, "GOTO_IF_FALSE", vec![param(Label)]);
    add_command(&mut builder, "GOSUB_FILE", vec![param(Label), param(Label)]);
    add_command(&mut builder, "LAUNCH_MISSION", vec![param(Label)]);
    add_command(&mut builder, "LOAD_AND_LAUNCH_MISSION", vec![param(Label)]);
    add_command(&mut builder, "RETURN", vec![]);
    add_command(&mut builder, "SCRIPT_NAME", vec![param(TextLabel)]);
    add_command(&mut builder, "PRINT_HELP", vec![param(TextLabel)]);
    add_command(
        &mut builder,
        "START_NEW_SCRIPT",
        vec![param(Label), param(InputOpt)],
    );
    add_command(&mut builder, "VAR_INT", vec![param(VarInt), param(VarIntOpt)]);
    add_command(
        &mut builder,
        "LVAR_INT",
        vec![param(LvarInt), param(LvarIntOpt)],
    );
    add_command(
        &mut builder,
        "VAR_FLOAT",
        vec![param(VarFloat), param(VarFloatOpt)],
    );
    add_command(
        &mut builder,
        "LVAR_FLOAT",
        vec![param(LvarFloat), param(LvarFloatOpt)],
    );
    add_command(
        &mut builder,
        "VAR_TEXT_LABEL",
        vec![param(VarTextLabel), param(VarTextLabelOpt)],
    );
    add_command(
        &mut builder,
        "LVAR_TEXT_LABEL",
        vec![param(LvarTextLabel), param(LvarTextLabelOpt)],
    );
    add_command(
        &mut builder,
        "GENERATE_RANDOM_FLOAT_IN_RANGE",
        vec![param(InputFloat), param(InputFloat), param(OutputFloat)],
    );
    add_command(
        &mut builder,
        "GENERATE_RANDOM_INT_IN_RANGE",
        vec![param(InputInt), param(InputInt), param(OutputInt)],
    );
    add_command(&mut builder, "SAVE_STRING_TO_DEBUG_FILE", vec![param(String)]);

    add_command(
        &mut builder,
        "CREATE_CHAR",
        vec![
            param_enum(InputInt, pedtype),
            param_enum(InputInt, defaultmodel),
            param(InputFloat),
            param(InputFloat),
            param(InputFloat),
            param_entity(OutputInt, char_),
        ],
    );

    add_command(
        &mut builder,
        "CREATE_CAR",
        vec![
            param_enum(InputInt, defaultmodel),
            param(InputFloat),
            param(InputFloat),
            param(InputFloat),
            param_entity(OutputInt, car),
        ],
    );

    add_command(
        &mut builder,
        "CREATE_OBJECT",
        vec![
            param_enum(InputInt, model),
            param(InputFloat),
            param(InputFloat),
            param(InputFloat),
            param_entity(OutputInt, object),
        ],
    );

    add_command(
        &mut builder,
        "DO_FADE",
        vec![param(InputInt), param_enum(InputInt, fade)],
    );

    add_command(
        &mut builder,
        "SET_CAR_HEADING",
        vec![param_entity(InputInt, car), param(InputFloat)],
    );
    add_command(
        &mut builder,
        "SET_CHAR_HEADING",
        vec![param_entity(InputInt, char_), param(InputFloat)],
    );

    add_command(&mut builder, "SET_VAR_INT", vec![param(VarInt), param(Int)]);
    add_command(&mut builder, "SET_VAR_FLOAT", vec![param(VarFloat), param(Float)]);
    add_command(&mut builder, "SET_LVAR_INT", vec![param(LvarInt), param(Int)]);
    add_command(&mut builder, "SET_LVAR_FLOAT", vec![param(LvarFloat), param(Float)]);
    add_command(
        &mut builder,
        "SET_VAR_INT_TO_VAR_INT",
        vec![param(VarInt), param(VarInt)],
    );
    add_command(
        &mut builder,
        "SET_LVAR_INT_TO_LVAR_INT",
        vec![param(LvarInt), param(LvarInt)],
    );
    add_command(
        &mut builder,
        "SET_VAR_FLOAT_TO_VAR_FLOAT",
        vec![param(VarFloat), param(VarFloat)],
    );
    add_command(
        &mut builder,
        "SET_LVAR_FLOAT_TO_LVAR_FLOAT",
        vec![param(LvarFloat), param(LvarFloat)],
    );
    add_command(
        &mut builder,
        "SET_VAR_FLOAT_TO_LVAR_FLOAT",
        vec![param(VarFloat), param(LvarFloat)],
    );
    add_command(
        &mut builder,
        "SET_LVAR_FLOAT_TO_VAR_FLOAT",
        vec![param(LvarFloat), param(VarFloat)],
    );
    add_command(
        &mut builder,
        "SET_VAR_INT_TO_LVAR_INT",
        vec![param(VarInt), param(LvarInt)],
    );
    add_command(
        &mut builder,
        "SET_LVAR_INT_TO_VAR_INT",
        vec![param(LvarInt), param(VarInt)],
    );
    add_command(
        &mut builder,
        "SET_VAR_INT_TO_CONSTANT",
        vec![param(VarInt), param(InputInt)],
    );
    add_command(
        &mut builder,
        "SET_LVAR_INT_TO_CONSTANT",
        vec![param(LvarInt), param(InputInt)],
    );
    add_command(
        &mut builder,
        "SET_VAR_TEXT_LABEL",
        vec![param(VarTextLabel), param(TextLabel)],
    );
    add_command(
        &mut builder,
        "SET_LVAR_TEXT_LABEL",
        vec![param(LvarTextLabel), param(TextLabel)],
    );

    add_command(&mut builder, "ABS_VAR_INT", vec![param(VarInt)]);
    add_command(&mut builder, "ABS_LVAR_INT", vec![param(LvarInt)]);
    add_command(&mut builder, "ABS_VAR_FLOAT", vec![param(VarFloat)]);
    add_command(&mut builder, "ABS_LVAR_FLOAT", vec![param(LvarFloat)]);

    add_command(&mut builder, "ADD_VAR_INT", vec![param(VarInt), param(Int)]);
    add_command(&mut builder, "ADD_LVAR_INT", vec![param(LvarInt), param(Int)]);

    add_alternator(
        &mut builder,
        "SET",
        &[
            "SET_VAR_INT",
            "SET_VAR_FLOAT",
            "SET_LVAR_INT",
            "SET_LVAR_FLOAT",
            "SET_VAR_INT_TO_VAR_INT",
            "SET_LVAR_INT_TO_LVAR_INT",
            "SET_VAR_FLOAT_TO_VAR_FLOAT",
            "SET_LVAR_FLOAT_TO_LVAR_FLOAT",
            "SET_VAR_FLOAT_TO_LVAR_FLOAT",
            "SET_LVAR_FLOAT_TO_VAR_FLOAT",
            "SET_VAR_INT_TO_LVAR_INT",
            "SET_LVAR_INT_TO_VAR_INT",
            "SET_VAR_INT_TO_CONSTANT",
            "SET_LVAR_INT_TO_CONSTANT",
            "SET_VAR_TEXT_LABEL",
            "SET_LVAR_TEXT_LABEL",
        ],
    );

    add_alternator(
        &mut builder,
        "ABS",
        &["ABS_VAR_INT", "ABS_LVAR_INT", "ABS_VAR_FLOAT", "ABS_LVAR_FLOAT"],
    );

    add_alternator(
        &mut builder,
        "ADD_THING_TO_THING",
        &["ADD_VAR_INT", "ADD_LVAR_INT"],
    );

    add_command(&mut builder, "FLASH_RADAR_BLIP", vec![param(InputInt)]);
    add_command(&mut builder, "COMMAND_WITHOUT_ID", vec![param(InputInt)]);

    set_command_id(&mut builder, "WAIT", Some(1), true);
    set_command_id(&mut builder, "GOTO", Some(2), true);
    set_command_id(&mut builder, "START_NEW_SCRIPT", Some(79), true);
    set_command_id(&mut builder, "RETURN", Some(81), true);
    set_command_id(&mut builder, "LAUNCH_MISSION", Some(215), true);
    set_command_id(&mut builder, "CREATE_OBJECT", Some(263), true);
    set_command_id(&mut builder, "SET_TIME_SCALE", Some(349), true);
    set_command_id(&mut builder, "DO_FADE", Some(362), true);
    set_command_id(&mut builder, "PRINT_HELP", Some(997), true);
    set_command_id(&mut builder, "SAVE_STRING_TO_DEBUG_FILE", Some(1462), true);
    set_command_id(&mut builder, "FLASH_RADAR_BLIP", Some(1000), false);
    set_command_id(&mut builder, "COMMAND_WITHOUT_ID", None, true);

    builder.build()
}
