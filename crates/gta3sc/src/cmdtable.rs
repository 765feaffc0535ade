//! The command table.
//!
//! An immutable registry of command definitions, alternators, enumerations,
//! string constants and entity types. It is populated externally (usually
//! from the game's command definition files) through [`CommandTableBuilder`]
//! and frozen by [`CommandTableBuilder::build`], after which it is only ever
//! read.
//!
//! Lookups expect uppercase names; clients normalise before querying.

use ahash::AHashMap;
use strum::{Display, EnumString, IntoStaticStr};

use crate::arena::Arena;

/// Identifies an enumeration of string constants.
///
/// The zero id is the global enumeration, which holds the globally visible
/// string constants such as `TRUE` and `FALSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EnumId(u16);

/// The enumeration of globally visible string constants.
pub const GLOBAL_ENUM: EnumId = EnumId(0);

impl EnumId {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        self.0
    }
}

/// Identifies an entity type.
///
/// The zero id means "no entity type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntityId(u16);

/// The entity type of parameters and variables not associated with any
/// kind of in-game entity.
pub const NO_ENTITY_TYPE: EntityId = EntityId(0);

impl EntityId {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        self.0
    }
}

/// Identifies a command definition in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(u32);

/// Identifies an alternator definition in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlternatorId(u32);

/// Identifies a string constant definition in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantId(u32);

/// The typing of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamType {
    Int,
    Float,

    VarInt,
    LvarInt,
    VarFloat,
    LvarFloat,
    VarTextLabel,
    LvarTextLabel,

    InputInt,
    InputFloat,
    OutputInt,
    OutputFloat,
    Label,
    TextLabel,
    String,

    VarIntOpt,
    LvarIntOpt,
    VarFloatOpt,
    LvarFloatOpt,
    VarTextLabelOpt,
    LvarTextLabelOpt,
    InputOpt,
}

/// A command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDef {
    /// The typing of the parameter.
    pub param_type: ParamType,
    /// The entity type associated with the parameter, if any.
    pub entity_type: EntityId,
    /// The enumeration associated with the parameter, if any.
    pub enum_type: EnumId,
}

impl ParamDef {
    #[must_use]
    pub fn new(param_type: ParamType) -> Self {
        Self {
            param_type,
            entity_type: NO_ENTITY_TYPE,
            enum_type: GLOBAL_ENUM,
        }
    }

    /// Whether this parameter may be repeated or omitted.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(
            self.param_type,
            ParamType::VarIntOpt
                | ParamType::LvarIntOpt
                | ParamType::VarFloatOpt
                | ParamType::LvarFloatOpt
                | ParamType::VarTextLabelOpt
                | ParamType::LvarTextLabelOpt
                | ParamType::InputOpt
        )
    }
}

/// A command definition.
#[derive(Debug, Clone)]
pub struct CommandDef {
    name: String,
    params: Vec<ParamDef>,
    target_id: Option<i16>,
    target_handled: bool,
}

impl CommandDef {
    /// The uppercase name of the command.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    /// The i-th parameter of the command.
    #[must_use]
    pub fn param(&self, i: usize) -> &ParamDef {
        &self.params[i]
    }

    /// The number of parameters, counting the optional tail.
    #[must_use]
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    /// The number of parameters that must be provided.
    #[must_use]
    pub fn num_min_params(&self) -> usize {
        self.num_params() - usize::from(self.has_optional_param())
    }

    /// Whether the last parameter is an optional tail.
    #[must_use]
    pub fn has_optional_param(&self) -> bool {
        self.params.last().is_some_and(ParamDef::is_optional)
    }

    /// The opcode of this command in the target script engine.
    #[must_use]
    pub fn target_id(&self) -> Option<i16> {
        self.target_id
    }

    /// Whether the target script engine handles this command.
    #[must_use]
    pub fn target_handled(&self) -> bool {
        self.target_handled
    }
}

/// A named set of overloaded command forms.
#[derive(Debug, Clone, Default)]
pub struct AlternatorDef {
    alternatives: Vec<CommandId>,
}

impl AlternatorDef {
    /// The alternative commands in declaration order.
    #[must_use]
    pub fn alternatives(&self) -> &[CommandId] {
        &self.alternatives
    }
}

/// A string constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDef {
    enum_id: EnumId,
    value: i32,
}

impl ConstantDef {
    /// The enumeration this constant belongs to.
    #[must_use]
    pub fn enum_id(&self) -> EnumId {
        self.enum_id
    }

    /// The integer value of the constant.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.value
    }
}

/// The frozen command registry. See the module docs.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: Arena<CommandDef>,
    commands_map: AHashMap<String, CommandId>,
    alternators: Arena<AlternatorDef>,
    alternators_map: AHashMap<String, AlternatorId>,
    enums_map: AHashMap<String, EnumId>,
    constants: Arena<ConstantDef>,
    /// Constant ids per name, kept in insertion order so the earliest
    /// insertion wins `find_constant_any_means`.
    constants_map: AHashMap<String, Vec<ConstantId>>,
    entities_map: AHashMap<String, EntityId>,
}

impl CommandTable {
    /// Finds the command with the given uppercase name.
    #[must_use]
    pub fn find_command(&self, name: &str) -> Option<CommandId> {
        self.commands_map.get(name).copied()
    }

    #[must_use]
    pub fn command(&self, id: CommandId) -> &CommandDef {
        self.commands.get(id.0)
    }

    /// Finds the alternator with the given uppercase name.
    #[must_use]
    pub fn find_alternator(&self, name: &str) -> Option<AlternatorId> {
        self.alternators_map.get(name).copied()
    }

    #[must_use]
    pub fn alternator(&self, id: AlternatorId) -> &AlternatorDef {
        self.alternators.get(id.0)
    }

    /// Finds the enumeration with the given uppercase name.
    #[must_use]
    pub fn find_enumeration(&self, name: &str) -> Option<EnumId> {
        self.enums_map.get(name).copied()
    }

    /// Finds a string constant of the given name in a given enumeration.
    #[must_use]
    pub fn find_constant(&self, enum_id: EnumId, name: &str) -> Option<ConstantId> {
        self.constants_map.get(name).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|id| self.constant(*id).enum_id == enum_id)
        })
    }

    /// Finds a string constant of the given name in any enumeration except
    /// the global one.
    ///
    /// When the name belongs to constants of several enumerations, the one
    /// inserted first during table construction takes precedence.
    #[must_use]
    pub fn find_constant_any_means(&self, name: &str) -> Option<ConstantId> {
        self.constants_map.get(name).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|id| self.constant(*id).enum_id != GLOBAL_ENUM)
        })
    }

    #[must_use]
    pub fn constant(&self, id: ConstantId) -> &ConstantDef {
        self.constants.get(id.0)
    }

    /// Finds the entity type with the given uppercase name.
    #[must_use]
    pub fn find_entity_type(&self, name: &str) -> Option<EntityId> {
        self.entities_map.get(name).copied()
    }
}

/// Builds a [`CommandTable`].
///
/// All insertion methods normalise names to uppercase.
#[derive(Debug, Default)]
pub struct CommandTableBuilder {
    table: CommandTable,
    next_enum_id: u16,
    next_entity_id: u16,
}

impl CommandTableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: CommandTable::default(),
            // Zero ids are reserved for the global enumeration and the
            // none entity type.
            next_enum_id: 1,
            next_entity_id: 1,
        }
    }

    /// Inserts a command, or returns the existing one of the same name.
    pub fn insert_command(&mut self, name: &str) -> (CommandId, bool) {
        let name = name.to_ascii_uppercase();
        if let Some(&id) = self.table.commands_map.get(&name) {
            return (id, false);
        }
        let id = CommandId(self.table.commands.alloc(CommandDef {
            name: name.clone(),
            params: Vec::new(),
            target_id: None,
            target_handled: false,
        }));
        self.table.commands_map.insert(name, id);
        (id, true)
    }

    /// Replaces the parameters of a command.
    pub fn set_command_params(&mut self, command: CommandId, params: impl Into<Vec<ParamDef>>) {
        self.table.commands.get_mut(command.0).params = params.into();
    }

    /// Sets the target opcode of a command and whether the target engine
    /// handles it.
    pub fn set_command_id(
        &mut self,
        command: CommandId,
        target_id: Option<i16>,
        target_handled: bool,
    ) {
        let def = self.table.commands.get_mut(command.0);
        def.target_id = target_id;
        def.target_handled = target_handled;
    }

    /// Inserts an alternator, or returns the existing one of the same name.
    pub fn insert_alternator(&mut self, name: &str) -> (AlternatorId, bool) {
        let name = name.to_ascii_uppercase();
        if let Some(&id) = self.table.alternators_map.get(&name) {
            return (id, false);
        }
        let id = AlternatorId(self.table.alternators.alloc(AlternatorDef::default()));
        self.table.alternators_map.insert(name, id);
        (id, true)
    }

    /// Appends a command alternative to an alternator.
    pub fn insert_alternative(&mut self, alternator: AlternatorId, command: CommandId) {
        self.table
            .alternators
            .get_mut(alternator.0)
            .alternatives
            .push(command);
    }

    /// Inserts an enumeration, or returns the existing one of the same name.
    pub fn insert_enumeration(&mut self, name: &str) -> (EnumId, bool) {
        let name = name.to_ascii_uppercase();
        if let Some(&id) = self.table.enums_map.get(&name) {
            return (id, false);
        }
        let id = EnumId(self.next_enum_id);
        self.next_enum_id += 1;
        self.table.enums_map.insert(name, id);
        (id, true)
    }

    /// Inserts a string constant into an enumeration, or reassigns the value
    /// of an existing constant of that name in the same enumeration.
    pub fn insert_or_assign_constant(
        &mut self,
        enum_id: EnumId,
        name: &str,
        value: i32,
    ) -> (ConstantId, bool) {
        let name = name.to_ascii_uppercase();
        let ids = self.table.constants_map.entry(name).or_default();
        for &id in ids.iter() {
            if self.table.constants.get(id.0).enum_id == enum_id {
                self.table.constants.get_mut(id.0).value = value;
                return (id, false);
            }
        }
        let id = ConstantId(self.table.constants.alloc(ConstantDef { enum_id, value }));
        ids.push(id);
        (id, true)
    }

    /// Inserts an entity type, or returns the existing one of the same name.
    pub fn insert_entity_type(&mut self, name: &str) -> (EntityId, bool) {
        let name = name.to_ascii_uppercase();
        if let Some(&id) = self.table.entities_map.get(&name) {
            return (id, false);
        }
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        self.table.entities_map.insert(name, id);
        (id, true)
    }

    #[must_use]
    pub fn find_command(&self, name: &str) -> Option<CommandId> {
        self.table.find_command(name)
    }

    #[must_use]
    pub fn find_alternator(&self, name: &str) -> Option<AlternatorId> {
        self.table.find_alternator(name)
    }

    #[must_use]
    pub fn find_enumeration(&self, name: &str) -> Option<EnumId> {
        self.table.find_enumeration(name)
    }

    #[must_use]
    pub fn find_constant(&self, enum_id: EnumId, name: &str) -> Option<ConstantId> {
        self.table.find_constant(enum_id, name)
    }

    #[must_use]
    pub fn find_entity_type(&self, name: &str) -> Option<EntityId> {
        self.table.find_entity_type(name)
    }

    /// Freezes the table.
    #[must_use]
    pub fn build(self) -> CommandTable {
        self.table
    }
}
