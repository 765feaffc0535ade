//! The symbol table.
//!
//! Shelters the namespaces discovered during semantic analysis: labels,
//! variables (grouped into scopes), used objects and script files. Names
//! within a namespace are unique; insertion reports whether it took place.
//!
//! Variables live in numbered scopes. The global scope always exists and is
//! scope zero; [`SymbolTable::new_scope`] yields successive ids in the order
//! lexical scopes appear in the source.

use ahash::AHashMap;
use strum::{Display, IntoStaticStr};

use crate::arena::Arena;
use crate::sourceman::SourceRange;

/// The order a symbol was inserted into its namespace.
pub type SymbolId = u32;

/// Identifies a variable scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScopeId(u32);

/// The scope of global variables.
pub const GLOBAL_SCOPE: ScopeId = ScopeId(0);

impl ScopeId {
    #[must_use]
    pub fn from_u32(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn to_u32(self) -> u32 {
        self.0
    }

    /// The scope that follows this one in source order.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Identifies a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(u32);

/// Identifies a used object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsedObjectId(u32);

impl UsedObjectId {
    #[must_use]
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// Identifies a script file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u32);

/// Identifies a variable by its scope and position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId {
    scope: ScopeId,
    id: SymbolId,
}

impl VarId {
    #[must_use]
    pub fn scope(self) -> ScopeId {
        self.scope
    }

    /// The order the variable was inserted into its scope.
    #[must_use]
    pub fn id(self) -> SymbolId {
        self.id
    }
}

/// The type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VarType {
    Int,
    Float,
    TextLabel,
}

/// The kind of a script file within the final multifile image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FileType {
    Main,
    MainExtension,
    Subscript,
    Mission,
}

/// A declared label.
#[derive(Debug, Clone)]
pub struct Label {
    name: String,
    source: SourceRange,
    id: SymbolId,
    scope: ScopeId,
}

impl Label {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> SourceRange {
        self.source
    }

    /// The order the label was inserted into the table.
    #[must_use]
    pub fn id(&self) -> SymbolId {
        self.id
    }

    /// The scope the label is declared in.
    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

/// A declared variable.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    source: SourceRange,
    id: SymbolId,
    scope: ScopeId,
    var_type: VarType,
    dimensions: Option<u16>,
}

impl Variable {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> SourceRange {
        self.source
    }

    /// The order the variable was inserted into its scope.
    #[must_use]
    pub fn id(&self) -> SymbolId {
        self.id
    }

    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    #[must_use]
    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.dimensions.is_some()
    }

    /// The array dimension, or `None` for non-arrays.
    #[must_use]
    pub fn dimensions(&self) -> Option<u16> {
        self.dimensions
    }

    /// Key to reference this variable from IR.
    #[must_use]
    pub fn var_id(&self) -> VarId {
        VarId {
            scope: self.scope,
            id: self.id,
        }
    }
}

/// A model name referenced by the program.
#[derive(Debug, Clone)]
pub struct UsedObject {
    name: String,
    source: SourceRange,
    id: SymbolId,
}

impl UsedObject {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The location the object was first referenced.
    #[must_use]
    pub fn source(&self) -> SourceRange {
        self.source
    }

    #[must_use]
    pub fn id(&self) -> SymbolId {
        self.id
    }
}

/// A script file taking part in the compilation.
#[derive(Debug, Clone)]
pub struct File {
    name: String,
    source: SourceRange,
    id: SymbolId,
    file_type: FileType,
}

impl File {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> SourceRange {
        self.source
    }

    #[must_use]
    pub fn id(&self) -> SymbolId {
        self.id
    }

    #[must_use]
    pub fn file_type(&self) -> FileType {
        self.file_type
    }
}

#[derive(Debug, Default)]
struct Scope {
    vars: Arena<Variable>,
    map: AHashMap<String, SymbolId>,
}

/// The mutable symbol repository. See the module docs.
#[derive(Debug)]
pub struct SymbolTable {
    labels: Arena<Label>,
    labels_map: AHashMap<String, LabelId>,
    used_objects: Arena<UsedObject>,
    used_objects_map: AHashMap<String, UsedObjectId>,
    files: Arena<File>,
    files_map: AHashMap<String, FileId>,
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            labels: Arena::new(),
            labels_map: AHashMap::new(),
            used_objects: Arena::new(),
            used_objects_map: AHashMap::new(),
            files: Arena::new(),
            files_map: AHashMap::new(),
            scopes: vec![Scope::default()],
        }
    }

    /// The number of variable scopes, counting the global scope.
    #[must_use]
    pub fn num_scopes(&self) -> u32 {
        self.scopes.len().try_into().expect("too many scopes")
    }

    /// Creates a new local scope.
    ///
    /// Successive calls yield successive scope ids.
    pub fn new_scope(&mut self) -> ScopeId {
        self.scopes.push(Scope::default());
        ScopeId(self.num_scopes() - 1)
    }

    /// Finds a variable in a given scope.
    #[must_use]
    pub fn lookup_var(&self, name: &str, scope_id: ScopeId) -> Option<VarId> {
        let scope = self.scopes.get(scope_id.0 as usize)?;
        scope.map.get(name).map(|&id| VarId {
            scope: scope_id,
            id,
        })
    }

    #[must_use]
    pub fn variable(&self, var_id: VarId) -> &Variable {
        self.scopes[var_id.scope.0 as usize].vars.get(var_id.id)
    }

    /// Finds a label by name.
    #[must_use]
    pub fn lookup_label(&self, name: &str) -> Option<LabelId> {
        self.labels_map.get(name).copied()
    }

    #[must_use]
    pub fn label(&self, id: LabelId) -> &Label {
        self.labels.get(id.0)
    }

    /// Finds a used object by name.
    #[must_use]
    pub fn lookup_used_object(&self, name: &str) -> Option<UsedObjectId> {
        self.used_objects_map.get(name).copied()
    }

    #[must_use]
    pub fn used_object(&self, id: UsedObjectId) -> &UsedObject {
        self.used_objects.get(id.0)
    }

    /// Finds a script file by name.
    #[must_use]
    pub fn lookup_file(&self, name: &str) -> Option<FileId> {
        self.files_map.get(name).copied()
    }

    #[must_use]
    pub fn file(&self, id: FileId) -> &File {
        self.files.get(id.0)
    }

    /// Inserts a variable into a scope.
    ///
    /// No insertion takes place if the name already exists in the scope.
    pub fn insert_var(
        &mut self,
        name: &str,
        scope_id: ScopeId,
        var_type: VarType,
        dimensions: Option<u16>,
        source: SourceRange,
    ) -> (VarId, bool) {
        if let Some(existing) = self.lookup_var(name, scope_id) {
            return (existing, false);
        }
        let scope = &mut self.scopes[scope_id.0 as usize];
        let id = scope.vars.len().try_into().expect("too many variables");
        scope.vars.alloc(Variable {
            name: name.to_owned(),
            source,
            id,
            scope: scope_id,
            var_type,
            dimensions,
        });
        scope.map.insert(name.to_owned(), id);
        (
            VarId {
                scope: scope_id,
                id,
            },
            true,
        )
    }

    /// Inserts a label.
    ///
    /// No insertion takes place if a label of the same name exists.
    pub fn insert_label(
        &mut self,
        name: &str,
        scope_id: ScopeId,
        source: SourceRange,
    ) -> (LabelId, bool) {
        if let Some(existing) = self.lookup_label(name) {
            return (existing, false);
        }
        let id = self.labels.len().try_into().expect("too many labels");
        let label_id = LabelId(self.labels.alloc(Label {
            name: name.to_owned(),
            source,
            id,
            scope: scope_id,
        }));
        self.labels_map.insert(name.to_owned(), label_id);
        (label_id, true)
    }

    /// Inserts a used object.
    ///
    /// No insertion takes place if an object of the same name exists.
    pub fn insert_used_object(&mut self, name: &str, source: SourceRange) -> (UsedObjectId, bool) {
        if let Some(existing) = self.lookup_used_object(name) {
            return (existing, false);
        }
        let id = self
            .used_objects
            .len()
            .try_into()
            .expect("too many used objects");
        let uobj_id = UsedObjectId(self.used_objects.alloc(UsedObject {
            name: name.to_owned(),
            source,
            id,
        }));
        self.used_objects_map.insert(name.to_owned(), uobj_id);
        (uobj_id, true)
    }

    /// Inserts a script file.
    ///
    /// No insertion takes place if a file of the same name exists.
    pub fn insert_file(
        &mut self,
        name: &str,
        file_type: FileType,
        source: SourceRange,
    ) -> (FileId, bool) {
        if let Some(existing) = self.lookup_file(name) {
            return (existing, false);
        }
        let id = self.files.len().try_into().expect("too many files");
        let file_id = FileId(self.files.alloc(File {
            name: name.to_owned(),
            source,
            id,
            file_type,
        }));
        self.files_map.insert(name.to_owned(), file_id);
        (file_id, true)
    }

    /// Iterates the variables of a scope in declaration order.
    pub fn scope_vars(&self, scope_id: ScopeId) -> impl Iterator<Item = &Variable> {
        self.scopes[scope_id.0 as usize].vars.iter()
    }

    /// The number of variables declared in a scope.
    #[must_use]
    pub fn scope_len(&self, scope_id: ScopeId) -> usize {
        self.scopes[scope_id.0 as usize].vars.len()
    }

    /// Iterates all labels in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    /// Iterates all used objects in declaration order.
    pub fn used_objects(&self) -> impl Iterator<Item = &UsedObject> {
        self.used_objects.iter()
    }

    /// Iterates all files in declaration order.
    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.iter()
    }
}
