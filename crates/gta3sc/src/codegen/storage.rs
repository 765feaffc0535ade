//! The storage table.
//!
//! Assigns each variable a storage index within its scope. Global variables
//! and every local scope have independent index spaces; at most one local
//! script is live at a time in the target engine, so local scopes may
//! overlap freely.
//!
//! Integers and floats take one index per element, text labels take two.
//! Arrays multiply by their dimension. Timer variables are pinned to fixed
//! indices, which other variables skip over.

use crate::symtable::{ScopeId, SymbolTable, VarType, Variable, GLOBAL_SCOPE};

/// Pins a variable of the given name to a fixed storage index.
///
/// An entry without a name only reserves the index.
#[derive(Debug, Clone, Default)]
pub struct TimerOptions {
    pub index: u32,
    pub name: String,
}

/// Configures storage allocation for a single scope.
#[derive(Debug, Clone, Default)]
pub struct LocalStorageOptions {
    pub first_storage_index: u32,
    pub max_storage_index: u32,
    pub timers: [Option<TimerOptions>; 2],
}

/// Configures storage allocation for the whole symbol table.
///
/// Defaults mirror the trilogy target: global variables live in indices
/// 2..=16383, locals in 0..=17 with the timers pinned to 16 and 17.
#[derive(Debug, Clone)]
pub struct StorageOptions {
    pub first_var_storage_index: u32,
    pub max_var_storage_index: u32,
    pub first_lvar_storage_index: u32,
    pub max_lvar_storage_index: u32,
    pub timers: [Option<TimerOptions>; 2],
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            first_var_storage_index: 2,
            max_var_storage_index: 16383,
            first_lvar_storage_index: 0,
            max_lvar_storage_index: 17,
            timers: [
                Some(TimerOptions {
                    index: 16,
                    name: "TIMERA".to_owned(),
                }),
                Some(TimerOptions {
                    index: 17,
                    name: "TIMERB".to_owned(),
                }),
            ],
        }
    }
}

/// Storage indices for the variables of one scope.
#[derive(Debug, Clone, Default)]
pub struct LocalStorageTable {
    /// Index per variable, keyed by the variable's id within its scope.
    indices: Vec<u32>,
}

impl LocalStorageTable {
    /// Assigns indices to every variable of `scope_id`.
    ///
    /// Returns `None` when a variable would end past the maximum index.
    #[must_use]
    pub fn from_symbols(
        symtable: &SymbolTable,
        scope_id: ScopeId,
        options: &LocalStorageOptions,
    ) -> Option<Self> {
        let timers: Vec<&TimerOptions> = options.timers.iter().flatten().collect();

        let mut indices = Vec::with_capacity(symtable.scope_len(scope_id));
        let mut cursor = options.first_storage_index;

        for var in symtable.scope_vars(scope_id) {
            if let Some(timer) = timers.iter().find(|timer| timer.name == var.name()) {
                indices.push(timer.index);
                continue;
            }

            let width = Self::storage_width(var);

            // Skip over any index reserved for a timer.
            loop {
                let conflict = timers
                    .iter()
                    .find(|timer| timer.index >= cursor && timer.index < cursor + width);
                match conflict {
                    Some(timer) => cursor = timer.index + 1,
                    None => break,
                }
            }

            if cursor + width - 1 > options.max_storage_index {
                return None;
            }

            indices.push(cursor);
            cursor += width;
        }

        Some(Self { indices })
    }

    /// Indices of storage a variable of this type and dimension occupies.
    fn storage_width(var: &Variable) -> u32 {
        let element = match var.var_type() {
            VarType::Int | VarType::Float => 1,
            VarType::TextLabel => 2,
        };
        element * u32::from(var.dimensions().unwrap_or(1))
    }

    /// The storage index of a variable of this scope.
    #[must_use]
    pub fn var_index(&self, var: &Variable) -> u32 {
        self.indices[var.id() as usize]
    }
}

/// Storage indices for every scope of a symbol table.
#[derive(Debug, Clone, Default)]
pub struct StorageTable {
    scopes: Vec<LocalStorageTable>,
}

impl StorageTable {
    /// Assigns storage across the global scope and every local scope.
    ///
    /// Returns `None` when any scope exceeds its maximum index.
    #[must_use]
    pub fn from_symbols(symtable: &SymbolTable, options: &StorageOptions) -> Option<Self> {
        let global_options = LocalStorageOptions {
            first_storage_index: options.first_var_storage_index,
            max_storage_index: options.max_var_storage_index,
            timers: [None, None],
        };

        let local_options = LocalStorageOptions {
            first_storage_index: options.first_lvar_storage_index,
            max_storage_index: options.max_lvar_storage_index,
            timers: options.timers.clone(),
        };

        let mut scopes = Vec::with_capacity(symtable.num_scopes() as usize);

        for i in 0..symtable.num_scopes() {
            let scope_id = ScopeId::from_u32(i);
            let scope_options = if scope_id == GLOBAL_SCOPE {
                &global_options
            } else {
                &local_options
            };
            scopes.push(LocalStorageTable::from_symbols(
                symtable,
                scope_id,
                scope_options,
            )?);
        }

        Some(Self { scopes })
    }

    /// The storage index of any variable of the symbol table.
    #[must_use]
    pub fn var_index(&self, var: &Variable) -> u32 {
        self.scopes[var.scope().to_u32() as usize].var_index(var)
    }
}
