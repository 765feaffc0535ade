//! The back-end: storage assignment, bytecode emission and relocation.

pub use codegen::CodeGen;
pub use emitter::CodeEmitter;
pub use reloc::RelocationTable;
pub use storage::{LocalStorageOptions, LocalStorageTable, StorageOptions, StorageTable, TimerOptions};

pub mod codegen;
pub mod emitter;
pub mod reloc;
pub mod storage;
