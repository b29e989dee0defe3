//! The output of compilation: one linear code stream plus its tables.

use super::{Constant, ConstantPool};

/// Bytecode format version written into cache entries.
pub const BYTECODE_VERSION: u32 = 3;

/// Name of the procedure record for the main program region.
pub const MAIN_PROCEDURE: &str = "<main>";

/// Compiled metadata for one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRecord {
    pub name: String,
    /// Offset of the first instruction in the unit's code.
    pub entry: u32,
    pub local_count: u16,
    pub upvalue_count: u8,
    pub arity: u8,
}

/// A compiled unit ready to execute or cache.
#[derive(Debug, Clone, Default)]
pub struct CompiledUnit {
    pub version: u32,
    pub code: Vec<u8>,
    /// Source line for every byte of `code`.
    pub lines: Vec<u32>,
    pub constants: ConstantPool,
    /// Procedure 0 is always the main program region.
    pub procedures: Vec<ProcedureRecord>,
}

impl CompiledUnit {
    pub fn procedure(&self, name: &str) -> Option<(usize, &ProcedureRecord)> {
        self.procedures
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
    }

    pub fn main(&self) -> Option<&ProcedureRecord> {
        self.procedures.first()
    }

    pub fn constant(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index)
    }

    pub fn line_at(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_lookup_by_name() {
        let unit = CompiledUnit {
            version: BYTECODE_VERSION,
            procedures: vec![
                ProcedureRecord {
                    name: MAIN_PROCEDURE.into(),
                    entry: 0,
                    local_count: 0,
                    upvalue_count: 0,
                    arity: 0,
                },
                ProcedureRecord {
                    name: "work".into(),
                    entry: 12,
                    local_count: 2,
                    upvalue_count: 0,
                    arity: 1,
                },
            ],
            ..CompiledUnit::default()
        };
        let (idx, record) = unit.procedure("work").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(record.entry, 12);
        assert_eq!(unit.main().unwrap().name, MAIN_PROCEDURE);
        assert_eq!(unit.line_at(99), 0);
    }
}
