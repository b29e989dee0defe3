//! Binary layout of a compiled unit.
//!
//! All integers are little-endian:
//!
//! ```text
//! [magic:u32][version:u32][code_len:i32][const_count:i32]
//! [code bytes][line map: code_len x i32]
//! [constants: tag:u8 + payload]
//!     0 nil | 1 bool u8 | 2 int i64 | 3 real f64 bits | 4 str len:i32 + utf8
//! [procedure_count:i32]
//! [per procedure: name_len:i32 name entry:i32 local_count:u16 upvalue_count:u8 arity:u8]
//! [symbol_count:i32 = 0][type_count:i32 = 0]
//! ```
//!
//! The same layout is used for cache entries and standalone bytecode files.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use trellis_compiler::bytecode::{
    BYTECODE_VERSION, CompiledUnit, Constant, ConstantPool, ProcedureRecord,
};
use trellis_core::CacheError;

/// "TRLS"
pub const MAGIC: u32 = 0x5452_4C53;

// ============================================================================
// Writing
// ============================================================================

fn wr_i32<W: Write>(w: &mut W, what: &'static str, v: usize) -> io::Result<()> {
    let v = i32::try_from(v).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("{what} does not fit in i32"))
    })?;
    w.write_all(&v.to_le_bytes())
}

fn wr_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    wr_i32(w, "string length", s.len())?;
    w.write_all(s.as_bytes())
}

fn write_constant<W: Write>(w: &mut W, constant: &Constant) -> io::Result<()> {
    w.write_all(&[constant.tag()])?;
    match constant {
        Constant::Nil => Ok(()),
        Constant::Bool(b) => w.write_all(&[u8::from(*b)]),
        Constant::Int(i) => w.write_all(&i.to_le_bytes()),
        Constant::Real(r) => w.write_all(&r.to_bits().to_le_bytes()),
        Constant::Str(s) => wr_str(w, s),
    }
}

/// Serialize `unit` into `w`.
pub fn write_to<W: Write>(unit: &CompiledUnit, w: &mut W) -> io::Result<()> {
    w.write_all(&MAGIC.to_le_bytes())?;
    w.write_all(&unit.version.to_le_bytes())?;
    wr_i32(w, "code length", unit.code.len())?;
    wr_i32(w, "constant count", unit.constants.len())?;
    w.write_all(&unit.code)?;
    for i in 0..unit.code.len() {
        let line = unit.lines.get(i).copied().unwrap_or(0);
        wr_i32(w, "line number", line as usize)?;
    }
    for constant in unit.constants.constants() {
        write_constant(w, constant)?;
    }
    wr_i32(w, "procedure count", unit.procedures.len())?;
    for proc in &unit.procedures {
        wr_str(w, &proc.name)?;
        wr_i32(w, "procedure entry", proc.entry as usize)?;
        w.write_all(&proc.local_count.to_le_bytes())?;
        w.write_all(&[proc.upvalue_count, proc.arity])?;
    }
    // Symbol and type tables are reserved and always empty.
    wr_i32(w, "symbol count", 0)?;
    wr_i32(w, "type count", 0)
}

/// Serialize `unit` into a fresh buffer. Fails only for tables too large
/// for their 32-bit length fields.
pub fn encode(unit: &CompiledUnit) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(16 + unit.code.len() * 5);
    write_to(unit, &mut out)?;
    Ok(out)
}

// ============================================================================
// Reading
// ============================================================================

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], CacheError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            return Err(CacheError::Truncated { what });
        };
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], CacheError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, CacheError> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, CacheError> {
        Ok(u16::from_le_bytes(self.array(what)?))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, CacheError> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn i64(&mut self, what: &'static str) -> Result<i64, CacheError> {
        Ok(i64::from_le_bytes(self.array(what)?))
    }

    /// A non-negative i32 count or length.
    fn len(&mut self, what: &'static str) -> Result<usize, CacheError> {
        let raw = i32::from_le_bytes(self.array(what)?);
        usize::try_from(raw).map_err(|_| CacheError::Malformed(format!("negative {what}: {raw}")))
    }

    fn string(&mut self, what: &'static str) -> Result<String, CacheError> {
        let len = self.len(what)?;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CacheError::Malformed(format!("{what} is not valid utf-8")))
    }

    fn constant(&mut self) -> Result<Constant, CacheError> {
        Ok(match self.u8("constant tag")? {
            0 => Constant::Nil,
            1 => Constant::Bool(self.u8("bool constant")? != 0),
            2 => Constant::Int(self.i64("int constant")?),
            3 => Constant::Real(f64::from_bits(self.i64("real constant")? as u64)),
            4 => Constant::Str(self.string("string constant")?),
            tag => return Err(CacheError::InvalidTag { tag }),
        })
    }
}

/// Parse just the header, returning the recorded version.
pub fn read_version(bytes: &[u8]) -> Result<u32, CacheError> {
    let mut r = Reader { bytes, pos: 0 };
    let magic = r.u32("magic")?;
    if magic != MAGIC {
        return Err(CacheError::BadMagic { found: magic });
    }
    r.u32("version")
}

/// Parse a complete unit. Any version other than [`BYTECODE_VERSION`] is
/// rejected.
pub fn decode(bytes: &[u8]) -> Result<CompiledUnit, CacheError> {
    let version = read_version(bytes)?;
    if version > BYTECODE_VERSION {
        return Err(CacheError::UnsupportedVersion {
            found: version,
            supported: BYTECODE_VERSION,
        });
    }
    if version < BYTECODE_VERSION {
        return Err(CacheError::Malformed(format!("stale bytecode version {version}")));
    }

    let mut r = Reader { bytes, pos: 8 };
    let code_len = r.len("code length")?;
    let const_count = r.len("constant count")?;
    let code = r.take(code_len, "code")?.to_vec();

    let mut lines = Vec::with_capacity(code_len);
    for _ in 0..code_len {
        lines.push(r.len("line map")? as u32);
    }

    let mut constants = Vec::with_capacity(const_count.min(bytes.len()));
    for _ in 0..const_count {
        constants.push(r.constant()?);
    }

    let proc_count = r.len("procedure count")?;
    let mut procedures = Vec::with_capacity(proc_count.min(bytes.len()));
    for _ in 0..proc_count {
        let name = r.string("procedure name")?;
        let entry = r.len("procedure entry")?;
        if entry > code_len {
            return Err(CacheError::Malformed(format!(
                "procedure '{name}' enters at {entry}, past the end of code"
            )));
        }
        procedures.push(ProcedureRecord {
            name,
            entry: entry as u32,
            local_count: r.u16("local count")?,
            upvalue_count: r.u8("upvalue count")?,
            arity: r.u8("arity")?,
        });
    }
    if procedures.is_empty() {
        return Err(CacheError::Malformed("missing main procedure".into()));
    }

    let symbols = r.len("symbol count")?;
    let types = r.len("type count")?;
    if symbols != 0 || types != 0 {
        return Err(CacheError::Malformed(format!(
            "unexpected symbol/type tables ({symbols}, {types})"
        )));
    }

    Ok(CompiledUnit {
        version,
        code,
        lines,
        constants: ConstantPool::from_constants(constants),
        procedures,
    })
}

// ============================================================================
// Standalone bytecode files
// ============================================================================

pub fn write_file(path: &Path, unit: &CompiledUnit) -> Result<(), CacheError> {
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    write_to(unit, &mut file)?;
    file.flush()?;
    Ok(())
}

pub fn read_file(path: &Path) -> Result<CompiledUnit, CacheError> {
    decode(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_compiler::bytecode::{MAIN_PROCEDURE, OpCode};

    fn sample() -> CompiledUnit {
        let mut constants = ConstantPool::new();
        constants.add(Constant::Nil);
        constants.add(Constant::Bool(true));
        constants.add_int(-7);
        constants.add(Constant::Real(2.5));
        constants.add_string("héllo");
        CompiledUnit {
            version: BYTECODE_VERSION,
            code: vec![OpCode::PushNil as u8, OpCode::Halt as u8],
            lines: vec![1, 2],
            constants,
            procedures: vec![
                ProcedureRecord {
                    name: MAIN_PROCEDURE.into(),
                    entry: 0,
                    local_count: 3,
                    upvalue_count: 0,
                    arity: 0,
                },
                ProcedureRecord {
                    name: "outer.inner".into(),
                    entry: 1,
                    local_count: 1,
                    upvalue_count: 2,
                    arity: 1,
                },
            ],
        }
    }

    #[test]
    fn header_is_little_endian_magic_then_version() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(&bytes[..4], &[0x53, 0x4C, 0x52, 0x54]);
        assert_eq!(read_version(&bytes).unwrap(), BYTECODE_VERSION);
        // Trailing symbol and type counts.
        assert_eq!(&bytes[bytes.len() - 8..], &[0u8; 8]);
    }

    #[test]
    fn decoded_unit_matches_original() {
        let unit = sample();
        let decoded = decode(&encode(&unit).unwrap()).unwrap();
        assert_eq!(decoded.code, unit.code);
        assert_eq!(decoded.lines, unit.lines);
        assert_eq!(decoded.constants.constants(), unit.constants.constants());
        assert_eq!(decoded.procedures, unit.procedures);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[0] = 0;
        assert!(matches!(decode(&bytes), Err(CacheError::BadMagic { .. })));
    }

    #[test]
    fn newer_version_is_unsupported() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[4..8].copy_from_slice(&(BYTECODE_VERSION + 1).to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(CacheError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn truncation_is_reported() {
        let bytes = encode(&sample()).unwrap();
        let err = decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, CacheError::Truncated { .. }));
    }

    #[test]
    fn unknown_constant_tag_is_rejected() {
        let unit = sample();
        let mut bytes = encode(&unit).unwrap();
        // First constant tag follows the header, code and line map.
        let tag_at = 16 + unit.code.len() * 5;
        bytes[tag_at] = 9;
        assert!(matches!(decode(&bytes), Err(CacheError::InvalidTag { tag: 9 })));
    }

    #[test]
    fn writer_failures_propagate() {
        struct Full(usize);
        impl Write for Full {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                if self.0 < buf.len() {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "full"));
                }
                self.0 -= buf.len();
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let unit = sample();
        let err = write_to(&unit, &mut Full(20)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(encode(&unit).unwrap().len(), {
            let mut out = Vec::new();
            write_to(&unit, &mut out).unwrap();
            out.len()
        });
    }

    #[test]
    fn standalone_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.tbc");
        write_file(&path, &sample()).unwrap();
        let unit = read_file(&path).unwrap();
        assert_eq!(unit.procedures[1].name, "outer.inner");
    }
}
