//! Constant pool for a compiled unit.
//!
//! Literals, procedure names and builtin names are stored once per unit
//! and referenced by index from the code stream.

use std::fmt;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Nil,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
}

impl Constant {
    /// Tag byte used by the binary format.
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Nil => 0,
            Constant::Bool(_) => 1,
            Constant::Int(_) => 2,
            Constant::Real(_) => 3,
            Constant::Str(_) => 4,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Nil => f.write_str("nil"),
            Constant::Bool(b) => write!(f, "{b}"),
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Real(r) => write!(f, "{r:?}"),
            Constant::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Hashable mirror of [`Constant`]; reals hash by total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Nil,
    Bool(bool),
    Int(i64),
    Real(OrderedFloat<f64>),
    Str(String),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Nil => ConstantKey::Nil,
            Constant::Bool(b) => ConstantKey::Bool(*b),
            Constant::Int(i) => ConstantKey::Int(*i),
            Constant::Real(r) => ConstantKey::Real(OrderedFloat(*r)),
            Constant::Str(s) => ConstantKey::Str(s.clone()),
        }
    }
}

/// Unit-level constant pool, deduplicated by (type, value).
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: FxHashMap<ConstantKey, u32>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pool (with its dedup index) from decoded constants.
    pub fn from_constants(constants: Vec<Constant>) -> Self {
        let mut pool = Self::new();
        for constant in constants {
            let key = ConstantKey::from(&constant);
            let idx = pool.constants.len() as u32;
            pool.constants.push(constant);
            pool.index.entry(key).or_insert(idx);
        }
        pool
    }

    /// Add or find a constant and return its index.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = ConstantKey::from(&constant);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, idx);
        idx
    }

    pub fn add_int(&mut self, value: i64) -> u32 {
        self.add(Constant::Int(value))
    }

    pub fn add_string(&mut self, value: &str) -> u32 {
        self.add(Constant::Str(value.to_string()))
    }

    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_by_type_and_value() {
        let mut pool = ConstantPool::new();
        let a = pool.add_int(100);
        let b = pool.add_int(200);
        let c = pool.add_int(100);
        assert_eq!((a, b, c), (0, 1, 0));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn same_value_different_type_is_distinct() {
        let mut pool = ConstantPool::new();
        let int = pool.add_int(1);
        let real = pool.add(Constant::Real(1.0));
        let text = pool.add_string("1");
        assert_eq!(pool.len(), 3);
        assert_ne!(int, real);
        assert_ne!(real, text);
    }

    #[test]
    fn reals_dedupe_by_bits() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add(Constant::Real(2.5)), pool.add(Constant::Real(2.5)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn from_constants_rebuilds_index() {
        let mut pool =
            ConstantPool::from_constants(vec![Constant::Str("a".into()), Constant::Int(4)]);
        assert_eq!(pool.add_int(4), 1);
        assert_eq!(pool.add_string("b"), 2);
    }

    #[test]
    fn out_of_bounds_is_none() {
        let pool = ConstantPool::new();
        assert_eq!(pool.get(0), None);
    }

    #[test]
    fn display_quotes_strings() {
        assert_eq!(Constant::Str("hi".into()).to_string(), "\"hi\"");
        assert_eq!(Constant::Real(1.0).to_string(), "1.0");
    }
}
