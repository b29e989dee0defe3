//! Runtime values shared by the VM, the builtin registry and native functions.
//!
//! Values are cheap to clone: strings, arrays and closures are reference
//! counted, so copying a value onto the operand stack never copies payload.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A captured binding, shared by the frame that declared it and every
/// closure over it.
///
/// Cells are reference counted: one is freed when the last frame slot or
/// closure holding it goes away. Reads and writes each take the lock once,
/// so a read-modify-write from several workers needs a program mutex.
#[derive(Debug, Clone, Default)]
pub struct SharedCell(Arc<RwLock<Value>>);

impl SharedCell {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn get(&self) -> Value {
        self.0.read().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.write() = value;
    }

    /// Whether both handles name the same binding.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for SharedCell {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// A function value: a procedure plus the cells it captured.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    /// Index into the unit's procedure table.
    pub procedure: u32,
    /// Procedure name, kept for diagnostics.
    pub name: Arc<str>,
    /// Captured cells, in upvalue-index order.
    pub upvalues: Box<[SharedCell]>,
}

impl Closure {
    pub fn new(procedure: u32, name: Arc<str>, upvalues: Box<[SharedCell]>) -> Self {
        Self {
            procedure,
            name,
            upvalues,
        }
    }
}

/// A dynamically typed VM value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(Arc<str>),
    Array(Arc<Vec<Value>>),
    Function(Arc<Closure>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    /// Name of the value's type, as used in runtime error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
        }
    }

    /// Truthiness used by conditional jumps.
    ///
    /// `nil`, `false`, `0`, `0.0` and the empty string are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Real(r) => *r != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Function(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Int(a), Value::Real(b)) | (Value::Real(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Function(closure) => write!(f, "<function {}>", closure.name),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

// ============================================================================
// Workers
// ============================================================================

/// Opaque handle to a named or pooled worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerHandle(pub u64);

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of one unit of worker execution.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerStatus {
    /// Queued or executing.
    Running,
    /// The procedure returned normally.
    Completed,
    /// The procedure raised an uncaught error.
    Failed(String),
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerStatus::Running)
    }

    /// Integer code exposed to programs: 0 running, 1 completed, 2 failed.
    pub fn code(&self) -> i64 {
        match self {
            WorkerStatus::Running => 0,
            WorkerStatus::Completed => 1,
            WorkerStatus::Failed(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn numeric_equality_crosses_int_and_real() {
        assert_eq!(Value::Int(2), Value::Real(2.0));
        assert_ne!(Value::Int(2), Value::str("2"));
    }

    #[test]
    fn display_array() {
        let v = Value::array(vec![Value::Int(1), Value::str("a"), Value::Nil]);
        assert_eq!(v.to_string(), "[1, a, nil]");
    }

    #[test]
    fn functions_compare_by_identity() {
        let a = Arc::new(Closure::new(0, Arc::from("f"), Box::new([])));
        let b = Arc::new(Closure::new(0, Arc::from("f"), Box::new([])));
        assert_eq!(Value::Function(a.clone()), Value::Function(a));
        assert_ne!(
            Value::Function(b),
            Value::Function(Arc::new(Closure::new(0, Arc::from("f"), Box::new([]))))
        );
    }

    #[test]
    fn cells_share_one_binding() {
        let cell = SharedCell::new(Value::Int(1));
        let alias = cell.clone();
        alias.set(Value::Int(2));
        assert_eq!(cell.get(), Value::Int(2));
        assert_eq!(cell, alias);
        assert_ne!(cell, SharedCell::new(Value::Int(2)));

        let weak = Arc::downgrade(&cell.0);
        drop(cell);
        drop(alias);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn worker_status_codes() {
        assert_eq!(WorkerStatus::Running.code(), 0);
        assert_eq!(WorkerStatus::Completed.code(), 1);
        assert!(WorkerStatus::Failed("boom".into()).is_terminal());
    }
}
