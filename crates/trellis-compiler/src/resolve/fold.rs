//! Compile-time constant folding.
//!
//! Works on resolved expressions: names that resolved to folded constants
//! are already `Resolved::Constant`. Anything that would fail at run time
//! (overflow, division by zero, mixed types) does not fold.

use trellis_ast::{BinaryOp, Expr, Literal, LogicalOp, Resolved, UnaryOp};

/// Fold `expr` to a literal, if it is built only from constants.
pub fn fold(expr: &Expr) -> Option<Literal> {
    match expr {
        Expr::Literal(lit, _) => Some(lit.clone()),
        Expr::Name(name) => match &name.resolved {
            Some(Resolved::Constant(lit)) => Some(lit.clone()),
            _ => None,
        },
        Expr::Qualified(q) => match &q.resolved {
            Some(Resolved::Constant(lit)) => Some(lit.clone()),
            _ => None,
        },
        Expr::Unary(u) => fold_unary(u.op, fold(&u.operand)?),
        Expr::Binary(b) => fold_binary(b.op, fold(&b.left)?, fold(&b.right)?),
        Expr::Logical(l) => {
            let left = fold(&l.left)?;
            let right = fold(&l.right)?;
            match (l.op, left, right) {
                (LogicalOp::And, Literal::Bool(a), Literal::Bool(b)) => Some(Literal::Bool(a && b)),
                (LogicalOp::Or, Literal::Bool(a), Literal::Bool(b)) => Some(Literal::Bool(a || b)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn fold_unary(op: UnaryOp, value: Literal) -> Option<Literal> {
    match (op, value) {
        (UnaryOp::Neg, Literal::Int(v)) => v.checked_neg().map(Literal::Int),
        (UnaryOp::Neg, Literal::Real(v)) => Some(Literal::Real(-v)),
        (UnaryOp::Not, Literal::Bool(v)) => Some(Literal::Bool(!v)),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, left: Literal, right: Literal) -> Option<Literal> {
    use Literal::*;
    match (left, right) {
        (Int(a), Int(b)) => fold_int(op, a, b),
        (Real(a), Real(b)) => fold_real(op, a, b),
        (Int(a), Real(b)) => fold_real(op, a as f64, b),
        (Real(a), Int(b)) => fold_real(op, a, b as f64),
        (Str(a), Str(b)) => match op {
            BinaryOp::Add => Some(Str(a + &b)),
            BinaryOp::Eq => Some(Bool(a == b)),
            BinaryOp::Ne => Some(Bool(a != b)),
            BinaryOp::Lt => Some(Bool(a < b)),
            BinaryOp::Le => Some(Bool(a <= b)),
            BinaryOp::Gt => Some(Bool(a > b)),
            BinaryOp::Ge => Some(Bool(a >= b)),
            _ => None,
        },
        (Bool(a), Bool(b)) => match op {
            BinaryOp::Eq => Some(Bool(a == b)),
            BinaryOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

fn fold_int(op: BinaryOp, a: i64, b: i64) -> Option<Literal> {
    use Literal::*;
    match op {
        BinaryOp::Add => a.checked_add(b).map(Int),
        BinaryOp::Sub => a.checked_sub(b).map(Int),
        BinaryOp::Mul => a.checked_mul(b).map(Int),
        BinaryOp::Div => (b != 0).then(|| Real(a as f64 / b as f64)),
        BinaryOp::IntDiv => a.checked_div(b).map(Int),
        BinaryOp::Mod => a.checked_rem(b).map(Int),
        BinaryOp::Eq => Some(Bool(a == b)),
        BinaryOp::Ne => Some(Bool(a != b)),
        BinaryOp::Lt => Some(Bool(a < b)),
        BinaryOp::Le => Some(Bool(a <= b)),
        BinaryOp::Gt => Some(Bool(a > b)),
        BinaryOp::Ge => Some(Bool(a >= b)),
    }
}

fn fold_real(op: BinaryOp, a: f64, b: f64) -> Option<Literal> {
    use Literal::*;
    match op {
        BinaryOp::Add => Some(Real(a + b)),
        BinaryOp::Sub => Some(Real(a - b)),
        BinaryOp::Mul => Some(Real(a * b)),
        BinaryOp::Div => (b != 0.0).then(|| Real(a / b)),
        BinaryOp::IntDiv | BinaryOp::Mod => None,
        BinaryOp::Eq => Some(Bool(a == b)),
        BinaryOp::Ne => Some(Bool(a != b)),
        BinaryOp::Lt => Some(Bool(a < b)),
        BinaryOp::Le => Some(Bool(a <= b)),
        BinaryOp::Gt => Some(Bool(a > b)),
        BinaryOp::Ge => Some(Bool(a >= b)),
    }
}
