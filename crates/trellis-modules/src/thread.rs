//! Worker and synchronisation builtins.
//!
//! Handles cross into programs as plain integers. Failures to start a
//! worker or unknown handles are reported through sentinel values rather
//! than exceptions:
//!
//! | builtin | result |
//! |---|---|
//! | `thread_spawn_named(proc, name, args...)` | handle, or -1 |
//! | `thread_spawn_builtin(builtin, args...)` | handle, or -1 |
//! | `thread_pool_submit(proc, name, args...)` | handle, or -1 |
//! | `thread_wait(h)` | 0 completed, 1 failed or unknown |
//! | `thread_lookup(name)` | handle, or -1 |
//! | `thread_status(h)` | 0 running, 1 completed, 2 failed, -1 unknown |
//! | `thread_result(h)` | the worker's return value, or nil |
//! | `thread_stats()` | number of workers created |
//!
//! Mutexes are ids too. `mutex()` and `rcmutex()` create a plain or a
//! recursive mutex; `lock`, `unlock` and `destroy` raise on misuse (an
//! unknown id, unlocking a mutex the caller does not hold, relocking a
//! plain one). Workers sharing a global guard read-modify-write with them:
//!
//! ```text
//! lock(m); total = total + 1; unlock(m);
//! ```

use trellis_core::{RuntimeError, Value, WorkerHandle, WorkerStatus};
use trellis_registry::{Arity, BuiltinHost, Module};

use crate::args;

fn handle_arg(name: &str, args: &[Value]) -> Result<Option<WorkerHandle>, RuntimeError> {
    let raw = args::int(name, args, 0)?;
    Ok(u64::try_from(raw).ok().map(WorkerHandle))
}

fn handle_value(handle: Result<WorkerHandle, RuntimeError>) -> Value {
    match handle {
        Ok(handle) => Value::Int(handle.0 as i64),
        Err(_) => Value::Int(-1),
    }
}

fn worker_parts<'a>(name: &str, args: &'a [Value]) -> Result<(Value, &'a str, Vec<Value>), RuntimeError> {
    let callee = args.first().cloned().unwrap_or_default();
    let worker_name = args::string(name, args, 1)?;
    Ok((callee, worker_name, args[2..].to_vec()))
}

pub fn spawn_named(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let (callee, name, rest) = worker_parts("thread_spawn_named", args)?;
    Ok(handle_value(host.spawn_named(callee, name, rest)))
}

pub fn spawn_builtin(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let builtin = args::string("thread_spawn_builtin", args, 0)?;
    Ok(handle_value(host.spawn_builtin(builtin, args[1..].to_vec())))
}

pub fn pool_submit(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let (callee, name, rest) = worker_parts("thread_pool_submit", args)?;
    Ok(handle_value(host.pool_submit(callee, name, rest)))
}

pub fn wait(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let Some(handle) = handle_arg("thread_wait", args)? else {
        return Ok(Value::Int(1));
    };
    Ok(Value::Int(match host.wait(handle) {
        Ok(WorkerStatus::Completed) => 0,
        _ => 1,
    }))
}

pub fn lookup(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let name = args::string("thread_lookup", args, 0)?;
    Ok(Value::Int(
        host.lookup_worker(name).map_or(-1, |handle| handle.0 as i64),
    ))
}

pub fn status(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let status = handle_arg("thread_status", args)?.and_then(|h| host.worker_status(h));
    Ok(Value::Int(status.map_or(-1, |s| s.code())))
}

pub fn result(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let value = handle_arg("thread_result", args)?.and_then(|h| host.worker_result(h));
    Ok(value.unwrap_or_default())
}

pub fn stats(host: &mut dyn BuiltinHost, _: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(host.worker_count() as i64))
}

pub fn mutex(host: &mut dyn BuiltinHost, _: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(host.mutex_create(false)))
}

pub fn rcmutex(host: &mut dyn BuiltinHost, _: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(host.mutex_create(true)))
}

pub fn lock(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    host.mutex_lock(args::int("lock", args, 0)?)?;
    Ok(Value::Nil)
}

pub fn unlock(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    host.mutex_unlock(args::int("unlock", args, 0)?)?;
    Ok(Value::Nil)
}

pub fn destroy(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    host.mutex_destroy(args::int("destroy", args, 0)?)?;
    Ok(Value::Nil)
}

pub fn module() -> Module {
    Module::new("thread")
        .group("workers")
        .function_in("workers", "thread_spawn_named", Arity::AtLeast(2), spawn_named)
        .function_in("workers", "thread_spawn_builtin", Arity::AtLeast(1), spawn_builtin)
        .function_in("workers", "thread_pool_submit", Arity::AtLeast(2), pool_submit)
        .function_in("workers", "thread_wait", Arity::Exact(1), wait)
        .function_in("workers", "thread_lookup", Arity::Exact(1), lookup)
        .function_in("workers", "thread_status", Arity::Exact(1), status)
        .function_in("workers", "thread_result", Arity::Exact(1), result)
        .function_in("workers", "thread_stats", Arity::Exact(0), stats)
        .group("sync")
        .function_in("sync", "mutex", Arity::Exact(0), mutex)
        .function_in("sync", "rcmutex", Arity::Exact(0), rcmutex)
        .procedure_in("sync", "lock", Arity::Exact(1), lock)
        .procedure_in("sync", "unlock", Arity::Exact(1), unlock)
        .procedure_in("sync", "destroy", Arity::Exact(1), destroy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::NullHost;

    #[test]
    fn failed_spawn_yields_minus_one() {
        let mut host = NullHost;
        let args = [Value::str("work"), Value::str("w1"), Value::Int(3)];
        assert_eq!(spawn_named(&mut host, &args).unwrap(), Value::Int(-1));
        assert_eq!(pool_submit(&mut host, &args).unwrap(), Value::Int(-1));
        assert_eq!(spawn_builtin(&mut host, &args).unwrap(), Value::Int(-1));
    }

    #[test]
    fn mutex_misuse_raises() {
        let mut host = NullHost;
        assert_eq!(mutex(&mut host, &[]).unwrap(), Value::Int(1));
        let err = lock(&mut host, &[Value::Int(9)]).unwrap_err();
        assert_eq!(err.to_string(), "mutex 9 does not exist");
        assert!(unlock(&mut host, &[Value::str("m")]).is_err());
    }

    #[test]
    fn unknown_handles_use_sentinels() {
        let mut host = NullHost;
        assert_eq!(status(&mut host, &[Value::Int(5)]).unwrap(), Value::Int(-1));
        assert_eq!(status(&mut host, &[Value::Int(-2)]).unwrap(), Value::Int(-1));
        assert_eq!(wait(&mut host, &[Value::Int(5)]).unwrap(), Value::Int(1));
        assert_eq!(lookup(&mut host, &[Value::str("nobody")]).unwrap(), Value::Int(-1));
        assert_eq!(result(&mut host, &[Value::Int(5)]).unwrap(), Value::Nil);
        assert_eq!(stats(&mut host, &[]).unwrap(), Value::Int(0));
    }

    #[test]
    fn worker_name_must_be_a_string() {
        let mut host = NullHost;
        let args = [Value::str("work"), Value::Int(1)];
        assert!(spawn_named(&mut host, &args).is_err());
    }
}
