//! End-to-end tests for the trellis pipeline.
//!
//! Each test builds a program AST, compiles it through a [`Context`] and
//! checks either the resolution error or the program's output.

mod common;

use std::fs;
use std::sync::Arc;
use std::thread;

use common::Harness;
use proptest::prelude::*;
use trellis::ast::Program;
use trellis::ast::build::*;
use trellis::{CacheConfig, CacheMode, Config, Context, FrontendPolicy, RuntimeError, TrellisError};
use trellis_cache::codec;

// =============================================================================
// Scoping
// =============================================================================

#[test]
fn block_locals_disappear_at_block_exit() {
    let h = Harness::new();
    let err = h.resolve_error(Program::new(vec![
        block_stmt(vec![var("inner", int(1))]),
        expr(call("writeln", vec![name("inner")])),
    ]));
    assert_eq!(err.category(), "undefined-identifier");
    assert_eq!(err.identifier(), "inner");
    assert!(err.to_string().contains("not in scope"));
}

#[test]
fn shadowing_does_not_clobber_the_outer_binding() {
    let out = Harness::new().run(Program::new(vec![
        var("x", int(1)),
        block_stmt(vec![
            var("x", int(2)),
            expr(call("writeln", vec![name("x")])),
        ]),
        expr(call("writeln", vec![name("x")])),
    ]));
    assert_eq!(out, "2\n1\n");
}

#[test]
fn functions_hoist_but_variables_do_not() {
    let h = Harness::new();
    let out = h.run(Program::new(vec![
        expr(call("writeln", vec![call("later", vec![])])),
        function("later", &[], vec![ret(string("hoisted"))]),
    ]));
    assert_eq!(out, "hoisted\n");

    let err = h.resolve_error(Program::new(vec![
        expr(call("writeln", vec![name("late")])),
        var("late", int(1)),
    ]));
    assert_eq!(err.category(), "disallowed-hoist");
    assert_eq!(err.identifier(), "late");
}

#[test]
fn constants_cannot_be_reassigned() {
    let err = Harness::new().resolve_error(Program::new(vec![
        constant("limit", int(10)),
        function(
            "bump",
            &[],
            vec![while_(boolean(true), vec![expr(assign("limit", int(11)))])],
        ),
    ]));
    assert_eq!(err.category(), "const-reassignment");
    assert_eq!(err.identifier(), "limit");
}

#[test]
fn shadowing_constant_is_still_immutable() {
    let err = Harness::new().resolve_error(Program::new(vec![
        constant("limit", int(1)),
        block_stmt(vec![
            constant("limit", int(2)),
            expr(assign("limit", int(3))),
        ]),
    ]));
    assert_eq!(err.category(), "const-reassignment");
    assert_eq!(err.identifier(), "limit");
}

#[test]
fn block_local_shadows_parameter() {
    let out = Harness::new().run(Program::new(vec![
        var("x", int(1)),
        function(
            "show",
            &["x"],
            vec![
                expr(call("writeln", vec![name("x")])),
                block_stmt(vec![
                    var("x", int(3)),
                    expr(call("writeln", vec![name("x")])),
                ]),
                expr(call("writeln", vec![name("x")])),
            ],
        ),
        expr(call("show", vec![int(2)])),
        expr(call("writeln", vec![name("x")])),
    ]));
    assert_eq!(out, "2\n3\n2\n1\n");
}

#[test]
fn shadowing_inside_closure_leaves_capture_alone() {
    let out = Harness::new().run(Program::new(vec![
        function(
            "outer",
            &[],
            vec![
                var("n", int(10)),
                function(
                    "bump",
                    &[],
                    vec![
                        expr(assign("n", add(name("n"), int(1)))),
                        block_stmt(vec![
                            var("n", int(100)),
                            expr(call("writeln", vec![name("n")])),
                        ]),
                        ret(name("n")),
                    ],
                ),
                function("fresh", &[], vec![var("n", int(1)), ret(name("n"))]),
                expr(call("writeln", vec![call("bump", vec![])])),
                expr(call("writeln", vec![name("n")])),
                expr(call("writeln", vec![call("fresh", vec![])])),
            ],
        ),
        expr(call("outer", vec![])),
    ]));
    assert_eq!(out, "100\n11\n11\n1\n");
}

#[test]
fn counted_loop_leaves_successor_in_variable() {
    for policy in [FrontendPolicy::c_like(), FrontendPolicy::pascal()] {
        let out = Harness::with_policy(policy).run(Program::new(vec![
            var("i", int(0)),
            for_range("i", false, int(1), int(3), vec![]),
            expr(call("writeln", vec![name("i")])),
        ]));
        assert_eq!(out, "4\n");
    }
}

// =============================================================================
// Modules
// =============================================================================

fn colliding_modules(member: &str, left: &str, right: &str) -> Program {
    Program::new(vec![])
        .with_module(module(left, vec![], vec![export(var(member, int(1)))]))
        .with_module(module(right, vec![], vec![export(var(member, int(2)))]))
}

#[test]
fn qualified_access_reads_module_state() {
    let out = Harness::new().run(
        Program::new(vec![expr(call("writeln", vec![qualified("cfg", "level")]))])
            .with_module(module("config", vec![], vec![export(var("level", int(5)))]))
            .with_import(import_as("config", "cfg")),
    );
    assert_eq!(out, "5\n");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ambiguity_does_not_depend_on_spelling(member in "[a-z][a-z0-9_]{1,10}") {
        let h = Harness::new();
        prop_assume!(!h.context().registry().contains(&member));
        prop_assume!(!member.ends_with("_mod"));

        let mut program = colliding_modules(&member, "left_mod", "right_mod")
            .with_import(import("left_mod"))
            .with_import(import("right_mod"));
        program.body.push(expr(call("writeln", vec![name(&member)])));
        let err = h.resolve_error(program);
        prop_assert_eq!(err.category(), "ambiguous-import");
        prop_assert_eq!(err.identifier(), member.as_str());

        let mut program = colliding_modules(&member, "left_mod", "right_mod")
            .with_import(import_as("left_mod", "l"))
            .with_import(import("right_mod"));
        program.body.push(expr(call("writeln", vec![qualified("l", &member)])));
        prop_assert_eq!(h.run(program), "1\n");
    }
}

// =============================================================================
// Closures
// =============================================================================

#[test]
fn escaping_closure_over_local_is_rejected() {
    let err = Harness::new().resolve_error(Program::new(vec![function(
        "make_counter",
        &[],
        vec![
            var("count", int(0)),
            function(
                "next",
                &[],
                vec![
                    expr(assign("count", add(name("count"), int(1)))),
                    ret(name("count")),
                ],
            ),
            ret(name("next")),
        ],
    )]));
    assert_eq!(err.category(), "closure-lifetime");
    assert_eq!(err.identifier(), "next");
}

#[test]
fn counter_closure_increments_shared_cell() {
    let out = Harness::new().run(Program::new(vec![
        function(
            "main",
            &[],
            vec![
                var("count", int(0)),
                function(
                    "next",
                    &[],
                    vec![
                        expr(assign("count", add(name("count"), int(1)))),
                        ret(name("count")),
                    ],
                ),
                expr(call("writeln", vec![call("next", vec![])])),
                expr(call("writeln", vec![call("next", vec![])])),
            ],
        ),
    ])
    .with_entry("main"));
    assert_eq!(out, "1\n2\n");
}

#[test]
fn lambda_passed_as_value_is_called() {
    let out = Harness::new().run(Program::new(vec![
        function("apply", &["f", "x"], vec![ret(call("f", vec![name("x")]))]),
        expr(call(
            "writeln",
            vec![call(
                "apply",
                vec![lambda(&["n"], vec![ret(mul(name("n"), name("n")))]), int(9)],
            )],
        )),
    ]));
    assert_eq!(out, "81\n");
}

fn outer_with_counter(tail: Vec<trellis::ast::Stmt>) -> Program {
    let mut body = vec![
        var("x", int(1)),
        function(
            "inner",
            &[],
            vec![
                expr(assign("x", add(name("x"), int(1)))),
                ret(name("x")),
            ],
        ),
    ];
    body.extend(tail);
    Program::new(vec![var_uninit("saved"), function("outer", &[], body)])
}

#[test]
fn closures_cannot_escape_through_calls() {
    let h = Harness::new();

    let mut program = outer_with_counter(vec![expr(call("keep", vec![name("inner")]))]);
    program
        .body
        .push(function("keep", &["f"], vec![expr(assign("saved", name("f")))]));
    assert_eq!(h.resolve_error(program).category(), "closure-lifetime");

    let program = outer_with_counter(vec![
        function("getter", &[], vec![ret(name("inner"))]),
        ret(call("getter", vec![])),
    ]);
    assert_eq!(h.resolve_error(program).category(), "closure-lifetime");

    let program = outer_with_counter(vec![expr(call(
        "thread_spawn_named",
        vec![name("inner"), string("w")],
    ))]);
    let err = h.resolve_error(program);
    assert_eq!(err.category(), "closure-lifetime");
    assert_eq!(err.identifier(), "inner");
}

// =============================================================================
// Exceptions
// =============================================================================

#[test]
fn builtin_failure_is_catchable() {
    let out = Harness::new().run(Program::new(vec![try_catch(
        vec![expr(call("writeln", vec![call("sqrt", vec![int(-1)])]))],
        Some("e"),
        vec![expr(call("writeln", vec![string("caught: "), name("e")]))],
    )]));
    assert!(out.starts_with("caught: sqrt"), "{out}");
}

#[test]
fn uncaught_error_carries_message() {
    let h = Harness::new();
    let err = h
        .execute(Program::new(vec![throw(string("giving up"))]))
        .unwrap_err();
    let trellis::ContextError::Trellis(TrellisError::Runtime(RuntimeError::Uncaught { message, .. })) =
        err
    else {
        panic!("expected an uncaught exception, got {err}");
    };
    assert_eq!(message, "giving up");
}

// =============================================================================
// Workers
// =============================================================================

#[test]
fn spawned_worker_reports_completed_status() {
    let h = Harness::new();
    let runtime = h
        .execute(Program::new(vec![
            function("square", &["n"], vec![ret(mul(name("n"), name("n")))]),
            var("h", call("thread_spawn_named", vec![string("square"), string("sq"), int(7)])),
            expr(call("writeln", vec![call("thread_wait", vec![name("h")])])),
            expr(call("writeln", vec![call("thread_status", vec![name("h")])])),
            expr(call("writeln", vec![call("thread_result", vec![name("h")])])),
        ]))
        .unwrap();
    assert_eq!(runtime.output().take(), "0\n1\n49\n");
    assert_eq!(runtime.worker_count(), 1);
}

#[test]
fn pool_submission_is_found_by_name() {
    let h = Harness::new();
    let runtime = h
        .execute(Program::new(vec![
            function("noop", &[], vec![ret_void()]),
            var("h", call("thread_pool_submit", vec![name("noop"), string("pooled")])),
            expr(call(
                "writeln",
                vec![eq(call("thread_lookup", vec![string("pooled")]), name("h"))],
            )),
            expr(call("thread_wait", vec![name("h")])),
            expr(call("writeln", vec![call("thread_lookup", vec![string("nobody")])])),
        ]))
        .unwrap();
    runtime.shutdown_pool();
    assert_eq!(runtime.output().take(), "true\n-1\n");
}

#[test]
fn failing_worker_does_not_stop_main() {
    let out = Harness::new().run(Program::new(vec![
        function("explode", &[], vec![throw(string("bad"))]),
        var("h", call("thread_spawn_named", vec![string("explode"), string("x")])),
        expr(call("writeln", vec![call("thread_wait", vec![name("h")])])),
        expr(call("writeln", vec![call("thread_status", vec![name("h")])])),
        expr(call("writeln", vec![string("main continues")])),
    ]));
    assert_eq!(out, "1\n2\nmain continues\n");
}

#[test]
fn mutex_guards_shared_counter() {
    let workers = ["a", "b", "c", "d"];
    let mut body = vec![
        var("total", int(0)),
        var("m", call("mutex", vec![])),
        function(
            "work",
            &["n"],
            vec![for_range(
                "i",
                true,
                int(1),
                name("n"),
                vec![
                    expr(call("lock", vec![name("m")])),
                    expr(assign("total", add(name("total"), int(1)))),
                    expr(call("unlock", vec![name("m")])),
                ],
            )],
        ),
    ];
    for worker in workers {
        body.push(var(
            worker,
            call("thread_spawn_named", vec![string("work"), string(worker), int(250)]),
        ));
    }
    for worker in workers {
        body.push(expr(call("thread_wait", vec![name(worker)])));
    }
    body.extend([
        expr(call("writeln", vec![name("total")])),
        expr(call("destroy", vec![name("m")])),
        try_catch(
            vec![expr(call("lock", vec![name("m")]))],
            Some("e"),
            vec![expr(call("writeln", vec![name("e")]))],
        ),
    ]);
    let out = Harness::new().run(Program::new(body));
    assert_eq!(out, "1000\nmutex 1 does not exist\n");
}

#[test]
fn recursive_mutex_allows_nested_locking() {
    let out = Harness::new().run(Program::new(vec![
        var("m", call("rcmutex", vec![])),
        expr(call("lock", vec![name("m")])),
        expr(call("lock", vec![name("m")])),
        expr(call("unlock", vec![name("m")])),
        expr(call("unlock", vec![name("m")])),
        try_catch(
            vec![expr(call("unlock", vec![name("m")]))],
            Some("e"),
            vec![expr(call("writeln", vec![name("e")]))],
        ),
    ]));
    assert_eq!(out, "mutex 1 is not held by this worker\n");
}

#[test]
fn builtin_runs_on_its_own_worker() {
    let out = Harness::new().run(Program::new(vec![
        var("h", call("thread_spawn_builtin", vec![string("sqrt"), int(16)])),
        expr(call("writeln", vec![call("thread_wait", vec![name("h")])])),
        expr(call("writeln", vec![call("thread_result", vec![name("h")])])),
        expr(call("writeln", vec![eq(call("thread_lookup", vec![string("sqrt")]), name("h"))])),
        expr(call("writeln", vec![call("thread_spawn_builtin", vec![string("nope")])])),
    ]));
    assert_eq!(out, "0\n4\ntrue\n-1\n");
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn builtin_enumeration_is_stable_across_threads() {
    let h = Harness::new();
    let registry = h.context().registry();
    let expected = registry.inventory();
    assert!(expected.contains("category thread\n"));
    assert!(expected.contains("function math trig sin\n"));

    thread::scope(|s| {
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let expected = &expected;
            s.spawn(move || {
                for _ in 0..20 {
                    assert_eq!(&registry.inventory(), expected);
                }
            });
        }
    });
}

// =============================================================================
// Cache
// =============================================================================

#[test]
fn cached_unit_runs_like_a_fresh_compile() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("prog.tl");
    fs::write(&source, "").unwrap();
    fs::File::options()
        .write(true)
        .open(&source)
        .and_then(|f| f.set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(120)))
        .unwrap();

    let config = Config {
        cache: CacheConfig {
            dir: dir.path().join("cache"),
            mode: CacheMode::Enabled,
            strict_version: false,
        },
        ..Config::default()
    };
    let ctx = Context::with_default_modules(config).unwrap();
    let program = || {
        Program::new(vec![
            var("xs", array(vec![int(1), int(2)])),
            expr(call("writeln", vec![name("xs"), string(" "), real(0.25)])),
        ])
    };

    let first = ctx.compile_cached(&source, &[], program).unwrap();
    let second = ctx
        .compile_cached(&source, &[], || panic!("cache hit expected"))
        .unwrap();
    assert_eq!(first.code, second.code);

    // A fresh context reads the entry back from disk.
    let reopened = Context::with_default_modules(ctx.config().clone()).unwrap();
    let third = reopened
        .compile_cached(&source, &[], || panic!("disk hit expected"))
        .unwrap();
    assert_eq!(third.code, first.code);
    assert_eq!(third.procedures, first.procedures);

    let runtime = reopened.runtime(third, trellis::Output::buffer());
    runtime.run_main().unwrap();
    assert_eq!(runtime.output().take(), "[1, 2] 0.25\n");
}

#[test]
fn bytecode_file_round_trip_runs() {
    let h = Harness::new();
    let mut program = Program::new(vec![expr(call("writeln", vec![string("from disk")]))]);
    let unit = h.context().compile(&mut program).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.tbc");
    codec::write_file(&path, &unit).unwrap();

    let loaded = h.context().load_bytecode(&path).unwrap();
    let runtime = h.context().runtime(Arc::new(loaded), trellis::Output::buffer());
    runtime.run_main().unwrap();
    assert_eq!(runtime.output().take(), "from disk\n");
}
