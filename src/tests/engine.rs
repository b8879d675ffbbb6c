use crate::language::ast::{AstBuilder, BinaryOp, IncDecOp, LogicalOp, UnaryOp};
use crate::runtime::binder::Binder;
use crate::runtime::error::RuntimeError;
use crate::runtime::host::{
    CallableDescriptor, HostTypeDef, IndexerDescriptor, MemberDescriptor, MemberResolver, OpKind,
    ParamInfo, StdTypeSystem, TypeSystem,
};
use crate::runtime::value::{RuntimeType, Value};
use crate::runtime::Evaluator;
use std::cell::Cell;
use std::rc::Rc;

fn engine() -> Evaluator {
    Evaluator::new(Rc::new(StdTypeSystem::new()))
}

fn as_int(value: &Value) -> i64 {
    match value {
        Value::Int(v) => *v,
        other => panic!("expected int, got {other:?}"),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Float(v) => *v,
        other => panic!("expected float, got {other:?}"),
    }
}

#[test]
fn inner_shadow_unwinds_on_block_exit() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("x", Some(b.int(1))),
        b.block(vec![
            b.declare("x", Some(b.int(2))),
            b.expr_stmt(b.assign(b.ident("x"), b.int(3))),
        ]),
        b.ret(Some(b.ident("x"))),
    ]);
    let engine = engine();
    assert_eq!(as_int(&engine.invoke(&program, None).unwrap()), 1);
}

#[test]
fn duplicate_declaration_in_same_scope_is_rejected() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("x", Some(b.int(1))),
        b.declare("x", Some(b.int(2))),
    ]);
    let err = engine().invoke(&program, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::DuplicateDeclaration { .. }));
}

#[test]
fn arithmetic_resolves_through_operator_overloads() {
    let b = AstBuilder::new();
    let expr = b.binary(
        BinaryOp::Add,
        b.int(3),
        b.binary(BinaryOp::Mul, b.int(4), b.int(2)),
    );
    assert_eq!(as_int(&engine().invoke_expr(&expr, None).unwrap()), 11);
}

#[test]
fn integer_division_stays_integral() {
    let b = AstBuilder::new();
    let int_div = b.binary(BinaryOp::Div, b.int(7), b.int(2));
    let float_div = b.binary(BinaryOp::Div, b.float(7.0), b.float(2.0));
    let engine = engine();
    assert_eq!(as_int(&engine.invoke_expr(&int_div, None).unwrap()), 3);
    assert_eq!(as_float(&engine.invoke_expr(&float_div, None).unwrap()), 3.5);
}

#[test]
fn mixed_numeric_operands_widen_to_float() {
    let b = AstBuilder::new();
    let expr = b.binary(BinaryOp::Add, b.int(1), b.float(2.5));
    assert_eq!(as_float(&engine().invoke_expr(&expr, None).unwrap()), 3.5);
}

#[test]
fn division_by_zero_is_reported() {
    let b = AstBuilder::new();
    let expr = b.binary(BinaryOp::Div, b.int(1), b.int(0));
    let err = engine().invoke_expr(&expr, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::InvalidOperation { .. }));
}

#[test]
fn string_concatenation_and_length() {
    let b = AstBuilder::new();
    let expr = b.member(
        b.binary(BinaryOp::Add, b.str_lit("ab"), b.str_lit("cd")),
        "length",
    );
    assert_eq!(as_int(&engine().invoke_expr(&expr, None).unwrap()), 4);
}

#[test]
fn continue_skips_one_iteration_and_still_steps() {
    let b = AstBuilder::new();
    let body = b.block(vec![
        b.if_stmt(
            b.binary(BinaryOp::Eq, b.ident("i"), b.int(1)),
            b.cont(),
            None,
        ),
        b.expr_stmt(b.assign(
            b.ident("s"),
            b.binary(BinaryOp::Add, b.ident("s"), b.int(1)),
        )),
    ]);
    let program = b.block(vec![
        b.declare("s", Some(b.int(0))),
        b.for_stmt(
            Some(b.declare("i", Some(b.int(0)))),
            Some(b.binary(BinaryOp::Lt, b.ident("i"), b.int(3))),
            Some(b.inc_dec(IncDecOp::Increment, false, b.ident("i"))),
            body,
        ),
        b.ret(Some(b.ident("s"))),
    ]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 2);
}

#[test]
fn break_only_terminates_the_enclosing_loop() {
    let b = AstBuilder::new();
    let inner = b.while_stmt(b.bool_lit(true), b.block(vec![b.brk()]));
    let outer_body = b.block(vec![
        inner,
        b.expr_stmt(b.assign(
            b.ident("s"),
            b.binary(BinaryOp::Add, b.ident("s"), b.int(1)),
        )),
    ]);
    let program = b.block(vec![
        b.declare("s", Some(b.int(0))),
        b.for_stmt(
            Some(b.declare("i", Some(b.int(0)))),
            Some(b.binary(BinaryOp::Lt, b.ident("i"), b.int(3))),
            Some(b.inc_dec(IncDecOp::Increment, false, b.ident("i"))),
            outer_body,
        ),
        b.ret(Some(b.ident("s"))),
    ]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 3);
}

#[test]
fn return_propagates_out_of_nested_loops() {
    let b = AstBuilder::new();
    let program = b.block(vec![b.for_stmt(
        None,
        None,
        None,
        b.block(vec![b.ret(Some(b.int(7)))]),
    )]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 7);
}

#[test]
fn return_skips_trailing_statements_in_enclosing_blocks() {
    let engine = engine();
    let b = AstBuilder::new();
    // `t` is a promoted global so it stays observable after the invoke.
    let program = b.block(vec![
        b.expr_stmt(b.assign(b.ident("t"), b.int(0))),
        b.for_stmt(
            None,
            None,
            None,
            b.block(vec![
                b.block(vec![b.ret(Some(b.int(7)))]),
                b.expr_stmt(b.assign(b.ident("t"), b.int(99))),
            ]),
        ),
        b.expr_stmt(b.assign(b.ident("t"), b.int(98))),
    ]);
    assert_eq!(as_int(&engine.invoke(&program, None).unwrap()), 7);

    let later = AstBuilder::new();
    assert_eq!(as_int(&engine.invoke_expr(&later.ident("t"), None).unwrap()), 0);
}

#[test]
fn unbraced_branch_declaration_does_not_shift_sibling_slots() {
    let b = AstBuilder::new();
    // The un-braced `if` branch declares only on the first iteration;
    // `v`'s cached slot must be the same on every pass.
    let body = b.block(vec![
        b.if_stmt(
            b.binary(BinaryOp::Eq, b.ident("i"), b.int(0)),
            b.declare("tmp", Some(b.int(5))),
            None,
        ),
        b.declare("v", Some(b.ident("i"))),
        b.expr_stmt(b.assign(
            b.ident("s"),
            b.binary(BinaryOp::Add, b.ident("s"), b.ident("v")),
        )),
    ]);
    let program = b.block(vec![
        b.declare("s", Some(b.int(0))),
        b.for_stmt(
            Some(b.declare("i", Some(b.int(0)))),
            Some(b.binary(BinaryOp::Lt, b.ident("i"), b.int(2))),
            Some(b.inc_dec(IncDecOp::Increment, false, b.ident("i"))),
            body,
        ),
        b.ret(Some(b.ident("s"))),
    ]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 1);
}

#[test]
fn do_while_runs_the_body_at_least_once() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("n", Some(b.int(0))),
        b.do_while(
            b.block(vec![b.expr_stmt(b.inc_dec(
                IncDecOp::Increment,
                false,
                b.ident("n"),
            ))]),
            b.bool_lit(false),
        ),
        b.ret(Some(b.ident("n"))),
    ]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 1);
}

#[test]
fn break_outside_a_loop_fails_the_invocation() {
    let b = AstBuilder::new();
    let program = b.block(vec![b.brk()]);
    let err = engine().invoke(&program, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::InvalidOperation { .. }));
}

#[test]
fn missing_member_names_the_target_type() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("a", Some(b.object(vec![]))),
        b.expr_stmt(b.member(b.ident("a"), "Missing")),
    ]);
    let err = engine().invoke(&program, None).unwrap_err();
    match &err.error {
        RuntimeError::MissingMember { name, .. } => assert_eq!(name, "Missing"),
        other => panic!("expected missing member, got {other:?}"),
    }
    assert_eq!(err.innermost().unwrap().kind, "member access");

    // Same failure on a value with no open name table at all.
    let closed = b.member(b.int(5), "Missing");
    let err = engine().invoke_expr(&closed, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::MissingMember { .. }));
}

#[test]
fn assignment_to_unknown_name_promotes_to_root() {
    let engine = engine();
    let b = AstBuilder::new();
    let assign = b.expr_stmt(b.assign(b.ident("g"), b.int(41)));
    engine.invoke(&assign, None).unwrap();

    let later = AstBuilder::new();
    let read = later.binary(BinaryOp::Add, later.ident("g"), later.int(1));
    assert_eq!(as_int(&engine.invoke_expr(&read, None).unwrap()), 42);
}

#[test]
fn assignment_grows_a_member_on_open_objects() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("o", Some(b.object(vec![]))),
        b.expr_stmt(b.assign(b.member(b.ident("o"), "name"), b.str_lit("ada"))),
        b.ret(Some(b.member(b.ident("o"), "name"))),
    ]);
    let result = engine().invoke(&program, None).unwrap();
    assert!(matches!(result, Value::Str(s) if &*s == "ada"));
}

#[test]
fn null_equality_degrades_to_identity() {
    let engine = engine();
    let b = AstBuilder::new();
    let both_null = b.binary(BinaryOp::Eq, b.null(), b.null());
    let one_null = b.binary(BinaryOp::NotEq, b.int(1), b.null());
    assert!(matches!(
        engine.invoke_expr(&both_null, None).unwrap(),
        Value::Bool(true)
    ));
    assert!(matches!(
        engine.invoke_expr(&one_null, None).unwrap(),
        Value::Bool(true)
    ));
}

#[test]
fn arithmetic_on_null_is_a_null_reference() {
    let b = AstBuilder::new();
    let expr = b.binary(BinaryOp::Add, b.null(), b.int(1));
    let err = engine().invoke_expr(&expr, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::NullReference { .. }));
}

#[test]
fn negating_null_is_a_null_reference() {
    let b = AstBuilder::new();
    let expr = b.unary(UnaryOp::Neg, b.null());
    let err = engine().invoke_expr(&expr, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::NullReference { .. }));
}

#[test]
fn logical_operands_without_boolean_meaning_count_as_true() {
    let engine = engine();
    let b = AstBuilder::new();
    // null short-circuits `||` because it counts as true there,
    // even though it is falsy in conditions.
    let or = b.logical(LogicalOp::Or, b.null(), b.bool_lit(false));
    assert!(matches!(
        engine.invoke_expr(&or, None).unwrap(),
        Value::Bool(true)
    ));
    let and = b.logical(LogicalOp::And, b.null(), b.bool_lit(false));
    assert!(matches!(
        engine.invoke_expr(&and, None).unwrap(),
        Value::Bool(false)
    ));
}

#[test]
fn logical_and_short_circuits_the_right_side() {
    let b = AstBuilder::new();
    // `missing` would fail to resolve if evaluated.
    let expr = b.logical(LogicalOp::And, b.bool_lit(false), b.ident("missing"));
    assert!(matches!(
        engine().invoke_expr(&expr, None).unwrap(),
        Value::Bool(false)
    ));
}

#[test]
fn coalesce_and_ternary_evaluate_lazily() {
    let engine = engine();
    let b = AstBuilder::new();
    let coalesce = b.coalesce(b.null(), b.int(5));
    assert_eq!(as_int(&engine.invoke_expr(&coalesce, None).unwrap()), 5);
    let kept = b.coalesce(b.int(1), b.ident("missing"));
    assert_eq!(as_int(&engine.invoke_expr(&kept, None).unwrap()), 1);
    let ternary = b.ternary(b.bool_lit(true), b.int(1), b.ident("missing"));
    assert_eq!(as_int(&engine.invoke_expr(&ternary, None).unwrap()), 1);
}

#[test]
fn postfix_and_prefix_steps_differ_in_result_only() {
    let engine = engine();
    let b = AstBuilder::new();
    let postfix = b.block(vec![
        b.declare("i", Some(b.int(5))),
        b.ret(Some(b.inc_dec(IncDecOp::Increment, false, b.ident("i")))),
    ]);
    assert_eq!(as_int(&engine.invoke(&postfix, None).unwrap()), 5);

    let prefix = AstBuilder::new();
    let program = prefix.block(vec![
        prefix.declare("i", Some(prefix.int(5))),
        prefix.ret(Some(prefix.inc_dec(
            IncDecOp::Increment,
            true,
            prefix.ident("i"),
        ))),
    ]);
    assert_eq!(as_int(&engine.invoke(&program, None).unwrap()), 6);
}

#[test]
fn array_indexing_reads_and_writes() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("a", Some(b.array(vec![b.int(10), b.int(20)]))),
        b.expr_stmt(b.assign(b.index(b.ident("a"), vec![b.int(1)]), b.int(99))),
        b.ret(Some(b.index(b.ident("a"), vec![b.int(1)]))),
    ]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 99);
}

#[test]
fn array_index_out_of_range_is_reported() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("a", Some(b.array(vec![b.int(10)]))),
        b.expr_stmt(b.index(b.ident("a"), vec![b.int(5)])),
    ]);
    let err = engine().invoke(&program, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::InvalidOperation { .. }));
}

#[test]
fn object_indexer_reads_missing_keys_as_null() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("o", Some(b.object(vec![]))),
        b.expr_stmt(b.assign(
            b.index(b.ident("o"), vec![b.str_lit("k")]),
            b.int(5),
        )),
        b.ret(Some(b.index(b.ident("o"), vec![b.str_lit("absent")]))),
    ]);
    assert!(engine().invoke(&program, None).unwrap().is_null());
}

#[test]
fn indexing_a_string_has_no_indexer() {
    let b = AstBuilder::new();
    let expr = b.index(b.str_lit("abc"), vec![b.int(0)]);
    let err = engine().invoke_expr(&expr, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::MissingIndexer { .. }));
}

#[test]
fn variadic_method_packs_trailing_arguments() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("a", Some(b.array(vec![]))),
        b.expr_stmt(b.call(
            b.member(b.ident("a"), "push"),
            vec![b.int(1), b.int(2), b.int(3)],
        )),
        b.ret(Some(b.member(b.ident("a"), "length"))),
    ]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 3);
}

#[test]
fn variadic_method_accepts_a_prepacked_array() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("a", Some(b.array(vec![]))),
        b.expr_stmt(b.call(
            b.member(b.ident("a"), "push"),
            vec![b.array(vec![b.int(1), b.int(2)])],
        )),
        b.ret(Some(b.member(b.ident("a"), "length"))),
    ]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 2);
}

#[test]
fn pushing_an_array_into_itself_extends_it() {
    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("a", Some(b.array(vec![b.int(1)]))),
        b.expr_stmt(b.call(b.member(b.ident("a"), "push"), vec![b.ident("a")])),
        b.ret(Some(b.member(b.ident("a"), "length"))),
    ]);
    assert_eq!(as_int(&engine().invoke(&program, None).unwrap()), 2);
}

#[test]
fn int_argument_widens_to_float_parameter() {
    let engine = engine();
    let half = CallableDescriptor::native(
        "half",
        vec![ParamInfo::of(RuntimeType::Float)],
        RuntimeType::Float,
        |_, args| match args {
            [Value::Float(v)] => Ok(Value::Float(v / 2.0)),
            _ => Err(RuntimeError::InvalidOperation {
                message: "half expects one float".into(),
            }),
        },
    );
    engine.global_object().set("half", Value::Function(half));

    let b = AstBuilder::new();
    let call = b.call(b.ident("half"), vec![b.int(3)]);
    assert_eq!(as_float(&engine.invoke_expr(&call, None).unwrap()), 1.5);
}

#[test]
fn unknown_call_reports_missing_method() {
    let b = AstBuilder::new();
    let call = b.call(b.ident("nowhere"), vec![b.int(1)]);
    let err = engine().invoke_expr(&call, None).unwrap_err();
    match &err.error {
        RuntimeError::MissingMethod { name, argc } => {
            assert_eq!(name, "nowhere");
            assert_eq!(*argc, 1);
        }
        other => panic!("expected missing method, got {other:?}"),
    }
}

#[test]
fn throw_surfaces_as_an_error_with_a_trace() {
    let b = AstBuilder::new();
    let program = b.block(vec![b.throw(b.str_lit("boom"))]);
    let err = engine().invoke(&program, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::Thrown { .. }));
    assert!(!err.trace.is_empty());
}

#[test]
fn bare_names_reach_the_invocation_target() {
    let engine = engine();
    let b = AstBuilder::new();
    let obj_literal = b.object(vec![("greeting", b.str_lit("hi"))]);
    let target = engine.invoke_expr(&obj_literal, None).unwrap();

    let read = b.ident("greeting");
    let result = engine.invoke_expr(&read, Some(&target)).unwrap();
    assert!(matches!(result, Value::Str(s) if &*s == "hi"));
}

struct CountingHost {
    inner: StdTypeSystem,
    operator_lookups: Cell<usize>,
}

impl TypeSystem for CountingHost {
    fn find_members(&self, ty: &RuntimeType, name: &str) -> Vec<MemberDescriptor> {
        self.inner.find_members(ty, name)
    }

    fn members(&self, ty: &RuntimeType) -> Vec<MemberDescriptor> {
        self.inner.members(ty)
    }

    fn find_operators(&self, op: OpKind, operands: &[RuntimeType]) -> Vec<Rc<CallableDescriptor>> {
        self.operator_lookups.set(self.operator_lookups.get() + 1);
        self.inner.find_operators(op, operands)
    }

    fn find_indexers(&self, ty: &RuntimeType) -> Vec<IndexerDescriptor> {
        self.inner.find_indexers(ty)
    }

    fn try_implicit_conversion(
        &self,
        from: &RuntimeType,
        to: &RuntimeType,
    ) -> Option<Rc<CallableDescriptor>> {
        self.inner.try_implicit_conversion(from, to)
    }
}

#[test]
fn operator_resolution_runs_once_per_node() {
    let host = Rc::new(CountingHost {
        inner: StdTypeSystem::new(),
        operator_lookups: Cell::new(0),
    });
    let engine = Evaluator::new(host.clone());

    let b = AstBuilder::new();
    let expr = b.binary(BinaryOp::Add, b.int(2), b.int(3));
    engine.invoke_expr(&expr, None).unwrap();
    let after_first = host.operator_lookups.get();
    assert_eq!(after_first, 1);

    engine.invoke_expr(&expr, None).unwrap();
    engine.invoke_expr(&expr, None).unwrap();
    assert_eq!(host.operator_lookups.get(), after_first);
}

#[test]
fn loop_bodies_reuse_their_cached_resolutions() {
    let host = Rc::new(CountingHost {
        inner: StdTypeSystem::new(),
        operator_lookups: Cell::new(0),
    });
    let engine = Evaluator::new(host.clone());

    let b = AstBuilder::new();
    let program = b.block(vec![
        b.declare("s", Some(b.int(0))),
        b.for_stmt(
            Some(b.declare("i", Some(b.int(0)))),
            Some(b.binary(BinaryOp::Lt, b.ident("i"), b.int(50))),
            Some(b.inc_dec(IncDecOp::Increment, false, b.ident("i"))),
            b.block(vec![b.expr_stmt(b.assign(
                b.ident("s"),
                b.binary(BinaryOp::Add, b.ident("s"), b.ident("i")),
            ))]),
        ),
        b.ret(Some(b.ident("s"))),
    ]);
    assert_eq!(as_int(&engine.invoke(&program, None).unwrap()), 1225);
    // Three operator nodes in the tree: `<`, `++`, `+`.
    assert_eq!(host.operator_lookups.get(), 3);
}

struct AmbientResolver;

impl MemberResolver for AmbientResolver {
    fn resolve_name(&self, name: &str) -> Option<Binder> {
        (name == "answer").then(|| {
            Binder::Field {
                member: MemberDescriptor::property(
                    "answer",
                    RuntimeType::Int,
                    CallableDescriptor::native("answer", vec![], RuntimeType::Int, |_, _| {
                        Ok(Value::Int(42))
                    }),
                    None,
                ),
            }
        })
    }

    fn resolve_member(&self, _target: &Value, _name: &str) -> Option<Binder> {
        None
    }

    fn resolve_call(
        &self,
        name: &str,
        _target: Option<&Value>,
        args: &[RuntimeType],
    ) -> Option<Rc<CallableDescriptor>> {
        (name == "twice" && args.len() == 1).then(|| {
            CallableDescriptor::native(
                "twice",
                vec![ParamInfo::of(RuntimeType::Int)],
                RuntimeType::Int,
                |_, args| match args {
                    [Value::Int(v)] => Ok(Value::Int(v * 2)),
                    _ => Err(RuntimeError::InvalidOperation {
                        message: "twice expects one int".into(),
                    }),
                },
            )
        })
    }
}

#[test]
fn external_resolver_is_the_last_resort() {
    let engine = Evaluator::new(Rc::new(StdTypeSystem::new()))
        .with_external_resolver(Rc::new(AmbientResolver));

    let b = AstBuilder::new();
    assert_eq!(
        as_int(&engine.invoke_expr(&b.ident("answer"), None).unwrap()),
        42
    );
    let call = b.call(b.ident("twice"), vec![b.int(21)]);
    assert_eq!(as_int(&engine.invoke_expr(&call, None).unwrap()), 42);

    // A root variable with the same name wins over the resolver.
    let shadow = b.expr_stmt(b.assign(b.ident("twice"), b.int(0)));
    engine.invoke(&shadow, None).unwrap();
    let recheck = AstBuilder::new();
    let shadowed_call = recheck.call(recheck.ident("twice"), vec![recheck.int(21)]);
    let err = engine.invoke_expr(&shadowed_call, None).unwrap_err();
    assert!(matches!(err.error, RuntimeError::InvalidOperation { .. }));
}

fn math_type(host: &mut StdTypeSystem) -> RuntimeType {
    let pi = MemberDescriptor::property(
        "PI",
        RuntimeType::Float,
        CallableDescriptor::native("PI", vec![], RuntimeType::Float, |_, _| {
            Ok(Value::Float(std::f64::consts::PI))
        }),
        None,
    )
    .into_static();
    let abs = MemberDescriptor::method(
        "abs",
        CallableDescriptor::native(
            "abs",
            vec![ParamInfo::of(RuntimeType::Int)],
            RuntimeType::Int,
            |_, args| match args {
                [Value::Int(v)] => Ok(Value::Int(v.abs())),
                _ => Err(RuntimeError::InvalidOperation {
                    message: "abs expects one int".into(),
                }),
            },
        ),
    )
    .into_static();
    host.register_type(
        "Math",
        HostTypeDef {
            members: vec![pi, abs],
            operators: vec![],
            indexers: vec![],
        },
    )
}

#[test]
fn static_import_exposes_members_as_bare_names() {
    let mut host = StdTypeSystem::new();
    let math = math_type(&mut host);
    let engine = Evaluator::new(Rc::new(host));
    engine.declare_static_import(&math).unwrap();

    let b = AstBuilder::new();
    let pi = engine.invoke_expr(&b.ident("PI"), None).unwrap();
    assert!((as_float(&pi) - std::f64::consts::PI).abs() < 1e-12);

    let call = b.call(b.ident("abs"), vec![b.unary(UnaryOp::Neg, b.int(3))]);
    assert_eq!(as_int(&engine.invoke_expr(&call, None).unwrap()), 3);
}

#[test]
fn registered_conversion_is_applied_to_arguments() {
    let mut host = StdTypeSystem::new();
    host.register_conversion(
        RuntimeType::Int,
        RuntimeType::Str,
        CallableDescriptor::native(
            "int_to_string",
            vec![ParamInfo::of(RuntimeType::Int)],
            RuntimeType::Str,
            |_, args| match args {
                [Value::Int(v)] => Ok(Value::str(&v.to_string())),
                _ => Err(RuntimeError::InvalidOperation {
                    message: "conversion expects one int".into(),
                }),
            },
        ),
    );
    let engine = Evaluator::new(Rc::new(host));
    let shout = CallableDescriptor::native(
        "shout",
        vec![ParamInfo::of(RuntimeType::Str)],
        RuntimeType::Str,
        |_, args| match args {
            [Value::Str(s)] => Ok(Value::str(&format!("{s}!"))),
            _ => Err(RuntimeError::InvalidOperation {
                message: "shout expects one string".into(),
            }),
        },
    );
    engine.global_object().set("shout", Value::Function(shout));

    let b = AstBuilder::new();
    let call = b.call(b.ident("shout"), vec![b.int(7)]);
    let result = engine.invoke_expr(&call, None).unwrap();
    assert!(matches!(result, Value::Str(s) if &*s == "7!"));
}

#[test]
fn reassigned_local_function_is_picked_up_by_a_cached_call_site() {
    let engine = engine();
    let constant = |value: i64| {
        CallableDescriptor::native("constant", vec![], RuntimeType::Int, move |_, _| {
            Ok(Value::Int(value))
        })
    };
    engine.global_object().set("pick", Value::Function(constant(1)));

    let b = AstBuilder::new();
    let seed = b.expr_stmt(b.assign(b.ident("f"), b.int(0)));
    // Root variable `f` created by promotion, then replaced with
    // function values; the call node re-reads the slot each time.
    engine.invoke(&seed, None).unwrap();

    let set = AstBuilder::new();
    let assign_one = set.expr_stmt(set.assign(set.ident("f"), set.ident("pick")));
    engine.invoke(&assign_one, None).unwrap();

    let call_builder = AstBuilder::new();
    let call = call_builder.call(call_builder.ident("f"), vec![]);
    assert_eq!(as_int(&engine.invoke_expr(&call, None).unwrap()), 1);

    engine.global_object().set("pick2", Value::Function(constant(2)));
    let swap = AstBuilder::new();
    let assign_two = swap.expr_stmt(swap.assign(swap.ident("f"), swap.ident("pick2")));
    engine.invoke(&assign_two, None).unwrap();
    assert_eq!(as_int(&engine.invoke_expr(&call, None).unwrap()), 2);
}
