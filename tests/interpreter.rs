use std::{
    cell::RefCell,
    io::{self, Cursor, Write},
    rc::Rc,
    thread,
};

use unik::{
    diagnostics::{DiagnosticKind, UnikError},
    runtime::{Interpreter, MAX_CALL_DEPTH},
    value::{MapKey, Value, ValueKind},
};

#[derive(Clone, Default)]
struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn interpreter() -> (Interpreter, SharedOutput) {
    let output = SharedOutput::default();
    let interpreter = Interpreter::new().with_output(output.clone());
    (interpreter, output)
}

fn eval(source: &str) -> Value {
    let (mut interpreter, _) = interpreter();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn output_of(source: &str) -> String {
    let (mut interpreter, output) = interpreter();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed");
    output.contents()
}

fn eval_error(source: &str) -> UnikError {
    let (mut interpreter, _) = interpreter();
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

/// Deep Unik recursion needs more native stack than a default test thread has.
fn with_large_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(f)
        .expect("spawn evaluation thread")
        .join()
        .expect("evaluation thread panicked")
}

fn error_kind(source: &str) -> DiagnosticKind {
    let err = eval_error(source);
    err.kind()
        .unwrap_or_else(|| panic!("expected a diagnostic, found {err}"))
}

fn expect_int(value: &Value) -> i64 {
    match value.0.as_ref() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected Int, found {}", value.type_name()),
    }
}

fn expect_float(value: &Value) -> f64 {
    match value.0.as_ref() {
        ValueKind::Float(n) => *n,
        _ => panic!("expected Float, found {}", value.type_name()),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value.0.as_ref() {
        ValueKind::Bool(b) => *b,
        _ => panic!("expected Bool, found {}", value.type_name()),
    }
}

fn expect_string(value: &Value) -> &str {
    match value.0.as_ref() {
        ValueKind::String(s) => s,
        _ => panic!("expected String, found {}", value.type_name()),
    }
}

fn expect_ints(value: &Value) -> Vec<i64> {
    match value.0.as_ref() {
        ValueKind::List(values) => values.iter().map(expect_int).collect(),
        _ => panic!("expected List, found {}", value.type_name()),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(expect_int(&eval("2 + 3 * 4")), 14);
    assert_eq!(expect_int(&eval("(2 + 3) * 4")), 20);
    assert_eq!(expect_int(&eval("10 - 4 - 3")), 3);
}

#[test]
fn gives_sum_of_variables() {
    assert_eq!(output_of("x = 10; y = 20; give x + y"), "30\n");
}

#[test]
fn single_expression_function() {
    assert_eq!(output_of("func add(a, b) -> a + b; give add(2, 3)"), "5\n");
}

#[test]
fn one_line_if_else() {
    assert_eq!(
        output_of(r#"if -1 > 0 -> give "pos" else -> give "neg""#),
        "neg\n"
    );
}

#[test]
fn numeric_loop_infers_direction() {
    assert_eq!(output_of("loop i in 1..3 { give i }"), "1\n2\n3\n");
    assert_eq!(output_of("loop i in 3..1 { give i }"), "3\n2\n1\n");
}

#[test]
fn numeric_loop_with_explicit_step() {
    assert_eq!(output_of("loop i in 10..1, -3 -> give i"), "10\n7\n4\n1\n");
    assert_eq!(output_of("loop i in 1..5, -1 -> give i"), "");
}

#[test]
fn fractional_step_reaches_endpoint_exactly() {
    let source = "count = 0\nlast = nil\nloop x in 0..1, 0.1 {\n count += 1\n last = x\n}\n";
    assert_eq!(expect_int(&eval(&format!("{source}count"))), 11);
    assert_eq!(expect_float(&eval(&format!("{source}last"))), 1.0);
}

#[test]
fn oversized_integer_literal_becomes_float() {
    assert_eq!(expect_float(&eval("99999999999999999999")), 1e20);
}

#[test]
fn zero_loop_step_is_reported() {
    assert_eq!(
        error_kind("loop i in 1..5, 0 { give i }"),
        DiagnosticKind::InvalidLoopStep
    );
}

#[test]
fn division_by_zero_leaves_session_usable() {
    let (mut interpreter, output) = interpreter();
    let err = interpreter
        .eval_source("give 5 / 0")
        .expect_err("division by zero should fail");
    assert_eq!(err.kind(), Some(DiagnosticKind::DivisionByZero));
    let message = err.to_string();
    assert!(message.starts_with("DivisionByZero: division by zero"), "{message}");
    assert!(message.contains("hint:"), "{message}");

    interpreter
        .eval_source("give 1 + 1")
        .expect("session continues");
    assert_eq!(output.contents(), "2\n");
}

#[test]
fn block_bindings_do_not_leak() {
    assert_eq!(
        error_kind("if true { z = 1 }; give z"),
        DiagnosticKind::UndefinedVariable
    );
    assert_eq!(
        error_kind("func f() { inner = 1 }; f(); inner"),
        DiagnosticKind::UndefinedVariable
    );
}

#[test]
fn assignment_updates_enclosing_binding() {
    let value = eval(
        r#"
        total = 0
        loop i in 1..3 {
            total += i
        }
        total
        "#,
    );
    assert_eq!(expect_int(&value), 6);
}

#[test]
fn break_stops_loop_but_not_function() {
    let value = eval(
        r#"
        func first_over(limit) {
            found = nil
            loop i in 1..10 {
                if i > limit {
                    found = i
                    break
                }
            }
            return found
        }
        first_over(3)
        "#,
    );
    assert_eq!(expect_int(&value), 4);
}

#[test]
fn continue_skips_to_next_iteration() {
    let value = eval(
        r#"
        total = 0
        loop i in 1..5 {
            if i % 2 == 0 -> continue
            total += i
        }
        total
        "#,
    );
    assert_eq!(expect_int(&value), 9);
}

#[test]
fn repeat_checks_condition_first() {
    assert_eq!(expect_int(&eval("n = 0; repeat n < 3 { n += 1 }; n")), 3);
    assert_eq!(output_of(r#"repeat false { give "never" }"#), "");
}

#[test]
fn foreach_visits_list_string_and_map_keys() {
    assert_eq!(output_of(r#"loop item in ["a", "b"] { give item }"#), "a\nb\n");
    assert_eq!(output_of(r#"loop ch in "hi" -> give ch"#), "h\ni\n");
    assert_eq!(
        output_of(r#"loop key in {"x": 1, "y": 2} { give key }"#),
        "x\ny\n"
    );
}

#[test]
fn return_exits_through_loops() {
    let value = eval(
        r#"
        func find(items, wanted) {
            loop item in items {
                if item == wanted -> return "found"
            }
            return "missing"
        }
        find([1, 2, 3], 2)
        "#,
    );
    assert_eq!(expect_string(&value), "found");
}

#[test]
fn closures_capture_defining_scope() {
    let value = eval(
        r#"
        func make_counter() {
            count = 0
            func increment() {
                count += 1
                return count
            }
            return increment
        }
        counter = make_counter()
        counter()
        counter()
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn missing_arguments_bind_nil() {
    assert_eq!(expect_string(&eval("func pair(a, b) -> type(b); pair(1)")), "Nil");
    assert_eq!(expect_int(&eval("func first(a) -> a; first(1, 2, 3)")), 1);
}

#[test]
fn block_function_without_return_yields_nil() {
    assert!(eval("func noop() { 1 + 1 }; noop()").is_nil());
}

#[test]
fn classes_construct_instances_with_init() {
    let value = eval(
        r#"
        class Point {
            x = 0
            y = 0
            func init(x, y) {
                self.x = x
                self.y = y
            }
            func sum() -> self.x + self.y
        }
        p = Point(3, 4)
        q = Point(10, 20)
        p.sum()
        "#,
    );
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn instances_copy_field_template() {
    let value = eval(
        r#"
        class Counter {
            hits = 0
            func bump() {
                self.hits += 1
            }
        }
        a = Counter()
        b = Counter()
        a.bump()
        a.bump()
        [a.hits, b.hits]
        "#,
    );
    assert_eq!(expect_ints(&value), vec![2, 0]);
}

#[test]
fn instances_are_shared_by_reference() {
    let value = eval(
        r#"
        class Box { value = 1 }
        first = Box()
        alias = first
        alias.value = 100
        first.value
        "#,
    );
    assert_eq!(expect_int(&value), 100);
}

#[test]
fn unknown_attribute_is_reported() {
    assert_eq!(
        error_kind("class Empty { func init() { } }; Empty().missing"),
        DiagnosticKind::AttributeError
    );
}

#[test]
fn try_catch_binds_error() {
    assert_eq!(
        output_of(r#"try { give 1 / 0 } catch { give error.kind + ": " + error.message }"#),
        "DivisionByZero: division by zero\n"
    );
}

#[test]
fn finally_always_runs() {
    assert_eq!(
        output_of(r#"try { x = 1 } finally { give "done" }"#),
        "done\n"
    );
    assert_eq!(
        output_of(r#"try { missing } catch { give "caught" } finally { give "done" }"#),
        "caught\ndone\n"
    );
}

#[test]
fn finally_keeps_pending_return() {
    let (mut interpreter, output) = interpreter();
    let value = interpreter
        .eval_source(
            r#"
            func f() {
                try { return 1 } finally { give "cleanup" }
            }
            f()
            "#,
        )
        .expect("evaluation should succeed");
    assert_eq!(expect_int(&value), 1);
    assert_eq!(output.contents(), "cleanup\n");
}

#[test]
fn finally_signal_takes_precedence() {
    let value = eval(
        r#"
        func g() {
            try { return 1 } finally { return 2 }
        }
        g()
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn uncaught_error_propagates_after_finally() {
    let (mut interpreter, output) = interpreter();
    let err = interpreter
        .eval_source(r#"try { 1 % 0 } finally { give "cleanup" }"#)
        .expect_err("modulo by zero should propagate");
    assert_eq!(err.kind(), Some(DiagnosticKind::ModuloByZero));
    assert_eq!(output.contents(), "cleanup\n");
}

#[test]
fn logical_operators_short_circuit() {
    assert!(!expect_bool(&eval("false && undefined_name")));
    assert!(expect_bool(&eval("true || boom()")));
    assert!(expect_bool(&eval("1 < 2 && !(3 < 2)")));
}

#[test]
fn comparison_requires_ordered_operands() {
    assert_eq!(error_kind(r#"1 < "a""#), DiagnosticKind::TypeMismatch);
    assert!(expect_bool(&eval(r#""apple" < "banana""#)));
    assert!(expect_bool(&eval("2 == 2.0")));
    assert!(expect_bool(&eval("[1, [2]] == [1, [2]]")));
}

#[test]
fn arithmetic_semantics() {
    assert_eq!(expect_string(&eval(r#""n=" + 5"#)), "n=5");
    assert_eq!(expect_int(&eval("6 / 3")), 2);
    assert_eq!(expect_float(&eval("7 / 2")), 3.5);
    assert_eq!(expect_float(&eval("1.5 + 1")), 2.5);
    assert_eq!(expect_int(&eval("-7 % 3")), 2);
    assert_eq!(expect_int(&eval("7 % -3")), -2);
    assert_eq!(expect_ints(&eval("[1] + [2, 3]")), vec![1, 2, 3]);
    assert_eq!(error_kind("7 % 0"), DiagnosticKind::ModuloByZero);
    assert_eq!(error_kind(r#""a" - 1"#), DiagnosticKind::TypeMismatch);
}

#[test]
fn signals_outside_their_construct_are_reported() {
    assert_eq!(error_kind("break"), DiagnosticKind::BreakOutsideLoop);
    assert_eq!(error_kind("continue"), DiagnosticKind::ContinueOutsideLoop);
    assert_eq!(error_kind("return 1"), DiagnosticKind::ReturnOutsideFunction);
    assert_eq!(
        error_kind("func f() { break }; f()"),
        DiagnosticKind::BreakOutsideLoop
    );
}

#[test]
fn pipeline_calls_right_operand() {
    assert_eq!(expect_int(&eval("func double(x) -> x * 2; 5 |> double |> double")), 20);
    assert_eq!(error_kind("5 |> 3"), DiagnosticKind::NotCallable);
    assert_eq!(error_kind("x = 1; x()"), DiagnosticKind::NotCallable);
}

#[test]
fn alter_runs_first_matching_arm() {
    let source = r#"
        func describe(n) {
            alter n {
                1 -> { return "one" },
                2 -> { return "two" },
                else -> return "many"
            }
        }
        give describe(2)
        give describe(9)
    "#;
    assert_eq!(output_of(source), "two\nmany\n");
}

#[test]
fn alter_inline_give_arms_separated_by_commas() {
    let source = r#"
        x = 2
        alter x { 1 -> give "one", 2 -> give "two", else -> give "other" }
        alter 7 { 1 -> give "one", else -> give "other", }
    "#;
    assert_eq!(output_of(source), "two\nother\n");
}

#[test]
fn recursion_within_limit_succeeds() {
    let value = with_large_stack(|| {
        let source = format!(
            "func depth(n) {{\n if n == 0 -> return 0\n return 1 + depth(n - 1)\n}}\ndepth({})",
            MAX_CALL_DEPTH - 1
        );
        expect_int(&eval(&source))
    });
    assert_eq!(value, MAX_CALL_DEPTH as i64 - 1);
}

#[test]
fn runaway_recursion_is_reported_and_catchable() {
    let (kind, output) = with_large_stack(|| {
        let (mut interpreter, output) = interpreter();
        let err = interpreter
            .eval_source("func f(n) -> f(n + 1)\nf(0)")
            .expect_err("unbounded recursion should fail");
        interpreter
            .eval_source(
                r#"
                class Nest {
                    func init() { inner = Nest() }
                }
                try { Nest() } catch { give error.kind }
                try { f(0) } catch { give error.kind }
                give "still alive"
                "#,
            )
            .expect("recursion errors are catchable");
        (err.kind(), output.contents())
    });
    assert_eq!(kind, Some(DiagnosticKind::RecursionLimit));
    assert_eq!(output, "RecursionLimit\nRecursionLimit\nstill alive\n");
}

#[test]
fn failed_unit_drops_its_pending_tasks() {
    let (mut interpreter, output) = interpreter();
    interpreter
        .eval_source("task late { give \"late\" }\ngive 1 / 0")
        .expect_err("division by zero");
    interpreter
        .eval_source(r#"give "next""#)
        .expect("next unit runs");
    assert_eq!(output.contents(), "next\n");
    interpreter
        .eval_source("await late")
        .expect("handle can still be awaited");
    assert_eq!(output.contents(), "next\nlate\n");
}

#[test]
fn maps_support_attribute_access_and_update() {
    let value = eval(
        r#"
        inventory = {"apples": 3}
        inventory.pears = 2
        inventory.apples += 1
        inventory
        "#,
    );
    match value.0.as_ref() {
        ValueKind::Map(map) => {
            assert_eq!(map.len(), 2);
            assert_eq!(expect_int(&map[&MapKey::String("apples".into())]), 4);
            assert_eq!(expect_int(&map[&MapKey::String("pears".into())]), 2);
        }
        _ => panic!("expected Map, found {}", value.type_name()),
    }
}

#[test]
fn indexing_lists_strings_and_maps() {
    assert_eq!(expect_int(&eval("[10, 20, 30][1]")), 20);
    assert_eq!(expect_string(&eval(r#""abc"[-1]"#)), "c");
    assert_eq!(expect_int(&eval(r#"m = {"k": 5}; m["k"]"#)), 5);
    assert_eq!(error_kind("[1][5]"), DiagnosticKind::IndexOutOfRange);
}

#[test]
fn native_builtins() {
    assert_eq!(expect_int(&eval(r#"len("héllo")"#)), 5);
    assert_eq!(expect_ints(&eval("func sq(x) -> x * x; map(sq, [1, 2, 3])")), vec![1, 4, 9]);
    assert_eq!(
        expect_ints(&eval("func odd(x) -> x % 2; filter(odd, [1, 2, 3, 4, 5])")),
        vec![1, 3, 5]
    );
    assert_eq!(expect_ints(&eval("push([1], 2)")), vec![1, 2]);
    assert_eq!(expect_string(&eval(r#"str(12) + "!""#)), "12!");
    assert_eq!(expect_string(&eval("type(1.5)")), "Float");
    assert_eq!(output_of(r#"print(1, "a", nil)"#), "1 a nil\n");
    assert_eq!(
        eval(r#"keys({"a": 1, "b": 2})"#).to_string(),
        "[a, b]"
    );
    assert_eq!(error_kind("len(1, 2)"), DiagnosticKind::TypeMismatch);
}

#[test]
fn ask_reads_from_injected_input() {
    let output = SharedOutput::default();
    let mut interpreter = Interpreter::new()
        .with_output(output.clone())
        .with_input(Cursor::new("Ada\nLovelace\n"));
    interpreter
        .eval_source(
            r#"
            name = ask "name? "
            ask -> surname
            give "hi " + name + " " + surname
            "#,
        )
        .expect("evaluation should succeed");
    assert_eq!(output.contents(), "name? hi Ada Lovelace\n");
}

#[test]
fn ask_at_end_of_input_yields_nil() {
    let mut interpreter = Interpreter::new().with_input(Cursor::new(""));
    let value = interpreter.eval_source("ask").expect("evaluation should succeed");
    assert!(value.is_nil());
}

#[test]
fn awaited_task_runs_once() {
    let source = r#"
        task compute {
            give "in task"
            return 42
        }
        give "before"
        give await compute
        give await compute
    "#;
    assert_eq!(output_of(source), "before\nin task\n42\n42\n");
}

#[test]
fn pending_tasks_drain_after_unit() {
    let (mut interpreter, output) = interpreter();
    interpreter
        .eval_source(r#"task background { give "background" }; give "main""#)
        .expect("evaluation should succeed");
    assert_eq!(output.contents(), "main\nbackground\n");
}

#[test]
fn awaiting_non_task_is_type_mismatch() {
    assert_eq!(error_kind("await 5"), DiagnosticKind::TypeMismatch);
}

#[test]
fn globals_persist_across_units() {
    let (mut interpreter, output) = interpreter();
    interpreter
        .eval_source("func greet(name) -> \"hello \" + name")
        .expect("define function");
    interpreter
        .eval_source("give greet(\"unik\")")
        .expect("call function");
    assert_eq!(output.contents(), "hello unik\n");
}

#[test]
fn type_annotations_are_ignored() {
    assert_eq!(expect_int(&eval("count: Int = 5; count * 2")), 10);
}
