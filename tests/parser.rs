use unik::{
    ast::{BinaryOp, ExprKind, FunctionBody, Literal, StmtKind},
    diagnostics::{DiagnosticKind, SourceSpan},
    lexer::tokenize,
    parser::{Parser, parse_program},
};

fn single_statement(source: &str) -> StmtKind {
    let mut program = parse_program(source).expect("parse should succeed");
    assert_eq!(program.items.len(), 1, "expected one statement");
    program.items.remove(0).kind
}

fn parse_error(source: &str) -> unik::Diagnostic {
    match parse_program(source) {
        Ok(program) => panic!("expected parse error, parsed {program:?}"),
        Err(err) => err,
    }
}

#[test]
fn multiplication_nests_under_addition() {
    let StmtKind::Expr(expr) = single_statement("2 + 3 * 4") else {
        panic!("expected expression statement");
    };
    let ExprKind::Binary { op, left, right } = expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(left.kind, ExprKind::Literal(Literal::Int(2))));
    assert!(matches!(
        right.kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn binary_operators_are_left_associative() {
    let StmtKind::Expr(expr) = single_statement("8 - 4 - 2") else {
        panic!("expected expression statement");
    };
    let ExprKind::Binary { op, left, .. } = expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(op, BinaryOp::Sub);
    assert!(matches!(
        left.kind,
        ExprKind::Binary {
            op: BinaryOp::Sub,
            ..
        }
    ));
}

#[test]
fn decimal_literals_are_floats() {
    let StmtKind::Expr(expr) = single_statement("2.50") else {
        panic!("expected expression statement");
    };
    assert!(matches!(expr.kind, ExprKind::Literal(Literal::Float(n)) if n == 2.5));
}

#[test]
fn function_forms() {
    let StmtKind::Function(decl) = single_statement("func add(a, b) -> a + b") else {
        panic!("expected function");
    };
    assert_eq!(decl.params, vec!["a".to_string(), "b".to_string()]);
    assert!(matches!(decl.body, FunctionBody::Expr(_)));

    let StmtKind::Function(decl) = single_statement("func noop() { }") else {
        panic!("expected function");
    };
    assert!(matches!(&decl.body, FunctionBody::Block(body) if body.is_empty()));
}

#[test]
fn numeric_loop_with_step() {
    let StmtKind::NumericFor { binding, step, body, .. } =
        single_statement("loop i in 0..10, 2 -> give i")
    else {
        panic!("expected numeric loop");
    };
    assert_eq!(binding, "i");
    assert!(step.is_some());
    assert_eq!(body.len(), 1);
}

#[test]
fn iterable_loop() {
    assert!(matches!(
        single_statement("loop item in items { give item }"),
        StmtKind::ForEach { .. }
    ));
}

#[test]
fn else_if_chains_nest() {
    let StmtKind::If { else_branch, .. } =
        single_statement("if a { give 1 } else if b { give 2 } else { give 3 }")
    else {
        panic!("expected if");
    };
    let else_branch = else_branch.expect("else branch");
    assert!(matches!(
        else_branch.as_slice(),
        [stmt] if matches!(stmt.kind, StmtKind::If { else_branch: Some(_), .. })
    ));
}

#[test]
fn compound_assignment_carries_operator() {
    assert!(matches!(
        single_statement("total *= 3"),
        StmtKind::Assign {
            op: Some(BinaryOp::Mul),
            ..
        }
    ));
}

#[test]
fn ask_with_target_becomes_assignment() {
    let StmtKind::Assign { target, value, .. } = single_statement(r#"ask "name? " -> name"#) else {
        panic!("expected assignment");
    };
    assert!(matches!(target.kind, ExprKind::Variable(ref name) if name == "name"));
    assert!(matches!(value.kind, ExprKind::Input(Some(_))));
}

#[test]
fn class_collects_fields_and_methods() {
    let StmtKind::Class(decl) = single_statement(
        r#"
        class Greeter {
            greeting = "hi"
            func greet(name) -> self.greeting + name
        }
        "#,
    ) else {
        panic!("expected class");
    };
    assert_eq!(decl.name, "Greeter");
    assert_eq!(decl.fields.len(), 1);
    assert_eq!(decl.methods.len(), 1);
}

#[test]
fn class_body_rejects_other_statements() {
    let err = parse_error("class Broken { give 1 }");
    assert_eq!(err.kind, DiagnosticKind::Parser);
}

#[test]
fn codegen_request_keeps_prompt() {
    assert!(matches!(
        single_statement(r#"aik @{ "write an add function" }"#),
        StmtKind::CodeGen(ref prompt) if prompt == "write an add function"
    ));
}

#[test]
fn try_requires_catch_or_finally() {
    let err = parse_error("try { x = 1 }");
    assert!(err.message.contains("`catch` or `finally`"), "{}", err.message);
}

#[test]
fn invalid_assignment_target() {
    let err = parse_error("1 = 2");
    assert_eq!(err.kind, DiagnosticKind::Parser);
    assert_eq!(err.span, Some(SourceSpan::new(1, 1)));
}

#[test]
fn error_names_expected_and_found() {
    let err = parse_error("func (a) -> a");
    assert_eq!(err.message, "expected function name, found `(`");
    assert_eq!(err.span, Some(SourceSpan::new(1, 6)));

    let err = parse_error("give (1 + 2");
    assert_eq!(err.message, "expected `)` after expression, found end of input");
}

#[test]
fn semicolons_separate_statements() {
    let program = parse_program("x = 1; y = 2;; give x").expect("parse should succeed");
    assert_eq!(program.items.len(), 3);
}

#[test]
fn wide_integer_literal_parses_as_float() {
    let StmtKind::Expr(expr) = single_statement("99999999999999999999") else {
        panic!("expected expression statement");
    };
    assert!(matches!(expr.kind, ExprKind::Literal(Literal::Float(n)) if n == 1e20));
}

#[test]
fn inline_give_arms_stop_at_comma() {
    let StmtKind::Alter { arms, default, .. } =
        single_statement(r#"alter x { 1 -> give "one", 2 -> give "two", else -> give "other" }"#)
    else {
        panic!("expected alter");
    };
    assert_eq!(arms.len(), 2);
    for arm in &arms {
        assert!(matches!(arm.body.as_slice(), [stmt] if matches!(&stmt.kind, StmtKind::Print(parts) if parts.len() == 1)));
    }
    assert!(default.is_some());
}

#[test]
fn parser_accepts_token_streams_without_end_marker() {
    let program = Parser::new(Vec::new())
        .parse_program()
        .expect("empty stream parses");
    assert!(program.items.is_empty());

    let mut tokens = tokenize("give 1").expect("tokenize should succeed");
    tokens.pop();
    let program = Parser::new(tokens)
        .parse_program()
        .expect("missing end marker is supplied");
    assert_eq!(program.items.len(), 1);
}
