#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use rox::error::LoxError;
    use rox::interpreter::Interpreter;
    use rox::parser::Parser;
    use rox::resolver::Resolver;
    use rox::scanner::Scanner;
    use rox::token::Token;

    /// A `print` sink the test keeps a handle on while the interpreter
    /// owns a clone.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run a program through the whole pipeline; scan/parse/resolve must
    /// succeed, runtime errors come back for inspection.
    fn run_source(source: &str) -> (String, Option<LoxError>) {
        let buf = SharedBuf::default();
        let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));

        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .expect("scan failed");

        let mut parser = Parser::new(tokens);
        let statements = parser.parse();

        assert!(
            parser.errors().is_empty(),
            "parse errors: {:?}",
            parser.errors()
        );

        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve(&statements);

        assert!(
            resolver.errors().is_empty(),
            "resolve errors: {:?}",
            resolver.errors()
        );

        let err = interpreter.interpret(&statements).err();
        let output = String::from_utf8(buf.0.borrow().clone()).expect("output not UTF-8");

        (output, err)
    }

    fn run_ok(source: &str) -> String {
        let (output, err) = run_source(source);

        assert!(err.is_none(), "unexpected runtime error: {:?}", err);

        output
    }

    fn run_err(source: &str) -> LoxError {
        let (_, err) = run_source(source);

        err.expect("expected a runtime error")
    }

    // ── the end-to-end scenarios ────────────────────────────────────────

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
    }

    #[test]
    fn test_block_shadowing() {
        // The shadow may not read the name it is shadowing in its own
        // initializer, so it derives the value through a second binding.
        assert_eq!(
            run_ok(
                "var a = \"hi\";\
                 { var b = a + \"!\"; var a = b; print a; }\
                 print a;"
            ),
            "hi!\nhi\n"
        );
    }

    #[test]
    fn test_closure_counter() {
        assert_eq!(
            run_ok(
                "fun c() { var i = 0; fun inc() { i = i + 1; return i; } return inc; }\
                 var f = c();\
                 print f(); print f(); print f();"
            ),
            "1\n2\n3\n"
        );
    }

    #[test]
    fn test_class_method_call() {
        assert_eq!(
            run_ok("class A { greet() { print \"hi\"; } } A().greet();"),
            "hi\n"
        );
    }

    #[test]
    fn test_inheritance_with_super_init() {
        assert_eq!(
            run_ok(
                "class A { init(n) { this.n = n; } }\
                 class B < A {\
                   init(n) { super.init(n); this.m = n * 2; }\
                   show() { print this.n; print this.m; }\
                 }\
                 B(3).show();"
            ),
            "3\n6\n"
        );
    }

    #[test]
    fn test_for_loop() {
        assert_eq!(run_ok("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
    }

    // ── values, truthiness, equality ────────────────────────────────────

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(
            run_ok("print \"a\" or \"b\"; print nil or \"b\"; print nil and 1; print 1 and 2;"),
            "a\nb\nnil\n2\n"
        );
    }

    #[test]
    fn test_zero_and_empty_string_are_truthy() {
        assert_eq!(
            run_ok("if (0) print \"zero\"; if (\"\") print \"empty\"; if (nil) print \"nil\";"),
            "zero\nempty\n"
        );
    }

    #[test]
    fn test_equality_rules() {
        assert_eq!(
            run_ok(
                "print 1 == 1; print \"a\" == \"a\"; print nil == nil;\
                 print 1 == \"1\"; print true == 1; print 1 != 2;"
            ),
            "true\ntrue\ntrue\nfalse\nfalse\ntrue\n"
        );
    }

    #[test]
    fn test_equality_is_reflexive_even_for_nan() {
        assert_eq!(run_ok("var nan = 0 / 0; print nan == nan;"), "true\n");
    }

    #[test]
    fn test_division_by_zero_yields_infinity() {
        assert_eq!(run_ok("print 1 / 0;"), "inf\n");
        assert_eq!(run_ok("print -1 / 0;"), "-inf\n");
    }

    #[test]
    fn test_number_stringification() {
        assert_eq!(run_ok("print 3.0; print 2.5; print -0.5;"), "3\n2.5\n-0.5\n");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(run_ok("print -(3); print !true; print !nil; print !0;"), "-3\ntrue\nfalse\nfalse\n");
    }

    #[test]
    fn test_uninitialized_var_is_nil() {
        assert_eq!(run_ok("var a; print a;"), "nil\n");
    }

    #[test]
    fn test_callable_stringification() {
        assert_eq!(
            run_ok("fun f() {} class A {} print f; print A; print A(); print clock;"),
            "<fn f>\nA\nA instance\n<native fn>\n"
        );
    }

    // ── control flow ────────────────────────────────────────────────────

    #[test]
    fn test_if_else() {
        assert_eq!(run_ok("if (false) print 1; else print 2;"), "2\n");
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(
            run_ok("var i = 0; while (i < 2) { print i; i = i + 1; }"),
            "0\n1\n"
        );
    }

    #[test]
    fn test_assignment_evaluates_to_value() {
        assert_eq!(run_ok("var a; print a = 7;"), "7\n");
    }

    #[test]
    fn test_return_unwinds_nested_blocks_and_restores_scope() {
        assert_eq!(
            run_ok(
                "fun f() { { var x = 1; { return x; } } }\
                 print f(); print f();"
            ),
            "1\n1\n"
        );
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
    }

    // ── closures & binding distances ────────────────────────────────────

    #[test]
    fn test_closure_sees_current_value_not_snapshot() {
        assert_eq!(
            run_ok(
                "var f;\
                 { var i = 0; fun g() { print i; } f = g; i = 10; }\
                 f();"
            ),
            "10\n"
        );
    }

    #[test]
    fn test_static_scoping_over_later_shadowing() {
        assert_eq!(
            run_ok(
                "var g = \"global\";\
                 {\
                   fun show() { print g; }\
                   show();\
                   var g = \"block\";\
                   show();\
                 }"
            ),
            "global\nglobal\n"
        );
    }

    #[test]
    fn test_sibling_closures_share_a_scope() {
        assert_eq!(
            run_ok(
                "fun pair() {\
                   var n = 0;\
                   fun bump() { n = n + 1; }\
                   fun read() { return n; }\
                   bump(); bump();\
                   return read;\
                 }\
                 print pair()();"
            ),
            "2\n"
        );
    }

    #[test]
    fn test_mutual_recursion_between_globals() {
        assert_eq!(
            run_ok(
                "fun isEven(n) { if (n == 0) return true; return isOdd(n - 1); }\
                 fun isOdd(n) { if (n == 0) return false; return isEven(n - 1); }\
                 print isEven(4); print isOdd(4);"
            ),
            "true\nfalse\n"
        );
    }

    // ── classes ─────────────────────────────────────────────────────────

    #[test]
    fn test_fields_shadow_methods() {
        assert_eq!(
            run_ok(
                "class A { m() { return \"method\"; } }\
                 var a = A();\
                 a.m = 1;\
                 print a.m;"
            ),
            "1\n"
        );
    }

    #[test]
    fn test_bound_method_remembers_instance() {
        assert_eq!(
            run_ok(
                "class Counter {\
                   init() { this.n = 0; }\
                   inc() { this.n = this.n + 1; return this.n; }\
                 }\
                 var c = Counter();\
                 var inc = c.inc;\
                 print inc();\
                 print c.n;"
            ),
            "1\n1\n"
        );
    }

    #[test]
    fn test_initializer_always_returns_instance() {
        assert_eq!(
            run_ok("class A { init() { this.x = 1; return; } } var a = A(); print a.x;"),
            "1\n"
        );
    }

    #[test]
    fn test_method_override_and_super_dispatch() {
        assert_eq!(
            run_ok(
                "class A { m() { return \"A\"; } }\
                 class B < A { m() { return \"B\"; } viaSuper() { return super.m(); } }\
                 print B().m();\
                 print B().viaSuper();"
            ),
            "B\nA\n"
        );
    }

    #[test]
    fn test_inherited_method_without_override() {
        assert_eq!(
            run_ok("class A { m() { return 1; } } class B < A {} print B().m();"),
            "1\n"
        );
    }

    #[test]
    fn test_instance_state_cycle_is_tolerated() {
        // A field holding a bound method that closes over the instance.
        assert_eq!(
            run_ok(
                "class A { init() { this.self = this.me; } me() { return this; } }\
                 var a = A();\
                 print a.self() == a;"
            ),
            "true\n"
        );
    }

    // ── runtime errors ──────────────────────────────────────────────────

    #[test]
    fn test_undefined_variable() {
        let err = run_err("print missing;");

        assert!(err.to_string().contains("Undefined variable 'missing'."));
    }

    #[test]
    fn test_undefined_property() {
        let err = run_err("class A {} print A().missing;");

        assert!(err.to_string().contains("Undefined property 'missing'."));
    }

    #[test]
    fn test_string_plus_number_is_an_error() {
        let err = run_err("print \"a\" + 1;");

        assert!(err
            .to_string()
            .contains("Operands must be two numbers or two strings."));
    }

    #[test]
    fn test_comparison_requires_numbers() {
        let err = run_err("print \"a\" < \"b\";");

        assert!(err.to_string().contains("Operands must be numbers."));
    }

    #[test]
    fn test_negating_a_string_is_an_error() {
        let err = run_err("print -\"a\";");

        assert!(err.to_string().contains("Operand must be a number."));
    }

    #[test]
    fn test_calling_a_non_callable() {
        let err = run_err("\"str\"();");

        assert!(err
            .to_string()
            .contains("Can only call functions and classes."));
    }

    #[test]
    fn test_non_callable_reported_before_arguments_run() {
        // The callee is rejected first, so the undefined argument is
        // never evaluated.
        let err = run_err("\"str\"(missing);");

        assert!(err
            .to_string()
            .contains("Can only call functions and classes."));
    }

    #[test]
    fn test_arguments_have_no_effect_for_non_callable() {
        let (output, err) = run_source(
            "fun shout(x) { print x; return x; }\
             \"str\"(shout(1));",
        );

        assert_eq!(output, "");

        let err = err.expect("expected a runtime error");
        assert!(err
            .to_string()
            .contains("Can only call functions and classes."));
    }

    #[test]
    fn test_arity_mismatch() {
        let err = run_err("fun f(a, b) {} f(1);");

        assert!(err.to_string().contains("Expected 2 arguments but got 1."));
    }

    #[test]
    fn test_property_access_on_non_instance() {
        let err = run_err("var s = \"str\"; print s.len;");

        assert!(err.to_string().contains("Only instances have properties."));
    }

    #[test]
    fn test_field_write_on_non_instance() {
        let err = run_err("var n = 1; n.x = 2;");

        assert!(err.to_string().contains("Only instances have fields."));
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let err = run_err("var NotAClass = 1; class B < NotAClass {}");

        assert!(err.to_string().contains("Superclass must be a class."));
    }

    #[test]
    fn test_undefined_super_method() {
        let err = run_err(
            "class A {} class B < A { m() { return super.missing(); } } B().m();",
        );

        assert!(err.to_string().contains("Undefined property 'missing'."));
    }

    #[test]
    fn test_runtime_error_reports_line() {
        let err = run_err("var a = 1;\nprint b;");

        assert!(err.to_string().contains("[line 2]"));
    }

    #[test]
    fn test_assignment_to_undefined_variable() {
        let err = run_err("missing = 1;");

        assert!(err.to_string().contains("Undefined variable 'missing'."));
    }

    // ── natives ─────────────────────────────────────────────────────────

    #[test]
    fn test_clock_returns_a_number() {
        assert_eq!(run_ok("print clock() >= 0;"), "true\n");
    }

    #[test]
    fn test_clock_arity_is_checked() {
        let err = run_err("clock(1);");

        assert!(err.to_string().contains("Expected 0 arguments but got 1."));
    }
}
