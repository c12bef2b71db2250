#[cfg(test)]
mod parser_tests {
    use rox::ast_printer::AstPrinter;
    use rox::error::LoxError;
    use rox::parser::Parser;
    use rox::scanner::Scanner;
    use rox::stmt::Stmt;
    use rox::token::Token;

    fn parse_source(source: &str) -> (Vec<Stmt>, Vec<LoxError>) {
        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .expect("scan failed");

        let mut parser = Parser::new(tokens);
        let statements = parser.parse();
        let errors = parser.take_errors();

        (statements, errors)
    }

    /// Parse a single statement and return its prefix form.
    fn parse_one(source: &str) -> String {
        let (statements, errors) = parse_source(source);

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        assert_eq!(statements.len(), 1);

        AstPrinter::print_stmt(&statements[0])
    }

    #[test]
    fn test_precedence_term_vs_factor() {
        assert_eq!(parse_one("1 + 2 * 3;"), "(; (+ 1.0 (* 2.0 3.0)))");
    }

    #[test]
    fn test_binary_is_left_associative() {
        assert_eq!(parse_one("1 - 2 - 3;"), "(; (- (- 1.0 2.0) 3.0))");
        assert_eq!(parse_one("8 / 4 / 2;"), "(; (/ (/ 8.0 4.0) 2.0))");
    }

    #[test]
    fn test_unary_is_right_associative() {
        assert_eq!(parse_one("!!true;"), "(; (! (! true)))");
        assert_eq!(parse_one("--1;"), "(; (- (- 1.0)))");
    }

    #[test]
    fn test_grouping_overrides_precedence() {
        assert_eq!(parse_one("(1 + 2) * 3;"), "(; (* (group (+ 1.0 2.0)) 3.0))");
    }

    #[test]
    fn test_comparison_binds_tighter_than_equality() {
        assert_eq!(parse_one("1 < 2 == true;"), "(; (== (< 1.0 2.0) true))");
    }

    #[test]
    fn test_logical_or_lower_than_and() {
        assert_eq!(parse_one("a or b and c;"), "(; (or a (and b c)))");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(parse_one("a = b = 1;"), "(; (= a (= b 1.0)))");
    }

    #[test]
    fn test_assignment_to_property() {
        assert_eq!(parse_one("a.b = 2;"), "(; (set a b 2.0))");
    }

    #[test]
    fn test_call_and_property_chain() {
        assert_eq!(parse_one("a.b(1).c;"), "(; (get (call (get a b) 1.0) c))");
    }

    #[test]
    fn test_invalid_assignment_target_reported_not_fatal() {
        let (statements, errors) = parse_source("1 = 2;");

        // Reported at the '=', but the statement still parses.
        assert_eq!(statements.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Invalid assignment target."));
    }

    #[test]
    fn test_for_desugars_to_while() {
        assert_eq!(
            parse_one("for (var i = 0; i < 3; i = i + 1) print i;"),
            "(block (var i 0.0) (while (< i 3.0) (block (print i) (; (= i (+ i 1.0))))))"
        );
    }

    #[test]
    fn test_for_with_empty_clauses() {
        assert_eq!(parse_one("for (;;) print 1;"), "(while true (print 1.0))");
    }

    #[test]
    fn test_for_without_initializer() {
        assert_eq!(
            parse_one("for (; a < 3;) print a;"),
            "(while (< a 3.0) (print a))"
        );
    }

    #[test]
    fn test_if_else_attaches_to_nearest() {
        assert_eq!(
            parse_one("if (a) if (b) print 1; else print 2;"),
            "(if a (if b (print 1.0) (print 2.0)))"
        );
    }

    #[test]
    fn test_while_statement() {
        assert_eq!(
            parse_one("while (a) { a = a - 1; }"),
            "(while a (block (; (= a (- a 1.0)))))"
        );
    }

    #[test]
    fn test_var_declaration_forms() {
        assert_eq!(parse_one("var a;"), "(var a)");
        assert_eq!(parse_one("var a = 1 + 2;"), "(var a (+ 1.0 2.0))");
    }

    #[test]
    fn test_function_declaration() {
        assert_eq!(
            parse_one("fun add(a, b) { return a + b; }"),
            "(fun add (a b) (return (+ a b)))"
        );
    }

    #[test]
    fn test_return_without_value() {
        assert_eq!(parse_one("fun f() { return; }"), "(fun f () (return))");
    }

    #[test]
    fn test_class_declaration() {
        assert_eq!(parse_one("class Empty {}"), "(class Empty)");

        assert_eq!(
            parse_one("class B < A { m() { return super.m(); } }"),
            "(class B (< A) (fun m () (return (call (super m)))))"
        );
    }

    #[test]
    fn test_this_and_super_in_methods() {
        assert_eq!(
            parse_one("class A { m() { return this.x; } }"),
            "(class A (fun m () (return (get this x))))"
        );
    }

    #[test]
    fn test_synchronize_recovers_at_statement_boundary() {
        let (statements, errors) = parse_source("var = 1; print 2;");

        // The broken declaration is dropped, the next one survives.
        assert!(!errors.is_empty());
        assert_eq!(statements.len(), 1);
        assert_eq!(AstPrinter::print_stmt(&statements[0]), "(print 2.0)");
    }

    #[test]
    fn test_synchronize_recovers_on_keyword() {
        let (statements, errors) = parse_source("1 + ; var a = 2;");

        assert!(!errors.is_empty());
        assert_eq!(statements.len(), 1);
        assert_eq!(AstPrinter::print_stmt(&statements[0]), "(var a 2.0)");
    }

    #[test]
    fn test_missing_semicolon_reports_expected_token() {
        let (_, errors) = parse_source("print 1");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Expect ';' after value."));
    }

    #[test]
    fn test_error_mentions_offending_lexeme() {
        let (_, errors) = parse_source("print (1;");

        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .contains("at ';': Expect ')' after expression."));
    }

    #[test]
    fn test_255_arguments_accepted() {
        let args = vec!["1"; 255].join(", ");
        let (statements, errors) = parse_source(&format!("f({});", args));

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_256_arguments_reported() {
        let args = vec!["1"; 256].join(", ");
        let (statements, errors) = parse_source(&format!("f({});", args));

        // Reported but non-fatal: the call still parses.
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .contains("Can't have more than 255 arguments."));
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_256_parameters_reported() {
        let params = (0..256)
            .map(|i| format!("p{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let (_, errors) = parse_source(&format!("fun f({}) {{}}", params));

        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .contains("Can't have more than 255 parameters."));
    }
}
