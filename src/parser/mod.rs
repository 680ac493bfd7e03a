//! Parser module for Java fragments
//!
//! This module handles lexical analysis (logos) and recursive descent parsing
//! of expressions, statement sequences and class bodies into the arena AST.

pub mod lexer;
pub mod parser;
pub mod error;
pub mod scanner;
pub mod span;

pub use lexer::{Lexer, LexicalToken, Token};
pub use parser::Parser;
pub use error::{ParseError, ParseResult};
pub use scanner::Scanner;
pub use span::Location;

use crate::ast::Expr;
use crate::error::Result;

/// Parse a complete source text as a single expression
pub fn parse_expression(source: &str) -> Result<Expr> {
    let mut scanner = Scanner::new(source)?;
    let expr = Parser::new(&mut scanner).parse_expression()?;
    if !scanner.is_eof() {
        let token = scanner.peek();
        return Err(ParseError::unexpected_token("end of input", &token.describe(), token.location).into());
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn unit_with_class(name: &str) -> (CompilationUnit, ClassId) {
        let mut unit = CompilationUnit::new(None);
        let id = unit.add_class(ClassDecl::new(name, Location::start()));
        (unit, id)
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("a + b * c").expect("Failed to parse");
        match expr {
            Expr::Binary(BinaryExpr { operator: BinaryOp::Add, right, .. }) => {
                assert!(matches!(*right, Expr::Binary(BinaryExpr { operator: BinaryOp::Mul, .. })));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_conditional_and_cast() {
        let expr = parse_expression("total >= 100.0 ? 0.0 : (int) 7.95").expect("Failed to parse");
        match expr {
            Expr::Conditional(c) => {
                assert!(matches!(*c.condition, Expr::Binary(BinaryExpr { operator: BinaryOp::Ge, .. })));
                assert!(matches!(*c.else_expr, Expr::Cast(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_name_is_not_a_cast() {
        let expr = parse_expression("(a) + b").expect("Failed to parse");
        assert!(matches!(expr, Expr::Binary(_)));
        let expr = parse_expression("(String) o").expect("Failed to parse");
        assert!(matches!(expr, Expr::Cast(_)));
    }

    #[test]
    fn test_parse_min_int_literal() {
        let expr = parse_expression("-2147483648").expect("Failed to parse");
        assert!(matches!(expr, Expr::Literal(LiteralExpr { value: Literal::Int(i32::MIN), .. })));
        assert!(parse_expression("2147483648").is_err());
        let expr = parse_expression("0xFFFFFFFF").expect("Failed to parse");
        assert!(matches!(expr, Expr::Literal(LiteralExpr { value: Literal::Int(-1), .. })));
    }

    #[test]
    fn test_parse_error_location() {
        let err = parse_expression("a +\n  * b").unwrap_err();
        assert_eq!(err.location(), Some(Location::new(2, 3, 6)));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_expression("a b").is_err());
    }

    #[test]
    fn test_parse_imports() {
        let mut scanner = Scanner::new("import java.util.Map; import static java.lang.Math.max; import a.*;").unwrap();
        let mut parser = Parser::new(&mut scanner);
        assert!(matches!(parser.parse_import_declaration().unwrap(), ImportDecl::SingleType { ref name, .. } if name == "java.util.Map"));
        assert!(matches!(parser.parse_import_declaration().unwrap(), ImportDecl::StaticSingle { ref member, .. } if member == "max"));
        assert!(matches!(parser.parse_import_declaration().unwrap(), ImportDecl::OnDemand { ref package, .. } if package == "a"));
    }

    #[test]
    fn test_parse_class_body_declarations() {
        let source = r#"
            private static int counter = 0, other;
            static { counter = 1; }
            public SC(int x) { this(); }
            public SC() { super(); }
            public int next() { return ++counter; }
            public abstract void run();
            interface Callback { int call(int v); }
        "#;
        let (mut unit, class) = unit_with_class("SC");
        let mut scanner = Scanner::new(source).unwrap();
        let mut parser = Parser::new(&mut scanner);
        while !parser_at_end(&parser) {
            parser.parse_class_body_declaration(&mut unit, class).expect("Failed to parse");
        }
        let decl = unit.class(class);
        assert_eq!(decl.fields.len(), 2);
        assert_eq!(decl.constructors.len(), 2);
        assert_eq!(decl.methods.len(), 2);
        assert_eq!(decl.initializers.len(), 1);
        assert_eq!(decl.member_types.len(), 1);
        let ctor = unit.method(decl.constructors[0]);
        assert!(matches!(ctor.explicit_invocation, Some(ExplicitConstructorInvocation { is_super: false, .. })));
        let callback = unit.class(decl.member_types[0]);
        assert!(callback.is_interface);
        let call = unit.method(callback.methods[0]);
        assert!(call.modifiers.is_abstract());
        assert_eq!(unit.binary_name(decl.member_types[0]), "SC$Callback");
    }

    fn parser_at_end(parser: &Parser<'_>) -> bool {
        parser.is_at_end()
    }

    #[test]
    fn test_parse_block_statements() {
        let source = "int a = 1, b[] = {1, 2}; for (int i = 0; i < 3; i++) { a += i; } if (a > 2) return a; else { while (false) break; } return -a;";
        let mut scanner = Scanner::new(source).unwrap();
        let statements = Parser::new(&mut scanner).parse_block_statements().expect("Failed to parse");
        assert_eq!(statements.len(), 4);
        match &statements[0] {
            Stmt::Declaration(decl) => {
                assert_eq!(decl.variables.len(), 2);
                assert_eq!(decl.variables[1].array_dims, 1);
                assert!(matches!(decl.variables[1].initializer, Some(Expr::ArrayInitializer(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(statements[1], Stmt::For(_)));
        assert!(matches!(statements[2], Stmt::If(_)));
        assert!(scanner.is_eof());
    }

    #[test]
    fn test_unsupported_constructs_report_location() {
        let mut scanner = Scanner::new("switch (a) { }").unwrap();
        let err = Parser::new(&mut scanner).parse_block_statements().unwrap_err();
        assert_eq!(err.location(), Some(&Location::new(1, 1, 0)));
    }

    #[test]
    fn test_parse_new_array() {
        let expr = parse_expression("new int[] { 1, 2, 3 }").expect("Failed to parse");
        match expr {
            Expr::NewArray(n) => {
                assert!(n.dimension.is_none());
                assert_eq!(n.initializer.map(|i| i.elements.len()), Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse_expression("new String[n]").unwrap(), Expr::NewArray(_)));
    }
}
