//! Best-effort detection of the free variables of a fragment
//!
//! Works on tokens only. Leading imports and (for scripts) local variable
//! declarations, enhanced `for` variables included, bind names; every dotted
//! chain that starts with an unbound lower-case segment and is neither a
//! call nor a qualified type name proposes its first segment as a parameter.
//! Anything that does not fit those shapes is left out.

use std::collections::HashSet;

use indexmap::IndexSet;
use log::trace;

use crate::error::Result;
use crate::parser::{LexicalToken, Scanner, Token};

/// Shape of the fragment being scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessMode {
    Expression,
    /// Statements: local declarations bind their names
    Script,
}

/// Names the fragment uses without declaring or importing them, in order of
/// first use
///
/// Errors only when the fragment cannot be tokenized.
pub fn guess_parameter_names(source: &str, mode: GuessMode) -> Result<IndexSet<String>> {
    let mut scanner = Scanner::new(source)?;
    let mut guesser = Guesser::default();
    guesser.consume_imports(&mut scanner);
    let mut tokens = Vec::new();
    while !scanner.is_eof() {
        tokens.push(scanner.read());
    }
    guesser.scan(&tokens, mode);
    trace!("Guessed parameters {:?} (bound {:?})", guesser.candidates, guesser.bound);
    Ok(guesser.candidates)
}

#[derive(Default)]
struct Guesser {
    bound: HashSet<String>,
    candidates: IndexSet<String>,
}

fn is(tokens: &[LexicalToken], i: usize, t: &Token) -> bool {
    tokens.get(i).map_or(false, |token| token.is(t))
}

fn follows_declared_name(tokens: &[LexicalToken], i: usize) -> bool {
    [Token::Assign, Token::Semicolon, Token::Comma, Token::LBracket, Token::Colon]
        .iter()
        .any(|t| is(tokens, i, t))
}

fn starts_upper_case(name: &str) -> bool {
    name.chars().next().map_or(false, char::is_uppercase)
}

impl Guesser {
    /// `import [static] a.b.C;` binds `C`; on-demand imports bind nothing
    fn consume_imports(&mut self, scanner: &mut Scanner) {
        while scanner.is_keyword("import") {
            scanner.read();
            let mut last = None;
            while !scanner.is_eof() && !scanner.peek().is(&Token::Semicolon) {
                let token = scanner.read();
                last = match token.token {
                    Token::Identifier => Some(token.lexeme),
                    Token::Star => None,
                    _ => last,
                };
            }
            scanner.read();
            if let Some(name) = last {
                self.bound.insert(name);
            }
        }
    }

    /// Index of the name declared by `Type name` starting at `i`
    fn declaration_at(tokens: &[LexicalToken], i: usize) -> Option<usize> {
        let first = tokens.get(i)?;
        let mut j = i + 1;
        if first.is(&Token::Identifier) {
            while is(tokens, j, &Token::Dot) && is(tokens, j + 1, &Token::Identifier) {
                j += 2;
            }
        } else if !first.token.is_primitive_type() {
            return None;
        }
        while is(tokens, j, &Token::LBracket) && is(tokens, j + 1, &Token::RBracket) {
            j += 2;
        }
        (is(tokens, j, &Token::Identifier) && follows_declared_name(tokens, j + 1)).then_some(j)
    }

    fn scan(&mut self, tokens: &[LexicalToken], mode: GuessMode) {
        let mut depth = 0usize;
        // Nesting depth of the declaration whose declarators are being read
        let mut declaration: Option<usize> = None;
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.token {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    depth = depth.saturating_sub(1);
                    if declaration.map_or(false, |d| depth < d) {
                        declaration = None;
                    }
                }
                Token::Semicolon if declaration == Some(depth) => declaration = None,
                Token::Comma if declaration == Some(depth) => {
                    if is(tokens, i + 1, &Token::Identifier) && follows_declared_name(tokens, i + 2) {
                        self.bound.insert(tokens[i + 1].lexeme.clone());
                        i += 2;
                        continue;
                    }
                }
                _ => {}
            }

            let after_dot = i > 0 && (tokens[i - 1].is(&Token::Dot) || tokens[i - 1].is(&Token::New));
            if mode == GuessMode::Script && !after_dot {
                if let Some(name) = Self::declaration_at(tokens, i) {
                    self.bound.insert(tokens[name].lexeme.clone());
                    declaration = Some(depth);
                    i = name + 1;
                    continue;
                }
            }
            if token.is(&Token::Identifier) && !after_dot {
                i = self.chain(tokens, i);
                continue;
            }
            i += 1;
        }
    }

    /// Read the chain `ident (. ident)*` at `start`; returns the index after it
    fn chain(&mut self, tokens: &[LexicalToken], start: usize) -> usize {
        let mut segments = vec![start];
        let mut j = start + 1;
        while is(tokens, j, &Token::Dot) && is(tokens, j + 1, &Token::Identifier) {
            segments.push(j + 1);
            j += 2;
        }
        let invoked = segments.iter().position(|&s| is(tokens, s + 1, &Token::LParen));
        if invoked == Some(0) {
            return j;
        }
        let before_call = &segments[..invoked.unwrap_or(segments.len())];
        if before_call.iter().any(|&s| starts_upper_case(&tokens[s].lexeme)) {
            return j;
        }
        let name = &tokens[start].lexeme;
        if !self.bound.contains(name) {
            self.candidates.insert(name.clone());
        }
        // A call in the middle of the chain ends it; the rest starts after `(`
        match invoked {
            Some(k) => segments[k] + 1,
            None => j,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(source: &str, mode: GuessMode) -> Vec<String> {
        guess_parameter_names(source, mode).unwrap().into_iter().collect()
    }

    #[test]
    fn test_expression_form() {
        let names = guess("import o.p;\na + b.c + d.e() + f() + g.h.I.j() + k.l.M", GuessMode::Expression);
        assert_eq!(names, vec!["a", "b", "d"]);
    }

    #[test]
    fn test_script_form() {
        let names = guess(
            "import o.p;\nint a;\nreturn a + b.c + d.e() + f() + g.h.I.j() + k.l.M;",
            GuessMode::Script,
        );
        assert_eq!(names, vec!["b", "d"]);
    }

    #[test]
    fn test_imported_names_are_bound() {
        assert_eq!(guess("import static java.lang.Math.max;\nmax + x", GuessMode::Expression), vec!["x"]);
        assert_eq!(guess("import java.util.*;\nutil + x", GuessMode::Expression), vec!["util", "x"]);
    }

    #[test]
    fn test_use_before_declaration_is_free() {
        let names = guess("x = 1; int x = 2, y = x; return x + y + z;", GuessMode::Script);
        assert_eq!(names, vec!["x", "z"]);
    }

    #[test]
    fn test_for_initializer_and_arrays() {
        let names = guess(
            "int[] values = { n, 2 }; for (int i = 0, j = 1; i < values.length; i++) total += values[i] * j;",
            GuessMode::Script,
        );
        assert_eq!(names, vec!["n", "total"]);
    }

    #[test]
    fn test_new_and_member_names_are_skipped() {
        let names = guess("new java.util.Date(t).getTime() + s.length()", GuessMode::Expression);
        assert_eq!(names, vec!["t", "s"]);
    }

    #[test]
    fn test_repeated_names_keep_first_position() {
        let names = guess("b * a + a * b", GuessMode::Expression);
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_lexical_error() {
        assert!(guess_parameter_names("a + \"unterminated", GuessMode::Expression).is_err());
    }
}
