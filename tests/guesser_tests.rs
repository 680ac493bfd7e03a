mod common;

use common::init_logging;
use tolc_eval::{guess_parameter_names, Error, GuessMode};

fn guess(source: &str, mode: GuessMode) -> Vec<String> {
    guess_parameter_names(source, mode).unwrap().into_iter().collect()
}

#[test]
fn expression_chains_propose_first_segment() {
    init_logging();
    assert_eq!(
        guess("import o.p;\na + b.c + d.e() + f() + g.h.I.j() + k.l.M", GuessMode::Expression),
        vec!["a", "b", "d"]
    );
}

#[test]
fn script_declarations_bind_names() {
    init_logging();
    assert_eq!(
        guess("import o.p;\nint a;\nreturn a + b.c + d.e() + f() + g.h.I.j() + k.l.M;", GuessMode::Script),
        vec!["b", "d"]
    );
}

#[test]
fn expression_mode_ignores_declaration_shapes() {
    init_logging();
    // `String s` is no declaration in an expression
    assert_eq!(guess("x instanceof String", GuessMode::Expression), vec!["x"]);
    assert_eq!(guess("(int) y + Math.PI", GuessMode::Expression), vec!["y"]);
}

#[test]
fn string_and_character_literals_are_opaque() {
    init_logging();
    assert_eq!(guess("\"a + b\" + c + 'd'", GuessMode::Expression), vec!["c"]);
}

#[test]
fn static_imports_bind_their_member() {
    init_logging();
    assert_eq!(
        guess("import static java.lang.Math.max;\nmax(lo, hi)", GuessMode::Expression),
        vec!["lo", "hi"]
    );
}

#[test]
fn block_scoped_declarations_stay_bound() {
    init_logging();
    let names = guess(
        "for (String item : items) { count++; String tag = item + suffix; }",
        GuessMode::Script,
    );
    assert_eq!(names, vec!["items", "count", "suffix"]);
}

#[test]
fn unterminated_literal_is_lexical_error() {
    init_logging();
    match guess_parameter_names("a + \"oops", GuessMode::Expression) {
        Err(Error::Lexical { .. }) => {}
        other => panic!("unexpected {:?}", other),
    }
}
