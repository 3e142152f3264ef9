// tests/tokenizer_tests.rs — rewrite loop behavior.

use proptest::prelude::*;

use tessera::matchers::{
    any, capture, conjunction, literal_char, negate, sequence, wildcard, Wildcard,
};
use tessera::token::{EOF, SOF};
use tessera::{tokenize, tokenize_seeded, Rule, Span, TesseraError, Token, TokenArgs};

#[test]
fn test_seed_shape_for_empty_input() {
    let tokens = tokenize("", &[]).unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].name(), SOF);
    assert_eq!(tokens[1].name(), EOF);
    assert_eq!(tokens[1].start(), 0);
}

proptest! {
    // SOF, one character token per code point in order with 0-based starts
    // and length 1, EOF.
    #[test]
    fn test_seed_is_one_token_per_codepoint(text in ".{0,64}") {
        let tokens = tokenize(&text, &[]).unwrap();
        let codepoints: Vec<char> = text.chars().collect();
        prop_assert_eq!(tokens.len(), codepoints.len() + 2);
        prop_assert_eq!(tokens[0].name(), SOF);
        prop_assert_eq!(tokens[tokens.len() - 1].name(), EOF);
        prop_assert_eq!(tokens[tokens.len() - 1].start(), codepoints.len());
        for (i, c) in codepoints.iter().enumerate() {
            let token = &tokens[i + 1];
            prop_assert!(token.is_char());
            prop_assert_eq!(token.raw_value(), c.to_string());
            prop_assert_eq!(token.start(), i);
            prop_assert_eq!(token.length(), 1);
        }
    }
}

#[test]
fn test_deletion_builder_drops_the_span() {
    let rules = [Rule::emit(wildcard(Wildcard::Whitespace), |_, _, _| {
        Vec::new()
    })];
    let tokens = tokenize("a b\tc", &rules).unwrap();
    let values: Vec<String> = tokens.iter().map(Token::raw_value).collect();
    assert_eq!(values, vec!["", "a", "b", "c", ""]);
}

#[test]
fn test_composite_position_covers_matched_children() {
    let rules = [Rule::wrap(
        sequence(vec![literal_char("b"), literal_char("c")]),
        "bc",
    )];
    let tokens = tokenize("abcd", &rules).unwrap();
    let node = &tokens[2];
    assert_eq!(node.name(), "bc");
    assert_eq!(node.start(), 1);
    assert_eq!(node.length(), 2);
    assert_eq!(node.children().len(), 2);
}

#[test]
fn test_rule_reapplies_at_replacement_site() {
    // Folding pairs of 'a' into one composite repeatedly needs re-matching
    // at the same index after each splice.
    let rules = [Rule::emit(
        sequence(vec![literal_char("a"), literal_char("a")]),
        |_, span, _| vec![Token::character("a", span)],
    )];
    let tokens = tokenize("aaaa", &rules).unwrap();
    let values: Vec<String> = tokens.iter().map(Token::raw_value).collect();
    assert_eq!(values, vec!["", "a", ""]);
}

#[test]
fn test_recursive_rules_reduce_nested_structure() {
    let not_paren = || {
        conjunction(vec![
            negate(literal_char("(")),
            negate(literal_char(")")),
        ])
    };
    let rules = [Rule::wrap(
        sequence(vec![literal_char("("), any(not_paren()), literal_char(")")]),
        "parens",
    )
    .recursive()];

    let tokens = tokenize("((x)(y))", &rules).unwrap();
    assert_eq!(tokens.len(), 3);
    let outer = &tokens[1];
    assert_eq!(outer.name(), "parens");
    assert_eq!(outer.raw_value(), "((x)(y))");
    // Inner groups became nodes of the same name.
    let inner: Vec<&str> = outer
        .children()
        .iter()
        .filter(|t| !t.is_char())
        .map(Token::name)
        .collect();
    assert_eq!(inner, vec!["parens", "parens"]);
}

#[test]
fn test_fixpoint_is_idempotent() {
    let not_paren = || {
        conjunction(vec![
            negate(literal_char("(")),
            negate(literal_char(")")),
        ])
    };
    let rules = [Rule::wrap(
        sequence(vec![literal_char("("), any(not_paren()), literal_char(")")]),
        "parens",
    )
    .recursive()];

    let converged = tokenize("((a)((b)))", &rules).unwrap();
    let again = tokenize_seeded(converged.clone(), &rules).unwrap();
    assert_eq!(converged, again);
}

#[test]
fn test_zero_width_match_trips_the_guard() {
    // A pattern that matches without consuming splices forever at one site.
    let rules = [Rule::emit(
        tessera::matchers::lookahead(literal_char("a")),
        |_, span, _| {
            vec![Token::new("mark", span, TokenArgs::default())]
        },
    )];
    let err = tokenize("a", &rules).unwrap_err();
    assert!(matches!(err, TesseraError::RunawayLoop { .. }));
}

#[test]
fn test_captures_become_wrap_properties() {
    let rules = [Rule::wrap(
        sequence(vec![
            literal_char("<"),
            capture("body", any(negate(literal_char(">")))),
            literal_char(">"),
        ]),
        "angle",
    )];
    let tokens = tokenize("<hi>", &rules).unwrap();
    let node = &tokens[1];
    assert_eq!(node.name(), "angle");
    let body = node.prop("body").expect("capture should become a property");
    assert_eq!(body.raw_value(), "hi");
}

#[test]
fn test_linear_rules_apply_in_declaration_order() {
    // The first rule rewrites 'a' into 'b' everywhere before the second
    // ever runs, so the second sees only 'b's.
    let rules = [
        Rule::emit(literal_char("a"), |_, span, _| {
            vec![Token::character("b", span)]
        }),
        Rule::wrap(literal_char("b"), "b-char"),
    ];
    let tokens = tokenize("ab", &rules).unwrap();
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[1].name(), "b-char");
    assert_eq!(tokens[2].name(), "b-char");
}

#[test]
fn test_grapheme_seed_keeps_clusters_together() {
    let seed = tessera::seed_graphemes("e\u{301}x");
    assert_eq!(seed.len(), 4);
    assert_eq!(seed[1].raw_value(), "e\u{301}");
    assert_eq!(seed[1].span(), Span::new(0, 1));
    assert_eq!(seed[2].raw_value(), "x");
}
