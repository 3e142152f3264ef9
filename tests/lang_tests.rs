// tests/lang_tests.rs — pattern-language surface coverage.

use tessera::{
    compile_pattern, seed_codepoints, tokenize, Capture, Captures, MatchOutcome, PropValue, Rule,
    Span, TesseraError, Token, TokenArgs,
};

fn char_tokens(text: &str) -> Vec<Token> {
    let mut tokens = seed_codepoints(text);
    tokens.remove(0);
    tokens.pop();
    tokens
}

fn consumed(source: &str, text: &str) -> Option<usize> {
    let pattern = compile_pattern(source).expect("pattern should compile");
    let mut captures = Captures::new();
    pattern
        .matches(&char_tokens(text), &mut captures, &[])
        .unwrap()
        .consumed()
}

#[test]
fn test_literal_char() {
    assert_eq!(consumed(r"\a", "abc"), Some(1));
    assert_eq!(consumed(r"\a", "x"), None);
    // Escaped delimiters are ordinary literals.
    assert_eq!(consumed(r"\\", "\\"), Some(1));
    assert_eq!(consumed(r#"\""#, "\""), Some(1));
    assert_eq!(consumed(r"\/", "/"), Some(1));
}

#[test]
fn test_wildcards() {
    assert_eq!(consumed(r"*", "x"), Some(1));
    assert_eq!(consumed(r"$", "7"), Some(1));
    assert_eq!(consumed(r"$", "x"), None);
    assert_eq!(consumed(r"~", " "), Some(1));
    assert_eq!(consumed(r"~", "x"), None);
}

#[test]
fn test_whitespace_separates_and_escaped_whitespace_matches() {
    assert_eq!(consumed(r"\a \b", "ab"), Some(2));
    assert_eq!(consumed(r"\a\ \b", "a b"), Some(3));
    assert_eq!(consumed(r"\a\ \b", "ab"), None);
}

#[test]
fn test_string_literal_with_escapes() {
    assert_eq!(consumed(r#""abc""#, "abcd"), Some(3));
    assert_eq!(consumed(r#""abc""#, "abx"), None);
    assert_eq!(consumed(r#""a\"b""#, "a\"b"), Some(3));
    assert_eq!(consumed(r#""a\\b""#, "a\\b"), Some(3));
}

#[test]
fn test_regex_literal_and_flag() {
    assert_eq!(consumed(r"/[0-9]+/", "123x"), Some(3));
    assert_eq!(consumed(r"/[0-9]+/", "x123"), None);
    assert_eq!(consumed(r"/abc/i", "ABCd"), Some(3));
    assert_eq!(consumed(r"/abc/", "ABCd"), None);
    // Escaped slash inside the body.
    assert_eq!(consumed(r"/a\/b/", "a/b"), Some(3));
}

#[test]
fn test_invalid_regex_fails_at_compile_time() {
    assert!(matches!(
        compile_pattern(r"/(unclosed/"),
        Err(TesseraError::InvalidRegex { .. })
    ));
}

#[test]
fn test_grouping_and_juxtaposition() {
    assert_eq!(consumed(r"(\a \b) \c", "abc"), Some(3));
    assert_eq!(consumed(r"(\a \b) \c", "abx"), None);
}

#[test]
fn test_one_or_more() {
    assert_eq!(consumed(r"\a+", "aaab"), Some(3));
    assert_eq!(consumed(r"\a+", "b"), None);
}

#[test]
fn test_counted_repetition() {
    assert_eq!(consumed(r"\a 2..3", "a"), None);
    assert_eq!(consumed(r"\a 2..3", "aa"), Some(2));
    assert_eq!(consumed(r"\a 2..3", "aaaa"), Some(3));
    // Open upper bound.
    assert_eq!(consumed(r"\a 2..", "aaaaa"), Some(5));
    // Omitted bounds mean one-or-more.
    assert_eq!(consumed(r"\a ..", "aaa"), Some(3));
    assert_eq!(consumed(r"\a ..", ""), None);
}

#[test]
fn test_optional_requires_a_non_empty_rest() {
    // `P?` alone accepts the empty sequence, which the compiler rejects.
    assert!(matches!(
        compile_pattern(r"\a?"),
        Err(TesseraError::EmptyPattern { .. })
    ));
    assert_eq!(consumed(r"\a? \b", "ab"), Some(2));
    assert_eq!(consumed(r"\a? \b", "b"), Some(1));
}

#[test]
fn test_zero_min_count_is_rejected_as_empty() {
    assert!(matches!(
        compile_pattern(r"\a 0.."),
        Err(TesseraError::EmptyPattern { .. })
    ));
}

#[test]
fn test_token_name_and_tag_patterns() {
    let word = Token::new(
        "word",
        Span::new(0, 1),
        TokenArgs {
            tags: vec!["ident".to_string()],
            props: Default::default(),
            children: char_tokens("x"),
        },
    );
    let tokens = vec![word];

    let by_name = compile_pattern(r"@word").unwrap();
    let by_tag = compile_pattern(r"#ident").unwrap();
    let wrong = compile_pattern(r"@other").unwrap();
    let mut captures = Captures::new();
    assert_eq!(
        by_name.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::Matched(1)
    );
    assert_eq!(
        by_tag.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::Matched(1)
    );
    assert_eq!(
        wrong.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::NoMatch
    );
}

#[test]
fn test_namespaced_token_name() {
    let node = Token::new("ns:item", Span::new(0, 0), TokenArgs::default());
    let pattern = compile_pattern(r"@ns:item").unwrap();
    let mut captures = Captures::new();
    assert_eq!(
        pattern.matches(&[node], &mut captures, &[]).unwrap(),
        MatchOutcome::Matched(1)
    );
}

#[test]
fn test_negation() {
    assert_eq!(consumed(r"!\a", "b"), Some(1));
    assert_eq!(consumed(r"!\a", "a"), None);
    assert_eq!(consumed(r"!!\a", "a"), Some(1));
}

#[test]
fn test_negating_a_multi_token_pattern_errors_when_evaluated() {
    let pattern = compile_pattern(r"!(\a \b)").unwrap();
    let mut captures = Captures::new();
    let result = pattern.matches(&char_tokens("ab"), &mut captures, &[]);
    assert!(matches!(result, Err(TesseraError::NegationArity { .. })));
}

#[test]
fn test_alternation_is_ordered() {
    assert_eq!(consumed(r#""ab" || "abc""#, "abcd"), Some(2));
    assert_eq!(consumed(r#""abc" || "ab""#, "abcd"), Some(3));
    assert_eq!(consumed(r"\a || \b", "b"), Some(1));
    assert_eq!(consumed(r"\a || \b", "c"), None);
}

#[test]
fn test_conjunction() {
    assert_eq!(consumed(r"* && $", "7"), Some(1));
    assert_eq!(consumed(r"* && $", "x"), None);
}

#[test]
fn test_lookahead() {
    assert_eq!(consumed(r"\a >>\b", "ab"), Some(1));
    assert_eq!(consumed(r"\a >>\b", "ax"), None);
}

#[test]
fn test_lookbehind_through_the_rewrite_loop() {
    let pattern = compile_pattern(r"<<\a \b").unwrap();
    let rules = [Rule::wrap(pattern, "after-a")];
    let tokens = tokenize("ab", &rules).unwrap();
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[2].name(), "after-a");
    assert_eq!(tokens[2].raw_value(), "b");

    let pattern = compile_pattern(r"<<\a \b").unwrap();
    let rules = [Rule::wrap(pattern, "after-a")];
    let tokens = tokenize("xb", &rules).unwrap();
    assert!(tokens.iter().all(|t| t.name() != "after-a"));
}

#[test]
fn test_property_patterns() {
    let mut props = std::collections::BTreeMap::new();
    props.insert("kind".to_string(), PropValue::Str("word".to_string()));
    props.insert("n".to_string(), PropValue::Num(42.0));
    let token = Token::new(
        "x",
        Span::new(0, 0),
        TokenArgs {
            tags: Vec::new(),
            props,
            children: Vec::new(),
        },
    );
    let tokens = vec![token];
    let mut captures = Captures::new();

    let has = compile_pattern(r"[kind]").unwrap();
    assert_eq!(
        has.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::Matched(1)
    );
    let missing = compile_pattern(r"[other]").unwrap();
    assert_eq!(
        missing.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::NoMatch
    );
    let eq_str = compile_pattern(r#"[kind="word"]"#).unwrap();
    assert_eq!(
        eq_str.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::Matched(1)
    );
    let ne_str = compile_pattern(r#"[kind="other"]"#).unwrap();
    assert_eq!(
        ne_str.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::NoMatch
    );
    let eq_num = compile_pattern(r"[n=42]").unwrap();
    assert_eq!(
        eq_num.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::Matched(1)
    );
    let ne_num = compile_pattern(r"[n=41]").unwrap();
    assert_eq!(
        ne_num.matches(&tokens, &mut captures, &[]).unwrap(),
        MatchOutcome::NoMatch
    );
}

#[test]
fn test_capture_binds_through_the_rewrite_loop() {
    let pattern = compile_pattern(r"\( inner: (!\))+ \)").unwrap();
    let rules = [Rule::wrap(pattern, "group")];
    let tokens = tokenize("(hi)", &rules).unwrap();
    let node = &tokens[1];
    assert_eq!(node.name(), "group");
    let inner = node.prop("inner").expect("capture should bind");
    assert_eq!(inner.raw_value(), "hi");
}

#[test]
fn test_capture_syntax_direct() {
    let pattern = compile_pattern(r"word: /[a-z]+/").unwrap();
    let mut captures = Captures::new();
    let outcome = pattern
        .matches(&char_tokens("abc1"), &mut captures, &[])
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Matched(3));
    match captures.get("word") {
        Some(Capture::Matched(tokens)) => assert_eq!(tokens.len(), 3),
        other => panic!("expected bound capture, got {other:?}"),
    }
}

#[test]
fn test_unparseable_source_names_the_offender() {
    match compile_pattern("abc") {
        Err(TesseraError::PatternSyntax { found, .. }) => {
            assert_eq!(found, "CHAR");
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
    assert!(matches!(
        compile_pattern(r"(\a"),
        Err(TesseraError::PatternSyntax { .. })
    ));
    assert!(matches!(
        compile_pattern(""),
        Err(TesseraError::PatternSyntax { .. })
    ));
}
