//! Pattern-language compiler.
//!
//! A fixed bootstrap rule set — ordinary rewrite-loop rules, hand-authored —
//! tokenizes the textual pattern syntax into a tree of "logic" nodes, which
//! reduce bottom-up into pattern combinators. The language the bootstrap
//! recognizes:
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `\c` | literal character `c` |
//! | `*` / `$` / `~` | any / digit / whitespace wildcard |
//! | `"..."` | literal string (`\"`, `\\` escapes) |
//! | `/regex/i` | regex, optional case-insensitive flag (`\/` escape) |
//! | `(P)` | grouping |
//! | `P1 P2` | sequence (juxtaposition) |
//! | `P+` / `P?` / `P n..m` | one-or-more / zero-or-one / counted repetition |
//! | `@name` / `#tag` | match by token name / by tag |
//! | `!P` | negation (single-token `P` only) |
//! | `P1 \|\| P2` / `P1 && P2` | alternation / conjunction |
//! | `>>P` / `<<P` | lookahead / lookbehind |
//! | `[prop]` / `[prop=value]` | property tests |
//! | `name:P` | capture |
//!
//! Whitespace between elements is discarded; escape it (`\ `) or use `~` to
//! match it.

use miette::NamedSource;
use once_cell::sync::Lazy;

use crate::errors::TesseraError;
use crate::pattern::matchers::{
    alternation, any, capture, conjunction, has_prop, has_tag, literal_char, lookahead,
    lookbehind, negate, one_or_more, optional, prop_equals, regex, repeat, sequence,
    string_literal, token_name, wildcard, Wildcard,
};
use crate::pattern::{Captures, PatternRef};
use crate::token::{PropValue, Span, Token, TokenArgs, EOF};
use crate::tokenizer::{tokenize, Rule};
use crate::util::byte_offset;

/// Tag carried by every reducible pattern-language node.
const TAG_LOGIC: &str = "logic";
/// Tag carried by folded escape sequences awaiting assembly or re-expansion.
const TAG_ESCAPED: &str = "escaped";

const NODE_STRING: &str = "lang:string";
const NODE_REGEX: &str = "lang:regex";
const NODE_CHAR: &str = "lang:char";
const NODE_WILD_ANY: &str = "lang:wild-any";
const NODE_WILD_DIGIT: &str = "lang:wild-digit";
const NODE_WILD_WS: &str = "lang:wild-ws";
const NODE_GROUP: &str = "lang:group";
const NODE_ONE_OR_MORE: &str = "lang:one-or-more";
const NODE_OPTIONAL: &str = "lang:optional";
const NODE_COUNT: &str = "lang:count";
const NODE_TOKEN_NAME: &str = "lang:token-name";
const NODE_TAGGED: &str = "lang:tagged";
const NODE_NOT: &str = "lang:not";
const NODE_OR: &str = "lang:or";
const NODE_AND: &str = "lang:and";
const NODE_LOOKAHEAD: &str = "lang:lookahead";
const NODE_LOOKBEHIND: &str = "lang:lookbehind";
const NODE_PROP_EQ: &str = "lang:prop-eq";
const NODE_HAS_PROP: &str = "lang:has-prop";
const NODE_CAPTURE: &str = "lang:capture";
const NODE_SEQ: &str = "lang:seq";

/// Identifier syntax for names and tags, optionally namespaced.
const IDENT: &str = r"(?:[a-z][a-z0-9_\-]*:)?[a-z][a-z0-9_\-]*";

/// Builder producing a logic node: matched tokens as children, captures as
/// properties.
fn logic(name: &'static str) -> impl Fn(&[Token], Span, &Captures) -> Vec<Token> {
    move |matched, span, captures| {
        vec![Token::new(
            name,
            span,
            TokenArgs {
                tags: vec![TAG_LOGIC.to_string()],
                props: captures.to_props(),
                children: matched.to_vec(),
            },
        )]
    }
}

/// Builder producing an escape node whose raw value is the escaped character
/// alone (the backslash is dropped from the children).
fn escaped(name: &'static str) -> impl Fn(&[Token], Span, &Captures) -> Vec<Token> {
    move |matched, span, _| {
        vec![Token::new(
            name,
            span,
            TokenArgs {
                tags: vec![TAG_ESCAPED.to_string()],
                props: Default::default(),
                children: matched.last().cloned().into_iter().collect(),
            },
        )]
    }
}

static BOOTSTRAP: Lazy<Vec<Rule>> = Lazy::new(bootstrap_rules);

fn bootstrap_rules() -> Vec<Rule> {
    let ident = regex(IDENT, true).expect("bootstrap identifier pattern is valid");
    let is_logic = || has_tag(TAG_LOGIC);

    vec![
        // Escape prepass: fold delimiter escapes before assembling strings
        // and regexes, so their bodies can contain the delimiters.
        Rule::emit(
            sequence(vec![literal_char("\\"), literal_char("\\")]),
            escaped("lang:escaped-escape"),
        ),
        Rule::emit(
            sequence(vec![literal_char("\\"), literal_char("\"")]),
            escaped("lang:escaped-quote"),
        ),
        Rule::emit(
            sequence(vec![literal_char("\\"), literal_char("/")]),
            escaped("lang:escaped-slash"),
        ),
        Rule::emit(
            sequence(vec![literal_char("\\"), wildcard(Wildcard::Whitespace)]),
            escaped("lang:escaped-ws"),
        ),
        // "..."
        Rule::emit(
            sequence(vec![
                literal_char("\""),
                capture(
                    "data",
                    any(alternation(vec![
                        negate(literal_char("\"")),
                        has_tag(TAG_ESCAPED),
                    ])),
                ),
                literal_char("\""),
            ]),
            logic(NODE_STRING),
        ),
        // /regex/i
        Rule::emit(
            sequence(vec![
                literal_char("/"),
                capture(
                    "body",
                    one_or_more(alternation(vec![
                        negate(literal_char("/")),
                        has_tag(TAG_ESCAPED),
                    ])),
                ),
                literal_char("/"),
                capture("flag", optional(literal_char("i"))),
            ]),
            logic(NODE_REGEX),
        ),
        // Literal whitespace separates, it does not match.
        Rule::emit(wildcard(Wildcard::Whitespace), |_, _, _| Vec::new()),
        // Escapes that survived string/regex assembly re-expand for the
        // generic \c rule below.
        Rule::emit(has_tag(TAG_ESCAPED), |matched, span, _| {
            let value = matched.first().map(Token::raw_value).unwrap_or_default();
            vec![
                Token::character("\\", Span::new(span.start, 1)),
                Token::character(value, Span::new(span.start + 1, 1)),
            ]
        }),
        // \c
        Rule::emit(
            sequence(vec![
                literal_char("\\"),
                capture("what", wildcard(Wildcard::Any)),
            ]),
            logic(NODE_CHAR),
        ),
        // * $ ~
        Rule::emit(literal_char("*"), logic(NODE_WILD_ANY)),
        Rule::emit(literal_char("$"), logic(NODE_WILD_DIGIT)),
        Rule::emit(literal_char("~"), logic(NODE_WILD_WS)),
        // (P)
        Rule::emit(
            sequence(vec![
                literal_char("("),
                capture("value", is_logic()),
                literal_char(")"),
            ]),
            logic(NODE_GROUP),
        )
        .recursive(),
        // name:P
        Rule::emit(
            sequence(vec![
                capture("name", ident.clone()),
                literal_char(":"),
                capture("value", is_logic()),
            ]),
            logic(NODE_CAPTURE),
        )
        .recursive(),
        // P+
        Rule::emit(
            sequence(vec![capture("value", is_logic()), literal_char("+")]),
            logic(NODE_ONE_OR_MORE),
        )
        .recursive(),
        // P?
        Rule::emit(
            sequence(vec![capture("value", is_logic()), literal_char("?")]),
            logic(NODE_OPTIONAL),
        )
        .recursive(),
        // P n..m
        Rule::emit(
            sequence(vec![
                capture("value", is_logic()),
                capture("min", any(wildcard(Wildcard::Digit))),
                literal_char("."),
                literal_char("."),
                capture("max", any(wildcard(Wildcard::Digit))),
            ]),
            logic(NODE_COUNT),
        )
        .recursive(),
        // @name
        Rule::emit(
            sequence(vec![literal_char("@"), capture("what", ident.clone())]),
            logic(NODE_TOKEN_NAME),
        ),
        // #tag
        Rule::emit(
            sequence(vec![literal_char("#"), capture("what", ident.clone())]),
            logic(NODE_TAGGED),
        ),
        // !P
        Rule::emit(
            sequence(vec![literal_char("!"), capture("value", is_logic())]),
            logic(NODE_NOT),
        )
        .recursive(),
        // P1 || P2
        Rule::emit(
            sequence(vec![
                capture("lhs", is_logic()),
                literal_char("|"),
                literal_char("|"),
                capture("rhs", is_logic()),
            ]),
            logic(NODE_OR),
        )
        .recursive(),
        // P1 && P2
        Rule::emit(
            sequence(vec![
                capture("lhs", is_logic()),
                literal_char("&"),
                literal_char("&"),
                capture("rhs", is_logic()),
            ]),
            logic(NODE_AND),
        )
        .recursive(),
        // >>P
        Rule::emit(
            sequence(vec![
                literal_char(">"),
                literal_char(">"),
                capture("value", is_logic()),
            ]),
            logic(NODE_LOOKAHEAD),
        )
        .recursive(),
        // <<P
        Rule::emit(
            sequence(vec![
                literal_char("<"),
                literal_char("<"),
                capture("value", is_logic()),
            ]),
            logic(NODE_LOOKBEHIND),
        )
        .recursive(),
        // [prop=value]
        Rule::emit(
            sequence(vec![
                literal_char("["),
                capture("what", ident.clone()),
                literal_char("="),
                capture(
                    "value",
                    alternation(vec![
                        token_name(NODE_STRING),
                        one_or_more(wildcard(Wildcard::Digit)),
                    ]),
                ),
                literal_char("]"),
            ]),
            logic(NODE_PROP_EQ),
        ),
        // [prop]
        Rule::emit(
            sequence(vec![
                literal_char("["),
                capture("what", ident),
                literal_char("]"),
            ]),
            logic(NODE_HAS_PROP),
        ),
        // P1 P2 ... — juxtaposition folds last, so every operator above
        // binds tighter than sequencing.
        Rule::emit(
            sequence(vec![is_logic(), one_or_more(is_logic())]),
            logic(NODE_SEQ),
        )
        .recursive(),
    ]
}

fn prop_tokens<'t>(token: &'t Token, name: &str) -> &'t [Token] {
    token
        .prop(name)
        .and_then(PropValue::tokens)
        .unwrap_or(&[])
}

fn prop_raw(token: &Token, name: &str) -> String {
    prop_tokens(token, name)
        .iter()
        .map(Token::raw_value)
        .collect()
}

fn reduce_captured(token: &Token, name: &str) -> Result<PatternRef, TesseraError> {
    match prop_tokens(token, name).first() {
        Some(first) => reduce_node(first),
        None => Err(TesseraError::reduction(format!(
            "pattern node `{}` is missing its `{name}` part",
            token.name()
        ))),
    }
}

/// Reduces one logic node into its pattern combinator, reducing captured
/// children first.
fn reduce_node(token: &Token) -> Result<PatternRef, TesseraError> {
    match token.name() {
        NODE_STRING => Ok(string_literal(prop_raw(token, "data"))),
        NODE_REGEX => {
            // Escape nodes re-contribute their backslash so the regex body
            // survives verbatim.
            let body: String = prop_tokens(token, "body")
                .iter()
                .map(|t| {
                    if t.has_tag(TAG_ESCAPED) {
                        format!("\\{}", t.raw_value())
                    } else {
                        t.raw_value()
                    }
                })
                .collect();
            let ignore_case = prop_raw(token, "flag") == "i";
            regex(&body, ignore_case)
        }
        NODE_CHAR => Ok(literal_char(prop_raw(token, "what"))),
        NODE_WILD_ANY => Ok(wildcard(Wildcard::Any)),
        NODE_WILD_DIGIT => Ok(wildcard(Wildcard::Digit)),
        NODE_WILD_WS => Ok(wildcard(Wildcard::Whitespace)),
        NODE_GROUP => reduce_captured(token, "value"),
        NODE_ONE_OR_MORE => Ok(one_or_more(reduce_captured(token, "value")?)),
        NODE_OPTIONAL => Ok(optional(reduce_captured(token, "value")?)),
        NODE_COUNT => {
            let min = prop_raw(token, "min").parse::<usize>().ok();
            let max = prop_raw(token, "max").parse::<usize>().ok();
            Ok(repeat(
                reduce_captured(token, "value")?,
                min.unwrap_or(1),
                max,
            ))
        }
        NODE_TOKEN_NAME => Ok(token_name(prop_raw(token, "what"))),
        NODE_TAGGED => Ok(has_tag(prop_raw(token, "what"))),
        NODE_NOT => Ok(negate(reduce_captured(token, "value")?)),
        NODE_OR => Ok(alternation(vec![
            reduce_captured(token, "lhs")?,
            reduce_captured(token, "rhs")?,
        ])),
        NODE_AND => Ok(conjunction(vec![
            reduce_captured(token, "lhs")?,
            reduce_captured(token, "rhs")?,
        ])),
        NODE_LOOKAHEAD => Ok(lookahead(reduce_captured(token, "value")?)),
        NODE_LOOKBEHIND => Ok(lookbehind(reduce_captured(token, "value")?)),
        NODE_PROP_EQ => {
            let value_tokens = prop_tokens(token, "value");
            let value = match value_tokens.first() {
                Some(first) if first.name() == NODE_STRING => {
                    PropValue::Str(prop_raw(first, "data"))
                }
                _ => {
                    let digits: String = value_tokens.iter().map(Token::raw_value).collect();
                    PropValue::Num(digits.parse::<f64>().unwrap_or(f64::NAN))
                }
            };
            Ok(prop_equals(prop_raw(token, "what"), value))
        }
        NODE_HAS_PROP => Ok(has_prop(prop_raw(token, "what"))),
        NODE_CAPTURE => Ok(capture(
            prop_raw(token, "name"),
            reduce_captured(token, "value")?,
        )),
        NODE_SEQ => {
            let parts = token
                .children()
                .iter()
                .map(reduce_node)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sequence(parts))
        }
        other => Err(TesseraError::reduction(format!(
            "token `{other}` is not a pattern node"
        ))),
    }
}

/// Compiles pattern-language source into a pattern.
///
/// Fails when the source does not reduce to a single expression (reported
/// with the offending token and its source offset) and when the compiled
/// pattern would accept the empty token sequence — probed here, once, so
/// the rewrite loop can assume progress.
pub fn compile_pattern(source: &str) -> Result<PatternRef, TesseraError> {
    let tokens = tokenize(source, &BOOTSTRAP)?;

    let syntax_error = |found: &Token| {
        let start = byte_offset(source, found.start());
        let end = byte_offset(source, found.start() + found.length());
        TesseraError::PatternSyntax {
            found: found.name().to_string(),
            src: NamedSource::new("pattern", source.to_string()),
            span: (start, end.saturating_sub(start)).into(),
        }
    };

    // Expected shape: [SOF, <logic node>, EOF].
    let node = match tokens.get(1) {
        Some(node) if node.has_tag(TAG_LOGIC) => node,
        Some(other) => return Err(syntax_error(other)),
        None => {
            return Err(TesseraError::PatternSyntax {
                found: EOF.to_string(),
                src: NamedSource::new("pattern", source.to_string()),
                span: (0, 0).into(),
            })
        }
    };
    match tokens.get(2) {
        Some(after) if after.name() == EOF => {}
        Some(after) => return Err(syntax_error(after)),
        None => {}
    }

    let pattern = reduce_node(node)?;

    let mut probe = Captures::new();
    if pattern.matches(&[], &mut probe, &[])?.is_match() {
        return Err(TesseraError::EmptyPattern {
            pattern: source.trim().to_string(),
        });
    }
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::MatchOutcome;
    use crate::tokenizer::seed_codepoints;

    fn probe(pattern: &PatternRef, text: &str) -> MatchOutcome {
        let seed = seed_codepoints(text);
        let mut captures = Captures::new();
        // Skip the SOF sentinel so character patterns see the text.
        pattern
            .matches(&seed[1..], &mut captures, &seed[..1])
            .unwrap()
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let p = compile_pattern(r#""a\"b""#).unwrap();
        assert_eq!(probe(&p, "a\"bc"), MatchOutcome::Matched(3));
        assert_eq!(probe(&p, "a'bc"), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_escaped_backslash_is_a_literal() {
        let p = compile_pattern(r"\\").unwrap();
        assert_eq!(probe(&p, "\\x"), MatchOutcome::Matched(1));
        assert_eq!(probe(&p, "x"), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_empty_source_is_a_syntax_error() {
        assert!(matches!(
            compile_pattern(""),
            Err(TesseraError::PatternSyntax { .. })
        ));
    }
}
