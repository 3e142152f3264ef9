//! Tokenizer rewrite loop.
//!
//! The loop owns a mutable token buffer seeded with one character token per
//! input code point between the SOF/EOF sentinels, then rewrites it: each
//! rule's pattern is scanned over the buffer and matched spans are spliced
//! out in favor of the rule's builder output. After every rule has run to a
//! per-rule fixpoint, the rules flagged `recursive` are swept repeatedly
//! until a full sweep changes nothing, which lets nested constructs reduce
//! inside-out.

use std::sync::Arc;

use log::{debug, trace};

use crate::errors::TesseraError;
use crate::pattern::{Captures, MatchOutcome, PatternRef};
use crate::token::{Span, Token, TokenArgs};
use crate::util::split_graphemes;

/// Ceiling on every unbounded internal repetition (rule re-application,
/// recursive sweeps, the `repeat` combinator). Exceeding it is a fatal
/// error signaling a malformed or ambiguous rule set.
pub const ITERATION_CEILING: usize = 100_000;

/// Builder output function: maps the matched span, its position, and the
/// evaluation captures to a replacement token sequence (possibly empty).
pub type BuildFn = Arc<dyn Fn(&[Token], Span, &Captures) -> Vec<Token> + Send + Sync>;

enum Builder {
    /// Wrap the matched span in a composite token with this name, carrying
    /// the captures as properties.
    Wrap(String),
    Emit(BuildFn),
}

/// One rewrite rule: a pattern, a builder, and the recursive flag.
/// Constructed once, never mutated, applied repeatedly by the loop.
pub struct Rule {
    pattern: PatternRef,
    recursive: bool,
    builder: Builder,
}

impl Rule {
    /// A rule that wraps each matched span in a composite token named
    /// `name`, with the matched tokens as children and the captures as
    /// properties.
    pub fn wrap(pattern: PatternRef, name: impl Into<String>) -> Self {
        Self {
            pattern,
            recursive: false,
            builder: Builder::Wrap(name.into()),
        }
    }

    /// A rule with a custom builder. Returning an empty sequence deletes
    /// the matched span.
    pub fn emit<F>(pattern: PatternRef, build: F) -> Self
    where
        F: Fn(&[Token], Span, &Captures) -> Vec<Token> + Send + Sync + 'static,
    {
        Self {
            pattern,
            recursive: false,
            builder: Builder::Emit(Arc::new(build)),
        }
    }

    /// Marks the rule for the recursive phase.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    fn build(&self, matched: &[Token], span: Span, captures: &Captures) -> Vec<Token> {
        match &self.builder {
            Builder::Wrap(name) => vec![Token::new(
                name,
                span,
                TokenArgs {
                    tags: Vec::new(),
                    props: captures.to_props(),
                    children: matched.to_vec(),
                },
            )],
            Builder::Emit(build) => build(matched, span, captures),
        }
    }
}

struct LoopGuard {
    ticks: usize,
}

impl LoopGuard {
    fn new() -> Self {
        Self { ticks: 0 }
    }

    fn tick(&mut self, context: &'static str) -> Result<(), TesseraError> {
        self.ticks += 1;
        if self.ticks > ITERATION_CEILING {
            Err(TesseraError::RunawayLoop { context })
        } else {
            Ok(())
        }
    }
}

/// Seeds a buffer with one character token per code point, 0-based starts,
/// wrapped in the SOF/EOF sentinels.
pub fn seed_codepoints(text: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(text.chars().count() + 2);
    tokens.push(Token::start_of_input());
    let mut count = 0;
    for (i, c) in text.chars().enumerate() {
        tokens.push(Token::character(c, Span::new(i, 1)));
        count = i + 1;
    }
    tokens.push(Token::end_of_input(count));
    tokens
}

/// Seeds a buffer with one character token per extended grapheme cluster
/// instead of per code point.
pub fn seed_graphemes(text: &str) -> Vec<Token> {
    let graphemes = split_graphemes(text);
    let mut tokens = Vec::with_capacity(graphemes.len() + 2);
    tokens.push(Token::start_of_input());
    for (i, g) in graphemes.iter().enumerate() {
        tokens.push(Token::character(*g, Span::new(i, 1)));
    }
    tokens.push(Token::end_of_input(graphemes.len()));
    tokens
}

/// Tokenizes `text` by running the rewrite loop over a code-point seed.
pub fn tokenize(text: &str, rules: &[Rule]) -> Result<Vec<Token>, TesseraError> {
    tokenize_seeded(seed_codepoints(text), rules)
}

/// Runs the rewrite loop over an already-seeded buffer.
pub fn tokenize_seeded(
    mut buffer: Vec<Token>,
    rules: &[Rule],
) -> Result<Vec<Token>, TesseraError> {
    debug!(
        "tokenize: {} seed tokens, {} rules",
        buffer.len(),
        rules.len()
    );
    let mut guard = LoopGuard::new();

    for (index, rule) in rules.iter().enumerate() {
        let applied = run_to_fixpoint(&mut buffer, rule, &mut guard)?;
        if applied {
            trace!("rule #{index} applied in linear phase");
        }
    }

    let recursive: Vec<&Rule> = rules.iter().filter(|r| r.recursive).collect();
    if !recursive.is_empty() {
        let mut sweeps = 0;
        loop {
            guard.tick("recursive sweep")?;
            sweeps += 1;
            let mut mutated = false;
            for rule in &recursive {
                mutated |= run_to_fixpoint(&mut buffer, rule, &mut guard)?;
            }
            if !mutated {
                break;
            }
        }
        debug!("tokenize: recursive phase converged after {sweeps} sweeps");
    }

    debug!("tokenize: final buffer holds {} tokens", buffer.len());
    Ok(buffer)
}

/// Applies one rule until a full left-to-right scan matches nowhere.
fn run_to_fixpoint(
    buffer: &mut Vec<Token>,
    rule: &Rule,
    guard: &mut LoopGuard,
) -> Result<bool, TesseraError> {
    let mut any = false;
    loop {
        guard.tick("rule fixpoint")?;
        if apply_scan(buffer, rule, guard)? {
            any = true;
        } else {
            break;
        }
    }
    Ok(any)
}

/// One left-to-right scan. After a splice the scan stays at the same index
/// so the replacement site can match again immediately.
fn apply_scan(
    buffer: &mut Vec<Token>,
    rule: &Rule,
    guard: &mut LoopGuard,
) -> Result<bool, TesseraError> {
    let mut applied = false;
    let mut i = 0;
    while i < buffer.len() {
        let mut captures = Captures::new();
        let outcome = rule
            .pattern
            .matches(&buffer[i..], &mut captures, &buffer[..i])?;
        match outcome {
            MatchOutcome::Matched(n) => {
                guard.tick("rule application")?;
                let matched: Vec<Token> = buffer[i..i + n].to_vec();
                let start = matched.first().map_or_else(|| buffer[i].start(), Token::start);
                let length = matched.iter().map(Token::length).sum();
                let replacement = rule.build(&matched, Span::new(start, length), &captures);
                buffer.splice(i..i + n, replacement);
                applied = true;
            }
            MatchOutcome::NoMatch => i += 1,
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::matchers::{literal_char, sequence, token_name};

    #[test]
    fn test_empty_rule_list_is_identity_seed() {
        let tokens = tokenize("ab", &[]).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].name(), crate::token::SOF);
        assert_eq!(tokens[1].raw_value(), "a");
        assert_eq!(tokens[2].raw_value(), "b");
        assert_eq!(tokens[3].name(), crate::token::EOF);
    }

    #[test]
    fn test_wrap_rule_carries_children_and_position() {
        let rule = Rule::wrap(
            sequence(vec![literal_char("a"), literal_char("b")]),
            "ab",
        );
        let tokens = tokenize("xaby", &[rule]).unwrap();
        let ab = &tokens[2];
        assert_eq!(ab.name(), "ab");
        assert_eq!(ab.start(), 1);
        assert_eq!(ab.length(), 2);
        assert_eq!(ab.raw_value(), "ab");
    }

    #[test]
    fn test_self_feeding_rule_trips_the_guard() {
        // Wraps its own output, so the replacement site matches forever.
        let rule = Rule::emit(token_name("CHAR"), |matched, span, _| {
            vec![Token::new(
                "CHAR",
                span,
                TokenArgs::with_children(matched.to_vec()),
            )]
        });
        let err = tokenize("a", &[rule]).unwrap_err();
        assert!(matches!(err, TesseraError::RunawayLoop { .. }));
    }
}
