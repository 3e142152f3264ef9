//! Grammar compiler: named, tagged, pattern-annotated rules with reduction
//! functions, compiled into a working parser.
//!
//! Rules are registered explicitly on a [`GrammarBuilder`]; compilation
//! turns each rule's pattern source into a combinator via the
//! pattern-language compiler, wraps matches in a composite token carrying
//! the rule's name and tags, and wires reduction through a name→rule
//! registry. `parse` runs the rewrite loop and reduces the resulting node
//! tree into the caller's result type, threading an explicit state value
//! top-down through every nested [`RuleNode::reduce`] call.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use miette::NamedSource;

use crate::errors::TesseraError;
use crate::lang::compile_pattern;
use crate::token::{PropValue, Token, TokenArgs};
use crate::tokenizer::{tokenize, Rule};
use crate::util::byte_offset;

/// Reduction function: maps a matched node and the threaded state to the
/// caller's result type. Errors propagate to the `parse` caller unmodified.
pub type ReduceFn<T, S> =
    Arc<dyn Fn(&RuleNode<'_, T, S>, &mut S) -> Result<T, TesseraError> + Send + Sync>;

/// One grammar rule definition: a unique name, zero or more tags, exactly
/// one pattern-language source string, a recursive flag, and a reducer.
pub struct RuleDef<T, S> {
    name: String,
    syntax: String,
    tags: Vec<String>,
    recursive: bool,
    reduce: Option<ReduceFn<T, S>>,
}

impl<T, S> RuleDef<T, S> {
    pub fn new(name: impl Into<String>, syntax: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            syntax: syntax.into(),
            tags: Vec::new(),
            recursive: false,
            reduce: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn reduce<F>(mut self, reduce: F) -> Self
    where
        F: Fn(&RuleNode<'_, T, S>, &mut S) -> Result<T, TesseraError> + Send + Sync + 'static,
    {
        self.reduce = Some(Arc::new(reduce));
        self
    }
}

/// Accumulates rule definitions ahead of compilation.
pub struct GrammarBuilder<T, S> {
    rules: Vec<RuleDef<T, S>>,
}

impl<T, S> Default for GrammarBuilder<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> GrammarBuilder<T, S> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rule(mut self, def: RuleDef<T, S>) -> Self {
        self.rules.push(def);
        self
    }

    /// Compiles every rule's pattern source and builds the parser. Fails
    /// fast on a duplicate rule name, a missing reducer, unparseable
    /// pattern source, or a pattern that accepts the empty token sequence.
    pub fn compile(self) -> Result<Parser<T, S>, TesseraError> {
        let mut compiled = Vec::with_capacity(self.rules.len());
        let mut index = HashMap::new();
        let mut tokenizer = Vec::with_capacity(self.rules.len());

        for def in self.rules {
            if index.contains_key(&def.name) {
                return Err(TesseraError::DuplicateRule { name: def.name });
            }
            let reduce = def.reduce.ok_or_else(|| TesseraError::MissingReducer {
                name: def.name.clone(),
            })?;

            let pattern = compile_pattern(&def.syntax)
                .map_err(|source| TesseraError::in_rule(&def.name, source))?;

            let rule_name = def.name.clone();
            let tags = def.tags.clone();
            let rule = Rule::emit(pattern, move |matched, span, captures| {
                vec![Token::new(
                    rule_name.clone(),
                    span,
                    TokenArgs {
                        tags: tags.clone(),
                        props: captures.to_props(),
                        children: matched.to_vec(),
                    },
                )]
            });
            tokenizer.push(if def.recursive { rule.recursive() } else { rule });

            index.insert(def.name, compiled.len());
            compiled.push(CompiledRule { reduce });
        }

        debug!("compiled grammar with {} rules", compiled.len());
        Ok(Parser {
            rules: compiled,
            index,
            tokenizer,
        })
    }
}

struct CompiledRule<T, S> {
    reduce: ReduceFn<T, S>,
}

/// A compiled grammar. Read-only after construction; a single parser can be
/// shared and reused across sequential or concurrent `parse` calls.
pub struct Parser<T, S> {
    rules: Vec<CompiledRule<T, S>>,
    index: HashMap<String, usize>,
    tokenizer: Vec<Rule>,
}

impl<T, S> Parser<T, S> {
    /// Parses `text` and reduces it to the target type, threading `state`
    /// through every reduction. Fails rather than returning a partial
    /// result.
    ///
    /// The rewrite loop is expected to leave a single rule node after the
    /// SOF sentinel; that node is reduced. Trailing tokens a grammar
    /// deliberately leaves unattached are tolerated and logged.
    pub fn parse(&self, text: &str, state: &mut S) -> Result<T, TesseraError> {
        let buffer = tokenize(text, &self.tokenizer)?;

        // [SOF, node, EOF, ...] — anything shorter produced no node at all.
        let node = match buffer.get(1) {
            Some(node) if buffer.len() >= 3 => node,
            _ => {
                return Err(TesseraError::ParseShape {
                    src: NamedSource::new("input", text.to_string()),
                    span: (0, text.len()).into(),
                })
            }
        };
        if !self.index.contains_key(node.name()) {
            let start = byte_offset(text, node.start());
            let end = byte_offset(text, node.start() + node.length());
            return Err(TesseraError::ParseShape {
                src: NamedSource::new("input", text.to_string()),
                span: (start, end.saturating_sub(start)).into(),
            });
        }
        if buffer.len() > 3 {
            warn!(
                "parse: {} token(s) left unreduced after the first node",
                buffer.len() - 3
            );
        }

        RuleNode { token: node, parser: self }.reduce(state)
    }
}

/// A reducer's view of a matched node: the matched span's raw text, named
/// captures (each a sequence of child nodes), and tag membership.
pub struct RuleNode<'a, T, S> {
    token: &'a Token,
    parser: &'a Parser<T, S>,
}

impl<'a, T, S> Clone for RuleNode<'a, T, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T, S> Copy for RuleNode<'a, T, S> {}

impl<'a, T, S> RuleNode<'a, T, S> {
    pub fn token(&self) -> &Token {
        self.token
    }

    pub fn name(&self) -> &str {
        self.token.name()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.token.has_tag(tag)
    }

    /// Raw text of the matched span.
    pub fn raw_value(&self) -> String {
        self.token.raw_value()
    }

    /// The nodes captured under `name`; empty when the capture is absent or
    /// explicitly unmatched.
    pub fn captured(&self, name: &str) -> Vec<RuleNode<'a, T, S>> {
        self.token
            .prop(name)
            .and_then(PropValue::tokens)
            .map(|tokens| {
                tokens
                    .iter()
                    .map(|token| RuleNode {
                        token,
                        parser: self.parser,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The first node captured under `name`, or a reduction error naming
    /// the missing capture.
    pub fn captured_one(&self, name: &str) -> Result<RuleNode<'a, T, S>, TesseraError> {
        self.captured(name).into_iter().next().ok_or_else(|| {
            TesseraError::reduction(format!(
                "rule `{}` captured nothing under `{name}`",
                self.token.name()
            ))
        })
    }

    /// Concatenated raw text of the capture under `name`.
    pub fn captured_raw(&self, name: &str) -> String {
        self.token
            .prop(name)
            .map(PropValue::raw_value)
            .unwrap_or_default()
    }

    /// Reduces this node via its rule's reduction function, threading the
    /// state by explicit call.
    pub fn reduce(&self, state: &mut S) -> Result<T, TesseraError> {
        let rule = self
            .parser
            .index
            .get(self.token.name())
            .map(|&i| &self.parser.rules[i])
            .ok_or_else(|| {
                TesseraError::reduction(format!(
                    "token `{}` has no grammar rule to reduce it",
                    self.token.name()
                ))
            })?;
        (rule.reduce)(self, state)
    }
}
