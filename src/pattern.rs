// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Output-name templates with `{model}`, `{version}`, `{output}` and
//! `{input[N]}` placeholders.
//!
//! Patterns are validated at rule compilation; rendering cannot fail. An
//! out-of-range `{input[N]}` resolves to the first input, and `{version}`
//! expands to the empty string when the rule pins no model version.

use crate::error::PatternError;

/// A compiled output-name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Model,
    Version,
    Output,
    Input(usize),
}

/// Values substituted into a pattern when resolving an output metric name.
#[derive(Debug, Clone, Copy)]
pub struct PatternContext<'a> {
    /// The rule's model name.
    pub model: &'a str,
    /// The rule's model version, or `""` when unpinned.
    pub version: &'a str,
    /// The output's configured name.
    pub output: &'a str,
    /// The rule's input metric names, in declared order.
    pub inputs: &'a [&'a str],
}

impl OutputPattern {
    /// Parses and validates a template string.
    pub fn parse(template: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find(['{', '}']) {
            let (before, tail) = rest.split_at(open);
            literal.push_str(before);
            let mut chars = tail.chars();
            match chars.next() {
                Some('}') => return Err(PatternError::UnbalancedBraces),
                Some('{') => {
                    let tail = chars.as_str();
                    let Some(close) = tail.find('}') else {
                        return Err(PatternError::UnbalancedBraces);
                    };
                    let body = &tail[..close];
                    if body.contains('{') {
                        return Err(PatternError::UnbalancedBraces);
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(body)?);
                    rest = &tail[close + 1..];
                }
                _ => unreachable!("find returned a brace position"),
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Expands the template against the given rule context.
    #[must_use]
    pub fn render(&self, ctx: &PatternContext<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Model => out.push_str(ctx.model),
                Segment::Version => out.push_str(ctx.version),
                Segment::Output => out.push_str(ctx.output),
                Segment::Input(index) => {
                    // Out-of-range indices fall back to the first input.
                    let name = ctx
                        .inputs
                        .get(*index)
                        .or_else(|| ctx.inputs.first())
                        .copied()
                        .unwrap_or_default();
                    out.push_str(name);
                }
            }
        }
        out
    }
}

fn parse_placeholder(body: &str) -> Result<Segment, PatternError> {
    match body {
        "model" => return Ok(Segment::Model),
        "version" => return Ok(Segment::Version),
        "output" => return Ok(Segment::Output),
        "input" => return Ok(Segment::Input(0)),
        _ => {}
    }
    if let Some(index) = body.strip_prefix("input[").and_then(|b| b.strip_suffix(']')) {
        return index
            .parse::<usize>()
            .map(Segment::Input)
            .map_err(|_| PatternError::InvalidIndex {
                placeholder: body.to_string(),
            });
    }
    Err(PatternError::UnknownPlaceholder {
        placeholder: body.to_string(),
    })
}
