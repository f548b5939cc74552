//! Single-pass recursive descent over template text.
//!
//! Literal characters accumulate until a structural character (`(`, `[`,
//! `<`, `{`, `|` or a closing delimiter) flushes them into words. Suffixes
//! (`:sub`, `!conv`) bind to the word or group they follow.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyntaxError};
use crate::expression::{
    Expression, Rule, RuleReference, Sentence, Sequence, SlotReference, Tag, Word,
};

/// Where a template came from, for error messages and rule qualification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseMetadata {
    pub file_name: String,
    pub line_number: usize,
    /// Grammar name given to unqualified `<rule>` references.
    pub intent_name: Option<String>,
}

impl ParseMetadata {
    pub fn new(file_name: impl Into<String>, line_number: usize) -> Self {
        Self {
            file_name: file_name.into(),
            line_number,
            intent_name: None,
        }
    }

    pub fn with_intent(mut self, intent_name: impl Into<String>) -> Self {
        self.intent_name = Some(intent_name.into());
        self
    }
}

/// Parse one sentence template into a top-level group.
pub fn parse_sentence(text: &str, metadata: Option<&ParseMetadata>) -> Result<Sentence> {
    let mut parser = Parser::new(text, metadata);
    let branches = parser.parse_body(None)?;
    let items = match branches.len() {
        1 => branches.into_iter().next().unwrap_or_default(),
        _ => vec![parser.alternative_from(branches, text.trim(), 0)?.into()],
    };
    Ok(Sequence::group(text, items))
}

// The pattern is a literal; `rule_definition_compiles` covers it.
#[allow(clippy::expect_used)]
fn rule_definition() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(public)?\s*<([^>]+)>\s*=\s*([^;]+)(;)?$")
            .expect("rule definition regex is valid; this is a bug")
    })
}

/// Parse `public? <name> = body ;`.
pub fn parse_rule(text: &str, metadata: Option<&ParseMetadata>) -> Result<Rule> {
    let trimmed = text.trim();
    let Some(caps) = rule_definition().captures(trimmed) else {
        return Err(syntax_error("No rule was found", text, 1, metadata).into());
    };
    let public = caps.get(1).is_some();
    let name = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    let body_text = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
    let body = parse_sentence(body_text, metadata)?;
    Ok(Rule {
        name: name.to_string(),
        body,
        public,
        text: text.to_string(),
    })
}

/// Substitution text to output tokens: trim, drop one pair of
/// surrounding parentheses, split on whitespace.
pub fn parse_substitution(sub_text: &str) -> Vec<String> {
    let mut sub = sub_text.trim();
    if let Some(rest) = sub.strip_prefix('(') {
        sub = rest;
    }
    if let Some(rest) = sub.strip_suffix(')') {
        sub = rest;
    }
    sub.split_whitespace().map(str::to_string).collect()
}

fn syntax_error(
    message: impl Into<String>,
    text: &str,
    column: usize,
    metadata: Option<&ParseMetadata>,
) -> SyntaxError {
    SyntaxError {
        message: message.into(),
        text: text.to_string(),
        column,
        file_name: metadata.map(|m| m.file_name.clone()),
        line_number: metadata.map(|m| m.line_number),
    }
}

/// Literal character with its position. Escaped characters never act as
/// separators or suffix markers.
#[derive(Debug, Clone, Copy)]
struct LitChar {
    c: char,
    escaped: bool,
    pos: usize,
}

const STRUCTURAL: &[char] = &['(', ')', '[', ']', '<', '>', '{', '}', '|'];

struct Parser<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
    metadata: Option<&'a ParseMetadata>,
}

type Branch = Vec<Expression>;

impl<'a> Parser<'a> {
    fn new(text: &'a str, metadata: Option<&'a ParseMetadata>) -> Self {
        Self {
            text,
            chars: text.chars().collect(),
            pos: 0,
            metadata,
        }
    }

    fn error(&self, message: impl Into<String>, pos: usize) -> SyntaxError {
        syntax_error(message, self.text, pos + 1, self.metadata)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Source text between two char positions with escapes removed.
    fn source(&self, start: usize, end: usize) -> String {
        let mut out = String::new();
        let mut escaped = false;
        for &c in &self.chars[start..end.min(self.chars.len())] {
            if c == '\\' && !escaped {
                escaped = true;
                continue;
            }
            escaped = false;
            out.push(c);
        }
        out.trim().to_string()
    }

    /// Parses until `close` (consumed) or end of text, returning the
    /// `|`-separated branches.
    fn parse_body(&mut self, close: Option<char>) -> Result<Vec<Branch>> {
        let open_pos = self.pos.saturating_sub(1);
        let mut branches: Vec<Branch> = vec![Vec::new()];
        let mut literal: Vec<LitChar> = Vec::new();

        loop {
            let Some(c) = self.peek() else {
                if let Some(close) = close {
                    return Err(self
                        .error(format!("Failed to find ending '{close}'"), open_pos)
                        .into());
                }
                self.flush(&mut literal, current(&mut branches))?;
                return Ok(branches);
            };

            if c == '\\' {
                if let Some(&next) = self.chars.get(self.pos + 1) {
                    literal.push(LitChar {
                        c: next,
                        escaped: true,
                        pos: self.pos + 1,
                    });
                }
                self.pos += 2;
                continue;
            }

            if Some(c) == close {
                self.flush(&mut literal, current(&mut branches))?;
                self.pos += 1;
                return Ok(branches);
            }

            match c {
                '(' => {
                    self.flush(&mut literal, current(&mut branches))?;
                    let start = self.pos;
                    self.pos += 1;
                    let inner = self.parse_body(Some(')'))?;
                    let text = self.source(start + 1, self.pos - 1);
                    let mut group: Expression = if inner.len() > 1 {
                        self.alternative_from(inner, &text, start)?.into()
                    } else {
                        Sequence::group(text, inner.into_iter().next().unwrap_or_default())
                            .into()
                    };
                    self.parse_suffix(&mut group)?;
                    current(&mut branches).push(group);
                }
                '[' => {
                    self.flush(&mut literal, current(&mut branches))?;
                    let start = self.pos;
                    self.pos += 1;
                    let inner = self.parse_body(Some(']'))?;
                    let text = self.source(start + 1, self.pos - 1);
                    let mut optional: Expression = self.optional_from(inner, text, start)?.into();
                    self.parse_suffix(&mut optional)?;
                    current(&mut branches).push(optional);
                }
                '<' => {
                    self.flush(&mut literal, current(&mut branches))?;
                    let rule = self.parse_rule_reference()?;
                    current(&mut branches).push(rule.into());
                }
                '{' => {
                    self.flush(&mut literal, current(&mut branches))?;
                    let start = self.pos;
                    let tag = self.parse_tag()?;
                    match current(&mut branches).last_mut() {
                        Some(last) => last.set_tag(tag),
                        None => {
                            return Err(self
                                .error("Expected expression preceding tag", start)
                                .into())
                        }
                    }
                }
                '|' => {
                    self.flush(&mut literal, current(&mut branches))?;
                    self.pos += 1;
                    branches.push(Vec::new());
                }
                ')' | ']' | '>' | '}' => {
                    return Err(self.error(format!("Unexpected '{c}'"), self.pos).into());
                }
                ':' if self.chars.get(self.pos + 1) == Some(&'(')
                    && literal.last().is_some_and(|l| l.escaped || !l.c.is_whitespace()) =>
                {
                    // word:(multi word output) stays inside one token
                    let start = self.pos;
                    let Some(end) = self.chars[start..].iter().position(|&c| c == ')') else {
                        return Err(self.error("Missing end parenthesis", start).into());
                    };
                    literal.push(LitChar {
                        c: ':',
                        escaped: false,
                        pos: start,
                    });
                    for pos in start + 1..=start + end {
                        literal.push(LitChar {
                            c: self.chars[pos],
                            escaped: true,
                            pos,
                        });
                    }
                    self.pos = start + end + 1;
                }
                _ => {
                    literal.push(LitChar {
                        c,
                        escaped: false,
                        pos: self.pos,
                    });
                    self.pos += 1;
                }
            }
        }
    }

    /// Builds an alternative from `|` branches. Every branch must hold at
    /// least one expression.
    fn alternative_from(&self, branches: Vec<Branch>, text: &str, pos: usize) -> Result<Sequence> {
        let mut items = Vec::with_capacity(branches.len());
        for branch in branches {
            items.push(self.branch_expression(branch, pos)?);
        }
        Ok(Sequence::alternative(text, items))
    }

    fn branch_expression(&self, mut branch: Branch, pos: usize) -> Result<Expression> {
        match branch.len() {
            0 => Err(self.error("Empty alternative", pos).into()),
            1 => Ok(branch.remove(0)),
            _ => {
                let text = branch
                    .iter()
                    .map(Expression::text)
                    .collect::<Vec<_>>()
                    .join(" ");
                Ok(Sequence::group(text, branch).into())
            }
        }
    }

    fn optional_from(&self, mut branches: Vec<Branch>, text: String, pos: usize) -> Result<Sequence> {
        let mut items = Vec::new();
        if branches.len() > 1 {
            for branch in branches {
                items.push(self.branch_expression(branch, pos)?);
            }
        } else if let Some(branch) = branches.pop() {
            if !branch.is_empty() {
                items.push(self.branch_expression(branch, pos)?);
            }
        }
        items.push(Word::empty().into());
        Ok(Sequence::alternative(text, items))
    }

    fn parse_rule_reference(&mut self) -> Result<RuleReference> {
        let start = self.pos;
        let Some(len) = self.chars[start..].iter().position(|&c| c == '>') else {
            return Err(self.error("Failed to find ending '>'", start).into());
        };
        let end = start + len;
        let full_name = self.source(start + 1, end);
        if full_name.is_empty() {
            return Err(self.error("Empty rule reference", start).into());
        }
        self.pos = end + 1;
        if matches!(self.peek(), Some(':') | Some('!')) {
            return Err(self
                .error("Rule references cannot carry substitutions or converters", self.pos)
                .into());
        }

        let (grammar_name, rule_name) = match full_name.rfind('.') {
            Some(dot) => (
                Some(full_name[..dot].to_string()),
                full_name[dot + 1..].to_string(),
            ),
            None => (
                self.metadata.and_then(|m| m.intent_name.clone()),
                full_name.clone(),
            ),
        };
        Ok(RuleReference {
            text: self.chars[start..=end].iter().collect(),
            rule_name,
            grammar_name,
            tag: None,
        })
    }

    fn parse_tag(&mut self) -> Result<Tag> {
        let start = self.pos;
        let mut pos = start + 1;
        let mut raw: Vec<LitChar> = Vec::new();
        loop {
            match self.chars.get(pos) {
                None => return Err(self.error("Failed to find ending '}'", start).into()),
                Some('}') => break,
                Some('\\') => {
                    if let Some(&c) = self.chars.get(pos + 1) {
                        raw.push(LitChar { c, escaped: true, pos: pos + 1 });
                    }
                    pos += 2;
                }
                Some(&c) => {
                    raw.push(LitChar { c, escaped: false, pos });
                    pos += 1;
                }
            }
        }
        self.pos = pos + 1;
        if matches!(self.peek(), Some(':') | Some('!')) {
            return Err(self
                .error("Tags cannot carry a suffix after '}'", self.pos)
                .into());
        }

        let (name, substitution, converters) = split_suffixes(&raw);
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(self.error("Empty tag", start).into());
        }
        Ok(Tag {
            name,
            substitution,
            converters,
        })
    }

    /// `:sub`, `:(out words)` and `!conv` after a group or optional.
    fn parse_suffix(&mut self, host: &mut Expression) -> Result<()> {
        while let Some(c @ (':' | '!')) = self.peek() {
            let marker = self.pos;
            self.pos += 1;
            let text = if self.peek() == Some('(') {
                let start = self.pos;
                let Some(len) = self.chars[start..].iter().position(|&c| c == ')') else {
                    return Err(self.error("Missing end parenthesis", marker).into());
                };
                self.pos = start + len + 1;
                self.chars[start..self.pos].iter().collect::<String>()
            } else {
                let start = self.pos;
                while let Some(next) = self.peek() {
                    if next.is_whitespace() || next == ':' || next == '!' || STRUCTURAL.contains(&next)
                    {
                        break;
                    }
                    self.pos += 1;
                }
                self.chars[start..self.pos].iter().collect::<String>()
            };

            let Some((substitution, converters)) = host.substitutable_mut() else {
                return Err(self.error("Expected substitutable expression", marker).into());
            };
            if c == ':' {
                *substitution = Some(parse_substitution(&text));
            } else {
                let name = text.trim().trim_start_matches('(').trim_end_matches(')');
                if name.is_empty() {
                    return Err(self.error("Empty converter name", marker).into());
                }
                converters.extend(name.split('!').map(str::to_string));
            }
        }
        Ok(())
    }

    /// Splits the accumulated literal on unescaped whitespace and appends
    /// the resulting words and slot references.
    fn flush(&self, literal: &mut Vec<LitChar>, branch: &mut Branch) -> Result<()> {
        let mut token: Vec<LitChar> = Vec::new();
        for lc in literal.drain(..) {
            if !lc.escaped && lc.c.is_whitespace() {
                if !token.is_empty() {
                    branch.push(self.parse_token(&token)?);
                    token.clear();
                }
            } else {
                token.push(lc);
            }
        }
        if !token.is_empty() {
            branch.push(self.parse_token(&token)?);
        }
        Ok(())
    }

    fn parse_token(&self, token: &[LitChar]) -> Result<Expression> {
        let text: String = token.iter().map(|l| l.c).collect();
        let is_slot = token.first().is_some_and(|l| l.c == '$' && !l.escaped);
        let body = if is_slot { &token[1..] } else { token };
        let (host, substitution, converters) = split_suffixes(body);
        let has_suffix = substitution.is_some() || !converters.is_empty();

        if host.is_empty() && (has_suffix || is_slot) {
            let pos = token.first().map(|l| l.pos).unwrap_or(self.pos);
            let message = if is_slot {
                "Empty slot name"
            } else {
                "Substitution or converter without a preceding word"
            };
            return Err(self.error(message, pos).into());
        }

        if is_slot {
            Ok(SlotReference {
                text,
                slot_name: host,
                substitution,
                converters,
                tag: None,
            }
            .into())
        } else {
            Ok(Word {
                text: host,
                substitution,
                converters,
                tag: None,
            }
            .into())
        }
    }
}

fn current(branches: &mut [Branch]) -> &mut Branch {
    let last = branches.len() - 1;
    &mut branches[last]
}

/// `host:sub!conv1!conv2` on unescaped markers. Escaped characters stay in
/// whichever part they appear.
fn split_suffixes(chars: &[LitChar]) -> (String, Option<Vec<String>>, Vec<String>) {
    let mut host = String::new();
    let mut sub: Option<String> = None;
    let mut converters: Vec<String> = Vec::new();

    for lc in chars {
        match (lc.c, lc.escaped) {
            ('!', false) => converters.push(String::new()),
            (':', false) if sub.is_none() && converters.is_empty() => sub = Some(String::new()),
            (c, _) => {
                if let Some(conv) = converters.last_mut() {
                    conv.push(c);
                } else if let Some(sub) = sub.as_mut() {
                    sub.push(c);
                } else {
                    host.push(c);
                }
            }
        }
    }

    let converters = converters.into_iter().filter(|c| !c.is_empty()).collect();
    (host, sub.as_deref().map(parse_substitution), converters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrammarError;
    use crate::expression::SequenceKind;
    use proptest::prelude::*;

    fn parse(text: &str) -> Sentence {
        parse_sentence(text, None).expect("parse")
    }

    #[test]
    fn rule_definition_compiles() {
        let caps = rule_definition().captures("public <color> = red | blue;").unwrap();
        assert_eq!(&caps[2], "color");
        assert_eq!(caps[3].trim(), "red | blue");
        assert!(rule_definition().captures("no rule here").is_none());
    }

    fn word(expr: &Expression) -> &Word {
        match expr {
            Expression::Word(w) => w,
            other => panic!("expected word, got {other:?}"),
        }
    }

    fn seq(expr: &Expression) -> &Sequence {
        match expr {
            Expression::Sequence(s) => s,
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    fn column_of(text: &str) -> usize {
        match parse_sentence(text, None) {
            Err(GrammarError::Syntax(e)) => e.column,
            other => panic!("expected syntax error for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn literal_words() {
        let s = parse("turn on the light");
        assert_eq!(s.kind, SequenceKind::Group);
        let words: Vec<_> = s.items.iter().map(|e| word(e).text.as_str()).collect();
        assert_eq!(words, vec!["turn", "on", "the", "light"]);
    }

    #[test]
    fn optional_single_item_is_unwrapped() {
        let s = parse("hello [world]");
        assert_eq!(s.items.len(), 2);
        let opt = seq(&s.items[1]);
        assert!(opt.is_optional());
        assert_eq!(word(&opt.items[0]).text, "world");
        assert_eq!(word(&opt.items[1]).text, "");
    }

    #[test]
    fn optional_with_alternatives_takes_branches() {
        let s = parse("[a | b c]");
        let opt = seq(&s.items[0]);
        assert_eq!(opt.items.len(), 3);
        assert_eq!(word(&opt.items[0]).text, "a");
        let group = seq(&opt.items[1]);
        assert_eq!(group.kind, SequenceKind::Group);
        assert_eq!(group.items.len(), 2);
    }

    #[test]
    fn top_level_alternative() {
        let s = parse("red | green light");
        assert_eq!(s.items.len(), 1);
        let alt = seq(&s.items[0]);
        assert_eq!(alt.kind, SequenceKind::Alternative);
        assert_eq!(word(&alt.items[0]).text, "red");
        assert_eq!(seq(&alt.items[1]).items.len(), 2);
    }

    #[test]
    fn group_alternative_with_tag_and_substitution() {
        let s = parse("set (red | green):color{color}");
        let alt = seq(&s.items[1]);
        assert_eq!(alt.kind, SequenceKind::Alternative);
        assert_eq!(alt.substitution, Some(vec!["color".to_string()]));
        assert_eq!(alt.tag.as_ref().map(|t| t.name.as_str()), Some("color"));
    }

    #[test]
    fn word_substitution_and_converters() {
        let s = parse("twenty:20!int");
        let w = word(&s.items[0]);
        assert_eq!(w.text, "twenty");
        assert_eq!(w.substitution, Some(vec!["20".to_string()]));
        assert_eq!(w.converters, vec!["int".to_string()]);

        let s = parse("tv:(television set)!upper!lower");
        let w = word(&s.items[0]);
        assert_eq!(w.text, "tv");
        assert_eq!(
            w.substitution,
            Some(vec!["television".to_string(), "set".to_string()])
        );
        assert_eq!(w.converters, vec!["upper".to_string(), "lower".to_string()]);
    }

    #[test]
    fn empty_substitution_deletes_output() {
        let s = parse("please: turn on");
        assert_eq!(word(&s.items[0]).substitution, Some(vec![]));
    }

    #[test]
    fn group_substitution_sequence() {
        let s = parse("(living room):(den area)!lower");
        let g = seq(&s.items[0]);
        assert_eq!(g.text, "living room");
        assert_eq!(
            g.substitution,
            Some(vec!["den".to_string(), "area".to_string()])
        );
        assert_eq!(g.converters, vec!["lower".to_string()]);
    }

    #[test]
    fn optional_converter() {
        let s = parse("[five]!int");
        let opt = seq(&s.items[0]);
        assert!(opt.is_optional());
        assert_eq!(opt.converters, vec!["int".to_string()]);
    }

    #[test]
    fn tag_with_substitution_and_converter() {
        let s = parse("(on | off){state:enabled!upper}");
        let tag = seq(&s.items[0]).tag.clone().expect("tag");
        assert_eq!(tag.name, "state");
        assert_eq!(tag.substitution, Some(vec!["enabled".to_string()]));
        assert_eq!(tag.converters, vec!["upper".to_string()]);
    }

    #[test]
    fn tag_attaches_to_last_word_only() {
        let s = parse("the kitchen light{name}");
        assert!(word(&s.items[0]).tag.is_none());
        assert_eq!(
            word(&s.items[2]).tag.as_ref().map(|t| t.name.as_str()),
            Some("name")
        );
    }

    #[test]
    fn slot_references() {
        let s = parse("set $color:blue!upper{c} and $mycroft/number,1,10");
        let Expression::Slot(slot) = &s.items[1] else {
            panic!("expected slot");
        };
        assert_eq!(slot.slot_name, "color");
        assert_eq!(slot.substitution, Some(vec!["blue".to_string()]));
        assert_eq!(slot.converters, vec!["upper".to_string()]);
        assert_eq!(slot.tag.as_ref().map(|t| t.name.as_str()), Some("c"));
        let Expression::Slot(num) = &s.items[3] else {
            panic!("expected slot");
        };
        assert_eq!(num.key(), "$mycroft/number,1,10");
    }

    #[test]
    fn rule_reference_qualification() {
        let meta = ParseMetadata::new("test.ini", 3).with_intent("Lights");
        let s = parse_sentence("turn <state> <Other.thing.name>", Some(&meta)).unwrap();
        let Expression::Rule(local) = &s.items[1] else {
            panic!("expected rule");
        };
        assert_eq!(local.full_rule_name(), "Lights.state");
        assert_eq!(local.text, "<state>");
        let Expression::Rule(remote) = &s.items[2] else {
            panic!("expected rule");
        };
        assert_eq!(remote.grammar_name.as_deref(), Some("Other.thing"));
        assert_eq!(remote.rule_name, "name");
    }

    #[test]
    fn escapes_are_literal() {
        let s = parse(r"what is 2 \+ 2 \(roughly\)");
        let texts: Vec<_> = s.items.iter().map(|e| e.text().to_string()).collect();
        assert_eq!(texts, vec!["what", "is", "2", "+", "2", "(roughly)"]);
        let s = parse(r"a\:b");
        assert_eq!(word(&s.items[0]).text, "a:b");
        assert!(word(&s.items[0]).substitution.is_none());
    }

    #[test]
    fn wildcard_word() {
        let s = parse("play *");
        assert!(word(&s.items[1]).is_wildcard());
    }

    #[test]
    fn syntax_errors_carry_columns() {
        assert_eq!(column_of("a (b c"), 3);
        assert_eq!(column_of("a [b"), 3);
        assert_eq!(column_of("a <b"), 3);
        assert_eq!(column_of("a {b"), 3);
        assert_eq!(column_of("a b)"), 4);
        assert_eq!(column_of("{tag} a"), 1);
        assert_eq!(column_of("a <>"), 3);
        assert_eq!(column_of("a :sub"), 3);
        assert_eq!(column_of("<r>:sub"), 4);
        assert_eq!(column_of("a | | b"), 1);
    }

    #[test]
    fn syntax_error_reports_file_and_line() {
        let meta = ParseMetadata::new("sentences.ini", 12);
        let err = parse_sentence("oops (", Some(&meta)).unwrap_err();
        let GrammarError::Syntax(e) = err else {
            panic!("expected syntax error");
        };
        assert_eq!(e.file_name.as_deref(), Some("sentences.ini"));
        assert_eq!(e.line_number, Some(12));
        assert!(e.to_string().contains("sentences.ini"));
    }

    #[test]
    fn rule_declarations() {
        let rule = parse_rule("public <color> = (red | green);", None).unwrap();
        assert!(rule.public);
        assert_eq!(rule.name, "color");
        assert_eq!(seq(&rule.body.items[0]).kind, SequenceKind::Alternative);

        let rule = parse_rule("<size> = big", None).unwrap();
        assert!(!rule.public);
        assert_eq!(word(&rule.body.items[0]).text, "big");

        assert!(parse_rule("size = big;", None).is_err());
    }

    #[test]
    fn substitution_text() {
        assert_eq!(parse_substitution(" (a b) "), vec!["a", "b"]);
        assert_eq!(parse_substitution("x"), vec!["x"]);
        assert!(parse_substitution("").is_empty());
    }

    proptest! {
        #[test]
        fn parser_never_panics(text in "[a-z \\[\\](){}<>|:!$\\\\*.,0-9]{0,40}") {
            let _ = parse_sentence(&text, None);
        }

        #[test]
        fn plain_words_round_trip(words in prop::collection::vec("[a-z]{1,8}", 1..8)) {
            let text = words.join(" ");
            let s = parse_sentence(&text, None).unwrap();
            let parsed: Vec<String> = s.items.iter().map(|e| e.text().to_string()).collect();
            prop_assert_eq!(parsed, words);
        }
    }
}
