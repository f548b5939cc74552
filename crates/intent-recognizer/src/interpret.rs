//! Turns a matched path into a [`Recognition`].
//!
//! Runs in three passes over the path:
//! 1. collect `(raw word, output label, matched tokens)` per edge,
//! 2. run converter frames delimited by `__convert__`/`__converted__`,
//! 3. collect entities delimited by `__begin__`/`__end__`.

use intent_graph::labels::{self, Control};
use intent_graph::IntentGraph;
use template_grammar::WILDCARD;
use tracing::debug;

use crate::converters::Converters;
use crate::error::{RecognizeError, Result};
use crate::types::{Entity, Intent, PathStep, Recognition, Value};

struct Emitted {
    raw: String,
    olabel: String,
    matched: Vec<String>,
}

/// Value position in the token stream after converters ran.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Empty,
    Control(String),
    Value(Value),
}

struct Converted {
    raw: String,
    token: Token,
    matched: Vec<String>,
}

struct FrameItem {
    raw: String,
    value: Option<Value>,
    matched: Vec<String>,
}

struct Frame {
    key: String,
    name: String,
    args: Vec<String>,
    items: Vec<FrameItem>,
}

impl Frame {
    fn open(key: &str) -> Self {
        let mut parts = key.split(',');
        let name = parts.next().unwrap_or_default().to_string();
        Self {
            key: key.to_string(),
            name,
            args: parts.map(str::to_string).collect(),
            items: Vec::new(),
        }
    }
}

fn emit_path(
    path: &[PathStep],
    graph: &IntentGraph,
    intent: &mut String,
) -> Result<Vec<Emitted>> {
    let mut out = Vec::new();
    for step in path {
        let edge = graph.edge(step.from, step.to).ok_or_else(|| {
            RecognizeError::InvalidPath(format!("no edge {} -> {}", step.from, step.to))
        })?;
        let raw = graph.word(step.to).unwrap_or_default().to_string();

        let mut olabel = if edge.olabel == WILDCARD {
            step.matched.join(" ")
        } else {
            edge.olabel.clone()
        };
        olabel = labels::unpack(&olabel)?;

        if let Some(name) = labels::intent_name(&olabel) {
            *intent = name.to_string();
        } else if !raw.is_empty() || !olabel.is_empty() {
            out.push(Emitted {
                raw,
                olabel,
                matched: step.matched.clone(),
            });
        }
    }
    Ok(out)
}

fn run_converters(emitted: Vec<Emitted>, converters: &Converters) -> Result<Vec<Converted>> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut out: Vec<Converted> = Vec::new();

    for Emitted {
        raw,
        olabel,
        matched,
    } in emitted
    {
        if !olabel.is_empty() && !labels::is_control(&olabel) {
            if let Some(frame) = stack.last_mut() {
                frame.items.push(FrameItem {
                    raw,
                    value: Some(Value::Text(olabel)),
                    matched,
                });
                continue;
            }
        }

        match Control::parse(&olabel) {
            Some(Control::Convert(key)) => stack.push(Frame::open(key)),
            Some(Control::Converted(key)) => {
                let frame = stack.pop().ok_or_else(|| {
                    RecognizeError::UnbalancedConverter(format!("{olabel} without a matching convert"))
                })?;
                if frame.key != key {
                    return Err(RecognizeError::UnbalancedConverter(format!(
                        "expected {}, got {key}",
                        frame.key
                    )));
                }

                let raws: Vec<String> = frame
                    .items
                    .iter()
                    .filter(|i| !i.raw.is_empty())
                    .map(|i| i.raw.clone())
                    .collect();
                let values: Vec<Value> = frame
                    .items
                    .iter()
                    .filter_map(|i| i.value.clone())
                    .filter(|v| v.as_str() != Some(""))
                    .collect();
                let matched: Vec<Vec<String>> = frame
                    .items
                    .into_iter()
                    .map(|i| i.matched)
                    .filter(|m| !m.is_empty())
                    .collect();

                let converter = converters
                    .get(&frame.name)
                    .ok_or_else(|| RecognizeError::UnknownConverter(frame.name.clone()))?;
                let converted = converter.convert(&values, &frame.args).map_err(|e| {
                    RecognizeError::Conversion {
                        converter: frame.key.clone(),
                        message: e.to_string(),
                    }
                })?;
                debug!(converter = %frame.key, inputs = values.len(), outputs = converted.len(), "converted");

                let len = raws.len().max(converted.len()).max(matched.len());
                let mut raws = raws.into_iter();
                let mut converted = converted.into_iter();
                let mut matched = matched.into_iter();
                for _ in 0..len {
                    let raw = raws.next().unwrap_or_default();
                    let value = converted.next();
                    let tokens = matched.next().unwrap_or_default();
                    match stack.last_mut() {
                        Some(parent) => parent.items.push(FrameItem {
                            raw,
                            value,
                            matched: tokens,
                        }),
                        None => out.push(Converted {
                            raw,
                            token: value.map_or(Token::Empty, Token::Value),
                            matched: tokens,
                        }),
                    }
                }
            }
            _ => {
                let token = if olabel.is_empty() {
                    Token::Empty
                } else if labels::is_control(&olabel) {
                    Token::Control(olabel)
                } else {
                    Token::Value(Value::Text(olabel))
                };
                out.push(Converted {
                    raw,
                    token,
                    matched,
                });
            }
        }
    }

    if let Some(frame) = stack.last() {
        return Err(RecognizeError::UnbalancedConverter(format!(
            "{} still open at end of path",
            frame.key
        )));
    }
    Ok(out)
}

fn collect_entities(tokens: Vec<Converted>, recognition: &mut Recognition) -> Result<()> {
    let mut stack: Vec<Entity> = Vec::new();
    let mut raw_index = 0usize;
    let mut sub_index = 0usize;

    for Converted {
        raw,
        token,
        matched,
    } in tokens
    {
        let raw_tokens = if !matched.is_empty() {
            matched
        } else if !raw.is_empty() {
            vec![raw]
        } else {
            Vec::new()
        };
        for t in &raw_tokens {
            raw_index += t.chars().count() + 1;
        }
        if let Some(open) = stack.last_mut() {
            open.raw_tokens.extend(raw_tokens.iter().cloned());
        }
        recognition.raw_tokens.extend(raw_tokens);

        match token {
            Token::Empty => {}
            Token::Control(label) => match Control::parse(&label) {
                Some(Control::Begin(name)) => {
                    stack.push(Entity::open(name, sub_index, raw_index));
                }
                Some(Control::End(name)) => {
                    let mut entity = stack.pop().ok_or_else(|| {
                        RecognizeError::UnbalancedEntity(format!("{label} without a matching begin"))
                    })?;
                    if entity.entity != name {
                        return Err(RecognizeError::UnbalancedEntity(format!(
                            "expected end of {}, got {name}",
                            entity.entity
                        )));
                    }
                    entity.end = sub_index.saturating_sub(1);
                    entity.raw_end = raw_index.saturating_sub(1);
                    entity.value = match entity.tokens.as_slice() {
                        [single] => single.clone(),
                        many => Value::Text(
                            many.iter()
                                .map(ToString::to_string)
                                .collect::<Vec<_>>()
                                .join(" "),
                        ),
                    };
                    entity.raw_value = entity.raw_tokens.join(" ");
                    recognition.entities.push(entity);
                }
                Some(Control::Source(source)) => {
                    if let Some(open) = stack.last_mut() {
                        open.source = Some(source.to_string());
                    }
                }
                _ => push_value(Value::Text(label), &mut stack, recognition, &mut sub_index),
            },
            Token::Value(value) => push_value(value, &mut stack, recognition, &mut sub_index),
        }
    }

    if let Some(open) = stack.last() {
        return Err(RecognizeError::UnbalancedEntity(format!(
            "{} still open at end of path",
            open.entity
        )));
    }
    Ok(())
}

fn push_value(
    value: Value,
    stack: &mut [Entity],
    recognition: &mut Recognition,
    sub_index: &mut usize,
) {
    let text = value.to_string();
    if text.is_empty() {
        return;
    }
    *sub_index += text.chars().count() + 1;
    if let Some(open) = stack.last_mut() {
        open.tokens.push(value.clone());
    }
    recognition.tokens.push(value);
}

/// Interprets `path` against `graph`.
///
/// `cost` is the fuzzy cost of the path; confidence is
/// `1 - cost / raw token count`, clamped to `[0, 1]`.
pub fn path_to_recognition(
    path: &[PathStep],
    graph: &IntentGraph,
    cost: Option<f64>,
    converters: &Converters,
) -> Result<Recognition> {
    let mut intent = String::new();
    let emitted = emit_path(path, graph, &mut intent)?;
    let converted = run_converters(emitted, converters)?;

    let mut recognition = Recognition {
        intent: Intent {
            name: intent,
            confidence: 1.0,
        },
        entities: Vec::new(),
        text: String::new(),
        raw_text: String::new(),
        tokens: Vec::new(),
        raw_tokens: Vec::new(),
        recognize_seconds: 0.0,
    };
    collect_entities(converted, &mut recognition)?;

    recognition.text = recognition
        .tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    recognition.raw_text = recognition.raw_tokens.join(" ");

    if let Some(cost) = cost.filter(|c| *c > 0.0) {
        let n = recognition.raw_tokens.len();
        recognition.intent.confidence = if n == 0 {
            0.0
        } else {
            (1.0 - cost / n as f64).clamp(0.0, 1.0)
        };
    }
    Ok(recognition)
}
