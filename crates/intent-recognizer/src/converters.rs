//! Named value converters applied by `!name` in templates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::extract::{EnglishExtractor, ValueExtractor};
use crate::types::Value;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type ConvertResult = core::result::Result<Vec<Value>, BoxError>;

/// Turns the values collected between `__convert__` and `__converted__` into
/// new values. `args` are the `,`-separated arguments after the name.
pub trait Converter: Send + Sync {
    fn convert(&self, values: &[Value], args: &[String]) -> ConvertResult;
}

impl<F> Converter for F
where
    F: Fn(&[Value], &[String]) -> ConvertResult + Send + Sync,
{
    fn convert(&self, values: &[Value], args: &[String]) -> ConvertResult {
        self(values, args)
    }
}

/// Converter registry. [`Converters::default`] holds the built-ins.
#[derive(Clone)]
pub struct Converters {
    converters: BTreeMap<String, Arc<dyn Converter>>,
}

impl Converters {
    /// Registry with no converters at all.
    pub fn empty() -> Self {
        Self {
            converters: BTreeMap::new(),
        }
    }

    /// Built-ins with `num`, `duration` and `datetime` backed by `extractor`.
    pub fn with_extractor(extractor: Arc<dyn ValueExtractor>) -> Self {
        let mut c = Self::empty();
        c.register("int", |v: &[Value], _: &[String]| each(v, to_int));
        c.register("float", |v: &[Value], _: &[String]| each(v, to_float));
        c.register("bool", |v: &[Value], _: &[String]| each(v, |x| Ok(Value::Bool(truthy(x)))));
        c.register("lower", |v: &[Value], _: &[String]| {
            each(v, |x| Ok(Value::Text(x.to_string().to_lowercase())))
        });
        c.register("upper", |v: &[Value], _: &[String]| {
            each(v, |x| Ok(Value::Text(x.to_string().to_uppercase())))
        });
        c.register("object", |v: &[Value], _: &[String]| -> ConvertResult {
            let value = match v {
                [single] => single.clone(),
                many => Value::Text(joined(many)),
            };
            Ok(vec![Value::Object(BTreeMap::from([("value".to_string(), value)]))])
        });
        c.register("kind", |v: &[Value], args: &[String]| tag_objects(v, args, "kind"));
        c.register("unit", |v: &[Value], args: &[String]| tag_objects(v, args, "unit"));

        let x = extractor.clone();
        c.register("num", move |v: &[Value], _: &[String]| -> ConvertResult {
            let text = joined(v);
            let n = x
                .extract_number(&text)
                .ok_or_else(|| format!("no number in {text:?}"))?;
            Ok(vec![number_value(n)])
        });
        let x = extractor.clone();
        c.register("duration", move |v: &[Value], _: &[String]| -> ConvertResult {
            let text = joined(v);
            let d = x
                .extract_duration(&text)
                .ok_or_else(|| format!("no duration in {text:?}"))?;
            Ok(vec![Value::Duration {
                seconds: d.as_seconds_f64(),
            }])
        });
        let x = extractor;
        c.register("datetime", move |v: &[Value], _: &[String]| -> ConvertResult {
            let text = joined(v);
            let dt = x
                .extract_datetime(&text)
                .ok_or_else(|| format!("no date or time in {text:?}"))?;
            Ok(vec![Value::DateTime(dt)])
        });
        c
    }

    /// Adds or replaces a converter.
    pub fn register(&mut self, name: &str, converter: impl Converter + 'static) {
        self.converters.insert(name.to_string(), Arc::new(converter));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Converter> {
        self.converters.get(name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.converters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.converters.keys().map(String::as_str)
    }
}

impl Default for Converters {
    fn default() -> Self {
        Self::with_extractor(Arc::new(EnglishExtractor::default()))
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.converters.keys()).finish()
    }
}

fn each(values: &[Value], f: impl Fn(&Value) -> Result<Value, String>) -> ConvertResult {
    Ok(values.iter().map(f).collect::<Result<Vec<_>, _>>()?)
}

fn joined(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

fn to_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(x) => Ok(Value::Int(x.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| format!("{s:?} is not an integer: {e}")),
        other => Err(format!("cannot convert {other} to an integer")),
    }
}

fn to_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("{s:?} is not a number: {e}")),
        other => Err(format!("cannot convert {other} to a float")),
    }
}

/// False for zero and for any casing of "false".
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(x) => *x != 0.0,
        other => !other.to_string().eq_ignore_ascii_case("false"),
    }
}

/// Adds `key: args[0]` to each object value, keeping a key that is already set.
fn tag_objects(values: &[Value], args: &[String], key: &str) -> ConvertResult {
    let tag = args
        .first()
        .ok_or_else(|| format!("{key} needs an argument, as in {key},name"))?;
    values
        .iter()
        .map(|v| -> Result<Value, BoxError> {
            match v {
                Value::Object(map) => {
                    let mut map = map.clone();
                    map.entry(key.to_string())
                        .or_insert_with(|| Value::Text(tag.clone()));
                    Ok(Value::Object(map))
                }
                other => Err(format!("{key} expects an object, got {other}").into()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn run(c: &Converters, name: &str, values: &[Value], args: &[&str]) -> Vec<Value> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        c.get(name).unwrap().convert(values, &args).unwrap()
    }

    #[test]
    fn scalar_builtins() {
        let c = Converters::default();
        assert_eq!(run(&c, "int", &["20".into()], &[]), vec![Value::Int(20)]);
        assert_eq!(run(&c, "float", &["1.5".into()], &[]), vec![Value::Float(1.5)]);
        assert_eq!(
            run(&c, "bool", &["False".into(), Value::Int(0), "yes".into()], &[]),
            vec![Value::Bool(false), Value::Bool(false), Value::Bool(true)]
        );
        assert_eq!(run(&c, "upper", &["red".into()], &[]), vec![Value::text("RED")]);
        assert!(c.get("int").unwrap().convert(&["x".into()], &[]).is_err());
    }

    #[test]
    fn object_kind_unit() {
        let c = Converters::default();
        let obj = run(&c, "object", &["dark".into(), "red".into()], &[]);
        let tagged = run(&c, "kind", &obj, &["Color"]);
        let Value::Object(map) = &tagged[0] else {
            panic!("expected object");
        };
        assert_eq!(map["value"], Value::text("dark red"));
        assert_eq!(map["kind"], Value::text("Color"));

        let single = run(&c, "object", &[Value::Int(3)], &[]);
        let tagged = run(&c, "unit", &single, &["meter"]);
        let Value::Object(map) = &tagged[0] else {
            panic!("expected object");
        };
        assert_eq!(map["value"], Value::Int(3));
        assert!(c.get("kind").unwrap().convert(&obj, &[]).is_err());
    }

    #[test]
    fn extractor_backed() {
        let anchor = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let c = Converters::with_extractor(Arc::new(EnglishExtractor::with_anchor(anchor)));
        assert_eq!(run(&c, "num", &["seventy".into(), "two".into()], &[]), vec![Value::Int(72)]);
        assert_eq!(
            run(&c, "duration", &["five".into(), "minutes".into()], &[]),
            vec![Value::Duration { seconds: 300.0 }]
        );
        assert_eq!(
            run(&c, "datetime", &["tomorrow".into()], &[]),
            vec![Value::DateTime(anchor + time::Duration::days(1))]
        );
    }

    #[test]
    fn overrides() {
        let mut c = Converters::default();
        c.register("int", |_: &[Value], _: &[String]| -> ConvertResult { Ok(vec![Value::Int(0)]) });
        assert_eq!(run(&c, "int", &["7".into()], &[]), vec![Value::Int(0)]);
        assert!(Converters::empty().get("int").is_none());
    }
}
