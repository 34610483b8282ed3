//! Transformer nodes: positional string formatting, JSON serialization and
//! temporal formatting.
//!
//! Transformers never advance their arguments. They read `current()`, so a
//! sub-expression referenced several times within one record formats
//! consistently; advancing is left to whichever composition drives the
//! record.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::DateTime;

use crate::datum::Datum;
use crate::error::Error;
use crate::value::{EvalCtx, Value};

/// A format string compiled into literal and placeholder segments.
///
/// Placeholders are `{}` (positional, in order) or `{n}` (explicit 0-based
/// index); `{{` and `}}` escape braces. Unknown or out-of-range indices fail
/// here, at construction, not during evaluation.
pub(crate) struct CompiledFormat {
    segments: Vec<Segment>,
}

enum Segment {
    Literal(String),
    Arg(usize),
}

impl CompiledFormat {
    pub(crate) fn compile(format: &str, arg_count: usize) -> Result<Self, Error> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut auto_index = 0usize;
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if chars.peek() == Some(&'{') {
                        chars.next();
                        literal.push('{');
                        continue;
                    }
                    let mut spec = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => spec.push(c),
                            None => {
                                return Err(Error::Format(format!(
                                    "unterminated placeholder in format string {format:?}"
                                )))
                            }
                        }
                    }
                    let index = if spec.is_empty() {
                        let index = auto_index;
                        auto_index += 1;
                        index
                    } else {
                        spec.parse::<usize>().map_err(|_| {
                            Error::Format(format!(
                                "invalid placeholder '{{{spec}}}' in format string {format:?}"
                            ))
                        })?
                    };
                    if index >= arg_count {
                        return Err(Error::Format(format!(
                            "placeholder index {index} out of range for {arg_count} argument(s)"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Arg(index));
                }
                '}' => {
                    if chars.peek() == Some(&'}') {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(Error::Format(format!(
                            "unmatched '}}' in format string {format:?}"
                        )));
                    }
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }
}

/// Formats its arguments' current outputs into the compiled format string.
pub(crate) struct StringTransformNode {
    format: CompiledFormat,
    args: Vec<Value>,
}

impl StringTransformNode {
    pub(crate) fn new(format: &str, args: Vec<Value>) -> Result<Self, Error> {
        Ok(Self {
            format: CompiledFormat::compile(format, args.len())?,
            args,
        })
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let mut out = String::new();
        for segment in &self.format.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Arg(index) => {
                    let datum = self.args[*index].current_in(ctx)?;
                    let _ = write!(out, "{datum}");
                }
            }
        }
        Ok(Datum::Text(out))
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        for arg in &self.args {
            arg.reset_in(ctx);
        }
    }
}

/// Serializes the inner node's current output as a JSON string.
pub(crate) struct JsonTransformNode {
    inner: Value,
}

impl JsonTransformNode {
    pub(crate) fn new(inner: Value) -> Self {
        Self { inner }
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let datum = self.inner.current_in(ctx)?;
        Ok(Datum::Text(datum.to_json().to_string()))
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        self.inner.reset_in(ctx);
    }
}

/// Formats the inner node's current temporal output with a strftime pattern.
pub(crate) struct TimeFormatNode {
    pattern: String,
    inner: Value,
}

impl TimeFormatNode {
    pub(crate) fn new(pattern: &str, inner: Value) -> Result<Self, Error> {
        let invalid = StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error));
        if invalid {
            return Err(Error::Format(format!(
                "invalid time format pattern {pattern:?}"
            )));
        }
        Ok(Self {
            pattern: pattern.to_string(),
            inner,
        })
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let datum = self.inner.current_in(ctx)?;
        let rendered = match &datum {
            Datum::Long(millis) => {
                let dt = DateTime::from_timestamp_millis(*millis).ok_or_else(|| {
                    Error::Format(format!("{millis} is out of range for epoch milliseconds"))
                })?;
                render(dt.format(&self.pattern), &self.pattern)?
            }
            Datum::Date(d) => render(d.format(&self.pattern), &self.pattern)?,
            Datum::DateTime(dt) => render(dt.format(&self.pattern), &self.pattern)?,
            Datum::LocalDateTime(dt) => render(dt.format(&self.pattern), &self.pattern)?,
            other => {
                return Err(Error::Format(format!(
                    "time() expects a temporal value, got {other:?}"
                )))
            }
        };
        Ok(Datum::Text(rendered))
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        self.inner.reset_in(ctx);
    }
}

/// Renders a chrono delayed format, turning a field/pattern mismatch (for
/// example time specifiers against a bare date) into a format error instead
/// of a panic.
fn render(delayed: impl std::fmt::Display, pattern: &str) -> Result<String, Error> {
    let mut out = String::new();
    write!(out, "{delayed}")
        .map_err(|_| Error::Format(format!("pattern {pattern:?} does not fit the value")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_auto_placeholders_format_in_order() {
        let mut node = StringTransformNode::new(
            "{} is {}",
            vec![
                Value::primitive(Datum::Text("x".to_string())),
                Value::primitive(Datum::Long(9)),
            ],
        )
        .unwrap();
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        assert_eq!(out, Datum::Text("x is 9".to_string()));
    }

    #[test]
    fn test_explicit_indices_may_repeat() {
        let mut node = StringTransformNode::new(
            "{0}{0}{1}",
            vec![
                Value::primitive(Datum::Text("a".to_string())),
                Value::primitive(Datum::Text("b".to_string())),
            ],
        )
        .unwrap();
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        assert_eq!(out, Datum::Text("aab".to_string()));
    }

    #[test]
    fn test_escaped_braces() {
        let mut node = StringTransformNode::new(
            "{{{}}}",
            vec![Value::primitive(Datum::Long(1))],
        )
        .unwrap();
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        assert_eq!(out, Datum::Text("{1}".to_string()));
    }

    #[test]
    fn test_out_of_range_index_fails_at_construction() {
        let result = StringTransformNode::new("{2}", vec![Value::primitive(Datum::Long(1))]);
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_too_many_auto_placeholders_fail_at_construction() {
        let result =
            StringTransformNode::new("{} {}", vec![Value::primitive(Datum::Long(1))]);
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_unmatched_brace_fails() {
        assert!(StringTransformNode::new("{", vec![]).is_err());
        assert!(StringTransformNode::new("}", vec![]).is_err());
    }

    #[test]
    fn test_formatting_does_not_advance_arguments() {
        let arg = Value::primitive(Datum::Long(3));
        let before = arg.current().unwrap();
        let mut node = StringTransformNode::new("v={}", vec![arg.clone()]).unwrap();
        for _ in 0..10 {
            node.eval(&mut EvalCtx::new()).unwrap();
        }
        assert_eq!(arg.current().unwrap(), before);
    }

    #[test]
    fn test_json_round_trips_primitives() {
        let mut node = JsonTransformNode::new(Value::primitive(Datum::Double(2.5)));
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        let text = out.as_text().unwrap();
        let back: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(back, serde_json::json!(2.5));
    }

    #[test]
    fn test_json_of_text_is_quoted() {
        let mut node =
            JsonTransformNode::new(Value::primitive(Datum::Text("hi".to_string())));
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        assert_eq!(out, Datum::Text("\"hi\"".to_string()));
    }

    #[test]
    fn test_time_format_renders_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let mut node =
            TimeFormatNode::new("%d.%m.%Y", Value::primitive(Datum::Date(date))).unwrap();
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        assert_eq!(out, Datum::Text("09.03.2024".to_string()));
    }

    #[test]
    fn test_time_format_renders_epoch_millis() {
        let mut node =
            TimeFormatNode::new("%Y-%m-%d", Value::primitive(Datum::Long(0))).unwrap();
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        assert_eq!(out, Datum::Text("1970-01-01".to_string()));
    }

    #[test]
    fn test_time_format_rejects_bad_pattern() {
        let result = TimeFormatNode::new("%Q!", Value::primitive(Datum::Long(0)));
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_time_format_rejects_non_temporal_value() {
        let mut node =
            TimeFormatNode::new("%Y", Value::primitive(Datum::Bool(true))).unwrap();
        assert!(matches!(
            node.eval(&mut EvalCtx::new()),
            Err(Error::Format(_))
        ));
    }
}
