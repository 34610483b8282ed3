//! Ordered-choice expression parser.
//!
//! Implements the value-expression grammar with deterministic first-match
//! semantics: each rule either consumes input and produces a typed node, or
//! backtracks so the next alternative can try. Two kinds of failure exist:
//! soft failures drive backtracking between alternatives, while semantic
//! failures (unknown reference, invalid range, bad format string, wrong
//! distribution arity) abort the parse immediately.
//!
//! The deepest soft failure seen is what gets reported when no alternative
//! matches, which points at the most-committed rule rather than the first.

use crate::datum::Datum;
use crate::distribution::{Distribution, NormalDistribution, SeedSource, UniformDistribution};
use crate::error::{Error, ParseError};
use crate::range::Range;
use crate::resolver::ProxyTable;
use crate::value::Value;

/// Outcome of one grammar rule.
enum ParseFail {
    /// The alternative did not match; the caller backtracks.
    Soft,
    /// Semantic error; the whole parse aborts.
    Fatal(Error),
}

type Parse<T> = Result<T, ParseFail>;

/// Parse one expression into a value-graph root.
///
/// `scope` is the dotted parent of the definition being parsed and drives
/// `$reference` resolution; `table` supplies the proxies; `seeds` hands out
/// per-node RNG seeds.
pub(crate) fn parse_expression(
    input: &str,
    scope: &str,
    table: &mut ProxyTable,
    seeds: &SeedSource,
) -> Result<Value, Error> {
    let mut parser = ExprParser {
        input,
        pos: 0,
        scope,
        table,
        seeds,
        deepest: (0, "value"),
    };
    match parser.value_rule() {
        Ok(value) => {
            parser.skip_ws();
            if parser.pos == input.len() {
                Ok(value)
            } else {
                let at = parser.pos;
                let _ = parser.soft::<()>("endOfInput", at);
                Err(parser.error().into())
            }
        }
        Err(ParseFail::Fatal(err)) => Err(err),
        Err(ParseFail::Soft) => Err(parser.error().into()),
    }
}

struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    scope: &'a str,
    table: &'a mut ProxyTable,
    seeds: &'a SeedSource,
    /// Deepest soft failure so far: offset and the rule that failed there.
    deepest: (usize, &'static str),
}

impl<'a> ExprParser<'a> {
    // ------------------------------------------------------------------
    // Input primitives

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn lit(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    /// Record a soft failure at `at` and fail the current alternative.
    fn soft<T>(&mut self, rule: &'static str, at: usize) -> Parse<T> {
        if at >= self.deepest.0 {
            self.deepest = (at, rule);
        }
        Err(ParseFail::Soft)
    }

    fn fatal<T>(&self, err: Error) -> Parse<T> {
        Err(ParseFail::Fatal(err))
    }

    fn error(&self) -> ParseError {
        let (offset, rule) = self.deepest;
        let before = &self.input[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
            + 1;
        let snippet: String = self.input[offset..].chars().take(24).collect();
        ParseError {
            line,
            column,
            offset,
            rule,
            snippet,
        }
    }

    // ------------------------------------------------------------------
    // Token-level rules: punctuation absorbs horizontal whitespace.

    fn comma(&mut self) -> Parse<()> {
        self.skip_ws();
        if !self.lit(",") {
            return self.soft("comma", self.pos);
        }
        self.skip_ws();
        Ok(())
    }

    fn open_paren(&mut self) -> Parse<()> {
        self.skip_ws();
        if !self.lit("(") {
            return self.soft("openParenthesis", self.pos);
        }
        self.skip_ws();
        Ok(())
    }

    fn close_paren(&mut self) -> Parse<()> {
        self.skip_ws();
        if !self.lit(")") {
            return self.soft("closedParenthesis", self.pos);
        }
        self.skip_ws();
        Ok(())
    }

    fn open_bracket(&mut self) -> Parse<()> {
        self.skip_ws();
        if !self.lit("[") {
            return self.soft("openBracket", self.pos);
        }
        self.skip_ws();
        Ok(())
    }

    fn close_bracket(&mut self) -> Parse<()> {
        self.skip_ws();
        if !self.lit("]") {
            return self.soft("closedBracket", self.pos);
        }
        self.skip_ws();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Literals

    fn digits(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn sign(&mut self) {
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.pos += 1;
        }
    }

    /// Exponent part: `[eE][+-]?digits`.
    fn exponent(&mut self) -> bool {
        let start = self.pos;
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.pos += 1;
            self.sign();
            if self.digits() {
                return true;
            }
        }
        self.pos = start;
        false
    }

    fn long_literal(&mut self) -> Parse<i64> {
        let start = self.pos;
        self.sign();
        if !self.digits() {
            self.pos = start;
            return self.soft("longLiteral", start);
        }
        match self.input[start..self.pos].parse::<i64>() {
            Ok(v) => Ok(v),
            Err(_) => {
                self.pos = start;
                self.soft("longLiteral", start)
            }
        }
    }

    /// A number that is distinctly a double: it carries a decimal point or
    /// an exponent.
    fn double_literal(&mut self) -> Parse<f64> {
        let start = self.pos;
        self.sign();
        let int_part = self.digits();
        let mut distinct = false;
        if int_part {
            if self.peek() == Some('.') {
                let dot = self.pos;
                self.pos += 1;
                if self.digits() {
                    distinct = true;
                    self.exponent();
                } else {
                    self.pos = dot;
                }
            }
            if !distinct && self.exponent() {
                distinct = true;
            }
        } else if self.peek() == Some('.') {
            self.pos += 1;
            if self.digits() {
                distinct = true;
                self.exponent();
            }
        }
        if !distinct {
            self.pos = start;
            return self.soft("doubleLiteral", start);
        }
        match self.input[start..self.pos].parse::<f64>() {
            Ok(v) => Ok(v),
            Err(_) => {
                self.pos = start;
                self.soft("doubleLiteral", start)
            }
        }
    }

    /// Double or long, widened to double.
    fn number_literal(&mut self) -> Parse<f64> {
        let start = self.pos;
        match self.double_literal() {
            Ok(v) => return Ok(v),
            Err(ParseFail::Fatal(e)) => return self.fatal(e),
            Err(ParseFail::Soft) => self.pos = start,
        }
        self.long_literal().map(|v| v as f64)
    }

    fn bool_literal(&mut self) -> Parse<bool> {
        if self.lit("True") || self.lit("true") {
            Ok(true)
        } else if self.lit("False") || self.lit("false") {
            Ok(false)
        } else {
            self.soft("booleanLiteral", self.pos)
        }
    }

    fn escape_char(&mut self) -> Parse<char> {
        let start = self.pos;
        if !self.lit("\\") {
            return self.soft("escape", start);
        }
        let decoded = match self.bump() {
            Some('b') => '\u{0008}',
            Some('t') => '\t',
            Some('n') => '\n',
            Some('f') => '\u{000C}',
            Some('r') => '\r',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('\\') => '\\',
            _ => {
                self.pos = start;
                return self.soft("escape", start);
            }
        };
        Ok(decoded)
    }

    fn quoted_string(&mut self, quote: char) -> Parse<String> {
        let start = self.pos;
        if !self.lit(&quote.to_string()) {
            return self.soft("stringLiteral", start);
        }
        let mut out = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.pos += c.len_utf8();
                    return Ok(out);
                }
                Some('\\') => match self.escape_char() {
                    Ok(c) => out.push(c),
                    Err(fail) => {
                        self.pos = start;
                        return Err(fail);
                    }
                },
                Some('\r') | Some('\n') | None => {
                    self.pos = start;
                    return self.soft("stringLiteral", start);
                }
                Some(c) => {
                    self.pos += c.len_utf8();
                    out.push(c);
                }
            }
        }
    }

    fn string_literal(&mut self) -> Parse<String> {
        let start = self.pos;
        match self.quoted_string('\'') {
            Ok(s) => return Ok(s),
            Err(ParseFail::Fatal(e)) => return self.fatal(e),
            Err(ParseFail::Soft) => self.pos = start,
        }
        self.quoted_string('"')
    }

    /// Last-resort literal: unquoted text spanning to end of input.
    fn naked_string(&mut self) -> Parse<String> {
        if matches!(
            self.peek(),
            Some('\r') | Some('\n') | Some('"') | Some('\'') | Some('\\')
        ) {
            return self.soft("nakedStringLiteral", self.pos);
        }
        let out = self.rest().to_string();
        self.pos = self.input.len();
        Ok(out)
    }

    fn char_literal(&mut self) -> Parse<char> {
        let start = self.pos;
        if !self.lit("'") {
            return self.soft("charLiteral", start);
        }
        let c = match self.peek() {
            Some('\\') => match self.escape_char() {
                Ok(c) => c,
                Err(fail) => {
                    self.pos = start;
                    return Err(fail);
                }
            },
            Some(c) if c != '\'' => {
                self.pos += c.len_utf8();
                c
            }
            _ => {
                self.pos = start;
                return self.soft("charLiteral", start);
            }
        };
        if !self.lit("'") {
            self.pos = start;
            return self.soft("charLiteral", start);
        }
        Ok(c)
    }

    fn identifier(&mut self) -> Parse<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.pos += 1,
            _ => return self.soft("identifier", start),
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        Ok(&self.input[start..self.pos])
    }

    // ------------------------------------------------------------------
    // Ranges

    fn long_range(&mut self) -> Parse<Range<i64>> {
        let start = self.pos;
        let lo = self.long_literal()?;
        if !self.lit("..") {
            self.pos = start;
            return self.soft("longRange", self.pos);
        }
        let hi = match self.long_literal() {
            Ok(v) => v,
            Err(fail) => {
                self.pos = start;
                return Err(fail);
            }
        };
        match Range::new(lo, hi) {
            Ok(range) => Ok(range),
            Err(err) => self.fatal(err),
        }
    }

    fn double_range(&mut self) -> Parse<Range<f64>> {
        let start = self.pos;
        let lo = self.number_literal()?;
        if !self.lit("..") {
            self.pos = start;
            return self.soft("doubleRange", self.pos);
        }
        let hi = match self.number_literal() {
            Ok(v) => v,
            Err(fail) => {
                self.pos = start;
                return Err(fail);
            }
        };
        match Range::new(lo, hi) {
            Ok(range) => Ok(range),
            Err(err) => self.fatal(err),
        }
    }

    fn char_range(&mut self) -> Parse<Range<char>> {
        let start = self.pos;
        let lo = self.char_literal()?;
        if !self.lit("..") {
            self.pos = start;
            return self.soft("charRange", self.pos);
        }
        let hi = match self.char_literal() {
            Ok(c) => c,
            Err(fail) => {
                self.pos = start;
                return Err(fail);
            }
        };
        match Range::new(lo, hi) {
            Ok(range) => Ok(range),
            Err(err) => self.fatal(err),
        }
    }

    // ------------------------------------------------------------------
    // Distributions

    fn distribution(&mut self) -> Parse<Box<dyn Distribution>> {
        let start = self.pos;
        if self.lit("uniform") {
            self.open_paren()?;
            self.close_paren()?;
            return Ok(Box::new(UniformDistribution::new(self.seeds.next_seed())));
        }
        if self.lit("normal") {
            self.open_paren()?;
            let mut args = Vec::new();
            let args_start = self.pos;
            match self.number_literal() {
                Ok(first) => {
                    args.push(first);
                    loop {
                        let before = self.pos;
                        if self.comma().is_err() {
                            self.pos = before;
                            break;
                        }
                        match self.number_literal() {
                            Ok(v) => args.push(v),
                            Err(ParseFail::Fatal(e)) => return self.fatal(e),
                            Err(ParseFail::Soft) => {
                                self.pos = before;
                                break;
                            }
                        }
                    }
                }
                Err(ParseFail::Fatal(e)) => return self.fatal(e),
                Err(ParseFail::Soft) => self.pos = args_start,
            }
            self.close_paren()?;
            let seed = self.seeds.next_seed();
            return match args.len() {
                0 => Ok(Box::new(NormalDistribution::new(seed))),
                4 => match NormalDistribution::with_params(
                    args[0], args[1], args[2], args[3], seed,
                ) {
                    Ok(dist) => Ok(Box::new(dist)),
                    Err(err) => self.fatal(err),
                },
                n => self.fatal(Error::Arity(format!(
                    "normal distribution takes mean, standard deviation, lower bound \
                     and upper bound, got {n} argument(s)"
                ))),
            };
        }
        self.soft("distribution", start)
    }

    /// Optional `, distribution` tail; defaults to a fresh uniform.
    fn optional_distribution(&mut self) -> Parse<Box<dyn Distribution>> {
        let before = self.pos;
        if self.comma().is_ok() {
            match self.distribution() {
                Ok(dist) => return Ok(dist),
                Err(ParseFail::Fatal(e)) => return self.fatal(e),
                Err(ParseFail::Soft) => self.pos = before,
            }
        } else {
            self.pos = before;
        }
        Ok(Box::new(UniformDistribution::new(self.seeds.next_seed())))
    }

    // ------------------------------------------------------------------
    // References

    fn reference(&mut self) -> Parse<Value> {
        let start = self.pos;
        if !self.lit("$") {
            return self.soft("valueReference", start);
        }
        let name_start = self.pos;
        if self.identifier().is_err() {
            self.pos = start;
            return self.soft("valueReference", start);
        }
        loop {
            let before = self.pos;
            if !self.lit(".") {
                break;
            }
            if self.identifier().is_err() {
                self.pos = before;
                break;
            }
        }
        let name = &self.input[name_start..self.pos];
        match self.table.resolve(self.scope, name) {
            Ok(proxy) => Ok(proxy),
            Err(err) => self.fatal(err),
        }
    }

    // ------------------------------------------------------------------
    // Generators

    /// `value (',' value)*` — at least one element.
    fn value_list(&mut self) -> Parse<Vec<Value>> {
        let mut items = vec![self.value_rule()?];
        loop {
            let before = self.pos;
            if self.comma().is_err() {
                self.pos = before;
                break;
            }
            match self.value_rule() {
                Ok(v) => items.push(v),
                Err(ParseFail::Fatal(e)) => return self.fatal(e),
                Err(ParseFail::Soft) => {
                    self.pos = before;
                    break;
                }
            }
        }
        Ok(items)
    }

    /// An empty `[...]` inside a selection generator is an error, not a
    /// softer alternative: `random([])` must fail the parse instead of
    /// degrading into a naked string.
    fn reject_empty_bracket(&mut self, what: &str) -> Parse<()> {
        if self.peek() == Some(']') {
            return self.fatal(Error::Arity(format!(
                "{what} requires at least one value"
            )));
        }
        Ok(())
    }

    fn discrete_value(&mut self) -> Parse<Value> {
        if !self.lit("random") {
            return self.soft("discreteValue", self.pos);
        }
        self.open_paren()?;
        self.open_bracket()?;
        self.reject_empty_bracket("random([...])")?;
        let children = match self.value_list() {
            Ok(items) => items,
            Err(ParseFail::Fatal(e)) => return self.fatal(e),
            // An empty list is not a softer alternative; random([...])
            // requires at least one value.
            Err(ParseFail::Soft) => {
                return self.fatal(Error::Arity(
                    "random([...]) requires at least one value".to_string(),
                ))
            }
        };
        self.close_bracket()?;
        let dist = self.optional_distribution()?;
        self.close_paren()?;
        match Value::discrete(children, dist) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    /// Optional `, bool (, distribution)?` tail of a range generator.
    fn range_tail(&mut self) -> Parse<(bool, Box<dyn Distribution>)> {
        let before = self.pos;
        if self.comma().is_ok() {
            match self.bool_literal() {
                Ok(use_edges) => {
                    let dist = self.optional_distribution()?;
                    return Ok((use_edges, dist));
                }
                Err(ParseFail::Fatal(e)) => return self.fatal(e),
                Err(ParseFail::Soft) => self.pos = before,
            }
        } else {
            self.pos = before;
        }
        Ok((
            false,
            Box::new(UniformDistribution::new(self.seeds.next_seed())),
        ))
    }

    fn range_value_long(&mut self) -> Parse<Value> {
        if !self.lit("random") {
            return self.soft("rangeValueLong", self.pos);
        }
        self.open_paren()?;
        let range = self.long_range()?;
        let (use_edges, dist) = self.range_tail()?;
        self.close_paren()?;
        Ok(Value::long_range(range, use_edges, dist))
    }

    fn range_value_double(&mut self) -> Parse<Value> {
        if !self.lit("random") {
            return self.soft("rangeValueDouble", self.pos);
        }
        self.open_paren()?;
        let range = self.double_range()?;
        let (use_edges, dist) = self.range_tail()?;
        self.close_paren()?;
        Ok(Value::double_range(range, use_edges, dist))
    }

    fn uuid_value(&mut self) -> Parse<Value> {
        if !self.lit("uuid") {
            return self.soft("uuidValue", self.pos);
        }
        self.open_paren()?;
        self.close_paren()?;
        Ok(Value::uuid(self.seeds.next_seed()))
    }

    fn circular_value(&mut self) -> Parse<Value> {
        if !self.lit("circular") {
            return self.soft("circularValue", self.pos);
        }
        self.open_paren()?;
        self.open_bracket()?;
        self.reject_empty_bracket("circular([...])")?;
        let children = match self.value_list() {
            Ok(items) => items,
            Err(ParseFail::Fatal(e)) => return self.fatal(e),
            Err(ParseFail::Soft) => {
                return self.fatal(Error::Arity(
                    "circular([...]) requires at least one value".to_string(),
                ))
            }
        };
        self.close_bracket()?;
        self.close_paren()?;
        match Value::circular(children) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    fn circular_range_value_long(&mut self) -> Parse<Value> {
        if !self.lit("circular") {
            return self.soft("circularRangeValueLong", self.pos);
        }
        self.open_paren()?;
        let range = self.long_range()?;
        self.comma()?;
        let step = self.long_literal()?;
        self.close_paren()?;
        match Value::circular_long_range(range, step) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    fn circular_range_value_double(&mut self) -> Parse<Value> {
        if !self.lit("circular") {
            return self.soft("circularRangeValueDouble", self.pos);
        }
        self.open_paren()?;
        let range = self.double_range()?;
        self.comma()?;
        let step = self.double_literal()?;
        self.close_paren()?;
        match Value::circular_double_range(range, step) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    fn list_value(&mut self) -> Parse<Value> {
        if !self.lit("list") {
            return self.soft("listValue", self.pos);
        }
        self.open_paren()?;
        self.open_bracket()?;
        let children = match self.value_list() {
            Ok(items) => items,
            Err(ParseFail::Fatal(e)) => return self.fatal(e),
            Err(ParseFail::Soft) => Vec::new(),
        };
        self.close_bracket()?;
        self.close_paren()?;
        Ok(Value::list(children))
    }

    fn weighted_pair(&mut self) -> Parse<(Value, f64)> {
        self.open_paren()?;
        let value = self.value_rule()?;
        self.comma()?;
        let weight = self.number_literal()?;
        self.close_paren()?;
        Ok((value, weight))
    }

    fn weighted_value(&mut self) -> Parse<Value> {
        if !self.lit("weighted") {
            return self.soft("weightedValue", self.pos);
        }
        self.open_paren()?;
        self.open_bracket()?;
        self.reject_empty_bracket("weighted([...])")?;
        let mut pairs = vec![match self.weighted_pair() {
            Ok(pair) => pair,
            Err(ParseFail::Fatal(e)) => return self.fatal(e),
            Err(ParseFail::Soft) => {
                return self.fatal(Error::Arity(
                    "weighted([...]) requires at least one pair".to_string(),
                ))
            }
        }];
        loop {
            let before = self.pos;
            if self.comma().is_err() {
                self.pos = before;
                break;
            }
            match self.weighted_pair() {
                Ok(pair) => pairs.push(pair),
                Err(ParseFail::Fatal(e)) => return self.fatal(e),
                Err(ParseFail::Soft) => {
                    self.pos = before;
                    break;
                }
            }
        }
        self.close_bracket()?;
        self.close_paren()?;
        let dist = UniformDistribution::new(self.seeds.next_seed());
        match Value::weighted(pairs, dist) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    fn count_pair(&mut self) -> Parse<(Value, u64)> {
        self.open_paren()?;
        let value = self.value_rule()?;
        self.comma()?;
        let count = self.long_literal()?;
        self.close_paren()?;
        if count < 1 {
            return self.fatal(Error::InvalidRange(
                "exactly([...]) counts must be at least 1".to_string(),
            ));
        }
        Ok((value, count as u64))
    }

    fn exact_weighted_value(&mut self) -> Parse<Value> {
        if !self.lit("exactly") {
            return self.soft("exactWeightedValue", self.pos);
        }
        self.open_paren()?;
        self.open_bracket()?;
        self.reject_empty_bracket("exactly([...])")?;
        let mut pairs = vec![match self.count_pair() {
            Ok(pair) => pair,
            Err(ParseFail::Fatal(e)) => return self.fatal(e),
            Err(ParseFail::Soft) => {
                return self.fatal(Error::Arity(
                    "exactly([...]) requires at least one pair".to_string(),
                ))
            }
        }];
        loop {
            let before = self.pos;
            if self.comma().is_err() {
                self.pos = before;
                break;
            }
            match self.count_pair() {
                Ok(pair) => pairs.push(pair),
                Err(ParseFail::Fatal(e)) => return self.fatal(e),
                Err(ParseFail::Soft) => {
                    self.pos = before;
                    break;
                }
            }
        }
        self.close_bracket()?;
        self.close_paren()?;
        let dist = UniformDistribution::new(self.seeds.next_seed());
        match Value::exact_weighted(pairs, dist) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    fn random_length_string_value(&mut self) -> Parse<Value> {
        if !self.lit("randomLengthString") {
            return self.soft("randomLengthStringValue", self.pos);
        }
        self.open_paren()?;
        let length = self.long_literal()?;
        let mut ranges = None;
        let before = self.pos;
        if self.comma().is_ok() {
            match self.open_bracket() {
                Ok(()) => {
                    let mut list = vec![self.char_range()?];
                    loop {
                        let at = self.pos;
                        if self.comma().is_err() {
                            self.pos = at;
                            break;
                        }
                        match self.char_range() {
                            Ok(range) => list.push(range),
                            Err(ParseFail::Fatal(e)) => return self.fatal(e),
                            Err(ParseFail::Soft) => {
                                self.pos = at;
                                break;
                            }
                        }
                    }
                    self.close_bracket()?;
                    ranges = Some(list);
                }
                Err(ParseFail::Fatal(e)) => return self.fatal(e),
                Err(ParseFail::Soft) => self.pos = before,
            }
        } else {
            self.pos = before;
        }
        self.close_paren()?;
        if length < 1 {
            return self.fatal(Error::InvalidRange(
                "randomLengthString length must be positive".to_string(),
            ));
        }
        let dist = UniformDistribution::new(self.seeds.next_seed());
        match Value::random_string(length as usize, ranges, dist) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    fn now_value(&mut self, name: &'static str, build: fn() -> Value) -> Parse<Value> {
        if !self.lit(name) {
            return self.soft("now", self.pos);
        }
        self.open_paren()?;
        self.close_paren()?;
        Ok(build())
    }

    fn generator(&mut self) -> Parse<Value> {
        let alternatives: &[fn(&mut Self) -> Parse<Value>] = &[
            Self::discrete_value,
            Self::range_value_long,
            Self::range_value_double,
            Self::uuid_value,
            Self::circular_value,
            Self::circular_range_value_long,
            Self::circular_range_value_double,
            Self::list_value,
            Self::weighted_value,
            Self::exact_weighted_value,
            Self::random_length_string_value,
            |p| p.now_value("now", Value::now),
            |p| p.now_value("nowDate", Value::now_date),
            |p| p.now_value("nowLocalDate", Value::now_local_date),
            |p| p.now_value("nowLocalDateTime", Value::now_local_date_time),
        ];
        self.first_of("generator", alternatives)
    }

    // ------------------------------------------------------------------
    // Transformers

    fn string_transformer(&mut self) -> Parse<Value> {
        if !self.lit("string") {
            return self.soft("stringTransformer", self.pos);
        }
        self.open_paren()?;
        let format = self.string_literal()?;
        let mut args = Vec::new();
        loop {
            let before = self.pos;
            if self.comma().is_err() {
                self.pos = before;
                break;
            }
            match self.value_rule() {
                Ok(v) => args.push(v),
                Err(ParseFail::Fatal(e)) => return self.fatal(e),
                Err(ParseFail::Soft) => {
                    self.pos = before;
                    break;
                }
            }
        }
        self.close_paren()?;
        match Value::string_transform(&format, args) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    fn json_transformer(&mut self) -> Parse<Value> {
        if !self.lit("json") {
            return self.soft("jsonTransformer", self.pos);
        }
        self.open_paren()?;
        let inner = self.reference()?;
        self.close_paren()?;
        Ok(Value::json_transform(inner))
    }

    fn time_format_transformer(&mut self) -> Parse<Value> {
        if !self.lit("time") {
            return self.soft("timeFormatTransformer", self.pos);
        }
        self.open_paren()?;
        let pattern = self.string_literal()?;
        self.comma()?;
        let inner = self.value_rule()?;
        self.close_paren()?;
        match Value::time_format(&pattern, inner) {
            Ok(v) => Ok(v),
            Err(err) => self.fatal(err),
        }
    }

    fn transformer(&mut self) -> Parse<Value> {
        let alternatives: &[fn(&mut Self) -> Parse<Value>] = &[
            Self::string_transformer,
            Self::json_transformer,
            Self::time_format_transformer,
        ];
        self.first_of("transformer", alternatives)
    }

    // ------------------------------------------------------------------
    // Literal values

    fn null_value(&mut self) -> Parse<Value> {
        if !self.lit("null") {
            return self.soft("nullValue", self.pos);
        }
        self.open_paren()?;
        self.close_paren()?;
        Ok(Value::null())
    }

    fn literal_value(&mut self) -> Parse<Value> {
        let alternatives: &[fn(&mut Self) -> Parse<Value>] = &[
            Self::null_value,
            |p| p.double_literal().map(|v| Value::primitive(Datum::Double(v))),
            |p| p.long_literal().map(|v| Value::primitive(Datum::Long(v))),
            |p| p.bool_literal().map(|v| Value::primitive(Datum::Bool(v))),
            |p| {
                p.string_literal()
                    .map(|s| Value::primitive(Datum::Text(s)))
            },
            |p| {
                p.naked_string()
                    .map(|s| Value::primitive(Datum::Text(s)))
            },
        ];
        self.first_of("literalValue", alternatives)
    }

    // ------------------------------------------------------------------
    // Top-level value

    fn value_rule(&mut self) -> Parse<Value> {
        let alternatives: &[fn(&mut Self) -> Parse<Value>] = &[
            Self::reference,
            Self::generator,
            Self::transformer,
            Self::literal_value,
        ];
        self.first_of("value", alternatives)
    }

    /// Ordered choice: first alternative to match wins; soft failures
    /// backtrack, fatal errors abort.
    fn first_of<T>(
        &mut self,
        rule: &'static str,
        alternatives: &[fn(&mut Self) -> Parse<T>],
    ) -> Parse<T> {
        let start = self.pos;
        for alternative in alternatives {
            match alternative(self) {
                Ok(value) => return Ok(value),
                Err(ParseFail::Fatal(err)) => return self.fatal(err),
                Err(ParseFail::Soft) => self.pos = start,
            }
        }
        self.soft(rule, start)
    }
}
