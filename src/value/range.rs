//! Range-sampled and range-walking nodes.

use std::ops::Add;

use chrono::{Datelike, NaiveDate};

use crate::datum::Datum;
use crate::distribution::Distribution;
use crate::error::Error;
use crate::range::Range;

/// A scalar type a range node can sample.
pub(crate) trait Sampled: Copy + PartialOrd + std::fmt::Debug {
    fn sample(range: &Range<Self>, dist: &mut dyn Distribution) -> Result<Self, Error>;

    /// Last representable value below `end`; the second edge-case output.
    fn upper_edge(range: &Range<Self>) -> Result<Self, Error>;

    fn into_datum(self) -> Datum;
}

impl Sampled for i64 {
    fn sample(range: &Range<Self>, dist: &mut dyn Distribution) -> Result<Self, Error> {
        Ok(dist.next_long(range.start(), range.end()))
    }

    fn upper_edge(range: &Range<Self>) -> Result<Self, Error> {
        Ok(range.end() - 1)
    }

    fn into_datum(self) -> Datum {
        Datum::Long(self)
    }
}

impl Sampled for f64 {
    fn sample(range: &Range<Self>, dist: &mut dyn Distribution) -> Result<Self, Error> {
        Ok(dist.next_double(range.start(), range.end()))
    }

    fn upper_edge(range: &Range<Self>) -> Result<Self, Error> {
        Ok(range.end().next_down())
    }

    fn into_datum(self) -> Datum {
        Datum::Double(self)
    }
}

impl Sampled for NaiveDate {
    fn sample(range: &Range<Self>, dist: &mut dyn Distribution) -> Result<Self, Error> {
        let day = dist.next_long(
            i64::from(range.start().num_days_from_ce()),
            i64::from(range.end().num_days_from_ce()),
        );
        NaiveDate::from_num_days_from_ce_opt(day as i32).ok_or_else(|| {
            Error::InvalidRange(format!("day number {day} is out of the calendar range"))
        })
    }

    fn upper_edge(range: &Range<Self>) -> Result<Self, Error> {
        range.end().pred_opt().ok_or_else(|| {
            Error::InvalidRange("range end has no predecessor".to_string())
        })
    }

    fn into_datum(self) -> Datum {
        Datum::Date(self)
    }
}

/// Samples from `[start, end)`; with `use_edges` the first two outputs are
/// the deterministic boundary values.
pub(crate) struct RangeNode<T> {
    range: Range<T>,
    use_edges: bool,
    start_edge_used: bool,
    end_edge_used: bool,
    dist: Box<dyn Distribution>,
}

impl<T: Sampled> RangeNode<T> {
    pub(crate) fn new(range: Range<T>, use_edges: bool, dist: Box<dyn Distribution>) -> Self {
        Self {
            range,
            use_edges,
            start_edge_used: false,
            end_edge_used: false,
            dist,
        }
    }

    pub(crate) fn eval(&mut self) -> Result<Datum, Error> {
        if self.use_edges && !self.start_edge_used {
            self.start_edge_used = true;
            return Ok(self.range.start().into_datum());
        }
        if self.use_edges && !self.end_edge_used {
            self.end_edge_used = true;
            return Ok(T::upper_edge(&self.range)?.into_datum());
        }
        T::sample(&self.range, self.dist.as_mut()).map(Sampled::into_datum)
    }

    pub(crate) fn rewind(&mut self) {
        self.start_edge_used = false;
        self.end_edge_used = false;
        self.dist.reset();
    }
}

/// Walks `[start, end)` deterministically by `step`, wrapping to `start`
/// once the next position would reach or pass `end`.
pub(crate) struct CircularRangeNode<T> {
    range: Range<T>,
    step: T,
    cursor: T,
}

impl<T: Sampled + PartialOrd + Add<Output = T>> CircularRangeNode<T> {
    pub(crate) fn new(range: Range<T>, step: T) -> Self {
        Self {
            range,
            step,
            cursor: range.start(),
        }
    }

    pub(crate) fn eval(&mut self) -> Datum {
        let out = self.cursor;
        let advanced = self.cursor + self.step;
        self.cursor = if advanced >= self.range.end() {
            self.range.start()
        } else {
            advanced
        };
        out.into_datum()
    }

    pub(crate) fn rewind(&mut self) {
        self.cursor = self.range.start();
    }
}
