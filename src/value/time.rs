//! Wall-clock nodes.

use chrono::{Local, Utc};

use crate::datum::Datum;

/// Yields the wall time at each `next`, in one of the supported temporal
/// shapes.
pub(crate) enum NowNode {
    /// Epoch milliseconds.
    Timestamp,
    /// UTC date/time.
    DateTime,
    /// Local calendar date.
    Date,
    /// Local date/time without timezone.
    LocalDateTime,
}

impl NowNode {
    pub(crate) fn eval(&self) -> Datum {
        match self {
            NowNode::Timestamp => Datum::Long(Utc::now().timestamp_millis()),
            NowNode::DateTime => Datum::DateTime(Utc::now()),
            NowNode::Date => Datum::Date(Local::now().date_naive()),
            NowNode::LocalDateTime => Datum::LocalDateTime(Local::now().naive_local()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_recent() {
        let before = Utc::now().timestamp_millis();
        let out = NowNode::Timestamp.eval();
        let after = Utc::now().timestamp_millis();
        let ms = out.as_long().unwrap();
        assert!(ms >= before && ms <= after);
    }

    #[test]
    fn test_shapes_match_variants() {
        assert!(matches!(NowNode::DateTime.eval(), Datum::DateTime(_)));
        assert!(matches!(NowNode::Date.eval(), Datum::Date(_)));
        assert!(matches!(
            NowNode::LocalDateTime.eval(),
            Datum::LocalDateTime(_)
        ));
    }
}
