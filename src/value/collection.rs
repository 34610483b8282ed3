//! Composite nodes: lists and named maps.

use std::collections::BTreeMap;

use crate::datum::Datum;
use crate::error::Error;
use crate::value::{EvalCtx, Value};

/// Advances every child left-to-right per `next`; output is a list snapshot.
pub(crate) struct ListNode {
    children: Vec<Value>,
}

impl ListNode {
    pub(crate) fn new(children: Vec<Value>) -> Self {
        Self { children }
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let items: Result<Vec<Datum>, Error> = self
            .children
            .iter()
            .map(|child| child.next_in(ctx))
            .collect();
        Ok(Datum::List(items?))
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        for child in &self.children {
            child.reset_in(ctx);
        }
    }
}

/// Advances every named child in definition order per `next`; output is a
/// map snapshot. Materialized by the graph builder for dotted-prefix parents
/// that have no expression of their own.
pub(crate) struct CompositeNode {
    children: Vec<(String, Value)>,
}

impl CompositeNode {
    pub(crate) fn new(children: Vec<(String, Value)>) -> Self {
        Self { children }
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let mut fields = BTreeMap::new();
        for (name, child) in &self.children {
            fields.insert(name.clone(), child.next_in(ctx)?);
        }
        Ok(Datum::Map(fields))
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        for (_, child) in &self.children {
            child.reset_in(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_snapshots_children() {
        let mut node = ListNode::new(vec![
            Value::primitive(Datum::Long(1)),
            Value::primitive(Datum::Text("x".to_string())),
        ]);
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        assert_eq!(
            out,
            Datum::List(vec![Datum::Long(1), Datum::Text("x".to_string())])
        );
    }

    #[test]
    fn test_empty_list_yields_empty_snapshot() {
        let mut node = ListNode::new(Vec::new());
        assert_eq!(node.eval(&mut EvalCtx::new()).unwrap(), Datum::List(vec![]));
    }

    #[test]
    fn test_composite_snapshots_named_children() {
        let mut node = CompositeNode::new(vec![
            ("first".to_string(), Value::primitive(Datum::Text("Ada".to_string()))),
            ("age".to_string(), Value::primitive(Datum::Long(36))),
        ]);
        let out = node.eval(&mut EvalCtx::new()).unwrap();
        match out {
            Datum::Map(fields) => {
                assert_eq!(fields["first"], Datum::Text("Ada".to_string()));
                assert_eq!(fields["age"], Datum::Long(36));
            }
            other => panic!("expected map, got {other:?}"),
        }
    }
}
