//! Nodes that pick one child per step: discrete, circular, weighted and
//! exact-weighted selection.

use crate::datum::Datum;
use crate::distribution::{Distribution, UniformDistribution};
use crate::error::Error;
use crate::value::{EvalCtx, Value};

/// Picks one child per `next` through the distribution. Only the chosen
/// child is advanced.
pub(crate) struct DiscreteNode {
    children: Vec<Value>,
    dist: Box<dyn Distribution>,
}

impl DiscreteNode {
    pub(crate) fn new(children: Vec<Value>, dist: Box<dyn Distribution>) -> Result<Self, Error> {
        if children.is_empty() {
            return Err(Error::Arity(
                "random([...]) requires at least one value".to_string(),
            ));
        }
        Ok(Self { children, dist })
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let index = self.dist.next_int(self.children.len());
        self.children[index].next_in(ctx)
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        self.dist.reset();
        for child in &self.children {
            child.reset_in(ctx);
        }
    }
}

/// Cycles through its children in insertion order, wrapping.
pub(crate) struct CircularNode {
    children: Vec<Value>,
    index: usize,
}

impl CircularNode {
    pub(crate) fn new(children: Vec<Value>) -> Result<Self, Error> {
        if children.is_empty() {
            return Err(Error::Arity(
                "circular([...]) requires at least one value".to_string(),
            ));
        }
        Ok(Self { children, index: 0 })
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let index = self.index;
        self.index = (self.index + 1) % self.children.len();
        self.children[index].next_in(ctx)
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        self.index = 0;
        for child in &self.children {
            child.reset_in(ctx);
        }
    }
}

/// Picks children with probability proportional to their weight.
///
/// Weights may be zero (such children are never selected) but the total
/// must be positive. Selection draws `u` in `[0, total)` and binary-searches
/// the prefix sums.
pub(crate) struct WeightedNode {
    children: Vec<Value>,
    prefix_sums: Vec<f64>,
    total: f64,
    dist: UniformDistribution,
}

impl WeightedNode {
    pub(crate) fn new(pairs: Vec<(Value, f64)>, dist: UniformDistribution) -> Result<Self, Error> {
        if pairs.is_empty() {
            return Err(Error::Arity(
                "weighted([...]) requires at least one pair".to_string(),
            ));
        }
        let mut children = Vec::with_capacity(pairs.len());
        let mut prefix_sums = Vec::with_capacity(pairs.len());
        let mut total = 0.0;
        for (child, weight) in pairs {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidRange(format!(
                    "weight must be a non-negative number, got {weight}"
                )));
            }
            total += weight;
            children.push(child);
            prefix_sums.push(total);
        }
        if total <= 0.0 {
            return Err(Error::InvalidRange(
                "weighted([...]) requires a positive total weight".to_string(),
            ));
        }
        Ok(Self {
            children,
            prefix_sums,
            total,
            dist,
        })
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let draw = self.dist.next_double(0.0, self.total);
        let index = self.prefix_sums.partition_point(|&sum| sum <= draw);
        let index = index.min(self.children.len() - 1);
        self.children[index].next_in(ctx)
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        self.dist.reset();
        for child in &self.children {
            child.reset_in(ctx);
        }
    }
}

/// Deterministic multiset: over one cycle of length `sum(counts)` each child
/// is emitted exactly `count` times, interleaved at random. Each step picks
/// among children with remaining budget, weighted by that budget.
pub(crate) struct ExactWeightedNode {
    children: Vec<Value>,
    counts: Vec<u64>,
    remaining: Vec<u64>,
    dist: UniformDistribution,
}

impl ExactWeightedNode {
    pub(crate) fn new(pairs: Vec<(Value, u64)>, dist: UniformDistribution) -> Result<Self, Error> {
        if pairs.is_empty() {
            return Err(Error::Arity(
                "exactly([...]) requires at least one pair".to_string(),
            ));
        }
        let mut children = Vec::with_capacity(pairs.len());
        let mut counts = Vec::with_capacity(pairs.len());
        for (child, count) in pairs {
            if count == 0 {
                return Err(Error::InvalidRange(
                    "exactly([...]) counts must be at least 1".to_string(),
                ));
            }
            children.push(child);
            counts.push(count);
        }
        let remaining = counts.clone();
        Ok(Self {
            children,
            counts,
            remaining,
            dist,
        })
    }

    pub(crate) fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        if self.remaining.iter().all(|&left| left == 0) {
            self.remaining.copy_from_slice(&self.counts);
        }
        let total: u64 = self.remaining.iter().sum();
        let mut draw = self.dist.next_long(0, total as i64) as u64;
        let mut index = 0;
        for (i, &left) in self.remaining.iter().enumerate() {
            if draw < left {
                index = i;
                break;
            }
            draw -= left;
        }
        self.remaining[index] -= 1;
        self.children[index].next_in(ctx)
    }

    pub(crate) fn rewind(&mut self, ctx: &mut EvalCtx) {
        self.remaining.copy_from_slice(&self.counts);
        self.dist.reset();
        for child in &self.children {
            child.reset_in(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn longs(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&v| Value::primitive(Datum::Long(v))).collect()
    }

    fn uniform() -> UniformDistribution {
        UniformDistribution::new(42)
    }

    #[test]
    fn test_discrete_outputs_come_from_children() {
        let mut node = DiscreteNode::new(longs(&[1, 2, 3]), Box::new(uniform())).unwrap();
        let mut ctx = EvalCtx::new();
        for _ in 0..100 {
            let v = node.eval(&mut ctx).unwrap().as_long().unwrap();
            assert!([1, 2, 3].contains(&v));
        }
    }

    #[test]
    fn test_discrete_rejects_empty() {
        assert!(matches!(
            DiscreteNode::new(Vec::new(), Box::new(uniform())),
            Err(Error::Arity(_))
        ));
    }

    #[test]
    fn test_circular_cycles_in_order() {
        let mut node = CircularNode::new(longs(&[1, 2, 3])).unwrap();
        let mut ctx = EvalCtx::new();
        let outputs: Vec<i64> = (0..7)
            .map(|_| node.eval(&mut ctx).unwrap().as_long().unwrap())
            .collect();
        assert_eq!(outputs, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_circular_fairness_over_whole_cycles() {
        let mut node = CircularNode::new(longs(&[5, 6])).unwrap();
        let mut ctx = EvalCtx::new();
        let outputs: Vec<i64> = (0..10)
            .map(|_| node.eval(&mut ctx).unwrap().as_long().unwrap())
            .collect();
        assert_eq!(outputs.iter().filter(|&&v| v == 5).count(), 5);
        assert_eq!(outputs.iter().filter(|&&v| v == 6).count(), 5);
    }

    #[test]
    fn test_weighted_never_selects_zero_weight() {
        let pairs = vec![
            (Value::primitive(Datum::Long(1)), 0.0),
            (Value::primitive(Datum::Long(2)), 1.0),
        ];
        let mut node = WeightedNode::new(pairs, uniform()).unwrap();
        let mut ctx = EvalCtx::new();
        for _ in 0..200 {
            assert_eq!(node.eval(&mut ctx).unwrap(), Datum::Long(2));
        }
    }

    #[test]
    fn test_weighted_frequency_tracks_weights() {
        let pairs = vec![
            (Value::primitive(Datum::Long(1)), 1.0),
            (Value::primitive(Datum::Long(2)), 3.0),
        ];
        let mut node = WeightedNode::new(pairs, uniform()).unwrap();
        let mut ctx = EvalCtx::new();
        let draws = 10_000;
        let twos = (0..draws)
            .filter(|_| node.eval(&mut ctx).unwrap().as_long().unwrap() == 2)
            .count();
        // Expected 7500; 3 sigma of Binomial(10000, 0.75) is ~130.
        let expected = (draws as f64) * 0.75;
        let sigma = ((draws as f64) * 0.75 * 0.25).sqrt();
        assert!((twos as f64 - expected).abs() < 3.0 * sigma + 1.0);
    }

    #[test]
    fn test_weighted_rejects_negative_and_all_zero() {
        let negative = vec![(Value::primitive(Datum::Long(1)), -1.0)];
        assert!(matches!(
            WeightedNode::new(negative, uniform()),
            Err(Error::InvalidRange(_))
        ));
        let all_zero = vec![(Value::primitive(Datum::Long(1)), 0.0)];
        assert!(matches!(
            WeightedNode::new(all_zero, uniform()),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_exact_weighted_emits_exact_counts_per_cycle() {
        let pairs = vec![
            (Value::primitive(Datum::Long(1)), 2),
            (Value::primitive(Datum::Long(2)), 3),
        ];
        let mut node = ExactWeightedNode::new(pairs, uniform()).unwrap();
        let mut ctx = EvalCtx::new();
        for _ in 0..4 {
            let cycle: Vec<i64> = (0..5)
                .map(|_| node.eval(&mut ctx).unwrap().as_long().unwrap())
                .collect();
            assert_eq!(cycle.iter().filter(|&&v| v == 1).count(), 2);
            assert_eq!(cycle.iter().filter(|&&v| v == 2).count(), 3);
        }
    }

    #[test]
    fn test_exact_weighted_rejects_zero_count() {
        let pairs = vec![(Value::primitive(Datum::Long(1)), 0)];
        assert!(matches!(
            ExactWeightedNode::new(pairs, uniform()),
            Err(Error::InvalidRange(_))
        ));
    }
}
