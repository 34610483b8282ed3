//! The evaluation graph: shared value nodes and their lazy-eval contract.
//!
//! Every node obeys the same protocol:
//!
//! - [`Value::current`] returns the last computed output without advancing
//!   any generator. The first `current` on a fresh node computes one output
//!   and caches it.
//! - [`Value::next`] advances: the node recomputes its output, advancing
//!   some or all of its children according to its own semantics, and caches
//!   the result.
//! - [`Value::reset`] rewinds the node and its subtree to the state at
//!   construction, including re-seeding node-local RNGs, so the sequence
//!   after a reset replays the sequence after construction.
//!
//! Nodes are shared: a node referenced from several parents is advanced once
//! and observed many times within one record, which is what makes
//! `string('{} is {}', $a, $a)` consistent. Sharing is plain `Rc`; proxies
//! add indirection without ownership cycles of their own, though user
//! definitions can still tie the graph into a loop. Evaluation therefore
//! guards against re-entering a node that is still being evaluated and
//! against runaway recursion depth, surfacing both as
//! [`Error::EvaluationCycle`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::datum::Datum;
use crate::distribution::{Distribution, UniformDistribution};
use crate::error::Error;
use crate::range::Range;

pub(crate) mod choice;
pub(crate) mod collection;
pub(crate) mod proxy;
pub(crate) mod range;
pub(crate) mod string;
pub(crate) mod time;
pub(crate) mod transform;
pub(crate) mod uuid;

use self::choice::{CircularNode, DiscreteNode, ExactWeightedNode, WeightedNode};
use self::collection::{CompositeNode, ListNode};
use self::proxy::ProxyNode;
use self::range::{CircularRangeNode, RangeNode};
use self::string::RandomStringNode;
use self::time::NowNode;
use self::transform::{JsonTransformNode, StringTransformNode, TimeFormatNode};
use self::uuid::UuidNode;

/// Recursion budget for one `next` or `current` call.
const MAX_EVAL_DEPTH: usize = 1024;

/// Shared handle to one node of the evaluation graph.
#[derive(Clone)]
pub struct Value {
    node: Rc<RefCell<Node>>,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value").finish_non_exhaustive()
    }
}

pub(crate) struct Node {
    kind: Kind,
    current: Option<Datum>,
}

/// A node is either a proxy, which delegates, or a concrete kind, which
/// evaluates. Keeping the two apart means the concrete dispatch never has
/// to consider a proxy arm.
pub(crate) enum Kind {
    Concrete(ConcreteKind),
    Proxy(ProxyNode),
}

pub(crate) enum ConcreteKind {
    Null,
    Primitive(Datum),
    RangeLong(RangeNode<i64>),
    RangeDouble(RangeNode<f64>),
    RangeDate(RangeNode<chrono::NaiveDate>),
    CircularRangeLong(CircularRangeNode<i64>),
    CircularRangeDouble(CircularRangeNode<f64>),
    Discrete(DiscreteNode),
    Circular(CircularNode),
    Weighted(WeightedNode),
    ExactWeighted(ExactWeightedNode),
    List(ListNode),
    Composite(CompositeNode),
    RandomString(RandomStringNode),
    Uuid(UuidNode),
    Now(NowNode),
    StringTransform(StringTransformNode),
    JsonTransform(JsonTransformNode),
    TimeFormat(TimeFormatNode),
}

/// Per-call evaluation state: recursion depth and the proxy trail used to
/// name the offending definition when a cycle is detected.
pub(crate) struct EvalCtx {
    depth: usize,
    proxies: Vec<String>,
}

impl EvalCtx {
    pub(crate) fn new() -> Self {
        Self {
            depth: 0,
            proxies: Vec::new(),
        }
    }

    fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > MAX_EVAL_DEPTH {
            return Err(self.cycle_error());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn cycle_error(&self) -> Error {
        let name = self
            .proxies
            .last()
            .cloned()
            .unwrap_or_else(|| "<root>".to_string());
        Error::EvaluationCycle(name)
    }
}

impl Value {
    pub(crate) fn from_kind(kind: Kind) -> Self {
        Self {
            node: Rc::new(RefCell::new(Node {
                kind,
                current: None,
            })),
        }
    }

    fn from_concrete(kind: ConcreteKind) -> Self {
        Self::from_kind(Kind::Concrete(kind))
    }

    pub(crate) fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// Advance this node and return the freshly computed output.
    pub fn next(&self) -> Result<Datum, Error> {
        self.next_in(&mut EvalCtx::new())
    }

    /// Return the last computed output without advancing. The first call on
    /// a fresh node computes one output.
    pub fn current(&self) -> Result<Datum, Error> {
        self.current_in(&mut EvalCtx::new())
    }

    /// Rewind this node and its subtree to the state at construction.
    pub fn reset(&self) {
        self.reset_in(&mut EvalCtx::new());
    }

    pub(crate) fn next_in(&self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        ctx.enter()?;
        let result = self.advance(ctx);
        ctx.leave();
        result
    }

    fn advance(&self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        // A node that is still borrowed here is currently being evaluated
        // further up the stack, i.e. the graph loops back into it.
        let mut node = self
            .node
            .try_borrow_mut()
            .map_err(|_| ctx.cycle_error())?;
        let datum = match &mut node.kind {
            Kind::Proxy(proxy) => {
                // Proxies delegate transparently and keep no cache of their
                // own; their delegate may also be advanced through other
                // handles.
                let name = proxy.name().to_string();
                let delegate = proxy.delegate().ok_or_else(|| {
                    Error::UnresolvedReference(vec![name.clone()])
                })?;
                drop(node);
                ctx.proxies.push(name);
                let result = delegate.next_in(ctx);
                ctx.proxies.pop();
                return result;
            }
            Kind::Concrete(kind) => kind.eval(ctx)?,
        };
        node.current = Some(datum.clone());
        Ok(datum)
    }

    pub(crate) fn current_in(&self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        ctx.enter()?;
        let result = self.read_current(ctx);
        ctx.leave();
        result
    }

    fn read_current(&self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        let cached = {
            let node = self
                .node
                .try_borrow()
                .map_err(|_| ctx.cycle_error())?;
            if let Kind::Proxy(proxy) = &node.kind {
                let name = proxy.name().to_string();
                let delegate = proxy.delegate().ok_or_else(|| {
                    Error::UnresolvedReference(vec![name.clone()])
                })?;
                drop(node);
                ctx.proxies.push(name);
                let result = delegate.current_in(ctx);
                ctx.proxies.pop();
                return result;
            }
            node.current.clone()
        };
        match cached {
            Some(datum) => Ok(datum),
            None => self.next_in(ctx),
        }
    }

    pub(crate) fn reset_in(&self, ctx: &mut EvalCtx) {
        if ctx.depth >= MAX_EVAL_DEPTH {
            return;
        }
        ctx.depth += 1;
        // A node already borrowed is already being reset up-stack; skip it
        // instead of recursing forever through a cyclic graph.
        if let Ok(mut node) = self.node.try_borrow_mut() {
            node.current = None;
            match &mut node.kind {
                Kind::Proxy(proxy) => {
                    if let Some(delegate) = proxy.delegate() {
                        drop(node);
                        delegate.reset_in(ctx);
                    }
                }
                Kind::Concrete(kind) => kind.rewind(ctx),
            }
        }
        ctx.depth -= 1;
    }
}

impl ConcreteKind {
    fn eval(&mut self, ctx: &mut EvalCtx) -> Result<Datum, Error> {
        match self {
            ConcreteKind::Null => Ok(Datum::Null),
            ConcreteKind::Primitive(datum) => Ok(datum.clone()),
            ConcreteKind::RangeLong(node) => node.eval(),
            ConcreteKind::RangeDouble(node) => node.eval(),
            ConcreteKind::RangeDate(node) => node.eval(),
            ConcreteKind::CircularRangeLong(node) => Ok(node.eval()),
            ConcreteKind::CircularRangeDouble(node) => Ok(node.eval()),
            ConcreteKind::Discrete(node) => node.eval(ctx),
            ConcreteKind::Circular(node) => node.eval(ctx),
            ConcreteKind::Weighted(node) => node.eval(ctx),
            ConcreteKind::ExactWeighted(node) => node.eval(ctx),
            ConcreteKind::List(node) => node.eval(ctx),
            ConcreteKind::Composite(node) => node.eval(ctx),
            ConcreteKind::RandomString(node) => Ok(node.eval()),
            ConcreteKind::Uuid(node) => Ok(node.eval()),
            ConcreteKind::Now(node) => Ok(node.eval()),
            ConcreteKind::StringTransform(node) => node.eval(ctx),
            ConcreteKind::JsonTransform(node) => node.eval(ctx),
            ConcreteKind::TimeFormat(node) => node.eval(ctx),
        }
    }

    fn rewind(&mut self, ctx: &mut EvalCtx) {
        match self {
            ConcreteKind::Null | ConcreteKind::Primitive(_) | ConcreteKind::Now(_) => {}
            ConcreteKind::RangeLong(node) => node.rewind(),
            ConcreteKind::RangeDouble(node) => node.rewind(),
            ConcreteKind::RangeDate(node) => node.rewind(),
            ConcreteKind::CircularRangeLong(node) => node.rewind(),
            ConcreteKind::CircularRangeDouble(node) => node.rewind(),
            ConcreteKind::Discrete(node) => node.rewind(ctx),
            ConcreteKind::Circular(node) => node.rewind(ctx),
            ConcreteKind::Weighted(node) => node.rewind(ctx),
            ConcreteKind::ExactWeighted(node) => node.rewind(ctx),
            ConcreteKind::List(node) => node.rewind(ctx),
            ConcreteKind::Composite(node) => node.rewind(ctx),
            ConcreteKind::RandomString(node) => node.rewind(),
            ConcreteKind::Uuid(node) => node.rewind(),
            ConcreteKind::StringTransform(node) => node.rewind(ctx),
            ConcreteKind::JsonTransform(node) => node.rewind(ctx),
            ConcreteKind::TimeFormat(node) => node.rewind(ctx),
        }
    }
}

// Constructors. The parser builds nodes through these; they are public so a
// graph can also be assembled directly, which is the only way to spell the
// kinds the expression grammar has no literal for (date ranges, composites).
impl Value {
    /// Node that always yields null.
    pub fn null() -> Self {
        Self::from_concrete(ConcreteKind::Null)
    }

    /// Constant node: `next` and `current` both yield the stored value.
    pub fn primitive(datum: Datum) -> Self {
        Self::from_concrete(ConcreteKind::Primitive(datum))
    }

    /// Integers sampled from `[start, end)`.
    pub fn long_range(
        range: Range<i64>,
        use_edges: bool,
        dist: Box<dyn Distribution>,
    ) -> Self {
        Self::from_concrete(ConcreteKind::RangeLong(RangeNode::new(range, use_edges, dist)))
    }

    /// Floats sampled from `[start, end)`.
    pub fn double_range(
        range: Range<f64>,
        use_edges: bool,
        dist: Box<dyn Distribution>,
    ) -> Self {
        Self::from_concrete(ConcreteKind::RangeDouble(RangeNode::new(range, use_edges, dist)))
    }

    /// Dates sampled from `[start, end)`.
    pub fn date_range(
        range: Range<chrono::NaiveDate>,
        use_edges: bool,
        dist: Box<dyn Distribution>,
    ) -> Self {
        Self::from_concrete(ConcreteKind::RangeDate(RangeNode::new(range, use_edges, dist)))
    }

    /// Deterministic walk over `[start, end)` by `step`, wrapping to `start`.
    pub fn circular_long_range(range: Range<i64>, step: i64) -> Result<Self, Error> {
        if step <= 0 {
            return Err(Error::InvalidRange(format!(
                "circular range step must be positive, got {step}"
            )));
        }
        Ok(Self::from_concrete(ConcreteKind::CircularRangeLong(
            CircularRangeNode::new(range, step),
        )))
    }

    /// Deterministic walk over `[start, end)` by `step`, wrapping to `start`.
    pub fn circular_double_range(range: Range<f64>, step: f64) -> Result<Self, Error> {
        if !(step > 0.0) {
            return Err(Error::InvalidRange(format!(
                "circular range step must be positive, got {step}"
            )));
        }
        Ok(Self::from_concrete(ConcreteKind::CircularRangeDouble(
            CircularRangeNode::new(range, step),
        )))
    }

    /// One child picked per `next` by the distribution.
    pub fn discrete(children: Vec<Value>, dist: Box<dyn Distribution>) -> Result<Self, Error> {
        Ok(Self::from_concrete(ConcreteKind::Discrete(DiscreteNode::new(
            children, dist,
        )?)))
    }

    /// Children cycled in insertion order.
    pub fn circular(children: Vec<Value>) -> Result<Self, Error> {
        Ok(Self::from_concrete(ConcreteKind::Circular(CircularNode::new(children)?)))
    }

    /// Children picked with probability proportional to their weight.
    pub fn weighted(pairs: Vec<(Value, f64)>, dist: UniformDistribution) -> Result<Self, Error> {
        Ok(Self::from_concrete(ConcreteKind::Weighted(WeightedNode::new(
            pairs, dist,
        )?)))
    }

    /// Deterministic multiset: each child appears exactly `count` times per
    /// cycle, interleaved at random.
    pub fn exact_weighted(
        pairs: Vec<(Value, u64)>,
        dist: UniformDistribution,
    ) -> Result<Self, Error> {
        Ok(Self::from_concrete(ConcreteKind::ExactWeighted(ExactWeightedNode::new(
            pairs, dist,
        )?)))
    }

    /// Composite whose output is a list of its children's outputs.
    pub fn list(children: Vec<Value>) -> Self {
        Self::from_concrete(ConcreteKind::List(ListNode::new(children)))
    }

    /// Composite whose output is a map of its children's outputs.
    pub fn composite(children: Vec<(String, Value)>) -> Self {
        Self::from_concrete(ConcreteKind::Composite(CompositeNode::new(children)))
    }

    /// Fixed-length string of characters drawn from the given ranges
    /// (default: ASCII letters and digits).
    pub fn random_string(
        length: usize,
        ranges: Option<Vec<Range<char>>>,
        dist: UniformDistribution,
    ) -> Result<Self, Error> {
        Ok(Self::from_concrete(ConcreteKind::RandomString(RandomStringNode::new(
            length, ranges, dist,
        )?)))
    }

    /// Fresh UUID v4 per `next`, drawn from the node's seeded RNG.
    pub fn uuid(seed: u64) -> Self {
        Self::from_concrete(ConcreteKind::Uuid(UuidNode::new(seed)))
    }

    /// Current wall time in epoch milliseconds.
    pub fn now() -> Self {
        Self::from_concrete(ConcreteKind::Now(NowNode::Timestamp))
    }

    /// Current wall time as a UTC date/time.
    pub fn now_date() -> Self {
        Self::from_concrete(ConcreteKind::Now(NowNode::DateTime))
    }

    /// Current wall time as a local calendar date.
    pub fn now_local_date() -> Self {
        Self::from_concrete(ConcreteKind::Now(NowNode::Date))
    }

    /// Current wall time as a local date/time.
    pub fn now_local_date_time() -> Self {
        Self::from_concrete(ConcreteKind::Now(NowNode::LocalDateTime))
    }

    /// Positional format over the arguments' current outputs.
    pub fn string_transform(format: &str, args: Vec<Value>) -> Result<Self, Error> {
        Ok(Self::from_concrete(ConcreteKind::StringTransform(
            StringTransformNode::new(format, args)?,
        )))
    }

    /// JSON serialization of the inner node's current output.
    pub fn json_transform(inner: Value) -> Self {
        Self::from_concrete(ConcreteKind::JsonTransform(JsonTransformNode::new(inner)))
    }

    /// Strftime formatting of the inner node's current temporal output.
    pub fn time_format(pattern: &str, inner: Value) -> Result<Self, Error> {
        Ok(Self::from_concrete(ConcreteKind::TimeFormat(TimeFormatNode::new(
            pattern, inner,
        )?)))
    }

    pub(crate) fn new_proxy(name: impl Into<String>) -> Self {
        Self::from_kind(Kind::Proxy(ProxyNode::new(name.into())))
    }
}
