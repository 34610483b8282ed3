//! Expression-driven synthetic data generation engine.
//!
//! This crate compiles a named set of small value expressions into a graph
//! of evaluable nodes and then produces an unbounded stream of composite
//! records from it. Expressions describe generators (ranges, discrete and
//! weighted picks, UUIDs, timestamps), transformers (string formatting,
//! JSON, time formatting) and `$references` between definitions, including
//! forward references resolved through proxy indirection.
//!
//! # Architecture
//!
//! ```text
//! name -> expression text
//!        │
//!        ▼
//! ┌──────────────────┐   $refs   ┌───────────────┐
//! │ GeneratorBuilder │──────────▶│  ProxyTable   │
//! │  (parse + bind)  │           │ name -> proxy │
//! └────────┬─────────┘           └───────┬───────┘
//!          │                             │ delegates
//!          ▼                             ▼
//!    DataGenerator ─── next(name) ──▶ Value graph ──▶ Datum
//! ```
//!
//! # Example
//!
//! ```rust
//! use datagen::GeneratorBuilder;
//!
//! let generator = GeneratorBuilder::new()
//!     .define("age", "random(18..80)")
//!     .define("name", "random(['Ada', 'Grace', 'Edsger'])")
//!     .define("row", "string('{} ({})', $name, $age)")
//!     .with_seed(42)
//!     .build()
//!     .unwrap();
//!
//! let row = generator.next("row").unwrap();
//! assert!(row.to_string().contains('('));
//! ```
//!
//! Evaluation is single-threaded and synchronous: a node's `next()` advances
//! its children according to its own semantics, `current()` re-reads the
//! last output, and `reset()` rewinds a subtree to its post-construction
//! state. Nodes referenced from several parents are shared, so one logical
//! record observes one consistent output per node.

mod datum;
mod distribution;
mod error;
mod generator;
mod parser;
mod range;
mod resolver;
mod value;

pub use datum::Datum;
pub use distribution::{Distribution, NormalDistribution, UniformDistribution};
pub use error::{Error, ParseError};
pub use generator::{DataGenerator, GeneratorBuilder};
pub use range::Range;
pub use value::Value;
