//! Graph builder and top-level driver.
//!
//! Compiles an ordered `name -> expression` map into a value graph in two
//! phases: every definition name (and every dotted prefix) gets a proxy up
//! front so references resolve regardless of definition order, then each
//! expression is parsed with its parent scope and bound to its proxy.
//! Dotted prefixes without expressions of their own become composite nodes
//! over their children, and a final sweep reports every proxy still missing
//! a delegate in one error.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::datum::Datum;
use crate::distribution::SeedSource;
use crate::error::Error;
use crate::parser::parse_expression;
use crate::resolver::{parent_scope, ProxyTable};
use crate::value::Value;

/// Builder for a [`DataGenerator`].
///
/// Definitions keep their insertion order; the seed defaults to a random
/// one, so pass [`with_seed`](Self::with_seed) for reproducible streams.
#[derive(Debug, Default)]
pub struct GeneratorBuilder {
    definitions: Vec<(String, String)>,
    seed: Option<u64>,
}

impl GeneratorBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named expression definition.
    pub fn define(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.definitions.push((name.into(), expression.into()));
        self
    }

    /// Set the base seed for every per-node RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Compile the definitions into a generator.
    pub fn build(self) -> Result<DataGenerator, Error> {
        let seed = self.seed.unwrap_or_else(rand::random);
        let seeds = SeedSource::new(seed);
        let mut table = ProxyTable::new();

        // The universe of names: definitions and their dotted prefixes, in
        // first-appearance order. Registering them all before parsing is
        // what makes forward references work.
        let mut universe: Vec<String> = Vec::new();
        let mut known: HashSet<String> = HashSet::new();
        for (name, _) in &self.definitions {
            for prefix in dotted_prefixes(name) {
                if known.insert(prefix.to_string()) {
                    universe.push(prefix.to_string());
                }
            }
            if known.insert(name.clone()) {
                universe.push(name.clone());
            }
        }
        for name in &universe {
            table.proxy(name);
        }

        for (name, expression) in &self.definitions {
            let scope = parent_scope(name);
            let root = parse_expression(expression, scope, &mut table, &seeds)?;
            table.bind(name, root)?;
            debug!(name = %name, "compiled definition");
        }

        // Implicit parents: a prefix with no expression of its own becomes a
        // composite over its immediate children.
        let defined: HashSet<&str> = self
            .definitions
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        for candidate in &universe {
            if defined.contains(candidate.as_str()) {
                continue;
            }
            let mut children = Vec::new();
            for other in &universe {
                if other != candidate && parent_scope(other) == candidate {
                    let field = last_segment(other);
                    children.push((field.to_string(), table.proxy(other)));
                }
            }
            table.bind(candidate, Value::composite(children))?;
        }

        let unbound = table.unbound();
        if !unbound.is_empty() {
            return Err(Error::UnresolvedReference(unbound));
        }

        let mut names = Vec::with_capacity(self.definitions.len());
        let mut roots = HashMap::with_capacity(self.definitions.len());
        for (name, _) in &self.definitions {
            names.push(name.clone());
            roots.insert(name.clone(), table.proxy(name));
        }
        debug!(definitions = names.len(), seed, "value graph built");
        Ok(DataGenerator { roots, names })
    }
}

/// A compiled set of named value streams.
///
/// Each public root is driven independently: one `next` produces one record
/// for that root. Roots are the names that appeared in the input; implicit
/// parents are reachable through references (`$user`) but are not roots
/// themselves.
pub struct DataGenerator {
    roots: HashMap<String, Value>,
    names: Vec<String>,
}

impl DataGenerator {
    /// Produce the next record for the named root.
    pub fn next(&self, name: &str) -> Result<Datum, Error> {
        self.root(name)?.next()
    }

    /// The named root's last computed record.
    pub fn current(&self, name: &str) -> Result<Datum, Error> {
        self.root(name)?.current()
    }

    /// Rewind the named root and its subtree.
    pub fn reset(&self, name: &str) -> Result<(), Error> {
        self.root(name)?.reset();
        Ok(())
    }

    /// Rewind every root.
    pub fn reset_all(&self) {
        for name in &self.names {
            if let Some(root) = self.roots.get(name) {
                root.reset();
            }
        }
    }

    /// Definition names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The value handle behind a root, for direct graph-level access.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.roots.get(name)
    }

    fn root(&self, name: &str) -> Result<&Value, Error> {
        self.roots
            .get(name)
            .ok_or_else(|| Error::UnknownName(name.to_string()))
    }
}

/// Proper dotted prefixes of a name: `a.b.c` yields `a`, then `a.b`.
fn dotted_prefixes(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices('.').map(move |(split, _)| &name[..split])
}

fn last_segment(name: &str) -> &str {
    match name.rfind('.') {
        Some(split) => &name[split + 1..],
        None => name,
    }
}
