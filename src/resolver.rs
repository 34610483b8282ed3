//! Hierarchical name resolution through proxy indirection.
//!
//! Every definition name owns one proxy in the table. References resolve
//! against the table by walking the scope chain: a reference to `x` from
//! inside scope `a.b` tries `a.b.x`, then `a.x`, then `x`, first hit wins.
//! Binding happens once per name, when its definition has been parsed.

use std::collections::HashMap;

use crate::error::Error;
use crate::value::Value;

pub(crate) struct ProxyTable {
    proxies: HashMap<String, Value>,
}

impl ProxyTable {
    pub(crate) fn new() -> Self {
        Self {
            proxies: HashMap::new(),
        }
    }

    /// Get or create the proxy registered under a fully qualified name.
    pub(crate) fn proxy(&mut self, name: &str) -> Value {
        self.proxies
            .entry(name.to_string())
            .or_insert_with(|| Value::new_proxy(name))
            .clone()
    }

    /// Resolve a reference from the given scope through the prefix chain.
    pub(crate) fn resolve(&self, scope: &str, name: &str) -> Result<Value, Error> {
        let mut parent = scope;
        loop {
            let candidate = if parent.is_empty() {
                name.to_string()
            } else {
                format!("{parent}.{name}")
            };
            if let Some(proxy) = self.proxies.get(&candidate) {
                return Ok(proxy.clone());
            }
            if parent.is_empty() {
                return Err(Error::InvalidReferenceName(name.to_string()));
            }
            parent = parent_scope(parent);
        }
    }

    /// Bind the named proxy to its definition's root value.
    pub(crate) fn bind(&mut self, name: &str, target: Value) -> Result<(), Error> {
        self.proxy(name).bind(target)
    }

    /// Names of every proxy still missing a delegate.
    pub(crate) fn unbound(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .proxies
            .iter()
            .filter(|(_, proxy)| !proxy.is_bound())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Strip the last dotted segment: `a.b.c` becomes `a.b`, `a` becomes ``.
pub(crate) fn parent_scope(name: &str) -> &str {
    match name.rfind('.') {
        Some(split) => &name[..split],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Datum;

    #[test]
    fn test_parent_scope_strips_last_segment() {
        assert_eq!(parent_scope("a.b.c"), "a.b");
        assert_eq!(parent_scope("a.b"), "a");
        assert_eq!(parent_scope("a"), "");
    }

    #[test]
    fn test_resolution_prefers_innermost_scope() {
        let mut table = ProxyTable::new();
        let inner = table.proxy("a.b.x");
        table.proxy("a.x");
        table.proxy("x");
        let hit = table.resolve("a.b", "x").unwrap();
        assert!(hit.ptr_eq(&inner));
    }

    #[test]
    fn test_resolution_walks_up_the_chain() {
        let mut table = ProxyTable::new();
        let outer = table.proxy("x");
        let hit = table.resolve("a.b", "x").unwrap();
        assert!(hit.ptr_eq(&outer));
    }

    #[test]
    fn test_unknown_reference_is_rejected() {
        let table = ProxyTable::new();
        match table.resolve("a.b", "ghost") {
            Err(Error::InvalidReferenceName(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected invalid reference, got {other:?}"),
        }
    }

    #[test]
    fn test_forward_reference_shares_one_proxy() {
        let mut table = ProxyTable::new();
        let early = table.proxy("later");
        table
            .bind("later", Value::primitive(Datum::Long(1)))
            .unwrap();
        assert_eq!(early.next().unwrap(), Datum::Long(1));
    }

    #[test]
    fn test_unbound_reports_all_names_sorted() {
        let mut table = ProxyTable::new();
        table.proxy("zeta");
        table.proxy("alpha");
        table.bind("mid", Value::null()).unwrap();
        assert_eq!(table.unbound(), vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
