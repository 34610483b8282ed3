//! Deferred-binding indirection nodes.
//!
//! A proxy stands in for a named definition while the graph is still being
//! built, which is what makes forward and cyclic references expressible:
//! parents hold the proxy, and the real node is slotted in once its
//! definition has been parsed. After binding, `current`/`next`/`reset`
//! delegate transparently.

use crate::error::Error;
use crate::value::{Kind, Value};

pub(crate) struct ProxyNode {
    name: String,
    delegate: Option<Value>,
}

impl ProxyNode {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            delegate: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn delegate(&self) -> Option<Value> {
        self.delegate.clone()
    }
}

impl Value {
    /// Bind this proxy to its delegate. A proxy is bound exactly once and
    /// never to itself.
    pub(crate) fn bind(&self, delegate: Value) -> Result<(), Error> {
        if self.ptr_eq(&delegate) {
            let name = self.proxy_name().unwrap_or_default();
            return Err(Error::EvaluationCycle(name));
        }
        let mut node = self.node.borrow_mut();
        match &mut node.kind {
            Kind::Proxy(proxy) => {
                if proxy.delegate.is_some() {
                    return Err(Error::InvalidReferenceName(format!(
                        "'{}' is defined more than once",
                        proxy.name
                    )));
                }
                proxy.delegate = Some(delegate);
                Ok(())
            }
            _ => Err(Error::InvalidReferenceName(
                "bind target is not a proxy".to_string(),
            )),
        }
    }

    /// Whether this proxy already has a delegate.
    pub(crate) fn is_bound(&self) -> bool {
        match &self.node.borrow().kind {
            Kind::Proxy(proxy) => proxy.delegate.is_some(),
            _ => true,
        }
    }

    /// The proxy's fully qualified name, if this is a proxy.
    pub(crate) fn proxy_name(&self) -> Option<String> {
        match &self.node.borrow().kind {
            Kind::Proxy(proxy) => Some(proxy.name.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Datum;

    #[test]
    fn test_proxy_delegates_after_binding() {
        let proxy = Value::new_proxy("a");
        proxy.bind(Value::primitive(Datum::Long(5))).unwrap();
        assert_eq!(proxy.next().unwrap(), Datum::Long(5));
        assert_eq!(proxy.current().unwrap(), Datum::Long(5));
    }

    #[test]
    fn test_unbound_proxy_fails_evaluation() {
        let proxy = Value::new_proxy("ghost");
        match proxy.next() {
            Err(Error::UnresolvedReference(names)) => {
                assert_eq!(names, vec!["ghost".to_string()])
            }
            other => panic!("expected unresolved reference, got {other:?}"),
        }
    }

    #[test]
    fn test_proxy_may_not_bind_to_itself() {
        let proxy = Value::new_proxy("narcissus");
        let err = proxy.bind(proxy.clone()).unwrap_err();
        assert!(matches!(err, Error::EvaluationCycle(_)));
    }

    #[test]
    fn test_proxy_binds_exactly_once() {
        let proxy = Value::new_proxy("a");
        proxy.bind(Value::primitive(Datum::Long(1))).unwrap();
        assert!(proxy.bind(Value::primitive(Datum::Long(2))).is_err());
    }

    #[test]
    fn test_proxy_current_tracks_shared_delegate() {
        let delegate = Value::primitive(Datum::Long(3));
        let proxy = Value::new_proxy("a");
        proxy.bind(delegate.clone()).unwrap();
        delegate.next().unwrap();
        assert_eq!(proxy.current().unwrap(), Datum::Long(3));
    }
}
