//! In-process transport registry.
//!
//! Maps `inproc://` names to the socket and listener that bound them. The
//! registry is global and protected by `DashMap`; dialers look names up here
//! to find the socket they should be linked to.
//!
//! # Usage
//!
//! ```rust
//! use spmq_core::inproc::{bind_inproc, lookup_inproc, unbind_inproc, Listener};
//!
//! let listener = Listener { socket: 1, endpoint: 7 };
//! bind_inproc("doc-endpoint", listener).unwrap();
//! assert_eq!(lookup_inproc("doc-endpoint"), Some(listener));
//! unbind_inproc("doc-endpoint", 7);
//! ```

use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

/// Socket and endpoint ids owning a bound name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listener {
    pub socket: u32,
    pub endpoint: u32,
}

/// Global registry of inproc endpoints
static INPROC_REGISTRY: Lazy<DashMap<String, Listener>> = Lazy::new(DashMap::new);

/// Register `name` as bound by `listener`.
///
/// # Errors
///
/// - [`Error::AddrInvalid`] if the name is empty
/// - [`Error::AddrInUse`] if the name is already bound
pub fn bind_inproc(name: &str, listener: Listener) -> Result<()> {
    if name.is_empty() {
        return Err(Error::AddrInvalid);
    }
    match INPROC_REGISTRY.entry(name.to_string()) {
        Entry::Occupied(_) => Err(Error::AddrInUse),
        Entry::Vacant(slot) => {
            slot.insert(listener);
            Ok(())
        }
    }
}

/// Find the listener bound to `name`.
pub fn lookup_inproc(name: &str) -> Option<Listener> {
    INPROC_REGISTRY.get(name).map(|entry| *entry.value())
}

/// Remove `name` from the registry if it is still owned by `endpoint`.
pub fn unbind_inproc(name: &str, endpoint: u32) {
    INPROC_REGISTRY.remove_if(name, |_, listener| listener.endpoint == endpoint);
}

/// List all currently bound inproc endpoint names.
///
/// This is primarily useful for debugging and testing.
pub fn list_inproc_endpoints() -> Vec<String> {
    INPROC_REGISTRY
        .iter()
        .map(|entry| entry.key().clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_duplicate() {
        let name = "inproc-test-duplicate";
        bind_inproc(name, Listener { socket: 1, endpoint: 1 }).unwrap();
        assert_eq!(
            bind_inproc(name, Listener { socket: 2, endpoint: 2 }),
            Err(Error::AddrInUse)
        );
        unbind_inproc(name, 1);
        assert!(lookup_inproc(name).is_none());
    }

    #[test]
    fn test_unbind_requires_owner() {
        let name = "inproc-test-owner";
        bind_inproc(name, Listener { socket: 3, endpoint: 30 }).unwrap();
        unbind_inproc(name, 31);
        assert!(lookup_inproc(name).is_some());
        unbind_inproc(name, 30);
        assert!(lookup_inproc(name).is_none());
    }

    #[test]
    fn test_list_endpoints() {
        bind_inproc("inproc-test-list-1", Listener { socket: 4, endpoint: 40 }).unwrap();
        bind_inproc("inproc-test-list-2", Listener { socket: 4, endpoint: 41 }).unwrap();

        let endpoints = list_inproc_endpoints();
        assert!(endpoints.contains(&"inproc-test-list-1".to_string()));
        assert!(endpoints.contains(&"inproc-test-list-2".to_string()));

        unbind_inproc("inproc-test-list-1", 40);
        unbind_inproc("inproc-test-list-2", 41);
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(
            bind_inproc("", Listener { socket: 5, endpoint: 50 }),
            Err(Error::AddrInvalid)
        );
    }
}
