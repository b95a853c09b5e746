//! Scope-to-connection bindings.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::dao::{DaoResult, DataAccessError};
use crate::transaction::handle::ResourceHandle;
use crate::transaction::scope::ScopeKey;

/// A resource handle shared between the transaction owner and every
/// participant in the same scope.
pub type SharedHandle = Arc<Mutex<ResourceHandle>>;

/// Holds the resource handle bound to each live scope.
///
/// A scope has at most one binding. Different scopes never see each
/// other's handles, so concurrent units of work stay isolated.
#[derive(Debug, Default)]
pub struct TransactionContextStore {
    bindings: RwLock<HashMap<ScopeKey, SharedHandle>>,
}

impl TransactionContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handle` to `scope`. Fails if the scope already has one.
    pub fn bind(&self, scope: &ScopeKey, handle: SharedHandle) -> DaoResult<()> {
        match self.bindings.write().entry(*scope) {
            Entry::Occupied(_) => Err(DataAccessError::AlreadyBound { scope: *scope }),
            Entry::Vacant(slot) => {
                trace!(target: "txsync::tx", scope = %scope, "handle bound");
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Get the handle bound to `scope`, if any.
    pub fn resolve(&self, scope: &ScopeKey) -> Option<SharedHandle> {
        self.bindings.read().get(scope).cloned()
    }

    /// Remove the binding for `scope`, returning it. Nothing happens when
    /// the scope is unbound.
    pub fn unbind(&self, scope: &ScopeKey) -> Option<SharedHandle> {
        let removed = self.bindings.write().remove(scope);
        if removed.is_some() {
            trace!(target: "txsync::tx", scope = %scope, "handle unbound");
        }
        removed
    }

    /// Check whether `scope` has a bound handle.
    pub fn is_bound(&self, scope: &ScopeKey) -> bool {
        self.bindings.read().contains_key(scope)
    }

    /// Number of bound scopes.
    pub fn bound_count(&self) -> usize {
        self.bindings.read().len()
    }
}
