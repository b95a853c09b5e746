//! Scope-aware connection lookup.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::dao::{DaoResult, ErrorTranslator};
use crate::driver::DataSource;
use crate::transaction::{
    ResourceHandle, ScopeKey, SharedHandle, TransactionContextStore, TransactionManager,
};

/// A connection obtained through [`ConnectionUtils`].
#[derive(Debug)]
pub enum ConnectionLease {
    /// The handle bound to the scope's running transaction. Not ours to release.
    Bound(SharedHandle),
    /// A private auto-commit handle, released by `release_connection`.
    Owned(ResourceHandle),
}

impl ConnectionLease {
    /// True when the lease is the scope's bound transaction handle.
    pub fn is_transactional(&self) -> bool {
        matches!(self, ConnectionLease::Bound(_))
    }
}

/// Hands out the scope's transactional connection when there is one and a
/// fresh auto-commit connection otherwise.
#[derive(Debug, Clone)]
pub struct ConnectionUtils {
    source: Arc<dyn DataSource>,
    store: Arc<TransactionContextStore>,
    translator: ErrorTranslator,
}

impl ConnectionUtils {
    /// Create a lookup that translates with the source's vendor table.
    pub fn new(source: Arc<dyn DataSource>, store: Arc<TransactionContextStore>) -> Self {
        let translator = ErrorTranslator::for_data_source(source.as_ref());
        Self {
            source,
            store,
            translator,
        }
    }

    /// Share the data source, store and translator of `manager`.
    pub fn from_manager(manager: &TransactionManager) -> Self {
        Self {
            source: Arc::clone(manager.data_source()),
            store: Arc::clone(manager.store()),
            translator: manager.translator().clone(),
        }
    }

    /// Get a reference to the error translator.
    pub fn translator(&self) -> &ErrorTranslator {
        &self.translator
    }

    /// Get the handle bound to `scope`, or acquire a private auto-commit one.
    pub fn get_connection(&self, scope: &ScopeKey) -> DaoResult<ConnectionLease> {
        if let Some(handle) = self.store.resolve(scope) {
            trace!(target: "txsync::handle", scope = %scope, "using transactional connection");
            return Ok(ConnectionLease::Bound(handle));
        }
        ResourceHandle::acquire(self.source.as_ref())
            .map(ConnectionLease::Owned)
            .map_err(|e| self.translator.translate("getConnection", "", e))
    }

    /// Give a lease back. Only an owned lease is actually released.
    pub fn release_connection(&self, lease: ConnectionLease) {
        if let ConnectionLease::Owned(mut handle) = lease {
            if let Err(e) = handle.release() {
                warn!(
                    target: "txsync::handle",
                    connection = %handle.id(),
                    error = %e,
                    "failed to release connection"
                );
            }
        }
    }

    /// Run `f` on the scope's connection, releasing it afterwards if it
    /// was not transactional.
    pub fn with_connection<T, F>(&self, scope: &ScopeKey, f: F) -> DaoResult<T>
    where
        F: FnOnce(&mut ResourceHandle) -> DaoResult<T>,
    {
        let mut lease = self.get_connection(scope)?;
        let result = match &mut lease {
            ConnectionLease::Bound(handle) => f(&mut handle.lock()),
            ConnectionLease::Owned(handle) => f(handle),
        };
        self.release_connection(lease);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memdb::{MemoryDataSource, MemoryDatabase};

    fn setup() -> (Arc<MemoryDatabase>, TransactionManager, ConnectionUtils) {
        let db = MemoryDatabase::new("utils-test");
        let manager = TransactionManager::new(
            Arc::new(MemoryDataSource::new(db.clone())),
            Arc::new(TransactionContextStore::new()),
        );
        let utils = ConnectionUtils::from_manager(&manager);
        (db, manager, utils)
    }

    #[test]
    fn test_owned_outside_transaction() {
        let (db, _manager, utils) = setup();
        let lease = utils.get_connection(&ScopeKey::new()).unwrap();
        assert!(!lease.is_transactional());

        utils.release_connection(lease);
        assert_eq!(db.connections_closed(), 1);
    }

    #[test]
    fn test_bound_inside_transaction() {
        let (db, manager, utils) = setup();
        let scope = ScopeKey::new();
        let tx = manager.begin(&scope).unwrap();

        let lease = utils.get_connection(&scope).unwrap();
        match &lease {
            ConnectionLease::Bound(handle) => assert!(Arc::ptr_eq(handle, tx.handle())),
            ConnectionLease::Owned(_) => panic!("expected the bound handle"),
        }
        utils.release_connection(lease);
        assert!(tx.handle().lock().is_open());
        assert_eq!(db.connections_closed(), 0);

        manager.rollback(tx).unwrap();
        assert_eq!(db.connections_closed(), 1);
    }

    #[test]
    fn test_with_connection_releases_owned() {
        let (db, _manager, utils) = setup();
        let id = utils.with_connection(&ScopeKey::new(), |h| Ok(h.id())).unwrap();
        assert_eq!(id.get(), 1);
        assert_eq!(db.connections_closed(), 1);
    }
}
