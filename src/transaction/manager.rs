//! Transaction manager - begin, commit and rollback with join semantics.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::dao::{DaoResult, DataAccessError, ErrorTranslator};
use crate::driver::DataSource;
use crate::transaction::context::{SharedHandle, TransactionContextStore};
use crate::transaction::handle::ResourceHandle;
use crate::transaction::scope::ScopeKey;
use crate::transaction::status::{Active, Committed, RolledBack, TransactionInfo, TransactionStatus};

/// Coordinates transactions over one data source.
///
/// `begin` in a scope that already has a bound handle joins that
/// transaction instead of opening a second one. Only the caller that
/// started the transaction (the owner) touches the connection on commit or
/// rollback, and only the owner releases it.
///
/// Thread-safe: can be shared across threads via Clone (uses Arc internally).
#[derive(Clone)]
pub struct TransactionManager {
    inner: Arc<TransactionManagerInner>,
}

pub(crate) struct TransactionManagerInner {
    source: Arc<dyn DataSource>,
    store: Arc<TransactionContextStore>,
    translator: ErrorTranslator,
    /// Owned transactions tracked by scope.
    active: RwLock<HashMap<ScopeKey, TransactionInfo>>,
}

impl TransactionManager {
    /// Create a manager; errors are classified with the source's vendor table.
    pub fn new(source: Arc<dyn DataSource>, store: Arc<TransactionContextStore>) -> Self {
        let translator = ErrorTranslator::for_data_source(source.as_ref());
        Self::build(source, store, translator)
    }

    /// Replace the error translator.
    pub fn with_translator(self, translator: ErrorTranslator) -> Self {
        Self::build(Arc::clone(&self.inner.source), Arc::clone(&self.inner.store), translator)
    }

    fn build(
        source: Arc<dyn DataSource>,
        store: Arc<TransactionContextStore>,
        translator: ErrorTranslator,
    ) -> Self {
        Self {
            inner: Arc::new(TransactionManagerInner {
                source,
                store,
                translator,
                active: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get a reference to the underlying data source.
    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.inner.source
    }

    /// Get a reference to the context store.
    pub fn store(&self) -> &Arc<TransactionContextStore> {
        &self.inner.store
    }

    /// Get a reference to the error translator.
    pub fn translator(&self) -> &ErrorTranslator {
        &self.inner.translator
    }

    /// Start a transaction in `scope`, or join the one already there.
    pub fn begin(&self, scope: &ScopeKey) -> DaoResult<TransactionStatus<Active>> {
        if let Some(handle) = self.inner.store.resolve(scope) {
            let info = match self.inner.active.read().get(scope) {
                Some(info) => info.clone(),
                None => TransactionInfo::new(*scope, handle.lock().id()),
            };
            debug!(
                target: "txsync::tx",
                scope = %scope,
                tx_id = %info.tx_id,
                "joining existing transaction"
            );
            return Ok(TransactionStatus::participant(info, handle));
        }

        let mut handle = ResourceHandle::acquire(self.inner.source.as_ref())
            .map_err(|e| self.inner.translator.translate("begin", "BEGIN", e))?;
        if let Err(e) = handle.begin_transaction() {
            let err = self.inner.translator.translate("begin", "BEGIN", e);
            release_logged(&mut handle);
            return Err(err);
        }

        let info = TransactionInfo::new(*scope, handle.id());
        let shared: SharedHandle = Arc::new(Mutex::new(handle));
        if let Err(e) = self.inner.store.bind(scope, Arc::clone(&shared)) {
            release_logged(&mut shared.lock());
            return Err(e);
        }
        self.inner.active.write().insert(*scope, info.clone());

        debug!(
            target: "txsync::tx",
            scope = %scope,
            tx_id = %info.tx_id,
            connection = %info.connection,
            "transaction started"
        );
        Ok(TransactionStatus::owned(info, shared, Arc::clone(&self.inner)))
    }

    /// Commit an owned transaction. A participant's commit does nothing;
    /// the owner decides.
    ///
    /// If the commit fails the transaction is rolled back, the handle is
    /// released and the commit failure is returned.
    pub fn commit(
        &self,
        mut status: TransactionStatus<Active>,
    ) -> DaoResult<TransactionStatus<Committed>> {
        if !status.is_new_transaction() {
            debug!(
                target: "txsync::tx",
                scope = %status.scope(),
                "participant commit deferred to owner"
            );
            return Ok(status.into_committed());
        }
        status.disarm();

        let scope = status.scope();
        let result = {
            let mut handle = status.handle().lock();
            if handle.is_rollback_only() {
                debug!(
                    target: "txsync::tx",
                    scope = %scope,
                    "transaction marked rollback-only, rolling back"
                );
                if let Err(e) = handle.rollback() {
                    error!(
                        target: "txsync::tx",
                        scope = %scope,
                        error = %e,
                        "rollback of rollback-only transaction failed"
                    );
                }
                Err(DataAccessError::UnexpectedRollback { scope })
            } else {
                match handle.commit() {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        let err = self.inner.translator.translate("commit", "COMMIT", e);
                        match handle.rollback() {
                            Ok(()) => debug!(
                                target: "txsync::tx",
                                scope = %scope,
                                "rolled back after failed commit"
                            ),
                            Err(rb) => error!(
                                target: "txsync::tx",
                                scope = %scope,
                                error = %rb,
                                "rollback after failed commit also failed"
                            ),
                        }
                        Err(err)
                    }
                }
            }
        };

        self.inner.cleanup(&scope, status.handle());
        match result {
            Ok(()) => {
                debug!(
                    target: "txsync::tx",
                    scope = %scope,
                    tx_id = %status.tx_id(),
                    "transaction committed"
                );
                Ok(status.into_committed())
            }
            Err(e) => Err(e),
        }
    }

    /// Roll back an owned transaction. A participant's rollback marks the
    /// transaction rollback-only so that the owner's commit rolls back.
    pub fn rollback(
        &self,
        mut status: TransactionStatus<Active>,
    ) -> DaoResult<TransactionStatus<RolledBack>> {
        if !status.is_new_transaction() {
            status.handle().lock().mark_rollback_only();
            debug!(
                target: "txsync::tx",
                scope = %status.scope(),
                "participant marked transaction rollback-only"
            );
            return Ok(status.into_rolled_back());
        }
        status.disarm();

        let scope = status.scope();
        let result = status
            .handle()
            .lock()
            .rollback()
            .map_err(|e| self.inner.translator.translate("rollback", "ROLLBACK", e));
        if let Err(e) = &result {
            error!(target: "txsync::tx", scope = %scope, error = %e, "rollback failed");
        }

        self.inner.cleanup(&scope, status.handle());
        debug!(
            target: "txsync::tx",
            scope = %scope,
            tx_id = %status.tx_id(),
            "transaction rolled back"
        );
        result.map(|()| status.into_rolled_back())
    }

    /// Number of owned transactions in flight.
    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    /// Info for every owned transaction in flight.
    pub fn active_transactions(&self) -> Vec<TransactionInfo> {
        self.inner.active.read().values().cloned().collect()
    }

    /// Check whether `scope` has an owned transaction in flight.
    pub fn is_active(&self, scope: &ScopeKey) -> bool {
        self.inner.active.read().contains_key(scope)
    }

    /// Get info for the transaction in `scope`.
    pub fn transaction_info(&self, scope: &ScopeKey) -> Option<TransactionInfo> {
        self.inner.active.read().get(scope).cloned()
    }
}

impl TransactionManagerInner {
    /// Unbind, forget and release an owned transaction.
    fn cleanup(&self, scope: &ScopeKey, handle: &SharedHandle) {
        self.store.unbind(scope);
        self.active.write().remove(scope);
        release_logged(&mut handle.lock());
    }

    /// Roll back and clean up a transaction whose owner dropped its status
    /// without committing or rolling back.
    pub(crate) fn abandon(&self, info: &TransactionInfo, handle: &SharedHandle) {
        warn!(
            target: "txsync::tx",
            scope = %info.scope,
            tx_id = %info.tx_id,
            "transaction status dropped while active, rolling back"
        );
        if let Err(e) = handle.lock().rollback() {
            error!(
                target: "txsync::tx",
                scope = %info.scope,
                error = %e,
                "rollback of abandoned transaction failed"
            );
        }
        self.cleanup(&info.scope, handle);
    }
}

fn release_logged(handle: &mut ResourceHandle) {
    if let Err(e) = handle.release() {
        warn!(target: "txsync::tx", connection = %handle.id(), error = %e, "release failed");
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("vendor", &self.inner.translator.vendor())
            .field("active_count", &self.active_count())
            .finish()
    }
}
