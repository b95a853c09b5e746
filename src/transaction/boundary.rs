//! Unit-of-work boundaries.

use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::dao::DataAccessError;
use crate::transaction::manager::TransactionManager;
use crate::transaction::scope::ScopeKey;

/// Runs a unit of work inside a transaction.
///
/// The work commits when it returns `Ok` and rolls back when it returns
/// `Err` or panics. Its error (or panic) reaches the caller unchanged.
/// Called again with the same scope while a transaction is running, the
/// inner call joins the outer transaction.
#[derive(Debug, Clone)]
pub struct TransactionTemplate {
    manager: TransactionManager,
}

impl TransactionTemplate {
    /// Create a boundary over `manager`.
    pub fn new(manager: TransactionManager) -> Self {
        Self { manager }
    }

    /// Get a reference to the underlying transaction manager.
    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Run `work` in the transaction of `scope`.
    ///
    /// A failure to begin or commit surfaces as `E::from(DataAccessError)`.
    /// A failure to roll back after `work` failed is logged and the
    /// original failure is returned.
    pub fn run<T, E, F>(&self, scope: &ScopeKey, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<DataAccessError>,
    {
        let status = self.manager.begin(scope)?;

        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(value)) => {
                self.manager.commit(status)?;
                Ok(value)
            }
            Ok(Err(e)) => {
                if let Err(rb) = self.manager.rollback(status) {
                    error!(
                        target: "txsync::tx",
                        scope = %scope,
                        error = %rb,
                        "rollback after failed unit of work failed"
                    );
                }
                Err(e)
            }
            Err(payload) => {
                if let Err(rb) = self.manager.rollback(status) {
                    error!(
                        target: "txsync::tx",
                        scope = %scope,
                        error = %rb,
                        "rollback after panic failed"
                    );
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// [`run`](Self::run) for work without a result value.
    pub fn execute_without_result<E, F>(&self, scope: &ScopeKey, work: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
        E: From<DataAccessError>,
    {
        self.run(scope, work)
    }
}

/// Wraps a service so that every call through [`invoke`](Transactional::invoke)
/// is one unit of work.
///
/// ```
/// use std::sync::Arc;
/// use txsync::dao::DataAccessError;
/// use txsync::memdb::{MemoryDataSource, MemoryDatabase};
/// use txsync::transaction::{
///     ScopeKey, TransactionContextStore, TransactionManager, TransactionTemplate, Transactional,
/// };
///
/// struct Greeter;
/// impl Greeter {
///     fn greet(&self) -> Result<&'static str, DataAccessError> {
///         Ok("hello")
///     }
/// }
///
/// let source = Arc::new(MemoryDataSource::new(MemoryDatabase::new("doc")));
/// let manager = TransactionManager::new(source, Arc::new(TransactionContextStore::new()));
/// let service = Transactional::new(Greeter, TransactionTemplate::new(manager));
///
/// let greeting = service.invoke(&ScopeKey::new(), |svc| svc.greet()).unwrap();
/// assert_eq!(greeting, "hello");
/// ```
#[derive(Debug)]
pub struct Transactional<S> {
    inner: S,
    template: TransactionTemplate,
}

impl<S> Transactional<S> {
    /// Wrap `inner` so that each call runs in a transaction.
    pub fn new(inner: S, template: TransactionTemplate) -> Self {
        Self { inner, template }
    }

    /// Call `call` on the wrapped service as one unit of work in `scope`.
    pub fn invoke<T, E, F>(&self, scope: &ScopeKey, call: F) -> Result<T, E>
    where
        F: FnOnce(&S) -> Result<T, E>,
        E: From<DataAccessError>,
    {
        self.template.run(scope, || call(&self.inner))
    }

    /// The wrapped service, outside any transaction.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Unwrap the service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}
