//! Transaction status using the typestate pattern.
//!
//! Only a `TransactionStatus<Active>` can be committed or rolled back, and
//! both consume it, so a finished transaction cannot be finished again.
//! An owner's status dropped while still active rolls its transaction back.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::driver::ConnectionId;
use crate::transaction::context::SharedHandle;
use crate::transaction::manager::TransactionManagerInner;
use crate::transaction::scope::ScopeKey;

/// Marker type for a transaction that can still commit or roll back.
#[derive(Debug)]
pub struct Active;

/// Marker type for a committed transaction.
#[derive(Debug)]
pub struct Committed;

/// Marker type for a rolled-back transaction.
#[derive(Debug)]
pub struct RolledBack;

/// Runtime view of the typestate marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

pub trait StateMarker {
    const STATE: TxState;
}

impl StateMarker for Active {
    const STATE: TxState = TxState::Active;
}

impl StateMarker for Committed {
    const STATE: TxState = TxState::Committed;
}

impl StateMarker for RolledBack {
    const STATE: TxState = TxState::RolledBack;
}

/// Bookkeeping for a physical transaction, shared by its owner and every
/// participant.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionInfo {
    pub tx_id: String,
    pub scope: ScopeKey,
    pub connection: ConnectionId,
    pub started_at: DateTime<Utc>,
}

impl TransactionInfo {
    pub(crate) fn new(scope: ScopeKey, connection: ConnectionId) -> Self {
        Self {
            tx_id: ulid::Ulid::new().to_string(),
            scope,
            connection,
            started_at: Utc::now(),
        }
    }
}

/// What `begin` hands back: which transaction the caller is in and whether
/// the caller owns it.
pub struct TransactionStatus<S> {
    info: TransactionInfo,
    handle: SharedHandle,
    new_transaction: bool,
    /// Set only while an owner's transaction is unfinished.
    owner: Option<Arc<TransactionManagerInner>>,
    _state: PhantomData<S>,
}

impl<S: StateMarker> TransactionStatus<S> {
    /// Get the transaction id.
    pub fn tx_id(&self) -> &str {
        &self.info.tx_id
    }

    /// Get the scope the transaction is bound to.
    pub fn scope(&self) -> ScopeKey {
        self.info.scope
    }

    pub fn info(&self) -> &TransactionInfo {
        &self.info
    }

    /// When the physical transaction started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.info.started_at
    }

    /// True for the caller that started the physical transaction. Only
    /// the owner commits, rolls back and releases.
    pub fn is_new_transaction(&self) -> bool {
        self.new_transaction
    }

    /// Get the state as a runtime value.
    pub fn state(&self) -> TxState {
        S::STATE
    }

    fn transition<T>(mut self) -> TransactionStatus<T> {
        self.owner = None;
        TransactionStatus {
            info: self.info.clone(),
            handle: Arc::clone(&self.handle),
            new_transaction: self.new_transaction,
            owner: None,
            _state: PhantomData,
        }
    }
}

impl<S> Drop for TransactionStatus<S> {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.abandon(&self.info, &self.handle);
        }
    }
}

impl<S> fmt::Debug for TransactionStatus<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionStatus")
            .field("info", &self.info)
            .field("new_transaction", &self.new_transaction)
            .field("armed", &self.owner.is_some())
            .finish()
    }
}

impl TransactionStatus<Active> {
    /// A participant's view of a transaction someone else owns.
    pub(crate) fn participant(info: TransactionInfo, handle: SharedHandle) -> Self {
        Self {
            info,
            handle,
            new_transaction: false,
            owner: None,
            _state: PhantomData,
        }
    }

    /// The owner's view. Dropping it unfinished rolls back through `manager`.
    pub(crate) fn owned(
        info: TransactionInfo,
        handle: SharedHandle,
        manager: Arc<TransactionManagerInner>,
    ) -> Self {
        Self {
            info,
            handle,
            new_transaction: true,
            owner: Some(manager),
            _state: PhantomData,
        }
    }

    /// Hand cleanup back to the manager's explicit commit or rollback.
    pub(crate) fn disarm(&mut self) {
        self.owner = None;
    }

    /// The resource handle the transaction runs on.
    pub fn handle(&self) -> &SharedHandle {
        &self.handle
    }

    pub(crate) fn into_committed(self) -> TransactionStatus<Committed> {
        self.transition()
    }

    pub(crate) fn into_rolled_back(self) -> TransactionStatus<RolledBack> {
        self.transition()
    }
}
