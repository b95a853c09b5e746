//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use txsync::access::{column, SqlTemplate};
use txsync::dao::{DaoResult, DataAccessError, ErrorTranslator};
use txsync::driver::{
    Connection, ConnectionId, CursorId, DataSource, Row, StatementId, Value, VendorError,
    VendorResult,
};
use txsync::memdb::{MemoryDataSource, MemoryDatabase};
use txsync::transaction::{
    ResourceHandle, ScopeKey, TransactionContextStore, TransactionManager, TransactionTemplate,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Switches that make the next calls on any wrapped connection fail.
#[derive(Debug, Default)]
pub struct Faults {
    pub commit: AtomicBool,
    pub rollback: AtomicBool,
    pub close_statement: AtomicBool,
    pub restore_auto_commit: AtomicBool,
    pub close: AtomicBool,
    pub get_connection: AtomicBool,
}

impl Faults {
    fn hit(flag: &AtomicBool, code: i32, message: &str) -> VendorResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(VendorError::new(code, message))
        } else {
            Ok(())
        }
    }
}

/// Counts what happens to connections handed out by [`FaultySource`].
#[derive(Debug, Default)]
pub struct Counters {
    pub acquired: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub close_attempts: AtomicUsize,
}

impl Counters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn close_attempts(&self) -> usize {
        self.close_attempts.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.acquired.store(0, Ordering::SeqCst);
        self.commits.store(0, Ordering::SeqCst);
        self.rollbacks.store(0, Ordering::SeqCst);
        self.close_attempts.store(0, Ordering::SeqCst);
    }
}

/// A data source over a [`MemoryDatabase`] that can be told to fail.
#[derive(Debug)]
pub struct FaultySource {
    inner: MemoryDataSource,
    pub faults: Arc<Faults>,
    pub counters: Arc<Counters>,
}

impl FaultySource {
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self {
            inner: MemoryDataSource::new(db),
            faults: Arc::default(),
            counters: Arc::default(),
        }
    }
}

impl DataSource for FaultySource {
    fn get_connection(&self) -> VendorResult<Box<dyn Connection>> {
        Faults::hit(&self.faults.get_connection, 90067, "Connection is broken")?;
        let inner = self.inner.get_connection()?;
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FaultyConnection {
            inner,
            faults: Arc::clone(&self.faults),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn vendor(&self) -> &str {
        self.inner.vendor()
    }
}

#[derive(Debug)]
pub struct FaultyConnection {
    inner: Box<dyn Connection>,
    faults: Arc<Faults>,
    counters: Arc<Counters>,
}

impl Connection for FaultyConnection {
    fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    fn auto_commit(&self) -> bool {
        self.inner.auto_commit()
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> VendorResult<()> {
        if auto_commit {
            Faults::hit(&self.faults.restore_auto_commit, 90067, "Connection is broken")?;
        }
        self.inner.set_auto_commit(auto_commit)
    }

    fn prepare(&mut self, sql: &str) -> VendorResult<StatementId> {
        self.inner.prepare(sql)
    }

    fn execute_update(&mut self, statement: StatementId, params: &[Value]) -> VendorResult<usize> {
        self.inner.execute_update(statement, params)
    }

    fn execute_query(
        &mut self,
        statement: StatementId,
        params: &[Value],
    ) -> VendorResult<CursorId> {
        self.inner.execute_query(statement, params)
    }

    fn next_row(&mut self, cursor: CursorId) -> VendorResult<Option<Row>> {
        self.inner.next_row(cursor)
    }

    fn close_cursor(&mut self, cursor: CursorId) -> VendorResult<()> {
        self.inner.close_cursor(cursor)
    }

    fn close_statement(&mut self, statement: StatementId) -> VendorResult<()> {
        Faults::hit(&self.faults.close_statement, 90007, "The object is already closed")?;
        self.inner.close_statement(statement)
    }

    fn commit(&mut self) -> VendorResult<()> {
        Faults::hit(&self.faults.commit, 90067, "Connection is broken")?;
        self.inner.commit()?;
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> VendorResult<()> {
        Faults::hit(&self.faults.rollback, 90067, "Connection is broken")?;
        self.inner.rollback()?;
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(self: Box<Self>) -> VendorResult<()> {
        self.counters.close_attempts.fetch_add(1, Ordering::SeqCst);
        let failed = Faults::hit(&self.faults.close, 90067, "Connection is broken");
        self.inner.close()?;
        failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub member_id: String,
    pub money: i64,
}

impl Member {
    pub fn new(member_id: &str, money: i64) -> Self {
        Self {
            member_id: member_id.to_string(),
            money,
        }
    }

    fn from_row(row: &Row) -> DaoResult<Self> {
        Ok(Self {
            member_id: column(row, "member_id")?,
            money: column(row, "money")?,
        })
    }
}

pub const CREATE_MEMBER: &str =
    "create table member (member_id varchar(10) primary key, money integer not null)";
const INSERT: &str = "insert into member(member_id, money) values (?, ?)";
const SELECT: &str = "select * from member where member_id = ?";
const UPDATE: &str = "update member set money = ? where member_id = ?";
const DELETE: &str = "delete from member where member_id = ?";

/// Repository that finds its connection through the scope.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    sql: SqlTemplate,
}

impl MemberRepository {
    pub fn new(sql: SqlTemplate) -> Self {
        Self { sql }
    }

    pub fn save(&self, scope: &ScopeKey, member: &Member) -> DaoResult<()> {
        self.sql
            .update(scope, INSERT, &[json!(member.member_id), json!(member.money)])
            .map(|_| ())
    }

    pub fn find_by_id(&self, scope: &ScopeKey, member_id: &str) -> DaoResult<Member> {
        self.sql
            .query_for_object(scope, SELECT, &[json!(member_id)], Member::from_row)
    }

    pub fn update(&self, scope: &ScopeKey, member_id: &str, money: i64) -> DaoResult<()> {
        self.sql.update(scope, UPDATE, &[json!(money), json!(member_id)]).map(|_| ())
    }

    pub fn delete(&self, scope: &ScopeKey, member_id: &str) -> DaoResult<()> {
        self.sql.update(scope, DELETE, &[json!(member_id)]).map(|_| ())
    }
}

/// Repository that is handed the connection on every call.
#[derive(Debug, Clone)]
pub struct ExplicitMemberRepository {
    translator: ErrorTranslator,
}

impl ExplicitMemberRepository {
    pub fn new(translator: ErrorTranslator) -> Self {
        Self { translator }
    }

    pub fn find_by_id(&self, handle: &mut ResourceHandle, member_id: &str) -> DaoResult<Member> {
        let rows = handle
            .query(SELECT, &[json!(member_id)])
            .map_err(|e| self.translator.translate("select", SELECT, e))?;
        match rows.first() {
            Some(row) => Member::from_row(row),
            None => Err(DataAccessError::not_found(
                "select",
                format!("member not found member id={}", member_id),
            )),
        }
    }

    pub fn update(
        &self,
        handle: &mut ResourceHandle,
        member_id: &str,
        money: i64,
    ) -> DaoResult<()> {
        handle
            .update(UPDATE, &[json!(money), json!(member_id)])
            .map(|_| ())
            .map_err(|e| self.translator.translate("update", UPDATE, e))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("transfer rejected: {0}")]
    Validation(String),
    #[error(transparent)]
    Data(#[from] DataAccessError),
}

fn validate(to: &Member) -> Result<(), ServiceError> {
    if to.member_id == "ex" {
        return Err(ServiceError::Validation("exception during transfer".into()));
    }
    Ok(())
}

/// Account transfer written against the scope-based repository.
#[derive(Debug, Clone)]
pub struct MemberService {
    template: TransactionTemplate,
    repo: MemberRepository,
}

impl MemberService {
    pub fn new(template: TransactionTemplate, repo: MemberRepository) -> Self {
        Self { template, repo }
    }

    pub fn account_transfer(
        &self,
        scope: &ScopeKey,
        from_id: &str,
        to_id: &str,
        money: i64,
    ) -> Result<(), ServiceError> {
        self.template.run(scope, || self.transfer_logic(scope, from_id, to_id, money))
    }

    /// The transfer itself, without a boundary.
    pub fn transfer_logic(
        &self,
        scope: &ScopeKey,
        from_id: &str,
        to_id: &str,
        money: i64,
    ) -> Result<(), ServiceError> {
        let from = self.repo.find_by_id(scope, from_id)?;
        let to = self.repo.find_by_id(scope, to_id)?;

        self.repo.update(scope, from_id, from.money - money)?;
        validate(&to)?;
        self.repo.update(scope, to_id, to.money + money)?;
        Ok(())
    }
}

/// Account transfer that manages its own connection and transaction.
pub fn explicit_transfer(
    source: &dyn DataSource,
    repo: &ExplicitMemberRepository,
    from_id: &str,
    to_id: &str,
    money: i64,
) -> Result<(), ServiceError> {
    let translate = |e| ErrorTranslator::for_data_source(source).translate("begin", "BEGIN", e);
    let mut handle = ResourceHandle::acquire(source).map_err(translate)?;

    let result = handle
        .begin_transaction()
        .map_err(translate)
        .map_err(ServiceError::from)
        .and_then(|()| {
            let from = repo.find_by_id(&mut handle, from_id)?;
            let to = repo.find_by_id(&mut handle, to_id)?;
            repo.update(&mut handle, from_id, from.money - money)?;
            validate(&to)?;
            repo.update(&mut handle, to_id, to.money + money)?;
            Ok(())
        });

    let outcome = match result {
        Ok(()) => handle.commit().map_err(|e| {
            let translator = ErrorTranslator::for_data_source(source);
            ServiceError::from(translator.translate("commit", "COMMIT", e))
        }),
        Err(e) => {
            let _ = handle.rollback();
            Err(e)
        }
    };
    let _ = handle.release();
    outcome
}

/// Everything a transfer test needs, wired over one fresh database.
pub struct Fixture {
    pub db: Arc<MemoryDatabase>,
    pub source: Arc<FaultySource>,
    pub manager: TransactionManager,
    pub template: TransactionTemplate,
    pub repo: MemberRepository,
    pub service: MemberService,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        init_tracing();
        let db = MemoryDatabase::new(name);
        let source = Arc::new(FaultySource::new(db.clone()));
        let store = Arc::new(TransactionContextStore::new());
        let manager = TransactionManager::new(source.clone(), store);
        let template = TransactionTemplate::new(manager.clone());
        let repo = MemberRepository::new(SqlTemplate::from_manager(&manager));
        let service = MemberService::new(template.clone(), repo.clone());

        let setup = ScopeKey::new();
        let sql = SqlTemplate::from_manager(&manager);
        sql.execute(&setup, CREATE_MEMBER).unwrap();

        Self {
            db,
            source,
            manager,
            template,
            repo,
            service,
        }
    }

    /// Insert members outside any transaction and reset the counters.
    pub fn with_members(self, members: &[(&str, i64)]) -> Self {
        let scope = ScopeKey::new();
        for (id, money) in members {
            self.repo.save(&scope, &Member::new(id, *money)).unwrap();
        }
        self.source.counters.reset();
        self
    }

    pub fn money(&self, member_id: &str) -> i64 {
        self.repo.find_by_id(&ScopeKey::new(), member_id).unwrap().money
    }

    /// Every physical connection opened has been closed.
    pub fn all_released(&self) -> bool {
        self.db.connections_opened() == self.db.connections_closed()
    }
}
