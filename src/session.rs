//! Per-request session lifecycle
//!
//! One session is opened for each request, configured with the database,
//! schema and warehouse context, used for that request's statements, and
//! closed exactly once. Sessions are never pooled or shared.

use crate::config::SessionContext;
use crate::error::{GatewayError, Result};
use crate::statement::{self, Statement};
use crate::warehouse::{Connector, QueryResult, WarehouseSession};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Boxed future borrowing the session for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle position of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    SessionAcquiring,
    ContextApplying,
    StatementExecuting,
    SessionReleasing,
    Done,
}

impl RequestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SessionAcquiring => "session_acquiring",
            Self::ContextApplying => "context_applying",
            Self::StatementExecuting => "statement_executing",
            Self::SessionReleasing => "session_releasing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open warehouse session owned by one request.
///
/// Released explicitly by [`SessionManager`]. If the owning future is
/// dropped first (deadline, panic, cancellation) the guard hands the
/// connection to the runtime to be closed in the background.
pub struct Session {
    inner: Option<Box<dyn WarehouseSession>>,
    executed: usize,
}

impl Session {
    fn new(inner: Box<dyn WarehouseSession>) -> Self {
        Self {
            inner: Some(inner),
            executed: 0,
        }
    }

    /// Execute one statement on this session.
    pub async fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| GatewayError::Connection("session already released".to_string()))?;

        self.executed += 1;
        debug!(
            phase = %RequestPhase::StatementExecuting,
            seq = self.executed,
            sql = %statement.sql,
            binds = statement.binds.len(),
            "executing statement"
        );
        inner.execute(statement).await
    }

    /// Statements executed so far.
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Close the connection once; errors are logged and swallowed.
    ///
    /// The connection stays in the guard until the close round-trip
    /// finishes, so a close interrupted by a dropped future is retried by
    /// `Drop`.
    async fn close(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            debug!(phase = %RequestPhase::SessionReleasing, "releasing session");
            if let Err(e) = inner.close().await {
                warn!(error = %e, "failed to close warehouse session");
            }
            self.inner = None;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(mut inner) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(phase = %RequestPhase::SessionReleasing, "releasing abandoned session in background");
                handle.spawn(async move {
                    if let Err(e) = inner.close().await {
                        warn!(error = %e, "failed to close abandoned warehouse session");
                    }
                });
            }
            Err(_) => {
                warn!("warehouse session dropped outside a runtime; left for the server to expire");
            }
        }
    }
}

/// Opens, configures and releases sessions.
#[derive(Clone)]
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    context: SessionContext,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>, context: SessionContext) -> Self {
        Self { connector, context }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Backend name for logs.
    pub fn backend(&self) -> &'static str {
        self.connector.name()
    }

    /// Open a raw session. Handshake failures are `ConnectionError`.
    pub async fn acquire(&self) -> Result<Session> {
        debug!(phase = %RequestPhase::SessionAcquiring, backend = self.connector.name(), "acquiring session");
        let inner = self.connector.connect().await.map_err(GatewayError::into_connection)?;
        Ok(Session::new(inner))
    }

    /// Select database, schema (default PUBLIC) and warehouse, in that order.
    pub async fn apply_context(&self, session: &mut Session) -> Result<()> {
        debug!(
            phase = %RequestPhase::ContextApplying,
            database = %self.context.database,
            schema = %self.context.schema_or_default(),
            warehouse = %self.context.warehouse,
            "applying session context"
        );
        let statements = [
            statement::use_database(&self.context.database),
            statement::use_schema(self.context.schema_or_default()),
            statement::use_warehouse(&self.context.warehouse),
        ];
        for stmt in &statements {
            session.execute(stmt).await.map_err(GatewayError::into_connection)?;
        }
        Ok(())
    }

    /// Close a session exactly once. Never fails.
    pub async fn release(&self, mut session: Session) {
        session.close().await;
    }

    /// Run `work` on a freshly acquired, context-configured session and
    /// release it afterwards, whether `work` succeeded or not.
    ///
    /// `work` receives the session by mutable reference; move any request
    /// data it needs into the closure.
    pub async fn with_session<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T>> + Send,
    {
        let mut session = self.acquire().await?;

        if let Err(e) = self.apply_context(&mut session).await {
            self.release(session).await;
            return Err(e);
        }

        let result = work(&mut session).await;
        self.release(session).await;
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::warehouse::LocalWarehouse;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps the embedded warehouse and records what the gateway sends.
    #[derive(Clone)]
    pub(crate) struct RecordingConnector {
        pub warehouse: LocalWarehouse,
        pub statements: Arc<Mutex<Vec<Statement>>>,
        pub opened: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
        /// Fail any statement whose SQL contains this text
        pub fail_on: Arc<Mutex<Option<String>>>,
    }

    impl RecordingConnector {
        pub fn new(warehouse: LocalWarehouse) -> Self {
            Self {
                warehouse,
                statements: Arc::default(),
                opened: Arc::default(),
                closed: Arc::default(),
                fail_on: Arc::default(),
            }
        }

        pub fn local() -> Self {
            Self::new(LocalWarehouse::for_config(&GatewayConfig::for_local()).unwrap())
        }

        pub fn sql(&self) -> Vec<String> {
            self.statements.lock().iter().map(|s| s.sql.clone()).collect()
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }

        pub fn fail_when(&self, fragment: &str) {
            *self.fail_on.lock() = Some(fragment.to_string());
        }
    }

    #[async_trait]
    impl Connector for RecordingConnector {
        async fn connect(&self) -> Result<Box<dyn WarehouseSession>> {
            let inner = self.warehouse.connect().await?;
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingSession {
                inner,
                recorder: self.clone(),
            }))
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct RecordingSession {
        inner: Box<dyn WarehouseSession>,
        recorder: RecordingConnector,
    }

    #[async_trait]
    impl WarehouseSession for RecordingSession {
        async fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
            self.recorder.statements.lock().push(statement.clone());
            let should_fail = self
                .recorder
                .fail_on
                .lock()
                .as_deref()
                .map_or(false, |f| statement.sql.contains(f));
            if should_fail {
                return Err(GatewayError::Execution(format!("injected failure: {}", statement.sql)));
            }
            self.inner.execute(statement).await
        }

        async fn close(&mut self) -> Result<()> {
            self.recorder.closed.fetch_add(1, Ordering::SeqCst);
            self.inner.close().await
        }
    }

    /// Connector whose handshake always fails.
    pub(crate) struct FailingConnector;

    #[async_trait]
    impl Connector for FailingConnector {
        async fn connect(&self) -> Result<Box<dyn WarehouseSession>> {
            Err(GatewayError::Execution("Incorrect username or password was specified.".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn manager(connector: &RecordingConnector) -> SessionManager {
        SessionManager::new(Arc::new(connector.clone()), GatewayConfig::for_local().context)
    }

    #[tokio::test]
    async fn test_context_applied_in_order() {
        let recorder = RecordingConnector::local();
        let manager = manager(&recorder);
        manager
            .with_session(|_session| Box::pin(async { Ok(()) }))
            .await
            .unwrap();
        assert_eq!(
            recorder.sql(),
            vec!["USE DATABASE LOCAL", "USE SCHEMA PUBLIC", "USE WAREHOUSE LOCAL_WH"]
        );
        assert_eq!(recorder.opened(), 1);
        assert_eq!(recorder.closed(), 1);
    }

    #[tokio::test]
    async fn test_released_after_business_failure() {
        let recorder = RecordingConnector::local();
        let manager = manager(&recorder);
        let result: Result<()> = manager
            .with_session(|session| {
                Box::pin(async move {
                    session.execute(&Statement::text("SELECT * FROM MISSING")).await?;
                    Ok::<(), GatewayError>(())
                })
            })
            .await;
        assert_eq!(result.unwrap_err().kind(), crate::error::ErrorKind::ExecutionError);
        assert_eq!(recorder.closed(), 1);
    }

    #[tokio::test]
    async fn test_context_failure_is_connection_error_and_releases() {
        let recorder = RecordingConnector::local();
        let mut context = GatewayConfig::for_local().context;
        context.database = "NO_SUCH_DB".into();
        let manager = SessionManager::new(Arc::new(recorder.clone()), context);

        let err = manager
            .with_session(|_session| Box::pin(async { Ok(()) }))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
        assert_eq!(recorder.opened(), 1);
        assert_eq!(recorder.closed(), 1);
        assert_eq!(recorder.sql(), vec!["USE DATABASE NO_SUCH_DB"]);
    }

    #[tokio::test]
    async fn test_handshake_failure_has_nothing_to_release() {
        let manager = SessionManager::new(Arc::new(FailingConnector), GatewayConfig::for_local().context);
        let err = manager
            .with_session(|_session| Box::pin(async { Ok(()) }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ConnectionError);
    }

    #[tokio::test]
    async fn test_dropped_session_is_closed_in_background() {
        let recorder = RecordingConnector::local();
        let manager = manager(&recorder);
        let session = manager.acquire().await.unwrap();
        drop(session);
        // Let the spawned close run
        for _ in 0..10 {
            if recorder.closed() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(recorder.closed(), 1);
    }

    /// Close round-trips take ten seconds.
    struct SlowCloseConnector(RecordingConnector);

    struct SlowCloseSession(Box<dyn WarehouseSession>);

    #[async_trait]
    impl Connector for SlowCloseConnector {
        async fn connect(&self) -> Result<Box<dyn WarehouseSession>> {
            Ok(Box::new(SlowCloseSession(self.0.connect().await?)))
        }

        fn name(&self) -> &'static str {
            "slow-close"
        }
    }

    #[async_trait]
    impl WarehouseSession for SlowCloseSession {
        async fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
            self.0.execute(statement).await
        }

        async fn close(&mut self) -> Result<()> {
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
            self.0.close().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_release_is_finished_by_drop() {
        let recorder = RecordingConnector::local();
        let manager = SessionManager::new(
            Arc::new(SlowCloseConnector(recorder.clone())),
            GatewayConfig::for_local().context,
        );
        let mut session = manager.acquire().await.unwrap();

        let interrupted = tokio::time::timeout(std::time::Duration::from_secs(1), session.close()).await;
        assert!(interrupted.is_err());
        assert_eq!(recorder.closed(), 0);

        drop(session);
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!(recorder.closed(), 1);
    }

    #[tokio::test]
    async fn test_release_is_idempotent_per_session() {
        let recorder = RecordingConnector::local();
        let manager = manager(&recorder);
        let mut session = manager.acquire().await.unwrap();
        session.close().await;
        session.close().await;
        assert!(session.execute(&Statement::text("USE DATABASE LOCAL")).await.is_err());
        drop(session);
        tokio::task::yield_now().await;
        assert_eq!(recorder.closed(), 1);
    }
}
