//! Engine gateway traits.

use crate::error::{EngineError, EngineResult};
use crate::statement::Statement;
use async_trait::async_trait;
use std::time::Duration;

/// Single scalar returned by a probe query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScalarValue {
    Int(i64),
    Text(String),
}

impl ScalarValue {
    /// Interpret the value as text, failing for other types.
    pub fn into_text(self, operation: &'static str) -> EngineResult<String> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(EngineError::UnexpectedResult {
                operation,
                message: format!("expected text, got {other:?}"),
            }),
        }
    }
}

/// Connection factory for the database engine.
///
/// Every provisioning call opens its own connection and closes it when
/// done; pooling, if any, lives below this trait.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Open an administrative connection.
    async fn connect(&self) -> EngineResult<Box<dyn EngineConnection>>;

    /// Get the backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Check engine connectivity.
    async fn health_check(&self) -> EngineResult<()> {
        let mut conn = self.connect().await?;
        let result = conn.query_scalar(&Statement::ping()).await;
        conn.close().await?;
        result.map(|_| ())
    }
}

/// An open administrative connection.
#[async_trait]
pub trait EngineConnection: Send {
    /// Run a query and return the first column of the first row, if any.
    /// A SQL NULL is returned as `None`.
    async fn query_scalar(&mut self, statement: &Statement) -> EngineResult<Option<ScalarValue>>;

    /// Run a command, failing with [`EngineError::Timeout`] if it does not
    /// complete within `timeout`.
    async fn execute(&mut self, statement: &Statement, timeout: Duration) -> EngineResult<()>;

    /// Close the connection.
    async fn close(self: Box<Self>) -> EngineResult<()>;
}
