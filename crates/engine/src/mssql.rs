//! SQL Server engine gateway over TDS.

use crate::error::{EngineError, EngineResult};
use crate::gateway::{Engine, EngineConnection, ScalarValue};
use crate::statement::Statement;
use async_trait::async_trait;
use std::time::Duration;
use tiberius::{AuthMethod, Client, ColumnData, Config, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server gateway. Opens one TDS connection per [`Engine::connect`].
pub struct SqlServerEngine {
    config: Config,
    connect_timeout: Duration,
}

impl SqlServerEngine {
    /// Create a gateway from an ADO.NET style connection string.
    pub fn from_connection_string(
        connection_string: &str,
        connect_timeout: Duration,
    ) -> EngineResult<Self> {
        let config = Config::from_ado_string(connection_string).map_err(|e| {
            EngineError::Configuration(format!("invalid sqlserver connection string: {e}"))
        })?;
        tracing::info!(addr = %config.get_addr(), "Using SQL Server connection string");
        Ok(Self {
            config,
            connect_timeout,
        })
    }

    /// Create a gateway from individual connection parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn from_params(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        database: &str,
        trust_server_certificate: bool,
        connect_timeout: Duration,
    ) -> Self {
        let mut config = Config::new();
        config.host(host);
        config.port(port);
        config.database(database);
        config.application_name("dbprov");
        config.authentication(AuthMethod::sql_server(username, password));
        if trust_server_certificate {
            config.trust_cert();
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username,
            trust_server_certificate = trust_server_certificate,
            "Using SQL Server with individual parameters"
        );

        Self {
            config,
            connect_timeout,
        }
    }

    async fn open_client(&self) -> EngineResult<TdsClient> {
        let mut config = self.config.clone();
        loop {
            let addr = config.get_addr();
            let tcp = TcpStream::connect(&addr)
                .await
                .map_err(|e| EngineError::Connection(format!("{addr}: {e}")))?;
            tcp.set_nodelay(true)?;

            match Client::connect(config.clone(), tcp.compat_write()).await {
                Ok(client) => return Ok(client),
                // Azure SQL and availability groups may redirect to another node.
                Err(tiberius::error::Error::Routing { host, port }) => {
                    tracing::debug!(host = %host, port = port, "SQL Server redirected connection");
                    config.host(&host);
                    config.port(port);
                }
                Err(e) => return Err(EngineError::Connection(format!("{addr}: {e}"))),
            }
        }
    }
}

#[async_trait]
impl Engine for SqlServerEngine {
    async fn connect(&self) -> EngineResult<Box<dyn EngineConnection>> {
        let client = tokio::time::timeout(self.connect_timeout, self.open_client())
            .await
            .map_err(|_| EngineError::Timeout {
                operation: "connect",
                timeout: self.connect_timeout,
            })??;
        Ok(Box::new(SqlServerConnection { client }))
    }

    fn backend_name(&self) -> &'static str {
        "sqlserver"
    }
}

struct SqlServerConnection {
    client: TdsClient,
}

/// Build a parameterized query; parameters bind positionally to `@P1`, `@P2`, ...
fn bind_query(statement: &Statement) -> Query<'_> {
    let mut query = Query::new(statement.sql());
    for param in statement.params() {
        query.bind(param.as_str());
    }
    query
}

fn scalar_from_column(
    operation: &'static str,
    data: ColumnData<'static>,
) -> EngineResult<Option<ScalarValue>> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| ScalarValue::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| ScalarValue::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| ScalarValue::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(ScalarValue::Int),
        ColumnData::String(v) => v.map(|s| ScalarValue::Text(s.into_owned())),
        other => {
            return Err(EngineError::UnexpectedResult {
                operation,
                message: format!("unsupported column type {other:?}"),
            });
        }
    };
    Ok(value)
}

#[async_trait]
impl EngineConnection for SqlServerConnection {
    async fn query_scalar(&mut self, statement: &Statement) -> EngineResult<Option<ScalarValue>> {
        let operation = statement.operation();
        let row = bind_query(statement)
            .query(&mut self.client)
            .await
            .map_err(|e| EngineError::Command {
                operation,
                message: e.to_string(),
            })?
            .into_row()
            .await?;

        match row.and_then(|row| row.into_iter().next()) {
            Some(column) => scalar_from_column(operation, column),
            None => Ok(None),
        }
    }

    async fn execute(&mut self, statement: &Statement, timeout: Duration) -> EngineResult<()> {
        let operation = statement.operation();
        let client = &mut self.client;

        let run = async move {
            if statement.params().is_empty() {
                // Administrative batches (RESTORE, CREATE DATABASE) go out as
                // plain SQL batches; drain every result set so errors in later
                // statements of the batch surface here.
                client
                    .simple_query(statement.sql())
                    .await?
                    .into_results()
                    .await?;
            } else {
                bind_query(statement).execute(client).await?;
            }
            Ok::<(), tiberius::error::Error>(())
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(EngineError::Command {
                operation,
                message: e.to_string(),
            }),
            Err(_) => Err(EngineError::Timeout { operation, timeout }),
        }
    }

    async fn close(self: Box<Self>) -> EngineResult<()> {
        self.client.close().await?;
        Ok(())
    }
}
