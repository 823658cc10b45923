//! `DataManager`: table-level operations executed over one connection.
//!
//! # Example
//!
//! ```ignore
//! use pgdm::{ConnectOptions, DataManager, FilterSpec, OrderSpec, Values, select};
//!
//! let dm = DataManager::connect(&ConnectOptions::from_env()?).await?;
//!
//! let latest = dm
//!     .select(&select("orders").order(OrderSpec::new().desc("created_at")).limit(10))
//!     .await?;
//!
//! let created = dm
//!     .insert("users", &Values::new().set("email", "a@example.com"))
//!     .await?;
//!
//! dm.update(
//!     "users",
//!     &Values::new().set("active", false),
//!     &FilterSpec::new().eq("users", "id", created.last_insert_id),
//! )
//! .await?;
//! ```

use crate::client::GenericClient;
use crate::clause::JoinSpec;
use crate::config::{ConnectOptions, ManagerConfig};
use crate::error::{DmError, DmResult, SQLSTATE_OBJECT_NOT_IN_PREREQUISITE_STATE};
use crate::filter::FilterSpec;
use crate::log::{log_statement, log_transaction};
use crate::named::NamedParams;
use crate::row::{InsertResult, SelectResult};
use crate::statement::{
    Select, Statement, Values, count_statement, delete_statement, insert_statement, sum_statement,
    update_statement,
};
use tokio_postgres::types::FromSql;
use tokio_postgres::{NoTls, Row};

/// Compact data access over a single database connection.
///
/// `C` is any [`GenericClient`]: a `tokio_postgres::Client` (the default), a pooled
/// client, or a reference to one.
pub struct DataManager<C = tokio_postgres::Client> {
    client: C,
    config: ManagerConfig,
    in_transaction: bool,
}

impl DataManager<tokio_postgres::Client> {
    /// Open a connection and spawn its driver task on the current tokio runtime.
    pub async fn connect(options: &ConnectOptions) -> DmResult<Self> {
        Self::connect_with_config(options, ManagerConfig::default()).await
    }

    /// Like [`DataManager::connect`] with an explicit configuration.
    pub async fn connect_with_config(
        options: &ConnectOptions,
        config: ManagerConfig,
    ) -> DmResult<Self> {
        let pg_config = options.to_pg_config()?;
        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| DmError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "pgdm", error = %e, "connection task ended with error");
            }
        });
        tracing::debug!(
            target: "pgdm",
            host = %options.host,
            port = options.port,
            dbname = %options.dbname,
            "connected"
        );

        Ok(Self::with_config(client, config))
    }
}

impl<C: GenericClient> DataManager<C> {
    /// Wrap an existing client.
    pub fn new(client: C) -> Self {
        Self::with_config(client, ManagerConfig::default())
    }

    pub fn with_config(client: C, config: ManagerConfig) -> Self {
        Self {
            client,
            config,
            in_transaction: false,
        }
    }

    /// The underlying client.
    pub fn connector(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    async fn query_statement(&self, statement: &Statement) -> DmResult<Vec<Row>> {
        let positional = statement.to_positional()?;
        log_statement(
            &self.config.log,
            statement.kind(),
            &positional.sql,
            positional.params.len(),
        );
        self.client
            .query(&positional.sql, &positional.params_ref())
            .await
    }

    async fn execute_statement(&self, statement: &Statement) -> DmResult<u64> {
        let positional = statement.to_positional()?;
        log_statement(
            &self.config.log,
            statement.kind(),
            &positional.sql,
            positional.params.len(),
        );
        self.client
            .execute(&positional.sql, &positional.params_ref())
            .await
    }

    // ==================== Reads ====================

    /// Run a SELECT built with [`select`](crate::select).
    pub async fn select(&self, select: &Select) -> DmResult<SelectResult> {
        let statement = select.build()?;
        let rows = self.query_statement(&statement).await?;
        Ok(SelectResult::from_rows(rows))
    }

    /// Run arbitrary SQL with `:name` placeholders and return its rows.
    pub async fn custom_select(
        &self,
        sql: impl Into<String>,
        params: NamedParams,
    ) -> DmResult<SelectResult> {
        let rows = self
            .query_statement(&Statement::custom(sql, params))
            .await?;
        Ok(SelectResult::from_rows(rows))
    }

    /// `COUNT(column)` over rows matching `filter`.
    pub async fn count(
        &self,
        table: &str,
        column: &str,
        filter: &FilterSpec,
        join: &JoinSpec,
    ) -> DmResult<i64> {
        let statement = count_statement(table, column, filter, join)?;
        let row = self.first_row(&statement).await?;
        row.try_get(0)
            .map_err(|e| DmError::decode("count", e.to_string()))
    }

    /// `SUM(column)` over rows matching `filter`; `None` when no row matched.
    ///
    /// `T` must match the database result type: `SUM(smallint | integer)` is `i64`,
    /// `SUM(real)` is `f32`, `SUM(double precision)` is `f64`. `SUM(bigint)` and
    /// `SUM(numeric)` are `numeric`; decode those as `rust_decimal::Decimal` with the
    /// `decimal` feature enabled.
    pub async fn sum<T>(
        &self,
        table: &str,
        column: &str,
        filter: &FilterSpec,
        join: &JoinSpec,
    ) -> DmResult<Option<T>>
    where
        T: for<'a> FromSql<'a>,
    {
        let statement = sum_statement(table, column, filter, join)?;
        let row = self.first_row(&statement).await?;
        row.try_get(0)
            .map_err(|e| DmError::decode("sum", e.to_string()))
    }

    async fn first_row(&self, statement: &Statement) -> DmResult<Row> {
        self.query_statement(statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DmError::not_found(format!("{} statement returned no row", statement.kind()))
            })
    }

    // ==================== Writes ====================

    /// Insert one row.
    pub async fn insert(&self, table: &str, values: &Values) -> DmResult<InsertResult> {
        let statement = insert_statement(table, values)?;
        let affected = self.execute_statement(&statement).await?;
        Ok(InsertResult::new(affected, self.last_insert_id().await?))
    }

    /// Run an arbitrary INSERT with `:name` placeholders.
    pub async fn custom_insert(
        &self,
        sql: impl Into<String>,
        params: NamedParams,
    ) -> DmResult<InsertResult> {
        let affected = self
            .execute_statement(&Statement::custom(sql, params))
            .await?;
        Ok(InsertResult::new(affected, self.last_insert_id().await?))
    }

    /// Update rows matching `filter`; returns the affected row count.
    pub async fn update(&self, table: &str, values: &Values, filter: &FilterSpec) -> DmResult<u64> {
        let statement = update_statement(table, values, filter)?;
        self.execute_statement(&statement).await
    }

    /// Delete rows matching `filter`; returns the affected row count.
    pub async fn delete(&self, table: &str, filter: &FilterSpec) -> DmResult<u64> {
        let statement = delete_statement(table, filter)?;
        self.execute_statement(&statement).await
    }

    /// Run any statement with `:name` placeholders; returns the affected row count.
    pub async fn custom_sql(&self, sql: impl Into<String>, params: NamedParams) -> DmResult<u64> {
        self.execute_statement(&Statement::custom(sql, params))
            .await
    }

    /// Last sequence value produced in this session, if any.
    ///
    /// Inside an open transaction the probe runs under a savepoint, since a failed
    /// `lastval()` would otherwise abort the transaction.
    async fn last_insert_id(&self) -> DmResult<Option<i64>> {
        if self.in_transaction {
            self.client.execute("SAVEPOINT pgdm_lastval", &[]).await?;
        }
        let probe = self.client.query("SELECT lastval()", &[]).await;
        if self.in_transaction {
            let release = if probe.is_ok() {
                "RELEASE SAVEPOINT pgdm_lastval"
            } else {
                "ROLLBACK TO SAVEPOINT pgdm_lastval"
            };
            self.client.execute(release, &[]).await?;
        }

        match probe {
            Ok(rows) => match rows.first() {
                Some(row) => row
                    .try_get(0)
                    .map_err(|e| DmError::decode("lastval", e.to_string())),
                None => Ok(None),
            },
            Err(e) if e.sqlstate() == Some(SQLSTATE_OBJECT_NOT_IN_PREREQUISITE_STATE) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ==================== Transactions ====================

    /// Whether a transaction started with [`begin_transaction`](Self::begin_transaction)
    /// is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// `BEGIN`. Fails if a transaction is already open.
    pub async fn begin_transaction(&mut self) -> DmResult<()> {
        if self.in_transaction {
            return Err(DmError::Transaction(
                "There is already an active transaction".into(),
            ));
        }
        self.client.set_transaction_open(true);
        if let Err(e) = self.transaction_command("BEGIN").await {
            self.client.set_transaction_open(false);
            return Err(e);
        }
        self.in_transaction = true;
        Ok(())
    }

    /// `COMMIT`. Fails if no transaction is open.
    pub async fn commit(&mut self) -> DmResult<()> {
        self.end_transaction("COMMIT").await
    }

    /// `ROLLBACK`. Fails if no transaction is open.
    pub async fn rollback(&mut self) -> DmResult<()> {
        self.end_transaction("ROLLBACK").await
    }

    async fn end_transaction(&mut self, command: &str) -> DmResult<()> {
        if !self.in_transaction {
            return Err(DmError::Transaction(
                "There is no active transaction".into(),
            ));
        }
        // The server ends the transaction even when COMMIT reports an error.
        self.in_transaction = false;
        let result = self.transaction_command(command).await;
        self.client.set_transaction_open(false);
        result
    }

    async fn transaction_command(&self, command: &str) -> DmResult<()> {
        log_transaction(&self.config.log, command);
        self.client.execute(command, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Join;
    use crate::statement::select;
    use std::sync::Mutex;
    use tokio_postgres::types::ToSql;

    /// Records statements and answers with no rows.
    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(String, usize)>>,
        transaction_open: Mutex<Vec<bool>>,
        affected: u64,
    }

    impl RecordingClient {
        fn affecting(affected: u64) -> Self {
            Self {
                affected,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl GenericClient for RecordingClient {
        async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DmResult<Vec<Row>> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.len()));
            Ok(Vec::new())
        }

        async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DmResult<u64> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.len()));
            Ok(self.affected)
        }

        fn set_transaction_open(&self, open: bool) {
            self.transaction_open.lock().unwrap().push(open);
        }
    }

    #[tokio::test]
    async fn select_sends_positional_sql() {
        let client = RecordingClient::default();
        let dm = DataManager::new(&client);

        let result = dm
            .select(
                &select("users")
                    .join(JoinSpec::new().join("roles", Join::inner("role_id", "id")))
                    .filter(FilterSpec::new().in_list("roles", "name", ["admin", "editor"]))
                    .limit(5),
            )
            .await
            .unwrap();

        assert_eq!(result.row_count, 0);
        assert!(result.first().is_none());
        assert_eq!(
            client.calls(),
            vec![(
                "SELECT * FROM users INNER JOIN roles ON users.role_id = roles.id \
                 WHERE roles.name IN ($1, $2) LIMIT 5;"
                    .to_string(),
                2
            )]
        );
    }

    #[tokio::test]
    async fn insert_reads_lastval_on_same_connection() {
        let client = RecordingClient::affecting(1);
        let dm = DataManager::new(&client);

        let result = dm
            .insert("users", &Values::new().set("email", "a@example.com"))
            .await
            .unwrap();

        assert!(result.raw);
        assert_eq!(result.last_insert_id, None);
        assert_eq!(
            client.calls(),
            vec![
                ("INSERT INTO users (email) VALUES ($1);".to_string(), 1),
                ("SELECT lastval()".to_string(), 0),
            ]
        );
    }

    #[tokio::test]
    async fn insert_inside_transaction_probes_under_savepoint() {
        let client = RecordingClient::affecting(1);
        let mut dm = DataManager::new(&client);

        dm.begin_transaction().await.unwrap();
        dm.insert("audit_log", &Values::new().set("action", "login"))
            .await
            .unwrap();
        dm.commit().await.unwrap();

        let commands: Vec<_> = client.calls().into_iter().map(|(sql, _)| sql).collect();
        assert_eq!(
            commands,
            vec![
                "BEGIN",
                "INSERT INTO audit_log (action) VALUES ($1);",
                "SAVEPOINT pgdm_lastval",
                "SELECT lastval()",
                "RELEASE SAVEPOINT pgdm_lastval",
                "COMMIT",
            ]
        );
    }

    #[tokio::test]
    async fn update_and_delete_return_affected_rows() {
        let client = RecordingClient::affecting(3);
        let dm = DataManager::new(&client);
        let filter = FilterSpec::new().eq("users", "team_id", 9_i64);

        let updated = dm
            .update("users", &Values::new().set("active", false), &filter)
            .await
            .unwrap();
        let deleted = dm.delete("users", &filter).await.unwrap();

        assert_eq!((updated, deleted), (3, 3));
        assert_eq!(
            client.calls()[0].0,
            "UPDATE users SET active = $1 WHERE users.team_id = $2;"
        );
        assert_eq!(
            client.calls()[1].0,
            "DELETE FROM users WHERE users.team_id = $1;"
        );
    }

    #[tokio::test]
    async fn validation_errors_never_reach_the_driver() {
        let client = RecordingClient::default();
        let dm = DataManager::new(&client);

        assert!(dm.delete("users", &FilterSpec::new()).await.is_err());
        assert!(
            dm.custom_sql("DELETE FROM users WHERE id = :id", NamedParams::new())
                .await
                .is_err()
        );
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn count_without_row_is_not_found() {
        let client = RecordingClient::default();
        let dm = DataManager::new(&client);

        let err = dm
            .count("users", "*", &FilterSpec::new(), &JoinSpec::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.calls()[0].0, "SELECT COUNT(*) FROM users;");
    }

    #[tokio::test]
    async fn custom_select_binds_named_params() {
        let client = RecordingClient::default();
        let dm = DataManager::new(&client);

        dm.custom_select(
            "SELECT * FROM users WHERE email = :email OR backup_email = :email",
            NamedParams::new().bind("email", "a@example.com"),
        )
        .await
        .unwrap();

        assert_eq!(
            client.calls(),
            vec![(
                "SELECT * FROM users WHERE email = $1 OR backup_email = $1".to_string(),
                1
            )]
        );
    }

    #[tokio::test]
    async fn transaction_state_is_tracked() {
        let client = RecordingClient::default();
        let mut dm = DataManager::new(&client);

        assert!(dm.commit().await.is_err());
        dm.begin_transaction().await.unwrap();
        assert!(dm.in_transaction());
        assert!(matches!(
            dm.begin_transaction().await,
            Err(DmError::Transaction(_))
        ));
        dm.rollback().await.unwrap();
        assert!(!dm.in_transaction());
        dm.begin_transaction().await.unwrap();
        dm.commit().await.unwrap();

        let commands: Vec<_> = client.calls().into_iter().map(|(sql, _)| sql).collect();
        assert_eq!(commands, vec!["BEGIN", "ROLLBACK", "BEGIN", "COMMIT"]);
    }

    #[tokio::test]
    async fn client_is_told_about_transaction_state() {
        let client = RecordingClient::default();
        let mut dm = DataManager::new(&client);

        dm.begin_transaction().await.unwrap();
        assert_eq!(*client.transaction_open.lock().unwrap(), vec![true]);
        dm.commit().await.unwrap();
        dm.begin_transaction().await.unwrap();
        dm.rollback().await.unwrap();
        // State errors are caught before the client hears anything.
        assert!(dm.rollback().await.is_err());

        assert_eq!(
            *client.transaction_open.lock().unwrap(),
            vec![true, false, true, false]
        );
    }
}
