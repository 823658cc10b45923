//! `tracing` output for executed statements.

use crate::config::LogConfig;
use crate::statement::StatementKind;
use tracing::Level;

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// Emit the SQL about to be sent to the driver (positional form).
pub(crate) fn log_statement(config: &LogConfig, kind: StatementKind, sql: &str, param_count: usize) {
    let sql = truncate_sql(sql, config.max_sql_length);
    emit_at_level!(
        config.level,
        target: "pgdm.sql",
        kind = %kind,
        param_count,
        sql = %sql,
    );
}

/// Emit a transaction control statement.
pub(crate) fn log_transaction(config: &LogConfig, command: &str) {
    emit_at_level!(config.level, target: "pgdm", command, "transaction control");
}

fn truncate_sql(sql: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while !sql.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &sql[..end])
        }
        _ => sql.to_string(),
    }
}
