use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::driver::DriverConnection;
use crate::error::SqlBridgeError;
use crate::options::SqlOptions;
use crate::queue::TaskQueue;
use crate::stream::{DEFAULT_STREAM_FETCH_SIZE, RowStream};
use crate::values::SqlValue;

use super::{Action, apply_statement_options, close_statement_quietly};

// Stored-procedure call syntax, with an optional leading `=` for an output
// parameter marker, e.g. `{ call proc(?) }` or `{ ?= call proc(?) }`.
static CALL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)=?\s*call\s+").expect("call pattern"));

/// Opens a live cursor instead of materializing the result set. The returned
/// [`RowStream`] re-enters the same serial queue for every fetch and close.
pub(crate) struct StreamQuery {
    sql: String,
    params: Vec<SqlValue>,
    options: Arc<SqlOptions>,
    queue: TaskQueue,
}

impl StreamQuery {
    pub(crate) fn new(
        sql: String,
        params: Vec<SqlValue>,
        options: Arc<SqlOptions>,
        queue: TaskQueue,
    ) -> Self {
        Self {
            sql,
            params,
            options,
            queue,
        }
    }
}

impl Action for StreamQuery {
    type Output = RowStream;

    fn name(&self) -> &'static str {
        "stream"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<RowStream, SqlBridgeError> {
        let mut stmt = if CALL_PATTERN.is_match(&self.sql) {
            conn.prepare_call(&self.sql)?
        } else {
            conn.prepare(&self.sql)?
        };

        let fetch_size = if self.options.get_fetch_size() > 0 {
            self.options.get_fetch_size() as usize
        } else {
            DEFAULT_STREAM_FETCH_SIZE
        };

        let opened = (|| {
            apply_statement_options(stmt.as_mut(), &self.options)?;
            // Align driver prefetch with the consumer's batch pacing.
            stmt.set_fetch_size(fetch_size as i32)?;
            stmt.bind(&self.params)?;
            Ok(stmt.execute()?)
        })();

        match opened {
            // A statement that produced no result set (e.g. only an update
            // count) yields a stream that starts exhausted.
            Ok(rows) => Ok(RowStream::new(stmt, rows, fetch_size, self.queue.clone())),
            Err(err) => {
                close_statement_quietly(stmt.as_mut());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_pattern_matches_procedure_syntax() {
        assert!(CALL_PATTERN.is_match("{ call list_users(?) }"));
        assert!(CALL_PATTERN.is_match("{ CALL LIST_USERS(?) }"));
        assert!(CALL_PATTERN.is_match("{ ?= call next_id() }"));
        assert!(!CALL_PATTERN.is_match("SELECT * FROM calls"));
        assert!(!CALL_PATTERN.is_match("UPDATE callers SET n = 1"));
    }
}
