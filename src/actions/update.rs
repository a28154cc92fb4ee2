use std::sync::Arc;

use crate::driver::DriverConnection;
use crate::error::SqlBridgeError;
use crate::options::SqlOptions;
use crate::values::SqlValue;

use super::{Action, apply_statement_options, close_rows_quietly, close_statement_quietly};

/// DML statement returning an affected-row count.
pub(crate) struct Update {
    sql: String,
    params: Vec<SqlValue>,
    options: Arc<SqlOptions>,
}

impl Update {
    pub(crate) fn new(sql: String, params: Vec<SqlValue>, options: Arc<SqlOptions>) -> Self {
        Self {
            sql,
            params,
            options,
        }
    }
}

impl Action for Update {
    type Output = u64;

    fn name(&self) -> &'static str {
        "update"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<u64, SqlBridgeError> {
        let mut stmt = conn.prepare(&self.sql)?;
        let result = (|| {
            apply_statement_options(stmt.as_mut(), &self.options)?;
            stmt.bind(&self.params)?;
            Ok(stmt.execute_update()?)
        })();
        close_statement_quietly(stmt.as_mut());
        result
    }
}

/// DDL or other statement executed for its side effect only. Any result set
/// the driver happens to return is discarded.
pub(crate) struct Execute {
    sql: String,
    options: Arc<SqlOptions>,
}

impl Execute {
    pub(crate) fn new(sql: String, options: Arc<SqlOptions>) -> Self {
        Self { sql, options }
    }
}

impl Action for Execute {
    type Output = ();

    fn name(&self) -> &'static str {
        "execute"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<(), SqlBridgeError> {
        let mut stmt = conn.prepare(&self.sql)?;
        let result = (|| {
            apply_statement_options(stmt.as_mut(), &self.options)?;
            if let Some(mut rows) = stmt.execute()? {
                close_rows_quietly(rows.as_mut());
            }
            Ok(())
        })();
        close_statement_quietly(stmt.as_mut());
        result
    }
}
