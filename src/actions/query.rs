use std::sync::Arc;

use crate::driver::DriverConnection;
use crate::error::SqlBridgeError;
use crate::options::SqlOptions;
use crate::values::{RowSet, SqlValue};

use super::{Action, close_statement_quietly, run_materialized_query};

/// SELECT-shaped statement whose result set is materialized in full.
/// Covers both the plain and the parameterized facade calls.
pub(crate) struct Query {
    sql: String,
    params: Vec<SqlValue>,
    options: Arc<SqlOptions>,
}

impl Query {
    pub(crate) fn new(sql: String, params: Vec<SqlValue>, options: Arc<SqlOptions>) -> Self {
        Self {
            sql,
            params,
            options,
        }
    }
}

impl Action for Query {
    type Output = RowSet;

    fn name(&self) -> &'static str {
        "query"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<RowSet, SqlBridgeError> {
        let mut stmt = conn.prepare(&self.sql)?;
        let result = run_materialized_query(stmt.as_mut(), &self.params, &self.options);
        close_statement_quietly(stmt.as_mut());
        result
    }
}
