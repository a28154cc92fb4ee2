use std::sync::Arc;

use crate::driver::DriverConnection;
use crate::error::SqlBridgeError;
use crate::options::SqlOptions;
use crate::values::{RowSet, SqlValue};

use super::{
    Action, apply_statement_options, build_row_set, close_rows_quietly, close_statement_quietly,
};

/// Stored-procedure call. Registered output parameters are collected after
/// execution and returned on the result set's `out_params`.
pub(crate) struct Callable {
    sql: String,
    params: Vec<SqlValue>,
    out_positions: Vec<usize>,
    options: Arc<SqlOptions>,
}

impl Callable {
    pub(crate) fn new(
        sql: String,
        params: Vec<SqlValue>,
        out_positions: Vec<usize>,
        options: Arc<SqlOptions>,
    ) -> Self {
        Self {
            sql,
            params,
            out_positions,
            options,
        }
    }
}

impl Action for Callable {
    type Output = RowSet;

    fn name(&self) -> &'static str {
        "call"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<RowSet, SqlBridgeError> {
        let mut stmt = conn.prepare_call(&self.sql)?;
        let result = (|| {
            apply_statement_options(stmt.as_mut(), &self.options)?;
            stmt.bind(&self.params)?;
            for &position in &self.out_positions {
                stmt.register_out(position)?;
            }
            let mut row_set = match stmt.execute()? {
                Some(mut rows) => {
                    let built = build_row_set(rows.as_mut());
                    close_rows_quietly(rows.as_mut());
                    built?
                }
                None => RowSet::default(),
            };
            if !self.out_positions.is_empty() {
                row_set.out_params = stmt.take_out_params()?;
            }
            Ok(row_set)
        })();
        close_statement_quietly(stmt.as_mut());
        result
    }
}
