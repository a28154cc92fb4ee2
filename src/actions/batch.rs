use std::sync::Arc;

use crate::driver::DriverConnection;
use crate::error::SqlBridgeError;
use crate::options::SqlOptions;
use crate::values::SqlValue;

use super::{Action, apply_statement_options, close_statement_quietly};

/// The three batch shapes the facade exposes.
pub(crate) enum BatchKind {
    /// Independent SQL statements run as one driver batch.
    Sql(Vec<String>),
    /// One parameterized statement run once per parameter row.
    Params {
        sql: String,
        rows: Vec<Vec<SqlValue>>,
    },
    /// One callable statement run once per parameter row, with per-row output
    /// parameter positions.
    Callable {
        sql: String,
        rows: Vec<Vec<SqlValue>>,
        out_positions: Vec<Vec<usize>>,
    },
}

/// Batch execution. On failure the driver's partial update counts, when
/// available, travel with the error.
pub(crate) struct Batch {
    kind: BatchKind,
    options: Arc<SqlOptions>,
}

impl Batch {
    pub(crate) fn new(kind: BatchKind, options: Arc<SqlOptions>) -> Self {
        Self { kind, options }
    }
}

impl Action for Batch {
    type Output = Vec<i64>;

    fn name(&self) -> &'static str {
        "batch"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<Vec<i64>, SqlBridgeError> {
        let mut stmt = match &self.kind {
            BatchKind::Sql(_) => conn.create_statement()?,
            BatchKind::Params { sql, .. } => conn.prepare(sql)?,
            BatchKind::Callable { sql, .. } => conn.prepare_call(sql)?,
        };
        let result = (|| {
            apply_statement_options(stmt.as_mut(), &self.options)?;
            match &self.kind {
                BatchKind::Sql(statements) => {
                    for sql in statements {
                        stmt.add_batch_sql(sql)?;
                    }
                }
                BatchKind::Params { rows, .. } => {
                    for row in rows {
                        stmt.add_batch(row)?;
                    }
                }
                BatchKind::Callable {
                    rows,
                    out_positions,
                    ..
                } => {
                    for (i, row) in rows.iter().enumerate() {
                        if let Some(positions) = out_positions.get(i) {
                            for &position in positions {
                                stmt.register_out(position)?;
                            }
                        }
                        stmt.add_batch(row)?;
                    }
                }
            }
            Ok(stmt.execute_batch()?)
        })();
        close_statement_quietly(stmt.as_mut());
        result
    }
}
