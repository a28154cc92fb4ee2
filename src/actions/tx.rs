//! Transaction-control actions. These mutate connection-wide driver state and
//! rely on the serial queue for exclusion like every other action.

use crate::driver::DriverConnection;
use crate::error::SqlBridgeError;
use crate::options::TransactionIsolation;

use super::Action;

pub(crate) struct Commit;

impl Action for Commit {
    type Output = ();

    fn name(&self) -> &'static str {
        "commit"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<(), SqlBridgeError> {
        Ok(conn.commit()?)
    }
}

pub(crate) struct Rollback;

impl Action for Rollback {
    type Output = ();

    fn name(&self) -> &'static str {
        "rollback"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<(), SqlBridgeError> {
        Ok(conn.rollback()?)
    }
}

pub(crate) struct SetAutoCommit {
    auto_commit: bool,
}

impl SetAutoCommit {
    pub(crate) fn new(auto_commit: bool) -> Self {
        Self { auto_commit }
    }
}

impl Action for SetAutoCommit {
    type Output = ();

    fn name(&self) -> &'static str {
        "autocommit"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<(), SqlBridgeError> {
        Ok(conn.set_auto_commit(self.auto_commit)?)
    }
}

/// Reads the driver's raw isolation value and maps it to the known levels.
/// An unrecognized raw value is a failure, never a default.
pub(crate) struct GetTransactionIsolation;

impl Action for GetTransactionIsolation {
    type Output = TransactionIsolation;

    fn name(&self) -> &'static str {
        "isolation"
    }

    fn run(
        &mut self,
        conn: &mut dyn DriverConnection,
    ) -> Result<TransactionIsolation, SqlBridgeError> {
        let raw = conn.transaction_isolation()?;
        TransactionIsolation::from_raw(raw).ok_or(SqlBridgeError::UnknownIsolationLevel(raw))
    }
}

pub(crate) struct SetTransactionIsolation {
    isolation: TransactionIsolation,
}

impl SetTransactionIsolation {
    pub(crate) fn new(isolation: TransactionIsolation) -> Self {
        Self { isolation }
    }
}

impl Action for SetTransactionIsolation {
    type Output = ();

    fn name(&self) -> &'static str {
        "isolation"
    }

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<(), SqlBridgeError> {
        Ok(conn.set_transaction_isolation(self.isolation.raw())?)
    }
}
