/*
 *  Copyright 2025 Taskline Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Data Access Layer for the PostgreSQL store.
//!
//! Every operation re-reads and re-writes through the connection pool; no
//! entity is cached across requests. Concurrency correctness (the
//! one-active-rerun-per-task invariant, payment idempotency) is delegated to
//! database constraints evaluated atomically with their inserts.

use crate::database::Database;

pub mod payment_event;
pub mod rerun_queue;
pub mod tasks;
pub mod users;

pub use payment_event::{PaymentEventDAL, ReconcileOutcome};
pub use rerun_queue::{Admitted, RerunFilter, RerunQueueDAL};
pub use tasks::TaskDAL;
pub use users::UserDAL;

/// The root Data Access Layer struct.
///
/// Hands out per-entity DALs sharing one connection pool.
///
/// # Thread Safety
///
/// The `DAL` struct is `Clone` and can be safely shared between threads.
/// Each clone references the same underlying database connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns a user DAL for LINE user operations.
    pub fn users(&self) -> UserDAL {
        UserDAL::new(self)
    }

    /// Returns a task DAL for task operations.
    pub fn tasks(&self) -> TaskDAL {
        TaskDAL::new(self)
    }

    /// Returns a rerun queue DAL for admission, cancel, delete and list.
    pub fn rerun_queue(&self) -> RerunQueueDAL {
        RerunQueueDAL::new(self)
    }

    /// Returns a payment event DAL for the idempotency ledger and the
    /// entitlement reconciliation transaction.
    pub fn payment_events(&self) -> PaymentEventDAL {
        PaymentEventDAL::new(self)
    }
}
