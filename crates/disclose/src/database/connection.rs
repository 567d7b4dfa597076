/*
 *  Copyright 2025-2026 Colliery Software
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

//! Database connection management for the SQLite request store.
//!
//! Provides an async connection pool using `deadpool-diesel`. The request
//! store is the single authoritative source for request state; the claim
//! guarantee is enforced by conditional updates against this store, so all
//! workers, in-process or not, must share it.
//!
//! Accepted URLs: file paths, `:memory:`, and `file:` URIs (for example
//! `file:memdb1?mode=memory&cache=shared` in tests).

use tracing::info;

use deadpool_diesel::sqlite::{Manager, Pool, Runtime};

use crate::error::StoreError;

/// A pooled SQLite database handle.
///
/// Cloning is cheap; clones share the underlying pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
    url: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("url", &self.url).finish()
    }
}

impl Database {
    /// Creates a new connection pool against the given SQLite URL.
    ///
    /// The pool is created eagerly but connections are established lazily.
    /// Call [`Database::run_migrations`] before first use.
    pub fn new(url: &str, pool_size: usize) -> Self {
        let manager = Manager::new(url, Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .expect("Failed to build SQLite connection pool");

        info!(url = %url, pool_size, "Initialized request store connection pool");

        Self {
            pool,
            url: url.to_string(),
        }
    }

    /// Gets a connection from the pool.
    pub async fn get_connection(
        &self,
    ) -> Result<deadpool::managed::Object<Manager>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))
    }

    /// Applies pending migrations and sets the SQLite pragmas the claim
    /// machinery relies on.
    ///
    /// WAL mode allows concurrent reads during writes; busy_timeout makes
    /// contending writers wait instead of failing immediately, which keeps
    /// the claim CAS loop simple.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.get_connection().await?;

        conn.interact(|conn| {
            use diesel::prelude::*;
            use diesel_migrations::MigrationHarness;

            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| StoreError::Migration(e.to_string()))?;
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| StoreError::Migration(e.to_string()))?;

            conn.run_pending_migrations(super::MIGRATIONS)
                .map_err(|e| StoreError::Migration(e.to_string()))?;

            Ok::<(), StoreError>(())
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        info!("Request store migrations applied");
        Ok(())
    }

    /// The URL this pool was created from.
    pub fn url(&self) -> &str {
        &self.url
    }
}
