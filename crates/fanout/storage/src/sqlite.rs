//! SQLite storage implementation.

use color_eyre::eyre::WrapErr as _;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use fanout_core::RangeBounds;

use crate::models::*;
use crate::schema::*;
use crate::traits::*;

type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

/// SQLite-based storage.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database URL.
    pub fn new(database_url: &str) -> color_eyre::eyre::Result<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .wrap_err("failed to create connection pool")?;

        Ok(Self { pool })
    }

    /// Run migrations.
    pub fn run_migrations(&self) -> color_eyre::eyre::Result<()> {
        use diesel_migrations::MigrationHarness as _;

        let mut conn = self
            .pool
            .get()
            .wrap_err("failed to get connection for migrations")?;

        let applied = conn
            .run_pending_migrations(crate::MIGRATIONS)
            .map_err(|e| color_eyre::eyre::eyre!("migration failed: {}", e))?;

        for version in &applied {
            tracing::info!(%version, "applied migration");
        }
        tracing::debug!(applied = applied.len(), "migrations up to date");

        Ok(())
    }

    fn conn(
        &self,
    ) -> color_eyre::eyre::Result<diesel::r2d2::PooledConnection<ConnectionManager<SqliteConnection>>>
    {
        self.pool
            .get()
            .wrap_err("failed to get database connection")
    }
}

impl TokenIndex for SqliteStorage {
    fn insert_token_row(&self, row: &TokenRow, overwrite: bool) -> color_eyre::eyre::Result<()> {
        let mut conn = self.conn()?;

        if overwrite {
            diesel::replace_into(token_subscriptions::table)
                .values(row)
                .execute(&mut conn)
                .wrap_err("failed to upsert token subscription")?;
        } else {
            diesel::insert_into(token_subscriptions::table)
                .values(row)
                .execute(&mut conn)
                .wrap_err("failed to insert token subscription")?;
        }

        Ok(())
    }

    fn token_rows(&self, normalized_token: &str) -> color_eyre::eyre::Result<Vec<TokenRow>> {
        let mut conn = self.conn()?;

        token_subscriptions::table
            .filter(token_subscriptions::partition_key.eq(normalized_token))
            .order(token_subscriptions::row_key.asc())
            .select(TokenRow::as_select())
            .load(&mut conn)
            .wrap_err("failed to query token subscriptions")
    }

    fn delete_token_row(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> color_eyre::eyre::Result<DeleteOutcome> {
        let mut conn = self.conn()?;

        let count = diesel::delete(token_subscriptions::table.find((partition_key, row_key)))
            .execute(&mut conn)
            .wrap_err("failed to delete token subscription")?;

        Ok(DeleteOutcome::from_count(count))
    }
}

impl UserIndex for SqliteStorage {
    fn insert_user_row(&self, row: &UserRow, overwrite: bool) -> color_eyre::eyre::Result<()> {
        let mut conn = self.conn()?;

        if overwrite {
            diesel::replace_into(user_subscriptions::table)
                .values(row)
                .execute(&mut conn)
                .wrap_err("failed to upsert user subscription")?;
        } else {
            diesel::insert_into(user_subscriptions::table)
                .values(row)
                .execute(&mut conn)
                .wrap_err("failed to insert user subscription")?;
        }

        Ok(())
    }

    fn user_rows(&self, bucket_key: &str) -> color_eyre::eyre::Result<Vec<UserRow>> {
        let mut conn = self.conn()?;

        user_subscriptions::table
            .filter(user_subscriptions::partition_key.eq(bucket_key))
            .order(user_subscriptions::row_key.asc())
            .select(UserRow::as_select())
            .load(&mut conn)
            .wrap_err("failed to query user subscriptions")
    }

    fn user_rows_in_range(&self, bounds: &RangeBounds) -> color_eyre::eyre::Result<Vec<UserRow>> {
        let mut conn = self.conn()?;

        // TEXT comparison uses the BINARY collation, i.e. byte order, which
        // matches `str` ordering.
        user_subscriptions::table
            .filter(user_subscriptions::partition_key.gt(&bounds.low))
            .filter(user_subscriptions::partition_key.lt(&bounds.high))
            .order((
                user_subscriptions::partition_key.asc(),
                user_subscriptions::row_key.asc(),
            ))
            .select(UserRow::as_select())
            .load(&mut conn)
            .wrap_err("failed to scan user subscriptions")
    }

    fn delete_user_row(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> color_eyre::eyre::Result<DeleteOutcome> {
        let mut conn = self.conn()?;

        let count = diesel::delete(user_subscriptions::table.find((partition_key, row_key)))
            .execute(&mut conn)
            .wrap_err("failed to delete user subscription")?;

        Ok(DeleteOutcome::from_count(count))
    }
}
