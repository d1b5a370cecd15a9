//! User repository.

use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::{User, user};

/// Repository for user lookups.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find users by IDs in one query.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        Self::find_by_ids_in(self.db.as_ref(), ids).await
    }

    /// Find users by IDs on the given connection.
    pub async fn find_by_ids_in<C: ConnectionTrait>(
        conn: &C,
        ids: &[String],
    ) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        User::find()
            .filter(user::Column::Id.is_in(ids.iter().cloned()))
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
