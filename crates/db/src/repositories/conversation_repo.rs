//! Read access to the serving tier's `conversations` table.

use courier_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::conversation::Conversation;

const COLUMNS: &str = "id, title, status, created_at, updated_at";

pub struct ConversationRepo;

impl ConversationRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Conversation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM conversations WHERE id = $1");
        sqlx::query_as::<_, Conversation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Bump `updated_at` after new messages were appended.
    pub async fn touch(conn: &mut PgConnection, id: DbId) -> Result<Conversation, sqlx::Error> {
        let query = format!(
            "UPDATE conversations SET updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Conversation>(&query)
            .bind(id)
            .fetch_one(conn)
            .await
    }
}
