//! Repository for the append-only `messages` table.

use courier_core::results::ResultEntry;
use courier_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::conversation::Message;

const COLUMNS: &str = "id, conversation_id, role, content, result_key, created_at";

pub struct MessageRepo;

impl MessageRepo {
    /// Append one message.
    ///
    /// Returns `None` when `entry.result_key` has already been stored for
    /// this conversation. Entries without a key always insert.
    pub async fn insert(
        conn: &mut PgConnection,
        conversation_id: DbId,
        entry: &ResultEntry,
    ) -> Result<Option<Message>, sqlx::Error> {
        let query = format!(
            "INSERT INTO messages (conversation_id, role, content, result_key) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (conversation_id, result_key) WHERE result_key IS NOT NULL \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Message>(&query)
            .bind(conversation_id)
            .bind(entry.role)
            .bind(&entry.content)
            .bind(entry.result_key.as_deref())
            .fetch_optional(conn)
            .await
    }

    /// All messages of a conversation in creation order.
    pub async fn list_for_conversation(
        pool: &PgPool,
        conversation_id: DbId,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM messages WHERE conversation_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, Message>(&query)
            .bind(conversation_id)
            .fetch_all(pool)
            .await
    }
}
