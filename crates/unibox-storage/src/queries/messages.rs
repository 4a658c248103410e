// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.
//!
//! Messages are deduplicated on `(conversation_id, platform_message_id)`:
//! re-ingesting a payload refreshes mutable fields on the existing row
//! instead of creating a duplicate.

use rusqlite::params;
use unibox_core::types::MessageFragment;
use unibox_core::UniboxError;
use uuid::Uuid;

use crate::database::Database;
use crate::models::Message;

const SELECT_COLS: &str = "id, conversation_id, platform_message_id, sender_id,
            sender_name, content, message_type, media_url, is_outgoing,
            is_read, sent_at, delivered_at, created_at";

fn from_row(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        platform_message_id: row.get(2)?,
        sender_id: row.get(3)?,
        sender_name: row.get(4)?,
        content: row.get(5)?,
        message_type: super::parse_text_col(6, row.get(6)?)?,
        media_url: row.get(7)?,
        is_outgoing: row.get(8)?,
        is_read: row.get(9)?,
        sent_at: row.get(10)?,
        delivered_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Insert a message, or refresh the existing row with the same platform id.
///
/// Returns the stored row plus whether it was newly created. The read flag
/// is never reset by a re-ingest.
pub async fn upsert(
    db: &Database,
    conversation_id: &str,
    fragment: &MessageFragment,
) -> Result<(Message, bool), UniboxError> {
    let conversation_id = conversation_id.to_string();
    let fragment = fragment.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM messages
                     WHERE conversation_id = ?1 AND platform_message_id = ?2",
                )?;
                match stmt.query_row(
                    params![conversation_id, fragment.platform_message_id],
                    |row| row.get(0),
                ) {
                    Ok(id) => Some(id),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };

            let was_new = existing.is_none();
            let id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE messages SET
                            content = ?1,
                            message_type = ?2,
                            media_url = COALESCE(?3, media_url),
                            delivered_at = COALESCE(?4, delivered_at)
                         WHERE id = ?5",
                        params![
                            fragment.content,
                            fragment.message_type.to_string(),
                            fragment.media_url,
                            fragment.delivered_at,
                            id,
                        ],
                    )?;
                    id
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO messages
                            (id, conversation_id, platform_message_id, sender_id,
                             sender_name, content, message_type, media_url,
                             is_outgoing, is_read, sent_at, delivered_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                        params![
                            id,
                            conversation_id,
                            fragment.platform_message_id,
                            fragment.sender_id,
                            fragment.sender_name,
                            fragment.content,
                            fragment.message_type.to_string(),
                            fragment.media_url,
                            fragment.is_outgoing,
                            // Outgoing messages are read by definition.
                            fragment.is_outgoing,
                            fragment.sent_at,
                            fragment.delivered_at,
                        ],
                    )?;
                    id
                }
            };

            let sql = format!("SELECT {SELECT_COLS} FROM messages WHERE id = ?1");
            let message = tx.query_row(&sql, params![id], from_row)?;
            tx.commit()?;
            Ok((message, was_new))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List messages in a conversation, newest first.
///
/// `before_sent_at` pages backwards through history: only messages strictly
/// older than the cursor are returned.
pub async fn list(
    db: &Database,
    conversation_id: &str,
    limit: i64,
    before_sent_at: Option<i64>,
) -> Result<Vec<Message>, UniboxError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let cursor = before_sent_at.unwrap_or(i64::MAX);
            let sql = format!(
                "SELECT {SELECT_COLS} FROM messages
                 WHERE conversation_id = ?1 AND sent_at < ?2
                 ORDER BY sent_at DESC, platform_message_id DESC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![conversation_id, cursor, limit], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List the unread messages of a conversation, oldest first.
pub async fn list_unread(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, UniboxError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLS} FROM messages
                 WHERE conversation_id = ?1 AND is_read = 0
                 ORDER BY sent_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![conversation_id], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use unibox_core::types::{ConversationFragment, MessageType, Platform};

    use crate::queries::conversations;
    use tempfile::tempdir;

    async fn setup() -> (Database, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let conv = conversations::upsert(
            &db,
            "acct-1",
            Platform::Twitter,
            &ConversationFragment {
                platform_conversation_id: "c-1".to_string(),
                participant_id: "u-2".to_string(),
                participant_name: "Ada".to_string(),
                participant_avatar: None,
            },
            0,
        )
        .await
        .unwrap();
        (db, conv.id, dir)
    }

    fn fragment(platform_id: &str, content: &str, sent_at: i64) -> MessageFragment {
        MessageFragment {
            platform_message_id: platform_id.to_string(),
            sender_id: "u-2".to_string(),
            sender_name: "Ada".to_string(),
            content: content.to_string(),
            message_type: MessageType::Text,
            media_url: None,
            is_outgoing: false,
            sent_at,
            delivered_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_platform_id() {
        let (db, conv_id, _dir) = setup().await;

        let (first, was_new) = upsert(&db, &conv_id, &fragment("m-1", "hello", 100))
            .await
            .unwrap();
        assert!(was_new);

        let (second, was_new) = upsert(&db, &conv_id, &fragment("m-1", "hello (edited)", 100))
            .await
            .unwrap();
        assert!(!was_new);
        assert_eq!(second.id, first.id);
        assert_eq!(second.content, "hello (edited)");

        let all = list(&db, &conv_id, 50, None).await.unwrap();
        assert_eq!(all.len(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reingest_does_not_unread_a_read_message() {
        let (db, conv_id, _dir) = setup().await;

        upsert(&db, &conv_id, &fragment("m-1", "hello", 100))
            .await
            .unwrap();
        conversations::mark_read(&db, &conv_id).await.unwrap();

        let (msg, _) = upsert(&db, &conv_id, &fragment("m-1", "hello", 100))
            .await
            .unwrap();
        assert!(msg.is_read);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn outgoing_messages_start_read() {
        let (db, conv_id, _dir) = setup().await;

        let mut out = fragment("m-out", "hi back", 200);
        out.is_outgoing = true;
        let (msg, _) = upsert(&db, &conv_id, &out).await.unwrap();
        assert!(msg.is_read);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_unread_excludes_read_and_outgoing() {
        let (db, conv_id, _dir) = setup().await;

        upsert(&db, &conv_id, &fragment("m-1", "a", 100)).await.unwrap();
        upsert(&db, &conv_id, &fragment("m-2", "b", 200)).await.unwrap();
        let mut out = fragment("m-3", "c", 300);
        out.is_outgoing = true;
        upsert(&db, &conv_id, &out).await.unwrap();

        let unread = list_unread(&db, &conv_id).await.unwrap();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].platform_message_id, "m-1");

        conversations::mark_read(&db, &conv_id).await.unwrap();
        assert!(list_unread(&db, &conv_id).await.unwrap().is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let (db, conv_id, _dir) = setup().await;

        for i in 0..5 {
            upsert(&db, &conv_id, &fragment(&format!("m-{i}"), "x", 100 + i))
                .await
                .unwrap();
        }

        let page = list(&db, &conv_id, 2, None).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sent_at, 104);
        assert_eq!(page[1].sent_at, 103);

        let older = list(&db, &conv_id, 2, Some(page[1].sent_at)).await.unwrap();
        assert_eq!(older[0].sent_at, 102);
        assert_eq!(older[1].sent_at, 101);

        db.close().await.unwrap();
    }
}
