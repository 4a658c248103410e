// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.

use rusqlite::params;
use unibox_core::types::{ConversationFragment, Platform};
use unibox_core::UniboxError;
use uuid::Uuid;

use crate::database::Database;
use crate::models::Conversation;

const SELECT_COLS: &str = "id, account_id, platform, platform_conversation_id,
            participant_id, participant_name, participant_avatar,
            last_message_at, unread_count, created_at";

fn from_row(row: &rusqlite::Row<'_>) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        id: row.get(0)?,
        account_id: row.get(1)?,
        platform: super::parse_text_col(2, row.get(2)?)?,
        platform_conversation_id: row.get(3)?,
        participant_id: row.get(4)?,
        participant_name: row.get(5)?,
        participant_avatar: row.get(6)?,
        last_message_at: row.get(7)?,
        unread_count: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert or update the conversation identified by
/// `(account_id, platform, platform_conversation_id)`.
///
/// Participant fields are refreshed from the fragment; `last_message_at`
/// only moves forward. Returns the stored row.
pub async fn upsert(
    db: &Database,
    account_id: &str,
    platform: Platform,
    fragment: &ConversationFragment,
    last_message_at: i64,
) -> Result<Conversation, UniboxError> {
    let account_id = account_id.to_string();
    let fragment = fragment.clone();
    db.connection()
        .call(move |conn| {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO conversations
                    (id, account_id, platform, platform_conversation_id,
                     participant_id, participant_name, participant_avatar,
                     last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(account_id, platform, platform_conversation_id)
                 DO UPDATE SET
                    participant_id = excluded.participant_id,
                    participant_name = excluded.participant_name,
                    participant_avatar = COALESCE(excluded.participant_avatar,
                                                  participant_avatar),
                    last_message_at = MAX(last_message_at, excluded.last_message_at)",
                params![
                    id,
                    account_id,
                    platform.to_string(),
                    fragment.platform_conversation_id,
                    fragment.participant_id,
                    fragment.participant_name,
                    fragment.participant_avatar,
                    last_message_at,
                ],
            )?;

            let sql = format!(
                "SELECT {SELECT_COLS} FROM conversations
                 WHERE account_id = ?1 AND platform = ?2
                   AND platform_conversation_id = ?3"
            );
            let conv = conn.query_row(
                &sql,
                params![
                    account_id,
                    platform.to_string(),
                    fragment.platform_conversation_id
                ],
                from_row,
            )?;
            Ok(conv)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a conversation by store id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Conversation>, UniboxError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {SELECT_COLS} FROM conversations WHERE id = ?1");
            match conn.query_row(&sql, params![id], from_row) {
                Ok(conv) => Ok(Some(conv)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List conversations, newest activity first. An `account_id` filter narrows
/// to one connected account.
pub async fn list(
    db: &Database,
    account_id: Option<&str>,
) -> Result<Vec<Conversation>, UniboxError> {
    let account_id = account_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let (sql, filter) = match account_id {
                Some(acct) => (
                    format!(
                        "SELECT {SELECT_COLS} FROM conversations
                         WHERE account_id = ?1
                         ORDER BY last_message_at DESC"
                    ),
                    Some(acct),
                ),
                None => (
                    format!(
                        "SELECT {SELECT_COLS} FROM conversations
                         ORDER BY last_message_at DESC"
                    ),
                    None,
                ),
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = match filter {
                Some(acct) => stmt
                    .query_map(params![acct], from_row)?
                    .collect::<Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map([], from_row)?
                    .collect::<Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Add `by` to the conversation's unread counter.
pub async fn increment_unread(
    db: &Database,
    conversation_id: &str,
    by: i64,
) -> Result<i64, UniboxError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET unread_count = unread_count + ?1
                 WHERE id = ?2",
                params![by, conversation_id],
            )?;
            let count = conn.query_row(
                "SELECT unread_count FROM conversations WHERE id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a whole conversation read: zero the unread counter and flag every
/// stored message as read, in one transaction.
///
/// Returns `false` if the conversation does not exist.
pub async fn mark_read(db: &Database, conversation_id: &str) -> Result<bool, UniboxError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE conversations SET unread_count = 0 WHERE id = ?1",
                params![conversation_id],
            )?;
            tx.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND is_read = 0",
                params![conversation_id],
            )?;
            tx.commit()?;
            Ok(updated > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
