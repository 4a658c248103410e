// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry queue operations for crash-safe ingestion replay.
//!
//! Jobs move `waiting -> active -> completed | waiting | failed`. The claim
//! is transactional: a claimed job is marked active and its attempt counter
//! bumped in the same transaction, so a crash between claim and processing
//! leaves the attempt accounted for.

use rusqlite::params;
use unibox_core::types::{Platform, RetryJobState};
use unibox_core::UniboxError;

use crate::database::Database;
use crate::models::{RetryJob, RetryJobCounts};

const SELECT_COLS: &str = "id, platform, account_id, message_data, original_payload,
            attempts, max_attempts, state, first_attempt_at, next_run_at,
            created_at, updated_at";

fn from_row(row: &rusqlite::Row<'_>) -> Result<RetryJob, rusqlite::Error> {
    Ok(RetryJob {
        id: row.get(0)?,
        platform: super::parse_text_col(1, row.get(1)?)?,
        account_id: row.get(2)?,
        message_data: row.get(3)?,
        original_payload: row.get(4)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        state: super::parse_text_col(7, row.get(7)?)?,
        first_attempt_at: row.get(8)?,
        next_run_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Enqueue a new retry job in the `waiting` state. Returns the job id.
pub async fn enqueue(
    db: &Database,
    platform: Platform,
    account_id: &str,
    message_data: &str,
    original_payload: &str,
    max_attempts: i64,
    next_run_at: i64,
) -> Result<i64, UniboxError> {
    let account_id = account_id.to_string();
    let message_data = message_data.to_string();
    let original_payload = original_payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO retry_jobs
                    (platform, account_id, message_data, original_payload,
                     max_attempts, next_run_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    platform.to_string(),
                    account_id,
                    message_data,
                    original_payload,
                    max_attempts,
                    next_run_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claim up to `limit` due jobs, oldest due first.
///
/// Each claimed job atomically becomes `active` with `attempts + 1` and a
/// recorded first-attempt timestamp. Jobs whose `next_run_at` is still in
/// the future are never returned.
pub async fn claim_due(
    db: &Database,
    now_ms: i64,
    limit: i64,
) -> Result<Vec<RetryJob>, UniboxError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let ids: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM retry_jobs
                     WHERE state = 'waiting' AND next_run_at <= ?1
                     ORDER BY next_run_at ASC, id ASC
                     LIMIT ?2",
                )?;
                stmt.query_map(params![now_ms, limit], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?
            };

            let mut claimed = Vec::with_capacity(ids.len());
            for id in ids {
                tx.execute(
                    "UPDATE retry_jobs SET
                        state = 'active',
                        attempts = attempts + 1,
                        first_attempt_at = COALESCE(first_attempt_at,
                            strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id],
                )?;
                let sql = format!("SELECT {SELECT_COLS} FROM retry_jobs WHERE id = ?1");
                claimed.push(tx.query_row(&sql, params![id], from_row)?);
            }

            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark an active job as completed.
pub async fn complete(db: &Database, id: i64) -> Result<(), UniboxError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE retry_jobs SET state = 'completed',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed attempt for an active job.
///
/// If attempts remain, the job returns to `waiting` with `next_run_at` set
/// to the caller-computed backoff deadline. Once attempts reach the maximum
/// the job becomes `failed` and is only revived by [`rearm`]. Returns the
/// resulting state.
pub async fn fail(
    db: &Database,
    id: i64,
    next_run_at: i64,
) -> Result<RetryJobState, UniboxError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM retry_jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            if attempts >= max_attempts {
                conn.execute(
                    "UPDATE retry_jobs SET state = 'failed',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id],
                )?;
                Ok(RetryJobState::Failed)
            } else {
                conn.execute(
                    "UPDATE retry_jobs SET state = 'waiting', next_run_at = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?2",
                    params![next_run_at, id],
                )?;
                Ok(RetryJobState::Waiting)
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a job `failed` regardless of remaining attempts.
///
/// Used when a replay fails permanently (validation or expired credentials);
/// burning the remaining attempts on it would never succeed.
pub async fn abandon(db: &Database, id: i64) -> Result<(), UniboxError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE retry_jobs SET state = 'failed',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Manually revive a failed job: back to `waiting` with a zeroed attempt
/// counter and immediate eligibility.
///
/// Only applies to jobs in the `failed` state; returns `false` otherwise.
pub async fn rearm(db: &Database, id: i64) -> Result<bool, UniboxError> {
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE retry_jobs SET state = 'waiting', attempts = 0,
                 first_attempt_at = NULL, next_run_at = 0,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND state = 'failed'",
                params![id],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a single job by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<RetryJob>, UniboxError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {SELECT_COLS} FROM retry_jobs WHERE id = ?1");
            match conn.query_row(&sql, params![id], from_row) {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List jobs in a given state, most recently updated first.
pub async fn list_by_state(
    db: &Database,
    state: RetryJobState,
    limit: i64,
) -> Result<Vec<RetryJob>, UniboxError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLS} FROM retry_jobs
                 WHERE state = ?1
                 ORDER BY updated_at DESC, id DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![state.to_string(), limit], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Per-state job counts.
pub async fn counts(db: &Database) -> Result<RetryJobCounts, UniboxError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT state, COUNT(*) FROM retry_jobs GROUP BY state")?;
            let mut counts = RetryJobCounts::default();
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (state, n) = row?;
                match state.as_str() {
                    "waiting" => counts.waiting = n,
                    "active" => counts.active = n,
                    "completed" => counts.completed = n,
                    "failed" => counts.failed = n,
                    _ => {}
                }
            }
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Failed-job counts grouped by platform, for operator diagnostics.
pub async fn failed_by_platform(db: &Database) -> Result<Vec<(Platform, i64)>, UniboxError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT platform, COUNT(*) FROM retry_jobs
                 WHERE state = 'failed'
                 GROUP BY platform ORDER BY platform",
            )?;
            let rows = stmt.query_map([], |row| {
                let platform = super::parse_text_col(0, row.get(0)?)?;
                Ok((platform, row.get::<_, i64>(1)?))
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete completed and failed jobs not touched within `retention_hours`.
/// Returns the number of rows removed.
pub async fn purge_finished(db: &Database, retention_hours: i64) -> Result<usize, UniboxError> {
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM retry_jobs
                 WHERE state IN ('completed', 'failed')
                   AND updated_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now',
                                             '-' || ?1 || ' hours')",
                params![retention_hours],
            )?;
            Ok(deleted)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    async fn enqueue_one(db: &Database) -> i64 {
        enqueue(db, Platform::Instagram, "acct-1", r#"{"k":1}"#, r#"{"raw":1}"#, 3, 0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn claim_marks_active_and_counts_the_attempt() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_one(&db).await;

        let claimed = claim_due(&db, 1_000, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, id);
        assert_eq!(claimed[0].state, RetryJobState::Active);
        assert_eq!(claimed[0].attempts, 1);
        assert!(claimed[0].first_attempt_at.is_some());

        // An active job is not claimable again.
        let again = claim_due(&db, 1_000, 10).await.unwrap();
        assert!(again.is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn future_jobs_are_not_claimed() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, Platform::Twitter, "acct-1", "{}", "{}", 3, 5_000)
            .await
            .unwrap();

        assert!(claim_due(&db, 4_999, 10).await.unwrap().is_empty());
        assert_eq!(claim_due(&db, 5_000, 10).await.unwrap().len(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_backs_off_then_exhausts() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_one(&db).await;

        // Attempts 1 and 2 go back to waiting with a deadline.
        for expected_attempts in 1..3 {
            let claimed = claim_due(&db, i64::MAX, 10).await.unwrap();
            assert_eq!(claimed[0].attempts, expected_attempts);
            let state = fail(&db, id, 99_000).await.unwrap();
            assert_eq!(state, RetryJobState::Waiting);
        }

        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.next_run_at, 99_000);

        // Third failed attempt exhausts the job.
        let claimed = claim_due(&db, i64::MAX, 10).await.unwrap();
        assert_eq!(claimed[0].attempts, 3);
        let state = fail(&db, id, 99_000).await.unwrap();
        assert_eq!(state, RetryJobState::Failed);

        assert!(claim_due(&db, i64::MAX, 10).await.unwrap().is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn complete_finishes_the_job() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_one(&db).await;

        claim_due(&db, i64::MAX, 10).await.unwrap();
        complete(&db, id).await.unwrap();

        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Completed);

        let counts = counts(&db).await.unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.waiting, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn rearm_revives_only_failed_jobs() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_one(&db).await;

        // Not failed yet.
        assert!(!rearm(&db, id).await.unwrap());

        for _ in 0..3 {
            claim_due(&db, i64::MAX, 10).await.unwrap();
            fail(&db, id, 0).await.unwrap();
        }
        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Failed);

        assert!(rearm(&db, id).await.unwrap());
        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Waiting);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.next_run_at, 0);
        assert!(job.first_attempt_at.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn abandon_fails_immediately_with_attempts_left() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_one(&db).await;

        claim_due(&db, i64::MAX, 10).await.unwrap();
        abandon(&db, id).await.unwrap();

        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Failed);
        assert_eq!(job.attempts, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claim_orders_by_due_time() {
        let (db, _dir) = setup_db().await;
        let late = enqueue(&db, Platform::Twitter, "a", "{}", "{}", 3, 200)
            .await
            .unwrap();
        let early = enqueue(&db, Platform::Twitter, "a", "{}", "{}", 3, 100)
            .await
            .unwrap();

        let claimed = claim_due(&db, 1_000, 10).await.unwrap();
        assert_eq!(claimed[0].id, early);
        assert_eq!(claimed[1].id, late);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_by_platform_groups_counts() {
        let (db, _dir) = setup_db().await;
        for platform in [Platform::Instagram, Platform::Instagram, Platform::Twitter] {
            let id = enqueue(&db, platform, "a", "{}", "{}", 1, 0).await.unwrap();
            claim_due(&db, i64::MAX, 10).await.unwrap();
            fail(&db, id, 0).await.unwrap();
        }

        let stats = failed_by_platform(&db).await.unwrap();
        assert_eq!(stats, vec![(Platform::Instagram, 2), (Platform::Twitter, 1)]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn purge_keeps_recent_jobs() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_one(&db).await;
        claim_due(&db, i64::MAX, 10).await.unwrap();
        complete(&db, id).await.unwrap();

        // Freshly updated, inside any sane retention window.
        let deleted = purge_finished(&db, 24).await.unwrap();
        assert_eq!(deleted, 0);

        // Zero retention deletes everything finished.
        let deleted = purge_finished(&db, 0).await.unwrap();
        assert_eq!(deleted, 1);

        db.close().await.unwrap();
    }
}
