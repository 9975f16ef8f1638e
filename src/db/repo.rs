//! Dedup ledger queries.
//!
//! Table and column names come from the closed `ContentClass` and
//! `Destination` enums, so the `format!` interpolation below can never see
//! user input; ids are always bound.

use crate::model::{ContentClass, Destination};
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::instrument;

/// Atomic check-and-register gate.
///
/// If no record exists for (class, id), creates one with every destination
/// flag false and reports "not synced". If a record exists, reports that
/// destination's flag. The conditional insert relies on the table's primary
/// key, so concurrent callers — including other processes sharing the same
/// database file — cannot create duplicate records.
#[instrument(skip(pool))]
pub async fn check_and_register(
    pool: &SqlitePool,
    class: ContentClass,
    dest: Destination,
    id: &str,
) -> Result<bool> {
    let insert = format!(
        "INSERT INTO {} (id) VALUES (?) ON CONFLICT(id) DO NOTHING",
        class.table()
    );
    let inserted = sqlx::query(&insert)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("ledger insert failed for {} id {}", class.table(), id))?
        .rows_affected();

    if inserted == 1 {
        // Fresh record: by definition nothing has been synced yet.
        return Ok(false);
    }

    let select = format!(
        "SELECT {} FROM {} WHERE id = ?",
        dest.synced_column(),
        class.table()
    );
    let synced: bool = sqlx::query_scalar(&select)
        .bind(id)
        .fetch_one(pool)
        .await
        .with_context(|| format!("ledger read failed for {} id {}", class.table(), id))?;
    Ok(synced)
}

/// Mark an existing record as delivered to `dest`. Idempotent: repeating the
/// call leaves the flag true.
#[instrument(skip(pool))]
pub async fn mark_synced(
    pool: &SqlitePool,
    class: ContentClass,
    dest: Destination,
    id: &str,
) -> Result<()> {
    let update = format!(
        "UPDATE {} SET {} = 1 WHERE id = ?",
        class.table(),
        dest.synced_column()
    );
    sqlx::query(&update)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("ledger update failed for {} id {}", class.table(), id))?;
    Ok(())
}
