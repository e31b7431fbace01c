// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable platform job registrations.
//!
//! The job table is the only scheduling state shared between the process
//! that registers work and the daemon that launches it. Timestamps are Unix
//! seconds.

use rusqlite::{OptionalExtension, Row, params};
use strum::{Display, EnumString};
use vaultline_core::{JobConstraints, VaultlineError};

use crate::database::{Database, map_tr_err};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    Periodic,
    OneOff,
}

/// One row of `scheduled_jobs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub task: String,
    pub kind: JobKind,
    pub interval_secs: Option<i64>,
    pub constraints: JobConstraints,
    pub registered_at: i64,
    pub last_run_at: Option<i64>,
}

impl ScheduledJob {
    /// Earliest time the job may be launched.
    ///
    /// One-off jobs are due as soon as they are registered. Periodic jobs are
    /// due one interval after their last launch, or after registration if
    /// they have never run.
    pub fn due_at(&self) -> i64 {
        match (self.kind, self.interval_secs) {
            (JobKind::Periodic, Some(interval)) => {
                self.last_run_at.unwrap_or(self.registered_at) + interval
            }
            _ => self.registered_at,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let kind: String = row.get(1)?;
        let kind = kind.parse::<JobKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            task: row.get(0)?,
            kind,
            interval_secs: row.get(2)?,
            constraints: JobConstraints {
                require_unmetered: row.get(3)?,
                require_charging: row.get(4)?,
            },
            registered_at: row.get(5)?,
            last_run_at: row.get(6)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT task, kind, interval_secs, require_unmetered, require_charging,
        registered_at, last_run_at FROM scheduled_jobs";

/// Inserts or replaces the registration for `job.task`.
pub async fn upsert_job(db: &Database, job: &ScheduledJob) -> Result<(), VaultlineError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scheduled_jobs
                    (task, kind, interval_secs, require_unmetered, require_charging,
                     registered_at, last_run_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (task) DO UPDATE SET
                    kind = excluded.kind,
                    interval_secs = excluded.interval_secs,
                    require_unmetered = excluded.require_unmetered,
                    require_charging = excluded.require_charging,
                    registered_at = excluded.registered_at,
                    last_run_at = excluded.last_run_at",
                params![
                    job.task,
                    job.kind.to_string(),
                    job.interval_secs,
                    job.constraints.require_unmetered,
                    job.constraints.require_charging,
                    job.registered_at,
                    job.last_run_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Removes a registration. Returns whether a row existed.
pub async fn delete_job(db: &Database, task: &str) -> Result<bool, VaultlineError> {
    let task = task.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM scheduled_jobs WHERE task = ?1", params![task])?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_job(db: &Database, task: &str) -> Result<Option<ScheduledJob>, VaultlineError> {
    let task = task.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE task = ?1"),
                params![task],
                ScheduledJob::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_jobs(db: &Database) -> Result<Vec<ScheduledJob>, VaultlineError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY task"))?;
            let rows = stmt.query_map([], ScheduledJob::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Records a launch. Periodic jobs advance `last_run_at`; one-off jobs are
/// consumed. A registration that was replaced after `registered_at` is left
/// untouched.
pub async fn mark_launched(
    db: &Database,
    job: &ScheduledJob,
    launched_at: i64,
) -> Result<(), VaultlineError> {
    let task = job.task.clone();
    let kind = job.kind;
    let registered_at = job.registered_at;
    db.connection()
        .call(move |conn| {
            match kind {
                JobKind::Periodic => conn.execute(
                    "UPDATE scheduled_jobs SET last_run_at = ?1
                     WHERE task = ?2 AND registered_at = ?3",
                    params![launched_at, task, registered_at],
                )?,
                JobKind::OneOff => conn.execute(
                    "DELETE FROM scheduled_jobs WHERE task = ?1 AND registered_at = ?2",
                    params![task, registered_at],
                )?,
            };
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periodic(task: &str, interval: i64, registered_at: i64) -> ScheduledJob {
        ScheduledJob {
            task: task.to_string(),
            kind: JobKind::Periodic,
            interval_secs: Some(interval),
            constraints: JobConstraints {
                require_unmetered: true,
                require_charging: false,
            },
            registered_at,
            last_run_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_registration() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("jobs.db")).await.unwrap();

        upsert_job(&db, &periodic("sync", 3600, 100)).await.unwrap();
        upsert_job(&db, &periodic("sync", 7200, 200)).await.unwrap();

        let jobs = list_jobs(&db).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].interval_secs, Some(7200));
        assert!(jobs[0].constraints.require_unmetered);
    }

    #[tokio::test]
    async fn launching_advances_periodic_and_consumes_one_off() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("jobs.db")).await.unwrap();

        let job = periodic("sync", 60, 1000);
        upsert_job(&db, &job).await.unwrap();
        assert_eq!(job.due_at(), 1060);
        mark_launched(&db, &job, 1065).await.unwrap();
        let stored = get_job(&db, "sync").await.unwrap().unwrap();
        assert_eq!(stored.last_run_at, Some(1065));
        assert_eq!(stored.due_at(), 1125);

        let once = ScheduledJob {
            task: "now".into(),
            kind: JobKind::OneOff,
            interval_secs: None,
            constraints: JobConstraints::default(),
            registered_at: 2000,
            last_run_at: None,
        };
        upsert_job(&db, &once).await.unwrap();
        assert_eq!(once.due_at(), 2000);
        mark_launched(&db, &once, 2001).await.unwrap();
        assert!(get_job(&db, "now").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_launch_does_not_touch_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("jobs.db")).await.unwrap();

        let old = periodic("sync", 60, 1000);
        upsert_job(&db, &old).await.unwrap();
        upsert_job(&db, &periodic("sync", 120, 1010)).await.unwrap();
        mark_launched(&db, &old, 1070).await.unwrap();

        let stored = get_job(&db, "sync").await.unwrap().unwrap();
        assert_eq!(stored.last_run_at, None);
        assert!(delete_job(&db, "sync").await.unwrap());
        assert!(!delete_job(&db, "sync").await.unwrap());
    }
}
