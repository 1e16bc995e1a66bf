//! SQLite persistence for plans, recommendations and athlete inputs
//!
//! Entities are stored as JSON documents keyed by id, with the handful of
//! columns needed for lookups and ordering kept alongside.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Params};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::RepositoryError;
use crate::models::{DailyLoadSample, ReadinessBaseline};
use crate::readiness::ReadinessAssessment;
use crate::recommendation::repository::{
    AssessmentStore, BaselineProvider, LoadSampleProvider, PhaseRepository, PlanRepository,
    RecommendationRepository, RepoResult, WeekRepository, WorkoutRepository,
};
use crate::recommendation::Recommendation;
use crate::training_plan::{Phase, Plan, PlannedWorkout, WeeklyTarget};

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;
    PRAGMA foreign_keys=ON;

    CREATE TABLE IF NOT EXISTS plans (
        id TEXT PRIMARY KEY,
        athlete_id TEXT NOT NULL,
        document TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS phases (
        id TEXT PRIMARY KEY,
        plan_id TEXT NOT NULL,
        order_index INTEGER NOT NULL,
        document TEXT NOT NULL,
        FOREIGN KEY (plan_id) REFERENCES plans (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS weeks (
        id TEXT PRIMARY KEY,
        phase_id TEXT NOT NULL,
        week_start DATE NOT NULL,
        document TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS workouts (
        id TEXT PRIMARY KEY,
        week_id TEXT NOT NULL,
        date DATE NOT NULL,
        document TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS recommendations (
        id TEXT PRIMARY KEY,
        plan_id TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        document TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS load_samples (
        athlete_id TEXT NOT NULL,
        date DATE NOT NULL,
        document TEXT NOT NULL,
        PRIMARY KEY (athlete_id, date)
    );

    CREATE TABLE IF NOT EXISTS baselines (
        athlete_id TEXT PRIMARY KEY,
        document TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS readiness_assessments (
        athlete_id TEXT NOT NULL,
        date DATE NOT NULL,
        document TEXT NOT NULL,
        PRIMARY KEY (athlete_id, date)
    );

    CREATE INDEX IF NOT EXISTS idx_phases_plan_order ON phases (plan_id, order_index);
    CREATE INDEX IF NOT EXISTS idx_weeks_phase ON weeks (phase_id, week_start);
    CREATE INDEX IF NOT EXISTS idx_workouts_week ON workouts (week_id, date);
    CREATE INDEX IF NOT EXISTS idx_recommendations_plan ON recommendations (plan_id, created_at);
"#;

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::Storage {
            reason: err.to_string(),
        }
    }
}

/// SQLite implementation of every repository trait
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create or open a database at the specified path
    pub fn open<P: AsRef<Path>>(db_path: P) -> RepoResult<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        debug!(path = %db_path.as_ref().display(), "Opened SQLite store");
        Self::with_connection(conn)
    }

    pub fn in_memory() -> RepoResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> RepoResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn set_baseline(&self, athlete_id: &str, baseline: &ReadinessBaseline) -> RepoResult<()> {
        self.execute(
            r#"
            INSERT INTO baselines (athlete_id, document) VALUES (?1, ?2)
            ON CONFLICT (athlete_id) DO UPDATE SET document = excluded.document
            "#,
            params![athlete_id, to_document(baseline)?],
        )
    }

    /// Insert or replace the day's load for an athlete
    pub fn upsert_sample(&self, athlete_id: &str, sample: &DailyLoadSample) -> RepoResult<()> {
        self.execute(
            r#"
            INSERT INTO load_samples (athlete_id, date, document) VALUES (?1, ?2, ?3)
            ON CONFLICT (athlete_id, date) DO UPDATE SET document = excluded.document
            "#,
            params![athlete_id, sample.date, to_document(sample)?],
        )
    }

    fn conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepositoryError::Storage {
            reason: "connection lock poisoned".to_string(),
        })
    }

    fn execute<P: Params>(&self, sql: &str, params: P) -> RepoResult<()> {
        self.conn()?.execute(sql, params)?;
        Ok(())
    }

    fn document<T: DeserializeOwned, P: Params>(&self, sql: &str, params: P) -> RepoResult<Option<T>> {
        let conn = self.conn()?;
        let text: Option<String> = conn.query_row(sql, params, |row| row.get(0)).optional()?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn documents<T: DeserializeOwned, P: Params>(&self, sql: &str, params: P) -> RepoResult<Vec<T>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }
}

fn to_document<T: Serialize>(value: &T) -> RepoResult<String> {
    Ok(serde_json::to_string(value)?)
}

impl PlanRepository for SqliteStore {
    fn get_plan(&self, id: &str) -> RepoResult<Option<Plan>> {
        self.document("SELECT document FROM plans WHERE id = ?1", params![id])
    }

    fn save_plan(&self, plan: &Plan) -> RepoResult<()> {
        self.execute(
            r#"
            INSERT INTO plans (id, athlete_id, document) VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                athlete_id = excluded.athlete_id,
                document = excluded.document
            "#,
            params![plan.id, plan.athlete_id, to_document(plan)?],
        )
    }
}

impl PhaseRepository for SqliteStore {
    fn get_phase(&self, id: &str) -> RepoResult<Option<Phase>> {
        self.document("SELECT document FROM phases WHERE id = ?1", params![id])
    }

    fn phases_for_plan(&self, plan_id: &str) -> RepoResult<Vec<Phase>> {
        self.documents(
            "SELECT document FROM phases WHERE plan_id = ?1 ORDER BY order_index",
            params![plan_id],
        )
    }

    fn save_phase(&self, phase: &Phase) -> RepoResult<()> {
        self.execute(
            r#"
            INSERT INTO phases (id, plan_id, order_index, document) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (id) DO UPDATE SET
                plan_id = excluded.plan_id,
                order_index = excluded.order_index,
                document = excluded.document
            "#,
            params![phase.id, phase.plan_id, phase.order_index, to_document(phase)?],
        )
    }

    fn delete_phase(&self, id: &str) -> RepoResult<()> {
        self.execute("DELETE FROM phases WHERE id = ?1", params![id])
    }
}

impl WeekRepository for SqliteStore {
    fn get_week(&self, id: &str) -> RepoResult<Option<WeeklyTarget>> {
        self.document("SELECT document FROM weeks WHERE id = ?1", params![id])
    }

    fn weeks_for_phase(&self, phase_id: &str) -> RepoResult<Vec<WeeklyTarget>> {
        self.documents(
            "SELECT document FROM weeks WHERE phase_id = ?1 ORDER BY week_start",
            params![phase_id],
        )
    }

    fn save_week(&self, week: &WeeklyTarget) -> RepoResult<()> {
        self.execute(
            r#"
            INSERT INTO weeks (id, phase_id, week_start, document) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (id) DO UPDATE SET
                phase_id = excluded.phase_id,
                week_start = excluded.week_start,
                document = excluded.document
            "#,
            params![week.id, week.phase_id, week.week_start_date, to_document(week)?],
        )
    }

    fn delete_week(&self, id: &str) -> RepoResult<()> {
        self.execute("DELETE FROM weeks WHERE id = ?1", params![id])
    }
}

impl WorkoutRepository for SqliteStore {
    fn get_workout(&self, id: &str) -> RepoResult<Option<PlannedWorkout>> {
        self.document("SELECT document FROM workouts WHERE id = ?1", params![id])
    }

    fn workouts_for_week(&self, week_id: &str) -> RepoResult<Vec<PlannedWorkout>> {
        self.documents(
            "SELECT document FROM workouts WHERE week_id = ?1 ORDER BY date, id",
            params![week_id],
        )
    }

    fn save_workout(&self, workout: &PlannedWorkout) -> RepoResult<()> {
        self.execute(
            r#"
            INSERT INTO workouts (id, week_id, date, document) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (id) DO UPDATE SET
                week_id = excluded.week_id,
                date = excluded.date,
                document = excluded.document
            "#,
            params![workout.id, workout.week_id, workout.date, to_document(workout)?],
        )
    }

    fn delete_workout(&self, id: &str) -> RepoResult<()> {
        self.execute("DELETE FROM workouts WHERE id = ?1", params![id])
    }
}

impl RecommendationRepository for SqliteStore {
    fn get_recommendation(&self, id: &str) -> RepoResult<Option<Recommendation>> {
        self.document("SELECT document FROM recommendations WHERE id = ?1", params![id])
    }

    fn recommendations_for_plan(&self, plan_id: &str) -> RepoResult<Vec<Recommendation>> {
        self.documents(
            "SELECT document FROM recommendations WHERE plan_id = ?1 ORDER BY created_at, id",
            params![plan_id],
        )
    }

    fn save_recommendation(&self, recommendation: &Recommendation) -> RepoResult<()> {
        self.execute(
            r#"
            INSERT INTO recommendations (id, plan_id, status, created_at, document)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO UPDATE SET
                status = excluded.status,
                document = excluded.document
            "#,
            params![
                recommendation.id,
                recommendation.plan_id,
                recommendation.status.to_string(),
                recommendation.created_at.to_rfc3339(),
                to_document(recommendation)?,
            ],
        )
    }
}

impl LoadSampleProvider for SqliteStore {
    fn load_samples(
        &self,
        athlete_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DailyLoadSample>> {
        self.documents(
            r#"
            SELECT document FROM load_samples
            WHERE athlete_id = ?1 AND date >= ?2 AND date <= ?3
            ORDER BY date
            "#,
            params![athlete_id, from, to],
        )
    }
}

impl BaselineProvider for SqliteStore {
    fn latest_baseline(&self, athlete_id: &str) -> RepoResult<Option<ReadinessBaseline>> {
        self.document(
            "SELECT document FROM baselines WHERE athlete_id = ?1",
            params![athlete_id],
        )
    }
}

impl AssessmentStore for SqliteStore {
    fn upsert_assessment(&self, assessment: &ReadinessAssessment) -> RepoResult<()> {
        self.execute(
            r#"
            INSERT INTO readiness_assessments (athlete_id, date, document) VALUES (?1, ?2, ?3)
            ON CONFLICT (athlete_id, date) DO UPDATE SET document = excluded.document
            "#,
            params![assessment.athlete_id, assessment.date, to_document(assessment)?],
        )
    }

    fn assessments_between(
        &self,
        athlete_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<ReadinessAssessment>> {
        self.documents(
            r#"
            SELECT document FROM readiness_assessments
            WHERE athlete_id = ?1 AND date >= ?2 AND date <= ?3
            ORDER BY date
            "#,
            params![athlete_id, from, to],
        )
    }
}
