//! Typed storage interfaces the engine depends on, plus an in-memory store
//!
//! The engine only knows entity contracts; row and table shapes stay inside
//! the adapters (`InMemoryStore` here, `SqliteStore` in `database`).

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

pub use crate::error::RepositoryError;
use crate::models::{DailyLoadSample, ReadinessBaseline};
use crate::readiness::ReadinessAssessment;
use crate::recommendation::Recommendation;
use crate::training_plan::{Phase, Plan, PlanSkeleton, PlannedWorkout, WeeklyTarget};

pub type RepoResult<T> = Result<T, RepositoryError>;

pub trait PlanRepository {
    fn get_plan(&self, id: &str) -> RepoResult<Option<Plan>>;
    fn save_plan(&self, plan: &Plan) -> RepoResult<()>;
}

pub trait PhaseRepository {
    fn get_phase(&self, id: &str) -> RepoResult<Option<Phase>>;
    /// Phases of a plan ordered by `order_index`
    fn phases_for_plan(&self, plan_id: &str) -> RepoResult<Vec<Phase>>;
    fn save_phase(&self, phase: &Phase) -> RepoResult<()>;
    fn delete_phase(&self, id: &str) -> RepoResult<()>;
}

pub trait WeekRepository {
    fn get_week(&self, id: &str) -> RepoResult<Option<WeeklyTarget>>;
    /// Weeks of a phase ordered by start date
    fn weeks_for_phase(&self, phase_id: &str) -> RepoResult<Vec<WeeklyTarget>>;
    fn save_week(&self, week: &WeeklyTarget) -> RepoResult<()>;
    fn delete_week(&self, id: &str) -> RepoResult<()>;
}

pub trait WorkoutRepository {
    fn get_workout(&self, id: &str) -> RepoResult<Option<PlannedWorkout>>;
    /// Workouts of a week ordered by date
    fn workouts_for_week(&self, week_id: &str) -> RepoResult<Vec<PlannedWorkout>>;
    fn save_workout(&self, workout: &PlannedWorkout) -> RepoResult<()>;
    fn delete_workout(&self, id: &str) -> RepoResult<()>;
}

pub trait RecommendationRepository {
    fn get_recommendation(&self, id: &str) -> RepoResult<Option<Recommendation>>;
    /// Recommendations of a plan ordered by creation time
    fn recommendations_for_plan(&self, plan_id: &str) -> RepoResult<Vec<Recommendation>>;
    fn save_recommendation(&self, recommendation: &Recommendation) -> RepoResult<()>;
}

/// Ordered daily load for an athlete
pub trait LoadSampleProvider {
    fn load_samples(
        &self,
        athlete_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DailyLoadSample>>;
}

pub trait BaselineProvider {
    fn latest_baseline(&self, athlete_id: &str) -> RepoResult<Option<ReadinessBaseline>>;
}

/// Readiness assessments, one per athlete per date
pub trait AssessmentStore {
    /// Insert, or replace the assessment already stored for that athlete and date
    fn upsert_assessment(&self, assessment: &ReadinessAssessment) -> RepoResult<()>;

    fn assessments_between(
        &self,
        athlete_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<ReadinessAssessment>>;
}

/// Everything the recommendation state machine reads and writes
pub trait PlanStore:
    PlanRepository + PhaseRepository + WeekRepository + WorkoutRepository + RecommendationRepository
{
    /// Persist a freshly built plan skeleton
    fn save_skeleton(&self, skeleton: &PlanSkeleton) -> RepoResult<()> {
        self.save_plan(&skeleton.plan)?;
        for phase in &skeleton.phases {
            self.save_phase(phase)?;
        }
        for week in &skeleton.weeks {
            self.save_week(week)?;
        }
        for workout in &skeleton.workouts {
            self.save_workout(workout)?;
        }
        Ok(())
    }
}

impl<T> PlanStore for T where
    T: PlanRepository + PhaseRepository + WeekRepository + WorkoutRepository + RecommendationRepository
{
}

/// Plan storage plus the athlete inputs recommendation detection reads
pub trait EngineStore: PlanStore + LoadSampleProvider + AssessmentStore {}

impl<T> EngineStore for T where T: PlanStore + LoadSampleProvider + AssessmentStore {}

fn lock_poisoned() -> RepositoryError {
    RepositoryError::Storage {
        reason: "store lock poisoned".to_string(),
    }
}

#[derive(Default)]
struct Tables {
    plans: HashMap<String, Plan>,
    phases: HashMap<String, Phase>,
    weeks: HashMap<String, WeeklyTarget>,
    workouts: HashMap<String, PlannedWorkout>,
    recommendations: HashMap<String, Recommendation>,
    samples: BTreeMap<(String, NaiveDate), DailyLoadSample>,
    baselines: HashMap<String, ReadinessBaseline>,
    assessments: BTreeMap<(String, NaiveDate), ReadinessAssessment>,
}

/// Thread-safe in-memory implementation of every repository trait.
///
/// `fail_write_after(n)` makes the write after the next `n` successful writes
/// fail once, for exercising rollback.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_countdown: Mutex<Option<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `successful_writes` writes through, then fail the next one
    pub fn fail_write_after(&self, successful_writes: usize) {
        if let Ok(mut countdown) = self.fail_countdown.lock() {
            *countdown = Some(successful_writes);
        }
    }

    pub fn clear_write_failure(&self) {
        if let Ok(mut countdown) = self.fail_countdown.lock() {
            *countdown = None;
        }
    }

    pub fn set_baseline(&self, athlete_id: &str, baseline: ReadinessBaseline) -> RepoResult<()> {
        self.write(|t| {
            t.baselines.insert(athlete_id.to_string(), baseline);
        })
    }

    /// Insert or replace the sample for `(athlete_id, sample.date)`
    pub fn upsert_sample(&self, athlete_id: &str, sample: DailyLoadSample) -> RepoResult<()> {
        self.write(|t| {
            t.samples.insert((athlete_id.to_string(), sample.date), sample);
        })
    }

    fn check_write(&self) -> RepoResult<()> {
        let mut countdown = self.fail_countdown.lock().map_err(|_| lock_poisoned())?;
        match *countdown {
            Some(0) => {
                *countdown = None;
                Err(RepositoryError::Storage {
                    reason: "injected write failure".to_string(),
                })
            }
            Some(n) => {
                *countdown = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> RepoResult<R> {
        self.check_write()?;
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        Ok(f(&mut tables))
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> RepoResult<R> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        Ok(f(&tables))
    }
}

impl PlanRepository for InMemoryStore {
    fn get_plan(&self, id: &str) -> RepoResult<Option<Plan>> {
        self.read(|t| t.plans.get(id).cloned())
    }

    fn save_plan(&self, plan: &Plan) -> RepoResult<()> {
        self.write(|t| {
            t.plans.insert(plan.id.clone(), plan.clone());
        })
    }
}

impl PhaseRepository for InMemoryStore {
    fn get_phase(&self, id: &str) -> RepoResult<Option<Phase>> {
        self.read(|t| t.phases.get(id).cloned())
    }

    fn phases_for_plan(&self, plan_id: &str) -> RepoResult<Vec<Phase>> {
        self.read(|t| {
            let mut phases: Vec<Phase> = t
                .phases
                .values()
                .filter(|p| p.plan_id == plan_id)
                .cloned()
                .collect();
            phases.sort_by_key(|p| p.order_index);
            phases
        })
    }

    fn save_phase(&self, phase: &Phase) -> RepoResult<()> {
        self.write(|t| {
            t.phases.insert(phase.id.clone(), phase.clone());
        })
    }

    fn delete_phase(&self, id: &str) -> RepoResult<()> {
        self.write(|t| {
            t.phases.remove(id);
        })
    }
}

impl WeekRepository for InMemoryStore {
    fn get_week(&self, id: &str) -> RepoResult<Option<WeeklyTarget>> {
        self.read(|t| t.weeks.get(id).cloned())
    }

    fn weeks_for_phase(&self, phase_id: &str) -> RepoResult<Vec<WeeklyTarget>> {
        self.read(|t| {
            let mut weeks: Vec<WeeklyTarget> = t
                .weeks
                .values()
                .filter(|w| w.phase_id == phase_id)
                .cloned()
                .collect();
            weeks.sort_by_key(|w| w.week_start_date);
            weeks
        })
    }

    fn save_week(&self, week: &WeeklyTarget) -> RepoResult<()> {
        self.write(|t| {
            t.weeks.insert(week.id.clone(), week.clone());
        })
    }

    fn delete_week(&self, id: &str) -> RepoResult<()> {
        self.write(|t| {
            t.weeks.remove(id);
        })
    }
}

impl WorkoutRepository for InMemoryStore {
    fn get_workout(&self, id: &str) -> RepoResult<Option<PlannedWorkout>> {
        self.read(|t| t.workouts.get(id).cloned())
    }

    fn workouts_for_week(&self, week_id: &str) -> RepoResult<Vec<PlannedWorkout>> {
        self.read(|t| {
            let mut workouts: Vec<PlannedWorkout> = t
                .workouts
                .values()
                .filter(|w| w.week_id == week_id)
                .cloned()
                .collect();
            workouts.sort_by_key(|w| w.date);
            workouts
        })
    }

    fn save_workout(&self, workout: &PlannedWorkout) -> RepoResult<()> {
        self.write(|t| {
            t.workouts.insert(workout.id.clone(), workout.clone());
        })
    }

    fn delete_workout(&self, id: &str) -> RepoResult<()> {
        self.write(|t| {
            t.workouts.remove(id);
        })
    }
}

impl RecommendationRepository for InMemoryStore {
    fn get_recommendation(&self, id: &str) -> RepoResult<Option<Recommendation>> {
        self.read(|t| t.recommendations.get(id).cloned())
    }

    fn recommendations_for_plan(&self, plan_id: &str) -> RepoResult<Vec<Recommendation>> {
        self.read(|t| {
            let mut recommendations: Vec<Recommendation> = t
                .recommendations
                .values()
                .filter(|r| r.plan_id == plan_id)
                .cloned()
                .collect();
            recommendations.sort_by_key(|r| r.created_at);
            recommendations
        })
    }

    fn save_recommendation(&self, recommendation: &Recommendation) -> RepoResult<()> {
        self.write(|t| {
            t.recommendations
                .insert(recommendation.id.clone(), recommendation.clone());
        })
    }
}

impl LoadSampleProvider for InMemoryStore {
    fn load_samples(
        &self,
        athlete_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DailyLoadSample>> {
        if from > to {
            return Ok(Vec::new());
        }
        self.read(|t| {
            t.samples
                .range((athlete_id.to_string(), from)..=(athlete_id.to_string(), to))
                .map(|(_, sample)| sample.clone())
                .collect()
        })
    }
}

impl BaselineProvider for InMemoryStore {
    fn latest_baseline(&self, athlete_id: &str) -> RepoResult<Option<ReadinessBaseline>> {
        self.read(|t| t.baselines.get(athlete_id).cloned())
    }
}

impl AssessmentStore for InMemoryStore {
    fn upsert_assessment(&self, assessment: &ReadinessAssessment) -> RepoResult<()> {
        self.write(|t| {
            t.assessments.insert(
                (assessment.athlete_id.clone(), assessment.date),
                assessment.clone(),
            );
        })
    }

    fn assessments_between(
        &self,
        athlete_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<ReadinessAssessment>> {
        if from > to {
            return Ok(Vec::new());
        }
        self.read(|t| {
            t.assessments
                .range((athlete_id.to_string(), from)..=(athlete_id.to_string(), to))
                .map(|(_, a)| a.clone())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::{ReadinessInput, ReadinessScorer};
    use crate::training_plan::PlanBuilder;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_skeleton_round_trip() {
        let store = InMemoryStore::new();
        let skeleton = PlanBuilder::rolling("athlete", date(3), 4).build().unwrap();
        store.save_skeleton(&skeleton).unwrap();

        let phases = store.phases_for_plan(&skeleton.plan.id).unwrap();
        assert_eq!(phases.len(), skeleton.phases.len());
        assert!(phases.windows(2).all(|p| p[0].order_index < p[1].order_index));

        let weeks = store.weeks_for_phase(&phases[0].id).unwrap();
        assert_eq!(weeks.len(), 3);
        assert!(!store.workouts_for_week(&weeks[0].id).unwrap().is_empty());
    }

    #[test]
    fn test_sample_upsert_and_range() {
        let store = InMemoryStore::new();
        store.upsert_sample("a", DailyLoadSample::new(date(1), dec!(50))).unwrap();
        store.upsert_sample("a", DailyLoadSample::new(date(2), dec!(60))).unwrap();
        store.upsert_sample("a", DailyLoadSample::new(date(2), dec!(70))).unwrap();
        store.upsert_sample("b", DailyLoadSample::new(date(2), dec!(99))).unwrap();

        let samples = store.load_samples("a", date(1), date(30)).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].training_stress, dec!(70));
    }

    #[test]
    fn test_assessment_upsert_replaces_same_day() {
        let store = InMemoryStore::new();
        let scorer = ReadinessScorer::new();
        for readiness in [3, 8] {
            let input = ReadinessInput::subjective(readiness);
            let result = scorer.score(&input, None);
            store
                .upsert_assessment(&ReadinessAssessment {
                    athlete_id: "a".to_string(),
                    date: date(5),
                    input,
                    result,
                })
                .unwrap();
        }

        let stored = store.assessments_between("a", date(1), date(10)).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].input.subjective_readiness, 8);
    }

    #[test]
    fn test_injected_write_failure_fires_once() {
        let store = InMemoryStore::new();
        store.fail_write_after(1);
        assert!(store.upsert_sample("a", DailyLoadSample::new(date(1), dec!(1))).is_ok());
        assert!(matches!(
            store.upsert_sample("a", DailyLoadSample::new(date(2), dec!(1))),
            Err(RepositoryError::Storage { .. })
        ));
        assert!(store.upsert_sample("a", DailyLoadSample::new(date(3), dec!(1))).is_ok());
    }
}
