use adaptrs::models::{aggregate_daily_samples, AthleteThresholds, WorkoutCategory, WorkoutLoad, WorkoutTelemetry};
use adaptrs::pmc::LoadAggregator;
use adaptrs::readiness::{ReadinessInput, ReadinessScorer, ReadinessService};
use adaptrs::recommendation::repository::{
    InMemoryStore, LoadSampleProvider, PhaseRepository, PlanStore, WeekRepository,
    WorkoutRepository,
};
use adaptrs::recommendation::{
    EvaluationContext, ProposedChanges, RecommendationEngine, RecommendationResponse,
    RecommendationSource, RecommendationStatus, RecommendationTarget,
};
use adaptrs::training_plan::{PhaseType, PlanBuilder, PlanSkeleton, WeekType};
use adaptrs::tss::TssCalculator;
use adaptrs::EngineError;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Integration tests that drive complete adaptation workflows through the
/// public API, from raw telemetry to an applied plan change.

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn plan_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn setup() -> (InMemoryStore, PlanSkeleton) {
        let store = InMemoryStore::new();
        let skeleton = PlanBuilder::rolling("athlete", plan_start(), 8).build().unwrap();
        store.save_skeleton(&skeleton).unwrap();
        (store, skeleton)
    }

    fn thresholds() -> AthleteThresholds {
        AthleteThresholds {
            ftp: Some(250),
            lthr: Some(165),
            resting_hr: Some(50),
            max_hr: Some(190),
        }
    }

    /// A ride at threshold power; 24 minutes is 40 TSS, 150 minutes is 250
    fn threshold_ride(minutes: u32) -> WorkoutTelemetry {
        WorkoutTelemetry {
            normalized_power: Some(250),
            ..WorkoutTelemetry::new(WorkoutCategory::Cardio, minutes * 60)
        }
    }

    /// Twelve weeks of history ending the day before `date`: a long easy
    /// block followed by an overreaching fortnight
    fn overreaching_history(date: NaiveDate) -> Vec<WorkoutLoad> {
        let calculator = TssCalculator::new();
        (0..84)
            .map(|day| {
                let minutes = if day >= 70 { 150 } else { 24 };
                let result = calculator.calculate_tss(&threshold_ride(minutes), &thresholds());
                WorkoutLoad {
                    workout_id: format!("ride-{}", day),
                    date: date - Duration::days(84 - day),
                    training_stress: result.tss,
                }
            })
            .collect()
    }

    #[test]
    fn test_telemetry_to_applied_recovery_week() {
        let (store, skeleton) = setup();
        let date = plan_start() + Duration::days(14);

        // Telemetry -> per-workout stress -> daily samples
        let loads = overreaching_history(date);
        assert_eq!(loads[0].training_stress, dec!(40));
        assert_eq!(loads[83].training_stress, dec!(250));
        for sample in aggregate_daily_samples(&loads) {
            store.upsert_sample("athlete", sample).unwrap();
        }

        // Fitness, fatigue and form from the stored series
        let samples = store
            .load_samples("athlete", date - Duration::days(120), date)
            .unwrap();
        let metrics = LoadAggregator::new().calculate_metrics(&samples, date);
        assert!(metrics.atl > metrics.ctl);
        assert!(metrics.tsb < dec!(-25));

        // Readiness reflects the fatigue
        let assessment = ReadinessService::new(ReadinessScorer::new(), &store)
            .assess(
                "athlete",
                date,
                ReadinessInput {
                    form_value: Some(metrics.tsb),
                    sleep_quality: Some(5),
                    ..ReadinessInput::subjective(5)
                },
            )
            .unwrap();
        assert!(assessment.result.score < dec!(60));

        // Detection proposes turning the current week into a recovery week
        let engine = RecommendationEngine::new(&store);
        let context = EvaluationContext {
            muscles_over_mrv: vec!["quads".to_string(), "glutes".to_string()],
            ..EvaluationContext::default()
        };
        let created = engine.evaluate(&skeleton.plan.id, date, &context).unwrap();
        let week = store
            .weeks_for_phase(&skeleton.phases[0].id)
            .unwrap()
            .into_iter()
            .find(|w| w.contains(date))
            .unwrap();
        let recovery = created
            .iter()
            .find(|r| r.target == RecommendationTarget::Week(week.id.clone()))
            .expect("recovery week recommendation");
        assert_eq!(
            recovery.proposed_changes,
            ProposedChanges::WeekTypeChange {
                new_type: WeekType::Recovery
            }
        );
        assert_eq!(recovery.status, RecommendationStatus::Pending);

        // The preview projects better form and leaves the timeline alone
        let preview = engine.preview(&recovery.id, date).unwrap();
        assert_eq!(preview.timeline_impact.days_shifted, 0);
        assert!(preview.timeline_impact.conflicts.is_empty());
        assert!(preview.training_load_projection.tsb_in_7_days > preview.training_load_projection.current_tsb);
        assert!(!preview.affected_items.is_empty());
        assert_eq!(store.get_week(&week.id).unwrap().unwrap(), week);

        // Accepting applies the change and records it on the week
        let accepted = engine
            .respond(&recovery.id, RecommendationResponse::Accept, Some("ok".to_string()), date)
            .unwrap();
        assert_eq!(accepted.status, RecommendationStatus::Accepted);
        assert_eq!(accepted.user_notes.as_deref(), Some("ok"));

        let updated = store.get_week(&week.id).unwrap().unwrap();
        assert_eq!(updated.week_type, WeekType::Recovery);
        assert_eq!(updated.adaptation_adjustments.len(), 1);
        assert_eq!(
            updated.adaptation_adjustments.entries()[0].recommendation_id,
            recovery.id
        );
        assert!(engine
            .pending_for_plan(&skeleton.plan.id)
            .unwrap()
            .iter()
            .all(|r| r.id != recovery.id));
    }

    #[test]
    fn test_failed_apply_rolls_back_every_write() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let before = store.phases_for_plan(&skeleton.plan.id).unwrap();

        let insert = engine
            .create_recommendation(
                &skeleton.plan.id,
                RecommendationTarget::Phase(skeleton.phases[0].id.clone()),
                ProposedChanges::PhaseInsert {
                    phase_type: PhaseType::Recovery,
                    duration_days: 7,
                    volume_modifier: dec!(0.6),
                    intensity_modifier: dec!(0.8),
                },
                RecommendationSource::Manual,
                "extra recovery block",
            )
            .unwrap();

        // One downstream shift is stored, the next write fails
        store.fail_write_after(1);
        let result = engine.respond(&insert.id, RecommendationResponse::Accept, None, plan_start());
        assert!(matches!(result, Err(EngineError::ApplyFailure { .. })));
        assert_eq!(store.phases_for_plan(&skeleton.plan.id).unwrap(), before);
        assert_eq!(
            engine.get_recommendation(&insert.id).unwrap().status,
            RecommendationStatus::Pending
        );

        // A retry once storage recovers applies cleanly
        store.clear_write_failure();
        engine
            .respond(&insert.id, RecommendationResponse::Accept, None, plan_start())
            .unwrap();
        let phases = store.phases_for_plan(&skeleton.plan.id).unwrap();
        assert_eq!(phases.len(), before.len() + 1);
        assert_eq!(phases[1].phase_type, PhaseType::Recovery);
        assert_eq!(phases[1].start_date, before[0].end_date + Duration::days(1));
        assert_eq!(
            phases.last().unwrap().end_date,
            before.last().unwrap().end_date + Duration::days(7)
        );
        for (index, phase) in phases.iter().enumerate() {
            assert_eq!(phase.order_index as usize, index);
        }
    }

    #[test]
    fn test_extended_phase_is_still_evaluated_day_by_day() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);

        let extend = engine
            .create_recommendation(
                &skeleton.plan.id,
                RecommendationTarget::Phase(skeleton.phases[0].id.clone()),
                ProposedChanges::PhaseExtension { days: 7 },
                RecommendationSource::Manual,
                "base needs another week",
            )
            .unwrap();
        engine
            .respond(&extend.id, RecommendationResponse::Accept, None, plan_start())
            .unwrap();

        // Every phase is covered by its own weeks after the extension
        for phase in store.phases_for_plan(&skeleton.plan.id).unwrap() {
            let weeks = store.weeks_for_phase(&phase.id).unwrap();
            assert_eq!(weeks[0].week_start_date, phase.start_date);
            for week in &weeks {
                assert!(phase.contains(week.week_start_date));
                for workout in store.workouts_for_week(&week.id).unwrap() {
                    assert!(phase.contains(workout.date));
                }
            }
        }

        // The added week has a hard session on its second day
        let date = NaiveDate::from_ymd_opt(2024, 1, 23).unwrap();
        ReadinessService::new(ReadinessScorer::new(), &store)
            .assess("athlete", date, ReadinessInput::subjective(1))
            .unwrap();
        let created = engine
            .evaluate(&skeleton.plan.id, date, &EvaluationContext::default())
            .unwrap();
        let skip = created
            .iter()
            .find(|r| matches!(r.proposed_changes, ProposedChanges::WorkoutSkip { .. }))
            .expect("skip for the hard session");

        let workout = store.get_workout(skip.target.id()).unwrap().unwrap();
        assert_eq!(workout.date, date);
        let week = store.get_week(&workout.week_id).unwrap().unwrap();
        assert_eq!(week.phase_id, skeleton.phases[0].id);
        assert_eq!(week.week_start_date, date - Duration::days(1));
    }

    #[test]
    fn test_lifecycle_state_machine() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let target = RecommendationTarget::Phase(skeleton.phases[2].id.clone());

        let keep = engine
            .create_recommendation(
                &skeleton.plan.id,
                target.clone(),
                ProposedChanges::PhaseShorten { days: 2 },
                RecommendationSource::Manual,
                "",
            )
            .unwrap();
        let drop = engine
            .create_recommendation(
                &skeleton.plan.id,
                target,
                ProposedChanges::PhaseExtension { days: 5 },
                RecommendationSource::Manual,
                "",
            )
            .unwrap();
        assert_eq!(engine.pending_for_plan(&skeleton.plan.id).unwrap().len(), 2);

        engine
            .respond(&keep.id, RecommendationResponse::Accept, None, plan_start())
            .unwrap();
        engine
            .respond(&drop.id, RecommendationResponse::Dismiss, None, plan_start())
            .unwrap();
        assert!(engine.pending_for_plan(&skeleton.plan.id).unwrap().is_empty());

        let accepted_again = engine.respond(&keep.id, RecommendationResponse::Dismiss, None, plan_start());
        assert!(matches!(
            accepted_again,
            Err(EngineError::IllegalStateTransition {
                from: RecommendationStatus::Accepted,
                to: RecommendationStatus::Dismissed,
                ..
            })
        ));

        let dismissed = engine.get_recommendation(&drop.id).unwrap();
        assert_eq!(dismissed.status, RecommendationStatus::Dismissed);
        assert!(dismissed.applied_at.is_none());
        assert!(dismissed.responded_at.is_some());

        // Only the accepted shorten touched the phase
        let phase = store.get_phase(&skeleton.phases[2].id).unwrap().unwrap();
        assert_eq!(phase.adaptation_history.len(), 1);
        assert_eq!(phase.end_date, skeleton.phases[2].end_date - Duration::days(2));
    }

    #[test]
    fn test_adaptation_history_is_append_only() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let phase_id = skeleton.phases[0].id.clone();

        let mut ids = Vec::new();
        let mut first_entry = None;
        for days in [3u32, 2, 1] {
            let rec = engine
                .create_recommendation(
                    &skeleton.plan.id,
                    RecommendationTarget::Phase(phase_id.clone()),
                    ProposedChanges::PhaseExtension { days },
                    RecommendationSource::Manual,
                    "",
                )
                .unwrap();
            engine
                .respond(&rec.id, RecommendationResponse::Accept, None, plan_start())
                .unwrap();
            ids.push(rec.id);

            if first_entry.is_none() {
                let phase = store.get_phase(&phase_id).unwrap().unwrap();
                first_entry = phase.adaptation_history.last().cloned();
            }
        }

        let phase = store.get_phase(&phase_id).unwrap().unwrap();
        let entries = phase.adaptation_history.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(Some(&entries[0]), first_entry.as_ref());
        let recorded: Vec<_> = entries.iter().map(|e| e.recommendation_id.clone()).collect();
        assert_eq!(recorded, ids);
        assert_eq!(phase.end_date, skeleton.phases[0].end_date + Duration::days(6));
    }

    #[test]
    fn test_batch_metrics_match_single_athlete() {
        let date = plan_start() + Duration::days(14);
        let samples = aggregate_daily_samples(&overreaching_history(date));
        let squad = vec![
            ("a".to_string(), samples.clone()),
            ("b".to_string(), Vec::new()),
        ];

        let aggregator = LoadAggregator::new();
        let batch = aggregator.batch_metrics(&squad, date);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].1, aggregator.calculate_metrics(&samples, date));
        assert_eq!(batch[1].1.ctl, Decimal::ZERO);
    }
}
