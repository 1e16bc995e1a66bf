use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};

use adaptrs::deload::{DeloadEvaluator, DeloadInputs};
use adaptrs::logging::{init_logging, LogLevel};
use adaptrs::models::{AthleteThresholds, DailyLoadSample, WorkoutCategory, WorkoutTelemetry};
use adaptrs::pmc::{FormInterpretation, LoadAggregator, RiskLevel};
use adaptrs::progression::{ExerciseHistory, ProgressionModel, ProgressionStrategy};
use adaptrs::readiness::{ReadinessInput, ReadinessRecommendation, ReadinessScorer, ReadinessService};
use adaptrs::recommendation::repository::{
    BaselineProvider, LoadSampleProvider, PhaseRepository, PlanRepository, PlanStore,
    RecommendationRepository, WeekRepository,
};
use adaptrs::recommendation::{
    EvaluationContext, ProposedChanges, Recommendation, RecommendationEngine, RecommendationPreview,
    RecommendationResponse, RecommendationStatus,
};
use adaptrs::tempo::{effective_reps, reps_in_reserve, Tempo};
use adaptrs::training_plan::{PlanBuilder, RecoveryPattern};
use adaptrs::tss::TssCalculator;
use adaptrs::zones::{ZoneCalculator, ZoneTimes};
use adaptrs::{AdaptRsError, EngineConfig, EngineError, SqliteStore};

/// AdaptRS - Adaptive Training Load & Periodization CLI
///
/// Estimates training stress, tracks fitness and fatigue, scores readiness,
/// and adapts training plans through reviewable recommendations.
#[derive(Parser)]
#[command(name = "adaptrs")]
#[command(version)]
#[command(about = "Adaptive training load and periodization CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database (defaults to ~/.adaptrs/adaptrs.db)
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate training stress for one workout
    Tss {
        #[arg(long, default_value = "cardio")]
        category: WorkoutCategory,

        /// Duration in minutes
        #[arg(short, long)]
        minutes: u32,

        /// Normalized power (watts)
        #[arg(long)]
        np: Option<u16>,

        /// Average power (watts)
        #[arg(long)]
        avg_power: Option<u16>,

        /// Average heart rate (bpm)
        #[arg(long)]
        avg_hr: Option<u16>,

        /// Vendor relative effort score
        #[arg(long)]
        effort: Option<Decimal>,

        /// Session RPE (1-10)
        #[arg(long)]
        rpe: Option<Decimal>,

        #[arg(long)]
        ftp: Option<u16>,

        #[arg(long)]
        lthr: Option<u16>,

        #[arg(long)]
        resting_hr: Option<u16>,

        #[arg(long)]
        max_hr: Option<u16>,
    },

    /// Record and analyze daily training load
    Load {
        #[command(subcommand)]
        action: LoadAction,
    },

    /// Analyze intensity distribution from seconds in zones 1-5
    Zones {
        /// Five comma-separated values, e.g. 14400,1200,600,1800,300
        #[arg(value_delimiter = ',', required = true)]
        seconds: Vec<u32>,
    },

    /// Score today's readiness and record it
    Readiness {
        #[arg(short, long)]
        athlete: String,

        /// Assessment date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Self-reported readiness (1-10)
        #[arg(short, long)]
        subjective: u8,

        #[arg(long)]
        hrv: Option<Decimal>,

        /// Sleep quality (1-10)
        #[arg(long)]
        sleep_quality: Option<u8>,

        #[arg(long)]
        sleep_hours: Option<Decimal>,

        /// Current form (TSB); computed from stored load when omitted
        #[arg(long, allow_hyphen_values = true)]
        form: Option<Decimal>,

        #[arg(long)]
        grip: Option<Decimal>,

        #[arg(long)]
        jump: Option<Decimal>,

        /// Score without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Evaluate deload triggers from a JSON inputs file
    Deload {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Suggest the next session from a JSON exercise history
    Progress {
        #[arg(short, long)]
        file: PathBuf,

        /// linear, double, or rpe
        #[arg(short, long, default_value = "double")]
        strategy: ProgressionStrategy,
    },

    /// Time under tension and effective reps for a set
    Tempo {
        /// Tempo descriptor, e.g. 3-1-X-0
        descriptor: String,

        #[arg(short, long)]
        reps: u32,

        #[arg(long)]
        rpe: Option<Decimal>,

        #[arg(long)]
        rir: Option<u32>,
    },

    /// Create and inspect training plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Review and respond to plan recommendations
    Recommendations {
        #[command(subcommand)]
        action: RecommendationAction,
    },
}

#[derive(Subcommand)]
enum LoadAction {
    /// Record (or replace) a day's training stress
    Add {
        #[arg(short, long)]
        athlete: String,

        #[arg(short, long)]
        date: NaiveDate,

        #[arg(short, long)]
        tss: Decimal,
    },

    /// Show fitness, fatigue and form over a date range
    Show {
        #[arg(short, long)]
        athlete: String,

        #[arg(short, long)]
        from: NaiveDate,

        #[arg(short, long)]
        to: NaiveDate,
    },
}

#[derive(Subcommand)]
enum PlanAction {
    /// Lay out a new plan and save it
    Create {
        #[arg(short, long)]
        athlete: String,

        #[arg(short, long)]
        start: NaiveDate,

        /// Plan length for rolling plans
        #[arg(short, long, conflicts_with = "goal")]
        weeks: Option<u32>,

        /// Event date for goal-based plans
        #[arg(short, long)]
        goal: Option<NaiveDate>,

        /// Build:recovery week pattern (2:1, 3:1, 4:1)
        #[arg(short, long, default_value = "3:1")]
        pattern: RecoveryPattern,

        #[arg(long)]
        weekly_tss: Option<Decimal>,

        #[arg(long)]
        weekly_hours: Option<Decimal>,
    },

    /// Print a plan's phases and weeks
    Show {
        plan: String,
    },
}

#[derive(Subcommand)]
enum RecommendationAction {
    /// List a plan's recommendations
    List {
        plan: String,

        /// Include answered recommendations
        #[arg(long)]
        all: bool,
    },

    /// Run every detector for a plan and record new recommendations
    Evaluate {
        plan: String,

        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// JSON evaluation context (MRV, exercise histories, substitutions)
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Show what a recommendation would change, without applying it
    Preview {
        id: String,

        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Preview a modified payload from a JSON file
        #[arg(long)]
        changes: Option<PathBuf>,
    },

    /// Accept, modify or dismiss a recommendation
    Respond {
        id: String,

        #[arg(value_enum)]
        response: ResponseKind,

        /// Replacement payload for `modify` (JSON file)
        #[arg(long, required_if_eq("response", "modify"))]
        changes: Option<PathBuf>,

        #[arg(short, long)]
        notes: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResponseKind {
    Accept,
    Modify,
    Dismiss,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        let message = match e.downcast::<EngineError>() {
            Ok(engine) => AdaptRsError::from(engine).user_message(),
            Err(other) => format!("{:#}", other),
        };
        eprintln!("{} {}", "Error:".red().bold(), message);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load_or_default(),
    };
    if cli.verbose > 0 {
        config.logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    if let Some(db) = &cli.db {
        config.database_path = Some(db.clone());
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Tss {
            category,
            minutes,
            np,
            avg_power,
            avg_hr,
            effort,
            rpe,
            ftp,
            lthr,
            resting_hr,
            max_hr,
        } => {
            let workout = WorkoutTelemetry {
                normalized_power: np,
                average_power: avg_power,
                average_heart_rate: avg_hr,
                third_party_effort: effort,
                rpe,
                ..WorkoutTelemetry::new(category, minutes * 60)
            };
            let thresholds = AthleteThresholds {
                ftp,
                lthr,
                resting_hr,
                max_hr,
            };
            let result = TssCalculator::with_config(config.tss.clone()).calculate_tss(&workout, &thresholds);

            println!("{}", "Training Stress".blue().bold());
            println!("  TSS:    {}", result.tss.to_string().bold());
            println!("  Method: {:?}", result.method);
            if let Some(intensity) = result.intensity_factor {
                println!("  IF:     {}", intensity);
            }
        }

        Commands::Load { action } => run_load(action, &config)?,

        Commands::Zones { seconds } => {
            let zones: [u32; 5] = seconds
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("expected 5 zone values, got {}", seconds.len()))?;
            let analysis =
                ZoneCalculator::with_config(config.zones.clone()).analyze_distribution(&ZoneTimes::from_array(zones));

            println!("{}", "Intensity Distribution".cyan().bold());
            println!("  Low (Z1-2):  {}%", analysis.low_pct);
            println!("  Mid (Z3):    {}%", analysis.mid_pct);
            println!("  High (Z4-5): {}%", analysis.high_pct);
            println!("  Compliance:  {}", analysis.compliance_score);
            let verdict = if analysis.is_polarized {
                "polarized".green()
            } else {
                "not polarized".yellow()
            };
            println!("  Pattern:     {}", verdict);
            println!("  {}", analysis.message.dimmed());
        }

        Commands::Readiness {
            athlete,
            date,
            subjective,
            hrv,
            sleep_quality,
            sleep_hours,
            form,
            grip,
            jump,
            dry_run,
        } => {
            let date = date.unwrap_or_else(today);
            let store = open_store(&config)?;
            let form = match form {
                Some(form) => Some(form),
                None => current_form(&store, &config, &athlete, date)?,
            };
            let input = ReadinessInput {
                hrv_reading: hrv,
                sleep_quality,
                sleep_hours,
                form_value: form,
                grip_strength: grip,
                vertical_jump: jump,
                ..ReadinessInput::subjective(subjective)
            };

            let scorer = ReadinessScorer::with_config(config.readiness.clone());
            let result = if dry_run {
                let baseline = store.latest_baseline(&athlete)?;
                scorer.score(&input, baseline.as_ref())
            } else {
                ReadinessService::new(scorer, &store).assess(&athlete, date, input)?.result
            };

            let recommendation = match result.recommendation {
                ReadinessRecommendation::Push => "push".green().bold(),
                ReadinessRecommendation::Maintain => "maintain".yellow().bold(),
                ReadinessRecommendation::Reduce => "reduce".red().bold(),
            };
            println!("{} {}", "Readiness".magenta().bold(), date);
            println!("  Score:      {}", result.score.to_string().bold());
            println!("  Training:   {} (x{})", recommendation, result.adjustment_factor);
            for factor in &result.breakdown {
                println!("    {:?}: {} (weight {})", factor.factor, factor.raw_score, factor.weight);
            }
            for suggestion in &result.suggestions {
                println!("  - {}", suggestion);
            }
        }

        Commands::Deload { file } => {
            let inputs: DeloadInputs = read_json(&file)?;
            let evaluation = DeloadEvaluator::with_config(config.deload.clone()).evaluate(&inputs);

            if evaluation.should_deload {
                println!("{}", "Deload recommended".red().bold());
            } else {
                println!("{}", "No deload needed".green().bold());
            }
            println!("  {}", evaluation.rationale);
            if let (Some(severity), Some(kind)) = (evaluation.severity, evaluation.deload_type) {
                println!("  Severity: {}  Type: {}  Duration: {} days", severity, kind, evaluation.duration_days);
            }
            for suggestion in &evaluation.suggestions {
                println!("  - {}", suggestion);
            }
        }

        Commands::Progress { file, strategy } => {
            let history: ExerciseHistory = read_json(&file)?;
            let suggestion = ProgressionModel::with_config(config.progression.clone()).suggest(strategy, &history);

            println!("{} {}", "Next session:".blue().bold(), suggestion.exercise);
            match (suggestion.suggested_weight, suggestion.suggested_reps) {
                (Some(weight), Some(reps)) => println!("  {} x {}", weight.to_string().bold(), reps),
                _ => println!("  {}", "Not enough data for a confident suggestion".yellow()),
            }
            println!("  {}", suggestion.reasoning);
            if let Some(plateau) = suggestion.plateau {
                println!(
                    "  {} {} sessions without progress: {}",
                    "Plateau:".red().bold(),
                    plateau.sessions_without_progress,
                    plateau.action.description()
                );
            }
        }

        Commands::Tempo {
            descriptor,
            reps,
            rpe,
            rir,
        } => {
            let tempo: Tempo = descriptor.parse()?;
            println!("{} {}", "Tempo".cyan().bold(), descriptor);
            println!("  Seconds per rep:     {}", tempo.rep_seconds());
            println!("  Time under tension:  {}s", tempo.time_under_tension(reps));
            if let Some(reserve) = reps_in_reserve(rpe, rir) {
                println!("  Reps in reserve:     {}", reserve);
            }
            if let Some(effective) = effective_reps(reps, rpe, rir) {
                println!("  Effective reps:      {}", effective.to_string().bold());
            }
        }

        Commands::Plan { action } => run_plan(action, &config)?,

        Commands::Recommendations { action } => run_recommendations(action, &config)?,
    }

    Ok(())
}

fn run_load(action: LoadAction, config: &EngineConfig) -> Result<()> {
    let store = open_store(config)?;

    match action {
        LoadAction::Add { athlete, date, tss } => {
            store.upsert_sample(&athlete, &DailyLoadSample::new(date, tss))?;
            println!("{} {} on {}: {} TSS", "✓".green(), athlete, date, tss);
        }
        LoadAction::Show { athlete, from, to } => {
            if to < from {
                bail!("--to must not be before --from");
            }
            let aggregator = LoadAggregator::with_config(config.load.clone(), config.risk.clone());
            let lookback = i64::from(config.load.ctl_window_days) * i64::from(config.load.window_cap_multiplier);
            let samples = store.load_samples(&athlete, from - Duration::days(lookback), to)?;
            let series = aggregator.metrics_series(&samples, from, to)?;

            println!(
                "{}",
                format!("{:<12} {:>7} {:>7} {:>7} {:>7} {:>6}", "Date", "TSS", "CTL", "ATL", "TSB", "ACWR").bold()
            );
            for day in &series {
                let tsb = if day.tsb < Decimal::ZERO {
                    day.tsb.to_string().red()
                } else {
                    day.tsb.to_string().green()
                };
                println!(
                    "{:<12} {:>7} {:>7} {:>7} {:>7} {:>6}",
                    day.date.to_string(),
                    day.daily_stress,
                    day.ctl,
                    day.atl,
                    tsb,
                    day.acwr
                );
            }

            if let Some(last) = series.last() {
                let form = FormInterpretation::from_tsb(last.tsb);
                let risk = aggregator.assess_risk(last);
                println!();
                println!("  Form: {} - {}", form.description(), form.recommendation());
                let level = match risk.level {
                    RiskLevel::Low => risk.level.to_string().green(),
                    RiskLevel::Moderate => risk.level.to_string().yellow(),
                    RiskLevel::High | RiskLevel::VeryHigh => risk.level.to_string().red().bold(),
                };
                println!("  Injury risk: {} (monotony {}, strain {})", level, last.monotony, last.strain);
                for line in &risk.guidance {
                    println!("  - {}", line);
                }
            }
        }
    }

    Ok(())
}

fn run_plan(action: PlanAction, config: &EngineConfig) -> Result<()> {
    let store = open_store(config)?;

    match action {
        PlanAction::Create {
            athlete,
            start,
            weeks,
            goal,
            pattern,
            weekly_tss,
            weekly_hours,
        } => {
            let mut builder = match (goal, weeks) {
                (Some(goal), _) => PlanBuilder::goal_based(&athlete, start, goal),
                (None, Some(weeks)) => PlanBuilder::rolling(&athlete, start, weeks),
                (None, None) => bail!("either --weeks or --goal is required"),
            }
            .recovery_pattern(pattern);
            if let Some(tss) = weekly_tss {
                builder = builder.weekly_tss(tss);
            }
            if let Some(hours) = weekly_hours {
                builder = builder.weekly_hours(hours);
            }

            let skeleton = builder.build()?;
            store.save_skeleton(&skeleton)?;
            println!("{} Created plan {}", "✓".green(), skeleton.plan.id.bold());
            println!(
                "  {} phases, {} weeks, {} workouts",
                skeleton.phases.len(),
                skeleton.weeks.len(),
                skeleton.workouts.len()
            );
        }
        PlanAction::Show { plan } => {
            let plan = store
                .get_plan(&plan)?
                .with_context(|| format!("Plan {} not found", plan))?;
            println!("{} ({})", plan.name.bold(), plan.id.dimmed());

            for phase in store.phases_for_plan(&plan.id)? {
                println!(
                    "  {}. {} {} → {} (volume x{}, intensity x{}, {} changes)",
                    phase.order_index + 1,
                    phase.phase_type.to_string().cyan(),
                    phase.start_date,
                    phase.end_date,
                    phase.volume_modifier,
                    phase.intensity_modifier,
                    phase.adaptation_history.len()
                );
                for week in store.weeks_for_phase(&phase.id)? {
                    println!(
                        "       {} {:<9} {}h {} TSS",
                        week.week_start_date,
                        week.week_type.to_string(),
                        week.target_hours,
                        week.target_tss
                    );
                }
            }
        }
    }

    Ok(())
}

fn run_recommendations(action: RecommendationAction, config: &EngineConfig) -> Result<()> {
    let store = open_store(config)?;
    let engine = RecommendationEngine::with_config(&store, config);

    match action {
        RecommendationAction::List { plan, all } => {
            let recommendations = if all {
                store.recommendations_for_plan(&plan)?
            } else {
                engine.pending_for_plan(&plan)?
            };
            if recommendations.is_empty() {
                println!("{}", "No recommendations".dimmed());
            }
            for recommendation in &recommendations {
                print_recommendation(recommendation);
            }
        }
        RecommendationAction::Evaluate {
            plan,
            date,
            context,
        } => {
            let context: EvaluationContext = match context {
                Some(path) => read_json(&path)?,
                None => EvaluationContext::default(),
            };
            let created = engine.evaluate(&plan, date.unwrap_or_else(today), &context)?;
            println!("{} {} new recommendation(s)", "✓".green(), created.len());
            for recommendation in &created {
                print_recommendation(recommendation);
            }
        }
        RecommendationAction::Preview { id, date, changes } => {
            let date = date.unwrap_or_else(today);
            let preview = match changes {
                Some(path) => {
                    let changes: ProposedChanges = read_json(&path)?;
                    engine.preview_with(&id, &changes, date)?
                }
                None => engine.preview(&id, date)?,
            };
            print_preview(&preview);
        }
        RecommendationAction::Respond {
            id,
            response,
            changes,
            notes,
        } => {
            let response = match response {
                ResponseKind::Accept => RecommendationResponse::Accept,
                ResponseKind::Dismiss => RecommendationResponse::Dismiss,
                ResponseKind::Modify => {
                    let path = changes.context("--changes is required to modify")?;
                    RecommendationResponse::Modify(read_json(&path)?)
                }
            };
            let recommendation = engine.respond(&id, response, notes, today())?;
            println!("{} Recommendation {}", "✓".green(), recommendation.status.to_string().bold());
        }
    }

    Ok(())
}

fn print_recommendation(recommendation: &Recommendation) {
    let status = match recommendation.status {
        RecommendationStatus::Pending => recommendation.status.to_string().yellow(),
        RecommendationStatus::Accepted | RecommendationStatus::Modified => {
            recommendation.status.to_string().green()
        }
        RecommendationStatus::Dismissed => recommendation.status.to_string().dimmed(),
    };
    println!(
        "{} [{}] {} on {} {}",
        recommendation.id.dimmed(),
        status,
        recommendation.recommendation_type().to_string().bold(),
        recommendation.target.level(),
        recommendation.target.id()
    );
    println!("    {}", recommendation.rationale);
}

fn print_preview(preview: &RecommendationPreview) {
    println!(
        "{} {}",
        "Preview".blue().bold(),
        preview.recommendation_type.to_string().bold()
    );
    for item in &preview.affected_items {
        println!("  • [{}] {}", item.level, item.description);
    }

    let impact = &preview.timeline_impact;
    if impact.days_shifted != 0 {
        println!(
            "  Timeline: {} phase(s) shift {} days",
            impact.phases_shifted, impact.days_shifted
        );
        if let Some(end) = impact.projected_plan_end {
            println!("  Plan would end {}", end);
        }
    }
    for conflict in &impact.conflicts {
        println!("  {} {}", "Conflict:".red().bold(), conflict);
    }

    let load = &preview.training_load_projection;
    println!(
        "  Form (TSB): now {}, +7d {}, +14d {}",
        load.current_tsb, load.tsb_in_7_days, load.tsb_in_14_days
    );
    for benefit in &preview.benefits {
        println!("  {} {}", "+".green(), benefit);
    }
    for risk in &preview.risks {
        println!("  {} {}", "-".red(), risk);
    }
}

fn open_store(config: &EngineConfig) -> Result<SqliteStore> {
    let path = config.database_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }
    SqliteStore::open(&path).with_context(|| format!("Failed to open database: {}", path.display()))
}

fn current_form(
    store: &SqliteStore,
    config: &EngineConfig,
    athlete: &str,
    date: NaiveDate,
) -> Result<Option<Decimal>> {
    let lookback = i64::from(config.load.ctl_window_days) * i64::from(config.load.window_cap_multiplier);
    let samples = store.load_samples(athlete, date - Duration::days(lookback), date)?;
    if samples.is_empty() {
        return Ok(None);
    }
    let aggregator = LoadAggregator::with_config(config.load.clone(), config.risk.clone());
    Ok(Some(aggregator.calculate_metrics(&samples, date).tsb))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
