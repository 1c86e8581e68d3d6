use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

mod api;
mod batch;
mod config;
mod error;
mod models;
mod poller;
mod report;
mod simulate;
mod transform;

use api::ApiClient;
use error::PulseError;
use models::{DashboardStats, RiskLevel, StudentQuery, StudentRecord};
use poller::Poller;
use simulate::SimulationInput;

#[derive(Parser)]
#[command(name = "engagement-pulse")]
#[command(about = "Student engagement risk dashboard for the terminal", long_about = None)]
struct Cli {
    /// Backend base URL (overrides PULSE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum RiskArg {
    High,
    Medium,
    Low,
}

impl From<RiskArg> for RiskLevel {
    fn from(value: RiskArg) -> Self {
        match value {
            RiskArg::High => RiskLevel::High,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::Low => RiskLevel::Low,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show headline KPIs and the risk distribution
    Dashboard,
    /// List students with optional filters
    Students {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum)]
        risk: Option<RiskArg>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Show one student's full record
    Student { id: String },
    /// Request a model prediction for a feature payload (JSON, or @file)
    Predict {
        #[arg(long)]
        payload: String,
    },
    /// Recompute the risk score for hypothetical parameters
    Simulate {
        #[arg(long, default_value_t = 75.0)]
        attendance: f64,
        #[arg(long, default_value_t = 7.0)]
        cgpa: f64,
        #[arg(long, default_value_t = 4.0)]
        study_hours: f64,
        #[arg(long, default_value_t = 60.0)]
        participation: f64,
        /// Also ask the backend model to re-score this student with these values
        #[arg(long)]
        remote: Option<String>,
    },
    /// Print department and trend aggregates
    Analytics,
    /// Upload a CSV of students for batch scoring
    Upload {
        #[arg(long)]
        file: PathBuf,
    },
    /// Show the feature contributions behind a student's prediction
    Explain { id: String },
    /// Send an alert about a student
    Alert {
        id: String,
        #[arg(long, default_value = "high_risk")]
        alert_type: String,
    },
    /// Print model quality metrics
    ModelPerformance,
    /// Keep refreshing dashboard stats and analytics until interrupted
    Watch {
        #[arg(long, default_value_t = poller::DASHBOARD_REFRESH.as_secs())]
        dashboard_secs: u64,
        #[arg(long, default_value_t = poller::ANALYTICS_REFRESH.as_secs())]
        analytics_secs: u64,
    },
    /// Generate a markdown risk report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

/// Request failures become the view-level "error loading X" message.
fn unavailable(client: &ApiClient) -> impl Fn(PulseError) -> anyhow::Error + '_ {
    move |err| match err.operation() {
        Some(operation) => anyhow::Error::new(err).context(format!(
            "error loading {}, ensure the backend is running at {}",
            operation.subject(),
            client.base_url()
        )),
        None => err.into(),
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    if value.is_null() {
        println!("No data returned.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_stats(stats: &DashboardStats) {
    println!("Total students:     {}", stats.total_students);
    println!("Average engagement: {}%", stats.avg_engagement);
    println!("Disengagement rate: {}%", stats.disengagement_rate);
    for level in RiskLevel::KNOWN {
        println!(
            "{:<19} {} ({:.1}%)",
            format!("{level}:"),
            stats.count(level),
            stats.risk_share(level)
        );
    }
    if !stats.is_consistent() {
        tracing::warn!(
            total = stats.total_students,
            high = stats.high_risk,
            medium = stats.medium_risk,
            low = stats.low_risk,
            "risk tier counts do not sum to total"
        );
    }
}

fn print_student(student: &StudentRecord) {
    println!("{} ({})", student.name, student.id);
    println!("  {} [{}]", student.risk_level, student.risk_level.style().color);
    println!("  Department: {}  Year: {}", student.department, student.year);
    println!(
        "  Engagement {}  Attendance {}%  CGPA {:.2}  Credits {}",
        student.engagement_score, student.attendance, student.cgpa, student.credits_completed
    );
    println!("  Prediction confidence: {}%", student.prediction_confidence);
    if !student.email.is_empty() || !student.phone.is_empty() {
        println!("  Contact: {} {}", student.email, student.phone);
    }
    if student.risk_factors.is_empty() {
        println!("  No risk factors reported.");
    } else {
        println!("  Risk factors:");
        for factor in &student.risk_factors {
            println!("  - {factor}");
        }
    }
}

/// Students to request for a report of `limit` entries.
fn report_page_size(limit: usize) -> u32 {
    u32::try_from(limit.max(1)).unwrap_or(u32::MAX)
}

fn parse_payload(raw: &str) -> anyhow::Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload file {path}"))?,
        None => raw.to_string(),
    };
    let value: Value = serde_json::from_str(&text)
        .map_err(|err| PulseError::InvalidPayload(err.to_string()))?;
    if !value.is_object() {
        return Err(PulseError::InvalidPayload("expected a JSON object of features".into()).into());
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_env(cli.api_url)
        .context("PULSE_API_URL / PULSE_TIMEOUT_SECS are not usable")?;
    let client = ApiClient::new(&config).context("failed to set up the backend client")?;
    tracing::debug!(api_url = %config.api_url, "using backend");

    match cli.command {
        Commands::Dashboard => {
            let raw = client.dashboard_stats().await.map_err(unavailable(&client))?;
            print_stats(&transform::normalize_dashboard_stats(&raw));
        }
        Commands::Students {
            search,
            risk,
            department,
            page,
            per_page,
        } => {
            let query = StudentQuery {
                search,
                risk: risk.map(RiskLevel::from),
                department,
                page: Some(page),
                per_page: Some(per_page),
            };
            let raw = client.students(&query).await.map_err(unavailable(&client))?;
            let page = transform::normalize_student_page(&raw);

            if page.students.is_empty() {
                println!("No students match these filters.");
                return Ok(());
            }

            println!(
                "Page {} of {} ({} students)",
                page.current_page, page.total_pages, page.total_students
            );
            for student in &page.students {
                println!(
                    "- {:<10} {:<24} {:<20} {:<13} engagement {:>3} attendance {:>3}% CGPA {:.2}",
                    student.id,
                    student.name,
                    student.department,
                    student.risk_level.to_string(),
                    student.engagement_score,
                    student.attendance,
                    student.cgpa
                );
            }
        }
        Commands::Student { id } => {
            let raw = client.student(&id).await.map_err(unavailable(&client))?;
            print_student(&transform::normalize_student(&raw));
        }
        Commands::Predict { payload } => {
            let features = parse_payload(&payload)?;
            let raw = client.predict(&features).await.map_err(unavailable(&client))?;
            let prediction = transform::normalize_prediction(&raw);
            println!(
                "{}: engagement {} (confidence {}%)",
                prediction.risk_level, prediction.engagement_score, prediction.confidence
            );
        }
        Commands::Simulate {
            attendance,
            cgpa,
            study_hours,
            participation,
            remote,
        } => {
            let input = SimulationInput {
                attendance,
                cgpa,
                study_hours,
                participation,
            }
            .clamped();

            println!(
                "Attendance {}%  CGPA {}  Study hours {}  Participation {}%",
                input.attendance, input.cgpa, input.study_hours, input.participation
            );
            for contribution in input.contributions() {
                println!(
                    "  {:<14} {:>5.1} / {:.0}",
                    contribution.factor, contribution.points, contribution.max_points
                );
            }
            let level = input.risk_level();
            println!("Score {} -> {}", input.score(), level);
            let mut advice = input.recommendations().into_iter();
            if let Some(headline) = advice.next() {
                println!("{headline}");
            }
            for line in advice {
                println!("  - {line}");
            }

            if let Some(student_id) = remote {
                let scenario = input.to_payload(&student_id, level);
                let raw = client.simulate(&scenario).await.map_err(unavailable(&client))?;
                println!("Backend scenario result:");
                print_json(&raw)?;
            }
        }
        Commands::Analytics => {
            let raw = client.analytics().await.map_err(unavailable(&client))?;
            let departments = transform::department_breakdown(&raw);
            if departments.is_empty() {
                print_json(&raw)?;
            } else {
                for row in departments {
                    println!(
                        "{:<24} high {:>4} medium {:>4} low {:>4}",
                        row.department, row.high, row.medium, row.low
                    );
                }
            }
        }
        Commands::Upload { file } => {
            let raw = client
                .upload_batch(&file)
                .await
                .map_err(unavailable(&client))?;
            print_json(&raw)?;
        }
        Commands::Explain { id } => {
            let raw = client.shap_analysis(&id).await.map_err(unavailable(&client))?;
            let explanation = transform::normalize_explanation(&raw);
            println!(
                "{} {} (confidence {}%)",
                id, explanation.prediction, explanation.confidence
            );
            for feature in &explanation.features {
                println!("  {:<28} {:+.4}", feature.feature, feature.impact);
            }
        }
        Commands::Alert { id, alert_type } => {
            let raw = client
                .send_alert(&id, &alert_type)
                .await
                .map_err(unavailable(&client))?;
            let message = raw
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Alert sent.");
            println!("{message}");
        }
        Commands::ModelPerformance => {
            let raw = client
                .model_performance()
                .await
                .map_err(unavailable(&client))?;
            print_json(&raw)?;
        }
        Commands::Watch {
            dashboard_secs,
            analytics_secs,
        } => watch(client, dashboard_secs, analytics_secs).await?,
        Commands::Report { out, limit } => {
            let stats = client.dashboard_stats().await.map_err(unavailable(&client))?;
            let analytics = client.analytics().await.map_err(unavailable(&client))?;
            let query = StudentQuery {
                risk: Some(RiskLevel::High),
                page: Some(1),
                per_page: Some(report_page_size(limit)),
                ..StudentQuery::default()
            };
            let students = client.students(&query).await.map_err(unavailable(&client))?;

            let report = report::build_report(
                chrono::Utc::now(),
                &transform::normalize_dashboard_stats(&stats),
                &transform::department_breakdown(&analytics),
                &transform::normalize_student_page(&students).students,
                limit,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn watch(client: ApiClient, dashboard_secs: u64, analytics_secs: u64) -> anyhow::Result<()> {
    let mut dashboard: Poller<DashboardStats> =
        Poller::new("dashboard", Duration::from_secs(dashboard_secs.max(1)));
    let mut analytics: Poller<Value> =
        Poller::new("analytics", Duration::from_secs(analytics_secs.max(1)));
    let mut dashboard_updates = dashboard.snapshot().subscribe();
    let mut analytics_updates = analytics.snapshot().subscribe();

    let dashboard_client = client.clone();
    dashboard.restart(move || {
        let client = dashboard_client.clone();
        async move {
            let raw = client.dashboard_stats().await?;
            Ok(transform::normalize_dashboard_stats(&raw))
        }
    });
    analytics.restart(move || {
        let client = client.clone();
        async move { client.analytics().await }
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    println!("Watching backend, press Ctrl-C to stop.");
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("failed to listen for Ctrl-C")?;
                break;
            }
            Ok(()) = dashboard_updates.changed() => {
                let latest = dashboard_updates.borrow_and_update().clone();
                if let Some(stamped) = latest {
                    println!();
                    println!("Dashboard as of {}", stamped.fetched_at.format("%H:%M:%S"));
                    print_stats(&stamped.value);
                }
            }
            Ok(()) = analytics_updates.changed() => {
                let latest = analytics_updates.borrow_and_update().clone();
                if let Some(stamped) = latest {
                    println!();
                    println!("Departments as of {}", stamped.fetched_at.format("%H:%M:%S"));
                    for row in transform::department_breakdown(&stamped.value) {
                        println!(
                            "{:<24} high {:>4} medium {:>4} low {:>4}",
                            row.department, row.high, row.medium, row.low
                        );
                    }
                }
            }
        }
    }

    dashboard.stop();
    analytics.stop();
    println!("Stopped.");
    Ok(())
}
