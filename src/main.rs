use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;
mod db;
mod error;
mod ingest;
mod models;
mod normalize;
mod report;
mod schema;
mod scoring;

use config::Config;
use models::{ClaimStatus, MonthKey, UploadOutcome};
use schema::PointSchema;
use scoring::{CulturalWinnerScope, ScoringOptions};

#[derive(Parser)]
#[command(name = "house-points")]
#[command(about = "Monthly house points and rewards for campus students", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SheetArgs {
    /// CSV export of the monthly points sheet
    #[arg(long)]
    csv: PathBuf,
    /// Campus to score; rows for other campuses are ignored
    #[arg(long)]
    campus: String,
    /// Reporting month as YYYY-MM (defaults to the current month)
    #[arg(long)]
    month: Option<MonthKey>,
    /// Point schema JSON (overrides POINTS_SCHEMA)
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Who competes for the cultural award (overrides CULTURAL_WINNER_SCOPE)
    #[arg(long, value_enum)]
    cultural_scope: Option<CulturalWinnerScope>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Score a sheet and print the summary without saving anything
    Preview {
        #[command(flatten)]
        sheet: SheetArgs,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Score a sheet and save house and student points for the month
    Upload {
        #[command(flatten)]
        sheet: SheetArgs,
        /// Write to the database; without it the upload is only previewed
        #[arg(long)]
        confirm: bool,
    },
    /// Score a sheet and write a markdown report
    Report {
        #[command(flatten)]
        sheet: SheetArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Show the saved house leaderboard for a campus and month
    Leaderboard {
        #[arg(long)]
        campus: String,
        #[arg(long)]
        month: Option<MonthKey>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Print the effective point schema as JSON
    Schema {
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Manage rewards
    #[command(subcommand)]
    Reward(RewardCommand),
    /// Submit, review and list reward claims
    #[command(subcommand)]
    Claim(ClaimCommand),
}

#[derive(Subcommand)]
enum RewardCommand {
    /// Create an active reward
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = 0)]
        required_level: i32,
        #[arg(long)]
        point_cost: i32,
        /// Limit the reward to one campus; omit for every campus
        #[arg(long)]
        campus: Option<String>,
    },
    List {
        #[arg(long)]
        campus: Option<String>,
        /// Include disabled rewards
        #[arg(long)]
        all: bool,
    },
    Enable {
        id: Uuid,
    },
    Disable {
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum ClaimCommand {
    /// Claim a reward for a house and month
    Submit {
        #[arg(long)]
        email: String,
        #[arg(long)]
        house: String,
        #[arg(long)]
        reward: Uuid,
        #[arg(long)]
        month: Option<MonthKey>,
    },
    /// Approve or reject a pending claim
    Review {
        id: Uuid,
        #[arg(long, value_enum)]
        status: ClaimStatus,
    },
    List {
        #[arg(long)]
        month: Option<MonthKey>,
        #[arg(long, value_enum)]
        status: Option<ClaimStatus>,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn canonical_or_bail(kind: &str, value: &str, canonical: &[String]) -> anyhow::Result<String> {
    match normalize::canonicalize(value, canonical) {
        Some(hit) => Ok(hit.to_string()),
        None => bail!("unknown {kind} \"{value}\" (expected one of: {})", canonical.join(", ")),
    }
}

fn score_sheet(config: &Config, sheet: &SheetArgs) -> anyhow::Result<UploadOutcome> {
    let schema = config.point_schema(sheet.schema.as_ref())?;
    let table = ingest::read_sheet(&sheet.csv)?;
    let options = ScoringOptions {
        cultural_scope: sheet.cultural_scope.unwrap_or(config.cultural_scope),
    };
    let month = sheet.month.unwrap_or_else(MonthKey::current);

    let outcome = scoring::compute_summary(&table, &schema, &sheet.campus, month, options)
        .context("upload rejected")?;
    Ok(outcome)
}

fn print_warnings(outcome: &UploadOutcome) {
    for line in report::warning_lines(&outcome.warnings) {
        println!("Warning: {line}");
    }
}

fn source_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Preview { sheet, json } => {
            let outcome = score_sheet(&config, &sheet)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", report::build_report(&outcome));
            }
        }
        Commands::Upload { sheet, confirm } => {
            let outcome = score_sheet(&config, &sheet)?;
            print!("{}", report::build_report(&outcome));

            if !confirm {
                println!();
                println!("Nothing saved. Run again with --confirm to save these points.");
                return Ok(());
            }

            let pool = connect(&config).await?;
            info!(campus = %outcome.summary.campus, "saving upload");
            let receipt = db::persist_upload(&pool, &outcome, &source_label(&sheet.csv))
                .await
                .context("upload failed, no points were saved")?;

            println!();
            println!(
                "Saved {} houses and {} students for {} {} (batch {}).",
                receipt.houses_written,
                receipt.students_written,
                outcome.summary.campus,
                outcome.summary.month,
                receipt.batch_id
            );
            if receipt.students_without_email > 0 {
                println!(
                    "{} students without an email were counted in house totals only.",
                    receipt.students_without_email
                );
            }
        }
        Commands::Report { sheet, out } => {
            let outcome = score_sheet(&config, &sheet)?;
            print_warnings(&outcome);
            std::fs::write(&out, report::build_report(&outcome))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Leaderboard {
            campus,
            month,
            limit,
            schema,
        } => {
            let schema = config.point_schema(schema.as_ref())?;
            let campus = canonical_or_bail("campus", &campus, &schema.campuses)?;
            let month = month.unwrap_or_else(MonthKey::current);
            let pool = connect(&config).await?;

            let houses = db::fetch_leaderboard(&pool, &campus, month).await?;
            if houses.is_empty() {
                println!("No points saved for {campus} {month}.");
                return Ok(());
            }

            println!("House leaderboard for {campus} {month}:");
            for (rank, house) in houses.iter().enumerate() {
                println!(
                    "{}. {} total {:.2} ({} students)",
                    rank + 1,
                    house.house,
                    house.total,
                    house.member_count
                );
            }

            let students = db::fetch_top_students(&pool, &campus, month, limit).await?;
            if !students.is_empty() {
                println!();
                println!("Top students:");
                for student in students {
                    println!(
                        "- {} ({}, {}) total {:.1}",
                        student.student_name, student.email, student.house, student.individual_total
                    );
                }
            }
        }
        Commands::Schema { schema } => {
            let schema: PointSchema = config.point_schema(schema.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::Reward(command) => {
            let schema = config.point_schema(None)?;
            let pool = connect(&config).await?;
            match command {
                RewardCommand::Add {
                    title,
                    description,
                    required_level,
                    point_cost,
                    campus,
                } => {
                    if required_level < 0 || point_cost < 0 {
                        bail!("required level and point cost must not be negative");
                    }
                    let campus = campus
                        .map(|c| canonical_or_bail("campus", &c, &schema.campuses))
                        .transpose()?;
                    let id = db::add_reward(
                        &pool,
                        &title,
                        &description,
                        required_level,
                        point_cost,
                        campus.as_deref(),
                    )
                    .await?;
                    println!("Created reward {id}.");
                }
                RewardCommand::List { campus, all } => {
                    let campus = campus
                        .map(|c| canonical_or_bail("campus", &c, &schema.campuses))
                        .transpose()?;
                    let rewards = db::list_rewards(&pool, campus.as_deref(), all).await?;
                    if rewards.is_empty() {
                        println!("No rewards found.");
                    }
                    for reward in rewards {
                        println!(
                            "- {} {} (level {}, {} points, {}{})",
                            reward.id,
                            reward.title,
                            reward.required_level,
                            reward.point_cost,
                            reward.campus.as_deref().unwrap_or("all campuses"),
                            if reward.active { "" } else { ", disabled" }
                        );
                    }
                }
                RewardCommand::Enable { id } => {
                    if !db::set_reward_active(&pool, id, true).await? {
                        bail!("reward {id} does not exist");
                    }
                    println!("Reward {id} enabled.");
                }
                RewardCommand::Disable { id } => {
                    if !db::set_reward_active(&pool, id, false).await? {
                        bail!("reward {id} does not exist");
                    }
                    println!("Reward {id} disabled.");
                }
            }
        }
        Commands::Claim(command) => {
            let schema = config.point_schema(None)?;
            let pool = connect(&config).await?;
            match command {
                ClaimCommand::Submit {
                    email,
                    house,
                    reward,
                    month,
                } => {
                    let house = canonical_or_bail("house", &house, &schema.houses)?;
                    let month = month.unwrap_or_else(MonthKey::current);
                    let claim = db::submit_claim(&pool, email.trim(), &house, reward, month).await?;
                    println!(
                        "Claim {} submitted for {} ({}), pending review.",
                        claim.id, claim.house, claim.month
                    );
                }
                ClaimCommand::Review { id, status } => {
                    db::review_claim(&pool, id, status).await?;
                    println!("Claim {id} {}.", status.as_str());
                }
                ClaimCommand::List { month, status } => {
                    let claims = db::list_claims(&pool, month, status).await?;
                    if claims.is_empty() {
                        println!("No claims found.");
                    }
                    for claim in claims {
                        println!(
                            "- {} {} {} reward {} by {} [{}]",
                            claim.id,
                            claim.month,
                            claim.house,
                            claim.reward_id,
                            claim.user_email,
                            claim.status.as_str()
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
