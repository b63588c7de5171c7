use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

mod batch;
mod config;
mod db;
mod discord;
mod error;
mod leaderboard;
mod leave;
mod models;
mod normalize;
mod quota;
mod reliability;
mod report;
mod roster;
mod staff;
mod tasks;
mod workflow;

use config::Config;
use discord::DiscordClient;
use models::{Rank, TaskStatus};
use normalize::{compact_name, MonthKey};
use reliability::TimeWindow;
use roster::Roster;
use staff::StaffAction;
use tasks::{task_from_row, NewTask, MANAGEMENT_TARGET};
use workflow::{CaseState, Dismissals};

const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Parser)]
#[command(name = "staff-quota")]
#[command(about = "Monthly quota, reliability and strike tracking for the support team", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import monthly stat rows from a CSV export
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the roster with lifetime figures
    Roster {
        #[arg(long)]
        json: bool,
    },
    /// Flag staff who missed quota for a month
    Evaluate {
        /// Defaults to the most recent month with stats
        #[arg(long, value_parser = parse_month)]
        month: Option<MonthKey>,
        /// Names already handled this session
        #[arg(long)]
        dismiss: Vec<String>,
        /// Show every staff member's state, not only open cases
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Create an Issue Strike task for a flagged month and notify management
    Strike {
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_month)]
        month: Option<MonthKey>,
    },
    /// Log a metric exception for a flagged month
    Except {
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_month)]
        month: Option<MonthKey>,
        #[arg(long)]
        reason: String,
    },
    /// Log that staff members were spoken to
    Note {
        #[arg(long = "name", required = true)]
        names: Vec<String>,
        #[arg(long)]
        note: String,
    },
    /// Quota history and reliability of one staff member
    Analyze {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Top performers for a window
    Leaderboard {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Side-by-side figures for named staff
    Compare {
        #[arg(long = "name", required = true)]
        names: Vec<String>,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Support vs Senior Support reliability
    Groups {
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, value_parser = parse_month)]
        month: Option<MonthKey>,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Roster changes
    #[command(subcommand)]
    Staff(StaffCommand),
    /// Leave of absence records
    #[command(subcommand)]
    Leave(LeaveCommand),
    /// Management task list
    #[command(subcommand)]
    Task(TaskCommand),
    /// Build next month's stat rows from a pasted staff panel export
    Prepare(PrepareArgs),
}

#[derive(Args, Clone, Copy)]
#[command(group(
    ArgGroup::new("window")
        .args(["lifetime", "months", "in_month", "from"])
        .multiple(false)
))]
struct WindowArgs {
    #[arg(long)]
    lifetime: bool,
    /// Trailing number of months
    #[arg(long)]
    months: Option<u32>,
    #[arg(long = "in-month", value_parser = parse_month)]
    in_month: Option<MonthKey>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
}

impl WindowArgs {
    fn window(self) -> TimeWindow {
        if let Some(months) = self.months {
            TimeWindow::TrailingMonths(months)
        } else if let Some(month) = self.in_month {
            TimeWindow::Month(month)
        } else if self.from.is_some() || self.to.is_some() {
            TimeWindow::DateRange {
                start: self.from,
                end: self.to,
            }
        } else {
            TimeWindow::Lifetime
        }
    }
}

#[derive(Subcommand)]
enum StaffCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value = "support")]
        rank: Rank,
        #[arg(long)]
        management: bool,
    },
    Remove {
        #[arg(long)]
        name: String,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        management: bool,
    },
    Promote {
        #[arg(long)]
        name: String,
    },
    Demote {
        #[arg(long)]
        name: String,
    },
    Reinstate {
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value = "support")]
        rank: Rank,
    },
    UpdateRank {
        #[arg(long)]
        name: String,
        #[arg(long, value_enum)]
        rank: Rank,
    },
    Edit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        new_name: Option<String>,
        #[arg(long)]
        discord_id: Option<String>,
        #[arg(long)]
        forum_link: Option<String>,
        #[arg(long)]
        management: bool,
    },
}

impl StaffCommand {
    fn into_action(self) -> (String, StaffAction, bool) {
        match self {
            StaffCommand::Add {
                name,
                rank,
                management,
            } => (name, StaffAction::Add(rank), management),
            StaffCommand::Remove {
                name,
                reason,
                management,
            } => (name, StaffAction::Remove { reason }, management),
            StaffCommand::Promote { name } => (name, StaffAction::Promote, false),
            StaffCommand::Demote { name } => (name, StaffAction::Demote, false),
            StaffCommand::Reinstate { name, rank } => (name, StaffAction::Reinstate(rank), false),
            StaffCommand::UpdateRank { name, rank } => (name, StaffAction::UpdateRank(rank), false),
            StaffCommand::Edit {
                name,
                new_name,
                discord_id,
                forum_link,
                management,
            } => (
                name,
                StaffAction::EditProfile {
                    new_name,
                    discord_id,
                    forum_link,
                },
                management,
            ),
        }
    }
}

#[derive(Subcommand)]
enum LeaveCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    Edit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        old_start: String,
        #[arg(long)]
        old_end: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    Delete {
        #[arg(long)]
        name: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
}

impl From<LeaveCommand> for db::LeaveChange {
    fn from(command: LeaveCommand) -> Self {
        match command {
            LeaveCommand::Add { name, start, end } => db::LeaveChange::Add { name, start, end },
            LeaveCommand::Edit {
                name,
                old_start,
                old_end,
                start,
                end,
            } => db::LeaveChange::Edit {
                name,
                old_start,
                old_end,
                start,
                end,
            },
            LeaveCommand::Delete { name, start, end } => db::LeaveChange::Delete {
                name,
                old_start: start,
                old_end: end,
            },
        }
    }
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List tasks, pending only unless --all
    List {
        #[arg(long)]
        all: bool,
    },
    /// Create a task and post it to Discord
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = MANAGEMENT_TARGET)]
        target: String,
        /// Makes this a spoken-to task for the named staff
        #[arg(long = "spoken-to")]
        spoken_to: Vec<String>,
    },
    Complete {
        #[arg(long)]
        id: String,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    Claim {
        #[arg(long)]
        id: String,
        #[arg(long)]
        by: String,
    },
}

#[derive(Args)]
struct PrepareArgs {
    /// Month the new rows are dated
    #[arg(long, value_parser = parse_month)]
    month: MonthKey,
    /// Tab separated panel export; the saved scratchpad is used when omitted
    #[arg(long)]
    panel: Option<PathBuf>,
    /// Current Discord total, as NAME=TOTAL
    #[arg(long = "discord")]
    discord: Vec<String>,
    /// Leave taken during the month, as NAME=START..END
    #[arg(long = "leave")]
    leave: Vec<String>,
    /// Keep the panel text in the scratchpad for a later run
    #[arg(long)]
    save_panel: bool,
    /// Append the rows to the stats table and clear the scratchpad
    #[arg(long)]
    commit: bool,
}

fn parse_month(text: &str) -> Result<MonthKey, String> {
    MonthKey::parse(text).ok_or_else(|| format!("unrecognised month: {text}"))
}

fn split_assignment(text: &str) -> anyhow::Result<(String, &str)> {
    let (name, value) = text
        .split_once('=')
        .with_context(|| format!("expected NAME=VALUE, got {text}"))?;
    Ok((compact_name(name), value.trim()))
}

fn overrides(args: &PrepareArgs) -> anyhow::Result<batch::BatchOverrides> {
    let mut overrides = batch::BatchOverrides::default();
    for entry in &args.discord {
        let (name, total) = split_assignment(entry)?;
        let total: u32 = total
            .replace(',', "")
            .parse()
            .with_context(|| format!("Discord total is not a number: {entry}"))?;
        overrides.discord_totals.insert(name, total);
    }
    for entry in &args.leave {
        let (name, range) = split_assignment(entry)?;
        let (start, end) = range
            .split_once("..")
            .with_context(|| format!("expected NAME=START..END, got {entry}"))?;
        overrides
            .leave_ranges
            .insert(name, (start.trim().to_string(), end.trim().to_string()));
    }
    Ok(overrides)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Reads the store and builds the roster view. A store that cannot be read
/// yields an empty roster rather than an error.
async fn load_roster(pool: &PgPool, discord: &DiscordClient, today: NaiveDate) -> Roster {
    let store = roster::store_or_empty(db::load_store(pool).await);
    let names = discord.lookup_names(&roster::discord_ids(&store)).await;
    roster::assemble(&store, &names, today)
}

fn target_month(roster: &Roster, month: Option<MonthKey>) -> anyhow::Result<MonthKey> {
    match month.or_else(|| workflow::most_recent_month(&roster.staff)) {
        Some(month) => Ok(month),
        None => bail!("no monthly stats recorded yet"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Connections open on first use; read views degrade when the store is down.
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .connect_lazy(&config.database_url)
        .context("DATABASE_URL is not a valid Postgres URL")?;
    let discord = DiscordClient::new(config.discord.clone())?;
    let today = Utc::now().date_naive();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} stat rows from {}.", csv.display());
        }
        Commands::Roster { json } => {
            let roster = load_roster(&pool, &discord, today).await;
            if json {
                return print_json(&roster);
            }
            for member in &roster.staff {
                let mut line = format!(
                    "- {} ({}{}) reliability {}%, strikes {} ({} recent)",
                    member.name,
                    member.rank.label(),
                    if member.is_active { "" } else { ", inactive" },
                    reliability::staff_reliability(member, TimeWindow::Lifetime, today),
                    member.total_strikes,
                    member.recent_strikes
                );
                if !member.discord_name.is_empty() {
                    line.push_str(&format!(", Discord {}", member.discord_name));
                }
                if let Some(leave) = &member.active_leave {
                    line.push_str(&format!(", on leave until {leave}"));
                }
                if member.pending_strike {
                    line.push_str(", strike pending");
                }
                println!("{line}");
            }
            for member in &roster.management {
                println!(
                    "- {} (Management) {} pending task(s)",
                    member.name, member.pending_tasks
                );
            }
        }
        Commands::Evaluate {
            month,
            dismiss,
            all,
            json,
        } => {
            let roster = load_roster(&pool, &discord, today).await;
            let Some(month) = month.or_else(|| workflow::most_recent_month(&roster.staff)) else {
                println!("No monthly stats recorded yet.");
                return Ok(());
            };
            let mut dismissals = Dismissals::default();
            for name in &dismiss {
                dismissals.dismiss(name);
            }

            if all {
                let states: Vec<(&str, CaseState)> = roster
                    .staff
                    .iter()
                    .map(|member| (member.name.as_str(), workflow::case_state(member, month, &dismissals)))
                    .collect();
                if json {
                    return print_json(&states);
                }
                println!("Quota states for {month}:");
                for (name, state) in states {
                    println!("- {name}: {state:?}");
                }
                return Ok(());
            }

            let cases = workflow::flag_cases(&roster.staff, month, &dismissals);
            if json {
                return print_json(&cases);
            }
            if cases.is_empty() {
                println!("Everyone met quota for {month}.");
                return Ok(());
            }
            println!("Staff needing a decision for {month}:");
            for case in &cases {
                let pending = roster
                    .find(&case.name)
                    .is_some_and(|member| member.pending_strike);
                println!(
                    "- {}{}",
                    report::describe_case(case),
                    if pending { " [strike pending]" } else { "" }
                );
            }
        }
        Commands::Strike { name, month } => {
            let roster = load_roster(&pool, &discord, today).await;
            let month = target_month(&roster, month)?;
            let member = roster
                .find(&name)
                .with_context(|| format!("{name} is not on the roster"))?;
            if !matches!(
                workflow::case_state(member, month, &Dismissals::default()),
                CaseState::AtRisk(_)
            ) {
                warn!(staff = %member.name, %month, "creating a strike task for a month that is not flagged");
            }

            let task = NewTask::issue_strike(Uuid::new_v4().to_string(), &member.name, month);
            db::add_tasks(&pool, std::slice::from_ref(&task), today).await?;
            let notified = discord.push_tasks(std::slice::from_ref(&task), &task.target).await;
            println!(
                "Created task {} ({}){}.",
                task.id,
                task.title,
                if notified { ", management notified" } else { "" }
            );
        }
        Commands::Except {
            name,
            month,
            reason,
        } => {
            if reason.trim().is_empty() {
                bail!("an exception needs a reason");
            }
            let roster = load_roster(&pool, &discord, today).await;
            let month = target_month(&roster, month)?;
            let member = roster
                .find(&name)
                .with_context(|| format!("{name} is not on the roster"))?;
            if workflow::case_state(member, month, &Dismissals::default())
                != CaseState::AtRisk(workflow::Severity::High)
            {
                warn!(staff = %member.name, %month, "logging an exception for a month without an IG shortfall");
            }
            let note = workflow::exception_note(month, reason.trim());
            db::log_spoken_to(&pool, &member.name, &note, today).await?;
            println!("Logged exception for {} ({month}).", member.name);
        }
        Commands::Note { names, note } => {
            for name in &names {
                db::log_spoken_to(&pool, name, note.trim(), today).await?;
            }
            println!("Logged note for {} staff member(s).", names.len());
        }
        Commands::Analyze { name, window, json } => {
            let roster = load_roster(&pool, &discord, today).await;
            let member = roster
                .find(&name)
                .with_context(|| format!("{name} is not on the roster"))?;
            let window = window.window();
            let analysis = leaderboard::individual_analysis(member);
            if json {
                return print_json(&analysis);
            }

            println!(
                "{} ({}) reliability {}% over {}",
                member.name,
                member.rank.label(),
                reliability::staff_reliability(member, window, today),
                window.describe()
            );
            println!(
                "Latest {} month(s): {} met, {}%",
                analysis.months.len(),
                analysis.met_count,
                analysis.reliability
            );
            for month in &analysis.months {
                println!(
                    "- {}: {} (IG {} of {}, forum {})",
                    month.snapshot.month,
                    month.evaluation.status.label(),
                    month.snapshot.new_ig,
                    month.evaluation.ig_target,
                    month.snapshot.new_forum
                );
            }
            if !analysis.strikes.is_empty() {
                let strikes: Vec<String> = analysis.strikes.iter().map(MonthKey::label).collect();
                println!("Strikes: {}", strikes.join(", "));
            }
            for note in &member.notes {
                println!("Note {}: {note:?}", note.timestamp());
            }
        }
        Commands::Leaderboard { window, json } => {
            let roster = load_roster(&pool, &discord, today).await;
            let board = leaderboard::build_leaderboard(&roster.staff, window.window(), today);
            if json {
                return print_json(&board);
            }
            for (title, rows) in [
                ("In-game reports", &board.top_ig),
                ("Forum reports", &board.top_forum),
                ("Discord", &board.top_discord),
            ] {
                println!("{title}:");
                for (position, row) in rows.iter().enumerate() {
                    println!(
                        "  {}. {} (IG {}, forum {}, Discord {})",
                        position + 1,
                        row.name,
                        row.ig,
                        row.forum,
                        row.discord
                    );
                }
            }
        }
        Commands::Compare {
            names,
            window,
            json,
        } => {
            let roster = load_roster(&pool, &discord, today).await;
            let rows = leaderboard::compare_staff(&roster.staff, &names, window.window(), today);
            if json {
                return print_json(&rows);
            }
            for row in &rows {
                println!(
                    "- {} ({}): IG {}, forum {}, Discord {}, total {}, reliability {}%",
                    row.name,
                    row.rank.label(),
                    row.ig,
                    row.forum,
                    row.discord,
                    row.total,
                    row.reliability
                );
            }
        }
        Commands::Groups { json } => {
            let roster = load_roster(&pool, &discord, today).await;
            let rollups = [
                reliability::rank_rollup(&roster.staff, Rank::SeniorSupport, today),
                reliability::rank_rollup(&roster.staff, Rank::Support, today),
            ];
            if json {
                return print_json(&rollups);
            }
            for rollup in &rollups {
                println!("- {}", report::describe_rollup(rollup));
            }
        }
        Commands::Report { month, window, out } => {
            let roster = load_roster(&pool, &discord, today).await;
            let month = month.or_else(|| workflow::most_recent_month(&roster.staff));
            let report = report::build_report(&roster, month, window.window(), today);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Staff(command) => {
            let (name, action, management) = command.into_action();
            db::manage_staff(&pool, &name, &action, management, today).await?;
            println!("Updated {}.", name.trim());
        }
        Commands::Leave(command) => {
            let change = db::LeaveChange::from(command);
            db::manage_leave(&pool, &change).await?;
            println!("Leave records updated.");
        }
        Commands::Task(command) => run_task_command(&pool, &discord, command, today).await?,
        Commands::Prepare(args) => run_prepare(&pool, args).await?,
    }

    Ok(())
}

async fn run_task_command(
    pool: &PgPool,
    discord: &DiscordClient,
    command: TaskCommand,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match command {
        TaskCommand::List { all } => {
            let rows = db::fetch_tasks(pool).await?;
            for task in rows.iter().map(task_from_row) {
                if !all && task.status != TaskStatus::Pending {
                    continue;
                }
                let claimed = if task.claimed_by.is_empty() {
                    "unclaimed"
                } else {
                    task.claimed_by.as_str()
                };
                println!(
                    "- [{}] {} {} ({}, {claimed})",
                    task.status.as_str(),
                    task.id,
                    task.title,
                    task.target
                );
            }
        }
        TaskCommand::Create {
            title,
            description,
            target,
            spoken_to,
        } => {
            let id = Uuid::new_v4().to_string();
            let task = if spoken_to.is_empty() {
                NewTask::general(id, &title, &description, &target)
            } else {
                NewTask::spoken_to(id, &spoken_to, &description, &target)
            };
            db::add_tasks(pool, std::slice::from_ref(&task), today).await?;
            if !discord.push_tasks(std::slice::from_ref(&task), &task.target).await {
                warn!(task = %task.id, "task saved but Discord was not notified");
            }
            println!("Created task {}.", task.id);
        }
        TaskCommand::Complete { id } => {
            let completion = db::complete_task(pool, &id, today).await?;
            match completion.struck_month {
                Some(month) => println!(
                    "Completed {}; strike recorded on {month}.",
                    completion.task.title
                ),
                None => println!("Completed {}.", completion.task.title),
            }
        }
        TaskCommand::Delete { id } => {
            db::delete_task(pool, &id, today).await?;
            println!("Deleted task {id}.");
        }
        TaskCommand::Claim { id, by } => {
            db::claim_task(pool, &id, &by).await?;
            println!("Task {id} claimed by {}.", by.trim());
        }
    }
    Ok(())
}

async fn run_prepare(pool: &PgPool, args: PrepareArgs) -> anyhow::Result<()> {
    let panel = match &args.panel {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => db::load_scratchpad(pool).await?,
    };
    if panel.trim().is_empty() {
        bail!("no panel export given and the scratchpad is empty");
    }
    if args.save_panel {
        db::save_scratchpad(pool, &panel).await?;
    }

    let (roster, stats, forum_authors) = tokio::try_join!(
        db::fetch_roster(pool),
        db::fetch_stats(pool),
        async { error::missing_as_empty(db::fetch_forum_authors(pool).await) },
    )?;
    let baselines = batch::build_baselines(&roster, &stats, &forum_authors);
    let staged = batch::stage(&baselines, &panel);
    let rows = batch::build_rows(&staged, args.month, &overrides(&args)?);

    for (entry, row) in staged.iter().zip(&rows) {
        let marker = if entry.baseline.has_baseline { "" } else { " (no previous month)" };
        println!(
            "- {}: IG +{} ({}), forum +{}, Discord +{}, LOA {}{marker}",
            row.staff_name, row.new_ig, row.total_ig, row.new_forum, row.new_discord, row.loa_days
        );
    }

    if !args.commit {
        println!("Dry run; pass --commit to append {} row(s) for {}.", rows.len(), args.month);
        return Ok(());
    }

    let committed = db::commit_batch(pool, &rows).await?;
    db::save_scratchpad(pool, "").await?;
    info!(month = %args.month, rows = committed, "monthly batch committed");
    println!("Committed {committed} row(s) for {}.", args.month);
    Ok(())
}
