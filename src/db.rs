use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{missing_as_empty, StoreError};
use crate::models::{
    ChangelogRow, DisciplineRow, LeaveRow, ManagementRow, RosterRow, StatRow, StoreSnapshot, Task,
    TaskKind, TaskRow,
};
use crate::normalize::{name_key, timestamp_label};
use crate::staff::StaffAction;
use crate::tasks::{completion_details, encode_kind, mark_strike, task_from_row, NewTask};
use crate::workflow::EXCEPTION_TAG;

const STAT_COLUMNS: &str = "staff_name, date, senior, quizzes_accepted, quizzes_rejected, \
     new_ig_reports, new_forum_reports, new_discord, total_reports_completed, \
     total_forum_reports, total_discord, strike_given, loa_days";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const SEED_ROSTER: [(&str, &str, &str); 3] = [
    ("Ash Reyes", "TRUE", "FALSE"),
    ("June Okafor", "TRUE", "FALSE"),
    ("Kai Nakamura", "TRUE", "TRUE"),
];

const SEED_MANAGER: &str = "Mira Holt";

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    for (name, support, senior) in SEED_ROSTER {
        sqlx::query(
            r#"
            INSERT INTO staff_dashboard.roster (id, name, support, senior_support)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (
                SELECT 1 FROM staff_dashboard.roster WHERE lower(trim(name)) = $5
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(support)
        .bind(senior)
        .bind(name_key(name))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO staff_dashboard.management_roster (id, name)
        SELECT $1, $2
        WHERE NOT EXISTS (
            SELECT 1 FROM staff_dashboard.management_roster WHERE lower(trim(name)) = $3
        )
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(SEED_MANAGER)
    .bind(name_key(SEED_MANAGER))
    .execute(pool)
    .await?;

    let existing: i64 = sqlx::query("SELECT COUNT(*) AS count FROM staff_dashboard.monthly_stats")
        .fetch_one(pool)
        .await?
        .try_get("count")?;
    if existing > 0 {
        debug!("stats already present, skipping seeded months");
        return Ok(());
    }

    commit_batch(pool, &seed_stats()).await?;

    sqlx::query(
        r#"
        INSERT INTO staff_dashboard.leaves (id, name, start_date, end_date)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("June Okafor")
    .bind("2026-02-01")
    .bind("2026-02-07")
    .execute(pool)
    .await?;

    Ok(())
}

fn seed_stats() -> Vec<StatRow> {
    let months = [
        ("Ash Reyes", "01/Jan/2026", "31", "1,031", "4", "40"),
        ("June Okafor", "01/Jan/2026", "27", "827", "0", "12"),
        ("Kai Nakamura", "01/Jan/2026", "35", "1,535", "6", "80"),
        ("Ash Reyes", "01/Feb/2026", "12", "1,043", "1", "41"),
        ("June Okafor", "01/Feb/2026", "30", "857", "2", "14"),
        ("Kai Nakamura", "01/Feb/2026", "33", "1,568", "2", "86"),
    ];
    months
        .into_iter()
        .map(|(name, date, new_ig, total_ig, new_forum, total_forum)| StatRow {
            staff_name: name.to_string(),
            date: date.to_string(),
            new_ig: new_ig.to_string(),
            total_ig: total_ig.to_string(),
            new_forum: new_forum.to_string(),
            total_forum: total_forum.to_string(),
            new_discord: "0".to_string(),
            total_discord: "0".to_string(),
            strike_given: "0".to_string(),
            loa_days: "0".to_string(),
            ..StatRow::default()
        })
        .collect()
}

/// Reads every table a roster view needs, concurrently. A missing table reads
/// as empty; any other failure fails the whole load.
pub async fn load_store(pool: &PgPool) -> Result<StoreSnapshot, StoreError> {
    let (roster, management, stats, leaves, changelog, discipline, tasks) = tokio::join!(
        fetch_roster(pool),
        fetch_management(pool),
        fetch_stats(pool),
        fetch_leaves(pool),
        fetch_changelog(pool),
        fetch_discipline(pool),
        fetch_tasks(pool),
    );

    Ok(StoreSnapshot {
        roster: missing_as_empty(roster)?,
        management: missing_as_empty(management)?,
        stats: missing_as_empty(stats)?,
        leaves: missing_as_empty(leaves)?,
        changelog: missing_as_empty(changelog)?,
        discipline: missing_as_empty(discipline)?,
        tasks: missing_as_empty(tasks)?,
    })
}

fn text(row: &PgRow, column: &str) -> sqlx::Result<String> {
    row.try_get(column)
}

async fn read_section<T>(
    pool: &PgPool,
    table: &'static str,
    query: &str,
    map: fn(&PgRow) -> sqlx::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .await
        .map_err(StoreError::in_section(table))?;
    Ok(rows.iter().map(map).collect::<sqlx::Result<Vec<T>>>()?)
}

fn roster_row(row: &PgRow) -> sqlx::Result<RosterRow> {
    Ok(RosterRow {
        name: text(row, "name")?,
        support: text(row, "support")?,
        senior_support: text(row, "senior_support")?,
        discord_id: text(row, "discord_id")?,
        forum_link: text(row, "forum_link")?,
    })
}

pub async fn fetch_roster(pool: &PgPool) -> Result<Vec<RosterRow>, StoreError> {
    read_section(
        pool,
        "roster",
        "SELECT name, support, senior_support, discord_id, forum_link \
         FROM staff_dashboard.roster ORDER BY position",
        roster_row,
    )
    .await
}

fn management_row(row: &PgRow) -> sqlx::Result<ManagementRow> {
    Ok(ManagementRow {
        name: text(row, "name")?,
        discord_id: text(row, "discord_id")?,
        forum_link: text(row, "forum_link")?,
    })
}

pub async fn fetch_management(pool: &PgPool) -> Result<Vec<ManagementRow>, StoreError> {
    read_section(
        pool,
        "management_roster",
        "SELECT name, discord_id, forum_link FROM staff_dashboard.management_roster ORDER BY position",
        management_row,
    )
    .await
}

fn stat_row(row: &PgRow) -> sqlx::Result<StatRow> {
    Ok(StatRow {
        staff_name: text(row, "staff_name")?,
        date: text(row, "date")?,
        senior: text(row, "senior")?,
        quizzes_accepted: text(row, "quizzes_accepted")?,
        quizzes_rejected: text(row, "quizzes_rejected")?,
        new_ig: text(row, "new_ig_reports")?,
        new_forum: text(row, "new_forum_reports")?,
        new_discord: text(row, "new_discord")?,
        total_ig: text(row, "total_reports_completed")?,
        total_forum: text(row, "total_forum_reports")?,
        total_discord: text(row, "total_discord")?,
        strike_given: text(row, "strike_given")?,
        loa_days: text(row, "loa_days")?,
    })
}

pub async fn fetch_stats(pool: &PgPool) -> Result<Vec<StatRow>, StoreError> {
    let query = format!("SELECT {STAT_COLUMNS} FROM staff_dashboard.monthly_stats ORDER BY position");
    read_section(pool, "monthly_stats", &query, stat_row).await
}

fn leave_row(row: &PgRow) -> sqlx::Result<LeaveRow> {
    Ok(LeaveRow {
        name: text(row, "name")?,
        start_date: text(row, "start_date")?,
        end_date: text(row, "end_date")?,
    })
}

pub async fn fetch_leaves(pool: &PgPool) -> Result<Vec<LeaveRow>, StoreError> {
    read_section(
        pool,
        "leaves",
        "SELECT name, start_date, end_date FROM staff_dashboard.leaves ORDER BY position",
        leave_row,
    )
    .await
}

fn changelog_row(row: &PgRow) -> sqlx::Result<ChangelogRow> {
    Ok(ChangelogRow {
        timestamp: text(row, "timestamp")?,
        staff: text(row, "staff")?,
        action: text(row, "action")?,
    })
}

pub async fn fetch_changelog(pool: &PgPool) -> Result<Vec<ChangelogRow>, StoreError> {
    read_section(
        pool,
        "changelog",
        "SELECT timestamp, staff, action FROM staff_dashboard.changelog ORDER BY position",
        changelog_row,
    )
    .await
}

fn discipline_row(row: &PgRow) -> sqlx::Result<DisciplineRow> {
    Ok(DisciplineRow {
        timestamp: text(row, "timestamp")?,
        staff_name: text(row, "staff_name")?,
        note: text(row, "note")?,
    })
}

pub async fn fetch_discipline(pool: &PgPool) -> Result<Vec<DisciplineRow>, StoreError> {
    read_section(
        pool,
        "spoken_to_logs",
        "SELECT timestamp, staff_name, note FROM staff_dashboard.spoken_to_logs ORDER BY position",
        discipline_row,
    )
    .await
}

fn task_row(row: &PgRow) -> sqlx::Result<TaskRow> {
    Ok(TaskRow {
        task_id: text(row, "task_id")?,
        timestamp: text(row, "timestamp")?,
        title: text(row, "title")?,
        description: text(row, "description")?,
        target: text(row, "target")?,
        status: text(row, "status")?,
        claimed_by: text(row, "claimed_by")?,
        kind: text(row, "kind")?,
        subjects: text(row, "subjects")?,
    })
}

const TASK_COLUMNS: &str =
    "task_id, timestamp, title, description, target, status, claimed_by, kind, subjects";

pub async fn fetch_tasks(pool: &PgPool) -> Result<Vec<TaskRow>, StoreError> {
    let query = format!("SELECT {TASK_COLUMNS} FROM staff_dashboard.tasks ORDER BY position");
    read_section(pool, "tasks", &query, task_row).await
}

fn forum_author(row: &PgRow) -> sqlx::Result<String> {
    text(row, "author")
}

pub async fn fetch_forum_authors(pool: &PgPool) -> Result<Vec<String>, StoreError> {
    read_section(
        pool,
        "forum_reports",
        "SELECT author FROM staff_dashboard.forum_reports ORDER BY position",
        forum_author,
    )
    .await
}

async fn insert_stat_row<'e, E>(executor: E, row: &StatRow) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let query = format!(
        "INSERT INTO staff_dashboard.monthly_stats (id, {STAT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
    );
    sqlx::query(&query)
        .bind(Uuid::new_v4())
        .bind(row.staff_name.trim())
        .bind(&row.date)
        .bind(&row.senior)
        .bind(&row.quizzes_accepted)
        .bind(&row.quizzes_rejected)
        .bind(&row.new_ig)
        .bind(&row.new_forum)
        .bind(&row.new_discord)
        .bind(&row.total_ig)
        .bind(&row.total_forum)
        .bind(&row.total_discord)
        .bind(&row.strike_given)
        .bind(&row.loa_days)
        .execute(executor)
        .await
        .map_err(StoreError::in_section("monthly_stats"))?;
    Ok(())
}

/// Imports monthly stat rows from a CSV export of the stats tab.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<StatRow>() {
        let row = result?;
        if row.staff_name.trim().is_empty() {
            continue;
        }
        rows.push(row);
    }

    Ok(commit_batch(pool, &rows).await?)
}

/// Appends a month of stat rows in one transaction.
pub async fn commit_batch(pool: &PgPool, rows: &[StatRow]) -> Result<usize, StoreError> {
    let mut tx = pool.begin().await?;
    for row in rows {
        insert_stat_row(&mut *tx, row).await?;
    }
    tx.commit().await?;
    info!(rows = rows.len(), "committed monthly stat rows");
    Ok(rows.len())
}

async fn append_changelog(
    tx: &mut Transaction<'_, Postgres>,
    timestamp: &str,
    staff: &str,
    action: &str,
    flags: (&str, &str),
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO staff_dashboard.changelog (id, timestamp, staff, action, support, senior_support)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(timestamp)
    .bind(staff)
    .bind(action)
    .bind(flags.0)
    .bind(flags.1)
    .execute(&mut **tx)
    .await
    .map_err(StoreError::in_section("changelog"))?;
    Ok(())
}

/// Applies a roster change and records it in the changelog.
pub async fn manage_staff(
    pool: &PgPool,
    name: &str,
    action: &StaffAction,
    is_management: bool,
    today: NaiveDate,
) -> Result<(), StoreError> {
    let table = if is_management { "management_roster" } else { "roster" };
    let key = name_key(name);
    let mut tx = pool.begin().await?;

    let existing: Option<Uuid> = sqlx::query(&format!(
        "SELECT id FROM staff_dashboard.{table} WHERE lower(trim(name)) = $1 ORDER BY position LIMIT 1"
    ))
    .bind(&key)
    .fetch_optional(&mut *tx)
    .await
    .map_err(StoreError::in_section(table))?
    .map(|row| row.try_get("id"))
    .transpose()?;

    if let StaffAction::EditProfile {
        new_name,
        discord_id,
        forum_link,
    } = action
    {
        let id = existing.ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let renamed = new_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(name.trim());

        sqlx::query(&format!(
            "UPDATE staff_dashboard.{table} \
             SET name = $2, discord_id = COALESCE($3, discord_id), forum_link = COALESCE($4, forum_link) \
             WHERE id = $1"
        ))
        .bind(id)
        .bind(renamed)
        .bind(discord_id.as_deref())
        .bind(forum_link.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::in_section(table))?;

        if !is_management && name_key(renamed) != key {
            let moved = sqlx::query(
                "UPDATE staff_dashboard.monthly_stats SET staff_name = $2 WHERE lower(trim(staff_name)) = $1",
            )
            .bind(&key)
            .bind(renamed)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::in_section("monthly_stats"))?;
            debug!(from = %name, to = %renamed, rows = moved.rows_affected(), "renamed stat rows");
        }

        tx.commit().await?;
        return Ok(());
    }

    if is_management {
        manage_management_member(&mut tx, existing, name, action).await?;
        tx.commit().await?;
        return Ok(());
    }

    let flags = action
        .flags()
        .ok_or_else(|| StoreError::NotFound(name.to_string()))?
        .cells();

    match existing {
        Some(id) => {
            sqlx::query(
                "UPDATE staff_dashboard.roster SET support = $2, senior_support = $3 WHERE id = $1",
            )
            .bind(id)
            .bind(flags.0)
            .bind(flags.1)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::in_section("roster"))?;
        }
        None if action.creates_row() => {
            sqlx::query(
                r#"
                INSERT INTO staff_dashboard.roster (id, name, support, senior_support)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name.trim())
            .bind(flags.0)
            .bind(flags.1)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::in_section("roster"))?;
        }
        None => return Err(StoreError::NotFound(name.to_string())),
    }

    if let Some(label) = action.changelog_label() {
        append_changelog(&mut tx, &timestamp_label(today), name.trim(), &label, flags).await?;
    }

    tx.commit().await?;
    info!(staff = %name, ?action, "roster updated");
    Ok(())
}

async fn manage_management_member(
    tx: &mut Transaction<'_, Postgres>,
    existing: Option<Uuid>,
    name: &str,
    action: &StaffAction,
) -> Result<(), StoreError> {
    match (action, existing) {
        (StaffAction::Add(_), None) => {
            sqlx::query("INSERT INTO staff_dashboard.management_roster (id, name) VALUES ($1, $2)")
                .bind(Uuid::new_v4())
                .bind(name.trim())
                .execute(&mut **tx)
                .await
                .map_err(StoreError::in_section("management_roster"))?;
        }
        (StaffAction::Add(_), Some(_)) => {}
        (StaffAction::Remove { .. }, Some(id)) => {
            sqlx::query("DELETE FROM staff_dashboard.management_roster WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(StoreError::in_section("management_roster"))?;
        }
        _ => return Err(StoreError::NotFound(name.to_string())),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub enum LeaveChange {
    Add {
        name: String,
        start: String,
        end: String,
    },
    Edit {
        name: String,
        old_start: String,
        old_end: String,
        start: String,
        end: String,
    },
    Delete {
        name: String,
        old_start: String,
        old_end: String,
    },
}

pub async fn manage_leave(pool: &PgPool, change: &LeaveChange) -> Result<(), StoreError> {
    let result = match change {
        LeaveChange::Add { name, start, end } => {
            sqlx::query(
                "INSERT INTO staff_dashboard.leaves (id, name, start_date, end_date) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(name.trim())
            .bind(start)
            .bind(end)
            .execute(pool)
            .await
        }
        LeaveChange::Edit {
            name,
            old_start,
            old_end,
            start,
            end,
        } => {
            sqlx::query(
                r#"
                UPDATE staff_dashboard.leaves SET start_date = $4, end_date = $5
                WHERE id = (
                    SELECT id FROM staff_dashboard.leaves
                    WHERE lower(trim(name)) = $1 AND start_date = $2 AND end_date = $3
                    ORDER BY position LIMIT 1
                )
                "#,
            )
            .bind(name_key(name))
            .bind(old_start)
            .bind(old_end)
            .bind(start)
            .bind(end)
            .execute(pool)
            .await
        }
        LeaveChange::Delete {
            name,
            old_start,
            old_end,
        } => {
            sqlx::query(
                r#"
                DELETE FROM staff_dashboard.leaves
                WHERE id = (
                    SELECT id FROM staff_dashboard.leaves
                    WHERE lower(trim(name)) = $1 AND start_date = $2 AND end_date = $3
                    ORDER BY position LIMIT 1
                )
                "#,
            )
            .bind(name_key(name))
            .bind(old_start)
            .bind(old_end)
            .execute(pool)
            .await
        }
    }
    .map_err(StoreError::in_section("leaves"))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("{change:?}")));
    }
    Ok(())
}

/// Appends a spoken-to or metric exception note, mirrored into the changelog.
pub async fn log_spoken_to(
    pool: &PgPool,
    name: &str,
    note: &str,
    today: NaiveDate,
) -> Result<(), StoreError> {
    let timestamp = timestamp_label(today);
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO staff_dashboard.spoken_to_logs (id, timestamp, staff_name, note) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(&timestamp)
    .bind(name.trim())
    .bind(note)
    .execute(&mut *tx)
    .await
    .map_err(StoreError::in_section("spoken_to_logs"))?;

    let flags = match sqlx::query(
        "SELECT support, senior_support FROM staff_dashboard.roster \
         WHERE lower(trim(name)) = $1 ORDER BY position LIMIT 1",
    )
    .bind(name_key(name))
    .fetch_optional(&mut *tx)
    .await
    .map_err(StoreError::in_section("roster"))?
    {
        Some(row) => (text(&row, "support")?, text(&row, "senior_support")?),
        None => ("TRUE".to_string(), "FALSE".to_string()),
    };

    let action = if note.starts_with(EXCEPTION_TAG) {
        EXCEPTION_TAG
    } else {
        "Spoken To Log Issued"
    };
    append_changelog(
        &mut tx,
        &timestamp,
        name.trim(),
        action,
        (flags.0.as_str(), flags.1.as_str()),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

async fn append_task_log<'e, E>(
    executor: E,
    timestamp: &str,
    task_id: &str,
    action: &str,
    title: &str,
    details: &str,
) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO staff_dashboard.task_log (id, timestamp, task_id, action, task_title, details)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(timestamp)
    .bind(task_id)
    .bind(action)
    .bind(title)
    .bind(details)
    .execute(executor)
    .await
    .map_err(StoreError::in_section("task_log"))?;
    Ok(())
}

pub async fn add_tasks(pool: &PgPool, tasks: &[NewTask], today: NaiveDate) -> Result<(), StoreError> {
    let timestamp = timestamp_label(today);
    let mut tx = pool.begin().await?;

    for task in tasks {
        let (kind, subjects) = encode_kind(&task.kind);
        sqlx::query(
            r#"
            INSERT INTO staff_dashboard.tasks
            (task_id, timestamp, title, description, target, status, claimed_by, kind, subjects)
            VALUES ($1, $2, $3, $4, $5, 'Pending', '', $6, $7)
            "#,
        )
        .bind(&task.id)
        .bind(&timestamp)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.target)
        .bind(kind)
        .bind(subjects)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::in_section("tasks"))?;

        append_task_log(
            &mut *tx,
            &timestamp,
            &task.id,
            "Created",
            &task.title,
            &format!("Assigned/Notified: {}", task.target),
        )
        .await?;
    }

    tx.commit().await?;
    info!(count = tasks.len(), "tasks created");
    Ok(())
}

async fn fetch_task(
    tx: &mut Transaction<'_, Postgres>,
    task_id: &str,
) -> Result<Task, StoreError> {
    let query = format!("SELECT {TASK_COLUMNS} FROM staff_dashboard.tasks WHERE task_id = $1");
    let row = sqlx::query(&query)
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(StoreError::in_section("tasks"))?
        .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))?;
    Ok(task_from_row(&task_row(&row)?))
}

#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task: Task,
    /// Date cell of the stat row that received the strike marker.
    pub struck_month: Option<String>,
}

/// Marks a task completed. Completing a strike task also sets the strike marker
/// on the referenced month's stat row, when one exists.
pub async fn complete_task(
    pool: &PgPool,
    task_id: &str,
    today: NaiveDate,
) -> Result<TaskCompletion, StoreError> {
    let mut tx = pool.begin().await?;
    let task = fetch_task(&mut tx, task_id).await?;

    sqlx::query("UPDATE staff_dashboard.tasks SET status = 'Completed' WHERE task_id = $1")
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::in_section("tasks"))?;

    let mut struck_month = None;
    if let TaskKind::IssueStrike { staff_name } = &task.kind {
        let query = format!(
            "SELECT id, {STAT_COLUMNS} FROM staff_dashboard.monthly_stats \
             WHERE lower(trim(staff_name)) = $1 ORDER BY position"
        );
        let records = sqlx::query(&query)
            .bind(name_key(staff_name))
            .fetch_all(&mut *tx)
            .await
            .map_err(StoreError::in_section("monthly_stats"))?;

        let ids = records
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<sqlx::Result<Vec<Uuid>>>()?;
        let mut rows = records
            .iter()
            .map(stat_row)
            .collect::<sqlx::Result<Vec<StatRow>>>()?;

        match mark_strike(&mut rows, &task) {
            Some(index) => {
                sqlx::query("UPDATE staff_dashboard.monthly_stats SET strike_given = $2 WHERE id = $1")
                    .bind(ids[index])
                    .bind(&rows[index].strike_given)
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::in_section("monthly_stats"))?;
                struck_month = Some(rows[index].date.clone());
            }
            None => debug!(task = %task_id, staff = %staff_name, "no stat row for strike month"),
        }
    }

    append_task_log(
        &mut *tx,
        &timestamp_label(today),
        task_id,
        "Completed",
        &task.title,
        &completion_details(&task),
    )
    .await?;

    tx.commit().await?;
    Ok(TaskCompletion { task, struck_month })
}

pub async fn delete_task(pool: &PgPool, task_id: &str, today: NaiveDate) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    let task = fetch_task(&mut tx, task_id).await?;

    sqlx::query("DELETE FROM staff_dashboard.tasks WHERE task_id = $1")
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::in_section("tasks"))?;

    append_task_log(
        &mut *tx,
        &timestamp_label(today),
        task_id,
        "Deleted",
        &task.title,
        "Permanently removed from workspace",
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn claim_task(pool: &PgPool, task_id: &str, claimed_by: &str) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE staff_dashboard.tasks SET claimed_by = $2 WHERE task_id = $1")
        .bind(task_id)
        .bind(claimed_by.trim())
        .execute(pool)
        .await
        .map_err(StoreError::in_section("tasks"))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("task {task_id}")));
    }
    Ok(())
}

pub async fn load_scratchpad(pool: &PgPool) -> anyhow::Result<String> {
    let row = sqlx::query("SELECT data FROM staff_dashboard.scratchpad WHERE id = 1")
        .fetch_optional(pool)
        .await
        .context("failed to read scratchpad")?;
    match row {
        Some(row) => Ok(text(&row, "data")?),
        None => Ok(String::new()),
    }
}

/// Saves the pasted panel text; an empty string clears it.
pub async fn save_scratchpad(pool: &PgPool, data: &str) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO staff_dashboard.scratchpad (id, data) VALUES (1, $1)
        ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data
        "#,
    )
    .bind(data)
    .execute(pool)
    .await
    .map_err(StoreError::in_section("scratchpad"))?;
    Ok(())
}
