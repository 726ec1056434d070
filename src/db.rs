use anyhow::Context;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ClaimError;
use crate::models::{
    Claim, ClaimStatus, HouseAggregate, MonthKey, Reward, StudentStanding, UploadOutcome,
    UploadReceipt,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Writes house totals and per-student monthly points for a confirmed
/// upload in a single transaction.
///
/// Every write is an upsert keyed by campus/month/house or email/month,
/// so re-running the same upload leaves the same rows behind.
pub async fn persist_upload(
    pool: &PgPool,
    outcome: &UploadOutcome,
    source: &str,
) -> anyhow::Result<UploadReceipt> {
    let campus = outcome.summary.campus.as_str();
    let month = outcome.summary.month.to_string();
    let mut tx = pool.begin().await?;

    for house in &outcome.houses {
        sqlx::query(
            r#"
            INSERT INTO house_points.house_points
            (campus, year_month, house, member_count, dual_sum, individual_avg, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (campus, year_month, house) DO UPDATE
            SET member_count = EXCLUDED.member_count,
                dual_sum = EXCLUDED.dual_sum,
                individual_avg = EXCLUDED.individual_avg,
                total = EXCLUDED.total,
                updated_at = now()
            "#,
        )
        .bind(campus)
        .bind(&month)
        .bind(&house.house)
        .bind(i32::try_from(house.member_count)?)
        .bind(house.dual_sum)
        .bind(house.individual_avg)
        .bind(house.total)
        .execute(&mut *tx)
        .await?;
    }

    let mut students_written = 0usize;
    for student in outcome.students_by_email() {
        sqlx::query(
            r#"
            INSERT INTO house_points.students (email, full_name, house, campus)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = COALESCE(NULLIF(EXCLUDED.full_name, ''), students.full_name),
                house = COALESCE(NULLIF(EXCLUDED.house, ''), students.house),
                campus = COALESCE(NULLIF(EXCLUDED.campus, ''), students.campus),
                updated_at = now()
            "#,
        )
        .bind(&student.email)
        .bind(&student.student_name)
        .bind(&student.house)
        .bind(&student.campus)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO house_points.monthly_points
            (email, year_month, campus, individual_academic, individual_culture,
             house_contribution_academic, house_contribution_culture,
             council_total, individual_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (email, year_month) DO UPDATE
            SET campus = EXCLUDED.campus,
                individual_academic = EXCLUDED.individual_academic,
                individual_culture = EXCLUDED.individual_culture,
                house_contribution_academic = EXCLUDED.house_contribution_academic,
                house_contribution_culture = EXCLUDED.house_contribution_culture,
                council_total = EXCLUDED.council_total,
                individual_total = EXCLUDED.individual_total,
                updated_at = now()
            "#,
        )
        .bind(&student.email)
        .bind(&month)
        .bind(campus)
        .bind(student.individual_academic)
        .bind(student.individual_culture)
        .bind(student.house_contribution_academic)
        .bind(student.house_contribution_culture)
        .bind(student.council_total)
        .bind(student.individual_total)
        .execute(&mut *tx)
        .await?;

        students_written += 1;
    }

    let batch_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO house_points.upload_batches
        (id, campus, year_month, source, student_count, house_count)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(batch_id)
    .bind(campus)
    .bind(&month)
    .bind(source)
    .bind(i32::try_from(students_written)?)
    .bind(i32::try_from(outcome.houses.len())?)
    .execute(&mut *tx)
    .await?;

    tx.commit().await.context("failed to commit upload")?;
    info!(%batch_id, campus, month = %month, students_written, "upload committed");

    Ok(UploadReceipt {
        batch_id,
        houses_written: outcome.houses.len(),
        students_written,
        students_without_email: outcome
            .students
            .iter()
            .filter(|s| s.email.is_empty())
            .count(),
    })
}

pub async fn fetch_leaderboard(
    pool: &PgPool,
    campus: &str,
    month: MonthKey,
) -> anyhow::Result<Vec<HouseAggregate>> {
    let rows = sqlx::query(
        r#"
        SELECT house, member_count, dual_sum, individual_avg, total
        FROM house_points.house_points
        WHERE campus = $1 AND year_month = $2
        ORDER BY total DESC, house
        "#,
    )
    .bind(campus)
    .bind(month.to_string())
    .fetch_all(pool)
    .await?;

    let mut houses = Vec::with_capacity(rows.len());
    for row in rows {
        let member_count: i32 = row.get("member_count");
        houses.push(HouseAggregate {
            house: row.get("house"),
            member_count: usize::try_from(member_count)?,
            dual_sum: row.get("dual_sum"),
            individual_avg: row.get("individual_avg"),
            total: row.get("total"),
        });
    }

    Ok(houses)
}

pub async fn fetch_top_students(
    pool: &PgPool,
    campus: &str,
    month: MonthKey,
    limit: usize,
) -> anyhow::Result<Vec<StudentStanding>> {
    let rows = sqlx::query(
        r#"
        SELECT s.full_name, s.email, s.house, m.individual_total
        FROM house_points.monthly_points m
        JOIN house_points.students s ON s.email = m.email
        WHERE m.campus = $1 AND m.year_month = $2
        ORDER BY m.individual_total DESC, s.full_name
        LIMIT $3
        "#,
    )
    .bind(campus)
    .bind(month.to_string())
    .bind(i64::try_from(limit)?)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| StudentStanding {
            student_name: row.get("full_name"),
            email: row.get("email"),
            house: row.get("house"),
            individual_total: row.get("individual_total"),
        })
        .collect())
}

pub async fn add_reward(
    pool: &PgPool,
    title: &str,
    description: &str,
    required_level: i32,
    point_cost: i32,
    campus: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO house_points.rewards
        (id, title, description, required_level, point_cost, campus, active)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(required_level)
    .bind(point_cost)
    .bind(campus)
    .execute(pool)
    .await
    .context("failed to create reward")?;

    Ok(id)
}

/// Rewards visible to a campus: campus-specific ones plus those open to
/// every campus.
pub async fn list_rewards(
    pool: &PgPool,
    campus: Option<&str>,
    include_inactive: bool,
) -> anyhow::Result<Vec<Reward>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, description, required_level, point_cost, campus, active, created_at
        FROM house_points.rewards
        WHERE ($1::text IS NULL OR campus IS NULL OR campus = $1)
          AND ($2 OR active)
        ORDER BY required_level, point_cost, title
        "#,
    )
    .bind(campus)
    .bind(include_inactive)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Reward {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            required_level: row.get("required_level"),
            point_cost: row.get("point_cost"),
            campus: row.get("campus"),
            active: row.get("active"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn set_reward_active(pool: &PgPool, id: Uuid, active: bool) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE house_points.rewards SET active = $2 WHERE id = $1")
        .bind(id)
        .bind(active)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Records a pending claim unless the house already holds a pending or
/// approved claim on the same reward for the month.
///
/// The partial unique index on open claims makes the insert itself the
/// uniqueness check, so two concurrent submissions cannot both land.
pub async fn submit_claim(
    pool: &PgPool,
    user_email: &str,
    house: &str,
    reward_id: Uuid,
    month: MonthKey,
) -> Result<Claim, ClaimError> {
    let reward = sqlx::query("SELECT active FROM house_points.rewards WHERE id = $1")
        .bind(reward_id)
        .fetch_optional(pool)
        .await?;
    match reward {
        None => return Err(ClaimError::RewardNotFound(reward_id)),
        Some(row) if !row.get::<bool, _>("active") => {
            return Err(ClaimError::RewardInactive(reward_id))
        }
        Some(_) => {}
    }

    let id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO house_points.claims (id, user_email, house, reward_id, month_key, status)
        VALUES ($1, $2, $3, $4, $5, 'pending')
        ON CONFLICT (house, reward_id, month_key) WHERE status <> 'rejected' DO NOTHING
        RETURNING created_at
        "#,
    )
    .bind(id)
    .bind(user_email)
    .bind(house)
    .bind(reward_id)
    .bind(month.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = inserted else {
        debug!(house, %reward_id, month = %month, "claim slot already taken");
        return Err(ClaimError::SlotTaken {
            house: house.to_string(),
            month: month.to_string(),
        });
    };

    Ok(Claim {
        id,
        user_email: user_email.to_string(),
        house: house.to_string(),
        reward_id,
        month,
        status: ClaimStatus::Pending,
        created_at: row.get("created_at"),
        reviewed_at: None,
    })
}

pub async fn review_claim(pool: &PgPool, id: Uuid, status: ClaimStatus) -> Result<(), ClaimError> {
    if status == ClaimStatus::Pending {
        return Err(ClaimError::InvalidReview);
    }

    let result = sqlx::query(
        r#"
        UPDATE house_points.claims
        SET status = $2, reviewed_at = now()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        info!(%id, status = status.as_str(), "claim reviewed");
        return Ok(());
    }

    let exists = sqlx::query("SELECT 1 FROM house_points.claims WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match exists {
        Some(_) => Err(ClaimError::NotPending(id)),
        None => Err(ClaimError::ClaimNotFound(id)),
    }
}

pub async fn list_claims(
    pool: &PgPool,
    month: Option<MonthKey>,
    status: Option<ClaimStatus>,
) -> anyhow::Result<Vec<Claim>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_email, house, reward_id, month_key, status, created_at, reviewed_at
        FROM house_points.claims
        WHERE ($1::text IS NULL OR month_key = $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at
        "#,
    )
    .bind(month.map(|m| m.to_string()))
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    let mut claims = Vec::with_capacity(rows.len());
    for row in rows {
        let month_key: String = row.get("month_key");
        let status: String = row.get("status");
        claims.push(Claim {
            id: row.get("id"),
            user_email: row.get("user_email"),
            house: row.get("house"),
            reward_id: row.get("reward_id"),
            month: month_key.parse()?,
            status: status.parse().map_err(anyhow::Error::msg)?,
            created_at: row.get("created_at"),
            reviewed_at: row.get("reviewed_at"),
        });
    }

    Ok(claims)
}
