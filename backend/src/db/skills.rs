use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::{Skill, SkillKind, SkillLevel, SkillListing, UserProfile};

pub async fn add_skill(
    pool: &SqlitePool,
    user_id: Uuid,
    kind: SkillKind,
    name: &str,
    category: &str,
    description: Option<&str>,
    rate: i64,
    level: SkillLevel,
) -> Result<Skill, sqlx::Error> {
    let skill = sqlx::query_as::<_, Skill>(
        r#"
        INSERT INTO skills (id, user_id, kind, name, category, description, rate, level, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        RETURNING id, user_id, kind, name, category, description, rate, level, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(kind)
    .bind(name)
    .bind(category)
    .bind(description)
    .bind(rate)
    .bind(level)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(skill)
}

/// Deletes a skill, but only if it belongs to the given user and list.
/// Returns whether anything was removed.
pub async fn remove_skill(
    pool: &SqlitePool,
    user_id: Uuid,
    kind: SkillKind,
    skill_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM skills
        WHERE id = ?1 AND user_id = ?2 AND kind = ?3
        "#,
    )
    .bind(skill_id)
    .bind(user_id)
    .bind(kind)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_skill(pool: &SqlitePool, skill_id: Uuid) -> Result<Option<Skill>, sqlx::Error> {
    let skill = sqlx::query_as::<_, Skill>(
        r#"
        SELECT id, user_id, kind, name, category, description, rate, level, created_at
        FROM skills
        WHERE id = ?1
        "#,
    )
    .bind(skill_id)
    .fetch_optional(pool)
    .await?;

    Ok(skill)
}

/// Both lists for one user, in the order they were added.
pub async fn list_skills_for_user(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<Skill>, sqlx::Error> {
    let skills = sqlx::query_as::<_, Skill>(
        r#"
        SELECT id, user_id, kind, name, category, description, rate, level, created_at
        FROM skills
        WHERE user_id = ?1
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(skills)
}

#[derive(Debug, FromRow)]
struct OfferedSkillRow {
    id: Uuid,
    user_id: Uuid,
    kind: SkillKind,
    name: String,
    category: String,
    description: Option<String>,
    rate: i64,
    level: SkillLevel,
    created_at: DateTime<Utc>,
    owner_name: String,
    owner_avatar: Option<String>,
}

/// Browse all offered skills, optionally narrowed by a free-text query over
/// name/description and an exact category.
pub async fn search_offered_skills(
    pool: &SqlitePool,
    query: Option<&str>,
    category: Option<&str>,
) -> Result<Vec<SkillListing>, sqlx::Error> {
    let pattern = query.map(|q| format!("%{}%", q));

    let rows = sqlx::query_as::<_, OfferedSkillRow>(
        r#"
        SELECT s.id, s.user_id, s.kind, s.name, s.category, s.description,
               s.rate, s.level, s.created_at,
               u.name AS owner_name, u.avatar AS owner_avatar
        FROM skills s
        JOIN users u ON u.id = s.user_id
        WHERE s.kind = 'offered'
          AND (?1 IS NULL OR s.name LIKE ?1 OR s.description LIKE ?1)
          AND (?2 IS NULL OR s.category = ?2)
        ORDER BY s.created_at DESC
        "#,
    )
    .bind(pattern)
    .bind(category)
    .fetch_all(pool)
    .await?;

    let listings = rows
        .into_iter()
        .map(|row| SkillListing {
            owner: UserProfile {
                id: row.user_id,
                name: row.owner_name,
                avatar: row.owner_avatar,
            },
            skill: Skill {
                id: row.id,
                user_id: row.user_id,
                kind: row.kind,
                name: row.name,
                category: row.category,
                description: row.description,
                rate: row.rate,
                level: row.level,
                created_at: row.created_at,
            },
        })
        .collect();

    Ok(listings)
}
