use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::constants::{MIN_SKILL_RATE, NAME_CHAR_LIMIT};
use crate::db;
use crate::error::CoreError;
use crate::models::{Skill, SkillKind, SkillLevel, SkillListing, User};
use crate::services::auth;

use super::{ApiError, AppState, error_response, require_user};

#[derive(Debug, Deserialize)]
pub struct SkillInput {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rate: i64,
    #[serde(default)]
    pub level: Option<SkillLevel>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub skills_offered: Vec<SkillInput>,
    #[serde(default)]
    pub skills_wanted: Vec<SkillInput>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub user: User,
    pub skills_offered: Vec<Skill>,
    pub skills_wanted: Vec<Skill>,
}

fn validate_skill_input(input: &SkillInput) -> Result<(), CoreError> {
    if input.name.trim().is_empty() || input.name.chars().count() > NAME_CHAR_LIMIT {
        return Err(CoreError::InvalidMessage(format!(
            "skill name must be 1 to {NAME_CHAR_LIMIT} characters"
        )));
    }
    if input.category.trim().is_empty() {
        return Err(CoreError::InvalidMessage(
            "skill category must not be empty".to_string(),
        ));
    }
    if input.rate < MIN_SKILL_RATE {
        return Err(CoreError::InvalidMessage(format!(
            "skill rate must be at least {MIN_SKILL_RATE}"
        )));
    }
    Ok(())
}

async fn insert_skills(
    state: &AppState,
    user: &User,
    kind: SkillKind,
    inputs: &[SkillInput],
) -> Result<Vec<Skill>, CoreError> {
    let mut skills = Vec::with_capacity(inputs.len());
    for input in inputs {
        let skill = db::skills::add_skill(
            &state.pool,
            user.id,
            kind,
            input.name.trim(),
            input.category.trim(),
            input.description.as_deref(),
            input.rate,
            input.level.unwrap_or_default(),
        )
        .await?;
        skills.push(skill);
    }
    Ok(skills)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, (StatusCode, Json<ApiError>)> {
    let result = async {
        if req.name.trim().is_empty() || req.name.chars().count() > NAME_CHAR_LIMIT {
            return Err(CoreError::InvalidMessage(format!(
                "name must be 1 to {NAME_CHAR_LIMIT} characters"
            )));
        }
        if !crate::utils::validation::is_valid_email(&req.email) {
            return Err(CoreError::InvalidEmail);
        }
        if db::users::get_user_by_email(&state.pool, &req.email)
            .await?
            .is_some()
        {
            return Err(CoreError::EmailTaken);
        }
        // Reject bad skill entries before the user row exists, so a failed
        // registration leaves nothing behind.
        for input in req.skills_offered.iter().chain(req.skills_wanted.iter()) {
            validate_skill_input(input)?;
        }

        let user = db::users::create_user(
            &state.pool,
            req.name.trim(),
            &req.email,
            req.bio.as_deref(),
            req.avatar.as_deref(),
        )
        .await?;

        let skills_offered =
            insert_skills(&state, &user, SkillKind::Offered, &req.skills_offered).await?;
        let skills_wanted =
            insert_skills(&state, &user, SkillKind::Wanted, &req.skills_wanted).await?;

        let token = auth::issue_token(&state.pool, user.id).await?;

        tracing::info!(user_id = %user.id, "user registered");

        Ok(RegisterResponse {
            token,
            user,
            skills_offered,
            skills_wanted,
        })
    }
    .await;

    result.map(Json).map_err(error_response)
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub skills_offered: Vec<Skill>,
    pub skills_wanted: Vec<Skill>,
    pub unread_count: i64,
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    let result = async {
        let skills = db::skills::list_skills_for_user(&state.pool, user.id).await?;
        let (skills_offered, skills_wanted) = skills
            .into_iter()
            .partition(|skill| skill.kind == SkillKind::Offered);
        let unread_count = crate::services::read_state::unread_count(&state.pool, user.id).await?;

        Ok(MeResponse {
            user,
            skills_offered,
            skills_wanted,
            unread_count,
        })
    }
    .await;

    result.map(Json).map_err(error_response)
}

#[derive(Debug, Deserialize)]
pub struct AddSkillRequest {
    pub kind: SkillKind,
    #[serde(flatten)]
    pub skill: SkillInput,
}

pub async fn add_skill(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddSkillRequest>,
) -> Result<Json<Skill>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    let result = async {
        validate_skill_input(&req.skill)?;
        let skill = db::skills::add_skill(
            &state.pool,
            user.id,
            req.kind,
            req.skill.name.trim(),
            req.skill.category.trim(),
            req.skill.description.as_deref(),
            req.skill.rate,
            req.skill.level.unwrap_or_default(),
        )
        .await?;
        Ok(skill)
    }
    .await;

    result.map(Json).map_err(error_response)
}

#[derive(Debug, Serialize)]
pub struct RemoveSkillResponse {
    pub removed: bool,
}

pub async fn remove_skill(
    State(state): State<AppState>,
    Path((kind, skill_id)): Path<(SkillKind, uuid::Uuid)>,
    headers: HeaderMap,
) -> Result<Json<RemoveSkillResponse>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    let removed = db::skills::remove_skill(&state.pool, user.id, kind, skill_id)
        .await
        .map_err(|err| error_response(CoreError::Database(err)))?;

    Ok(Json(RemoveSkillResponse { removed }))
}

pub async fn list_my_skills(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Skill>>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    let skills = db::skills::list_skills_for_user(&state.pool, user.id)
        .await
        .map_err(|err| error_response(CoreError::Database(err)))?;

    Ok(Json(skills))
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Public browse of everything on offer, optionally filtered; this backs
/// the marketplace home page.
pub async fn browse_skills(
    State(state): State<AppState>,
    Query(params): Query<BrowseQuery>,
) -> Result<Json<Vec<SkillListing>>, (StatusCode, Json<ApiError>)> {
    let listings = db::skills::search_offered_skills(
        &state.pool,
        params.query.as_deref().filter(|q| !q.trim().is_empty()),
        params.category.as_deref().filter(|c| !c.trim().is_empty()),
    )
    .await
    .map_err(|err| error_response(CoreError::Database(err)))?;

    Ok(Json(listings))
}
