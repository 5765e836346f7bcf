use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::database::models::{SubjectKind, VoteTally};
use crate::voting::{UserVoteView, VoteEngine, VoteValue};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct CastVoteRequest {
    value: i64,
}

fn parse_kind(raw: &str) -> Result<SubjectKind, ApiError> {
    raw.parse().map_err(ApiError::BadRequest)
}

pub(crate) async fn cast_vote(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((kind, subject_id)): Path<(String, String)>,
    payload: Result<Json<CastVoteRequest>, JsonRejection>,
) -> ApiResult<VoteTally> {
    let kind = parse_kind(&kind)?;
    let Json(payload) = payload?;
    let value = VoteValue::try_from(payload.value)?;
    let engine = VoteEngine::new(state.database.clone());
    let tally = engine.cast_vote(kind, &subject_id, &session.user_id, value)?;
    Ok(Json(tally))
}

pub(crate) async fn get_votes(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((kind, subject_id)): Path<(String, String)>,
) -> ApiResult<UserVoteView> {
    let kind = parse_kind(&kind)?;
    let engine = VoteEngine::new(state.database.clone());
    Ok(Json(engine.get_votes(kind, &subject_id, &session.user_id)?))
}
