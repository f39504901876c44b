//! HTTP handlers for the oracle.
//!
//! - `GET /api/daily-challenge`: ordered rounds for one session
//! - `GET /api/get-game-round`: a single round
//! - `POST /api/submit-guess`: score a guess and reveal the round

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{OracleError, OracleState};
use crate::protocol::GuessRequest;
use crate::types::{Round, Verdict};

pub async fn hello() -> Json<Value> {
    Json(json!({ "Hello": "From the CommentGuesser API" }))
}

pub async fn daily_challenge(State(state): State<Arc<OracleState>>) -> Json<Vec<Round>> {
    let issued = state.issue(state.config.rounds_per_path).await;
    tracing::info!("Issued a path of {} rounds", issued.len());
    Json(issued.into_iter().map(|i| i.round).collect())
}

pub async fn get_game_round(
    State(state): State<Arc<OracleState>>,
) -> Result<Json<Round>, OracleError> {
    let issued = state.issue(1).await;
    let round = issued
        .into_iter()
        .next()
        .map(|i| i.round)
        .ok_or(OracleError::NoPlayableVideos)?;
    Ok(Json(round))
}

pub async fn submit_guess(
    State(state): State<Arc<OracleState>>,
    Json(request): Json<GuessRequest>,
) -> Result<Json<Verdict>, OracleError> {
    let mut book = state.book.write().await;

    let issued = book.get(&request.round_id).ok_or_else(|| {
        tracing::warn!("Guess for unknown round {}", request.round_id);
        OracleError::RoundNotFound
    })?;

    let verdict = issued
        .score(&request.comment_id, state.config.mode)
        .inspect_err(|_| {
            tracing::warn!(
                "Comment {} is not in round {}",
                request.comment_id,
                request.round_id
            )
        })?;

    book.remove(&request.round_id);
    tracing::info!(
        "Round {} scored: {} ({} still open)",
        request.round_id,
        if verdict.is_correct { "correct" } else { "wrong" },
        book.len()
    );

    Ok(Json(verdict))
}
