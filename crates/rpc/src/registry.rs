//! Registry endpoints.
//!
//! Every request body is a [`SignedCall`]. The envelope is verified here and
//! only the resulting [`VerifiedCaller`] is handed to the registry. Publish
//! and grant bodies are additionally checked against recently applied calls.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use drive_types::{
    unix_millis, Address, CallPayload, GrantPayload, GrantResponse, GranteesPayload,
    GranteesResponse, ListPayload, ListResponse, PublishPayload, PublishResponse, SignedCall,
    VerifiedCaller,
};
use drive_registry::RegistryError;
use serde_json::Value;
use tracing::{debug, warn};

use crate::server::{ApiError, AppState, SharedState};

type Body = Result<Json<Value>, JsonRejection>;

/// Verify a call that only reads state.
fn authenticate<P: CallPayload>(
    state: &AppState,
    body: Body,
) -> Result<(VerifiedCaller, P), ApiError> {
    let (caller, call) = verify_call::<P>(state, body)?;
    Ok((caller, call.payload))
}

/// Verify a call that mutates state. Each signed write is applied at most
/// once; resending the same body inside the skew window is rejected.
fn authenticate_once<P: CallPayload>(
    state: &AppState,
    body: Body,
) -> Result<(VerifiedCaller, P), ApiError> {
    let (caller, call) = verify_call::<P>(state, body)?;
    let digest = call.digest()?;
    if !state
        .replay
        .check_and_mark(digest, call.timestamp_ms, unix_millis(), state.max_clock_skew_ms)
    {
        warn!(caller = %call.caller, op = P::OPERATION, "rejected replayed call");
        return Err(ApiError::replayed());
    }
    Ok((caller, call.payload))
}

fn verify_call<P: CallPayload>(
    state: &AppState,
    body: Body,
) -> Result<(VerifiedCaller, SignedCall<P>), ApiError> {
    let Json(value) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let present = |field: &str| value.get(field).is_some_and(|v| !v.is_null());
    if !present("caller") || !present("signature") {
        return Err(ApiError::unauthenticated());
    }

    let call: SignedCall<P> = serde_json::from_value(value)
        .map_err(|err| ApiError::bad_request(format!("malformed {} call: {err}", P::OPERATION)))?;
    let caller = call
        .verify(unix_millis(), state.max_clock_skew_ms)
        .inspect_err(|err| debug!(caller = %call.caller, op = P::OPERATION, "rejected call: {err}"))?;
    Ok((caller, call))
}

pub(crate) async fn handle_publish(
    State(state): State<SharedState>,
    body: Body,
) -> Result<Json<PublishResponse>, ApiError> {
    state.record_request();
    let (caller, payload) = authenticate_once::<PublishPayload>(&state, body)?;

    let receipt = state
        .registry
        .publish(&caller, &payload.content)?
        .confirmed()
        .await?;

    Ok(Json(PublishResponse {
        owner: receipt.owner,
        index: receipt.index,
        entries: receipt.entries,
    }))
}

pub(crate) async fn handle_grant(
    State(state): State<SharedState>,
    body: Body,
) -> Result<Json<GrantResponse>, ApiError> {
    state.record_request();
    let (caller, payload) = authenticate_once::<GrantPayload>(&state, body)?;
    let grantee: Address = payload.grantee.parse().map_err(RegistryError::from)?;

    let receipt = state
        .registry
        .grant_access(&caller, &grantee)?
        .confirmed()
        .await?;

    Ok(Json(GrantResponse {
        grantor: receipt.grantor,
        grantee: receipt.grantee,
        inserted: receipt.inserted,
    }))
}

pub(crate) async fn handle_list(
    State(state): State<SharedState>,
    body: Body,
) -> Result<Json<ListResponse>, ApiError> {
    state.record_request();
    let (caller, payload) = authenticate::<ListPayload>(&state, body)?;
    let owner = match payload.owner.as_deref() {
        Some(raw) => raw.parse::<Address>().map_err(RegistryError::from)?,
        None => caller.address(),
    };

    let entries: Vec<String> = state
        .registry
        .list(&caller, &owner)?
        .into_iter()
        .map(|entry| entry.into_string())
        .collect();

    Ok(Json(ListResponse {
        owner,
        total: entries.len(),
        entries,
    }))
}

pub(crate) async fn handle_grantees(
    State(state): State<SharedState>,
    body: Body,
) -> Result<Json<GranteesResponse>, ApiError> {
    state.record_request();
    let (caller, _) = authenticate::<GranteesPayload>(&state, body)?;
    let grantees = state.registry.grantees(&caller)?;

    Ok(Json(GranteesResponse {
        grantor: caller.address(),
        total: grantees.len(),
        grantees,
    }))
}
