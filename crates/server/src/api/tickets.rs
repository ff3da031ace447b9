//! Purchase intent API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use presale_core::{AddOutcome, RegisteredTicket, TicketBuyer, TicketEntry};

use super::handlers::{error_response, supervisor_error, ApiError, MessageResponse};
use crate::state::AppState;

/// Request body for registering an intent
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub project_id: i64,
    pub sku_id: i64,
    pub screen_id: i64,
    pub sale_start: DateTime<Utc>,
    pub sale_expire: DateTime<Utc>,
    pub buyer: TicketBuyer,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub sku_name: String,
    #[serde(default)]
    pub screen_name: String,
}

impl From<CreateTicketBody> for TicketEntry {
    fn from(body: CreateTicketBody) -> Self {
        TicketEntry {
            project_id: body.project_id,
            sku_id: body.sku_id,
            screen_id: body.screen_id,
            sale_start: body.sale_start,
            sale_expire: body.sale_expire,
            buyer: body.buyer,
            project_name: body.project_name,
            sku_name: body.sku_name,
            screen_name: body.screen_name,
        }
    }
}

/// Response for listing intents
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<RegisteredTicket>,
    pub total: usize,
}

/// Register an intent. `201` for a new intent, `200` when an equal one is
/// already registered.
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTicketBody>,
) -> Result<(StatusCode, Json<AddOutcome>), ApiError> {
    if body.sale_expire <= body.sale_start {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "sale_expire must be after sale_start",
        ));
    }

    let outcome = state
        .supervisor()
        .add_ticket(TicketEntry::from(body))
        .await
        .map_err(supervisor_error)?;

    let status = if outcome.is_added() {
        info!(ticket = %outcome.hash(), "Intent registered via API");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// List registered intents, earliest sale first.
pub async fn list_tickets(State(state): State<Arc<AppState>>) -> Json<ListTicketsResponse> {
    let tickets = state.supervisor().tickets().await;
    Json(ListTicketsResponse {
        total: tickets.len(),
        tickets,
    })
}

/// Remove an intent: stops its routine and cancels its scheduled start.
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .supervisor()
        .remove_ticket(&hash)
        .await
        .map_err(supervisor_error)?;

    Ok(Json(MessageResponse {
        message: format!("Intent {} removed", hash),
    }))
}
