use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde::Deserialize;

use crate::api::AppState;
use crate::capture::events::IngestEvent;
use crate::utils::error::AppError;

/// Request for updating capture settings
#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    /// Maximum number of packets kept in the buffer
    pub packet_limit: Option<usize>,
}

/// Deliver one ingestion event by its contract name
pub async fn ingest_event(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: String,
) -> impl Responder {
    let name = path.into_inner();

    let Some(event) = IngestEvent::from_name(&name, body) else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "status": "error",
            "message": format!("Unknown event '{}'", name),
            "events": IngestEvent::NAMES,
        }));
    };

    match state.capture.ingest(event).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "event": name,
        })),
        Err(e @ AppError::ParseError(_)) => HttpResponse::BadRequest().json(serde_json::json!({
            "status": "error",
            "message": format!("Invalid '{}' payload: {}", name, e),
        })),
        Err(e) => {
            error!("Failed to deliver {}: {}", name, e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            }))
        }
    }
}

/// Get traffic totals and session phase
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    match state.capture.snapshot().await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(e) => service_unavailable(e),
    }
}

/// Update capture settings
pub async fn update_settings(
    state: web::Data<AppState>,
    request: web::Json<UpdateSettingsRequest>,
) -> impl Responder {
    if let Some(limit) = request.packet_limit {
        info!("Setting packet limit to {}", limit);
        if let Err(e) = state.capture.set_packet_limit(limit).await {
            return service_unavailable(e);
        }
    }

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": "Settings updated successfully"
    }))
}

pub(crate) fn service_unavailable(e: AppError) -> HttpResponse {
    error!("Capture service request failed: {}", e);
    HttpResponse::ServiceUnavailable().json(serde_json::json!({
        "status": "error",
        "message": e.to_string(),
    }))
}
