use actix_web::{http::header, web, HttpResponse, Responder};
use log::info;
use serde::{Deserialize, Serialize};

use crate::api::handlers::events::service_unavailable;
use crate::api::AppState;
use crate::models::packet::Packet;

/// Response for listing packets
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PacketsResponse {
    packets: Vec<Packet>,
    removed_packets: u64,
    selected_packet: Option<u64>,
}

/// Request for changing the selection
#[derive(Deserialize)]
pub struct SelectionRequest {
    /// Packet to select; `null` clears the selection
    pub id: Option<u64>,
}

/// Request for appending a message entry
#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

/// Get the visible packets
pub async fn get_packets(state: web::Data<AppState>) -> impl Responder {
    let view = state.presenter.state();

    HttpResponse::Ok().json(PacketsResponse {
        packets: view.packets,
        removed_packets: view.removed_packets,
        selected_packet: view.selected_packet,
    })
}

/// Get a specific visible packet by ID
pub async fn get_packet(state: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    let id = path.into_inner();
    let view = state.presenter.state();

    match view.packets.into_iter().find(|p| p.id == id) {
        Some(packet) => HttpResponse::Ok().json(packet),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "status": "error",
            "message": format!("Packet with ID {} not found", id)
        })),
    }
}

/// Change the selected packet
pub async fn set_selection(
    state: web::Data<AppState>,
    request: web::Json<SelectionRequest>,
) -> impl Responder {
    state.presenter.select(request.id);
    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "selectedPacket": request.id,
    }))
}

/// Clear the capture session
pub async fn clear_packets(state: web::Data<AppState>) -> impl Responder {
    info!("Clearing packets on request");
    match state.capture.clear().await {
        Ok(()) => success("Packets cleared"),
        Err(e) => service_unavailable(e),
    }
}

/// Append a message entry
pub async fn append_message(
    state: web::Data<AppState>,
    request: web::Json<MessageRequest>,
) -> impl Responder {
    match state.capture.append_message(request.into_inner().message).await {
        Ok(()) => success("Message appended"),
        Err(e) => service_unavailable(e),
    }
}

/// Append a traffic summary entry
pub async fn append_summary(state: web::Data<AppState>) -> impl Responder {
    match state.capture.append_summary().await {
        Ok(()) => success("Summary appended"),
        Err(e) => service_unavailable(e),
    }
}

/// Download the session as a dump file
pub async fn get_dump(state: web::Data<AppState>) -> impl Responder {
    match state.capture.export().await {
        Ok(dump) => HttpResponse::Ok()
            .content_type("application/json")
            .insert_header((
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"packets.json\"",
            ))
            .body(dump),
        Err(e) => service_unavailable(e),
    }
}

fn success(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": message
    }))
}
