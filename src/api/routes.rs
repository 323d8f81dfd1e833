use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::api::handlers::{
    events::{get_stats, ingest_event, update_settings},
    packets::{
        append_message, append_summary, clear_packets, get_dump, get_packet, get_packets,
        set_selection,
    },
};
use crate::api::websocket::ws_index;

/// Root endpoint to provide information about the API
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "RDP Inspector API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Remote debugging protocol packet inspector",
        "endpoints": [
            {
                "path": "/api/events/{name}",
                "method": "POST",
                "description": "Deliver an ingestion event (init-options, init-packet-list, send-packet, receive-packet, loaded-packet-list-file)"
            },
            {
                "path": "/api/packets",
                "method": "GET",
                "description": "Get the visible packets"
            },
            {
                "path": "/api/packets/{id}",
                "method": "GET",
                "description": "Get a visible packet by id"
            },
            {
                "path": "/api/packets/clear",
                "method": "POST",
                "description": "Clear the capture session"
            },
            {
                "path": "/api/packets/message",
                "method": "POST",
                "description": "Append a message entry"
            },
            {
                "path": "/api/packets/summary",
                "method": "POST",
                "description": "Append a traffic summary entry"
            },
            {
                "path": "/api/selection",
                "method": "PUT",
                "description": "Select a packet or clear the selection"
            },
            {
                "path": "/api/dump",
                "method": "GET",
                "description": "Save the session as a dump file"
            },
            {
                "path": "/api/stats",
                "method": "GET",
                "description": "Get traffic totals"
            },
            {
                "path": "/api/settings",
                "method": "POST",
                "description": "Update capture settings"
            },
            {
                "path": "/api/ws",
                "method": "GET",
                "description": "WebSocket endpoint for real-time updates"
            }
        ]
    }))
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                // WebSocket route for real-time updates
                .route("/ws", web::get().to(ws_index))
                // Ingestion
                .route("/events/{name}", web::post().to(ingest_event))
                // Packet data
                .service(
                    web::scope("/packets")
                        .route("", web::get().to(get_packets))
                        .route("/clear", web::post().to(clear_packets))
                        .route("/message", web::post().to(append_message))
                        .route("/summary", web::post().to(append_summary))
                        .route("/{id}", web::get().to(get_packet)),
                )
                .route("/selection", web::put().to(set_selection))
                .route("/dump", web::get().to(get_dump))
                .route("/stats", web::get().to(get_stats))
                .route("/settings", web::post().to(update_settings)),
        );
}
