use actix_web::{web, Error, HttpRequest, Responder};
use actix_ws::{self, Message};
use futures_util::StreamExt;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;

use crate::api::AppState;
use crate::capture::presenter::{PresentationState, PresenterUpdate};

// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Messages sent to clients besides presenter updates
#[derive(Serialize)]
#[serde(tag = "type")]
enum WsOutMessage {
    #[serde(rename = "state")]
    State { state: PresentationState },

    #[serde(rename = "pong")]
    Pong { timestamp: u64 },
}

/// Handle WebSocket connections
pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<impl Responder, Error> {
    let addr = req
        .peer_addr()
        .map(|peer| peer.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("WebSocket connection from: {}", addr);

    let (response, session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let presenter = state.presenter.clone();
    let mut updates = presenter.subscribe();

    actix_web::rt::spawn(async move {
        let last_heartbeat = Arc::new(Mutex::new(Instant::now()));

        // Send the current state first so the client can render right away
        let mut initial = session.clone();
        if let Err(e) = send_state(&mut initial, presenter.state()).await {
            warn!("Failed to send initial state: {}", e);
            return;
        }

        // Client commands and keep-alive replies
        let ws_msg_task = {
            let mut session = session.clone();
            let presenter = presenter.clone();
            let last_heartbeat = last_heartbeat.clone();

            async move {
                while let Some(Ok(msg)) = msg_stream.next().await {
                    match msg {
                        Message::Ping(bytes) => {
                            *last_heartbeat.lock() = Instant::now();
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Pong(_) => {
                            *last_heartbeat.lock() = Instant::now();
                        }
                        Message::Text(text) => {
                            debug!("Received text message: {}", text);
                            *last_heartbeat.lock() = Instant::now();

                            let sent = match text.trim() {
                                "view" => send_state(&mut session, presenter.state()).await,
                                "ping" => send_pong(&mut session).await,
                                _ => Ok(()),
                            };
                            if let Err(e) = sent {
                                warn!("Failed to answer client command: {}", e);
                                break;
                            }
                        }
                        Message::Close(_) => {
                            info!("Client requested close");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        };

        // Forward every presenter push
        let updates_task = {
            let mut session = session.clone();

            async move {
                loop {
                    match updates.recv().await {
                        Ok(update) => {
                            if send_update(&mut session, &update).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            // The next update carries the full view again
                            warn!("WebSocket client lagged, skipped {} updates", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        };

        let heartbeat_task = {
            let mut session = session.clone();

            async move {
                let mut heartbeat = interval(HEARTBEAT_INTERVAL);
                loop {
                    heartbeat.tick().await;

                    if last_heartbeat.lock().elapsed() > HEARTBEAT_INTERVAL * 3 {
                        warn!("WebSocket client heartbeat timed out");
                        let _ = session.close(None).await;
                        break;
                    }

                    let stamp = chrono::Utc::now().timestamp().to_be_bytes();
                    if session.ping(&stamp).await.is_err() {
                        break;
                    }
                }
            }
        };

        tokio::select! {
            _ = ws_msg_task => {},
            _ = updates_task => {},
            _ = heartbeat_task => {},
        }

        info!("WebSocket connection closed: {}", addr);
    });

    Ok(response)
}

/// Send the full presentation state to a client
async fn send_state(
    session: &mut actix_ws::Session,
    state: PresentationState,
) -> Result<(), actix_ws::Closed> {
    let msg = WsOutMessage::State { state };
    if let Ok(json) = serde_json::to_string(&msg) {
        session.text(json).await?;
    }
    Ok(())
}

/// Answer a text `ping` command
async fn send_pong(session: &mut actix_ws::Session) -> Result<(), actix_ws::Closed> {
    let msg = WsOutMessage::Pong {
        timestamp: chrono::Utc::now().timestamp() as u64,
    };
    if let Ok(json) = serde_json::to_string(&msg) {
        session.text(json).await?;
    }
    Ok(())
}

/// Send one presenter update to a client
async fn send_update(
    session: &mut actix_ws::Session,
    update: &PresenterUpdate,
) -> Result<(), actix_ws::Closed> {
    if let Ok(json) = serde_json::to_string(update) {
        session.text(json).await?;
    }
    Ok(())
}
