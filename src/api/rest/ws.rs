use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use futures::stream::SplitSink;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::models::ride::GeoPoint;
use crate::realtime::RideEvent;
use crate::state::AppState;

/// Inbound frames. Room membership is per connection; dropping the
/// connection drops every membership with it.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRide { ride_id: Uuid },
    #[serde(rename_all = "camelCase")]
    LeaveRide { ride_id: Uuid },
    #[serde(rename_all = "camelCase")]
    UpdateRiderLocation {
        ride_id: Uuid,
        rider_id: Uuid,
        location: GeoPoint,
    },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One task per connection. Every client sees the global feeds; per-ride
/// rooms are added and removed as the client asks. A room stream ends on
/// its own when the ride goes terminal, and the `StreamMap` drops it.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut new_rides = BroadcastStream::new(state.broadcaster.subscribe_new_rides());
    let mut ride_updates = BroadcastStream::new(state.broadcaster.subscribe_ride_updates());
    let mut rooms: StreamMap<Uuid, BroadcastStream<RideEvent>> = StreamMap::new();

    info!("websocket client connected");

    loop {
        tokio::select! {
            Some(event) = new_rides.next() => {
                if forward(&mut sender, event).await.is_err() {
                    break;
                }
            }
            Some(event) = ride_updates.next() => {
                if forward(&mut sender, event).await.is_err() {
                    break;
                }
            }
            Some((_ride_id, event)) = rooms.next() => {
                if forward(&mut sender, event).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if handle_client_message(&state, &mut rooms, &mut sender, &text)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!("websocket client disconnected");
}

/// A lagged subscriber skips ahead; delivery is best-effort by contract.
async fn forward(
    sender: &mut SplitSink<WebSocket, Message>,
    event: Result<RideEvent, BroadcastStreamRecvError>,
) -> Result<(), ()> {
    let event = match event {
        Ok(event) => event,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "websocket client lagged; events dropped");
            return Ok(());
        }
    };

    let payload = match serde_json::to_string(&event) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize event for ws");
            return Ok(());
        }
    };

    sender.send(Message::Text(payload)).await.map_err(|_| ())
}

async fn handle_client_message(
    state: &Arc<AppState>,
    rooms: &mut StreamMap<Uuid, BroadcastStream<RideEvent>>,
    sender: &mut SplitSink<WebSocket, Message>,
    text: &str,
) -> Result<(), ()> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            return send_error(sender, &format!("unrecognized message: {err}")).await;
        }
    };

    match message {
        ClientMessage::JoinRide { ride_id } => {
            rooms.insert(ride_id, BroadcastStream::new(state.broadcaster.join(ride_id)));
            info!(ride_id = %ride_id, "client joined ride room");
        }
        ClientMessage::LeaveRide { ride_id } => {
            rooms.remove(&ride_id);
            info!(ride_id = %ride_id, "client left ride room");
        }
        ClientMessage::UpdateRiderLocation {
            ride_id,
            rider_id,
            location,
        } => {
            // Same path as the REST endpoint; the room echo comes back
            // through the broadcast, not from here.
            if let Err(err) = lifecycle::record_position(state, ride_id, rider_id, location) {
                return send_error(sender, &err.to_string()).await;
            }
        }
    }

    Ok(())
}

async fn send_error(sender: &mut SplitSink<WebSocket, Message>, message: &str) -> Result<(), ()> {
    let payload = json!({
        "event": "error",
        "data": { "message": message },
    });
    sender
        .send(Message::Text(payload.to_string()))
        .await
        .map_err(|_| ())
}
