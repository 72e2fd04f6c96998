//! `/ws` - live viewer socket

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::{ChannelViewer, LiveHub};
use crate::core::ServerState;

pub async fn live_ws(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    let hub = state.live.clone();
    ws.on_upgrade(move |socket| viewer_session(socket, hub))
}

async fn viewer_session(socket: WebSocket, hub: LiveHub) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<str>>();
    let viewer_id = hub.connect(Arc::new(ChannelViewer::new(tx)));

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(text) => {
                        if sink.send(Message::Text(text.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Closing the receiver marks the viewer as no longer open
    rx.close();
    hub.disconnect(&viewer_id);
}
