use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    dto::{requests::ClientRequest, ws::ServerMessage},
    error::ServiceError,
    services::{match_service, playlist_service, room_service},
    state::{
        SharedState,
        room::{ConnectionId, UserId},
    },
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of one room WebSocket connection.
///
/// The first frame must identify the user; afterwards the connection carries
/// client requests inbound and reply/event frames outbound. Teardown runs
/// leave-room semantics on the identified user.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing even while we
    // await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let first_frame = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let user_id = match serde_json::from_str::<ClientRequest>(&first_frame) {
        Ok(ClientRequest::Identify { user_id }) => user_id,
        Ok(_) => {
            warn!("first websocket frame was not an identification");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse identification frame");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let connection_id = ConnectionId::new_v4();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    state.hub().register(connection_id, event_tx);
    info!(user_id, %connection_id, "client identified");

    // Forward group broadcasts into outbound frames until the connection is
    // unregistered from the hub.
    let forwarder_task: JoinHandle<()> = tokio::spawn({
        let outbound_tx = outbound_tx.clone();
        async move {
            while let Some(event) = event_rx.recv().await {
                if push_message(&outbound_tx, &ServerMessage::from(event)).is_err() {
                    break;
                }
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientRequest>(&text) {
                    Ok(request) => {
                        match dispatch(&state, user_id, connection_id, request).await {
                            Ok(reply) => reply,
                            Err(err) => error_reply(&err),
                        }
                    }
                    Err(err) => {
                        warn!(user_id, error = %err, "failed to parse client request");
                        ServerMessage::Error {
                            code: "invalid_operation".into(),
                            message: "malformed request frame".into(),
                        }
                    }
                };

                if push_message(&outbound_tx, &reply).is_err() {
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::handle_disconnect(&state, user_id).await;
    state.hub().unregister(connection_id);
    let _ = forwarder_task.await;
    info!(user_id, %connection_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Route one parsed client request to its service.
async fn dispatch(
    state: &SharedState,
    user_id: UserId,
    connection_id: ConnectionId,
    request: ClientRequest,
) -> Result<ServerMessage, ServiceError> {
    match request {
        ClientRequest::Identify { .. } => Err(ServiceError::InvalidOperation(
            "connection is already identified".into(),
        )),
        ClientRequest::JoinRoom { room_id } => {
            room_service::join_room(state, user_id, connection_id, room_id)
                .await
                .map(|room| ServerMessage::Room { room })
        }
        ClientRequest::LeaveRoom => room_service::leave_room(state, user_id)
            .await
            .map(|_| ServerMessage::Ack),
        ClientRequest::TransferHost {
            user_id: target_user_id,
        } => room_service::transfer_host(state, user_id, target_user_id)
            .await
            .map(|_| ServerMessage::Ack),
        ClientRequest::ChangeState { state: target } => {
            match_service::change_state(state, user_id, target)
                .await
                .map(|_| ServerMessage::Ack)
        }
        ClientRequest::StartMatch => match_service::start_match(state, user_id)
            .await
            .map(|_| ServerMessage::Ack),
        ClientRequest::ChangeSettings { settings } => {
            room_service::change_settings(state, user_id, settings)
                .await
                .map(|_| ServerMessage::Ack)
        }
        ClientRequest::AddPlaylistItem { item } => {
            playlist_service::add_item(state, user_id, item)
                .await
                .map(|_| ServerMessage::Ack)
        }
        ClientRequest::Unknown => Err(ServiceError::InvalidOperation(
            "unrecognised request".into(),
        )),
    }
}

fn error_reply(err: &ServiceError) -> ServerMessage {
    ServerMessage::Error {
        code: err.wire_code().into(),
        message: err.to_string(),
    }
}

/// Serialize a frame and push it onto the writer channel.
///
/// Serialization failure is a bug in this crate, logged and otherwise
/// ignored; a closed writer means the connection is gone.
fn push_message(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) -> Result<(), ()> {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound frame");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into())).map_err(|_| ())
}

/// Ensure the writer task winds down before we return from the handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
