use std::{sync::Arc, time::Duration};

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    response::IntoResponse,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{sync::mpsc, time::timeout};
use tracing::{info, warn};

use crate::{
    appresult::ChatError,
    rooms::msg::{ClientFrame, ServerFrame},
    server::{ChatServer, Joined, PostOutcome},
};

/// What came off the socket.
enum Inbound {
    Frame(ClientFrame),
    Malformed(serde_json::Error),
    Closed,
}

/// Why an authorized stream ended.
enum Disconnect {
    Cancelled,
    Transport(axum::Error),
    WriterGone,
    Session(ChatError),
}

#[debug_handler]
pub(crate) async fn chat_ws(
    State(server): State<Arc<ChatServer>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| chat(server, socket))
}

/// Drives one chat stream: identity, then authorized streaming, then teardown.
pub(crate) async fn chat(server: Arc<ChatServer>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();

    let Ok(first) = timeout(server.send_timeout(), recv(&mut stream)).await else {
        let err = ChatError::Unauthenticated(format!(
            "No identity frame within {:?}",
            server.send_timeout()
        ));
        warn!("{err}");
        reject(&mut sink, err).await;
        return;
    };

    let hello = match first {
        Ok(Inbound::Frame(frame)) => frame,
        Ok(Inbound::Malformed(err)) => {
            let err = ChatError::InvalidInput(format!("Malformed identity frame: {err}"));
            warn!("{err}");
            reject(&mut sink, err).await;
            return;
        }
        Ok(Inbound::Closed) => return,
        Err(err) => {
            warn!("error receiving identity frame: {err}");
            return;
        }
    };

    let Joined { username, stream_id, outbox } = match server.join(&hello).await {
        Ok(joined) => joined,
        Err(err) => {
            warn!("{err}");
            reject(&mut sink, err).await;
            return;
        }
    };

    let mut writer = tokio::spawn(forward(outbox, sink, server.send_timeout(), username.clone()));

    let cause = loop {
        tokio::select! {
            inbound = recv(&mut stream) => match inbound {
                Ok(Inbound::Frame(frame)) if frame.message.trim().is_empty() => {
                    warn!("skipping empty message from {username}");
                }
                Ok(Inbound::Frame(frame)) => match server.post(&username, &frame.message).await {
                    Ok(PostOutcome::Broadcast { delivered }) => {
                        info!("message of {username} delivered to {delivered} peers");
                    }
                    Ok(PostOutcome::NeedMoreLikes) => {}
                    Err(err) => break Disconnect::Session(err),
                },
                Ok(Inbound::Malformed(err)) => warn!("skipping malformed frame from {username}: {err}"),
                Ok(Inbound::Closed) => break Disconnect::Cancelled,
                Err(err) => break Disconnect::Transport(err),
            },
            _ = &mut writer => break Disconnect::WriterGone,
        }
    };

    match cause {
        Disconnect::Cancelled => info!("client disconnected: {username}"),
        Disconnect::Transport(err) => warn!("error receiving message from {username}: {err}"),
        Disconnect::WriterGone => warn!("stream to {username} stopped accepting frames"),
        Disconnect::Session(err) => warn!("dropping stream of {username}: {err}"),
    }

    server.leave(&username, stream_id).await;
    writer.abort();
}

async fn recv(stream: &mut SplitStream<WebSocket>) -> Result<Inbound, axum::Error> {
    while let Some(msg) = stream.next().await {
        let parsed = match msg? {
            Message::Text(text) => serde_json::from_str(text.as_str()),
            Message::Binary(bytes) => serde_json::from_slice(&bytes),
            Message::Close(_) => return Ok(Inbound::Closed),
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        return Ok(match parsed {
            Ok(frame) => Inbound::Frame(frame),
            Err(err) => Inbound::Malformed(err),
        });
    }

    Ok(Inbound::Closed)
}

/// Drains a stream's outbox into its socket. Each send has `send_timeout` to complete.
async fn forward(
    mut outbox: mpsc::Receiver<ServerFrame>,
    mut sink: SplitSink<WebSocket, Message>,
    send_timeout: Duration,
    username: String,
) {
    while let Some(frame) = outbox.recv().await {
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(err) => {
                warn!("cannot encode frame for {username}: {err}");
                continue;
            }
        };

        match timeout(send_timeout, sink.send(Message::Text(json.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!("error sending message to {username}: {err}");
                break;
            }
            Err(_) => {
                warn!("sending to {username} timed out after {send_timeout:?}");
                break;
            }
        }
    }

    let _ = sink.close().await;
}

async fn reject(sink: &mut SplitSink<WebSocket, Message>, err: ChatError) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: err.to_string().into(),
    };

    if let Err(err) = sink.send(Message::Close(Some(frame))).await {
        warn!("error closing rejected stream: {err}");
    }
}
