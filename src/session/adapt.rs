//! Socket adapters mapping library message types onto [`SocketMessage`].
//!
//! The hub accepts backends through axum's server-side WebSocket while the
//! backend dials out with tokio-tungstenite; both are adapted to one message
//! type so a single pump implementation serves both peers.

use axum::extract::ws as server_ws;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as ClientMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{SocketError, SocketMessage};

/// Adapt an accepted (server-side) socket into a session sink/stream pair.
pub fn server_socket(
    socket: server_ws::WebSocket,
) -> (
    impl Sink<SocketMessage, Error = SocketError> + Send + Unpin + 'static,
    impl Stream<Item = Result<SocketMessage, SocketError>> + Send + Unpin + 'static,
) {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(|e: axum::Error| SocketError(e.to_string()))
        .with(|msg: SocketMessage| future::ready(Ok::<_, SocketError>(to_server(msg))));
    let stream = stream.filter_map(|res| {
        future::ready(match res {
            Ok(msg) => Some(Ok(from_server(msg))),
            Err(e) => Some(Err(SocketError(e.to_string()))),
        })
    });
    (sink, stream)
}

/// Adapt a dialed (client-side) socket into a session sink/stream pair.
pub fn client_socket(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
) -> (
    impl Sink<SocketMessage, Error = SocketError> + Send + Unpin + 'static,
    impl Stream<Item = Result<SocketMessage, SocketError>> + Send + Unpin + 'static,
) {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(|e: tokio_tungstenite::tungstenite::Error| SocketError(e.to_string()))
        .with(|msg: SocketMessage| future::ready(Ok::<_, SocketError>(to_client(msg))));
    let stream = stream.filter_map(|res| {
        future::ready(match res {
            Ok(msg) => from_client(msg).map(Ok),
            Err(e) => Some(Err(SocketError(e.to_string()))),
        })
    });
    (sink, stream)
}

fn to_server(msg: SocketMessage) -> server_ws::Message {
    match msg {
        SocketMessage::Binary(b) => server_ws::Message::Binary(b),
        SocketMessage::Text(t) => server_ws::Message::Text(t.into()),
        SocketMessage::Ping(b) => server_ws::Message::Ping(b),
        SocketMessage::Pong(b) => server_ws::Message::Pong(b),
        SocketMessage::Close => server_ws::Message::Close(None),
    }
}

fn from_server(msg: server_ws::Message) -> SocketMessage {
    match msg {
        server_ws::Message::Binary(b) => SocketMessage::Binary(b),
        server_ws::Message::Text(t) => SocketMessage::Text(t.to_string()),
        server_ws::Message::Ping(b) => SocketMessage::Ping(b),
        server_ws::Message::Pong(b) => SocketMessage::Pong(b),
        server_ws::Message::Close(_) => SocketMessage::Close,
    }
}

fn to_client(msg: SocketMessage) -> ClientMessage {
    match msg {
        SocketMessage::Binary(b) => ClientMessage::Binary(b),
        SocketMessage::Text(t) => ClientMessage::Text(t.into()),
        SocketMessage::Ping(b) => ClientMessage::Ping(b),
        SocketMessage::Pong(b) => ClientMessage::Pong(b),
        SocketMessage::Close => ClientMessage::Close(None),
    }
}

fn from_client(msg: ClientMessage) -> Option<SocketMessage> {
    match msg {
        ClientMessage::Binary(b) => Some(SocketMessage::Binary(b)),
        ClientMessage::Text(t) => Some(SocketMessage::Text(t.to_string())),
        ClientMessage::Ping(b) => Some(SocketMessage::Ping(b)),
        ClientMessage::Pong(b) => Some(SocketMessage::Pong(b)),
        ClientMessage::Close(_) => Some(SocketMessage::Close),
        // raw frames never surface from a configured client stream
        ClientMessage::Frame(_) => None,
    }
}
