use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Build the local development relay: a WebSocket echo server with the same
/// contract as the public relay, minus the sponsor banner.
pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the relay on an already-bound listener until the task is aborted.
pub async fn serve(listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    info!("relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}

async fn index() -> &'static str {
    "unimarket relay: connect a WebSocket to /ws\n"
}

async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(echo_session)
}

/// Echo every text frame back verbatim. The chat core's delivery
/// acknowledgment relies on receiving its own frame unchanged.
async fn echo_session(mut socket: WebSocket) {
    debug!("relay client connected");
    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!("relay client read failed: {err}");
                break;
            }
        };
        match frame {
            Message::Text(text) => {
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Message::Ping(payload) => {
                if socket.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    debug!("relay client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::{connect_async, tungstenite};

    #[tokio::test]
    async fn relay_echoes_text_frames_verbatim() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        ws.send(tungstenite::Message::Text("hello relay".into()))
            .await
            .unwrap();

        let echoed = ws.next().await.unwrap().unwrap();
        assert_eq!(echoed.to_text().unwrap(), "hello relay");

        ws.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn relay_echoes_json_frames_without_rewriting() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        let payload = r#"{"id":"m1","content":"still available?","buyerName":"Jamie Park"}"#;
        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        ws.send(tungstenite::Message::Text(payload.into()))
            .await
            .unwrap();

        let echoed = ws.next().await.unwrap().unwrap();
        assert_eq!(echoed.to_text().unwrap(), payload);
    }
}
