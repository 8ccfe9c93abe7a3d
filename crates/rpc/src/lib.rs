//! The RPC transport framing and stub/skeleton machinery this workspace's
//! naming and storage servers sit on top of. Treated as a black box by the
//! components that use it: one JSON value in, one JSON value out, framed
//! with a 4-byte length prefix over a plain TCP stream.
//!
//! Delivery is at-least-once from the caller's perspective: [`call`] opens
//! a fresh connection per request, so a caller that retries on
//! [`DfsError::Transport`] may cause the handler to run more than once.
//! Callers of non-idempotent operations rely on the lock manager (or, for
//! `register`, the `knownStorages`/`knownCommands` identity sets) to make
//! a retried call safe.

use std::future::Future;
use std::net::SocketAddr;

use common::{DfsError, DfsResult};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Open a connection to `addr`, send one request, and await one response.
pub async fn call<Req, Resp>(addr: SocketAddr, request: &Req) -> DfsResult<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| DfsError::Transport(format!("connect {addr}: {e}")))?;
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    let payload = serde_json::to_vec(request)
        .map_err(|e| DfsError::Transport(format!("encode request: {e}")))?;
    framed
        .send(payload.into())
        .await
        .map_err(|e| DfsError::Transport(format!("send to {addr}: {e}")))?;

    let frame = framed
        .next()
        .await
        .ok_or_else(|| DfsError::Transport(format!("{addr}: connection closed without response")))?
        .map_err(|e| DfsError::Transport(format!("read from {addr}: {e}")))?;

    serde_json::from_slice(&frame)
        .map_err(|e| DfsError::Transport(format!("decode response from {addr}: {e}")))
}

/// Bind `addr` and dispatch every framed request on every accepted
/// connection through `handler`, writing back its response. Runs until the
/// listener errors; callers typically `tokio::spawn` this or race it
/// against a shutdown signal.
pub async fn serve<Req, Resp, H, Fut>(addr: SocketAddr, handler: H) -> DfsResult<()>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    H: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Resp> + Send,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| DfsError::Transport(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "rpc endpoint listening");

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| DfsError::Transport(format!("accept on {addr}: {e}")))?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, handler).await {
                tracing::warn!(%peer, error = %err, "rpc connection ended with error");
            }
        });
    }
}

async fn handle_connection<Req, Resp, H, Fut>(stream: TcpStream, handler: H) -> DfsResult<()>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    H: Fn(Req) -> Fut,
    Fut: Future<Output = Resp>,
{
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    while let Some(frame) = framed.next().await {
        let frame = frame.map_err(|e| DfsError::Transport(format!("read frame: {e}")))?;
        let request: Req = serde_json::from_slice(&frame)
            .map_err(|e| DfsError::Transport(format!("decode request: {e}")))?;
        let response = handler(request).await;
        let payload = serde_json::to_vec(&response)
            .map_err(|e| DfsError::Transport(format!("encode response: {e}")))?;
        framed
            .send(payload.into())
            .await
            .map_err(|e| DfsError::Transport(format!("send response: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Ping(u32);

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Pong(u32);

    #[tokio::test]
    async fn round_trips_a_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        tokio::spawn(serve(addr, |Ping(n): Ping| async move { Pong(n + 1) }));
        // give the listener a moment to bind
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let resp: Pong = call(addr, &Ping(41)).await.unwrap();
        assert_eq!(resp, Pong(42));
    }

    #[tokio::test]
    async fn call_to_nothing_listening_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result: DfsResult<Pong> = call(addr, &Ping(1)).await;
        assert!(matches!(result, Err(DfsError::Transport(_))));
    }
}
