use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::domains::NodeRecord;
use crate::error::{NodeMonError, Result};
use crate::interfaces::listener::ClientListener;
use crate::services::proxy::ProxyScheduler;

pub const FRAME_HELLO: u8 = 0;
pub const FRAME_DATA: u8 = 1;
pub const FRAME_WORLD_STATE: u8 = 2;

/// Byte a client writes to ask for a full snapshot.
pub const REQUEST_WORLD_STATE: u8 = b'W';

const FRAME_HEADER: usize = 1 + 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u8,
    pub node_id: String,
    pub payload: Bytes,
}

/// `kind:u8 | node_id_len:u16 | node_id | payload_len:u32 | payload`, big endian.
pub fn encode_frame(kind: u8, node_id: &str, payload: &[u8]) -> Result<Bytes> {
    let id_len = u16::try_from(node_id.len()).map_err(|_| {
        NodeMonError::Serialization(format!("node id of {} bytes too long", node_id.len()))
    })?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        NodeMonError::Serialization(format!("payload of {} bytes too long", payload.len()))
    })?;
    let mut buf = BytesMut::with_capacity(FRAME_HEADER + node_id.len() + 4 + payload.len());
    buf.put_u8(kind);
    buf.put_u16(id_len);
    buf.put_slice(node_id.as_bytes());
    buf.put_u32(payload_len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Pops one complete frame off the front of `buf`, if there is one.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Frame>> {
    if buf.len() < FRAME_HEADER {
        return Ok(None);
    }
    let id_len = u16::from_be_bytes([buf[1], buf[2]]) as usize;
    let len_at = FRAME_HEADER + id_len;
    if buf.len() < len_at + 4 {
        return Ok(None);
    }
    let payload_len =
        u32::from_be_bytes([buf[len_at], buf[len_at + 1], buf[len_at + 2], buf[len_at + 3]])
            as usize;
    if buf.len() < len_at + 4 + payload_len {
        return Ok(None);
    }
    let kind = buf.get_u8();
    buf.advance(2);
    let node_id = String::from_utf8(buf.split_to(id_len).to_vec())
        .map_err(|e| NodeMonError::Serialization(e.to_string()))?;
    buf.advance(4);
    let payload = buf.split_to(payload_len).freeze();
    Ok(Some(Frame {
        kind,
        node_id,
        payload,
    }))
}

/// Proxy listener writing frames to one TCP client through a bounded backlog.
/// A client that stops reading loses frames instead of stalling the proxy.
pub struct TcpClientListener {
    id: String,
    tx: mpsc::Sender<Bytes>,
}

impl TcpClientListener {
    pub fn new(id: impl Into<String>, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id: id.into(), tx }
    }

    fn push(&self, frame: Bytes) -> Result<()> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(NodeMonError::Transport(format!(
                "backlog full for {}",
                self.id
            ))),
            Err(TrySendError::Closed(_)) => Err(NodeMonError::Transport(format!(
                "connection closed for {}",
                self.id
            ))),
        }
    }
}

#[async_trait]
impl ClientListener for TcpClientListener {
    fn id(&self) -> &str {
        &self.id
    }

    async fn on_data_update(&self, node_id: &str, bytes: &[u8]) -> Result<()> {
        self.push(encode_frame(FRAME_DATA, node_id, bytes)?)
    }

    async fn on_world_state(&self, records: &[NodeRecord]) -> Result<()> {
        let payload =
            serde_json::to_vec(records).map_err(|e| NodeMonError::Serialization(e.to_string()))?;
        self.push(encode_frame(FRAME_WORLD_STATE, "", &payload)?)
    }
}

pub struct ClientServer {
    listener: TcpListener,
    proxy: Arc<ProxyScheduler>,
    backlog: usize,
    next_id: AtomicU64,
}

impl ClientServer {
    pub async fn bind(addr: &str, proxy: Arc<ProxyScheduler>, backlog: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| NodeMonError::Transport(e.to_string()))?;
        Ok(Self {
            listener,
            proxy,
            backlog: backlog.max(1),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| NodeMonError::Transport(e.to_string()))
    }

    pub async fn run(self) -> Result<()> {
        info!(addr = ?self.listener.local_addr().ok(), "client server listening");
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| NodeMonError::Transport(e.to_string()))?;
            let client_id = format!("client-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
            debug!(client = %client_id, peer = %peer, "client connected");
            tokio::spawn(serve_client(
                stream,
                client_id,
                self.proxy.clone(),
                self.backlog,
            ));
        }
    }
}

async fn serve_client(
    stream: TcpStream,
    client_id: String,
    proxy: Arc<ProxyScheduler>,
    backlog: usize,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Bytes>(backlog);

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if writer.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    let hello = encode_frame(FRAME_HELLO, &client_id, &[]).and_then(|frame| {
        tx.try_send(frame)
            .map_err(|e| NodeMonError::Transport(e.to_string()))
    });
    if let Err(err) = hello {
        debug!(client = %client_id, error = %err, "hello frame not sent");
    }
    proxy
        .register_listener(Arc::new(TcpClientListener::new(client_id.clone(), tx)))
        .await;

    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                for byte in &buf[..n] {
                    if *byte == REQUEST_WORLD_STATE && !proxy.request_world_state(&client_id) {
                        warn!(client = %client_id, "snapshot request dropped");
                    }
                }
            }
        }
    }

    proxy.unregister_listener(&client_id).await;
    writer_task.abort();
    debug!(client = %client_id, "client disconnected");
}
