use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio_rustls::{client::TlsStream, TlsConnector};
use tracing::{debug, warn};

use super::proto::{self, CastMessage};
use super::tls;
use crate::error::{CoreError, Result};

const NS_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";
const NS_HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
const NS_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";
const NS_MEDIA: &str = "urn:x-cast:com.google.cast.media";
const DEFAULT_MEDIA_RECEIVER_APP_ID: &str = "CC1AD845";
const SENDER_ID: &str = "sender-0";
const RECEIVER_ID: &str = "receiver-0";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const HEARTBEAT_MAX_MISSES: u32 = 3;
const STATUS_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct SessionIds {
    transport_id: Option<String>,
    receiver_session_id: Option<String>,
    media_session_id: Option<i64>,
}

type Pending = Arc<Mutex<HashMap<u32, oneshot::Sender<Value>>>>;

/// A connected CASTV2 channel to a Chromecast receiver, carrying the
/// Default Media Receiver through LAUNCH -> CONNECT -> LOAD.
pub struct ChromecastClient {
    writer: Arc<Mutex<WriteHalf<TlsStream<TcpStream>>>>,
    next_request_id: AtomicU32,
    pending: Pending,
    session: Arc<Mutex<SessionIds>>,
    lost: Arc<Notify>,
    lost_flag: Arc<AtomicBool>,
    reader_task: tokio::task::JoinHandle<()>,
    heartbeat_task: tokio::task::JoinHandle<()>,
}

impl ChromecastClient {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|e| CoreError::ConnectionFailed(e.to_string()))?;
        let connector = TlsConnector::from(tls::client_config());
        let server_name = tls::server_name_for(host);
        let tls_stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| CoreError::ConnectionFailed(e.to_string()))?;

        let (read_half, write_half) = tokio::io::split(tls_stream);
        let writer = Arc::new(Mutex::new(write_half));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let session = Arc::new(Mutex::new(SessionIds::default()));
        let lost = Arc::new(Notify::new());
        let lost_flag = Arc::new(AtomicBool::new(false));
        let heartbeat_misses = Arc::new(AtomicU32::new(0));

        let reader_task = spawn_reader(
            read_half,
            writer.clone(),
            pending.clone(),
            heartbeat_misses.clone(),
            lost.clone(),
            lost_flag.clone(),
        );
        let heartbeat_task = spawn_heartbeat(writer.clone(), heartbeat_misses, lost.clone(), lost_flag.clone());

        let client = Self {
            writer,
            next_request_id: AtomicU32::new(1),
            pending,
            session,
            lost,
            lost_flag,
            reader_task,
            heartbeat_task,
        };

        client.send(RECEIVER_ID, NS_CONNECTION, &json!({ "type": "CONNECT" })).await?;
        Ok(client)
    }

    fn next_id(&self) -> u32 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn send(&self, destination_id: &str, namespace: &str, payload: &Value) -> Result<()> {
        let msg = CastMessage {
            protocol_version: 0,
            source_id: SENDER_ID.to_string(),
            destination_id: destination_id.to_string(),
            namespace: namespace.to_string(),
            payload_type: 0,
            payload_utf8: payload.to_string(),
        };
        let framed = proto::frame(&proto::encode(&msg));
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&framed)
            .await
            .map_err(|e| CoreError::ConnectionFailed(e.to_string()))
    }

    /// Sends `payload` (which must carry `requestId`) and awaits the reply
    /// correlated by that id, rather than sleeping a fixed duration.
    async fn send_and_wait(&self, destination_id: &str, namespace: &str, payload: &Value, request_id: u32) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, tx);
        self.send(destination_id, namespace, payload).await?;

        match tokio::time::timeout(STATUS_WAIT_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(CoreError::ConnectionFailed("channel closed before reply".into())),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(CoreError::Timeout)
            }
        }
    }

    /// Drives LAUNCH -> transport CONNECT -> LOAD, correlating each step by
    /// requestId instead of sleeping a fixed duration for the app to appear.
    pub async fn load(&self, media_url: &str, start_position: f64) -> Result<()> {
        let launch_id = self.next_id();
        let status = self
            .send_and_wait(
                RECEIVER_ID,
                NS_RECEIVER,
                &json!({ "type": "LAUNCH", "requestId": launch_id, "appId": DEFAULT_MEDIA_RECEIVER_APP_ID }),
                launch_id,
            )
            .await?;

        let (transport_id, receiver_session_id) = parse_receiver_status(&status)
            .ok_or_else(|| CoreError::Chromecast("no transportId in RECEIVER_STATUS".into()))?;

        {
            let mut session = self.session.lock().await;
            session.transport_id = Some(transport_id.clone());
            session.receiver_session_id = Some(receiver_session_id.clone());
        }

        self.send(&transport_id, NS_CONNECTION, &json!({ "type": "CONNECT" })).await?;

        let load_id = self.next_id();
        let media_status = self
            .send_and_wait(
                &transport_id,
                NS_MEDIA,
                &json!({
                    "type": "LOAD",
                    "requestId": load_id,
                    "autoplay": true,
                    "currentTime": start_position,
                    "media": {
                        "contentId": media_url,
                        "contentType": "video/mp4",
                        "streamType": "BUFFERED",
                    },
                }),
                load_id,
            )
            .await?;

        let media_session_id = parse_media_session_id(&media_status)
            .ok_or_else(|| CoreError::Chromecast("no mediaSessionId in MEDIA_STATUS".into()))?;
        self.session.lock().await.media_session_id = Some(media_session_id);

        Ok(())
    }

    async fn media_command(&self, extra: Value) -> Result<()> {
        let session = self.session.lock().await;
        let transport_id = session.transport_id.clone().ok_or(CoreError::NotCasting)?;
        let media_session_id = session.media_session_id.ok_or(CoreError::NotCasting)?;
        drop(session);

        let mut payload = extra;
        payload["requestId"] = json!(self.next_id());
        payload["mediaSessionId"] = json!(media_session_id);
        self.send(&transport_id, NS_MEDIA, &payload).await
    }

    pub async fn play(&self) -> Result<()> {
        self.media_command(json!({ "type": "PLAY" })).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.media_command(json!({ "type": "PAUSE" })).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.media_command(json!({ "type": "STOP" })).await
    }

    pub async fn seek(&self, position_secs: f64) -> Result<()> {
        self.media_command(json!({ "type": "SEEK", "currentTime": position_secs })).await
    }

    /// `level` is 0..1, already mapped from the uniform 0..100 vocabulary by the coordinator.
    pub async fn set_volume(&self, level: f64) -> Result<()> {
        let payload = json!({
            "type": "SET_VOLUME",
            "requestId": self.next_id(),
            "volume": { "level": level.clamp(0.0, 1.0) },
        });
        self.send(RECEIVER_ID, NS_RECEIVER, &payload).await
    }

    pub async fn disconnect(&self) {
        self.reader_task.abort();
        self.heartbeat_task.abort();
    }

    /// Resolves once the reader or heartbeat task has detected the channel
    /// is gone. Registers for the notification before checking the flag so a
    /// loss that already happened isn't missed.
    pub async fn wait_lost(&self) {
        let notified = self.lost.notified();
        if self.lost_flag.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

fn parse_receiver_status(payload: &Value) -> Option<(String, String)> {
    let apps = payload.get("status")?.get("applications")?.as_array()?;
    let app = apps.first()?;
    let transport_id = app.get("transportId")?.as_str()?.to_string();
    let session_id = app.get("sessionId")?.as_str()?.to_string();
    Some((transport_id, session_id))
}

fn parse_media_session_id(payload: &Value) -> Option<i64> {
    payload.get("status")?.as_array()?.first()?.get("mediaSessionId")?.as_i64()
}

fn spawn_reader(
    mut reader: ReadHalf<TlsStream<TcpStream>>,
    writer: Arc<Mutex<WriteHalf<TlsStream<TcpStream>>>>,
    pending: Pending,
    heartbeat_misses: Arc<AtomicU32>,
    lost: Arc<Notify>,
    lost_flag: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mut len_buf = [0u8; 4];
            if reader.read_exact(&mut len_buf).await.is_err() {
                warn!("chromecast channel closed by peer");
                lost_flag.store(true, Ordering::SeqCst);
                lost.notify_waiters();
                return;
            }
            let len = u32::from_be_bytes(len_buf) as usize;
            let mut body = vec![0u8; len];
            if reader.read_exact(&mut body).await.is_err() {
                lost_flag.store(true, Ordering::SeqCst);
                lost.notify_waiters();
                return;
            }

            let Ok(msg) = proto::decode(&body) else { continue };
            let Ok(payload) = serde_json::from_str::<Value>(&msg.payload_utf8) else { continue };
            let msg_type = payload.get("type").and_then(Value::as_str).unwrap_or("");

            match msg.namespace.as_str() {
                NS_HEARTBEAT => {
                    if msg_type == "PING" {
                        let reply = CastMessage {
                            protocol_version: 0,
                            source_id: SENDER_ID.to_string(),
                            destination_id: msg.source_id.clone(),
                            namespace: NS_HEARTBEAT.to_string(),
                            payload_type: 0,
                            payload_utf8: json!({ "type": "PONG" }).to_string(),
                        };
                        let framed = proto::frame(&proto::encode(&reply));
                        let _ = writer.lock().await.write_all(&framed).await;
                    } else if msg_type == "PONG" {
                        heartbeat_misses.store(0, Ordering::SeqCst);
                    }
                }
                NS_RECEIVER | NS_MEDIA => {
                    if let Some(request_id) = payload.get("requestId").and_then(Value::as_u64) {
                        if let Some(tx) = pending.lock().await.remove(&(request_id as u32)) {
                            let _ = tx.send(payload);
                        }
                    } else {
                        debug!(msg_type, namespace = %msg.namespace, "unsolicited status broadcast");
                    }
                }
                _ => {}
            }
        }
    })
}

fn spawn_heartbeat(
    writer: Arc<Mutex<WriteHalf<TlsStream<TcpStream>>>>,
    misses: Arc<AtomicU32>,
    lost: Arc<Notify>,
    lost_flag: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            let current = misses.fetch_add(1, Ordering::SeqCst) + 1;
            if current >= HEARTBEAT_MAX_MISSES {
                warn!("chromecast heartbeat exceeded {} missed pongs", HEARTBEAT_MAX_MISSES);
                lost_flag.store(true, Ordering::SeqCst);
                lost.notify_waiters();
                return;
            }
            let ping = CastMessage {
                protocol_version: 0,
                source_id: SENDER_ID.to_string(),
                destination_id: RECEIVER_ID.to_string(),
                namespace: NS_HEARTBEAT.to_string(),
                payload_type: 0,
                payload_utf8: json!({ "type": "PING" }).to_string(),
            };
            let framed = proto::frame(&proto::encode(&ping));
            if writer.lock().await.write_all(&framed).await.is_err() {
                lost_flag.store(true, Ordering::SeqCst);
                lost.notify_waiters();
                return;
            }
            debug!("chromecast heartbeat ping sent");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_receiver_status_transport_and_session_id() {
        let payload = json!({
            "status": { "applications": [ { "transportId": "t-1", "sessionId": "s-1" } ] }
        });
        assert_eq!(parse_receiver_status(&payload), Some(("t-1".to_string(), "s-1".to_string())));
    }

    #[test]
    fn parses_media_session_id() {
        let payload = json!({ "status": [ { "mediaSessionId": 42 } ] });
        assert_eq!(parse_media_session_id(&payload), Some(42));
    }

    #[test]
    fn missing_fields_yield_none() {
        assert_eq!(parse_receiver_status(&json!({})), None);
        assert_eq!(parse_media_session_id(&json!({})), None);
    }
}
