use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::directory::Directory;
use crate::error::{CoreError, Result};
use crate::models::{CastStatus, ControlAction, Device, SessionState};
use crate::protocol::ClientHandle;

struct Session {
    device: Device,
    client: Arc<ClientHandle>,
    position: f64,
    duration: f64,
    paused: bool,
    state: SessionState,
    /// Ticket held by this session's background watchers; a watcher only
    /// applies the update it is carrying if this still matches the
    /// coordinator's current generation, so a watcher from a session that has
    /// since been stopped/replaced can't clobber the new one.
    generation: u64,
    /// Poller/watcher tasks tied to this session's lifetime, aborted on stop.
    background_tasks: Vec<JoinHandle<()>>,
}

/// Owns the at-most-one active cast session and routes the uniform control
/// vocabulary to whichever protocol client is live.
#[derive(Clone)]
pub struct Coordinator {
    directory: Directory,
    session: Arc<RwLock<Option<Session>>>,
    generation: Arc<AtomicU64>,
}

impl Coordinator {
    pub fn new(directory: Directory) -> Self {
        Self {
            directory,
            session: Arc::new(RwLock::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn start(&self, device_id: &str, media_url: &str, position: Option<f64>) -> Result<()> {
        if media_url.trim().is_empty() {
            return Err(CoreError::InvalidRequest("mediaUrl must not be empty".into()));
        }

        // Stop any prior session first; its teardown errors are logged, not fatal.
        self.stop().await.ok();

        let device = self
            .directory
            .get(device_id)
            .await
            .ok_or_else(|| CoreError::DeviceNotFound(device_id.to_string()))?;

        let client = Arc::new(ClientHandle::connect(&device).await?);
        let start_position = position.unwrap_or(0.0);

        if let Err(e) = client.load(media_url, start_position, 0.0, &device.name).await {
            client.disconnect().await.ok();
            return Err(e);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let background_tasks = self.spawn_watchers(&client, generation);

        let mut guard = self.session.write().await;
        *guard = Some(Session {
            device,
            client,
            position: start_position,
            duration: 0.0,
            paused: false,
            state: SessionState::Playing,
            generation,
            background_tasks,
        });
        info!(device_id, "cast session started");
        Ok(())
    }

    /// Spawns the background tasks that keep a live session's cached status
    /// fresh and react to the channel being lost, tagged with `generation` so
    /// a stale watcher from an earlier session can't write into a newer one.
    fn spawn_watchers(&self, client: &Arc<ClientHandle>, generation: u64) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        if matches!(**client, ClientHandle::AirPlay(_)) {
            let poll_client = client.clone();
            let poll_session = self.session.clone();
            tasks.push(tokio::spawn(async move {
                let ClientHandle::AirPlay(airplay) = &*poll_client else { return };
                crate::protocol::airplay::poll_status(airplay, |info| {
                    let session = poll_session.clone();
                    async move {
                        let mut guard = session.write().await;
                        if let Some(session) = guard.as_mut() {
                            if session.generation == generation {
                                session.position = info.position;
                                session.duration = info.duration;
                                session.paused = info.paused;
                                session.state = if info.paused { SessionState::Paused } else { SessionState::Playing };
                            }
                        }
                    }
                })
                .await;
            }));
        }

        if matches!(**client, ClientHandle::Chromecast(_)) {
            let loss_client = client.clone();
            let loss_session = self.session.clone();
            tasks.push(tokio::spawn(async move {
                loss_client.wait_for_loss().await;
                warn!(generation, "chromecast session lost, marking session in error");
                let mut guard = loss_session.write().await;
                if let Some(session) = guard.as_mut() {
                    if session.generation == generation {
                        session.state = SessionState::Error;
                    }
                }
                drop(guard);
                loss_client.disconnect().await.ok();
            }));
        }

        tasks
    }

    pub async fn control(&self, action: &str, value: Option<f64>) -> Result<()> {
        let verb = ControlAction::parse(action).ok_or_else(|| CoreError::UnknownAction(action.to_string()))?;

        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(CoreError::NotCasting)?;

        match verb {
            ControlAction::Play => session.client.play().await?,
            ControlAction::Pause => session.client.pause().await?,
            ControlAction::Stop => {
                drop(guard);
                return self.stop().await;
            }
            ControlAction::Seek => {
                let position = value.ok_or_else(|| CoreError::UnknownAction("seek requires a value".into()))?;
                session.client.seek(position).await?;
            }
            ControlAction::Volume => {
                let value = value.ok_or_else(|| CoreError::UnknownAction("volume requires a value".into()))?;
                session.client.set_volume(value.clamp(0.0, 100.0) as u8).await?;
            }
        }
        drop(guard);

        if let ControlAction::Seek = verb {
            if let Some(position) = value {
                let mut guard = self.session.write().await;
                if let Some(session) = guard.as_mut() {
                    session.position = position;
                }
            }
        }
        if matches!(verb, ControlAction::Play) {
            self.set_paused(false).await;
        }
        if matches!(verb, ControlAction::Pause) {
            self.set_paused(true).await;
        }

        Ok(())
    }

    async fn set_paused(&self, paused: bool) {
        let mut guard = self.session.write().await;
        if let Some(session) = guard.as_mut() {
            session.paused = paused;
            session.state = if paused { SessionState::Paused } else { SessionState::Playing };
        }
    }

    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.session.write().await;
        let Some(session) = guard.take() else {
            return Ok(());
        };
        for task in &session.background_tasks {
            task.abort();
        }
        if let Err(e) = session.client.stop().await {
            warn!(error = %e, "protocol error during stop, clearing session anyway");
        }
        session.client.disconnect().await.ok();
        info!(device_id = %session.device.id, "cast session stopped");
        Ok(())
    }

    pub async fn status(&self) -> CastStatus {
        let guard = self.session.read().await;
        match guard.as_ref() {
            Some(session) => CastStatus {
                casting: true,
                device_id: Some(session.device.id.clone()),
                device_name: Some(session.device.name.clone()),
                position: session.position,
                duration: session.duration,
                paused: session.paused,
                state: Some(session.state),
            },
            None => CastStatus::idle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_is_idle_with_no_session() {
        let coordinator = Coordinator::new(Directory::new());
        let status = coordinator.status().await;
        assert!(!status.casting);
        assert!(status.device_id.is_none());
    }

    #[tokio::test]
    async fn control_without_session_is_not_casting() {
        let coordinator = Coordinator::new(Directory::new());
        let err = coordinator.control("play", None).await.unwrap_err();
        assert!(matches!(err, CoreError::NotCasting));
    }

    #[tokio::test]
    async fn control_with_unknown_action_is_rejected() {
        let coordinator = Coordinator::new(Directory::new());
        let err = coordinator.control("dance", None).await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownAction(_)));
    }

    #[tokio::test]
    async fn start_with_unknown_device_fails() {
        let coordinator = Coordinator::new(Directory::new());
        let err = coordinator.start("missing", "http://host/a.mp4", None).await.unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn stop_with_no_session_is_a_no_op() {
        let coordinator = Coordinator::new(Directory::new());
        assert!(coordinator.stop().await.is_ok());
    }

    #[tokio::test]
    async fn start_with_empty_media_url_is_rejected() {
        let coordinator = Coordinator::new(Directory::new());
        let err = coordinator.start("some-device", "   ", None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
    }
}
