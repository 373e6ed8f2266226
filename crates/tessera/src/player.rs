use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tessera_abr::{Estimator, EstimatorOptions, SharedEstimator};
use tessera_events::{Event, EventBus, PlayerEvent};
use tessera_net::{HttpClient, Net};

use crate::{
    device::DeviceMonitor,
    drm::{DrmProvider, NoopDrmProvider},
    engine::{Command, Engine, Settings},
    error::{PlayerError, PlayerResult},
    manifest::ManifestLoader,
    options::{LoadOptions, PlayerOptions, SeekTarget},
    platform::{PlaybackEvent, SourceBufferSink},
    state::PlayerState,
};

/// One loaded content's handles.
struct Session {
    cancel: CancellationToken,
    estimator: SharedEstimator,
    playback_tx: mpsc::UnboundedSender<PlaybackEvent>,
    command_tx: mpsc::UnboundedSender<Command>,
}

/// The embedding API.
///
/// Owns the cross-content pieces (event bus, device monitor, settings,
/// transport) and one [`Engine`] per loaded content. Setters work in every
/// state; while stopped their values are stored and applied at the next load.
pub struct Player {
    opts: PlayerOptions,
    loader: Arc<dyn ManifestLoader>,
    sink: Arc<dyn SourceBufferSink>,
    drm: Arc<dyn DrmProvider>,
    net: Arc<dyn Net>,
    events: EventBus,
    device: DeviceMonitor,
    state_tx: watch::Sender<PlayerState>,
    settings_tx: watch::Sender<Settings>,
    session: Mutex<Option<Session>>,
    error_slot: Arc<Mutex<Option<PlayerError>>>,
    disposed: Mutex<bool>,
}

impl Player {
    pub fn new(
        opts: PlayerOptions,
        loader: Arc<dyn ManifestLoader>,
        sink: Arc<dyn SourceBufferSink>,
    ) -> Self {
        let net = Arc::new(HttpClient::new(opts.net.clone()));
        Self::with_collaborators(opts, loader, sink, Arc::new(NoopDrmProvider), net)
    }

    /// Full constructor for embedders providing their own DRM and transport.
    pub fn with_collaborators(
        opts: PlayerOptions,
        loader: Arc<dyn ManifestLoader>,
        sink: Arc<dyn SourceBufferSink>,
        drm: Arc<dyn DrmProvider>,
        net: Arc<dyn Net>,
    ) -> Self {
        let events = EventBus::new(opts.event_capacity);
        let (state_tx, _) = watch::channel(PlayerState::Stopped);
        let (settings_tx, _) = watch::channel(Settings::from_options(&opts));
        Self {
            opts,
            loader,
            sink,
            drm,
            net,
            events,
            device: DeviceMonitor::new(),
            state_tx,
            settings_tx,
            session: Mutex::new(None),
            error_slot: Arc::new(Mutex::new(None)),
            disposed: Mutex::new(false),
        }
    }

    /// Start loading a content. Any previous content is cancelled first.
    pub fn load_content(&self, load: LoadOptions) -> PlayerResult<()> {
        if *self.disposed.lock() {
            return Err(PlayerError::Disposed);
        }
        self.stop();
        *self.error_slot.lock() = None;

        let estimator = SharedEstimator::new(EstimatorOptions {
            low_latency_mode: load.low_latency_mode || self.opts.estimator.low_latency_mode,
            ..self.opts.estimator.clone()
        });
        let cancel = CancellationToken::new();
        let (playback_tx, playback_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let engine = Engine {
            opts: self.opts.clone(),
            load,
            loader: self.loader.clone(),
            sink: self.sink.clone(),
            drm: self.drm.clone(),
            net: self.net.clone(),
            events: self.events.clone(),
            state_tx: self.state_tx.clone(),
            settings_rx: self.settings_tx.subscribe(),
            device_rx: self.device.subscribe(),
            playback_rx,
            command_rx,
            estimator: estimator.clone(),
            cancel: cancel.clone(),
            error_slot: self.error_slot.clone(),
        };
        tokio::spawn(engine.run());

        *self.session.lock() = Some(Session {
            cancel,
            estimator,
            playback_tx,
            command_tx,
        });
        Ok(())
    }

    /// Cancel everything and transition to stopped. A no-op when already
    /// stopped.
    pub fn stop(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        debug!("player: stopping content");
        session.cancel.cancel();
        let from = *self.state_tx.borrow();
        if from != PlayerState::Stopped {
            self.state_tx.send_replace(PlayerState::Stopped);
            self.events.publish(PlayerEvent::StateChange {
                from: from.as_str(),
                to: PlayerState::Stopped.as_str(),
            });
        }
    }

    /// Final cleanup. The player is unusable afterwards; calling it again
    /// does nothing.
    pub fn dispose(&self) {
        self.stop();
        *self.disposed.lock() = true;
    }

    pub fn state(&self) -> PlayerState {
        *self.state_tx.borrow()
    }

    /// Subscribe to all engine events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// The fatal error that stopped the last content, until the next load.
    pub fn get_error(&self) -> Option<PlayerError> {
        self.error_slot.lock().clone()
    }

    /// Latest bandwidth estimate in bits per second.
    pub fn get_estimate(&self) -> Option<u64> {
        self.session
            .lock()
            .as_ref()
            .and_then(|s| s.estimator.estimate_bps(false))
    }

    /// Device-event source: viewport width and visibility feed the video
    /// chooser.
    pub fn device(&self) -> &DeviceMonitor {
        &self.device
    }

    /// Forward one platform media element event into the engine.
    pub fn notify_playback(&self, event: PlaybackEvent) {
        if let Some(session) = self.session.lock().as_ref() {
            let _ = session.playback_tx.send(event);
        }
    }

    pub fn seek_to(&self, target: SeekTarget) -> PlayerResult<()> {
        let guard = self.session.lock();
        let session = guard.as_ref().ok_or(PlayerError::NotLoaded)?;
        session
            .command_tx
            .send(Command::Seek(target))
            .map_err(|_| PlayerError::NotLoaded)
    }

    pub fn set_max_video_bitrate(&self, bitrate: u64) {
        self.settings_tx
            .send_modify(|s| s.max_video_bitrate = bitrate);
    }

    pub fn set_max_audio_bitrate(&self, bitrate: u64) {
        self.settings_tx
            .send_modify(|s| s.max_audio_bitrate = bitrate);
    }

    /// Pin the video bitrate; 0 returns to automatic selection.
    pub fn set_video_bitrate(&self, bitrate: u64) {
        self.settings_tx
            .send_modify(|s| s.video_bitrate_pin = bitrate);
    }

    /// Pin the audio bitrate; 0 returns to automatic selection.
    pub fn set_audio_bitrate(&self, bitrate: u64) {
        self.settings_tx
            .send_modify(|s| s.audio_bitrate_pin = bitrate);
    }

    pub fn set_wanted_buffer_ahead(&self, seconds: f64) {
        self.settings_tx
            .send_modify(|s| s.wanted_buffer_ahead = seconds);
    }

    pub fn set_max_buffer_ahead(&self, seconds: f64) {
        self.settings_tx
            .send_modify(|s| s.max_buffer_ahead = seconds);
    }

    pub fn set_max_buffer_behind(&self, seconds: f64) {
        self.settings_tx
            .send_modify(|s| s.max_buffer_behind = seconds);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Some(session) = self.session.lock().take() {
            session.cancel.cancel();
        }
    }
}
