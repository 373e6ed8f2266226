use std::{collections::HashMap, sync::Arc};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use web_time::Instant;

use tessera_abr::{Estimator, RepresentationChooser, SharedEstimator, SwitchReason};
use tessera_buffer::{BufferMonitor, StallReason};
use tessera_core::{
    Adaptation, Manifest, Representation, RepresentationId, SharedSegmentIndex, TrackType,
};
use tessera_events::{AbrEvent, EventBus, MetricsBus, PipelineEvent, PlayerEvent};
use tessera_net::Net;
use tessera_pipeline::{
    InitCache, ParsedSegment, PassthroughParser, PipelineOptions, SegmentEvent, SegmentPipeline,
};

use crate::{
    device::DeviceState,
    drm::{DrmProvider, KeyStatus},
    error::{PlayerError, PlayerResult},
    manifest::ManifestLoader,
    options::{LoadOptions, PlayerOptions, SeekTarget},
    platform::{PlaybackEvent, SourceBufferSink},
    state::PlayerState,
};

/// Setters the embedding API may change at any time. While stopped, the watch
/// holds the latest values and the next load applies them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Settings {
    pub max_video_bitrate: u64,
    pub max_audio_bitrate: u64,
    pub video_bitrate_pin: u64,
    pub audio_bitrate_pin: u64,
    pub wanted_buffer_ahead: f64,
    pub max_buffer_ahead: f64,
    pub max_buffer_behind: f64,
}

impl Settings {
    pub(crate) fn from_options(opts: &PlayerOptions) -> Self {
        Self {
            max_video_bitrate: u64::MAX,
            max_audio_bitrate: u64::MAX,
            video_bitrate_pin: 0,
            audio_bitrate_pin: 0,
            wanted_buffer_ahead: opts.wanted_buffer_ahead,
            max_buffer_ahead: opts.max_buffer_ahead,
            max_buffer_behind: opts.max_buffer_behind,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Command {
    Seek(SeekTarget),
}

/// What a track runner needs to know right now.
#[derive(Clone, Debug, PartialEq)]
struct TrackDirective {
    repr: Representation,
    /// Bumped on seek; runners reset their cursor to `start_segment`.
    epoch: u64,
    start_segment: u64,
    /// Media time beyond which fetching pauses.
    fetch_horizon: f64,
}

enum RunnerMsg {
    Appended {
        track: TrackType,
        start: f64,
        end: f64,
    },
    TrackEnded {
        track: TrackType,
    },
    Failed {
        track: TrackType,
        error: PlayerError,
    },
}

struct TrackRuntime {
    chooser: RepresentationChooser<SharedEstimator>,
    adaptation: Adaptation,
    directive_tx: watch::Sender<TrackDirective>,
    selected: usize,
    ended: bool,
}

/// One content session. Owns every per-content component; peers are wired by
/// constructor injection, so dropping the engine drops the whole graph.
pub(crate) struct Engine {
    pub opts: PlayerOptions,
    pub load: LoadOptions,
    pub loader: Arc<dyn ManifestLoader>,
    pub sink: Arc<dyn SourceBufferSink>,
    pub drm: Arc<dyn DrmProvider>,
    pub net: Arc<dyn Net>,
    pub events: EventBus,
    pub state_tx: watch::Sender<PlayerState>,
    pub settings_rx: watch::Receiver<Settings>,
    pub device_rx: watch::Receiver<DeviceState>,
    pub playback_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    pub command_rx: mpsc::UnboundedReceiver<Command>,
    pub estimator: SharedEstimator,
    pub cancel: CancellationToken,
    pub error_slot: Arc<Mutex<Option<PlayerError>>>,
}

impl Engine {
    pub(crate) async fn run(self) {
        let events = self.events.clone();
        let state_tx = self.state_tx.clone();
        let error_slot = self.error_slot.clone();
        let cancel = self.cancel.clone();

        let outcome = tokio::select! {
            () = cancel.cancelled() => Ok(()),
            r = self.run_content() => r,
        };

        if let Err(error) = outcome {
            warn!(%error, "engine: fatal error, stopping content");
            *error_slot.lock() = Some(error.clone());
            events.publish(PlayerEvent::Error {
                message: error.to_string(),
            });
            set_state(&events, &state_tx, PlayerState::Stopped);
        }
        cancel.cancel();
    }

    async fn run_content(self) -> PlayerResult<()> {
        let Engine {
            opts,
            load,
            loader,
            sink,
            drm,
            net,
            events,
            state_tx,
            mut settings_rx,
            mut device_rx,
            mut playback_rx,
            mut command_rx,
            mut estimator,
            cancel,
            error_slot: _,
        } = self;

        set_state(&events, &state_tx, PlayerState::Loading);

        let loaded = loader.load(&load).await?;
        let manifest = loaded.manifest.clone();
        let index = loaded.index.clone();
        events.publish(PlayerEvent::ManifestChange {
            is_live: manifest.is_live,
        });

        // DRM session: owned here, lifetime = content.
        let mut key_enabled = !load.key_systems.is_empty();
        let mut key_rx = if key_enabled {
            let mut session = drm.init(&load.key_systems).await?;
            session.key_statuses()
        } else {
            let (_tx, rx) = mpsc::unbounded_channel();
            rx
        };

        let (metrics, mut metrics_rx) = MetricsBus::new();
        let init_cache = InitCache::new();
        let (runner_tx, mut runner_rx) = mpsc::unbounded_channel::<RunnerMsg>();

        let mut position = load
            .start_at
            .unwrap_or(manifest.min_position)
            .clamp(manifest.min_position, manifest.max_position);

        let mut tracks: HashMap<TrackType, TrackRuntime> = HashMap::new();
        {
            let settings = *settings_rx.borrow();
            let device = *device_rx.borrow();

            for track_type in [
                TrackType::Video,
                TrackType::Audio,
                TrackType::Text,
                TrackType::Image,
            ] {
                let preferred = match track_type {
                    TrackType::Audio => load.default_audio_track.as_deref(),
                    TrackType::Text => load.default_text_track.as_deref(),
                    _ => None,
                };
                let Some(adaptation) = pick_adaptation(&manifest, track_type, preferred) else {
                    continue;
                };

                let mut chooser = RepresentationChooser::new(
                    adaptation.clone(),
                    opts.chooser.clone(),
                    estimator.clone(),
                );
                apply_settings_to_chooser(&mut chooser, track_type, &settings);
                apply_device_to_chooser(&mut chooser, track_type, &device, &opts);

                let choice = chooser.choose(Instant::now());
                let repr = adaptation.representations()[choice.index].clone();
                publish_selection(&events, track_type, None, &repr, choice.reason);

                let start_segment = index.segment_for_position(&repr, position).unwrap_or(0);
                let (directive_tx, directive_rx) = watch::channel(TrackDirective {
                    repr,
                    epoch: 0,
                    start_segment,
                    fetch_horizon: fetch_horizon(position, &settings),
                });

                let pipeline = SegmentPipeline::new(
                    track_type,
                    net.clone(),
                    Arc::new(PassthroughParser),
                    metrics.clone(),
                    events.clone(),
                    init_cache.clone(),
                    cancel.clone(),
                    PipelineOptions {
                        retry: segment_retry_for(track_type, &opts),
                        progress_interval: opts.progress_interval,
                    },
                );

                tokio::spawn(run_track(
                    track_type,
                    pipeline,
                    index.clone(),
                    sink.clone(),
                    directive_rx,
                    runner_tx.clone(),
                    cancel.clone(),
                ));

                tracks.insert(
                    track_type,
                    TrackRuntime {
                        chooser,
                        adaptation,
                        directive_tx,
                        selected: choice.index,
                        ended: false,
                    },
                );
            }
        }
        drop(runner_tx);

        if tracks.is_empty() {
            return Err(PlayerError::Manifest(
                "manifest exposes no playable adaptation".into(),
            ));
        }

        let mut monitor = BufferMonitor::new();
        monitor.set_position(position);
        let mut buffer_rx = monitor.subscribe();
        let mut intent_to_play = load.auto_play;
        monitor.set_intent_to_play(intent_to_play);

        let mut first_media_appended = false;
        let mut metrics_open = true;
        let mut runners_open = true;
        let mut controls_open = true;
        let mut stall_deadline: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),

                sample = metrics_rx.recv(), if metrics_open => {
                    match sample {
                        Some(sample) => {
                            estimator.push_sample(sample.sample);
                            retick(&events, &mut tracks, position, &settings_rx.borrow());
                        }
                        None => metrics_open = false,
                    }
                }

                msg = runner_rx.recv(), if runners_open => {
                    let Some(msg) = msg else {
                        runners_open = false;
                        continue;
                    };
                    match msg {
                        RunnerMsg::Appended { track, start, end } => {
                            monitor.append(start, end);
                            if !first_media_appended {
                                first_media_appended = true;
                                set_state(&events, &state_tx, PlayerState::Loaded);
                                set_state(&events, &state_tx, if intent_to_play {
                                    PlayerState::Playing
                                } else {
                                    PlayerState::Paused
                                });
                            }
                            debug!(track = %track, start, end, "engine: media appended");
                        }
                        RunnerMsg::TrackEnded { track } => {
                            events.publish(PipelineEvent::EndOfStream { track_type: track });
                            if let Some(t) = tracks.get_mut(&track) {
                                t.ended = true;
                            }
                            if tracks.values().all(|t| t.ended) {
                                set_state(&events, &state_tx, PlayerState::Ended);
                            }
                        }
                        RunnerMsg::Failed { error, track } => {
                            warn!(track = %track, %error, "engine: track failed");
                            return Err(error);
                        }
                    }
                }

                event = playback_rx.recv(), if controls_open => {
                    let Some(event) = event else {
                        controls_open = false;
                        continue;
                    };
                    match event {
                        PlaybackEvent::Play => {
                            intent_to_play = true;
                            monitor.set_intent_to_play(true);
                            if matches!(
                                *state_tx.borrow(),
                                PlayerState::Paused | PlayerState::Loaded
                            ) {
                                set_state(&events, &state_tx, PlayerState::Playing);
                            }
                        }
                        PlaybackEvent::Pause => {
                            intent_to_play = false;
                            monitor.set_intent_to_play(false);
                            if matches!(*state_tx.borrow(), PlayerState::Playing) {
                                set_state(&events, &state_tx, PlayerState::Paused);
                            }
                        }
                        PlaybackEvent::Seeking { position: p } => {
                            monitor.note_waiting(StallReason::Seeking);
                            position = p.clamp(manifest.min_position, manifest.max_position);
                            monitor.set_position(position);
                        }
                        PlaybackEvent::Waiting => {
                            monitor.note_waiting(StallReason::Buffering);
                        }
                        PlaybackEvent::Playing => {
                            monitor.note_playing();
                        }
                        PlaybackEvent::Ended => {
                            set_state(&events, &state_tx, PlayerState::Ended);
                        }
                        PlaybackEvent::TimeUpdate { position: p } => {
                            position = p;
                            monitor.set_position(position);
                            events.publish(PlayerEvent::PositionUpdate {
                                position,
                                duration: Some(manifest.max_position),
                            });
                            let settings = *settings_rx.borrow();
                            prune_behind(&sink, &mut monitor, position, &settings);
                            update_horizons(&mut tracks, position, &settings);
                        }
                        PlaybackEvent::RateChange { rate } => {
                            debug!(rate, "engine: playback rate changed");
                        }
                    }
                }

                changed = settings_rx.changed() => {
                    if changed.is_err() { continue }
                    let settings = *settings_rx.borrow_and_update();
                    for (track_type, t) in tracks.iter_mut() {
                        apply_settings_to_chooser(&mut t.chooser, *track_type, &settings);
                    }
                    update_horizons(&mut tracks, position, &settings);
                    retick(&events, &mut tracks, position, &settings);
                }

                changed = device_rx.changed() => {
                    if changed.is_err() { continue }
                    let device = *device_rx.borrow_and_update();
                    for (track_type, t) in tracks.iter_mut() {
                        apply_device_to_chooser(&mut t.chooser, *track_type, &device, &opts);
                    }
                    retick(&events, &mut tracks, position, &settings_rx.borrow());
                }

                changed = buffer_rx.changed() => {
                    if changed.is_err() { continue }
                    let health = *buffer_rx.borrow_and_update();
                    let now = Instant::now();
                    for t in tracks.values_mut() {
                        t.chooser.set_stalled(health.stalled, now);
                    }
                    stall_deadline = health.stalled.then(|| {
                        tokio::time::Instant::now() + opts.chooser.stall_fallback_after
                    });

                    let state = *state_tx.borrow();
                    if health.stalled && state.is_active() {
                        let target = match health.reason {
                            Some(StallReason::Seeking) => PlayerState::Seeking,
                            _ => PlayerState::Buffering,
                        };
                        set_state(&events, &state_tx, target);
                    } else if !health.stalled
                        && matches!(state, PlayerState::Buffering | PlayerState::Seeking)
                    {
                        set_state(&events, &state_tx, if intent_to_play {
                            PlayerState::Playing
                        } else {
                            PlayerState::Paused
                        });
                    }
                    retick(&events, &mut tracks, position, &settings_rx.borrow());
                }

                () = async {
                    match stall_deadline {
                        Some(d) => tokio::time::sleep_until(d).await,
                        None => std::future::pending().await,
                    }
                } => {
                    // Prolonged stall: run the choosers through the fallback
                    // branch even though no new input event arrived.
                    stall_deadline = None;
                    retick(&events, &mut tracks, position, &settings_rx.borrow());
                }

                cmd = command_rx.recv(), if controls_open => {
                    let Some(cmd) = cmd else {
                        controls_open = false;
                        continue;
                    };
                    match cmd {
                        Command::Seek(target) => {
                            match resolve_seek(target, &manifest, position) {
                                Ok(resolved) => {
                                    debug!(from = position, to = resolved, "engine: seek");
                                    position = resolved;
                                    monitor.note_waiting(StallReason::Seeking);
                                    monitor.set_position(position);
                                    let settings = *settings_rx.borrow();
                                    for t in tracks.values_mut() {
                                        t.ended = false;
                                        let repr =
                                            t.adaptation.representations()[t.selected].clone();
                                        let start_segment = index
                                            .segment_for_position(&repr, position)
                                            .unwrap_or(0);
                                        t.directive_tx.send_modify(|d| {
                                            d.epoch += 1;
                                            d.start_segment = start_segment;
                                            d.fetch_horizon = fetch_horizon(position, &settings);
                                        });
                                    }
                                }
                                Err(error) => {
                                    events.publish(PlayerEvent::Warning {
                                        message: error.to_string(),
                                    });
                                }
                            }
                        }
                    }
                }

                status = key_rx.recv(), if key_enabled => {
                    match status {
                        Some(KeyStatus::Usable) => {}
                        Some(KeyStatus::Expired) => {
                            events.publish(PlayerEvent::Warning {
                                message: "content key expired".into(),
                            });
                        }
                        Some(KeyStatus::InternalError(message)) => {
                            return Err(PlayerError::Key(message));
                        }
                        None => key_enabled = false,
                    }
                }
            }
        }
    }
}

fn set_state(events: &EventBus, state_tx: &watch::Sender<PlayerState>, to: PlayerState) {
    let from = *state_tx.borrow();
    if from == to {
        return;
    }
    state_tx.send_replace(to);
    debug!(from = %from, to = %to, "engine: state change");
    // Exactly one emission per transition.
    events.publish(PlayerEvent::StateChange {
        from: from.as_str(),
        to: to.as_str(),
    });
}

/// Re-run every chooser; publish and redirect on change.
fn retick(
    events: &EventBus,
    tracks: &mut HashMap<TrackType, TrackRuntime>,
    position: f64,
    settings: &Settings,
) {
    let now = Instant::now();
    for (track_type, t) in tracks.iter_mut() {
        let choice = t.chooser.choose(now);
        if !choice.changed {
            continue;
        }
        let from = t.adaptation.representations()[t.selected].id.clone();
        let repr = t.adaptation.representations()[choice.index].clone();
        t.selected = choice.index;
        publish_selection(events, *track_type, Some(from), &repr, choice.reason);
        t.directive_tx.send_modify(|d| {
            d.repr = repr;
            d.fetch_horizon = fetch_horizon(position, settings);
        });
    }
}

fn publish_selection(
    events: &EventBus,
    track_type: TrackType,
    from: Option<RepresentationId>,
    repr: &Representation,
    reason: SwitchReason,
) {
    events.publish(AbrEvent::RepresentationChange {
        track_type,
        from,
        to: repr.id.clone(),
        bitrate: repr.bitrate,
        reason,
    });
    match track_type {
        TrackType::Video => events.publish(AbrEvent::VideoBitrateChange {
            bitrate: repr.bitrate,
        }),
        TrackType::Audio => events.publish(AbrEvent::AudioBitrateChange {
            bitrate: repr.bitrate,
        }),
        _ => {}
    }
}

fn prune_behind(
    sink: &Arc<dyn SourceBufferSink>,
    monitor: &mut BufferMonitor,
    position: f64,
    settings: &Settings,
) {
    if !settings.max_buffer_behind.is_finite() {
        return;
    }
    let cut = position - settings.max_buffer_behind;
    if cut <= 0.0 {
        return;
    }
    if let Err(message) = sink.remove(0.0, cut) {
        warn!(%message, "engine: source buffer remove failed");
        return;
    }
    monitor.remove(0.0, cut);
}

fn update_horizons(tracks: &mut HashMap<TrackType, TrackRuntime>, position: f64, settings: &Settings) {
    let horizon = fetch_horizon(position, settings);
    for t in tracks.values_mut() {
        t.directive_tx.send_if_modified(|d| {
            if (d.fetch_horizon - horizon).abs() < f64::EPSILON {
                return false;
            }
            d.fetch_horizon = horizon;
            true
        });
    }
}

fn fetch_horizon(position: f64, settings: &Settings) -> f64 {
    let ahead = settings.wanted_buffer_ahead.min(settings.max_buffer_ahead);
    position + ahead
}

fn segment_retry_for(track_type: TrackType, opts: &PlayerOptions) -> tessera_net::RetryPolicy {
    if track_type == TrackType::Image {
        // Optional tracks are not worth retry budget.
        tessera_net::RetryPolicy {
            max_retry: 0,
            ..opts.segment_retry.clone()
        }
    } else {
        opts.segment_retry.clone()
    }
}

fn pick_adaptation(
    manifest: &Manifest,
    track_type: TrackType,
    preferred_language: Option<&str>,
) -> Option<Adaptation> {
    if let Some(lang) = preferred_language {
        if let Some(a) = manifest
            .adaptations_for(track_type)
            .find(|a| a.language() == Some(lang))
        {
            return Some(a.clone());
        }
    }
    manifest.first_adaptation(track_type).cloned()
}

fn apply_settings_to_chooser(
    chooser: &mut RepresentationChooser<SharedEstimator>,
    track_type: TrackType,
    settings: &Settings,
) {
    match track_type {
        TrackType::Video => {
            chooser.set_max_bitrate(settings.max_video_bitrate);
            chooser.set_manual_bitrate(settings.video_bitrate_pin);
        }
        TrackType::Audio => {
            chooser.set_max_bitrate(settings.max_audio_bitrate);
            chooser.set_manual_bitrate(settings.audio_bitrate_pin);
        }
        _ => {}
    }
}

fn apply_device_to_chooser(
    chooser: &mut RepresentationChooser<SharedEstimator>,
    track_type: TrackType,
    device: &DeviceState,
    opts: &PlayerOptions,
) {
    if track_type != TrackType::Video {
        return;
    }
    chooser.set_limit_width(device.viewport_width);
    chooser.set_throttle_bitrate(if device.visible {
        u64::MAX
    } else {
        opts.throttle_bitrate_when_hidden
    });
}

fn resolve_seek(target: SeekTarget, manifest: &Manifest, position: f64) -> PlayerResult<f64> {
    let raw = match target {
        SeekTarget::Position(p) => p,
        SeekTarget::Relative(delta) => position + delta,
        SeekTarget::WallClock(wall) => {
            let start = manifest.availability_start.ok_or_else(|| {
                PlayerError::InvalidSeek("manifest declares no availability start".into())
            })?;
            wall - start
        }
    };
    if !raw.is_finite() {
        return Err(PlayerError::InvalidSeek(format!("{raw} is not a position")));
    }
    Ok(raw.clamp(manifest.min_position, manifest.max_position))
}

/// Per-track fetch loop.
///
/// Follows the directive watch: fetches the current representation's segments
/// in order, pausing at the fetch horizon, jumping on seek epochs, and
/// prepending an initialization segment whenever the representation changes.
async fn run_track(
    track: TrackType,
    pipeline: SegmentPipeline,
    index: SharedSegmentIndex,
    sink: Arc<dyn SourceBufferSink>,
    mut directive_rx: watch::Receiver<TrackDirective>,
    msg_tx: mpsc::UnboundedSender<RunnerMsg>,
    cancel: CancellationToken,
) {
    let mut epoch = directive_rx.borrow().epoch;
    let mut cursor = directive_rx.borrow().start_segment;
    let mut last_init: Option<RepresentationId> = None;
    let mut ended_reported = false;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        let directive = directive_rx.borrow_and_update().clone();
        if directive.epoch != epoch {
            epoch = directive.epoch;
            cursor = directive.start_segment;
            ended_reported = false;
        }
        let repr = directive.repr.clone();

        let Some(desc) = index.media_segment(&repr, cursor) else {
            if !ended_reported {
                ended_reported = true;
                let _ = msg_tx.send(RunnerMsg::TrackEnded { track });
            }
            if wait_for_change(&mut directive_rx, &cancel).await.is_err() {
                return;
            }
            continue;
        };

        // Respect the buffer-ahead policy.
        if desc.start.is_some_and(|s| s > directive.fetch_horizon) {
            if wait_for_change(&mut directive_rx, &cancel).await.is_err() {
                return;
            }
            continue;
        }

        // A representation change requires its init segment first.
        if last_init.as_ref() != Some(&repr.id) {
            if let Some(init_desc) = index.init_segment(&repr) {
                match load_terminal(&pipeline, &repr, init_desc).await {
                    LoadOutcome::Done(segment) => {
                        if let Err(message) = sink.append(&segment) {
                            let _ = msg_tx.send(RunnerMsg::Failed {
                                track,
                                error: PlayerError::Media(message),
                            });
                            return;
                        }
                    }
                    LoadOutcome::Cancelled => return,
                    LoadOutcome::Failed(error) => {
                        let _ = msg_tx.send(RunnerMsg::Failed { track, error });
                        return;
                    }
                }
            }
            last_init = Some(repr.id.clone());
        }

        match load_terminal(&pipeline, &repr, desc.clone()).await {
            LoadOutcome::Done(segment) => {
                if let Err(message) = sink.append(&segment) {
                    let _ = msg_tx.send(RunnerMsg::Failed {
                        track,
                        error: PlayerError::Media(message),
                    });
                    return;
                }
                let start = desc.start.unwrap_or(0.0);
                let end = start + desc.duration.map_or(0.0, |d| d.as_secs_f64());
                let _ = msg_tx.send(RunnerMsg::Appended { track, start, end });
                cursor += 1;
            }
            LoadOutcome::Cancelled => return,
            LoadOutcome::Failed(error) => {
                let _ = msg_tx.send(RunnerMsg::Failed { track, error });
                return;
            }
        }
    }
}

enum LoadOutcome {
    Done(ParsedSegment),
    Cancelled,
    Failed(PlayerError),
}

/// Drive one segment load to its terminal event.
async fn load_terminal(
    pipeline: &SegmentPipeline,
    repr: &Representation,
    desc: tessera_core::SegmentDescriptor,
) -> LoadOutcome {
    let mut stream = pipeline.load_segment(repr.clone(), desc);
    while let Some(item) = stream.next().await {
        match item {
            Ok(SegmentEvent::Progress { .. }) => {}
            Ok(SegmentEvent::Parsed(segment)) => return LoadOutcome::Done(segment),
            Err(error) => return LoadOutcome::Failed(error.into()),
        }
    }
    LoadOutcome::Cancelled
}

async fn wait_for_change(
    rx: &mut watch::Receiver<TrackDirective>,
    cancel: &CancellationToken,
) -> Result<(), ()> {
    tokio::select! {
        () = cancel.cancelled() => Err(()),
        changed = rx.changed() => changed.map_err(|_| ()),
    }
}
