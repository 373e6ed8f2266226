
use std::{sync::Arc, time::Duration};

use fixture::{
    serve_segments, video_manifest, Appended, CollectingSink, FailingLoader, FixedIndex,
    StubLoader,
};
use tokio::sync::broadcast;

use tessera::{
    AbrEvent, Event, LoadOptions, PlaybackEvent, Player, PlayerError, PlayerEvent, PlayerOptions,
    PlayerState, SeekTarget,
};
use tessera_abr::SwitchReason;

fn dummy_url() -> url::Url {
    "http://127.0.0.1:9/manifest.mpd".parse().unwrap()
}

async fn player_with_server(
    bitrates: &[u64],
    segment_count: u64,
    opts: PlayerOptions,
) -> (Player, Arc<CollectingSink>) {
    let base = serve_segments(200_000, Duration::from_millis(1)).await;
    let index = Arc::new(FixedIndex {
        base,
        segment_count,
        with_init: true,
    });
    let loader = Arc::new(StubLoader {
        manifest: video_manifest(bitrates),
        index,
    });
    let sink = Arc::new(CollectingSink::default());
    (Player::new(opts, loader, sink.clone()), sink)
}

/// Wait until an event matching `pred` arrives, with a hard deadline.
async fn wait_for_event<F>(rx: &mut broadcast::Receiver<Event>, mut pred: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn is_state_change(event: &Event, to: &str) -> bool {
    matches!(
        event,
        Event::Player(PlayerEvent::StateChange { to: t, .. }) if *t == to
    )
}

#[tokio::test]
async fn load_plays_init_then_media_in_order() {
    let (player, sink) =
        player_with_server(&[500_000], 3, PlayerOptions::default()).await;
    let mut events = player.events();

    player
        .load_content(LoadOptions::new(dummy_url()).with_auto_play(true))
        .unwrap();

    wait_for_event(&mut events, |e| is_state_change(e, "LOADING")).await;
    wait_for_event(&mut events, |e| is_state_change(e, "LOADED")).await;
    wait_for_event(&mut events, |e| is_state_change(e, "PLAYING")).await;
    wait_for_event(&mut events, |e| is_state_change(e, "ENDED")).await;

    let appended = sink.appended.lock().clone();
    assert_eq!(
        appended[0],
        Appended::Init {
            repr: "v0".to_string()
        }
    );
    let media: Vec<_> = appended
        .iter()
        .filter_map(|a| match a {
            Appended::Media { prefix, .. } => Some(prefix.clone()),
            Appended::Init { .. } => None,
        })
        .collect();
    assert_eq!(media, vec!["v0-seg_0.m4s", "v0-seg_1.m4s", "v0-seg_2.m4s"]);

    player.stop();
}

#[tokio::test]
async fn throughput_drives_an_up_switch() {
    // Fast local transfers push the estimate far above the top rung.
    let (player, sink) =
        player_with_server(&[256_000, 512_000, 1_024_000], 5, PlayerOptions::default()).await;
    let mut events = player.events();

    player
        .load_content(LoadOptions::new(dummy_url()).with_auto_play(true))
        .unwrap();

    let switch = wait_for_event(&mut events, |e| {
        matches!(
            e,
            Event::Abr(AbrEvent::RepresentationChange {
                reason: SwitchReason::UpSwitch,
                ..
            })
        )
    })
    .await;
    match switch {
        Event::Abr(AbrEvent::RepresentationChange { to, bitrate, .. }) => {
            assert_eq!(to.as_str(), "v2");
            assert_eq!(bitrate, 1_024_000);
        }
        _ => unreachable!(),
    }

    wait_for_event(&mut events, |e| is_state_change(e, "ENDED")).await;

    let appended = sink.appended.lock().clone();
    // The switch prepends the new rendition's init before its first segment.
    assert!(appended.contains(&Appended::Init {
        repr: "v2".to_string()
    }));
    match appended.last().unwrap() {
        Appended::Media { repr, .. } => assert_eq!(repr, "v2"),
        other => panic!("expected media append last, got {other:?}"),
    }

    player.stop();
}

#[tokio::test]
async fn manual_pin_stored_while_stopped_applies_on_load() {
    let (player, _sink) = player_with_server(
        &[500_000, 2_000_000, 5_000_000],
        2,
        PlayerOptions::default(),
    )
    .await;

    // Setter before any load: stored, applied on the next load.
    player.set_video_bitrate(2_000_000);
    let mut events = player.events();
    player.load_content(LoadOptions::new(dummy_url())).unwrap();

    let initial = wait_for_event(&mut events, |e| {
        matches!(e, Event::Abr(AbrEvent::RepresentationChange { .. }))
    })
    .await;
    match initial {
        Event::Abr(AbrEvent::RepresentationChange {
            bitrate, reason, ..
        }) => {
            assert_eq!(bitrate, 2_000_000);
            assert_eq!(reason, SwitchReason::ManualOverride);
        }
        _ => unreachable!(),
    }

    player.stop();
}

#[tokio::test]
async fn pin_round_trips_through_settings() {
    let (player, _sink) = player_with_server(
        &[500_000, 2_000_000, 5_000_000],
        64,
        PlayerOptions::default(),
    )
    .await;
    let mut events = player.events();
    player
        .load_content(LoadOptions::new(dummy_url()).with_auto_play(true))
        .unwrap();
    wait_for_event(&mut events, |e| is_state_change(e, "LOADED")).await;

    // Pin far above the estimate: the pin must win over the cap.
    player.set_video_bitrate(5_000_000);
    let change = wait_for_event(&mut events, |e| {
        matches!(
            e,
            Event::Abr(AbrEvent::RepresentationChange {
                reason: SwitchReason::ManualOverride,
                ..
            })
        )
    })
    .await;
    match change {
        Event::Abr(AbrEvent::RepresentationChange { bitrate, .. }) => {
            assert_eq!(bitrate, 5_000_000)
        }
        _ => unreachable!(),
    }

    player.stop();
}

#[tokio::test]
async fn stop_is_idempotent_and_silences_the_engine() {
    let (player, _sink) =
        player_with_server(&[500_000], 64, PlayerOptions::default()).await;
    let mut events = player.events();
    player
        .load_content(LoadOptions::new(dummy_url()).with_auto_play(true))
        .unwrap();
    wait_for_event(&mut events, |e| is_state_change(e, "LOADED")).await;

    player.stop();
    assert_eq!(player.state(), PlayerState::Stopped);
    player.stop(); // no-op
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.get_estimate(), None, "estimate gone with the session");

    // Drain whatever was in flight, then verify silence.
    tokio::time::sleep(Duration::from_millis(100)).await;
    while events.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        events.try_recv().is_err(),
        "no component may emit after stop"
    );
}

#[tokio::test]
async fn dispose_twice_does_not_error_and_blocks_loads() {
    let (player, _sink) =
        player_with_server(&[500_000], 2, PlayerOptions::default()).await;
    player.dispose();
    player.dispose();
    let err = player.load_content(LoadOptions::new(dummy_url())).unwrap_err();
    assert!(matches!(err, PlayerError::Disposed));
}

#[tokio::test]
async fn manifest_failure_stores_error_and_stops() {
    let sink = Arc::new(CollectingSink::default());
    let player = Player::new(
        PlayerOptions::default(),
        Arc::new(FailingLoader),
        sink,
    );
    let mut events = player.events();
    player.load_content(LoadOptions::new(dummy_url())).unwrap();

    wait_for_event(&mut events, |e| {
        matches!(e, Event::Player(PlayerEvent::Error { .. }))
    })
    .await;
    assert_eq!(player.state(), PlayerState::Stopped);
    assert!(matches!(
        player.get_error(),
        Some(PlayerError::Manifest(_))
    ));

    // The stored error clears on the next load attempt.
    player.load_content(LoadOptions::new(dummy_url())).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    player.stop();
}

#[tokio::test]
async fn seek_requires_loaded_content() {
    let (player, _sink) =
        player_with_server(&[500_000], 2, PlayerOptions::default()).await;
    let err = player.seek_to(SeekTarget::Position(10.0)).unwrap_err();
    assert!(matches!(err, PlayerError::NotLoaded));
}

#[tokio::test]
async fn time_updates_prune_behind_the_playhead() {
    let (player, sink) =
        player_with_server(&[500_000], 3, PlayerOptions::default()).await;
    let mut events = player.events();
    player
        .load_content(LoadOptions::new(dummy_url()).with_auto_play(true))
        .unwrap();
    player.set_max_buffer_behind(4.0);
    wait_for_event(&mut events, |e| is_state_change(e, "ENDED")).await;

    player.notify_playback(PlaybackEvent::TimeUpdate { position: 10.0 });
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if !sink.removed.lock().is_empty() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected a source-buffer remove"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let removed = sink.removed.lock().clone();
    assert_eq!(removed[0].0, 0.0);
    assert!((removed[0].1 - 6.0).abs() < 1e-9, "cut = position - behind");

    player.stop();
}

#[tokio::test]
async fn playback_events_drive_pause_and_resume() {
    let (player, _sink) =
        player_with_server(&[500_000], 64, PlayerOptions::default()).await;
    let mut events = player.events();
    player
        .load_content(LoadOptions::new(dummy_url()).with_auto_play(true))
        .unwrap();
    wait_for_event(&mut events, |e| is_state_change(e, "PLAYING")).await;

    player.notify_playback(PlaybackEvent::Pause);
    wait_for_event(&mut events, |e| is_state_change(e, "PAUSED")).await;

    player.notify_playback(PlaybackEvent::Play);
    wait_for_event(&mut events, |e| is_state_change(e, "PLAYING")).await;

    player.stop();
}

#[tokio::test]
async fn hidden_document_throttles_video_bitrate() {
    let opts = PlayerOptions::default().with_throttle_bitrate_when_hidden(300_000);
    let (player, _sink) =
        player_with_server(&[256_000, 512_000, 1_024_000], 64, opts).await;
    let mut events = player.events();
    player
        .load_content(LoadOptions::new(dummy_url()).with_auto_play(true))
        .unwrap();

    // Let the estimate establish and the chooser climb.
    wait_for_event(&mut events, |e| {
        matches!(
            e,
            Event::Abr(AbrEvent::RepresentationChange {
                reason: SwitchReason::UpSwitch,
                ..
            })
        )
    })
    .await;

    player.device().set_visible(false);
    let down = wait_for_event(&mut events, |e| {
        matches!(
            e,
            Event::Abr(AbrEvent::RepresentationChange {
                reason: SwitchReason::DownSwitch,
                ..
            })
        )
    })
    .await;
    match down {
        Event::Abr(AbrEvent::RepresentationChange { bitrate, .. }) => {
            assert_eq!(bitrate, 256_000, "throttle caps below 300k")
        }
        _ => unreachable!(),
    }

    player.stop();
}
