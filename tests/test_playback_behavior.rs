mod support;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::support::{tracing_init, MockCall, MockMediaSource, MockSourceHandle};
use deckplay::playback::{
    MediaErrorKind, MediaEvent, PlaybackHandle, PlaybackPhase, PlaybackService,
    PlaybackServiceError, PlaybackState, StateSubscription, TrackMeta,
};
use deckplay::ui::{NowPlayingView, PlayIndicator};

const WAIT: Duration = Duration::from_secs(2);

fn start(source: MockMediaSource) -> PlaybackHandle {
    tracing_init();
    PlaybackService::start(
        source,
        TrackMeta::default(),
        tokio::runtime::Handle::current(),
    )
}

/// Read snapshots until one satisfies `predicate`
async fn wait_for<F>(subscription: &mut StateSubscription, predicate: F) -> PlaybackState
where
    F: Fn(&PlaybackState) -> bool,
{
    timeout(WAIT, async {
        loop {
            match subscription.recv().await {
                Some(state) if predicate(&state) => return state,
                Some(state) => debug!("Skipping state {:?}", state.phase),
                None => panic!("Subscription ended before the expected state arrived"),
            }
        }
    })
    .await
    .expect("Timed out waiting for state")
}

/// Poll the mock until `predicate` holds
async fn wait_until<F>(source: &MockSourceHandle, predicate: F)
where
    F: Fn(&MockSourceHandle) -> bool,
{
    timeout(WAIT, async {
        while !predicate(source) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Timed out waiting for the media source");
}

#[tokio::test]
async fn test_service_starts_with_defaults() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);

    let state = playback.snapshot().await.unwrap();
    assert!(!state.is_playing);
    assert_eq!(state.current_time, 0.0);
    assert_eq!(state.duration, 0.0);
    assert_eq!(state.volume, 1.0);
    assert!(!state.is_muted);
    assert!(!state.is_repeat);
    assert!(!state.is_shuffle);
    assert!(!state.is_liked);
    assert_eq!(state.phase, PlaybackPhase::Idle);
    assert_eq!(state.track.title, "Midnight Dreams");

    assert!(mock.is_subscribed());
    assert_eq!(mock.calls(), vec![MockCall::Subscribe]);

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_commands_apply_in_order() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);

    playback.set_volume(0.5);
    playback.toggle_repeat();
    playback.toggle_liked();
    playback.toggle_shuffle();
    playback.toggle_shuffle();
    // Duration still unknown, so any seek lands on 0
    playback.seek(30.0);

    let state = playback.snapshot().await.unwrap();
    assert_eq!(state.volume, 0.5);
    assert!(state.is_repeat);
    assert!(state.is_liked);
    assert!(!state.is_shuffle);
    assert_eq!(state.current_time, 0.0);

    assert_eq!(
        mock.calls(),
        vec![
            MockCall::Subscribe,
            MockCall::SetVolume(0.5),
            MockCall::SetCurrentTime(0.0),
        ]
    );

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_play_pause_follows_source_acknowledgement() {
    let (source, mock) = MockMediaSource::responsive();
    let playback = start(source);
    let mut subscription = playback.subscribe();

    playback.toggle_play_pause();
    let state = wait_for(&mut subscription, |s| s.is_playing).await;
    assert_eq!(state.phase, PlaybackPhase::Playing);

    playback.toggle_play_pause();
    let state = wait_for(&mut subscription, |s| !s.is_playing).await;
    assert_eq!(state.phase, PlaybackPhase::Paused);

    assert_eq!(
        mock.calls(),
        vec![MockCall::Subscribe, MockCall::Play, MockCall::Pause]
    );

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unacknowledged_play_leaves_state_alone() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);

    playback.toggle_play_pause();
    playback.toggle_play_pause();

    let state = playback.snapshot().await.unwrap();
    assert!(!state.is_playing);
    // Still not playing, so both presses asked to play
    assert_eq!(
        mock.calls(),
        vec![MockCall::Subscribe, MockCall::Play, MockCall::Play]
    );

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_metadata_and_time_updates_reach_subscribers() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);
    let mut subscription = playback.subscribe();

    assert!(mock.emit(MediaEvent::MetadataLoaded { duration: 180.0 }));
    let state = wait_for(&mut subscription, |s| s.phase == PlaybackPhase::Ready).await;
    assert_eq!(state.duration, 180.0);

    assert!(mock.emit(MediaEvent::TimeUpdate { time: 42.0 }));
    let state = wait_for(&mut subscription, |s| s.current_time == 42.0).await;

    let view = NowPlayingView::from_state(&state);
    assert_eq!(view.elapsed, "0:42");
    assert_eq!(view.total, "3:00");

    // Past the end gets clamped
    assert!(mock.emit(MediaEvent::TimeUpdate { time: 500.0 }));
    let state = wait_for(&mut subscription, |s| s.current_time != 42.0).await;
    assert_eq!(state.current_time, 180.0);

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_seek_after_metadata_is_clamped() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);
    let mut subscription = playback.subscribe();

    mock.emit(MediaEvent::MetadataLoaded { duration: 100.0 });
    wait_for(&mut subscription, |s| s.duration == 100.0).await;

    playback.seek(250.0);
    playback.seek(-5.0);
    playback.seek(37.5);

    let state = playback.snapshot().await.unwrap();
    assert_eq!(state.current_time, 37.5);

    let seeks: Vec<_> = mock
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MockCall::SetCurrentTime(_)))
        .collect();
    assert_eq!(
        seeks,
        vec![
            MockCall::SetCurrentTime(100.0),
            MockCall::SetCurrentTime(0.0),
            MockCall::SetCurrentTime(37.5),
        ]
    );

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_mute_restores_previous_volume() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);

    playback.set_volume(0.7);
    playback.toggle_mute();

    let state = playback.snapshot().await.unwrap();
    assert!(state.is_muted);
    assert_eq!(state.volume, 0.7);
    assert_eq!(NowPlayingView::from_state(&state).slider_volume, 0.0);

    playback.toggle_mute();
    let state = playback.snapshot().await.unwrap();
    assert!(!state.is_muted);

    assert_eq!(
        mock.calls(),
        vec![
            MockCall::Subscribe,
            MockCall::SetVolume(0.7),
            MockCall::SetVolume(0.0),
            MockCall::SetVolume(0.7),
        ]
    );

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_repeat_restarts_at_end() {
    let (source, mock) = MockMediaSource::responsive();
    let playback = start(source);
    let mut subscription = playback.subscribe();

    mock.emit(MediaEvent::MetadataLoaded { duration: 120.0 });
    playback.toggle_repeat();
    playback.toggle_play_pause();
    wait_for(&mut subscription, |s| s.is_playing && s.is_repeat).await;

    mock.emit(MediaEvent::TimeUpdate { time: 119.5 });
    wait_for(&mut subscription, |s| s.current_time == 119.5).await;

    mock.emit(MediaEvent::Ended);
    let rewound = wait_for(&mut subscription, |s| !s.is_playing).await;
    assert_eq!(rewound.current_time, 0.0);

    let restarted = wait_for(&mut subscription, |s| s.is_playing).await;
    assert_eq!(restarted.phase, PlaybackPhase::Playing);
    assert_eq!(restarted.current_time, 0.0);

    let calls = mock.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[MockCall::SetCurrentTime(0.0), MockCall::Play]
    );

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_end_without_repeat_stays_ended() {
    let (source, mock) = MockMediaSource::responsive();
    let playback = start(source);
    let mut subscription = playback.subscribe();

    mock.emit(MediaEvent::MetadataLoaded { duration: 60.0 });
    playback.toggle_play_pause();
    wait_for(&mut subscription, |s| s.is_playing).await;

    mock.emit(MediaEvent::Ended);
    let state = wait_for(&mut subscription, |s| s.phase == PlaybackPhase::Ended).await;
    assert!(!state.is_playing);
    assert_eq!(state.current_time, 60.0);

    let snapshot = playback.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, PlaybackPhase::Ended);
    assert_eq!(mock.calls().last(), Some(&MockCall::Play));

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_error_then_retry() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);
    let mut subscription = playback.subscribe();

    mock.emit(MediaEvent::Error(MediaErrorKind::PlaybackRefused(
        "device busy".to_string(),
    )));
    let state = wait_for(&mut subscription, |s| s.error.is_some()).await;
    assert!(!state.is_playing);
    assert_eq!(
        NowPlayingView::from_state(&state).play_indicator,
        PlayIndicator::Unavailable
    );

    // The controller keeps accepting commands after an error
    playback.toggle_play_pause();
    wait_until(&mock, |m| m.calls().contains(&MockCall::Play)).await;

    mock.emit(MediaEvent::Started);
    let state = wait_for(&mut subscription, |s| s.is_playing).await;
    assert_eq!(state.error, None);

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_every_subscriber_sees_updates() {
    let (source, _mock) = MockMediaSource::new();
    let playback = start(source);
    let mut first = playback.subscribe();
    let mut second = playback.subscribe();

    playback.toggle_liked();

    let a = wait_for(&mut first, |s| s.is_liked).await;
    let b = wait_for(&mut second, |s| s.is_liked).await;
    assert_eq!(a, b);

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_watch_misses_no_change_after_its_snapshot() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);

    playback.toggle_liked();
    // May be applied before or after the snapshot; either way it is seen
    mock.emit(MediaEvent::MetadataLoaded { duration: 95.0 });
    let (state, mut subscription) = playback.watch().await.unwrap();
    assert!(state.is_liked);

    playback.toggle_shuffle();
    let latest = wait_for(&mut subscription, |s| s.is_shuffle && s.duration == 95.0).await;
    assert!(latest.is_liked);
    assert_eq!(latest.phase, PlaybackPhase::Ready);

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_no_op_commands_do_not_notify() {
    let (source, _mock) = MockMediaSource::new();
    let playback = start(source);
    let mut subscription = playback.subscribe();

    // Already at full volume and at position 0
    playback.set_volume(1.0);
    playback.seek(0.0);
    playback.toggle_play_pause();
    playback.snapshot().await.unwrap();

    assert!(subscription.try_recv().is_none());

    playback.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_unsubscribes_before_release() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);
    let mut subscription = playback.subscribe();

    playback.shutdown().await.unwrap();

    let calls = mock.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[MockCall::Unsubscribe, MockCall::Released]
    );

    // Nothing can reach the controller any more
    assert!(!mock.emit(MediaEvent::Started));

    let end = timeout(WAIT, subscription.recv()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_handle_reports_stopped_service() {
    let (source, _mock) = MockMediaSource::new();
    let playback = start(source);
    let other = playback.clone();

    playback.shutdown().await.unwrap();

    assert!(!other.is_running());
    assert!(matches!(
        other.snapshot().await,
        Err(PlaybackServiceError::Stopped)
    ));
    assert!(matches!(
        other.shutdown().await,
        Err(PlaybackServiceError::Stopped)
    ));

    // Commands after shutdown are dropped quietly
    other.toggle_play_pause();

    // A late subscriber sees the end right away
    let mut late = other.subscribe();
    let end = timeout(WAIT, late.recv()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_dropping_every_handle_releases_source() {
    let (source, mock) = MockMediaSource::new();
    let playback = start(source);
    let copy = playback.clone();

    drop(playback);
    assert!(!mock.is_released());

    drop(copy);
    wait_until(&mock, |m| m.is_released()).await;
    assert!(!mock.is_subscribed());
}
