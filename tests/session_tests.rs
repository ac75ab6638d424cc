//! Session state machine, camera lifecycle and runner tests

#[cfg(test)]
mod tests {
    use minigame_host::camera::{
        CameraAcquisition, CameraOutcome, CameraProvider, CameraStream, NoCameraProvider,
    };
    use minigame_host::protocol::{BridgeEnvelope, BridgeMessage, OriginToken};
    use minigame_host::runner::{RunnerConfig, SessionRunner};
    use minigame_host::session::{GameSession, SessionError};
    use minigame_host::simulation::Ray;
    use minigame_host::types::{
        CameraStatus, ContentDefinition, SessionConfig, SessionPhase, SimulatedGameConfig,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    const DT: f32 = 1.0 / 30.0;

    fn make_sim_session(game: SimulatedGameConfig) -> GameSession {
        GameSession::new(ContentDefinition::Simulated(game), SessionConfig::default())
    }

    fn make_raw_session(source: &str) -> GameSession {
        GameSession::new(
            ContentDefinition::RawContent {
                source: source.into(),
            },
            SessionConfig::default(),
        )
    }

    /// Shared score log wired into a session's callbacks.
    fn capture(log: &Arc<Mutex<Vec<f64>>>) -> Box<dyn FnMut(f64) + Send> {
        let log = log.clone();
        Box::new(move |v| log.lock().push(v))
    }

    /// Drive a raw-content session one tick so queued sandbox messages land.
    fn pump(session: &mut GameSession) {
        session.tick(DT);
    }

    /// Forge an envelope carrying the live sandbox's own origin.
    fn from_sandbox(session: &GameSession, message: BridgeMessage) -> BridgeEnvelope {
        let origin = session.sandbox_origin().expect("sandbox mounted").clone();
        BridgeEnvelope::new(origin, 0, message)
    }

    // -----------------------------------------------------------------------
    // Camera lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn every_camera_outcome_reaches_ready() {
        for (outcome, status) in [
            (CameraOutcome::Denied, CameraStatus::Denied),
            (CameraOutcome::Unavailable, CameraStatus::Unavailable),
            (
                CameraOutcome::Granted(CameraStream::new("front")),
                CameraStatus::Granted,
            ),
        ] {
            let mut session = make_sim_session(SimulatedGameConfig::default());
            assert_eq!(session.phase(), SessionPhase::AcquiringCamera);

            session.resolve_camera(outcome);
            assert_eq!(session.phase(), SessionPhase::Ready);
            assert_eq!(session.camera_status(), status);

            // Denial is non-fatal: the game still starts.
            session.start().unwrap();
            assert_eq!(session.phase(), SessionPhase::Playing);
        }
    }

    #[test]
    fn close_releases_the_camera_stream() {
        let stream = CameraStream::new("front");
        let flag = stream.release_flag();

        let mut session = make_sim_session(SimulatedGameConfig::default());
        session.resolve_camera(CameraOutcome::Granted(stream));
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));

        session.close();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn a_late_grant_after_close_is_released_immediately() {
        let stream = CameraStream::new("front");
        let flag = stream.release_flag();

        let mut session = make_sim_session(SimulatedGameConfig::default());
        session.close();
        session.resolve_camera(CameraOutcome::Granted(stream));

        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(session.phase(), SessionPhase::AcquiringCamera);
    }

    #[test]
    fn stream_release_is_idempotent() {
        let stream = CameraStream::new("front");
        stream.release();
        stream.release();
        assert!(stream.is_released());
    }

    // -----------------------------------------------------------------------
    // Phase transitions
    // -----------------------------------------------------------------------

    #[test]
    fn start_requires_ready() {
        let mut session = make_sim_session(SimulatedGameConfig::default());
        assert!(matches!(
            session.start(),
            Err(SessionError::WrongPhase { .. })
        ));
    }

    #[test]
    fn replay_requires_complete() {
        let mut session = make_sim_session(SimulatedGameConfig::default());
        session.resolve_camera(CameraOutcome::Unavailable);
        assert!(matches!(
            session.replay(),
            Err(SessionError::WrongPhase { .. })
        ));
    }

    #[test]
    fn operations_on_a_closed_session_fail_or_noop() {
        let mut session = make_sim_session(SimulatedGameConfig::default());
        session.resolve_camera(CameraOutcome::Unavailable);
        session.close();

        assert!(matches!(session.start(), Err(SessionError::Closed)));
        let ticks = session.stats().total_ticks;
        session.tick(DT);
        assert_eq!(session.stats().total_ticks, ticks);
        session.close(); // idempotent
    }

    // -----------------------------------------------------------------------
    // Procedural playthrough
    // -----------------------------------------------------------------------

    #[test]
    fn procedural_run_completes_with_callbacks() {
        let mut game = SimulatedGameConfig::default();
        game.duration_seconds = 0.5;
        game.spawn_rate_per_second = 1000.0;
        let mut session = make_sim_session(game);

        let scores = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(Mutex::new(Vec::new()));
        session.set_on_score(capture(&scores));
        session.set_on_complete(capture(&completions));

        session.resolve_camera(CameraOutcome::Unavailable);
        session.start().unwrap();

        // Land one hit, then run out the clock.
        let mut hit = false;
        while session.phase() == SessionPhase::Playing {
            session.tick(DT);
            if !hit {
                if let Some(scene) = session.scene() {
                    if let Some(target) = scene.objects.first() {
                        let ray = Ray::new(
                            minigame_host::simulation::VIEW_ORIGIN,
                            target
                                .position
                                .sub(minigame_host::simulation::VIEW_ORIGIN),
                        );
                        hit = session.pointer_hit(ray).is_some();
                    }
                }
            }
        }

        assert!(hit);
        assert_eq!(session.phase(), SessionPhase::Complete);
        assert_eq!(session.score(), 10.0);
        assert_eq!(*scores.lock(), vec![10.0]);
        assert_eq!(*completions.lock(), vec![10.0]);
    }

    #[test]
    fn replay_resets_the_playthrough_but_keeps_the_camera() {
        let mut game = SimulatedGameConfig::default();
        game.duration_seconds = 0.2;
        let mut session = make_sim_session(game);

        let stream = CameraStream::new("front");
        let flag = stream.release_flag();
        session.resolve_camera(CameraOutcome::Granted(stream));
        session.start().unwrap();
        while session.phase() == SessionPhase::Playing {
            session.tick(DT);
        }
        assert_eq!(session.phase(), SessionPhase::Complete);

        session.replay().unwrap();
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.score(), 0.0);
        assert!(session.time_remaining() > 0.0);
        // No second permission prompt: the stream stays open.
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(session.camera_status(), CameraStatus::Granted);

        session.start().unwrap();
        assert_eq!(session.phase(), SessionPhase::Playing);
    }

    #[test]
    fn completion_fires_once_per_playthrough() {
        let mut game = SimulatedGameConfig::default();
        game.duration_seconds = 0.2;
        let mut session = make_sim_session(game);

        let completions = Arc::new(Mutex::new(Vec::new()));
        session.set_on_complete(capture(&completions));
        session.resolve_camera(CameraOutcome::Unavailable);

        for _ in 0..2 {
            if session.phase() == SessionPhase::Complete {
                session.replay().unwrap();
            }
            session.start().unwrap();
            while session.phase() == SessionPhase::Playing {
                session.tick(DT);
            }
        }
        assert_eq!(completions.lock().len(), 2);
    }

    // -----------------------------------------------------------------------
    // Raw-content playthrough
    // -----------------------------------------------------------------------

    #[test]
    fn sandbox_reports_drive_the_session_end_to_end() {
        let mut session = make_raw_session(
            r#"
            report_score(40.0);
            report_complete(80.0);
            "#,
        );
        let scores = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(Mutex::new(Vec::new()));
        session.set_on_score(capture(&scores));
        session.set_on_complete(capture(&completions));

        session.resolve_camera(CameraOutcome::Denied);
        session.start().unwrap();
        assert!(!session.content_failed());

        pump(&mut session);
        assert_eq!(session.phase(), SessionPhase::Complete);
        assert_eq!(session.score(), 80.0);
        assert_eq!(*scores.lock(), vec![40.0]);
        assert_eq!(*completions.lock(), vec![80.0]);
    }

    #[test]
    fn the_first_valid_complete_wins() {
        let mut session = make_raw_session("report_score(0.0);");
        let completions = Arc::new(Mutex::new(Vec::new()));
        session.set_on_complete(capture(&completions));

        session.resolve_camera(CameraOutcome::Unavailable);
        session.start().unwrap();
        pump(&mut session);

        let first = from_sandbox(&session, BridgeMessage::Complete { final_score: 80.0 });
        let second = from_sandbox(&session, BridgeMessage::Complete { final_score: 95.0 });
        session.handle_bridge(first);
        session.handle_bridge(second);

        assert_eq!(session.phase(), SessionPhase::Complete);
        assert_eq!(session.score(), 80.0);
        assert_eq!(*completions.lock(), vec![80.0]);
    }

    #[test]
    fn foreign_origin_messages_are_discarded() {
        let mut session = make_raw_session("report_score(0.0);");
        session.resolve_camera(CameraOutcome::Unavailable);
        session.start().unwrap();
        pump(&mut session);

        let forged = BridgeEnvelope::new(
            OriginToken::from_raw("origin-spoofed"),
            0,
            BridgeMessage::Score { value: 40.0 },
        );
        session.handle_bridge(forged);
        assert_eq!(session.score(), 0.0);

        let forged = BridgeEnvelope::new(
            OriginToken::from_raw("origin-spoofed"),
            0,
            BridgeMessage::Complete { final_score: 999.0 },
        );
        session.handle_bridge(forged);
        assert_eq!(session.phase(), SessionPhase::Playing);
    }

    #[test]
    fn score_is_monotonic_within_a_playthrough() {
        let mut session = make_raw_session("report_score(0.0);");
        let scores = Arc::new(Mutex::new(Vec::new()));
        session.set_on_score(capture(&scores));

        session.resolve_camera(CameraOutcome::Unavailable);
        session.start().unwrap();
        pump(&mut session);

        session.handle_bridge(from_sandbox(&session, BridgeMessage::Score { value: 50.0 }));
        session.handle_bridge(from_sandbox(&session, BridgeMessage::Score { value: 30.0 }));
        session.handle_bridge(from_sandbox(&session, BridgeMessage::Score { value: 50.0 }));

        assert_eq!(session.score(), 50.0);
        assert_eq!(*scores.lock(), vec![50.0]);
    }

    #[test]
    fn content_events_reach_the_event_callback() {
        let mut session = make_raw_session(r#"report_event("milestone", #{ level: 2 });"#);
        let events: Arc<Mutex<Vec<(String, serde_json::Value)>>> =
            Arc::new(Mutex::new(Vec::new()));
        {
            let events = events.clone();
            session.set_on_event(Box::new(move |name, payload| {
                events.lock().push((name.to_string(), payload.clone()));
            }));
        }

        session.resolve_camera(CameraOutcome::Unavailable);
        session.start().unwrap();
        pump(&mut session);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "milestone");
        assert_eq!(events[0].1["level"], 2);
    }

    #[test]
    fn failed_content_raises_the_banner_and_plays_on() {
        let mut session = make_raw_session("not a script ][");
        session.resolve_camera(CameraOutcome::Unavailable);
        session.start().unwrap();

        assert!(session.content_failed());
        assert_eq!(session.phase(), SessionPhase::Playing);

        // The countdown still runs.
        let before = session.time_remaining();
        pump(&mut session);
        assert!(session.time_remaining() < before);
    }

    #[test]
    fn raw_sessions_complete_when_the_countdown_expires() {
        let mut session = GameSession::new(
            ContentDefinition::RawContent {
                source: "report_score(30.0);".into(),
            },
            SessionConfig {
                raw_duration_seconds: 0.2,
                ..SessionConfig::default()
            },
        );
        session.resolve_camera(CameraOutcome::Unavailable);
        session.start().unwrap();

        while session.phase() == SessionPhase::Playing {
            session.tick(DT);
        }
        assert_eq!(session.phase(), SessionPhase::Complete);
        assert_eq!(session.score(), 30.0);
    }

    #[test]
    fn close_tears_down_the_sandbox() {
        let mut session = make_raw_session("report_score(10.0);");
        session.resolve_camera(CameraOutcome::Unavailable);
        session.start().unwrap();
        assert!(session.sandbox_origin().is_some());

        session.close();
        assert!(session.sandbox_origin().is_none());

        // Messages after close are discarded.
        let late = BridgeEnvelope::new(
            OriginToken::from_raw("origin-late"),
            0,
            BridgeMessage::Score { value: 99.0 },
        );
        session.handle_bridge(late);
        assert_eq!(session.score(), 0.0);
    }

    // -----------------------------------------------------------------------
    // Camera acquisition (async)
    // -----------------------------------------------------------------------

    struct StalledProvider;

    #[async_trait]
    impl CameraProvider for StalledProvider {
        async fn open(&self) -> CameraOutcome {
            std::future::pending().await
        }
    }

    struct GrantingProvider;

    #[async_trait]
    impl CameraProvider for GrantingProvider {
        async fn open(&self) -> CameraOutcome {
            CameraOutcome::Granted(CameraStream::new("stub"))
        }
    }

    #[tokio::test]
    async fn a_stalled_prompt_times_out_as_unavailable() {
        let acquisition = CameraAcquisition::new(Arc::new(StalledProvider))
            .with_timeout(Duration::from_millis(20));
        let outcome = acquisition.request().await;
        assert_eq!(outcome.status(), CameraStatus::Unavailable);
    }

    #[tokio::test]
    async fn a_granting_provider_resolves_within_the_timeout() {
        let acquisition = CameraAcquisition::new(Arc::new(GrantingProvider))
            .with_timeout(Duration::from_secs(1));
        let outcome = acquisition.request().await;
        assert_eq!(outcome.status(), CameraStatus::Granted);
    }

    // -----------------------------------------------------------------------
    // Runner
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn runner_drives_a_session_to_completion() {
        let mut game = SimulatedGameConfig::default();
        game.duration_seconds = 0.05;
        let session = Arc::new(Mutex::new(make_sim_session(game)));

        let runner = SessionRunner::new(
            RunnerConfig { tick_rate_hz: 240.0 },
            session.clone(),
            CameraAcquisition::new(Arc::new(NoCameraProvider)),
        );
        let (_tx, rx) = tokio::sync::watch::channel(false);

        let final_score = runner.run(rx).await.unwrap();
        assert_eq!(final_score, 0.0);
        assert_eq!(session.lock().phase(), SessionPhase::Complete);
        assert_eq!(
            session.lock().camera_status(),
            CameraStatus::Unavailable
        );
    }

    #[tokio::test]
    async fn runner_closes_the_session_on_shutdown() {
        let mut game = SimulatedGameConfig::default();
        game.duration_seconds = 3600.0;
        let session = Arc::new(Mutex::new(make_sim_session(game)));

        let runner = SessionRunner::new(
            RunnerConfig::default(),
            session.clone(),
            CameraAcquisition::new(Arc::new(NoCameraProvider)),
        );
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();

        let final_score = runner.run(rx).await.unwrap();
        assert_eq!(final_score, 0.0);
        assert!(session.lock().is_closed());
    }
}
