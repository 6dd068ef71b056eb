//! Speech session orchestration.
//!
//! One session object owns playback for every trigger on a page: at most
//! one trigger is ever loading, speaking, or paused, and switching triggers
//! is a synchronous cancel-then-restart, never a queue.
//!
//! The state machine itself is a pure function from (state, event) to
//! (state, effects); `SessionController` applies the effects to a
//! `SpeechEngine` and a `TriggerSurface`, which keeps the transition logic
//! deterministic under test with no real engine behind it.

use tracing::{debug, info};

use crate::config::LabelConfig;
use crate::error::SpeakbackError;
use crate::voice::{select_voice, Voice};

/// Stable identifier the markup renderer assigns to each trigger element.
pub type TriggerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Speaking,
    Paused,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Loading => write!(f, "LOADING"),
            Self::Speaking => write!(f, "SPEAKING"),
            Self::Paused => write!(f, "PAUSED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A trigger was clicked.
    Activate(TriggerId),
    /// The transcript fetch for `trigger` came back.
    FetchSucceeded { trigger: TriggerId, transcript: String },
    FetchFailed { trigger: TriggerId, error: SpeakbackError },
    /// The engine finished the current utterance.
    PlaybackEnded,
    /// The engine failed mid-utterance.
    PlaybackErrored(String),
    /// The engine reports its voice list changed.
    VoicesChanged,
    /// The page is going away; best-effort engine cleanup.
    PageUnload,
}

/// Side effects a transition asks for, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CancelEngine,
    BeginFetch(TriggerId),
    ShowLoading(TriggerId),
    ShowPause(TriggerId),
    ShowResume(TriggerId),
    RestoreLabel(TriggerId),
    StartUtterance(String),
    PauseEngine,
    ResumeEngine,
    SurfaceError(SpeakbackError),
}

/// The page-wide singleton session. Never destroyed, only reset to idle.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSession {
    pub state: SessionState,
    pub active: Option<TriggerId>,
    pub utterance: Option<String>,
}

impl SpeechSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            active: None,
            utterance: None,
        }
    }

    fn idle() -> Self {
        Self::new()
    }

    fn loading(trigger: TriggerId) -> Self {
        Self {
            state: SessionState::Loading,
            active: Some(trigger),
            utterance: None,
        }
    }

    /// Pure transition function. Returns the next session and the effects
    /// the driver must perform, in order.
    pub fn apply(&self, event: &SessionEvent) -> (SpeechSession, Vec<Effect>) {
        match event {
            SessionEvent::Activate(trigger) => self.on_activate(*trigger),

            SessionEvent::FetchSucceeded { trigger, transcript } => {
                if self.state != SessionState::Loading || self.active != Some(*trigger) {
                    // Superseded fetch: the response arrived after another
                    // trigger took over. Ignore it.
                    return (self.clone(), Vec::new());
                }
                let next = SpeechSession {
                    state: SessionState::Speaking,
                    active: Some(*trigger),
                    utterance: Some(transcript.clone()),
                };
                (
                    next,
                    vec![
                        Effect::CancelEngine,
                        Effect::StartUtterance(transcript.clone()),
                        Effect::ShowPause(*trigger),
                    ],
                )
            }

            SessionEvent::FetchFailed { trigger, error } => {
                if self.state != SessionState::Loading || self.active != Some(*trigger) {
                    return (self.clone(), Vec::new());
                }
                (
                    Self::idle(),
                    vec![
                        Effect::RestoreLabel(*trigger),
                        Effect::SurfaceError(error.clone()),
                    ],
                )
            }

            SessionEvent::PlaybackEnded => match (self.state, self.active) {
                (SessionState::Speaking | SessionState::Paused, Some(trigger)) => {
                    (Self::idle(), vec![Effect::RestoreLabel(trigger)])
                }
                _ => (self.clone(), Vec::new()),
            },

            SessionEvent::PlaybackErrored(message) => match (self.state, self.active) {
                (SessionState::Speaking | SessionState::Paused, Some(trigger)) => (
                    Self::idle(),
                    vec![
                        Effect::RestoreLabel(trigger),
                        Effect::SurfaceError(SpeakbackError::EngineError(message.clone())),
                    ],
                ),
                _ => (self.clone(), Vec::new()),
            },

            // Voice availability is the driver's concern; the machine does
            // not move.
            SessionEvent::VoicesChanged => (self.clone(), Vec::new()),

            SessionEvent::PageUnload => (self.clone(), vec![Effect::CancelEngine]),
        }
    }

    fn on_activate(&self, trigger: TriggerId) -> (SpeechSession, Vec<Effect>) {
        match (self.state, self.active) {
            // Click on the currently speaking trigger: pause.
            (SessionState::Speaking, Some(active)) if active == trigger => {
                let mut next = self.clone();
                next.state = SessionState::Paused;
                (next, vec![Effect::PauseEngine, Effect::ShowResume(trigger)])
            }

            // Click on the paused trigger: resume the same utterance.
            (SessionState::Paused, Some(active)) if active == trigger => {
                let mut next = self.clone();
                next.state = SessionState::Speaking;
                (next, vec![Effect::ResumeEngine, Effect::ShowPause(trigger)])
            }

            // Double-click while that trigger is still loading: ignore.
            (SessionState::Loading, Some(active)) if active == trigger => {
                (self.clone(), Vec::new())
            }

            // A different trigger while one is active: cancel first,
            // restore the old affordance, then start loading the new one.
            (_, Some(active)) => (
                Self::loading(trigger),
                vec![
                    Effect::CancelEngine,
                    Effect::RestoreLabel(active),
                    Effect::ShowLoading(trigger),
                    Effect::BeginFetch(trigger),
                ],
            ),

            // Nothing active: straight to loading.
            (_, None) => (
                Self::loading(trigger),
                vec![Effect::ShowLoading(trigger), Effect::BeginFetch(trigger)],
            ),
        }
    }
}

impl Default for SpeechSession {
    fn default() -> Self {
        Self::new()
    }
}

// --- Driver ---

/// The client-resident playback engine boundary. Implemented by the real
/// engine binding on a page and by test doubles here.
pub trait SpeechEngine {
    /// Whether the client has an engine at all.
    fn available(&self) -> bool;
    fn voices(&self) -> Vec<Voice>;
    /// Start speaking. Never valid while the engine is mid-utterance; the
    /// controller cancels first.
    fn speak(&mut self, text: &str, voice: Option<&Voice>);
    fn pause(&mut self);
    fn resume(&mut self);
    fn cancel(&mut self);
    fn speaking(&self) -> bool;
}

/// Label surface for a trigger element. The markup renderer records each
/// trigger's original label so a reset restores it exactly.
pub trait TriggerSurface {
    fn set_label(&mut self, trigger: TriggerId, label: &str);
    fn restore_label(&mut self, trigger: TriggerId);
    fn surface_error(&mut self, error: &SpeakbackError);
}

/// Applies transition effects to an engine and a trigger surface.
pub struct SessionController<E: SpeechEngine, S: TriggerSurface> {
    session: SpeechSession,
    engine: E,
    surface: S,
    labels: LabelConfig,
    language: String,
    /// Utterance parked until the engine reports voices, retried once.
    deferred: Option<String>,
}

impl<E: SpeechEngine, S: TriggerSurface> SessionController<E, S> {
    pub fn new(engine: E, surface: S, labels: LabelConfig, language: String) -> Self {
        Self {
            session: SpeechSession::new(),
            engine,
            surface,
            labels,
            language,
            deferred: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn active_trigger(&self) -> Option<TriggerId> {
        self.session.active
    }

    pub fn utterance(&self) -> Option<&str> {
        self.session.utterance.as_deref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Feed one event through the machine and perform its effects.
    /// Returns the effect list so the embedder can act on `BeginFetch`.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        if matches!(event, SessionEvent::Activate(_)) && !self.engine.available() {
            self.surface.surface_error(&SpeakbackError::EngineUnsupported);
            return vec![Effect::SurfaceError(SpeakbackError::EngineUnsupported)];
        }

        if event == SessionEvent::VoicesChanged {
            if let Some(text) = self.deferred.take() {
                debug!("Voices arrived, retrying deferred utterance");
                self.start_utterance(&text, false);
            }
            return Vec::new();
        }

        let (next, effects) = self.session.apply(&event);
        if next.state != self.session.state {
            info!("Session: {} -> {}", self.session.state, next.state);
        }
        self.session = next;

        for effect in &effects {
            self.perform(effect);
        }
        effects
    }

    fn perform(&mut self, effect: &Effect) {
        match effect {
            Effect::CancelEngine => {
                self.deferred = None;
                self.engine.cancel();
            }
            Effect::StartUtterance(text) => self.start_utterance(text, true),
            Effect::PauseEngine => self.engine.pause(),
            Effect::ResumeEngine => self.engine.resume(),
            Effect::ShowLoading(t) => self.surface.set_label(*t, &self.labels.loading),
            Effect::ShowPause(t) => self.surface.set_label(*t, &self.labels.pause),
            Effect::ShowResume(t) => self.surface.set_label(*t, &self.labels.resume),
            Effect::RestoreLabel(t) => self.surface.restore_label(*t),
            Effect::SurfaceError(e) => self.surface.surface_error(e),
            // The embedder owns the fetch; nothing to do here.
            Effect::BeginFetch(_) => {}
        }
    }

    /// Configure a voice and hand the utterance to the engine. With no
    /// voices loaded yet, park the text and wait for one voices-changed
    /// signal; a second miss speaks with the engine default.
    fn start_utterance(&mut self, text: &str, may_defer: bool) {
        let voices = self.engine.voices();
        if voices.is_empty() && may_defer {
            debug!("No voices yet, deferring utterance");
            self.deferred = Some(text.to_string());
            return;
        }

        let voice = select_voice(&voices, &self.language).cloned();
        if self.engine.speaking() {
            self.engine.cancel();
        }
        self.engine.speak(text, voice.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeEngine {
        voices: Vec<Voice>,
        speaking: bool,
        paused: bool,
        cancels: u32,
        spoken: Vec<String>,
        unavailable: bool,
    }

    impl SpeechEngine for FakeEngine {
        fn available(&self) -> bool {
            !self.unavailable
        }
        fn voices(&self) -> Vec<Voice> {
            self.voices.clone()
        }
        fn speak(&mut self, text: &str, _voice: Option<&Voice>) {
            assert!(!self.speaking, "speak while engine busy");
            self.speaking = true;
            self.paused = false;
            self.spoken.push(text.to_string());
        }
        fn pause(&mut self) {
            self.paused = true;
        }
        fn resume(&mut self) {
            self.paused = false;
        }
        fn cancel(&mut self) {
            self.speaking = false;
            self.paused = false;
            self.cancels += 1;
        }
        fn speaking(&self) -> bool {
            self.speaking
        }
    }

    #[derive(Default)]
    struct FakeSurface {
        labels: std::collections::HashMap<TriggerId, String>,
        errors: Vec<SpeakbackError>,
    }

    impl TriggerSurface for FakeSurface {
        fn set_label(&mut self, trigger: TriggerId, label: &str) {
            self.labels.insert(trigger, label.to_string());
        }
        fn restore_label(&mut self, trigger: TriggerId) {
            self.labels.remove(&trigger);
        }
        fn surface_error(&mut self, error: &SpeakbackError) {
            self.errors.push(error.clone());
        }
    }

    fn controller() -> SessionController<FakeEngine, FakeSurface> {
        let mut engine = FakeEngine::default();
        engine.voices = vec![Voice::new("Amy", "en-GB")];
        SessionController::new(
            engine,
            FakeSurface::default(),
            LabelConfig::default(),
            "en".into(),
        )
    }

    fn speak_through(c: &mut SessionController<FakeEngine, FakeSurface>, trigger: TriggerId) {
        c.handle(SessionEvent::Activate(trigger));
        c.handle(SessionEvent::FetchSucceeded {
            trigger,
            transcript: format!("transcript {trigger}"),
        });
    }

    #[test]
    fn activation_moves_idle_to_loading_and_requests_a_fetch() {
        let mut c = controller();
        let effects = c.handle(SessionEvent::Activate(1));
        assert_eq!(c.state(), SessionState::Loading);
        assert!(effects.contains(&Effect::BeginFetch(1)));
        assert_eq!(c.surface().labels.get(&1).map(String::as_str), Some("Loading…"));
    }

    #[test]
    fn fetch_success_starts_speaking_after_an_engine_cancel() {
        let mut c = controller();
        c.handle(SessionEvent::Activate(1));
        let effects = c.handle(SessionEvent::FetchSucceeded {
            trigger: 1,
            transcript: "hello".into(),
        });
        assert_eq!(c.state(), SessionState::Speaking);
        // Cancel is issued before the utterance starts.
        let cancel_pos = effects.iter().position(|e| *e == Effect::CancelEngine);
        let start_pos = effects
            .iter()
            .position(|e| matches!(e, Effect::StartUtterance(_)));
        assert!(cancel_pos.unwrap() < start_pos.unwrap());
        assert_eq!(c.engine().spoken, vec!["hello"]);
    }

    #[test]
    fn at_most_one_trigger_is_ever_active() {
        let mut c = controller();
        speak_through(&mut c, 1);
        assert_eq!(c.active_trigger(), Some(1));

        // Activating trigger 2 leaves 1 idle before 2 starts loading.
        c.handle(SessionEvent::Activate(2));
        assert_eq!(c.state(), SessionState::Loading);
        assert_eq!(c.active_trigger(), Some(2));
        assert!(!c.surface().labels.contains_key(&1), "trigger 1 label not restored");
        assert!(!c.engine().speaking, "engine not cancelled on switch");
    }

    #[test]
    fn pause_resume_toggle_keeps_the_same_utterance() {
        let mut c = controller();
        speak_through(&mut c, 1);

        let utterance_before = c.utterance().map(str::to_string);
        c.handle(SessionEvent::Activate(1));
        assert_eq!(c.state(), SessionState::Paused);
        assert!(c.engine().paused);
        assert_eq!(c.utterance().map(str::to_string), utterance_before);
        assert_eq!(c.surface().labels.get(&1).map(String::as_str), Some("Resume"));

        c.handle(SessionEvent::Activate(1));
        assert_eq!(c.state(), SessionState::Speaking);
        assert!(!c.engine().paused);
        // No re-fetch, no second utterance.
        assert_eq!(c.engine().spoken.len(), 1);
    }

    #[test]
    fn stale_fetch_response_is_ignored_after_a_switch() {
        let mut c = controller();
        c.handle(SessionEvent::Activate(1));
        c.handle(SessionEvent::Activate(2));

        // Trigger 1's response arrives late.
        let effects = c.handle(SessionEvent::FetchSucceeded {
            trigger: 1,
            transcript: "stale".into(),
        });
        assert!(effects.is_empty());
        assert_eq!(c.state(), SessionState::Loading);
        assert_eq!(c.active_trigger(), Some(2));
        assert!(c.engine().spoken.is_empty());
    }

    #[test]
    fn fetch_failure_resets_the_trigger_and_surfaces_the_error() {
        let mut c = controller();
        c.handle(SessionEvent::Activate(1));
        c.handle(SessionEvent::FetchFailed {
            trigger: 1,
            error: SpeakbackError::RateLimited,
        });
        assert_eq!(c.state(), SessionState::Idle);
        assert!(!c.surface().labels.contains_key(&1));
        assert_eq!(c.surface().errors, vec![SpeakbackError::RateLimited]);
    }

    #[test]
    fn playback_end_restores_the_active_trigger() {
        let mut c = controller();
        speak_through(&mut c, 1);
        c.handle(SessionEvent::PlaybackEnded);
        assert_eq!(c.state(), SessionState::Idle);
        assert!(!c.surface().labels.contains_key(&1));
    }

    #[test]
    fn playback_error_converges_on_the_same_reset_path() {
        let mut c = controller();
        speak_through(&mut c, 1);
        c.handle(SessionEvent::PlaybackErrored("synthesis-failed".into()));
        assert_eq!(c.state(), SessionState::Idle);
        assert!(!c.surface().labels.contains_key(&1));
        assert!(matches!(
            c.surface().errors.first(),
            Some(SpeakbackError::EngineError(_))
        ));
    }

    #[test]
    fn reactivating_after_playback_ends_fetches_again() {
        let mut c = controller();
        speak_through(&mut c, 1);
        c.handle(SessionEvent::PlaybackEnded);

        let effects = c.handle(SessionEvent::Activate(1));
        assert!(effects.contains(&Effect::BeginFetch(1)));
        assert_eq!(c.state(), SessionState::Loading);
    }

    #[test]
    fn missing_engine_surfaces_engine_unsupported() {
        let mut engine = FakeEngine::default();
        engine.unavailable = true;
        let mut c = SessionController::new(
            engine,
            FakeSurface::default(),
            LabelConfig::default(),
            "en".into(),
        );
        c.handle(SessionEvent::Activate(1));
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.surface().errors, vec![SpeakbackError::EngineUnsupported]);
    }

    #[test]
    fn utterance_defers_until_voices_arrive_then_speaks_once() {
        let mut c = SessionController::new(
            FakeEngine::default(),
            FakeSurface::default(),
            LabelConfig::default(),
            "en".into(),
        );
        c.handle(SessionEvent::Activate(1));
        c.handle(SessionEvent::FetchSucceeded {
            trigger: 1,
            transcript: "waiting".into(),
        });
        assert!(c.engine().spoken.is_empty(), "spoke before voices loaded");

        c.handle(SessionEvent::VoicesChanged);
        assert_eq!(c.engine().spoken, vec!["waiting"]);
        // A second signal does not replay the utterance.
        c.handle(SessionEvent::VoicesChanged);
        assert_eq!(c.engine().spoken.len(), 1);
    }

    #[test]
    fn page_unload_cancels_the_engine() {
        let mut c = controller();
        speak_through(&mut c, 1);
        let cancels_before = c.engine().cancels;
        c.handle(SessionEvent::PageUnload);
        assert!(c.engine().cancels > cancels_before);
    }

    #[test]
    fn loading_double_click_is_a_no_op() {
        let mut c = controller();
        c.handle(SessionEvent::Activate(1));
        let effects = c.handle(SessionEvent::Activate(1));
        assert!(effects.is_empty());
        assert_eq!(c.state(), SessionState::Loading);
    }
}
