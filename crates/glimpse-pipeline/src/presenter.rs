//! Result presenter: turns completions into overlay state and messages.
//!
//! All state lives in [`OverlayState`], owned by the presenter and mutated
//! only through `&mut self`, so presentation is serialized by construction.
//! [`ResultPresenter::run`] is the single presentation task.

use crate::animation::{Animation, AnimationPhase, AnimationTiming};
use crate::engine::Completion;
use crate::geometry::{Rect, ViewGeometry};
use glimpse_core::{ClassObservation, FaceObservation, ProviderKind, RecognitionError, ResultSet};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub const PENDING_MESSAGE: &str = "Classifying...";
pub const NOTHING_RECOGNIZED: &str = "Nothing recognized.";
pub const UNABLE_TO_CLASSIFY: &str = "Unable to classify image.";

/// Format one label as `"  (0.87) cat"`.
pub fn format_classification(observation: &ClassObservation) -> String {
    format!("  ({:.2}) {}", observation.confidence, observation.label)
}

/// The `k` most confident observations, highest first. Ties keep input order.
pub fn select_top(classes: &[ClassObservation], k: usize) -> Vec<&ClassObservation> {
    let mut ranked: Vec<&ClassObservation> = classes.iter().collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked.truncate(k);
    ranked
}

/// Text shown for a classification result set. At least one label is
/// shown for a non-empty set, even when `k` is zero.
pub fn describe_classes(classes: &[ClassObservation], k: usize) -> String {
    if classes.is_empty() {
        return NOTHING_RECOGNIZED.to_string();
    }
    select_top(classes, k.max(1))
        .into_iter()
        .map(format_classification)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rendering surface driven by the presenter.
pub trait PresentationSink {
    fn show_message(&mut self, text: &str);

    /// Replace the overlay boxes. The first box is the primary face.
    fn show_faces(&mut self, boxes: &[Rect]);

    fn clear_faces(&mut self);

    fn set_trigger_visible(&mut self, visible: bool);

    /// `target` is set while a launch sequence is running.
    fn animation_changed(&mut self, phase: AnimationPhase, target: Option<Rect>);
}

/// User input reaching the presentation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    /// Trigger control pressed.
    Activate,
    /// A one-shot request was submitted.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenterConfig {
    pub top_k: usize,
    pub view: ViewGeometry,
    pub timing: AnimationTiming,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            view: ViewGeometry::default(),
            timing: AnimationTiming::default(),
        }
    }
}

/// Overlay and animation state for the face pipeline.
#[derive(Debug, Default)]
pub struct OverlayState {
    /// Face boxes currently drawn, in view coordinates.
    pub drawings: Vec<Rect>,
    /// Box of the primary face, used to aim the launch.
    pub focus: Option<Rect>,
    pub animation: Animation,
    pub trigger_visible: bool,
    pub message: Option<String>,
}

pub struct ResultPresenter<S> {
    config: PresenterConfig,
    state: OverlayState,
    sink: S,
}

impl<S: PresentationSink> ResultPresenter<S> {
    pub fn new(config: PresenterConfig, sink: S) -> Self {
        Self {
            state: OverlayState {
                animation: Animation::new(config.timing),
                ..OverlayState::default()
            },
            config,
            sink,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn present(&mut self, completion: &Completion) {
        tracing::debug!(
            request = %completion.request,
            provider = %completion.provider,
            ok = completion.outcome.is_ok(),
            "presenting result"
        );
        self.present_outcome(completion.kind, &completion.outcome);
    }

    /// Present a result set or failure. `kind` picks the failure policy,
    /// since an error carries no observations to infer it from.
    pub fn present_outcome(&mut self, kind: ProviderKind, outcome: &Result<ResultSet, RecognitionError>) {
        match (outcome, kind) {
            (Ok(ResultSet::Classes(classes)), _) => {
                let text = describe_classes(classes, self.config.top_k);
                self.set_message(text);
            }
            (Ok(ResultSet::Faces(faces)), _) => self.present_faces(faces),
            (Err(err), ProviderKind::Classifier) => {
                tracing::warn!(error = %err, "classification failed");
                self.set_message(UNABLE_TO_CLASSIFY.to_string());
            }
            (Err(err), ProviderKind::FaceLandmarks) => {
                tracing::warn!(error = %err, "face detection failed, clearing overlay");
                self.present_faces(&[]);
            }
        }
    }

    pub fn present_pending(&mut self) {
        self.set_message(PENDING_MESSAGE.to_string());
    }

    fn set_message(&mut self, text: String) {
        self.sink.show_message(&text);
        self.state.message = Some(text);
    }

    fn present_faces(&mut self, faces: &[FaceObservation]) {
        if faces.is_empty() {
            self.state.drawings.clear();
            self.state.focus = None;
            self.sink.clear_faces();
            self.set_trigger_visible(false);
            if let Some(phase) = self.state.animation.face_lost() {
                self.sink.animation_changed(phase, None);
            }
            return;
        }

        let view = self.config.view;
        self.state.drawings = faces.iter().map(|f| view.map_box(&f.bounding_box)).collect();
        self.state.focus = self.state.drawings.first().copied();
        self.sink.show_faces(&self.state.drawings);
        self.set_trigger_visible(true);
        if let Some(phase) = self.state.animation.face_observed() {
            self.sink.animation_changed(phase, None);
        }
    }

    fn set_trigger_visible(&mut self, visible: bool) {
        if self.state.trigger_visible != visible {
            self.state.trigger_visible = visible;
            self.sink.set_trigger_visible(visible);
        }
    }

    /// Trigger pressed. Returns whether a launch started.
    pub fn activate(&mut self, now: Instant) -> bool {
        let Some(focus) = self.state.focus else {
            tracing::debug!("activation ignored, no face");
            return false;
        };
        match self.state.animation.activate(focus, &self.config.view, now) {
            Some(duration) => {
                tracing::info!(launch_ms = duration.as_millis() as u64, "launch started");
                self.sink
                    .animation_changed(AnimationPhase::Launching, Some(focus));
                true
            }
            None => {
                tracing::debug!(phase = ?self.state.animation.phase(), "activation ignored");
                false
            }
        }
    }

    /// Apply animation transitions due at `now`.
    pub fn tick(&mut self, now: Instant) {
        let target = self.state.animation.target();
        for phase in self.state.animation.advance(now) {
            let target = (phase != AnimationPhase::Idle).then_some(target).flatten();
            self.sink.animation_changed(phase, target);
        }
    }

    pub fn handle_command(&mut self, command: UiCommand) {
        match command {
            UiCommand::Activate => {
                self.activate(Instant::now());
            }
            UiCommand::Pending => self.present_pending(),
        }
    }

    /// Presentation loop. Returns once the completion queue closes and any
    /// running animation has finished.
    pub async fn run(
        mut self,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut commands: mpsc::Receiver<UiCommand>,
    ) -> Self {
        let mut commands_open = true;
        loop {
            let deadline = self.state.animation.deadline();
            tokio::select! {
                completion = completions.recv() => match completion {
                    Some(completion) => self.present(&completion),
                    None => break,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => commands_open = false,
                },
                _ = wait_until(deadline) => self.tick(Instant::now()),
            }
        }

        // Launches are fire-and-forget; let a running one finish.
        while let Some(deadline) = self.state.animation.deadline() {
            wait_until(Some(deadline)).await;
            self.tick(Instant::now());
        }
        tracing::debug!("presenter stopped");
        self
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// How long a launch at `face` would take with this configuration.
pub fn sequence_length(config: &PresenterConfig, face: &Rect) -> Duration {
    crate::animation::launch_duration(&config.view, face, &config.timing)
        + config.timing.boom_grow
        + config.timing.boom_fade
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RequestId;
    use glimpse_core::BoundingBox;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Message(String),
        Faces(Vec<Rect>),
        Cleared,
        Trigger(bool),
        Phase(AnimationPhase),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl PresentationSink for Recorder {
        fn show_message(&mut self, text: &str) {
            self.events.push(Event::Message(text.to_string()));
        }
        fn show_faces(&mut self, boxes: &[Rect]) {
            self.events.push(Event::Faces(boxes.to_vec()));
        }
        fn clear_faces(&mut self) {
            self.events.push(Event::Cleared);
        }
        fn set_trigger_visible(&mut self, visible: bool) {
            self.events.push(Event::Trigger(visible));
        }
        fn animation_changed(&mut self, phase: AnimationPhase, _target: Option<Rect>) {
            self.events.push(Event::Phase(phase));
        }
    }

    fn presenter() -> ResultPresenter<Recorder> {
        ResultPresenter::new(PresenterConfig::default(), Recorder::default())
    }

    fn classes(pairs: &[(&str, f32)]) -> Vec<ClassObservation> {
        pairs
            .iter()
            .map(|(label, confidence)| ClassObservation::new(*label, *confidence))
            .collect()
    }

    fn face(x: f32, y: f32, size: f32) -> FaceObservation {
        FaceObservation {
            bounding_box: BoundingBox::new(x, y, size, size),
            confidence: Some(0.99),
            landmarks: None,
        }
    }

    #[test]
    fn test_format_rounds_to_two_decimals() {
        assert_eq!(
            format_classification(&ClassObservation::new("cat", 0.8731)),
            "  (0.87) cat"
        );
    }

    #[test]
    fn test_select_top_takes_min_k_len() {
        let set = classes(&[("a", 0.1), ("b", 0.9), ("c", 0.5)]);
        let top: Vec<_> = select_top(&set, 2).iter().map(|c| c.label.as_str()).collect();
        assert_eq!(top, ["b", "c"]);

        let one = classes(&[("only", 0.3)]);
        assert_eq!(select_top(&one, 2).len(), 1);
        assert!(select_top(&[], 2).is_empty());
    }

    #[test]
    fn test_select_top_is_non_increasing() {
        let set = classes(&[("a", 0.2), ("b", 0.2), ("c", 0.7), ("d", 0.05), ("e", 0.7)]);
        for k in 0..=6 {
            let top = select_top(&set, k);
            assert_eq!(top.len(), k.min(set.len()));
            assert!(top.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        }
    }

    #[test]
    fn test_describe_joins_lines() {
        let set = classes(&[("dog", 0.1), ("cat", 0.8731), ("owl", 0.5)]);
        assert_eq!(describe_classes(&set, 2), "  (0.87) cat\n  (0.50) owl");
    }

    #[test]
    fn test_describe_with_zero_k_shows_best_label() {
        let set = classes(&[("dog", 0.1), ("cat", 0.9)]);
        assert_eq!(describe_classes(&set, 0), "  (0.90) cat");
    }

    #[test]
    fn test_select_top_orders_nan_deterministically() {
        let set = classes(&[("a", 0.5), ("b", f32::NAN), ("c", 0.7)]);
        let top: Vec<_> = select_top(&set, 3).iter().map(|c| c.label.as_str()).collect();
        assert_eq!(top, ["b", "c", "a"]);
    }

    #[test]
    fn test_activate_with_infinite_view_width() {
        let config = PresenterConfig {
            view: ViewGeometry {
                width: f32::INFINITY,
                ..ViewGeometry::default()
            },
            ..PresenterConfig::default()
        };
        let mut p = ResultPresenter::new(config, Recorder::default());
        p.present_outcome(ProviderKind::FaceLandmarks, &Ok(ResultSet::faces(vec![face(0.3, 0.3, 0.4)])));
        let now = Instant::now();
        assert!(p.activate(now));
        p.tick(now + Duration::from_secs(10));
        assert_eq!(p.state().animation.phase(), AnimationPhase::Idle);
    }

    #[test]
    fn test_empty_and_failure_messages_differ() {
        let mut p = presenter();
        p.present_outcome(ProviderKind::Classifier, &Ok(ResultSet::classes(Vec::new())));
        p.present_outcome(
            ProviderKind::Classifier,
            &Err(RecognitionError::provider_failure("clf", "bad image")),
        );
        assert_eq!(
            p.sink().events,
            vec![
                Event::Message(NOTHING_RECOGNIZED.into()),
                Event::Message(UNABLE_TO_CLASSIFY.into()),
            ]
        );
        assert_ne!(NOTHING_RECOGNIZED, UNABLE_TO_CLASSIFY);
    }

    #[test]
    fn test_pending_message() {
        let mut p = presenter();
        p.handle_command(UiCommand::Pending);
        assert_eq!(p.state().message.as_deref(), Some(PENDING_MESSAGE));
    }

    #[test]
    fn test_faces_show_overlay_and_arm() {
        let mut p = presenter();
        let completion = Completion {
            request: RequestId::default(),
            provider: "faces".into(),
            kind: ProviderKind::FaceLandmarks,
            outcome: Ok(ResultSet::faces(vec![face(0.5, 0.5, 0.25), face(0.0, 0.0, 0.1)])),
        };
        p.present(&completion);

        let view = PresenterConfig::default().view;
        let primary = view.map_box(&BoundingBox::new(0.5, 0.5, 0.25, 0.25));
        assert_eq!(p.state().focus, Some(primary));
        assert_eq!(p.state().drawings.len(), 2);
        assert!(p.state().animation.is_armed());
        assert_eq!(
            p.sink().events[1..],
            [Event::Trigger(true), Event::Phase(AnimationPhase::Armed)]
        );
    }

    #[test]
    fn test_face_error_clears_overlay() {
        let mut p = presenter();
        p.present_outcome(ProviderKind::FaceLandmarks, &Ok(ResultSet::faces(vec![face(0.1, 0.1, 0.3)])));
        p.present_outcome(
            ProviderKind::FaceLandmarks,
            &Err(RecognitionError::provider_failure("faces", "unsupported format")),
        );
        assert!(p.state().drawings.is_empty());
        assert!(!p.state().trigger_visible);
        assert_eq!(p.state().animation.phase(), AnimationPhase::Idle);
        assert!(p.state().message.is_none());
    }

    #[test]
    fn test_second_activation_is_noop() {
        let mut p = presenter();
        let now = Instant::now();
        p.present_outcome(ProviderKind::FaceLandmarks, &Ok(ResultSet::faces(vec![face(0.3, 0.3, 0.4)])));
        assert!(p.activate(now));
        assert!(!p.activate(now));
        assert_eq!(p.state().animation.phase(), AnimationPhase::Launching);
    }

    #[test]
    fn test_activation_without_face_is_noop() {
        let mut p = presenter();
        assert!(!p.activate(Instant::now()));
        assert!(p.sink().events.is_empty());
    }

    #[test]
    fn test_losing_face_mid_launch_keeps_animation() {
        let mut p = presenter();
        let now = Instant::now();
        p.present_outcome(ProviderKind::FaceLandmarks, &Ok(ResultSet::faces(vec![face(0.3, 0.3, 0.4)])));
        let focus = p.state().focus.unwrap();
        p.activate(now);

        p.present_outcome(ProviderKind::FaceLandmarks, &Ok(ResultSet::faces(Vec::new())));
        assert_eq!(p.state().animation.phase(), AnimationPhase::Launching);
        assert!(p.state().drawings.is_empty());

        p.tick(now + sequence_length(&PresenterConfig::default(), &focus));
        assert_eq!(p.state().animation.phase(), AnimationPhase::Idle);
        let phases: Vec<_> = p
            .sink()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Phase(phase) => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            [
                AnimationPhase::Armed,
                AnimationPhase::Launching,
                AnimationPhase::Exploding,
                AnimationPhase::Idle,
            ]
        );
    }
}
