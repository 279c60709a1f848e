//! Streaming face pipeline driven through the real presentation loop.

use glimpse_core::{
    BoundingBox, FaceObservation, ImageBuffer, ObservationProvider, Orientation, PixelFormat,
    ProviderKind, ScriptedProvider, ScriptedResponse,
};
use glimpse_pipeline::{
    AnimationPhase, AnimationTiming, DeliveryPolicy, PresentationSink, PresenterConfig, Rect,
    RecognitionEngine, ResultPresenter, UiCommand, ViewGeometry,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Faces(Vec<Rect>),
    Cleared,
    Trigger(bool),
    Phase(AnimationPhase, Option<Rect>),
    Message(String),
}

#[derive(Clone, Default)]
struct SharedRecorder(Arc<Mutex<Vec<Event>>>);

impl SharedRecorder {
    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    async fn wait_for(&self, wanted: &Event) {
        for _ in 0..400 {
            if self.events().contains(wanted) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("never saw {wanted:?}, got {:?}", self.events());
    }
}

impl PresentationSink for SharedRecorder {
    fn show_message(&mut self, text: &str) {
        self.0.lock().unwrap().push(Event::Message(text.to_string()));
    }
    fn show_faces(&mut self, boxes: &[Rect]) {
        self.0.lock().unwrap().push(Event::Faces(boxes.to_vec()));
    }
    fn clear_faces(&mut self) {
        self.0.lock().unwrap().push(Event::Cleared);
    }
    fn set_trigger_visible(&mut self, visible: bool) {
        self.0.lock().unwrap().push(Event::Trigger(visible));
    }
    fn animation_changed(&mut self, phase: AnimationPhase, target: Option<Rect>) {
        self.0.lock().unwrap().push(Event::Phase(phase, target));
    }
}

fn frame() -> ImageBuffer {
    ImageBuffer::new(vec![0u8; 16], 4, 4, PixelFormat::Gray8, Orientation::LeftMirrored).unwrap()
}

fn config() -> PresenterConfig {
    PresenterConfig {
        top_k: 2,
        view: ViewGeometry {
            width: 200.0,
            height: 500.0,
            control_inset: 100.0,
        },
        timing: AnimationTiming {
            launch_per_ratio: Duration::from_millis(10),
            max_launch: Duration::from_millis(50),
            boom_grow: Duration::from_millis(10),
            boom_fade: Duration::from_millis(10),
        },
    }
}

#[tokio::test]
async fn test_face_stream_arms_and_launches() {
    let face_box = BoundingBox::new(0.25, 0.25, 0.5, 0.25);
    let provider: Arc<dyn ObservationProvider> = Arc::new(
        ScriptedProvider::new(
            "faces",
            ProviderKind::FaceLandmarks,
            vec![
                ScriptedResponse::Faces {
                    observations: Vec::new(),
                },
                ScriptedResponse::Faces {
                    observations: vec![FaceObservation {
                        bounding_box: face_box,
                        confidence: None,
                        landmarks: None,
                    }],
                },
            ],
        )
        .unwrap(),
    );

    let (engine, completions) = RecognitionEngine::channel(DeliveryPolicy::DropWhileBusy).unwrap();
    let (commands, command_rx) = mpsc::channel(8);
    let recorder = SharedRecorder::default();
    let presenter = ResultPresenter::new(config(), recorder.clone());
    let task = tokio::spawn(presenter.run(completions, command_rx));

    // No face: overlay cleared, trigger stays hidden.
    engine.submit(frame(), &provider).unwrap();
    recorder.wait_for(&Event::Cleared).await;
    assert!(!recorder.events().contains(&Event::Trigger(true)));

    // One face at B: overlay drawn at B mapped into the preview, trigger shown.
    let expected = config().view.map_box(&face_box);
    assert_eq!(
        expected,
        Rect {
            x: 50.0,
            y: 100.0,
            width: 100.0,
            height: 100.0
        }
    );
    engine.submit(frame(), &provider).unwrap();
    recorder.wait_for(&Event::Trigger(true)).await;
    assert!(recorder.events().contains(&Event::Faces(vec![expected])));

    commands.send(UiCommand::Activate).await.unwrap();
    recorder
        .wait_for(&Event::Phase(AnimationPhase::Launching, Some(expected)))
        .await;

    // Closing the completion queue still lets the launch finish.
    drop(engine);
    let presenter = task.await.unwrap();
    assert_eq!(presenter.state().animation.phase(), AnimationPhase::Idle);

    let phases: Vec<_> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Phase(phase, _) => Some(phase),
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
    assert!(!recorder
        .events()
        .iter()
        .any(|e| matches!(e, Event::Message(_))));
}

#[tokio::test]
async fn test_classifier_failure_then_success() {
    let provider: Arc<dyn ObservationProvider> = Arc::new(
        ScriptedProvider::from_toml_str(
            r#"
            id = "clf"
            kind = "classifier"

            [[responses]]
            kind = "failure"
            message = "unsupported format"

            [[responses]]
            kind = "classes"
            observations = [
                { label = "owl", confidence = 0.4 },
                { label = "cat", confidence = 0.8731 },
                { label = "dog", confidence = 0.1 },
            ]
            "#,
        )
        .unwrap(),
    );

    let (engine, completions) = RecognitionEngine::channel(DeliveryPolicy::Ordered).unwrap();
    let (commands, command_rx) = mpsc::channel(8);
    let recorder = SharedRecorder::default();
    let task = tokio::spawn(ResultPresenter::new(config(), recorder.clone()).run(completions, command_rx));

    commands.send(UiCommand::Pending).await.unwrap();
    recorder
        .wait_for(&Event::Message(glimpse_pipeline::PENDING_MESSAGE.into()))
        .await;
    engine.submit(frame(), &provider).unwrap();
    recorder
        .wait_for(&Event::Message(glimpse_pipeline::UNABLE_TO_CLASSIFY.into()))
        .await;
    engine.submit(frame(), &provider).unwrap();
    recorder
        .wait_for(&Event::Message("  (0.87) cat\n  (0.40) owl".into()))
        .await;

    drop(engine);
    task.await.unwrap();
    assert_eq!(
        recorder.events(),
        [
            Event::Message(glimpse_pipeline::PENDING_MESSAGE.into()),
            Event::Message(glimpse_pipeline::UNABLE_TO_CLASSIFY.into()),
            Event::Message("  (0.87) cat\n  (0.40) owl".into()),
        ]
    );
}
