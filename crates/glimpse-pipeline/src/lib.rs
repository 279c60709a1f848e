pub mod animation;
pub mod engine;
pub mod geometry;
pub mod presenter;
pub mod pump;

pub use animation::{launch_duration, Animation, AnimationPhase, AnimationTiming};
pub use engine::{
    Completion, DeliveryPolicy, EngineError, LaneStats, RecognitionEngine, RequestId, Submission,
};
pub use geometry::{Rect, ViewGeometry};
pub use presenter::{
    describe_classes, format_classification, select_top, sequence_length, OverlayState,
    PresentationSink, PresenterConfig, ResultPresenter, UiCommand, NOTHING_RECOGNIZED,
    PENDING_MESSAGE, UNABLE_TO_CLASSIFY,
};
pub use pump::{spawn_frame_pump, PumpError, PumpHandle, PumpOptions, PumpStats};
