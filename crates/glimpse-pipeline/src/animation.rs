//! Decorative launch animation for the face overlay.
//!
//! `Idle → Armed → Launching → Exploding → Idle`. Activation is only
//! accepted while Armed and clears the armed state in the same step, so a
//! repeated activation during the sequence is ignored. Once launched the
//! sequence runs to completion regardless of face observations.

use crate::geometry::{Rect, ViewGeometry};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationTiming {
    /// Launch time per unit of `view width / face size`.
    pub launch_per_ratio: Duration,
    pub max_launch: Duration,
    pub boom_grow: Duration,
    pub boom_fade: Duration,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            launch_per_ratio: Duration::from_millis(450),
            max_launch: Duration::from_secs(4),
            boom_grow: Duration::from_millis(700),
            boom_fade: Duration::from_millis(700),
        }
    }
}

/// Observable phase of the animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPhase {
    Idle,
    Armed,
    Launching,
    Exploding,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Armed,
    Launching { target: Rect, until: Instant },
    Exploding { target: Rect, until: Instant },
}

/// Smaller faces are farther away, so the rocket flies longer.
///
/// Degenerate geometry never panics: an infinite ratio yields `max_launch`
/// and a NaN or negative one yields zero.
pub fn launch_duration(view: &ViewGeometry, face: &Rect, timing: &AnimationTiming) -> Duration {
    let ratio = f64::from(view.width) / f64::from(face.min_side()).max(1.0);
    let secs = timing.launch_per_ratio.as_secs_f64() * ratio;
    if secs.is_nan() || secs <= 0.0 {
        Duration::ZERO
    } else if secs >= timing.max_launch.as_secs_f64() {
        timing.max_launch
    } else {
        Duration::from_secs_f64(secs)
    }
}

#[derive(Debug)]
pub struct Animation {
    state: State,
    timing: AnimationTiming,
}

impl Animation {
    pub fn new(timing: AnimationTiming) -> Self {
        Self {
            state: State::Idle,
            timing,
        }
    }

    pub fn phase(&self) -> AnimationPhase {
        match self.state {
            State::Idle => AnimationPhase::Idle,
            State::Armed => AnimationPhase::Armed,
            State::Launching { .. } => AnimationPhase::Launching,
            State::Exploding { .. } => AnimationPhase::Exploding,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, State::Armed)
    }

    /// Whether a launch sequence is in progress.
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Launching { .. } | State::Exploding { .. })
    }

    /// Where the running sequence is aimed.
    pub fn target(&self) -> Option<Rect> {
        match self.state {
            State::Launching { target, .. } | State::Exploding { target, .. } => Some(target),
            State::Idle | State::Armed => None,
        }
    }

    /// When the current phase ends, if it is timed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            State::Launching { until, .. } | State::Exploding { until, .. } => Some(until),
            State::Idle | State::Armed => None,
        }
    }

    /// A face is present. Returns the new phase if it changed.
    pub fn face_observed(&mut self) -> Option<AnimationPhase> {
        match self.state {
            State::Idle => {
                self.state = State::Armed;
                Some(AnimationPhase::Armed)
            }
            _ => None,
        }
    }

    /// No face in the latest result. A running sequence is unaffected.
    pub fn face_lost(&mut self) -> Option<AnimationPhase> {
        match self.state {
            State::Armed => {
                self.state = State::Idle;
                Some(AnimationPhase::Idle)
            }
            _ => None,
        }
    }

    /// User pressed the trigger. Returns the launch duration, or `None` if
    /// the animation was not armed.
    pub fn activate(&mut self, face: Rect, view: &ViewGeometry, now: Instant) -> Option<Duration> {
        if !self.is_armed() {
            return None;
        }
        let duration = launch_duration(view, &face, &self.timing);
        self.state = State::Launching {
            target: face,
            until: now + duration,
        };
        Some(duration)
    }

    /// Apply every timed transition due at `now`, returning the phases
    /// entered in order.
    pub fn advance(&mut self, now: Instant) -> Vec<AnimationPhase> {
        let mut entered = Vec::new();
        loop {
            match self.state {
                State::Launching { target, until } if now >= until => {
                    self.state = State::Exploding {
                        target,
                        until: until + self.timing.boom_grow + self.timing.boom_fade,
                    };
                    entered.push(AnimationPhase::Exploding);
                }
                State::Exploding { until, .. } if now >= until => {
                    self.state = State::Idle;
                    entered.push(AnimationPhase::Idle);
                }
                _ => return entered,
            }
        }
    }
}

impl Default for Animation {
    fn default() -> Self {
        Self::new(AnimationTiming::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> Rect {
        Rect {
            x: 100.0,
            y: 100.0,
            width: 150.0,
            height: 200.0,
        }
    }

    fn view() -> ViewGeometry {
        ViewGeometry {
            width: 300.0,
            height: 800.0,
            control_inset: 150.0,
        }
    }

    #[test]
    fn test_launch_duration_scales_with_face_size() {
        let timing = AnimationTiming::default();
        // 300 / min(150, 200) = 2.0 → 0.9 s
        let duration = launch_duration(&view(), &face(), &timing);
        let expected = Duration::from_millis(900);
        let diff = duration.max(expected) - duration.min(expected);
        assert!(diff < Duration::from_micros(1), "{duration:?}");

        let tiny = Rect {
            width: 0.0,
            height: 0.0,
            ..face()
        };
        assert_eq!(launch_duration(&view(), &tiny, &timing), timing.max_launch);
    }

    #[test]
    fn test_launch_duration_survives_bad_geometry() {
        let timing = AnimationTiming::default();
        let wide = ViewGeometry {
            width: f32::INFINITY,
            ..view()
        };
        assert_eq!(launch_duration(&wide, &face(), &timing), timing.max_launch);

        let nan = ViewGeometry {
            width: f32::NAN,
            ..view()
        };
        assert_eq!(launch_duration(&nan, &face(), &timing), Duration::ZERO);

        let negative = ViewGeometry {
            width: -300.0,
            ..view()
        };
        assert_eq!(launch_duration(&negative, &face(), &timing), Duration::ZERO);
    }

    #[test]
    fn test_face_arms_and_disarms() {
        let mut anim = Animation::default();
        assert_eq!(anim.phase(), AnimationPhase::Idle);
        assert_eq!(anim.face_observed(), Some(AnimationPhase::Armed));
        assert_eq!(anim.face_observed(), None);
        assert!(anim.is_armed());
        assert_eq!(anim.face_lost(), Some(AnimationPhase::Idle));
        assert_eq!(anim.face_lost(), None);
    }

    #[test]
    fn test_activate_disarms_in_same_step() {
        let mut anim = Animation::default();
        let now = Instant::now();
        anim.face_observed();

        assert!(anim.activate(face(), &view(), now).is_some());
        assert_eq!(anim.phase(), AnimationPhase::Launching);
        assert!(!anim.is_armed());

        // Second activation is a no-op.
        assert_eq!(anim.activate(face(), &view(), now), None);
        assert_eq!(anim.phase(), AnimationPhase::Launching);
    }

    #[test]
    fn test_activate_while_idle_is_noop() {
        let mut anim = Animation::default();
        assert_eq!(anim.activate(face(), &view(), Instant::now()), None);
        assert_eq!(anim.phase(), AnimationPhase::Idle);
    }

    #[test]
    fn test_sequence_runs_to_idle() {
        let mut anim = Animation::default();
        let now = Instant::now();
        anim.face_observed();
        let launch = anim.activate(face(), &view(), now).unwrap();

        assert!(anim.advance(now + launch / 2).is_empty());
        assert_eq!(anim.advance(now + launch), vec![AnimationPhase::Exploding]);
        assert_eq!(anim.target(), Some(face()));

        let end = now + launch + Duration::from_millis(1400);
        assert!(anim.advance(end - Duration::from_millis(1)).is_empty());
        assert_eq!(anim.advance(end), vec![AnimationPhase::Idle]);
        assert_eq!(anim.deadline(), None);
    }

    #[test]
    fn test_late_tick_applies_all_transitions() {
        let mut anim = Animation::default();
        let now = Instant::now();
        anim.face_observed();
        anim.activate(face(), &view(), now);
        assert_eq!(
            anim.advance(now + Duration::from_secs(10)),
            vec![AnimationPhase::Exploding, AnimationPhase::Idle]
        );
    }

    #[test]
    fn test_faces_do_not_interrupt_sequence() {
        let mut anim = Animation::default();
        let now = Instant::now();
        anim.face_observed();
        anim.activate(face(), &view(), now);

        assert_eq!(anim.face_lost(), None);
        assert_eq!(anim.face_observed(), None);
        assert_eq!(anim.phase(), AnimationPhase::Launching);
        assert!(anim.is_running());

        // After completion a new face re-arms.
        anim.advance(now + Duration::from_secs(10));
        assert_eq!(anim.face_observed(), Some(AnimationPhase::Armed));
    }
}
