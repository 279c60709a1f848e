use glimpse_pipeline::{AnimationPhase, PresentationSink, Rect};
use std::io::Write;

/// Prints presentation updates as lines on a writer (stdout by default).
///
/// Face overlays are reported only when the number of faces changes, so a
/// steady stream does not flood the terminal.
pub struct TerminalSink<W = std::io::Stdout> {
    out: W,
    faces: Option<usize>,
}

impl TerminalSink {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, faces: None }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        if let Err(err) = writeln!(self.out, "{text}") {
            tracing::debug!(error = %err, "terminal write failed");
        }
    }
}

fn describe_rect(rect: &Rect) -> String {
    format!(
        "[{:.0},{:.0} {:.0}x{:.0}]",
        rect.x, rect.y, rect.width, rect.height
    )
}

impl<W: Write> PresentationSink for TerminalSink<W> {
    fn show_message(&mut self, text: &str) {
        self.line(format_args!("{text}"));
    }

    fn show_faces(&mut self, boxes: &[Rect]) {
        if self.faces == Some(boxes.len()) {
            return;
        }
        self.faces = Some(boxes.len());
        let boxes: Vec<String> = boxes.iter().map(describe_rect).collect();
        self.line(format_args!("faces: {} {}", boxes.len(), boxes.join(" ")));
    }

    fn clear_faces(&mut self) {
        if self.faces == Some(0) {
            return;
        }
        self.faces = Some(0);
        self.line(format_args!("faces: none"));
    }

    fn set_trigger_visible(&mut self, visible: bool) {
        if visible {
            self.line(format_args!("trigger ready, press Enter to launch"));
        } else {
            self.line(format_args!("trigger hidden"));
        }
    }

    fn animation_changed(&mut self, phase: AnimationPhase, target: Option<Rect>) {
        match (phase, target) {
            (AnimationPhase::Launching, Some(target)) => {
                self.line(format_args!("launching at {}", describe_rect(&target)))
            }
            (AnimationPhase::Exploding, _) => self.line(format_args!("boom")),
            (AnimationPhase::Idle, _) | (AnimationPhase::Armed, _) | (AnimationPhase::Launching, None) => {
                tracing::debug!(?phase, "animation phase")
            }
        }
    }
}
