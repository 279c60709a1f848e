use glimpse_core::BoundingBox;

/// Rectangle in view points, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

/// Size of the presentation surface.
///
/// The camera preview fills the full width and everything above the
/// bottom `control_inset` strip, which holds the trigger control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewGeometry {
    pub width: f32,
    pub height: f32,
    pub control_inset: f32,
}

impl Default for ViewGeometry {
    fn default() -> Self {
        Self {
            width: 375.0,
            height: 812.0,
            control_inset: 150.0,
        }
    }
}

impl ViewGeometry {
    pub fn preview(&self) -> Rect {
        Rect {
            x: 0.0,
            y: 0.0,
            width: self.width,
            height: (self.height - self.control_inset).max(0.0),
        }
    }

    /// Map a normalized bounding box onto the preview area.
    pub fn map_box(&self, bbox: &BoundingBox) -> Rect {
        let preview = self.preview();
        Rect {
            x: preview.x + bbox.x * preview.width,
            y: preview.y + bbox.y * preview.height,
            width: bbox.width * preview.width,
            height: bbox.height * preview.height,
        }
    }
}
