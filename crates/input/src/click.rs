use glam::Vec2;

/// Largest pointer travel, in pixels, for a press and release to count as a click.
pub const CLICK_DISTANCE: f32 = 3.0;

/// Tells clicks from drags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickTracker {
    down: Option<Vec2>,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, x: f32, y: f32) {
        self.down = Some(Vec2::new(x, y));
    }

    /// True when the release lands within [`CLICK_DISTANCE`] of the press.
    /// A release without a press is never a click.
    pub fn release(&mut self, x: f32, y: f32) -> bool {
        match self.down.take() {
            Some(down) => down.distance(Vec2::new(x, y)) <= CLICK_DISTANCE,
            None => false,
        }
    }

    pub fn cancel(&mut self) {
        self.down = None;
    }
}
