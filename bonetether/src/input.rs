/// Edge reported by [`Trigger::update`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Edge {
    None,
    Pressed,
    Released,
}

/// Local edge detection over a host-reported same-frame button level.
#[derive(Copy, Clone, Debug, Default)]
pub struct Trigger {
    level: bool,
    pressed_at: Option<f64>,
    long_press_fired: bool,
}

impl Trigger {
    pub fn update(&mut self, level: bool, now: f64) -> Edge {
        let edge = match (self.level, level) {
            (false, true) => {
                self.pressed_at = Some(now);
                self.long_press_fired = false;
                Edge::Pressed
            }
            (true, false) => {
                self.pressed_at = None;
                Edge::Released
            }
            _ => Edge::None,
        };
        self.level = level;
        edge
    }

    pub fn is_down(&self) -> bool {
        self.level
    }

    pub fn held_for(&self, now: f64) -> f64 {
        self.pressed_at.map_or(0.0, |at| now - at)
    }

    /// True once per press, when it has been held longer than `threshold`.
    pub fn take_long_press(&mut self, now: f64, threshold: f64) -> bool {
        if self.level && !self.long_press_fired && self.held_for(now) > threshold {
            self.long_press_fired = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
