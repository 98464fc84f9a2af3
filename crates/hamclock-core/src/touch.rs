//! Touch sampling abstraction and press-edge detection.

/// One mapped touch sample in display pixel coordinates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TouchPoint {
    pub x: u16,
    pub y: u16,
}

/// Touch sample handed to navigation. `edge` is raised exactly once per
/// physical press.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TouchEvent {
    pub x: u16,
    pub y: u16,
    pub edge: bool,
}

/// Polled touch panel. Yields `Ok(None)` when the panel is not touched.
pub trait TouchInput {
    type Error;

    fn poll_touch(&mut self) -> Result<Option<TouchPoint>, Self::Error>;
}

/// Touch source for builds without a panel.
#[derive(Default, Debug, Clone, Copy)]
pub struct NoTouch;

impl NoTouch {
    pub const fn new() -> Self {
        Self
    }
}

impl TouchInput for NoTouch {
    type Error = core::convert::Infallible;

    fn poll_touch(&mut self) -> Result<Option<TouchPoint>, Self::Error> {
        Ok(None)
    }
}

/// Full-scale reading of a 12-bit resistive touch ADC.
pub const TOUCH_ADC_MAX: u16 = 4095;

/// Raw-to-screen mapping for one resistive panel.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TouchCalibration {
    x_min: u16,
    x_max: u16,
    y_min: u16,
    y_max: u16,
    rotation: u8,
    width: u16,
    height: u16,
}

impl Default for TouchCalibration {
    fn default() -> Self {
        Self {
            x_min: 200,
            x_max: 3700,
            y_min: 240,
            y_max: 3800,
            rotation: 1,
            width: 320,
            height: 240,
        }
    }
}

impl TouchCalibration {
    pub const fn with_rotation(mut self, rotation: u8) -> Self {
        self.rotation = rotation & 0b11;
        self
    }

    /// Visible screen size after rotation.
    pub const fn with_screen(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Aligns raw axes with the panel rotation, then scales into pixels.
    pub fn map(&self, raw_x: u16, raw_y: u16) -> TouchPoint {
        let raw_x = raw_x.min(TOUCH_ADC_MAX);
        let raw_y = raw_y.min(TOUCH_ADC_MAX);
        let (x, y) = match self.rotation {
            0 => (TOUCH_ADC_MAX - raw_y, raw_x),
            1 => (raw_x, raw_y),
            2 => (raw_y, TOUCH_ADC_MAX - raw_x),
            _ => (TOUCH_ADC_MAX - raw_x, TOUCH_ADC_MAX - raw_y),
        };

        TouchPoint {
            x: scale(x, self.x_min, self.x_max, self.width),
            y: scale(y, self.y_min, self.y_max, self.height),
        }
    }
}

/// Linear map of `raw` from `[min, max]` into `[0, span)`, clamped.
fn scale(raw: u16, min: u16, max: u16, span: u16) -> u16 {
    if span == 0 || max <= min {
        return 0;
    }
    let clamped = raw.clamp(min, max) - min;
    let scaled = clamped as u32 * span as u32 / (max - min) as u32;
    scaled.min(span as u32 - 1) as u16
}

/// Turns raw per-poll samples into [`TouchEvent`]s.
///
/// The next press edge is only armed after `release_samples` consecutive
/// untouched samples, which filters the brief dropouts a resistive panel
/// produces while held.
#[derive(Clone, Copy, Debug)]
pub struct TouchTracker {
    release_samples: u8,
    pressed: bool,
    release_count: u8,
}

impl TouchTracker {
    pub const fn new() -> Self {
        Self {
            release_samples: 1,
            pressed: false,
            release_count: 0,
        }
    }

    pub const fn with_release_samples(mut self, release_samples: u8) -> Self {
        self.release_samples = release_samples;
        self
    }

    pub const fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn sample(&mut self, sample: Option<TouchPoint>) -> Option<TouchEvent> {
        let Some(point) = sample else {
            if self.pressed {
                self.release_count = self.release_count.saturating_add(1);
                if self.release_count >= self.release_samples.max(1) {
                    self.pressed = false;
                    self.release_count = 0;
                }
            }
            return None;
        };

        self.release_count = 0;
        let edge = !self.pressed;
        self.pressed = true;

        Some(TouchEvent {
            x: point.x,
            y: point.y,
            edge,
        })
    }
}

impl Default for TouchTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: TouchPoint = TouchPoint { x: 300, y: 230 };

    fn edges(tracker: &mut TouchTracker, samples: &[Option<TouchPoint>]) -> usize {
        samples
            .iter()
            .filter_map(|sample| tracker.sample(*sample))
            .filter(|event| event.edge)
            .count()
    }

    #[test]
    fn holding_produces_one_edge() {
        let mut tracker = TouchTracker::new();
        assert_eq!(edges(&mut tracker, &[Some(P); 25]), 1);
        assert!(tracker.is_pressed());
    }

    #[test]
    fn re_press_after_release_produces_second_edge() {
        let mut tracker = TouchTracker::new();
        let samples = [Some(P), Some(P), None, Some(P), Some(P)];
        assert_eq!(edges(&mut tracker, &samples), 2);
    }

    #[test]
    fn short_dropout_is_absorbed_by_release_debounce() {
        let mut tracker = TouchTracker::new().with_release_samples(3);
        let samples = [Some(P), None, None, Some(P), None, None, None, Some(P)];
        assert_eq!(edges(&mut tracker, &samples), 2);
    }

    #[test]
    fn scale_clamps_both_ends() {
        assert_eq!(scale(0, 200, 3700, 320), 0);
        assert_eq!(scale(200, 200, 3700, 320), 0);
        assert_eq!(scale(3700, 200, 3700, 320), 319);
        assert_eq!(scale(TOUCH_ADC_MAX, 200, 3700, 320), 319);
        assert_eq!(scale(1950, 200, 3700, 320), 160);
    }

    #[test]
    fn scale_degenerate_ranges_map_to_origin() {
        assert_eq!(scale(1000, 200, 3700, 0), 0);
        assert_eq!(scale(1000, 3700, 200, 320), 0);
        assert_eq!(scale(1000, 500, 500, 320), 0);
    }

    #[test]
    fn landscape_rotation_keeps_raw_axes() {
        let cal = TouchCalibration::default();
        assert_eq!(cal.map(200, 240), TouchPoint { x: 0, y: 0 });
        assert_eq!(cal.map(3700, 3800), TouchPoint { x: 319, y: 239 });
    }

    #[test]
    fn flipped_landscape_mirrors_both_axes() {
        let cal = TouchCalibration::default().with_rotation(3);
        // Raw corner near the ADC maximum lands at the screen origin.
        assert_eq!(
            cal.map(TOUCH_ADC_MAX - 200, TOUCH_ADC_MAX - 240),
            TouchPoint { x: 0, y: 0 }
        );
        assert_eq!(cal.map(0, 0), TouchPoint { x: 319, y: 239 });
    }

    #[test]
    fn portrait_rotations_swap_axes() {
        let portrait = TouchCalibration::default()
            .with_rotation(0)
            .with_screen(240, 320);
        // x follows the inverted raw y, y follows raw x.
        assert_eq!(portrait.map(200, TOUCH_ADC_MAX - 200), TouchPoint { x: 0, y: 0 });
        assert_eq!(portrait.map(3800, 0), TouchPoint { x: 239, y: 319 });

        let flipped = TouchCalibration::default()
            .with_rotation(2)
            .with_screen(240, 320);
        // x follows raw y, y follows the inverted raw x.
        assert_eq!(flipped.map(TOUCH_ADC_MAX - 240, 200), TouchPoint { x: 0, y: 0 });
        assert_eq!(flipped.map(0, 3700), TouchPoint { x: 239, y: 319 });
    }

    #[test]
    fn rotation_is_taken_modulo_four() {
        assert_eq!(
            TouchCalibration::default().with_rotation(5),
            TouchCalibration::default().with_rotation(1)
        );
    }

    #[test]
    fn out_of_range_raw_values_are_clamped() {
        let cal = TouchCalibration::default().with_rotation(3);
        assert_eq!(cal.map(u16::MAX, u16::MAX), TouchPoint { x: 0, y: 0 });
    }

    #[test]
    fn held_samples_still_report_position() {
        let mut tracker = TouchTracker::new();
        let _ = tracker.sample(Some(P));
        let held = tracker.sample(Some(TouchPoint { x: 10, y: 20 }));
        assert_eq!(
            held,
            Some(TouchEvent {
                x: 10,
                y: 20,
                edge: false
            })
        );
    }
}
