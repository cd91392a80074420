//! Events and tap emulation.

use crate::config::TapConfig;

use super::NodeId;

/// An event delivered through [`Engine::dispatch`](crate::Engine::dispatch).
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    /// Pointer position, for pointer and touch events.
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
    /// The node the event was dispatched at. Set by the engine.
    pub target: Option<NodeId>,
    /// Payload for custom events.
    pub detail: serde_json::Value,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: 0.0,
            y: 0.0,
            timestamp_ms: 0,
            target: None,
            detail: serde_json::Value::Null,
        }
    }

    /// A pointer or touch event at a position and time.
    pub fn at(name: impl Into<String>, x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            timestamp_ms,
            ..Self::new(name)
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct TouchStart {
    x: f64,
    y: f64,
    timestamp_ms: u64,
}

/// Turns a short, still touch into a `click`.
///
/// A touch counts as a tap when the pointer travels at most
/// `max_movement` pixels and lifts within `max_duration_ms`.
#[derive(Debug, Clone)]
pub(crate) struct TapTracker {
    config: TapConfig,
    start: Option<TouchStart>,
}

impl TapTracker {
    pub(crate) fn new(config: TapConfig) -> Self {
        Self { config, start: None }
    }

    /// Feed a touch event. Returns the synthesized `click` when a tap
    /// completes.
    pub(crate) fn observe(&mut self, event: &Event) -> Option<Event> {
        match event.name.as_str() {
            "touchstart" => {
                self.start = Some(TouchStart {
                    x: event.x,
                    y: event.y,
                    timestamp_ms: event.timestamp_ms,
                });
                None
            }
            "touchmove" => {
                if self.start.is_some_and(|s| self.travelled(s, event) > self.config.max_movement) {
                    self.start = None;
                }
                None
            }
            "touchend" => {
                let start = self.start.take()?;
                let elapsed = event.timestamp_ms.saturating_sub(start.timestamp_ms);
                if elapsed > self.config.max_duration_ms
                    || self.travelled(start, event) > self.config.max_movement
                {
                    return None;
                }
                Some(Event {
                    target: event.target,
                    ..Event::at("click", event.x, event.y, event.timestamp_ms)
                })
            }
            "touchcancel" => {
                self.start = None;
                None
            }
            _ => None,
        }
    }

    fn travelled(&self, start: TouchStart, event: &Event) -> f64 {
        (event.x - start.x).hypot(event.y - start.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> TapTracker {
        TapTracker::new(TapConfig::default())
    }

    #[test]
    fn short_still_touch_is_a_tap() {
        let mut taps = tracker();
        assert!(taps.observe(&Event::at("touchstart", 5.0, 5.0, 1000)).is_none());
        let click = taps.observe(&Event::at("touchend", 8.0, 6.0, 1120)).unwrap();
        assert_eq!(click.name, "click");
        assert_eq!(click.x, 8.0);
    }

    #[test]
    fn dragging_cancels_the_tap() {
        let mut taps = tracker();
        taps.observe(&Event::at("touchstart", 0.0, 0.0, 0));
        taps.observe(&Event::at("touchmove", 0.0, 40.0, 50));
        assert!(taps.observe(&Event::at("touchend", 0.0, 0.0, 100)).is_none());
    }

    #[test]
    fn long_press_is_not_a_tap() {
        let mut taps = tracker();
        taps.observe(&Event::at("touchstart", 0.0, 0.0, 0));
        assert!(taps.observe(&Event::at("touchend", 0.0, 0.0, 900)).is_none());
    }

    #[test]
    fn end_without_start_is_ignored() {
        let mut taps = tracker();
        assert!(taps.observe(&Event::at("touchend", 0.0, 0.0, 10)).is_none());
    }
}
