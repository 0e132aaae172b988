// Gain automation - Sample-accurate gain curves on the audio clock
//
// Events are committed ahead of time by the control side and evaluated per
// frame by the render side, so a fade keeps its shape no matter how late the
// host timer that scheduled it woke up.

#[derive(Debug, Clone, Copy, PartialEq)]
enum GainEvent {
    /// Jump to `value` at `time`
    SetValue { time: f64, value: f32 },
    /// Move linearly from the previous event to `value`, arriving at `end_time`
    LinearRamp { end_time: f64, value: f32 },
}

impl GainEvent {
    fn time(&self) -> f64 {
        match *self {
            GainEvent::SetValue { time, .. } => time,
            GainEvent::LinearRamp { end_time, .. } => end_time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            GainEvent::SetValue { value, .. } | GainEvent::LinearRamp { value, .. } => value,
        }
    }
}

/// Piecewise-linear gain curve
///
/// Before the first event the initial value holds; after the last event its
/// value holds.
#[derive(Debug, Clone)]
pub struct GainAutomation {
    initial: f32,
    events: Vec<GainEvent>,
}

impl GainAutomation {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::with_capacity(4),
        }
    }

    /// Step to `value` at `time`
    pub fn set_value_at(&mut self, time: f64, value: f32) {
        self.insert(GainEvent::SetValue { time, value });
    }

    /// Ramp linearly from the previous event's value to `value`, ending at `end_time`
    pub fn linear_ramp_to(&mut self, value: f32, end_time: f64) {
        self.insert(GainEvent::LinearRamp { end_time, value });
    }

    /// Drop every event at or after `time`
    pub fn cancel_after(&mut self, time: f64) {
        self.events.retain(|event| event.time() < time);
    }

    /// Number of committed events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Gain at audio-clock time `time`
    pub fn value_at(&self, time: f64) -> f32 {
        let mut previous_time = f64::NEG_INFINITY;
        let mut previous_value = self.initial;

        for event in &self.events {
            if event.time() <= time {
                previous_time = event.time();
                previous_value = event.value();
                continue;
            }

            return match *event {
                GainEvent::SetValue { .. } => previous_value,
                GainEvent::LinearRamp { end_time, value } => {
                    let span = end_time - previous_time;
                    if !span.is_finite() || span <= 0.0 {
                        // Ramp without an anchor: hold until it completes
                        previous_value
                    } else {
                        let progress = ((time - previous_time) / span) as f32;
                        previous_value + (value - previous_value) * progress
                    }
                }
            };
        }

        previous_value
    }

    fn insert(&mut self, event: GainEvent) {
        // Same-time events keep their commit order
        let index = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(index, event);
    }
}

impl Default for GainAutomation {
    fn default() -> Self {
        Self::new(1.0)
    }
}
