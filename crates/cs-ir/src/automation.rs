//! Timed automation curves for voice parameters.
//!
//! An `Automation` is an append-only list of events, each giving a target
//! value at an absolute time (seconds on whichever clock drives the pass)
//! and how to get there from the previous event. A voice carries one curve
//! per automated parameter (gain, frequency), submitted in full when the
//! voice is created.

use alloc::vec::Vec;

/// How the curve reaches an event's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveKind {
    /// Jump to the value at the event time.
    Set,
    /// Straight line from the previous event.
    Linear,
    /// Geometric ramp from the previous event (both ends must share a sign
    /// and be non-zero, otherwise the ramp degrades to linear).
    Exponential,
}

/// One control point on an automation curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutomationEvent {
    /// Absolute time in seconds.
    pub time: f64,
    /// Value reached at `time`.
    pub value: f32,
    /// Interpolation from the previous event to this one.
    pub curve: CurveKind,
}

/// Interpolate between two values using the given curve at position `t` (0.0..1.0).
pub fn interpolate(curve: CurveKind, from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match curve {
        CurveKind::Set => {
            if t >= 1.0 {
                to
            } else {
                from
            }
        }
        CurveKind::Linear => from + (to - from) * t,
        CurveKind::Exponential => {
            if from == 0.0 || to == 0.0 || (from < 0.0) != (to < 0.0) {
                from + (to - from) * t
            } else {
                from * libm::powf(to / from, t)
            }
        }
    }
}

/// A parameter curve: a default value plus time-ordered events.
#[derive(Clone, Debug, PartialEq)]
pub struct Automation {
    default: f32,
    events: Vec<AutomationEvent>,
}

impl Automation {
    /// Create a curve that holds `default` until its first event.
    pub fn new(default: f32) -> Self {
        Self { default, events: Vec::new() }
    }

    /// Create a curve fixed at `value`.
    pub fn constant(value: f32) -> Self {
        Self::new(value)
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at(&mut self, value: f32, time: f64) -> &mut Self {
        self.push(CurveKind::Set, value, time)
    }

    /// Ramp linearly from the previous event to `value` at `time`.
    pub fn linear_ramp_to(&mut self, value: f32, time: f64) -> &mut Self {
        self.push(CurveKind::Linear, value, time)
    }

    /// Ramp geometrically from the previous event to `value` at `time`.
    pub fn exponential_ramp_to(&mut self, value: f32, time: f64) -> &mut Self {
        self.push(CurveKind::Exponential, value, time)
    }

    /// Events never go back in time; an early event is pinned to the last one.
    fn push(&mut self, curve: CurveKind, value: f32, time: f64) -> &mut Self {
        let floor = self.events.last().map_or(0.0, |e| e.time);
        let time = if time.is_finite() { time.max(floor) } else { floor };
        self.events.push(AutomationEvent { time, value, curve });
        self
    }

    /// Value before the first event.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// All events in time order.
    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    /// Largest value the curve reaches.
    pub fn peak(&self) -> f32 {
        self.events.iter().fold(self.default, |acc, e| acc.max(e.value))
    }

    /// Evaluate the curve at `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        let next = self.events.partition_point(|e| e.time <= time);
        self.value_between(next, time)
    }

    /// Evaluate the curve at `time` given the index of the first event
    /// strictly after `time`.
    pub fn value_between(&self, next: usize, time: f64) -> f32 {
        let (prev_time, prev_value) = match next.checked_sub(1) {
            Some(i) => (self.events[i].time, self.events[i].value),
            None => (0.0, self.default),
        };
        match self.events.get(next) {
            None => prev_value,
            Some(e) if e.curve == CurveKind::Set => prev_value,
            Some(e) => {
                let span = e.time - prev_time;
                if span <= 0.0 {
                    return e.value;
                }
                let t = ((time - prev_time) / span) as f32;
                interpolate(e.curve, prev_value, e.value, t)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_set_holds_until_end() {
        assert_eq!(interpolate(CurveKind::Set, 0.0, 10.0, 0.0), 0.0);
        assert_eq!(interpolate(CurveKind::Set, 0.0, 10.0, 0.99), 0.0);
        assert_eq!(interpolate(CurveKind::Set, 0.0, 10.0, 1.0), 10.0);
    }

    #[test]
    fn interpolate_linear_midpoint() {
        assert_eq!(interpolate(CurveKind::Linear, 0.0, 10.0, 0.5), 5.0);
        assert_eq!(interpolate(CurveKind::Linear, 10.0, -10.0, 0.5), 0.0);
    }

    #[test]
    fn interpolate_exponential_is_geometric() {
        let mid = interpolate(CurveKind::Exponential, 150.0, 40.0, 0.5);
        assert!((mid - (150.0f32 * 40.0).sqrt()).abs() < 0.01);
    }

    #[test]
    fn interpolate_exponential_through_zero_falls_back_to_linear() {
        assert_eq!(interpolate(CurveKind::Exponential, 0.0, 10.0, 0.5), 5.0);
    }

    #[test]
    fn default_before_first_event() {
        let mut a = Automation::new(0.3);
        a.set_value_at(1.0, 2.0);
        assert_eq!(a.value_at(0.0), 0.3);
        assert_eq!(a.value_at(1.999), 0.3);
        assert_eq!(a.value_at(2.0), 1.0);
    }

    #[test]
    fn linear_ramp_from_previous_event() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.0, 1.0).linear_ramp_to(1.0, 2.0);
        assert!((a.value_at(1.5) - 0.5).abs() < 1e-6);
        assert_eq!(a.value_at(3.0), 1.0);
    }

    #[test]
    fn exponential_ramp_from_previous_event() {
        let mut a = Automation::new(150.0);
        a.set_value_at(150.0, 0.0).exponential_ramp_to(40.0, 0.1);
        assert_eq!(a.value_at(0.0), 150.0);
        assert!(a.value_at(0.05) < 95.0 && a.value_at(0.05) > 40.0);
        assert!((a.value_at(0.1) - 40.0).abs() < 1e-3);
    }

    #[test]
    fn events_are_pinned_in_time_order() {
        let mut a = Automation::new(0.0);
        a.set_value_at(1.0, 1.0).linear_ramp_to(0.0, 0.5);
        assert_eq!(a.events()[1].time, 1.0);
    }

    #[test]
    fn peak_includes_default() {
        let mut a = Automation::new(0.0);
        a.linear_ramp_to(0.8, 0.01).linear_ramp_to(0.56, 0.11);
        assert!((a.peak() - 0.8).abs() < 1e-6);
        assert_eq!(Automation::constant(0.4).peak(), 0.4);
    }
}
