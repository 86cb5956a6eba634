// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Automatable parameters scheduled against the audio clock.
//!
//! An [`AudioParam`] holds an intrinsic value plus a time-ordered list of
//! automation events. Times are absolute audio clock seconds. The renderer
//! asks for the value at the time of each frame (or once per render quantum
//! for control-rate parameters).

/// A single scheduled automation event.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    /// Jump to `value` at `time`.
    SetValue { time: f64, value: f32 },
    /// Linear ramp from the previous event, reaching `value` at `time`.
    LinearRamp { time: f64, value: f32 },
    /// Exponential ramp from the previous event, reaching `value` at `time`.
    ExponentialRamp { time: f64, value: f32 },
    /// Approach `target` from `time` onwards with the given time constant.
    SetTarget {
        time: f64,
        target: f32,
        time_constant: f64,
    },
}

impl Event {
    fn time(&self) -> f64 {
        match self {
            Event::SetValue { time, .. }
            | Event::LinearRamp { time, .. }
            | Event::ExponentialRamp { time, .. }
            | Event::SetTarget { time, .. } => *time,
        }
    }

    fn is_ramp(&self) -> bool {
        matches!(self, Event::LinearRamp { .. } | Event::ExponentialRamp { .. })
    }
}

/// A parameter whose value can be automated over audio time.
#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f32,
    events: Vec<Event>,
}

impl AudioParam {
    /// Creates a parameter with the given intrinsic value and no automation.
    pub fn new(value: f32) -> AudioParam {
        AudioParam {
            value,
            events: Vec::new(),
        }
    }

    /// Sets the intrinsic value immediately, discarding all automation.
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.events.clear();
    }

    /// The number of pending automation events.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Event::SetValue { time, value });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Event::LinearRamp { time, value });
    }

    /// Exponential ramps need a non-zero start and end of the same sign. When
    /// that does not hold the previous value is held until `time`.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Event::ExponentialRamp { time, value });
    }

    /// Starts exponentially approaching `target` at `start`. A non-positive
    /// time constant jumps straight to the target.
    pub fn set_target_at_time(&mut self, target: f32, start: f64, time_constant: f64) {
        if time_constant <= 0.0 {
            self.set_value_at_time(target, start);
            return;
        }
        self.insert(Event::SetTarget {
            time: start,
            target,
            time_constant,
        });
    }

    /// Cancels every event and holds the value the parameter has at `time`.
    ///
    /// The timeline only looks forward from here: values before `time` are
    /// forgotten, which keeps the event list bounded no matter how often
    /// automation is restarted.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        let held = self.value_at(time);
        self.value = held;
        self.events.clear();
        self.events.push(Event::SetValue { time, value: held });
    }

    /// Inserts after any events scheduled for the same time.
    fn insert(&mut self, event: Event) {
        let time = event.time();
        let index = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(index, event);
    }

    /// Computes the parameter value at the given audio time.
    pub fn value_at(&self, time: f64) -> f32 {
        // Start of the current segment.
        let mut seg_time = 0.0;
        let mut seg_value = self.value;

        for (i, event) in self.events.iter().enumerate() {
            match *event {
                Event::SetValue {
                    time: event_time,
                    value,
                } => {
                    if time < event_time {
                        return seg_value;
                    }
                    seg_time = event_time;
                    seg_value = value;
                }
                Event::LinearRamp {
                    time: end,
                    value,
                } => {
                    if time < end {
                        if time <= seg_time || end <= seg_time {
                            return seg_value;
                        }
                        let frac = ((time - seg_time) / (end - seg_time)) as f32;
                        return seg_value + (value - seg_value) * frac;
                    }
                    seg_time = end;
                    seg_value = value;
                }
                Event::ExponentialRamp {
                    time: end,
                    value,
                } => {
                    if time < end {
                        let valid = seg_value != 0.0 && value != 0.0 && (seg_value > 0.0) == (value > 0.0);
                        if !valid || time <= seg_time || end <= seg_time {
                            return seg_value;
                        }
                        let frac = (time - seg_time) / (end - seg_time);
                        let ratio = (value / seg_value) as f64;
                        return (seg_value as f64 * ratio.powf(frac)) as f32;
                    }
                    seg_time = end;
                    seg_value = value;
                }
                Event::SetTarget {
                    time: start,
                    target,
                    time_constant,
                } => {
                    if time < start {
                        return seg_value;
                    }
                    let from = seg_value;
                    let curve = |t: f64| {
                        target + (from - target) * (-(t - start) / time_constant).exp() as f32
                    };

                    // A target curve runs until the next event starts. A ramp that
                    // follows it begins from the target's start instead.
                    match self.events.get(i + 1) {
                        Some(next) if next.is_ramp() => {
                            seg_time = start;
                        }
                        Some(next) if time >= next.time() => {
                            seg_value = curve(next.time());
                            seg_time = next.time();
                        }
                        _ => return curve(time),
                    }
                }
            }
        }

        seg_value
    }
}

#[cfg(test)]
mod tests {
    use super::AudioParam;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn intrinsic_value_without_events() {
        let param = AudioParam::new(0.5);
        assert_eq!(param.value_at(0.0), 0.5);
        assert_eq!(param.value_at(100.0), 0.5);
    }

    #[test]
    fn set_value_and_linear_ramp() {
        let mut param = AudioParam::new(1.0);
        param.set_value_at_time(0.0, 1.0);
        param.linear_ramp_to_value_at_time(1.0, 1.01);

        assert_eq!(param.value_at(0.5), 1.0);
        assert_eq!(param.value_at(1.0), 0.0);
        assert!(approx(param.value_at(1.005), 0.5));
        assert_eq!(param.value_at(2.0), 1.0);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut param = AudioParam::new(400.0);
        param.set_value_at_time(400.0, 0.0);
        param.exponential_ramp_to_value_at_time(1600.0, 2.0);

        assert!(approx(param.value_at(1.0), 800.0));
        assert_eq!(param.value_at(3.0), 1600.0);
    }

    #[test]
    fn exponential_ramp_to_zero_holds() {
        let mut param = AudioParam::new(1.0);
        param.set_value_at_time(1.0, 0.0);
        param.exponential_ramp_to_value_at_time(0.0, 1.0);
        assert_eq!(param.value_at(0.5), 1.0);
        assert_eq!(param.value_at(1.0), 0.0);
    }

    #[test]
    fn set_target_approaches_target() {
        let mut param = AudioParam::new(0.0);
        param.set_target_at_time(1.0, 1.0, 0.1);

        assert_eq!(param.value_at(0.5), 0.0);
        // One time constant in: 1 - e^-1.
        assert!(approx(param.value_at(1.1), 1.0 - (-1.0f32).exp()));
        assert!(param.value_at(3.0) > 0.999);
    }

    #[test]
    fn chained_targets_continue_from_reached_value() {
        let mut param = AudioParam::new(1.0);
        param.set_target_at_time(0.5, 0.0, 0.5);
        param.set_target_at_time(0.0, 1.0, 0.5);

        let at_one = param.value_at(1.0);
        let expected = 0.5 + 0.5 * (-2.0f32).exp();
        assert!(approx(at_one, expected));
        assert!(param.value_at(1.5) < at_one);
        assert!(param.value_at(10.0) < 0.001);
    }

    #[test]
    fn cancel_and_hold_keeps_current_value() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 0.0);
        param.linear_ramp_to_value_at_time(1.0, 1.0);
        param.cancel_and_hold_at_time(0.25);

        assert!(approx(param.value_at(0.25), 0.25));
        assert!(approx(param.value_at(5.0), 0.25));
        assert_eq!(param.event_count(), 1);
    }

    #[test]
    fn repeated_cancel_does_not_accumulate_events() {
        let mut param = AudioParam::new(0.0);
        for i in 0..100 {
            let now = i as f64 * 0.01;
            param.cancel_and_hold_at_time(now);
            param.set_target_at_time(0.7, now, 0.01);
        }
        assert_eq!(param.event_count(), 2);
        assert!(param.value_at(10.0) <= 0.7);
    }
}
