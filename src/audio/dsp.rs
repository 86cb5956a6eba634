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

//! Signal processing building blocks used by the effect chains.

use std::f64::consts::PI;

/// The response shape of a [`Biquad`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Allpass,
    /// High shelf with the given gain in dB.
    Highshelf(f32),
}

/// A second order IIR filter (RBJ cookbook coefficients, direct form I).
///
/// For the low and high pass responses Q is interpreted in dB, for the rest it
/// is the linear quality factor.
#[derive(Debug, Clone)]
pub struct Biquad {
    filter_type: FilterType,
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    // Last parameters used so unchanged settings skip the coefficient math.
    frequency: f32,
    q: f32,
    sample_rate: u32,
}

impl Biquad {
    pub fn new(filter_type: FilterType, frequency: f32, q: f32, sample_rate: u32) -> Biquad {
        let mut biquad = Biquad {
            filter_type,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            frequency: f32::NAN,
            q: f32::NAN,
            sample_rate,
        };
        biquad.set(frequency, q);
        biquad
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Updates the cutoff/centre frequency and Q.
    pub fn set(&mut self, frequency: f32, q: f32) {
        if frequency == self.frequency && q == self.q {
            return;
        }
        self.frequency = frequency;
        self.q = q;

        let nyquist = self.sample_rate as f64 / 2.0;
        let frequency = (frequency as f64).clamp(1.0, nyquist * 0.999);
        let w0 = 2.0 * PI * frequency / self.sample_rate as f64;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let q = (q as f64).max(0.0001);

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::Lowpass => {
                let alpha = sin_w0 / (2.0 * 10f64.powf(q / 20.0));
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let alpha = sin_w0 / (2.0 * 10f64.powf(q / 20.0));
                let b1 = -(1.0 + cos_w0);
                (-b1 / 2.0, b1, -b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Bandpass => {
                let alpha = sin_w0 / (2.0 * q);
                (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Allpass => {
                let alpha = sin_w0 / (2.0 * q);
                (
                    1.0 - alpha,
                    -2.0 * cos_w0,
                    1.0 + alpha,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterType::Highshelf(gain_db) => {
                let a = 10f64.powf(gain_db as f64 / 40.0);
                // Shelf slope of 1.
                let alpha = sin_w0 / 2.0 * 2f64.sqrt();
                let sqrt_a = a.sqrt();
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha,
                )
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let x0 = input as f64;
        let y0 = self.b0 * x0 + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        // Flush denormals out of the recursion.
        self.y1 = if y0.abs() < 1e-20 { 0.0 } else { y0 };
        y0 as f32
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// A single-channel delay line with fractional (linearly interpolated) reads.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    /// Creates a delay line able to hold `max_seconds` of audio.
    pub fn new(max_seconds: f64, sample_rate: u32) -> DelayLine {
        let len = ((max_seconds * sample_rate as f64).ceil() as usize).max(1) + 2;
        DelayLine {
            buffer: vec![0.0; len],
            write: 0,
        }
    }

    /// Reads the signal `delay` frames in the past, to be called before the
    /// current frame is written. Delays shorter than one frame read the most
    /// recently written frame.
    pub fn read(&self, delay: f64) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(1.0, (len - 2) as f64);
        let whole = delay.floor() as usize;
        let frac = (delay - whole as f64) as f32;

        let a = self.buffer[(self.write + len + 1 - whole) % len];
        let b = self.buffer[(self.write + len - whole) % len];
        a + (b - a) * frac
    }

    pub fn write(&mut self, sample: f32) {
        self.write = (self.write + 1) % self.buffer.len();
        self.buffer[self.write] = sample;
    }

    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
    }
}

/// A static transfer curve, interpolated the same way a browser wave shaper
/// reads its curve.
#[derive(Debug, Clone)]
pub struct WaveShaper {
    curve: Vec<f32>,
}

impl WaveShaper {
    pub fn new(curve: Vec<f32>) -> WaveShaper {
        WaveShaper { curve }
    }

    /// The soft saturation curve used by the tape dropout chain.
    pub fn tape_saturation(points: usize) -> WaveShaper {
        let deg = std::f32::consts::PI / 180.0;
        let k = 2.0;
        let curve = (0..points)
            .map(|i| {
                let x = (i as f32 * 2.0) / points as f32 - 1.0;
                (3.0 + k) * x * 20.0 * deg / (std::f32::consts::PI + k * x.abs())
            })
            .collect();
        WaveShaper::new(curve)
    }

    pub fn curve(&self) -> &[f32] {
        &self.curve
    }

    pub fn shape(&self, input: f32) -> f32 {
        let n = self.curve.len();
        match n {
            0 => return input,
            1 => return self.curve[0],
            _ => {}
        }

        let v = (n - 1) as f32 * 0.5 * (input + 1.0);
        if v <= 0.0 {
            self.curve[0]
        } else if v >= (n - 1) as f32 {
            self.curve[n - 1]
        } else {
            let k = v.floor() as usize;
            let f = v - k as f32;
            (1.0 - f) * self.curve[k] + f * self.curve[k + 1]
        }
    }
}

/// A sine low frequency oscillator.
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f64,
    rate: f64,
    sample_rate: u32,
}

impl Lfo {
    pub fn new(rate: f64, sample_rate: u32) -> Lfo {
        Lfo {
            phase: 0.0,
            rate,
            sample_rate,
        }
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// The current phase in radians.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Returns the sine at the current phase plus `offset` radians without
    /// advancing.
    pub fn value(&self, offset: f64) -> f32 {
        (self.phase + offset).sin() as f32
    }

    /// Returns the current value and advances one frame.
    pub fn next(&mut self) -> f32 {
        let value = self.value(0.0);
        self.advance();
        value
    }

    pub fn advance(&mut self) {
        self.phase += 2.0 * PI * self.rate / self.sample_rate as f64;
        if self.phase >= 2.0 * PI {
            self.phase -= 2.0 * PI;
        }
    }
}

/// A first order allpass section, the building block of the phaser.
#[derive(Debug, Clone, Default)]
pub struct OnePoleAllpass {
    coefficient: f32,
    x1: f32,
    y1: f32,
}

impl OnePoleAllpass {
    pub fn set_frequency(&mut self, frequency: f32, sample_rate: u32) {
        let t = (std::f32::consts::PI * frequency / sample_rate as f32)
            .tan()
            .clamp(0.0001, 1000.0);
        self.coefficient = (t - 1.0) / (t + 1.0);
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let y = self.coefficient * input + self.x1 - self.coefficient * self.y1;
        self.x1 = input;
        self.y1 = if y.abs() < 1e-20 { 0.0 } else { y };
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}
