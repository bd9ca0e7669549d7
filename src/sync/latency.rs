//! One-way latency estimation from PING/PONG round trips.
//!
//! Each probe yields a one-way latency sample; samples feed an
//! Individuals/Moving-Range control chart that classifies them as in-control
//! or out-of-control, and an EWMA whose trust in a new sample depends on that
//! classification. The smoothed output drives position compensation and the
//! reconciler's tolerance window.

use log::{debug, trace};

/// Bias correction constant (d2 for subgroups of size 2) used to convert the
/// mean moving range into a sigma estimate on an I-MR chart
const MR_BIAS_CORRECTION: f64 = 1.128;

/// Weight kept on the previous estimate when the new sample is in control:
/// a trusted sample contributes 90% of the new mix
const IN_CONTROL_DAMPING_WEIGHT: f64 = 0.1;

/// Weight kept on the previous estimate when the new sample is out of
/// control: an outlier only contributes 10%
const OUTLIER_DAMPING_WEIGHT: f64 = 0.9;

/// Token pairing a probe with its eventual PONG. The send timestamp is echoed
/// by the server, so the token survives the round trip inside the wire format
/// itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeToken {
    send_time: f64,
}

impl ProbeToken {
    pub fn new(send_time: f64) -> Self {
        Self { send_time }
    }

    /// Epoch-seconds timestamp recorded when the probe was sent
    pub fn send_time(&self) -> f64 {
        self.send_time
    }
}

/// Smoothed one-way latency estimator with control-chart outlier damping.
pub struct LatencyEstimator {
    /// Ring capacity W
    window: usize,

    /// Samples observed before control limits and smoothing engage
    min_samples: usize,

    /// Latency samples; grows to `window`, then overwrites circularly
    samples: Vec<f64>,

    /// Successive absolute differences between samples, same ring scheme.
    /// The write cursor trails the sample cursor by one update.
    movings: Vec<f64>,

    cur_index: usize,
    prev_index: Option<usize>,
    mov_cursor: usize,

    /// Rollback record for the moving range written by the current update:
    /// slot index plus the value it overwrote (None when the ring grew)
    last_moving_write: Option<(usize, Option<f64>)>,

    observed: usize,
    smoothed: f64,
    ucl: f64,
    lcl: f64,
}

impl LatencyEstimator {
    pub fn new(window: usize, min_samples: usize) -> Self {
        Self {
            window,
            min_samples,
            samples: Vec::with_capacity(window),
            movings: Vec::with_capacity(window),
            cur_index: 0,
            prev_index: None,
            mov_cursor: 0,
            last_moving_write: None,
            observed: 0,
            smoothed: 0.0,
            ucl: 0.0,
            lcl: 0.0,
        }
    }

    /// Record the start of a probe round trip
    pub fn probe(&self, send_time: f64) -> ProbeToken {
        ProbeToken::new(send_time)
    }

    /// Complete a probe with the PONG's service timestamp and our receive time
    pub fn complete(&mut self, token: ProbeToken, service_time: f64, receive_time: f64) {
        self.update(token.send_time, service_time, receive_time);
    }

    /// Fold one (send, service, receive) triple into the estimate.
    ///
    /// The remote's own processing delay is subtracted before halving the
    /// round trip. Until `min_samples` samples have been observed the sample
    /// is only recorded; the smoothed value stays at its initial 0.0.
    pub fn update(&mut self, send_time: f64, service_time: f64, receive_time: f64) {
        let lat = (receive_time - send_time - service_time) / 2.0;
        trace!("latency sample: {:.6}s", lat);

        let cur = self.cur_index;
        if self.samples.len() < self.window {
            self.samples.push(lat);
        } else {
            self.samples[cur] = lat;
        }

        self.last_moving_write = None;
        if let Some(prev) = self.prev_index {
            let moving = (self.samples[cur] - self.samples[prev]).abs();
            self.write_moving(moving);
        }

        self.prev_index = Some(cur);
        self.cur_index = (cur + 1) % self.window;
        self.observed += 1;

        if self.observed < self.min_samples {
            return;
        }

        let sample_mean = mean(&self.samples);
        let mut moving_mean = mean(&self.movings);
        self.ucl = sample_mean + 3.0 * moving_mean / MR_BIAS_CORRECTION;
        self.lcl = sample_mean - 3.0 * moving_mean / MR_BIAS_CORRECTION;

        // Classification uses the limits just computed, i.e. with the new
        // sample folded in. Out of control means outside the band.
        let out_of_control = lat > self.ucl || lat < self.lcl;

        let damping = if out_of_control {
            // The outlier's own jump must not widen the control band:
            // discard the moving range it produced and recompute.
            self.rollback_last_moving();
            moving_mean = mean(&self.movings);
            self.ucl = sample_mean + 3.0 * moving_mean / MR_BIAS_CORRECTION;
            self.lcl = sample_mean - 3.0 * moving_mean / MR_BIAS_CORRECTION;
            debug!(
                "latency sample {:.6}s outside control limits [{:.6}, {:.6}]",
                lat, self.lcl, self.ucl
            );
            OUTLIER_DAMPING_WEIGHT
        } else {
            IN_CONTROL_DAMPING_WEIGHT
        };

        self.smoothed = damping * self.smoothed + (1.0 - damping) * lat;
        trace!("smoothed latency estimate: {:.6}s", self.smoothed);
    }

    /// Current smoothed one-way latency estimate in seconds
    pub fn smoothed(&self) -> f64 {
        self.smoothed
    }

    /// Current (lower, upper) control limits
    pub fn control_limits(&self) -> (f64, f64) {
        (self.lcl, self.ucl)
    }

    /// Total samples observed (not capped by the window)
    pub fn sample_count(&self) -> usize {
        self.observed
    }

    fn write_moving(&mut self, moving: f64) {
        if self.movings.len() < self.window {
            self.movings.push(moving);
            self.last_moving_write = Some((self.movings.len() - 1, None));
        } else {
            self.last_moving_write = Some((self.mov_cursor, Some(self.movings[self.mov_cursor])));
            self.movings[self.mov_cursor] = moving;
        }
        self.mov_cursor = (self.mov_cursor + 1) % self.window;
    }

    fn rollback_last_moving(&mut self) {
        if let Some((index, overwritten)) = self.last_moving_write.take() {
            match overwritten {
                None => {
                    self.movings.pop();
                }
                Some(old) => self.movings[index] = old,
            }
            self.mov_cursor = index;
        }
    }
}

fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}
