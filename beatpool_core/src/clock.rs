// Copyright 2026 the Beatpool Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-container frame clock.
//!
//! [`FrameClock`] produces the current time (in milliseconds) a container
//! feeds into its lifetime window each frame. Unlike a gameplay clock it is
//! not monotonic: the editor seeks freely, in both directions.
//!
//! While running, the clock advances by the host time elapsed between frames
//! times the playback rate. When an external media position (typically the
//! audio track) is fed in via [`sync`](FrameClock::sync), the clock instead
//! follows a smoothed affine mapping from host time to media time:
//!
//! ```text
//! media_time = rate * host_time + offset
//! ```
//!
//! Rate and offset are updated via EMA on each observation, tracking drift
//! without passing jitter through to the lifetime window.

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// A seekable clock advanced once per frame.
#[derive(Clone, Debug)]
pub struct FrameClock {
    current_time: f64,
    playback_rate: f64,
    running: bool,
    last_frame_host: Option<u64>,

    // Media mapping, in media milliseconds per host nanosecond.
    mapped_rate: f64,
    mapped_offset: f64,
    rate_alpha: f64,
    offset_alpha: f64,
    mapped: bool,
    last_sync_host: u64,
    last_sync_media: f64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Creates a stopped clock at time zero with playback rate 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_smoothing(0.1, 0.1)
    }

    /// Creates a stopped clock with the given EMA smoothing factors for
    /// media synchronisation.
    #[must_use]
    pub fn with_smoothing(rate_alpha: f64, offset_alpha: f64) -> Self {
        Self {
            current_time: 0.0,
            playback_rate: 1.0,
            running: false,
            last_frame_host: None,
            mapped_rate: 1.0 / NANOS_PER_MILLI,
            mapped_offset: 0.0,
            rate_alpha,
            offset_alpha,
            mapped: false,
            last_sync_host: 0,
            last_sync_media: 0.0,
        }
    }

    /// Returns the time computed by the last frame (or seek).
    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Returns whether the clock advances on [`process_frame`](Self::process_frame).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns the playback rate.
    #[must_use]
    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Starts advancing.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stops advancing. The current time is kept.
    pub fn stop(&mut self) {
        self.running = false;
        self.reset_mapping();
    }

    /// Jumps to `time`, in either direction.
    ///
    /// Any media mapping is discarded; the next [`sync`](Self::sync)
    /// re-establishes it exactly.
    pub fn seek(&mut self, time: f64) {
        self.current_time = time;
        self.reset_mapping();
    }

    /// Changes the playback rate.
    pub fn set_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
        self.reset_mapping();
    }

    /// Feeds an observation of the media position `media_time` (ms) at host
    /// time `host_nanos`.
    ///
    /// The first observation after a reset sets the mapping exactly.
    /// Subsequent ones smooth rate and offset.
    pub fn sync(&mut self, host_nanos: u64, media_time: f64) {
        if !self.mapped {
            self.mapped_rate = self.playback_rate / NANOS_PER_MILLI;
            self.mapped_offset = media_time - self.mapped_rate * host_nanos as f64;
            self.last_sync_host = host_nanos;
            self.last_sync_media = media_time;
            self.mapped = true;
            return;
        }

        let dt_host = host_nanos.saturating_sub(self.last_sync_host);
        if dt_host > 0 {
            let observed_rate = (media_time - self.last_sync_media) / dt_host as f64;
            self.mapped_rate =
                self.rate_alpha * observed_rate + (1.0 - self.rate_alpha) * self.mapped_rate;
        }

        let predicted = self.mapped_rate * host_nanos as f64 + self.mapped_offset;
        self.mapped_offset += self.offset_alpha * (media_time - predicted);

        self.last_sync_host = host_nanos;
        self.last_sync_media = media_time;
    }

    /// Advances the clock to host time `host_nanos` and returns the new
    /// current time.
    pub fn process_frame(&mut self, host_nanos: u64) -> f64 {
        if self.running {
            if self.mapped {
                self.current_time = self.mapped_rate * host_nanos as f64 + self.mapped_offset;
            } else if let Some(last) = self.last_frame_host {
                let elapsed = host_nanos.saturating_sub(last) as f64 / NANOS_PER_MILLI;
                self.current_time += elapsed * self.playback_rate;
            }
        }
        self.last_frame_host = Some(host_nanos);
        self.current_time
    }

    fn reset_mapping(&mut self) {
        self.mapped = false;
        self.mapped_offset = 0.0;
        self.last_sync_host = 0;
        self.last_sync_media = 0.0;
    }
}
