use std::time::Duration;

use tessera_core::{Adaptation, Representation, TrackType};
use web_time::Instant;

use crate::estimator::Estimator;

/// Why a selection tick produced its result.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchReason {
    Initial,
    ManualOverride,
    UpSwitch,
    DownSwitch,
    StallFallback,
    NoEstimate,
    AlreadyOptimal,
}

/// Outcome of one selection tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    /// Index into the adaptation's ascending-bitrate representation list.
    pub index: usize,
    pub reason: SwitchReason,
    pub changed: bool,
}

#[derive(Clone, Debug)]
pub struct ChooserOptions {
    /// Headroom applied to the estimate before the bitrate lookup.
    pub safety_factor: f64,
    /// Down-switch only once the cap falls below `current * ratio`.
    pub down_hysteresis_ratio: f64,
    /// Up-switch only once the cap reaches `candidate * ratio`.
    pub up_hysteresis_ratio: f64,
    /// Stall duration after which the lowest representation is forced.
    pub stall_fallback_after: Duration,
}

impl Default for ChooserOptions {
    fn default() -> Self {
        Self {
            safety_factor: 0.95,
            down_hysteresis_ratio: 0.7,
            up_hysteresis_ratio: 1.15,
            stall_fallback_after: Duration::from_secs(3),
        }
    }
}

/// Per-track-type representation selector.
///
/// Every input is a plain setter; [`RepresentationChooser::choose`] recomputes
/// the selection from the latest inputs. The owner re-ticks the chooser
/// whenever any input edge fires, so the published selection is always
/// consistent with the most recent estimator state.
pub struct RepresentationChooser<E: Estimator> {
    adaptation: Adaptation,
    opts: ChooserOptions,
    estimator: E,
    current: Option<usize>,
    /// User pin in bits per second, 0 = automatic.
    manual_bitrate: u64,
    /// User ceiling, `u64::MAX` = uncapped.
    max_bitrate: u64,
    /// Viewport width cap in device pixels (video only), `u32::MAX` = none.
    limit_width: u32,
    /// Hidden-document cap (video only), `u64::MAX` while visible.
    throttle_bitrate: u64,
    stalled_since: Option<Instant>,
}

impl<E: Estimator> RepresentationChooser<E> {
    pub fn new(adaptation: Adaptation, opts: ChooserOptions, estimator: E) -> Self {
        Self {
            adaptation,
            opts,
            estimator,
            current: None,
            manual_bitrate: 0,
            max_bitrate: u64::MAX,
            limit_width: u32::MAX,
            throttle_bitrate: u64::MAX,
            stalled_since: None,
        }
    }

    pub fn adaptation(&self) -> &Adaptation {
        &self.adaptation
    }

    /// Swap in a new adaptation (track switch). The current selection is
    /// forgotten; the next tick starts from scratch.
    pub fn set_adaptation(&mut self, adaptation: Adaptation) {
        self.adaptation = adaptation;
        self.current = None;
    }

    pub fn set_manual_bitrate(&mut self, bps: u64) {
        self.manual_bitrate = bps;
    }

    pub fn set_max_bitrate(&mut self, bps: u64) {
        self.max_bitrate = bps;
    }

    pub fn set_limit_width(&mut self, width: u32) {
        self.limit_width = width;
    }

    pub fn set_throttle_bitrate(&mut self, bps: u64) {
        self.throttle_bitrate = bps;
    }

    /// Record the stall signal from the buffer health monitor.
    pub fn set_stalled(&mut self, stalled: bool, now: Instant) {
        match (stalled, self.stalled_since) {
            (true, None) => self.stalled_since = Some(now),
            (false, Some(_)) => self.stalled_since = None,
            _ => {}
        }
    }

    pub fn push_sample(&mut self, sample: crate::Sample) {
        self.estimator.push_sample(sample);
    }

    pub fn estimate_bps(&self, server_may_limit: bool) -> Option<u64> {
        self.estimator.estimate_bps(server_may_limit)
    }

    /// The currently selected representation, if a tick has run.
    pub fn selected(&self) -> Option<&Representation> {
        self.current.map(|i| &self.adaptation.representations()[i])
    }

    /// Representations passing the viewport-width filter, by index.
    ///
    /// Only video is width-filtered. When the filter would empty the set, the
    /// whole set is kept so a selection always exists.
    fn filtered_indices(&self) -> Vec<usize> {
        let reps = self.adaptation.representations();
        if self.adaptation.track_type() != TrackType::Video {
            return (0..reps.len()).collect();
        }
        let passing: Vec<usize> = reps
            .iter()
            .enumerate()
            .filter(|(_, r)| r.width.is_none_or(|w| w <= self.limit_width))
            .map(|(i, _)| i)
            .collect();
        if passing.is_empty() {
            (0..reps.len()).collect()
        } else {
            passing
        }
    }

    fn finish(&mut self, index: usize, reason: SwitchReason) -> Choice {
        let changed = self.current != Some(index);
        self.current = Some(index);
        Choice {
            index,
            reason,
            changed,
        }
    }

    /// Run one selection tick against the latest inputs.
    pub fn choose(&mut self, now: Instant) -> Choice {
        let reps = self.adaptation.representations();

        // Image tracks have no adaptation policy: always the lowest bitrate.
        if self.adaptation.track_type() == TrackType::Image {
            let reason = if self.current.is_none() {
                SwitchReason::Initial
            } else {
                SwitchReason::AlreadyOptimal
            };
            return self.finish(0, reason);
        }

        if self.manual_bitrate > 0 {
            let index = reps
                .iter()
                .rposition(|r| r.bitrate <= self.manual_bitrate)
                .unwrap_or(0);
            return self.finish(index, SwitchReason::ManualOverride);
        }

        let filtered = self.filtered_indices();
        let lowest = filtered[0];

        let stalled_long = self
            .stalled_since
            .is_some_and(|t| now.duration_since(t) >= self.opts.stall_fallback_after);
        if stalled_long {
            tracing::debug!(
                track = %self.adaptation.track_type(),
                "chooser: prolonged stall, forcing lowest representation"
            );
            return self.finish(lowest, SwitchReason::StallFallback);
        }

        let Some(estimate) = self.estimator.estimate_bps(true) else {
            return match self.current {
                Some(index) => self.finish(index, SwitchReason::NoEstimate),
                None => self.finish(lowest, SwitchReason::Initial),
            };
        };

        let cap = (estimate as f64 * self.opts.safety_factor)
            .min(self.max_bitrate as f64)
            .min(self.throttle_bitrate as f64);

        let candidate = filtered
            .iter()
            .copied()
            .filter(|&i| reps[i].bitrate as f64 <= cap)
            .max_by_key(|&i| reps[i].bitrate)
            .unwrap_or(lowest);

        tracing::trace!(
            track = %self.adaptation.track_type(),
            estimate,
            cap,
            candidate_bitrate = reps[candidate].bitrate,
            "chooser: tick"
        );

        let Some(current) = self.current.filter(|c| filtered.contains(c)) else {
            // First tick, or the current selection no longer passes the
            // filters; take the candidate without hysteresis.
            let reason = if self.current.is_none() {
                SwitchReason::Initial
            } else if reps[candidate].bitrate
                < self.current.map_or(0, |c| reps[c].bitrate)
            {
                SwitchReason::DownSwitch
            } else {
                SwitchReason::UpSwitch
            };
            return self.finish(candidate, reason);
        };

        let current_bw = reps[current].bitrate as f64;
        let candidate_bw = reps[candidate].bitrate as f64;

        if candidate_bw < current_bw {
            if cap < current_bw * self.opts.down_hysteresis_ratio {
                return self.finish(candidate, SwitchReason::DownSwitch);
            }
            return self.finish(current, SwitchReason::AlreadyOptimal);
        }
        if candidate_bw > current_bw {
            if cap >= candidate_bw * self.opts.up_hysteresis_ratio {
                return self.finish(candidate, SwitchReason::UpSwitch);
            }
            return self.finish(current, SwitchReason::AlreadyOptimal);
        }

        self.finish(current, SwitchReason::AlreadyOptimal)
    }
}
