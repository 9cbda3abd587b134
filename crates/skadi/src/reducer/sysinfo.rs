use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use skadi_payload::SysinfoSnapshot;

use super::Reducer;

pub const DEFAULT_NETWORK_HISTORY_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkSample {
    pub timestamp: DateTime<Utc>,
    /// bytes per second sent
    pub up: u64,
    /// bytes per second received
    pub down: u64,
}

/// The most recent network samples, oldest first, used to draw a short trend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkHistory {
    samples: VecDeque<NetworkSample>,
    #[serde(skip)]
    cap: usize,
}

impl NetworkHistory {
    /// Create a history holding at most `cap` samples, starting with a single zero sample at `now`.
    /// A `cap` of 0 is raised to 1, since the zero sample always has to fit.
    pub fn new(cap: usize, now: DateTime<Utc>) -> Self {
        if cap == 0 {
            log::warn!("Network history length of 0 requested, keeping one sample");
        }
        let cap = cap.max(1);
        let mut samples = VecDeque::with_capacity(cap);
        samples.push_back(NetworkSample { timestamp: now, up: 0, down: 0 });
        Self { samples, cap }
    }

    /// Append a sample, evicting the oldest one when full.
    /// The timestamp is clamped so that samples stay ordered even if the wall clock jumps backwards.
    pub fn push(&mut self, mut sample: NetworkSample) -> NetworkSample {
        if let Some(last) = self.samples.back() {
            sample.timestamp = sample.timestamp.max(last.timestamp);
        }
        push_capped(&mut self.samples, sample, self.cap);
        sample
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&NetworkSample> {
        self.samples.back()
    }
}

fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    while dq.len() >= cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SysinfoState {
    pub metrics: Option<SysinfoSnapshot>,
    pub network_history: NetworkHistory,
}

#[derive(Debug, Clone)]
pub struct SysinfoReducer {
    state: SysinfoState,
}

impl Default for SysinfoReducer {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_HISTORY_LEN)
    }
}

impl SysinfoReducer {
    pub fn new(network_history_len: usize) -> Self {
        Self::starting_at(network_history_len, Utc::now())
    }

    /// Like [`SysinfoReducer::new`], with the zero baseline sample stamped at `now`.
    pub fn starting_at(network_history_len: usize, now: DateTime<Utc>) -> Self {
        Self { state: SysinfoState { metrics: None, network_history: NetworkHistory::new(network_history_len, now) } }
    }

    pub fn metrics(&self) -> Option<&SysinfoSnapshot> {
        self.state.metrics.as_ref()
    }

    pub fn network_history(&self) -> &NetworkHistory {
        &self.state.network_history
    }

    /// Replace the metrics and record one network sample taken at `now`.
    pub fn apply_frame_at(&mut self, snapshot: &SysinfoSnapshot, now: DateTime<Utc>) -> NetworkSample {
        self.state.metrics = Some(snapshot.clone());
        self.state.network_history.push(NetworkSample { timestamp: now, up: snapshot.network_tx, down: snapshot.network_rx })
    }
}

impl Reducer for SysinfoReducer {
    type Delta = NetworkSample;
    type Frame = SysinfoSnapshot;
    type Snapshot = SysinfoState;

    fn apply_frame(&mut self, snapshot: &SysinfoSnapshot) -> Option<NetworkSample> {
        Some(self.apply_frame_at(snapshot, Utc::now()))
    }

    fn snapshot(&self) -> SysinfoState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn frame(rx: u64, tx: u64) -> SysinfoSnapshot {
        SysinfoSnapshot { network_rx: rx, network_tx: tx, memory_free: 17, ..SysinfoSnapshot::default() }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut reducer = SysinfoReducer::starting_at(DEFAULT_NETWORK_HISTORY_LEN, start());
        for i in 0..100u64 {
            reducer.apply_frame_at(&frame(i, i * 2), start() + Duration::seconds(i as i64));
            assert!(reducer.network_history().len() <= DEFAULT_NETWORK_HISTORY_LEN);
        }
        let history = reducer.network_history();
        assert_eq!(history.len(), 30);
        assert!(history.iter().tuple_windows().all(|(a, b)| a.timestamp <= b.timestamp));
        assert_eq!(history.iter().next().map(|sample| sample.down), Some(70));
        assert_eq!(history.latest(), Some(&NetworkSample { timestamp: start() + Duration::seconds(99), up: 198, down: 99 }));
    }

    #[test]
    fn test_samples_before_the_baseline_are_clamped() {
        let mut reducer = SysinfoReducer::starting_at(DEFAULT_NETWORK_HISTORY_LEN, start());
        let sample = reducer.apply_frame_at(&frame(5, 6), start() - Duration::seconds(30));
        assert_eq!(sample, NetworkSample { timestamp: start(), up: 6, down: 5 });
    }

    #[test]
    fn test_zero_cap_keeps_one_sample() {
        let mut reducer = SysinfoReducer::starting_at(0, start());
        reducer.apply_frame_at(&frame(1, 2), start() + Duration::seconds(1));
        reducer.apply_frame_at(&frame(3, 4), start() + Duration::seconds(2));
        assert_eq!(reducer.network_history().len(), 1);
        assert_eq!(reducer.network_history().latest().map(|sample| sample.down), Some(3));
    }

    #[test]
    fn test_history_starts_with_zero_sample() {
        let reducer = SysinfoReducer::default();
        let history = reducer.network_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().map(|sample| (sample.up, sample.down)), Some((0, 0)));
        assert_eq!(reducer.metrics(), None);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut reducer = SysinfoReducer::new(5);
        let offsets = [10, 20, 5, 30, -100, 40, 40];
        for offset in offsets {
            reducer.apply_frame_at(&frame(1, 1), Utc::now() + Duration::seconds(offset));
        }
        let history = reducer.network_history();
        assert_eq!(history.len(), 5);
        assert!(history.iter().tuple_windows().all(|(a, b)| a.timestamp <= b.timestamp));
    }

    #[test]
    fn test_metrics_replaced_verbatim() {
        let mut reducer = SysinfoReducer::default();
        reducer.apply_frame_at(&frame(1, 2), start());
        let sample = reducer.apply_frame_at(&frame(3, 4), start());
        assert_eq!(sample.up, 4);
        assert_eq!(reducer.metrics(), Some(&frame(3, 4)));
        assert_eq!(reducer.metrics().map(|metrics| metrics.memory_free), Some(17));
    }
}
