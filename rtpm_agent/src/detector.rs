//! Sustained-breach detection: only `period` consecutive samples at or above the
//! threshold fire, so short spikes never produce a report.

use crate::types::Sample;

pub const DEFAULT_MAX_CPU_USAGE: u32 = 50;
pub const DEFAULT_PERIOD: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreachState {
    #[default]
    Normal,
    Counting {
        hits: u32,
    },
}

#[derive(Debug, Clone)]
pub struct BreachDetector {
    threshold: f32,
    period: u32,
    state: BreachState,
}

impl BreachDetector {
    /// A `period` of 0 behaves like 1.
    pub fn new(max_cpu_usage: u32, period: u32) -> Self {
        Self {
            threshold: max_cpu_usage as f32,
            period: period.max(1),
            state: BreachState::Normal,
        }
    }

    pub fn state(&self) -> BreachState {
        self.state
    }

    pub fn hits(&self) -> u32 {
        match self.state {
            BreachState::Normal => 0,
            BreachState::Counting { hits } => hits,
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Feed one sample; returns true exactly on the tick the breach fires.
    pub fn observe(&mut self, sample: &Sample) -> bool {
        if !sample.breaches(self.threshold) {
            self.state = BreachState::Normal;
            return false;
        }
        let hits = self.hits() + 1;
        if hits >= self.period {
            self.state = BreachState::Normal;
            true
        } else {
            self.state = BreachState::Counting { hits };
            false
        }
    }
}

impl Default for BreachDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CPU_USAGE, DEFAULT_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn samples(values: &[f32]) -> Vec<Sample> {
        let now = Utc::now();
        values.iter().map(|&v| Sample::new(v, now)).collect()
    }

    // 1-based tick indices at which the detector fired.
    fn fire_ticks(det: &mut BreachDetector, seq: &[Sample]) -> Vec<usize> {
        seq.iter()
            .enumerate()
            .filter_map(|(i, s)| det.observe(s).then_some(i + 1))
            .collect()
    }

    #[test]
    fn fires_once_on_the_period_th_consecutive_tick() {
        let mut det = BreachDetector::new(50, 5);
        let seq = samples(&[80.0; 5]);
        assert_eq!(fire_ticks(&mut det, &seq), vec![5]);
        assert_eq!(det.hits(), 0);
        assert_eq!(det.state(), BreachState::Normal);
    }

    #[test]
    fn dip_before_period_resets_and_never_fires() {
        let mut det = BreachDetector::new(50, 4);
        for s in samples(&[90.0, 90.0, 90.0]) {
            assert!(!det.observe(&s));
        }
        assert_eq!(det.hits(), 3);
        assert!(!det.observe(&samples(&[10.0])[0]));
        assert_eq!(det.hits(), 0);
        assert_eq!(det.state(), BreachState::Normal);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut det = BreachDetector::new(50, 2);
        assert_eq!(fire_ticks(&mut det, &samples(&[50.0, 50.0])), vec![2]);
    }

    #[test]
    fn dip_in_the_middle_restarts_the_window() {
        let mut det = BreachDetector::new(50, 3);
        let seq = samples(&[60.0, 55.0, 40.0, 80.0, 80.0, 80.0]);
        assert_eq!(fire_ticks(&mut det, &seq), vec![6]);
        assert_eq!(det.hits(), 0);
    }

    #[test]
    fn mixed_sequence_fires_after_each_full_window() {
        // ticks 1-3 already form a full window; the dip at 4 restarts counting.
        let mut det = BreachDetector::new(50, 3);
        let seq = samples(&[60.0, 55.0, 70.0, 40.0, 80.0, 80.0, 80.0]);
        assert_eq!(fire_ticks(&mut det, &seq), vec![3, 7]);
        assert_eq!(det.hits(), 0);
    }

    #[test]
    fn sustained_overload_fires_every_period() {
        let mut det = BreachDetector::new(50, 3);
        let seq = samples(&[99.0; 9]);
        assert_eq!(fire_ticks(&mut det, &seq), vec![3, 6, 9]);
    }

    #[test]
    fn unavailable_sample_counts_as_below_threshold() {
        let mut det = BreachDetector::new(0, 2);
        let now = Utc::now();
        assert!(!det.observe(&Sample::new(1.0, now)));
        assert!(!det.observe(&Sample::unavailable(now)));
        assert_eq!(det.hits(), 0);
    }

    #[test]
    fn fresh_detectors_agree_on_the_same_sequence() {
        let seq = samples(&[70.0, 70.0, 20.0, 70.0, 70.0, 70.0, 70.0, 70.0, 10.0, 90.0]);
        let a = fire_ticks(&mut BreachDetector::new(50, 2), &seq);
        let b = fire_ticks(&mut BreachDetector::new(50, 2), &seq);
        assert_eq!(a, b);
        assert_eq!(a, vec![2, 5, 7]);
    }

    #[test]
    fn zero_period_fires_on_every_breach() {
        let mut det = BreachDetector::new(50, 0);
        assert_eq!(det.period(), 1);
        assert_eq!(fire_ticks(&mut det, &samples(&[60.0, 10.0, 60.0])), vec![1, 3]);
    }

    #[test]
    fn defaults_match_documented_values() {
        let det = BreachDetector::default();
        assert_eq!(det.period(), 60);
        assert!((det.threshold - 50.0).abs() < f32::EPSILON);
    }
}
