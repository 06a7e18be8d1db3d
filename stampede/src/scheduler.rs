//! Ramp profiles as a function of elapsed time.
use stampede_core::{ConfigError, RampPolicy, RunConfig, Stage};
use std::time::Duration;

/// A validated, ordered stage list starting from a fixed concurrency level.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    start: u32,
    stages: Vec<Stage>,
    policy: RampPolicy,
    total: Duration,
}

impl Schedule {
    pub fn new(start: u32, stages: &[Stage], policy: RampPolicy) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::NoStages);
        }

        Ok(Self {
            start,
            stages: stages.to_vec(),
            policy,
            total: stages.iter().map(|s| s.duration).sum(),
        })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        Self::new(config.start_vus, &config.stages, config.ramp)
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Index of the stage active at `elapsed`, or `None` once the schedule is over.
    /// Zero-length stages are never active.
    pub fn stage_at(&self, elapsed: Duration) -> Option<usize> {
        let mut end = Duration::ZERO;
        for (idx, stage) in self.stages.iter().enumerate() {
            end += stage.duration;
            if elapsed < end {
                return Some(idx);
            }
        }
        None
    }

    /// Target concurrency at `elapsed`.
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        let mut stage_start = Duration::ZERO;
        let mut prev = self.start;

        for stage in &self.stages {
            // NOTE: A zero-length stage never satisfies this, so its target is jumped to.
            if elapsed < stage_start + stage.duration {
                return match self.policy {
                    RampPolicy::Step => stage.target,
                    RampPolicy::Linear => {
                        let progress = (elapsed - stage_start).as_secs_f64()
                            / stage.duration.as_secs_f64();
                        interpolate(prev, stage.target, progress)
                    }
                };
            }
            stage_start += stage.duration;
            prev = stage.target;
        }

        prev
    }
}

fn interpolate(from: u32, to: u32, progress: f64) -> u32 {
    let diff = to as f64 - from as f64;
    let value = (from as f64 + diff * progress.clamp(0., 1.)).round();
    value.clamp(from.min(to) as f64, from.max(to) as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn stage(s: u64, target: u32) -> Stage {
        Stage::new(secs(s), target)
    }

    #[test]
    fn rejects_empty_schedule() {
        assert!(matches!(
            Schedule::new(0, &[], RampPolicy::Linear),
            Err(ConfigError::NoStages)
        ));
    }

    #[test]
    fn linear_ramp() {
        let schedule = Schedule::new(0, &[stage(10, 10), stage(10, 0)], RampPolicy::Linear).unwrap();

        assert_eq!(schedule.total_duration(), secs(20));
        assert_eq!(schedule.target_at(Duration::ZERO), 0);
        assert_eq!(schedule.target_at(secs(5)), 5);
        assert_eq!(schedule.target_at(secs(10)), 10);
        assert_eq!(schedule.target_at(secs(15)), 5);
        assert_eq!(schedule.target_at(secs(20)), 0);
        assert_eq!(schedule.target_at(secs(60)), 0);
    }

    #[test]
    fn linear_ramp_rounds_to_nearest() {
        let schedule = Schedule::new(0, &[stage(4, 1)], RampPolicy::Linear).unwrap();
        assert_eq!(schedule.target_at(Duration::from_millis(1_900)), 0);
        assert_eq!(schedule.target_at(Duration::from_millis(2_100)), 1);
    }

    #[test]
    fn stays_within_stage_bounds() {
        let stages = [stage(30, 10), stage(60, 50), stage(120, 100), stage(60, 100), stage(30, 0)];
        let schedule = Schedule::new(0, &stages, RampPolicy::Linear).unwrap();

        let mut prev_level = 0;
        let mut elapsed = Duration::ZERO;
        while elapsed < schedule.total_duration() {
            let idx = schedule.stage_at(elapsed).unwrap();
            let target = stages[idx].target;
            let n = schedule.target_at(elapsed);
            assert!(n >= prev_level.min(target) && n <= prev_level.max(target));

            elapsed += Duration::from_millis(100);
            if schedule.stage_at(elapsed) != Some(idx) {
                prev_level = target;
            }
        }
    }

    #[test]
    fn zero_length_stage_jumps() {
        let schedule =
            Schedule::new(0, &[stage(0, 20), stage(10, 20)], RampPolicy::Linear).unwrap();
        assert_eq!(schedule.target_at(Duration::ZERO), 20);
        assert_eq!(schedule.target_at(secs(5)), 20);
        assert_eq!(schedule.stage_at(Duration::ZERO), Some(1));
    }

    #[test]
    fn step_policy() {
        let schedule = Schedule::new(5, &[stage(10, 5), stage(10, 50)], RampPolicy::Step).unwrap();
        assert_eq!(schedule.target_at(Duration::ZERO), 5);
        assert_eq!(schedule.target_at(secs(9)), 5);
        assert_eq!(schedule.target_at(secs(10)), 50);
        assert_eq!(schedule.target_at(secs(25)), 50);
    }

    #[test]
    fn starts_from_configured_level() {
        let schedule = Schedule::new(10, &[stage(10, 0)], RampPolicy::Linear).unwrap();
        assert_eq!(schedule.target_at(Duration::ZERO), 10);
        assert_eq!(schedule.target_at(secs(5)), 5);
    }

    #[test]
    fn stage_index() {
        let schedule = Schedule::new(0, &[stage(5, 10), stage(5, 0)], RampPolicy::Linear).unwrap();
        assert_eq!(schedule.stage_at(Duration::ZERO), Some(0));
        assert_eq!(schedule.stage_at(Duration::from_millis(4_999)), Some(0));
        assert_eq!(schedule.stage_at(secs(5)), Some(1));
        assert_eq!(schedule.stage_at(secs(10)), None);
    }
}
