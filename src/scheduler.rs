/// Executes one full rendering pass (sampling followed by display) for the
/// given 1-based pass index.
pub trait PassExecutor {
    fn execute_pass(&mut self, render_pass: u32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Drives the pass loop of a convergence run. One `advance` call corresponds
/// to one display-refresh opportunity; the caller keeps scheduling ticks as
/// long as `advance` returns true.
pub struct RenderScheduler {
    state: SchedulerState,
    render_pass: u32,
}

impl RenderScheduler {
    pub fn new() -> RenderScheduler {
        RenderScheduler {
            state: SchedulerState::Idle,
            render_pass: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn render_pass(&self) -> u32 {
        self.render_pass
    }

    /// Resets convergence progress. An in-flight pass is never aborted; a
    /// restart while Running only zeroes the counter and takes effect at the
    /// next pass boundary. Returns true if the loop was Idle and a first
    /// tick must now be scheduled.
    pub fn restart(&mut self) -> bool {
        self.render_pass = 0;
        match self.state {
            SchedulerState::Running => false,
            SchedulerState::Idle => {
                self.state = SchedulerState::Running;
                true
            }
        }
    }

    /// One scheduling tick: executes the next pass if the target sample
    /// count has not been reached, retiring to Idle once it has. Returns
    /// true if another tick should be scheduled.
    pub fn advance(&mut self, num_samples: u32, executor: &mut impl PassExecutor) -> bool {
        if self.state != SchedulerState::Running {
            return false;
        }
        if self.render_pass >= num_samples {
            self.state = SchedulerState::Idle;
            return false;
        }
        self.render_pass += 1;
        executor.execute_pass(self.render_pass);
        if self.render_pass >= num_samples {
            self.state = SchedulerState::Idle;
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        passes: Vec<u32>,
    }

    impl PassExecutor for Recorder {
        fn execute_pass(&mut self, render_pass: u32) {
            self.passes.push(render_pass);
        }
    }

    #[test]
    fn starts_idle_with_zero_progress() {
        let scheduler = RenderScheduler::new();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.render_pass(), 0);
    }

    #[test]
    fn advance_without_restart_is_a_noop() {
        let mut scheduler = RenderScheduler::new();
        let mut recorder = Recorder { passes: vec![] };
        assert!(!scheduler.advance(4, &mut recorder));
        assert!(recorder.passes.is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn runs_to_target_then_retires() {
        let mut scheduler = RenderScheduler::new();
        let mut recorder = Recorder { passes: vec![] };

        assert!(scheduler.restart());
        let mut counters = vec![];
        assert!(scheduler.advance(4, &mut recorder));
        counters.push(scheduler.render_pass());
        assert!(scheduler.advance(4, &mut recorder));
        counters.push(scheduler.render_pass());
        assert!(scheduler.advance(4, &mut recorder));
        counters.push(scheduler.render_pass());
        assert!(!scheduler.advance(4, &mut recorder));
        counters.push(scheduler.render_pass());

        assert_eq!(counters, vec![1, 2, 3, 4]);
        assert_eq!(recorder.passes, vec![1, 2, 3, 4]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        // a fifth tick leaves the counter alone and performs no work
        assert!(!scheduler.advance(4, &mut recorder));
        assert_eq!(scheduler.render_pass(), 4);
        assert_eq!(recorder.passes.len(), 4);
    }

    #[test]
    fn pass_counter_is_strictly_increasing_and_bounded() {
        let mut scheduler = RenderScheduler::new();
        let mut recorder = Recorder { passes: vec![] };
        scheduler.restart();

        let mut previous = 0;
        for _ in 0..10 {
            scheduler.advance(6, &mut recorder);
            let counter = scheduler.render_pass();
            assert!(counter >= previous);
            assert!(counter <= 6);
            previous = counter;
        }
        assert!(recorder.passes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn restart_while_running_resets_progress_only() {
        let mut scheduler = RenderScheduler::new();
        let mut recorder = Recorder { passes: vec![] };
        scheduler.restart();
        scheduler.advance(8, &mut recorder);
        scheduler.advance(8, &mut recorder);
        assert_eq!(scheduler.render_pass(), 2);

        // no new tick needed, the loop is already going
        assert!(!scheduler.restart());
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.render_pass(), 0);

        assert!(scheduler.advance(8, &mut recorder));
        assert_eq!(recorder.passes, vec![1, 2, 1]);
    }

    #[test]
    fn restart_while_idle_schedules_a_first_tick() {
        let mut scheduler = RenderScheduler::new();
        assert!(scheduler.restart());
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.render_pass(), 0);
    }

    #[test]
    fn zero_sample_target_retires_without_work() {
        let mut scheduler = RenderScheduler::new();
        let mut recorder = Recorder { passes: vec![] };
        scheduler.restart();
        assert!(!scheduler.advance(0, &mut recorder));
        assert!(recorder.passes.is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
