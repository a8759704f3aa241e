/// Drops the learning rate by a fixed factor when the validation loss stops
/// improving.
///
/// After each epoch, `step` is fed the validation loss. A loss below the best
/// seen so far resets the patience counter; otherwise the counter grows, and
/// once `patience` epochs pass without improvement the rate is multiplied by
/// `factor`. Every reduction starts a cooldown during which no epochs are
/// counted against patience. The rate never falls below `min_lr`.
pub struct ReduceLrOnPlateau {
    lr: f64,
    factor: f64,
    patience: usize,
    cooldown: usize,
    min_lr: f64,
    best: f64,
    wait: usize,
    cooldown_left: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(lr: f64, factor: f64, patience: usize, cooldown: usize) -> Self {
        ReduceLrOnPlateau {
            lr,
            factor,
            patience,
            cooldown,
            min_lr: 0.0,
            best: f64::INFINITY,
            wait: 0,
            cooldown_left: 0,
        }
    }

    pub fn with_min_lr(mut self, min_lr: f64) -> Self {
        self.min_lr = min_lr;
        self
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Records one epoch's validation loss and returns the rate to use for
    /// the next epoch.
    pub fn step(&mut self, val_loss: f64) -> f64 {
        if self.cooldown_left > 0 {
            self.cooldown_left -= 1;
            self.wait = 0;
        }

        if val_loss < self.best {
            self.best = val_loss;
            self.wait = 0;
        } else if self.cooldown_left == 0 {
            self.wait += 1;
            if self.wait >= self.patience {
                self.lr = (self.lr * self.factor).max(self.min_lr);
                self.cooldown_left = self.cooldown;
                self.wait = 0;
            }
        }

        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn improvement_keeps_the_rate() {
        let mut sched = ReduceLrOnPlateau::new(0.1, 0.1, 2, 0);

        assert_eq!(sched.step(1.0), 0.1);
        assert_eq!(sched.step(0.9), 0.1);
        assert_eq!(sched.step(0.8), 0.1);
    }

    #[test]
    fn stall_drops_the_rate_after_patience() {
        let mut sched = ReduceLrOnPlateau::new(0.1, 0.1, 2, 0);

        sched.step(1.0);
        // first stalled epoch is within patience
        let lr = sched.step(1.0);
        assert_eq!(lr, 0.1);
        // second stalled epoch reaches patience 2
        let lr = sched.step(1.0);
        assert!((lr - 0.01).abs() < 1e-12);
    }

    #[test]
    fn improvement_resets_patience() {
        let mut sched = ReduceLrOnPlateau::new(0.1, 0.1, 2, 0);

        sched.step(1.0);
        sched.step(1.0);
        // improvement one epoch before the drop would land
        sched.step(0.5);
        // a single stall afterwards is within patience again
        let lr = sched.step(0.6);

        assert_eq!(lr, 0.1);
    }

    #[test]
    fn cooldown_suppresses_counting() {
        let mut sched = ReduceLrOnPlateau::new(0.1, 0.1, 1, 3);

        sched.step(1.0);
        // patience 1: first stalled epoch drops the rate and starts cooldown
        let lr = sched.step(1.0);
        assert!((lr - 0.01).abs() < 1e-12);

        // stalls while the cooldown runs must not trigger another drop
        let lr = sched.step(1.0);
        assert!((lr - 0.01).abs() < 1e-12);
        let lr = sched.step(1.0);
        assert!((lr - 0.01).abs() < 1e-12);

        // cooldown over, the next stall counts again
        let lr = sched.step(1.0);
        assert!((lr - 0.001).abs() < 1e-12);
    }

    #[test]
    fn rate_never_falls_below_the_floor() {
        let mut sched = ReduceLrOnPlateau::new(0.1, 0.1, 0, 0).with_min_lr(0.01);

        sched.step(1.0);
        sched.step(1.0);
        sched.step(1.0);
        let lr = sched.step(1.0);

        assert_eq!(lr, 0.01);
    }
}
