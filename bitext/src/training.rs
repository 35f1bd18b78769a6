//! Bookkeeping for a training run that consumes batches from [`crate::BatchIterator`]s.
//!
//! The model, optimizer and checkpoint writing live outside this crate.  What lives here is the
//! state a training loop threads through its epochs: loss accumulators, step counters, the loss
//! history and which epoch did best on validation.
use serde::Serialize;
use tracing::*;

/// Average losses for one finished epoch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub train_batches: usize,
    pub val_batches: usize,

    /// Whether this epoch had the lowest validation loss so far
    pub is_best: bool,
}

#[derive(Clone, Debug, Default)]
struct EpochAccumulator {
    train_loss: f64,
    val_loss: f64,
    train_batches: usize,
    val_batches: usize,
}

impl EpochAccumulator {
    fn mean(sum: f64, batches: usize) -> f64 {
        if batches == 0 {
            0.0
        } else {
            sum / batches as f64
        }
    }
}

/// State of a training run, passed explicitly through the training loop.
///
/// Loss for each step is divided by the number of rows in that step's batch before it is
/// accumulated.  The epoch loss is the mean of those per-row losses over the epoch's batches.
#[derive(Clone, Debug)]
pub struct TrainingContext {
    num_epochs: usize,
    checkpoint_at: Vec<usize>,

    epoch: usize,
    epoch_open: bool,
    current: EpochAccumulator,

    train_steps: u64,
    val_steps: u64,

    history: Vec<EpochSummary>,
    best: Option<(usize, f64)>,
}

impl TrainingContext {
    /// `checkpoint_at` lists the (zero-based) epochs after which a checkpoint should be saved, on
    /// top of whichever epoch turns out best.
    pub fn new(num_epochs: usize, checkpoint_at: impl IntoIterator<Item = usize>) -> Self {
        Self {
            num_epochs,
            checkpoint_at: checkpoint_at.into_iter().collect(),
            epoch: 0,
            epoch_open: false,
            current: EpochAccumulator::default(),
            train_steps: 0,
            val_steps: 0,
            history: Vec::new(),
            best: None,
        }
    }

    pub fn num_epochs(&self) -> usize {
        self.num_epochs
    }

    /// The epoch currently being run, or the number of epochs once all of them are done
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn is_finished(&self) -> bool {
        self.epoch >= self.num_epochs
    }

    /// Total training steps over the whole run, for use as a global step counter in metrics
    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    pub fn val_steps(&self) -> u64 {
        self.val_steps
    }

    pub fn history(&self) -> &[EpochSummary] {
        &self.history
    }

    /// The epoch with the lowest validation loss so far, and that loss
    pub fn best(&self) -> Option<(usize, f64)> {
        self.best
    }

    /// Whether [`Self::begin_epoch`] has been called since the last [`Self::end_epoch`]
    pub fn is_epoch_open(&self) -> bool {
        self.epoch_open
    }

    /// Start the current epoch with empty loss accumulators, and return its number.
    ///
    /// Steps recorded since the previous [`Self::end_epoch`] without an epoch having been begun
    /// (a sanity check pass before training, say) still count towards the global step counters but
    /// not towards this epoch's losses.  Calling this on an epoch that is already open restarts it.
    pub fn begin_epoch(&mut self) -> usize {
        if self.current.train_batches + self.current.val_batches > 0 {
            debug!(
                epoch = self.epoch,
                train_batches = self.current.train_batches,
                val_batches = self.current.val_batches,
                "Discarding losses recorded before the epoch began"
            );
        }

        self.current = EpochAccumulator::default();
        self.epoch_open = true;

        self.epoch
    }

    pub fn record_train_step(&mut self, loss: f64, rows: usize) {
        self.current.train_loss += loss / rows.max(1) as f64;
        self.current.train_batches += 1;
        self.train_steps += 1;

        trace!(
            epoch = self.epoch,
            step = self.train_steps,
            loss,
            rows,
            "Train step"
        );
    }

    pub fn record_val_step(&mut self, loss: f64, rows: usize) {
        self.current.val_loss += loss / rows.max(1) as f64;
        self.current.val_batches += 1;
        self.val_steps += 1;

        trace!(
            epoch = self.epoch,
            step = self.val_steps,
            loss,
            rows,
            "Validation step"
        );
    }

    /// Close out the current epoch and move on to the next one.
    pub fn end_epoch(&mut self) -> EpochSummary {
        let current = std::mem::take(&mut self.current);
        let train_loss = EpochAccumulator::mean(current.train_loss, current.train_batches);
        let val_loss = EpochAccumulator::mean(current.val_loss, current.val_batches);

        let is_best = self.best.map_or(true, |(_, best_loss)| val_loss < best_loss);
        if is_best {
            self.best = Some((self.epoch, val_loss));
        }

        let summary = EpochSummary {
            epoch: self.epoch,
            train_loss,
            val_loss,
            train_batches: current.train_batches,
            val_batches: current.val_batches,
            is_best,
        };

        info!(
            epoch = summary.epoch,
            num_epochs = self.num_epochs,
            train_loss,
            val_loss,
            is_best,
            "Epoch completed"
        );

        self.history.push(summary.clone());
        self.epoch += 1;
        self.epoch_open = false;

        summary
    }

    /// Whether a periodic checkpoint is due after `epoch`
    pub fn should_checkpoint(&self, epoch: usize) -> bool {
        self.checkpoint_at.contains(&epoch)
    }

    /// Whether `epoch` has the lowest validation loss of the epochs finished so far, which is when
    /// a "best model" checkpoint is worth saving
    pub fn is_best_epoch(&self, epoch: usize) -> bool {
        self.best.is_some_and(|(best_epoch, _)| best_epoch == epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_loss_is_mean_of_per_row_losses() {
        let mut context = TrainingContext::new(2, []);

        context.record_train_step(8.0, 8);
        context.record_train_step(12.0, 4);
        context.record_val_step(6.0, 2);

        let summary = context.end_epoch();
        assert_eq!(0, summary.epoch);
        assert_eq!(2.0, summary.train_loss);
        assert_eq!(3.0, summary.val_loss);
        assert_eq!(2, summary.train_batches);
        assert_eq!(1, summary.val_batches);
        assert!(summary.is_best);

        assert_eq!(1, context.epoch());
        assert_eq!(2, context.train_steps());
        assert_eq!(1, context.val_steps());
    }

    #[test]
    fn tracks_the_best_validation_epoch() {
        let mut context = TrainingContext::new(3, []);

        for val_loss in [5.0, 3.0, 4.0] {
            context.record_train_step(1.0, 1);
            context.record_val_step(val_loss, 1);
            context.end_epoch();
        }

        assert_eq!(Some((1, 3.0)), context.best());
        assert_eq!(
            vec![true, true, false],
            context
                .history()
                .iter()
                .map(|summary| summary.is_best)
                .collect::<Vec<_>>()
        );
        assert!(context.is_finished());
    }

    #[test]
    fn steps_accumulate_across_epochs_but_losses_reset() {
        let mut context = TrainingContext::new(2, [0]);

        context.record_train_step(4.0, 2);
        context.end_epoch();
        context.record_train_step(10.0, 5);
        let summary = context.end_epoch();

        assert_eq!(2.0, summary.train_loss);
        assert_eq!(0.0, summary.val_loss);
        assert_eq!(2, context.train_steps());
        assert!(context.should_checkpoint(0));
        assert!(!context.should_checkpoint(1));
    }

    #[test]
    fn steps_before_begin_epoch_do_not_count_towards_its_loss() {
        let mut context = TrainingContext::new(2, []);
        assert!(!context.is_epoch_open());

        // A sanity check pass before the first epoch
        context.record_val_step(100.0, 1);

        assert_eq!(0, context.begin_epoch());
        assert!(context.is_epoch_open());
        context.record_train_step(6.0, 3);
        context.record_val_step(4.0, 2);
        let summary = context.end_epoch();

        assert!(!context.is_epoch_open());
        assert_eq!(2.0, summary.train_loss);
        assert_eq!(2.0, summary.val_loss);
        assert_eq!(1, summary.val_batches);
        assert_eq!(2, context.val_steps());

        assert_eq!(1, context.begin_epoch());
    }

    #[test]
    fn best_epoch_decision() {
        let mut context = TrainingContext::new(3, []);
        assert!(!context.is_best_epoch(0));

        let mut saved = Vec::new();
        for val_loss in [5.0, 3.0, 4.0] {
            let epoch = context.begin_epoch();
            context.record_val_step(val_loss, 1);
            context.end_epoch();

            if context.is_best_epoch(epoch) {
                saved.push(epoch);
            }
        }

        assert_eq!(vec![0, 1], saved);
        assert!(context.is_best_epoch(1));
        assert!(!context.is_best_epoch(0));
        assert!(!context.is_best_epoch(2));
    }
}
