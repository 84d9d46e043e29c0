use std::convert::Infallible;

use log::trace;

/// Caches the output for the last input and recomputes only when a new input
/// compares unequal to it.
#[derive(Clone, Debug)]
pub struct Memo<I, O> {
    entry: Option<(I, O)>,
    recomputations: u64,
}

impl<I, O> Default for Memo<I, O> {
    fn default() -> Self {
        Self { entry: None, recomputations: 0 }
    }
}

impl<I: PartialEq, O> Memo<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, input: I, compute: impl FnOnce(&I) -> O) -> &O {
        let infallible = |input: &I| Ok::<_, Infallible>(compute(input));
        match self.get_or_try_compute(input, infallible) {
            Ok(output) => output,
            Err(never) => match never {},
        }
    }

    /// Like [`Memo::get_or_compute`], but a failed computation leaves the
    /// previous entry in place.
    pub fn get_or_try_compute<E>(
        &mut self,
        input: I,
        compute: impl FnOnce(&I) -> Result<O, E>,
    ) -> Result<&O, E> {
        let entry = match self.entry.take() {
            Some((previous, output)) if previous == input => (previous, output),
            previous => match compute(&input) {
                Ok(output) => {
                    self.recomputations += 1;
                    (input, output)
                },
                Err(err) => {
                    self.entry = previous;
                    return Err(err);
                },
            },
        };

        Ok(&self.entry.insert(entry).1)
    }

    pub fn get(&self) -> Option<&O> {
        self.entry.as_ref().map(|(_, output)| output)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// How many times an output has been computed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

/// Single-slot frame scheduler. A new snapshot replaces any pending one, so a
/// tick only ever sees the latest state.
#[derive(Clone, Debug)]
pub struct FrameScheduler<S> {
    pending: Option<S>,
}

impl<S> Default for FrameScheduler<S> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<S> FrameScheduler<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `snapshot` as the pending state. Returns `true` when nothing was
    /// pending, meaning the host should request a tick.
    pub fn invalidate(&mut self, snapshot: S) -> bool {
        let superseded = self.pending.replace(snapshot).is_some();
        if superseded {
            trace!("pending frame superseded before it was drawn");
        }
        !superseded
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&S> {
        self.pending.as_ref()
    }

    /// Drains the latest snapshot, if any.
    pub fn tick(&mut self) -> Option<S> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_input_skips_recomputation() {
        let mut memo = Memo::new();
        let sum = |&(a, b): &(i32, i32)| a + b;

        assert_eq!(*memo.get_or_compute((1, 2), sum), 3);
        assert_eq!(*memo.get_or_compute((1, 2), sum), 3);
        assert_eq!(memo.recomputations(), 1);

        assert_eq!(*memo.get_or_compute((2, 2), sum), 4);
        assert_eq!(memo.recomputations(), 2);
    }

    #[test]
    fn failed_computation_keeps_previous_output() {
        let mut memo = Memo::new();
        memo.get_or_compute(1, |n| n * 10);

        let result = memo.get_or_try_compute(2, |_| Err("boom"));

        assert_eq!(result, Err("boom"));
        assert_eq!(memo.get(), Some(&10));
    }

    #[test]
    fn restored_entry_still_hits_after_a_failure() {
        let mut memo = Memo::new();
        memo.get_or_compute(1, |n| n * 10);
        let _ = memo.get_or_try_compute(2, |_| Err::<i32, _>("boom"));

        let output = memo.get_or_try_compute(1, |_| Err::<i32, _>("recomputed"));

        assert_eq!(output, Ok(&10));
        assert_eq!(memo.recomputations(), 1);
    }

    #[test]
    fn invalidate_forces_recomputation() {
        let mut memo = Memo::new();
        memo.get_or_compute("a", |s| s.len());
        memo.invalidate();
        memo.get_or_compute("a", |s| s.len());

        assert_eq!(memo.recomputations(), 2);
    }

    #[test]
    fn scheduler_keeps_only_the_latest_snapshot() {
        let mut scheduler = FrameScheduler::new();

        assert!(scheduler.invalidate(1));
        assert!(!scheduler.invalidate(2));
        assert!(!scheduler.invalidate(3));
        assert!(scheduler.is_pending());

        assert_eq!(scheduler.tick(), Some(3));
        assert_eq!(scheduler.tick(), None);
        assert!(!scheduler.is_pending());

        assert!(scheduler.invalidate(4));
    }
}
