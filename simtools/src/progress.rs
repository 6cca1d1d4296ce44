use std::fmt::Debug;

/// Receives notifications about long-running, sample- or probe-wise work.
pub trait ProgressNotifier: Debug + Send + Sync {
    fn set_iter_num(&self, num_iter: u64);

    fn inc_iter(&self);
}

impl<T: ProgressNotifier> ProgressNotifier for &T {
    fn set_iter_num(&self, num_iter: u64) {
        T::set_iter_num(self, num_iter)
    }

    fn inc_iter(&self) {
        T::inc_iter(self)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DummyProgressNotifier;

impl ProgressNotifier for DummyProgressNotifier {
    fn set_iter_num(&self, _num_iter: u64) {
        // do nothing
    }

    fn inc_iter(&self) {
        // do nothing
    }
}
