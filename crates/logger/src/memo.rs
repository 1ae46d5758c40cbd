use std::sync::OnceLock;

/// A slot that is either uncomputed or holds the value computed on first use.
pub(crate) struct Memo<T> {
    slot: OnceLock<T>,
}

impl<T> Memo<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Returns the cached value, running `compute` only on a miss.
    pub(crate) fn get_or_compute(&self, compute: impl FnOnce() -> T) -> &T {
        self.slot.get_or_init(compute)
    }

    pub(crate) fn is_computed(&self) -> bool {
        self.slot.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_computes_once() {
        let memo = Memo::new();
        let runs = Cell::new(0);

        assert!(!memo.is_computed());
        let first = memo.get_or_compute(|| {
            runs.set(runs.get() + 1);
            String::from("value")
        });
        assert_eq!(first, "value");

        let second = memo.get_or_compute(|| {
            runs.set(runs.get() + 1);
            String::from("other")
        });
        assert_eq!(second, "value");
        assert_eq!(runs.get(), 1);
        assert!(memo.is_computed());
    }
}
