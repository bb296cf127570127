/// Samples re-encoded between two cancellation checks.
const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 1024;

/// Tuning knobs of a vertical chunk merge.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub(crate) cancel_check_interval: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

impl MergeOptions {
    /// Number of samples re-encoded during overlap resolution between two
    /// checks of the cancellation token. Values below one are treated as one.
    pub fn cancel_check_interval(self, cancel_check_interval: usize) -> Self {
        MergeOptions {
            cancel_check_interval: cancel_check_interval.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_check_interval_is_at_least_one() {
        assert_eq!(MergeOptions::default().cancel_check_interval, 1024);
        assert_eq!(
            MergeOptions::default()
                .cancel_check_interval(0)
                .cancel_check_interval,
            1
        );
    }
}
