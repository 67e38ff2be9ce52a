///
/// World construction options.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    min_capacity: usize,
}

impl Config {
    pub const DEFAULT_MIN_CAPACITY: usize = 8;

    pub fn new() -> Self {
        Self {
            min_capacity: Self::DEFAULT_MIN_CAPACITY,
        }
    }

    /// Row capacity of a table's first allocation.
    pub fn with_min_capacity(mut self, min_capacity: usize) -> Self {
        self.min_capacity = min_capacity.max(1);
        self
    }

    #[inline]
    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
