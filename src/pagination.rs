/// Effective page size: `requested` capped at `configured_max`, never below 1
pub fn clamp(requested: usize, configured_max: usize) -> usize {
    requested.min(configured_max).max(1)
}

/// Caps listing page sizes at the configured maximum
#[derive(Debug, Clone, Copy)]
pub struct QueryLimiter {
    max: usize,
}

impl QueryLimiter {
    pub fn new(max: usize) -> Self {
        Self { max: max.max(1) }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn clamp(&self, requested: usize) -> usize {
        clamp(requested, self.max)
    }
}
