/// Limits and seeds for one environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub seed: Option<u64>,
    pub gc_threshold: usize,
    pub heap_limit: Option<usize>,
    pub max_frames: usize,
    pub max_pins: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            gc_threshold: 256,
            heap_limit: None,
            max_frames: 32,
            max_pins: 32,
        }
    }
}

impl Config {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Allocations between automatic collections.
    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = threshold;
        self
    }

    /// Maximum number of live heap objects.
    pub fn with_heap_limit(mut self, limit: usize) -> Self {
        self.heap_limit = Some(limit);
        self
    }

    pub fn with_max_frames(mut self, frames: usize) -> Self {
        self.max_frames = frames;
        self
    }

    /// Maximum pins held by a single frame.
    pub fn with_max_pins(mut self, pins: usize) -> Self {
        self.max_pins = pins;
        self
    }
}
