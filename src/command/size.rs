//! Serialized-size estimation for admission control.
//!
//! The queue needs to know roughly how large a command will be once it is
//! written out, without paying for building the document. Each string value
//! costs a fixed overhead (quoting, escaping, container bookkeeping) plus its
//! UTF-8 byte length.

/// Smallest per-string overhead ever charged.
///
/// Keeps the estimate strictly increasing when an empty string is added.
pub const MIN_STRING_OVERHEAD: usize = 1;

/// Accumulates the estimated byte footprint of a command.
#[derive(Debug, Clone, Copy)]
pub struct SizeEstimator {
    string_overhead: usize,
    total: usize,
}

impl SizeEstimator {
    pub fn new(string_overhead: usize) -> Self {
        Self {
            string_overhead: string_overhead.max(MIN_STRING_OVERHEAD),
            total: 0,
        }
    }

    pub fn string_overhead(&self) -> usize {
        self.string_overhead
    }

    /// Charge one string value.
    pub fn add(&mut self, value: &str) -> &mut Self {
        self.total = self
            .total
            .saturating_add(self.string_overhead)
            .saturating_add(value.len());
        self
    }

    /// Charge every value of a set or sequence.
    pub fn add_all<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for value in values {
            self.add(value);
        }
        self
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Cost of a single string under the given overhead.
pub fn string_cost(string_overhead: usize, value: &str) -> usize {
    SizeEstimator::new(string_overhead).add(value).total()
}
