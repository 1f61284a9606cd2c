use std::sync::atomic::{AtomicI64, Ordering};

/// Run-scoped surrogate key allocator.
///
/// Keys start at zero for every run and strictly increase in allocation
/// order. They are labels, not business keys, and are not stable across runs.
#[derive(Debug, Default)]
pub struct SurrogateKeys {
    next: AtomicI64,
}

impl SurrogateKeys {
    pub fn new() -> Self {
        SurrogateKeys::default()
    }

    pub fn next_key(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of keys handed out so far
    pub fn issued(&self) -> i64 {
        self.next.load(Ordering::Relaxed)
    }
}
