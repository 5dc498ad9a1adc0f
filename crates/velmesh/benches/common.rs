use std::time::Duration;

use criterion::{Criterion, Throughput};

/// Mesh builds are slow; keep sampling short so the suite finishes in minutes.
pub fn default_criterion() -> Criterion {
    Criterion::default()
        .sample_size(10)
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3))
        .configure_from_args()
}

/// Throughput in processed points or samples.
pub fn elements_throughput(count: usize) -> Throughput {
    Throughput::Elements(count.max(1) as u64)
}
