//! Order-preserving fan-out over scoped threads.
//!
//! Validation inputs are immutable and independent, so they are split into
//! contiguous chunks, processed on scoped workers, and concatenated back in
//! input order. Output never depends on completion order.

use std::num::NonZeroUsize;
use std::thread;

/// Worker count: available parallelism, at least one.
pub fn worker_count() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Apply `f` to every item on up to [`worker_count`] threads; results come
/// back in input order.
pub fn map_ordered<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = worker_count().min(items.len());
    if workers <= 1 {
        return items.iter().map(&f).collect();
    }
    let chunk_size = items.len().div_ceil(workers);
    let f = &f;
    thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(f).collect::<Vec<R>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect()
    })
}
