// Fixed-width worker pool for fan-out reads

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Run `f` over every item using at most `width` workers
///
/// Workers pull the next index from a shared cursor until the items run out.
/// Each result is stored at its item's index, so output order matches input
/// order whatever order the calls finish in.
pub fn run_bounded<T, R, F>(items: &[T], width: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = width.max(1).min(items.len());
    let cursor = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<R>>> = Mutex::new(items.iter().map(|_| None).collect());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    let result = f(item);
                    slots.lock().unwrap_or_else(|e| e.into_inner())[index] = Some(result);
                }
            });
        }
    });

    slots
        .into_inner()
        .unwrap_or_else(|e| e.into_inner())
        .into_iter()
        .flatten()
        .collect()
}
