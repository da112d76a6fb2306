//! Property-Based Tests for Lane Serialization
//!
//! Property: for any set of concurrently submitted appends, the final
//! sequence contains every append exactly once (nothing dropped, nothing
//! duplicated); for any single-stream submission order, execution order
//! matches submission order exactly.

use proptest::prelude::*;
use turnstile_cell::ExclusiveCell;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("test runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn concurrent_appends_lose_nothing(
        values in proptest::collection::vec(any::<u32>(), 1..48),
    ) {
        let rt = runtime();
        let written = rt.block_on(async {
            let cell = ExclusiveCell::new(Vec::new());
            let mut tasks = Vec::new();
            for (index, value) in values.iter().copied().enumerate() {
                let cell = cell.clone();
                tasks.push(tokio::spawn(async move {
                    cell.submit(move |seq: &mut Vec<(usize, u32)>| seq.push((index, value)))
                        .await
                }));
            }
            for task in tasks {
                task.await.expect("join").expect("submit");
            }
            cell.get().await.expect("get")
        });

        prop_assert_eq!(written.len(), values.len());
        let mut indices: Vec<usize> = written.iter().map(|(index, _)| *index).collect();
        indices.sort_unstable();
        indices.dedup();
        prop_assert_eq!(indices.len(), values.len());
    }

    #[test]
    fn single_stream_preserves_submission_order(
        values in proptest::collection::vec(any::<u32>(), 0..48),
    ) {
        let rt = runtime();
        let written = rt.block_on(async {
            let cell = ExclusiveCell::new(Vec::new());
            let submissions: Vec<_> = values
                .iter()
                .copied()
                .map(|value| cell.submit(move |seq: &mut Vec<u32>| seq.push(value)))
                .collect();
            for submission in submissions {
                submission.await.expect("submit");
            }
            cell.get().await.expect("get")
        });
        prop_assert_eq!(written, values);
    }
}
