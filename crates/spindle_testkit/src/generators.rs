//! Property-based test generators using proptest.
//!
//! Provides strategies for events and for the ways a byte stream can be
//! cut into readiness callbacks.

use proptest::prelude::*;
use spindle_codec::Event;

/// Strategy for payload bytes up to `max_len` long.
pub fn payload_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Strategy for events with arbitrary magic, tag and payload.
pub fn event_strategy() -> impl Strategy<Value = Event> {
    (any::<i32>(), any::<u64>(), payload_strategy(512)).prop_map(|(magic, tag, payload)| {
        Event::new(magic, tag, payload).expect("generated payload fits a frame")
    })
}

/// Strategy for events that all share one tag, so they land on one channel.
pub fn channel_events_strategy(max_events: usize) -> impl Strategy<Value = Vec<Event>> {
    (
        any::<u64>(),
        prop::collection::vec((any::<i32>(), payload_strategy(128)), 1..=max_events),
    )
        .prop_map(|(tag, items)| {
            items
                .into_iter()
                .map(|(magic, payload)| {
                    Event::new(magic, tag, payload).expect("generated payload fits a frame")
                })
                .collect()
        })
}

/// Strategy for chunk sizes that cut `len` bytes into non-empty pieces.
///
/// The sizes always sum to `len`.
pub fn chunk_plan_strategy(len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..=len, 0..12).prop_map(move |cuts| split_sizes(len, cuts))
}

/// Turns cut points into the sizes of the pieces between them.
pub fn split_sizes(len: usize, mut cuts: Vec<usize>) -> Vec<usize> {
    cuts.retain(|&c| c > 0 && c < len);
    cuts.sort_unstable();
    cuts.dedup();
    let mut sizes = Vec::with_capacity(cuts.len() + 1);
    let mut last = 0;
    for cut in cuts.into_iter().chain(std::iter::once(len)) {
        if cut > last {
            sizes.push(cut - last);
            last = cut;
        }
    }
    sizes
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sizes_cover_length() {
        assert_eq!(split_sizes(10, vec![3, 3, 0, 10, 7]), vec![3, 4, 3]);
        assert_eq!(split_sizes(5, vec![]), vec![5]);
        assert!(split_sizes(0, vec![0]).is_empty());
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_events_validate(event in event_strategy()) {
            prop_assert!(event.validate());
        }

        #[test]
        fn chunk_plans_sum_to_length(plan in chunk_plan_strategy(100)) {
            prop_assert_eq!(plan.iter().sum::<usize>(), 100);
            prop_assert!(plan.iter().all(|&s| s > 0));
        }

        #[test]
        fn channel_events_share_a_tag(events in channel_events_strategy(5)) {
            let tag = events[0].tag();
            prop_assert!(events.iter().all(|e| e.tag() == tag));
        }
    }
}
