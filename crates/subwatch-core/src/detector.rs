//! Change detection
//!
//! Pure, deterministic comparison of a freshly fetched result against the
//! last-committed value. No I/O happens here; the engine owns fetching,
//! committing and broadcasting.
//!
//! Both comparison policies dispatch through [`detect`]:
//!
//! - **Toggle**: the value is "the source has items"; either flip is
//!   reportable, with distinct on/off messages.
//! - **MonotonicTimestamp**: the value is the newest item's publish time;
//!   only a strictly greater time is reportable. Equal or older timestamps
//!   (clock skew, re-fetched duplicates, backfilled entries) are silently
//!   ignored, and an empty fetch is a no-op.

use chrono::{DateTime, Utc};

use crate::config::{ComparisonPolicy, SourceConfig};
use crate::traits::fetcher::{FetchResult, Item};
use crate::traits::state_store::ComparisonValue;

/// Outcome of comparing a fetch result against the committed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Nothing reportable
    Unchanged,
    /// A reportable change with its new baseline and notification text
    Changed(Change),
}

/// A detected change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The comparison value to commit
    pub value: ComparisonValue,
    /// The item that triggered the change, if any
    pub item: Option<Item>,
    /// The notification text to broadcast
    pub message: String,
}

/// Compare a fetch result against the previously committed value
///
/// `previous` must match the source's policy; the engine re-seeds mismatched
/// state before calling this.
pub fn detect(source: &SourceConfig, previous: &ComparisonValue, fetched: &FetchResult) -> Detection {
    match (source.policy, previous) {
        (ComparisonPolicy::Toggle, ComparisonValue::Toggle { active: was_active }) => {
            let active = !fetched.items.is_empty();
            if active == *was_active {
                return Detection::Unchanged;
            }
            let newest = fetched.newest();
            Detection::Changed(Change {
                value: ComparisonValue::Toggle { active },
                item: newest.cloned(),
                message: toggle_message(source, active, newest),
            })
        }
        (
            ComparisonPolicy::MonotonicTimestamp,
            ComparisonValue::Timestamp { newest: committed },
        ) => {
            let Some(item) = fetched.newest() else {
                return Detection::Unchanged;
            };
            if item.published_at <= *committed {
                return Detection::Unchanged;
            }
            Detection::Changed(Change {
                value: ComparisonValue::Timestamp {
                    newest: item.published_at,
                },
                item: Some(item.clone()),
                message: item_message(source, item),
            })
        }
        // Policy/value mismatch is handled by the engine before detection.
        _ => Detection::Unchanged,
    }
}

/// Derive the initial comparison value from a source's first successful fetch
///
/// An empty feed under the timestamp policy seeds the Unix epoch, so the
/// first post that ever appears is a reportable change.
pub fn seed(policy: ComparisonPolicy, fetched: &FetchResult) -> ComparisonValue {
    match policy {
        ComparisonPolicy::Toggle => ComparisonValue::Toggle {
            active: !fetched.items.is_empty(),
        },
        ComparisonPolicy::MonotonicTimestamp => ComparisonValue::Timestamp {
            newest: fetched
                .newest()
                .map(|item| item.published_at)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        },
    }
}

fn toggle_message(source: &SourceConfig, active: bool, newest: Option<&Item>) -> String {
    let label = source.display_label();
    if active {
        match newest {
            Some(item) if !item.link.is_empty() => {
                format!("{} is now live: {}", label, item.link)
            }
            _ => format!("{} is now live", label),
        }
    } else {
        format!("{} is now offline", label)
    }
}

fn item_message(source: &SourceConfig, item: &Item) -> String {
    format!(
        "[{}] {} by {} ({})",
        source.display_label(),
        item.title,
        item.author,
        item.link
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_at(title: &str, secs: i64) -> Item {
        Item {
            title: title.to_string(),
            author: "someone".to_string(),
            description: "body".to_string(),
            published_at: DateTime::from_timestamp(secs, 0).unwrap(),
            link: format!("https://example.com/{}", title),
        }
    }

    fn toggle_source() -> SourceConfig {
        SourceConfig::new("room", "/live/room/1", 10, ComparisonPolicy::Toggle)
            .with_label("Room")
    }

    fn feed_source() -> SourceConfig {
        SourceConfig::new(
            "feed",
            "/feed/user/a",
            30,
            ComparisonPolicy::MonotonicTimestamp,
        )
    }

    #[test]
    fn toggle_fires_on_off_to_on() {
        let source = toggle_source();
        let previous = ComparisonValue::Toggle { active: false };
        let fetched = FetchResult::new("/live/room/1", vec![item_at("stream", 1_000)]);

        match detect(&source, &previous, &fetched) {
            Detection::Changed(change) => {
                assert_eq!(change.value, ComparisonValue::Toggle { active: true });
                assert!(change.message.contains("live"));
                assert!(change.item.is_some());
            }
            Detection::Unchanged => panic!("off->on must fire"),
        }
    }

    #[test]
    fn toggle_fires_on_on_to_off_with_distinct_message() {
        let source = toggle_source();

        let on = detect(
            &source,
            &ComparisonValue::Toggle { active: false },
            &FetchResult::new("/live/room/1", vec![item_at("stream", 1_000)]),
        );
        let off = detect(
            &source,
            &ComparisonValue::Toggle { active: true },
            &FetchResult::new("/live/room/1", vec![]),
        );

        let (Detection::Changed(on), Detection::Changed(off)) = (on, off) else {
            panic!("both transitions must fire");
        };
        assert_ne!(on.message, off.message);
        assert!(off.message.contains("offline"));
        assert_eq!(off.value, ComparisonValue::Toggle { active: false });
        assert!(off.item.is_none());
    }

    #[test]
    fn toggle_same_value_never_fires() {
        let source = toggle_source();

        let still_on = detect(
            &source,
            &ComparisonValue::Toggle { active: true },
            &FetchResult::new("/live/room/1", vec![item_at("stream", 1_000)]),
        );
        assert_eq!(still_on, Detection::Unchanged);

        let still_off = detect(
            &source,
            &ComparisonValue::Toggle { active: false },
            &FetchResult::new("/live/room/1", vec![]),
        );
        assert_eq!(still_off, Detection::Unchanged);
    }

    #[test]
    fn timestamp_fires_only_when_strictly_newer() {
        let source = feed_source();
        let t0 = 10_000;
        let previous = ComparisonValue::Timestamp {
            newest: DateTime::from_timestamp(t0, 0).unwrap(),
        };

        // duplicate of the committed item
        let dup = FetchResult::new("/feed/user/a", vec![item_at("same", t0)]);
        assert_eq!(detect(&source, &previous, &dup), Detection::Unchanged);

        // older (backfilled) item
        let older = FetchResult::new("/feed/user/a", vec![item_at("old", t0 - 5)]);
        assert_eq!(detect(&source, &previous, &older), Detection::Unchanged);

        // strictly newer item
        let newer = FetchResult::new("/feed/user/a", vec![item_at("new", t0 + 10)]);
        match detect(&source, &previous, &newer) {
            Detection::Changed(change) => {
                assert_eq!(
                    change.value,
                    ComparisonValue::Timestamp {
                        newest: DateTime::from_timestamp(t0 + 10, 0).unwrap()
                    }
                );
                assert!(change.message.contains("new"));
            }
            Detection::Unchanged => panic!("strictly newer timestamp must fire"),
        }
    }

    #[test]
    fn timestamp_repeat_of_same_fetch_is_idempotent() {
        let source = feed_source();
        let previous = ComparisonValue::Timestamp {
            newest: DateTime::from_timestamp(500, 0).unwrap(),
        };
        let fetched = FetchResult::new("/feed/user/a", vec![item_at("post", 600)]);

        let first = detect(&source, &previous, &fetched);
        let Detection::Changed(change) = first else {
            panic!("first observation must fire");
        };

        // feeding the same result against the new baseline produces nothing
        let second = detect(&source, &change.value, &fetched);
        assert_eq!(second, Detection::Unchanged);
    }

    #[test]
    fn timestamp_empty_fetch_is_noop() {
        let source = feed_source();
        let previous = ComparisonValue::Timestamp {
            newest: DateTime::from_timestamp(500, 0).unwrap(),
        };
        let fetched = FetchResult::new("/feed/user/a", vec![]);
        assert_eq!(detect(&source, &previous, &fetched), Detection::Unchanged);
    }

    #[test]
    fn seed_toggle_reflects_emptiness() {
        let empty = FetchResult::new("/live/room/1", vec![]);
        assert_eq!(
            seed(ComparisonPolicy::Toggle, &empty),
            ComparisonValue::Toggle { active: false }
        );

        let live = FetchResult::new("/live/room/1", vec![item_at("stream", 1)]);
        assert_eq!(
            seed(ComparisonPolicy::Toggle, &live),
            ComparisonValue::Toggle { active: true }
        );
    }

    #[test]
    fn seed_timestamp_uses_newest_or_epoch() {
        let fetched = FetchResult::new("/feed/user/a", vec![item_at("post", 900)]);
        assert_eq!(
            seed(ComparisonPolicy::MonotonicTimestamp, &fetched),
            ComparisonValue::Timestamp {
                newest: DateTime::from_timestamp(900, 0).unwrap()
            }
        );

        // empty feed: epoch baseline, so the first post ever is a change
        let empty = FetchResult::new("/feed/user/a", vec![]);
        let seeded = seed(ComparisonPolicy::MonotonicTimestamp, &empty);
        assert_eq!(
            seeded,
            ComparisonValue::Timestamp {
                newest: DateTime::<Utc>::UNIX_EPOCH
            }
        );
        let first_post = FetchResult::new("/feed/user/a", vec![item_at("first", 1)]);
        assert!(matches!(
            detect(&feed_source(), &seeded, &first_post),
            Detection::Changed(_)
        ));
    }

    #[test]
    fn toggle_scenario_from_cold_start() {
        // empty -> seed false; one item -> live; empty again -> offline
        let source = toggle_source();

        let first = FetchResult::new("/live/room/1", vec![]);
        let seeded = seed(source.policy, &first);
        assert_eq!(seeded, ComparisonValue::Toggle { active: false });

        let second = FetchResult::new("/live/room/1", vec![item_at("stream", 100)]);
        let Detection::Changed(live) = detect(&source, &seeded, &second) else {
            panic!("going live must fire");
        };

        let third = FetchResult::new("/live/room/1", vec![]);
        let Detection::Changed(offline) = detect(&source, &live.value, &third) else {
            panic!("going offline must fire");
        };
        assert_ne!(live.message, offline.message);
    }
}
