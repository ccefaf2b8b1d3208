//! Observability port trait for episode events.

use crate::domain::episode::EpisodeEvent;

/// Sink for the structured events an episode emits as it runs. The engine
/// calls `record` synchronously from `reset` and `step`, so implementations
/// keep it cheap.
pub trait EventPort {
    fn record(&self, event: &EpisodeEvent);
}
