//! Console event adapter: episode events on stderr.

use crate::domain::episode::EpisodeEvent;
use crate::ports::event_port::EventPort;

/// Writes one stderr line per event, in step order.
pub struct ConsoleEventAdapter;

impl EventPort for ConsoleEventAdapter {
    fn record(&self, event: &EpisodeEvent) {
        match event {
            EpisodeEvent::Reset {
                start_tick,
                position,
            } => {
                eprintln!("reset: tick {}, position {}", start_tick, position);
            }
            EpisodeEvent::Transition { tick, record } => {
                eprintln!("tick {}: {}", tick, record);
            }
            EpisodeEvent::Reward {
                tick,
                step_reward,
                total_reward,
                deal_reward,
            } => {
                eprintln!(
                    "tick {}: reward {:+.4}, total {:+.4}, open deal {:+.4}",
                    tick, step_reward, total_reward, deal_reward
                );
            }
            EpisodeEvent::Finished {
                tick,
                total_reward,
                total_profit,
                trade_count,
            } => {
                eprintln!(
                    "finished at tick {}: total reward {:+.4}, profit {:.4}, {} trades",
                    tick, total_reward, total_profit, trade_count
                );
            }
        }
    }
}

/// Discards every event. Stands in where a sink is required but output is not
/// wanted, such as quiet rollouts.
pub struct NullEventSink;

impl EventPort for NullEventSink {
    fn record(&self, _event: &EpisodeEvent) {}
}
