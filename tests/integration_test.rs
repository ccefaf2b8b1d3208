//! Integration tests for the episode engine and its ports.
//!
//! Tests cover:
//! - Scenario walkthroughs with hand-computed rewards per policy variant
//! - Reward timing parity: trade-end and every-tick terminal totals agree
//! - Termination: frame exhaustion, the loss limit, reset after done
//! - Profit accounting through the data port pipeline
//! - Stagnation penalties on re-affirming and flat self-loop edges
//! - Event stream shape through a recording sink
//! - Trade count conservation against position changes

mod common;

use approx::assert_relative_eq;
use common::*;
use std::sync::Arc;
use tradesim::domain::episode::{EpisodeConfig, EpisodeEngine, EpisodeEvent};
use tradesim::domain::error::TradesimError;
use tradesim::domain::market::{Action, Position};
use tradesim::domain::policy::PolicyVariant;
use tradesim::domain::reward::{ProfitPolicy, RewardTiming};
use tradesim::ports::data_port::MarketDataPort;

fn run_to_done(engine: &mut EpisodeEngine, actions: &[Action]) -> Vec<f64> {
    let mut rewards = Vec::new();
    for &action in actions {
        let outcome = engine.step(action).unwrap();
        rewards.push(outcome.reward);
        if outcome.done {
            return rewards;
        }
    }
    panic!("episode did not finish within the scripted actions");
}

mod scenario_walkthroughs {
    use super::*;

    #[test]
    fn three_state_round_trip_earns_the_rise() {
        let frame = Arc::new(make_frame(&[10.0, 10.0, 11.0, 9.0, 12.0]));
        let mut engine =
            EpisodeEngine::new(frame, sample_episode_config(PolicyVariant::ThreeState)).unwrap();

        // enter long from flat, hold through the dip, exit at the top
        let open = engine.step(Action::Buy).unwrap();
        assert!(open.reward.abs() < f64::EPSILON);
        assert_eq!(open.info.position, Position::Long);

        let hold = engine.step(Action::Buy).unwrap();
        assert!(hold.reward.abs() < f64::EPSILON);

        let close = engine.step(Action::Sell).unwrap();
        assert!(close.done);
        assert!((close.reward - 1.0).abs() < f64::EPSILON);
        assert_eq!(close.info.position, Position::Out);

        assert!((engine.total_reward() - 1.0).abs() < f64::EPSILON);
        assert_eq!(engine.trade_count(), 1);

        let summary = close.info.summary.unwrap();
        let changes: Vec<(usize, Position)> = summary
            .position_history
            .iter()
            .map(|(&tick, &position)| (tick, position))
            .collect();
        assert_eq!(changes, vec![(2, Position::Long), (4, Position::Out)]);
        // seeded neutral prefix plus one entry per step
        assert_eq!(summary.action_history.len(), 2 + 3);
        assert_eq!(summary.action_history[0], Action::Close);
    }

    #[test]
    fn two_state_flip_hold_flip() {
        let frame = Arc::new(make_frame(&[10.0, 11.0, 10.0, 9.0, 11.0]));
        let mut engine =
            EpisodeEngine::new(frame, sample_episode_config(PolicyVariant::TwoStateHold)).unwrap();

        // flip settles the seeded short flat: -(10 - 10)
        let flip = engine.step(Action::Buy).unwrap();
        assert!(flip.reward.abs() < f64::EPSILON);
        assert_eq!(flip.info.position, Position::Long);

        let hold = engine.step(Action::Hold).unwrap();
        assert!(hold.reward.abs() < f64::EPSILON);

        // flip back settles the long at 11 - 10
        let flip = engine.step(Action::Sell).unwrap();
        assert!(flip.done);
        assert!((flip.reward - 1.0).abs() < f64::EPSILON);

        assert!((engine.total_reward() - 1.0).abs() < f64::EPSILON);
        // a flip both ends one trade and starts the next
        assert_eq!(engine.trade_count(), 2);
    }
}

mod reward_timing_parity {
    use super::*;

    fn engine_with_timing(prices: &[f64], timing: RewardTiming) -> EpisodeEngine {
        let config = EpisodeConfig {
            reward_timing: timing,
            ..sample_episode_config(PolicyVariant::TwoState)
        };
        EpisodeEngine::new(Arc::new(make_frame(prices)), config).unwrap()
    }

    #[test]
    fn timings_agree_when_every_step_settles() {
        let prices = [10.0, 12.0, 11.0, 14.0, 13.0, 16.0];
        let actions = [Action::Buy, Action::Sell, Action::Buy, Action::Sell];

        let mut trade_end = engine_with_timing(&prices, RewardTiming::TradeEnd);
        let mut every_tick = engine_with_timing(&prices, RewardTiming::EveryTick);
        run_to_done(&mut trade_end, &actions);
        run_to_done(&mut every_tick, &actions);

        assert!((trade_end.total_reward() - 6.0).abs() < f64::EPSILON);
        assert!((every_tick.total_reward() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn timings_agree_across_held_stretches() {
        let prices = [50.0, 52.0, 49.0, 53.0, 51.0, 55.0];
        let actions = [Action::Buy, Action::Buy, Action::Sell, Action::Buy];

        let mut trade_end = engine_with_timing(&prices, RewardTiming::TradeEnd);
        let mut every_tick = engine_with_timing(&prices, RewardTiming::EveryTick);
        let trade_end_rewards = run_to_done(&mut trade_end, &actions);
        let every_tick_rewards = run_to_done(&mut every_tick, &actions);

        // the paths differ per step but settle to the same total
        assert!((trade_end_rewards[1]).abs() < f64::EPSILON);
        assert!((every_tick_rewards[1] - 4.0).abs() < f64::EPSILON);
        assert!((trade_end.total_reward() + 1.0).abs() < f64::EPSILON);
        assert!((every_tick.total_reward() + 1.0).abs() < f64::EPSILON);
    }
}

mod termination {
    use super::*;

    #[test]
    fn episode_ends_at_the_last_tick() {
        let prices = generate_prices(12, 100.0, 1.0);
        let config = EpisodeConfig {
            window_size: 3,
            policy_variant: PolicyVariant::TwoState,
            ..EpisodeConfig::default()
        };
        let mut engine = EpisodeEngine::new(Arc::new(make_frame(&prices)), config).unwrap();

        let mut steps = 0;
        loop {
            let outcome = engine.step(Action::Sell).unwrap();
            steps += 1;
            if outcome.done {
                break;
            }
        }
        assert_eq!(steps, 12 - 3 - 1);
        assert!(matches!(
            engine.step(Action::Sell).unwrap_err(),
            TradesimError::EpisodeFinished
        ));
    }

    #[test]
    fn loss_limit_cuts_the_episode_short() {
        let config = EpisodeConfig {
            max_loss: Some(8.0),
            ..sample_episode_config(PolicyVariant::TwoState)
        };
        let mut engine =
            EpisodeEngine::new(Arc::new(make_frame(&[5.0, 15.0, 25.0, 35.0, 45.0, 55.0])), config)
                .unwrap();

        let mut steps = 0;
        loop {
            let outcome = engine.step(Action::Buy).unwrap();
            steps += 1;
            if outcome.done {
                break;
            }
        }
        // the flip loses -(25 - 5); the breach is noticed one step later
        assert_eq!(steps, 2);
        assert!((engine.total_reward() + 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_revives_a_finished_episode_deterministically() {
        let actions = [Action::Buy, Action::Sell, Action::Buy];
        let mut engine = EpisodeEngine::new(
            Arc::new(make_frame(&[10.0, 11.0, 9.0, 14.0, 12.0])),
            sample_episode_config(PolicyVariant::TwoState),
        )
        .unwrap();

        run_to_done(&mut engine, &actions);
        let first_total = engine.total_reward();
        let first_trades = engine.trade_count();
        assert!((first_total - 8.0).abs() < f64::EPSILON);
        assert!(engine.step(Action::Buy).is_err());

        engine.reset();
        run_to_done(&mut engine, &actions);
        assert_eq!(engine.total_reward(), first_total);
        assert_eq!(engine.trade_count(), first_trades);
    }
}

mod profit_accounting {
    use super::*;

    #[test]
    fn compounding_round_trip_through_the_data_port() {
        let port = MockDataPort::new()
            .with_frame("EURUSD", make_dated_frame(&[10.0, 10.0, 12.0, 15.0], "2024-01-01"));
        let frame = port.load_frame("EURUSD").unwrap();

        let config = EpisodeConfig {
            profit_policy: ProfitPolicy::Compounding,
            ..sample_episode_config(PolicyVariant::ThreeState)
        };
        let mut engine = EpisodeEngine::new(Arc::new(frame), config).unwrap();

        engine.step(Action::Buy).unwrap();
        let close = engine.step(Action::Sell).unwrap();
        assert!(close.done);

        // entered at 12, exited at 15
        assert_relative_eq!(engine.total_profit(), 1.25, epsilon = 1e-12);
        assert!((engine.total_reward() - 3.0).abs() < f64::EPSILON);
        // the oracle rides the whole 10 -> 15 run
        assert_relative_eq!(engine.max_possible_profit().unwrap(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn disabled_profit_stays_at_the_unit_baseline() {
        let mut engine = EpisodeEngine::new(
            Arc::new(make_frame(&[10.0, 10.0, 12.0, 15.0])),
            sample_episode_config(PolicyVariant::ThreeState),
        )
        .unwrap();

        engine.step(Action::Buy).unwrap();
        let close = engine.step(Action::Sell).unwrap();
        assert!(close.done);

        assert!((engine.total_profit() - 1.0).abs() < f64::EPSILON);
        assert!(matches!(
            engine.max_possible_profit().unwrap_err(),
            TradesimError::ProfitNotImplemented
        ));
    }
}

mod stagnation {
    use super::*;

    #[test]
    fn pinned_reaffirm_edge_penalizes_immediately() {
        let config = EpisodeConfig {
            hold_penalty_ticks: Some(3),
            ..sample_episode_config(PolicyVariant::TwoStateHold)
        };
        let mut engine = EpisodeEngine::new(Arc::new(make_frame(&[7.0; 7])), config).unwrap();

        let actions = [
            Action::Sell, // re-affirm order, pinned threshold 0
            Action::Hold, // elapsed 3, at the threshold
            Action::Hold, // elapsed 4, past it
            Action::Sell,
            Action::Hold, // terminal settle of a flat deal
        ];
        let rewards = run_to_done(&mut engine, &actions);

        assert_eq!(rewards, vec![-1.0, 0.0, -1.0, -1.0, 0.0]);
        // penalties are returned, never accumulated
        assert!(engine.total_reward().abs() < f64::EPSILON);
        assert_eq!(engine.trade_count(), 0);
    }

    #[test]
    fn flat_self_loop_uses_half_the_threshold() {
        let config = EpisodeConfig {
            hold_penalty_ticks: Some(4),
            ..sample_episode_config(PolicyVariant::ThreeStateHold)
        };
        let mut engine = EpisodeEngine::new(Arc::new(make_frame(&[3.0; 8])), config).unwrap();

        let actions = [Action::Close; 6];
        let rewards = run_to_done(&mut engine, &actions);

        assert_eq!(rewards, vec![0.0, -1.0, -1.0, -1.0, -1.0, 0.0]);
        assert!(engine.total_reward().abs() < f64::EPSILON);
    }

    #[test]
    fn flat_hold_is_never_penalized() {
        let config = EpisodeConfig {
            hold_penalty_ticks: Some(1),
            ..sample_episode_config(PolicyVariant::ThreeStateHold)
        };
        let mut engine = EpisodeEngine::new(Arc::new(make_frame(&[3.0; 8])), config).unwrap();

        let rewards = run_to_done(&mut engine, &[Action::Hold; 6]);
        assert_eq!(rewards, vec![0.0; 6]);
    }
}

mod port_pipeline {
    use super::*;

    #[test]
    fn frame_flows_from_port_to_summary() {
        let prices = generate_prices(8, 100.0, 1.0);
        let port = MockDataPort::new().with_frame("AUDUSD", make_dated_frame(&prices, "2024-03-01"));
        let frame = port.load_frame("AUDUSD").unwrap();
        assert_eq!(frame.symbol, "AUDUSD");
        assert!(frame.date_range().is_some());

        let config = EpisodeConfig {
            window_size: 2,
            policy_variant: PolicyVariant::TwoState,
            ..EpisodeConfig::default()
        };
        let mut engine = EpisodeEngine::new(Arc::new(frame), config).unwrap();

        let rewards = run_to_done(&mut engine, &[Action::Sell; 5]);
        assert_eq!(rewards.len(), 5);
        // terminal settle of the seeded short, anchored one tick before the
        // start: -(107 - 101)
        assert!((engine.total_reward() + 6.0).abs() < f64::EPSILON);
        assert_eq!(engine.trade_count(), 0);
    }

    #[test]
    fn data_port_error_propagates() {
        let port = MockDataPort::new().with_error("EURUSD", "disk unreadable");
        let err = port.load_frame("EURUSD").unwrap_err();
        assert!(matches!(err, TradesimError::Data { reason } if reason == "disk unreadable"));
    }

    #[test]
    fn event_stream_matches_episode_shape() {
        let (sink, log) = RecordingEventSink::new();
        let engine = EpisodeEngine::new(
            Arc::new(make_frame(&[10.0, 10.0, 11.0, 9.0, 12.0])),
            sample_episode_config(PolicyVariant::ThreeState),
        )
        .unwrap();
        let mut engine = engine.with_event_sink(Box::new(sink));

        engine.reset();
        run_to_done(&mut engine, &[Action::Buy, Action::Buy, Action::Sell]);

        let events = log.borrow();
        assert_eq!(events.len(), 1 + 3 * 2 + 1);
        assert!(matches!(
            events[0],
            EpisodeEvent::Reset {
                start_tick: 1,
                position: Position::Out,
            }
        ));
        let transitions = events
            .iter()
            .filter(|e| matches!(e, EpisodeEvent::Transition { .. }))
            .count();
        let rewards = events
            .iter()
            .filter(|e| matches!(e, EpisodeEvent::Reward { .. }))
            .count();
        assert_eq!(transitions, 3);
        assert_eq!(rewards, 3);
        match events.last().unwrap() {
            EpisodeEvent::Finished {
                tick,
                total_reward,
                trade_count,
                ..
            } => {
                assert_eq!(*tick, 4);
                assert!((total_reward - 1.0).abs() < f64::EPSILON);
                assert_eq!(*trade_count, 1);
            }
            other => panic!("expected a finished event, got {other:?}"),
        }
    }
}

mod conservation {
    use super::*;

    #[test]
    fn two_state_counts_every_flip_as_a_trade() {
        let prices = generate_prices(10, 50.0, 0.5);
        let mut engine = EpisodeEngine::new(
            Arc::new(make_frame(&prices)),
            sample_episode_config(PolicyVariant::TwoState),
        )
        .unwrap();

        let actions: Vec<Action> = (0..8)
            .map(|i| if i % 2 == 0 { Action::Buy } else { Action::Sell })
            .collect();
        let rewards = run_to_done(&mut engine, &actions);
        assert_eq!(rewards.len(), 8);

        assert_eq!(engine.trade_count(), 8);
    }

    #[test]
    fn three_state_counts_entries_only() {
        let mut engine = EpisodeEngine::new(
            Arc::new(make_frame(&[4.0; 8])),
            sample_episode_config(PolicyVariant::ThreeState),
        )
        .unwrap();

        let actions = [
            Action::Buy,
            Action::Close,
            Action::Sell,
            Action::Close,
            Action::Buy,
            Action::Close,
        ];
        let last = actions
            .iter()
            .map(|&a| engine.step(a).unwrap())
            .last()
            .unwrap();
        assert!(last.done);

        // three entries, three exits; only entries count as trades
        assert_eq!(engine.trade_count(), 3);
        assert_eq!(last.info.summary.unwrap().position_history.len(), 6);
        assert!(engine.total_reward().abs() < f64::EPSILON);
    }
}
