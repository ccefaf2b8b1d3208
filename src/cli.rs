//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::console_event_adapter::ConsoleEventAdapter;
use crate::adapters::csv_adapter::CsvDataAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    validate_config, validate_data_config, validate_episode_config,
};
use crate::domain::episode::{EpisodeConfig, EpisodeEngine};
use crate::domain::error::TradesimError;
use crate::domain::frame::MarketFrame;
use crate::domain::policy::{PolicyVariant, TransitionTable};
use crate::domain::reward::{ProfitPolicy, RewardTiming};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Trading episode simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run episodes over the configured frame with randomly sampled actions
    Rollout {
        #[arg(short, long)]
        config: PathBuf,
        /// Suppress the per-step event stream
        #[arg(long)]
        quiet: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the active policy's transition table
    Policy {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the configured frame's dimensions and ranges
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Rollout { config, quiet } => run_rollout(&config, quiet),
        Command::Validate { config } => run_validate(&config),
        Command::Policy { config } => run_policy(&config),
        Command::Info { config } => run_info(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TradesimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn build_episode_config(adapter: &dyn ConfigPort) -> Result<EpisodeConfig, TradesimError> {
    let policy_variant = match adapter.get_string("episode", "policy_variant") {
        Some(s) => s
            .trim()
            .parse::<PolicyVariant>()
            .map_err(|_| TradesimError::ConfigInvalid {
                section: "episode".into(),
                key: "policy_variant".into(),
                reason: format!("unknown variant '{s}'"),
            })?,
        None => PolicyVariant::TwoState,
    };

    let reward_timing = match adapter.get_string("episode", "reward_timing") {
        Some(s) => s
            .trim()
            .parse::<RewardTiming>()
            .map_err(|_| TradesimError::ConfigInvalid {
                section: "episode".into(),
                key: "reward_timing".into(),
                reason: format!("unknown timing '{s}'"),
            })?,
        None => RewardTiming::TradeEnd,
    };

    let profit_policy = match adapter.get_string("episode", "profit") {
        Some(s) => s
            .trim()
            .parse::<ProfitPolicy>()
            .map_err(|_| TradesimError::ConfigInvalid {
                section: "episode".into(),
                key: "profit".into(),
                reason: format!("unknown policy '{s}'"),
            })?,
        None => ProfitPolicy::Disabled,
    };

    let max_loss = match adapter.get_string("episode", "max_loss") {
        Some(s) => Some(s.trim().parse::<f64>().map_err(|_| {
            TradesimError::ConfigInvalid {
                section: "episode".into(),
                key: "max_loss".into(),
                reason: "max_loss must be a number".into(),
            }
        })?),
        None => None,
    };

    let hold_penalty_ticks = match adapter.get_string("episode", "hold_penalty_ticks") {
        Some(s) => Some(s.trim().parse::<u32>().map_err(|_| {
            TradesimError::ConfigInvalid {
                section: "episode".into(),
                key: "hold_penalty_ticks".into(),
                reason: "hold_penalty_ticks must be a non-negative integer".into(),
            }
        })?),
        None => None,
    };

    Ok(EpisodeConfig {
        window_size: adapter.get_usize_or("episode", "window_size", 10),
        policy_variant,
        reward_timing,
        profit_policy,
        leverage: adapter.get_double_or("episode", "leverage", 1.0),
        max_loss,
        hold_penalty_ticks,
        augment_observation: adapter.get_bool_or("episode", "augment_observation", false),
    })
}

pub fn build_data_adapter(
    adapter: &dyn ConfigPort,
) -> Result<(CsvDataAdapter, String), TradesimError> {
    let dir = adapter
        .get_string("data", "dir")
        .ok_or_else(|| TradesimError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })?;
    let symbol = adapter
        .get_string("data", "symbol")
        .ok_or_else(|| TradesimError::ConfigMissing {
            section: "data".into(),
            key: "symbol".into(),
        })?;
    let price_column = adapter
        .get_string("data", "price_column")
        .unwrap_or_else(|| "close".to_string());
    let feature_columns: Vec<String> = adapter
        .get_string("data", "feature_columns")
        .unwrap_or_else(|| "close".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let data = CsvDataAdapter::new(PathBuf::from(dir), &price_column, &feature_columns)?;
    Ok((data, symbol.trim().to_string()))
}

fn load_configured_frame(adapter: &dyn ConfigPort) -> Result<MarketFrame, TradesimError> {
    let (data, symbol) = build_data_adapter(adapter)?;
    data.load_frame(&symbol)
}

fn run_rollout(config_path: &PathBuf, quiet: bool) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate
    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 3: Load frame
    let frame = match load_configured_frame(&adapter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Loaded {}: {} rows, {} feature columns",
        frame.symbol,
        frame.len(),
        frame.feature_width()
    );

    // Stage 4: Build engine
    let episode_config = match build_episode_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let variant = episode_config.policy_variant;
    let profit_policy = episode_config.profit_policy;
    let engine = match EpisodeEngine::new(Arc::new(frame), episode_config) {
        Ok(en) => en,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let mut engine = if quiet {
        engine
    } else {
        engine.with_event_sink(Box::new(ConsoleEventAdapter))
    };

    // Stage 5: Run episodes with uniformly sampled actions
    let episodes = adapter.get_usize_or("rollout", "episodes", 1);
    let seed = adapter
        .get_string("rollout", "seed")
        .and_then(|s| s.trim().parse::<u64>().ok());
    let mut rng = match seed {
        Some(seed) => {
            eprintln!("Running {} episode(s) of {}, seed {}", episodes, variant, seed);
            StdRng::seed_from_u64(seed)
        }
        None => {
            eprintln!("Running {} episode(s) of {}, entropy-seeded", episodes, variant);
            StdRng::from_entropy()
        }
    };
    let actions = variant.actions();

    for episode in 1..=episodes {
        engine.reset();
        let mut steps = 0usize;
        loop {
            let action = actions[rng.gen_range(0..actions.len())];
            let outcome = match engine.step(action) {
                Ok(o) => o,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            };
            steps += 1;
            if outcome.done {
                break;
            }
        }
        println!(
            "episode {}: {} steps, total reward {:+.4}, profit {:.4}, {} trades",
            episode,
            steps,
            engine.total_reward(),
            engine.total_profit(),
            engine.trade_count()
        );
    }

    if profit_policy == ProfitPolicy::Compounding {
        if let Ok(best) = engine.max_possible_profit() {
            eprintln!("Max possible profit: {:.4}", best);
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let episode_config = match build_episode_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nEpisode settings:");
    eprintln!("  policy_variant: {}", episode_config.policy_variant);
    eprintln!("  reward_timing:  {}", episode_config.reward_timing);
    eprintln!("  profit:         {}", episode_config.profit_policy);
    eprintln!("  window_size:    {}", episode_config.window_size);
    eprintln!("  leverage:       {}", episode_config.leverage);
    match episode_config.max_loss {
        Some(limit) => eprintln!("  max_loss:       {}", limit),
        None => eprintln!("  max_loss:       unlimited"),
    }
    match episode_config.hold_penalty_ticks {
        Some(ticks) => eprintln!("  hold penalty:   after {} ticks", ticks),
        None => eprintln!("  hold penalty:   off"),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_policy(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_episode_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let episode_config = match build_episode_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let table = match TransitionTable::new(
        episode_config.policy_variant,
        episode_config.hold_penalty_ticks,
    ) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Transition table for {} ({} rules):",
        table.variant(),
        table.records().len()
    );
    for record in table.records() {
        println!("{}", record);
    }
    ExitCode::SUCCESS
}

fn run_info(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_data_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_episode_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let frame = match load_configured_frame(&adapter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!(
        "{}: {} rows, {} feature columns",
        frame.symbol,
        frame.len(),
        frame.feature_width()
    );
    if let Some((first, last)) = frame.date_range() {
        println!("dates: {} to {}", first, last);
    }
    let (low, high) = frame.price_range();
    println!("prices: {:.4} to {:.4}", low, high);

    let episode_config = match build_episode_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if episode_config.profit_policy == ProfitPolicy::Compounding {
        let engine = match EpisodeEngine::new(Arc::new(frame), episode_config) {
            Ok(en) => en,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        match engine.max_possible_profit() {
            Ok(best) => println!("max possible profit: {:.4}", best),
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    }
    ExitCode::SUCCESS
}
