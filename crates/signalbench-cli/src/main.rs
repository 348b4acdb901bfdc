//! signalbench CLI
//!
//! Command-line runner for traffic-signal benchmark episodes over the
//! synthetic backend. Real simulator backends plug in through the
//! `SimulatorBackend` trait and get the same loop.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use signalbench::agents::{FixedTimePolicy, GraphPolicy, Policy, RandomPolicy};
use signalbench::config::{EnvConfig, MapConfig};
use signalbench::env::{ActionBatch, MultiSignalEnv};
use signalbench::obs;
use signalbench::sim::MockNetwork;

#[derive(Parser)]
#[command(name = "sigbench")]
#[command(version, about = "signalbench - traffic-signal RL benchmark harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyKind {
    Fixed,
    Graph,
    Random,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RewardKind {
    Wait,
    Queue,
    Pressure,
}

#[derive(Subcommand)]
enum Commands {
    /// Run benchmark episodes with a baseline policy
    Bench {
        /// Baseline policy
        #[arg(long, value_enum, default_value = "fixed")]
        policy: PolicyKind,

        /// Reward function
        #[arg(long, value_enum, default_value = "wait")]
        reward: RewardKind,

        /// Number of episodes
        #[arg(long, default_value = "3")]
        episodes: u32,

        /// Intersections in the synthetic network
        #[arg(long, default_value = "4")]
        signals: usize,

        /// Episode end time in simulated seconds
        #[arg(long, default_value = "600")]
        end_time: f64,

        /// Intersections controlled in episode 1 (staggers +1 every 30th)
        #[arg(long)]
        initial_active: Option<usize>,

        /// Metric log directory
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,

        /// Per-map config JSON for the graph policy
        #[arg(long)]
        map_config: Option<PathBuf>,

        /// Demand seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Step one short episode and print per-step rewards
    Demo {
        /// Intersections in the synthetic network
        #[arg(long, default_value = "2")]
        signals: usize,

        /// Decision steps to run
        #[arg(long, default_value = "10")]
        steps: u32,
    },

    /// List built-in state functions, reward functions, and policies
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Bench {
            policy,
            reward,
            episodes,
            signals,
            end_time,
            initial_active,
            log_dir,
            map_config,
            seed,
        } => bench(
            policy,
            reward,
            episodes,
            signals,
            end_time,
            initial_active,
            log_dir,
            map_config,
            seed,
        ),
        Commands::Demo { signals, steps } => demo(signals, steps),
        Commands::List => {
            println!("State functions: wave, queue_state");
            println!("Reward functions: wait, queue, pressure");
            println!("Policies: fixed, graph, random");
            Ok(())
        }
    }
}

fn reward_fn(kind: RewardKind) -> signalbench::obs::RewardFn {
    match kind {
        RewardKind::Wait => obs::wait(),
        RewardKind::Queue => obs::queue(),
        RewardKind::Pressure => obs::pressure(),
    }
}

/// Phase pairs matching the synthetic four-lane intersections.
fn default_map_config(signals: usize) -> MapConfig {
    MapConfig {
        name: format!("mock{signals}"),
        phase_pairs: vec![[0, 1], [2, 3]],
        valid_actions: Default::default(),
    }
}

#[allow(clippy::too_many_arguments)]
fn bench(
    policy: PolicyKind,
    reward: RewardKind,
    episodes: u32,
    signals: usize,
    end_time: f64,
    initial_active: Option<usize>,
    log_dir: PathBuf,
    map_config: Option<PathBuf>,
    seed: u64,
) -> Result<()> {
    let mut config = EnvConfig::new("bench", format!("mock{signals}"))
        .end_time(end_time)
        .log_dir(log_dir)
        .ordered_returns(true);
    config.initial_active = initial_active;

    let mut env = MultiSignalEnv::new(
        MockNetwork::with_grid(signals, seed),
        config,
        obs::wave(),
        reward_fn(reward),
    )?;

    let map = match map_config {
        Some(path) => MapConfig::load(&path)?,
        None => default_map_config(signals),
    };
    let mut policy: Box<dyn Policy> = match policy {
        PolicyKind::Fixed => Box::new(FixedTimePolicy::from_spaces(env.action_spaces())),
        PolicyKind::Graph => Box::new(GraphPolicy::new(map)),
        PolicyKind::Random => Box::new(RandomPolicy::new(env.action_spaces().to_vec(), seed)),
    };

    tracing::info!(connection = env.connection(), episodes, "starting benchmark");
    for _ in 0..episodes {
        let mut observations = env.reset()?;
        let mut episode_return = 0.0f32;
        let mut steps = 0u32;
        loop {
            let obs_slice = observations
                .as_ordered()
                .expect("bench runs with ordered returns");
            let actions = policy.act(obs_slice, None);
            let out = env.step(ActionBatch::Ordered(actions))?;
            episode_return += out.rewards.as_ordered().unwrap_or(&[]).iter().sum::<f32>();
            steps += 1;
            observations = out.observations;
            if out.done {
                break;
            }
        }
        tracing::info!(
            episode = env.episode(),
            steps,
            active = env.num_agents(),
            episode_return,
            "episode finished"
        );
        println!(
            "episode {}: steps={} active={} return={:.1}",
            env.episode(),
            steps,
            env.num_agents(),
            episode_return
        );
    }
    env.close()?;
    println!("benchmark complete: {} episodes", episodes);
    Ok(())
}

fn demo(signals: usize, steps: u32) -> Result<()> {
    let dir = std::env::temp_dir().join("sigbench-demo");
    let config = EnvConfig::new("demo", format!("mock{signals}"))
        .end_time(f64::from(steps) * 10.0)
        .log_dir(dir)
        .ordered_returns(true);
    let mut env = MultiSignalEnv::new(
        MockNetwork::with_grid(signals, 0),
        config,
        obs::queue_state(),
        obs::queue(),
    )?;
    let mut policy = FixedTimePolicy::from_spaces(env.action_spaces());

    let mut observations = env.reset()?;
    for _ in 0..steps {
        let obs_slice = observations
            .as_ordered()
            .expect("demo runs with ordered returns");
        let actions = policy.act(obs_slice, None);
        let out = env.step(ActionBatch::Ordered(actions))?;
        let time = env.metrics().last().map(|m| m.step).unwrap_or(0.0);
        println!(
            "t={:>6.1} rewards={:?}",
            time,
            out.rewards.as_ordered().unwrap_or(&[])
        );
        observations = out.observations;
        if out.done {
            break;
        }
    }
    env.close()?;
    Ok(())
}
