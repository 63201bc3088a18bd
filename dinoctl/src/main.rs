// Chrome Dino control CLI
// List the registered environments and run a random agent against one

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dino_rl_core::{ActionSpace, Environment, EnvironmentConfig, TrackedEnvironment};
use dino_rl_env::{env_spec, list_envs, make_env, make_env_with, ChromeDinoEnv, DinoGame, ScriptedGame};

#[derive(Parser)]
#[command(name = "dinoctl")]
#[command(about = "Chrome Dino environment CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered environments
    List,

    /// Run a random agent
    Run {
        /// Environment id
        #[arg(short, long, default_value = "ChromeDinoGAOneObstacleNoBrowser-v0")]
        env: String,

        /// Number of episodes
        #[arg(long, default_value = "3")]
        episodes: usize,

        /// Stop an episode after this many steps
        #[arg(long, default_value = "1000")]
        max_steps: usize,

        /// Reward mode (normal, penalization)
        #[arg(long)]
        score_mode: Option<String>,

        /// Use the in-memory scripted game instead of a browser
        #[arg(long)]
        scripted: bool,

        /// Ticks before the scripted game crashes
        #[arg(long, default_value = "50")]
        crash_after: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => list(),
        Commands::Run {
            env,
            episodes,
            max_steps,
            score_mode,
            scripted,
            crash_after,
        } => {
            let mut config = EnvironmentConfig {
                max_steps: Some(max_steps),
                ..EnvironmentConfig::default()
            };
            if let Some(mode) = score_mode {
                config = config.with_param("score_mode", mode);
            }

            if scripted {
                let game = ScriptedGame::new().with_crash_after(crash_after);
                let env = make_env_with(&env, game, config)
                    .await
                    .with_context(|| format!("Failed to build {env}"))?;
                run(env, episodes, max_steps).await
            } else {
                let env = make_env(&env, config)
                    .await
                    .with_context(|| format!("Failed to launch {env}"))?;
                run(env, episodes, max_steps).await
            }
        }
    }
}

fn list() -> Result<()> {
    println!("{:<42} {:<8} {:<10} VARIANT", "ID", "RENDER", "ACCELERATE");
    for id in list_envs() {
        let spec = env_spec(id)?;
        println!(
            "{:<42} {:<8} {:<10} {:?}",
            spec.id, spec.render, spec.accelerate, spec.variant
        );
    }
    Ok(())
}

async fn run<G: DinoGame>(env: ChromeDinoEnv<G>, episodes: usize, max_steps: usize) -> Result<()> {
    tracing::info!(episodes, max_steps, "starting random agent");
    println!("Actions: {}", env.get_action_meanings().join(", "));
    let action_space = env.discrete_space();
    let mut env = TrackedEnvironment::new(env);
    let mut episode_rewards = Vec::with_capacity(episodes);

    for episode in 0..episodes {
        env.reset().await.context("Reset failed")?;
        let mut score = 0;

        for _ in 0..max_steps {
            let step = env.step(action_space.sample()).await.context("Step failed")?;
            score = step.info.get("score").and_then(serde_json::Value::as_u64).unwrap_or(score);
            if step.done || step.truncated {
                break;
            }
        }

        let info = env.episode_info().context("No episode recorded")?;
        episode_rewards.push(info.total_reward);
        println!(
            "Episode {}: Total Reward = {:.2}, Steps = {}, Score = {}",
            episode + 1,
            info.total_reward,
            info.steps,
            score
        );
    }

    if !episode_rewards.is_empty() {
        let avg_reward = episode_rewards.iter().sum::<f64>() / episode_rewards.len() as f64;
        println!("\nAverage Reward over {episodes} episodes: {avg_reward:.2}");
    }

    env.close().await.context("Close failed")?;
    Ok(())
}
