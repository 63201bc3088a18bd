//! Full episodes against the scripted game

use dino_rl_core::{DiscreteAction, Environment, EnvironmentConfig, Observation, ObservationSpace, Reward};
use dino_rl_env::oracle::scripted::Command;
use dino_rl_env::{make_env_with, DinoError, Key, Lifecycle, ScriptedGame, ScriptedObstacle};

fn track() -> ScriptedGame {
    ScriptedGame::new()
        .with_dino(50.0, 93.0)
        .with_speed(6.0)
        .with_obstacles(vec![ScriptedObstacle { x: 320.0, y: 105.0, width: 17.0, height: 35.0 }])
}

#[tokio::test]
async fn test_one_obstacle_episode_until_crash() {
    let game = track().with_crash_after(20);
    let mut env = make_env_with("ChromeDinoGAOneObstacleNoBrowser-v0", game.clone(), EnvironmentConfig::default())
        .await
        .unwrap();
    let space = env.observation_space();

    let (observation, _) = env.reset().await.unwrap();
    assert_eq!(observation.shape(), vec![7]);
    assert!(space.contains(&observation));

    let first = env.step(DiscreteAction(1)).await.unwrap();
    assert!(!first.done);
    assert!(space.contains(&first.observation));

    let mut last = first;
    let mut steps = 1;
    while !last.done {
        last = env.step(DiscreteAction(0)).await.unwrap();
        assert!(space.contains(&last.observation));
        steps += 1;
        assert!(steps <= 20, "scripted game should have crashed");
    }

    assert_eq!(last.reward, Reward(-1.0));
    assert_eq!(env.lifecycle(), Lifecycle::Crashed);
    assert!(game.journal().contains(&Command::Press(Key::Up)));

    env.close().await.unwrap();
    assert!(game.is_closed());
}

#[tokio::test]
async fn test_no_carry_over_between_episodes() {
    let game = track().with_crash_after(3);
    let config = EnvironmentConfig::default().with_param("score_mode", "normal");
    let mut env = make_env_with("ChromeDinoGATwoObstacle-v0", game, config).await.unwrap();

    let mut rewards = Vec::new();
    for _ in 0..2 {
        env.reset().await.unwrap();
        let mut episode = Vec::new();
        loop {
            let step = env.step(DiscreteAction(0)).await.unwrap();
            episode.push(step.reward);
            if step.done {
                break;
            }
        }
        rewards.push(episode);
    }

    assert_eq!(rewards[0], rewards[1]);
    assert_eq!(rewards[0], vec![Reward(0.0), Reward(1.0), Reward(2.0)]);
}

#[tokio::test]
async fn test_unsupported_input_mode_touches_nothing() {
    let game = track();
    let config = EnvironmentConfig::default().with_param("input_mode", "three_obstacle");

    let result = make_env_with("ChromeDinoRLPo-v0", game.clone(), config).await;
    let err = result.err().unwrap();
    let message = err.to_string();

    assert!(message.contains("three_obstacle"), "{message}");
    assert!(matches!(
        err,
        dino_rl_core::RLError::Other(ref inner)
            if matches!(inner.downcast_ref::<DinoError>(), Some(DinoError::UnsupportedInputMode(_)))
    ));
    assert_eq!(game.interactions(), 0);
}

#[tokio::test]
async fn test_pixel_episode_shapes_stay_fixed() {
    let game = track().with_crash_after(4);
    let mut env = make_env_with("ChromeDinoNotNormNoBrowser-v0", game.clone(), EnvironmentConfig::default())
        .await
        .unwrap();
    let space = env.observation_space();

    let (observation, _) = env.reset().await.unwrap();
    assert_eq!(observation.shape(), vec![80, 80, 1]);

    game.set_dino(50.0, 40.0);
    for action in [1, 0, 5, 0] {
        let step = env.step(DiscreteAction(action)).await.unwrap();
        assert!(space.contains(&step.observation));
    }
}

#[tokio::test]
async fn test_raw_features_stay_in_declared_space() {
    let game = ScriptedGame::new()
        .with_dino(50.0, 93.0)
        .with_obstacles(vec![ScriptedObstacle { x: -20.0, y: 105.0, width: 17.0, height: 35.0 }]);
    let config = EnvironmentConfig::default().with_param("norm", false);
    let mut env = make_env_with("ChromeDinoGAOneObstacle-v0", game, config).await.unwrap();
    let space = env.observation_space();

    let (observation, _) = env.reset().await.unwrap();
    assert!(space.contains(&observation), "{:?}", observation.to_vec());
    assert_eq!(observation.to_vec()[2], -20.0);
}
