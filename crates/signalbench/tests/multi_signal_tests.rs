//! End-to-end orchestrator tests over the synthetic backend.

use ndarray::{ArrayD, IxDyn};
use signalbench::config::EnvConfig;
use signalbench::env::{ActionBatch, EntryKind, MultiSignalEnv};
use signalbench::obs::{self, StateFn};
use signalbench::spaces::DynSpace;
use signalbench::sim::MockNetwork;
use signalbench::EnvError;
use tempfile::TempDir;

fn config(log_dir: &TempDir) -> EnvConfig {
    EnvConfig::new("test", "mock")
        .end_time(20.0)
        .step_length(10)
        .yellow_length(4)
        .log_dir(log_dir.path())
}

fn env_with(
    signals: usize,
    cfg: EnvConfig,
) -> MultiSignalEnv<MockNetwork> {
    MultiSignalEnv::new(MockNetwork::with_grid(signals, 42), cfg, obs::wave(), obs::wait())
        .unwrap()
}

fn zero_actions(env: &MultiSignalEnv<MockNetwork>) -> ActionBatch {
    ActionBatch::Keyed(env.active_ids().iter().map(|id| (id.clone(), 0)).collect())
}

#[test]
fn test_two_steps_reach_end_time() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(2, config(&dir));

    let initial = env.reset().unwrap();
    assert_eq!(initial.len(), 2);

    let out1 = env.step(zero_actions(&env)).unwrap();
    assert!(!out1.done);
    assert_eq!(env.session().unwrap().tick(), 10);

    let out2 = env.step(zero_actions(&env)).unwrap();
    assert!(out2.done);
    assert_eq!(env.session().unwrap().tick(), 20);
    assert_eq!(out2.episode, 1);
}

#[test]
fn test_commits_happen_after_transition_interval() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(2, config(&dir));
    env.reset().unwrap();

    env.step(ActionBatch::Keyed(
        env.active_ids().iter().map(|id| (id.clone(), 1)).collect(),
    ))
    .unwrap();

    let commits = env.session().unwrap().commits();
    assert_eq!(commits.len(), 2);
    // The previous phase stays physically active through the yellow interval;
    // the new green lands exactly yellow_length window ticks in.
    for commit in commits {
        assert_eq!(commit.tick, 4);
        assert_eq!(commit.state, "rrGG");
    }

    env.step(zero_actions(&env)).unwrap();
    let commits = env.session().unwrap().commits();
    assert_eq!(commits.len(), 4);
    assert!(commits[2..].iter().all(|c| c.tick == 14));
}

#[test]
fn test_step_ratio_multiplies_ticks() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir).step_ratio(4);
    let backend = MockNetwork::with_grid(1, 7).tick_length(0.25);
    let mut env = MultiSignalEnv::new(backend, cfg, obs::wave(), obs::wait()).unwrap();
    env.reset().unwrap();

    let out = env.step(zero_actions(&env)).unwrap();
    // step_length * step_ratio simulator ticks, 0.25 s each
    assert_eq!(env.session().unwrap().tick(), 40);
    assert!(!out.done);
    assert_eq!(env.session().unwrap().commits()[0].tick, 16);
}

#[test]
fn test_done_iff_end_time_reached() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(1, config(&dir).end_time(35.0));
    env.reset().unwrap();
    for expected_done in [false, false, false, true] {
        let out = env.step(zero_actions(&env)).unwrap();
        assert_eq!(out.done, expected_done);
    }
}

#[test]
fn test_invalid_phase_index_advances_nothing() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(2, config(&dir));
    env.reset().unwrap();

    let mut actions: std::collections::HashMap<String, usize> =
        env.active_ids().iter().map(|id| (id.clone(), 0)).collect();
    actions.insert("ts1".into(), 5);

    let err = env.step(ActionBatch::Keyed(actions)).unwrap_err();
    assert!(matches!(
        err,
        EnvError::PhaseOutOfRange { index: 5, len: 2, .. }
    ));
    assert_eq!(env.session().unwrap().tick(), 0);
    assert!(env.session().unwrap().commits().is_empty());
}

#[test]
fn test_missing_action_fails_before_any_commit() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(2, config(&dir));
    env.reset().unwrap();

    let actions: std::collections::HashMap<String, usize> =
        [("ts0".to_string(), 0)].into_iter().collect();
    let err = env.step(ActionBatch::Keyed(actions)).unwrap_err();
    assert!(matches!(err, EnvError::MissingAction(id) if id == "ts1"));
    assert_eq!(env.session().unwrap().tick(), 0);
}

#[test]
fn test_unexpected_action_rejected() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(2, config(&dir));
    env.reset().unwrap();

    let mut actions: std::collections::HashMap<String, usize> =
        env.active_ids().iter().map(|id| (id.clone(), 0)).collect();
    actions.insert("ghost".into(), 0);
    let err = env.step(ActionBatch::Keyed(actions)).unwrap_err();
    assert!(matches!(err, EnvError::UnexpectedAction(id) if id == "ghost"));
}

#[test]
fn test_ordered_count_mismatch() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(3, config(&dir).ordered_returns(true));
    env.reset().unwrap();
    let err = env.step(ActionBatch::Ordered(vec![0])).unwrap_err();
    assert!(matches!(
        err,
        EnvError::ActionCountMismatch { expected: 3, actual: 1 }
    ));
}

#[test]
fn test_step_before_reset_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(1, config(&dir));
    let err = env.step(ActionBatch::Ordered(vec![0])).unwrap_err();
    assert!(matches!(err, EnvError::NoEpisode));
}

#[test]
fn test_staggered_activation_is_monotonic() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(3, config(&dir).initial_active(1));

    let mut last = env.active_ids().len();
    for episode in 1..=95u32 {
        env.reset().unwrap();
        let active = env.active_ids().len();
        assert!(active >= last, "active set shrank at episode {episode}");
        assert!(active - last <= 1);
        if active > last {
            assert_eq!(episode % 30, 0, "grew off-cadence at episode {episode}");
        }
        last = active;
        let expected = (1 + episode / 30).min(3) as usize;
        assert_eq!(active, expected);
    }
    assert_eq!(last, 3);
}

#[test]
fn test_inactive_signals_excluded_from_returns() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(3, config(&dir).initial_active(2));
    let initial = env.reset().unwrap();
    assert_eq!(initial.len(), 2);
    let keyed = initial.as_keyed().unwrap();
    assert!(keyed.contains_key("ts0") && keyed.contains_key("ts1"));
    assert!(!keyed.contains_key("ts2"));

    let out = env.step(zero_actions(&env)).unwrap();
    assert_eq!(out.observations.len(), 2);
    assert!(out.rewards.as_keyed().unwrap().len() == 2);
}

#[test]
fn test_conventions_carry_identical_information() {
    let dir = TempDir::new().unwrap();
    let mut keyed_env = env_with(2, config(&dir));
    let dir2 = TempDir::new().unwrap();
    let mut ordered_env = env_with(2, config(&dir2).ordered_returns(true));

    keyed_env.reset().unwrap();
    ordered_env.reset().unwrap();

    let keyed_out = keyed_env.step(zero_actions(&keyed_env)).unwrap();
    let ordered_out = ordered_env.step(ActionBatch::Ordered(vec![0, 0])).unwrap();

    let keyed = keyed_out.observations.as_keyed().unwrap();
    let ordered = ordered_out.observations.as_ordered().unwrap();
    for (entry, obs) in keyed_env.entry_order().iter().zip(ordered.iter()) {
        assert_eq!(&keyed[&entry.id], obs);
    }
}

#[test]
fn test_metrics_file_has_one_row_per_step() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(2, config(&dir));
    env.reset().unwrap();
    env.step(zero_actions(&env)).unwrap();
    env.step(zero_actions(&env)).unwrap();

    // Flushed on the next reset.
    env.reset().unwrap();
    let path = dir
        .path()
        .join(env.connection())
        .join("metrics_1.csv");
    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("10, "));
    assert!(lines[1].starts_with("20, "));
    assert!(lines[0].contains("ts0:"));
}

#[test]
fn test_close_mid_episode_flushes_metrics() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(1, config(&dir));
    env.reset().unwrap();
    env.step(zero_actions(&env)).unwrap();
    env.close().unwrap();

    let path = dir.path().join(env.connection()).join("metrics_1.csv");
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    assert!(env.session().is_none());
}

#[test]
fn test_backend_open_failure_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = MultiSignalEnv::new(MockNetwork::failing(), config(&dir), obs::wave(), obs::wait())
        .unwrap_err();
    assert!(matches!(err, EnvError::Config(_)));
}

#[test]
fn test_aggregator_entries_have_no_action_space() {
    let dir = TempDir::new().unwrap();

    // A state function that mixes a manager pseudo-entry into the ordering.
    let state_fn = StateFn::new("wave_mgr", |signals| {
        let mut states = obs::wave().call(signals);
        let mean = signals
            .values()
            .map(|s| s.queue_totals().0 as f32)
            .sum::<f32>()
            / signals.len().max(1) as f32;
        states.insert("top_mgr".into(), ArrayD::from_elem(IxDyn(&[1]), mean));
        states
    });

    let env = MultiSignalEnv::new(
        MockNetwork::with_grid(2, 42),
        config(&dir),
        state_fn,
        obs::wait(),
    )
    .unwrap();

    let order = env.entry_order();
    assert_eq!(order.len(), 3);
    assert_eq!(order[2].id, "top_mgr");
    assert_eq!(order[2].kind, EntryKind::Aggregator);
    assert!(order[..2].iter().all(|e| e.kind == EntryKind::Intersection));

    // One observation space per entry, actions only for real intersections.
    assert_eq!(env.observation_spaces().len(), 3);
    assert_eq!(env.action_spaces().len(), 2);
    assert!(matches!(env.action_spaces()[0], DynSpace::Discrete(ref d) if d.n == 2));
}

#[test]
fn test_explicit_light_list_overrides_detection() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.lights = vec!["ts2".into(), "ts0".into()];
    let env = env_with(3, cfg);
    assert_eq!(env.all_ids(), &["ts2".to_string(), "ts0".to_string()][..]);

    let dir2 = TempDir::new().unwrap();
    let mut bad = config(&dir2);
    bad.lights = vec!["nope".into()];
    let err = MultiSignalEnv::new(MockNetwork::with_grid(3, 1), bad, obs::wave(), obs::wait())
        .unwrap_err();
    assert!(matches!(err, EnvError::Config(_)));
}

#[test]
fn test_warmup_runs_before_control() {
    let dir = TempDir::new().unwrap();
    let mut env = env_with(1, config(&dir).end_time(40.0).warmup(3));
    env.reset().unwrap();
    assert_eq!(env.session().unwrap().tick(), 3);
    assert!(env.session().unwrap().commits().is_empty());
}
