//! The multi-signal episode orchestrator.

use super::{ActionBatch, EntryKind, ObsBatch, RewardBatch, SignalEntry, StepOutput};
use crate::config::EnvConfig;
use crate::metrics::{self, StepMetric};
use crate::obs::{RewardFn, SignalMap, StateFn};
use crate::signal::SignalController;
use crate::sim::{SessionRequest, SimSession, SimulatorBackend};
use crate::spaces::{BoxSpace, Discrete, DynSpace};
use crate::{EnvError, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Episodes on which one more intersection is handed to agent control.
const STAGGER_INTERVAL: u32 = 30;

/// Advance the session by `windows` window ticks, each `ratio` simulator
/// ticks. Sub-second scenarios run several simulator ticks per window tick.
fn advance_windows<S: SimSession>(session: &mut S, windows: u32, ratio: u32) -> Result<()> {
    for _ in 0..windows {
        for _ in 0..ratio {
            session.advance()?;
        }
    }
    Ok(())
}

/// Multi-intersection traffic-signal environment.
///
/// Owns one episode-scoped simulator session at a time and every active
/// [`SignalController`]. Each `step` takes one phase decision per active
/// intersection and advances the simulator a full decision window: the
/// transition interval first, with the previously committed phase still
/// physically active, then the commit of every latched phase, then the green
/// remainder. A phase change is therefore always preceded by exactly one full
/// transition interval; that is a safety invariant of the protocol, not an
/// optimization.
///
/// Intersections outside the active set keep running under the simulator's
/// baseline fixed program and produce no observations or rewards.
pub struct MultiSignalEnv<B: SimulatorBackend> {
    backend: B,
    config: EnvConfig,
    state_fn: StateFn,
    reward_fn: RewardFn,
    connection: String,
    session: Option<B::Session>,
    /// Raw phase programs per signal, captured once by the probe pass
    programs: HashMap<String, Vec<String>>,
    signals: SignalMap,
    /// Controllable intersections in fixed handover order
    all_ids: Vec<String>,
    /// Active prefix of `all_ids`; non-decreasing across episodes
    active_count: usize,
    /// Fixed ordering over everything ever observed, aggregators included
    entry_order: Vec<SignalEntry>,
    observation_spaces: Vec<DynSpace>,
    action_spaces: Vec<DynSpace>,
    /// 1-based episode counter; 0 until the first `reset`
    episode: u32,
    metrics: Vec<StepMetric>,
}

impl<B: SimulatorBackend> std::fmt::Debug for MultiSignalEnv<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiSignalEnv")
            .field("config", &self.config)
            .field("connection", &self.connection)
            .field("all_ids", &self.all_ids)
            .field("active_count", &self.active_count)
            .field("entry_order", &self.entry_order)
            .field("episode", &self.episode)
            .finish_non_exhaustive()
    }
}

impl<B: SimulatorBackend> MultiSignalEnv<B> {
    /// Build the environment with a probe session: detect signals and phase
    /// programs, prime one observation window, and establish the fixed
    /// intersection ordering and spaces. The probe session is closed before
    /// returning; the first episode starts on `reset`.
    pub fn new(
        mut backend: B,
        config: EnvConfig,
        state_fn: StateFn,
        reward_fn: RewardFn,
    ) -> Result<Self> {
        config.validate()?;

        let probe_label = format!(
            "{}-{}---{}-{}",
            config.run_name,
            config.map_name,
            state_fn.name(),
            reward_fn.name()
        );
        let mut session = backend.open(&SessionRequest {
            label: probe_label,
            net: config.net.clone(),
            route: route_for(&config, 1),
            episode: 1,
            gui: false,
        })?;

        let detected = session.signal_ids();
        let all_ids = if config.lights.is_empty() {
            detected.clone()
        } else {
            for id in &config.lights {
                if !detected.contains(id) {
                    session.close()?;
                    return Err(EnvError::Config(format!(
                        "configured light '{id}' not present in network"
                    )));
                }
            }
            config.lights.clone()
        };

        let mut programs = HashMap::new();
        for id in &all_ids {
            programs.insert(id.clone(), session.phase_program(id)?);
        }

        // Prime every controller once so the state function can report shapes.
        let mut signals: SignalMap = HashMap::new();
        for id in &all_ids {
            let mut controller = SignalController::new(&session, id.clone(), &programs[id]);
            controller.observe(&session, config.max_distance);
            signals.insert(id.clone(), controller);
        }
        let states = state_fn.call(&signals);
        session.close()?;

        // Fixed ordering: controllable signals in handover order, then any
        // aggregator pseudo-entries the state function contributed.
        let mut entry_order: Vec<SignalEntry> = all_ids
            .iter()
            .filter(|id| states.contains_key(*id))
            .map(|id| SignalEntry {
                id: id.clone(),
                kind: EntryKind::Intersection,
            })
            .collect();
        let mut extras: Vec<&String> = states
            .keys()
            .filter(|k| !all_ids.contains(*k))
            .collect();
        extras.sort();
        entry_order.extend(extras.into_iter().map(|id| SignalEntry {
            id: id.clone(),
            kind: EntryKind::Aggregator,
        }));

        let mut observation_spaces = Vec::new();
        let mut action_spaces = Vec::new();
        for entry in &entry_order {
            let shape = states[&entry.id].shape().to_vec();
            observation_spaces.push(DynSpace::Box(BoxSpace::unbounded(&shape)));
            if entry.kind == EntryKind::Intersection {
                let table_len = signals[&entry.id].phase_table().len();
                action_spaces.push(DynSpace::Discrete(Discrete::new(table_len)));
            }
        }

        let active_count = match config.initial_active {
            None => all_ids.len(),
            Some(0) => {
                return Err(EnvError::Config("initial_active must be at least 1".into()))
            }
            Some(k) => k.min(all_ids.len()),
        };

        let connection = format!(
            "{}-{}-{}-{}-{}",
            config.run_name,
            config.map_name,
            all_ids.len(),
            state_fn.name(),
            reward_fn.name()
        );
        tracing::info!(
            connection,
            signals = all_ids.len(),
            active = active_count,
            "environment constructed"
        );

        Ok(Self {
            backend,
            config,
            state_fn,
            reward_fn,
            connection,
            session: None,
            programs,
            signals: HashMap::new(),
            all_ids,
            active_count,
            entry_order,
            observation_spaces,
            action_spaces,
            episode: 0,
            metrics: Vec::new(),
        })
    }

    /// Terminate any prior session (flushing its metric log), open a fresh
    /// episode, run warmup, apply staggered activation, rebuild the active
    /// controllers, and return the initial observation.
    pub fn reset(&mut self) -> Result<ObsBatch> {
        if let Some(mut session) = self.session.take() {
            session.close()?;
            self.flush_metrics()?;
        }
        self.metrics.clear();
        self.episode += 1;

        let mut session = self.backend.open(&SessionRequest {
            label: self.connection.clone(),
            net: self.config.net.clone(),
            route: route_for(&self.config, self.episode),
            episode: self.episode,
            gui: self.config.gui,
        })?;

        advance_windows(&mut session, self.config.warmup, self.config.step_ratio)?;

        // Staggered handover: one more intersection on every 30th episode,
        // never fewer than before.
        if self.episode % STAGGER_INTERVAL == 0 && self.active_count < self.all_ids.len() {
            self.active_count += 1;
            tracing::info!(
                episode = self.episode,
                active = self.active_count,
                signal = %self.all_ids[self.active_count - 1],
                "intersection handed to agent control"
            );
        }

        self.signals.clear();
        for id in &self.all_ids[..self.active_count] {
            self.signals.insert(
                id.clone(),
                SignalController::new(&session, id.clone(), &self.programs[id]),
            );
        }
        for controller in self.signals.values_mut() {
            controller.observe(&session, self.config.max_distance);
        }

        let states = self.state_fn.call(&self.signals);
        self.session = Some(session);
        Ok(ObsBatch::from_keyed(
            states,
            &self.entry_order,
            self.config.ordered_returns,
        ))
    }

    /// Apply one phase decision per active intersection and advance the
    /// simulator by one decision window.
    ///
    /// The whole batch is validated before any tick is advanced: a missing or
    /// extra entry, or a phase index outside an intersection's phase table, is
    /// a hard error and the episode must be reset by the caller.
    pub fn step(&mut self, actions: ActionBatch) -> Result<StepOutput> {
        if self.session.is_none() {
            return Err(EnvError::NoEpisode);
        }

        let active: Vec<String> = self.all_ids[..self.active_count].to_vec();
        let keyed = actions.into_keyed(&active)?;

        for id in keyed.keys() {
            if !self.signals.contains_key(id) {
                return Err(EnvError::UnexpectedAction(id.clone()));
            }
        }
        for id in &active {
            let index = *keyed
                .get(id)
                .ok_or_else(|| EnvError::MissingAction(id.clone()))?;
            let table_len = self
                .signals
                .get(id)
                .map(|s| s.phase_table().len())
                .unwrap_or(0);
            if index >= table_len {
                return Err(EnvError::PhaseOutOfRange {
                    signal: id.clone(),
                    index,
                    len: table_len,
                });
            }
        }

        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return Err(EnvError::NoEpisode),
        };

        for id in &active {
            if let Some(signal) = self.signals.get_mut(id) {
                signal.prep_phase(keyed[id])?;
            }
        }

        // Transition interval: ticks advance with the previous phase still
        // physically active; the simulator's own program handles the yellow.
        advance_windows(session, self.config.yellow_length, self.config.step_ratio)?;
        for id in &active {
            if let Some(signal) = self.signals.get_mut(id) {
                signal.commit_phase(session)?;
            }
        }
        advance_windows(
            session,
            self.config.step_length - self.config.yellow_length,
            self.config.step_ratio,
        )?;
        for id in &active {
            if let Some(signal) = self.signals.get_mut(id) {
                signal.observe(session, self.config.max_distance);
            }
        }

        let time = session.time();
        let states = self.state_fn.call(&self.signals);
        let rewards = self.reward_fn.call(&self.signals);
        self.record_metrics(time, &active, &rewards);

        let done = time >= self.config.end_time;
        Ok(StepOutput {
            observations: ObsBatch::from_keyed(
                states,
                &self.entry_order,
                self.config.ordered_returns,
            ),
            rewards: RewardBatch::from_keyed(
                rewards,
                &self.entry_order,
                self.config.ordered_returns,
            ),
            done,
            episode: self.episode,
        })
    }

    /// Close the current session, flushing its metric log. Safe mid-episode;
    /// the next action is always a fresh `reset`.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.close()?;
            self.flush_metrics()?;
            self.metrics.clear();
        }
        Ok(())
    }

    fn record_metrics(&mut self, time: f64, active: &[String], rewards: &HashMap<String, f32>) {
        let mut reward = Vec::with_capacity(active.len());
        let mut max_queues = Vec::with_capacity(active.len());
        let mut queue_lengths = Vec::with_capacity(active.len());
        for id in active {
            let (total, max) = self
                .signals
                .get(id)
                .map(|s| s.queue_totals())
                .unwrap_or((0, 0));
            reward.push((id.clone(), rewards.get(id).copied().unwrap_or(0.0)));
            max_queues.push((id.clone(), max));
            queue_lengths.push((id.clone(), total));
        }
        self.metrics.push(StepMetric {
            step: time,
            reward,
            max_queues,
            queue_lengths,
        });
    }

    fn flush_metrics(&self) -> Result<()> {
        let dir = self.config.log_dir.join(&self.connection);
        metrics::write_episode(&dir, self.episode, &self.metrics)?;
        Ok(())
    }

    /// 1-based episode index; 0 before the first `reset`.
    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Intersections currently under agent control, in handover order.
    pub fn active_ids(&self) -> &[String] {
        &self.all_ids[..self.active_count]
    }

    /// Every controllable intersection, in handover order.
    pub fn all_ids(&self) -> &[String] {
        &self.all_ids
    }

    /// Number of agent-controlled intersections this episode.
    pub fn num_agents(&self) -> usize {
        self.active_count
    }

    /// Fixed ordering behind the sequence return convention.
    pub fn entry_order(&self) -> &[SignalEntry] {
        &self.entry_order
    }

    /// Observation spaces aligned with [`entry_order`](Self::entry_order).
    pub fn observation_spaces(&self) -> &[DynSpace] {
        &self.observation_spaces
    }

    /// Action spaces for the intersection entries of
    /// [`entry_order`](Self::entry_order); aggregator entries carry none.
    pub fn action_spaces(&self) -> &[DynSpace] {
        &self.action_spaces
    }

    /// Active controllers keyed by intersection id.
    pub fn signals(&self) -> &SignalMap {
        &self.signals
    }

    /// Metric rows recorded so far this episode.
    pub fn metrics(&self) -> &[StepMetric] {
        &self.metrics
    }

    /// Run-identifying connection label.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// The live session, if an episode is open. Exposed for backends whose
    /// tests inspect session state.
    pub fn session(&self) -> Option<&B::Session> {
        self.session.as_ref()
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }
}

fn route_for(config: &EnvConfig, episode: u32) -> Option<PathBuf> {
    config
        .route
        .as_ref()
        .map(|stem| PathBuf::from(format!("{}_{episode}.rou.xml", stem.display())))
}
