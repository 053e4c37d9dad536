//! Reaching trial controller.
//!
//! One controller runs one trial: `Idle → AwaitingMap → Active → Finished`.
//! Everything the trial listens to (map pushes, posterior pushes, keys) lives
//! in a [`TrialSubscriptions`] value that is dropped on finish or restart, so
//! nothing from a superseded trial can reach the world afterwards.
//!
//! Per key press the order is fixed: fold the move, redraw, check for a goal,
//! then queue the move for the session's [`Reporter`](crate::service::Reporter).

use std::sync::Arc;

use reachgrid::grid::GridWorld;
use reachgrid::input::{MovePipeline, MoveStep};
use reachgrid::protocol::{events, MapPayload, Policy, PosteriorPayload, RequestMap};
use reachgrid::render::{render, Surface};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{ReachError, Result};
use crate::keys::Keyboard;
use crate::service::{GameService, PlannerParams, ReportQueue};
use crate::transport::{Subscription, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    AwaitingMap,
    Active,
    Finished,
}

/// Completion signal of a reaching trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachingOutcome {
    pub trial_number: usize,
    /// Milliseconds from Active entry to the goal.
    pub duration_ms: u64,
    pub accepted_moves: u32,
    pub rejected_moves: u32,
}

/// Session-wide collaborators handed to every trial.
#[derive(Clone)]
pub struct TrialContext {
    pub transport: Transport,
    pub service: Arc<dyn GameService>,
    pub keyboard: Keyboard,
    pub params: PlannerParams,
    pub grid_number: u32,
}

struct TrialSubscriptions {
    maps: Subscription,
    posterior: Subscription,
    keys: broadcast::Receiver<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapHandled {
    Applied,
    Ignored,
    /// The trial number moved on while `initialize` was in flight.
    Superseded,
}

pub struct ReachingTrial<'a> {
    ctx: TrialContext,
    reports: ReportQueue,
    surface: &'a mut dyn Surface,
    world: GridWorld,
    moves: MovePipeline,
    policy: Option<Arc<Policy>>,
    state: TrialState,
    trial_number: usize,
    started_at: Option<Instant>,
}

impl<'a> ReachingTrial<'a> {
    pub fn new(ctx: &TrialContext, reports: ReportQueue, surface: &'a mut dyn Surface) -> Self {
        Self {
            world: GridWorld::new(ctx.grid_number),
            ctx: ctx.clone(),
            reports,
            surface,
            moves: MovePipeline::new(),
            policy: None,
            state: TrialState::Idle,
            trial_number: 0,
            started_at: None,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> TrialState {
        self.state
    }

    #[allow(dead_code)]
    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    /// Run until the goal is reached.
    ///
    /// A new value on `trial_number` while running restarts the trial from
    /// `AwaitingMap` with fresh subscriptions.
    pub async fn run(&mut self, trial_number: &mut watch::Receiver<usize>) -> Result<ReachingOutcome> {
        if self.state == TrialState::Finished {
            return Err(ReachError::TrialFinished(self.trial_number));
        }
        let mut numbers_open = true;

        'trial: loop {
            self.trial_number = *trial_number.borrow_and_update();
            let mut subs = self.request_map();

            loop {
                tokio::select! {
                    biased;

                    changed = trial_number.changed(), if numbers_open => {
                        if changed.is_err() {
                            numbers_open = false;
                            continue;
                        }
                        self.restart(*trial_number.borrow());
                        drop(subs);
                        continue 'trial;
                    }

                    map = subs.maps.next() => {
                        let map = map.ok_or(ReachError::StreamClosed(events::INITIALIZE_GAME))?;
                        if self.on_map(map, trial_number).await? == MapHandled::Superseded {
                            self.restart(*trial_number.borrow());
                            drop(subs);
                            continue 'trial;
                        }
                    }

                    posterior = subs.posterior.next() => {
                        let posterior =
                            posterior.ok_or(ReachError::StreamClosed(events::UPDATE_POSTERIOR))?;
                        self.on_posterior(posterior)?;
                    }

                    key = subs.keys.recv() => match key {
                        Ok(code) => {
                            if let Some(outcome) = self.on_key(&code) {
                                drop(subs);
                                return Ok(outcome);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Dropped {} key presses that arrived too fast", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(ReachError::StreamClosed("keyboard"));
                        }
                    },
                }
            }
        }
    }

    fn restart(&mut self, next: usize) {
        info!(
            "Trial number changed from {} to {}; requesting a new map",
            self.trial_number, next
        );
        self.state = TrialState::Idle;
    }

    fn request_map(&mut self) -> TrialSubscriptions {
        self.state = TrialState::AwaitingMap;
        self.policy = None;
        self.started_at = None;

        // Subscribe before asking so a fast reply cannot slip past.
        let subs = TrialSubscriptions {
            maps: self.ctx.transport.subscribe(events::INITIALIZE_GAME),
            posterior: self.ctx.transport.subscribe(events::UPDATE_POSTERIOR),
            keys: self.ctx.keyboard.subscribe(),
        };
        self.ctx.transport.emit(
            events::REQUEST_MAP,
            &RequestMap {
                trial_number: self.trial_number,
            },
        );
        debug!("Trial {}: map requested", self.trial_number);
        subs
    }

    async fn on_map(
        &mut self,
        raw: Value,
        trial_number: &mut watch::Receiver<usize>,
    ) -> Result<MapHandled> {
        if self.state != TrialState::AwaitingMap {
            warn!("Trial {}: ignoring map received while {:?}", self.trial_number, self.state);
            return Ok(MapHandled::Ignored);
        }
        let payload: MapPayload = serde_json::from_value(raw).map_err(|source| {
            ReachError::Payload {
                event: events::INITIALIZE_GAME,
                source,
            }
        })?;
        let map = payload.to_map();
        map.validate(self.world.grid_number())?;

        self.world.reset_from_map(&map);
        self.moves.reset();

        // A restart must not wait out a slow planner.
        let initialized = tokio::select! {
            biased;
            Ok(()) = trial_number.changed() => return Ok(MapHandled::Superseded),
            result = self.ctx.service.initialize(&payload, map.start, self.ctx.params) => result,
        };
        self.policy = match initialized {
            Ok(policy) => Some(Arc::new(policy)),
            Err(e) => {
                error!(
                    "Trial {}: initialize failed ({}); moves will not be reported",
                    self.trial_number, e
                );
                None
            }
        };

        self.redraw();
        self.started_at = Some(Instant::now());
        self.state = TrialState::Active;
        info!(
            "Trial {}: map ready, start {} with {} goals and {} blocks",
            self.trial_number,
            map.start,
            map.goals.len(),
            map.blocks.len()
        );
        Ok(MapHandled::Applied)
    }

    fn on_posterior(&mut self, raw: Value) -> Result<()> {
        if self.state != TrialState::Active {
            debug!("Trial {}: posterior before map, dropped", self.trial_number);
            return Ok(());
        }
        let posterior: PosteriorPayload = serde_json::from_value(raw).map_err(|source| {
            ReachError::Payload {
                event: events::UPDATE_POSTERIOR,
                source,
            }
        })?;
        self.world.update_beliefs(&posterior.weights())?;
        self.redraw();
        Ok(())
    }

    fn on_key(&mut self, code: &str) -> Option<ReachingOutcome> {
        if self.state != TrialState::Active {
            debug!("Trial {}: key {} before map, dropped", self.trial_number, code);
            return None;
        }
        let step = self.moves.fold_key(&mut self.world, code)?;
        self.redraw();

        let reached = self.world.is_goal_reached(step.to);
        if step.accepted() {
            self.report(step);
        }
        reached.then(|| self.finish())
    }

    fn report(&self, step: MoveStep) {
        match &self.policy {
            Some(policy) => self
                .reports
                .push(step.from, step.direction, Arc::clone(policy)),
            None => debug!("No policy; move {} -> {} not reported", step.from, step.to),
        }
    }

    fn finish(&mut self) -> ReachingOutcome {
        self.state = TrialState::Finished;
        let duration_ms = self
            .started_at
            .map(|t| t.elapsed().as_millis().min(u64::MAX as u128) as u64)
            .unwrap_or(0);

        info!(
            "Congratulations! Trial {} reached the goal at {} in {} ms",
            self.trial_number,
            self.world.player(),
            duration_ms
        );
        ReachingOutcome {
            trial_number: self.trial_number,
            duration_ms,
            accepted_moves: self.moves.accepted(),
            rejected_moves: self.moves.rejected(),
        }
    }

    fn redraw(&mut self) {
        render(&self.world, &mut *self.surface);
    }
}
