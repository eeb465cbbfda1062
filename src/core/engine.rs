// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! The controller - owner of all derived state
//!
//! Every read-modify-write of the shared state happens under one lock. I/O
//! (history store queries and writes, actuator publishing) is done outside
//! of it: queries before taking the lock, commands after releasing it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::config::{secs, Config};
use crate::db::HistoryStore;
use crate::detection::{
    ActuatorCommand, AlarmArbiter, AlarmEdge, AlarmSourceKind, DistanceHistory, DoorTimer,
    LightTimer, MotionFusion, Occupancy, ShakeDetector, ShakeThresholds, CONTROLLER_SOURCE,
};
use crate::sensors::{DeviceClassifier, EventValue, RawMessage, SensorEvent};
use super::{EventBus, StatusSnapshot};

/// Everything guarded by the controller lock
struct ControllerState {
    history: DistanceHistory,
    occupancy: Occupancy,
    doors: DoorTimer,
    motion: MotionFusion,
    shake: ShakeDetector,
    lights: LightTimer,
    arbiter: AlarmArbiter,
    last_values: BTreeMap<String, serde_json::Value>,
    messages_received: u64,
    messages_dropped: u64,
}

impl ControllerState {
    fn new(config: &Config) -> Self {
        let d = &config.detection;
        Self {
            history: DistanceHistory::new(secs(d.history_window_secs)),
            occupancy: Occupancy::new(d.trend_epsilon, secs(d.empty_grace_secs)),
            doors: DoorTimer::new(secs(d.door_unlocked_secs)),
            motion: MotionFusion::new(),
            shake: ShakeDetector::new(ShakeThresholds {
                accel_deviation_g: d.accel_deviation_g,
                gyro_threshold: d.gyro_threshold,
                cooldown: secs(d.shake_cooldown_secs),
                hold: secs(d.alarm_hold_secs),
            }),
            lights: LightTimer::new(secs(d.light_on_secs)),
            arbiter: AlarmArbiter::new(),
            last_values: BTreeMap::new(),
            messages_received: 0,
            messages_dropped: 0,
        }
    }
}

/// Event-driven state aggregation and alarm decision engine
pub struct Controller {
    config: Arc<Config>,
    classifier: DeviceClassifier,
    state: Mutex<ControllerState>,
    store: Option<Arc<dyn HistoryStore>>,
    event_bus: Arc<EventBus>,
    start_time: Instant,
}

impl Controller {
    pub fn new(
        config: Arc<Config>,
        store: Option<Arc<dyn HistoryStore>>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            classifier: DeviceClassifier::new(config.devices.clone()),
            state: Mutex::new(ControllerState::new(&config)),
            config,
            store,
            event_bus,
            start_time: Instant::now(),
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Drain the ingestion channel until shutdown
    pub async fn run(
        &self,
        mut inbound: mpsc::Receiver<RawMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("Controller ingest loop started");

        loop {
            tokio::select! {
                msg = inbound.recv() => {
                    match msg {
                        Some(raw) => self.handle_blocking(&raw),
                        None => {
                            info!("Ingestion channel closed");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Controller shutting down...");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Ingest one message with the current time and dispatch resulting commands
    pub fn handle(&self, raw: &RawMessage) {
        let commands = self.ingest(raw, Utc::now());
        self.dispatch(commands);
    }

    /// `handle` from async context. The history store does blocking SQLite
    /// I/O, so on a multi-thread runtime the worker is handed over first.
    fn handle_blocking(&self, raw: &RawMessage) {
        let multi_thread = Handle::try_current()
            .map(|h| h.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false);

        if self.store.is_some() && multi_thread {
            tokio::task::block_in_place(|| self.handle(raw));
        } else {
            self.handle(raw);
        }
    }

    /// Periodic re-evaluation with the current time
    pub fn on_tick(&self) {
        let commands = self.tick(Utc::now());
        self.dispatch(commands);
    }

    /// Hand commands to the publisher; never blocks
    pub fn dispatch(&self, commands: Vec<ActuatorCommand>) {
        for command in commands {
            info!(
                "Command {} -> {:?} {}",
                command.target,
                command.kind(),
                command.payload.reason.as_deref().unwrap_or("")
            );
            self.event_bus.publish_command(command);
        }
    }

    /// Apply one raw message at `now`, returning the commands to send
    pub fn ingest(&self, raw: &RawMessage, now: DateTime<Utc>) -> Vec<ActuatorCommand> {
        // our own retained snapshot comes back under a broad subscription
        if raw.topic == self.config.streaming.status_topic {
            trace!("Ignoring own status on {}", raw.topic);
            return Vec::new();
        }

        if raw.command.is_some() {
            if self.is_manual_off(raw) {
                self.manual_clear(now);
            }
            return Vec::new();
        }

        let event = match self.classifier.normalize(raw, now) {
            Ok(event) => event,
            Err(e) => {
                debug!("Dropping message on {}: {}", raw.topic, e);
                let mut state = self.state.lock();
                state.messages_received += 1;
                state.messages_dropped += 1;
                if let Some(id) = raw.device_id() {
                    state.last_values.insert(id.to_string(), raw.value.clone());
                }
                return Vec::new();
            }
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.write(&event) {
                warn!("History write failed for {}: {}", event.device_id, e);
            }
        }

        let queried = self.query_paired_distance(&event, now);

        let mut state = self.state.lock();
        state.messages_received += 1;
        state.last_values.insert(event.device_id.clone(), raw.value.clone());
        let mut commands = self.apply(&mut state, &event, queried, now);
        commands.extend(self.sync_alarm(&mut state));
        commands
    }

    /// Re-evaluate time-based transitions
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<ActuatorCommand> {
        let mut state = self.state.lock();
        let mut commands = Vec::new();

        state.doors.tick(now);
        if state.shake.expire(now) {
            info!("Movement alarm hold elapsed");
        }

        for light in state.lights.tick(now) {
            debug!("Light {} timed out", light);
            commands.push(ActuatorCommand::off(&self.config.streaming.actuator_topic(&light)));
        }

        commands.extend(self.sync_alarm(&mut state));
        commands
    }

    /// Operator override: clear every alarm source and door latch
    pub fn manual_clear(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.doors.clear_latches(now);
        state.motion.clear_all();
        state.shake.clear();
        state.arbiter.force_off();
        info!("Alarm manually cleared");
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock();

        let alarm_sources = AlarmSourceKind::ALL
            .iter()
            .map(|k| (k.name().to_string(), state.arbiter.source(*k).clone()))
            .collect();

        let distance_last_5 = state.history
            .devices()
            .map(|id| (id.to_string(), state.history.recent(id, 5)))
            .collect();

        StatusSnapshot {
            timestamp: Utc::now(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            people_count: state.occupancy.people_count(),
            empty_grace_until: state.occupancy.empty_grace_until(),
            alarm_on: state.arbiter.is_on(),
            alarm_reason: state.arbiter.reason().to_string(),
            alarm_sources,
            doors: state.doors.doors().clone(),
            distance_last_5,
            lights: state.lights.lights().clone(),
            sensors: state.last_values.clone(),
            messages_received: state.messages_received,
            messages_dropped: state.messages_dropped,
        }
    }

    fn is_manual_off(&self, raw: &RawMessage) -> bool {
        raw.topic == self.config.streaming.alarm_topic
            && raw.command.as_deref().map(|c| c.eq_ignore_ascii_case("OFF")).unwrap_or(false)
            && raw.source.as_deref() != Some(CONTROLLER_SOURCE)
    }

    /// History store lookup for a PIR hit at an entry point
    fn query_paired_distance(&self, event: &SensorEvent, now: DateTime<Utc>) -> Vec<f64> {
        let EventValue::Motion { detected: true } = event.value else {
            return Vec::new();
        };
        let (Some(store), Some(distance_id)) =
            (&self.store, self.config.devices.paired_distance(&event.device_id))
        else {
            return Vec::new();
        };

        let lookback = secs(self.config.detection.query_lookback_secs);
        match store.query_recent(distance_id, 3, lookback, now) {
            Ok(samples) => samples.iter().map(|s| s.distance_cm).collect(),
            Err(e) => {
                warn!("History query failed for {}: {}", distance_id, e);
                Vec::new()
            }
        }
    }

    fn apply(
        &self,
        state: &mut ControllerState,
        event: &SensorEvent,
        queried: Vec<f64>,
        now: DateTime<Utc>,
    ) -> Vec<ActuatorCommand> {
        let mut commands = Vec::new();
        let id = event.device_id.as_str();

        match &event.value {
            EventValue::Door { open } => {
                state.doors.update(id, *open, now);
            }
            EventValue::Motion { detected: false } => {}
            EventValue::Motion { detected: true } => {
                if let Some(light) = self.config.devices.triggered_light(id) {
                    if state.lights.trigger(light, now) {
                        let ms = state.lights.on_for().num_milliseconds().max(0) as u64;
                        let topic = self.config.streaming.actuator_topic(light);
                        commands.push(ActuatorCommand::on(&topic, None, Some(ms)));
                    }
                }

                let distance_id = self.config.devices.paired_distance(id);
                let lookback = secs(self.config.detection.query_lookback_secs);
                let outcome = distance_id.map(|dus| {
                    let samples = if queried.len() >= 3 {
                        queried
                    } else {
                        state.history
                            .recent_within(dus, 3, lookback, now)
                            .iter()
                            .map(|s| s.distance_cm)
                            .collect()
                    };
                    let outcome = state.occupancy.infer(&samples, now);
                    info!(
                        "{} -> {:?} via {} (people: {})",
                        id, outcome.direction, dus, outcome.people_count
                    );
                    outcome
                });

                state.motion.on_detected(id, distance_id, outcome.as_ref(), &state.occupancy, now);
            }
            EventValue::Distance { cm } => {
                state.history.record(id, now, *cm);
            }
            EventValue::Axis { kind, axis, reading } => {
                state.shake.update(id, *kind, *axis, *reading, now);
            }
            EventValue::Raw(_) => {}
        }

        commands
    }

    /// Push component state into the arbiter and turn an edge into a command
    fn sync_alarm(&self, state: &mut ControllerState) -> Option<ActuatorCommand> {
        let doors_latched = state.doors.any_latched();
        let door_reason = state.doors.reasons().join(", ");
        state.arbiter.set_source(AlarmSourceKind::DsUnlocked, doors_latched, door_reason);

        let motion_active = state.motion.active();
        let motion_reason = state.motion.reasons().join(", ");
        state.arbiter.set_source(AlarmSourceKind::MotionEmpty, motion_active, motion_reason);

        let shake_active = state.shake.active();
        let shake_reason = state.shake.reason().unwrap_or_default().to_string();
        state.arbiter.set_source(AlarmSourceKind::GsgMove, shake_active, shake_reason);

        let topic = &self.config.streaming.alarm_topic;
        state.arbiter.recompute().map(|edge| match edge {
            AlarmEdge::On { reason } => ActuatorCommand::on(topic, Some(reason), None),
            AlarmEdge::Off => ActuatorCommand::off(topic),
        })
    }
}
