//! Ball motion simulator
//!
//! `BallState` holds the deterministic bounce physics and knows nothing about
//! time or I/O. `Simulator::start` runs it on its own timer task and hands
//! positions out through a channel, so the tick rate never depends on what
//! the signaling side is doing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::constants::POSITION_QUEUE_CAPACITY;
use crate::types::{now_millis, BallConfig, Position};
use crate::{log_debug, log_trace};

/// Which velocity components flipped during a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounce {
    /// Horizontal component flipped
    pub x: bool,
    /// Vertical component flipped
    pub y: bool,
}

/// Position and per-tick velocity of the ball
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallState {
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
    /// Horizontal displacement per tick
    pub dx: f64,
    /// Vertical displacement per tick
    pub dy: f64,
}

impl BallState {
    /// Ball at the frame centre moving `velocity` pixels per tick on both axes
    pub fn centered(config: &BallConfig, velocity: f64) -> Self {
        Self {
            x: f64::from(config.width()) / 2.0,
            y: f64::from(config.height()) / 2.0,
            dx: velocity,
            dy: velocity,
        }
    }

    /// Advance one tick.
    ///
    /// A component flips when the moved position reaches its bound on that
    /// axis; the position is then clamped into `[radius, dimension - radius]`.
    pub fn step(&mut self, config: &BallConfig) -> Bounce {
        let radius = f64::from(config.ball_radius());
        let max_x = f64::from(config.width()) - radius;
        let max_y = f64::from(config.height()) - radius;

        self.x += self.dx;
        self.y += self.dy;

        let bounce = Bounce {
            x: self.x <= radius || self.x >= max_x,
            y: self.y <= radius || self.y >= max_y,
        };
        if bounce.x {
            self.dx = -self.dx;
        }
        if bounce.y {
            self.dy = -self.dy;
        }

        self.x = self.x.clamp(radius, max_x);
        self.y = self.y.clamp(radius, max_y);
        bounce
    }

    /// Integer-rounded sample of the current position
    pub fn position(&self, timestamp: i64) -> Position {
        Position::new(self.x.round(), self.y.round(), timestamp)
    }
}

/// Entry point for running simulations
pub struct Simulator;

impl Simulator {
    /// Start a simulation on its own task.
    ///
    /// One `Position` is emitted every `config.tick_interval()` until the
    /// handle is stopped or dropped, or the receiver goes away. Emission never
    /// waits on the consumer: when the queue is full the sample is dropped.
    pub fn start(config: BallConfig, velocity: f64) -> (SimulatorHandle, mpsc::Receiver<Position>) {
        let (tx, rx) = mpsc::channel(POSITION_QUEUE_CAPACITY);
        let stopped = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run_simulation(
            config,
            BallState::centered(&config, velocity),
            tx,
            stopped.clone(),
            ticks.clone(),
        ));

        let handle = SimulatorHandle { task: Some(task), stopped, ticks };
        (handle, rx)
    }
}

async fn run_simulation(
    config: BallConfig,
    mut state: BallState,
    tx: mpsc::Sender<Position>,
    stopped: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
) {
    let mut interval = tokio::time::interval(config.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately
    interval.tick().await;

    log_debug!("Simulator started at {} fps", config.frame_rate());
    loop {
        interval.tick().await;
        if stopped.load(Ordering::Acquire) {
            break;
        }

        state.step(&config);
        ticks.fetch_add(1, Ordering::Relaxed);

        match tx.try_send(state.position(now_millis())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log_trace!("Position queue full, dropping sample"),
            Err(TrySendError::Closed(_)) => break,
        }
    }
    log_debug!("Simulator stopped");
}

/// Owner of a running simulation.
///
/// Stopping is synchronous from the caller's point of view: once `stop`
/// returns no further position is emitted.
pub struct SimulatorHandle {
    task: Option<JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
}

impl SimulatorHandle {
    /// Halt the timer and release the task. Stopping twice is a no-op.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether `stop` has been called
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Number of ticks simulated so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
