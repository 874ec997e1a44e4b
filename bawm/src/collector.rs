//! # Collector Lifecycle
//!
//! Owns the attachment of every sensor: load → attach → wait for a stop
//! signal → shutdown. The hot path never touches this code; its only job is
//! to keep the programs attached and to tear them down cleanly.
//!
//! Kernel access sits behind [`SensorBackend`] so the lifecycle rules
//! (all-or-nothing attach, idempotent shutdown) hold for any backend. The
//! production backend is [`AyaBackend`](crate::profiling::AyaBackend).

use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use tokio::signal::unix::{signal, SignalKind};

use crate::domain::{AttachError, CollectorError, LoadError};
use crate::profiling::{Sensor, SENSORS};

/// Loads, attaches and detaches sensor programs
pub trait SensorBackend {
    /// Handle for one live attachment
    type Link;

    /// Verify and load the program behind `sensor`
    ///
    /// # Errors
    /// Returns [`LoadError`] if the program is missing or rejected.
    fn load(&mut self, sensor: &Sensor) -> Result<(), LoadError>;

    /// Wire a loaded program to its tracepoint
    ///
    /// # Errors
    /// Returns [`AttachError`] if the tracepoint cannot be hooked.
    fn attach(&mut self, sensor: &Sensor) -> Result<Self::Link, AttachError>;

    /// Undo one [`attach`](Self::attach)
    ///
    /// # Errors
    /// Returns [`AttachError::Detach`] if the kernel refuses.
    fn detach(&mut self, sensor: &Sensor, link: Self::Link) -> Result<(), AttachError>;

    /// Release the backend once every link is gone
    fn release(self)
    where
        Self: Sized,
    {
    }
}

/// Why [`Collector::run_until_signaled`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Interrupt => write!(f, "SIGINT"),
            StopReason::Terminate => write!(f, "SIGTERM"),
        }
    }
}

pub struct Collector<B: SensorBackend> {
    backend: Option<B>,
    sensors: &'static [Sensor],
    links: Vec<(&'static Sensor, B::Link)>,
}

impl<B: SensorBackend> Collector<B> {
    /// Load every sensor program through `backend`
    ///
    /// # Errors
    /// Returns the first [`LoadError`]; nothing is attached at that point.
    pub fn open_and_load(backend: B) -> Result<Self, LoadError> {
        Self::with_sensors(backend, &SENSORS)
    }

    /// Like [`open_and_load`](Self::open_and_load) with a custom sensor table
    ///
    /// # Errors
    /// Returns the first [`LoadError`].
    pub fn with_sensors(mut backend: B, sensors: &'static [Sensor]) -> Result<Self, LoadError> {
        for sensor in sensors {
            backend.load(sensor)?;
        }
        info!("✓ Loaded {} sensor programs", sensors.len());
        Ok(Self { backend: Some(backend), sensors, links: Vec::with_capacity(sensors.len()) })
    }

    /// Attach every loaded sensor, or none
    ///
    /// On the first failure the sensors attached so far are detached in
    /// reverse order before the error is returned.
    ///
    /// # Errors
    /// Returns the [`AttachError`] of the sensor that failed.
    pub fn attach(&mut self) -> Result<(), AttachError> {
        let backend = self.backend.as_mut().ok_or(AttachError::ShutDown)?;

        for sensor in self.sensors {
            if self.links.iter().any(|(attached, _)| std::ptr::eq(*attached, sensor)) {
                continue;
            }
            match backend.attach(sensor) {
                Ok(link) => {
                    info!("✓ Attached {} to {}", sensor.program, sensor.tracepoint);
                    self.links.push((sensor, link));
                }
                Err(e) => {
                    warn!("Attach failed, rolling back {} sensors", self.links.len());
                    self.detach_all();
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Number of sensors currently attached
    #[must_use]
    pub fn attached(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    /// Wake every `poll` until `stop` completes
    ///
    /// `on_tick` runs on every wake while the backend is alive.
    pub async fn run_until<S, R, F>(&mut self, stop: S, poll: Duration, mut on_tick: F) -> R
    where
        S: Future<Output = R>,
        F: FnMut(&mut B),
    {
        tokio::pin!(stop);
        loop {
            tokio::select! {
                reason = &mut stop => return reason,
                () = tokio::time::sleep(poll) => {
                    if let Some(backend) = self.backend.as_mut() {
                        on_tick(backend);
                    }
                }
            }
        }
    }

    /// Block until SIGINT or SIGTERM, waking every `poll`
    ///
    /// # Errors
    /// Returns [`CollectorError::Signal`] if the handlers cannot be installed.
    pub async fn run_until_signaled<F>(
        &mut self,
        poll: Duration,
        on_tick: F,
    ) -> Result<StopReason, CollectorError>
    where
        F: FnMut(&mut B),
    {
        let mut sigterm = signal(SignalKind::terminate()).map_err(CollectorError::Signal)?;
        let stop = async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => StopReason::Interrupt,
                _ = sigterm.recv() => StopReason::Terminate,
            }
        };

        let reason = self.run_until(stop, poll, on_tick).await;
        info!("Received {reason}, shutting down");
        Ok(reason)
    }

    /// Detach everything and release the backend
    ///
    /// Safe to call repeatedly and after a failed attach.
    pub fn shutdown(&mut self) {
        self.detach_all();
        if let Some(backend) = self.backend.take() {
            backend.release();
            info!("✓ Sensors released");
        }
    }

    fn detach_all(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        while let Some((sensor, link)) = self.links.pop() {
            if let Err(e) = backend.detach(sensor, link) {
                warn!("{e}");
            }
        }
    }
}

impl<B: SensorBackend> Drop for Collector<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
