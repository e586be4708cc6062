use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use u810::{
    attach, CalibrationSnapshot, CalibrationTracker, InputHost, ParamStore, Params, TouchDevice,
};

use crate::{
    errors::Result,
    worker::{CancelPipe, SessionHandle},
};

/// Where a panel sits on the host: bus number and device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PanelKey {
    pub bus: u8,
    pub address: u8,
}

impl fmt::Display for PanelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:03}", self.bus, self.address)
    }
}

/// Enumerates and opens the panels attached to the host.
pub trait PanelSource {
    type Panel: TouchDevice;

    fn present(&mut self) -> Result<Vec<PanelKey>>;
    fn open(&mut self, key: PanelKey) -> Result<Self::Panel>;
}

/// Keeps one session per attached panel and follows the parameter store.
///
/// Every call to [`Supervisor::tick`] reloads the parameters, releases
/// sessions whose stream has ended, writes out the calibration range and,
/// once per rescan period, attaches any panel without a session.
pub struct Supervisor<B, H, S> {
    bus: B,
    host: H,
    store: S,
    tracker: Arc<CalibrationTracker>,
    params: Params,
    sessions: BTreeMap<PanelKey, SessionHandle>,
    persisted: CalibrationSnapshot,
    rescan: Duration,
    next_scan: Instant,
}

impl<B, H, S> Supervisor<B, H, S>
where
    B: PanelSource,
    <B::Panel as TouchDevice>::Pipe: CancelPipe + Send + 'static,
    H: InputHost,
    H::Sink: Send + 'static,
    S: ParamStore,
{
    pub fn new(bus: B, host: H, store: S, rescan: Duration) -> Self {
        let params = store.load().unwrap_or_else(|e| {
            warn!("Can't read parameters, using defaults: {e}");
            Params::default()
        });
        Self {
            bus,
            host,
            store,
            tracker: Arc::new(CalibrationTracker::new()),
            params,
            sessions: BTreeMap::new(),
            persisted: CalibrationSnapshot::default(),
            rescan,
            next_scan: Instant::now(),
        }
    }

    pub fn tracker(&self) -> &Arc<CalibrationTracker> {
        &self.tracker
    }

    pub fn attached(&self) -> impl Iterator<Item = PanelKey> + '_ {
        self.sessions.keys().copied()
    }

    pub fn tick(&mut self) {
        match self.store.load() {
            Ok(params) => self.apply(params),
            Err(e) => warn!("Can't read parameters: {e}"),
        }

        let ended: Vec<PanelKey> = self
            .sessions
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(key, _)| *key)
            .collect();
        for key in ended {
            info!("{key}: report stream ended");
            self.release(key);
        }

        self.persist_calibration(false);

        if Instant::now() >= self.next_scan {
            self.scan();
        }
    }

    fn apply(&mut self, params: Params) {
        if params.calibration_reset != self.params.calibration_reset {
            info!("Calibration reset requested");
            self.tracker.reset();
            self.write_calibration(CalibrationSnapshot::default());
        }

        let reattach = self.params.requires_reattach(&params);
        self.params = params;
        if reattach && !self.sessions.is_empty() {
            info!("Parameters changed, reattaching");
            let keys: Vec<PanelKey> = self.sessions.keys().copied().collect();
            for key in keys {
                self.release(key);
            }
            self.next_scan = Instant::now();
        }
    }

    fn scan(&mut self) {
        self.next_scan = Instant::now() + self.rescan;
        let present = match self.bus.present() {
            Ok(present) => present,
            Err(e) => {
                warn!("Can't enumerate panels: {e}");
                return;
            }
        };

        for key in present {
            if self.sessions.contains_key(&key) {
                continue;
            }
            let mut panel = match self.bus.open(key) {
                Ok(panel) => panel,
                Err(e) => {
                    warn!("{key}: can't open panel: {e}");
                    continue;
                }
            };
            let tracker = Arc::clone(&self.tracker);
            let session = match attach(&mut panel, &mut self.host, &self.store, tracker) {
                Ok(session) => session,
                Err(e) => {
                    error!("{key}: attach failed: {e}");
                    continue;
                }
            };
            match SessionHandle::spawn(session) {
                Ok(handle) => {
                    self.sessions.insert(key, handle);
                }
                Err(e) => error!("{key}: can't start session worker: {e}"),
            }
        }
    }

    fn release(&mut self, key: PanelKey) {
        let Some(handle) = self.sessions.remove(&key) else {
            return;
        };
        let calibrating = handle.calibrate();
        if let Err(e) = handle.stop() {
            error!("{key}: {e}");
        }
        self.persist_calibration(calibrating);
    }

    /// Writes the tracker snapshot if a calibrating session has moved it.
    fn persist_calibration(&mut self, force: bool) {
        let calibrating = force || self.sessions.values().any(SessionHandle::calibrate);
        if !calibrating {
            return;
        }
        let snapshot = self.tracker.snapshot();
        if snapshot != self.persisted {
            self.write_calibration(snapshot);
        }
    }

    fn write_calibration(&mut self, snapshot: CalibrationSnapshot) {
        match self.store.store_calibration(&snapshot) {
            Ok(()) => {
                debug!("Calibration now {snapshot:?}");
                self.persisted = snapshot;
            }
            Err(e) => error!("Failed to store calibration: {e}"),
        }
    }
}
