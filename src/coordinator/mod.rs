//! Per-device coordinator
//!
//! Owns the transport session, the poll schedule, the value cache and the
//! pending writes of one battery. Everything runs on one logical task: a
//! tick issues the due reads one at a time, decodes them, reconciles
//! optimistic writes, recomputes the derived sensors and produces a
//! [`Snapshot`] for the host.

use std::time::{Duration, Instant};

use ahash::AHashMap;
use chrono::{DateTime, offset::Utc};
use thiserror::Error;

use crate::data_mgmt::{
    derived::DerivedSensorSpec,
    last_reading_cache::LastReadingCache,
    models::{DecodedValue, Reading, RtValue, Snapshot},
    pending_writes::{Reconciliation, WriteTracker},
    process::decode_register,
    readings::present,
    schedule::{PollScheduler, PollState, ReadRequest},
};
use crate::drivers::{Catalog, CatalogError, HardwareVersion, RegisterDefinition, ScanTier};
use crate::helpers::now_utc;
use crate::node_mgmt::config::{ConfigError, DeviceConfig, ScanIntervals, ScanTierConfig};
use crate::node_mgmt::lifecycle::{Lifecycle, LifecycleError, LifecycleState};
use crate::readers::modbus_tcp::{Connector, SessionState, TransportError, TransportSession};

mod service;
mod write;

pub use service::{spawn, Command, CoordinatorHandle, ServiceError};
pub use write::WriteError;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("cannot reach {peer}: {source}")]
    Unreachable {
        peer: String,
        source: TransportError,
    },
    #[error("device does not answer probe register {key} ({source}); is hardware_version {version} correct?")]
    CatalogMismatch {
        key: &'static str,
        version: HardwareVersion,
        source: TransportError,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("device is {0}, not active")]
pub struct NotActive(pub LifecycleState);

#[derive(Clone, Copy, Debug)]
struct DerivedValue {
    value: Option<f64>,
    timestamp: DateTime<Utc>,
}

pub struct Coordinator<C: Connector> {
    config: DeviceConfig,
    catalog: &'static Catalog,
    lifecycle: Lifecycle,
    session: TransportSession<C>,
    scheduler: PollScheduler,
    scan_config: ScanTierConfig,
    /// Written by `reconfigure`, read at the next tick boundary
    staged: Option<ScanTierConfig>,
    cache: LastReadingCache,
    writes: WriteTracker,
    derived: AHashMap<&'static str, DerivedValue>,
    suspended_until: Option<Instant>,
}

impl<C: Connector> Coordinator<C> {
    /// Validate the configuration and build an unconnected coordinator
    pub fn new(config: DeviceConfig, connector: C) -> Result<Self, SetupError> {
        config.validate()?;
        let catalog = config.catalog();
        catalog.validate()?;

        let scan_config = ScanTierConfig::new(config.scan_intervals.clone());
        let scheduler = PollScheduler::new(
            catalog,
            &scan_config,
            |key, default| config.is_enabled(key, default),
            config.failure_threshold,
        );
        let session = TransportSession::new(connector, config.timeout(), config.message_wait());

        Ok(Coordinator {
            cache: LastReadingCache::new(config.stale_after),
            writes: WriteTracker::new(config.reconcile_grace_polls),
            catalog,
            lifecycle: Lifecycle::default(),
            session,
            scheduler,
            scan_config,
            staged: None,
            derived: AHashMap::new(),
            suspended_until: None,
            config,
        })
    }

    /// Connect and confirm the device speaks the configured register map
    pub async fn start(&mut self) -> Result<(), SetupError> {
        self.lifecycle.transition(LifecycleState::Connecting)?;

        let catalog = self.catalog;
        let probe = catalog.lookup(catalog.probe_key())?;
        log::info!(
            "Probing {} as a {} unit via {}",
            self.session.peer(),
            catalog.version(),
            probe.key
        );

        match self
            .session
            .read(probe.table, probe.address, probe.word_count)
            .await
        {
            Ok(words) => match decode_register(probe, &words) {
                Ok(value) => log::info!("{} = {}", probe.key, value),
                Err(e) => log::warn!("Could not decode {}: {}", probe.key, e),
            },
            Err(source) => {
                self.session.close().await;
                self.lifecycle.transition(LifecycleState::Unconfigured)?;
                return Err(match source {
                    TransportError::Exception(_) | TransportError::Protocol(_) => {
                        SetupError::CatalogMismatch {
                            key: probe.key,
                            version: catalog.version(),
                            source,
                        }
                    }
                    _ => SetupError::Unreachable {
                        peer: self.session.peer(),
                        source,
                    },
                });
            }
        }

        self.lifecycle.transition(LifecycleState::Active)?;
        Ok(())
    }

    /// Run one poll cycle at `now`
    pub async fn tick(&mut self, now: Instant) -> Result<Snapshot, NotActive> {
        self.ensure_active()?;
        self.apply_staged_config();

        let requests = self.scheduler.plan(now);
        if self.is_suspended(now) {
            log::debug!(
                "Polling paused, skipping {} reads",
                requests.iter().map(|r| r.keys.len()).sum::<usize>()
            );
            self.skip(&requests, now);
        } else {
            self.poll(requests, now).await;
        }
        log::trace!(
            "{} registers decoded, {} failing",
            self.scheduler.count_in(PollState::Decoded),
            self.scheduler.count_in(PollState::Failed)
        );

        self.update_derived();
        Ok(self.snapshot())
    }

    /// Stage new scan intervals; they take effect at the next tick
    pub fn reconfigure(&mut self, intervals: ScanIntervals) -> Result<u64, ConfigError> {
        intervals.validate()?;
        let next = self
            .staged
            .as_ref()
            .unwrap_or(&self.scan_config)
            .next(intervals);
        let version = next.version;
        log::debug!("Staged scan intervals v{}", version);
        self.staged = Some(next);
        Ok(version)
    }

    /// Release the connection and forget all device state
    pub async fn unload(&mut self) -> Result<(), LifecycleError> {
        self.lifecycle.transition(LifecycleState::Unloading)?;
        self.session.close().await;
        self.writes.clear();
        self.cache.clear();
        self.derived.clear();
        self.suspended_until = None;
        self.lifecycle.transition(LifecycleState::Unconfigured)?;
        log::info!("Unloaded {}", self.session.peer());
        Ok(())
    }

    /// Read the given keys once, ignoring schedule and enabled flags
    ///
    /// Derived sensor keys read their inputs. Per-key failures show up as
    /// unavailable readings.
    pub async fn read_keys(&mut self, keys: &[&str]) -> Result<Vec<Reading>, CatalogError> {
        let catalog = self.catalog;
        let mut registers: Vec<&'static RegisterDefinition> = Vec::new();
        for key in keys {
            let inputs: Vec<&str> = match catalog.lookup_derived(key) {
                Some(spec) => spec.inputs.to_vec(),
                None => vec![*key],
            };
            for input in inputs {
                let def = catalog.lookup(input)?;
                if !def.is_polled() {
                    return Err(CatalogError::UnknownRegister(def.key.to_string()));
                }
                if !registers.iter().any(|r| r.key == def.key) {
                    registers.push(def);
                }
            }
        }

        let now = Instant::now();
        for def in &registers {
            let request = ReadRequest {
                table: def.table,
                address: def.address,
                word_count: def.word_count,
                keys: vec![def.key],
            };
            self.poll(vec![request], now).await;
        }
        self.update_derived_from(catalog.derived().iter().filter(|s| keys.contains(&s.key)));

        let mut readings = Vec::with_capacity(keys.len());
        for key in keys {
            match catalog.lookup_derived(key) {
                Some(spec) => readings.push(self.derived_reading(spec)),
                None => readings.push(self.reading(catalog.lookup(key)?)),
            }
        }
        Ok(readings)
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn session_state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    /// Version of the scan intervals the schedule currently runs on
    pub fn scan_config_version(&self) -> u64 {
        self.scheduler.config_version()
    }

    /// Time between ticks; the shortest interval of any polled register
    pub fn effective_period(&self) -> Duration {
        self.scheduler
            .effective_period()
            .unwrap_or_else(|| self.scan_config.interval(ScanTier::VeryLow))
    }

    pub fn is_suspended(&self, now: Instant) -> bool {
        self.suspended_until.is_some_and(|until| now < until)
    }

    /// Current entity states for the host
    pub fn snapshot(&self) -> Snapshot {
        let mut readings: Vec<Reading> = self
            .catalog
            .all()
            .iter()
            .filter(|def| def.is_polled() && self.is_enabled(def.key, def.enabled_by_default))
            .map(|def| self.reading(def))
            .collect();
        readings.extend(
            self.catalog
                .derived()
                .iter()
                .filter(|spec| self.is_enabled(spec.key, spec.enabled_by_default))
                .map(|spec| self.derived_reading(spec)),
        );
        Snapshot {
            timestamp: now_utc(),
            readings,
        }
    }

    fn ensure_active(&self) -> Result<(), NotActive> {
        if self.lifecycle.is_active() {
            Ok(())
        } else {
            Err(NotActive(self.lifecycle.state()))
        }
    }

    fn is_enabled(&self, key: &str, enabled_by_default: bool) -> bool {
        self.config.is_enabled(key, enabled_by_default)
    }

    fn apply_staged_config(&mut self) {
        let Some(next) = self.staged.take() else {
            return;
        };
        let config = &self.config;
        self.scheduler
            .apply_config(self.catalog, &next, |key, default| config.is_enabled(key, default));
        log::info!(
            "Applied scan intervals v{}, polling every {:?}",
            next.version,
            self.scheduler.effective_period()
        );
        self.config.scan_intervals = next.intervals.clone();
        self.scan_config = next;
    }

    /// Issue reads in order; stop early once the session hits the failure threshold
    async fn poll(&mut self, requests: Vec<ReadRequest>, now: Instant) {
        let mut requests = requests.into_iter();
        while let Some(request) = requests.next() {
            for &key in &request.keys {
                self.scheduler.mark_polling(key, now);
            }

            match self
                .session
                .read(request.table, request.address, request.word_count)
                .await
            {
                Ok(words) => {
                    if self.suspended_until.take().is_some() {
                        log::info!("{} answering again, resuming polling", self.session.peer());
                    }
                    for &key in &request.keys {
                        self.apply_words(key, &words, now);
                    }
                }
                Err(_) => {
                    for &key in &request.keys {
                        self.fail_key(key, now);
                    }
                    if self.session.state().consecutive_failures >= self.config.failure_threshold
                    {
                        self.suspend(now);
                        self.skip(requests.as_slice(), now);
                        return;
                    }
                }
            }
        }
    }

    fn apply_words(&mut self, key: &'static str, words: &[u16], now: Instant) {
        let Ok(def) = self.catalog.lookup(key) else {
            return;
        };
        match decode_register(def, words) {
            Ok(value) => {
                self.reconcile(def.key, &value);
                self.cache.record_success(DecodedValue {
                    key: def.key,
                    raw_words: words.to_vec(),
                    value,
                    timestamp: now_utc(),
                    valid: true,
                });
                self.scheduler.record_success(key, now);
            }
            Err(e) => {
                log::warn!("Decoding {} failed: {}", key, e);
                self.fail_key(key, now);
            }
        }
    }

    fn reconcile(&mut self, key: &'static str, value: &RtValue) {
        match self.writes.reconcile(key, value) {
            Reconciliation::Confirmed(write) => {
                log::debug!("Write of {} to {} confirmed", write.assumed_value, key);
            }
            Reconciliation::Contradicted {
                discarded,
                reported,
            } => {
                log::info!(
                    "{} reports {}, dropping unconfirmed write of {}",
                    key,
                    reported,
                    discarded.assumed_value
                );
            }
            Reconciliation::Waiting => {
                log::debug!("{} reports {}, write still pending", key, value);
            }
            Reconciliation::NothingPending => {}
        }
    }

    fn fail_key(&mut self, key: &'static str, now: Instant) {
        self.scheduler.record_failure(key, now);
        if self.cache.record_failure(key) {
            log::warn!(
                "{} unavailable after {} failed reads",
                key,
                self.config.stale_after
            );
            // an unreadable register can neither confirm nor contradict
            if let Some(dropped) = self.writes.discard(key) {
                log::info!(
                    "Dropping unconfirmed write of {} to {}",
                    dropped.assumed_value,
                    key
                );
            }
        }
    }

    /// Count due reads that were not issued as failures
    fn skip(&mut self, requests: &[ReadRequest], now: Instant) {
        for request in requests {
            for &key in &request.keys {
                self.fail_key(key, now);
            }
        }
    }

    fn suspend(&mut self, now: Instant) {
        let pause = self.effective_period();
        self.suspended_until = Some(now + pause);
        log::error!(
            "{} failed {} consecutive requests, pausing polling for {:?}",
            self.session.peer(),
            self.session.state().consecutive_failures,
            pause
        );
    }

    fn update_derived(&mut self) {
        let catalog = self.catalog;
        let enabled: Vec<&DerivedSensorSpec> = catalog
            .derived()
            .iter()
            .filter(|spec| self.is_enabled(spec.key, spec.enabled_by_default))
            .collect();
        self.update_derived_from(enabled.into_iter());
    }

    fn update_derived_from<'a>(&mut self, specs: impl Iterator<Item = &'a DerivedSensorSpec>) {
        let timestamp = now_utc();
        for spec in specs {
            let current: Vec<Option<f64>> =
                spec.inputs.iter().map(|key| self.cache.numeric(key)).collect();
            let previous: Vec<Option<f64>> = spec
                .inputs
                .iter()
                .map(|key| self.cache.previous_numeric(key))
                .collect();
            let value = spec.compute(&current, &previous);
            if value.is_none() {
                log::debug!("{} unavailable this cycle", spec.key);
            }
            self.derived
                .insert(spec.key, DerivedValue { value, timestamp });
        }
    }

    fn reading(&self, def: &'static RegisterDefinition) -> Reading {
        let timestamp = self.cache.timestamp(def.key);
        if let Some(assumed) = self.writes.assumed(def.key) {
            return Reading {
                key: def.key,
                state: present(def, assumed),
                unit: def.unit,
                timestamp,
                available: true,
                pending: true,
            };
        }
        match self.cache.value(def.key) {
            Some(value) => Reading {
                key: def.key,
                state: present(def, value),
                unit: def.unit,
                timestamp,
                available: true,
                pending: false,
            },
            None => Reading {
                key: def.key,
                state: RtValue::None,
                unit: def.unit,
                timestamp,
                available: false,
                pending: false,
            },
        }
    }

    fn derived_reading(&self, spec: &DerivedSensorSpec) -> Reading {
        let computed = self.derived.get(spec.key);
        let value = computed.and_then(|d| d.value);
        Reading {
            key: spec.key,
            state: value.map_or(RtValue::None, RtValue::Float),
            unit: Some(spec.unit),
            timestamp: computed.map(|d| d.timestamp),
            available: value.is_some(),
            pending: false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::readers::modbus_tcp::mock::{MockConnector, MockDevice};

    pub(crate) fn config() -> DeviceConfig {
        let mut config = DeviceConfig::new("mock");
        config.message_wait_ms = 0;
        config.timeout_secs = 1;
        config
    }

    /// A Venus v2 answering the probe and the registers behind the derived sensors
    pub(crate) fn device() -> MockDevice {
        let device = MockDevice::new();
        // "V2.0" padded with NULs
        device.set_registers(30800, &[0x5632, 0x2E30, 0, 0, 0, 0]);
        device.set_register(32104, 62);
        device.set_register(32105, 5120);
        // discharging: -1000 W battery, -900 W AC
        device.set_registers(32102, &[0xFFFF, 0xFC18]);
        device.set_registers(32202, &[0xFFFF, 0xFC7C]);
        device.set_registers(33000, &[0, 1000]);
        device.set_registers(33002, &[0, 850]);
        device
    }

    pub(crate) async fn started(
        device: &MockDevice,
        config: DeviceConfig,
    ) -> Coordinator<MockConnector> {
        let mut coordinator = Coordinator::new(config, device.connector()).unwrap();
        coordinator.start().await.unwrap();
        coordinator
    }

    fn secs(start: Instant, secs: u64) -> Instant {
        start + Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn test_start_probes_device() {
        let device = device();
        let coordinator = started(&device, config()).await;
        assert_eq!(coordinator.state(), LifecycleState::Active);
        assert_eq!(device.connects(), 1);
        assert_eq!(device.reads(), vec![30800]);
    }

    #[tokio::test]
    async fn test_start_rejects_wrong_generation() {
        // answers like a v1 unit: no communication module register
        let device = MockDevice::new();
        device.set_register(32104, 62);
        let mut coordinator = Coordinator::new(config(), device.connector()).unwrap();

        let err = coordinator.start().await.unwrap_err();
        assert!(matches!(
            err,
            SetupError::CatalogMismatch {
                key: "comm_module_firmware",
                version: HardwareVersion::V2,
                ..
            }
        ));
        assert_eq!(coordinator.state(), LifecycleState::Unconfigured);
        assert_eq!(device.closes(), 1);
    }

    #[tokio::test]
    async fn test_start_unreachable() {
        let device = device();
        device.set_online(false);
        let mut coordinator = Coordinator::new(config(), device.connector()).unwrap();
        let err = coordinator.start().await.unwrap_err();
        assert!(matches!(err, SetupError::Unreachable { .. }));
        assert_eq!(coordinator.state(), LifecycleState::Unconfigured);
    }

    #[test]
    fn test_new_rejects_unknown_entity() {
        let mut config = config();
        config.entities.insert("no_such_key".to_string(), true);
        let result = Coordinator::new(config, device().connector());
        assert!(matches!(
            result,
            Err(SetupError::Config(ConfigError::Catalog(
                CatalogError::UnknownRegister(_)
            )))
        ));
    }

    #[tokio::test]
    async fn test_tick_requires_active() {
        let device = device();
        let mut coordinator = Coordinator::new(config(), device.connector()).unwrap();
        let err = coordinator.tick(Instant::now()).await.unwrap_err();
        assert_eq!(err, NotActive(LifecycleState::Unconfigured));
    }

    #[tokio::test]
    async fn test_tick_decodes_and_derives() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        let snapshot = coordinator.tick(Instant::now()).await.unwrap();

        let soc = snapshot.get("battery_soc").unwrap();
        assert_eq!(soc.state, RtValue::Int(62));
        assert_eq!(soc.unit, Some("%"));
        assert!(soc.available);

        assert_eq!(
            snapshot.get("battery_power").unwrap().state,
            RtValue::Int(-1000)
        );
        assert_eq!(
            snapshot.get("stored_energy").unwrap().state,
            RtValue::Float(3.17)
        );
        assert_eq!(
            snapshot.get("conversion_efficiency").unwrap().state,
            RtValue::Float(90.0)
        );
        assert_eq!(
            snapshot.get("round_trip_efficiency_total").unwrap().state,
            RtValue::Float(85.0)
        );

        // registers the mock does not hold never become available
        let monthly = snapshot.get("round_trip_efficiency_monthly").unwrap();
        assert!(!monthly.available);
        assert_eq!(monthly.state, RtValue::None);
        // disabled entities are not reported
        assert!(snapshot.get("total_monthly_charging_energy").is_none());
    }

    #[tokio::test]
    async fn test_disabled_input_still_feeds_derived_sensor() {
        let device = device();
        let mut config = config();
        config
            .entities
            .insert("battery_total_energy".to_string(), false);
        let mut coordinator = started(&device, config).await;

        let snapshot = coordinator.tick(Instant::now()).await.unwrap();
        assert!(snapshot.get("battery_total_energy").is_none());
        assert!(device.reads().contains(&32105));
        assert_eq!(
            snapshot.get("stored_energy").unwrap().state,
            RtValue::Float(3.17)
        );
    }

    #[tokio::test]
    async fn test_only_due_registers_read() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        let start = Instant::now();
        coordinator.tick(start).await.unwrap();
        assert!(device.reads().contains(&32104));

        device.reset_reads();
        coordinator.tick(secs(start, 10)).await.unwrap();
        let reads = device.reads();
        assert!(reads.contains(&32102));
        assert!(!reads.contains(&32104));
    }

    #[tokio::test]
    async fn test_backoff_retries_once_per_interval() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        let start = Instant::now();
        coordinator.tick(start).await.unwrap();
        assert_eq!(coordinator.effective_period(), Duration::from_secs(10));

        device.set_online(false);
        coordinator.tick(secs(start, 10)).await.unwrap();
        assert_eq!(coordinator.session_state().consecutive_failures, 3);
        assert!(coordinator.is_suspended(secs(start, 15)));

        // paused: nothing is attempted
        coordinator.tick(secs(start, 15)).await.unwrap();
        assert_eq!(coordinator.session_state().consecutive_failures, 3);

        // interval elapsed: exactly one attempt, then paused again
        coordinator.tick(secs(start, 20)).await.unwrap();
        assert_eq!(coordinator.session_state().consecutive_failures, 4);
        coordinator.tick(secs(start, 25)).await.unwrap();
        assert_eq!(coordinator.session_state().consecutive_failures, 4);
        coordinator.tick(secs(start, 30)).await.unwrap();
        assert_eq!(coordinator.session_state().consecutive_failures, 5);

        device.set_online(true);
        let snapshot = coordinator.tick(secs(start, 40)).await.unwrap();
        assert_eq!(coordinator.session_state().consecutive_failures, 0);
        assert!(!coordinator.is_suspended(secs(start, 40)));
        assert!(snapshot.get("battery_power").unwrap().available);
    }

    #[tokio::test]
    async fn test_persistent_failure_goes_stale() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        let start = Instant::now();
        coordinator.tick(start).await.unwrap();

        device.set_online(false);
        coordinator.tick(secs(start, 10)).await.unwrap();
        let snapshot = coordinator.tick(secs(start, 20)).await.unwrap();
        // stale but still valid
        let power = snapshot.get("battery_power").unwrap();
        assert!(power.available);
        assert_eq!(power.state, RtValue::Int(-1000));

        let snapshot = coordinator.tick(secs(start, 30)).await.unwrap();
        assert!(!snapshot.get("battery_power").unwrap().available);
        assert!(!snapshot.get("conversion_efficiency").unwrap().available);
        // medium tier has only missed one read
        assert!(snapshot.get("battery_soc").unwrap().available);
    }

    #[tokio::test]
    async fn test_unconfirmed_write_goes_stale_with_its_register() {
        let device = device();
        device.set_register(42011, 50);
        let mut config = config();
        config.entities.insert("charge_to_soc".to_string(), true);
        let mut coordinator = started(&device, config).await;
        let start = Instant::now();
        coordinator.tick(start).await.unwrap();

        coordinator
            .write("charge_to_soc", RtValue::Int(80))
            .await
            .unwrap();
        device.set_online(false);

        coordinator.tick(secs(start, 10)).await.unwrap();
        let snapshot = coordinator.tick(secs(start, 20)).await.unwrap();
        let target = snapshot.get("charge_to_soc").unwrap();
        assert!(target.available);
        assert!(target.pending);
        assert_eq!(target.state, RtValue::Int(80));

        let snapshot = coordinator.tick(secs(start, 30)).await.unwrap();
        let target = snapshot.get("charge_to_soc").unwrap();
        assert!(!target.available);
        assert!(!target.pending);
        assert_eq!(target.state, RtValue::None);

        for n in 4..20 {
            let snapshot = coordinator.tick(secs(start, n * 10)).await.unwrap();
            assert!(!snapshot.get("charge_to_soc").unwrap().available);
        }
    }

    #[tokio::test]
    async fn test_reconfigure_applies_at_next_tick() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        let version = coordinator
            .reconfigure(ScanIntervals {
                high: 4,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(version, 2);
        assert_eq!(coordinator.scan_config_version(), 1);
        assert_eq!(coordinator.effective_period(), Duration::from_secs(10));

        coordinator.tick(Instant::now()).await.unwrap();
        assert_eq!(coordinator.scan_config_version(), 2);
        assert_eq!(coordinator.effective_period(), Duration::from_secs(4));
        assert_eq!(coordinator.config().scan_intervals.high, 4);
    }

    #[tokio::test]
    async fn test_reconfigure_rejects_zero_interval() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        let err = coordinator
            .reconfigure(ScanIntervals {
                low: 0,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval(ScanTier::Low)));
    }

    #[tokio::test]
    async fn test_unload_releases_connection() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        coordinator.tick(Instant::now()).await.unwrap();

        coordinator.unload().await.unwrap();
        assert_eq!(coordinator.state(), LifecycleState::Unconfigured);
        assert_eq!(device.closes(), 1);
        assert!(!coordinator.session_state().connected);
        assert!(coordinator.tick(Instant::now()).await.is_err());

        // setup again after unload
        coordinator.start().await.unwrap();
        assert_eq!(device.connects(), 2);
    }

    #[tokio::test]
    async fn test_read_keys() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        let readings = coordinator
            .read_keys(&["battery_soc", "stored_energy", "inverter_state"])
            .await
            .unwrap();

        assert_eq!(readings[0].state, RtValue::Int(62));
        assert_eq!(readings[1].state, RtValue::Float(3.17));
        assert!(!readings[2].available);
    }

    #[tokio::test]
    async fn test_read_keys_unknown() {
        let device = device();
        let mut coordinator = started(&device, config()).await;
        let err = coordinator.read_keys(&["nonexistent"]).await.unwrap_err();
        assert_eq!(err, CatalogError::UnknownRegister("nonexistent".to_string()));
    }
}
