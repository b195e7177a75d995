use std::{sync::Arc, time::Duration};

use anyhow::ensure;
use log::{debug, info, warn};
use tokio::{
    sync::{Mutex, RwLock, mpsc},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    bucket::BucketKey,
    location::{LocationRequest, LocationSample, LocationService, UtcDT},
    messaging::TopicMessaging,
    prelude::*,
    settings::{KEY_REQUESTING_LOCATION_UPDATES, SettingsStore},
    tracker::{BucketTracker, TransitionResult},
};

type QueuePair<T> = (mpsc::Sender<T>, Mutex<mpsc::Receiver<T>>);

/// Decides which incoming samples get processed and when
struct SampleGate {
    fastest_interval: Duration,
    last_processed: Option<(Instant, UtcDT)>,
    pending: Option<LocationSample>,
}

impl SampleGate {
    fn new(fastest_interval: Duration) -> Self {
        Self {
            fastest_interval,
            last_processed: None,
            pending: None,
        }
    }

    /// Offer a new sample, returns it back if it should be processed right away.
    /// Samples that are too soon after the last processed one are held as pending, older samples
    /// and samples that can't be bucketed are dropped.
    fn offer(&mut self, sample: LocationSample, now: Instant) -> Option<LocationSample> {
        if let Err(why) = BucketKey::derive(sample.lat, sample.long) {
            warn!("Dropping unusable sample: {why:?}");
            return None;
        }

        if let Some((_, last_ts)) = self.last_processed {
            if sample.timestamp < last_ts {
                debug!("Dropping stale sample from {}", sample.timestamp);
                return None;
            }
        }

        if let Some(pending) = &self.pending {
            if sample.timestamp < pending.timestamp {
                debug!("Dropping stale sample from {}", sample.timestamp);
                return None;
            }
        }

        match self.last_processed {
            Some((at, _)) if now < at + self.fastest_interval => {
                self.pending = Some(sample);
                None
            }
            _ => {
                self.pending = None;
                Some(sample)
            }
        }
    }

    fn pending_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|_| match self.last_processed {
            Some((at, _)) => at + self.fastest_interval,
            None => Instant::now(),
        })
    }

    fn take_pending(&mut self) -> Option<LocationSample> {
        self.pending.take()
    }

    fn mark_processed(&mut self, sample: &LocationSample, now: Instant) {
        self.last_processed = Some((now, sample.timestamp));
    }
}

/// Background location tracking, feeds samples one at a time into a [BucketTracker].
///
/// Samples come from polling a [LocationService] every [LocationRequest::interval] and from
/// [Self::push_sample]. Whether updates are wanted is persisted so tracking can resume after a
/// restart.
pub struct LocationUpdates<L: LocationService, M: TopicMessaging, S: SettingsStore> {
    tracker: BucketTracker<M, S>,
    settings: Arc<S>,
    location: L,
    request: LocationRequest,
    samples: QueuePair<LocationSample>,
    cancel: Mutex<Option<CancellationToken>>,
    last_location: RwLock<Option<LocationSample>>,
}

impl<L: LocationService, M: TopicMessaging, S: SettingsStore> LocationUpdates<L, M, S> {
    pub fn new(request: LocationRequest, location: L, messaging: Arc<M>, settings: Arc<S>) -> Self {
        let (tx, rx) = mpsc::channel(15);
        Self {
            tracker: BucketTracker::new(messaging, settings.clone()),
            settings,
            location,
            request,
            samples: (tx, Mutex::new(rx)),
            cancel: Mutex::new(None),
            last_location: RwLock::new(None),
        }
    }

    pub fn tracker(&self) -> &BucketTracker<M, S> {
        &self.tracker
    }

    /// Whether the user last asked for updates to be on
    pub fn requesting_location_updates(&self) -> bool {
        self.settings
            .get_bool(KEY_REQUESTING_LOCATION_UPDATES)
            .unwrap_or(false)
    }

    pub async fn is_running(&self) -> bool {
        self.cancel.lock().await.is_some()
    }

    pub async fn last_location(&self) -> Option<LocationSample> {
        *self.last_location.read().await
    }

    /// Start receiving location updates, does nothing besides persisting the flag if we already
    /// are.
    pub async fn request_location_updates(self: &Arc<Self>) {
        info!("Requesting location updates");
        self.settings.put_bool(KEY_REQUESTING_LOCATION_UPDATES, true);

        let mut cancel = self.cancel.lock().await;
        if cancel.is_some() {
            debug!("Location updates already running");
            return;
        }

        let token = CancellationToken::new();
        *cancel = Some(token.clone());

        let this = self.clone();
        tokio::spawn(async move {
            this.main_loop(token).await;
        });
    }

    pub async fn remove_location_updates(&self) {
        info!("Removing location updates");
        self.settings.put_bool(KEY_REQUESTING_LOCATION_UPDATES, false);
        if let Some(token) = self.cancel.lock().await.take() {
            token.cancel();
        }
    }

    /// Start updates if they were on when we last ran, returns whether they were started
    pub async fn resume_if_requested(self: &Arc<Self>) -> bool {
        if self.requesting_location_updates() {
            info!("Resuming location updates");
            self.request_location_updates().await;
            true
        } else {
            false
        }
    }

    /// Deliver a sample from a push based provider
    pub async fn push_sample(&self, sample: LocationSample) -> Result {
        ensure!(self.is_running().await, "Location updates are not running");
        self.samples
            .0
            .send(sample)
            .await
            .context("Location update loop has stopped")
    }

    async fn process(&self, gate: &mut SampleGate, sample: LocationSample) {
        debug!(
            "New location: {}, {}\n >> GeoHash: {}",
            sample.lat,
            sample.long,
            sample.geohash().as_deref().unwrap_or("invalid")
        );

        let res = self.tracker.on_location_sample(&sample).await;

        if res != TransitionResult::Ignored {
            gate.mark_processed(&sample, Instant::now());
            *self.last_location.write().await = Some(sample);
        }
    }

    async fn offer(&self, gate: &mut SampleGate, sample: LocationSample) {
        if let Some(sample) = gate.offer(sample, Instant::now()) {
            self.process(gate, sample).await;
        }
    }

    async fn main_loop(&self, cancel: CancellationToken) {
        let mut samples_rx = self.samples.1.lock().await;
        let mut interval = tokio::time::interval(self.request.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut gate = SampleGate::new(self.request.fastest_interval);

        loop {
            let deadline = gate.pending_deadline();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break;
                }

                Some(sample) = samples_rx.recv() => {
                    self.offer(&mut gate, sample).await;
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(sample) = gate.take_pending() {
                        self.process(&mut gate, sample).await;
                    }
                }

                _ = interval.tick() => {
                    match self.location.get_loc() {
                        Some(sample) => self.offer(&mut gate, sample).await,
                        None => debug!("No location available"),
                    }
                }
            }
        }

        info!("Location updates stopped");
    }
}
