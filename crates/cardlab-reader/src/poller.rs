//! Reader-mode engine.
//!
//! The poller is a cooperative state machine stepped once per scheduler
//! tick after the radio worker:
//!
//! ```text
//! NotInitialized --initialize--> StartDiscovery --cycle--> Discovery
//!                                      ^                      |
//!                                      +--- card handled -----+
//! ```
//!
//! A card found in `Discovery` is classified, Type-2 memory is acquired,
//! the notifier is refreshed and the card is optionally archived. The card
//! is then put to sleep and discovery restarts.

use std::path::PathBuf;
use std::time::Duration;

use cardlab_core::{
    CardContext, Family, NfcAParams, PageStore, Source, Uid,
    constants::{T2T_DEFAULT_PAGE_COUNT, T2T_PAGE_SIZE},
    hex::format_spaced,
};
use cardlab_dump::{archive_path, save};
use cardlab_hardware::{
    ActiveDevice, DeactivateMode, DiscoveryParams, LinkState, Notifier, RadioError, Storage,
    Transceiver,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::{self, NfcaClass};
use crate::type2::{AcquireParams, AcquisitionReport, acquire_type2_image};

/// Poller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Length of one discovery round.
    pub discovery_duration_ms: u32,
    /// Attempts per 4-page READ.
    pub block_retries: u32,
    /// Attempts per GET_VERSION.
    pub version_attempts: u32,
    /// Pause between READ attempts of the same block.
    pub retry_delay_ms: u64,
    /// Frame wait time per exchange.
    pub frame_wait_time_us: u64,
    /// Page count when no size code and no earlier card is known.
    pub default_page_count: usize,
    /// Save every handled card as `<dir>/<UIDHEX>.nfc`.
    pub archive_dir: Option<PathBuf>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            discovery_duration_ms: 1000,
            block_retries: 3,
            version_attempts: 2,
            retry_delay_ms: 5,
            frame_wait_time_us: 5000,
            default_page_count: T2T_DEFAULT_PAGE_COUNT,
            archive_dir: None,
        }
    }
}

impl PollerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn frame_wait_time(&self) -> Duration {
        Duration::from_micros(self.frame_wait_time_us)
    }
}

/// Poller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollerState {
    NotInitialized,
    StartDiscovery,
    Discovery,
}

/// Summary of one handled card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledCard {
    pub family: Family,
    /// NFC-A classification, for technology A cards.
    pub class: Option<NfcaClass>,
    pub uid: Uid,
    /// Present for Type-2 tags.
    pub acquisition: Option<AcquisitionReport>,
    /// Archive file written for this card.
    pub archived: Option<PathBuf>,
}

/// Reader-mode engine over borrowed collaborators.
///
/// The poller holds the card context exclusively for its lifetime, so no
/// other engine or codec call can touch it while reading.
pub struct Poller<'a, R: Transceiver + ?Sized> {
    radio: &'a mut R,
    ctx: &'a mut CardContext,
    storage: &'a mut dyn Storage,
    notifier: &'a mut dyn Notifier,
    config: PollerConfig,
    state: PollerState,
    /// Page count of the last Type-2 tag read.
    last_page_count: Option<usize>,
    cards_handled: usize,
}

impl<'a, R: Transceiver + ?Sized> Poller<'a, R> {
    pub fn new(
        radio: &'a mut R,
        ctx: &'a mut CardContext,
        storage: &'a mut dyn Storage,
        notifier: &'a mut dyn Notifier,
        config: PollerConfig,
    ) -> Self {
        Self {
            radio,
            ctx,
            storage,
            notifier,
            config,
            state: PollerState::NotInitialized,
            last_page_count: None,
            cards_handled: 0,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn cards_handled(&self) -> usize {
        self.cards_handled
    }

    pub fn context(&self) -> &CardContext {
        &*self.ctx
    }

    /// Bring the radio up for reader-only discovery of all technologies and
    /// clear the card context for the new read session.
    ///
    /// # Errors
    /// Propagates radio failures; the poller stays uninitialized and the
    /// context is untouched.
    pub fn initialize(&mut self) -> Result<(), RadioError> {
        self.radio.initialize()?;
        self.radio
            .configure_discovery(&DiscoveryParams::reader(self.config.discovery_duration_ms))?;
        if self.ctx.is_loaded() {
            debug!("Discarding previous card for read session");
        }
        self.ctx.reset();
        self.state = PollerState::StartDiscovery;
        info!("Poller initialized");
        Ok(())
    }

    /// Advance the radio's own state machine. Called once per tick before
    /// [`cycle`](Self::cycle).
    pub fn service_radio(&mut self) {
        self.radio.worker();
    }

    /// One scheduler tick: radio worker, then engine step.
    pub fn tick(&mut self) -> Option<HandledCard> {
        self.service_radio();
        self.cycle()
    }

    /// Step the state machine once. Returns the card handled in this step.
    pub fn cycle(&mut self) -> Option<HandledCard> {
        match self.state {
            PollerState::NotInitialized => None,
            PollerState::StartDiscovery => {
                match self.radio.discover() {
                    Ok(()) => self.state = PollerState::Discovery,
                    Err(e) => warn!(error = %e, "Discovery request failed"),
                }
                None
            }
            PollerState::Discovery => {
                if self.radio.state() != LinkState::Activated {
                    return None;
                }
                let handled = self.radio.active_device().and_then(|d| self.handle_device(&d));
                if let Err(e) = self.radio.deactivate(DeactivateMode::Sleep) {
                    debug!(error = %e, "Deactivate after card failed");
                }
                self.state = PollerState::StartDiscovery;
                handled
            }
        }
    }

    /// Deactivate the radio and return to the uninitialized state.
    pub fn halt(&mut self) {
        if let Err(e) = self.radio.deactivate(DeactivateMode::Idle) {
            debug!(error = %e, "Deactivate on halt failed");
        }
        self.state = PollerState::NotInitialized;
        info!(cards = self.cards_handled, "Poller halted");
    }

    fn handle_device(&mut self, device: &ActiveDevice) -> Option<HandledCard> {
        let uid = match Uid::new(&device.uid) {
            Ok(uid) => uid,
            Err(e) => {
                warn!(error = %e, "Ignoring device with invalid UID");
                return None;
            }
        };

        self.ctx.reset();
        self.ctx.set_technology(device.technology);
        self.ctx.set_uid(uid.clone());
        self.ctx.set_source(Source::LiveCard {
            acquired_at: Utc::now(),
        });

        let class = device.nfca.as_ref().map(classify::classify_nfca);
        let family = classify::classify(device);
        self.ctx.set_family(family);
        if let Some(nfca) = &device.nfca {
            self.ctx.set_nfca(NfcAParams {
                atqa: Some(nfca.atqa),
                sak: Some(nfca.sak),
                ats: nfca.ats.clone().filter(|ats| !ats.is_empty()),
            });
        }
        info!(uid = %uid, technology = %device.technology, %family, "Card detected");

        let acquisition = if family == Family::Ultralight {
            let params = self.acquire_params();
            let report = acquire_type2_image(&mut *self.radio, &mut *self.ctx, &params);
            if report.pages_total > 0 {
                self.last_page_count = Some(report.pages_total);
            }
            Some(report)
        } else {
            None
        };

        self.notifier.card_updated(self.ctx.summary());
        let archived = self.archive(&uid);
        self.cards_handled += 1;

        Some(HandledCard {
            family,
            class,
            uid,
            acquisition,
            archived,
        })
    }

    fn acquire_params(&self) -> AcquireParams {
        AcquireParams {
            version_attempts: self.config.version_attempts,
            block_retries: self.config.block_retries,
            retry_delay: self.config.retry_delay(),
            frame_wait_time: self.config.frame_wait_time(),
            fallback_page_count: self
                .last_page_count
                .unwrap_or(self.config.default_page_count),
        }
    }

    fn archive(&mut self, uid: &Uid) -> Option<PathBuf> {
        let dir = self.config.archive_dir.as_ref()?;
        let path = archive_path(dir, uid);
        match save(&mut *self.storage, &path, &*self.ctx) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to archive card");
                None
            }
        }
    }
}

/// Bytes of the page region registered for a Type-2 image, for display.
pub fn page_dump_lines(ctx: &CardContext) -> Vec<String> {
    (0..ctx.page_count())
        .map(|index| match ctx.dump().page(index) {
            Some(page) => format!("{index:03}: {}", format_spaced(&page)),
            None => format!("{index:03}: {}", ["??"; T2T_PAGE_SIZE].join(" ")),
        })
        .collect()
}
