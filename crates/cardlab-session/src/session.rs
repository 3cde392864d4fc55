//! Mode-gated owner of the current card.
//!
//! A [`Session`] owns the [`CardContext`] and its collaborators. Engines and
//! codec calls all borrow it mutably, so at most one of them touches the card
//! at a time.

use std::convert::Infallible;
use std::path::Path;

use cardlab_core::CardContext;
use cardlab_dump::{DumpError, load, save};
use cardlab_emulator::Listener;
use cardlab_hardware::{Notifier, Storage, Transceiver};
use cardlab_reader::{HandledCard, Poller};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::scheduler::{RunReport, Scheduler};

pub struct Session<R, S, N>
where
    R: Transceiver,
    S: Storage,
    N: Notifier,
{
    radio: R,
    ctx: CardContext,
    storage: S,
    notifier: N,
    config: SessionConfig,
}

impl<R, S, N> Session<R, S, N>
where
    R: Transceiver,
    S: Storage,
    N: Notifier,
{
    /// # Errors
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(radio: R, storage: S, notifier: N, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            radio,
            ctx: CardContext::new(config.dump_capacity),
            storage,
            notifier,
            config,
        })
    }

    pub fn context(&self) -> &CardContext {
        &self.ctx
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Reader engine over this session's card.
    pub fn reader(&mut self) -> Poller<'_, R> {
        Poller::new(
            &mut self.radio,
            &mut self.ctx,
            &mut self.storage,
            &mut self.notifier,
            self.config.poller.clone(),
        )
    }

    /// Emulation engine over this session's card.
    pub fn emulator(&mut self) -> Listener<'_, R> {
        Listener::new(
            &mut self.radio,
            &mut self.ctx,
            &mut self.notifier,
            self.config.listener.clone(),
        )
    }

    /// Replace the current card with the dump at `path`.
    ///
    /// On failure the card is left empty and the error carries a
    /// [`user_message`](DumpError::user_message) for display.
    ///
    /// # Errors
    /// Propagates [`DumpError`] from the codec.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> std::result::Result<(), DumpError> {
        let path = path.as_ref();
        match load(&mut self.storage, path, &mut self.ctx) {
            Ok(()) => {
                self.notifier.card_updated(self.ctx.summary());
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), reason = e.user_message(), "Card file rejected");
                Err(e)
            }
        }
    }

    /// # Errors
    /// Propagates [`DumpError`] from the codec; `NoCard` if nothing is loaded.
    pub fn save_file(&mut self, path: impl AsRef<Path>) -> std::result::Result<(), DumpError> {
        save(&mut self.storage, path.as_ref(), &self.ctx)
    }

    /// Forget the current card.
    pub fn clear(&mut self) {
        self.ctx.reset();
        self.notifier.card_updated(self.ctx.summary());
    }

    /// Read cards until `stop` fires.
    ///
    /// # Errors
    /// Fails if the radio cannot be brought up.
    pub async fn run_reader(
        &mut self,
        stop: watch::Receiver<bool>,
    ) -> Result<RunReport<HandledCard>> {
        let scheduler = Scheduler::new(self.config.tick_interval());
        let mut poller = self.reader();
        poller.initialize()?;
        info!("Read mode started");
        Ok(scheduler.run(&mut poller, stop).await)
    }

    /// Emulate the current card until `stop` fires.
    ///
    /// # Errors
    /// Fails if the radio cannot be brought up.
    pub async fn run_emulator(
        &mut self,
        stop: watch::Receiver<bool>,
    ) -> Result<RunReport<Infallible>> {
        let scheduler = Scheduler::new(self.config.tick_interval());
        let mut listener = self.emulator();
        listener.initialize()?;
        info!("Emulate mode started");
        Ok(scheduler.run(&mut listener, stop).await)
    }
}
