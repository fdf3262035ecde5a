//! Tick driver and the engine pieces it runs each tick.
//!
//! A tick is: detect a new bar, let the strategy refresh indicators, apply new
//! executions, reconcile against the exchange, manage working orders, place
//! new entries, and finally persist the store. Persistence runs on every path,
//! including when an earlier step failed.

pub mod book;
pub mod interface;
pub mod journal;
pub mod paper;
pub mod reconcile;
pub mod strategy;
pub mod sync;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::domain::{decode_position_id, Account, Bar, Position};
use crate::error::BotError;
use crate::store::{BotStorage, PositionHistoryLog, PositionStore};

pub use book::PositionBook;
pub use interface::OrderInterface;
pub use journal::OrderJournal;
pub use paper::PaperExchange;
pub use reconcile::{ReconcileReport, Reconciler, ResidualAction, DEFAULT_EPSILON};
pub use strategy::{BotStrategy, OrderAction, Tick};
pub use sync::{ExecutionSync, SyncReport};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub is_new_bar: bool,
    /// `None` when execution sync is disabled.
    pub sync: Option<SyncReport>,
    pub reconcile: ReconcileReport,
    pub updated_orders: Vec<String>,
    pub canceled_orders: Vec<String>,
}

pub struct TradingBot {
    strategy: Box<dyn BotStrategy>,
    book: PositionBook,
    executions: ExecutionSync,
    reconciler: Reconciler,
    storage: Option<BotStorage>,
    sync_executions: bool,
    is_new_bar: bool,
    last_tick: Option<DateTime<Utc>>,
}

impl TradingBot {
    pub fn new(strategy: Box<dyn BotStrategy>, engine: &EngineConfig) -> Self {
        Self {
            strategy,
            book: PositionBook::new(),
            executions: ExecutionSync::new(),
            reconciler: Reconciler::new(engine.reconcile_epsilon),
            storage: None,
            sync_executions: engine.sync_executions,
            is_new_bar: true,
            last_tick: None,
        }
    }

    /// Persist to (and load from) the given storage location.
    pub fn with_storage(mut self, storage: BotStorage) -> Self {
        let book = std::mem::take(&mut self.book);
        self.book = book.with_history_log(PositionHistoryLog::new(storage.history_path()));
        self.storage = Some(storage);
        self
    }

    pub fn strategy(&self) -> &dyn BotStrategy {
        self.strategy.as_ref()
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut PositionBook {
        &mut self.book
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.book.store().iter()
    }

    pub fn position_history(&self) -> &[Position] {
        self.book.history()
    }

    pub fn is_new_bar(&self) -> bool {
        self.is_new_bar
    }

    pub fn known_order_history(&self) -> usize {
        self.executions.known_order_history()
    }

    /// Load persisted positions, prime the strategy and reconcile once.
    pub fn init(
        &mut self,
        bars: &[Bar],
        account: &Account,
        orders: &mut dyn OrderInterface,
    ) -> Result<ReconcileReport, BotError> {
        if let Some(storage) = &self.storage {
            self.book.replace_store(PositionStore::load(&storage.snapshot_path()));
        }

        self.strategy.prep_bars(true, bars);
        let report = self
            .reconciler
            .reconcile(Tick::new(bars, account), &mut self.book, self.strategy.as_mut(), orders)?;
        info!(
            "{} initialized with {} positions",
            self.strategy.name(),
            self.book.store().len()
        );
        Ok(report)
    }

    /// One tick. The store is saved even when processing fails; the first
    /// error is returned.
    pub fn on_tick(
        &mut self,
        bars: &[Bar],
        account: &Account,
        orders: &mut dyn OrderInterface,
    ) -> Result<TickReport, BotError> {
        self.last_tick = Some(Utc::now());
        let result = self.process_tick(bars, account, orders);
        let saved = self.save_open_positions();

        match (result, saved) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(save_err)) => {
                error!("failed to save positions after failed tick: {save_err}");
                Err(e)
            }
        }
    }

    fn process_tick(
        &mut self,
        bars: &[Bar],
        account: &Account,
        orders: &mut dyn OrderInterface,
    ) -> Result<TickReport, BotError> {
        let needed = self.strategy.min_bars_needed().max(2);
        if bars.len() < needed {
            return Err(BotError::NotEnoughBars {
                needed,
                got: bars.len(),
            });
        }

        let mut report = TickReport {
            is_new_bar: self.update_new_bar(bars),
            ..Default::default()
        };
        self.strategy.prep_bars(self.is_new_bar, bars);

        // Each phase sees the snapshot with the earlier phases' requests applied.
        let mut journal = OrderJournal::new(orders);
        if self.sync_executions {
            let tick = Tick::new(bars, account);
            report.sync = Some(self.executions.sync(tick, &mut self.book, self.strategy.as_mut(), &mut journal)?);
        }

        let after_sync = journal.apply(account);
        report.reconcile = self.reconciler.reconcile(
            Tick::new(bars, &after_sync),
            &mut self.book,
            self.strategy.as_mut(),
            &mut journal,
        )?;

        let after_reconcile = journal.apply(account);
        self.manage_open_orders(Tick::new(bars, &after_reconcile), &mut journal, &mut report)?;

        let current = journal.apply(account);
        self.strategy
            .open_orders(Tick::new(bars, &current), &mut self.book, &mut journal)?;
        Ok(report)
    }

    /// Track bar changes. Returns whether `bars[0]` started a new bar.
    pub fn update_new_bar(&mut self, bars: &[Bar]) -> bool {
        let Some(current) = bars.first() else {
            self.is_new_bar = false;
            return false;
        };
        let store = self.book.store_mut();
        self.is_new_bar = current.tstamp != store.last_processed_tstamp();
        store.set_last_processed_tstamp(current.tstamp);
        self.is_new_bar
    }

    pub fn save_open_positions(&self) -> Result<(), BotError> {
        match &self.storage {
            Some(storage) => self.book.store().save(&storage.snapshot_path(), self.last_tick),
            None => Ok(()),
        }
    }

    /// Drop all state: positions, history and the execution cursor.
    pub fn reset(&mut self) {
        self.book.clear();
        self.executions.reset();
        self.is_new_bar = true;
        self.last_tick = None;
    }
}
