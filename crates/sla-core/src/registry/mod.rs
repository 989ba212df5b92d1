//! Per-account SLA/BLF subscription registry
//!
//! The registry keeps, for every account, which line and device slots have a
//! live subscription and reconciles them against the account's configuration:
//!
//! | Configured | Slot     | [`start`](SlaRegistry::start) does                  |
//! |------------|----------|-----------------------------------------------------|
//! | enabled    | empty    | create dialog and subscription, send SUBSCRIBE      |
//! | enabled    | occupied | nothing                                             |
//! | disabled   | occupied | empty the slot, send SUBSCRIBE with expires 0       |
//! | disabled   | empty    | nothing                                             |
//!
//! Terminal transitions and NOTIFY on registry subscriptions are published as
//! [`SlaInfo`] events.

pub mod resolver;
pub mod slots;

pub use slots::{ActiveSlot, SlotTable};

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::adapter::SlaAdapter;
use crate::config::{AccountConfig, SlaConfig};
use crate::engine::{TransportSelector, UacDialogRequest};
use crate::errors::{SlaError, SlaResult};
use crate::events::{SlaInfo, SlaInfoHub};
use crate::message::ResponseOverride;
use crate::subscription::{SubscriptionCallbacks, SubscriptionContext};
use crate::types::{AccountId, DialogId, Expires, SubscriptionId, SubscriptionKind};

/// What a call to [`SlaRegistry::start`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new subscription was created and its SUBSCRIBE sent
    Started {
        subscription: SubscriptionId,
        dialog: DialogId,
    },
    /// Enabled and already subscribed
    AlreadyActive,
    /// Disabled while subscribed; the unsubscribe was sent
    Unsubscribed,
    /// Disabled and idle
    Disabled,
    /// Index outside the kind's slot range
    OutOfRange,
}

/// Result of reconciling every slot of an account
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub started: Vec<(SubscriptionKind, usize)>,
    pub unsubscribed: Vec<(SubscriptionKind, usize)>,
    pub failed: Vec<(SubscriptionKind, usize, SlaError)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry view of one account
#[derive(Debug)]
pub(crate) struct AccountEntry {
    config: RwLock<AccountConfig>,
    slots: Mutex<SlotTable>,
    /// Serializes `start` calls for the account
    start_lock: tokio::sync::Mutex<()>,
}

impl AccountEntry {
    fn new(config: AccountConfig, sla: &SlaConfig) -> Self {
        Self {
            config: RwLock::new(config),
            slots: Mutex::new(SlotTable::new(sla.max_shared_lines, sla.max_blf_devices)),
            start_lock: tokio::sync::Mutex::new(()),
        }
    }
}

type AccountTable = Arc<DashMap<AccountId, Arc<AccountEntry>>>;

/// Owns the slot tables of every account
pub struct SlaRegistry {
    adapter: Arc<SlaAdapter>,
    config: SlaConfig,
    accounts: AccountTable,
    info: SlaInfoHub,
}

impl std::fmt::Debug for SlaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlaRegistry")
            .field("accounts", &self.accounts.len())
            .field("config", &self.config)
            .finish()
    }
}

impl SlaRegistry {
    pub fn new(adapter: Arc<SlaAdapter>, config: SlaConfig, info: SlaInfoHub) -> Self {
        Self {
            adapter,
            config,
            accounts: Arc::new(DashMap::new()),
            info,
        }
    }

    pub fn adapter(&self) -> &Arc<SlaAdapter> {
        &self.adapter
    }

    pub fn config(&self) -> &SlaConfig {
        &self.config
    }

    /// Receive informational events
    pub fn subscribe_info(&self) -> broadcast::Receiver<SlaInfo> {
        self.info.subscribe()
    }

    pub fn info_hub(&self) -> &SlaInfoHub {
        &self.info
    }

    fn entry(&self, account: AccountId) -> SlaResult<Arc<AccountEntry>> {
        self.accounts
            .get(&account)
            .map(|e| e.clone())
            .ok_or_else(|| SlaError::invalid_argument(format!("unknown account {}", account)))
    }

    // ===== Account management =====

    /// Register an account; nothing is subscribed until `start`/`reconcile`
    pub fn add_account(&self, account: AccountId, config: AccountConfig) -> SlaResult<()> {
        config.validate(&self.config)?;
        if self.accounts.contains_key(&account) {
            return Err(SlaError::invalid_argument(format!("account {} already registered", account)));
        }
        info!("Adding account {} ({})", account, config.id);
        self.accounts
            .insert(account, Arc::new(AccountEntry::new(config, &self.config)));
        Ok(())
    }

    /// Replace an account's configuration
    ///
    /// Live subscriptions are left alone; call [`reconcile`](Self::reconcile)
    /// to apply the new enable flags.
    pub fn update_account(&self, account: AccountId, config: AccountConfig) -> SlaResult<()> {
        config.validate(&self.config)?;
        let entry = self.entry(account)?;
        *entry.config.write() = config;
        debug!("Updated configuration of account {}", account);
        Ok(())
    }

    /// Flip one slot's enable flag and reconcile that slot
    pub async fn set_enabled(
        &self,
        account: AccountId,
        kind: SubscriptionKind,
        index: usize,
        enabled: bool,
    ) -> SlaResult<StartOutcome> {
        let entry = self.entry(account)?;
        if !entry.config.write().set_enabled(kind, index, enabled) {
            return Err(SlaError::invalid_argument(format!(
                "{} index {} is not configured for account {}",
                kind, index, account
            )));
        }
        self.start(account, kind, index).await
    }

    /// Unsubscribe every slot of an account and forget it
    pub async fn remove_account(&self, account: AccountId) -> SlaResult<ReconcileReport> {
        let entry = self.entry(account)?;
        entry.config.write().disable_all();
        let report = self.reconcile(account).await?;
        self.accounts.remove(&account);
        info!("Removed account {}", account);
        Ok(report)
    }

    pub fn accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.accounts.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    pub fn account_config(&self, account: AccountId) -> Option<AccountConfig> {
        self.accounts.get(&account).map(|e| e.config.read().clone())
    }

    /// Live subscription in a slot
    pub fn active(&self, account: AccountId, kind: SubscriptionKind, index: usize) -> Option<ActiveSlot> {
        self.accounts.get(&account)?.slots.lock().get(kind, index)
    }

    pub fn active_count(&self, account: AccountId, kind: SubscriptionKind) -> usize {
        self.accounts
            .get(&account)
            .map_or(0, |e| e.slots.lock().active_count(kind))
    }

    // ===== Lifecycle =====

    /// Start a shared line subscription
    pub async fn start_line(&self, account: AccountId, index: usize) -> SlaResult<StartOutcome> {
        self.start(account, SubscriptionKind::LineAppearance, index).await
    }

    /// Start a busy lamp subscription
    pub async fn start_device(&self, account: AccountId, index: usize) -> SlaResult<StartOutcome> {
        self.start(account, SubscriptionKind::DeviceMonitor, index).await
    }

    /// Bring one slot in line with its configuration
    pub async fn start(&self, account: AccountId, kind: SubscriptionKind, index: usize) -> SlaResult<StartOutcome> {
        let entry = self.entry(account)?;
        if !kind.slot_range(self.config.capacity(kind)).contains(&index) {
            debug!("{} index {} out of range for account {}", kind, index, account);
            return Ok(StartOutcome::OutOfRange);
        }

        let _start_guard = entry.start_lock.lock().await;

        let (local_uri, endpoint) = {
            let config = entry.config.read();
            (config.id.clone(), config.endpoint(kind, index).cloned())
        };
        let enabled = endpoint.as_ref().map_or(false, |e| e.enabled);
        let target = endpoint.map(|e| e.target).unwrap_or_default();
        debug!("{} Subscribe Local {}", kind, local_uri);
        debug!("{} Subscribe Remote {}", kind, target);

        let current = entry.slots.lock().get(kind, index);
        match (enabled, current) {
            (false, Some(slot)) => self.unsubscribe_slot(account, &entry, kind, index, slot).await,
            (false, None) => Ok(StartOutcome::Disabled),
            (true, Some(_)) => {
                debug!("{} index {} of account {} already subscribed", kind, index, account);
                Ok(StartOutcome::AlreadyActive)
            }
            (true, None) => self.subscribe_slot(account, &entry, kind, index, &target).await,
        }
    }

    /// Call [`start`](Self::start) for every slot of the account
    pub async fn reconcile(&self, account: AccountId) -> SlaResult<ReconcileReport> {
        self.entry(account)?;
        let mut report = ReconcileReport::default();
        for kind in [SubscriptionKind::LineAppearance, SubscriptionKind::DeviceMonitor] {
            for index in kind.slot_range(self.config.capacity(kind)) {
                match self.start(account, kind, index).await {
                    Ok(StartOutcome::Started { .. }) => report.started.push((kind, index)),
                    Ok(StartOutcome::Unsubscribed) => report.unsubscribed.push((kind, index)),
                    Ok(_) => {}
                    Err(e) => {
                        warn!("{} index {} of account {} failed: {}", kind, index, account, e);
                        report.failed.push((kind, index, e));
                    }
                }
            }
        }
        Ok(report)
    }

    /// Reconcile every registered account
    pub async fn reconcile_all(&self) -> Vec<(AccountId, ReconcileReport)> {
        let mut reports = Vec::new();
        for account in self.accounts() {
            match self.reconcile(account).await {
                Ok(report) => reports.push((account, report)),
                // Removed concurrently
                Err(e) => debug!("Skipping account {}: {}", account, e),
            }
        }
        reports
    }

    async fn unsubscribe_slot(
        &self,
        account: AccountId,
        entry: &AccountEntry,
        kind: SubscriptionKind,
        index: usize,
        slot: ActiveSlot,
    ) -> SlaResult<StartOutcome> {
        let guard = self.adapter.locks().lock(slot.dialog).await;

        // Detached first so the terminal callback finds no account to report
        let cleared = entry.slots.lock().clear_if(kind, index, slot.subscription);
        self.adapter.bindings().unbind(slot.subscription);

        // The subscription ended while this call waited for the dialog
        if !cleared || !self.adapter.has_record(slot.subscription) {
            debug!(
                "{} index {} of account {} already ended with {}",
                kind, index, account, slot.subscription
            );
            drop(guard);
            if !self.adapter.has_record(slot.subscription) {
                self.adapter.locks().remove(slot.dialog);
            }
            return Ok(StartOutcome::Disabled);
        }
        info!("Unsubscribing {} index {} of account {}", kind, index, account);

        let request = self
            .adapter
            .initiate_locked(slot.subscription, Expires::Unsubscribe)
            .await
            .map_err(|e| {
                error!("Unable to create unsubscribe for {}: {}", slot.subscription, e);
                e
            })?;
        self.adapter
            .send_locked(slot.subscription, request)
            .await
            .map_err(|e| {
                error!("Unable to send unsubscribe for {}: {}", slot.subscription, e);
                e
            })?;
        Ok(StartOutcome::Unsubscribed)
    }

    async fn subscribe_slot(
        &self,
        account: AccountId,
        entry: &AccountEntry,
        kind: SubscriptionKind,
        index: usize,
        target: &str,
    ) -> SlaResult<StartOutcome> {
        let config = entry.config.read().clone();
        let engine = self.adapter.engine();

        let contact = match &config.contact {
            Some(contact) => contact.clone(),
            None => engine
                .create_uac_contact(account, &config.id)
                .await
                .map_err(|e| {
                    let err = SlaError::resource_creation("generate Contact header", e);
                    error!("{} index {} of account {}: {}", kind, index, account, err);
                    err
                })?,
        };

        let dialog = engine
            .create_uac_dialog(&UacDialogRequest {
                local_uri: config.id.clone(),
                contact,
                target: target.to_string(),
            })
            .await
            .map_err(|e| {
                let err = SlaError::resource_creation("create dialog", e);
                error!("{} index {} of account {}: {}", kind, index, account, err);
                err
            })?;

        let guard = self.adapter.locks().lock(dialog).await;
        let mut created = None;
        let result = self
            .subscribe_locked(account, entry, &config, kind, index, dialog, &mut created)
            .await;

        match result {
            Ok(subscription) => {
                info!(
                    "Subscribed {} index {} of account {} to {} ({})",
                    kind, index, account, target, subscription
                );
                Ok(StartOutcome::Started { subscription, dialog })
            }
            Err(e) => {
                error!("Unable to subscribe {} index {} of account {}: {}", kind, index, account, e);
                match created {
                    Some(subscription) => {
                        entry.slots.lock().clear_if(kind, index, subscription);
                        self.adapter.bindings().unbind(subscription);
                        if let Err(te) = self.adapter.terminate_locked(subscription, false).await {
                            warn!("Unable to terminate {}: {}", subscription, te);
                        }
                        drop(guard);
                    }
                    None => {
                        drop(guard);
                        self.adapter.locks().remove(dialog);
                    }
                }
                Err(e)
            }
        }
    }

    async fn subscribe_locked(
        &self,
        account: AccountId,
        entry: &AccountEntry,
        config: &AccountConfig,
        kind: SubscriptionKind,
        index: usize,
        dialog: DialogId,
        created: &mut Option<SubscriptionId>,
    ) -> SlaResult<SubscriptionId> {
        let subscription = self
            .adapter
            .create_locked(dialog, self.callbacks(), kind, index)
            .await?;
        *created = Some(subscription);

        self.apply_dialog_preferences(dialog, config).await;

        self.adapter.bindings().bind(subscription, account);
        entry
            .slots
            .lock()
            .set(kind, index, ActiveSlot { subscription, dialog });

        let request = self
            .adapter
            .initiate_locked(subscription, kind.initial_expires())
            .await?;
        self.adapter.send_locked(subscription, request).await?;
        Ok(subscription)
    }

    /// Transport, route set and auth settings; each applied only when
    /// configured, failures logged
    async fn apply_dialog_preferences(&self, dialog: DialogId, config: &AccountConfig) {
        let engine = self.adapter.engine();
        if let Some(transport_id) = config.transport_id {
            if let Err(e) = engine.set_transport(dialog, TransportSelector { transport_id }).await {
                warn!("Unable to lock dialog {} to transport {}: {}", dialog, transport_id, e);
            }
        }
        if !config.route_set.is_empty() {
            if let Err(e) = engine.set_route_set(dialog, &config.route_set).await {
                warn!("Unable to set route set of dialog {}: {}", dialog, e);
            }
        }
        if !config.credentials.is_empty() {
            if let Err(e) = engine.set_credentials(dialog, &config.credentials).await {
                warn!("Unable to set credentials of dialog {}: {}", dialog, e);
            }
        }
        if let Some(prefs) = &config.auth_prefs {
            if let Err(e) = engine.set_auth_prefs(dialog, prefs).await {
                warn!("Unable to set auth preferences of dialog {}: {}", dialog, e);
            }
        }
    }

    /// Handlers installed on every registry subscription
    fn callbacks(&self) -> SubscriptionCallbacks {
        let accounts = self.accounts.clone();
        let state_info = self.info.clone();
        let notify_info = self.info.clone();

        SubscriptionCallbacks::new()
            .on_state_changed(move |ctx| on_registry_state(&accounts, &state_info, ctx))
            .on_incoming_notify(move |ctx, request| {
                if let Some(account) = ctx.account {
                    notify_info.publish(SlaInfo::notify(
                        account,
                        ctx.subscription,
                        ctx.kind,
                        ctx.index,
                        request.clone(),
                    ));
                }
                ResponseOverride::default()
            })
    }
}

fn on_registry_state(accounts: &AccountTable, info: &SlaInfoHub, ctx: &SubscriptionContext) {
    // Unbound subscriptions were detached by an unsubscribe or a failed start
    let Some(account) = ctx.account else {
        return;
    };
    debug!(
        "{} index {} subscription for {} is {}",
        ctx.kind, ctx.index, account, ctx.state_name
    );
    if !ctx.state.is_terminated() {
        return;
    }

    info.publish(SlaInfo::terminated(account, ctx.subscription, ctx.kind, ctx.index));

    // The adapter releases the account binding once the record is destroyed
    if let Some(entry) = accounts.get(&account).map(|e| e.clone()) {
        entry.slots.lock().clear_if(ctx.kind, ctx.index, ctx.subscription);
    }
}
