//! Module setup and teardown
//!
//! [`SlaModule::init`] registers the `dialog` event package with the engine
//! and builds the adapter, registry and (optionally) the unsolicited NOTIFY
//! interceptor around it.
//!
//! ```rust,ignore
//! let module = SlaModule::init(engine, SlaConfig::default()).await?;
//! module.registry().add_account(AccountId(0), account)?;
//! module.registry().reconcile(AccountId(0)).await?;
//!
//! let mut info = module.subscribe_info();
//! while let Ok(event) = info.recv().await {
//!     println!("{:?} on {:?}", event.reason, event.account);
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
#[cfg(feature = "events")]
use tokio::sync::mpsc;
#[cfg(feature = "events")]
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapter::SlaAdapter;
#[cfg(feature = "events")]
use crate::adapter::EngineEvent;
use crate::config::SlaConfig;
use crate::engine::SubscriptionEngine;
use crate::errors::{SlaError, SlaResult};
use crate::events::{SlaInfo, SlaInfoHub};
use crate::interceptor::UnsolicitedNotifyInterceptor;
use crate::message::IncomingRequest;
use crate::registry::SlaRegistry;
use crate::subscription::{DialogInfoPackage, EventPackage};

/// The initialized SLA/BLF module
pub struct SlaModule {
    config: SlaConfig,
    engine: Arc<dyn SubscriptionEngine>,
    adapter: Arc<SlaAdapter>,
    registry: Arc<SlaRegistry>,
    interceptor: Option<UnsolicitedNotifyInterceptor>,
    info: SlaInfoHub,
    running: AtomicBool,
}

impl std::fmt::Debug for SlaModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlaModule")
            .field("config", &self.config)
            .field("interceptor", &self.interceptor.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SlaModule {
    /// Register the package built from `config` and wire everything up
    pub async fn init(engine: Arc<dyn SubscriptionEngine>, config: SlaConfig) -> SlaResult<Self> {
        let package = DialogInfoPackage::new(
            config.event_name.clone(),
            Duration::from_secs(u64::from(config.default_expires)),
        );
        Self::init_with_package(engine, config, Arc::new(package)).await
    }

    /// Same as [`init`](Self::init) with a caller-supplied package
    pub async fn init_with_package(
        engine: Arc<dyn SubscriptionEngine>,
        config: SlaConfig,
        package: Arc<dyn EventPackage>,
    ) -> SlaResult<Self> {
        config.validate()?;

        let registration = package.registration();
        engine.register_package(&registration).await.map_err(|e| {
            let err = SlaError::resource_creation(format!("register event package '{}'", registration.event_name), e);
            error!("{}", err);
            err
        })?;
        info!(
            "Registered '{}' event package (expires {}s)",
            registration.event_name, registration.default_expires
        );

        let info = SlaInfoHub::new(config.info_channel_capacity);
        let adapter = Arc::new(SlaAdapter::new(engine.clone(), package.clone()));
        let registry = Arc::new(SlaRegistry::new(adapter.clone(), config.clone(), info.clone()));
        let interceptor = config.intercept_unsolicited.then(|| {
            UnsolicitedNotifyInterceptor::new(engine.clone(), registry.clone(), info.clone(), package.name())
        });

        Ok(Self {
            config,
            engine,
            adapter,
            registry,
            interceptor,
            info,
            running: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &SlaConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<SlaAdapter> {
        &self.adapter
    }

    pub fn registry(&self) -> &Arc<SlaRegistry> {
        &self.registry
    }

    pub fn interceptor(&self) -> Option<&UnsolicitedNotifyInterceptor> {
        self.interceptor.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Receive informational events
    pub fn subscribe_info(&self) -> broadcast::Receiver<SlaInfo> {
        self.info.subscribe()
    }

    /// Offer an out-of-dialog request to the interceptor
    pub async fn on_rx_request(&self, request: &IncomingRequest) -> bool {
        match &self.interceptor {
            Some(interceptor) if self.is_running() => interceptor.on_rx_request(request).await,
            _ => false,
        }
    }

    /// Create the engine event channel and start the adapter's event loop
    #[cfg(feature = "events")]
    pub fn start_event_loop(&self, capacity: usize) -> (mpsc::Sender<EngineEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = self.adapter.clone().spawn_event_loop(rx);
        (tx, handle)
    }

    /// Unsubscribe every account and unregister the package
    ///
    /// Subscriptions that fail to unsubscribe are logged; the package is
    /// unregistered regardless.
    pub async fn shutdown(&self) -> SlaResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SlaError::invalid_operation("SLA module already shut down"));
        }
        info!("Shutting down SLA module");

        for account in self.registry.accounts() {
            match self.registry.remove_account(account).await {
                Ok(report) if !report.is_clean() => {
                    warn!("Account {} left {} subscriptions behind", account, report.failed.len())
                }
                Ok(_) => {}
                Err(e) => warn!("Unable to remove account {}: {}", account, e),
            }
        }

        let event_name = self.adapter.package().name().to_string();
        self.engine
            .unregister_package(&event_name)
            .await
            .map_err(|e| SlaError::resource_creation(format!("unregister event package '{}'", event_name), e))
    }
}
