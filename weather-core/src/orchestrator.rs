//! Search orchestration: sequences the gateway calls behind a user search and
//! keeps the displayed weather and history consistent.
//!
//! State lives in a [`watch`] channel so front-ends can observe every
//! transition. Gateway failures never escape this module; they are logged and
//! the affected piece of state keeps its last-known-good value.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    Config,
    gateway::{DEFAULT_HISTORY_LIMIT, WeatherGateway},
    model::{HistoryEntry, SearchState, WeatherResult},
    transform,
};

/// What to do when an entry point is invoked while another one is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Refuse the new request; nothing is sent to the gateway.
    #[default]
    RejectWhileBusy,
    /// Let both run; whichever finishes last owns the state, and the first one
    /// to finish clears the busy flag.
    LastWriterWins,
}

impl OverlapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapPolicy::RejectWhileBusy => "reject-while-busy",
            OverlapPolicy::LastWriterWins => "last-writer-wins",
        }
    }

    pub const fn all() -> &'static [OverlapPolicy] {
        &[OverlapPolicy::RejectWhileBusy, OverlapPolicy::LastWriterWins]
    }
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for OverlapPolicy {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "reject-while-busy" => Ok(OverlapPolicy::RejectWhileBusy),
            "last-writer-wins" => Ok(OverlapPolicy::LastWriterWins),
            _ => Err(anyhow::anyhow!(
                "Unknown overlap policy '{value}'. Supported: reject-while-busy, last-writer-wins."
            )),
        }
    }
}

/// Result of one history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRefresh {
    /// The list was replaced with this many entries.
    Replaced(usize),
    /// The gateway answered with no records; the list was kept.
    Empty,
    /// The gateway call failed; the list was kept.
    Failed,
    /// The initial load already ran on this orchestrator.
    AlreadyLoaded,
    /// Another request was in flight under [`OverlapPolicy::RejectWhileBusy`].
    Rejected,
}

/// Result of [`SearchOrchestrator::search_city`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Blank input; no request was made.
    Skipped,
    /// Another request was in flight under [`OverlapPolicy::RejectWhileBusy`].
    Rejected,
    /// The weather call failed; nothing changed and history was not requested.
    WeatherUnavailable,
    /// A new weather result is displayed; `history` says what the follow-up
    /// history fetch did.
    Updated { history: HistoryRefresh },
}

/// Owns the client-visible state and sequences gateway calls.
///
/// Cheap to clone; clones share the same state and gateway.
pub struct SearchOrchestrator<G> {
    inner: Arc<Inner<G>>,
}

struct Inner<G> {
    gateway: G,
    state: watch::Sender<SearchState>,
    history_limit: usize,
    policy: OverlapPolicy,
    initial_loaded: AtomicBool,
}

impl<G> Clone for SearchOrchestrator<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G> fmt::Debug for SearchOrchestrator<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("history_limit", &self.inner.history_limit)
            .field("policy", &self.inner.policy)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

/// Clears the busy flag when dropped, whichever way the operation ends.
struct BusyGuard<'a> {
    state: &'a watch::Sender<SearchState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_if_modified(|s| std::mem::replace(&mut s.busy, false));
    }
}

impl<G: WeatherGateway> SearchOrchestrator<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_options(gateway, DEFAULT_HISTORY_LIMIT, OverlapPolicy::default())
    }

    pub fn from_config(gateway: G, config: &Config) -> Self {
        Self::with_options(gateway, config.history_limit(), config.overlap_policy)
    }

    pub fn with_options(gateway: G, history_limit: usize, policy: OverlapPolicy) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(Inner {
                gateway,
                state,
                history_limit,
                policy,
                initial_loaded: AtomicBool::new(false),
            }),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    /// Observe every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    pub fn weather(&self) -> Option<WeatherResult> {
        self.inner.state.borrow().weather.clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.state.borrow().history.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.borrow().busy
    }

    /// Look up `city`, then refresh history if the lookup succeeded.
    ///
    /// Blank input is ignored. The busy flag is held for both calls.
    #[tracing::instrument(skip(self))]
    pub async fn search_city(&self, city: &str) -> SearchOutcome {
        let city = city.trim();
        if city.is_empty() {
            debug!("ignoring blank search");
            return SearchOutcome::Skipped;
        }

        let Some(_busy) = self.enter_busy() else {
            info!("search rejected: another request is in flight");
            return SearchOutcome::Rejected;
        };

        let weather = match self.inner.gateway.fetch_weather(city).await {
            Ok(weather) => weather,
            Err(err) => {
                warn!(error = %err, "weather lookup failed; keeping last result");
                return SearchOutcome::WeatherUnavailable;
            }
        };

        self.inner.state.send_modify(|s| s.weather = Some(weather));

        let history = self.refresh_history().await;
        SearchOutcome::Updated { history }
    }

    /// Populate the history list at start-up. Runs at most once per orchestrator.
    #[tracing::instrument(skip(self))]
    pub async fn load_initial_history(&self) -> HistoryRefresh {
        if self.inner.initial_loaded.load(Ordering::Acquire) {
            return HistoryRefresh::AlreadyLoaded;
        }

        let Some(_busy) = self.enter_busy() else {
            info!("initial history load rejected: another request is in flight");
            return HistoryRefresh::Rejected;
        };

        if self.inner.initial_loaded.swap(true, Ordering::AcqRel) {
            return HistoryRefresh::AlreadyLoaded;
        }

        self.refresh_history().await
    }

    /// Mark the orchestrator busy. `None` means the request must be refused.
    fn enter_busy(&self) -> Option<BusyGuard<'_>> {
        let state = &self.inner.state;
        match self.inner.policy {
            OverlapPolicy::RejectWhileBusy => {
                let acquired = state.send_if_modified(|s| !std::mem::replace(&mut s.busy, true));
                acquired.then(|| BusyGuard { state })
            }
            OverlapPolicy::LastWriterWins => {
                state.send_if_modified(|s| !std::mem::replace(&mut s.busy, true));
                Some(BusyGuard { state })
            }
        }
    }

    async fn refresh_history(&self) -> HistoryRefresh {
        match self.inner.gateway.fetch_history(self.inner.history_limit).await {
            Ok(records) if records.is_empty() => {
                debug!("gateway returned no history; keeping current list");
                HistoryRefresh::Empty
            }
            Ok(records) => {
                let entries = transform::to_history_list(&records);
                let count = entries.len();
                self.inner.state.send_modify(|s| s.history = entries);
                HistoryRefresh::Replaced(count)
            }
            Err(err) => {
                warn!(error = %err, "history fetch failed; keeping current list");
                HistoryRefresh::Failed
            }
        }
    }
}

impl<G: WeatherGateway + 'static> SearchOrchestrator<G> {
    /// Run [`search_city`](Self::search_city) as a task. Aborting the handle
    /// drops any in-flight request and releases the busy flag.
    pub fn spawn_search(&self, city: impl Into<String>) -> JoinHandle<SearchOutcome> {
        let this = self.clone();
        let city = city.into();
        tokio::spawn(async move { this.search_city(&city).await })
    }

    /// Run [`load_initial_history`](Self::load_initial_history) as a task.
    pub fn spawn_initial_history(&self) -> JoinHandle<HistoryRefresh> {
        let this = self.clone();
        tokio::spawn(async move { this.load_initial_history().await })
    }
}
