//! Master-item lookup: debounced, cancellable search per category plus a
//! load-once browse list per category.

use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::{
    domain::{MasterCategory, OrderType},
    protocol::MasterItem,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{MasterDataApi, MasterItemQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupCategory {
    Diagnosis,
    Order(OrderType),
}

impl LookupCategory {
    pub fn master_category(self) -> Option<MasterCategory> {
        match self {
            Self::Diagnosis => Some(MasterCategory::Diagnosis),
            Self::Order(order_type) => order_type.master_category(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Diagnosis => "diagnosis",
            Self::Order(order_type) => order_type.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSettings {
    pub debounce: Duration,
    pub min_query_chars: usize,
    pub search_page_size: u32,
    pub list_page_size: u32,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            min_query_chars: 2,
            search_page_size: 20,
            list_page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPhase {
    #[default]
    Idle,
    Debouncing(RequestToken),
    InFlight(RequestToken),
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTransition {
    /// Query too short or no backing store; results were cleared.
    Cleared,
    Scheduled { token: RequestToken, query: String },
}

#[derive(Debug, Clone, Default)]
pub struct SearchSlot {
    phase: SearchPhase,
    query: String,
    results: Vec<MasterItem>,
    last_token: u64,
}

impl SearchSlot {
    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn keystroke(&mut self, raw: &str, min_chars: usize, searchable: bool) -> SearchTransition {
        self.last_token += 1;
        let query = raw.trim().to_string();
        self.query = query.clone();

        if !searchable || query.chars().count() < min_chars {
            self.phase = SearchPhase::Idle;
            self.results.clear();
            return SearchTransition::Cleared;
        }

        let token = RequestToken(self.last_token);
        self.phase = SearchPhase::Debouncing(token);
        SearchTransition::Scheduled { token, query }
    }

    pub fn begin(&mut self, token: RequestToken) -> bool {
        if self.phase != SearchPhase::Debouncing(token) {
            return false;
        }
        self.phase = SearchPhase::InFlight(token);
        true
    }

    /// Applies a response. Returns false, leaving the slot untouched, unless
    /// `token` is the request currently in flight.
    pub fn settle(&mut self, token: RequestToken, items: Vec<MasterItem>) -> bool {
        if self.phase != SearchPhase::InFlight(token) {
            return false;
        }
        self.results = items;
        self.phase = SearchPhase::Settled;
        true
    }

    pub fn cancel(&mut self) {
        self.last_token += 1;
        if matches!(
            self.phase,
            SearchPhase::Debouncing(_) | SearchPhase::InFlight(_)
        ) {
            self.phase = SearchPhase::Idle;
        }
    }

    pub fn view(&self) -> SearchView {
        SearchView {
            query: self.query.clone(),
            results: self.results.clone(),
            loading: matches!(self.phase, SearchPhase::InFlight(_)),
            phase: self.phase,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchView {
    pub query: String,
    pub results: Vec<MasterItem>,
    pub loading: bool,
    pub phase: SearchPhase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub items: Vec<MasterItem>,
    pub loading: bool,
    pub loaded: bool,
    pub supported: bool,
}

impl ListState {
    fn unsupported() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            loaded: false,
            supported: false,
        }
    }

    fn pending() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            loaded: false,
            supported: true,
        }
    }

    /// Hosts show one generic message for an empty list; a failed load and a
    /// genuinely empty category look the same.
    pub fn empty_message(&self) -> Option<&'static str> {
        if !self.supported {
            Some("not available yet")
        } else if self.loaded && self.items.is_empty() {
            Some("no items to show")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct ListSlot {
    state: ListState,
    pending: Option<RequestToken>,
}

#[derive(Debug, Default)]
pub struct LookupState {
    searches: HashMap<LookupCategory, SearchSlot>,
    lists: HashMap<LookupCategory, ListSlot>,
    next_list_token: u64,
    closed: bool,
}

impl LookupState {
    pub fn keystroke(
        &mut self,
        category: LookupCategory,
        raw: &str,
        min_chars: usize,
    ) -> SearchTransition {
        let searchable = !self.closed && category.master_category().is_some();
        self.searches
            .entry(category)
            .or_default()
            .keystroke(raw, min_chars, searchable)
    }

    pub fn begin_search(&mut self, category: LookupCategory, token: RequestToken) -> bool {
        !self.closed
            && self
                .searches
                .get_mut(&category)
                .is_some_and(|slot| slot.begin(token))
    }

    pub fn settle_search(
        &mut self,
        category: LookupCategory,
        token: RequestToken,
        items: Vec<MasterItem>,
    ) -> bool {
        !self.closed
            && self
                .searches
                .get_mut(&category)
                .is_some_and(|slot| slot.settle(token, items))
    }

    pub fn search_view(&self, category: LookupCategory) -> SearchView {
        self.searches
            .get(&category)
            .map(SearchSlot::view)
            .unwrap_or_default()
    }

    pub fn list(&self, category: LookupCategory) -> ListState {
        if category.master_category().is_none() {
            return ListState::unsupported();
        }
        self.lists
            .get(&category)
            .map(|slot| slot.state.clone())
            .unwrap_or_else(ListState::pending)
    }

    pub fn begin_list_load(&mut self, category: LookupCategory) -> Option<RequestToken> {
        if self.closed || category.master_category().is_none() {
            return None;
        }
        let slot = self.lists.entry(category).or_insert_with(|| ListSlot {
            state: ListState::pending(),
            pending: None,
        });
        if slot.state.loaded || slot.state.loading {
            return None;
        }

        self.next_list_token += 1;
        let token = RequestToken(self.next_list_token);
        slot.state.loading = true;
        slot.pending = Some(token);
        Some(token)
    }

    /// On failure the list keeps whatever it held and still becomes `loaded`.
    pub fn finish_list_load(
        &mut self,
        category: LookupCategory,
        token: RequestToken,
        items: Option<Vec<MasterItem>>,
    ) -> bool {
        if self.closed {
            return false;
        }
        let Some(slot) = self.lists.get_mut(&category) else {
            return false;
        };
        if slot.pending != Some(token) {
            return false;
        }

        if let Some(items) = items {
            slot.state.items = items;
        }
        slot.state.loading = false;
        slot.state.loaded = true;
        slot.pending = None;
        true
    }

    pub fn abandon_list_load(&mut self, category: LookupCategory) {
        if let Some(slot) = self.lists.get_mut(&category) {
            if slot.pending.take().is_some() {
                slot.state.loading = false;
            }
        }
    }

    pub fn cancel_search(&mut self, category: LookupCategory) {
        if let Some(slot) = self.searches.get_mut(&category) {
            slot.cancel();
        }
    }

    fn close(&mut self) {
        self.closed = true;
        for slot in self.searches.values_mut() {
            slot.cancel();
        }
        for slot in self.lists.values_mut() {
            if slot.pending.take().is_some() {
                slot.state.loading = false;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupEvent {
    SearchSettled {
        category: LookupCategory,
        items: Vec<MasterItem>,
    },
    ListSettled {
        category: LookupCategory,
        items: Vec<MasterItem>,
    },
}

/// Owns the lookup state of one composer. Dropping it, or calling
/// [`MasterLookup::shutdown`], aborts every outstanding request.
pub struct MasterLookup {
    api: Arc<dyn MasterDataApi>,
    settings: LookupSettings,
    state: Arc<Mutex<LookupState>>,
    search_tasks: Mutex<HashMap<LookupCategory, JoinHandle<()>>>,
    list_tasks: Mutex<HashMap<LookupCategory, JoinHandle<()>>>,
    events: broadcast::Sender<LookupEvent>,
}

impl MasterLookup {
    pub fn new(api: Arc<dyn MasterDataApi>, settings: LookupSettings) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            api,
            settings,
            state: Arc::new(Mutex::new(LookupState::default())),
            search_tasks: Mutex::new(HashMap::new()),
            list_tasks: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn settings(&self) -> &LookupSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LookupEvent> {
        self.events.subscribe()
    }

    pub async fn search(&self, category: LookupCategory, query: &str) {
        let mut tasks = self.search_tasks.lock().await;
        if let Some(previous) = tasks.remove(&category) {
            previous.abort();
        }

        let transition = {
            let mut state = self.state.lock().await;
            state.keystroke(category, query, self.settings.min_query_chars)
        };

        let SearchTransition::Scheduled { token, query } = transition else {
            return;
        };
        let Some(master_category) = category.master_category() else {
            return;
        };

        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let debounce = self.settings.debounce;
        let request = MasterItemQuery {
            category: master_category,
            page_size: self.settings.search_page_size,
            search: Some(query),
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if !state.lock().await.begin_search(category, token) {
                return;
            }

            let items = match api.master_items(request.clone()).await {
                Ok(items) => items,
                Err(err) => {
                    warn!(
                        category = category.label(),
                        search = request.search.as_deref().unwrap_or_default(),
                        "lookup: search failed, showing no results: {err:#}"
                    );
                    Vec::new()
                }
            };

            let applied = state
                .lock()
                .await
                .settle_search(category, token, items.clone());
            if applied {
                let _ = events.send(LookupEvent::SearchSettled { category, items });
            } else {
                debug!(category = category.label(), "lookup: dropped stale search result");
            }
        });
        tasks.insert(category, handle);
    }

    /// Immediate one-shot search that bypasses the debounce and leaves the
    /// interactive slot alone. Same length and failure policy as [`search`].
    ///
    /// [`search`]: MasterLookup::search
    pub async fn resolve(&self, category: LookupCategory, query: &str) -> Vec<MasterItem> {
        let query = query.trim();
        let Some(master_category) = category.master_category() else {
            return Vec::new();
        };
        if query.chars().count() < self.settings.min_query_chars {
            return Vec::new();
        }

        self.api
            .master_items(MasterItemQuery {
                category: master_category,
                page_size: self.settings.search_page_size,
                search: Some(query.to_string()),
            })
            .await
            .unwrap_or_else(|err| {
                warn!(
                    category = category.label(),
                    search = query,
                    "lookup: resolve failed, treating as no match: {err:#}"
                );
                Vec::new()
            })
    }

    pub async fn ensure_list_loaded(&self, category: LookupCategory) -> bool {
        let Some(master_category) = category.master_category() else {
            debug!(category = category.label(), "lookup: no backing store for list");
            return false;
        };

        let mut tasks = self.list_tasks.lock().await;
        let Some(token) = self.state.lock().await.begin_list_load(category) else {
            return false;
        };

        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let request = MasterItemQuery {
            category: master_category,
            page_size: self.settings.list_page_size,
            search: None,
        };

        let handle = tokio::spawn(async move {
            let fetched = match api.master_items(request).await {
                Ok(items) => Some(items),
                Err(err) => {
                    warn!(
                        category = category.label(),
                        "lookup: list load failed, keeping current items: {err:#}"
                    );
                    None
                }
            };

            let snapshot = {
                let mut guard = state.lock().await;
                guard
                    .finish_list_load(category, token, fetched)
                    .then(|| guard.list(category).items)
            };
            if let Some(items) = snapshot {
                let _ = events.send(LookupEvent::ListSettled { category, items });
            }
        });
        tasks.insert(category, handle);
        true
    }

    pub async fn cancel_list_load(&self, category: LookupCategory) {
        if let Some(handle) = self.list_tasks.lock().await.remove(&category) {
            handle.abort();
        }
        self.state.lock().await.abandon_list_load(category);
    }

    pub async fn cancel_search(&self, category: LookupCategory) {
        if let Some(handle) = self.search_tasks.lock().await.remove(&category) {
            handle.abort();
        }
        self.state.lock().await.cancel_search(category);
    }

    pub async fn search_view(&self, category: LookupCategory) -> SearchView {
        self.state.lock().await.search_view(category)
    }

    pub async fn list(&self, category: LookupCategory) -> ListState {
        self.state.lock().await.list(category)
    }

    pub async fn shutdown(&self) {
        for (_, handle) in self.search_tasks.lock().await.drain() {
            handle.abort();
        }
        for (_, handle) in self.list_tasks.lock().await.drain() {
            handle.abort();
        }
        self.state.lock().await.close();
    }
}

impl Drop for MasterLookup {
    fn drop(&mut self) {
        for (_, handle) in self.search_tasks.get_mut().drain() {
            handle.abort();
        }
        for (_, handle) in self.list_tasks.get_mut().drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/lookup_tests.rs"]
mod tests;
