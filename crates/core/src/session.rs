use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, ALL_DATASOURCES_KEY};
use crate::auto_reload::{AutoReloadScheduler, PollTab, ReloadTimer, ToggleOutcome};
use crate::busy::BusyIndicator;
use crate::commands::{Command, CommandTable};
use crate::gateway::{
    FetchCompletion, FetchPayload, FetchRequest, GatewayError, RequestKind, Resource,
};
use crate::local_store::{save_servers, LocalStore, LocalStoreError};
use crate::records::{DatasourceResultMap, QueryRecord, SettingsDocument};
use crate::tabs::{SubTabOutcome, TabSelection, TopTab};

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    Stale,
    Failed(GatewayError),
}

#[derive(Debug, Clone, Default)]
struct FeedState {
    last_applied: Option<u64>,
    last_updated: Option<SystemTime>,
    last_error: Option<GatewayError>,
}

impl FeedState {
    fn is_stale(&self, id: u64) -> bool {
        self.last_applied.is_some_and(|applied| id < applied)
    }
}

/// All client-side state of one dashboard session.
///
/// The session never performs I/O. Operations that need the backend return a
/// [`FetchRequest`]; the caller executes it and hands the resulting
/// [`FetchCompletion`] back through [`DashboardSession::complete`].
#[derive(Debug)]
pub struct DashboardSession<T: ReloadTimer> {
    tabs: TabSelection,
    scheduler: AutoReloadScheduler<T>,
    busy: BusyIndicator,
    commands: CommandTable,
    servers: String,
    history: DatasourceResultMap,
    running: DatasourceResultMap,
    settings: SettingsDocument,
    history_feed: FeedState,
    running_feed: FeedState,
    setting_feed: FeedState,
    loaded_once: HashSet<Resource>,
    next_request_id: u64,
}

impl<T: ReloadTimer> DashboardSession<T> {
    #[must_use]
    pub fn new(timer: T, reload_period: Duration, servers: impl Into<String>) -> Self {
        Self {
            tabs: TabSelection::new(),
            scheduler: AutoReloadScheduler::new(timer, reload_period),
            busy: BusyIndicator::new(),
            commands: CommandTable::new(),
            servers: servers.into(),
            history: DatasourceResultMap::new(),
            running: DatasourceResultMap::new(),
            settings: SettingsDocument::default(),
            history_feed: FeedState::default(),
            running_feed: FeedState::default(),
            setting_feed: FeedState::default(),
            loaded_once: HashSet::new(),
            next_request_id: 0,
        }
    }

    #[must_use]
    pub fn tabs(&self) -> &TabSelection {
        &self.tabs
    }

    #[must_use]
    pub fn scheduler(&self) -> &AutoReloadScheduler<T> {
        &self.scheduler
    }

    #[must_use]
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    #[must_use]
    pub fn servers(&self) -> &str {
        &self.servers
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    #[must_use]
    pub fn is_auto_reloading(&self, tab: PollTab) -> bool {
        self.scheduler.is_polling(tab)
    }

    #[must_use]
    pub fn history(&self) -> &DatasourceResultMap {
        &self.history
    }

    #[must_use]
    pub fn running(&self) -> &DatasourceResultMap {
        &self.running
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsDocument {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsDocument {
        &mut self.settings
    }

    #[must_use]
    pub fn active_records(&self) -> Option<&[QueryRecord]> {
        let map = match self.tabs.active_top_tab() {
            TopTab::History => &self.history,
            TopTab::Running => &self.running,
            TopTab::Setting => return None,
        };
        let name = self.tabs.active_sub_tab()?;
        map.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn last_updated(&self, resource: Resource) -> Option<SystemTime> {
        self.feed(resource).last_updated
    }

    #[must_use]
    pub fn last_error(&self, resource: Resource) -> Option<&GatewayError> {
        self.feed(resource).last_error.as_ref()
    }

    fn feed(&self, resource: Resource) -> &FeedState {
        match resource {
            Resource::History => &self.history_feed,
            Resource::Running => &self.running_feed,
            Resource::Setting => &self.setting_feed,
        }
    }

    fn feed_mut(&mut self, resource: Resource) -> &mut FeedState {
        match resource {
            Resource::History => &mut self.history_feed,
            Resource::Running => &mut self.running_feed,
            Resource::Setting => &mut self.setting_feed,
        }
    }

    fn issue(&mut self, kind: RequestKind) -> FetchRequest {
        self.next_request_id += 1;
        self.busy.begin();
        let request = FetchRequest {
            id: self.next_request_id,
            kind,
            servers: self.servers.clone(),
        };
        debug!(
            id = request.id,
            resource = %request.kind.resource(),
            in_flight = self.busy.in_flight(),
            "request issued"
        );
        request
    }

    pub fn initial_requests(&mut self) -> Vec<FetchRequest> {
        [Resource::History, Resource::Running, Resource::Setting]
            .into_iter()
            .map(|resource| self.load(resource))
            .collect()
    }

    pub fn load(&mut self, resource: Resource) -> FetchRequest {
        self.issue(RequestKind::Load(resource))
    }

    pub fn reload_active_tab(&mut self) -> FetchRequest {
        self.load(Resource::for_tab(self.tabs.active_top_tab()))
    }

    pub fn save_settings(&mut self) -> FetchRequest {
        self.issue(RequestKind::SaveSettings(self.settings.clone()))
    }

    pub fn select_top_tab(&mut self, tab: TopTab) {
        self.tabs.select_top_tab(tab);
    }

    pub fn select_sub_tab(&mut self, name: &str) -> SubTabOutcome {
        let outcome = self.tabs.select_sub_tab(name);
        if matches!(
            outcome,
            SubTabOutcome::UnknownDatasource | SubTabOutcome::AggregateNotAvailable
        ) {
            debug!(name, ?outcome, "sub-tab selection ignored");
        }
        outcome
    }

    pub fn cycle_sub_tab(&mut self, forward: bool) -> Option<&str> {
        self.tabs.cycle_sub_tab(forward)
    }

    /// Starts or stops polling for the active tab. Starting also returns the
    /// immediate reload so the first update does not wait a full period.
    pub fn toggle_auto_reload(&mut self) -> Option<FetchRequest> {
        match self.scheduler.toggle(self.tabs.active_top_tab()) {
            ToggleOutcome::Started(tab) => {
                info!(?tab, "auto reload on");
                Some(self.load(Resource::for_tab(tab.top_tab())))
            }
            ToggleOutcome::Stopped(tab) => {
                info!(?tab, "auto reload off");
                None
            }
            ToggleOutcome::Ignored => None,
        }
    }

    /// Timer firing. A firing that was queued before polling stopped issues
    /// nothing.
    pub fn on_reload_due(&mut self, tab: PollTab) -> Option<FetchRequest> {
        if !self.scheduler.is_polling(tab) {
            debug!(?tab, "reload firing after stop dropped");
            return None;
        }
        Some(self.load(Resource::for_tab(tab.top_tab())))
    }

    pub fn dispatch(&mut self, command: &Command) -> Option<FetchRequest> {
        match command {
            Command::SelectTopTab(tab) => {
                self.select_top_tab(*tab);
                None
            }
            Command::ReloadActiveTab => Some(self.reload_active_tab()),
            Command::ToggleAutoReload => self.toggle_auto_reload(),
            Command::SelectDatasource(name) => {
                self.select_sub_tab(name);
                None
            }
        }
    }

    pub fn set_servers(
        &mut self,
        servers: Option<&str>,
        store: &mut impl LocalStore,
    ) -> Result<(), LocalStoreError> {
        self.servers = servers.unwrap_or_default().to_string();
        save_servers(store, Some(self.servers.as_str()))
    }

    /// Applies a settled request. The busy indicator and the last-updated
    /// time change whatever the outcome; data changes only on success.
    pub fn complete(&mut self, completion: FetchCompletion) -> ApplyOutcome {
        let FetchCompletion {
            id,
            resource,
            result,
        } = completion;

        self.busy.settle();
        let feed = self.feed_mut(resource);
        feed.last_updated = Some(SystemTime::now());

        let payload = match result {
            Ok(payload) => payload,
            Err(error) => {
                warn!(id, %resource, %error, "request failed");
                feed.last_error = Some(error.clone());
                return ApplyOutcome::Failed(error);
            }
        };

        if feed.is_stale(id) {
            debug!(id, %resource, "stale response discarded");
            return ApplyOutcome::Stale;
        }

        match (resource, payload) {
            (Resource::History, FetchPayload::Records(map)) => {
                self.history = aggregate(map, ALL_DATASOURCES_KEY);
            }
            (Resource::Running, FetchPayload::Records(map)) => {
                self.running = aggregate(map, ALL_DATASOURCES_KEY);
            }
            (Resource::Setting, FetchPayload::Settings(document)) => {
                self.settings = document;
            }
            (resource, _) => {
                let error = GatewayError::Decode {
                    url: resource.path().to_string(),
                    message: "response does not match the requested resource".to_string(),
                };
                warn!(id, %resource, "mismatched payload ignored");
                self.feed_mut(resource).last_error = Some(error.clone());
                return ApplyOutcome::Failed(error);
            }
        }

        let feed = self.feed_mut(resource);
        feed.last_applied = Some(id);
        feed.last_error = None;
        debug!(id, %resource, "response applied");

        self.after_apply(resource);
        ApplyOutcome::Applied
    }

    fn after_apply(&mut self, resource: Resource) {
        self.loaded_once.insert(resource);

        if self.tabs.is_initialized() {
            let map = match resource {
                Resource::History => &self.history,
                Resource::Running => &self.running,
                Resource::Setting => return,
            };
            self.tabs
                .register_datasources(map.keys().map(String::as_str));
            return;
        }

        if self.loaded_once.len() == 3 {
            let datasources = self
                .history
                .keys()
                .map(String::as_str)
                .filter(|name| *name != ALL_DATASOURCES_KEY)
                .collect::<Vec<_>>();
            self.tabs.initialize(datasources.iter().copied());
            self.tabs
                .register_datasources(self.running.keys().map(String::as_str));
            self.commands = CommandTable::with_datasources(datasources.iter().copied());
            info!(datasources = datasources.len(), "dashboard initialized");
        }
    }
}
