use indexmap::IndexSet;

use crate::aggregate::ALL_DATASOURCES_KEY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TopTab {
    #[default]
    History,
    Running,
    Setting,
}

impl TopTab {
    pub const ALL: [TopTab; 3] = [TopTab::History, TopTab::Running, TopTab::Setting];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::History => "Query History",
            Self::Running => "Running Queries",
            Self::Setting => "Settings",
        }
    }

    #[must_use]
    pub fn has_aggregate(self) -> bool {
        !matches!(self, Self::Setting)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubTabOutcome {
    Selected,
    Unchanged,
    AggregateNotAvailable,
    UnknownDatasource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubTabs {
    names: IndexSet<String>,
    active: Option<String>,
}

impl SubTabs {
    #[must_use]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        self.active() == Some(name)
    }

    pub fn register(&mut self, name: &str) {
        if !self.names.contains(name) {
            self.names.insert(name.to_string());
        }
    }

    pub fn select(&mut self, name: &str) -> SubTabOutcome {
        if !self.names.contains(name) {
            return SubTabOutcome::UnknownDatasource;
        }
        if self.is_active(name) {
            return SubTabOutcome::Unchanged;
        }
        self.active = Some(name.to_string());
        SubTabOutcome::Selected
    }

    pub fn cycle(&mut self, forward: bool) -> Option<&str> {
        let len = self.names.len();
        if len == 0 {
            return None;
        }
        let current = self
            .active
            .as_deref()
            .and_then(|name| self.names.get_index_of(name));
        let next = match current {
            None => 0,
            Some(current) if forward => (current + 1) % len,
            Some(current) => (current + len - 1) % len,
        };
        self.active = self.names.get_index(next).cloned();
        self.active()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSelection {
    active: TopTab,
    history: SubTabs,
    running: SubTabs,
    setting: SubTabs,
    initialized: bool,
}

impl TabSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn active_top_tab(&self) -> TopTab {
        self.active
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn select_top_tab(&mut self, tab: TopTab) {
        self.active = tab;
    }

    #[must_use]
    pub fn sub_tabs(&self, tab: TopTab) -> &SubTabs {
        match tab {
            TopTab::History => &self.history,
            TopTab::Running => &self.running,
            TopTab::Setting => &self.setting,
        }
    }

    fn sub_tabs_mut(&mut self, tab: TopTab) -> &mut SubTabs {
        match tab {
            TopTab::History => &mut self.history,
            TopTab::Running => &mut self.running,
            TopTab::Setting => &mut self.setting,
        }
    }

    #[must_use]
    pub fn active_sub_tab(&self) -> Option<&str> {
        self.sub_tabs(self.active).active()
    }

    pub fn select_sub_tab(&mut self, name: &str) -> SubTabOutcome {
        let tab = self.active;
        if !tab.has_aggregate() && name == ALL_DATASOURCES_KEY {
            return SubTabOutcome::AggregateNotAvailable;
        }
        self.sub_tabs_mut(tab).select(name)
    }

    pub fn cycle_sub_tab(&mut self, forward: bool) -> Option<&str> {
        let tab = self.active;
        self.sub_tabs_mut(tab).cycle(forward)
    }

    pub fn register_datasources<'a>(&mut self, datasources: impl IntoIterator<Item = &'a str>) {
        for name in datasources {
            if name == ALL_DATASOURCES_KEY {
                continue;
            }
            for tab in TopTab::ALL {
                self.sub_tabs_mut(tab).register(name);
            }
        }
        for tab in TopTab::ALL {
            if tab.has_aggregate() {
                let names = &mut self.sub_tabs_mut(tab).names;
                names.shift_remove(ALL_DATASOURCES_KEY);
                names.insert(ALL_DATASOURCES_KEY.to_string());
            }
        }
    }

    pub fn initialize<'a>(&mut self, datasources: impl IntoIterator<Item = &'a str>) -> bool {
        if self.initialized {
            return false;
        }
        let datasources = datasources
            .into_iter()
            .filter(|name| *name != ALL_DATASOURCES_KEY)
            .collect::<Vec<_>>();
        self.register_datasources(datasources.iter().copied());
        if let Some(first) = datasources.first() {
            for tab in TopTab::ALL {
                self.sub_tabs_mut(tab).select(first);
            }
        }
        self.initialized = true;
        true
    }
}
