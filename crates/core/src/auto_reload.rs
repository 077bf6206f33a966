use std::time::Duration;

use tracing::debug;

use crate::tabs::TopTab;

pub const DEFAULT_RELOAD_PERIOD: Duration = Duration::from_secs(10);
pub const MIN_RELOAD_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollTab {
    History,
    Running,
}

impl PollTab {
    #[must_use]
    pub fn from_top_tab(tab: TopTab) -> Option<Self> {
        match tab {
            TopTab::History => Some(Self::History),
            TopTab::Running => Some(Self::Running),
            TopTab::Setting => None,
        }
    }

    #[must_use]
    pub fn top_tab(self) -> TopTab {
        match self {
            Self::History => TopTab::History,
            Self::Running => TopTab::Running,
        }
    }
}

/// A repeating timer that fires reload requests for one tab until cancelled.
pub trait ReloadTimer {
    type Handle: std::fmt::Debug;

    fn start(&mut self, tab: PollTab, period: Duration) -> Self::Handle;
    fn cancel(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started(PollTab),
    Stopped(PollTab),
    Ignored,
}

#[derive(Debug)]
pub struct AutoReloadScheduler<T: ReloadTimer> {
    timer: T,
    period: Duration,
    history: Option<T::Handle>,
    running: Option<T::Handle>,
}

impl<T: ReloadTimer> AutoReloadScheduler<T> {
    #[must_use]
    pub fn new(timer: T, period: Duration) -> Self {
        Self {
            timer,
            period: period.max(MIN_RELOAD_PERIOD),
            history: None,
            running: None,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    #[must_use]
    pub fn is_polling(&self, tab: PollTab) -> bool {
        self.slot(tab).is_some()
    }

    fn slot(&self, tab: PollTab) -> &Option<T::Handle> {
        match tab {
            PollTab::History => &self.history,
            PollTab::Running => &self.running,
        }
    }

    fn slot_mut(&mut self, tab: PollTab) -> &mut Option<T::Handle> {
        match tab {
            PollTab::History => &mut self.history,
            PollTab::Running => &mut self.running,
        }
    }

    pub fn toggle(&mut self, active: TopTab) -> ToggleOutcome {
        let Some(tab) = PollTab::from_top_tab(active) else {
            return ToggleOutcome::Ignored;
        };

        if let Some(handle) = self.slot_mut(tab).take() {
            self.timer.cancel(handle);
            debug!(?tab, "auto reload stopped");
            return ToggleOutcome::Stopped(tab);
        }

        let handle = self.timer.start(tab, self.period);
        *self.slot_mut(tab) = Some(handle);
        debug!(?tab, period_secs = self.period.as_secs(), "auto reload started");
        ToggleOutcome::Started(tab)
    }

    pub fn stop_all(&mut self) {
        for tab in [PollTab::History, PollTab::Running] {
            if let Some(handle) = self.slot_mut(tab).take() {
                self.timer.cancel(handle);
            }
        }
    }
}

impl<T: ReloadTimer> Drop for AutoReloadScheduler<T> {
    fn drop(&mut self) {
        self.stop_all();
    }
}
