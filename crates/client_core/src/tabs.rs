//! Per-tab load tracking.
//!
//! Each tab moves `Idle -> Loading -> {Ready | Error}` and back to `Loading` on
//! every refresh. `loaded` records whether the tab ever held data, which is
//! what decides whether selecting it dispatches a fetch.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    Riddle,
    Daily,
    Leaderboard,
    Rooms,
}

impl Tab {
    pub fn requires_session(self) -> bool {
        matches!(self, Tab::Riddle | Tab::Daily)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TabState {
    pub phase: LoadPhase,
    pub loaded: bool,
}

impl TabState {
    pub fn needs_fetch(&self) -> bool {
        !self.loaded && self.phase != LoadPhase::Loading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TabStates {
    riddle: TabState,
    daily: TabState,
    leaderboard: TabState,
    rooms: TabState,
}

impl TabStates {
    pub fn get(&self, tab: Tab) -> TabState {
        match tab {
            Tab::Riddle => self.riddle,
            Tab::Daily => self.daily,
            Tab::Leaderboard => self.leaderboard,
            Tab::Rooms => self.rooms,
        }
    }

    fn get_mut(&mut self, tab: Tab) -> &mut TabState {
        match tab {
            Tab::Riddle => &mut self.riddle,
            Tab::Daily => &mut self.daily,
            Tab::Leaderboard => &mut self.leaderboard,
            Tab::Rooms => &mut self.rooms,
        }
    }

    pub fn begin(&mut self, tab: Tab) {
        self.get_mut(tab).phase = LoadPhase::Loading;
    }

    pub fn succeed(&mut self, tab: Tab) {
        let state = self.get_mut(tab);
        state.phase = LoadPhase::Ready;
        state.loaded = true;
    }

    /// Keeps `loaded` so stale data stays available.
    pub fn fail(&mut self, tab: Tab) {
        self.get_mut(tab).phase = LoadPhase::Error;
    }

    pub fn reset(&mut self, tab: Tab) {
        *self.get_mut(tab) = TabState::default();
    }
}
