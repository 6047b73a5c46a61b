use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Language, RiddleId, RoomId},
    protocol::{
        Achievements, CategorySummary, CheckAnswerRequest, CreateRoomRequest, CreateRoomResponse,
        DailyAnswerRequest, DailyChallenge, JoinRoomRequest, LeaderboardEntry, LoginRequest,
        Profile, Riddle, RoomDetail, RoomSummary, ShareRequest, ShareResponse, SharedRiddle,
        SignupRequest,
    },
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod api;
pub mod config;
mod durable_session_store;
pub mod error;
pub mod session;
pub mod tabs;
pub mod types;

pub use api::RiddleApi;
pub use config::ClientSettings;
pub use durable_session_store::DurableSessionStore;
pub use error::{ClientError, ErrorCategory};
pub use session::{EphemeralSessionStore, SessionRecord, SessionStore};
pub use tabs::{LoadPhase, Tab, TabState, TabStates};
pub use types::{AnswerFeedback, AuthMode, Credentials, DailyAnswerFeedback, GameSnapshot};

pub type ClientResult<T> = std::result::Result<T, ClientError>;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const EMPTY_ANSWER_MESSAGE: &str = "Please enter an answer.";

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionChanged { username: Option<String> },
    SessionExpired,
    ProfileUpdated(Profile),
    CategoriesUpdated(Vec<CategorySummary>),
    RiddleLoaded(Riddle),
    AnswerChecked(AnswerFeedback),
    AutoAdvanceScheduled { delay: Duration },
    DailyChallengeUpdated(DailyChallenge),
    DailyAnswerChecked(DailyAnswerFeedback),
    LeaderboardUpdated(Vec<LeaderboardEntry>),
    RoomsUpdated(Vec<RoomSummary>),
    TabStateChanged { tab: Tab, state: TabState },
    Info(String),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub auto_advance_delay: Duration,
    pub leaderboard_limit: u32,
    pub language: Language,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            auto_advance_delay: config::DEFAULT_AUTO_ADVANCE_DELAY,
            leaderboard_limit: 10,
            language: Language::En,
        }
    }
}

impl From<&ClientSettings> for ControllerOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            auto_advance_delay: settings.auto_advance_delay,
            leaderboard_limit: settings.leaderboard_limit,
            language: settings.language,
        }
    }
}

/// Operations a rendering layer drives. Failures come back as [`ClientError`] and
/// are also published as [`ClientEvent::Error`] with a display message.
#[async_trait]
pub trait GameHandle: Send + Sync {
    async fn restore_session(&self) -> ClientResult<bool>;
    async fn authenticate(&self, mode: AuthMode, credentials: Credentials) -> ClientResult<String>;
    async fn logout(&self);
    async fn refresh_profile(&self) -> ClientResult<Profile>;
    async fn load_categories(&self) -> ClientResult<Vec<CategorySummary>>;
    async fn load_riddle(
        &self,
        language: Language,
        category: Option<String>,
    ) -> ClientResult<Riddle>;
    async fn submit_answer(
        &self,
        riddle_id: &RiddleId,
        answer: &str,
    ) -> ClientResult<AnswerFeedback>;
    async fn load_daily_challenge(&self) -> ClientResult<DailyChallenge>;
    async fn submit_daily_answer(&self, answer: &str) -> ClientResult<DailyAnswerFeedback>;
    async fn load_leaderboard(&self) -> ClientResult<Vec<LeaderboardEntry>>;
    async fn load_rooms(&self) -> ClientResult<Vec<RoomSummary>>;
    async fn create_room(
        &self,
        name: &str,
        max_players: u32,
    ) -> ClientResult<Option<CreateRoomResponse>>;
    async fn join_room(&self, room_id: &RoomId) -> ClientResult<String>;
    async fn fetch_room(&self, room_id: &RoomId) -> ClientResult<RoomDetail>;
    async fn share_riddle(&self, riddle_id: &RiddleId) -> ClientResult<ShareResponse>;
    async fn fetch_shared_riddle(&self, riddle_id: &RiddleId) -> ClientResult<SharedRiddle>;
    async fn fetch_achievements(&self) -> ClientResult<Achievements>;
    async fn reset_history(&self) -> ClientResult<String>;
    async fn select_tab(&self, tab: Tab) -> ClientResult<()>;
    async fn set_language(&self, language: Language);
    async fn set_category(&self, category: Option<String>);
    async fn set_answer_draft(&self, text: String);
    async fn set_room_name_draft(&self, text: String);
    async fn snapshot(&self) -> GameSnapshot;
    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent>;
}

struct ActiveSession {
    token: String,
    username: Option<String>,
}

#[derive(Default)]
struct ControllerState {
    session: Option<ActiveSession>,
    /// Bumped whenever the session is created or destroyed; responses tagged with an
    /// older epoch are dropped.
    session_epoch: u64,
    profile: Option<Profile>,
    categories: Vec<CategorySummary>,
    language: Language,
    selected_category: Option<String>,
    active_tab: Tab,
    tabs: TabStates,
    riddle: Option<Riddle>,
    feedback: Option<AnswerFeedback>,
    answer_draft: String,
    daily: Option<DailyChallenge>,
    daily_feedback: Option<DailyAnswerFeedback>,
    leaderboard: Vec<LeaderboardEntry>,
    rooms: Vec<RoomSummary>,
    room_name_draft: String,
    last_message: Option<String>,
    last_error: Option<String>,
}

impl ControllerState {
    fn session_matches(&self, epoch: u64) -> bool {
        self.session.is_some() && self.session_epoch == epoch
    }

    /// Drops everything tied to the signed-in user. Public collections stay.
    fn clear_user_scope(&mut self) {
        self.session = None;
        self.profile = None;
        self.riddle = None;
        self.feedback = None;
        self.answer_draft.clear();
        self.daily = None;
        self.daily_feedback = None;
        self.room_name_draft.clear();
        self.last_message = None;
        self.last_error = None;
        self.tabs.reset(Tab::Riddle);
        self.tabs.reset(Tab::Daily);
    }
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|category| category.trim().to_string())
        .filter(|category| !category.is_empty())
}

pub struct GameController {
    api: RiddleApi,
    session_store: Arc<dyn SessionStore>,
    auto_advance_delay: Duration,
    leaderboard_limit: u32,
    inner: Mutex<ControllerState>,
    auto_advance: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<ClientEvent>,
}

impl GameController {
    pub fn new(api: RiddleApi) -> Arc<Self> {
        Self::new_with_dependencies(
            api,
            Arc::new(EphemeralSessionStore::default()),
            ControllerOptions::default(),
        )
    }

    pub fn new_with_dependencies(
        api: RiddleApi,
        session_store: Arc<dyn SessionStore>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            session_store,
            auto_advance_delay: options.auto_advance_delay,
            leaderboard_limit: options.leaderboard_limit,
            inner: Mutex::new(ControllerState {
                language: options.language,
                ..ControllerState::default()
            }),
            auto_advance: Mutex::new(None),
            events,
        })
    }

    pub fn from_settings(
        settings: &ClientSettings,
        session_store: Arc<dyn SessionStore>,
    ) -> anyhow::Result<Arc<Self>> {
        let api = RiddleApi::new(&settings.api_base_url, settings.request_timeout)?;
        Ok(Self::new_with_dependencies(
            api,
            session_store,
            ControllerOptions::from(settings),
        ))
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn emit_tab(&self, tab: Tab, state: TabState) {
        self.emit(ClientEvent::TabStateChanged { tab, state });
    }

    async fn session(&self) -> ClientResult<(String, u64)> {
        let guard = self.inner.lock().await;
        let session = guard
            .session
            .as_ref()
            .ok_or(ClientError::NotAuthenticated)?;
        Ok((session.token.clone(), guard.session_epoch))
    }

    async fn authorized(&self, area: &'static str) -> ClientResult<(String, u64)> {
        match self.session().await {
            Ok(session) => Ok(session),
            Err(err) => Err(self.report_failure(area, "", None, err).await),
        }
    }

    fn discarded(&self, area: &'static str) -> ClientError {
        debug!("{area}: response discarded, session changed while in flight");
        ClientError::NotAuthenticated
    }

    async fn begin_tab(&self, tab: Tab) {
        let state = {
            let mut guard = self.inner.lock().await;
            guard.tabs.begin(tab);
            guard.tabs.get(tab)
        };
        self.emit_tab(tab, state);
    }

    async fn fail_tab(&self, tab: Tab, epoch: Option<u64>) {
        let state = {
            let mut guard = self.inner.lock().await;
            if epoch.is_some_and(|epoch| guard.session_epoch != epoch) {
                return;
            }
            guard.tabs.fail(tab);
            guard.tabs.get(tab)
        };
        self.emit_tab(tab, state);
    }

    /// Converts a failure into its display message, records it and publishes it.
    /// Authorization failures of the current session end that session.
    async fn report_failure(
        &self,
        area: &'static str,
        fallback: &str,
        epoch: Option<u64>,
        err: ClientError,
    ) -> ClientError {
        let message = err.user_message(fallback);
        {
            let mut guard = self.inner.lock().await;
            if epoch.is_some_and(|epoch| guard.session_epoch != epoch) {
                debug!("{area}: dropping failure from a previous session: {err}");
                return err;
            }
            guard.last_error = Some(message.clone());
        }

        warn!(
            "{area}: request failed category={:?} error={err}",
            err.category()
        );
        if let (ClientError::Unauthorized(_), Some(epoch)) = (&err, epoch) {
            self.expire_session(epoch).await;
        }
        self.emit(ClientEvent::Error(message));
        err
    }

    async fn expire_session(&self, epoch: u64) {
        let expired = {
            let mut guard = self.inner.lock().await;
            if !guard.session_matches(epoch) {
                false
            } else {
                guard.clear_user_scope();
                guard.session_epoch += 1;
                true
            }
        };
        if !expired {
            return;
        }

        self.cancel_auto_advance().await;
        if let Err(err) = self.session_store.clear().await {
            warn!("session: failed to clear durable record: {err:#}");
        }
        info!("session: token rejected by server, login required");
        self.emit(ClientEvent::SessionExpired);
        self.emit(ClientEvent::SessionChanged { username: None });
    }

    async fn cancel_auto_advance(&self) {
        let Some(handle) = self.auto_advance.lock().await.take() else {
            return;
        };
        // Expiry can be reached from inside the auto-advance load; that task must
        // finish its own cleanup.
        if tokio::task::try_id() == Some(handle.id()) {
            return;
        }
        if !handle.is_finished() {
            debug!("riddle: cancelling pending auto-advance");
        }
        handle.abort();
    }

    /// Schedules the single post-correct-answer riddle load. Returns false when one is
    /// already pending.
    async fn schedule_auto_advance(self: &Arc<Self>, epoch: u64) -> bool {
        let mut pending = self.auto_advance.lock().await;
        if pending.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("riddle: auto-advance already pending");
            return false;
        }

        let client: Weak<Self> = Arc::downgrade(self);
        let delay = self.auto_advance_delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(client) = client.upgrade() else {
                return;
            };
            let selection = {
                let guard = client.inner.lock().await;
                guard
                    .session_matches(epoch)
                    .then(|| (guard.language, guard.selected_category.clone()))
            };
            let Some((language, category)) = selection else {
                debug!("riddle: auto-advance dropped, session changed");
                return;
            };
            let _ = client.load_riddle(language, category).await;
        }));
        drop(pending);

        self.emit(ClientEvent::AutoAdvanceScheduled { delay });
        true
    }

    async fn fetch_profile(
        &self,
        token: &str,
        epoch: u64,
        adopt_language: bool,
    ) -> ClientResult<Profile> {
        match self.api.profile(token).await {
            Ok(profile) => {
                {
                    let mut guard = self.inner.lock().await;
                    if !guard.session_matches(epoch) {
                        return Err(self.discarded("profile"));
                    }
                    if adopt_language {
                        guard.language = profile.language;
                    }
                    if let Some(session) = guard.session.as_mut() {
                        session.username = Some(profile.username.clone());
                    }
                    guard.profile = Some(profile.clone());
                }
                debug!(
                    points = profile.points,
                    rank = profile.rank,
                    "profile: refreshed"
                );
                self.emit(ClientEvent::ProfileUpdated(profile.clone()));
                Ok(profile)
            }
            Err(err) => Err(self
                .report_failure("profile", "Failed to load profile", Some(epoch), err)
                .await),
        }
    }

    async fn start_session(&self, token: String, username: Option<String>) -> u64 {
        let epoch = {
            let mut guard = self.inner.lock().await;
            guard.clear_user_scope();
            guard.session_epoch += 1;
            guard.session = Some(ActiveSession {
                token,
                username: username.clone(),
            });
            guard.session_epoch
        };
        self.cancel_auto_advance().await;
        self.emit(ClientEvent::SessionChanged { username });
        epoch
    }
}

impl Drop for GameController {
    fn drop(&mut self) {
        if let Some(handle) = self.auto_advance.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl GameHandle for Arc<GameController> {
    async fn restore_session(&self) -> ClientResult<bool> {
        if self.inner.lock().await.session.is_some() {
            return Ok(true);
        }

        let record = match self.session_store.load().await {
            Ok(Some(record)) if !record.token.is_empty() => record,
            Ok(_) => return Ok(false),
            Err(err) => {
                warn!("session: failed to load durable record: {err:#}");
                return Ok(false);
            }
        };

        info!(
            "session: restoring durable session username={}",
            record.username.as_deref().unwrap_or("<unknown>")
        );
        let epoch = self
            .start_session(record.token.clone(), record.username.clone())
            .await;
        let (profile, _) = tokio::join!(
            self.fetch_profile(&record.token, epoch, true),
            self.load_categories()
        );

        match profile {
            Err(err) if err.requires_reauth() => Ok(false),
            _ => Ok(true),
        }
    }

    async fn authenticate(&self, mode: AuthMode, credentials: Credentials) -> ClientResult<String> {
        let email = credentials.email.trim().to_string();
        if email.is_empty() || credentials.password.is_empty() {
            return Err(ClientError::Validation(
                "Email and password are required.".into(),
            ));
        }

        let (label, fallback, result) = match &mode {
            AuthMode::Login => (
                "login",
                "Login failed",
                self.api
                    .login(&LoginRequest {
                        email,
                        password: credentials.password,
                    })
                    .await,
            ),
            AuthMode::Signup { username, language } => {
                let username = username.trim();
                if username.is_empty() {
                    return Err(ClientError::Validation("Username is required.".into()));
                }
                (
                    "signup",
                    "Signup failed",
                    self.api
                        .signup(&SignupRequest {
                            username: username.to_string(),
                            email,
                            password: credentials.password,
                            language: *language,
                        })
                        .await,
                )
            }
        };

        let response = match result {
            Ok(response) if !response.token.is_empty() => response,
            Ok(_) => {
                let err = ClientError::Decode("server returned an empty token".into());
                return Err(self.report_failure("auth", fallback, None, err).await);
            }
            Err(err) => return Err(self.report_failure("auth", fallback, None, err).await),
        };

        let epoch = self
            .start_session(response.token.clone(), Some(response.username.clone()))
            .await;
        {
            let mut guard = self.inner.lock().await;
            if let AuthMode::Signup { language, .. } = &mode {
                guard.language = *language;
            }
            guard.last_message = response.message.clone();
        }
        info!("auth: {label} succeeded username={}", response.username);

        if let Err(err) = self
            .session_store
            .save(&SessionRecord {
                token: response.token.clone(),
                username: Some(response.username.clone()),
            })
            .await
        {
            warn!("session: failed to persist session record: {err:#}");
        }
        if let Some(message) = response.message {
            self.emit(ClientEvent::Info(message));
        }

        let adopt_language = mode == AuthMode::Login;
        let _ = tokio::join!(
            self.fetch_profile(&response.token, epoch, adopt_language),
            self.load_categories()
        );

        Ok(response.username)
    }

    async fn logout(&self) {
        let had_session = {
            let mut guard = self.inner.lock().await;
            let had_session = guard.session.is_some();
            guard.clear_user_scope();
            guard.session_epoch += 1;
            had_session
        };

        self.cancel_auto_advance().await;
        if let Err(err) = self.session_store.clear().await {
            warn!("session: failed to clear durable record: {err:#}");
        }
        if had_session {
            info!("auth: logged out");
        }
        self.emit(ClientEvent::SessionChanged { username: None });
    }

    async fn refresh_profile(&self) -> ClientResult<Profile> {
        let (token, epoch) = self.authorized("profile").await?;
        self.fetch_profile(&token, epoch, false).await
    }

    async fn load_categories(&self) -> ClientResult<Vec<CategorySummary>> {
        match self.api.categories().await {
            Ok(categories) => {
                self.inner.lock().await.categories = categories.clone();
                self.emit(ClientEvent::CategoriesUpdated(categories.clone()));
                Ok(categories)
            }
            Err(err) => Err(self
                .report_failure("categories", "Failed to load categories", None, err)
                .await),
        }
    }

    async fn load_riddle(
        &self,
        language: Language,
        category: Option<String>,
    ) -> ClientResult<Riddle> {
        let (token, epoch) = self.authorized("riddle").await?;
        let category = normalize_category(category);
        {
            let mut guard = self.inner.lock().await;
            guard.language = language;
            guard.selected_category = category.clone();
        }
        self.begin_tab(Tab::Riddle).await;

        match self.api.riddle(&token, language, category.as_deref()).await {
            Ok(riddle) => {
                let state = {
                    let mut guard = self.inner.lock().await;
                    if !guard.session_matches(epoch) {
                        return Err(self.discarded("riddle"));
                    }
                    guard.riddle = Some(riddle.clone());
                    guard.feedback = None;
                    guard.answer_draft.clear();
                    guard.tabs.succeed(Tab::Riddle);
                    guard.tabs.get(Tab::Riddle)
                };
                info!(
                    "riddle: loaded id={} category={} difficulty={}",
                    riddle.id, riddle.category, riddle.difficulty
                );
                self.emit_tab(Tab::Riddle, state);
                self.emit(ClientEvent::RiddleLoaded(riddle.clone()));
                Ok(riddle)
            }
            Err(err) => {
                self.fail_tab(Tab::Riddle, Some(epoch)).await;
                Err(self
                    .report_failure("riddle", "Failed to load riddle", Some(epoch), err)
                    .await)
            }
        }
    }

    async fn submit_answer(
        &self,
        riddle_id: &RiddleId,
        answer: &str,
    ) -> ClientResult<AnswerFeedback> {
        let answer = answer.trim();
        if answer.is_empty() {
            debug!("answer: rejected empty answer locally");
            return Err(ClientError::Validation(EMPTY_ANSWER_MESSAGE.into()));
        }

        let (token, epoch) = self.authorized("answer").await?;
        let response = match self
            .api
            .check_answer(
                &token,
                &CheckAnswerRequest {
                    riddle_id: riddle_id.clone(),
                    answer: answer.to_string(),
                },
            )
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return Err(self
                    .report_failure("answer", "Failed to check answer", Some(epoch), err)
                    .await)
            }
        };

        let feedback = AnswerFeedback::from_response(riddle_id.clone(), response);
        {
            let mut guard = self.inner.lock().await;
            if !guard.session_matches(epoch) {
                return Err(self.discarded("answer"));
            }
            let still_active = guard
                .riddle
                .as_ref()
                .map_or(true, |riddle| &riddle.id == riddle_id);
            if still_active {
                guard.feedback = Some(feedback.clone());
            }
        }
        info!(
            "answer: checked riddle={} correct={} points_change={}",
            riddle_id, feedback.correct, feedback.points_change
        );
        self.emit(ClientEvent::AnswerChecked(feedback.clone()));

        let _ = self.fetch_profile(&token, epoch, false).await;
        if feedback.correct {
            self.schedule_auto_advance(epoch).await;
        }

        Ok(feedback)
    }

    async fn load_daily_challenge(&self) -> ClientResult<DailyChallenge> {
        let (token, epoch) = self.authorized("daily").await?;
        self.begin_tab(Tab::Daily).await;

        match self.api.daily_challenge(&token).await {
            Ok(challenge) => {
                let state = {
                    let mut guard = self.inner.lock().await;
                    if !guard.session_matches(epoch) {
                        return Err(self.discarded("daily"));
                    }
                    guard.daily = Some(challenge.clone());
                    guard.tabs.succeed(Tab::Daily);
                    guard.tabs.get(Tab::Daily)
                };
                debug!(
                    participants = challenge.participants,
                    completed = challenge.completed,
                    "daily: challenge loaded"
                );
                self.emit_tab(Tab::Daily, state);
                self.emit(ClientEvent::DailyChallengeUpdated(challenge.clone()));
                Ok(challenge)
            }
            Err(err) => {
                self.fail_tab(Tab::Daily, Some(epoch)).await;
                Err(self
                    .report_failure("daily", "Failed to load daily challenge", Some(epoch), err)
                    .await)
            }
        }
    }

    async fn submit_daily_answer(&self, answer: &str) -> ClientResult<DailyAnswerFeedback> {
        let answer = answer.trim();
        if answer.is_empty() {
            debug!("daily: rejected empty answer locally");
            return Err(ClientError::Validation(EMPTY_ANSWER_MESSAGE.into()));
        }

        let (token, epoch) = self.authorized("daily").await?;
        let response = match self
            .api
            .daily_answer(
                &token,
                &DailyAnswerRequest {
                    answer: answer.to_string(),
                },
            )
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return Err(self
                    .report_failure("daily", "Failed to submit answer", Some(epoch), err)
                    .await)
            }
        };

        let feedback = DailyAnswerFeedback::from(response);
        {
            let mut guard = self.inner.lock().await;
            if !guard.session_matches(epoch) {
                return Err(self.discarded("daily"));
            }
            guard.daily_feedback = Some(feedback.clone());
            guard.last_message = Some(feedback.message.clone());
        }
        info!("daily: answer checked correct={}", feedback.correct);
        self.emit(ClientEvent::DailyAnswerChecked(feedback.clone()));

        let _ = tokio::join!(
            self.fetch_profile(&token, epoch, false),
            self.load_daily_challenge()
        );

        Ok(feedback)
    }

    async fn load_leaderboard(&self) -> ClientResult<Vec<LeaderboardEntry>> {
        self.begin_tab(Tab::Leaderboard).await;

        match self.api.leaderboard(self.leaderboard_limit).await {
            Ok(entries) => {
                let state = {
                    let mut guard = self.inner.lock().await;
                    guard.leaderboard = entries.clone();
                    guard.tabs.succeed(Tab::Leaderboard);
                    guard.tabs.get(Tab::Leaderboard)
                };
                self.emit_tab(Tab::Leaderboard, state);
                self.emit(ClientEvent::LeaderboardUpdated(entries.clone()));
                Ok(entries)
            }
            Err(err) => {
                self.fail_tab(Tab::Leaderboard, None).await;
                Err(self
                    .report_failure("leaderboard", "Failed to load leaderboard", None, err)
                    .await)
            }
        }
    }

    async fn load_rooms(&self) -> ClientResult<Vec<RoomSummary>> {
        self.begin_tab(Tab::Rooms).await;

        match self.api.rooms().await {
            Ok(rooms) => {
                let state = {
                    let mut guard = self.inner.lock().await;
                    guard.rooms = rooms.clone();
                    guard.tabs.succeed(Tab::Rooms);
                    guard.tabs.get(Tab::Rooms)
                };
                self.emit_tab(Tab::Rooms, state);
                self.emit(ClientEvent::RoomsUpdated(rooms.clone()));
                Ok(rooms)
            }
            Err(err) => {
                self.fail_tab(Tab::Rooms, None).await;
                Err(self
                    .report_failure("rooms", "Failed to load rooms", None, err)
                    .await)
            }
        }
    }

    async fn create_room(
        &self,
        name: &str,
        max_players: u32,
    ) -> ClientResult<Option<CreateRoomResponse>> {
        let name = name.trim();
        if name.is_empty() {
            debug!("rooms: ignoring create with blank name");
            return Ok(None);
        }

        let (token, epoch) = self.authorized("rooms").await?;
        let created = match self
            .api
            .create_room(
                &token,
                &CreateRoomRequest {
                    room_name: name.to_string(),
                    max_players,
                },
            )
            .await
        {
            Ok(created) => created,
            Err(err) => {
                return Err(self
                    .report_failure("rooms", "Failed to create room", Some(epoch), err)
                    .await)
            }
        };

        {
            let mut guard = self.inner.lock().await;
            if guard.session_matches(epoch) {
                guard.room_name_draft.clear();
                guard.last_message = Some(created.message.clone());
            }
        }
        info!("rooms: created room_id={} name={name}", created.room_id);
        self.emit(ClientEvent::Info(created.message.clone()));

        let _ = self.load_rooms().await;
        Ok(Some(created))
    }

    async fn join_room(&self, room_id: &RoomId) -> ClientResult<String> {
        let (token, epoch) = self.authorized("rooms").await?;
        match self
            .api
            .join_room(
                &token,
                &JoinRoomRequest {
                    room_id: room_id.clone(),
                },
            )
            .await
        {
            Ok(joined) => {
                {
                    let mut guard = self.inner.lock().await;
                    if guard.session_matches(epoch) {
                        guard.last_message = Some(joined.message.clone());
                    }
                }
                info!("rooms: joined room_id={room_id}");
                self.emit(ClientEvent::Info(joined.message.clone()));
                Ok(joined.message)
            }
            Err(err) => Err(self
                .report_failure("rooms", "Failed to join room", Some(epoch), err)
                .await),
        }
    }

    async fn fetch_room(&self, room_id: &RoomId) -> ClientResult<RoomDetail> {
        let (token, epoch) = self.authorized("rooms").await?;
        match self.api.room(&token, room_id).await {
            Ok(room) => Ok(room),
            Err(err) => Err(self
                .report_failure("rooms", "Failed to load room", Some(epoch), err)
                .await),
        }
    }

    async fn share_riddle(&self, riddle_id: &RiddleId) -> ClientResult<ShareResponse> {
        let (token, epoch) = self.authorized("share").await?;
        match self
            .api
            .share(
                &token,
                &ShareRequest {
                    riddle_id: riddle_id.clone(),
                },
            )
            .await
        {
            Ok(shared) => {
                {
                    let mut guard = self.inner.lock().await;
                    if guard.session_matches(epoch) {
                        guard.last_message = Some(shared.message.clone());
                    }
                }
                self.emit(ClientEvent::Info(shared.message.clone()));
                Ok(shared)
            }
            Err(err) => Err(self
                .report_failure("share", "Failed to share riddle", Some(epoch), err)
                .await),
        }
    }

    async fn fetch_shared_riddle(&self, riddle_id: &RiddleId) -> ClientResult<SharedRiddle> {
        match self.api.shared_riddle(riddle_id).await {
            Ok(riddle) => Ok(riddle),
            Err(err) => Err(self
                .report_failure("share", "Failed to load shared riddle", None, err)
                .await),
        }
    }

    async fn fetch_achievements(&self) -> ClientResult<Achievements> {
        let (token, epoch) = self.authorized("achievements").await?;
        match self.api.achievements(&token).await {
            Ok(achievements) => Ok(achievements),
            Err(err) => Err(self
                .report_failure(
                    "achievements",
                    "Failed to load achievements",
                    Some(epoch),
                    err,
                )
                .await),
        }
    }

    async fn reset_history(&self) -> ClientResult<String> {
        let (token, epoch) = self.authorized("history").await?;
        match self.api.reset_history(&token).await {
            Ok(body) => {
                info!("history: reset seen riddles");
                self.emit(ClientEvent::Info(body.message.clone()));
                let _ = self.fetch_profile(&token, epoch, false).await;
                Ok(body.message)
            }
            Err(err) => Err(self
                .report_failure("history", "Failed to reset history", Some(epoch), err)
                .await),
        }
    }

    async fn select_tab(&self, tab: Tab) -> ClientResult<()> {
        let (needs_fetch, language, category, signed_in) = {
            let mut guard = self.inner.lock().await;
            guard.active_tab = tab;
            let signed_in = guard.session.is_some();
            let needs_fetch = guard.tabs.get(tab).needs_fetch();
            if needs_fetch && (signed_in || !tab.requires_session()) {
                guard.tabs.begin(tab);
            }
            (
                needs_fetch,
                guard.language,
                guard.selected_category.clone(),
                signed_in,
            )
        };

        if !needs_fetch {
            debug!(?tab, "tabs: already loaded, not refetching");
            return Ok(());
        }
        if tab.requires_session() && !signed_in {
            return Err(self
                .report_failure("tabs", "", None, ClientError::NotAuthenticated)
                .await);
        }

        match tab {
            Tab::Riddle => self.load_riddle(language, category).await.map(|_| ()),
            Tab::Daily => self.load_daily_challenge().await.map(|_| ()),
            Tab::Leaderboard => self.load_leaderboard().await.map(|_| ()),
            Tab::Rooms => self.load_rooms().await.map(|_| ()),
        }
    }

    async fn set_language(&self, language: Language) {
        self.inner.lock().await.language = language;
    }

    async fn set_category(&self, category: Option<String>) {
        self.inner.lock().await.selected_category = normalize_category(category);
    }

    async fn set_answer_draft(&self, text: String) {
        self.inner.lock().await.answer_draft = text;
    }

    async fn set_room_name_draft(&self, text: String) {
        self.inner.lock().await.room_name_draft = text;
    }

    async fn snapshot(&self) -> GameSnapshot {
        let auto_advance_pending = self
            .auto_advance
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        let guard = self.inner.lock().await;
        GameSnapshot {
            authenticated: guard.session.is_some(),
            username: guard
                .session
                .as_ref()
                .and_then(|session| session.username.clone()),
            profile: guard.profile.clone(),
            categories: guard.categories.clone(),
            language: guard.language,
            selected_category: guard.selected_category.clone(),
            active_tab: guard.active_tab,
            tabs: guard.tabs,
            riddle: guard.riddle.clone(),
            feedback: guard.feedback.clone(),
            answer_draft: guard.answer_draft.clone(),
            auto_advance_pending,
            daily: guard.daily.clone(),
            daily_feedback: guard.daily_feedback.clone(),
            leaderboard: guard.leaderboard.clone(),
            rooms: guard.rooms.clone(),
            room_name_draft: guard.room_name_draft.clone(),
            last_message: guard.last_message.clone(),
            last_error: guard.last_error.clone(),
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
