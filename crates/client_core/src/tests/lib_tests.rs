use super::*;
use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::net::TcpListener;

const TEST_DELAY: Duration = Duration::from_millis(200);

#[derive(Default)]
struct MockBackend {
    calls: Mutex<HashMap<&'static str, usize>>,
    auth_headers: Mutex<Vec<(&'static str, Option<String>)>>,
    signup_bodies: Mutex<Vec<Value>>,
    riddle_queries: Mutex<Vec<HashMap<String, String>>>,
    profile_delay: Mutex<Duration>,
    reject_tokens: AtomicBool,
    fail_profile: AtomicBool,
    fail_leaderboard: AtomicBool,
    fail_rooms: AtomicBool,
}

impl MockBackend {
    async fn hit(&self, route: &'static str, headers: Option<&HeaderMap>) -> usize {
        if let Some(headers) = headers {
            let auth = headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            self.auth_headers.lock().await.push((route, auth));
        }
        let mut calls = self.calls.lock().await;
        let count = calls.entry(route).or_default();
        *count += 1;
        *count
    }

    async fn count(&self, route: &'static str) -> usize {
        self.calls.lock().await.get(route).copied().unwrap_or(0)
    }

    async fn last_auth(&self, route: &'static str) -> Option<String> {
        self.auth_headers
            .lock()
            .await
            .iter()
            .rev()
            .find(|(seen, _)| *seen == route)
            .and_then(|(_, auth)| auth.clone())
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let has_bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("Bearer "));
        has_bearer && !self.reject_tokens.load(Ordering::SeqCst)
    }
}

type Mock = State<Arc<MockBackend>>;

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Invalid or expired token")
}

async fn mock_login(State(mock): Mock, Json(body): Json<Value>) -> Response {
    mock.hit("login", None).await;
    if body["password"] == "secret" {
        Json(json!({
            "token": "T1",
            "user_id": "u-1",
            "username": "alice",
            "message": "Login successful!"
        }))
        .into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn mock_signup(State(mock): Mock, Json(body): Json<Value>) -> Response {
    mock.hit("signup", None).await;
    let username = body["username"].as_str().unwrap_or_default().to_string();
    mock.signup_bodies.lock().await.push(body);
    Json(json!({ "token": "T-signup", "username": username })).into_response()
}

async fn mock_profile(State(mock): Mock, headers: HeaderMap) -> Response {
    mock.hit("profile", Some(&headers)).await;
    let delay = *mock.profile_delay.lock().await;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    if mock.fail_profile.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "profile service down");
    }
    Json(json!({
        "username": "alice",
        "email": "a@b.com",
        "language": "en",
        "points": 120,
        "rank": 3,
        "total_solved": 10,
        "correct_answers": 8,
        "accuracy": 80.0,
        "current_streak": 2,
        "unique_riddles_seen": 12,
        "daily_challenges_completed": 1
    }))
    .into_response()
}

async fn mock_categories(State(mock): Mock) -> Response {
    mock.hit("categories", None).await;
    Json(json!({ "categories": [{ "name": "logic", "count": 3 }, { "name": "math", "count": 0 }] }))
        .into_response()
}

async fn mock_riddle(
    State(mock): Mock,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let n = mock.hit("riddle", Some(&headers)).await;
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.riddle_queries.lock().await.push(query);
    Json(json!({
        "id": format!("r{n}"),
        "question": "What has roots nobody sees?",
        "category": "logic",
        "difficulty": "easy",
        "hints": ["It grows"],
        "attempts_left": 2
    }))
    .into_response()
}

async fn mock_check(State(mock): Mock, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    mock.hit("check", Some(&headers)).await;
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    if body["answer"] == "tree" {
        Json(json!({
            "correct": true,
            "answer": null,
            "message": "Correct!",
            "points_change": 15,
            "attempts_left": 1,
            "skip_to_next": true,
            "stats": { "solved": 11, "correct": 9, "streak": 3, "points": 135 }
        }))
        .into_response()
    } else {
        Json(json!({
            "correct": false,
            "answer": "tree",
            "message": "Wrong! -5 points.",
            "points_change": -5,
            "attempts_left": 0,
            "max_attempts_reached": true
        }))
        .into_response()
    }
}

async fn mock_daily(State(mock): Mock, headers: HeaderMap) -> Response {
    let n = mock.hit("daily", Some(&headers)).await;
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "challenge_id": "c-1",
        "date": "2026-10-19",
        "riddle": { "id": "d1", "question": "What has keys but no locks?", "difficulty": "hard", "category": "logic" },
        "participants": n,
        "completed": n > 1
    }))
    .into_response()
}

async fn mock_daily_answer(State(mock): Mock, headers: HeaderMap) -> Response {
    mock.hit("daily_answer", Some(&headers)).await;
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "correct": true,
        "message": "Daily Challenge Complete! +50 points",
        "bonus_points": 50
    }))
    .into_response()
}

async fn mock_leaderboard(
    State(mock): Mock,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    mock.hit("leaderboard", None).await;
    if mock.fail_leaderboard.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    assert_eq!(query.get("limit").map(String::as_str), Some("10"));
    Json(json!({ "leaderboard": [
        { "rank": 1, "username": "bob", "points": 300, "streak": 4, "accuracy": 91.5 },
        { "rank": 2, "username": "alice", "points": 120, "streak": 2, "accuracy": 80.0 }
    ] }))
    .into_response()
}

async fn mock_rooms(State(mock): Mock) -> Response {
    mock.hit("rooms", None).await;
    if mock.fail_rooms.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({ "rooms": [
        { "room_id": "room-1", "name": "Friday", "host": "bob", "players": 1, "max_players": 4 }
    ] }))
    .into_response()
}

async fn mock_create_room(
    State(mock): Mock,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.hit("create_room", Some(&headers)).await;
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "room_id": "room-1",
        "room_name": body["room_name"],
        "message": "Room created! Share room ID with friends."
    }))
    .into_response()
}

async fn mock_join_room(
    State(mock): Mock,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.hit("join_room", Some(&headers)).await;
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    if body["room_id"] == "full" {
        return detail(StatusCode::BAD_REQUEST, "Room is full");
    }
    Json(json!({ "message": "Joined room: Friday", "room_id": body["room_id"], "players": 2 }))
        .into_response()
}

async fn mock_share(State(mock): Mock, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    mock.hit("share", Some(&headers)).await;
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    let riddle_id = body["riddle_id"].as_str().unwrap_or_default();
    Json(json!({
        "message": "Riddle shared!",
        "share_url": format!("https://riddleapp.com/riddle/{riddle_id}")
    }))
    .into_response()
}

async fn spawn_mock_server() -> (String, Arc<MockBackend>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let mock = Arc::new(MockBackend::default());
    let app = Router::new()
        .route("/login", post(mock_login))
        .route("/signup", post(mock_signup))
        .route("/profile", get(mock_profile))
        .route("/categories", get(mock_categories))
        .route("/riddle", get(mock_riddle))
        .route("/check", post(mock_check))
        .route("/daily-challenge", get(mock_daily))
        .route("/daily-challenge/answer", post(mock_daily_answer))
        .route("/leaderboard", get(mock_leaderboard))
        .route("/multiplayer/rooms", get(mock_rooms))
        .route("/multiplayer/create", post(mock_create_room))
        .route("/multiplayer/join", post(mock_join_room))
        .route("/share", post(mock_share))
        .with_state(Arc::clone(&mock));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), mock)
}

fn controller_with_store(
    server_url: &str,
    store: Arc<dyn SessionStore>,
) -> Arc<GameController> {
    let api = RiddleApi::new(server_url, Duration::from_secs(5)).expect("api");
    GameController::new_with_dependencies(
        api,
        store,
        ControllerOptions {
            auto_advance_delay: TEST_DELAY,
            ..ControllerOptions::default()
        },
    )
}

fn controller(server_url: &str) -> Arc<GameController> {
    controller_with_store(server_url, Arc::new(EphemeralSessionStore::default()))
}

async fn login(client: &Arc<GameController>) {
    client
        .authenticate(AuthMode::Login, Credentials::new("a@b.com", "secret"))
        .await
        .expect("login");
}

fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn saw_error(events: &[ClientEvent], expected: &str) -> bool {
    events
        .iter()
        .any(|event| matches!(event, ClientEvent::Error(message) if message == expected))
}

/// Session store whose `clear` yields before forgetting the record.
#[derive(Default)]
struct SlowClearStore {
    inner: EphemeralSessionStore,
}

#[async_trait]
impl SessionStore for SlowClearStore {
    async fn load(&self) -> anyhow::Result<Option<SessionRecord>> {
        self.inner.load().await
    }

    async fn save(&self, record: &SessionRecord) -> anyhow::Result<()> {
        self.inner.save(record).await
    }

    async fn clear(&self) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.inner.clear().await
    }
}

#[tokio::test]
async fn login_stores_token_and_fetches_profile_with_bearer_header() {
    let (server_url, mock) = spawn_mock_server().await;
    let store = Arc::new(EphemeralSessionStore::default());
    let client = controller_with_store(&server_url, store.clone());

    let username = client
        .authenticate(AuthMode::Login, Credentials::new("a@b.com", "secret"))
        .await
        .expect("login");
    assert_eq!(username, "alice");

    let (token, _) = client.session().await.expect("session");
    assert_eq!(token, "T1");
    assert_eq!(mock.count("profile").await, 1);
    assert_eq!(mock.count("categories").await, 1);
    assert_eq!(
        mock.last_auth("profile").await.as_deref(),
        Some("Bearer T1")
    );

    let snapshot = client.snapshot().await;
    assert!(snapshot.authenticated);
    assert_eq!(snapshot.profile.map(|profile| profile.points), Some(120));
    assert_eq!(snapshot.categories.len(), 2);
    assert_eq!(snapshot.last_message.as_deref(), Some("Login successful!"));

    let record = store.load().await.expect("load").expect("record");
    assert_eq!(record.token, "T1");
    assert_eq!(record.username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn signup_sends_selected_language_and_keeps_it() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);

    let username = client
        .authenticate(
            AuthMode::Signup {
                username: "meera".into(),
                language: Language::Hi,
            },
            Credentials::new("m@example.com", "pw"),
        )
        .await
        .expect("signup");
    assert_eq!(username, "meera");

    let bodies = mock.signup_bodies.lock().await.clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["language"], "hi");
    assert_eq!(bodies[0]["username"], "meera");
    assert_eq!(mock.count("profile").await, 1);
    assert_eq!(
        mock.last_auth("profile").await.as_deref(),
        Some("Bearer T-signup")
    );
    assert_eq!(client.snapshot().await.language, Language::Hi);
}

#[tokio::test]
async fn failed_login_surfaces_server_detail_and_keeps_existing_session() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;

    let err = client
        .authenticate(AuthMode::Login, Credentials::new("a@b.com", "wrong"))
        .await
        .expect_err("login should fail");
    assert_eq!(
        err.user_message("Login failed"),
        "Invalid email or password"
    );

    let (token, _) = client.session().await.expect("session survives");
    assert_eq!(token, "T1");
    let snapshot = client.snapshot().await;
    assert!(snapshot.profile.is_some());
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Invalid email or password")
    );
    assert_eq!(mock.count("profile").await, 1);
}

#[tokio::test]
async fn blank_credentials_are_rejected_without_request() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);

    let err = client
        .authenticate(AuthMode::Login, Credentials::new("  ", "secret"))
        .await
        .expect_err("validation");
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(mock.count("login").await, 0);
}

#[tokio::test]
async fn logout_clears_token_profile_and_durable_record() {
    let (server_url, _mock) = spawn_mock_server().await;
    let store = Arc::new(EphemeralSessionStore::default());
    let client = controller_with_store(&server_url, store.clone());
    login(&client).await;
    client
        .load_riddle(Language::En, None)
        .await
        .expect("riddle");

    client.logout().await;

    assert!(matches!(
        client.session().await,
        Err(ClientError::NotAuthenticated)
    ));
    let snapshot = client.snapshot().await;
    assert!(!snapshot.authenticated);
    assert_eq!(snapshot.username, None);
    assert_eq!(snapshot.profile, None);
    assert_eq!(snapshot.riddle, None);
    assert!(snapshot.tabs.get(Tab::Riddle).needs_fetch());
    assert_eq!(store.load().await.expect("load"), None);
}

#[tokio::test]
async fn profile_response_arriving_after_logout_is_discarded() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;

    *mock.profile_delay.lock().await = Duration::from_millis(300);
    let in_flight = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.refresh_profile().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.logout().await;

    let result = in_flight.await.expect("join");
    assert!(result.is_err());

    let snapshot = client.snapshot().await;
    assert!(!snapshot.authenticated);
    assert_eq!(snapshot.profile, None);
    assert_eq!(snapshot.username, None);
}

#[tokio::test]
async fn empty_answer_sends_no_request_and_keeps_feedback() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;
    let riddle = client
        .load_riddle(Language::En, None)
        .await
        .expect("riddle");

    let first = client
        .submit_answer(&riddle.id, "rock")
        .await
        .expect("checked");
    assert_eq!(mock.count("check").await, 1);

    for blank in ["", "   ", "\n\t"] {
        let err = client
            .submit_answer(&riddle.id, blank)
            .await
            .expect_err("blank answer");
        assert!(matches!(err, ClientError::Validation(_)));
    }

    assert_eq!(mock.count("check").await, 1);
    assert_eq!(client.snapshot().await.feedback, Some(first));
}

#[tokio::test]
async fn correct_answer_refreshes_profile_and_advances_exactly_once() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;
    let riddle = client
        .load_riddle(Language::En, None)
        .await
        .expect("riddle");
    assert_eq!(riddle.id, RiddleId::from("r1"));
    client.set_answer_draft("tree".into()).await;

    let feedback = client
        .submit_answer(&riddle.id, "tree")
        .await
        .expect("checked");
    assert!(feedback.correct);
    assert_eq!(feedback.message, "Correct!");
    assert_eq!(feedback.revealed_answer, None);
    assert_eq!(feedback.stats_hint.map(|stats| stats.points), Some(135));
    assert_eq!(mock.count("profile").await, 2);

    let snapshot = client.snapshot().await;
    assert!(snapshot.auto_advance_pending);
    assert_eq!(
        snapshot.feedback.map(|feedback| feedback.message),
        Some("Correct!".into())
    );
    // The stats hint is never merged into the profile.
    assert_eq!(snapshot.profile.map(|profile| profile.points), Some(120));

    client
        .submit_answer(&riddle.id, "tree")
        .await
        .expect("second check");
    assert_eq!(mock.count("riddle").await, 1);

    tokio::time::sleep(TEST_DELAY * 3).await;
    assert_eq!(mock.count("riddle").await, 2);

    let snapshot = client.snapshot().await;
    assert_eq!(
        snapshot.riddle.map(|riddle| riddle.id),
        Some(RiddleId::from("r2"))
    );
    assert_eq!(snapshot.feedback, None);
    assert!(snapshot.answer_draft.is_empty());
    assert!(!snapshot.auto_advance_pending);

    tokio::time::sleep(TEST_DELAY * 2).await;
    assert_eq!(mock.count("riddle").await, 2);
}

#[tokio::test]
async fn incorrect_answer_reveals_answer_without_advancing() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;
    let riddle = client
        .load_riddle(Language::En, None)
        .await
        .expect("riddle");

    let feedback = client
        .submit_answer(&riddle.id, "rock")
        .await
        .expect("checked");
    assert!(!feedback.correct);
    assert_eq!(feedback.revealed_answer.as_deref(), Some("tree"));
    assert!(feedback.max_attempts_reached);
    assert_eq!(mock.count("profile").await, 2);

    tokio::time::sleep(TEST_DELAY * 2).await;
    assert_eq!(mock.count("riddle").await, 1);
    assert!(!client.snapshot().await.auto_advance_pending);
}

#[tokio::test]
async fn rejected_token_during_auto_advance_finishes_expiry() {
    let (server_url, mock) = spawn_mock_server().await;
    let store = Arc::new(SlowClearStore::default());
    let client = controller_with_store(&server_url, store.clone());
    login(&client).await;
    let riddle = client
        .load_riddle(Language::En, None)
        .await
        .expect("riddle");
    client
        .submit_answer(&riddle.id, "tree")
        .await
        .expect("checked");

    let mut events = client.subscribe_events();
    mock.reject_tokens.store(true, Ordering::SeqCst);
    tokio::time::sleep(TEST_DELAY * 3).await;

    assert_eq!(mock.count("riddle").await, 2);
    assert_eq!(store.load().await.expect("load"), None);
    let snapshot = client.snapshot().await;
    assert!(!snapshot.authenticated);
    assert!(!snapshot.auto_advance_pending);

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, ClientEvent::SessionExpired)));
    assert!(saw_error(&events, "Invalid or expired token"));
}

#[tokio::test]
async fn logout_drops_pending_auto_advance() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;
    let riddle = client
        .load_riddle(Language::En, None)
        .await
        .expect("riddle");
    client
        .submit_answer(&riddle.id, "tree")
        .await
        .expect("checked");

    client.logout().await;
    tokio::time::sleep(TEST_DELAY * 3).await;

    assert_eq!(mock.count("riddle").await, 1);
    assert_eq!(client.snapshot().await.riddle, None);
}

#[tokio::test]
async fn load_riddle_sends_language_and_trimmed_category() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;

    client
        .load_riddle(Language::Hi, Some(" logic ".into()))
        .await
        .expect("riddle");
    client
        .load_riddle(Language::En, Some("   ".into()))
        .await
        .expect("riddle");

    let queries = mock.riddle_queries.lock().await.clone();
    assert_eq!(queries[0].get("language").map(String::as_str), Some("hi"));
    assert_eq!(
        queries[0].get("category").map(String::as_str),
        Some("logic")
    );
    assert_eq!(queries[1].get("category"), None);
    assert_eq!(mock.last_auth("riddle").await.as_deref(), Some("Bearer T1"));

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.language, Language::En);
    assert_eq!(snapshot.selected_category, None);
    assert_eq!(snapshot.tabs.get(Tab::Riddle).phase, LoadPhase::Ready);
}

#[tokio::test]
async fn load_riddle_requires_session() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);

    let err = client
        .load_riddle(Language::En, None)
        .await
        .expect_err("no session");
    assert!(matches!(err, ClientError::NotAuthenticated));
    assert_eq!(mock.count("riddle").await, 0);
    assert_eq!(
        client.snapshot().await.last_error.as_deref(),
        Some("Please log in to continue.")
    );
}

#[tokio::test]
async fn failed_leaderboard_refresh_keeps_previous_entries() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);

    let entries = client.load_leaderboard().await.expect("leaderboard");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].username, "bob");

    mock.fail_leaderboard.store(true, Ordering::SeqCst);
    let err = client.load_leaderboard().await.expect_err("refresh fails");
    assert_eq!(
        err.user_message("Failed to load leaderboard"),
        "database unavailable"
    );

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.leaderboard, entries);
    let tab = snapshot.tabs.get(Tab::Leaderboard);
    assert_eq!(tab.phase, LoadPhase::Error);
    assert!(tab.loaded);
}

#[tokio::test]
async fn failed_rooms_refresh_keeps_previous_rooms_with_generic_message() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    let rooms = client.load_rooms().await.expect("rooms");

    mock.fail_rooms.store(true, Ordering::SeqCst);
    let mut events = client.subscribe_events();
    let err = client.load_rooms().await.expect_err("refresh fails");
    assert_eq!(
        err.user_message("Failed to load rooms"),
        "Failed to load rooms"
    );

    assert_eq!(client.snapshot().await.rooms, rooms);
    assert!(saw_error(&drain(&mut events), "Failed to load rooms"));
}

#[tokio::test]
async fn failed_profile_refresh_keeps_previous_profile() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;

    mock.fail_profile.store(true, Ordering::SeqCst);
    let err = client.refresh_profile().await.expect_err("refresh fails");
    assert_eq!(
        err.user_message("Failed to load profile"),
        "profile service down"
    );

    let snapshot = client.snapshot().await;
    assert!(snapshot.authenticated);
    assert_eq!(snapshot.profile.map(|profile| profile.points), Some(120));
    assert_eq!(snapshot.last_error.as_deref(), Some("profile service down"));
}

#[tokio::test]
async fn daily_tab_is_fetched_once_across_tab_switches() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;

    client.select_tab(Tab::Daily).await.expect("daily tab");
    assert_eq!(mock.count("daily").await, 1);

    client
        .select_tab(Tab::Leaderboard)
        .await
        .expect("leaderboard tab");
    client.select_tab(Tab::Daily).await.expect("daily tab again");
    assert_eq!(mock.count("daily").await, 1);
    assert_eq!(mock.count("leaderboard").await, 1);

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.active_tab, Tab::Daily);
    assert_eq!(snapshot.daily.map(|daily| daily.participants), Some(1));
    assert_eq!(snapshot.leaderboard.len(), 2);

    client.load_daily_challenge().await.expect("explicit reload");
    assert_eq!(mock.count("daily").await, 2);
}

#[tokio::test]
async fn daily_tab_without_session_sends_no_request() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);

    let err = client.select_tab(Tab::Daily).await.expect_err("no session");
    assert!(err.requires_reauth());
    assert_eq!(mock.count("daily").await, 0);
    assert_eq!(
        client.snapshot().await.tabs.get(Tab::Daily).phase,
        LoadPhase::Idle
    );
}

#[tokio::test]
async fn daily_answer_refreshes_profile_and_challenge() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;
    client.load_daily_challenge().await.expect("daily");

    let err = client.submit_daily_answer("  ").await.expect_err("blank");
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(mock.count("daily_answer").await, 0);

    let feedback = client.submit_daily_answer("piano").await.expect("answer");
    assert!(feedback.correct);
    assert_eq!(feedback.bonus_points, Some(50));
    assert_eq!(mock.count("daily_answer").await, 1);
    assert_eq!(mock.count("profile").await, 2);
    assert_eq!(mock.count("daily").await, 2);

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.daily.map(|daily| daily.completed), Some(true));
    assert_eq!(
        snapshot.daily_feedback.map(|feedback| feedback.message),
        Some("Daily Challenge Complete! +50 points".into())
    );
}

#[tokio::test]
async fn rejected_token_expires_session_and_clears_store() {
    let (server_url, mock) = spawn_mock_server().await;
    let store = Arc::new(EphemeralSessionStore::default());
    let client = controller_with_store(&server_url, store.clone());
    login(&client).await;
    let mut events = client.subscribe_events();

    mock.reject_tokens.store(true, Ordering::SeqCst);
    let err = client.refresh_profile().await.expect_err("rejected");
    assert!(matches!(err, ClientError::Unauthorized(_)));

    let snapshot = client.snapshot().await;
    assert!(!snapshot.authenticated);
    assert_eq!(snapshot.profile, None);
    assert_eq!(store.load().await.expect("load"), None);
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, ClientEvent::SessionExpired)));
}

#[tokio::test]
async fn create_room_with_blank_name_is_a_noop() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;
    client.set_room_name_draft("   ".into()).await;

    let created = client.create_room("   ", 5).await.expect("noop");
    assert_eq!(created, None);
    assert_eq!(mock.count("create_room").await, 0);
    assert_eq!(mock.count("rooms").await, 0);
}

#[tokio::test]
async fn create_room_clears_draft_and_refreshes_rooms() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;
    client.set_room_name_draft("Friday".into()).await;

    let created = client
        .create_room("Friday", 4)
        .await
        .expect("create")
        .expect("created");
    assert_eq!(created.room_id, RoomId::from("room-1"));
    assert_eq!(mock.count("create_room").await, 1);
    assert_eq!(mock.count("rooms").await, 1);
    assert_eq!(
        mock.last_auth("create_room").await.as_deref(),
        Some("Bearer T1")
    );

    let snapshot = client.snapshot().await;
    assert!(snapshot.room_name_draft.is_empty());
    assert_eq!(snapshot.rooms.len(), 1);
    assert_eq!(
        snapshot.last_message.as_deref(),
        Some("Room created! Share room ID with friends.")
    );
}

#[tokio::test]
async fn join_room_reports_message_without_touching_rooms() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;

    let message = client
        .join_room(&RoomId::from("room-1"))
        .await
        .expect("join");
    assert_eq!(message, "Joined room: Friday");
    assert_eq!(mock.count("rooms").await, 0);
    assert!(client.snapshot().await.rooms.is_empty());

    let err = client
        .join_room(&RoomId::from("full"))
        .await
        .expect_err("full room");
    assert_eq!(err.user_message("Failed to join room"), "Room is full");
    assert!(client.snapshot().await.authenticated);
}

#[tokio::test]
async fn share_riddle_returns_link() {
    let (server_url, _mock) = spawn_mock_server().await;
    let client = controller(&server_url);
    login(&client).await;

    let shared = client
        .share_riddle(&RiddleId::from("r7"))
        .await
        .expect("share");
    assert_eq!(
        shared.share_url.as_deref(),
        Some("https://riddleapp.com/riddle/r7")
    );
    assert_eq!(
        client.snapshot().await.last_message.as_deref(),
        Some("Riddle shared!")
    );
}

#[tokio::test]
async fn restore_session_reuses_stored_token() {
    let (server_url, mock) = spawn_mock_server().await;
    let store = Arc::new(EphemeralSessionStore::with_record(SessionRecord {
        token: "T1".into(),
        username: Some("alice".into()),
    }));
    let client = controller_with_store(&server_url, store);

    assert!(client.restore_session().await.expect("restore"));
    assert_eq!(mock.count("profile").await, 1);
    assert_eq!(
        mock.last_auth("profile").await.as_deref(),
        Some("Bearer T1")
    );

    let snapshot = client.snapshot().await;
    assert!(snapshot.authenticated);
    assert_eq!(snapshot.username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn restore_session_with_rejected_token_clears_record() {
    let (server_url, mock) = spawn_mock_server().await;
    mock.reject_tokens.store(true, Ordering::SeqCst);
    let store = Arc::new(EphemeralSessionStore::with_record(SessionRecord {
        token: "stale".into(),
        username: None,
    }));
    let client = controller_with_store(&server_url, store.clone());

    assert!(!client.restore_session().await.expect("restore"));
    assert!(!client.snapshot().await.authenticated);
    assert_eq!(store.load().await.expect("load"), None);
}

#[tokio::test]
async fn restore_session_without_record_sends_nothing() {
    let (server_url, mock) = spawn_mock_server().await;
    let client = controller(&server_url);

    assert!(!client.restore_session().await.expect("restore"));
    assert_eq!(mock.count("profile").await, 0);
}

#[tokio::test]
async fn unreachable_server_maps_to_generic_message() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = controller(&format!("http://{addr}"));
    let err = client
        .authenticate(AuthMode::Login, Credentials::new("a@b.com", "secret"))
        .await
        .expect_err("no server");
    assert_eq!(err.category(), ErrorCategory::Transport);
    assert_eq!(err.user_message("Login failed"), "Login failed");
    assert!(!client.snapshot().await.authenticated);
}
