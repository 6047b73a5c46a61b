use shared::{
    domain::{Language, RiddleId},
    protocol::{
        AnswerStats, CategorySummary, CheckAnswerResponse, DailyAnswerResponse, DailyChallenge,
        LeaderboardEntry, Profile, Riddle, RoomSummary,
    },
};

use crate::tabs::{Tab, TabStates};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Signup { username: String, language: Language },
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of checking an answer to the active riddle.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub riddle_id: RiddleId,
    pub correct: bool,
    pub message: String,
    /// Only set for incorrect answers, once the server reveals it.
    pub revealed_answer: Option<String>,
    pub points_change: i64,
    pub attempts_left: Option<i32>,
    pub max_attempts_reached: bool,
    /// Display-only; the profile stays the source of truth for stats.
    pub stats_hint: Option<AnswerStats>,
}

impl AnswerFeedback {
    pub(crate) fn from_response(riddle_id: RiddleId, response: CheckAnswerResponse) -> Self {
        Self {
            riddle_id,
            correct: response.correct,
            message: response.message,
            revealed_answer: if response.correct {
                None
            } else {
                response.answer
            },
            points_change: response.points_change,
            attempts_left: response.attempts_left,
            max_attempts_reached: response.max_attempts_reached,
            stats_hint: response.stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyAnswerFeedback {
    pub correct: bool,
    pub message: String,
    pub revealed_answer: Option<String>,
    pub bonus_points: Option<i64>,
}

impl From<DailyAnswerResponse> for DailyAnswerFeedback {
    fn from(response: DailyAnswerResponse) -> Self {
        Self {
            correct: response.correct,
            message: response.message,
            revealed_answer: if response.correct {
                None
            } else {
                response.answer
            },
            bonus_points: response.bonus_points,
        }
    }
}

/// Read-only copy of everything a rendering layer may show. Never carries the token.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub authenticated: bool,
    pub username: Option<String>,
    pub profile: Option<Profile>,
    pub categories: Vec<CategorySummary>,
    pub language: Language,
    pub selected_category: Option<String>,
    pub active_tab: Tab,
    pub tabs: TabStates,
    pub riddle: Option<Riddle>,
    pub feedback: Option<AnswerFeedback>,
    pub answer_draft: String,
    pub auto_advance_pending: bool,
    pub daily: Option<DailyChallenge>,
    pub daily_feedback: Option<DailyAnswerFeedback>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub rooms: Vec<RoomSummary>,
    pub room_name_draft: String,
    pub last_message: Option<String>,
    pub last_error: Option<String>,
}
