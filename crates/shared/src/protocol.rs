use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    ChallengeId, Difficulty, Language, RankInfo, RiddleId, RoomId, RoomStatus, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub language: Language,
}

/// Shared success body of `/login` and `/signup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub total_solved: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub unique_riddles_seen: u32,
    #[serde(default)]
    pub daily_challenges_completed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement_rank: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement_icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiddleQuery {
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Riddle {
    pub id: RiddleId,
    pub question: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub shares: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts_left: Option<i32>,
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAnswerRequest {
    pub riddle_id: RiddleId,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerStats {
    #[serde(default)]
    pub solved: u32,
    #[serde(default)]
    pub correct: u32,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAnswerResponse {
    pub correct: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub points_change: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts_left: Option<i32>,
    #[serde(default)]
    pub skip_to_next: bool,
    #[serde(default)]
    pub max_attempts_reached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<AnswerStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<RankInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub username: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardQuery {
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyChallenge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<ChallengeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub riddle: Riddle,
    #[serde(default)]
    pub participants: u32,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAnswerRequest {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAnswerResponse {
    pub message: String,
    #[serde(default)]
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub players: u32,
    pub max_players: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub room_name: String,
    pub max_players: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
    #[serde(default)]
    pub room_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPlayer {
    pub username: String,
    #[serde(default)]
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDetail {
    pub room_id: RoomId,
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub players: Vec<RoomPlayer>,
    pub status: RoomStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_riddle: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRequest {
    pub riddle_id: RiddleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedRiddle {
    pub id: RiddleId,
    pub question: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub shares: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievements {
    pub current_rank: RankInfo,
    #[serde(default)]
    pub next_rank: Option<RankInfo>,
    #[serde(default)]
    pub points_to_next: i64,
    #[serde(default)]
    pub unlocked_achievements: Vec<RankInfo>,
    #[serde(default)]
    pub total_achievements: u32,
    #[serde(default)]
    pub progress_percent: f64,
}

/// Body of endpoints that only confirm an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
