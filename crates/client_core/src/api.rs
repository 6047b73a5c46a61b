//! Typed calls against the riddle service HTTP contract.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Language, RiddleId, RoomId},
    error::ApiErrorBody,
    protocol::{
        Achievements, AuthResponse, CategoriesResponse, CategorySummary, CheckAnswerRequest,
        CheckAnswerResponse, CreateRoomRequest, CreateRoomResponse, DailyAnswerRequest,
        DailyAnswerResponse, DailyChallenge, JoinRoomRequest, JoinRoomResponse, LeaderboardEntry,
        LeaderboardQuery, LeaderboardResponse, LoginRequest, MessageResponse, Profile, Riddle,
        RiddleQuery, RoomDetail, RoomSummary, RoomsResponse, ShareRequest, ShareResponse,
        SharedRiddle, SignupRequest,
    },
};
use tracing::debug;

use crate::{config::normalize_base_url, error::ClientError};

pub type ApiResult<T> = std::result::Result<T, ClientError>;

#[derive(Clone)]
pub struct RiddleApi {
    http: Client,
    base_url: String,
}

impl RiddleApi {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        send_json(self.http.post(self.url("/login")).json(request)).await
    }

    pub async fn signup(&self, request: &SignupRequest) -> ApiResult<AuthResponse> {
        send_json(self.http.post(self.url("/signup")).json(request)).await
    }

    pub async fn profile(&self, token: &str) -> ApiResult<Profile> {
        send_json(self.http.get(self.url("/profile")).bearer_auth(token)).await
    }

    pub async fn categories(&self) -> ApiResult<Vec<CategorySummary>> {
        let body: CategoriesResponse = send_json(self.http.get(self.url("/categories"))).await?;
        Ok(body.categories)
    }

    pub async fn riddle(
        &self,
        token: &str,
        language: Language,
        category: Option<&str>,
    ) -> ApiResult<Riddle> {
        let query = RiddleQuery {
            language,
            category: category.map(str::to_string),
        };
        send_json(
            self.http
                .get(self.url("/riddle"))
                .bearer_auth(token)
                .query(&query),
        )
        .await
    }

    pub async fn check_answer(
        &self,
        token: &str,
        request: &CheckAnswerRequest,
    ) -> ApiResult<CheckAnswerResponse> {
        send_json(
            self.http
                .post(self.url("/check"))
                .bearer_auth(token)
                .json(request),
        )
        .await
    }

    pub async fn leaderboard(&self, limit: u32) -> ApiResult<Vec<LeaderboardEntry>> {
        let body: LeaderboardResponse = send_json(
            self.http
                .get(self.url("/leaderboard"))
                .query(&LeaderboardQuery { limit }),
        )
        .await?;
        Ok(body.leaderboard)
    }

    pub async fn daily_challenge(&self, token: &str) -> ApiResult<DailyChallenge> {
        send_json(self.http.get(self.url("/daily-challenge")).bearer_auth(token)).await
    }

    pub async fn daily_answer(
        &self,
        token: &str,
        request: &DailyAnswerRequest,
    ) -> ApiResult<DailyAnswerResponse> {
        send_json(
            self.http
                .post(self.url("/daily-challenge/answer"))
                .bearer_auth(token)
                .json(request),
        )
        .await
    }

    pub async fn rooms(&self) -> ApiResult<Vec<RoomSummary>> {
        let body: RoomsResponse = send_json(self.http.get(self.url("/multiplayer/rooms"))).await?;
        Ok(body.rooms)
    }

    pub async fn room(&self, token: &str, room_id: &RoomId) -> ApiResult<RoomDetail> {
        send_json(
            self.http
                .get(self.url(&format!("/multiplayer/room/{room_id}")))
                .bearer_auth(token),
        )
        .await
    }

    pub async fn create_room(
        &self,
        token: &str,
        request: &CreateRoomRequest,
    ) -> ApiResult<CreateRoomResponse> {
        send_json(
            self.http
                .post(self.url("/multiplayer/create"))
                .bearer_auth(token)
                .json(request),
        )
        .await
    }

    pub async fn join_room(
        &self,
        token: &str,
        request: &JoinRoomRequest,
    ) -> ApiResult<JoinRoomResponse> {
        send_json(
            self.http
                .post(self.url("/multiplayer/join"))
                .bearer_auth(token)
                .json(request),
        )
        .await
    }

    pub async fn share(&self, token: &str, request: &ShareRequest) -> ApiResult<ShareResponse> {
        send_json(
            self.http
                .post(self.url("/share"))
                .bearer_auth(token)
                .json(request),
        )
        .await
    }

    pub async fn shared_riddle(&self, riddle_id: &RiddleId) -> ApiResult<SharedRiddle> {
        send_json(self.http.get(self.url(&format!("/riddle/shared/{riddle_id}")))).await
    }

    pub async fn achievements(&self, token: &str) -> ApiResult<Achievements> {
        send_json(self.http.get(self.url("/achievements")).bearer_auth(token)).await
    }

    pub async fn reset_history(&self, token: &str) -> ApiResult<MessageResponse> {
        send_json(
            self.http
                .post(self.url("/reset-history"))
                .bearer_auth(token),
        )
        .await
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ApiResult<T> {
    let response = request.send().await?;
    decode_response(response).await
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()));
    }

    let detail = match response.bytes().await {
        Ok(body) => serde_json::from_slice::<ApiErrorBody>(&body)
            .ok()
            .and_then(|body| body.message()),
        Err(_) => None,
    };
    debug!(status = status.as_u16(), ?detail, "api: request failed");
    Err(ClientError::from_status(status.as_u16(), detail))
}
