//! Bilibili APIクライアント
//!
//! 初期艦隊数の取得とルーム/ユーザー情報の検証に使う共通HTTP
//! クライアント。失敗は全てゼロ値/Noneに落とし、呼び出し側を
//! ブロックしない。

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const GUARD_TOP_LIST_URL: &str =
    "https://api.live.bilibili.com/xlive/app-room/v2/guardTab/topList";
const USER_CARD_URL: &str = "https://api.live.bilibili.com/xlive/app-ucenter/v2/card/user";
const ROOM_INFO_URL: &str = "https://api.live.bilibili.com/room/v1/Room/get_info";

/// APIエラー型
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTPリクエストに失敗しました: {0}")]
    Http(#[from] reqwest::Error),

    #[error("APIエラー応答: {0}")]
    Api(String),

    #[error("応答の形式が不正です")]
    MalformedResponse,
}

/// 検証済みユーザー情報
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub username: String,
    pub face: String,
    pub desc: String,
}

/// Bilibili APIクライアント
pub struct BiliClient {
    client: reqwest::Client,
}

impl BiliClient {
    /// 新しいクライアントを作成
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("HTTPクライアントの作成に失敗");
        Self { client }
    }

    /// `code == 0` なら `data` を返す共通GET
    async fn get(&self, url: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self.client.get(url).query(params).send().await?;
        let body: Value = response.json().await?;

        if body.get("code").and_then(Value::as_i64) == Some(0) {
            body.get("data")
                .cloned()
                .ok_or(ApiError::MalformedResponse)
        } else {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            Err(ApiError::Api(message.to_string()))
        }
    }

    /// ルームの初期艦隊数を取得する（失敗時は0）
    pub async fn fetch_initial_guard_count(&self, room_id: &str, uid: &str) -> u64 {
        let params = [
            ("roomid", room_id.to_string()),
            ("page", "1".to_string()),
            ("ruid", uid.to_string()),
            ("page_size", "1".to_string()),
        ];
        match self.get(GUARD_TOP_LIST_URL, &params).await {
            Ok(data) => data
                .get("info")
                .and_then(|info| info.get("num"))
                .and_then(Value::as_u64)
                .unwrap_or(0),
            Err(e) => {
                tracing::warn!("[BiliClient] 初期艦隊数の取得に失敗、0で継続: {}", e);
                0
            }
        }
    }

    /// ユーザー情報を取得する
    pub async fn fetch_user_info(&self, uid: &str) -> Option<UserInfo> {
        let params = [("uid", uid.to_string()), ("ruid", uid.to_string())];
        match self.get(USER_CARD_URL, &params).await {
            Ok(data) => Some(UserInfo {
                username: data.get("uname")?.as_str()?.to_string(),
                face: data.get("face")?.as_str()?.to_string(),
                desc: data
                    .get("desc")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            }),
            Err(e) => {
                tracing::error!("[BiliClient] ユーザー情報の取得に失敗: {}", e);
                None
            }
        }
    }

    /// ルームのオーナーUIDを取得する
    pub async fn fetch_room_owner_uid(&self, room_id: &str) -> Option<u64> {
        let params = [("room_id", room_id.to_string())];
        match self.get(ROOM_INFO_URL, &params).await {
            Ok(data) => data.get("uid").and_then(Value::as_u64),
            Err(e) => {
                tracing::error!("[BiliClient] ルーム情報の取得に失敗: {}", e);
                None
            }
        }
    }
}

impl Default for BiliClient {
    fn default() -> Self {
        Self::new()
    }
}
