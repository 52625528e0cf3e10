//! Webhookトリガー
//!
//! 艦隊加入の階級に応じた外部Webhookを発火する。結果は成否のみで、
//! 失敗してもパイプラインには波及させない。

use std::sync::Arc;
use std::time::Duration;

use crate::config::MemberConfig;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhookクライアント
pub struct WebhookClient {
    member_config: Arc<MemberConfig>,
    client: reqwest::Client,
}

impl WebhookClient {
    /// 新しいクライアントを作成
    pub fn new(member_config: Arc<MemberConfig>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .expect("HTTPクライアントの作成に失敗");
        Self {
            member_config,
            client,
        }
    }

    /// 指定タグのWebhookを発火する
    ///
    /// そのタグが有効でURLが設定されている場合のみPOSTする。
    /// 失敗はログに残してfalseを返すだけ。
    pub async fn trigger(&self, tag: &str) -> bool {
        if !self.member_config.webhook_enabled(tag) {
            return false;
        }
        let Some(url) = self.member_config.webhook_url(tag) else {
            tracing::info!("[Webhook] {} のURLが未設定", tag);
            return false;
        };

        tracing::info!("[Webhook] {} を発火", tag);
        match self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::error!("[Webhook] {} が失敗: ステータス {}", tag, response.status());
                false
            }
            Err(e) => {
                tracing::error!("[Webhook] {} が失敗: {}", tag, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::member::MemberSettings;

    #[tokio::test]
    async fn test_disabled_tag_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let member_config = Arc::new(MemberConfig::load(dir.path()));
        let client = WebhookClient::new(member_config);
        assert!(!client.trigger("captain").await);
    }

    #[tokio::test]
    async fn test_enabled_without_url_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let member_config = Arc::new(MemberConfig::load(dir.path()));
        member_config.update(MemberSettings {
            enable_webhook_captain: true,
            ..Default::default()
        });
        let client = WebhookClient::new(member_config);
        assert!(!client.trigger("captain").await);
    }
}
