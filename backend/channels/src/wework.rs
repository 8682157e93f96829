/// WeWork (企业微信) client for aquadash.
///
/// Covers QR-code SSO login (`getuserinfo` + `user/get`) and application
/// messages (`message/send`, text and text-card). Every API call carries an
/// `access_token` obtained through a single-flight [`TokenCache`].
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use aquadash_config::WeworkConfig;
use aquadash_core::{DashError, UserProfile};
use aquadash_logging::redact_sensitive_data;

use crate::token_cache::TokenCache;
use crate::{Card, Notifier};

/// API codes meaning the access token is invalid or expired.
const TOKEN_REJECTED: [i64; 3] = [40014, 42001, 41001];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(flatten)]
    body: Value,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct LoginIdentity {
    #[serde(rename = "UserId", alias = "userid")]
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct DirectoryUser {
    name: String,
    mobile: Option<String>,
    #[serde(default)]
    department: Vec<i64>,
    position: Option<String>,
    avatar: Option<String>,
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    touser: String,
    msgtype: &'static str,
    agentid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    textcard: Option<&'a Card>,
}

#[derive(Serialize)]
struct TextBody<'a> {
    content: &'a str,
}

/// A directory user resolved from a login code.
#[derive(Debug, Clone, PartialEq)]
pub struct WeworkUser {
    pub user_id: String,
    pub profile: UserProfile,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct WeworkClient {
    http: Client,
    corp_id: String,
    agent_id: String,
    secret: String,
    api_base: String,
    sso_base: String,
    tokens: TokenCache,
}

impl WeworkClient {
    pub fn new(config: &WeworkConfig) -> Result<Self, DashError> {
        let (Some(corp_id), Some(agent_id), Some(secret)) =
            (&config.corp_id, &config.agent_id, &config.secret)
        else {
            return Err(DashError::Config(
                "wework corpId, agentId and secret are required".to_string(),
            ));
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build WeWork HTTP client")?;

        Ok(Self {
            http,
            corp_id: corp_id.clone(),
            agent_id: agent_id.clone(),
            secret: secret.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            sso_base: config.sso_base.clone(),
            tokens: TokenCache::new(Duration::from_secs(config.token_refresh_margin_secs)),
        })
    }

    /// QR-code login URL that redirects back to `redirect_uri` with a `code`.
    pub fn auth_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?appid={}&agentid={}&redirect_uri={}&state={}",
            self.sso_base,
            self.corp_id,
            self.agent_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// A valid access token, refreshed when absent or close to expiry.
    pub async fn access_token(&self) -> Result<String, DashError> {
        self.tokens.get_or_refresh(|| self.fetch_token()).await
    }

    async fn fetch_token(&self) -> Result<(String, Duration), DashError> {
        let url = format!(
            "{}/cgi-bin/gettoken?corpid={}&corpsecret={}",
            self.api_base,
            urlencoding::encode(&self.corp_id),
            urlencoding::encode(&self.secret)
        );
        let token: TokenResponse = self.get(&url).await?;
        info!(expires_in = token.expires_in, "Fetched WeWork access token");
        Ok((token.access_token, Duration::from_secs(token.expires_in)))
    }

    /// Exchange a login `code` for the directory user behind it.
    pub async fn user_info(&self, code: &str) -> Result<WeworkUser, DashError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/cgi-bin/user/getuserinfo?access_token={}&code={}",
            self.api_base,
            urlencoding::encode(&token),
            urlencoding::encode(code)
        );
        let identity: LoginIdentity = self.with_token_check(self.get(&url).await).await?;
        let user_id = identity
            .user_id
            .ok_or_else(|| DashError::Unauthorized("login code is not bound to a member".into()))?;

        let url = format!(
            "{}/cgi-bin/user/get?access_token={}&userid={}",
            self.api_base,
            urlencoding::encode(&token),
            urlencoding::encode(&user_id)
        );
        let detail: DirectoryUser = self.with_token_check(self.get(&url).await).await?;
        let department = (!detail.department.is_empty()).then(|| {
            detail
                .department
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        });

        Ok(WeworkUser {
            user_id,
            profile: UserProfile {
                name: detail.name,
                mobile: detail.mobile,
                department,
                position: detail.position,
                avatar: detail.avatar,
            },
        })
    }

    async fn send(&self, message: &OutgoingMessage<'_>) -> Result<(), DashError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/cgi-bin/message/send?access_token={}",
            self.api_base,
            urlencoding::encode(&token)
        );
        debug!(url = %redact_sensitive_data(&url), msgtype = message.msgtype, "WeWork POST");
        let response = self
            .http
            .post(&url)
            .json(message)
            .send()
            .await
            .context("WeWork message request failed")?;
        let _: Value = self.with_token_check(decode(response).await).await?;
        info!(touser = %message.touser, msgtype = message.msgtype, "WeWork message sent");
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, DashError> {
        debug!(url = %redact_sensitive_data(url), "WeWork GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("WeWork request failed")?;
        decode(response).await
    }

    /// Drop the cached token when the API rejected it, so the next call
    /// fetches a fresh one. Never called on the `gettoken` path, which runs
    /// under the cache lock.
    async fn with_token_check<T>(&self, result: Result<T, DashError>) -> Result<T, DashError> {
        if let Err(DashError::WeWork { code, .. }) = &result {
            if TOKEN_REJECTED.contains(code) {
                debug!(code, "Access token rejected, invalidating");
                self.tokens.invalidate().await;
            }
        }
        result
    }
}

/// Check the HTTP status and `errcode`, then decode the remaining fields.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, DashError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!(
            "WeWork API returned {}: {}",
            status,
            redact_sensitive_data(&body)
        )
        .into());
    }
    let envelope: Envelope = response
        .json()
        .await
        .context("Failed to decode WeWork response")?;
    if envelope.errcode != 0 {
        warn!(code = envelope.errcode, message = %envelope.errmsg, "WeWork API error");
        return Err(DashError::WeWork {
            code: envelope.errcode,
            message: envelope.errmsg,
        });
    }
    Ok(serde_json::from_value(envelope.body).context("Unexpected WeWork response shape")?)
}

#[async_trait]
impl Notifier for WeworkClient {
    fn name(&self) -> &str {
        "wework"
    }

    async fn send_text(&self, user_ids: &[String], text: &str) -> Result<(), DashError> {
        self.send(&OutgoingMessage {
            touser: user_ids.join("|"),
            msgtype: "text",
            agentid: &self.agent_id,
            text: Some(TextBody { content: text }),
            textcard: None,
        })
        .await
    }

    async fn send_card(&self, user_ids: &[String], card: &Card) -> Result<(), DashError> {
        self.send(&OutgoingMessage {
            touser: user_ids.join("|"),
            msgtype: "textcard",
            agentid: &self.agent_id,
            text: None,
            textcard: Some(card),
        })
        .await
    }
}
