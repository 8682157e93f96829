//! WeWork login: OAuth callback, session cookie, current-user lookup and the
//! `/gm` page guard.
//!
//! The session cookie holds URL-encoded JSON [`SessionClaims`]; it is not
//! signed.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use aquadash_core::{DashError, SessionClaims};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub const SESSION_COOKIE: &str = "session";
/// Seven days.
pub const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;
const OAUTH_STATE: &str = "STATE";
const CALLBACK_PATH: &str = "/api/auth/wework";

// ---------------------------------------------------------------------------
// Cookie helpers
// ---------------------------------------------------------------------------

/// Raw value of cookie `name` from the request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

pub fn encode_session(claims: &SessionClaims) -> String {
    let json = serde_json::to_string(claims).unwrap_or_default();
    urlencoding::encode(&json).into_owned()
}

pub fn decode_session(raw: &str) -> Option<SessionClaims> {
    let json = urlencoding::decode(raw).ok()?;
    serde_json::from_str(&json).ok()
}

pub fn session_cookie(claims: &SessionClaims, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={SESSION_MAX_AGE_SECS}",
        encode_session(claims)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// The logged-in user, from the `session` cookie.
pub struct SessionUser(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = read_cookie(&parts.headers, SESSION_COOKIE)
            .ok_or_else(|| ApiError::from(DashError::Unauthorized("no session cookie".into())))?;
        match decode_session(&raw) {
            Some(claims) => Ok(SessionUser(claims)),
            None => {
                warn!("Unreadable session cookie");
                Err(DashError::Unauthorized("invalid session cookie".into()).into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn redirect_uri(state: &AppState) -> String {
    format!("{}{CALLBACK_PATH}", state.public_base())
}

/// SSO URL for the login page, if WeWork is configured.
fn login_url(state: &AppState) -> Option<String> {
    state
        .wework
        .as_ref()
        .map(|client| client.auth_url(&redirect_uri(state), OAUTH_STATE))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

/// Handler for `GET /api/auth/wework?code=`
pub async fn wework_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Redirect::to("/?error=missing_code").into_response();
    };

    match login(&state, &code).await {
        Ok(claims) => {
            info!(user_id = %claims.user_id, wework_user_id = %claims.wework_user_id, "User logged in");
            let cookie = session_cookie(&claims, state.config.server.production);
            let mut response = Redirect::to("/gm").into_response();
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().insert(header::SET_COOKIE, value);
                    response
                }
                Err(e) => {
                    warn!(error = %e, "Session cookie is not a valid header");
                    Redirect::to("/?error=login_failed").into_response()
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "WeWork login failed");
            Redirect::to("/?error=login_failed").into_response()
        }
    }
}

async fn login(state: &AppState, code: &str) -> Result<SessionClaims, DashError> {
    let client = state
        .wework
        .as_ref()
        .ok_or_else(|| DashError::Config("wework login is not configured".into()))?;
    let wework_user = client.user_info(code).await?;
    let user = state
        .users
        .get_or_create_by_wework_id(&wework_user.user_id, wework_user.profile)
        .await?;
    Ok(SessionClaims::from(&user))
}

/// Handler for `GET /api/auth/user`
pub async fn current_user(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
) -> ApiResult<Json<Value>> {
    let user = state
        .users
        .get(claims.user_id)
        .await
        .map_err(|e| ApiError::from(e).labelled("获取用户信息失败"))?
        .ok_or_else(|| {
            ApiError::from(DashError::NotFound(format!("user {}", claims.user_id))).labelled("用户不存在")
        })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "id": user.id,
            "weworkUserId": user.wework_user_id,
            "name": user.name,
            "mobile": user.mobile,
            "department": user.department,
            "position": user.position,
            "avatar": user.avatar,
        },
    })))
}

/// Handler for `GET /api/auth/login`: send the browser to the SSO page.
pub async fn login_redirect(State(state): State<AppState>) -> ApiResult<Redirect> {
    login_url(&state)
        .map(|url| Redirect::to(&url))
        .ok_or_else(|| DashError::NotFound("wework login is not configured".into()).into())
}

/// Page guard for `/gm` and `/gm/*`: with WeWork login enabled, visitors
/// without a session are sent to the SSO page.
pub async fn page_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let guarded = path == "/gm" || path.starts_with("/gm/");
    if !guarded || !state.config.wework.enabled {
        return next.run(request).await;
    }
    if read_cookie(request.headers(), SESSION_COOKIE).is_some() {
        return next.run(request).await;
    }

    match login_url(&state) {
        Some(url) => {
            debug!(path = %path, "Redirecting anonymous visitor to SSO");
            Redirect::to(&url).into_response()
        }
        None => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use aquadash_channels::WeworkClient;
    use aquadash_config::{AquadashConfig, WeworkConfig};
    use aquadash_llm::ScriptedProvider;
    use aquadash_store::{MemoryStore, UserStore};
    use axum::{extract::Query as AxumQuery, routing::get, Router};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use uuid::Uuid;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn mock_wework() -> String {
        let router = Router::new()
            .route(
                "/cgi-bin/gettoken",
                get(|| async {
                    Json(json!({"errcode": 0, "errmsg": "ok", "access_token": "tok", "expires_in": 7200}))
                }),
            )
            .route(
                "/cgi-bin/user/getuserinfo",
                get(|AxumQuery(q): AxumQuery<HashMap<String, String>>| async move {
                    if q.get("code").map(String::as_str) == Some("good") {
                        Json(json!({"errcode": 0, "errmsg": "ok", "UserId": "zhangsan"}))
                    } else {
                        Json(json!({"errcode": 40029, "errmsg": "invalid code"}))
                    }
                }),
            )
            .route(
                "/cgi-bin/user/get",
                get(|| async {
                    Json(json!({"errcode": 0, "errmsg": "ok", "name": "张三", "department": [3]}))
                }),
            );
        serve(router).await
    }

    fn wework_config(api_base: String) -> WeworkConfig {
        WeworkConfig {
            enabled: true,
            corp_id: Some("ww-corp".into()),
            agent_id: Some("1000002".into()),
            secret: Some("s3cret".into()),
            api_base,
            ..Default::default()
        }
    }

    async fn start_app(wework: bool) -> (String, MemoryStore) {
        let store = MemoryStore::new();
        let mut config = AquadashConfig::default();
        config.server.public_url = Some("http://bi.example.com".into());
        let mut state = AppState::new(
            config.clone(),
            Arc::new(ScriptedProvider::chunks(["x"])),
            store.clone(),
        );
        if wework {
            let wework_cfg = wework_config(mock_wework().await);
            config.wework = wework_cfg.clone();
            state.config = Arc::new(config);
            state = state.with_wework(WeworkClient::new(&wework_cfg).unwrap());
        }
        (serve(build_router(state)).await, store)
    }

    fn no_redirects() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    #[test]
    fn session_cookie_round_trips() {
        let claims = SessionClaims {
            user_id: Uuid::new_v4(),
            wework_user_id: "zhangsan".into(),
            name: "张三".into(),
        };
        let cookie = session_cookie(&claims, true);
        assert!(cookie.contains("HttpOnly; SameSite=Lax; Path=/; Max-Age=604800; Secure"));

        let mut headers = HeaderMap::new();
        let raw = cookie.split(';').next().unwrap().to_string();
        headers.insert(header::COOKIE, HeaderValue::from_str(&format!("theme=dark; {raw}")).unwrap());
        let value = read_cookie(&headers, SESSION_COOKIE).unwrap();
        assert_eq!(decode_session(&value), Some(claims.clone()));
        assert!(!session_cookie(&claims, false).contains("Secure"));
    }

    #[tokio::test]
    async fn callback_sets_session_and_user_endpoint_reads_it() {
        let (base, store) = start_app(true).await;
        let client = no_redirects();

        let response = client
            .get(format!("{base}/api/auth/wework?code=good"))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], "/gm");
        let cookie = response.headers()["set-cookie"].to_str().unwrap().to_string();
        let pair = cookie.split(';').next().unwrap().to_string();

        let user: Value = client
            .get(format!("{base}/api/auth/user"))
            .header("cookie", pair)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(user["success"], true);
        assert_eq!(user["data"]["weworkUserId"], "zhangsan");
        assert_eq!(user["data"]["department"], "3");

        let id: Uuid = user["data"]["id"].as_str().unwrap().parse().unwrap();
        assert!(UserStore::get(&store, id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn callback_failures_redirect_home() {
        let (base, _) = start_app(true).await;
        let client = no_redirects();

        let missing = client.get(format!("{base}/api/auth/wework")).send().await.unwrap();
        assert_eq!(missing.headers()["location"], "/?error=missing_code");

        let bad = client
            .get(format!("{base}/api/auth/wework?code=bad"))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.headers()["location"], "/?error=login_failed");
    }

    #[tokio::test]
    async fn user_endpoint_requires_known_session() {
        let (base, _) = start_app(false).await;
        let client = no_redirects();

        let anonymous = client.get(format!("{base}/api/auth/user")).send().await.unwrap();
        assert_eq!(anonymous.status(), 401);

        let claims = SessionClaims {
            user_id: Uuid::new_v4(),
            wework_user_id: "ghost".into(),
            name: "ghost".into(),
        };
        let stranger = client
            .get(format!("{base}/api/auth/user"))
            .header("cookie", format!("session={}", encode_session(&claims)))
            .send()
            .await
            .unwrap();
        assert_eq!(stranger.status(), 404);
    }

    #[tokio::test]
    async fn guard_redirects_anonymous_gm_visitors() {
        let (base, _) = start_app(true).await;
        let client = no_redirects();

        let response = client.get(format!("{base}/gm/overview")).send().await.unwrap();
        let location = response.headers()["location"].to_str().unwrap().to_string();
        assert!(location.starts_with("https://open.work.weixin.qq.com/wwopen/sso/qrConnect?appid=ww-corp"));
        assert!(location.contains("redirect_uri=http%3A%2F%2Fbi.example.com%2Fapi%2Fauth%2Fwework"));

        let login = client.get(format!("{base}/api/auth/login")).send().await.unwrap();
        assert_eq!(login.headers()["location"].to_str().unwrap(), location);

        let with_session = client
            .get(format!("{base}/gm"))
            .header("cookie", "session=x")
            .send()
            .await
            .unwrap();
        assert!(!with_session.status().is_redirection());

        let other = client.get(format!("{base}/gmx")).send().await.unwrap();
        assert!(!other.status().is_redirection());
    }

    #[tokio::test]
    async fn guard_is_off_when_login_disabled() {
        let (base, _) = start_app(false).await;
        let response = no_redirects().get(format!("{base}/gm")).send().await.unwrap();
        assert!(!response.status().is_redirection());
        let login = no_redirects().get(format!("{base}/api/auth/login")).send().await.unwrap();
        assert_eq!(login.status(), 404);
    }
}
