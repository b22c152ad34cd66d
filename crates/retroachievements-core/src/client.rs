//! RetroAchievements web API client.
//!
//! Only the user summary endpoint is used. Authentication is the `z`/`y`
//! query pair (user name and web API key) that every endpoint accepts.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::ApiError;
use crate::snapshot::{AchievementRecord, Snapshot};

pub const API_URL: &str = "https://retroachievements.org/API/";

const SUMMARY_ENDPOINT: &str = "API_GetUserSummary.php";
/// Number of recently played games requested with the summary.
const RECENT_GAMES: u32 = 5;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("retroachievements-core/", env!("CARGO_PKG_VERSION"));
const DATE_AWARDED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// User name plus web API key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            api_key: api_key.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.api_key.is_empty()
    }
}

pub struct RetroAchievementsClient {
    base_url: Url,
    http_client: Client,
}

impl RetroAchievementsClient {
    /// Client for the public API.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(API_URL)
    }

    /// Client for an alternative base URL (mirrors, test servers).
    pub fn with_base_url(base_url: &str) -> Result<Self, ApiError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            base_url: Url::parse(&base)?,
            http_client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL for an API endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(endpoint)?)
    }

    /// The auth pair followed by the endpoint-specific parameters.
    fn query_params(credentials: &Credentials, params: &[(&str, String)]) -> Vec<(String, String)> {
        let mut query = vec![
            ("z".to_string(), credentials.user.clone()),
            ("y".to_string(), credentials.api_key.clone()),
        ];
        query.extend(params.iter().map(|(k, v)| (k.to_string(), v.clone())));
        query
    }

    /// GET an endpoint and decode the JSON body.
    pub async fn get_api_response(
        &self,
        endpoint: &str,
        credentials: &Credentials,
        params: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        if !credentials.is_complete() {
            return Err(ApiError::MissingCredentials);
        }

        let resp = self
            .http_client
            .get(self.endpoint_url(endpoint)?)
            .query(&Self::query_params(credentials, params))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, body });
        }

        Ok(resp.json().await?)
    }

    /// Fetch the user's summary. `Ok(None)` when the user is offline.
    pub async fn get_user_summary(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Snapshot>, ApiError> {
        let body = self
            .get_api_response(
                SUMMARY_ENDPOINT,
                credentials,
                &[
                    ("u", credentials.user.clone()),
                    ("g", RECENT_GAMES.to_string()),
                ],
            )
            .await?;
        decode_summary(body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SummaryResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    rich_presence_msg: Option<String>,
    #[serde(rename = "LastGameID", default)]
    last_game_id: Option<Value>,
    #[serde(default)]
    recent_achievements: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AchievementResponse {
    title: String,
    #[serde(default)]
    description: String,
    points: Value,
    date_awarded: String,
}

/// Turn a summary body into a snapshot of the last played game.
pub(crate) fn decode_summary(body: Value) -> Result<Option<Snapshot>, ApiError> {
    let summary: SummaryResponse =
        serde_json::from_value(body).map_err(|e| ApiError::Malformed(e.to_string()))?;

    if summary.status.as_deref() == Some("Offline") {
        return Ok(None);
    }

    let presence = summary.rich_presence_msg.unwrap_or_default();
    let game_key = summary.last_game_id.as_ref().and_then(id_key);

    // An empty RecentAchievements comes back as `[]` rather than `{}`.
    let per_game = match (&summary.recent_achievements, game_key) {
        (Some(Value::Object(games)), Some(key)) => games.get(&key).cloned(),
        _ => None,
    };

    let mut achievements = BTreeMap::new();
    if let Some(Value::Object(entries)) = per_game {
        for (id, raw) in entries {
            let wire: AchievementResponse = serde_json::from_value(raw)
                .map_err(|e| ApiError::Malformed(format!("achievement {id}: {e}")))?;
            achievements.insert(id, decode_achievement(wire)?);
        }
    }

    Ok(Some(Snapshot {
        presence,
        achievements,
    }))
}

fn decode_achievement(wire: AchievementResponse) -> Result<AchievementRecord, ApiError> {
    let points = match &wire.points {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ApiError::Malformed(format!("invalid Points: {}", wire.points)))?;

    Ok(AchievementRecord {
        title: wire.title,
        description: wire.description,
        points,
        awarded_at: parse_date_awarded(&wire.date_awarded)?,
    })
}

/// `DateAwarded` is a naive timestamp in UTC.
fn parse_date_awarded(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, DATE_AWARDED_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::Malformed(format!("invalid DateAwarded: {raw}")))
}

fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;
    use serde_json::json;

    fn summary_body() -> Value {
        json!({
            "Status": "Online",
            "RichPresenceMsg": "Exploring Green Hill Zone",
            "LastGameID": 1,
            "RecentAchievements": {
                "1": {
                    "42": {
                        "ID": 42,
                        "Title": "First Steps",
                        "Description": "Start the game",
                        "Points": 5,
                        "DateAwarded": "2024-03-01 12:30:00"
                    },
                    "43": {
                        "ID": 43,
                        "Title": "Ring Collector",
                        "Description": "Collect 100 rings",
                        "Points": "10",
                        "DateAwarded": "2024-03-01 12:45:10"
                    }
                },
                "7": {
                    "99": {
                        "Title": "Other game",
                        "Description": "Ignored",
                        "Points": 1,
                        "DateAwarded": "2024-02-01 00:00:00"
                    }
                }
            }
        })
    }

    #[test]
    fn decodes_last_game_achievements() {
        let snap = decode_summary(summary_body()).unwrap().unwrap();
        assert_eq!(snap.presence, "Exploring Green Hill Zone");
        assert_eq!(snap.achievements.len(), 2);

        let first = &snap.achievements["42"];
        assert_eq!(first.title, "First Steps");
        assert_eq!(first.points, 5);
        assert_eq!(
            first.awarded_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );
        assert_eq!(snap.achievements["43"].points, 10);
    }

    #[test]
    fn offline_user_has_no_summary() {
        let body = json!({ "Status": "Offline", "RichPresenceMsg": "", "LastGameID": 1 });
        assert!(decode_summary(body).unwrap().is_none());
    }

    #[test]
    fn empty_recent_achievements_array_decodes() {
        let body = json!({
            "Status": "Online",
            "RichPresenceMsg": "Title screen",
            "LastGameID": "3",
            "RecentAchievements": []
        });
        let snap = decode_summary(body).unwrap().unwrap();
        assert_eq!(snap.presence, "Title screen");
        assert!(snap.achievements.is_empty());
    }

    #[test]
    fn string_game_id_selects_game() {
        let mut body = summary_body();
        body["LastGameID"] = json!("7");
        let snap = decode_summary(body).unwrap().unwrap();
        assert_eq!(snap.achievements.len(), 1);
        assert!(snap.achievements.contains_key("99"));
    }

    #[test]
    fn malformed_date_is_rejected() {
        let mut body = summary_body();
        body["RecentAchievements"]["1"]["42"]["DateAwarded"] = json!("yesterday");
        assert!(matches!(decode_summary(body), Err(ApiError::Malformed(_))));
    }

    #[test]
    fn non_object_body_is_malformed() {
        assert!(matches!(
            decode_summary(json!("nope")),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn endpoint_url_joins_base() {
        let client = RetroAchievementsClient::with_base_url("http://localhost:1234/API").unwrap();
        assert_eq!(
            client.endpoint_url(SUMMARY_ENDPOINT).unwrap().as_str(),
            "http://localhost:1234/API/API_GetUserSummary.php"
        );
    }

    #[tokio::test]
    async fn fetches_summary_with_auth_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/API/API_GetUserSummary.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("z".into(), "alice".into()),
                Matcher::UrlEncoded("y".into(), "secret".into()),
                Matcher::UrlEncoded("u".into(), "alice".into()),
                Matcher::UrlEncoded("g".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(summary_body().to_string())
            .create_async()
            .await;

        let client =
            RetroAchievementsClient::with_base_url(&format!("{}/API/", server.url())).unwrap();
        let snap = client
            .get_user_summary(&Credentials::new("alice", "secret"))
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(snap.achievements.len(), 2);
    }

    #[tokio::test]
    async fn http_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/API/API_GetUserSummary.php")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("Invalid API Key")
            .create_async()
            .await;

        let client =
            RetroAchievementsClient::with_base_url(&format!("{}/API/", server.url())).unwrap();
        let err = client
            .get_user_summary(&Credentials::new("alice", "wrong"))
            .await
            .unwrap_err();

        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid API Key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_credentials_skip_the_request() {
        let client = RetroAchievementsClient::with_base_url("http://127.0.0.1:9/API/").unwrap();
        let err = client
            .get_user_summary(&Credentials::new("alice", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingCredentials));
    }
}
