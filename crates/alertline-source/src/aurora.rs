//! Aurora alert backend client using session-cookie HTTP requests.
//!
//! Aurora is a Django application: login scrapes the CSRF token from the
//! login form, posts the credentials, and keeps `sessionid`/`csrftoken`
//! in a cookie jar shared by every later request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ::async_trait::async_trait;
use regex::Regex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Response, Url};
use serde::Deserialize;
use tokio::time::Duration;
use tracing::{debug, error, info};

use alertline_core::config::resolve_secret;
use alertline_core::{AlertRecord, AlertlineError, AuroraConfig, Result};

use crate::source::AlertSource;

const LOGIN_PATH: &str = "/alerts/login/";

/// HTTP client for the Aurora alert backend.
pub struct AuroraClient {
    config: AuroraConfig,
    client: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
    password: String,
    authenticated: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct ThreadEntry {
    #[serde(default)]
    body: Option<String>,
}

impl AuroraClient {
    /// Create a client, reading the password from `config.password_env`.
    pub fn from_config(config: AuroraConfig) -> Result<Self> {
        let password = resolve_secret(&config.password_env)?;
        Self::with_password(config, password)
    }

    /// Create a client with an explicit password.
    pub fn with_password(config: AuroraConfig, password: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            AlertlineError::validation(format!("invalid aurora.base_url {}: {e}", config.base_url))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            jar,
            base_url,
            password: password.into(),
            authenticated: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(())
        } else {
            error!("Not logged in to Aurora");
            Err(AlertlineError::NotAuthenticated)
        }
    }

    /// Names of the cookies currently held for the backend.
    fn cookie_names(&self) -> Vec<String> {
        let Some(header) = self.jar.cookies(&self.base_url) else {
            return Vec::new();
        };
        header
            .to_str()
            .unwrap_or_default()
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, _)| name.trim().to_string())
            .collect()
    }

    /// Authenticated GET that fails on non-success status.
    async fn get(&self, path: &str, context: &str) -> Result<Response> {
        self.ensure_authenticated()?;

        let response = self
            .client
            .get(self.url(path))
            .header(REFERER, self.url(LOGIN_PATH))
            .send()
            .await?;

        // Django bounces an expired session back to the login form.
        if response.url().path().starts_with(LOGIN_PATH) {
            self.authenticated.store(false, Ordering::SeqCst);
            return Err(AlertlineError::authentication(format!(
                "{context}: session expired"
            )));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AlertlineError::from_http_status(context, status, &body));
        }

        Ok(response)
    }
}

/// Pull the CSRF token out of the login form.
pub(crate) fn extract_csrf_token(html: &str) -> Option<String> {
    let input = Regex::new(r#"<input[^>]*name=["']csrfmiddlewaretoken["'][^>]*>"#).ok()?;
    let value = Regex::new(r#"value=["']([^"']+)["']"#).ok()?;

    let tag = input.find(html)?;
    value
        .captures(tag.as_str())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl AlertSource for AuroraClient {
    async fn authenticate(&self) -> Result<()> {
        let login_url = self.url(LOGIN_PATH);

        let page = self
            .client
            .get(&login_url)
            .header(REFERER, &login_url)
            .send()
            .await?
            .text()
            .await?;

        let Some(csrf_token) = extract_csrf_token(&page) else {
            error!("No CSRF token found on login page");
            return Err(AlertlineError::authentication(
                "no CSRF token found on login page",
            ));
        };

        self.jar
            .add_cookie_str(&format!("csrftoken={csrf_token}"), &self.base_url);

        let form = [
            ("csrfmiddlewaretoken", csrf_token.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.password.as_str()),
        ];
        let response = self
            .client
            .post(&login_url)
            .header(REFERER, &login_url)
            .form(&form)
            .send()
            .await?;
        debug!(status = %response.status(), "login form submitted");

        let names = self.cookie_names();
        let has = |name: &str| names.iter().any(|n| n == name);
        if has("sessionid") && has("csrftoken") {
            self.authenticated.store(true, Ordering::SeqCst);
            info!(username = %self.config.username, "Successfully logged in to Aurora");
            Ok(())
        } else {
            error!("Failed to obtain Aurora session credentials");
            Err(AlertlineError::authentication(
                "login did not yield a session cookie",
            ))
        }
    }

    async fn fetch_open_alerts(&self) -> Result<Vec<AlertRecord>> {
        info!("Checking for new alerts...");
        let body = self
            .get("/alerts/get_alerts/alerts", "get_alerts")
            .await?
            .text()
            .await?;

        serde_json::from_str(&body)
            .map_err(|e| AlertlineError::parse("alert list (check session cookie)", e.to_string()))
    }

    async fn fetch_description(&self, thread_id: &str) -> Result<Option<String>> {
        let path = format!("/alerts/get_thread_main_alert/{thread_id}");
        let body = self
            .get(&path, "get_thread_main_alert")
            .await?
            .text()
            .await?;

        let entries: Vec<ThreadEntry> = serde_json::from_str(&body)
            .map_err(|e| AlertlineError::parse("alert description", e.to_string()))?;

        Ok(entries.into_iter().next().and_then(|entry| entry.body))
    }

    async fn dismiss(&self, thread_id: &str) -> Result<()> {
        let path = format!("/alerts/dismiss_thread/{thread_id}");
        self.get(&path, "dismiss_thread").await?;
        info!(thread_id, "Alert thread dismissed");
        Ok(())
    }

    async fn escalate(&self, alert_id: &str) -> Result<()> {
        let path = format!("/alerts/escalate_alert/{alert_id}/fyi/");
        self.get(&path, "escalate_alert").await?;
        info!(alert_id, "Alert escalated");
        Ok(())
    }

    fn name(&self) -> &str {
        "aurora"
    }
}
