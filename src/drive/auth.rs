//! OAuth2 bootstrap for the Drive API
//!
//! Reads the Google Cloud `credentials.json`, runs the consent flow when no
//! usable token is stored, persists the token next to the config, and hands
//! out fresh access tokens to the Drive client.
//!
//! ## Flows
//!
//! ```text
//! redirect = urn:ietf:wg:oauth:2.0:oob   print URL, user pastes the code
//! redirect = http://localhost:<port>     loopback listener captures ?code=
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::cancel::CancelFlag;
use crate::console::{self, Input};
use crate::error::DriveError;
use crate::http_client::auth_client;

/// Full Drive access: the organizer moves and renames arbitrary files
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const LOOPBACK_REDIRECT: &str = "http://localhost:8080";
const OOB_REDIRECTS: [&str; 2] = ["urn:ietf:wg:oauth:2.0:oob", "oob"];
const STATE: &str = "drive-organizer";

/// How long the loopback listener waits for the browser redirect
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Refresh access tokens that expire within this window
const REFRESH_MARGIN_SECS: i64 = 60;

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Authorization complete</title></head>\
<body style=\"font-family: sans-serif; text-align: center; margin-top: 15%\">\
<h1>Authorization complete</h1><p>You can close this window and return to the terminal.</p></body></html>";

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

/// OAuth client registration resolved from `credentials.json`
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
}

impl OAuthClient {
    /// Parse the contents of a Cloud Console `credentials.json`.
    ///
    /// Desktop (`installed`) clients keep their first registered redirect;
    /// `web` clients always use the loopback listener on port 8080.
    pub fn from_credentials_json(text: &str) -> Result<Self, DriveError> {
        let file: CredentialsFile = serde_json::from_str(text)
            .map_err(|e| DriveError::Auth(format!("Invalid credentials file: {}", e)))?;

        let (secret, redirect_uri) = match (file.installed, file.web) {
            (Some(installed), _) => {
                let redirect = installed
                    .redirect_uris
                    .first()
                    .cloned()
                    .unwrap_or_else(|| LOOPBACK_REDIRECT.to_string());
                (installed, redirect)
            }
            (None, Some(web)) => {
                let redirect = web
                    .redirect_uris
                    .iter()
                    .find(|r| r.trim_end_matches('/') == LOOPBACK_REDIRECT)
                    .cloned()
                    .unwrap_or_else(|| LOOPBACK_REDIRECT.to_string());
                (web, redirect)
            }
            (None, None) => {
                return Err(DriveError::Auth(
                    "Credentials file has neither an 'installed' nor a 'web' client".to_string(),
                ))
            }
        };

        Ok(Self {
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            auth_uri: secret.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: secret.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            redirect_uri,
        })
    }

    pub fn load(path: &Path) -> Result<Self, DriveError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DriveError::Auth(format!(
                "Cannot read credentials at {}: {}\n\nDownload credentials.json from the Google Cloud Console:\nhttps://console.cloud.google.com/apis/credentials",
                path.display(),
                e
            ))
        })?;
        Self::from_credentials_json(&text)
    }

    /// Out-of-band clients need the user to paste the code by hand
    pub fn is_manual_flow(&self) -> bool {
        OOB_REDIRECTS.contains(&self.redirect_uri.as_str())
    }

    /// Consent URL requesting offline access to the full Drive scope
    pub fn authorization_url(&self, force_consent: bool) -> Result<String, DriveError> {
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("state", STATE),
        ];
        if force_consent {
            params.push(("prompt", "consent"));
        }
        reqwest::Url::parse_with_params(&self.auth_uri, &params)
            .map(String::from)
            .map_err(|e| DriveError::Auth(format!("Invalid auth URI '{}': {}", self.auth_uri, e)))
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredToken, DriveError> {
        let response = self
            .token_request(&[
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", &self.redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .await?;
        Ok(StoredToken::from_response(response, None, Utc::now()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken, DriveError> {
        let response = self
            .token_request(&[
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        Ok(StoredToken::from_response(response, Some(refresh_token), Utc::now()))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, DriveError> {
        let resp = auth_client()
            .post(&self.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| DriveError::from_transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DriveError::Auth(format!("Token endpoint returned {}: {}", status, body)));
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| DriveError::Decode(format!("token response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Token as persisted in `token.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredToken {
    /// Build from a token endpoint response. Refresh responses usually omit
    /// the refresh token, so the previous one is carried over.
    fn from_response(resp: TokenResponse, previous_refresh: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            access_token: resp.access_token,
            token_type: resp.token_type.unwrap_or_else(default_token_type),
            refresh_token: resp
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expiry: resp.expires_in.map(|secs| now + ChronoDuration::seconds(secs)),
        }
    }

    /// True when the access token is expired or about to be
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - now < ChronoDuration::seconds(REFRESH_MARGIN_SECS),
            None => false,
        }
    }
}

/// Load a stored token; a missing file is `Ok(None)`
pub fn load_token(path: &Path) -> Result<Option<StoredToken>, DriveError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&text) {
        Ok(token) => Ok(Some(token)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Stored token is unreadable, re-authorizing");
            Ok(None)
        }
    }
}

/// Persist `token` readable by the owner only
pub fn save_token(path: &Path, token: &StoredToken) -> Result<(), DriveError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(token)
        .map_err(|e| DriveError::Decode(format!("token serialization: {}", e)))?;
    write_private(path, json.as_bytes())?;
    tracing::debug!(path = %path.display(), "Token saved");
    Ok(())
}

/// Write a file with 0600 permissions on unix
pub fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(contents)
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, contents)
    }
}

/// Hands out valid access tokens, refreshing and re-persisting as needed
pub struct TokenSource {
    client: OAuthClient,
    token: Mutex<StoredToken>,
    path: PathBuf,
}

impl TokenSource {
    pub async fn access_token(&self) -> Result<String, DriveError> {
        let mut token = self.token.lock().await;
        if token.needs_refresh(Utc::now()) {
            let refresh = token
                .refresh_token
                .clone()
                .ok_or_else(|| DriveError::Auth("Access token expired and no refresh token is stored".to_string()))?;
            tracing::debug!("Refreshing Drive access token");
            let fresh = self.client.refresh(&refresh).await?;
            if let Err(e) = save_token(&self.path, &fresh) {
                tracing::warn!(error = %e, "Could not persist refreshed token");
            }
            *token = fresh;
        }
        Ok(token.access_token.clone())
    }
}

/// Load credentials and a stored token, running the consent flow when
/// there is no token, when it has no refresh token, or when `force` is set.
pub async fn authorize(
    credentials_path: &Path,
    token_path: &Path,
    force: bool,
    cancel: &CancelFlag,
) -> Result<TokenSource, DriveError> {
    let client = OAuthClient::load(credentials_path)?;

    let stored = if force { None } else { load_token(token_path)? };
    let token = match stored {
        Some(token) if token.refresh_token.is_some() => token,
        Some(_) => {
            tracing::warn!("Stored token has no refresh token, asking for consent again");
            obtain_token(&client, token_path, true, cancel).await?
        }
        None => obtain_token(&client, token_path, force, cancel).await?,
    };

    tracing::info!("Google Drive authorization ready");
    Ok(TokenSource {
        client,
        token: Mutex::new(token),
        path: token_path.to_path_buf(),
    })
}

async fn obtain_token(
    client: &OAuthClient,
    token_path: &Path,
    force_consent: bool,
    cancel: &CancelFlag,
) -> Result<StoredToken, DriveError> {
    let code = if client.is_manual_flow() {
        manual_code(client, force_consent, cancel).await?
    } else {
        loopback_code(client, force_consent, cancel).await?
    };

    println!("  Authorization received, fetching token...");
    let token = client.exchange_code(&code).await?;
    if let Err(e) = save_token(token_path, &token) {
        tracing::warn!(error = %e, "Could not save token");
    }
    println!("  Token obtained.\n");
    Ok(token)
}

async fn manual_code(client: &OAuthClient, force_consent: bool, cancel: &CancelFlag) -> Result<String, DriveError> {
    let url = client.authorization_url(force_consent)?;
    println!("\nGoogle Drive authorization\n");
    println!("  Open this link in your browser:");
    println!("  {}\n", url);

    match console::read_line("  Paste the authorization code here: ", cancel).await? {
        Input::Line(code) if !code.trim().is_empty() => Ok(code.trim().to_string()),
        Input::Cancelled => Err(DriveError::Cancelled),
        _ => Err(DriveError::Auth("No authorization code entered".to_string())),
    }
}

async fn loopback_code(client: &OAuthClient, force_consent: bool, cancel: &CancelFlag) -> Result<String, DriveError> {
    let port = reqwest::Url::parse(&client.redirect_uri)
        .ok()
        .and_then(|u| u.port_or_known_default())
        .unwrap_or(8080);
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;

    let url = client.authorization_url(force_consent)?;
    println!("\nGoogle Drive authorization\n");
    println!("  Opening the browser for authorization...");
    println!("  If it does not open, visit:");
    println!("  {}\n", url);
    println!("  Waiting for authorization...");
    open_browser(&url);

    let wait = async {
        loop {
            let (stream, _) = listener.accept().await?;
            match handle_callback(stream).await? {
                Some(code) => return Ok::<String, DriveError>(code),
                // Browsers also ask for /favicon.ico and the like
                None => continue,
            }
        }
    };

    tokio::select! {
        result = tokio::time::timeout(CALLBACK_TIMEOUT, wait) => match result {
            Ok(code) => code,
            Err(_) => Err(DriveError::Auth("Timed out waiting for authorization (5 minutes)".to_string())),
        },
        _ = cancel.cancelled() => Err(DriveError::Cancelled),
    }
}

/// Serve one loopback request. `Ok(None)` for requests that carry no OAuth result.
async fn handle_callback(stream: tokio::net::TcpStream) -> Result<Option<String>, DriveError> {
    let (read, mut write) = stream.into_split();
    let mut request_line = String::new();
    BufReader::new(read).read_line(&mut request_line).await?;

    let result = parse_callback(&request_line);
    let (status, body) = match &result {
        Ok(Some(_)) => ("200 OK", SUCCESS_PAGE.to_string()),
        Ok(None) => ("404 Not Found", String::new()),
        Err(e) => ("400 Bad Request", e.to_string()),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    write.write_all(response.as_bytes()).await?;
    let _ = write.shutdown().await;
    result
}

/// Extract the authorization code from an HTTP request line such as
/// `GET /?state=..&code=4/abc HTTP/1.1`
pub fn parse_callback(request_line: &str) -> Result<Option<String>, DriveError> {
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let url = reqwest::Url::parse(&format!("http://localhost{}", target))
        .map_err(|e| DriveError::Auth(format!("Malformed callback request: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(DriveError::Auth(format!("Authorization denied: {}", value))),
            _ => {}
        }
    }

    match (code, state) {
        (Some(_), Some(s)) if s != STATE => Err(DriveError::Auth("Authorization state mismatch".to_string())),
        (Some(code), _) if !code.is_empty() => Ok(Some(code)),
        _ => Ok(None),
    }
}

fn open_browser(url: &str) {
    let result = if cfg!(target_os = "windows") {
        std::process::Command::new("cmd").args(["/c", "start", "", url]).spawn()
    } else if cfg!(target_os = "macos") {
        std::process::Command::new("open").arg(url).spawn()
    } else {
        std::process::Command::new("xdg-open").arg(url).spawn()
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "Could not open the browser automatically");
    }
}
