//! reqwest-based client for the iBroadcast JSON and upload endpoints.

use std::time::Duration;

use reqwest::blocking::{multipart, Client, Response};
use serde::Deserialize;
use serde_json::json;

use super::{
    user_agent, CatalogDigests, RemoteCatalog, RemoteError, RemoteService, Session,
    UploadRequest, APP_ID, CLIENT_NAME, CLIENT_VERSION,
};

/// Default JSON API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.ibroadcast.com/s/JSON/";

/// Default upload (and catalog) endpoint.
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.ibroadcast.com";

/// Endpoint and timeout settings for [`HttpRemote`].
#[derive(Debug, Clone)]
pub struct HttpRemoteConfig {
    /// JSON API endpoint (login, status)
    pub api_url: String,
    /// Upload endpoint (catalog, file transfer)
    pub upload_url: String,
    /// Per-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            timeout: None,
        }
    }
}

/// Blocking HTTP implementation of [`RemoteService`].
///
/// The inner client pools connections and is safe to share between the
/// upload workers.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    config: HttpRemoteConfig,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    user: Option<ApiUser>,
    message: Option<String>,
    #[serde(default)]
    supported: Vec<SupportedType>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    #[serde(default)]
    id: serde_json::Value,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupportedType {
    extension: String,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    md5: CatalogDigests,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    result: bool,
}

impl HttpRemote {
    /// Build a client.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] if the TLS backend cannot be initialised.
    pub fn new(config: HttpRemoteConfig) -> Result<Self, RemoteError> {
        // The blocking client defaults to a 30s timeout; `None` disables it.
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
        })
    }

    fn post_json(&self, body: serde_json::Value) -> Result<ApiResponse, RemoteError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .json(&body)
            .send()?;
        Ok(check_status(response)?.json()?)
    }
}

fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RemoteError::Status(status.as_u16()))
    }
}

fn id_to_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RemoteService for HttpRemote {
    fn login(&self, login_token: &str) -> Result<Session, RemoteError> {
        log::debug!("Logging in");
        let response = self.post_json(json!({
            "mode": "login_token",
            "login_token": login_token,
            "app_id": APP_ID,
            "type": "account",
            "version": CLIENT_VERSION,
            "client": CLIENT_NAME,
            "device_name": CLIENT_NAME,
            "user_agent": user_agent(),
        }))?;

        let message = response.message;
        let user = response
            .user
            .ok_or_else(|| RemoteError::Rejected(message.unwrap_or_else(|| "Login failed".into())))?;
        let token = user
            .token
            .ok_or_else(|| RemoteError::Rejected("Login response did not include a token".into()))?;

        let session = Session::new(id_to_string(&user.id), token);
        log::debug!("Login successful - user_id: {}", session.user_id);
        Ok(session)
    }

    fn supported_extensions(&self, session: &Session) -> Result<Vec<String>, RemoteError> {
        log::debug!("Fetching account info");
        let response = self.post_json(json!({
            "mode": "status",
            "user_id": session.user_id,
            "token": session.token,
            "supported_types": 1,
            "version": CLIENT_VERSION,
            "client": CLIENT_NAME,
            "device_name": CLIENT_NAME,
            "user_agent": user_agent(),
        }))?;

        if response.user.is_none() {
            return Err(RemoteError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "Failed to fetch account info".into()),
            ));
        }

        let extensions: Vec<String> = response.supported.into_iter().map(|t| t.extension).collect();
        log::debug!("Account supports {} file types", extensions.len());
        Ok(extensions)
    }

    fn remote_catalog(&self, session: &Session) -> Result<RemoteCatalog, RemoteError> {
        log::debug!("Fetching remote catalog");
        let response = self
            .client
            .post(&self.config.upload_url)
            .form(&[
                ("user_id", session.user_id.as_str()),
                ("token", session.token.as_str()),
            ])
            .send()?;
        let parsed: CatalogResponse = check_status(response)?.json()?;
        let catalog = parsed.md5.into_catalog();
        log::debug!("Remote catalog holds {} digests", catalog.len());
        Ok(catalog)
    }

    fn upload(&self, session: &Session, request: &UploadRequest) -> Result<(), RemoteError> {
        let path = &request.path;
        let file_part = multipart::Part::file(path).map_err(|source| RemoteError::Io {
            path: path.clone(),
            source,
        })?;

        let mut form = multipart::Form::new()
            .text("user_id", session.user_id.clone())
            .text("token", session.token.clone())
            .text("file_path", path.to_string_lossy().into_owned())
            .text("method", CLIENT_NAME);
        if let Some(ref tag) = request.tag {
            form = form.text("tag-name", tag.clone());
        }
        if let Some(ref playlist) = request.playlist {
            form = form.text("playlist-name", playlist.clone());
        }
        let form = form.part("file", file_part);

        let response = self
            .client
            .post(&self.config.upload_url)
            .multipart(form)
            .send()?;
        let parsed: UploadResponse = check_status(response)?.json()?;

        if parsed.result {
            Ok(())
        } else {
            Err(RemoteError::NotAcknowledged(path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::PathBuf;
    use std::thread::{self, JoinHandle};
    use tempfile::TempDir;

    /// Answer a single request with `status` and `body`; the handle yields
    /// the raw request that was received.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request
        });
        (url, handle)
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed before headers");
            raw.extend_from_slice(&chunk[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap());
        let chunked = headers.contains("transfer-encoding: chunked");

        loop {
            let body = &raw[header_end..];
            let done = match content_length {
                Some(len) => body.len() >= len,
                None if chunked => body.ends_with(b"0\r\n\r\n"),
                None => true,
            };
            if done {
                break;
            }
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed before body");
            raw.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn remote_at(url: &str) -> HttpRemote {
        HttpRemote::new(HttpRemoteConfig {
            api_url: url.to_string(),
            upload_url: url.to_string(),
            timeout: Some(Duration::from_secs(10)),
        })
        .unwrap()
    }

    fn track(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("track.mp3");
        std::fs::write(&path, b"audio").unwrap();
        path
    }

    fn request(path: PathBuf, tag: Option<&str>) -> UploadRequest {
        UploadRequest {
            path,
            tag: tag.map(str::to_string),
            playlist: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = HttpRemoteConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.upload_url, DEFAULT_UPLOAD_URL);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_id_to_string() {
        assert_eq!(id_to_string(&json!(1234)), "1234");
        assert_eq!(id_to_string(&json!("abc")), "abc");
    }

    #[test]
    fn test_parse_login_response() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"user": {"id": 42, "token": "t0k"}, "result": true}"#).unwrap();
        let user = parsed.user.unwrap();
        assert_eq!(id_to_string(&user.id), "42");
        assert_eq!(user.token.as_deref(), Some("t0k"));
    }

    #[test]
    fn test_parse_rejected_response() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"result": false, "message": "Invalid token"}"#).unwrap();
        assert!(parsed.user.is_none());
        assert_eq!(parsed.message.as_deref(), Some("Invalid token"));
    }

    #[test]
    fn test_parse_status_response() {
        let parsed: ApiResponse = serde_json::from_str(
            r#"{"user": {"id": "7"}, "supported": [{"extension": ".mp3", "type": "audio"}, {"extension": ".flac"}]}"#,
        )
        .unwrap();
        let exts: Vec<_> = parsed.supported.into_iter().map(|t| t.extension).collect();
        assert_eq!(exts, vec![".mp3", ".flac"]);
    }

    #[test]
    fn test_parse_upload_response() {
        let ok: UploadResponse = serde_json::from_str(r#"{"result": true}"#).unwrap();
        assert!(ok.result);
        let missing: UploadResponse = serde_json::from_str(r#"{"message": "oops"}"#).unwrap();
        assert!(!missing.result);
    }

    #[test]
    fn test_parse_catalog_response() {
        let parsed: CatalogResponse =
            serde_json::from_str(r#"{"md5": ["5eb63bbbe01eeed093cb22bb8f5acdc3"]}"#).unwrap();
        assert_eq!(parsed.md5.into_catalog().len(), 1);

        let empty: CatalogResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.md5.into_catalog().is_empty());
    }

    #[test]
    fn test_upload_bad_status_fails() {
        let dir = TempDir::new().unwrap();
        let (url, server) = serve_once("500 Internal Server Error", "");

        let err = remote_at(&url)
            .upload(&Session::new("1", "t"), &request(track(&dir), None))
            .unwrap_err();

        assert!(matches!(err, RemoteError::Status(500)));
        server.join().unwrap();
    }

    #[test]
    fn test_upload_not_acknowledged_fails() {
        let dir = TempDir::new().unwrap();
        let path = track(&dir);
        let (url, server) = serve_once("200 OK", r#"{"result":false}"#);

        let err = remote_at(&url)
            .upload(&Session::new("1", "t"), &request(path.clone(), None))
            .unwrap_err();

        assert!(matches!(err, RemoteError::NotAcknowledged(ref p) if *p == path));
        server.join().unwrap();
    }

    #[test]
    fn test_upload_without_tag_omits_tag_field() {
        let dir = TempDir::new().unwrap();
        let (url, server) = serve_once("200 OK", r#"{"result":true}"#);

        remote_at(&url)
            .upload(&Session::new("1", "t"), &request(track(&dir), None))
            .unwrap();

        let sent = server.join().unwrap();
        assert!(sent.contains(r#"name="file_path""#));
        assert!(sent.contains(r#"name="file""#));
        assert!(!sent.contains("tag-name"));
        assert!(!sent.contains("playlist-name"));
    }

    #[test]
    fn test_upload_with_tag_sends_tag_field() {
        let dir = TempDir::new().unwrap();
        let (url, server) = serve_once("200 OK", r#"{"result":true}"#);

        remote_at(&url)
            .upload(&Session::new("1", "t"), &request(track(&dir), Some("live")))
            .unwrap();

        let sent = server.join().unwrap();
        assert!(sent.contains(r#"name="tag-name""#));
        assert!(!sent.contains("playlist-name"));
    }

    #[test]
    fn test_client_builds_with_timeout() {
        let config = HttpRemoteConfig {
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        assert!(HttpRemote::new(config).is_ok());
    }
}
