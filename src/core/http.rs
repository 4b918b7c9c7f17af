use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, Url};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

const APP_USER_AGENT: &str = "Project-P1L0T-Launcher";

/// Redirect hops followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 5;

/// Shared client. Redirects are followed by [`get_following_redirects`] so the
/// hop bound is enforced in one place.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .redirect(Policy::none())
        .build()
}

/// GET `url` with an `Accept` header, following at most [`MAX_REDIRECTS`]
/// redirects. Any final non-success status is an error.
pub async fn get_following_redirects(
    client: &Client,
    url: &str,
    accept: &'static str,
) -> LauncherResult<Response> {
    let mut current = Url::parse(url).map_err(|e| LauncherError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let mut hops = 0;

    loop {
        let response = client
            .get(current.clone())
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?;
        let status = response.status();

        if status.is_redirection() {
            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                return Err(LauncherError::DownloadFailed {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            };
            if hops >= MAX_REDIRECTS {
                return Err(LauncherError::TooManyRedirects {
                    url: url.to_string(),
                    limit: MAX_REDIRECTS,
                });
            }
            hops += 1;
            let next = current.join(location).map_err(|e| LauncherError::InvalidUrl {
                url: location.to_string(),
                reason: e.to_string(),
            })?;
            debug!("Redirect {} of {}: {} -> {}", hops, MAX_REDIRECTS, current, next);
            current = next;
            continue;
        }

        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: current.to_string(),
                status: status.as_u16(),
            });
        }

        return Ok(response);
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Minimal HTTP/1.1 responder for exercising redirects and streaming.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `/r/<n>` as a chain of `n` redirects ending in `/file`, `/file`
    /// as `body`, `/release` as `release_json` and anything else as 404.
    pub async fn spawn(body: Vec<u8>, release_json: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let body = body.clone();
                let release_json = release_json.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or("/")
                        .to_string();

                    let response = route(&path, &body, &release_json);
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }

    fn route(path: &str, body: &[u8], release_json: &str) -> Vec<u8> {
        if let Some(rest) = path.strip_prefix("/r/") {
            let remaining: usize = rest.parse().unwrap_or(0);
            let location = if remaining <= 1 {
                "/file".to_string()
            } else {
                format!("/r/{}", remaining - 1)
            };
            return format!(
                "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            )
            .into_bytes();
        }
        if path == "/loop" {
            return b"HTTP/1.1 301 Moved Permanently\r\nLocation: /loop\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
        }
        if path == "/file" {
            let mut out = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .into_bytes();
            out.extend_from_slice(body);
            return out;
        }
        if path == "/release" {
            return format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                release_json.len(),
                release_json
            )
            .into_bytes();
        }
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
    }
}
