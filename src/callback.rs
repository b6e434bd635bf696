//! Loopback listener that captures the OAuth redirect for the CLI host.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

const SUCCESS_PAGE: &str = r#"
<!doctype html>
<html>
<head><title>Success</title></head>
<body><h1>Authentication Successful!</h1><script>window.close();</script></body>
</html>
"#;

const FAILURE_PAGE: &str = r#"
<!doctype html>
<html>
<head><title>Login failed</title></head>
<body><h1>Authentication Failed</h1><p>{reason}</p><p>Return to the terminal to try again.</p></body>
</html>
"#;

/// A browser request held open until the login outcome is known.
pub struct CallbackRequest {
    pub url: String,
    stream: TcpStream,
}

impl CallbackRequest {
    /// The login completed.
    pub async fn succeed(self) -> Result<()> {
        self.respond("200 OK", SUCCESS_PAGE).await
    }

    /// The callback was rejected; show the reason instead of the success page.
    pub async fn fail(self, reason: &str) -> Result<()> {
        let page = FAILURE_PAGE.replace("{reason}", &escape_html(reason));
        self.respond("400 Bad Request", &page).await
    }

    /// Not an auth callback, e.g. a favicon request.
    pub async fn not_found(self) -> Result<()> {
        self.respond("404 Not Found", "").await
    }

    async fn respond(mut self, status: &str, body: &str) -> Result<()> {
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: text/html; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        self.stream.write_all(response.as_bytes()).await?;
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Bind the redirect URI's host and port before the browser is opened.
pub async fn bind(redirect_uri: &Url) -> Result<TcpListener> {
    let host = redirect_uri
        .host_str()
        .context("Redirect URI has no host")?;
    let port = redirect_uri
        .port_or_known_default()
        .context("Redirect URI has no port")?;

    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to listen on {host}:{port}"))?;
    tracing::debug!(host, port, "Listening for auth callback");
    Ok(listener)
}

/// Accept one browser request. Nothing is sent back until the caller answers
/// through the returned [`CallbackRequest`].
pub async fn accept(listener: &TcpListener, redirect_uri: &Url) -> Result<CallbackRequest> {
    let (mut stream, peer) = listener.accept().await?;
    tracing::debug!(%peer, "Callback connection accepted");

    let mut reader = BufReader::new(&mut stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain the headers so closing the socket does not reset the connection
    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }

    let url = callback_url(redirect_uri, &request_line)?;
    Ok(CallbackRequest { url, stream })
}

/// Rebuild the absolute callback URL from an HTTP request line such as
/// `GET /login?code=abc HTTP/1.1`.
fn callback_url(redirect_uri: &Url, request_line: &str) -> Result<String> {
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        bail!("Malformed callback request: {:?}", request_line.trim());
    };
    if method != "GET" {
        bail!("Unexpected {method} request on callback listener");
    }

    let url = redirect_uri
        .join(target)
        .context("Callback request target is not a valid path")?;
    Ok(url.to_string())
}
