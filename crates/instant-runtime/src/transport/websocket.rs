//! Bidirectional socket mechanism, used when the event source is not
//! available. Needs a handshake frame carrying the query after every open.

use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::pagination::mounted_path;

use super::{dispatch_frame, ReconnectPolicy, Reconnector, Transport, TransportKind, TransportSink};

/// `{ws|wss}://host/{prefix}/instantws` for an `http`/`https` base.
pub fn websocket_url(base: &Url) -> Result<Url> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(anyhow!("Unsupported scheme for websocket: {}", other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("Cannot switch {} to {}", base, scheme))?;
    url.set_path(&mounted_path(base, "instantws"));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Swap the secure and insecure variant of the scheme.
pub fn toggle_secure_scheme(url: &Url) -> Url {
    let toggled = match url.scheme() {
        "ws" => "wss",
        "wss" => "ws",
        "http" => "https",
        "https" => "http",
        _ => return url.clone(),
    };
    let mut out = url.clone();
    if out.set_scheme(toggled).is_err() {
        return url.clone();
    }
    out
}

pub fn handshake_payload(term: &str) -> String {
    json!({ "Query": format!("q={}", urlencoding::encode(term)) }).to_string()
}

pub struct WebSocketTransport {
    url: Url,
    policy: ReconnectPolicy,
    task: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    pub fn new(base: &Url, policy: ReconnectPolicy) -> Result<Self> {
        Ok(Self {
            url: websocket_url(base)?,
            policy,
            task: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }

    fn open(&mut self, term: &str, sink: TransportSink) -> Result<()> {
        self.close();
        debug!(url = %self.url, "Opening websocket");
        self.task = Some(tokio::spawn(run_websocket(
            self.url.clone(),
            handshake_payload(term),
            self.policy.clone(),
            sink,
        )));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_websocket(url: Url, handshake: String, policy: ReconnectPolicy, sink: TransportSink) {
    let mut url = url;
    let mut retoggled = false;
    let mut reconnector = Reconnector::new(policy);

    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                // Reopen clears the notice, then runs the regular open
                // handler (the handshake) again.
                if !reconnector.connected(&sink) {
                    return;
                }
                let (mut write, mut read) = stream.split();
                if let Err(e) = write.send(Message::Text(handshake.clone().into())).await {
                    warn!(error = %e, "Websocket handshake failed");
                } else {
                    while let Some(frame) = read.next().await {
                        match frame {
                            Ok(Message::Text(text)) => {
                                if !dispatch_frame(&sink, text.as_str()) {
                                    return;
                                }
                            }
                            Ok(Message::Close(_)) => break,
                            Ok(_) => {}
                            Err(e) => {
                                warn!(error = %e, "Websocket read failed");
                                break;
                            }
                        }
                    }
                    debug!("Websocket closed");
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Websocket connect failed");
                if !retoggled {
                    retoggled = true;
                    url = toggle_secure_scheme(&url);
                    info!(url = %url, "Retrying websocket with toggled scheme");
                    continue;
                }
            }
        }

        if !reconnector.wait(&sink).await {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_from_base() {
        let base = Url::parse("https://codesearch.example.org/search?q=x").unwrap();
        assert_eq!(
            websocket_url(&base).unwrap().as_str(),
            "wss://codesearch.example.org/instantws"
        );
        let base = Url::parse("http://localhost:28080/").unwrap();
        assert_eq!(
            websocket_url(&base).unwrap().as_str(),
            "ws://localhost:28080/instantws"
        );
        let base = Url::parse("https://example.org/codesearch/").unwrap();
        assert_eq!(
            websocket_url(&base).unwrap().as_str(),
            "wss://example.org/codesearch/instantws"
        );
        assert!(websocket_url(&Url::parse("ftp://h/").unwrap()).is_err());
    }

    #[test]
    fn test_toggle_secure_scheme() {
        let url = Url::parse("ws://h/instantws").unwrap();
        let toggled = toggle_secure_scheme(&url);
        assert_eq!(toggled.scheme(), "wss");
        assert_eq!(toggle_secure_scheme(&toggled), url);
    }

    #[test]
    fn test_handshake_payload() {
        let payload: serde_json::Value =
            serde_json::from_str(&handshake_payload("foo bar")).unwrap();
        assert_eq!(payload["Query"], "q=foo%20bar");
    }
}
