//! Server-sent events mechanism. The query term is part of the request
//! path, so no handshake is needed.

use std::time::Duration;

use anyhow::{Context, Result};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::{dispatch_frame, ReconnectPolicy, Reconnector, Transport, TransportKind, TransportSink};

pub fn event_url(base: &Url, term: &str) -> Result<Url> {
    base.join(&format!("events/{}", urlencoding::encode(term)))
        .context("Failed to build event stream URL")
}

pub struct EventSourceTransport {
    client: Client,
    base: Url,
    policy: ReconnectPolicy,
    task: Option<JoinHandle<()>>,
}

impl EventSourceTransport {
    pub fn new(base: Url, policy: ReconnectPolicy) -> Result<Self> {
        // No overall timeout: the stream stays open for the whole query.
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base,
            policy,
            task: None,
        })
    }
}

impl Transport for EventSourceTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::EventSource
    }

    fn open(&mut self, term: &str, sink: TransportSink) -> Result<()> {
        self.close();
        let url = event_url(&self.base, term)?;
        debug!(url = %url, "Opening event stream");
        self.task = Some(tokio::spawn(run_event_source(
            self.client.clone(),
            url,
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

impl Drop for EventSourceTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_event_source(client: Client, url: Url, policy: ReconnectPolicy, sink: TransportSink) {
    let mut reconnector = Reconnector::new(policy);

    loop {
        let request = client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await;

        match request {
            Ok(response) if response.status().is_success() => {
                if !reconnector.connected(&sink) {
                    return;
                }
                let mut events = response.bytes_stream().eventsource();
                while let Some(event) = events.next().await {
                    match event {
                        Ok(event) => {
                            if event.data.is_empty() {
                                continue;
                            }
                            if !dispatch_frame(&sink, &event.data) {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Event stream read failed");
                            break;
                        }
                    }
                }
                debug!("Event stream closed by server");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Event stream request refused");
            }
            Err(e) => {
                warn!(error = %e, "Event stream connect failed");
            }
        }

        if !reconnector.wait(&sink).await {
            return;
        }
    }
}
