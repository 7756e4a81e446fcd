use powledger_core::{ChainSnapshot, PeerClient, PeerError};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetches peer snapshots from `GET <peer>/blockchain`.
#[derive(Clone, Debug)]
pub struct HttpPeerClient {
    http: Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

/// Peers are registered as `host:port` or as a full base URL.
pub fn snapshot_url(peer: &str) -> String {
    let base = peer.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}/blockchain")
    } else {
        format!("http://{base}/blockchain")
    }
}

impl PeerClient for HttpPeerClient {
    async fn fetch_snapshot(&self, peer: &str) -> Result<ChainSnapshot, PeerError> {
        let url = snapshot_url(peer);
        debug!(%url, "fetching peer snapshot");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| PeerError::Unreachable {
                peer: peer.to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PeerError::Status {
                peer: peer.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<ChainSnapshot>()
            .await
            .map_err(|err| PeerError::Malformed {
                peer: peer.to_string(),
                reason: err.to_string(),
            })
    }
}
