use ice::url::{SchemeType, Url};
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

/// A STUN or TURN server the ICE agent may use to gather candidates.
///
/// * [W3C RTCIceServer](https://w3c.github.io/webrtc-pc/#rtciceserver-dictionary)
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCIceServer {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

impl RTCIceServer {
    /// Parses every url. TURN urls take the server's username and credential
    /// and fail without them.
    pub(crate) fn urls(&self) -> Result<Vec<Url>> {
        let mut urls = Vec::with_capacity(self.urls.len());

        for url_str in &self.urls {
            let mut url = Url::parse_url(&strip_query(url_str))?;
            if url.scheme == SchemeType::Turn || url.scheme == SchemeType::Turns {
                if self.username.is_empty() || self.credential.is_empty() {
                    return Err(Error::ErrNoTurnCredentials);
                }
                url.username.clone_from(&self.username);
                url.password.clone_from(&self.credential);
            }
            urls.push(url);
        }

        Ok(urls)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.urls()?;
        Ok(())
    }
}

/// STUN urls never carry a query, but browsers accept "?transport=udp" on them.
pub(crate) fn strip_query(url: &str) -> String {
    if url.starts_with("stun") {
        if let Some((base, _)) = url.split_once('?') {
            return base.to_owned();
        }
    }
    url.to_owned()
}
