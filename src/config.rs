use url::Url;

use crate::error::ClientError;

pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";
pub const DEFAULT_PLAY_PATH: &str = "/play";

/// Where the game server lives.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub origin: Url,
    pub play_path: String,
}

impl ClientConfig {
    pub fn new(origin: &str) -> Result<Self, ClientError> {
        Ok(Self {
            origin: Url::parse(origin)?,
            play_path: DEFAULT_PLAY_PATH.to_string(),
        })
    }

    pub fn with_play_path(mut self, play_path: impl Into<String>) -> Self {
        self.play_path = play_path.into();
        self
    }

    /// WebSocket address of the play endpoint for `username`.
    /// `http` origins map to `ws`, `https` origins to `wss`.
    pub fn play_url(&self, username: &str) -> Result<Url, ClientError> {
        let scheme = match self.origin.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::InvalidOrigin(format!(
                    "unsupported scheme {}",
                    other
                )));
            }
        };

        let mut url = self.origin.clone();
        url.set_scheme(scheme)
            .map_err(|_| ClientError::InvalidOrigin(self.origin.to_string()))?;
        url.set_path(&self.play_path);
        url.set_fragment(None);
        url.query_pairs_mut().clear().append_pair("uid", username);
        Ok(url)
    }
}
