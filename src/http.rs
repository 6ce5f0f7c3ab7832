#![forbid(unsafe_code)]

//! Thumbnail downloads over HTTP.

use std::io::Read;
use std::time::Duration;

use crate::error::PipelineError;

/// Largest thumbnail we are willing to buffer.
const MAX_IMAGE_BYTES: u64 = 16 * 1024 * 1024;

pub trait ImageFetcher {
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Blocking client with connect and read timeouts.
pub struct HttpImageFetcher {
    agent: ureq::Agent,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        Self { agent }
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let response = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(404 | 410, _) => PipelineError::NotFound(url.to_string()),
            ureq::Error::Status(code, _) => {
                PipelineError::TransientNetwork(format!("{url}: HTTP {code}"))
            }
            other => PipelineError::TransientNetwork(format!("{url}: {other}")),
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|err| PipelineError::TransientNetwork(format!("{url}: {err}")))?;
        Ok(bytes)
    }
}
