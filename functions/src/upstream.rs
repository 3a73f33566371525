use std::{io, time::Duration};

use crate::error::HandlerError;

/// One outbound HTTP agent for the whole process.
///
/// `ureq::Agent` keeps idle keep-alive connections per host, so every
/// clone handed to a request shares the same connection pool.
#[derive(Clone)]
pub struct PooledClient {
    agent: ureq::Agent,
}

impl PooledClient {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Self { agent }
    }

    /// GETs `url` on a blocking thread. Anything other than `200 OK` is
    /// reported as [`HandlerError::UpstreamBadStatus`].
    pub async fn get_ok(&self, url: &str) -> Result<(), HandlerError> {
        let agent = self.agent.clone();
        let url = url.to_owned();

        let status = tokio::task::spawn_blocking(move || get_status(&agent, &url))
            .await
            .map_err(|err| HandlerError::UpstreamError(err.to_string()))??;

        if status != 200 {
            return Err(HandlerError::UpstreamBadStatus(status));
        }

        Ok(())
    }
}

fn get_status(agent: &ureq::Agent, url: &str) -> Result<u16, HandlerError> {
    match agent.get(url).call() {
        Ok(response) => {
            let status = response.status();
            // the connection only goes back to the pool once the body is drained
            io::copy(&mut response.into_reader(), &mut io::sink())
                .map_err(|err| HandlerError::UpstreamError(err.to_string()))?;
            Ok(status)
        }
        Err(ureq::Error::Status(status, _)) => Ok(status),
        Err(err) => Err(HandlerError::UpstreamError(err.to_string())),
    }
}
