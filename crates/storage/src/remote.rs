//! Ranged reads of containers served over HTTP.

use crate::BoxSyncRead;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use reqwest::StatusCode;
use reqwest::header::RANGE;
use std::io::Cursor;
use std::time::Duration;

/// Reads byte ranges of remote containers with HTTP `Range` requests.
///
/// Servers that ignore the `Range` header and answer `200 OK` with the whole
/// body are tolerated; the requested slice is cut out locally.
#[derive(Clone)]
pub struct RemoteSource {
    client: reqwest::Client,
}
impl RemoteSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .or_raise(|| ErrorKind::BackendError("could not build HTTP client".to_string()))?;
        Ok(Self { client })
    }

    fn range_header(offset: u64, length: Option<u64>) -> String {
        match length {
            Some(length) => format!("bytes={}-{}", offset, offset.saturating_add(length - 1)),
            None => format!("bytes={offset}-"),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn read_range(&self, url: &str, offset: u64, length: Option<u64>) -> Result<BoxSyncRead> {
        if length == Some(0) {
            return Ok(Box::new(Cursor::new(Vec::new())));
        }
        let response = self
            .client
            .get(url)
            .header(RANGE, Self::range_header(offset, length))
            .send()
            .await
            .map_err(|e| ErrorKind::Network(format!("{url}: {e}")))?;
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => exn::bail!(ErrorKind::NotFound(url.to_string())),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                exn::bail!(ErrorKind::PermissionDenied(url.to_string()))
            },
            status if !status.is_success() => exn::bail!(ErrorKind::Network(format!("{url}: HTTP {status}"))),
            _ => {},
        }
        let body = response.bytes().await.map_err(|e| ErrorKind::Network(format!("{url}: {e}")))?;

        // A 206 body starts at `offset`; a 200 body starts at zero.
        let start = match status {
            StatusCode::PARTIAL_CONTENT => 0,
            _ => offset,
        };
        let available = (body.len() as u64).saturating_sub(start);
        let wanted = length.unwrap_or(available);
        if start > body.len() as u64 || wanted > available {
            exn::bail!(ErrorKind::ShortRead {
                location: url.to_string(),
                offset,
                wanted,
                available,
            });
        }
        let slice = body.slice(start as usize..(start + wanted) as usize);
        tracing::trace!(bytes = slice.len(), %status, "remote range fetched");
        Ok(Box::new(Cursor::new(slice)))
    }
}
