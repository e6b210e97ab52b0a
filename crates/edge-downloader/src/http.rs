//! Shared ranged-GET-with-resume transport (spec §4.2, §9: a ranged GET is
//! the contract every HTTP-backed downloader variant relies on for resume).

use std::path::Path;

use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::error::DownloaderError;

/// Authentication to attach to a registry/repository request.
#[derive(Clone, Debug)]
pub enum Auth {
    Bearer(String),
    Basic { username: String, password: String },
}

impl Auth {
    fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
        }
    }
}

/// Downloads `url` into `path`, resuming from the last successfully-written
/// byte when the remote honors `Range`. On a `416` (the local file is stale
/// relative to what the remote now serves) the local copy is discarded and
/// the download restarts once from byte zero.
pub async fn ranged_download(client: &reqwest::Client, url: &str, path: &Path, auth: Option<&Auth>) -> Result<(), DownloaderError> {
    for attempt in 0..2 {
        let existing_len = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);

        let mut request = client.get(url);
        if let Some(auth) = auth {
            request = auth.apply(request);
        }
        if existing_len > 0 {
            request = request.header(RANGE, format!("bytes={existing_len}-"));
        }

        let response = request.send().await.map_err(|source| DownloaderError::Transport { uri: url.to_string(), source })?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            let _ = tokio::fs::remove_file(path).await;
            if attempt == 0 {
                continue;
            }
            return Err(DownloaderError::ServiceUnavailable { uri: url.to_string(), status: status.as_u16() });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DownloaderError::Authentication { uri: url.to_string(), status: status.as_u16() });
        }
        if status.is_server_error() {
            return Err(DownloaderError::ServiceUnavailable { uri: url.to_string(), status: status.as_u16() });
        }
        if !status.is_success() {
            return Err(DownloaderError::ServiceUnavailable { uri: url.to_string(), status: status.as_u16() });
        }

        // The remote content length, validated against what's already on
        // disk before we append to it (spec §4.2: "partial files ... are
        // validated length-prefix against the remote content length before
        // resumption").
        let resumed = status == StatusCode::PARTIAL_CONTENT && existing_len > 0;
        if existing_len > 0 && !resumed {
            // Remote doesn't honor Range; our partial copy can't be trusted as a prefix.
            let _ = tokio::fs::remove_file(path).await;
        }

        let mut file = if resumed {
            tokio::fs::OpenOptions::new().append(true).open(path).await
        } else {
            tokio::fs::File::create(path).await
        }
        .map_err(|source| DownloaderError::Io { path: path.display().to_string(), source })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| DownloaderError::Transport { uri: url.to_string(), source })?;
            file.write_all(&chunk).await.map_err(|source| DownloaderError::Io { path: path.display().to_string(), source })?;
        }
        file.flush().await.map_err(|source| DownloaderError::Io { path: path.display().to_string(), source })?;
        return Ok(());
    }
    unreachable!("loop always returns within two attempts")
}

pub async fn content_length(client: &reqwest::Client, url: &str, auth: Option<&Auth>) -> Result<u64, DownloaderError> {
    let mut request = client.head(url);
    if let Some(auth) = auth {
        request = auth.apply(request);
    }
    let response = request.send().await.map_err(|source| DownloaderError::Transport { uri: url.to_string(), source })?;
    if !response.status().is_success() {
        return Err(DownloaderError::ServiceUnavailable { uri: url.to_string(), status: response.status().as_u16() });
    }
    Ok(response.content_length().unwrap_or(0))
}
