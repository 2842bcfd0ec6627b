//! Executors that move bytes through the request gateway.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Method;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use fleetdesk_gateway::{Envelope, RequestGateway, RequestOptions};
use fleetdesk_protocols::TransferError;

use crate::queue::TransferContext;

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Stream `endpoint` into `dest`, reporting progress on `ctx`.
///
/// Bytes land in `<dest>.part` first and are renamed into place only after
/// the whole body arrived, so `dest` never holds a partial file. Returns the
/// number of bytes written.
pub async fn download_to_path(
    gateway: &RequestGateway,
    endpoint: &str,
    dest: &Path,
    ctx: &TransferContext,
) -> Result<u64, TransferError> {
    let response = gateway
        .open_stream(endpoint)
        .await
        .map_err(|e| TransferError::Executor(e.to_string()))?;
    let total = response.content_length();

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let part = part_path(dest);
    let written = match write_body(response, &part, total, ctx).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&part).await {
                warn!("Could not remove {}: {}", part.display(), cleanup);
            }
            return Err(e);
        }
    };

    fs::rename(&part, dest).await?;
    debug!("Downloaded {} bytes to {}", written, dest.display());
    Ok(written)
}

async fn write_body(
    response: reqwest::Response,
    part: &Path,
    total: Option<u64>,
    ctx: &TransferContext,
) -> Result<u64, TransferError> {
    let mut file = fs::File::create(part).await?;
    let mut body = response.bytes_stream();
    let mut done = 0u64;
    ctx.report_progress(done, total);

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| TransferError::Executor(format!("download interrupted: {}", e)))?;
        file.write_all(&chunk).await?;
        done += chunk.len() as u64;
        ctx.report_progress(done, total);
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(done)
}

/// POST the file at `source` to `endpoint` as an octet stream.
pub async fn upload_from_path(
    gateway: &RequestGateway,
    endpoint: &str,
    source: &Path,
    ctx: &TransferContext,
) -> Result<Envelope, TransferError> {
    let data = fs::read(source).await?;
    let total = data.len() as u64;
    ctx.report_progress(0, Some(total));

    let envelope = gateway
        .send_bytes(
            Method::POST,
            endpoint,
            data,
            "application/octet-stream",
            RequestOptions::default(),
        )
        .await
        .map_err(|e| TransferError::Executor(e.to_string()))?;

    ctx.report_progress(total, Some(total));
    debug!("Uploaded {} bytes from {}", total, source.display());
    Ok(envelope)
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
