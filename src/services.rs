use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::gemini::{FileState, RemoteFile, VideoModel};
use crate::upload::ScratchFile;

pub const SUMMARY_PROMPT: &str = "Summarize this video. Then, based on the information in the video, create a quiz with 3 questions and answers.";

/// How long to wait between readiness checks, and how many checks to allow.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

/// Re-fetches `file` until it leaves `PROCESSING`, sleeping `policy.interval`
/// before each fetch. Only `ACTIVE` is returned; every other final state is an error.
pub async fn wait_until_active(
    model: &dyn VideoModel,
    mut file: RemoteFile,
    policy: PollPolicy,
) -> Result<RemoteFile> {
    let mut polls = 0;
    while file.state == FileState::Processing {
        if polls >= policy.max_polls {
            bail!("file '{}' still PROCESSING after {} polls", file.name, polls);
        }
        info!("File state: {}, waiting {:?}...", file.state, policy.interval);
        tokio::time::sleep(policy.interval).await;

        file = model
            .get_file(&file.name)
            .await
            .with_context(|| format!("polling file '{}'", file.name))?;
        polls += 1;
    }

    match file.state {
        FileState::Active => Ok(file),
        FileState::Failed => bail!("file '{}' failed processing", file.name),
        ref state => bail!("file '{}' is not ready, state: {}", file.name, state),
    }
}

/// Uploads the scratch file, waits for it to become usable and asks the model
/// for a summary and quiz. The remote handle is stored in `uploaded` as soon as
/// the upload succeeds so the caller can delete it whatever happens next.
pub async fn summarize_video(
    model: &dyn VideoModel,
    scratch: &ScratchFile,
    policy: PollPolicy,
    uploaded: &mut Option<RemoteFile>,
) -> Result<String> {
    info!("Uploading {} to the model service...", scratch.display_name());
    let file = model
        .upload_file(
            scratch.path(),
            scratch.display_name(),
            scratch.format().mime_type(),
        )
        .await
        .context("uploading video")?;
    info!("Upload complete, resource name: {} (URI: {})", file.name, file.uri);
    *uploaded = Some(file.clone());

    let file = wait_until_active(model, file, policy).await?;
    info!("File '{}' is active, generating content...", file.name);

    let text = model
        .generate_content(&file, SUMMARY_PROMPT)
        .await
        .context("generating content")?;
    info!("Content generated ({} chars)", text.len());
    Ok(text)
}

/// Removes the local scratch file, then the remote copy if one was created.
/// Failures are logged and never returned.
pub async fn cleanup(model: &dyn VideoModel, scratch: ScratchFile, uploaded: Option<RemoteFile>) {
    match scratch.remove() {
        Ok(path) => info!("Deleted local scratch file: {:?}", path),
        Err(e) => warn!(error = %e, "Failed to delete local scratch file"),
    }

    if let Some(file) = uploaded {
        match model.delete_file(&file.name).await {
            Ok(()) => info!("Deleted remote file: {}", file.name),
            Err(e) => warn!(error = %e, "Failed to delete remote file {}", file.name),
        }
    }
}
