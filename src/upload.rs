//! Reading, validating and persisting the uploaded video.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::extract::Multipart;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "videoFile";

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Accepted video containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Mp4,
    Mov,
    Avi,
    Mkv,
    Webm,
}

impl VideoFormat {
    /// Format named by the extension after the last `.`, case-insensitively.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "mp4" => Some(VideoFormat::Mp4),
            "mov" => Some(VideoFormat::Mov),
            "avi" => Some(VideoFormat::Avi),
            "mkv" => Some(VideoFormat::Mkv),
            "webm" => Some(VideoFormat::Webm),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mov => "mov",
            VideoFormat::Avi => "avi",
            VideoFormat::Mkv => "mkv",
            VideoFormat::Webm => "webm",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "video/mp4",
            VideoFormat::Mov => "video/quicktime",
            VideoFormat::Avi => "video/x-msvideo",
            VideoFormat::Mkv => "video/x-matroska",
            VideoFormat::Webm => "video/webm",
        }
    }
}

pub fn validate_filename(filename: &str) -> ApiResult<VideoFormat> {
    if filename.is_empty() {
        return Err(ApiError::NoFileSelected);
    }
    VideoFormat::from_filename(filename).ok_or(ApiError::FileTypeNotAllowed)
}

/// Finds the `videoFile` file part, validates its filename and streams the body
/// into a fresh scratch file under `upload_dir`.
///
/// Parts without a `filename` are plain form fields and never count as the
/// video. Nothing touches the disk until the filename has passed validation.
pub async fn receive_video(
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> ApiResult<ScratchFile> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let format = validate_filename(&filename)?;

        let (scratch, mut file) =
            ScratchFile::create(upload_dir, &filename, format).map_err(ApiError::Processing)?;

        let mut written = 0;
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("writing {}", scratch.path().display()))
                .map_err(ApiError::Processing)?;
            written += chunk.len();
        }
        file.flush()
            .await
            .with_context(|| format!("writing {}", scratch.path().display()))
            .map_err(ApiError::Processing)?;

        info!("Saved {} ({} bytes) to: {:?}", filename, written, scratch.path());
        return Ok(scratch);
    }
    Err(ApiError::MissingFile)
}

/// Reduces a client-supplied filename to a plain ASCII name that cannot leave
/// the directory it is joined onto. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename.chars().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.contains(&stem.to_ascii_uppercase().as_str()) {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Request-scoped local copy of the upload. The file is removed when this is
/// dropped; [`ScratchFile::remove`] does the same but reports the outcome.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
    display_name: String,
    format: VideoFormat,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    /// Creates an empty scratch file with a per-request unique name built around
    /// the sanitized filename, returning it with an open handle for writing.
    pub fn create(
        upload_dir: &Path,
        filename: &str,
        format: VideoFormat,
    ) -> Result<(Self, tokio::fs::File)> {
        let mut safe_name = secure_filename(filename);
        if safe_name.is_empty() {
            safe_name = format!("video.{}", format.extension());
        }

        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&format!("-{}", safe_name))
            .tempfile_in(upload_dir)
            .with_context(|| format!("creating scratch file in {}", upload_dir.display()))?
            .into_parts();

        let scratch = Self {
            path,
            display_name: filename.to_string(),
            format,
        };
        Ok((scratch, tokio::fs::File::from_std(file)))
    }

    /// Deletes the file. A file that is already gone counts as removed.
    pub fn remove(self) -> io::Result<PathBuf> {
        let path = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(path),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_extensions_are_case_insensitive() {
        assert_eq!(VideoFormat::from_filename("clip.mp4"), Some(VideoFormat::Mp4));
        assert_eq!(VideoFormat::from_filename("CLIP.MOV"), Some(VideoFormat::Mov));
        assert_eq!(VideoFormat::from_filename("a.b.WebM"), Some(VideoFormat::Webm));
        assert_eq!(VideoFormat::from_filename("x.Mkv"), Some(VideoFormat::Mkv));
        assert_eq!(VideoFormat::from_filename("x.avi"), Some(VideoFormat::Avi));
    }

    #[test]
    fn rejects_missing_or_unknown_extensions() {
        for name in ["video", "video.", "notes.txt", "movie.mp4.exe", "mp4"] {
            assert!(
                matches!(validate_filename(name), Err(ApiError::FileTypeNotAllowed)),
                "{name} should be rejected"
            );
        }
        assert!(matches!(validate_filename(""), Err(ApiError::NoFileSelected)));
    }

    #[test]
    fn mime_types_follow_the_container() {
        assert_eq!(VideoFormat::Mp4.mime_type(), "video/mp4");
        assert_eq!(VideoFormat::Mov.mime_type(), "video/quicktime");
        assert_eq!(VideoFormat::Webm.mime_type(), "video/webm");
    }

    #[test]
    fn secure_filename_strips_paths_and_unsafe_characters() {
        assert_eq!(secure_filename("My cool movie.mp4"), "My_cool_movie.mp4");
        assert_eq!(secure_filename("../../../etc/passwd.mp4"), "etc_passwd.mp4");
        assert_eq!(secure_filename("..\\..\\win\\clip.mov"), "win_clip.mov");
        assert_eq!(secure_filename("rm -rf $(x).mkv"), "rm_-rf_x.mkv");
        assert_eq!(secure_filename("vidéo.webm"), "vido.webm");
        assert_eq!(secure_filename("con.mp4"), "_con.mp4");
        assert_eq!(secure_filename("../"), "");
    }

    #[tokio::test]
    async fn scratch_files_are_unique_and_removable() {
        let dir = tempfile::tempdir().unwrap();

        let (first, mut handle) =
            ScratchFile::create(dir.path(), "sample.mp4", VideoFormat::Mp4).unwrap();
        handle.write_all(b"fake video").await.unwrap();
        handle.flush().await.unwrap();
        let (second, _) =
            ScratchFile::create(dir.path(), "sample.mp4", VideoFormat::Mp4).unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(dir.path()));
        let name = first.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("upload-") && name.ends_with("-sample.mp4"));
        assert_eq!(std::fs::read(first.path()).unwrap(), b"fake video");
        assert_eq!(first.display_name(), "sample.mp4");
        assert_eq!(first.format(), VideoFormat::Mp4);

        let removed = first.remove().unwrap();
        assert!(!removed.exists());

        let second_path = second.path().to_path_buf();
        drop(second);
        assert!(!second_path.exists());
    }

    #[tokio::test]
    async fn unusable_names_fall_back_to_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (scratch, _) = ScratchFile::create(dir.path(), "../", VideoFormat::Webm).unwrap();
        assert!(scratch.path().to_string_lossy().ends_with("-video.webm"));
        assert_eq!(scratch.display_name(), "../");
    }

    #[tokio::test]
    async fn removing_an_already_deleted_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (scratch, _) = ScratchFile::create(dir.path(), "clip.mp4", VideoFormat::Mp4).unwrap();
        std::fs::remove_file(scratch.path()).unwrap();
        assert!(scratch.remove().is_ok());
    }
}
