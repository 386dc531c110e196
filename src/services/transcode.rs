use std::path::Path;

use tokio::process::Command;

use super::ServiceError;
use crate::config::MediaConfig;

/// An uploaded or processed media file held in memory.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub ext: String,
}

impl MediaFile {
    fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "image/jpeg".to_string(),
            ext: "jpg".to_string(),
        }
    }

    fn mp4(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "video/mp4".to_string(),
            ext: "mp4".to_string(),
        }
    }
}

pub struct ProcessedVideo {
    pub video: MediaFile,
    pub thumbnail: Option<MediaFile>,
}

/// Normalizes uploads with ffmpeg. When disabled, files pass through untouched.
pub struct MediaProcessor {
    cfg: MediaConfig,
}

impl MediaProcessor {
    pub fn new(cfg: MediaConfig) -> Self {
        Self { cfg }
    }

    pub fn enabled(&self) -> bool {
        self.cfg.transcode
    }

    /// Downscale to at most `max_image_width` and re-encode as JPEG.
    pub async fn image(&self, file: MediaFile) -> MediaFile {
        if !self.enabled() {
            return file;
        }
        match self.run_image(&file).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!("Image processing failed, storing original: {}", e);
                file
            }
        }
    }

    /// Re-encode to H.264/AAC MP4 and optionally grab a JPEG poster frame.
    pub async fn video(&self, file: MediaFile, with_thumbnail: bool) -> ProcessedVideo {
        if !self.enabled() {
            return ProcessedVideo {
                video: file,
                thumbnail: None,
            };
        }
        match self.run_video(&file, with_thumbnail).await {
            Ok(processed) => processed,
            Err(e) => {
                tracing::warn!("Video processing failed, storing original: {}", e);
                ProcessedVideo {
                    video: file,
                    thumbnail: None,
                }
            }
        }
    }

    async fn run_image(&self, file: &MediaFile) -> Result<MediaFile, ServiceError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(format!("input.{}", file.ext));
        let output = dir.path().join("output.jpg");
        tokio::fs::write(&input, &file.bytes).await?;

        self.ffmpeg(image_args(&input, &output, self.cfg.max_image_width))
            .await?;
        Ok(MediaFile::jpeg(tokio::fs::read(&output).await?))
    }

    async fn run_video(
        &self,
        file: &MediaFile,
        with_thumbnail: bool,
    ) -> Result<ProcessedVideo, ServiceError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(format!("input.{}", file.ext));
        let output = dir.path().join("output.mp4");
        tokio::fs::write(&input, &file.bytes).await?;

        self.ffmpeg(video_args(&input, &output)).await?;
        let video = MediaFile::mp4(tokio::fs::read(&output).await?);

        let thumbnail = if with_thumbnail {
            let thumb = dir.path().join("thumb.jpg");
            match self.ffmpeg(thumbnail_args(&output, &thumb)).await {
                Ok(()) => Some(MediaFile::jpeg(tokio::fs::read(&thumb).await?)),
                Err(e) => {
                    tracing::warn!("Thumbnail extraction failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(ProcessedVideo { video, thumbnail })
    }

    async fn ffmpeg(&self, args: Vec<String>) -> Result<(), ServiceError> {
        let output = Command::new(&self.cfg.ffmpeg_path)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
            return Err(ServiceError::Upstream(format!(
                "ffmpeg exited with {}: {}",
                output.status, tail
            )));
        }
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn image_args(input: &Path, output: &Path, max_width: u32) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-vf".into(),
        format!("scale='min({},iw)':-2", max_width),
        "-q:v".into(),
        "3".into(),
        path_arg(output),
    ]
}

fn video_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-vf".into(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-crf".into(),
        "23".into(),
        "-c:a".into(),
        "aac".into(),
        "-movflags".into(),
        "+faststart".into(),
        path_arg(output),
    ]
}

fn thumbnail_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-frames:v".into(),
        "1".into(),
        path_arg(output),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaFile {
        MediaFile {
            bytes: b"not really a png".to_vec(),
            content_type: "image/png".into(),
            ext: "png".into(),
        }
    }

    #[tokio::test]
    async fn disabled_processor_passes_files_through() {
        let processor = MediaProcessor::new(MediaConfig::default());
        let out = processor.image(sample()).await;
        assert_eq!(out.content_type, "image/png");
        assert_eq!(out.bytes, b"not really a png");

        let video = processor.video(sample(), true).await;
        assert!(video.thumbnail.is_none());
    }

    #[tokio::test]
    async fn missing_binary_falls_back_to_original() {
        let processor = MediaProcessor::new(MediaConfig {
            transcode: true,
            ffmpeg_path: "/nonexistent/ffmpeg-binary".into(),
            max_image_width: 1080,
        });
        let out = processor.image(sample()).await;
        assert_eq!(out.ext, "png");
    }

    #[test]
    fn image_args_cap_width() {
        let args = image_args(Path::new("/in.png"), Path::new("/out.jpg"), 1080);
        assert!(args.contains(&"scale='min(1080,iw)':-2".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out.jpg"));
    }

    #[test]
    fn video_args_enable_faststart() {
        let args = video_args(Path::new("/in.mov"), Path::new("/out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-movflags +faststart"));
    }
}
