//! Separation job parameters and multipart form construction

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    config::TOKEN_PARAM,
    error::{ApiError, Result},
    transport::FormPart,
};

/// Where the audio to separate comes from
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Local file, read when the job is submitted
    Path(PathBuf),
    /// In-memory audio
    Bytes { file_name: String, data: Arc<Vec<u8>> },
    /// Remote file the server downloads itself
    Url(String),
}

impl AudioSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        AudioSource::Path(path.into())
    }

    pub fn bytes(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        AudioSource::Bytes {
            file_name: file_name.into(),
            data: Arc::new(data),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        AudioSource::Url(url.into())
    }
}

/// Parameters of a new separation job
#[derive(Debug, Clone)]
pub struct SeparationRequest {
    pub source: AudioSource,
    /// Algorithm selector (`sep_type`)
    pub algorithm: u32,
    pub option1: Option<String>,
    pub option2: Option<String>,
    /// Output format code (`output_format`)
    pub output_format: Option<u32>,
    /// Publish the result on the demo page
    pub is_demo: bool,
}

impl SeparationRequest {
    pub fn new(source: AudioSource, algorithm: u32) -> Self {
        Self {
            source,
            algorithm,
            option1: None,
            option2: None,
            output_format: None,
            is_demo: false,
        }
    }

    pub fn with_option1(mut self, value: impl Into<String>) -> Self {
        self.option1 = Some(value.into());
        self
    }

    pub fn with_option2(mut self, value: impl Into<String>) -> Self {
        self.option2 = Some(value.into());
        self
    }

    pub fn with_output_format(mut self, format: u32) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_demo(mut self, is_demo: bool) -> Self {
        self.is_demo = is_demo;
        self
    }

    /// Build the multipart form for `POST /api/separation/create`
    pub async fn to_form(&self, api_token: &str) -> Result<Vec<FormPart>> {
        let mut parts = vec![
            FormPart::text(TOKEN_PARAM, api_token),
            FormPart::text("sep_type", self.algorithm.to_string()),
        ];

        if let Some(opt) = &self.option1 {
            parts.push(FormPart::text("add_opt1", opt.clone()));
        }
        if let Some(opt) = &self.option2 {
            parts.push(FormPart::text("add_opt2", opt.clone()));
        }
        if let Some(format) = self.output_format {
            parts.push(FormPart::text("output_format", format.to_string()));
        }
        if self.is_demo {
            parts.push(FormPart::text("is_demo", "1"));
        }

        parts.push(match &self.source {
            AudioSource::Path(path) => file_part(path).await?,
            AudioSource::Bytes { file_name, data } => FormPart::File {
                name: "audiofile".to_string(),
                file_name: file_name.clone(),
                mime: guess_mime(Path::new(file_name)),
                data: Arc::clone(data),
            },
            AudioSource::Url(url) => FormPart::text("url", url.clone()),
        });

        Ok(parts)
    }
}

async fn file_part(path: &Path) -> Result<FormPart> {
    let data = tokio::fs::read(path).await.map_err(|e| ApiError::FileUpload {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ApiError::FileUpload {
            path: path.to_path_buf(),
            message: "path has no file name".to_string(),
        })?;

    Ok(FormPart::File {
        name: "audiofile".to_string(),
        file_name,
        mime: guess_mime(path),
        data: Arc::new(data),
    })
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_value<'a>(parts: &'a [FormPart], name: &str) -> Option<&'a str> {
        parts.iter().find_map(|p| match p {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_form_from_url() {
        let request = SeparationRequest::new(AudioSource::url("https://example.com/a.mp3"), 40)
            .with_option1("1")
            .with_output_format(2);

        let parts = request.to_form("secret").await.unwrap();
        assert_eq!(text_value(&parts, "api_token"), Some("secret"));
        assert_eq!(text_value(&parts, "sep_type"), Some("40"));
        assert_eq!(text_value(&parts, "add_opt1"), Some("1"));
        assert_eq!(text_value(&parts, "add_opt2"), None);
        assert_eq!(text_value(&parts, "output_format"), Some("2"));
        assert_eq!(text_value(&parts, "url"), Some("https://example.com/a.mp3"));
        assert_eq!(text_value(&parts, "is_demo"), None);
    }

    #[tokio::test]
    async fn test_form_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wav");
        tokio::fs::write(&path, b"RIFF....WAVE").await.unwrap();

        let parts = SeparationRequest::new(AudioSource::path(&path), 1)
            .to_form("t")
            .await
            .unwrap();

        let file = parts.iter().find(|p| p.name() == "audiofile").unwrap();
        match file {
            FormPart::File {
                file_name,
                mime,
                data,
                ..
            } => {
                assert_eq!(file_name, "song.wav");
                assert!(mime.starts_with("audio/"));
                assert_eq!(data.as_slice(), b"RIFF....WAVE");
            }
            other => panic!("expected file part, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_upload_error() {
        let result = SeparationRequest::new(AudioSource::path("/definitely/not/here.flac"), 1)
            .to_form("t")
            .await;

        match result {
            Err(ApiError::FileUpload { path, .. }) => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.flac"))
            }
            other => panic!("expected upload error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(guess_mime(Path::new("track.zzz")), "application/octet-stream");
    }
}
