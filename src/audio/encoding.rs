use serde::{Deserialize, Serialize};

/// Container/codec of captured audio, negotiated at capture start and carried
/// on the artifact so the transcription dispatcher can configure the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    WebmOpus,
    OggOpus,
    Mp4,
    Wav,
}

impl AudioEncoding {
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioEncoding::WebmOpus => "audio/webm;codecs=opus",
            AudioEncoding::OggOpus => "audio/ogg;codecs=opus",
            AudioEncoding::Mp4 => "audio/mp4",
            AudioEncoding::Wav => "audio/wav",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            AudioEncoding::WebmOpus => "webm",
            AudioEncoding::OggOpus => "ogg",
            AudioEncoding::Mp4 => "mp4",
            AudioEncoding::Wav => "wav",
        }
    }

    /// Best-effort mapping from a declared MIME type. Unknown types fall back
    /// to WebmOpus, the most common capture container.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("webm") {
            AudioEncoding::WebmOpus
        } else if mime.contains("ogg") {
            AudioEncoding::OggOpus
        } else if mime.contains("mp4") {
            AudioEncoding::Mp4
        } else if mime.contains("wav") {
            AudioEncoding::Wav
        } else {
            AudioEncoding::WebmOpus
        }
    }

    /// Preference order tried during capture negotiation.
    pub fn negotiation_order() -> &'static [AudioEncoding] {
        &[
            AudioEncoding::WebmOpus,
            AudioEncoding::OggOpus,
            AudioEncoding::Mp4,
            AudioEncoding::Wav,
        ]
    }
}
