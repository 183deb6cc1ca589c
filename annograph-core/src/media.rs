//! Media collaborator attached to a graph.
//!
//! The model never reads media itself; front ends and aligners ask the
//! graph's provider where the recording for a transcript (or fragment) is.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;

/// One available media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Track suffix distinguishing parallel recordings ("" for the main track).
    pub track_suffix: String,
    /// MIME type, e.g. `audio/wav`.
    pub mime_type: String,
    /// Where to fetch it.
    pub url: String,
}

/// Source of media for a graph.
pub trait MediaProvider: Debug + Send + Sync {
    /// All media available for the graph.
    fn available_media(&self) -> Result<Vec<MediaFile>>;

    /// URL of the media with the given track suffix and MIME type, if any.
    fn media(&self, track_suffix: &str, mime_type: &str) -> Result<Option<String>> {
        Ok(self
            .available_media()?
            .into_iter()
            .find(|m| m.track_suffix == track_suffix && m.mime_type == mime_type)
            .map(|m| m.url))
    }

    /// Provider for a fragment extracted from the graph.
    fn for_fragment(&self, fragment_id: &str, start: f64, end: f64) -> Arc<dyn MediaProvider>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Static(Vec<MediaFile>);

    impl MediaProvider for Static {
        fn available_media(&self) -> Result<Vec<MediaFile>> {
            Ok(self.0.clone())
        }

        fn for_fragment(&self, _: &str, _: f64, _: f64) -> Arc<dyn MediaProvider> {
            Arc::new(Static(self.0.clone()))
        }
    }

    #[test]
    fn default_media_lookup() {
        let provider = Static(vec![MediaFile {
            track_suffix: String::new(),
            mime_type: "audio/wav".into(),
            url: "file:///a.wav".into(),
        }]);
        assert_eq!(provider.media("", "audio/wav").unwrap().as_deref(), Some("file:///a.wav"));
        assert_eq!(provider.media("_mic2", "audio/wav").unwrap(), None);
    }
}
