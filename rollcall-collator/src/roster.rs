//! Roster document parsing
//!
//! A roster is the authoritative list of identifiers to track:
//!
//! ```json
//! { "details": [ { "name": "alice", "images": ["ref1.png", "ref1_b.png"] } ] }
//! ```
//!
//! The first image (extension stripped) becomes the entry's reference ID.
//! Unknown top-level fields such as `img_folder_path` are ignored.

use crate::error::{CollatorError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct RosterDocument {
    pub details: Vec<RosterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl RosterEntry {
    /// Reference ID derived from the first image, if any
    pub fn reference_id(&self) -> Option<String> {
        self.images.first().map(|image| strip_extension(image))
    }
}

impl RosterDocument {
    /// Parse a roster from raw bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(CollatorError::MalformedRoster)
    }

    /// `(name, reference_id)` pairs in document order
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<String>)> + '_ {
        self.details
            .iter()
            .map(|entry| (entry.name.as_str(), entry.reference_id()))
    }
}

fn strip_extension(image: &str) -> String {
    Path::new(image)
        .with_extension("")
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_images() {
        let roster = RosterDocument::parse(
            br#"{"img_folder_path": "/data/faces",
                 "details": [
                    {"name": "alice", "images": ["ref1.png", "other.png"]},
                    {"name": "bob", "images": []},
                    {"name": "carol"}
                 ]}"#,
        )
        .unwrap();

        let entries: Vec<_> = roster.entries().collect();
        assert_eq!(
            entries,
            vec![
                ("alice", Some("ref1".to_string())),
                ("bob", None),
                ("carol", None),
            ]
        );
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("ref1.png"), "ref1");
        assert_eq!(strip_extension("a.b.jpg"), "a.b");
        assert_eq!(strip_extension("noext"), "noext");
    }

    #[test]
    fn test_malformed_roster() {
        assert!(matches!(
            RosterDocument::parse(b"{\"details\": [{\"images\": []}]}"),
            Err(CollatorError::MalformedRoster(_))
        ));
        assert!(matches!(
            RosterDocument::parse(b"not json"),
            Err(CollatorError::MalformedRoster(_))
        ));
    }
}
