//! Content modality shared by embeddings, collections and search hits.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// The kind of content a vector was derived from.
///
/// Text and image embeddings live in one shared space, which is what makes
/// cross-modal search possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    /// Both modalities, in collection provisioning order.
    pub const ALL: [Modality; 2] = [Modality::Text, Modality::Image];

    /// Suffix appended to the configured prefix to name this modality's collection.
    pub fn collection_suffix(&self) -> &'static str {
        match self {
            Modality::Text => "text_chunks",
            Modality::Image => "image_embeddings",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Image => write!(f, "image"),
        }
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            other => Err(format!("invalid modality: '{other}'")),
        }
    }
}
