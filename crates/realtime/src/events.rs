//! Ereignisse, die der Client ueber den Datenkanal an den Provider sendet

use serde::Serialize;

/// Client-Ereignis auf dem Datenkanal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEreignis {
    /// Fordert eine Antwort des Modells an
    #[serde(rename = "response.create")]
    ResponseCreate { response: AntwortOptionen },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AntwortOptionen {
    pub modalities: Vec<String>,
    pub instructions: String,
}

impl ClientEreignis {
    /// Text- und Audio-Antwort auf die gegebene Anweisung
    pub fn text_antwort(text: impl Into<String>) -> Self {
        Self::ResponseCreate {
            response: AntwortOptionen {
                modalities: vec!["text".into(), "audio".into()],
                instructions: text.into(),
            },
        }
    }

    pub fn als_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
