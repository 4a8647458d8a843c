use serde::{Deserialize, Serialize};

/// One verse as served by the API.
///
/// Field names on the wire follow the contract the display application
/// already consumes (`shloka`, `hinMeaning`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    /// 1-based rank of admission in the parse pass that built the store.
    #[serde(rename = "id")]
    pub sequence_id: usize,
    #[serde(rename = "verseId")]
    pub verse_id: String,
    /// 0 when the source column was not a number.
    pub chapter: i64,
    #[serde(rename = "verse")]
    pub verse_number: i64,
    #[serde(rename = "shloka")]
    pub original_text: String,
    pub transliteration: String,
    #[serde(rename = "hinMeaning")]
    pub meaning_primary: String,
    #[serde(rename = "engMeaning")]
    pub meaning_secondary: String,
    #[serde(rename = "wordMeaning")]
    pub word_gloss: String,
}

impl Verse {
    /// The free-text fields a search looks into, in column order.
    pub fn text_fields(&self) -> [&str; 5] {
        [
            &self.original_text,
            &self.transliteration,
            &self.meaning_primary,
            &self.meaning_secondary,
            &self.word_gloss,
        ]
    }
}
