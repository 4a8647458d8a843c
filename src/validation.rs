use std::sync::LazyLock;

use regex::Regex;
use validator::Validate;

use crate::error::{Result, VerseError};
use crate::parser::parse_leading_int;

/// Longest search text kept after sanitising, in characters.
pub const MAX_QUERY_CHARS: usize = 200;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("valid script pattern"));
static JAVASCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid scheme pattern"));
static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)on[a-z0-9_]+\s*=\s*["']?[^"']*["']?"#).expect("valid handler pattern")
});
static DATA_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)data:").expect("valid scheme pattern"));

/// A chapter and verse pair inside the domain of the text: 18 chapters, at most 200 verses each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct ChapterVerse {
    #[validate(range(min = 1, max = 18))]
    pub chapter: i64,
    #[validate(range(min = 1, max = 200))]
    pub verse: i64,
}

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Strip markup and script-like fragments from a search string.
    ///
    /// The result may be empty; callers decide what an empty query means.
    pub fn sanitize_search_query(query: &str) -> String {
        let cleaned = SCRIPT_BLOCK.replace_all(query, "");
        let cleaned = JAVASCRIPT_SCHEME.replace_all(&cleaned, "");
        let cleaned = EVENT_HANDLER.replace_all(&cleaned, "");
        let cleaned = DATA_SCHEME.replace_all(&cleaned, "");
        cleaned.trim().chars().take(MAX_QUERY_CHARS).collect()
    }

    /// Sanitise a search string and reject it when nothing is left.
    pub fn validate_search_query(query: &str) -> Result<String> {
        let sanitized = Self::sanitize_search_query(query);
        if sanitized.is_empty() {
            return Err(VerseError::Validation("Invalid search query".to_string()));
        }
        Ok(sanitized)
    }

    /// Check that a chapter/verse pair lies inside the text's domain.
    pub fn validate_chapter_verse(chapter: i64, verse: i64) -> Result<ChapterVerse> {
        let pair = ChapterVerse { chapter, verse };
        if let Err(errors) = pair.validate() {
            let message = if errors.field_errors().contains_key("chapter") {
                "Invalid chapter number"
            } else {
                "Invalid verse number"
            };
            return Err(VerseError::Validation(message.to_string()));
        }
        Ok(pair)
    }

    /// Parse raw `chapter` and `verse` query values, then range-check them.
    ///
    /// A value with no leading digits is out of range, and the chapter is
    /// reported before the verse.
    pub fn parse_chapter_verse(chapter: &str, verse: &str) -> Result<ChapterVerse> {
        let chapter = parse_leading_int(chapter).unwrap_or(0);
        let verse = parse_leading_int(verse).unwrap_or(0);
        Self::validate_chapter_verse(chapter, verse)
    }

    /// A verse id taken from the path must not be empty.
    pub fn validate_verse_id(id: &str) -> Result<&str> {
        if id.is_empty() {
            return Err(VerseError::Validation("Invalid verse ID".to_string()));
        }
        Ok(id)
    }
}
