//! Read-only queries over the verse store.

use std::sync::Arc;

use rand::Rng;

use crate::error::{Result, VerseError};
use crate::store::VerseStore;
use crate::validation::RequestValidator;
use crate::verse::Verse;

/// Most records a search returns.
pub const SEARCH_LIMIT: usize = 50;
/// Records returned by the unfiltered listing.
pub const LIST_LIMIT: usize = 100;

fn verse_not_found() -> VerseError {
    VerseError::NotFound("Verse not found".to_string())
}

/// Query operations over a shared [`VerseStore`].
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<VerseStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<VerseStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<VerseStore> {
        &self.store
    }

    /// First verse in store order with the given chapter and verse number.
    ///
    /// Out-of-range input is a validation error, distinct from not found.
    pub fn lookup_by_chapter_verse(&self, chapter: i64, verse: i64) -> Result<Verse> {
        let pair = RequestValidator::validate_chapter_verse(chapter, verse)?;
        self.store
            .all()
            .iter()
            .find(|v| v.chapter == pair.chapter && v.verse_number == pair.verse)
            .cloned()
            .ok_or_else(verse_not_found)
    }

    /// Case-insensitive substring search over the five text fields.
    ///
    /// Results keep store order and are capped at [`SEARCH_LIMIT`].
    pub fn search(&self, query: &str) -> Result<Vec<Verse>> {
        let needle = RequestValidator::validate_search_query(query)?.to_lowercase();
        let verses = self.store.all();
        let results = verses
            .iter()
            .filter(|v| {
                v.text_fields()
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .take(SEARCH_LIMIT)
            .cloned()
            .collect();
        Ok(results)
    }

    pub fn pick_random(&self) -> Result<Verse> {
        let verses = self.store.all();
        if verses.is_empty() {
            return Err(VerseError::NotFound("No verses found".to_string()));
        }
        let index = rand::thread_rng().gen_range(0..verses.len());
        Ok(verses[index].clone())
    }

    /// The verse after `verse_id`, wrapping from the last to the first.
    pub fn next(&self, verse_id: &str) -> Result<Verse> {
        let verses = self.store.all();
        let index = Self::position(&verses, verse_id)?;
        Ok(verses[(index + 1) % verses.len()].clone())
    }

    /// The verse before `verse_id`, wrapping from the first to the last.
    pub fn previous(&self, verse_id: &str) -> Result<Verse> {
        let verses = self.store.all();
        let index = Self::position(&verses, verse_id)?;
        let previous = if index == 0 { verses.len() - 1 } else { index - 1 };
        Ok(verses[previous].clone())
    }

    /// The first [`LIST_LIMIT`] verses. There is no offset.
    pub fn list_page(&self) -> Vec<Verse> {
        self.store.all().iter().take(LIST_LIMIT).cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.store.len()
    }

    fn position(verses: &[Verse], verse_id: &str) -> Result<usize> {
        let verse_id = RequestValidator::validate_verse_id(verse_id)?;
        verses
            .iter()
            .position(|v| v.verse_id == verse_id)
            .ok_or_else(verse_not_found)
    }
}
