//! In-memory verse store, built once from the backing table.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Result, VerseError};
use crate::parser::parse_verses;
use crate::verse::Verse;

/// Where the raw verse table comes from.
pub trait VerseSource: Send + Sync {
    fn read(&self) -> Result<String>;

    /// Human readable location, used in logs.
    fn describe(&self) -> String;
}

/// Reads the table from a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl VerseSource for FileSource {
    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            VerseError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Table text held in memory.
#[derive(Debug, Clone)]
pub struct TextSource(pub String);

impl VerseSource for TextSource {
    fn read(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "<in-memory>".to_string()
    }
}

/// What to do after the source could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Keep serving the empty store until the process restarts.
    #[default]
    Never,
    /// Try the source again on the first access after this much time.
    After(Duration),
}

impl RetryPolicy {
    /// `0` means never.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            RetryPolicy::Never
        } else {
            RetryPolicy::After(Duration::from_secs(secs))
        }
    }
}

enum StoreState {
    Unbuilt,
    Ready(Arc<Vec<Verse>>),
    Failed {
        empty: Arc<Vec<Verse>>,
        at: Instant,
    },
}

/// Ordered, immutable collection of verses, parsed lazily on first access.
pub struct VerseStore {
    source: Box<dyn VerseSource>,
    retry: RetryPolicy,
    state: Mutex<StoreState>,
}

impl VerseStore {
    pub fn new(source: impl VerseSource + 'static, retry: RetryPolicy) -> Self {
        Self {
            source: Box::new(source),
            retry,
            state: Mutex::new(StoreState::Unbuilt),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self::new(FileSource::new(path), retry)
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(TextSource(text.into()), RetryPolicy::Never)
    }

    /// All verses in store order.
    ///
    /// The first call parses the source. A source that cannot be read yields an
    /// empty store; whether it is read again later depends on the [`RetryPolicy`].
    pub fn all(&self) -> Arc<Vec<Verse>> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match &*state {
            StoreState::Ready(verses) => return Arc::clone(verses),
            StoreState::Failed { empty, at } => {
                let due = match self.retry {
                    RetryPolicy::Never => false,
                    RetryPolicy::After(delay) => at.elapsed() >= delay,
                };
                if !due {
                    return Arc::clone(empty);
                }
                tracing::info!(
                    target: "shloka::store",
                    source = %self.source.describe(),
                    "Retrying verse source"
                );
            }
            StoreState::Unbuilt => {}
        }

        *state = self.build();
        match &*state {
            StoreState::Ready(verses) | StoreState::Failed { empty: verses, .. } => {
                Arc::clone(verses)
            }
            StoreState::Unbuilt => Arc::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a parse has been attempted yet.
    pub fn is_built(&self) -> bool {
        self.state
            .lock()
            .map(|state| !matches!(*state, StoreState::Unbuilt))
            .unwrap_or(true)
    }

    fn build(&self) -> StoreState {
        match self.source.read() {
            Ok(text) => {
                let verses = parse_verses(&text);
                tracing::info!(
                    target: "shloka::store",
                    source = %self.source.describe(),
                    count = verses.len(),
                    "Loaded verses"
                );
                StoreState::Ready(Arc::new(verses))
            }
            Err(e) => {
                tracing::error!(
                    target: "shloka::store",
                    error = %e,
                    "Error loading verses, serving an empty store"
                );
                StoreState::Failed {
                    empty: Arc::new(Vec::new()),
                    at: Instant::now(),
                }
            }
        }
    }
}
