use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Errors produced while locating or parsing a font.
#[derive(Debug, thiserror::Error)]
pub enum FontLoadError {
    #[error("failed to read font file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no system font matches {0}")]
    NoSystemFace(FontQuery),

    #[error("failed to parse font data from {0}")]
    Parse(String),

    #[error("font has no glyph for {0:?}")]
    MissingGlyph(char),

    #[error("font loading task panicked")]
    TaskPanicked,
}

/// Family/weight request resolved against the system font database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontQuery {
    /// Preferred family names in priority order; `sans-serif`, `serif` and
    /// `monospace` select the generic families.
    pub families: Vec<String>,
    /// CSS-style weight, 400 regular and 700 bold.
    pub weight: u16,
    pub italic: bool,
}

impl Default for FontQuery {
    fn default() -> Self {
        Self {
            families: ["Helvetica", "Arial", "Liberation Sans", "DejaVu Sans", "sans-serif"]
                .into_iter()
                .map(String::from)
                .collect(),
            weight: 700,
            italic: false,
        }
    }
}

impl fmt::Display for FontQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] weight {}{}",
            self.families.join(", "),
            self.weight,
            if self.italic { " italic" } else { "" }
        )
    }
}

/// Where to get the font from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontSource {
    File(PathBuf),
    System(FontQuery),
}

impl Default for FontSource {
    fn default() -> Self {
        Self::System(FontQuery::default())
    }
}

impl fmt::Display for FontSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::System(query) => write!(f, "system font {query}"),
        }
    }
}

/// Parsed-once font face with its backing bytes.
#[derive(Debug, Clone)]
pub struct LoadedFont {
    name: String,
    bytes: Arc<[u8]>,
    index: u32,
    units_per_em: f32,
}

impl LoadedFont {
    /// Validates `bytes` as a font face and wraps them.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: Vec<u8>,
        index: u32,
    ) -> Result<Self, FontLoadError> {
        let name = name.into();
        let units_per_em = ttf_parser::Face::parse(&bytes, index)
            .map_err(|_| FontLoadError::Parse(name.clone()))?
            .units_per_em() as f32;
        Ok(Self {
            name,
            bytes: Arc::from(bytes),
            index,
            units_per_em,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units_per_em(&self) -> f32 {
        self.units_per_em
    }

    /// Borrows a parsed face. Parsing only reads table offsets.
    pub fn face(&self) -> Result<ttf_parser::Face<'_>, FontLoadError> {
        ttf_parser::Face::parse(&self.bytes, self.index)
            .map_err(|_| FontLoadError::Parse(self.name.clone()))
    }
}

/// Loads a font synchronously.
pub fn load_font(source: &FontSource) -> Result<LoadedFont, FontLoadError> {
    match source {
        FontSource::File(path) => {
            let bytes = std::fs::read(path).map_err(|source| FontLoadError::Io {
                path: path.clone(),
                source,
            })?;
            LoadedFont::from_bytes(path.display().to_string(), bytes, 0)
        }
        FontSource::System(query) => load_system_font(query),
    }
}

fn load_system_font(query: &FontQuery) -> Result<LoadedFont, FontLoadError> {
    let mut db = Database::new();
    db.load_system_fonts();
    debug!("font database holds {} faces", db.len());

    let families: Vec<Family<'_>> = query
        .families
        .iter()
        .map(|family| family.trim())
        .filter(|family| !family.is_empty())
        .map(|family| match family.to_ascii_lowercase().as_str() {
            "sans-serif" | "sans" => Family::SansSerif,
            "serif" => Family::Serif,
            "monospace" | "mono" => Family::Monospace,
            _ => Family::Name(family),
        })
        .collect();

    let id = db
        .query(&Query {
            families: &families,
            weight: Weight(query.weight.clamp(1, 1000)),
            stretch: Stretch::Normal,
            style: if query.italic {
                Style::Italic
            } else {
                Style::Normal
            },
        })
        .ok_or_else(|| FontLoadError::NoSystemFace(query.clone()))?;

    let name = db
        .face(id)
        .map(|face| {
            face.families
                .first()
                .map(|(family, _)| family.clone())
                .unwrap_or_else(|| face.post_script_name.clone())
        })
        .unwrap_or_else(|| "system font".to_string());

    let (bytes, index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| FontLoadError::NoSystemFace(query.clone()))?;
    LoadedFont::from_bytes(name, bytes, index)
}

/// Font load running on a worker thread.
pub struct FontTask {
    handle: Option<JoinHandle<Result<LoadedFont, FontLoadError>>>,
}

impl FontTask {
    /// Starts loading `source` in the background.
    pub fn spawn(source: FontSource) -> Self {
        info!("Loading font from {source}");
        let handle = thread::spawn(move || load_font(&source));
        Self { handle: Some(handle) }
    }

    /// `true` until the outcome has been handed out by [`poll`](Self::poll).
    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns the outcome once the worker has finished, without blocking.
    ///
    /// The outcome is yielded exactly once; later calls return `None`.
    pub fn poll(&mut self) -> Option<Result<LoadedFont, FontLoadError>> {
        if !self.handle.as_ref()?.is_finished() {
            return None;
        }
        self.handle.take().map(join_worker)
    }

    /// Blocks until the worker finishes.
    pub fn wait(mut self) -> Result<LoadedFont, FontLoadError> {
        match self.handle.take() {
            Some(handle) => join_worker(handle),
            None => Err(FontLoadError::TaskPanicked),
        }
    }
}

fn join_worker(
    handle: JoinHandle<Result<LoadedFont, FontLoadError>>,
) -> Result<LoadedFont, FontLoadError> {
    handle.join().unwrap_or(Err(FontLoadError::TaskPanicked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{Duration, Instant};
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_is_an_io_error() {
        let source = FontSource::File(PathBuf::from("/definitely/not/here.ttf"));
        match load_font(&source) {
            Err(FontLoadError::Io { path, .. }) => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.ttf"))
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"this is not a font").unwrap();
        let source = FontSource::File(tmp.path().to_path_buf());
        assert!(matches!(load_font(&source), Err(FontLoadError::Parse(_))));
    }

    #[test]
    fn task_reports_failure_once() {
        let mut task = FontTask::spawn(FontSource::File(PathBuf::from("/missing/font.otf")));
        let deadline = Instant::now() + Duration::from_secs(10);
        let outcome = loop {
            if let Some(outcome) = task.poll() {
                break outcome;
            }
            assert!(Instant::now() < deadline, "font task never finished");
            thread::sleep(Duration::from_millis(5));
        };
        assert!(matches!(outcome, Err(FontLoadError::Io { .. })));
        assert!(!task.is_pending());
        assert!(task.poll().is_none());
    }

    #[test]
    fn wait_blocks_for_outcome() {
        let task = FontTask::spawn(FontSource::File(PathBuf::from("/missing/font.ttf")));
        assert!(task.wait().is_err());
    }

    #[test]
    fn default_query_asks_for_bold_sans() {
        let query = FontQuery::default();
        assert_eq!(query.weight, 700);
        assert!(query.families.iter().any(|family| family == "sans-serif"));
        assert!(query.to_string().contains("weight 700"));
    }
}
