use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    document::{
        ContentWindow, Document,
        markup::{self, ImageLocation, MarkupIndex},
    },
    error::{AltTextError, Result},
    types::ImageRef,
};

const MIMETYPE: &str = "mimetype";

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Chapter {
    /// Index into `entries`
    entry: usize,
    markup: String,
    index: MarkupIndex,
}

/// An EPUB publication. Every XHTML content document is one part; images in
/// a part resolve relative to that part's directory inside the archive.
#[derive(Debug, Clone)]
pub struct EpubDocument {
    name: String,
    entries: Vec<Entry>,
    chapters: Vec<Chapter>,
    alts: HashMap<String, String>,
}

fn is_content_document(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    [".xhtml", ".html", ".htm"]
        .iter()
        .any(|ext| lowered.ends_with(ext))
}

/// Resolve `src` against the archive directory of `base`, normalizing `.` and `..`
pub(crate) fn resolve_entry(base: &str, src: &str) -> String {
    let mut segments: Vec<&str> = match base.rsplit_once('/') {
        Some((dir, _)) if !src.starts_with('/') => dir.split('/').collect(),
        _ => Vec::new(),
    };
    for segment in src.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

impl EpubDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            // the declared size comes from the archive header and is not trusted
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
            });
        }

        let mut chapters = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            if !is_content_document(&entry.name) {
                continue;
            }
            let markup = match String::from_utf8(entry.data.clone()) {
                Ok(markup) => markup,
                Err(_) => {
                    warn!(entry = %entry.name, "Skipping content document that is not UTF-8");
                    continue;
                }
            };
            let index = markup::index_markup(&markup, chapters.len())?;
            chapters.push(Chapter {
                entry: i,
                markup,
                index,
            });
        }

        debug!(
            entries = entries.len(),
            chapters = chapters.len(),
            "Parsed EPUB container"
        );

        Ok(Self {
            name: "book.epub".to_string(),
            entries,
            chapters,
            alts: HashMap::new(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut document = Self::from_bytes(&bytes)?;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            document.name = name.to_string();
        }
        Ok(document)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Archive paths of the content documents, in part order
    pub fn chapter_names(&self) -> Vec<&str> {
        self.chapters
            .iter()
            .map(|c| self.entries[c.entry].name.as_str())
            .collect()
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[async_trait]
impl Document for EpubDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn all_images(&self) -> Vec<ImageRef> {
        self.chapters
            .iter()
            .flat_map(|c| c.index.images.iter().cloned())
            .collect()
    }

    fn content_window(&self, image: &ImageRef) -> Option<ContentWindow<'_>> {
        let chapter = self.chapters.get(image.part)?;
        ContentWindow::new(&chapter.index.nodes, image.position)
    }

    /// Relative sources resolve against the first chapter that references them.
    /// Sources are unique within a document, so a relative `src` shared by
    /// chapters in different directories reads the first chapter's image.
    async fn image_bytes(&self, source: &str) -> Result<Vec<u8>> {
        let path = match markup::locate(source)? {
            ImageLocation::Inline(bytes) => return Ok(bytes),
            ImageLocation::Remote => {
                return Err(AltTextError::UnsupportedSource {
                    src: source.to_string(),
                    reason: "remote images are not fetched".to_string(),
                });
            }
            ImageLocation::Relative(path) => path,
        };

        let chapter = self
            .chapters
            .iter()
            .find(|c| c.index.contains_source(source))
            .ok_or_else(|| AltTextError::ImageNotFound {
                src: source.to_string(),
            })?;
        let resolved = resolve_entry(&self.entries[chapter.entry].name, path);

        self.entry(&resolved)
            .map(|e| e.data.clone())
            .ok_or_else(|| AltTextError::ImageNotFound {
                src: source.to_string(),
            })
    }

    fn set_description(&mut self, source: &str, text: &str) -> Result<ImageRef> {
        let updated: usize = self
            .chapters
            .iter_mut()
            .map(|c| c.index.set_alt(source, text))
            .sum();
        if updated == 0 {
            return Err(AltTextError::ImageNotFound {
                src: source.to_string(),
            });
        }
        self.alts.insert(source.to_string(), text.to_string());
        self.find_image(source)
    }

    fn export(&self) -> Result<Vec<u8>> {
        let mut rewritten: HashMap<usize, Vec<u8>> = HashMap::new();
        for chapter in &self.chapters {
            if chapter.index.images.iter().any(|i| {
                i.source().is_some_and(|s| self.alts.contains_key(s))
            }) {
                let markup = markup::apply_alts(&chapter.markup, &self.alts)?;
                rewritten.insert(chapter.entry, markup.into_bytes());
            }
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // the container must open with an uncompressed mimetype entry
        if let Some(mimetype) = self.entry(MIMETYPE) {
            writer.start_file(MIMETYPE, stored)?;
            writer.write_all(&mimetype.data)?;
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.name == MIMETYPE {
                continue;
            }
            writer.start_file(entry.name.as_str(), deflated)?;
            let data = rewritten.get(&i).unwrap_or(&entry.data);
            writer.write_all(data)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}
