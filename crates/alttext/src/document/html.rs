use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    document::{
        ContentWindow, Document,
        markup::{self, ImageLocation, MarkupIndex},
    },
    error::{AltTextError, Result},
    types::ImageRef,
};

/// A single HTML page.
///
/// Relative image sources resolve against `base_dir`, which defaults to the
/// directory of the file the page was read from.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    name: String,
    markup: String,
    base_dir: Option<PathBuf>,
    index: MarkupIndex,
    alts: HashMap<String, String>,
}

impl HtmlDocument {
    pub fn parse(markup: impl Into<String>) -> Result<Self> {
        let markup = markup.into();
        let index = markup::index_markup(&markup, 0)?;
        debug!(images = index.images.len(), nodes = index.nodes.len(), "Parsed HTML document");

        Ok(Self {
            name: "document.html".to_string(),
            markup,
            base_dir: None,
            index,
            alts: HashMap::new(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let markup = std::fs::read_to_string(path)?;
        let mut document = Self::parse(markup)?;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            document.name = name.to_string();
        }
        document.base_dir = path.parent().map(Path::to_path_buf);
        Ok(document)
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Current markup with every description set so far applied
    pub fn to_html(&self) -> Result<String> {
        markup::apply_alts(&self.markup, &self.alts)
    }
}

#[async_trait]
impl Document for HtmlDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn all_images(&self) -> Vec<ImageRef> {
        self.index.images.clone()
    }

    fn content_window(&self, image: &ImageRef) -> Option<ContentWindow<'_>> {
        if image.part != 0 {
            return None;
        }
        ContentWindow::new(&self.index.nodes, image.position)
    }

    async fn image_bytes(&self, source: &str) -> Result<Vec<u8>> {
        match markup::locate(source)? {
            ImageLocation::Inline(bytes) => Ok(bytes),
            ImageLocation::Remote => Err(AltTextError::UnsupportedSource {
                src: source.to_string(),
                reason: "remote images are not fetched".to_string(),
            }),
            ImageLocation::Relative(path) => {
                let path = match &self.base_dir {
                    Some(base) => base.join(path),
                    None => PathBuf::from(path),
                };
                tokio::fs::read(&path).await.map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => AltTextError::ImageNotFound {
                        src: source.to_string(),
                    },
                    _ => AltTextError::Io(e),
                })
            }
        }
    }

    fn set_description(&mut self, source: &str, text: &str) -> Result<ImageRef> {
        if self.index.set_alt(source, text) == 0 {
            return Err(AltTextError::ImageNotFound {
                src: source.to_string(),
            });
        }
        self.alts.insert(source.to_string(), text.to_string());
        self.find_image(source)
    }

    fn export(&self) -> Result<Vec<u8>> {
        Ok(self.to_html()?.into_bytes())
    }
}
