pub mod epub;
pub mod html;
pub(crate) mod markup;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    error::{AltTextError, Result},
    types::{Association, ImageRef},
};

pub use epub::EpubDocument;
pub use html::HtmlDocument;

/// One node of a document part's linear content order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Text(String),
    Image,
}

/// The content order of the part holding an image, positioned at that image
#[derive(Debug, Clone, Copy)]
pub struct ContentWindow<'a> {
    nodes: &'a [ContentNode],
    position: usize,
}

impl<'a> ContentWindow<'a> {
    /// `None` when `position` does not point inside `nodes`
    pub fn new(nodes: &'a [ContentNode], position: usize) -> Option<Self> {
        (position < nodes.len()).then_some(Self { nodes, position })
    }

    /// Nodes preceding the image, nearest first
    pub fn before(self) -> impl Iterator<Item = &'a ContentNode> {
        self.nodes[..self.position].iter().rev()
    }

    /// Nodes following the image, nearest first
    pub fn after(self) -> impl Iterator<Item = &'a ContentNode> {
        self.nodes[self.position + 1..].iter()
    }
}

/// A parsed document whose images can be described and updated.
///
/// Generation only ever reads from a document, so one document can be
/// shared by every concurrent unit of a batch.
#[async_trait]
pub trait Document: Send + Sync {
    /// Name used when handing the document to a language engine
    fn name(&self) -> &str;

    /// Every image element, in document order
    fn all_images(&self) -> Vec<ImageRef>;

    /// Images with no `alt` attribute or a whitespace-only one
    fn missing_description_images(&self) -> Vec<ImageRef> {
        self.all_images()
            .into_iter()
            .filter(ImageRef::is_missing_description)
            .collect()
    }

    /// The first image whose `src` equals `source`
    fn find_image(&self, source: &str) -> Result<ImageRef> {
        self.all_images()
            .into_iter()
            .find(|image| image.source() == Some(source))
            .ok_or_else(|| AltTextError::ImageNotFound {
                src: source.to_string(),
            })
    }

    /// Linear content around an image, if the image still maps onto the document
    fn content_window(&self, image: &ImageRef) -> Option<ContentWindow<'_>>;

    /// Binary content of the image referenced by `source`
    async fn image_bytes(&self, source: &str) -> Result<Vec<u8>>;

    /// Set the `alt` of every image whose `src` equals `source`
    fn set_description(&mut self, source: &str, text: &str) -> Result<ImageRef>;

    fn set_descriptions(&mut self, associations: &[Association]) -> Result<Vec<ImageRef>> {
        associations
            .iter()
            .map(|association| self.set_description(&association.src, &association.alt))
            .collect()
    }

    /// Serialize back to the document's original format
    fn export(&self) -> Result<Vec<u8>>;

    fn export_to_file(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.export()?)?;
        Ok(path.to_path_buf())
    }
}

/// Open a document from disk, picking the variant from the file extension
pub fn open(path: &Path) -> Result<Box<dyn Document>> {
    let is_epub = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"));

    if is_epub {
        Ok(Box::new(EpubDocument::from_file(path)?))
    } else {
        Ok(Box::new(HtmlDocument::from_file(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> ContentNode {
        ContentNode::Text(value.to_string())
    }

    #[test]
    fn test_window_iterates_outward() {
        let nodes = vec![text("a"), text("b"), ContentNode::Image, text("c"), text("d")];
        let window = ContentWindow::new(&nodes, 2).unwrap();

        let before: Vec<_> = window.before().collect();
        let after: Vec<_> = window.after().collect();
        assert_eq!(before, vec![&text("b"), &text("a")]);
        assert_eq!(after, vec![&text("c"), &text("d")]);
    }

    #[test]
    fn test_window_rejects_out_of_range_position() {
        let nodes = vec![ContentNode::Image];
        assert!(ContentWindow::new(&nodes, 0).is_some());
        assert!(ContentWindow::new(&nodes, 1).is_none());
        assert!(ContentWindow::new(&[], 0).is_none());
    }
}
