use tracing::warn;

use crate::{
    document::{ContentNode, Document},
    types::{Context, ImageRef},
};

/// Finds the nearest non-empty text on either side of an image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextExtractor {
    max_hops: Option<usize>,
}

impl ContextExtractor {
    pub fn new(max_hops: Option<usize>) -> Self {
        Self { max_hops }
    }

    pub fn max_hops(&self) -> Option<usize> {
        self.max_hops
    }

    /// Never fails: a side that cannot be found is `None`
    pub fn extract(&self, document: &dyn Document, image: &ImageRef) -> Context {
        let Some(window) = document.content_window(image) else {
            warn!(
                src = image.source().unwrap_or_default(),
                part = image.part,
                position = image.position,
                "Image does not map onto the document content; extracting no context"
            );
            return Context::default();
        };

        Context::new(
            self.nearest(window.before()),
            self.nearest(window.after()),
        )
    }

    fn nearest<'a>(&self, nodes: impl Iterator<Item = &'a ContentNode>) -> Option<String> {
        let limit = self.max_hops.unwrap_or(usize::MAX);
        nodes.take(limit).find_map(|node| match node {
            ContentNode::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            ContentNode::Image => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HtmlDocument;

    fn context_of(html: &str, source: &str, max_hops: Option<usize>) -> Context {
        let doc = HtmlDocument::parse(html).unwrap();
        let image = doc.find_image(source).unwrap();
        ContextExtractor::new(max_hops).extract(&doc, &image)
    }

    #[test]
    fn test_flanking_text() {
        let context = context_of(r#"<p>A</p><img src="a.png"><p>B</p>"#, "a.png", None);
        assert_eq!(context, Context::new(Some("A".into()), Some("B".into())));
    }

    #[test]
    fn test_no_text_on_either_side() {
        let context = context_of(r#"<div><img src="a.png"></div>"#, "a.png", None);
        assert_eq!(context, Context::default());
        assert!(context.is_empty());
    }

    #[test]
    fn test_whitespace_nodes_and_images_are_skipped() {
        let html = "<p>  Title  </p>\n  <img src=\"x.png\">\n  <img src=\"a.png\">\n\n<span> </span><p>Caption</p>";
        let context = context_of(html, "a.png", None);
        assert_eq!(context.before.as_deref(), Some("Title"));
        assert_eq!(context.after.as_deref(), Some("Caption"));
    }

    #[test]
    fn test_partial_context() {
        let context = context_of(r#"<img src="a.png"><p>After only</p>"#, "a.png", None);
        assert_eq!(context.before, None);
        assert_eq!(context.after.as_deref(), Some("After only"));
    }

    #[test]
    fn test_hop_limit_bounds_the_walk() {
        let html = r#"<p>Far</p><img src="1.png"><img src="2.png"><img src="a.png"><p>Near</p>"#;
        assert_eq!(context_of(html, "a.png", Some(2)).before, None);
        assert_eq!(context_of(html, "a.png", Some(3)).before.as_deref(), Some("Far"));
        assert_eq!(context_of(html, "a.png", Some(1)).after.as_deref(), Some("Near"));
    }

    #[test]
    fn test_stale_image_reference_degrades_to_empty() {
        let doc = HtmlDocument::parse(r#"<p>A</p><img src="a.png">"#).unwrap();
        let mut image = doc.find_image("a.png").unwrap();
        image.position = 99;
        assert!(ContextExtractor::default().extract(&doc, &image).is_empty());
    }
}
