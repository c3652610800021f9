use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::{
    document::Document,
    error::Result,
    options::ExecutionMode,
    pipeline::Pipeline,
    types::{Association, ImageRef},
};

impl Pipeline {
    /// One association per input image, in input order.
    ///
    /// The first failing image fails the whole batch. In concurrent mode that
    /// also drops whatever work is still in flight.
    pub async fn gen_alt_associations(
        &self,
        document: &dyn Document,
        images: &[ImageRef],
    ) -> Result<Vec<Association>> {
        let started = Instant::now();
        let mode = self.options().execution_mode();
        debug!(images = images.len(), ?mode, "Starting alt-text batch");

        let associations = match mode {
            ExecutionMode::Sequential => {
                let mut associations = Vec::with_capacity(images.len());
                for image in images {
                    associations.push(self.gen_association(document, image).await?);
                }
                associations
            }
            ExecutionMode::Concurrent { limit } => {
                self.gen_concurrently(document, images, limit).await?
            }
        };

        info!(
            document = document.name(),
            images = associations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated alt-text batch"
        );
        Ok(associations)
    }

    async fn gen_concurrently(
        &self,
        document: &dyn Document,
        images: &[ImageRef],
        limit: usize,
    ) -> Result<Vec<Association>> {
        let mut slots: Vec<Option<Association>> = vec![None; images.len()];

        let mut pending = stream::iter(images.iter().enumerate())
            .map(|(index, image)| async move {
                self.gen_association(document, image)
                    .await
                    .map(|association| (index, association))
            })
            .buffer_unordered(limit);

        while let Some(result) = pending.next().await {
            let (index, association) = result?;
            slots[index] = Some(association);
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Associations for every image still missing a description
    pub async fn gen_missing_associations(
        &self,
        document: &dyn Document,
    ) -> Result<Vec<Association>> {
        let images = document.missing_description_images();
        self.gen_alt_associations(document, &images).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::dataflow::DataflowVersion;
    use crate::document::HtmlDocument;
    use crate::error::{AltTextError, Stage};
    use crate::testing::{ConcurrencyProbe, EchoDescription, FailOn};
    use crate::traits::DescriptionEngine;

    struct Fixture {
        _dir: TempDir,
        doc: HtmlDocument,
    }

    fn fixture(files: &[(&str, &[u8])]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut html = String::from("<html><body>");
        for (name, bytes) in files {
            std::fs::write(dir.path().join(name), bytes).unwrap();
            html.push_str(&format!(r#"<p>About {name}</p><img src="{name}">"#));
        }
        html.push_str("</body></html>");
        let doc = HtmlDocument::parse(html).unwrap().with_base_dir(dir.path());
        Fixture { _dir: dir, doc }
    }

    fn pipeline(engine: Arc<dyn DescriptionEngine>, sequential: bool) -> Pipeline {
        let builder = Pipeline::builder()
            .description_engine_shared(engine)
            .version(DataflowVersion::V1);
        let builder = if sequential {
            builder.sequential()
        } else {
            builder.concurrent(8)
        };
        builder.build().unwrap()
    }

    fn pairs(associations: &[Association]) -> HashSet<(String, String)> {
        associations
            .iter()
            .map(|a| (a.src.clone(), a.alt.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_modes_yield_the_same_associations() {
        let f = fixture(&[("img1.png", b"one"), ("img2.png", b"two")]);
        let images = f.doc.all_images();

        let sequential = pipeline(Arc::new(EchoDescription), true)
            .gen_alt_associations(&f.doc, &images)
            .await
            .unwrap();
        let concurrent = pipeline(Arc::new(EchoDescription), false)
            .gen_alt_associations(&f.doc, &images)
            .await
            .unwrap();

        let expected: HashSet<_> = [
            ("img1.png".to_string(), "IMAGE CAPTION: TEST img1.png".to_string()),
            ("img2.png".to_string(), "IMAGE CAPTION: TEST img2.png".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(pairs(&sequential), expected);
        assert_eq!(pairs(&concurrent), expected);
    }

    #[tokio::test]
    async fn test_concurrent_results_keep_input_order() {
        let names: Vec<String> = (0..20).map(|i| format!("img{i}.png")).collect();
        let files: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), n.as_bytes())).collect();
        let f = fixture(&files);

        let associations = pipeline(Arc::new(EchoDescription), false)
            .gen_alt_associations(&f.doc, &f.doc.all_images())
            .await
            .unwrap();

        let sources: Vec<_> = associations.iter().map(|a| a.src.as_str()).collect();
        assert_eq!(sources, names.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let names: Vec<String> = (0..12).map(|i| format!("img{i}.png")).collect();
        let files: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), n.as_bytes())).collect();
        let f = fixture(&files);

        let probe = Arc::new(ConcurrencyProbe::default());
        let pipeline = Pipeline::builder()
            .description_engine_shared(probe.clone())
            .version(DataflowVersion::V1)
            .concurrent(3)
            .build()
            .unwrap();
        let associations = pipeline
            .gen_alt_associations(&f.doc, &f.doc.all_images())
            .await
            .unwrap();

        assert_eq!(associations.len(), 12);
        assert!(probe.peak() <= 3, "peak was {}", probe.peak());
        assert!(probe.peak() >= 1);
    }

    #[tokio::test]
    async fn test_hashes_follow_image_bytes() {
        let f = fixture(&[("a.png", b"same"), ("b.png", b"same"), ("c.png", b"different")]);
        let associations = pipeline(Arc::new(EchoDescription), false)
            .gen_alt_associations(&f.doc, &f.doc.all_images())
            .await
            .unwrap();

        assert!(associations.iter().all(|a| a.hash.is_some()));
        assert_eq!(associations[0].hash, associations[1].hash);
        assert_ne!(associations[0].hash, associations[2].hash);
    }

    #[tokio::test]
    async fn test_one_failure_fails_the_batch_in_both_modes() {
        let f = fixture(&[("ok.png", b"1"), ("bad.png", b"2"), ("ok2.png", b"3")]);
        let images = f.doc.all_images();

        for sequential in [true, false] {
            let err = pipeline(Arc::new(FailOn("bad.png")), sequential)
                .gen_alt_associations(&f.doc, &images)
                .await
                .unwrap_err();
            match err {
                AltTextError::Engine { stage, src, .. } => {
                    assert_eq!(stage, Stage::Description);
                    assert_eq!(src, "bad.png");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_associations_skip_described_images() {
        let f = fixture(&[("a.png", b"1"), ("b.png", b"2")]);
        let mut doc = f.doc.clone();
        doc.set_description("a.png", "Already described").unwrap();

        let associations = pipeline(Arc::new(EchoDescription), true)
            .gen_missing_associations(&doc)
            .await
            .unwrap();
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].src, "b.png");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let f = fixture(&[]);
        let associations = pipeline(Arc::new(EchoDescription), false)
            .gen_alt_associations(&f.doc, &[])
            .await
            .unwrap();
        assert!(associations.is_empty());
    }
}
