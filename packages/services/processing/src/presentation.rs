//! Read-only views over a published [`ResultBundle`]: image navigation,
//! overlays, raw artifact JSON and export to files.

use std::path::{Path, PathBuf};

use crate::models::{Annotation, ArtifactKind, Result, ResultBundle, UploadedImage};

pub struct ResultViewer<'a> {
    bundle: &'a ResultBundle,
    current: usize,
    active_tab: ArtifactKind,
}

impl<'a> ResultViewer<'a> {
    pub fn new(bundle: &'a ResultBundle) -> Self {
        Self { bundle, current: 0, active_tab: ArtifactKind::Segmentation }
    }

    pub fn len(&self) -> usize {
        self.bundle.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundle.images.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_image(&self) -> Option<&'a UploadedImage> {
        self.bundle.images.get(self.current)
    }

    /// Overlays to draw on the current image.
    pub fn overlays(&self) -> &'a [Annotation] {
        self.current_image().map(|i| i.annotations.as_slice()).unwrap_or(&[])
    }

    /// Advances, wrapping from the last image to the first.
    pub fn next(&mut self) -> usize {
        if !self.is_empty() {
            self.current = (self.current + 1) % self.len();
        }
        self.current
    }

    /// Steps back, wrapping from the first image to the last.
    pub fn previous(&mut self) -> usize {
        if !self.is_empty() {
            self.current = if self.current == 0 { self.len() - 1 } else { self.current - 1 };
        }
        self.current
    }

    /// "2 / 5" style position label.
    pub fn position_label(&self) -> String {
        if self.is_empty() {
            return "0 / 0".to_string();
        }
        format!("{} / {}", self.current + 1, self.len())
    }

    pub fn active_tab(&self) -> ArtifactKind {
        self.active_tab
    }

    pub fn select_tab(&mut self, kind: ArtifactKind) {
        self.active_tab = kind;
    }

    pub fn raw_json(&self, kind: ArtifactKind) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.bundle.artifact_json(kind)?)?)
    }

    /// Writes the artifact as pretty JSON to `<dir>/<kind>-data.json`.
    pub async fn export(&self, kind: ArtifactKind, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(kind.file_name());
        tokio::fs::write(&path, self.raw_json(kind)?).await?;
        tracing::debug!(artifact = %kind, path = %path.display(), "Exported artifact");
        Ok(path)
    }

    pub async fn export_active(&self, dir: &Path) -> Result<PathBuf> {
        self.export(self.active_tab, dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassificationData, SegmentationData, SegmentationResult, Region};
    use chrono::Utc;

    fn bundle(count: usize) -> ResultBundle {
        let now = Utc::now();
        ResultBundle {
            images: (0..count)
                .map(|i| UploadedImage {
                    id: format!("img-{}", i),
                    url: format!("/uploads/{}.png", i),
                    annotations: vec![Annotation::BoundingBox { coordinates: [0.0, 0.0, 10.0, 10.0] }],
                    classification: vec!["unpaved".into()],
                })
                .collect(),
            segmentation_data: SegmentationData {
                version: "1.0".into(),
                timestamp: now,
                results: (0..count)
                    .map(|i| SegmentationResult {
                        image_id: format!("img-{}", i),
                        regions: vec![Region { id: i as u32, label: "road".into(), confidence: 0.9512 }],
                    })
                    .collect(),
            },
            classification_data: ClassificationData { version: "1.0".into(), timestamp: now, results: vec![] },
        }
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let b = bundle(2);
        let mut viewer = ResultViewer::new(&b);
        assert_eq!(viewer.current_index(), 0);
        assert_eq!(viewer.next(), 1);
        assert_eq!(viewer.next(), 0);
        assert_eq!(viewer.previous(), 1);
        assert_eq!(viewer.position_label(), "2 / 2");
        assert_eq!(viewer.current_image().unwrap().id, "img-1");
        assert_eq!(viewer.overlays().len(), 1);
    }

    #[test]
    fn empty_bundle_navigation_is_inert() {
        let b = bundle(0);
        let mut viewer = ResultViewer::new(&b);
        assert_eq!(viewer.next(), 0);
        assert_eq!(viewer.previous(), 0);
        assert!(viewer.current_image().is_none());
        assert!(viewer.overlays().is_empty());
        assert_eq!(viewer.position_label(), "0 / 0");
    }

    #[tokio::test]
    async fn export_round_trips_to_equal_artifact() {
        let b = bundle(3);
        let dir = tempfile::tempdir().unwrap();
        let mut viewer = ResultViewer::new(&b);

        let path = viewer.export(ArtifactKind::Segmentation, dir.path()).await.unwrap();
        assert!(path.ends_with("segmentation-data.json"));
        let parsed: SegmentationData = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, b.segmentation_data);

        viewer.select_tab(ArtifactKind::Classification);
        let path = viewer.export_active(dir.path()).await.unwrap();
        let parsed: ClassificationData = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, b.classification_data);
    }

    #[test]
    fn raw_json_is_pretty_printed() {
        let b = bundle(1);
        let raw = ResultViewer::new(&b).raw_json(ArtifactKind::Segmentation).unwrap();
        assert!(raw.contains("\n  \"version\": \"1.0\""));
    }
}
