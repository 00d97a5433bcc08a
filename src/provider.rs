//! Boundaries to the surface being audited.
//!
//! The monitor never inspects how elements are rendered. It asks a
//! [`SnapshotProvider`] for element snapshots, listens for
//! [`ChangeNotice`]s, and optionally consults a [`RuleCatalog`].

use crate::error::ProviderError;
use crate::models::{ElementSnapshot, Severity};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Which part of the surface a snapshot request covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every element currently on the surface.
    All,
    /// Only the listed elements. Ids no longer present are omitted from the result.
    Elements(BTreeSet<String>),
}

/// A "something changed" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeNotice {
    /// Too much changed to track; re-evaluate everything.
    Bulk,
    /// One element changed.
    Element(String),
}

/// Source of element snapshots. Must be side-effect free from the monitor's view.
pub trait SnapshotProvider: Send + Sync {
    fn snapshot(&self, scope: Scope) -> BoxFuture<'_, Result<Vec<ElementSnapshot>, ProviderError>>;
}

fn filter_scope(elements: &[ElementSnapshot], scope: &Scope) -> Vec<ElementSnapshot> {
    match scope {
        Scope::All => elements.to_vec(),
        Scope::Elements(ids) => elements
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect(),
    }
}

/// In-memory provider whose elements can be replaced at any time.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    elements: Arc<Mutex<Vec<ElementSnapshot>>>,
}

impl StaticProvider {
    pub fn new(elements: Vec<ElementSnapshot>) -> Self {
        Self {
            elements: Arc::new(Mutex::new(elements)),
        }
    }

    /// Replace or insert one element.
    pub fn upsert(&self, element: ElementSnapshot) {
        if let Ok(mut elements) = self.elements.lock() {
            match elements.iter_mut().find(|e| e.id == element.id) {
                Some(existing) => *existing = element,
                None => elements.push(element),
            }
        }
    }

    pub fn remove(&self, id: &str) {
        if let Ok(mut elements) = self.elements.lock() {
            elements.retain(|e| e.id != id);
        }
    }
}

impl SnapshotProvider for StaticProvider {
    fn snapshot(&self, scope: Scope) -> BoxFuture<'_, Result<Vec<ElementSnapshot>, ProviderError>> {
        let result = self
            .elements
            .lock()
            .map(|elements| filter_scope(&elements, &scope))
            .map_err(|_| ProviderError::Unavailable("element store poisoned".to_string()));
        async move { result }.boxed()
    }
}

/// On-disk surface document read by [`FileProvider`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceDocument {
    pub elements: Vec<ElementSnapshot>,
}

/// Provider reading a JSON [`SurfaceDocument`] on every request.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SnapshotProvider for FileProvider {
    fn snapshot(&self, scope: Scope) -> BoxFuture<'_, Result<Vec<ElementSnapshot>, ProviderError>> {
        async move {
            let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                ProviderError::Unavailable(format!("cannot read {}: {}", self.path.display(), e))
            })?;
            let document: SurfaceDocument = serde_json::from_str(&content).map_err(|e| {
                ProviderError::Unavailable(format!("cannot parse {}: {}", self.path.display(), e))
            })?;
            debug!(
                "Loaded {} elements from {}",
                document.elements.len(),
                self.path.display()
            );
            Ok(filter_scope(&document.elements, &scope))
        }
        .boxed()
    }
}

/// A rule violation reported by an external WCAG rule catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFinding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
}

/// External catalog of WCAG rule predicates.
pub trait RuleCatalog: Send + Sync {
    fn evaluate(&self, element: &ElementSnapshot) -> Vec<RuleFinding>;
}

/// Catalog with no rules; the monitor then scores contrast only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRules;

impl RuleCatalog for NoRules {
    fn evaluate(&self, _element: &ElementSnapshot) -> Vec<RuleFinding> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    #[tokio::test]
    async fn test_static_provider_scopes() {
        let provider = StaticProvider::new(vec![
            ElementSnapshot::new("a", Rgb::BLACK, Rgb::WHITE),
            ElementSnapshot::new("b", Rgb::WHITE, Rgb::BLACK),
        ]);

        let all = provider.snapshot(Scope::All).await.unwrap();
        assert_eq!(all.len(), 2);

        let ids: BTreeSet<String> = ["b".to_string(), "gone".to_string()].into_iter().collect();
        let some = provider.snapshot(Scope::Elements(ids)).await.unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].id, "b");

        provider.remove("a");
        provider.upsert(ElementSnapshot::new("b", Rgb::BLACK, Rgb::BLACK));
        let all = provider.snapshot(Scope::All).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].foreground.resolve().unwrap(), Rgb::BLACK);
    }

    #[tokio::test]
    async fn test_file_provider_missing_file() {
        let provider = FileProvider::new("/definitely/not/here.json");
        assert!(matches!(
            provider.snapshot(Scope::All).await,
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_file_provider_reads_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.json");
        std::fs::write(
            &path,
            r##"{"elements": [{"id": "h1", "foreground": "#000", "background": "#fff"}]}"##,
        )
        .unwrap();

        let elements = FileProvider::new(&path).snapshot(Scope::All).await.unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].id, "h1");
    }

    #[tokio::test]
    async fn test_sample_fixture() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/surface.json");
        let elements = FileProvider::new(path).snapshot(Scope::All).await.unwrap();
        assert_eq!(elements.len(), 8);

        let title = elements.iter().find(|e| e.id == "header-title").unwrap();
        assert!(title.large_text());
        let broken = elements.iter().find(|e| e.id == "broken-widget").unwrap();
        assert!(broken.foreground.resolve().is_err());
    }
}
