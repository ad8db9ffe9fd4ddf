use std::sync::RwLock;

use serde::Deserialize;

use crate::error::{MedimindError, Result};
use crate::models::{Document, ManagedDocument};

/// One uploaded file, before ingestion assigns an identifier.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocumentUpload {
    Text {
        name: String,
        content: String,
    },
    /// `content` is base64 image data, as produced by `Document::from_image_bytes`.
    Image {
        name: String,
        content: String,
        mime_type: String,
    },
}

impl DocumentUpload {
    fn into_managed(self) -> ManagedDocument {
        match self {
            DocumentUpload::Text { name, content } => {
                ManagedDocument::new(name, Document::text(content))
            }
            DocumentUpload::Image {
                name,
                content,
                mime_type,
            } => ManagedDocument::new(
                name,
                Document {
                    kind: crate::models::DocumentKind::Image,
                    content,
                    mime_type: Some(mime_type),
                },
            ),
        }
    }
}

#[derive(Default)]
struct StoreInner {
    documents: Vec<ManagedDocument>,
    selected: Option<String>,
}

/// In-memory ordered document list for the session, with a selection cursor.
#[derive(Default)]
pub struct DocumentStore {
    inner: RwLock<StoreInner>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Ingests a batch of uploads, appending them in order and selecting the
    /// last one. Invalid documents are rejected before anything is stored.
    pub fn upload(&self, uploads: Vec<DocumentUpload>) -> Result<Vec<ManagedDocument>> {
        let managed: Vec<ManagedDocument> =
            uploads.into_iter().map(DocumentUpload::into_managed).collect();
        for doc in &managed {
            doc.document.validate()?;
        }

        let mut inner = self.write();
        if let Some(last) = managed.last() {
            inner.selected = Some(last.id.clone());
        }
        inner.documents.extend(managed.iter().cloned());
        Ok(managed)
    }

    pub fn list(&self) -> Vec<ManagedDocument> {
        self.read().documents.clone()
    }

    pub fn get(&self, id: &str) -> Result<ManagedDocument> {
        self.read()
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| MedimindError::DocumentNotFound(id.to_string()))
    }

    pub fn select(&self, id: &str) -> Result<ManagedDocument> {
        let mut inner = self.write();
        let doc = inner
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| MedimindError::DocumentNotFound(id.to_string()))?;
        inner.selected = Some(doc.id.clone());
        Ok(doc)
    }

    pub fn selected(&self) -> Option<ManagedDocument> {
        let inner = self.read();
        let id = inner.selected.as_deref()?;
        inner.documents.iter().find(|d| d.id == id).cloned()
    }

    /// Removes a document. Deleting the selected document selects the first
    /// remaining one, or none when the list becomes empty.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.write();
        let before = inner.documents.len();
        inner.documents.retain(|d| d.id != id);
        if inner.documents.len() == before {
            return Err(MedimindError::DocumentNotFound(id.to_string()));
        }
        if inner.selected.as_deref() == Some(id) {
            inner.selected = inner.documents.first().map(|d| d.id.clone());
        }
        Ok(())
    }
}
