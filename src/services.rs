use crate::allocator;
use crate::constants::MAX_ALLOCATION_ATTEMPTS;
use crate::error::{AppError, Result};
use crate::models::{is_well_formed_id, CreatedPaste, IdKind};
use crate::store::PasteStore;
use crate::validation;
use std::sync::Arc;

/// The ingestion/retrieval pipeline shared by the HTTP and byte-stream transports.
pub struct PasteService {
    store: Arc<dyn PasteStore>,
    deny_list: Vec<String>,
    base_url: String,
    max_attempts: usize,
}

impl PasteService {
    pub fn new(store: Arc<dyn PasteStore>, deny_list: Vec<String>, base_url: &str) -> Self {
        Self {
            store,
            deny_list,
            base_url: crate::config::normalize_base_url(base_url),
            max_attempts: MAX_ALLOCATION_ATTEMPTS,
        }
    }

    /// Validates `content`, then stores it under a fresh identifier.
    /// Nothing reaches the store if validation fails.
    pub async fn create(&self, content: &[u8], kind: IdKind) -> Result<CreatedPaste> {
        validation::validate(content, self.deny_list.as_slice())?;

        let id = allocator::allocate(self.store.as_ref(), content, kind, self.max_attempts).await?;
        let url = self.paste_url(&id);

        Ok(CreatedPaste { id, url })
    }

    /// Live content for `id`. Expired and unknown ids are both `NotFound`.
    pub async fn retrieve(&self, id: &str) -> Result<Vec<u8>> {
        if !is_well_formed_id(id) {
            return Err(AppError::NotFound);
        }

        self.store.get(id).await?.ok_or(AppError::NotFound)
    }

    pub fn paste_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
