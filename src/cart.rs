//! Saved product pages, keyed by URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::record::ProductRecord;
use crate::snapshot::PageSnapshot;
use crate::store::{KeyValueStore, StoreError};

/// Store key holding the cart list.
pub const CART_KEY: &str = "cartItems";

/// One saved page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    /// Random id, regenerated on every save.
    pub id: String,
    /// Page title at save time.
    pub title: String,
    /// Page URL; unique within the cart.
    pub url: String,
    /// Save timestamp.
    pub date: DateTime<Utc>,
    /// Normalized record, when the page was processed before saving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ProductRecord>,
}

/// Result of [`Cart::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The URL was new.
    Inserted(CartEntry),
    /// An entry with the same URL was replaced.
    Updated(CartEntry),
}

impl SaveOutcome {
    /// The entry as written.
    pub fn entry(&self) -> &CartEntry {
        match self {
            Self::Inserted(entry) | Self::Updated(entry) => entry,
        }
    }
}

/// Cart operations over any [`KeyValueStore`].
#[derive(Debug)]
pub struct Cart<S> {
    store: S,
}

impl<S: KeyValueStore> Cart<S> {
    /// Wraps `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Gives the store back.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Saves `snapshot`, replacing any entry with the same URL in place.
    pub fn save(
        &mut self,
        snapshot: &PageSnapshot,
        record: Option<ProductRecord>,
    ) -> Result<SaveOutcome, StoreError> {
        let entry = CartEntry {
            id: Uuid::new_v4().to_string(),
            title: snapshot.title.clone(),
            url: snapshot.url.clone(),
            date: Utc::now(),
            record,
        };
        let mut entries = self.entries()?;
        let outcome = match entries.iter().position(|existing| existing.url == entry.url) {
            Some(idx) => {
                entries[idx] = entry.clone();
                SaveOutcome::Updated(entry)
            }
            None => {
                entries.push(entry.clone());
                SaveOutcome::Inserted(entry)
            }
        };
        self.write(&entries)?;
        info!(
            url = %outcome.entry().url,
            updated = matches!(outcome, SaveOutcome::Updated(_)),
            "cart entry saved"
        );
        Ok(outcome)
    }

    /// Entries, newest first.
    pub fn list(&self) -> Result<Vec<CartEntry>, StoreError> {
        let mut entries = self.entries()?;
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    /// Deletes the entry with `id`. Returns whether one existed.
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries)?;
        info!(%id, "cart entry deleted");
        Ok(true)
    }

    /// Removes every entry.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.remove(CART_KEY)?;
        info!("cart cleared");
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CartEntry>, StoreError> {
        self.store
            .get(CART_KEY)?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }

    fn write(&mut self, entries: &[CartEntry]) -> Result<(), StoreError> {
        let values = entries
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        self.store.set(CART_KEY, values)
    }
}
