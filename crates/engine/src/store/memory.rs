//! In-memory ledger store with optimistic-concurrency transactions.
//!
//! Documents are JSON values grouped into named collections. Every committed
//! mutation stamps the affected documents with a store-global commit number;
//! a transaction records the commit number of everything it reads and only
//! commits if none of those documents have moved since. On conflict the
//! whole transaction body re-runs against the current state, up to a
//! bounded number of attempts.
//!
//! Locks are held only for individual reads and for the commit phase, never
//! across a transaction body; the version validation at commit is what makes
//! the body atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{StoreError, TxnError};

/// Default bound on transaction attempts before surfacing a conflict.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// A versioned JSON document.
#[derive(Debug, Clone)]
struct Versioned {
    /// Commit number of the last write to this document.
    version: u64,
    data: Value,
}

/// Store state: collections of documents plus the commit counter.
///
/// The counter is global and strictly increasing, so a document that is
/// deleted and later recreated never reuses an old version (no ABA during
/// conflict validation). Version 0 means "absent".
#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, BTreeMap<String, Versioned>>,
    clock: u64,
}

impl State {
    fn version_of(&self, collection: &str, id: &str) -> u64 {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map_or(0, |doc| doc.version)
    }

    fn document(&self, collection: &str, id: &str) -> Option<&Versioned> {
        self.collections.get(collection).and_then(|docs| docs.get(id))
    }

    /// Apply one write under an already-advanced clock.
    fn apply(&mut self, write: Write, version: u64) {
        match write {
            Write::Set { collection, id, data } => {
                self.collections
                    .entry(collection)
                    .or_default()
                    .insert(id, Versioned { version, data });
            }
            Write::Delete { collection, id } => {
                if let Some(docs) = self.collections.get_mut(&collection) {
                    docs.remove(&id);
                }
            }
        }
    }
}

/// A buffered transaction write.
#[derive(Debug)]
enum Write {
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// The in-memory ledger store.
///
/// Cheaply cloneable; clones share the same underlying state. Construct one
/// per process and inject it into every service.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    state: Arc<RwLock<State>>,
    max_attempts: u32,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

// The public API is async to match the hosted store's contract even though
// the in-memory implementation never suspends.
#[allow(clippy::unused_async)]
impl MemoryLedger {
    /// Create an empty ledger with the given transaction attempt bound.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            max_attempts: max_attempts.max(1),
        }
    }

    fn lock_read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a single document, decoded into its entity type.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the stored document no longer
    /// decodes into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let state = self.lock_read();
        state
            .document(collection, id)
            .map(|doc| decode(collection, id, doc.data.clone()))
            .transpose()
    }

    /// List every document in a collection, in id order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` on the first document that fails to
    /// decode.
    pub async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        let state = self.lock_read();
        state
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .map(|(id, doc)| decode(collection, id, doc.data.clone()))
            .collect()
    }

    /// Create or fully replace a document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Encode` if the value is not encodable.
    pub async fn set<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let data = encode(value)?;
        let mut state = self.lock_write();
        state.clock += 1;
        let version = state.clock;
        state.apply(
            Write::Set {
                collection: collection.to_owned(),
                id: id.to_owned(),
                data,
            },
            version,
        );
        Ok(())
    }

    /// Shallow-merge fields into a document, creating it if absent.
    ///
    /// Matches the hosted store's `set(..., merge: true)`: top-level keys of
    /// the incoming object overwrite or extend the stored object; keys not
    /// present in the incoming object are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Encode` if the value is not encodable.
    pub async fn merge<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let incoming = encode(value)?;
        let mut state = self.lock_write();
        let merged = match (state.document(collection, id).map(|d| d.data.clone()), incoming) {
            (Some(Value::Object(mut existing)), Value::Object(fields)) => {
                for (key, field) in fields {
                    existing.insert(key, field);
                }
                Value::Object(existing)
            }
            (_, incoming) => incoming,
        };
        state.clock += 1;
        let version = state.clock;
        state.apply(
            Write::Set {
                collection: collection.to_owned(),
                id: id.to_owned(),
                data: merged,
            },
            version,
        );
        Ok(())
    }

    /// Delete a document. Returns whether it existed.
    pub async fn delete(&self, collection: &str, id: &str) -> bool {
        let mut state = self.lock_write();
        state.clock += 1;
        state
            .collections
            .get_mut(collection)
            .is_some_and(|docs| docs.remove(id).is_some())
    }

    /// Run an atomic multi-document transaction.
    ///
    /// The body reads documents (recording their versions) and buffers
    /// writes; the commit phase re-validates every read document's version
    /// under the write lock and either applies all buffered writes or
    /// re-runs the body. Domain aborts (`TxnError::Abort`) are returned
    /// immediately without retrying and without applying any write.
    ///
    /// # Errors
    ///
    /// - `TxnError::Abort` - the body's own domain decision.
    /// - `TxnError::Store(StoreError::Conflict)` - the attempt bound was
    ///   exhausted; safe to resubmit.
    /// - Other `TxnError::Store` values propagate read/encode failures from
    ///   the body.
    pub async fn run_transaction<T, E, F>(&self, mut body: F) -> Result<T, TxnError<E>>
    where
        F: FnMut(&mut Transaction<'_>) -> Result<T, TxnError<E>>,
    {
        for attempt in 1..=self.max_attempts {
            let mut tx = Transaction {
                state: &self.state,
                reads: HashMap::new(),
                writes: Vec::new(),
            };
            let value = body(&mut tx)?;
            let Transaction { reads, writes, .. } = tx;

            let mut state = self.lock_write();
            let valid = reads
                .iter()
                .all(|((collection, id), version)| state.version_of(collection, id) == *version);
            if valid {
                state.clock += 1;
                let version = state.clock;
                for write in writes {
                    state.apply(write, version);
                }
                return Ok(value);
            }
            drop(state);

            tracing::debug!(attempt, "ledger transaction conflict, retrying");
        }

        Err(TxnError::Store(StoreError::Conflict {
            attempts: self.max_attempts,
        }))
    }
}

/// Handle passed to a transaction body.
///
/// Reads are recorded in the transaction's read set; writes and deletes are
/// buffered until commit. All reads must happen before the first write.
pub struct Transaction<'a> {
    state: &'a RwLock<State>,
    reads: HashMap<(String, String), u64>,
    writes: Vec<Write>,
}

impl Transaction<'_> {
    /// Read a document within the transaction, recording it in the read set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ReadAfterWrite` if a write has already been
    /// buffered, and `StoreError::Corrupt` if the document fails to decode.
    pub fn read<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite {
                collection: collection.to_owned(),
                id: id.to_owned(),
            });
        }
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        self.reads.insert(
            (collection.to_owned(), id.to_owned()),
            state.version_of(collection, id),
        );
        state
            .document(collection, id)
            .map(|doc| decode(collection, id, doc.data.clone()))
            .transpose()
    }

    /// Buffer a create-or-replace write.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Encode` if the value is not encodable.
    pub fn write<T: Serialize>(
        &mut self,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let data = encode(value)?;
        self.writes.push(Write::Set {
            collection: collection.to_owned(),
            id: id.to_owned(),
            data,
        });
        Ok(())
    }

    /// Buffer a delete.
    pub fn delete(&mut self, collection: &str, id: &str) {
        self.writes.push(Write::Delete {
            collection: collection.to_owned(),
            id: id.to_owned(),
        });
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(StoreError::Encode)
}

fn decode<T: DeserializeOwned>(collection: &str, id: &str, data: Value) -> Result<T, StoreError> {
    serde_json::from_value(data).map_err(|source| StoreError::Corrupt {
        collection: collection.to_owned(),
        id: id.to_owned(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    /// Commit a document out-of-band, bypassing the async API, so tests can
    /// interfere from inside a synchronous transaction body.
    fn set_out_of_band(ledger: &MemoryLedger, collection: &str, id: &str, data: Value) {
        let mut state = ledger.lock_write();
        state.clock += 1;
        let version = state.clock;
        state.apply(
            Write::Set {
                collection: collection.to_owned(),
                id: id.to_owned(),
                data,
            },
            version,
        );
    }

    fn delete_out_of_band(ledger: &MemoryLedger, collection: &str, id: &str) {
        let mut state = ledger.lock_write();
        state.clock += 1;
        let version = state.clock;
        state.apply(
            Write::Delete {
                collection: collection.to_owned(),
                id: id.to_owned(),
            },
            version,
        );
    }

    #[tokio::test]
    async fn test_get_set_round_trip() {
        let ledger = MemoryLedger::default();
        let doc = Doc {
            name: "pencil".into(),
            count: 3,
        };
        ledger.set("things", "a", &doc).await.unwrap();
        let back: Option<Doc> = ledger.get("things", "a").await.unwrap();
        assert_eq!(back, Some(doc));
        let missing: Option<Doc> = ledger.get("things", "b").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_list_in_id_order() {
        let ledger = MemoryLedger::default();
        for id in ["b", "a", "c"] {
            let doc = Doc {
                name: id.into(),
                count: 0,
            };
            ledger.set("things", id, &doc).await.unwrap();
        }
        let all: Vec<Doc> = ledger.list("things").await.unwrap();
        let names: Vec<&str> = all.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_merge_leaves_unrelated_fields_intact() {
        let ledger = MemoryLedger::default();
        ledger
            .set("things", "a", &json!({"name": "pencil", "count": 3}))
            .await
            .unwrap();
        ledger
            .merge("things", "a", &json!({"count": 5}))
            .await
            .unwrap();
        let back: Option<Value> = ledger.get("things", "a").await.unwrap();
        assert_eq!(back, Some(json!({"name": "pencil", "count": 5})));
    }

    #[tokio::test]
    async fn test_merge_creates_when_absent() {
        let ledger = MemoryLedger::default();
        ledger
            .merge("things", "a", &json!({"count": 5}))
            .await
            .unwrap();
        let back: Option<Value> = ledger.get("things", "a").await.unwrap();
        assert_eq!(back, Some(json!({"count": 5})));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let ledger = MemoryLedger::default();
        ledger
            .set("things", "a", &json!({"name": "x", "count": 0}))
            .await
            .unwrap();
        assert!(ledger.delete("things", "a").await);
        assert!(!ledger.delete("things", "a").await);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let ledger = MemoryLedger::default();
        ledger
            .set("things", "a", &json!({"unexpected": true}))
            .await
            .unwrap();
        let result: Result<Option<Doc>, StoreError> = ledger.get("things", "a").await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_transaction_commits_all_writes() {
        let ledger = MemoryLedger::default();
        ledger
            .set("things", "a", &Doc {
                name: "a".into(),
                count: 1,
            })
            .await
            .unwrap();

        ledger
            .run_transaction::<_, (), _>(|tx| {
                let mut doc: Doc = tx.read("things", "a")?.ok_or(TxnError::Abort(()))?;
                doc.count += 1;
                tx.write("things", "a", &doc)?;
                tx.write("things", "b", &Doc {
                    name: "b".into(),
                    count: 0,
                })?;
                Ok(())
            })
            .await
            .unwrap();

        let a: Doc = ledger.get("things", "a").await.unwrap().unwrap();
        let b: Doc = ledger.get("things", "b").await.unwrap().unwrap();
        assert_eq!(a.count, 2);
        assert_eq!(b.name, "b");
    }

    #[tokio::test]
    async fn test_abort_applies_nothing_and_does_not_retry() {
        let ledger = MemoryLedger::default();
        let mut runs = 0;
        let result: Result<(), TxnError<&str>> = ledger
            .run_transaction(|tx| {
                runs += 1;
                tx.write("things", "a", &json!({"x": 1}))?;
                Err(TxnError::Abort("nope"))
            })
            .await;

        assert!(matches!(result, Err(TxnError::Abort("nope"))));
        assert_eq!(runs, 1);
        let a: Option<Value> = ledger.get("things", "a").await.unwrap();
        assert_eq!(a, None);
    }

    #[tokio::test]
    async fn test_read_after_write_is_rejected() {
        let ledger = MemoryLedger::default();
        let result: Result<(), TxnError<()>> = ledger
            .run_transaction(|tx| {
                tx.write("things", "a", &json!({"x": 1}))?;
                let _: Option<Doc> = tx.read("things", "b")?;
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(TxnError::Store(StoreError::ReadAfterWrite { .. }))
        ));
    }

    #[tokio::test]
    async fn test_conflicting_commit_forces_retry() {
        let ledger = MemoryLedger::default();
        ledger
            .set("things", "a", &Doc {
                name: "a".into(),
                count: 0,
            })
            .await
            .unwrap();

        // The first attempt reads the document, then the document moves
        // before the commit phase; the version check fails and the body
        // re-runs against the new state.
        let mut attempts = 0;
        let interfering = ledger.clone();
        let result: Result<u32, TxnError<()>> = ledger
            .run_transaction(|tx| {
                attempts += 1;
                let doc: Doc = tx.read("things", "a")?.ok_or(TxnError::Abort(()))?;
                if attempts == 1 {
                    set_out_of_band(
                        &interfering,
                        "things",
                        "a",
                        json!({"name": "a", "count": 99}),
                    );
                }
                tx.write("things", "a", &Doc {
                    name: "a".into(),
                    count: doc.count + 1,
                })?;
                Ok(doc.count)
            })
            .await;

        assert_eq!(attempts, 2);
        assert!(matches!(result, Ok(99)));
        let a: Doc = ledger.get("things", "a").await.unwrap().unwrap();
        assert_eq!(a.count, 100);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_conflict() {
        let ledger = MemoryLedger::new(3);
        ledger.set("things", "a", &json!({"v": 0})).await.unwrap();

        let interfering = ledger.clone();
        let mut attempts = 0;
        let result: Result<(), TxnError<()>> = ledger
            .run_transaction(|tx| {
                attempts += 1;
                let _: Option<Value> = tx.read("things", "a")?;
                // Every attempt loses the race.
                set_out_of_band(&interfering, "things", "a", json!({"v": attempts}));
                tx.write("things", "a", &json!({"v": "mine"}))?;
                Ok(())
            })
            .await;

        assert_eq!(attempts, 3);
        assert!(matches!(
            result,
            Err(TxnError::Store(StoreError::Conflict { attempts: 3 }))
        ));
    }

    #[tokio::test]
    async fn test_version_survives_delete_and_recreate() {
        let ledger = MemoryLedger::default();
        ledger.set("things", "a", &json!({"v": 1})).await.unwrap();

        // Delete and recreate between read and commit; the recreated
        // version must still invalidate the recorded one.
        let mut attempts = 0;
        let interfering = ledger.clone();
        let result: Result<(), TxnError<()>> = ledger
            .run_transaction(|tx| {
                attempts += 1;
                let _: Option<Value> = tx.read("things", "a")?;
                if attempts == 1 {
                    delete_out_of_band(&interfering, "things", "a");
                    set_out_of_band(&interfering, "things", "a", json!({"v": 2}));
                }
                tx.write("things", "a", &json!({"v": 3}))?;
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_transaction_delete_is_atomic_with_writes() {
        let ledger = MemoryLedger::default();
        ledger.set("things", "a", &json!({"v": 1})).await.unwrap();

        ledger
            .run_transaction::<_, (), _>(|tx| {
                let _: Option<Value> = tx.read("things", "a")?;
                tx.write("things", "b", &json!({"v": 2}))?;
                tx.delete("things", "a");
                Ok(())
            })
            .await
            .unwrap();

        let a: Option<Value> = ledger.get("things", "a").await.unwrap();
        let b: Option<Value> = ledger.get("things", "b").await.unwrap();
        assert_eq!(a, None);
        assert_eq!(b, Some(json!({"v": 2})));
    }
}
