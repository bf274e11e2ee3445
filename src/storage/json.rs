// src/storage/json.rs

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::AppError;

/// A record type kept in its own named collection (`<COLLECTION>.json`).
///
/// Every record serializes to a JSON object with an integer `id` field.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
}

/// Flat-file storage: one JSON array per collection under `root`.
///
/// Reads go straight to disk. Writes go through [`JsonTxn`], which holds the
/// storage-wide writer lock for its whole lifetime, so every read-modify-write
/// sequence is serialized against all others.
pub struct JsonStorage {
    root: PathBuf,
    writer: Mutex<()>,
}

impl JsonStorage {
    /// Opens (and creates if needed) the storage directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            writer: Mutex::new(()),
        })
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.json", collection))
    }

    async fn read_raw(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        match tokio::fs::read(self.path(collection)).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the collection file via temp file + rename so readers never see a torn write.
    async fn write_raw(&self, collection: &str, docs: &[Value]) -> Result<(), AppError> {
        let path = self.path(collection);
        let tmp = self.root.join(format!("{}.json.tmp", collection));
        let bytes = serde_json::to_vec_pretty(docs)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn all<D: Document>(&self) -> Result<Vec<D>, AppError> {
        decode_all(self.read_raw(D::COLLECTION).await?)
    }

    pub async fn get_by_id<D: Document>(&self, id: i64) -> Result<Option<D>, AppError> {
        let doc = self
            .read_raw(D::COLLECTION)
            .await?
            .into_iter()
            .find(|v| doc_id(v) == Some(id));
        Ok(doc.map(serde_json::from_value).transpose()?)
    }

    pub async fn find<D, F>(&self, pred: F) -> Result<Vec<D>, AppError>
    where
        D: Document,
        F: Fn(&D) -> bool + Send,
    {
        Ok(self.all::<D>().await?.into_iter().filter(|d| pred(d)).collect())
    }

    pub async fn find_one<D, F>(&self, pred: F) -> Result<Option<D>, AppError>
    where
        D: Document,
        F: Fn(&D) -> bool + Send,
    {
        Ok(self.all::<D>().await?.into_iter().find(|d| pred(d)))
    }

    /// Starts a write transaction. Waits for any other transaction to finish.
    pub async fn begin(&self) -> JsonTxn<'_> {
        JsonTxn {
            storage: self,
            _guard: self.writer.lock().await,
            staged: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Single-record insert; `make` receives the freshly assigned id.
    pub async fn add<D, F>(&self, make: F) -> Result<D, AppError>
    where
        D: Document,
        F: FnOnce(i64) -> D + Send,
    {
        let mut tx = self.begin().await;
        let doc = tx.add(make).await?;
        tx.commit().await?;
        Ok(doc)
    }

    /// Single-record update. `Ok(None)` when no record has that id.
    pub async fn update<D, F>(&self, id: i64, f: F) -> Result<Option<D>, AppError>
    where
        D: Document,
        F: FnOnce(&mut D) + Send,
    {
        let mut tx = self.begin().await;
        let doc = tx.update(id, f).await?;
        if doc.is_some() {
            tx.commit().await?;
        }
        Ok(doc)
    }
}

struct Staged {
    docs: Vec<Value>,
    dirty: bool,
}

/// An in-memory working copy of the collections it touches.
///
/// Changes reach disk only on [`JsonTxn::commit`]; dropping the transaction
/// discards them.
pub struct JsonTxn<'a> {
    storage: &'a JsonStorage,
    _guard: MutexGuard<'a, ()>,
    staged: HashMap<&'static str, Staged>,
    /// Collections in the order they were first touched.
    order: Vec<&'static str>,
}

impl<'a> JsonTxn<'a> {
    async fn load(&mut self, collection: &'static str) -> Result<&mut Staged, AppError> {
        if !self.staged.contains_key(collection) {
            let docs = self.storage.read_raw(collection).await?;
            self.staged.insert(collection, Staged { docs, dirty: false });
            self.order.push(collection);
        }
        self.staged
            .get_mut(collection)
            .ok_or_else(|| AppError::Internal(format!("collection '{}' not staged", collection)))
    }

    pub async fn all<D: Document>(&mut self) -> Result<Vec<D>, AppError> {
        let staged = self.load(D::COLLECTION).await?;
        decode_all(staged.docs.clone())
    }

    pub async fn find_one<D, F>(&mut self, pred: F) -> Result<Option<D>, AppError>
    where
        D: Document,
        F: Fn(&D) -> bool + Send,
    {
        Ok(self.all::<D>().await?.into_iter().find(|d| pred(d)))
    }

    /// Appends a record with id `max(id) + 1`.
    pub async fn add<D, F>(&mut self, make: F) -> Result<D, AppError>
    where
        D: Document,
        F: FnOnce(i64) -> D + Send,
    {
        let staged = self.load(D::COLLECTION).await?;
        let id = staged.docs.iter().filter_map(doc_id).max().unwrap_or(0) + 1;
        let doc = make(id);
        staged.docs.push(serde_json::to_value(&doc)?);
        staged.dirty = true;
        Ok(doc)
    }

    pub async fn update<D, F>(&mut self, id: i64, f: F) -> Result<Option<D>, AppError>
    where
        D: Document,
        F: FnOnce(&mut D) + Send,
    {
        let staged = self.load(D::COLLECTION).await?;
        let Some(slot) = staged.docs.iter_mut().find(|v| doc_id(v) == Some(id)) else {
            return Ok(None);
        };
        let mut doc: D = serde_json::from_value(slot.clone())?;
        f(&mut doc);
        *slot = serde_json::to_value(&doc)?;
        staged.dirty = true;
        Ok(Some(doc))
    }

    /// Applies `f` to every record matching `pred`; returns how many changed.
    pub async fn update_where<D, P, F>(&mut self, pred: P, f: F) -> Result<u64, AppError>
    where
        D: Document,
        P: Fn(&D) -> bool + Send,
        F: Fn(&mut D) + Send,
    {
        let staged = self.load(D::COLLECTION).await?;
        let mut changed = 0;
        for slot in staged.docs.iter_mut() {
            let mut doc: D = serde_json::from_value(slot.clone())?;
            if pred(&doc) {
                f(&mut doc);
                *slot = serde_json::to_value(&doc)?;
                changed += 1;
            }
        }
        if changed > 0 {
            staged.dirty = true;
        }
        Ok(changed)
    }

    /// Removes every record matching `pred`; returns how many were removed.
    pub async fn remove<D, F>(&mut self, pred: F) -> Result<usize, AppError>
    where
        D: Document,
        F: Fn(&D) -> bool + Send,
    {
        let staged = self.load(D::COLLECTION).await?;
        let mut doomed = Vec::with_capacity(staged.docs.len());
        for v in &staged.docs {
            let doc: D = serde_json::from_value(v.clone())?;
            doomed.push(pred(&doc));
        }
        let removed = doomed.iter().filter(|d| **d).count();
        if removed > 0 {
            let mut flags = doomed.into_iter();
            staged.docs.retain(|_| !flags.next().unwrap_or(false));
            staged.dirty = true;
        }
        Ok(removed)
    }

    /// Writes every modified collection back to disk, in the order the
    /// collections were first touched.
    ///
    /// Each file is replaced atomically, but the set of files is not: an I/O
    /// error partway leaves the earlier collections written. Callers touch the
    /// primary record before anything derived from it (a like before its
    /// notification), so a partial commit never leaves a notification without
    /// its cause.
    pub async fn commit(self) -> Result<(), AppError> {
        for collection in &self.order {
            match self.staged.get(collection) {
                Some(staged) if staged.dirty => {
                    self.storage.write_raw(collection, &staged.docs).await?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn doc_id(value: &Value) -> Option<i64> {
    value.get("id").and_then(Value::as_i64)
}

fn decode_all<D: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<D>, AppError> {
    docs.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<D>, _>>()
        .map_err(AppError::from)
}
