use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use warden_core::{
    ViewError,
    views::{PersistedView, ViewId, ViewStore},
};

/// View records kept as a JSON array of raw store documents.
///
/// Documents keep the store's shape (`_id`, `view_type`, `message_id`,
/// `args`) so exports of the `views` collection can be dropped in as is.
#[derive(Debug)]
pub struct JsonViewStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonViewStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_documents(&self) -> Result<Vec<Value>, ViewError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_documents(&path))
            .await
            .map_err(|err| ViewError::Store(err.into()))?
    }
}

fn read_documents(path: &Path) -> Result<Vec<Value>, ViewError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(ViewError::Store(
                anyhow::Error::new(err).context(format!("failed to read {}", path.display())),
            ));
        }
    };
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&contents)? {
        Value::Array(documents) => Ok(documents),
        _ => Err(ViewError::Store(anyhow::anyhow!(
            "{} does not hold a JSON array",
            path.display()
        ))),
    }
}

fn write_documents(path: &Path, documents: &[Value]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, documents)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

fn document_id(doc: &Value) -> Option<String> {
    match doc.get("_id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

#[async_trait]
impl ViewStore for JsonViewStore {
    async fn list_all(&self) -> Result<Vec<PersistedView>, ViewError> {
        let documents = self.read_documents().await?;
        let mut records = Vec::with_capacity(documents.len());
        for doc in &documents {
            match PersistedView::from_document(doc) {
                Ok(record) => records.push(record),
                Err(err) => warn!(error = %err, "skipping undecodable view document"),
            }
        }
        debug!(path = %self.path.display(), count = records.len(), "listed persisted views");
        Ok(records)
    }

    async fn delete_by_id(&self, id: &ViewId) -> Result<(), ViewError> {
        let _guard = self.write_lock.lock().await;
        let mut documents = self.read_documents().await?;
        let before = documents.len();
        documents.retain(|doc| document_id(doc).as_deref() != Some(id.0.as_str()));
        if documents.len() == before {
            debug!(id = %id, "view record already gone");
            return Ok(());
        }

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_documents(&path, &documents))
            .await
            .map_err(|err| ViewError::Store(err.into()))?
            .map_err(ViewError::Store)?;
        debug!(id = %id, "deleted view record");
        Ok(())
    }
}
