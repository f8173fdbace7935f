use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use super::{Hotkey, Macro, MacroDraft, MacroId};
use crate::geometry::Rect;

#[derive(Debug, Error)]
pub enum MacroStoreError {
    #[error("hotkey {hotkey} is already used by macro \"{existing_name}\"")]
    HotkeyCollision {
        hotkey: Hotkey,
        existing: MacroId,
        existing_name: String,
    },
    #[error("macro {0} not found")]
    NotFound(MacroId),
    #[error("macro name must not be empty")]
    EmptyName,
    #[error("failed to read macros from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse macros in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write macros to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type MacroStoreResult<T> = std::result::Result<T, MacroStoreError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MacroStats {
    pub total: usize,
    pub ready: usize,
    pub pending: usize,
}

/// Ordered macro collection with write-time validation.
///
/// Every write runs under one lock, so validation and mutation are atomic with
/// respect to other writers in this process. When backed by a file, each write
/// starts from the file's current contents, so macros written by another
/// process in the meantime are kept and take part in the collision check. A
/// write that cannot be persisted is rolled back.
#[derive(Debug)]
pub struct MacroStore {
    macros: Mutex<Vec<Macro>>,
    path: Option<PathBuf>,
}

impl MacroStore {
    pub fn in_memory() -> Self {
        Self::with_macros(Vec::new())
    }

    pub fn with_macros(macros: Vec<Macro>) -> Self {
        Self {
            macros: Mutex::new(macros),
            path: None,
        }
    }

    /// Opens a JSON-backed store; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> MacroStoreResult<Self> {
        let path = path.into();
        let macros = read_macros(&path)?;
        Ok(Self {
            macros: Mutex::new(macros),
            path: Some(path),
        })
    }

    /// Re-reads the backing file, picking up edits made by other processes.
    /// In-memory stores are left as they are.
    pub fn reload(&self) -> MacroStoreResult<usize> {
        let Some(path) = &self.path else {
            return Ok(self.lock().len());
        };
        let macros = read_macros(path)?;
        let count = macros.len();
        *self.lock() = macros;
        tracing::debug!(?path, count, "macro store reloaded");
        Ok(count)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Macro>> {
        self.macros.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn list(&self) -> Vec<Macro> {
        self.lock().clone()
    }

    pub fn get(&self, id: MacroId) -> Option<Macro> {
        self.lock().iter().find(|item| item.id == id).cloned()
    }

    /// Inserts or replaces `item` by id. Rejected, leaving the store
    /// untouched, when another macro already claims the same hotkey.
    pub fn upsert(&self, item: Macro) -> MacroStoreResult<()> {
        let mut macros = self.lock();
        self.write_with(&mut macros, |macros| {
            check_hotkey_available(macros, &item)?;
            match macros.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => *existing = item.clone(),
                None => macros.push(item.clone()),
            }
            Ok(())
        })
    }

    /// Creates a pending macro (no area) from `draft`.
    pub fn create(&self, draft: MacroDraft) -> MacroStoreResult<Macro> {
        let item = Macro {
            id: MacroId::new(),
            name: validated_name(&draft.name)?,
            hotkey: draft.hotkey,
            color: draft.color,
            area: None,
        };
        self.upsert(item.clone())?;
        tracing::info!(id = %item.id, name = %item.name, "macro created");
        Ok(item)
    }

    /// Replaces the editable fields of an existing macro, keeping its area.
    pub fn update(&self, id: MacroId, draft: MacroDraft) -> MacroStoreResult<Macro> {
        let name = validated_name(&draft.name)?;
        let mut macros = self.lock();
        let mut updated = None;
        self.write_with(&mut macros, |macros| {
            let index = macros
                .iter()
                .position(|item| item.id == id)
                .ok_or(MacroStoreError::NotFound(id))?;
            let item = Macro {
                name,
                hotkey: draft.hotkey,
                color: draft.color,
                ..macros[index].clone()
            };
            check_hotkey_available(macros, &item)?;
            macros[index] = item.clone();
            updated = Some(item);
            Ok(())
        })?;
        updated.ok_or(MacroStoreError::NotFound(id))
    }

    pub fn assign_area(&self, id: MacroId, area: Rect) -> MacroStoreResult<Macro> {
        let mut macros = self.lock();
        let mut updated = None;
        self.write_with(&mut macros, |macros| {
            let item = macros
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or(MacroStoreError::NotFound(id))?;
            item.area = Some(area);
            updated = Some(item.clone());
            Ok(())
        })?;
        updated.ok_or(MacroStoreError::NotFound(id))
    }

    /// Removes a macro; returns the removed definition.
    pub fn delete(&self, id: MacroId) -> MacroStoreResult<Macro> {
        let mut macros = self.lock();
        let mut removed = None;
        self.write_with(&mut macros, |macros| {
            let index = macros
                .iter()
                .position(|item| item.id == id)
                .ok_or(MacroStoreError::NotFound(id))?;
            removed = Some(macros.remove(index));
            Ok(())
        })?;
        removed.ok_or(MacroStoreError::NotFound(id))
    }

    pub fn statistics(&self) -> MacroStats {
        let macros = self.lock();
        let ready = macros.iter().filter(|item| item.is_ready()).count();
        MacroStats {
            total: macros.len(),
            ready,
            pending: macros.len() - ready,
        }
    }

    pub fn ready_macros(&self) -> Vec<Macro> {
        self.lock()
            .iter()
            .filter(|item| item.is_ready())
            .cloned()
            .collect()
    }

    pub fn first_pending(&self) -> Option<Macro> {
        self.lock().iter().find(|item| !item.is_ready()).cloned()
    }

    /// Applies `change` to a scratch copy and commits it only when both the
    /// change and the file write succeed. File-backed stores take the copy
    /// from disk rather than from memory.
    fn write_with<F>(&self, macros: &mut Vec<Macro>, change: F) -> MacroStoreResult<()>
    where
        F: FnOnce(&mut Vec<Macro>) -> MacroStoreResult<()>,
    {
        let mut next = match &self.path {
            Some(path) => read_macros(path)?,
            None => macros.clone(),
        };
        change(&mut next)?;
        if let Some(path) = &self.path {
            persist(path, &next)?;
        }
        *macros = next;
        Ok(())
    }
}

impl Default for MacroStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn validated_name(name: &str) -> MacroStoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MacroStoreError::EmptyName);
    }
    Ok(name.to_string())
}

fn check_hotkey_available(macros: &[Macro], candidate: &Macro) -> MacroStoreResult<()> {
    let Some(hotkey) = candidate.hotkey.as_ref() else {
        return Ok(());
    };
    match macros
        .iter()
        .find(|other| other.id != candidate.id && other.hotkey.as_ref() == Some(hotkey))
    {
        Some(other) => Err(MacroStoreError::HotkeyCollision {
            hotkey: hotkey.clone(),
            existing: other.id,
            existing_name: other.name.clone(),
        }),
        None => Ok(()),
    }
}

fn read_macros(path: &Path) -> MacroStoreResult<Vec<Macro>> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|source| MacroStoreError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(MacroStoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn persist(path: &Path, macros: &[Macro]) -> MacroStoreResult<()> {
    let write_error = |source| MacroStoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    let json = serde_json::to_vec_pretty(macros)
        .map_err(|err| write_error(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json).map_err(write_error)?;
    fs::rename(&staging, path).map_err(write_error)
}
