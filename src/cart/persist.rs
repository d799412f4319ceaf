use std::{
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::line::CartLineError;

/// The cart exactly as it sits in storage: one flat JSON object.
pub type RawCart = Map<String, Value>;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("cart storage holds invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("persisted cart is not a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Line(#[from] CartLineError),
}

/// Value stored under each cart key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoredLine {
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrp: Option<i64>,
}

/// Durable home of one cart.
pub trait CartPersistence: Send + Sync {
    /// `None` when nothing was ever saved.
    fn load(&self) -> Result<Option<RawCart>, CartError>;

    fn save(&self, raw: &RawCart) -> Result<(), CartError>;
}

/// Cart kept in a JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileCartPersistence {
    path: PathBuf,
}

impl JsonFileCartPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartPersistence for JsonFileCartPersistence {
    fn load(&self) -> Result<Option<RawCart>, CartError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(Some(map)),
            Value::Null => Ok(None),
            _ => Err(CartError::NotAnObject),
        }
    }

    fn save(&self, raw: &RawCart) -> Result<(), CartError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(raw)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Process-local cart storage.
#[derive(Debug, Default)]
pub struct MemoryCartPersistence {
    slot: Mutex<Option<RawCart>>,
}

impl MemoryCartPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: RawCart) -> Self {
        Self {
            slot: Mutex::new(Some(raw)),
        }
    }

    /// Whatever was saved last.
    pub fn saved(&self) -> Option<RawCart> {
        self.slot.lock().clone()
    }
}

impl CartPersistence for MemoryCartPersistence {
    fn load(&self) -> Result<Option<RawCart>, CartError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, raw: &RawCart) -> Result<(), CartError> {
        *self.slot.lock() = Some(raw.clone());
        Ok(())
    }
}

impl<P: CartPersistence + ?Sized> CartPersistence for std::sync::Arc<P> {
    fn load(&self) -> Result<Option<RawCart>, CartError> {
        (**self).load()
    }

    fn save(&self, raw: &RawCart) -> Result<(), CartError> {
        (**self).save(raw)
    }
}
