//! Converter pipeline between remote and local entity shapes.

use converge_model::EntityRecord;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A converter rejected an entity.
#[derive(Debug, Clone, Error)]
#[error("conversion failed: {message}")]
pub struct ConvertError {
    /// What the converter objected to.
    pub message: String,
}

impl ConvertError {
    /// Creates a conversion error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A pure transform over a single entity.
///
/// Converters may perform lossy or derived transforms (e.g. splitting a
/// combined text field into a normalized local representation and back).
/// They must not perform I/O.
pub trait EntityConverter: Send + Sync {
    /// Converts one entity, or rejects it.
    fn convert(&self, record: &EntityRecord) -> Result<EntityRecord, ConvertError>;
}

impl<F> EntityConverter for F
where
    F: Fn(&EntityRecord) -> Result<EntityRecord, ConvertError> + Send + Sync,
{
    fn convert(&self, record: &EntityRecord) -> Result<EntityRecord, ConvertError> {
        self(record)
    }
}

/// The pass-through converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConvert;

impl EntityConverter for IdentityConvert {
    fn convert(&self, record: &EntityRecord) -> Result<EntityRecord, ConvertError> {
        Ok(record.clone())
    }
}

/// The converter pair of one entity type.
#[derive(Clone)]
pub struct ConverterPair {
    /// Remote shape → local shape, applied before local apply.
    pub incoming: Arc<dyn EntityConverter>,
    /// Local shape → remote shape, applied before transmission.
    pub outgoing: Arc<dyn EntityConverter>,
}

impl ConverterPair {
    /// Creates a pair from two converters.
    #[must_use]
    pub fn new(incoming: Arc<dyn EntityConverter>, outgoing: Arc<dyn EntityConverter>) -> Self {
        Self { incoming, outgoing }
    }

    /// A pair that passes entities through unchanged in both directions.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            incoming: Arc::new(IdentityConvert),
            outgoing: Arc::new(IdentityConvert),
        }
    }
}

impl std::fmt::Debug for ConverterPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterPair").finish_non_exhaustive()
    }
}

/// Converter pairs per entity type, populated once at startup.
///
/// A missing converter for a configured type is a configuration error,
/// surfaced eagerly at engine construction, never mid-cycle.
#[derive(Debug, Default)]
pub struct ConverterRegistry {
    pairs: HashMap<String, ConverterPair>,
}

impl ConverterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the converter pair for an entity type.
    pub fn register(&mut self, type_name: impl Into<String>, pair: ConverterPair) {
        self.pairs.insert(type_name.into(), pair);
    }

    /// Registers the identity pair for an entity type.
    pub fn register_identity(&mut self, type_name: impl Into<String>) {
        self.register(type_name, ConverterPair::identity());
    }

    /// Looks up the pair for an entity type.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&ConverterPair> {
        self.pairs.get(type_name)
    }

    /// Looks up the pair for an entity type, failing if unregistered.
    pub fn require(&self, type_name: &str) -> Result<&ConverterPair, crate::SyncError> {
        self.get(type_name)
            .ok_or_else(|| crate::SyncError::MissingConverter {
                type_name: type_name.to_string(),
            })
    }
}
