//! Lazy per-record model caches.
//!
//! One [`ModelSet`] instance is built per encode or decode invocation and
//! dropped with it; nothing learned from one record leaks into the next.
//! The contextual overlay in [`context`](crate::context) layers tuned
//! models on the same interface.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::Model;
use crate::schema::{EnumDescriptor, FieldDescriptor};

/// Source of coding models for one record walk.
///
/// The walker calls these in stream order on both sides, so two instances
/// fed the same record shape hand out the same model sequence.
pub trait ModelSet {
    /// Fixed `{1, 1}` boolean model.
    fn bool_model(&self) -> Arc<Model>;

    /// Fixed uniform 256-symbol byte model.
    fn byte_model(&self) -> Arc<Model>;

    /// Byte-granular model for a field's value bytes.
    fn field_model(&mut self, message_type: &str, fpath: &str, field: &FieldDescriptor)
    -> Arc<Model>;

    /// Model with one weight per declared enum value.
    fn enum_model(
        &mut self,
        message_type: &str,
        fpath: &str,
        enumeration: &EnumDescriptor,
    ) -> Arc<Model>;

    /// Model for list and map length varint bytes.
    fn length_model(&mut self, message_type: &str, lpath: &str) -> Arc<Model>;

    /// Biased model for a named boolean field.
    fn field_bool_model(&mut self, _name: &str) -> Arc<Model> {
        self.bool_model()
    }

    /// Biased model for a presence probe.
    fn presence_model(&mut self, _name: &str) -> Arc<Model> {
        self.bool_model()
    }

    /// Position-tuned model for varint value bytes.
    fn varint_model(&self, _first: bool) -> Arc<Model> {
        self.byte_model()
    }
}

/// Minimal adaptive cache: models keyed by field path alone, every miss
/// filled with a uniform default.
pub struct AdaptiveModels {
    bool_model: Arc<Model>,
    byte_model: Arc<Model>,
    cache: HashMap<String, Arc<Model>>,
}

impl AdaptiveModels {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bool_model: Arc::new(Model::bit()),
            byte_model: Arc::new(Model::uniform(256)),
            cache: HashMap::new(),
        }
    }
}

impl Default for AdaptiveModels {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSet for AdaptiveModels {
    fn bool_model(&self) -> Arc<Model> {
        self.bool_model.clone()
    }

    fn byte_model(&self) -> Arc<Model> {
        self.byte_model.clone()
    }

    fn field_model(
        &mut self,
        _message_type: &str,
        fpath: &str,
        _field: &FieldDescriptor,
    ) -> Arc<Model> {
        let fallback = &self.byte_model;
        self.cache
            .entry(fpath.to_owned())
            .or_insert_with(|| fallback.clone())
            .clone()
    }

    fn enum_model(
        &mut self,
        _message_type: &str,
        fpath: &str,
        enumeration: &EnumDescriptor,
    ) -> Arc<Model> {
        self.cache
            .entry(fpath.to_owned())
            .or_insert_with(|| Arc::new(Model::uniform(enumeration.values().len())))
            .clone()
    }

    fn length_model(&mut self, _message_type: &str, lpath: &str) -> Arc<Model> {
        let fallback = &self.byte_model;
        self.cache
            .entry(lpath.to_owned())
            .or_insert_with(|| fallback.clone())
            .clone()
    }
}
