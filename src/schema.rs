//! # Schema Inference
//!
//! Backends that only make fields searchable once they have been declared
//! (Solr-like engines running without a schemaless update chain) need a
//! field list before the first document is indexed. This module derives that
//! list from sample documents and pushes it to the backend.
//!
//! ## Lifecycle
//!
//! The [`SchemaInferencer`] moves through
//! `Uninitialized -> Scanning -> Declaring -> Ready`:
//!
//! 1. **Scanning**: every document is walked. Nested mappings and lists of
//!    mappings are flattened, so a child key is hoisted into the top-level
//!    field namespace. Each scalar or scalar list yields a [`FieldDefinition`]
//!    and definitions observed under the same key are merged.
//! 2. **Declaring**: each field missing from the local cache is checked
//!    against the live schema and created if absent. A catch-all text field
//!    and a copy rule mirroring every field into it are declared last.
//! 3. **Ready**: the declared-field cache is kept for the lifetime of the
//!    inferencer and only ever grows.
//!
//! A failing field declaration is logged and skipped; the remaining fields
//! are still declared.

use crate::Document;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Name of the aggregate field every other field is copied into
pub const CATCH_ALL_FIELD: &str = "_text_";

/// Scalar type inferred for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    Float,
    Bool,
    String,
    Text,
}

impl FieldType {
    /// Solr field type name for this type
    pub fn solr_type(self, multi_valued: bool) -> &'static str {
        match (self, multi_valued) {
            (FieldType::Int, false) => "plong",
            (FieldType::Int, true) => "plongs",
            (FieldType::Float, false) => "pdouble",
            (FieldType::Float, true) => "pdoubles",
            (FieldType::Bool, false) => "boolean",
            (FieldType::Bool, true) => "booleans",
            (FieldType::String, false) => "string",
            (FieldType::String, true) => "strings",
            (FieldType::Text, _) => "text_general",
        }
    }
}

/// Inferred definition of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub field_type: FieldType,
    pub multi_valued: bool,
}

impl FieldDefinition {
    pub fn new(field_type: FieldType, multi_valued: bool) -> Self {
        Self {
            field_type,
            multi_valued,
        }
    }

    /// Combine two observations of the same field
    ///
    /// Conflicting types degrade to `String` so the field is never dropped;
    /// `multi_valued` is set if either observation was multi-valued. The
    /// operation is commutative and idempotent.
    pub fn merge(self, other: FieldDefinition) -> FieldDefinition {
        let field_type = if self.field_type == other.field_type {
            self.field_type
        } else {
            FieldType::String
        };

        FieldDefinition {
            field_type,
            multi_valued: self.multi_valued || other.multi_valued,
        }
    }
}

/// Inferred fields keyed by their flattened name
pub type InferredSchema = BTreeMap<String, FieldDefinition>;

/// Infer the definition of a scalar or scalar-list value
///
/// Returns `None` for nulls and mappings; mappings are never fields
/// themselves, their children are.
pub fn infer_value(value: &Value) -> Option<FieldDefinition> {
    match value {
        Value::Null | Value::Object(_) => None,
        Value::Array(items) => {
            let element_type = items
                .first()
                .and_then(infer_value)
                .map(|definition| definition.field_type)
                .unwrap_or(FieldType::String);
            Some(FieldDefinition::new(element_type, true))
        }
        scalar => infer_scalar(scalar).map(|field_type| FieldDefinition::new(field_type, false)),
    }
}

fn infer_scalar(value: &Value) -> Option<FieldType> {
    match value {
        Value::Bool(_) => Some(FieldType::Bool),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldType::Int),
        Value::Number(_) => Some(FieldType::Float),
        Value::String(s) if s.chars().any(char::is_whitespace) => Some(FieldType::Text),
        Value::String(_) => Some(FieldType::String),
        _ => None,
    }
}

fn is_list_of_mappings(items: &[Value]) -> bool {
    items.first().map_or(false, Value::is_object)
}

/// Walk a document and merge every field it defines into `fields`
///
/// A key reached more than once within the same document is multi-valued,
/// matching the list [`flatten_document`] builds for it.
pub fn collect_fields(document: &Document, fields: &mut InferredSchema) {
    let mut observed = InferredSchema::new();
    collect_into(document, false, &mut observed);

    for (name, definition) in observed {
        fields
            .entry(name)
            .and_modify(|existing| *existing = existing.merge(definition))
            .or_insert(definition);
    }
}

fn collect_into(document: &Document, within_list: bool, observed: &mut InferredSchema) {
    for (key, value) in document {
        match value {
            Value::Object(child) => collect_into(child, within_list, observed),
            Value::Array(items) if is_list_of_mappings(items) => {
                for item in items {
                    if let Value::Object(child) = item {
                        collect_into(child, true, observed);
                    }
                }
            }
            _ => {
                let Some(mut definition) = infer_value(value) else {
                    continue;
                };
                definition.multi_valued |= within_list;
                match observed.get_mut(key) {
                    Some(existing) => {
                        *existing = existing.merge(definition);
                        existing.multi_valued = true;
                    }
                    None => {
                        observed.insert(key.clone(), definition);
                    }
                }
            }
        }
    }
}

/// Infer the merged field set of a whole corpus
pub fn infer_fields(documents: &[Document]) -> InferredSchema {
    let mut fields = InferredSchema::new();
    for document in documents {
        collect_fields(document, &mut fields);
    }
    fields
}

/// Flatten a document the same way the inferencer walks it
///
/// Children of nested mappings are hoisted to the top level. Values reached
/// through a list of mappings, or hoisted onto a key that already holds a
/// value, are gathered into a list. Nulls are dropped.
pub fn flatten_document(document: &Document) -> Document {
    let mut flat = Document::new();
    flatten_into(document, false, &mut flat);
    flat
}

fn flatten_into(document: &Document, within_list: bool, flat: &mut Document) {
    for (key, value) in document {
        match value {
            Value::Null => {}
            Value::Object(child) => flatten_into(child, within_list, flat),
            Value::Array(items) if is_list_of_mappings(items) => {
                for item in items {
                    if let Value::Object(child) = item {
                        flatten_into(child, true, flat);
                    }
                }
            }
            _ => insert_flat(flat, key, value.clone(), within_list),
        }
    }
}

fn insert_flat(flat: &mut Document, key: &str, value: Value, as_list: bool) {
    match flat.get_mut(key) {
        Some(Value::Array(existing)) => match value {
            Value::Array(items) => existing.extend(items),
            other => existing.push(other),
        },
        Some(existing) => {
            let previous = existing.take();
            let mut items = vec![previous];
            match value {
                Value::Array(more) => items.extend(more),
                other => items.push(other),
            }
            *existing = Value::Array(items);
        }
        None => {
            let value = match value {
                Value::Array(_) => value,
                other if as_list => Value::Array(vec![other]),
                other => other,
            };
            flat.insert(key.to_string(), value);
        }
    }
}

/// Field creation request sent to the backend schema API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(rename = "multiValued")]
    pub multi_valued: bool,
    pub indexed: bool,
    pub stored: bool,
}

impl FieldDeclaration {
    /// Declaration for an inferred field
    pub fn from_definition(name: &str, definition: &FieldDefinition) -> Self {
        Self {
            name: name.to_string(),
            field_type: definition
                .field_type
                .solr_type(definition.multi_valued)
                .to_string(),
            multi_valued: definition.multi_valued,
            indexed: true,
            stored: true,
        }
    }

    /// Declaration for the aggregate field that unqualified queries hit
    pub fn catch_all(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Text.solr_type(true).to_string(),
            multi_valued: true,
            indexed: true,
            stored: false,
        }
    }
}

/// Schema-management sub-protocol of a backend requiring explicit fields
#[async_trait]
pub trait SchemaClient: Send + Sync {
    /// Check whether the live schema already defines `name`
    async fn field_exists(&self, name: &str) -> Result<bool>;

    /// Create a field
    async fn add_field(&self, field: &FieldDeclaration) -> Result<()>;

    /// Create a rule copying `source` (may be a glob) into `dest`
    async fn add_copy_field(&self, source: &str, dest: &str) -> Result<()>;
}

/// Progress of the inferencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceState {
    Uninitialized,
    Scanning,
    Declaring,
    Ready,
}

/// Outcome counts of one declaration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclarationSummary {
    /// Fields created by this pass
    pub declared: usize,
    /// Fields found in the cache or the live schema
    pub already_present: usize,
    /// Fields whose creation request failed
    pub failed: usize,
}

/// Scans documents and declares the inferred fields on a backend
pub struct SchemaInferencer {
    state: InferenceState,
    fields: InferredSchema,
    declared: HashSet<String>,
    copy_rule_declared: bool,
    catch_all_field: String,
}

impl Default for SchemaInferencer {
    fn default() -> Self {
        Self::new(CATCH_ALL_FIELD)
    }
}

impl SchemaInferencer {
    pub fn new(catch_all_field: &str) -> Self {
        Self {
            state: InferenceState::Uninitialized,
            fields: InferredSchema::new(),
            declared: HashSet::new(),
            copy_rule_declared: false,
            catch_all_field: catch_all_field.to_string(),
        }
    }

    pub fn state(&self) -> InferenceState {
        self.state
    }

    /// Fields inferred so far
    pub fn fields(&self) -> &InferredSchema {
        &self.fields
    }

    pub fn catch_all_field(&self) -> &str {
        &self.catch_all_field
    }

    /// Whether `name` is known to exist on the backend
    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    /// Merge the fields of `documents` into the inferred set
    pub fn scan(&mut self, documents: &[Document]) -> &InferredSchema {
        self.state = InferenceState::Scanning;
        for document in documents {
            collect_fields(document, &mut self.fields);
        }
        debug!(
            "Scanned {} documents, {} fields inferred",
            documents.len(),
            self.fields.len()
        );
        &self.fields
    }

    /// Declare every inferred field not yet known, then the catch-all field
    /// and its copy rule
    pub async fn declare(&mut self, client: &dyn SchemaClient) -> DeclarationSummary {
        self.state = InferenceState::Declaring;
        let mut summary = DeclarationSummary::default();

        let pending: Vec<FieldDeclaration> = self
            .fields
            .iter()
            .filter(|(name, _)| name.as_str() != self.catch_all_field)
            .map(|(name, definition)| FieldDeclaration::from_definition(name, definition))
            .collect();

        for declaration in pending {
            self.ensure_field(client, &declaration, &mut summary).await;
        }

        self.declare_catch_all(client, &mut summary).await;

        self.state = InferenceState::Ready;
        info!(
            "Schema ready: {} fields declared, {} already present, {} failed",
            summary.declared, summary.already_present, summary.failed
        );
        summary
    }

    /// Whether the catch-all field and its copy rule are in place
    pub fn catch_all_ready(&self) -> bool {
        self.copy_rule_declared && self.declared.contains(&self.catch_all_field)
    }

    /// Declare only the catch-all field and its copy rule
    ///
    /// Queries against the catch-all field need this even when no document
    /// has been scanned by this inferencer.
    pub async fn ensure_catch_all(&mut self, client: &dyn SchemaClient) -> DeclarationSummary {
        let mut summary = DeclarationSummary::default();
        if !self.catch_all_ready() {
            self.declare_catch_all(client, &mut summary).await;
        }
        summary
    }

    async fn declare_catch_all(
        &mut self,
        client: &dyn SchemaClient,
        summary: &mut DeclarationSummary,
    ) {
        let catch_all = FieldDeclaration::catch_all(&self.catch_all_field);
        self.ensure_field(client, &catch_all, summary).await;

        if !self.copy_rule_declared {
            match client.add_copy_field("*", &self.catch_all_field).await {
                Ok(()) => {
                    debug!("Declared copy rule * -> {}", self.catch_all_field);
                    self.copy_rule_declared = true;
                }
                Err(e) => warn!(
                    "Failed to declare copy rule * -> {}: {:#}",
                    self.catch_all_field, e
                ),
            }
        }
    }

    /// Scan `documents` and declare whatever they introduce
    pub async fn prepare(
        &mut self,
        documents: &[Document],
        client: &dyn SchemaClient,
    ) -> DeclarationSummary {
        self.scan(documents);
        self.declare(client).await
    }

    async fn ensure_field(
        &mut self,
        client: &dyn SchemaClient,
        declaration: &FieldDeclaration,
        summary: &mut DeclarationSummary,
    ) {
        if self.declared.contains(&declaration.name) {
            summary.already_present += 1;
            return;
        }

        match client.field_exists(&declaration.name).await {
            Ok(true) => {
                debug!("Field '{}' already exists on backend", declaration.name);
                self.declared.insert(declaration.name.clone());
                summary.already_present += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => debug!(
                "Could not check field '{}', attempting creation: {:#}",
                declaration.name, e
            ),
        }

        match client.add_field(declaration).await {
            Ok(()) => {
                debug!(
                    "Declared field '{}' as {}",
                    declaration.name, declaration.field_type
                );
                self.declared.insert(declaration.name.clone());
                summary.declared += 1;
            }
            Err(e) => {
                warn!("Failed to declare field '{}': {:#}", declaration.name, e);
                summary.failed += 1;
            }
        }
    }
}
