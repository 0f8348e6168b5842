//! Upsert client
//!
//! Binds one collection at construction and writes records into it. Every
//! record is validated before anything is sent, and each call submits its
//! whole batch through a single native upsert request.
//!
//! Keys are checked against the primary field's declared `max_length`, so
//! an over-long key fails locally instead of being rejected by the store.
//!
//! A store that confirms fewer records than were submitted is reported as
//! `PartialInsert`. Records the store did accept stay written: there is no
//! compensating delete.

use crate::backend::RecordLayout;
use crate::connection::Connection;
use annlink_core::{
    validate_key_length, validate_record_key, validate_sidecar, validate_vector, AnnError,
    AnnResult, FieldType, RecordId, Sidecar, VectorRecord,
};

/// A record to upsert; `key: None` generates a UUID
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    /// Caller key, or `None` for a random one
    pub key: Option<String>,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Scalar fields
    pub sidecar: Sidecar,
}

impl NewRecord {
    /// Record with a generated key
    pub fn new(vector: Vec<f32>, sidecar: Sidecar) -> Self {
        NewRecord {
            key: None,
            vector,
            sidecar,
        }
    }

    /// Record with an explicit key
    pub fn keyed(key: impl Into<String>, vector: Vec<f32>, sidecar: Sidecar) -> Self {
        NewRecord {
            key: Some(key.into()),
            vector,
            sidecar,
        }
    }
}

/// Writes records into one collection
pub struct UpsertClient {
    connection: Connection,
    collection: String,
    layout: RecordLayout,
    dimension: usize,
    key_max_length: Option<usize>,
}

impl UpsertClient {
    /// Bind a collection
    ///
    /// # Errors
    ///
    /// `Schema` if the collection does not exist, has no primary key, or
    /// its first vector field is not a float vector.
    pub fn new(connection: Connection, collection: &str) -> AnnResult<Self> {
        let descriptor = connection.describe_collection(collection)?;

        let primary = descriptor
            .primary_field()
            .ok_or_else(|| AnnError::schema(collection, "collection has no primary key"))?;
        let vector = descriptor
            .first_vector_field()
            .ok_or_else(|| AnnError::schema(collection, "collection has no vector field"))?;
        let dimension = match vector.field_type {
            FieldType::FloatVector { dim } => dim,
            other => {
                return Err(AnnError::schema(
                    collection,
                    format!(
                        "vector field '{}' is {:?}; only float vectors can be written",
                        vector.name, other
                    ),
                ))
            }
        };

        // Zero means the store did not report a length
        let key_max_length = match primary.field_type {
            FieldType::VarChar { max_length } if max_length > 0 => Some(max_length),
            _ => None,
        };

        let layout = RecordLayout::new(primary.name.clone(), vector.name.clone());
        tracing::debug!(
            target: "annlink::upsert",
            handle = %connection.id(),
            collection,
            primary = %layout.primary_field,
            vector = %layout.vector_field,
            dimension,
            key_max_length,
            "Bound upsert client"
        );

        Ok(UpsertClient {
            connection,
            collection: collection.to_string(),
            layout,
            dimension,
            key_max_length,
        })
    }

    /// Bound collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Field layout records are written with
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Vector dimension the collection expects
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Longest key the primary field accepts, if it declares one
    pub fn key_max_length(&self) -> Option<usize> {
        self.key_max_length
    }

    fn validate_key(&self, key: &str) -> AnnResult<()> {
        validate_record_key(key)?;
        match self.key_max_length {
            Some(max_length) => validate_key_length(key, max_length),
            None => Ok(()),
        }
    }

    /// Upsert one record; returns the accepted count (1 on success)
    pub fn upsert(
        &self,
        key: Option<&str>,
        vector: Vec<f32>,
        sidecar: Sidecar,
    ) -> AnnResult<usize> {
        self.upsert_batch(vec![NewRecord {
            key: key.map(str::to_string),
            vector,
            sidecar,
        }])
    }

    /// Upsert a batch in one request
    pub fn upsert_batch(&self, batch: Vec<NewRecord>) -> AnnResult<usize> {
        let records = batch
            .into_iter()
            .map(|r| {
                let id = match r.key {
                    Some(key) => RecordId::new(key),
                    None => RecordId::random(),
                };
                VectorRecord::new(id, r.vector, r.sidecar)
            })
            .collect::<Vec<_>>();
        self.upsert_records(&records)
    }

    /// Upsert fully-formed records in one request
    pub fn upsert_records(&self, records: &[VectorRecord]) -> AnnResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let reserved = [
            self.layout.primary_field.as_str(),
            self.layout.vector_field.as_str(),
        ];
        for record in records {
            self.validate_key(record.id.as_str())?;
            validate_vector(&self.collection, self.dimension, &record.vector)?;
            validate_sidecar(&record.sidecar, &reserved)?;
        }

        let submitted = records.len();
        let accepted = self
            .connection
            .backend()?
            .upsert(&self.collection, &self.layout, records)
            .map_err(|e| match e {
                AnnError::Insert { .. } | AnnError::PartialInsert { .. } => e,
                other => AnnError::insert(&self.collection, other.to_string()),
            })?;

        if accepted != submitted {
            tracing::error!(
                target: "annlink::upsert",
                handle = %self.connection.id(),
                collection = %self.collection,
                submitted,
                accepted,
                "Store accepted a different number of records than submitted"
            );
            return Err(AnnError::PartialInsert {
                collection: self.collection.clone(),
                submitted,
                accepted,
            });
        }

        tracing::debug!(
            target: "annlink::upsert",
            handle = %self.connection.id(),
            collection = %self.collection,
            count = accepted,
            "Upserted records"
        );
        Ok(accepted)
    }

    /// Delete records by id; returns the count the store reports
    pub fn delete(&self, ids: &[RecordId]) -> AnnResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        for id in ids {
            self.validate_key(id.as_str())?;
        }
        self.connection.backend()?.delete(&self.collection, ids)
    }

    /// Number of records in the collection
    pub fn count(&self) -> AnnResult<u64> {
        self.connection.count(&self.collection)
    }
}

impl std::fmt::Debug for UpsertClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpsertClient")
            .field("connection", &self.connection)
            .field("collection", &self.collection)
            .field("layout", &self.layout)
            .field("dimension", &self.dimension)
            .field("key_max_length", &self.key_max_length)
            .finish()
    }
}
