use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Value;
use tracing::{error, info};

use crate::config::Config;
use crate::document::StoreDocument;
use crate::error::FlagError;

/// Attribute holding the partition key of the flag document.
const PARTITION_KEY: &str = "_pk";

/// Read side of the backing document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads the full flag document.
    async fn load(&self) -> Result<StoreDocument, FlagError>;
}

/// Flag document store backed by a single DynamoDB item.
pub struct DynamoStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
    record_name: String,
}

impl DynamoStore {
    /// Builds a store from ambient AWS credentials, honoring the region and
    /// endpoint overrides in `config`.
    pub async fn connect(config: &Config) -> DynamoStore {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        info!(
            table = %config.table_name,
            record = %config.record_name,
            "connecting to DynamoDB flag store"
        );
        Self::with_client(aws_sdk_dynamodb::Client::new(&sdk_config), config)
    }

    /// Builds a store around an existing DynamoDB client.
    pub fn with_client(client: aws_sdk_dynamodb::Client, config: &Config) -> DynamoStore {
        DynamoStore {
            client,
            table_name: config.table_name.clone(),
            record_name: config.record_name.clone(),
        }
    }

    /// Sets a single boolean feature directly in the stored document.
    ///
    /// Writes bypass every client-side cache; running clients observe the
    /// change at their next refresh.
    pub async fn set_feature(&self, feature: &str, value: bool) -> Result<(), FlagError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, AttributeValue::S(self.record_name.clone()))
            .update_expression("SET features.#f = :v")
            .expression_attribute_names("#f", feature)
            .expression_attribute_values(":v", AttributeValue::Bool(value))
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(e).to_string();
                error!("failed to set feature {feature}: {message}");
                FlagError::StoreUnavailable(message)
            })?;
        Ok(())
    }

    /// Removes a single feature from the stored document.
    pub async fn remove_feature(&self, feature: &str) -> Result<(), FlagError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, AttributeValue::S(self.record_name.clone()))
            .update_expression("REMOVE features.#f")
            .expression_attribute_names("#f", feature)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(e).to_string();
                error!("failed to remove feature {feature}: {message}");
                FlagError::StoreUnavailable(message)
            })?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for DynamoStore {
    async fn load(&self) -> Result<StoreDocument, FlagError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, AttributeValue::S(self.record_name.clone()))
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(e).to_string();
                error!("failed to load flag document: {message}");
                FlagError::StoreUnavailable(message)
            })?;
        let item = output
            .item()
            .filter(|item| !item.is_empty())
            .ok_or(FlagError::RecordMissing)?;
        decode_document(item)
    }
}

/// Decodes a DynamoDB item into the flag document by bridging attribute
/// values to JSON.
fn decode_document(item: &HashMap<String, AttributeValue>) -> Result<StoreDocument, FlagError> {
    let mut object = serde_json::Map::new();
    for (name, attribute) in item {
        if name == PARTITION_KEY {
            continue;
        }
        object.insert(name.clone(), attribute_to_json(attribute)?);
    }
    serde_json::from_value(Value::Object(object)).map_err(|e| {
        error!("failed to decode flag document: {e}");
        FlagError::DataParsing(e.to_string())
    })
}

fn attribute_to_json(attribute: &AttributeValue) -> Result<Value, FlagError> {
    match attribute {
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::N(n) => number_to_json(n),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::M(entries) => {
            let mut object = serde_json::Map::new();
            for (name, value) in entries {
                object.insert(name.clone(), attribute_to_json(value)?);
            }
            Ok(Value::Object(object))
        }
        AttributeValue::L(items) => Ok(Value::Array(
            items
                .iter()
                .map(attribute_to_json)
                .collect::<Result<_, _>>()?,
        )),
        AttributeValue::Ns(numbers) => Ok(Value::Array(
            numbers
                .iter()
                .map(|n| number_to_json(n))
                .collect::<Result<_, _>>()?,
        )),
        AttributeValue::Ss(strings) => Ok(Value::Array(
            strings.iter().cloned().map(Value::String).collect(),
        )),
        // Binary and any future attribute kinds have no meaning to the
        // evaluator; carry them as null rather than failing the whole
        // document.
        _ => Ok(Value::Null),
    }
}

// Dynamo numbers arrive as strings. Integers must stay integral through the
// bridge or whitelist buckets would decode as floats and be rejected.
fn number_to_json(n: &str) -> Result<Value, FlagError> {
    if let Ok(int) = n.parse::<i64>() {
        return Ok(Value::Number(int.into()));
    }
    n.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| FlagError::DataParsing(format!("invalid number attribute: {n}")))
}

/// In-process document store for tests and local development.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    document: StoreDocument,
    failing: bool,
    loads: u64,
}

impl MemoryStore {
    pub fn new(document: StoreDocument) -> MemoryStore {
        MemoryStore {
            inner: Mutex::new(MemoryStoreInner {
                document,
                failing: false,
                loads: 0,
            }),
        }
    }

    /// Replaces the stored document, as an external writer would.
    pub fn set_document(&self, document: StoreDocument) {
        self.lock().document = document;
    }

    /// Sets or clears a synthetic load failure.
    pub fn fail(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Number of loads served so far, including failed ones.
    pub fn loads(&self) -> u64 {
        self.lock().loads
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().expect("store lock poisoned")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self) -> Result<StoreDocument, FlagError> {
        let mut inner = self.lock();
        inner.loads += 1;
        if inner.failing {
            return Err(FlagError::StoreUnavailable(
                "synthetic store failure".to_string(),
            ));
        }
        Ok(inner.document.clone())
    }
}
