//! Firestore v1 document endpoints.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::instrument;
use url::Url;

use super::codec::{decode_fields, encode_fields, field_path, split_transforms};
use super::{RestBackend, error_from_body, read_json, with_segments};
use crate::backend::{BackendError, Comparison, Document, DocumentStore, FieldValue, Fields};

const DATABASE: &str = "(default)";

/// Alias of the single COUNT aggregation in `runAggregationQuery`.
const COUNT_ALIAS: &str = "matching";

#[derive(Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// One element of a `runQuery` response stream.
///
/// Elements without a document only report progress (`readTime`).
#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    document: Option<WireDocument>,
}

/// One element of a `runAggregationQuery` response stream.
#[derive(Deserialize)]
struct AggregationResult {
    #[serde(default)]
    result: Option<AggregationFields>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregationFields {
    #[serde(default)]
    aggregate_fields: Map<String, Value>,
}

impl Comparison {
    const fn wire_op(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::GreaterThan => "GREATER_THAN",
        }
    }
}

impl RestBackend {
    /// `projects/{p}/databases/(default)/documents`
    fn database_path(&self) -> [&str; 5] {
        [
            "projects",
            self.config().project_id.as_str(),
            "databases",
            DATABASE,
            "documents",
        ]
    }

    fn document_url(&self, collection: &str, id: &str) -> Url {
        let mut segments = self.database_path().to_vec();
        segments.extend([collection, id]);
        with_segments(&self.inner.documents_base, segments)
    }

    /// URL of a database-level RPC such as `documents:commit`.
    fn rpc_url(&self, method: &str) -> Url {
        let last = format!("documents:{method}");
        let mut segments = self.database_path().to_vec();
        segments.pop();
        segments.push(&last);
        with_segments(&self.inner.documents_base, segments)
    }

    /// Fully qualified document name used inside request bodies.
    fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "projects/{}/databases/{DATABASE}/documents/{collection}/{id}",
            self.config().project_id
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config().access_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn run_query(&self, structured_query: Value) -> Result<Vec<Document>, BackendError> {
        let response = self
            .authorize(self.client().post(self.rpc_url("runQuery")))
            .json(&json!({ "structuredQuery": structured_query }))
            .send()
            .await?;
        let results: Vec<QueryResult> = read_json(response).await?;

        results
            .into_iter()
            .filter_map(|result| result.document)
            .map(into_document)
            .collect()
    }
}

/// Extract the COUNT value. Counts arrive as `integerValue` strings.
fn count_from(results: Vec<AggregationResult>) -> Result<usize, BackendError> {
    let value = results
        .into_iter()
        .find_map(|r| r.result)
        .and_then(|mut r| r.aggregate_fields.remove(COUNT_ALIAS))
        .ok_or_else(|| BackendError::Decode("aggregation result carried no count".to_owned()))?;

    let raw = match &value["integerValue"] {
        Value::String(s) => s.parse::<usize>().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        _ => None,
    };
    raw.ok_or_else(|| BackendError::Decode(format!("invalid count value: {value}")))
}

fn into_document(wire: WireDocument) -> Result<Document, BackendError> {
    let id = wire
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_owned();
    Ok(Document {
        id,
        fields: decode_fields(&wire.fields)?,
    })
}

/// Build the `:commit` write for a set operation.
fn commit_body(name: String, fields: Fields, merge: bool) -> Value {
    let (fields, transforms) = split_transforms(fields);

    let mut write = Map::new();
    if merge {
        let mask: Vec<String> = fields
            .keys()
            .map(|key| field_path(std::slice::from_ref(key)))
            .collect();
        write.insert("updateMask".to_owned(), json!({ "fieldPaths": mask }));
    }
    write.insert(
        "update".to_owned(),
        json!({ "name": name, "fields": encode_fields(&fields) }),
    );
    if !transforms.is_empty() {
        let transforms: Vec<Value> = transforms
            .into_iter()
            .map(|path| json!({ "fieldPath": path, "setToServerValue": "REQUEST_TIME" }))
            .collect();
        write.insert("updateTransforms".to_owned(), Value::Array(transforms));
    }

    json!({ "writes": [Value::Object(write)] })
}

fn filtered_query(collection: &str, field: &str, op: Comparison, value: &FieldValue) -> Value {
    json!({
        "from": [{ "collectionId": collection }],
        "where": {
            "fieldFilter": {
                "field": { "fieldPath": field_path(&[field.to_owned()]) },
                "op": op.wire_op(),
                "value": super::codec::encode_value(value),
            }
        }
    })
}

#[async_trait]
impl DocumentStore for RestBackend {
    #[instrument(skip(self))]
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, BackendError> {
        let response = self
            .authorize(self.client().get(self.document_url(collection, id)))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let wire: WireDocument = read_json(response).await?;
        Ok(Some(decode_fields(&wire.fields)?))
    }

    #[instrument(skip(self, fields), fields(field_count = fields.len()))]
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> Result<(), BackendError> {
        let body = commit_body(self.document_name(collection, id), fields, merge);
        let response = self
            .authorize(self.client().post(self.rpc_url("commit")))
            .json(&body)
            .send()
            .await?;
        let _: Value = read_json(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client().delete(self.document_url(collection, id)))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await?;
        Err(error_from_body(status.as_u16(), body))
    }

    #[instrument(skip(self, value))]
    async fn query_where(
        &self,
        collection: &str,
        field: &str,
        op: Comparison,
        value: FieldValue,
    ) -> Result<Vec<Document>, BackendError> {
        self.run_query(filtered_query(collection, field, op, &value))
            .await
    }

    #[instrument(skip(self, value))]
    async fn count_where(
        &self,
        collection: &str,
        field: &str,
        op: Comparison,
        value: FieldValue,
    ) -> Result<usize, BackendError> {
        let body = json!({
            "structuredAggregationQuery": {
                "structuredQuery": filtered_query(collection, field, op, &value),
                "aggregations": [{ "alias": COUNT_ALIAS, "count": {} }],
            }
        });
        let response = self
            .authorize(self.client().post(self.rpc_url("runAggregationQuery")))
            .json(&body)
            .send()
            .await?;
        count_from(read_json(response).await?)
    }

    #[instrument(skip(self))]
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, BackendError> {
        self.run_query(json!({ "from": [{ "collectionId": collection }] }))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_merge_commit_masks_only_written_fields() {
        let fields = Fields::from([
            ("name".to_owned(), FieldValue::from("Dana")),
            ("inventory".to_owned(), FieldValue::ServerTimestamp),
        ]);
        let body = commit_body(
            "projects/p/databases/(default)/documents/users/u1".to_owned(),
            fields,
            true,
        );
        let write = &body["writes"][0];

        assert_eq!(write["updateMask"]["fieldPaths"], json!(["name"]));
        assert_eq!(write["update"]["fields"]["name"], json!({ "stringValue": "Dana" }));
        assert_eq!(
            write["updateTransforms"][0],
            json!({ "fieldPath": "inventory", "setToServerValue": "REQUEST_TIME" })
        );
    }

    #[test]
    fn test_replace_commit_has_no_mask() {
        let body = commit_body(
            "projects/p/databases/(default)/documents/users/u1".to_owned(),
            Fields::from([("role".to_owned(), FieldValue::from("staff"))]),
            false,
        );
        let write = &body["writes"][0];
        assert!(write.get("updateMask").is_none());
        assert!(write.get("updateTransforms").is_none());
    }

    #[test]
    fn test_greater_than_query_shape() {
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let query = filtered_query(
            "inventory",
            "createdAt",
            Comparison::GreaterThan,
            &since.into(),
        );
        assert_eq!(query["from"][0]["collectionId"], "inventory");
        let filter = &query["where"]["fieldFilter"];
        assert_eq!(filter["field"]["fieldPath"], "createdAt");
        assert_eq!(filter["op"], "GREATER_THAN");
        assert_eq!(filter["value"]["timestampValue"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_count_is_read_from_aggregate_fields() {
        let results: Vec<AggregationResult> = serde_json::from_str(
            r#"[{"result":{"aggregateFields":{"matching":{"integerValue":"42"}}},
                 "readTime":"2024-05-01T12:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(count_from(results).unwrap(), 42);

        let empty: Vec<AggregationResult> =
            serde_json::from_str(r#"[{"readTime":"2024-05-01T12:00:00Z"}]"#).unwrap();
        assert!(matches!(count_from(empty), Err(BackendError::Decode(_))));
    }

    #[test]
    fn test_query_results_skip_progress_entries() {
        let results: Vec<QueryResult> = serde_json::from_str(
            r#"[
                {"readTime":"2024-05-01T12:00:00Z"},
                {"document":{"name":"projects/p/databases/(default)/documents/inventory/abc",
                             "fields":{"sku":{"stringValue":"A-1"}}}}
            ]"#,
        )
        .unwrap();
        let docs: Vec<Document> = results
            .into_iter()
            .filter_map(|r| r.document)
            .map(into_document)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "abc");
        assert_eq!(docs[0].get("sku"), Some(&FieldValue::from("A-1")));
    }
}
