use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{VectorError, VectorResult};

/// Document as received from callers. Every field is optional so a batch with
/// one malformed entry still deserializes; [`DocumentInput::validate`] turns
/// it into a [`Document`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DocumentInput {
    pub id: Option<String>,
    pub url: Option<String>,
    pub name: Option<String>,
    #[schema(value_type = Object)]
    pub schema_json: Option<Value>,
    pub site_id: Option<String>,
    pub document_id: Option<String>,
    pub content: Option<String>,
    /// Numbers only; anything else makes the document invalid
    #[schema(value_type = Vec<f64>)]
    pub embedding: Option<Vec<Value>>,
}

/// A validated, fully typed document row
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub url: String,
    pub name: String,
    pub schema_json: Value,
    pub site_id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
}

fn required<T>(field: Option<T>, name: &str) -> VectorResult<T> {
    field.ok_or_else(|| VectorError::Validation(format!("missing required field '{}'", name)))
}

fn parse_uuid(raw: &str, name: &str) -> VectorResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| VectorError::Validation(format!("field '{}' is not a valid UUID", name)))
}

impl DocumentInput {
    /// Names of the required fields that are absent
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.is_none() {
            missing.push("id");
        }
        if self.url.is_none() {
            missing.push("url");
        }
        if self.name.is_none() {
            missing.push("name");
        }
        if self.schema_json.is_none() {
            missing.push("schema_json");
        }
        if self.site_id.is_none() {
            missing.push("site_id");
        }
        if self.document_id.is_none() {
            missing.push("document_id");
        }
        if self.content.is_none() {
            missing.push("content");
        }
        if self.embedding.is_none() {
            missing.push("embedding");
        }
        missing
    }

    /// Check presence and types of every field.
    ///
    /// The embedding must be a non-empty list of finite numbers, and exactly
    /// `dimension` long when a dimension is configured.
    pub fn validate(self, dimension: Option<usize>) -> VectorResult<Document> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(VectorError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let raw_embedding = required(self.embedding, "embedding")?;
        let embedding = parse_embedding(&raw_embedding)?;
        if let Some(expected) = dimension {
            if embedding.len() != expected {
                return Err(VectorError::Validation(format!(
                    "embedding has {} dimensions, expected {}",
                    embedding.len(),
                    expected
                )));
            }
        }

        Ok(Document {
            id: required(self.id, "id")?,
            url: required(self.url, "url")?,
            name: required(self.name, "name")?,
            schema_json: required(self.schema_json, "schema_json")?,
            site_id: parse_uuid(&required(self.site_id, "site_id")?, "site_id")?,
            document_id: parse_uuid(&required(self.document_id, "document_id")?, "document_id")?,
            content: required(self.content, "content")?,
            embedding,
        })
    }
}

fn parse_embedding(values: &[Value]) -> VectorResult<Vec<f32>> {
    if values.is_empty() {
        return Err(VectorError::Validation("embedding is empty".to_string()));
    }

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|n| n as f32)
                .filter(|n| n.is_finite())
                .ok_or_else(|| {
                    VectorError::Validation("embedding contains non-numeric values".to_string())
                })
        })
        .collect()
}

impl From<Document> for DocumentInput {
    fn from(doc: Document) -> Self {
        Self {
            id: Some(doc.id),
            url: Some(doc.url),
            name: Some(doc.name),
            schema_json: Some(doc.schema_json),
            site_id: Some(doc.site_id.to_string()),
            document_id: Some(doc.document_id.to_string()),
            content: Some(doc.content),
            embedding: Some(doc.embedding.into_iter().map(|v| Value::from(v as f64)).collect()),
        }
    }
}

/// One ranked search hit. `schema_json` is pretty-printed with 4-space indentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SimilarityResult {
    pub url: String,
    pub schema_json: String,
    pub name: String,
    pub site_id: Uuid,
    /// Smaller is more similar
    pub distance: f64,
}

/// Document located by URL, without a distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentMatch {
    pub url: String,
    pub schema_json: String,
    pub name: String,
    pub site_id: Uuid,
}

/// Which tenants a search covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteScope {
    All,
    Specific(Uuid),
}

impl SiteScope {
    pub fn site_id(&self) -> Option<Uuid> {
        match self {
            SiteScope::All => None,
            SiteScope::Specific(id) => Some(*id),
        }
    }
}

impl From<Uuid> for SiteScope {
    fn from(id: Uuid) -> Self {
        SiteScope::Specific(id)
    }
}

impl fmt::Display for SiteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteScope::All => f.write_str("all"),
            SiteScope::Specific(id) => write!(f, "{}", id),
        }
    }
}

/// Distance metric for similarity calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    /// Negative inner product
    InnerProduct,
    Euclidean,
}

impl DistanceMetric {
    /// Parse a metric name. Unknown names fall back to cosine.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "inner_product" | "innerproduct" | "dot" => DistanceMetric::InnerProduct,
            "euclidean" | "l2" => DistanceMetric::Euclidean,
            _ => DistanceMetric::Cosine,
        }
    }

    /// pgvector operator computing this distance
    pub fn operator(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::InnerProduct => "<#>",
            DistanceMetric::Euclidean => "<->",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::InnerProduct => "inner_product",
            DistanceMetric::Euclidean => "euclidean",
        }
    }
}

/// Render JSON the way search results expose it
pub(crate) fn pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match value.serialize(&mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

/// pgvector text literal, e.g. `[0.1,0.2,0.3]`
pub(crate) fn vector_literal(values: &[f32]) -> String {
    let mut out = String::with_capacity(values.len() * 10 + 2);
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_input() -> DocumentInput {
        serde_json::from_value(json!({
            "id": "doc-1",
            "url": "https://example.com/a",
            "name": "A",
            "schema_json": {"@type": "Recipe"},
            "site_id": "6f1c1a8e-0000-4000-8000-000000000001",
            "document_id": "6f1c1a8e-0000-4000-8000-000000000002",
            "content": "hello",
            "embedding": [0.1, 0.2, 0.3]
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_document() {
        let doc = valid_input().validate(Some(3)).unwrap();
        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.embedding.len(), 3);
        assert_eq!(doc.site_id.to_string(), "6f1c1a8e-0000-4000-8000-000000000001");
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let mut input = valid_input();
        input.url = None;
        input.content = None;
        assert_eq!(input.missing_fields(), vec!["url", "content"]);

        let err = input.validate(None).unwrap_err();
        assert!(err.to_string().contains("url, content"));
    }

    #[test]
    fn test_non_numeric_embedding_rejected() {
        let mut input = valid_input();
        input.embedding = Some(vec![json!(0.1), json!("x")]);
        assert!(matches!(input.validate(None), Err(VectorError::Validation(_))));
    }

    #[test]
    fn test_empty_embedding_rejected() {
        let mut input = valid_input();
        input.embedding = Some(vec![]);
        assert!(input.validate(None).is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let err = valid_input().validate(Some(1536)).unwrap_err();
        assert!(err.to_string().contains("expected 1536"));
    }

    #[test]
    fn test_bad_uuid_rejected() {
        let mut input = valid_input();
        input.site_id = Some("all".to_string());
        assert!(input.validate(None).is_err());
    }

    #[test]
    fn test_metric_parse_defaults_to_cosine() {
        assert_eq!(DistanceMetric::parse("euclidean"), DistanceMetric::Euclidean);
        assert_eq!(DistanceMetric::parse("inner_product"), DistanceMetric::InnerProduct);
        assert_eq!(DistanceMetric::parse("manhattan"), DistanceMetric::Cosine);
        assert_eq!(DistanceMetric::parse(""), DistanceMetric::Cosine);
    }

    #[test]
    fn test_metric_operators() {
        assert_eq!(DistanceMetric::Cosine.operator(), "<=>");
        assert_eq!(DistanceMetric::InnerProduct.operator(), "<#>");
        assert_eq!(DistanceMetric::Euclidean.operator(), "<->");
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let rendered = pretty_json(&json!({"a": 1}));
        assert_eq!(rendered, "{\n    \"a\": 1\n}");
    }

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
    }

    #[test]
    fn test_site_scope_display() {
        assert_eq!(SiteScope::All.to_string(), "all");
        assert_eq!(SiteScope::All.site_id(), None);
    }
}
