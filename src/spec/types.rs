use crate::validator::{Schema, SchemaMap};
use indexmap::IndexMap;
use serde::Deserialize;

/// One entry of a `security` list: scheme name → required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// The interface document.
///
/// Build it with [`ApiSpec::from_str`](crate::spec::ApiSpec::from_str) or
/// [`load_spec`](crate::spec::load_spec), which normalize path items before
/// deserializing. Method keys are lowercase afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSpec {
    #[serde(default)]
    pub openapi: Option<String>,
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
    #[serde(default)]
    pub components: Components,
    /// Document-level requirements, inherited by operations without their own
    #[serde(default)]
    pub security: Option<Vec<SecurityRequirement>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Lowercase method → operation
    #[serde(flatten)]
    pub operations: IndexMap<String, OperationSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSpec {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub request_body: Option<RequestBodySpec>,
    #[serde(default)]
    pub responses: IndexMap<String, ResponseSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: Option<Schema>,
}

impl ParameterSpec {
    /// Declared `type` of a primitive parameter schema, used for coercion.
    #[must_use]
    pub fn primitive_type(&self) -> Option<&'static str> {
        match self.schema.as_ref()? {
            Schema::Number(n) if n.integer => Some("integer"),
            Schema::Number(_) => Some("number"),
            Schema::Boolean => Some("boolean"),
            Schema::String(_) => Some("string"),
            Schema::Union(alts) => alts.iter().find_map(|alt| match alt {
                Schema::Number(n) if n.integer => Some("integer"),
                Schema::Number(_) => Some("number"),
                Schema::Boolean => Some("boolean"),
                _ => None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaTypeSpec {
    #[serde(default)]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RequestBodySpec {
    /// Content type → schema
    #[serde(default)]
    pub content: IndexMap<String, MediaTypeSpec>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseSpec {
    #[serde(default)]
    pub content: Option<IndexMap<String, MediaTypeSpec>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub schemas: SchemaMap,
    #[serde(default)]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecurityScheme {
    /// `oauth2`, `http`, `apiKey`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub flows: Option<OAuthFlows>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlows {
    #[serde(default)]
    pub client_credentials: Option<OAuthFlow>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlow {
    pub token_url: String,
    #[serde(default)]
    pub scopes: IndexMap<String, String>,
}
