use std::sync::Arc;

use serde_json::Value;

use crate::node::Attrs;

type ParseFn = dyn Fn(&str) -> Option<Value> + Send + Sync;
type SerializeFn = dyn Fn(&Value) -> String + Send + Sync;
type GenerateFn = dyn Fn() -> Value + Send + Sync;

/// Declarative attribute definition attached to a node or mark kind.
///
/// `parse` is total over raw input: anything it rejects falls back to the
/// default, nothing escapes this boundary. `generate` marks the attribute
/// unique-per-node; a fresh value is produced on every node creation.
#[derive(Clone)]
pub struct AttributeSpec {
    pub name: String,
    pub default: Value,
    parse: Arc<ParseFn>,
    serialize: Arc<SerializeFn>,
    generate: Option<Arc<GenerateFn>>,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            default,
            parse: Arc::new(|raw| Some(Value::String(raw.to_string()))),
            serialize: Arc::new(default_serialize),
            generate: None,
        }
    }

    /// String attribute whose raw form is the value itself.
    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(name, Value::String(default.into()))
    }

    /// Integer attribute clamped to the given inclusive range.
    pub fn integer(name: impl Into<String>, default: i64, min: i64, max: i64) -> Self {
        Self::new(name, Value::Number(default.into()))
            .with_parse(move |raw| {
                let n: i64 = raw.trim().parse().ok()?;
                Some(Value::Number(n.clamp(min, max).into()))
            })
            .with_serialize(|v| v.as_i64().map(|n| n.to_string()).unwrap_or_default())
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, Value::Bool(default))
            .with_parse(|raw| match raw.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            })
            .with_serialize(|v| {
                if v.as_bool().unwrap_or(false) {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            })
    }

    pub fn with_parse(
        mut self,
        parse: impl Fn(&str) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.parse = Arc::new(parse);
        self
    }

    pub fn with_serialize(
        mut self,
        serialize: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.serialize = Arc::new(serialize);
        self
    }

    /// Marks the attribute unique-per-node with a custom generator.
    pub fn with_generate(mut self, generate: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.generate = Some(Arc::new(generate));
        self
    }

    /// Unique id attribute backed by uuid-v4.
    pub fn unique_id(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
            .with_generate(|| Value::String(uuid::Uuid::new_v4().to_string()))
    }

    pub fn is_generated(&self) -> bool {
        self.generate.is_some()
    }

    /// Raw → typed, falling back to the default on malformed input.
    pub fn parse_raw(&self, raw: &str) -> Value {
        (self.parse)(raw).unwrap_or_else(|| self.default.clone())
    }

    /// Typed → raw markup-attribute form.
    pub fn serialize_value(&self, value: &Value) -> String {
        (self.serialize)(value)
    }

    pub fn generate(&self) -> Option<Value> {
        self.generate.as_ref().map(|g| g())
    }
}

impl std::fmt::Debug for AttributeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeSpec")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("generated", &self.is_generated())
            .finish()
    }
}

fn default_serialize(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fills defaults for missing attrs and (re)generates unique ones. With
/// `keep_generated`, existing generated values survive — the explicit opt-in
/// for adopting a copied node without minting fresh ids.
pub fn instantiate_attrs(specs: &[AttributeSpec], mut attrs: Attrs, keep_generated: bool) -> Attrs {
    for spec in specs {
        if spec.is_generated() {
            if keep_generated && attrs.contains_key(&spec.name) {
                continue;
            }
            if let Some(value) = spec.generate() {
                attrs.insert(spec.name.clone(), value);
            }
            continue;
        }
        attrs
            .entry(spec.name.clone())
            .or_insert_with(|| spec.default.clone());
    }
    attrs
}
