use serde_json::{Map, Value};

/// Immutable description of one generation job, built once by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    /// Queue endpoint identifier, e.g. `fal-ai/flux-pro/kontext`.
    pub model_id: String,
    /// Arbitrary string-keyed input parameters passed through verbatim.
    pub input: Map<String, Value>,
    /// Optional seed; merged into the input map when present.
    pub seed: Option<i64>,
    /// Optional image references. Only the first is sent to the API.
    pub image_urls: Vec<String>,
}

impl JobRequest {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            input: Map::new(),
            seed: None,
            image_urls: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_image_urls(mut self, urls: Vec<String>) -> Self {
        self.image_urls = urls;
        self
    }

    /// The `input` object as submitted on the wire: declared parameters plus
    /// the seed and the first image reference, when present.
    pub fn wire_input(&self) -> Map<String, Value> {
        let mut input = self.input.clone();
        if let Some(seed) = self.seed {
            input.insert("seed".to_string(), Value::from(seed));
        }
        if let Some(url) = self.image_urls.first() {
            input.insert("image_url".to_string(), Value::from(url.clone()));
        }
        input
    }
}
