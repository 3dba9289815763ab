use fluxdesk_core::OutputRef;
use serde_json::Value;

/// One known shape of the result document.
///
/// Returns `Some` when the document matches this shape, even if the match
/// yields zero references; `None` hands over to the next strategy.
pub trait ResultExtractor: Send + Sync {
    fn extract(&self, doc: &Value) -> Option<Vec<OutputRef>>;
}

/// `{"images": [{"url": "..."}, ...]}` — list of objects with a url field.
#[derive(Debug, Default)]
pub struct ImagesArrayExtractor;

impl ResultExtractor for ImagesArrayExtractor {
    fn extract(&self, doc: &Value) -> Option<Vec<OutputRef>> {
        let images = doc.get("images")?.as_array()?;
        Some(
            images
                .iter()
                .filter_map(|item| item.get("url").and_then(Value::as_str))
                .map(OutputRef::new)
                .collect(),
        )
    }
}

/// `{"image_url": "..."}` — single url field.
#[derive(Debug, Default)]
pub struct SingleUrlExtractor;

impl ResultExtractor for SingleUrlExtractor {
    fn extract(&self, doc: &Value) -> Option<Vec<OutputRef>> {
        let url = doc.get("image_url")?.as_str()?;
        Some(vec![OutputRef::new(url)])
    }
}

/// `{"url": "...", "type": "image"}` — single object with a type marker.
#[derive(Debug, Default)]
pub struct TypedImageExtractor;

impl ResultExtractor for TypedImageExtractor {
    fn extract(&self, doc: &Value) -> Option<Vec<OutputRef>> {
        let url = doc.get("url")?.as_str()?;
        if doc.get("type").and_then(Value::as_str) == Some("image") {
            Some(vec![OutputRef::new(url)])
        } else {
            None
        }
    }
}

/// Extract output references by trying the known shapes in order; the first
/// matching shape wins. No match yields an empty result, which is the
/// "completed, no output" outcome rather than a failure.
pub fn extract_outputs(doc: &Value) -> Vec<OutputRef> {
    let extractors: [&dyn ResultExtractor; 3] = [
        &ImagesArrayExtractor,
        &SingleUrlExtractor,
        &TypedImageExtractor,
    ];
    for extractor in extractors {
        if let Some(outputs) = extractor.extract(doc) {
            return outputs;
        }
    }
    Vec::new()
}
