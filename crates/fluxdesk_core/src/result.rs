/// One output reference from a completed job, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    pub url: String,
}

impl OutputRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
