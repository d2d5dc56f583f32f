//! Query-string transform URL builder.

use crate::domain::ports::{TransformParams, TransformUrlBuilder};

/// Query keys owned by the transform service; existing values are replaced.
const TRANSFORM_KEYS: [&str; 5] = ["width", "height", "quality", "format", "cache"];

/// Builds delivery URLs by appending transform parameters to the signed URL.
///
/// The signature and any other query parameters of the raw URL are preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryTransformBuilder;

impl QueryTransformBuilder {
    /// Creates the builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransformUrlBuilder for QueryTransformBuilder {
    fn build(&self, raw_url: &str, params: &TransformParams) -> String {
        build_transform_url(raw_url, params)
    }
}

/// Applies transform parameters to a raw URL.
#[must_use]
pub fn build_transform_url(raw_url: &str, params: &TransformParams) -> String {
    let (without_fragment, fragment) = match raw_url.find('#') {
        Some(idx) => (&raw_url[..idx], Some(&raw_url[idx..])),
        None => (raw_url, None),
    };

    let (base_url, existing_params) = match without_fragment.find('?') {
        Some(idx) => (&without_fragment[..idx], Some(&without_fragment[idx + 1..])),
        None => (without_fragment, None),
    };

    let mut query: Vec<String> = existing_params
        .into_iter()
        .flat_map(|existing| existing.split('&'))
        .filter(|param| !param.is_empty())
        .filter(|param| {
            let key = param.split('=').next().unwrap_or("");
            !TRANSFORM_KEYS.contains(&key)
        })
        .map(str::to_string)
        .collect();

    if let Some(width) = params.width {
        query.push(format!("width={width}"));
    }
    if let Some(height) = params.height {
        query.push(format!("height={height}"));
    }
    query.push(format!("quality={}", params.quality));
    query.push(format!("format={}", params.format));
    if params.cache {
        query.push("cache=true".to_string());
    }

    format!(
        "{base_url}?{}{}",
        query.join("&"),
        fragment.unwrap_or_default()
    )
}
