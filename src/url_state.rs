//! Dataset id in the page URL.
//!
//! A page opened with `?id=<dataset id>` loads that dataset directly
//! instead of starting with an empty selection.

/// Parsed URL parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    pub dataset_id: Option<String>,
}

impl UrlParams {
    /// Parses a query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let mut params = UrlParams::default();

        let query = query.trim_start_matches('?');
        for pair in query.split('&') {
            let mut kv = pair.splitn(2, '=');
            let key = kv.next().unwrap_or("");
            let value = kv.next().unwrap_or("");
            if key == "id" && !value.is_empty() {
                params.dataset_id = Some(value.to_string());
            }
        }

        params
    }
}

/// Dataset id of a full page URL, if present.
pub fn dataset_id_from_url(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or("");
    let query = without_fragment.split_once('?').map(|(_, q)| q)?;
    UrlParams::from_query(query).dataset_id
}

/// Parse URL query parameters from the current browser URL.
#[cfg(target_arch = "wasm32")]
pub fn parse_from_url() -> UrlParams {
    let Some(window) = web_sys::window() else {
        return UrlParams::default();
    };
    match window.location().search() {
        Ok(search) => UrlParams::from_query(&search),
        Err(_) => UrlParams::default(),
    }
}

/// No-op stub for native builds.
#[cfg(not(target_arch = "wasm32"))]
pub fn parse_from_url() -> UrlParams {
    UrlParams::default()
}
