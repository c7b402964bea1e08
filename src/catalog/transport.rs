//! HTTP transport seam.
//!
//! Requests are issued from the single UI thread, so futures are
//! `!Send` and boxed as [`LocalBoxFuture`]. On WASM the browser `fetch`
//! API backs [`FetchTransport`]; other hosts plug in their own client.

use futures_util::future::LocalBoxFuture;
use thiserror::Error;

/// Errors raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be sent or the body could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// The request was aborted before it completed.
    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Maps a rejected `fetch` to an error from the name of the DOM
    /// exception it raised, if any.
    pub fn from_fetch_failure(name: Option<&str>, detail: String) -> Self {
        match name {
            Some("AbortError") => TransportError::Cancelled,
            _ => TransportError::Network(detail),
        }
    }
}

/// Performs GET requests and returns the response body as text.
pub trait Transport {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<String, TransportError>>;
}

/// Transport backed by the browser `fetch` API.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchTransport;

#[cfg(target_arch = "wasm32")]
impl Transport for FetchTransport {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<String, TransportError>> {
        use futures_util::FutureExt;

        let url = url.to_string();
        async move { fetch_text(url).await }.boxed_local()
    }
}

#[cfg(target_arch = "wasm32")]
async fn fetch_text(url: String) -> Result<String, TransportError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let window =
        web_sys::window().ok_or_else(|| TransportError::Network("no window".to_string()))?;

    let init = web_sys::RequestInit::new();
    init.set_method("GET");
    init.set_mode(web_sys::RequestMode::Cors);

    let request = web_sys::Request::new_with_str_and_init(&url, &init).map_err(js_error)?;
    request
        .headers()
        .set("Accept", "application/json")
        .map_err(js_error)?;

    let response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_error)?;
    let response: web_sys::Response = response.dyn_into().map_err(js_error)?;

    if !response.ok() {
        return Err(TransportError::Status {
            status: response.status(),
            url,
        });
    }

    let text = JsFuture::from(response.text().map_err(js_error)?)
        .await
        .map_err(js_error)?;
    text.as_string()
        .ok_or_else(|| TransportError::Network("response body is not text".to_string()))
}

#[cfg(target_arch = "wasm32")]
fn js_error(value: wasm_bindgen::JsValue) -> TransportError {
    use wasm_bindgen::JsCast;

    let name = value.dyn_ref::<web_sys::DomException>().map(|e| e.name());
    TransportError::from_fetch_failure(name.as_deref(), format!("{:?}", value))
}
