use super::manager::BrowserError;
use super::{ElementProbe, NetworkResponse, PageDriver, Readiness, ResourceKind, ResponseCallback};
use crate::models::{PageElement, SettledImage};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use headless_chrome::browser::tab::ResponseHandler;
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::Network::{GetResponseBodyReturnObject, ResourceType};
use headless_chrome::Tab;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

const RESPONSE_HANDLER_NAME: &str = "comic-capture-images";

/// Resolves once every matched image is complete, with a per-element state.
const SETTLE_IMAGES_JS: &str = r#"
(async (selector) => {
    const images = Array.from(document.querySelectorAll(selector));
    const states = await Promise.all(images.map((img) => new Promise((resolve) => {
        if (img.complete) {
            resolve(img.naturalWidth > 0 ? 'loaded' : 'errored');
            return;
        }
        img.addEventListener('load', () => resolve('loaded'), { once: true });
        img.addEventListener('error', () => resolve('errored'), { once: true });
    })));
    return JSON.stringify(images.map((img, i) => ({ src: img.src, state: states[i] })));
})"#;

const ELEMENT_GEOMETRY_JS: &str = r#"
function() {
    return JSON.stringify({ src: this.src, width: this.clientWidth, height: this.clientHeight });
}"#;

/// A headless Chrome tab driven by the capture session
pub struct ChromePage {
    tab: Arc<Tab>,
    timeout: Duration,
    body_retry_attempts: u32,
    body_retry_delay: Duration,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>, timeout: Duration) -> Self {
        Self {
            tab,
            timeout,
            body_retry_attempts: 3,
            body_retry_delay: Duration::from_millis(200),
        }
    }

    /// Chrome may not have buffered a body yet when the response event fires
    pub fn with_body_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.body_retry_attempts = attempts.max(1);
        self.body_retry_delay = delay;
        self
    }

    fn evaluate_string(&self, expression: &str, await_promise: bool) -> Result<String, BrowserError> {
        evaluate_string(&self.tab, expression, await_promise)
    }

    fn wait_for_dom_content(&self) -> Result<(), BrowserError> {
        let start = Instant::now();
        loop {
            // A fresh tab still reports the blank page until the navigation commits
            let state = self.evaluate_string(
                "document.URL === 'about:blank' ? 'pending' : document.readyState",
                false,
            )?;
            if state == "interactive" || state == "complete" {
                return Ok(());
            }
            if start.elapsed() > self.timeout {
                return Err(BrowserError::Timeout(format!(
                    "DOMContentLoaded (readyState {})",
                    state
                )));
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

impl PageDriver for ChromePage {
    fn navigate(&self, url: &str, readiness: Readiness) -> Result<(), BrowserError> {
        log::info!("Browser navigating to: {}", url);

        self.tab
            .navigate_to(url)
            .map_err(|e| BrowserError::NavigationError(format!("Failed to navigate to {}: {}", url, e)))?;

        match readiness {
            Readiness::Load => {
                self.tab.wait_until_navigated().map_err(|e| {
                    BrowserError::NavigationError(format!("Navigation timeout for {}: {}", url, e))
                })?;
            }
            Readiness::DomContentLoaded => self.wait_for_dom_content()?,
        }

        Ok(())
    }

    fn settle_images(&self, selector: &str) -> Result<Vec<SettledImage>, BrowserError> {
        let script = format!("{}({})", SETTLE_IMAGES_JS, js_string(selector)?);
        let raw = self.evaluate_string(&script, true)?;
        serde_json::from_str(&raw)
            .map_err(|e| BrowserError::JavaScriptError(format!("Unexpected settle result: {}", e)))
    }

    fn image_elements(&self, selector: &str) -> Result<Vec<PageElement>, BrowserError> {
        // find_elements treats an empty match as an error, so count first
        let count = self.evaluate_string(
            &format!("String(document.querySelectorAll({}).length)", js_string(selector)?),
            false,
        )?;
        if count.trim() == "0" {
            return Ok(Vec::new());
        }

        let handles = self
            .tab
            .find_elements(selector)
            .map_err(|e| BrowserError::JavaScriptError(format!("Query {} failed: {}", selector, e)))?;

        let mut elements = Vec::with_capacity(handles.len());
        for handle in &handles {
            let result = handle
                .call_js_fn(ELEMENT_GEOMETRY_JS, vec![], false)
                .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
            let raw = result
                .value
                .and_then(|v| v.as_str().map(|s| s.to_string()))
                .ok_or_else(|| BrowserError::JavaScriptError("Element returned no geometry".to_string()))?;
            let geometry: ElementGeometry = serde_json::from_str(&raw)
                .map_err(|e| BrowserError::JavaScriptError(format!("Unexpected geometry: {}", e)))?;
            elements.push(geometry.into());
        }

        Ok(elements)
    }

    fn element_probe(&self) -> Arc<dyn ElementProbe> {
        Arc::new(TabProbe {
            tab: Arc::downgrade(&self.tab),
        })
    }

    fn on_response(&self, callback: ResponseCallback) -> Result<(), BrowserError> {
        let attempts = self.body_retry_attempts;
        let delay = self.body_retry_delay;

        let handler: ResponseHandler = Box::new(move |params, fetch_body| {
            let fetch = || read_body(fetch_body, attempts, delay);
            let response = ChromeResponse::from_event(&params, &fetch);
            callback(&response);
        });

        self.tab
            .register_response_handling(RESPONSE_HANDLER_NAME, handler)
            .map_err(|e| BrowserError::JavaScriptError(format!("Cannot subscribe to responses: {}", e)))?;
        Ok(())
    }

    fn close(&self) -> Result<(), BrowserError> {
        // Drop the handler first so nothing holds the callback past the tab
        let _ = self.tab.deregister_response_handling(RESPONSE_HANDLER_NAME);
        self.tab
            .close(true)
            .map_err(|e| BrowserError::NavigationError(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ElementGeometry {
    src: String,
    width: u32,
    height: u32,
}

impl From<ElementGeometry> for PageElement {
    fn from(g: ElementGeometry) -> Self {
        PageElement::new(g.src, g.width, g.height)
    }
}

/// DOM probe usable from the response thread without keeping the tab alive
struct TabProbe {
    tab: Weak<Tab>,
}

impl ElementProbe for TabProbe {
    fn has_image(&self, selector: &str, src: &str) -> Result<bool, BrowserError> {
        let tab = self.tab.upgrade().ok_or(BrowserError::PageClosed)?;
        let script = format!(
            "String(Array.from(document.querySelectorAll({})).some((img) => img.src === {}))",
            js_string(selector)?,
            js_string(src)?
        );
        Ok(evaluate_string(&tab, &script, false)? == "true")
    }
}

/// Read a response body, retrying while Chrome has not buffered it yet
fn read_body<E: fmt::Display>(
    fetch: impl Fn() -> Result<GetResponseBodyReturnObject, E>,
    attempts: u32,
    delay: Duration,
) -> Result<Vec<u8>, BrowserError> {
    let mut last_error = String::new();
    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            std::thread::sleep(delay);
        }
        match fetch() {
            Ok(body) if body.base_64_encoded => {
                return BASE64
                    .decode(body.body.as_bytes())
                    .map_err(|e| BrowserError::ResponseBodyError(e.to_string()));
            }
            Ok(body) => return Ok(body.body.into_bytes()),
            Err(e) => {
                log::debug!("Response body not ready (attempt {}): {}", attempt + 1, e);
                last_error = e.to_string();
            }
        }
    }
    Err(BrowserError::ResponseBodyError(last_error))
}

/// Header names keep whatever case the server sent
fn content_type_header(headers: &Value) -> Option<String> {
    headers.as_object().and_then(|map| {
        map.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, value)| value.as_str().map(|s| s.to_string()))
    })
}

fn resource_kind(resource: &ResourceType) -> ResourceKind {
    match resource {
        ResourceType::Image => ResourceKind::Image,
        _ => ResourceKind::Other,
    }
}

struct ChromeResponse<'a> {
    url: String,
    status: u32,
    kind: ResourceKind,
    content_type: Option<String>,
    fetch_body: &'a dyn Fn() -> Result<Vec<u8>, BrowserError>,
}

impl<'a> ChromeResponse<'a> {
    fn from_event(
        params: &ResponseReceivedEventParams,
        fetch_body: &'a dyn Fn() -> Result<Vec<u8>, BrowserError>,
    ) -> Self {
        let content_type = serde_json::to_value(&params.response.headers)
            .ok()
            .and_then(|headers| content_type_header(&headers));

        Self {
            url: params.response.url.clone(),
            status: params.response.status as u32,
            kind: resource_kind(&params.Type),
            content_type,
            fetch_body,
        }
    }
}

impl NetworkResponse for ChromeResponse<'_> {
    fn url(&self) -> &str {
        &self.url
    }

    fn resource_kind(&self) -> ResourceKind {
        self.kind
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn body(&self) -> Option<Result<Vec<u8>, BrowserError>> {
        if (300..400).contains(&self.status) || self.status == 204 {
            return None;
        }
        Some((self.fetch_body)())
    }
}

fn evaluate_string(tab: &Tab, expression: &str, await_promise: bool) -> Result<String, BrowserError> {
    let result = tab
        .evaluate(expression, await_promise)
        .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

    result
        .value
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .ok_or_else(|| BrowserError::JavaScriptError("Script returned no value".to_string()))
}

/// Quote a Rust string as a JavaScript string literal
fn js_string(value: &str) -> Result<String, BrowserError> {
    serde_json::to_string(value).map_err(|e| BrowserError::JavaScriptError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserConfig, BrowserManager};
    use std::cell::Cell;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("#divImage img").unwrap(), "\"#divImage img\"");
        assert_eq!(
            js_string("https://cdn/a\"b.png").unwrap(),
            "\"https://cdn/a\\\"b.png\""
        );
    }

    #[test]
    fn test_geometry_parse() {
        let g: ElementGeometry =
            serde_json::from_str(r#"{"src":"https://cdn/1.jpg","width":800,"height":1200}"#).unwrap();
        let element: PageElement = g.into();
        assert_eq!(element, PageElement::new("https://cdn/1.jpg", 800, 1200));
    }

    fn body(text: &str, base_64_encoded: bool) -> GetResponseBodyReturnObject {
        GetResponseBodyReturnObject {
            body: text.to_string(),
            base_64_encoded,
        }
    }

    fn response<'a>(
        status: u32,
        fetch_body: &'a dyn Fn() -> Result<Vec<u8>, BrowserError>,
    ) -> ChromeResponse<'a> {
        ChromeResponse {
            url: "https://cdn/1.png".to_string(),
            status,
            kind: ResourceKind::Image,
            content_type: Some("image/png".to_string()),
            fetch_body,
        }
    }

    #[test]
    fn test_content_type_header_ignores_case() {
        let headers = serde_json::json!({ "Content-Type": "image/png", "Content-Length": "10" });
        assert_eq!(content_type_header(&headers).as_deref(), Some("image/png"));

        let headers = serde_json::json!({ "CONTENT-TYPE": "image/webp" });
        assert_eq!(content_type_header(&headers).as_deref(), Some("image/webp"));

        let headers = serde_json::json!({ "etag": "abc" });
        assert_eq!(content_type_header(&headers), None);
        assert_eq!(content_type_header(&Value::Null), None);
    }

    #[test]
    fn test_resource_kind_mapping() {
        assert_eq!(resource_kind(&ResourceType::Image), ResourceKind::Image);
        assert_eq!(resource_kind(&ResourceType::Script), ResourceKind::Other);
    }

    #[test]
    fn test_redirect_and_empty_responses_have_no_body() {
        let calls = Cell::new(0);
        let fetch = || -> Result<Vec<u8>, BrowserError> {
            calls.set(calls.get() + 1);
            Ok(b"png".to_vec())
        };

        for status in [301, 302, 304, 307, 204] {
            assert!(response(status, &fetch).body().is_none(), "status {}", status);
        }
        assert_eq!(calls.get(), 0);

        let body = response(200, &fetch).body().unwrap().unwrap();
        assert_eq!(body, b"png");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_read_body_decodes_base64() {
        let bytes = read_body(|| Ok::<_, String>(body("iVBORw==", true)), 3, Duration::ZERO).unwrap();
        assert_eq!(bytes, [0x89, b'P', b'N', b'G']);

        let bytes = read_body(|| Ok::<_, String>(body("plain", false)), 3, Duration::ZERO).unwrap();
        assert_eq!(bytes, b"plain");
    }

    #[test]
    fn test_read_body_retries_until_buffered() {
        let calls = Cell::new(0);
        let bytes = read_body(
            || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err("No data found for resource with given identifier".to_string())
                } else {
                    Ok(body("aGk=", true))
                }
            },
            3,
            Duration::ZERO,
        )
        .unwrap();

        assert_eq!(bytes, b"hi");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_read_body_gives_up_after_attempts() {
        let calls = Cell::new(0);
        let result = read_body(
            || {
                calls.set(calls.get() + 1);
                Err::<GetResponseBodyReturnObject, _>(format!("attempt {}", calls.get()))
            },
            3,
            Duration::ZERO,
        );

        match result {
            Err(BrowserError::ResponseBodyError(message)) => assert_eq!(message, "attempt 3"),
            other => panic!("expected body error, got {:?}", other),
        }
        assert_eq!(calls.get(), 3);

        let bad = read_body(|| Ok::<_, String>(body("%%%", true)), 1, Duration::ZERO);
        assert!(matches!(bad, Err(BrowserError::ResponseBodyError(_))));
    }

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn test_settle_and_enumerate_inline_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = BrowserConfig {
            user_data_dir: Some(dir.path().join("profile")),
            ..BrowserConfig::headless_mode()
        };
        let manager = BrowserManager::new(config).unwrap();
        let page = manager.new_page().unwrap();

        page.navigate(
            "data:text/html,<div id=divImage><img src='missing.png' width=40 height=30></div>",
            Readiness::Load,
        )
        .unwrap();
        let settled = page.settle_images("#divImage img").unwrap();
        assert_eq!(settled.len(), 1);

        let elements = page.image_elements("#divImage img").unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!((elements[0].width, elements[0].height), (40, 30));
        page.close().unwrap();
    }
}
