//! Chromium page driver over the Chrome `DevTools` Protocol.
//!
//! Stylesheet headers and document responses are collected from CDP events
//! by listener tasks started before anything is enabled, so sheets loaded
//! during navigation are never missed. Coverage text comes from the `CSS`
//! domain; the stylesheet tree and inline styles come from page evaluation.

use crate::coverage::CoverageRecord;
use crate::driver::{
    DriverLauncher, LaunchConfig, NavigateOptions, NavigationResponse, PageDriver, WaitUntil,
};
use crate::result::{ExtractError, ExtractResult};
use crate::stylesheet::{StylesheetNode, MAX_IMPORT_DEPTH};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::css::{
    CssStyleSheetHeader, EnableParams as CssEnableParams, EventStyleSheetAdded,
    GetStyleSheetTextParams, StartRuleUsageTrackingParams, StopRuleUsageTrackingParams,
};
use chromiumoxide::cdp::browser_protocol::dom::EnableParams as DomEnableParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventResponseReceived, GetResponseBodyParams, RequestId,
    ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Quiet period after which the network is considered idle
const NETWORK_QUIET: Duration = Duration::from_millis(500);
const NETWORK_POLL: Duration = Duration::from_millis(100);

const INLINE_STYLES_JS: &str = "JSON.stringify([...document.querySelectorAll('[style]')]\
    .map(element => element.getAttribute('style') || ''))";

const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";

fn stylesheet_tree_js() -> String {
    format!(
        r"(() => {{
    const maxDepth = {MAX_IMPORT_DEPTH};
    const ownerKind = sheet => {{
        const tag = sheet.ownerNode && sheet.ownerNode.tagName;
        if (!tag) return null;
        const name = tag.toLowerCase();
        return name === 'style' || name === 'link' ? name : null;
    }};
    const rules = (sheet, depth) => {{
        let list;
        try {{ list = sheet.cssRules; }} catch (e) {{ return []; }}
        return [...list].map(rule => {{
            if (rule instanceof CSSImportRule) {{
                const nested = rule.styleSheet && depth < maxDepth
                    ? describe(rule.styleSheet, depth + 1)
                    : null;
                const href = (rule.styleSheet && rule.styleSheet.href) || rule.href;
                return {{ kind: 'import', href, text: rule.cssText, nested }};
            }}
            return {{ kind: 'plain', text: rule.cssText }};
        }});
    }};
    const describe = (sheet, depth) => ({{
        ownerKind: depth === 0 ? ownerKind(sheet) : null,
        href: sheet.href || document.location.href,
        rules: rules(sheet, depth),
    }});
    const sheets = [...document.styleSheets, ...(document.adoptedStyleSheets || [])];
    return JSON.stringify(sheets.map(sheet => describe(sheet, 0)));
}})()"
    )
}

/// Launches headless Chromium
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self, config: &LaunchConfig) -> ExtractResult<Box<dyn PageDriver>> {
        Ok(Box::new(ChromiumDriver::launch(config).await?))
    }
}

#[derive(Debug, Clone)]
struct DocumentResponse {
    request_id: RequestId,
    url: String,
    status: i64,
    status_text: String,
    mime_type: String,
}

/// Page driver backed by a real Chromium instance
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: tokio::sync::Mutex<CdpBrowser>,
    page: CdpPage,
    handler: JoinHandle<()>,
    listeners: Vec<JoinHandle<()>>,
    sheets: Arc<Mutex<Vec<CssStyleSheetHeader>>>,
    documents: Arc<Mutex<Vec<DocumentResponse>>>,
    main_request: Mutex<Option<RequestId>>,
}

impl ChromiumDriver {
    /// Launch a browser and open a blank page
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be launched or the page cannot be
    /// prepared
    pub async fn launch(config: &LaunchConfig) -> ExtractResult<Self> {
        let mut builder = CdpConfig::builder();

        if !config.headless {
            builder = builder.with_head();
        }

        if !config.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = config.executable_path {
            builder = builder.chrome_executable(path);
        }

        if !config.args.is_empty() {
            builder = builder.args(config.args.iter().map(String::as_str));
        }

        let cdp_config = builder.build().map_err(|message| ExtractError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| ExtractError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(ExtractError::BrowserLaunch {
                    message: e.to_string(),
                });
            }
        };
        tracing::debug!(headless = config.headless, sandbox = config.sandbox, "browser launched");

        let mut driver = Self {
            browser: tokio::sync::Mutex::new(browser),
            page,
            handler,
            listeners: Vec::new(),
            sheets: Arc::default(),
            documents: Arc::default(),
            main_request: Mutex::new(None),
        };
        if let Err(err) = driver.prepare(config).await {
            if let Err(close_err) = driver.close().await {
                tracing::warn!(error = %close_err, "failed to close browser after setup error");
            }
            return Err(err);
        }
        Ok(driver)
    }

    async fn prepare(&mut self, config: &LaunchConfig) -> ExtractResult<()> {
        let mut added = self
            .page
            .event_listener::<EventStyleSheetAdded>()
            .await
            .map_err(cdp_error)?;
        let sheets = Arc::clone(&self.sheets);
        self.listeners.push(tokio::spawn(async move {
            while let Some(event) = added.next().await {
                sheets
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event.header.clone());
            }
        }));

        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp_error)?;
        let documents = Arc::clone(&self.documents);
        self.listeners.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type != ResourceType::Document {
                    continue;
                }
                documents
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(DocumentResponse {
                        request_id: event.request_id.clone(),
                        url: event.response.url.clone(),
                        status: event.response.status,
                        status_text: event.response.status_text.clone(),
                        mime_type: event.response.mime_type.clone(),
                    });
            }
        }));

        self.page
            .execute(NetworkEnableParams::default())
            .await
            .map_err(cdp_error)?;
        if let Some(ref user_agent) = config.user_agent {
            self.page
                .execute(SetUserAgentOverrideParams::new(user_agent.clone()))
                .await
                .map_err(cdp_error)?;
        }
        Ok(())
    }

    async fn settle_network(&self, wait_until: WaitUntil) -> ExtractResult<()> {
        if !wait_until.waits_for_network() {
            return Ok(());
        }
        let mut last = self.resource_count().await?;
        let mut quiet = Duration::ZERO;
        while quiet < NETWORK_QUIET {
            tokio::time::sleep(NETWORK_POLL).await;
            let count = self.resource_count().await?;
            if count == last {
                quiet += NETWORK_POLL;
            } else {
                last = count;
                quiet = Duration::ZERO;
            }
        }
        Ok(())
    }

    async fn resource_count(&self) -> ExtractResult<u64> {
        self.evaluate::<u64>(RESOURCE_COUNT_JS).await
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&self, expr: &str) -> ExtractResult<T> {
        let result = self.page.evaluate(expr).await.map_err(cdp_error)?;
        result.into_value().map_err(cdp_error)
    }

    async fn evaluate_json<T: serde::de::DeserializeOwned>(&self, expr: &str) -> ExtractResult<T> {
        let json: String = self.evaluate(expr).await?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn start_css_coverage(&self) -> ExtractResult<()> {
        self.page
            .execute(DomEnableParams::default())
            .await
            .map_err(cdp_error)?;
        self.page
            .execute(CssEnableParams::default())
            .await
            .map_err(cdp_error)?;
        self.page
            .execute(StartRuleUsageTrackingParams::default())
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn navigate(&self, url: &str, options: &NavigateOptions) -> ExtractResult<NavigationResponse> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        self.page
            .goto(url)
            .await
            .map_err(|e| ExtractError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        self.settle_network(options.wait_until).await?;

        let document = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .cloned()
            .ok_or_else(|| ExtractError::Navigation {
                url: url.to_string(),
                message: "no document response received".to_string(),
            })?;
        tracing::debug!(status = document.status, mime = %document.mime_type, "document response");

        *self.main_request.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(document.request_id.clone());

        Ok(NavigationResponse {
            status: u16::try_from(document.status).unwrap_or(0),
            status_text: document.status_text,
            content_type: Some(document.mime_type),
            final_url: Some(document.url),
        })
    }

    async fn response_body(&self) -> ExtractResult<String> {
        let request_id = self
            .main_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ExtractError::page("no navigation response to read"))?;
        let response = self
            .page
            .execute(GetResponseBodyParams::new(request_id))
            .await
            .map_err(cdp_error)?;

        if !response.result.base64_encoded {
            return Ok(response.result.body.clone());
        }
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&response.result.body)
            .map_err(cdp_error)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn stylesheet_tree(&self) -> ExtractResult<Vec<StylesheetNode>> {
        self.evaluate_json(&stylesheet_tree_js()).await
    }

    async fn coverage_records(&self) -> ExtractResult<Vec<CoverageRecord>> {
        self.page
            .execute(StopRuleUsageTrackingParams::default())
            .await
            .map_err(cdp_error)?;

        let headers = self
            .sheets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for header in headers {
            if header.source_url.is_empty() || !seen.insert(header.style_sheet_id.clone()) {
                continue;
            }
            match self
                .page
                .execute(GetStyleSheetTextParams::new(header.style_sheet_id.clone()))
                .await
            {
                Ok(response) => records.push(CoverageRecord::new(
                    header.source_url.clone(),
                    response.result.text.clone(),
                )),
                // Sheets removed from the document before this point have no text.
                Err(e) => tracing::warn!(url = %header.source_url, error = %e, "stylesheet text unavailable"),
            }
        }
        Ok(records)
    }

    async fn inline_style_attributes(&self) -> ExtractResult<Vec<String>> {
        self.evaluate_json(INLINE_STYLES_JS).await
    }

    async fn close(&mut self) -> ExtractResult<()> {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.map(|_| ()).map_err(cdp_error);
        if closed.is_ok() {
            if let Err(e) = browser.wait().await {
                tracing::debug!(error = %e, "browser process did not exit cleanly");
            }
        }
        self.handler.abort();
        closed
    }
}

fn cdp_error(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::page(e.to_string())
}
