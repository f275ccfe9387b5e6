//! The extraction pipeline: launch, navigate, read the three channels,
//! aggregate, release.

use crate::aggregate::{aggregate, Aggregated, ChannelOutputs, InlineStylesMode, OriginsMode};
use crate::coverage::filter_coverage;
use crate::driver::{DriverLauncher, LaunchConfig, PageDriver};
use crate::inline::synthesize_inline_styles;
use crate::options::ExtractOptions;
use crate::provenance::{Origin, ProvenanceEntry};
use crate::result::{ExtractError, ExtractResult};
use crate::stylesheet::collect_stylesheet_tree;
use std::sync::Arc;

/// Extract all CSS from `url` using Chromium
///
/// Returns flattened text by default, or provenance entries when
/// `options.origins` is [`OriginsMode::Include`].
#[cfg(feature = "browser")]
pub async fn extract_css(url: &str, options: &ExtractOptions) -> ExtractResult<Aggregated> {
    extract_css_with(&crate::browser::ChromiumLauncher, url, options).await
}

/// Extract all CSS from `url`, launching the page through `launcher`
///
/// A browser override in `options` takes precedence over `launcher`; it is
/// validated before anything is launched.
pub async fn extract_css_with(
    launcher: &dyn DriverLauncher,
    url: &str,
    options: &ExtractOptions,
) -> ExtractResult<Aggregated> {
    let overridden: Option<(Arc<dyn DriverLauncher>, LaunchConfig)> = options
        .browser_override
        .as_ref()
        .map(|over| over.resolve(options.launch.clone()))
        .transpose()?;

    let (launcher, config) = match &overridden {
        Some((launcher, config)) => (launcher.as_ref(), config),
        None => (launcher, &options.launch),
    };

    let mut driver = launcher.launch(config).await?;
    let outcome = run(driver.as_ref(), url, options).await;
    let closed = driver.close().await;

    match (outcome, closed) {
        (Ok(result), Ok(())) => Ok(result),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), closed) => {
            if let Err(close_err) = closed {
                tracing::warn!(error = %close_err, "failed to close browser after error");
            }
            Err(err)
        }
    }
}

async fn run(driver: &dyn PageDriver, url: &str, options: &ExtractOptions) -> ExtractResult<Aggregated> {
    driver.start_css_coverage().await?;

    tracing::info!(url, wait_until = ?options.wait_until, "navigating");
    let navigate_options = options.navigate_options();
    let navigation = driver.navigate(url, &navigate_options);
    let response = match tokio::time::timeout(options.timeout, navigation).await {
        Ok(response) => response?,
        Err(_) => {
            return Err(ExtractError::NavigationTimeout {
                ms: u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    };

    if response.is_error() {
        return Err(ExtractError::InvalidUrl {
            url: url.to_string(),
            status_code: response.status,
            status_text: response.status_text,
        });
    }

    let document_url = response.final_url.as_deref().unwrap_or(url);

    if response.is_stylesheet() {
        tracing::debug!(url = document_url, "navigated to a stylesheet, returning body");
        let body = driver.response_body().await?;
        return Ok(match options.origins {
            OriginsMode::Exclude => Aggregated::Text(body),
            OriginsMode::Include => {
                Aggregated::Entries(vec![ProvenanceEntry::new(Origin::Link, document_url, body)])
            }
        });
    }

    let read_inline = async {
        match options.inline_styles {
            InlineStylesMode::Include => driver.inline_style_attributes().await,
            InlineStylesMode::Exclude => Ok(Vec::new()),
        }
    };
    let (sheets, coverage, inline) = futures::try_join!(
        driver.stylesheet_tree(),
        driver.coverage_records(),
        read_inline
    )?;
    tracing::debug!(
        sheets = sheets.len(),
        coverage = coverage.len(),
        inline = inline.len(),
        "read CSS channels"
    );

    let channels = ChannelOutputs {
        coverage: filter_coverage(coverage, document_url),
        tree: collect_stylesheet_tree(&sheets, document_url),
        inline: synthesize_inline_styles(&inline, document_url, options.inline_selector),
    };
    Ok(aggregate(channels, &options.aggregate_options()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::browser_override::BrowserOverride;
    use crate::coverage::CoverageRecord;
    use crate::driver::{MockChannel, MockDriver, MockLauncher};
    use crate::stylesheet::{RuleRecord, StylesheetNode};
    use std::time::Duration;

    const URL: &str = "http://localhost/kitchen-sink.html";

    fn kitchen_sink() -> MockDriver {
        let imported = StylesheetNode::detached(
            "http://localhost/import-in-css.css",
            vec![RuleRecord::plain(".css-imported-with-css { }")],
        );
        MockDriver::new()
            .with_sheets(vec![
                StylesheetNode::link(
                    "http://localhost/link-in-html.css",
                    vec![
                        RuleRecord::import("http://localhost/import-in-css.css", imported),
                        RuleRecord::plain(".link-in-html { }"),
                    ],
                ),
                StylesheetNode::style(URL, vec![RuleRecord::plain(".fixture { color: red; }")]),
            ])
            .with_coverage(vec![
                CoverageRecord::new(
                    "http://localhost/link-in-html.css",
                    "@import url(\"import-in-css.css\");\n.link-in-html { }",
                ),
                CoverageRecord::new("http://localhost/import-in-css.css", ".css-imported-with-css { }"),
                CoverageRecord::new(URL, ".fixture { color: red; }"),
            ])
            .with_inline_attributes(["color: red; font-size: 12px;", "", "color: blue"])
    }

    mod pipeline_tests {
        use super::*;

        #[tokio::test]
        async fn test_link_text_from_coverage() {
            let launcher = MockLauncher::new(
                MockDriver::new()
                    .with_sheets(vec![StylesheetNode::link("a.css", vec![])])
                    .with_coverage(vec![CoverageRecord::new("a.css", ".x{color:red}")]),
            );
            let result = extract_css_with(&launcher, URL, &ExtractOptions::default())
                .await
                .unwrap();
            assert_eq!(result, Aggregated::Text(".x{color:red}".to_string()));
        }

        #[tokio::test]
        async fn test_kitchen_sink_text() {
            let launcher = MockLauncher::new(kitchen_sink());
            let text = extract_css_with(&launcher, URL, &ExtractOptions::default())
                .await
                .unwrap()
                .to_text();
            assert!(text.contains("@import url(\"import-in-css.css\")"));
            assert!(text.contains(".css-imported-with-css { }"));
            assert!(text.contains("[x-extract-css-inline-style] { color: red; font-size: 12px; }"));
            assert!(text.contains("[x-extract-css-inline-style] { color: blue }"));
            assert_eq!(text.find(".fixture"), text.rfind(".fixture"));
            assert_eq!(text.find(".link-in-html"), text.rfind(".link-in-html"));
        }

        #[tokio::test]
        async fn test_style_import_spliced_before_later_rules() {
            let imported = StylesheetNode::detached("b.css", vec![RuleRecord::plain(".y{}")]);
            let launcher = MockLauncher::new(MockDriver::new().with_sheets(vec![StylesheetNode::style(
                URL,
                vec![
                    RuleRecord::import("b.css", imported),
                    RuleRecord::plain(".fixture { color: red; }"),
                ],
            )]));
            let result = extract_css_with(&launcher, URL, &ExtractOptions::default())
                .await
                .unwrap();
            assert_eq!(
                result,
                Aggregated::Text("@import url(\"b.css\");\n.y{}\n.fixture { color: red; }".to_string())
            );
        }

        #[tokio::test]
        async fn test_structured_entries() {
            let launcher = MockLauncher::new(kitchen_sink());
            let options = ExtractOptions::new().with_origins(OriginsMode::Include);
            let result = extract_css_with(&launcher, URL, &options).await.unwrap();
            let entries = result.entries().unwrap();
            assert!(entries.iter().any(|e| e.origin == Origin::Style && e.source_location == URL));
            assert_eq!(entries.iter().filter(|e| e.origin == Origin::Inline).count(), 2);
            assert_eq!(
                result.to_text(),
                extract_css_with(&launcher, URL, &ExtractOptions::default())
                    .await
                    .unwrap()
                    .to_text()
            );
        }

        #[tokio::test]
        async fn test_inline_excluded_skips_channel() {
            let launcher = MockLauncher::new(
                MockDriver::new().with_inline_attributes(["color: red; font-size: 12px;", "color: blue"]),
            );
            let options = ExtractOptions::new().with_inline_styles(InlineStylesMode::Exclude);
            let result = extract_css_with(&launcher, URL, &options).await.unwrap();
            assert_eq!(result, Aggregated::Text(String::new()));
            assert!(!launcher.driver().was_called("inline_style_attributes"));
        }

        #[tokio::test]
        async fn test_coverage_started_before_navigation() {
            let launcher = MockLauncher::new(MockDriver::new());
            extract_css_with(&launcher, URL, &ExtractOptions::default())
                .await
                .unwrap();
            let history = launcher.driver().history();
            let start = history.iter().position(|c| c == "start_css_coverage").unwrap();
            let nav = history.iter().position(|c| c.starts_with("navigate:")).unwrap();
            assert!(start < nav);
            assert_eq!(history.last().map(String::as_str), Some("close"));
        }

        #[tokio::test]
        async fn test_direct_stylesheet_body() {
            let launcher = MockLauncher::new(
                MockDriver::new()
                    .with_document("text/css; charset=utf-8", ".css-imported-with-css {}")
                    .with_coverage(vec![CoverageRecord::new("other.css", ".other {}")]),
            );
            let css_url = "http://localhost/import-in-css.css";
            let result = extract_css_with(&launcher, css_url, &ExtractOptions::default())
                .await
                .unwrap();
            assert_eq!(result, Aggregated::Text(".css-imported-with-css {}".to_string()));
            assert!(!launcher.driver().was_called("coverage_records"));

            let options = ExtractOptions::new().with_origins(OriginsMode::Include);
            let result = extract_css_with(&launcher, css_url, &options).await.unwrap();
            assert_eq!(
                result,
                Aggregated::Entries(vec![ProvenanceEntry::new(
                    Origin::Link,
                    css_url,
                    ".css-imported-with-css {}"
                )])
            );
        }
    }

    mod error_tests {
        use super::*;

        #[tokio::test]
        async fn test_http_error_status() {
            let launcher = MockLauncher::new(MockDriver::new().with_status(404, "Not Found"));
            let err = extract_css_with(&launcher, URL, &ExtractOptions::default())
                .await
                .unwrap_err();
            match err {
                ExtractError::InvalidUrl {
                    url,
                    status_code,
                    status_text,
                } => {
                    assert_eq!(url, URL);
                    assert_eq!(status_code, 404);
                    assert_eq!(status_text, "Not Found");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(launcher.driver().was_called("close"));
            assert!(!launcher.driver().was_called("stylesheet_tree"));
        }

        #[tokio::test]
        async fn test_navigation_timeout() {
            let launcher = MockLauncher::new(
                MockDriver::new().with_navigate_delay(Duration::from_millis(500)),
            );
            let options = ExtractOptions::new().with_timeout(Duration::from_millis(20));
            let err = extract_css_with(&launcher, URL, &options).await.unwrap_err();
            assert!(matches!(err, ExtractError::NavigationTimeout { ms: 20 }));
            assert_eq!(err.to_string(), "Navigation timeout of 20 ms exceeded");
            assert!(launcher.driver().was_called("close"));
        }

        #[tokio::test]
        async fn test_channel_failure_closes_driver() {
            let launcher = MockLauncher::new(
                kitchen_sink().with_failing_channel(MockChannel::StylesheetTree),
            );
            let err = extract_css_with(&launcher, URL, &ExtractOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ExtractError::Page { .. }));
            assert!(launcher.driver().was_called("close"));
        }

        #[tokio::test]
        async fn test_pipeline_error_wins_over_close_error() {
            let launcher = MockLauncher::new(
                MockDriver::new()
                    .with_status(500, "Internal Server Error")
                    .with_failing_close(),
            );
            let err = extract_css_with(&launcher, URL, &ExtractOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ExtractError::InvalidUrl { status_code: 500, .. }));
        }

        #[tokio::test]
        async fn test_close_error_is_reported() {
            let launcher = MockLauncher::new(MockDriver::new().with_failing_close());
            let err = extract_css_with(&launcher, URL, &ExtractOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ExtractError::Page { .. }));
        }
    }

    mod override_tests {
        use super::*;

        #[tokio::test]
        async fn test_invalid_override_fails_before_launch() {
            let launcher = MockLauncher::new(MockDriver::new());
            let options = ExtractOptions::new().with_browser_override(BrowserOverride {
                executable_path: None,
                args: Some(vec![]),
                launcher: Some(Arc::new(launcher.clone())),
            });
            let err = extract_css_with(&launcher, URL, &options).await.unwrap_err();
            assert!(matches!(err, ExtractError::InvalidOverride { .. }));
            assert!(err
                .to_string()
                .ends_with("https://github.com/bartveneman/extract-css-core#options"));
            assert!(launcher.launches().is_empty());
            assert!(launcher.driver().history().is_empty());
        }

        #[tokio::test]
        async fn test_override_launcher_is_used() {
            let default_launcher = MockLauncher::new(MockDriver::new());
            let custom = MockLauncher::new(
                MockDriver::new().with_coverage(vec![CoverageRecord::new("a.css", ".custom {}")]),
            );
            let options = ExtractOptions::new().with_browser_override(BrowserOverride::new(
                "/opt/chromium/chrome",
                vec!["--single-process".to_string()],
                Arc::new(custom.clone()),
            ));
            let result = extract_css_with(&default_launcher, URL, &options).await.unwrap();
            assert_eq!(result.to_text(), ".custom {}");
            assert!(default_launcher.launches().is_empty());
            let launches = custom.launches();
            assert_eq!(launches.len(), 1);
            assert_eq!(launches[0].executable_path.as_deref(), Some("/opt/chromium/chrome"));
            assert_eq!(launches[0].args, vec!["--single-process".to_string()]);
        }
    }
}
