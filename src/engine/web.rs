use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

use super::html::{analyze_structure, extract_links};
use super::{Engine, ProgressCallback};
use crate::config::{WEB_LINK_TIMEOUT_SECS, WEB_MAX_LINKS};
use crate::model::TestTarget;
use crate::progress::ProgressSnapshot;
use crate::result::{
    BrokenLink, Issue, LinkAnalysis, Overall, PerformanceMetrics, SecurityHeaders, Severity,
    StructureAnalysis, Summary, TestResult,
};

const SLOW_LOAD_MS: f64 = 3000.0;
const SLUGGISH_LOAD_MS: f64 = 1000.0;
const LARGE_PAGE_BYTES: u64 = 3 * 1024 * 1024;
const FAIL_SCORE_BELOW: u8 = 50;

#[derive(Debug, Clone)]
pub struct WebEngineOptions {
    pub max_links: usize,
    pub link_timeout: Duration,
}

impl Default for WebEngineOptions {
    fn default() -> Self {
        Self {
            max_links: WEB_MAX_LINKS,
            link_timeout: Duration::from_secs(WEB_LINK_TIMEOUT_SECS),
        }
    }
}

/// Probes a website: fetch, structure, links and security headers.
pub struct WebEngine {
    client: reqwest::Client,
    options: WebEngineOptions,
}

impl WebEngine {
    pub fn new(client: reqwest::Client, options: WebEngineOptions) -> Self {
        Self { client, options }
    }

    /// Returns `Some` when the link is broken.
    async fn check_link(&self, link: &Url) -> Option<BrokenLink> {
        let head = self
            .client
            .head(link.clone())
            .timeout(self.options.link_timeout)
            .send()
            .await;

        let response = match head {
            Ok(resp)
                if resp.status() == StatusCode::METHOD_NOT_ALLOWED
                    || resp.status() == StatusCode::NOT_IMPLEMENTED =>
            {
                self.client
                    .get(link.clone())
                    .timeout(self.options.link_timeout)
                    .send()
                    .await
            }
            other => other,
        };

        match response {
            Ok(resp) if resp.status().is_client_error() || resp.status().is_server_error() => {
                Some(BrokenLink {
                    url: link.to_string(),
                    reason: format!("HTTP {}", resp.status().as_u16()),
                })
            }
            Ok(_) => None,
            Err(e) => Some(BrokenLink {
                url: link.to_string(),
                reason: if e.is_timeout() {
                    "timed out".to_string()
                } else {
                    "unreachable".to_string()
                },
            }),
        }
    }
}

#[async_trait]
impl Engine for WebEngine {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn run(
        &self,
        target: &TestTarget,
        progress: ProgressCallback,
    ) -> anyhow::Result<TestResult> {
        let raw_url = target
            .url()
            .ok_or_else(|| anyhow!("web tests need a URL target, got file '{}'", target.label()))?;
        let url = Url::parse(raw_url).with_context(|| format!("invalid URL '{}'", raw_url))?;

        progress(ProgressSnapshot::new(
            "connecting",
            10,
            format!("Connecting to {}", url.host_str().unwrap_or("target")),
        ));

        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("could not reach {}", url))?;
        let ttfb = started.elapsed();

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .context("failed to read response body")?;
        let load_time = started.elapsed();

        info!(
            "Fetched {} ({}, {} bytes in {:.0}ms)",
            final_url,
            status,
            body.len(),
            load_time.as_secs_f64() * 1000.0
        );
        progress(ProgressSnapshot::new(
            "fetched",
            40,
            format!("Received HTTP {} ({} bytes)", status.as_u16(), body.len()),
        ));

        let html = String::from_utf8_lossy(&body);
        let structure = analyze_structure(&html);
        progress(ProgressSnapshot::new("analyzing", 50, "Analyzed page structure"));

        let page_links = extract_links(&html, &final_url);
        let to_check = page_links.to_check(self.options.max_links);
        progress(ProgressSnapshot::new(
            "checking_links",
            60,
            format!("Checking {} of {} links", to_check.len(), page_links.total()),
        ));

        let mut broken = Vec::new();
        for (i, link) in to_check.iter().enumerate() {
            if let Some(b) = self.check_link(link).await {
                debug!("Broken link {}: {}", b.url, b.reason);
                broken.push(b);
            }
            let pct = 60 + ((i + 1) * 30 / to_check.len()) as u8;
            progress(ProgressSnapshot::new(
                "checking_links",
                pct,
                format!("Checked {}/{} links", i + 1, to_check.len()),
            ));
        }

        progress(ProgressSnapshot::new("scoring", 95, "Scoring results"));

        let facts = PageFacts {
            performance: PerformanceMetrics {
                status_code: status.as_u16(),
                ttfb_ms: round_ms(ttfb),
                load_time_ms: round_ms(load_time),
                page_size_bytes: body.len() as u64,
                compressed: headers.contains_key(reqwest::header::CONTENT_ENCODING),
            },
            structure,
            links: LinkAnalysis {
                total: page_links.total() as u32,
                internal: page_links.internal.len() as u32,
                external: page_links.external.len() as u32,
                checked: to_check.len() as u32,
                broken,
            },
            security: security_headers(&final_url, &headers),
        };

        Ok(evaluate(facts))
    }
}

fn round_ms(d: Duration) -> f64 {
    (d.as_secs_f64() * 100_000.0).round() / 100.0
}

fn security_headers(url: &Url, headers: &HeaderMap) -> SecurityHeaders {
    SecurityHeaders {
        https: url.scheme() == "https",
        hsts: headers.contains_key(reqwest::header::STRICT_TRANSPORT_SECURITY),
        content_security_policy: headers.contains_key(reqwest::header::CONTENT_SECURITY_POLICY),
        x_content_type_options: headers.contains_key(reqwest::header::X_CONTENT_TYPE_OPTIONS),
        x_frame_options: headers.contains_key(reqwest::header::X_FRAME_OPTIONS),
    }
}

/// Everything the web engine measured about a page.
#[derive(Debug, Clone, Default)]
pub struct PageFacts {
    pub performance: PerformanceMetrics,
    pub structure: StructureAnalysis,
    pub links: LinkAnalysis,
    pub security: SecurityHeaders,
}

#[derive(Default)]
struct Checklist {
    total: u32,
    passed: u32,
    issues: Vec<Issue>,
}

impl Checklist {
    fn record(&mut self, issue: Option<Issue>) {
        self.total += 1;
        match issue {
            Some(issue) => self.issues.push(issue),
            None => self.passed += 1,
        }
    }

    fn require(&mut self, ok: bool, issue: impl FnOnce() -> Issue) {
        self.record(if ok { None } else { Some(issue()) });
    }
}

/// Turn measured page facts into a scored result.
pub fn evaluate(facts: PageFacts) -> TestResult {
    let PageFacts {
        performance: perf,
        structure,
        links,
        security,
    } = facts;
    let mut checks = Checklist::default();

    checks.require(perf.status_code < 400, || {
        Issue::new(
            Severity::High,
            "availability",
            format!("Page returned HTTP {}", perf.status_code),
            "Make sure the URL serves the page successfully",
        )
    });
    checks.require(security.https, || {
        Issue::new(
            Severity::Medium,
            "security",
            "Page is not served over HTTPS",
            "Serve the site over HTTPS and redirect plain HTTP requests",
        )
    });
    checks.record(if perf.load_time_ms > SLOW_LOAD_MS {
        Some(Issue::new(
            Severity::Medium,
            "performance",
            format!("Page took {:.0}ms to load", perf.load_time_ms),
            "Reduce server response time and page weight to load in under a second",
        ))
    } else if perf.load_time_ms > SLUGGISH_LOAD_MS {
        Some(Issue::new(
            Severity::Low,
            "performance",
            format!("Page took {:.0}ms to load", perf.load_time_ms),
            "Enable caching and compression to bring load time under a second",
        ))
    } else {
        None
    });
    checks.require(perf.page_size_bytes <= LARGE_PAGE_BYTES, || {
        Issue::new(
            Severity::Low,
            "performance",
            format!("Page weighs {} KB", perf.page_size_bytes / 1024),
            "Minify markup and move large inline assets out of the page",
        )
    });
    checks.require(structure.title.is_some(), || {
        Issue::new(
            Severity::Medium,
            "seo",
            "Page has no <title>",
            "Add a descriptive <title> element",
        )
    });
    checks.require(structure.has_meta_description, || {
        Issue::new(
            Severity::Low,
            "seo",
            "Page has no meta description",
            "Add a <meta name=\"description\"> summarizing the page",
        )
    });
    checks.require(structure.has_viewport, || {
        Issue::new(
            Severity::Medium,
            "mobile",
            "Page has no viewport meta tag",
            "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
        )
    });
    checks.require(structure.has_lang, || {
        Issue::new(
            Severity::Low,
            "accessibility",
            "The <html> element has no lang attribute",
            "Declare the page language, e.g. <html lang=\"en\">",
        )
    });
    checks.require(structure.h1_count == 1, || {
        let message = if structure.h1_count == 0 {
            "Page has no <h1> heading".to_string()
        } else {
            format!("Page has {} <h1> headings", structure.h1_count)
        };
        Issue::new(
            Severity::Low,
            "seo",
            message,
            "Use exactly one <h1> describing the page",
        )
    });
    checks.require(structure.images_missing_alt == 0, || {
        Issue::new(
            Severity::Low,
            "accessibility",
            format!(
                "{} of {} images have no alt text",
                structure.images_missing_alt, structure.image_count
            ),
            "Add alt text to every meaningful image",
        )
    });
    checks.require(links.broken.is_empty(), || {
        Issue::new(
            Severity::Medium,
            "links",
            format!(
                "{} of {} checked links are broken",
                links.broken.len(),
                links.checked
            ),
            "Fix or remove the broken links",
        )
    });
    if security.https {
        checks.require(security.hsts, || {
            Issue::new(
                Severity::Low,
                "security",
                "Strict-Transport-Security header is missing",
                "Send a Strict-Transport-Security header",
            )
        });
    }
    checks.require(security.content_security_policy, || {
        Issue::new(
            Severity::Low,
            "security",
            "Content-Security-Policy header is missing",
            "Define a Content-Security-Policy to restrict script sources",
        )
    });
    checks.require(security.x_content_type_options, || {
        Issue::new(
            Severity::Low,
            "security",
            "X-Content-Type-Options header is missing",
            "Send X-Content-Type-Options: nosniff",
        )
    });
    checks.require(security.x_frame_options, || {
        Issue::new(
            Severity::Low,
            "security",
            "X-Frame-Options header is missing",
            "Send X-Frame-Options: DENY or SAMEORIGIN to prevent clickjacking",
        )
    });

    let failed = checks
        .issues
        .iter()
        .filter(|i| i.severity == Severity::High)
        .count() as u32;
    let warnings = checks.issues.len() as u32 - failed;
    let penalty: u32 = checks
        .issues
        .iter()
        .map(|i| u32::from(i.severity.penalty()))
        .sum();
    let score = 100u32.saturating_sub(penalty) as u8;

    let overall = if failed > 0 || score < FAIL_SCORE_BELOW {
        Overall::Fail
    } else if !checks.issues.is_empty() {
        Overall::Warning
    } else {
        Overall::Pass
    };

    let mut recommendations: Vec<String> = Vec::new();
    for issue in &checks.issues {
        if !recommendations.contains(&issue.suggestion) {
            recommendations.push(issue.suggestion.clone());
        }
    }
    if recommendations.is_empty() {
        recommendations.push("No action needed: the page passed every check".to_string());
    }

    TestResult {
        overall,
        score,
        summary: Summary {
            total: checks.total,
            passed: checks.passed,
            failed,
            warnings,
        },
        issues: checks.issues,
        recommendations,
        performance: perf,
        structure,
        links,
        security,
    }
}
