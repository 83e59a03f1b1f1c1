use std::time::Instant;

use futures_util::future::join_all;
use tracing::{error, info};

use crate::http::{ACCEPT_JSON, HttpClient};

/// What came back from one probe.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Http(u16),
    /// No response at all.
    Error,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Http(code) => write!(f, "{code}"),
            ProbeStatus::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub url: String,
    /// Last path segment of `url`, for compact reports.
    pub label: String,
    pub status: ProbeStatus,
    /// `0` when the request failed before a response arrived.
    pub latency_ms: u64,
    pub ok: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProbeSummary {
    pub success_count: usize,
    pub total: usize,
}

impl ProbeSummary {
    pub fn all_failed(&self) -> bool {
        self.success_count == 0
    }
}

impl std::fmt::Display for ProbeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} succeeded", self.success_count, self.total)
    }
}

/// `https://host/a/MapServer?f=json` -> `MapServer?f=json`.
pub fn probe_label(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Reachability checks against a list of endpoints.
pub struct ServiceProbe<'a> {
    client: &'a dyn HttpClient,
}

impl<'a> ServiceProbe<'a> {
    pub fn new(client: &'a dyn HttpClient) -> Self {
        Self { client }
    }

    /// Probes `urls` one at a time, in order.
    ///
    /// Each outcome is recorded before the next request goes out, and a failed
    /// URL never stops the rest.
    pub async fn probe<S: AsRef<str>>(&self, urls: &[S]) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            results.push(self.probe_one(url.as_ref()).await);
        }
        results
    }

    /// Like [`probe`](Self::probe) but with every request in flight at once.
    /// Results still come back in input order.
    pub async fn probe_parallel<S: AsRef<str>>(&self, urls: &[S]) -> Vec<ProbeResult> {
        join_all(urls.iter().map(|url| self.probe_one(url.as_ref()))).await
    }

    async fn probe_one(&self, url: &str) -> ProbeResult {
        let started = Instant::now();
        let label = probe_label(url);
        match self.client.get(url, Some(ACCEPT_JSON)).await {
            Ok(resp) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                info!("{url}: {} ({latency_ms}ms)", resp.status);
                ProbeResult {
                    url: url.to_string(),
                    label,
                    status: ProbeStatus::Http(resp.status),
                    latency_ms,
                    ok: resp.is_success(),
                }
            }
            Err(e) => {
                error!(%url, error = %e, "probe failed");
                ProbeResult {
                    url: url.to_string(),
                    label,
                    status: ProbeStatus::Error,
                    latency_ms: 0,
                    ok: false,
                }
            }
        }
    }
}

pub fn summarize(results: &[ProbeResult]) -> ProbeSummary {
    ProbeSummary {
        success_count: results.iter().filter(|r| r.ok).count(),
        total: results.len(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{ProbeStatus, ServiceProbe, probe_label, summarize};
    use crate::http::{
        BoxFuture, HttpClient, HttpResponse, Scripted, ScriptedClient, TransportError,
    };
    use pretty_assertions::assert_eq;

    /// Yields once per request and remembers the most requests seen in flight.
    #[derive(Default)]
    struct InFlightClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlightClient {
        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl HttpClient for InFlightClient {
        fn get<'a>(
            &'a self,
            url: &'a str,
            _accept: Option<&'a str>,
        ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                if url.starts_with("bad") {
                    Err(TransportError::new(url, "connection reset"))
                } else {
                    Ok(HttpResponse::new(200, Vec::new()))
                }
            })
        }
    }

    fn client() -> ScriptedClient {
        ScriptedClient::new()
            .ok("ok-url")
            .fail("bad-url", "connection reset")
            .ok("ok-url2")
    }

    #[tokio::test]
    async fn transport_failure_is_isolated_and_order_kept() {
        let client = client();
        let results = ServiceProbe::new(&client)
            .probe(&["ok-url", "bad-url", "ok-url2"])
            .await;

        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["ok-url", "bad-url", "ok-url2"]);
        assert!(!results[1].ok);
        assert_eq!(results[1].status, ProbeStatus::Error);
        assert_eq!(results[1].status.to_string(), "ERROR");
        assert_eq!(results[1].latency_ms, 0);
        assert!(results[0].ok && results[2].ok);

        let summary = summarize(&results);
        assert_eq!((summary.success_count, summary.total), (2, 3));
        assert_eq!(summary.to_string(), "2/3 succeeded");
        assert_eq!(client.requested_urls(), vec!["ok-url", "bad-url", "ok-url2"]);
    }

    #[tokio::test]
    async fn sequential_probe_has_one_request_in_flight() {
        let client = InFlightClient::default();
        let results = ServiceProbe::new(&client)
            .probe(&["ok-url", "bad-url", "ok-url2"])
            .await;
        assert_eq!(client.peak(), 1);
        let oks: Vec<bool> = results.iter().map(|r| r.ok).collect();
        assert_eq!(oks, vec![true, false, true]);
    }

    #[tokio::test]
    async fn parallel_probe_overlaps_requests() {
        let client = InFlightClient::default();
        let results = ServiceProbe::new(&client)
            .probe_parallel(&["ok-url", "bad-url", "ok-url2"])
            .await;
        assert_eq!(client.peak(), 3);
        assert_eq!(summarize(&results).success_count, 2);
    }

    #[tokio::test]
    async fn non_2xx_is_recorded_but_not_ok() {
        let client = ScriptedClient::new().route("https://svc.test/MapServer", Scripted::Status(503));
        let results = ServiceProbe::new(&client)
            .probe(&["https://svc.test/MapServer"])
            .await;
        assert_eq!(results[0].status, ProbeStatus::Http(503));
        assert!(!results[0].ok);
        assert!(summarize(&results).all_failed());
    }

    #[tokio::test]
    async fn probes_ask_for_json() {
        let client = client();
        ServiceProbe::new(&client).probe(&["ok-url"]).await;
        assert_eq!(client.requests()[0].1.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn parallel_variant_keeps_input_order() {
        let client = client();
        let results = ServiceProbe::new(&client)
            .probe_parallel(&["bad-url", "ok-url", "ok-url2"])
            .await;
        let oks: Vec<bool> = results.iter().map(|r| r.ok).collect();
        assert_eq!(oks, vec![false, true, true]);
        assert_eq!(results[0].url, "bad-url");
    }

    #[test]
    fn labels_are_last_path_segment() {
        assert_eq!(
            probe_label("https://h.test/rest/services/Hosted/GF2/MapServer?f=json"),
            "MapServer?f=json"
        );
        assert_eq!(probe_label("plain"), "plain");
    }

    #[test]
    fn empty_input_summarizes_to_zero() {
        let summary = summarize(&[]);
        assert_eq!((summary.success_count, summary.total), (0, 0));
    }
}
