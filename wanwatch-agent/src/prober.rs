//! Connectivity prober
//!
//! Decides whether the WAN currently has internet access by walking an
//! ordered list of well-known, highly available endpoints:
//! - First endpoint that answers → online, remaining targets are skipped
//! - Failed endpoint → fixed delay, then the next one
//! - Every endpoint failed → offline
//!
//! The endpoints belong to different providers so a single provider outage
//! cannot produce a false "offline" verdict.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::shutdown::Shutdown;

/// Delay between two failed targets
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Upper bound for a single reachability request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default probe targets, in priority order
pub const DEFAULT_TARGETS: &[&str] = &[
    "http://www.msftconnecttest.com/connecttest.txt",
    "http://connectivitycheck.gstatic.com/generate_204",
    "http://clients3.google.com/generate_204",
    "http://www.apple.com/library/test/success.html",
];

/// Outcome of one probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Online,
    Offline,
}

impl Verdict {
    pub fn is_online(self) -> bool {
        matches!(self, Verdict::Online)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Online => f.write_str("online"),
            Verdict::Offline => f.write_str("offline"),
        }
    }
}

/// Public endpoint used purely as a reachability oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    url: String,
}

impl ProbeTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{target} unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("no probe targets configured")]
    NoTargets,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Single reachability check against one target
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    async fn check(&self, target: &ProbeTarget) -> Result<(), ProbeError>;
}

/// Produces a reachability verdict for the whole WAN
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns `None` only when shutdown interrupted the probe.
    async fn probe(&self, shutdown: &mut Shutdown) -> Option<Verdict>;
}

/// Plain unauthenticated HTTP GET. Any completed response counts as reachable.
pub struct HttpCheck {
    client: reqwest::Client,
}

impl HttpCheck {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wanwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityCheck for HttpCheck {
    async fn check(&self, target: &ProbeTarget) -> Result<(), ProbeError> {
        match self.client.get(target.url()).send().await {
            Ok(response) => {
                debug!(url = %target, status = %response.status(), "Probe answered");
                Ok(())
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    "timed out".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    e.to_string()
                };
                Err(ProbeError::Unreachable {
                    target: target.to_string(),
                    reason,
                })
            }
        }
    }
}

/// Sequential, short-circuiting prober over a fixed target list
pub struct ConnectivityProber<C> {
    targets: Vec<ProbeTarget>,
    check: C,
    retry_delay: Duration,
}

impl ConnectivityProber<HttpCheck> {
    /// Prober over [`DEFAULT_TARGETS`] using real HTTP requests
    pub fn with_defaults() -> Result<Self, ProbeError> {
        let targets = DEFAULT_TARGETS.iter().copied().map(ProbeTarget::new).collect();
        Self::new(targets, HttpCheck::new(REQUEST_TIMEOUT)?)
    }
}

impl<C: ReachabilityCheck> ConnectivityProber<C> {
    pub fn new(targets: Vec<ProbeTarget>, check: C) -> Result<Self, ProbeError> {
        if targets.is_empty() {
            return Err(ProbeError::NoTargets);
        }

        Ok(Self {
            targets,
            check,
            retry_delay: RETRY_DELAY,
        })
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn targets(&self) -> &[ProbeTarget] {
        &self.targets
    }
}

#[async_trait]
impl<C: ReachabilityCheck> Prober for ConnectivityProber<C> {
    async fn probe(&self, shutdown: &mut Shutdown) -> Option<Verdict> {
        for (index, target) in self.targets.iter().enumerate() {
            if index > 0 && !shutdown.sleep(self.retry_delay).await {
                return None;
            }

            match self.check.check(target).await {
                Ok(()) => {
                    debug!(url = %target, attempts = index + 1, "Connectivity confirmed");
                    return Some(Verdict::Online);
                }
                Err(e) => {
                    debug!(error = %e, "Probe target failed");
                }
            }
        }

        info!(targets = self.targets.len(), "All probe targets unreachable");
        Some(Verdict::Offline)
    }
}
