//! Redirect-following resolution with a hard deadline.
//!
//! The assembled gate URL usually bounces through a short redirect chain
//! before landing on the real destination. Every hop is followed and
//! recorded; the last recorded hop is the result. This stage never fails:
//! a transport error, a malformed `Location`, or the deadline firing all
//! degrade to the best URL known at that point.

use startgate_async_utils::OrElapsedExt;
use std::time::Duration;
use tracing::debug;
use tracing::warn;
use url::Url;

/// Redirect chains longer than this are cut off; the last recorded hop
/// still wins.
const MAX_HOPS: usize = 10;

/// Ordered URLs visited during one redirect-following exchange.
pub type RedirectTrace = Vec<Url>;

/// Follows redirect chains under a strict per-exchange deadline.
pub struct RedirectResolver {
    client: reqwest::Client,
    deadline: Duration,
}

impl RedirectResolver {
    pub fn new(deadline: Duration) -> Result<Self, reqwest::Error> {
        // Redirects are followed manually so each hop lands in the trace.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(deadline)
            .build()?;
        Ok(Self { client, deadline })
    }

    /// Resolves `origin` to the end of its redirect chain, or to `origin`
    /// itself when there is no chain, the exchange errors, or the deadline
    /// elapses first.
    pub async fn resolve_final_url(&self, origin: &Url) -> Url {
        match self.follow_chain(origin).or_elapsed(self.deadline).await {
            Ok(resolved) => resolved,
            Err(_) => {
                warn!(url = %origin, "redirect resolution timed out, keeping origin");
                origin.clone()
            }
        }
    }

    async fn follow_chain(&self, origin: &Url) -> Url {
        let mut trace: RedirectTrace = Vec::new();
        let mut current = origin.clone();

        for _ in 0..MAX_HOPS {
            let response = match self.client.get(current.clone()).send().await {
                Ok(response) => response,
                Err(err) => {
                    warn!(url = %current, "redirect hop failed: {err}");
                    break;
                }
            };
            if !response.status().is_redirection() {
                break;
            }
            let next = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| current.join(location).ok());
            let Some(next) = next else {
                warn!(url = %current, "redirect without usable location header");
                break;
            };
            debug!(hop = %next, "following redirect");
            trace.push(next.clone());
            current = next;
        }

        trace.last().cloned().unwrap_or_else(|| origin.clone())
    }
}
