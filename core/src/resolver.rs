//! Gate resolution orchestration.
//!
//! One attempt walks a fixed sequence: build the payload, fetch the remote
//! endpoint config, issue the primary request, parse the fragment response
//! into a destination, resolve redirects under a deadline, and probe the
//! destination once for a host refinement. Only the config fetch and the
//! primary request/parse can fail the attempt; the later stages degrade to
//! the best URL known so far.

use crate::device_info::DeviceInfo;
use crate::error::GateError;
use crate::fragments::FragmentPair;
use crate::fragments::normalize_scheme;
use crate::identity::IdentityProvider;
use crate::payload::BootstrapPayload;
use crate::push_token::PushTokenWaiter;
use crate::redirect::RedirectResolver;
use crate::remote_config::ConfigStore;
use crate::remote_config::RemoteConfigFetcher;
use crate::state::FINAL_URL_KEY;
use crate::state::StateStore;
use serde_json::Value;
use startgate_async_utils::OrElapsedExt;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

/// Stage deadlines. The defaults mirror the production values; tests
/// shrink them.
#[derive(Debug, Clone)]
pub struct GateTimeouts {
    /// Bounded wait for the push token while building the payload.
    pub push_token_wait: Duration,
    /// Redirect resolution deadline, applied per request and raced
    /// independently against the whole exchange.
    pub redirect: Duration,
    /// Secondary probe request deadline.
    pub probe: Duration,
    /// POST fallback request deadline.
    pub post_fallback: Duration,
}

impl Default for GateTimeouts {
    fn default() -> Self {
        Self {
            push_token_wait: Duration::from_secs(2),
            redirect: Duration::from_secs(5),
            probe: Duration::from_secs(5),
            post_fallback: Duration::from_secs(20),
        }
    }
}

/// Overall fuse callers typically race [`GateResolver::resolve`] against.
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(7);

#[derive(Default, Clone)]
struct SessionContext {
    session_id: String,
    att_token: Option<String>,
}

/// Resolves the bootstrap destination URL. One instance per application,
/// constructed and injected by the startup sequence; holds no global state.
pub struct GateResolver {
    config: RemoteConfigFetcher,
    state: Arc<dyn StateStore>,
    identity: IdentityProvider,
    push_tokens: Arc<PushTokenWaiter>,
    device: DeviceInfo,
    timeouts: GateTimeouts,
    // Ambient-timeout client for the primary request.
    client: reqwest::Client,
    probe_client: reqwest::Client,
    post_client: reqwest::Client,
    redirects: RedirectResolver,
    session: Mutex<SessionContext>,
}

impl GateResolver {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        state: Arc<dyn StateStore>,
        push_tokens: Arc<PushTokenWaiter>,
        device: DeviceInfo,
    ) -> Result<Self, GateError> {
        Self::with_timeouts(config_store, state, push_tokens, device, GateTimeouts::default())
    }

    pub fn with_timeouts(
        config_store: Arc<dyn ConfigStore>,
        state: Arc<dyn StateStore>,
        push_tokens: Arc<PushTokenWaiter>,
        device: DeviceInfo,
        timeouts: GateTimeouts,
    ) -> Result<Self, GateError> {
        let probe_client = reqwest::Client::builder()
            .timeout(timeouts.probe)
            .build()
            .map_err(GateError::Network)?;
        let post_client = reqwest::Client::builder()
            .timeout(timeouts.post_fallback)
            .build()
            .map_err(GateError::Network)?;
        let redirects = RedirectResolver::new(timeouts.redirect).map_err(GateError::Network)?;
        Ok(Self {
            config: RemoteConfigFetcher::new(config_store),
            identity: IdentityProvider::new(state.clone()),
            state,
            push_tokens,
            device,
            timeouts,
            client: reqwest::Client::new(),
            probe_client,
            post_client,
            redirects,
            session: Mutex::new(SessionContext::default()),
        })
    }

    /// Session identity comes from the application's startup sequence, not
    /// from this resolver.
    pub fn configure_session(&self, session_id: impl Into<String>, att_token: Option<String>) {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.session_id = session_id.into();
        session.att_token = att_token;
        debug!(session_id = %session.session_id, "session configured");
    }

    /// Runs one resolution attempt end to end.
    pub async fn resolve(&self) -> Result<Url, GateError> {
        let payload = self.build_payload().await;

        info!("fetching gate config");
        let config = self.config.fetch_gate_config().await?;
        let base = config.base_endpoint();

        info!(%base, "requesting gate endpoint");
        let request_url = format!("{base}?data={}", payload.encode());
        let response = self
            .client
            .get(&request_url)
            .send()
            .await
            .map_err(GateError::Network)?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "gate endpoint rejected request");
            return Err(GateError::InvalidConfig);
        }
        let body = response
            .json::<Value>()
            .await
            .map_err(|_| GateError::InvalidConfig)?;

        let pair = FragmentPair::extract(&body).ok_or_else(|| {
            warn!("gate response lacks two usable fragments");
            GateError::InvalidConfig
        })?;
        let candidate = normalize_scheme(&pair.into_host());
        let assembled = Url::parse(&candidate).map_err(|_| GateError::InvalidConfig)?;
        debug!(url = %assembled, "destination assembled");
        self.cache_final_url(&assembled);

        let chosen = self.redirects.resolve_final_url(&assembled).await;
        let final_url = match self.probe_secondary(&chosen).await {
            Some(refined) => refined,
            None => chosen,
        };
        self.cache_final_url(&final_url);
        info!(url = %final_url, "gate resolved");
        Ok(final_url)
    }

    /// [`Self::resolve`] raced against an overall deadline; elapse yields
    /// [`GateError::Timeout`].
    pub async fn resolve_with_timeout(&self, overall: Duration) -> Result<Url, GateError> {
        match self.resolve().or_elapsed(overall).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("overall resolution deadline elapsed");
                Err(GateError::Timeout)
            }
        }
    }

    /// Fallback for callers that already hold an HTTP-shaped base endpoint:
    /// POST the payload as a form body and expect the two exact fragment
    /// fields, concatenated directly. The fuse is cancelled the moment this
    /// path concludes, successfully or not.
    pub async fn try_post_fallback(
        &self,
        base: Url,
        fuse: CancellationToken,
    ) -> Result<Url, GateError> {
        let _defuse = fuse.drop_guard();

        let payload = self.build_payload().await;
        info!(url = %base, "trying POST fallback");
        let response = self
            .post_client
            .post(base)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=utf-8",
            )
            .body(format!("data={}", payload.encode()))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GateError::Timeout
                } else {
                    GateError::Network(err)
                }
            })?;
        let body = response
            .json::<Value>()
            .await
            .map_err(|_| GateError::InvalidConfig)?;
        let pair = FragmentPair::extract_exact(&body).ok_or(GateError::InvalidConfig)?;
        let candidate = normalize_scheme(&pair.concat_host());
        let final_url = Url::parse(&candidate).map_err(|_| GateError::InvalidConfig)?;

        self.cache_final_url(&final_url);
        info!(url = %final_url, "POST fallback resolved");
        Ok(final_url)
    }

    /// Fallback for callers holding a direct HTTP candidate: skip the
    /// config/primary stages and run redirect resolution plus the probe.
    pub async fn try_http_fallback(&self, candidate: &str) -> Result<Url, GateError> {
        let origin = Url::parse(candidate).map_err(|_| GateError::InvalidConfig)?;
        info!(url = %origin, "trying HTTP fallback");
        let chosen = self.redirects.resolve_final_url(&origin).await;
        let final_url = match self.probe_secondary(&chosen).await {
            Some(refined) => refined,
            None => chosen,
        };
        self.cache_final_url(&final_url);
        info!(url = %final_url, "HTTP fallback resolved");
        Ok(final_url)
    }

    /// Last successfully resolved URL, if an earlier attempt cached one.
    pub fn cached_final_url(&self) -> Option<Url> {
        self.state
            .get(FINAL_URL_KEY)
            .and_then(|stored| Url::parse(&stored).ok())
    }

    async fn build_payload(&self) -> BootstrapPayload {
        debug!("building bootstrap payload");
        let session = {
            let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            session.clone()
        };
        let push_token = self
            .push_tokens
            .wait_for_token(self.timeouts.push_token_wait)
            .await
            .unwrap_or_default();
        BootstrapPayload {
            device_id: self.identity.get_or_create_device_id(),
            session_id: session.session_id,
            push_token,
            os_version: self.device.os_version.clone(),
            device_model: self.device.model.clone(),
            bundle_id: self.device.bundle_id.clone(),
            att_token: session.att_token.unwrap_or_default(),
        }
    }

    /// Best-effort host refinement: if the destination serves JSON with the
    /// exact fragment fields, the reassembled URL replaces the chosen one.
    /// Never fails the attempt.
    async fn probe_secondary(&self, chosen: &Url) -> Option<Url> {
        debug!(url = %chosen, "probing destination for host refinement");
        let response = self.probe_client.get(chosen.clone()).send().await.ok()?;
        let body = response.json::<Value>().await.ok()?;
        let pair = FragmentPair::extract_exact(&body)?;
        let candidate = normalize_scheme(&pair.concat_host());
        let refined = Url::parse(&candidate).ok()?;
        debug!(url = %refined, "probe refined destination");
        Some(refined)
    }

    fn cache_final_url(&self, url: &Url) {
        // Fire-and-forget; the cache is a convenience for later sessions.
        self.state.set(FINAL_URL_KEY, url.as_str());
    }
}
