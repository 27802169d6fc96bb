//! Bootstrap gate resolution.
//!
//! Discovers the application's backend destination at startup: a remote
//! config store names the gate endpoint, the gate answers with a
//! deliberately split host, redirects are followed under a deadline, and
//! the destination is probed once for a final refinement. The caller gets
//! exactly one outcome per attempt: a resolved URL or a typed error.
//!
//! Flow overview:
//! 1. Assemble the signed request payload (device id, session id, push
//!    token, device metadata) with defaults filling any gap
//! 2. Read the endpoint config from the remote key-value store
//! 3. GET the gate endpoint with the base64 payload
//! 4. Reassemble the two-fragment response into a destination URL
//! 5. Follow redirects under a hard deadline, degrading to the
//!    pre-redirect URL
//! 6. Probe the destination once for a JSON host refinement, best effort

mod device_info;
mod error;
mod fragments;
mod identity;
mod payload;
mod push_token;
mod redirect;
mod remote_config;
mod resolver;
mod state;

pub use device_info::DeviceInfo;
pub use error::ConfigError;
pub use error::ConfigStoreError;
pub use error::GateError;
pub use fragments::FragmentPair;
pub use fragments::normalize_scheme;
pub use identity::IdentityProvider;
pub use payload::BootstrapPayload;
pub use push_token::PushTokenHandle;
pub use push_token::PushTokenSource;
pub use push_token::PushTokenWaiter;
pub use redirect::RedirectResolver;
pub use redirect::RedirectTrace;
pub use remote_config::CONFIG_PATH;
pub use remote_config::ConfigStore;
pub use remote_config::GateConfig;
pub use remote_config::HttpConfigStore;
pub use remote_config::RemoteConfigFetcher;
pub use resolver::DEFAULT_OVERALL_TIMEOUT;
pub use resolver::GateResolver;
pub use resolver::GateTimeouts;
pub use state::DEVICE_ID_KEY;
pub use state::FINAL_URL_KEY;
pub use state::FileStateStore;
pub use state::MemoryStateStore;
pub use state::StateStore;
