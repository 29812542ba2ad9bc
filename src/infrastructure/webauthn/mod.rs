//! WebAuthn configuration and builder.
//!
//! This module provides a factory function for creating a WebAuthn instance
//! for the deployment's relying party identity. The relying party id is the
//! hostname of the configured public URL; the expected origin is the URL
//! itself. Both must match what the browser-side ceremony reports.

use std::str::FromStr;

use crate::config::RelyingPartyConfig;
use anyhow::{anyhow, Result};
use reqwest::Url;
use webauthn_rs::{Webauthn, WebauthnBuilder};

/// Creates a configured WebAuthn instance from application config.
///
/// # Parameters
/// - `config`: Relying party configuration (public URL, display name)
///
/// # Returns
/// A configured `Webauthn` instance ready for registration/authentication flows.
///
/// # Errors
/// Returns an error if the public URL is malformed or has no hostname, or if
/// the WebAuthn builder rejects the derived identity.
pub fn create_webauthn(config: &RelyingPartyConfig) -> Result<Webauthn> {
    // ---
    tracing::debug!("Creating with config:{:?}", config);

    let url = Url::from_str(config.public_url.as_str())?;
    let rp_id = url
        .host_str()
        .ok_or_else(|| anyhow!("public URL '{}' has no hostname", config.public_url))?
        .to_string();

    let builder = WebauthnBuilder::new(&rp_id, &url)?;
    let webauthn = builder.rp_name(&config.rp_name).build()?;

    Ok(webauthn)
}
