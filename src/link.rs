//! Join links: the only signaling channel this system has.
//!
//! The entire offer bundle rides in the `offer` query parameter; nothing is
//! stored server-side. `share_link` builds one, `offer_param` pulls the raw
//! blob back out on page load.

use crate::error::HandshakeError;
use crate::peer::types::OfferBundle;

/// `<base>?offer=<blob>`. The blob is URL-safe base64, so no further
/// escaping is needed.
pub fn share_link(base: &str, encoded_offer: &str) -> String {
    format!("{base}?offer={encoded_offer}")
}

/// Extract the raw `offer` parameter, if present and non-empty.
pub fn offer_param(url: &str) -> Option<&str> {
    let query = url.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("offer="))
        .filter(|value| !value.is_empty())
}

/// Page-load consumption: `Ok(None)` when the URL carries no offer,
/// `Ok(Some(_))` when it decodes, and [`HandshakeError::InvalidLink`] when
/// it is present but unusable, so the caller shows "invalid link" instead of
/// crashing.
pub fn offer_from_url(url: &str) -> Result<Option<OfferBundle>, HandshakeError> {
    match offer_param(url) {
        None => Ok(None),
        Some(raw) => OfferBundle::decode(raw)
            .map(Some)
            .map_err(|_| HandshakeError::InvalidLink),
    }
}
