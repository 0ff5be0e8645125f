//! Portable sync codes and share links
//!
//! A sync code is the ledger record as JSON, encoded base64url without
//! padding. A share link carries the code in its `sync` query parameter.

use crate::custody::{MAX_DEBT, SwitchLedger};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;
use url::Url;

/// Query parameter that carries the sync code
pub const SYNC_PARAM: &str = "sync";

#[derive(Debug, Error)]
pub enum SyncCodeError {
    #[error("sync code is empty")]
    Empty,
    #[error("sync code is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("ledger could not be encoded: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("sync code does not contain a ledger: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("sync code debt {0} is outside -{max}..={max}", max = MAX_DEBT)]
    DebtOutOfRange(i32),
    #[error("invalid share link: {0}")]
    Url(#[from] url::ParseError),
    #[error("share link has no 'sync' parameter")]
    MissingParam,
}

/// Encode the whole ledger as a URL-safe code
pub fn export_code(ledger: &SwitchLedger) -> Result<String, SyncCodeError> {
    let json = serde_json::to_vec(ledger).map_err(SyncCodeError::Serialize)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a code produced by `export_code`
pub fn decode_code(code: &str) -> Result<SwitchLedger, SyncCodeError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(SyncCodeError::Empty);
    }

    let bytes = URL_SAFE_NO_PAD.decode(code.trim_end_matches('='))?;
    let ledger: SwitchLedger = serde_json::from_slice(&bytes)?;
    if !(-MAX_DEBT..=MAX_DEBT).contains(&ledger.debt) {
        return Err(SyncCodeError::DebtOutOfRange(ledger.debt));
    }
    Ok(ledger.normalized())
}

/// Share link for `ledger` on top of `base`
///
/// Any existing `sync` parameter on `base` is replaced.
pub fn sync_url(base: &Url, ledger: &SwitchLedger) -> Result<Url, SyncCodeError> {
    let code = export_code(ledger)?;
    let mut url = strip_sync_param(base);
    url.query_pairs_mut().append_pair(SYNC_PARAM, &code);
    Ok(url)
}

/// Extract the sync code from a share link
pub fn code_from_url(link: &str) -> Result<String, SyncCodeError> {
    let url = Url::parse(link)?;
    url.query_pairs()
        .find(|(key, _)| key == SYNC_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or(SyncCodeError::MissingParam)
}

/// The same address without the `sync` parameter
pub fn strip_sync_param(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != SYNC_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}
