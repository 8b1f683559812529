//! Webhook signature verification.
//!
//! The gateway's documentation does not pin down a single byte-for-byte
//! signing contract, so verification runs an ordered list of named HMAC-SHA256
//! strategies and accepts the request if the claimed signature matches any
//! candidate. The strategy that matched is reported so operators can observe
//! which convention the gateway actually uses and retire the rest.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix some gateways put in front of a base64-encoded webhook secret.
const SECRET_PREFIX: &str = "whsec_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// HMAC over the raw body, secret used as supplied.
    BodyRawSecret,
    /// HMAC over the raw body, secret prefix-stripped and base64-decoded.
    BodyDecodedSecret,
    /// HMAC over `{event-id}.{timestamp}.{body}`, secret as supplied.
    SignedContentRawSecret,
    /// HMAC over `{event-id}.{timestamp}.{body}`, decoded secret.
    SignedContentDecodedSecret,
}

impl SignatureScheme {
    pub fn name(self) -> &'static str {
        match self {
            Self::BodyRawSecret => "body/raw-secret",
            Self::BodyDecodedSecret => "body/decoded-secret",
            Self::SignedContentRawSecret => "signed-content/raw-secret",
            Self::SignedContentDecodedSecret => "signed-content/decoded-secret",
        }
    }
}

/// The exact bytes received plus the delivery headers that feed verification.
/// The body must be the wire bytes, not a re-serialized form.
pub struct SignatureInput<'a> {
    pub body: &'a [u8],
    pub signature: &'a str,
    pub event_id: Option<&'a str>,
    pub timestamp: Option<&'a str>,
}

/// Check the claimed signature against every candidate scheme. Returns the
/// first scheme that matched, or `None` when the request is not authentic.
pub fn verify_signature(input: &SignatureInput<'_>, secret: &str) -> Option<SignatureScheme> {
    let claimed = claimed_signatures(input.signature);
    if claimed.is_empty() {
        return None;
    }

    let decoded = decoded_secret(secret);
    let mut candidates: Vec<(SignatureScheme, Vec<u8>)> = Vec::new();

    if let Some(digest) = mac(secret.as_bytes(), input.body) {
        candidates.push((SignatureScheme::BodyRawSecret, digest));
    }
    if let Some(key) = &decoded {
        if let Some(digest) = mac(key, input.body) {
            candidates.push((SignatureScheme::BodyDecodedSecret, digest));
        }
    }

    if let (Some(id), Some(ts)) = (input.event_id, input.timestamp) {
        let content = signed_content(id, ts, input.body);
        if let Some(digest) = mac(secret.as_bytes(), &content) {
            candidates.push((SignatureScheme::SignedContentRawSecret, digest));
        }
        if let Some(key) = &decoded {
            if let Some(digest) = mac(key, &content) {
                candidates.push((SignatureScheme::SignedContentDecodedSecret, digest));
            }
        }
    }

    for (scheme, digest) in &candidates {
        let hex_digest = hex::encode(digest);
        let b64_digest = BASE64.encode(digest);
        for claim in &claimed {
            if constant_time_eq(hex_digest.as_bytes(), claim.as_bytes())
                || constant_time_eq(b64_digest.as_bytes(), claim.as_bytes())
            {
                return Some(*scheme);
            }
        }
    }
    None
}

/// Signature headers may carry several space-separated signatures, each with
/// an optional `v1,`/`v1=` scheme tag.
fn claimed_signatures(header: &str) -> Vec<&str> {
    header
        .split_whitespace()
        .map(|part| {
            part.strip_prefix("v1,")
                .or_else(|| part.strip_prefix("v1="))
                .unwrap_or(part)
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn decoded_secret(secret: &str) -> Option<Vec<u8>> {
    let trimmed = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
    let decoded = BASE64.decode(trimmed).ok()?;
    if decoded.is_empty() {
        return None;
    }
    Some(decoded)
}

fn signed_content(event_id: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(event_id.len() + timestamp.len() + body.len() + 2);
    content.extend_from_slice(event_id.as_bytes());
    content.push(b'.');
    content.extend_from_slice(timestamp.as_bytes());
    content.push(b'.');
    content.extend_from_slice(body);
    content
}

fn mac(key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(data);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Constant-time comparison; only the length check short-circuits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
