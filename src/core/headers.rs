//! Cross-origin isolation headers injected into every managed response

use crate::host::ResponseHeaders;

pub const EMBEDDER_POLICY: (&str, &str) = ("Cross-Origin-Embedder-Policy", "require-corp");
pub const OPENER_POLICY: (&str, &str) = ("Cross-Origin-Opener-Policy", "same-origin");

/// Merge the isolation headers over `existing`. Isolation values win on conflict.
pub fn with_isolation_headers(existing: &ResponseHeaders) -> ResponseHeaders {
    let mut headers = existing.clone();
    for (name, value) in [EMBEDDER_POLICY, OPENER_POLICY] {
        headers.insert(name.to_string(), vec![value.to_string()]);
    }
    headers
}
