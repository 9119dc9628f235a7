//! Anonymous client fingerprints
//!
//! Contact and chat submissions are keyed by a hash of the client address
//! and user agent, so rate limits apply without storing either value.

pub fn client_fingerprint(ip: &str, user_agent: &str) -> String {
    format!("{:x}", md5::compute(format!("{ip}:{user_agent}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_opaque() {
        let a = client_fingerprint("203.0.113.7", "curl/8.0");
        assert_eq!(a, client_fingerprint("203.0.113.7", "curl/8.0"));
        assert_ne!(a, client_fingerprint("203.0.113.8", "curl/8.0"));
        assert_eq!(a.len(), 32);
        assert!(!a.contains("203.0.113.7"));
    }
}
