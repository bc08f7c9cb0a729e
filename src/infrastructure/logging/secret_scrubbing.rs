//! Scrubs API keys, bearer tokens, and password-like fields out of logged
//! tool arguments and model-endpoint headers (§2 [NEW]).
//!
//! Adapted from the `SecretScrubbingLayer`
//! (`infrastructure/logging/secret_scrubbing.rs`): same pattern set, used
//! here at the call sites that log tool arguments (§4.3) rather than as a
//! `tracing::Layer` — the delegation engine logs structured fields via
//! `tracing`'s macros directly, so scrubbing happens on the string value
//! before it is attached to a span/event.

use regex::Regex;

#[derive(Clone)]
pub struct SecretScrubber {
    api_key_pattern: Regex,
    token_pattern: Regex,
    bearer_pattern: Regex,
    password_pattern: Regex,
}

impl SecretScrubber {
    pub fn new() -> Self {
        Self {
            api_key_pattern: Regex::new(r"sk-[a-zA-Z0-9-_]{20,}").expect("valid regex"),
            token_pattern: Regex::new(
                r#"["']?(?:api_key|apikey|token|secret)["']?\s*[:=]\s*["']?([a-zA-Z0-9-_\.]{20,})["']?"#,
            )
            .expect("valid regex"),
            bearer_pattern: Regex::new(r"Bearer\s+[a-zA-Z0-9-_\.]+").expect("valid regex"),
            password_pattern: Regex::new(r#"["']?password["']?\s*[:=]\s*["']?([^"'\s,}]+)["']?"#)
                .expect("valid regex"),
        }
    }

    pub fn scrub(&self, message: &str) -> String {
        let mut scrubbed = self.api_key_pattern.replace_all(message, "[API_KEY_REDACTED]").to_string();
        scrubbed = self.bearer_pattern.replace_all(&scrubbed, "Bearer [TOKEN_REDACTED]").to_string();
        scrubbed = self
            .token_pattern
            .replace_all(&scrubbed, |caps: &regex::Captures| {
                let full_match = &caps[0];
                if let Some(colon_pos) = full_match.find(':') {
                    format!("{}:[REDACTED]", &full_match[..colon_pos])
                } else if let Some(eq_pos) = full_match.find('=') {
                    format!("{}=[REDACTED]", &full_match[..eq_pos])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        self.password_pattern.replace_all(&scrubbed, "password=[REDACTED]").to_string()
    }
}

impl Default for SecretScrubber {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_api_key() {
        let scrubber = SecretScrubber::new();
        let out = scrubber.scrub("key: sk-abcdefghijklmnopqrstuvwxyz1234567890");
        assert!(!out.contains("abcdefghijklmnopqrstuvwxyz"));
        assert!(out.contains("[API_KEY_REDACTED]"));
    }

    #[test]
    fn redacts_bearer_token() {
        let scrubber = SecretScrubber::new();
        let out = scrubber.scrub("Authorization: Bearer abc123.def456-ghi");
        assert_eq!(out, "Authorization: Bearer [TOKEN_REDACTED]");
    }

    #[test]
    fn redacts_password_field() {
        let scrubber = SecretScrubber::new();
        let out = scrubber.scrub(r#"{"password": "hunter2hunter2"}"#);
        assert!(out.contains("password=[REDACTED]"));
        assert!(!out.contains("hunter2hunter2"));
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        let scrubber = SecretScrubber::new();
        let out = scrubber.scrub("read docs/README.md lines 1-5");
        assert_eq!(out, "read docs/README.md lines 1-5");
    }
}
