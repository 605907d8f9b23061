use std::panic;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 7] = [
    "password",
    "passwd",
    "secret",
    "token",
    "bearer",
    "authorization",
    "jwt",
];

/// Replaces every whitespace-separated chunk that names or looks like a credential.
pub fn redact_text(input: &str) -> String {
    let mut redact_next = false;

    input
        .split_whitespace()
        .map(|chunk| {
            let lowered = chunk.to_ascii_lowercase();
            let marked = SENSITIVE_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker));

            let out = if marked || redact_next || looks_like_secret_value(chunk) {
                REDACTED.to_owned()
            } else {
                chunk.to_owned()
            };

            // "Bearer <token>" and "password: <value>" carry the secret in the next chunk.
            redact_next = marked && (lowered.ends_with(':') || lowered == "bearer");
            out
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "parley panic: {} at {}:{}:{}",
                scrubbed,
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("parley panic: {}", scrubbed);
        }
    }));
}

fn looks_like_secret_value(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());

    // Compact JWTs: three base64url segments.
    if cleaned.split('.').count() == 3 && cleaned.len() >= 24 {
        return true;
    }

    let has_mixed = cleaned.chars().any(|ch| ch.is_ascii_alphabetic())
        && cleaned.chars().any(|ch| ch.is_ascii_digit());

    cleaned.len() >= 20 && has_mixed
}
