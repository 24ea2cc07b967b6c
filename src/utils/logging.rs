use serde::Serialize;

/// Max characters of an upstream body echoed into logs.
pub(crate) const BODY_PREVIEW_CHARS: usize = 512;

/// Lossy, truncated rendering of a response body for log lines.
pub(crate) fn body_preview(bytes: &[u8]) -> String {
    let raw_body = String::from_utf8_lossy(bytes);
    format!("{:.len$}", raw_body, len = BODY_PREVIEW_CHARS)
}

/// Run `log_action` with a pretty-printed JSON rendering of `value`, only when DEBUG is enabled.
pub(crate) fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize + ?Sized,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(pretty_json.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(BODY_PREVIEW_CHARS * 2);
        assert_eq!(body_preview(body.as_bytes()).len(), BODY_PREVIEW_CHARS);
        assert_eq!(body_preview(b"short"), "short");
    }
}
