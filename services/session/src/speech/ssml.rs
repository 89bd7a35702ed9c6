//! Synthesis Markup
//!
//! Renders an utterance into the SSML the synthesis engine consumes. The
//! displayed text and the spoken text are always identical; only this markup
//! wrapper differs.

/// Escapes the characters the synthesis service rejects in raw text.
fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '/' => escaped.push_str("&#x2F;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Builds the SSML document for one utterance.
///
/// Leading silence is pinned to zero so the avatar answers promptly; a
/// trailing break is appended only when `ending_silence_ms` is non-zero.
pub fn build_ssml(text: &str, voice: &str, ending_silence_ms: u64) -> String {
    let encoded = xml_escape(text);
    if ending_silence_ms > 0 {
        format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xmlns:mstts='http://www.w3.org/2001/mstts' xml:lang='en-US'><voice name='{voice}'><mstts:leadingsilence-exact value='0'/>{encoded}<break time='{ending_silence_ms}ms' /></voice></speak>"
        )
    } else {
        format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xmlns:mstts='http://www.w3.org/2001/mstts' xml:lang='en-US'><voice name='{voice}'><mstts:leadingsilence-exact value='0'/>{encoded}</voice></speak>"
        )
    }
}
