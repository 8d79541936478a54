//! SSML payloads for the cloud synthesizer

use crate::voice::VoiceProfile;
use quick_xml::escape::escape;

/// Collapse every whitespace run to one space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wrap text in a `<speak>` document carrying the persona's voice and prosody
pub fn render_ssml(text: &str, profile: &VoiceProfile, language: &str) -> String {
    let body = collapse_whitespace(text);

    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{lang}'>\
<voice name='{voice}'><prosody rate='{rate}' pitch='{pitch}'>{body}</prosody></voice></speak>",
        lang = escape(language),
        voice = escape(profile.synthesis_voice_id.as_str()),
        rate = profile.prosody.rate_percent(),
        pitch = profile.prosody.pitch_percent(),
        body = escape(body.as_str()),
    )
}
