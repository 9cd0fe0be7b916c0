// src/utils/html.rs

/// Sanitizes admin-supplied question text with ammonia's whitelist.
///
/// Safe formatting tags (<b>, <code>, <p>) survive; <script>, <iframe> and
/// event-handler attributes are stripped along with their content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
