/// Clean rich-text content using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) survive, dangerous
/// tags (like <script>, <iframe>) and attributes (like onclick) are stripped.
/// Post and comment bodies are stored already sanitized, so every read path
/// serves clean content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
