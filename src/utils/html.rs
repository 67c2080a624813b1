use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Questionnaire texts are rendered as rich text by clients, so safe tags
/// (like <b>, <p>) are preserved while <script>, <iframe> and event handler
/// attributes are stripped before the text is stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
