/// Clean user-authored HTML (article bodies, comments) using the ammonia whitelist.
///
/// Safe tags like <b> and <p> survive; <script>, <iframe> and event-handler
/// attributes are removed. Surrounding whitespace is trimmed so that content
/// consisting only of stripped markup comes back empty.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}

/// Titles, tags and category names are plain text: every tag is stripped.
pub fn clean_text(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string().trim().to_string()
}
