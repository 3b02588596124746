/// Render plain text as a single HTML block for the `System.Description` field.
///
/// Newlines become `<br>` and the whole text is wrapped in one `<div>`.
/// Missing or empty text yields an empty string.
pub fn format_description(description: Option<&str>) -> String {
    match description {
        None | Some("") => String::new(),
        Some(text) => format!("<div>{}</div>", text.replace('\n', "<br>")),
    }
}

/// Quote a value for inclusion in a WIQL string literal.
pub fn escape_wiql(value: &str) -> String {
    value.replace('\'', "''")
}
