use crate::ValueError;

fn is_id_start(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

fn is_id_char(c: char) -> bool {
    is_id_start(c) || c == '-'
}

/// Validate an identifier against the convention's grammar `[a-z0-9][a-z0-9-]*`
pub fn validate_id(id: &str) -> Result<(), ValueError> {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if is_id_start(c) => (),
        _ => return Err(ValueError::InvalidIdentifier(id.to_string())),
    }
    if !chars.all(is_id_char) {
        return Err(ValueError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}

/// Derive a legal identifier from arbitrary text.
///
/// The text is lower-cased, every character outside `[a-z0-9-]` becomes `-` and any
/// leading characters that cannot start an identifier are stripped. The result may be
/// empty if the input contains no usable characters.
pub fn escape_id(text: &str) -> String {
    let escaped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if is_id_char(c) { c } else { '-' })
        .collect();
    escaped.trim_start_matches(|c| !is_id_start(c)).to_string()
}

/// Validate the topic prefix a device is published under
pub fn validate_root_topic(root_topic: &str) -> Result<(), ValueError> {
    if root_topic.is_empty()
        || root_topic.starts_with('/')
        || root_topic.ends_with('/')
        || root_topic.contains(|c: char| c == '+' || c == '#')
    {
        return Err(ValueError::InvalidRootTopic(root_topic.to_string()));
    }
    Ok(())
}
