//! Field descriptors and naming helpers

use serde::{Deserialize, Serialize};

/// Substrings that mark a field name as holding an image reference.
///
/// Matched case-insensitively against the whole field name.
pub const IMAGE_NAME_HINTS: [&str; 4] = ["image", "thumbnail", "screenshot", "cover"];

/// How a field is rendered and validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text, must be non-empty
    Text,
    /// Absolute URL, must be non-empty and parse
    Url,
    /// Uploaded file, must have at least one selection
    File,
}

/// A `{name, label, kind}` tuple driving form rendering and validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
        }
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    pub fn url(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Url)
    }

    pub fn file(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::File)
    }

    /// Whether this field displays an image (see [`is_image_field`])
    pub fn is_image(&self) -> bool {
        is_image_field(&self.name, self.kind)
    }
}

/// A field is an image field if its kind is `File` or its name contains one
/// of [`IMAGE_NAME_HINTS`], ignoring case.
pub fn is_image_field(name: &str, kind: FieldKind) -> bool {
    if kind == FieldKind::File {
        return true;
    }
    let lower = name.to_lowercase();
    IMAGE_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Turn a camelCase or snake_case key into a Title Case label.
///
/// `reelsUrl` becomes "Reels Url", `screenshot_1` becomes "Screenshot 1".
pub fn format_label(key: &str) -> String {
    let mut spaced = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_uppercase() {
            spaced.push(' ');
            spaced.extend(c.to_lowercase());
        } else if c == '_' {
            spaced.push(' ');
        } else {
            spaced.push(c);
        }
    }

    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a string parses as an absolute http(s) URL
pub fn is_web_url(value: &str) -> bool {
    match url::Url::parse(value.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_heuristic() {
        assert!(is_image_field("thumbnail", FieldKind::Text));
        assert!(is_image_field("coverPhoto", FieldKind::Url));
        assert!(is_image_field("ScreenShot3", FieldKind::Text));
        assert!(is_image_field("imageUrl", FieldKind::Url));
        assert!(is_image_field("attachment", FieldKind::File));
        assert!(!is_image_field("reelsUrl", FieldKind::Url));
        assert!(!is_image_field("message", FieldKind::Text));
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label("reelsUrl"), "Reels Url");
        assert_eq!(format_label("screenshot_1"), "Screenshot 1");
        assert_eq!(format_label("name"), "Name");
        assert_eq!(format_label("Name"), "Name");
        assert_eq!(format_label("youtubeUrl"), "Youtube Url");
        assert_eq!(format_label(""), "");
    }

    #[test]
    fn test_is_web_url() {
        assert!(is_web_url("https://instagram.com/reel/abc"));
        assert!(is_web_url("http://x/y"));
        assert!(!is_web_url("instagram.com/reel"));
        assert!(!is_web_url("mailto:someone@example.com"));
        assert!(!is_web_url(""));
    }

    #[test]
    fn test_descriptor_serde() {
        let field = FieldDescriptor::url("reelsUrl", "Reels URL");
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["kind"], "url");
        assert!(!field.is_image());
    }
}
