//! Content-type labels for outbound (and inbound) payloads.

use std::fmt;

/// Known content types, with an escape hatch for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Text,
    Html,
    Json,
    Xml,
    Form,
    Multipart { boundary: String },
    Binary,
    Other(String),
}

impl ContentType {
    /// Parse a `Content-Type` header value. Parameters other than a
    /// multipart boundary are ignored for the known types.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return ContentType::Other("text/plain".to_string());
        };

        let mut components = value.split(';').map(str::trim);
        let essence = components.next().unwrap_or_default();

        match essence {
            "text/plain" => ContentType::Text,
            "text/html" => ContentType::Html,
            "application/json" => ContentType::Json,
            "application/xml" => ContentType::Xml,
            "application/x-www-form-urlencoded" => ContentType::Form,
            "application/octet-stream" => ContentType::Binary,
            multipart if multipart.starts_with("multipart/") => {
                let boundary = components
                    .find_map(|c| c.strip_prefix("boundary="))
                    .unwrap_or_default();
                ContentType::Multipart {
                    boundary: boundary.to_string(),
                }
            }
            _ => ContentType::Other(value.to_string()),
        }
    }

    /// Header representation.
    pub fn as_header(&self) -> String {
        match self {
            ContentType::Text => "text/plain".to_string(),
            ContentType::Html => "text/html".to_string(),
            ContentType::Json => "application/json".to_string(),
            ContentType::Xml => "application/xml".to_string(),
            ContentType::Form => "application/x-www-form-urlencoded".to_string(),
            ContentType::Binary => "application/octet-stream".to_string(),
            ContentType::Multipart { boundary } => {
                format!("multipart/form-data; boundary={}", boundary)
            }
            ContentType::Other(mime) => mime.clone(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ContentType::Text)
    }

    pub fn is_html(&self) -> bool {
        matches!(self, ContentType::Html)
    }

    pub fn is_json(&self) -> bool {
        matches!(self, ContentType::Json)
    }

    pub fn is_xml(&self) -> bool {
        matches!(self, ContentType::Xml)
    }

    pub fn is_form(&self) -> bool {
        matches!(self, ContentType::Form)
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, ContentType::Multipart { .. })
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ContentType::Binary)
    }

    pub fn is_other(&self) -> bool {
        matches!(self, ContentType::Other(_))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_header())
    }
}
