/// A file attached to a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// File name sent in the part's content-disposition.
    pub file_name: String,
    /// Form field name of the part.
    pub field_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl FileContent {
    pub fn new(
        file_name: impl Into<String>,
        field_name: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            field_name: field_name.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }
}

/// Header names routed to dedicated request slots instead of being
/// copied verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    ContentType,
    Accept,
    AcceptEncoding,
    AcceptCharset,
}

impl HeaderType {
    pub const ALL: [HeaderType; 4] = [
        HeaderType::ContentType,
        HeaderType::Accept,
        HeaderType::AcceptEncoding,
        HeaderType::AcceptCharset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentType => "Content-Type",
            Self::Accept => "Accept",
            Self::AcceptEncoding => "Accept-Encoding",
            Self::AcceptCharset => "Accept-Charset",
        }
    }

    pub fn names() -> [&'static str; 4] {
        Self::ALL.map(|header| header.as_str())
    }
}
