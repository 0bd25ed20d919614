//! Header-level parsing for `multipart/form-data`
//!
//! Covers the request `Content-Type` (boundary extraction) and the per-part
//! header block (`Content-Disposition`).

use super::MultipartError;

const FORM_DATA: &str = "multipart/form-data";

/// Extract the boundary from a request `Content-Type` header value.
///
/// The value must mention `multipart/form-data`. Quotes around the boundary
/// are removed, so `boundary="abc"` and `boundary=abc` are equivalent.
pub fn parse_boundary(content_type: &str) -> Result<String, MultipartError> {
    if !content_type.to_ascii_lowercase().contains(FORM_DATA) {
        return Err(MultipartError::NotFormData);
    }

    split_params(content_type)
        .into_iter()
        .filter_map(split_key_value)
        .find(|(key, _)| key.eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| unquote(value).to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

/// Parsed `Content-Disposition: form-data` header of one part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Form field name
    pub name: Option<String>,
    /// Original client-side file name, absent for plain fields
    pub filename: Option<String>,
}

impl ContentDisposition {
    /// Parse a header value such as `form-data; name="file"; filename="a.txt"`.
    ///
    /// Returns `None` unless the disposition type is `form-data`. Empty quoted
    /// values are treated as absent.
    pub fn parse(value: &str) -> Option<Self> {
        let params = split_params(value);
        let (disposition_type, rest) = params.split_first()?;
        if !disposition_type.trim().eq_ignore_ascii_case("form-data") {
            return None;
        }

        let mut disposition = Self::default();
        for (key, raw) in rest.iter().filter_map(|p| split_key_value(p)) {
            let value = unquote(raw);
            if value.is_empty() {
                continue;
            }
            if key.eq_ignore_ascii_case("name") {
                disposition.name.get_or_insert_with(|| value.to_string());
            } else if key.eq_ignore_ascii_case("filename") {
                disposition.filename.get_or_insert_with(|| value.to_string());
            }
        }
        Some(disposition)
    }
}

/// Header block of a single part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    /// All header lines in order, names as sent
    pub fields: Vec<(String, String)>,
    /// Parsed `Content-Disposition`, if it is a `form-data` disposition
    pub disposition: Option<ContentDisposition>,
}

impl PartHeaders {
    /// Parse a raw header block (lines separated by CRLF, no trailing blank line).
    ///
    /// Bytes that are not valid UTF-8 are dropped. Lines without a colon are
    /// ignored.
    pub fn parse(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block).replace(char::REPLACEMENT_CHARACTER, "");

        let fields: Vec<(String, String)> = text
            .split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        let disposition = fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-disposition"))
            .and_then(|(_, value)| ContentDisposition::parse(value));

        Self {
            fields,
            disposition,
        }
    }

    /// Value of the first header named `name` (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Form field name from the disposition
    pub fn name(&self) -> Option<&str> {
        self.disposition.as_ref()?.name.as_deref()
    }

    /// Client file name from the disposition
    pub fn filename(&self) -> Option<&str> {
        self.disposition.as_ref()?.filename.as_deref()
    }
}

/// Split a header value on `;`, ignoring separators inside quoted strings
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

fn split_key_value(param: &str) -> Option<(&str, &str)> {
    let (key, value) = param.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Remove one pair of surrounding double quotes
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_plain_and_quoted() {
        let plain = parse_boundary("multipart/form-data; boundary=----abc123").unwrap();
        let quoted = parse_boundary("multipart/form-data; boundary=\"----abc123\"").unwrap();
        assert_eq!(plain, "----abc123");
        assert_eq!(plain, quoted);
    }

    #[test]
    fn test_boundary_with_trailing_params() {
        let boundary =
            parse_boundary("Multipart/Form-Data; Boundary=xyz; charset=utf-8").unwrap();
        assert_eq!(boundary, "xyz");
    }

    #[test]
    fn test_boundary_errors() {
        assert_eq!(
            parse_boundary("text/plain"),
            Err(MultipartError::NotFormData)
        );
        assert_eq!(
            parse_boundary("multipart/form-data"),
            Err(MultipartError::MissingBoundary)
        );
        assert_eq!(
            parse_boundary("multipart/form-data; boundary=\"\""),
            Err(MultipartError::MissingBoundary)
        );
    }

    #[test]
    fn test_disposition_with_filename() {
        let d = ContentDisposition::parse("form-data; name=\"file\"; filename=\"a b.txt\"").unwrap();
        assert_eq!(d.name.as_deref(), Some("file"));
        assert_eq!(d.filename.as_deref(), Some("a b.txt"));
    }

    #[test]
    fn test_disposition_filename_before_name() {
        let d = ContentDisposition::parse("form-data; filename=\"x.bin\"; name=\"file\"").unwrap();
        assert_eq!(d.name.as_deref(), Some("file"));
        assert_eq!(d.filename.as_deref(), Some("x.bin"));
    }

    #[test]
    fn test_disposition_semicolon_inside_quotes() {
        let d = ContentDisposition::parse("form-data; name=\"file\"; filename=\"a;b.txt\"").unwrap();
        assert_eq!(d.filename.as_deref(), Some("a;b.txt"));
    }

    #[test]
    fn test_disposition_empty_filename_is_absent() {
        let d = ContentDisposition::parse("form-data; name=\"file\"; filename=\"\"").unwrap();
        assert_eq!(d.name.as_deref(), Some("file"));
        assert_eq!(d.filename, None);
    }

    #[test]
    fn test_disposition_requires_form_data() {
        assert_eq!(ContentDisposition::parse("attachment; filename=\"a\""), None);
    }

    #[test]
    fn test_part_headers() {
        let block = b"Content-Disposition: form-data; name=\"file\"; filename=\"r.csv\"\r\ncontent-type: text/csv";
        let headers = PartHeaders::parse(block);
        assert_eq!(headers.name(), Some("file"));
        assert_eq!(headers.filename(), Some("r.csv"));
        assert_eq!(headers.get("Content-Type"), Some("text/csv"));
        assert_eq!(headers.fields.len(), 2);
    }

    #[test]
    fn test_part_headers_drop_invalid_utf8() {
        let mut block = b"Content-Disposition: form-data; name=\"file\"; filename=\"ab".to_vec();
        block.extend_from_slice(&[0xff, 0xfe]);
        block.extend_from_slice(b"c.txt\"");
        let headers = PartHeaders::parse(&block);
        assert_eq!(headers.filename(), Some("abc.txt"));
    }

    #[test]
    fn test_part_headers_without_disposition() {
        let headers = PartHeaders::parse(b"Content-Type: text/plain\r\ngarbage line");
        assert_eq!(headers.disposition, None);
        assert_eq!(headers.name(), None);
        assert_eq!(headers.fields.len(), 1);
    }
}
