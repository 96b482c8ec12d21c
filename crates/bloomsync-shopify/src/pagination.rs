//! Cursor pagination via the Admin API's `Link` response header.
//!
//! Each page's response carries a `Link` header with URLs for adjacent
//! pages; the cursor is the `page_info` query parameter of the
//! `rel="next"` entry:
//!
//! ```text
//! <https://shop.example/admin/api/2024-01/orders.json?limit=250&page_info=CURSOR>; rel="next"
//! ```

/// Extracts the `page_info` cursor for the next page from a `Link` header.
///
/// Returns `None` when the header is absent, has no `rel="next"` entry
/// (last page), or the next URL carries no `page_info` parameter.
#[must_use]
pub fn extract_next_cursor(link_header: Option<&str>) -> Option<String> {
    link_header?
        .split(',')
        .map(str::trim)
        .find(|segment| segment.contains(r#"rel="next""#))
        .and_then(bracketed_url)
        .and_then(|url| query_param(url, "page_info"))
}

fn bracketed_url(segment: &str) -> Option<&str> {
    let start = segment.find('<')? + 1;
    let end = segment.find('>')?;
    (start < end).then(|| &segment[start..end])
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| {
            // Drop any trailing fragment; cursors are base64url and need no decoding.
            value.split('#').next().unwrap_or(value).to_owned()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_header_yields_none() {
        assert!(extract_next_cursor(None).is_none());
        assert!(extract_next_cursor(Some("")).is_none());
    }

    #[test]
    fn extracts_cursor_from_single_next_link() {
        let header =
            r#"<https://shop.example/admin/api/2024-01/orders.json?limit=250&page_info=abc123>; rel="next""#;
        assert_eq!(extract_next_cursor(Some(header)).as_deref(), Some("abc123"));
    }

    #[test]
    fn picks_next_out_of_combined_prev_next() {
        let header = concat!(
            r#"<https://shop.example/orders.json?page_info=PREV>; rel="previous", "#,
            r#"<https://shop.example/orders.json?page_info=NEXT>; rel="next""#
        );
        assert_eq!(extract_next_cursor(Some(header)).as_deref(), Some("NEXT"));
    }

    #[test]
    fn previous_only_yields_none() {
        let header = r#"<https://shop.example/orders.json?page_info=PREV>; rel="previous""#;
        assert!(extract_next_cursor(Some(header)).is_none());
    }

    #[test]
    fn next_without_page_info_yields_none() {
        let header = r#"<https://shop.example/orders.json?limit=250>; rel="next""#;
        assert!(extract_next_cursor(Some(header)).is_none());
    }

    #[test]
    fn page_info_in_second_position_is_found() {
        let header =
            r#"<https://shop.example/orders.json?limit=250&page_info=XYZ>; rel="next""#;
        assert_eq!(extract_next_cursor(Some(header)).as_deref(), Some("XYZ"));
    }
}
