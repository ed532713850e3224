use percent_encoding::percent_decode_str;
use url::Url;

pub const DEFAULT_FILENAME: &str = "got.output";

const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";

/// Returns `raw` unchanged when it already carries an `http://` or
/// `https://` prefix, otherwise prepends `https://`.
///
/// Empty input is the caller's problem: it is rejected before normalizing.
pub fn normalize_url(raw: &str) -> String {
    if has_http_scheme(raw) {
        raw.to_string()
    } else {
        format!("{}{}", HTTPS_PREFIX, raw)
    }
}

pub fn has_http_scheme(url: &str) -> bool {
    url.starts_with(HTTP_PREFIX) || url.starts_with(HTTPS_PREFIX)
}

/// Picks the local path for a download.
///
/// An explicit destination is used verbatim, whatever it names. Without one
/// the last path segment of `url` becomes a file in the working directory.
pub fn resolve_destination(explicit: Option<&str>, url: &str) -> String {
    match explicit {
        Some(dest) if !dest.is_empty() => dest.to_string(),
        _ => filename_from_url(url),
    }
}

pub fn filename_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return DEFAULT_FILENAME.to_string();
    };
    // Url::path never includes the query or the fragment.
    let last = parsed.path().rsplit('/').next().unwrap_or("");
    let decoded = percent_decode_str(last).decode_utf8_lossy();
    let name = sanitize_filename(&decoded);
    if name.is_empty() || name == "." || name == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        name
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '\\' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_urls_are_unchanged() {
        for url in [
            "http://example.com/a.zip",
            "https://example.com/a.zip",
            "http://",
            "https://",
        ] {
            assert_eq!(normalize_url(url), url);
        }
    }

    #[test]
    fn bare_urls_get_https() {
        assert_eq!(
            normalize_url("example.com/data.tar"),
            "https://example.com/data.tar"
        );
        assert_eq!(normalize_url("ftp.host/x"), "https://ftp.host/x");
    }

    #[test]
    fn short_inputs_do_not_panic() {
        for url in ["h", "ht", "http", "http:", "http:/", "https:/", "a.io", "x"] {
            assert_eq!(normalize_url(url), format!("https://{}", url));
        }
    }

    #[test]
    fn filename_strips_query_and_fragment() {
        assert_eq!(
            filename_from_url("https://example.com/files/report.zip?x=1"),
            "report.zip"
        );
        assert_eq!(
            filename_from_url("https://example.com/files/report.zip#part"),
            "report.zip"
        );
    }

    #[test]
    fn filename_is_percent_decoded() {
        assert_eq!(
            filename_from_url("https://example.com/my%20photo.jpg"),
            "my photo.jpg"
        );
        assert_eq!(
            filename_from_url("https://example.com/a%2Fb.txt"),
            "a_b.txt"
        );
    }

    #[test]
    fn bare_domain_falls_back_to_default() {
        assert_eq!(filename_from_url("https://example.com"), DEFAULT_FILENAME);
        assert_eq!(filename_from_url("https://example.com/"), DEFAULT_FILENAME);
        assert_eq!(filename_from_url("https://example.com/dir/"), DEFAULT_FILENAME);
        assert_eq!(filename_from_url("not a url"), DEFAULT_FILENAME);
    }

    #[test]
    fn explicit_destination_is_verbatim() {
        let url = "https://example.com/files/report.zip?x=1";
        assert_eq!(resolve_destination(Some("out/dir/"), url), "out/dir/");
        assert_eq!(resolve_destination(Some("../x.bin"), url), "../x.bin");
        assert_eq!(resolve_destination(None, url), "report.zip");
        assert_eq!(resolve_destination(Some(""), url), "report.zip");
    }
}
