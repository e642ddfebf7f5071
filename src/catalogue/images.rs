//! Product image URL templating.
//!
//! Catalogue image URLs carry their render size as `h`/`w` query parameters;
//! rewriting them yields the thumbnail and full-size variants of one image.

use url::Url;

/// Edge length of the thumbnail shown in the guess grid.
pub const SMALL_IMAGE_SIZE: u32 = 225;
/// Edge length of the image shown once an item is revealed.
pub const LARGE_IMAGE_SIZE: u32 = 540;

/// Return `raw` with its `h` and `w` query parameters set to `size`.
///
/// Other query parameters are preserved in order. Unparseable URLs are
/// returned unchanged.
pub fn sized_image_url(raw: &str, size: u32) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "h" && key != "w")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let size = size.to_string();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("h", &size)
        .append_pair("w", &size);

    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "https://digitalcontent.api.tesco.com/v2/media/ghs/abc/def_225x225.jpg?h=225&w=225";

    #[test]
    fn rewrites_existing_dimensions() {
        assert_eq!(
            sized_image_url(RAW, LARGE_IMAGE_SIZE),
            "https://digitalcontent.api.tesco.com/v2/media/ghs/abc/def_225x225.jpg?h=540&w=540"
        );
    }

    #[test]
    fn keeps_unrelated_parameters() {
        let url = sized_image_url("https://img.example/a.jpg?v=3&w=100", SMALL_IMAGE_SIZE);
        assert_eq!(url, "https://img.example/a.jpg?v=3&h=225&w=225");
    }

    #[test]
    fn adds_dimensions_when_absent() {
        let url = sized_image_url("https://img.example/a.jpg", SMALL_IMAGE_SIZE);
        assert_eq!(url, "https://img.example/a.jpg?h=225&w=225");
    }

    #[test]
    fn relative_urls_pass_through() {
        assert_eq!(sized_image_url("/static/missing.png", 225), "/static/missing.png");
    }
}
