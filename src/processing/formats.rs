//! Media type detection and support checks

use std::path::Path;

/// Media types accepted as batch input
pub const SUPPORTED_MEDIA_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/bmp",
];

/// Detect the media type from magic bytes
pub fn sniff_media_type(data: &[u8]) -> Option<&'static str> {
    infer::get(data)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
}

/// Guess the media type from a file name's extension
pub fn media_type_from_name(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Check if a media type is accepted as input
pub fn is_supported_media_type(media_type: &str) -> bool {
    let media_type = media_type.trim().to_lowercase();
    SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str())
}

/// Check if a path looks like a supported input file
pub fn is_supported_input_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(media_type_from_name)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_media_type() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
        assert_eq!(sniff_media_type(&png), Some("image/png"));

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1];
        assert_eq!(sniff_media_type(&jpeg), Some("image/jpeg"));

        assert_eq!(sniff_media_type(b"GIF89a......"), Some("image/gif"));
        assert_eq!(sniff_media_type(b"plain text"), None);
    }

    #[test]
    fn test_media_type_from_name() {
        assert_eq!(media_type_from_name("photo.JPG"), Some("image/jpeg"));
        assert_eq!(media_type_from_name("dir/pic.webp"), Some("image/webp"));
        assert_eq!(media_type_from_name("scan.tiff"), None);
        assert_eq!(media_type_from_name("noext"), None);
    }

    #[test]
    fn test_supported_media_types() {
        assert!(is_supported_media_type("image/png"));
        assert!(is_supported_media_type("IMAGE/BMP"));
        assert!(!is_supported_media_type("image/tiff"));
        assert!(!is_supported_media_type("application/pdf"));
    }

    #[test]
    fn test_supported_input_path() {
        assert!(is_supported_input_path("a/b/c.png"));
        assert!(!is_supported_input_path("notes.txt"));
    }
}
