/// Key layout for the library partitions
///
/// Partition structure:
/// - `videos`: video:{id} -> VideoRecord (JSON). Ids are UUIDv7, so key order
///   is creation order.
/// - `urls`: url:{normalized_url} -> id (string)

pub const VIDEOS_PARTITION: &str = "videos";
pub const URLS_PARTITION: &str = "urls";

/// Encode a video key: video:{id}
pub fn encode_video_key(id: &str) -> Vec<u8> {
    format!("video:{}", id).into_bytes()
}

/// Decode a video key: video:{id} -> id
pub fn decode_video_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("video:").map(String::from)
}

/// Encode a URL index key: url:{normalized_url}
pub fn encode_url_key(normalized_url: &str) -> Vec<u8> {
    format!("url:{}", normalized_url).into_bytes()
}
