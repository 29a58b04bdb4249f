//! Magnet URI helpers.

use librqbit_core::magnet::Magnet;

/// Upper-case hex info hash of a magnet URI. Accepts the 40-char hex and
/// the 32-char base32 forms.
pub fn info_hash_hex(magnet: &str) -> Option<String> {
    let parsed = Magnet::parse(magnet).ok()?;
    parsed.as_id20().map(|id| id.as_string().to_uppercase())
}

/// Pseudo-torrent wrapping a magnet URI, as understood by clients that watch
/// a directory for `.torrent` files.
pub fn embed_bytes(magnet: &str) -> Vec<u8> {
    format!("d10:magnet-uri{}:{}e", magnet.len(), magnet).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_hash() {
        let magnet = "magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a&dn=Foo";
        assert_eq!(
            info_hash_hex(magnet).as_deref(),
            Some("C12FE1C06BBA254A9DC9F519B335AA7C1367A88A")
        );
    }

    #[test]
    fn test_base32_hash() {
        // base32 of twenty 0x00 bytes
        let magnet = "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        assert_eq!(info_hash_hex(magnet).as_deref(), Some("0".repeat(40).as_str()));

        // base32 of 0xFF * 20
        let magnet = "magnet:?xt=urn:btih:77777777777777777777777777777777";
        assert_eq!(info_hash_hex(magnet).as_deref(), Some("F".repeat(40).as_str()));
    }

    #[test]
    fn test_invalid_hash() {
        assert!(info_hash_hex("magnet:?dn=nohash").is_none());
        assert!(info_hash_hex("magnet:?xt=urn:btih:abc").is_none());
        assert!(info_hash_hex("http://example.com/file.torrent").is_none());
    }

    #[test]
    fn test_embed_bytes() {
        let uri = "magnet:?xt=urn:btih:abc";
        assert_eq!(embed_bytes(uri), b"d10:magnet-uri23:magnet:?xt=urn:btih:abce".to_vec());
    }
}
