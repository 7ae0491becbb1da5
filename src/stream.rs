//! Multipart wire framing for the MJPEG stream.
//!
//! Byte-exact framing matters here: browsers render the stream as live video
//! only when every part is delimited precisely as declared by the response
//! content type.

pub const MULTIPART_BOUNDARY: &str = "frame";
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Frame one encoded JPEG into a multipart chunk:
///
/// ```text
/// --frame\r\n
/// Content-Type: image/jpeg\r\n
/// \r\n
/// <binary JPEG bytes>\r\n
/// ```
pub fn multipart_chunk(jpeg: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(jpeg.len() + 64);
    chunk.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_framing_is_byte_exact() {
        let chunk = multipart_chunk(b"JPEGDATA");
        assert_eq!(
            chunk,
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\nJPEGDATA\r\n"
        );
    }

    #[test]
    fn boundary_token_matches_the_declared_content_type() {
        assert!(MULTIPART_CONTENT_TYPE.ends_with(&format!("boundary={}", MULTIPART_BOUNDARY)));
        let chunk = multipart_chunk(b"x");
        assert!(chunk.starts_with(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes()));
    }

    #[test]
    fn binary_payload_passes_through_untouched() {
        let payload = [0u8, 13, 10, 255, 216, 13, 10, 13, 10];
        let chunk = multipart_chunk(&payload);
        let header_len = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".len();
        assert_eq!(&chunk[header_len..header_len + payload.len()], &payload);
    }
}
