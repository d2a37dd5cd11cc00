use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

const TRUNCATED_MARKER: &str = "\n[output truncated]";

pub(super) async fn read_stream_capture<R: AsyncRead + Unpin>(
    mut reader: R,
    max_bytes: usize,
) -> io::Result<(Vec<u8>, bool)> {
    let mut buffer = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if buffer.len() < max_bytes {
            let remaining = max_bytes - buffer.len();
            let to_copy = remaining.min(n);
            buffer.extend_from_slice(&chunk[..to_copy]);
            if to_copy < n {
                truncated = true;
            }
        } else {
            truncated = true;
        }
    }
    Ok((buffer, truncated))
}

pub(super) fn format_capture(bytes: &[u8], truncated: bool) -> String {
    let mut out = String::from_utf8_lossy(bytes).into_owned();
    if truncated {
        out.push_str(TRUNCATED_MARKER);
    }
    out
}
