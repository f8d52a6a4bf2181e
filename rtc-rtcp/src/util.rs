use bytes::{BufMut, Bytes};
use shared::error::{Error, Result};

/// Returns the number of octets needed to pad `len` to a 32-bit boundary.
pub(crate) fn get_padding_size(len: usize) -> usize {
    if len % 4 == 0 { 0 } else { 4 - (len % 4) }
}

/// Writes RTCP padding: zeros followed by a final octet holding the padding length.
pub(crate) fn put_padding(mut buf: &mut [u8], len: usize) {
    let padding_size = get_padding_size(len);
    for i in 0..padding_size {
        if i == padding_size - 1 {
            buf.put_u8(padding_size as u8);
        } else {
            buf.put_u8(0);
        }
    }
}

/// Removes trailing RTCP padding, whose length is carried in the final octet.
pub(crate) fn strip_padding(body: Bytes) -> Result<Bytes> {
    let Some(&padding_len) = body.last() else {
        return Err(Error::WrongPadding);
    };
    let padding_len = padding_len as usize;
    if padding_len == 0 || padding_len > body.len() {
        return Err(Error::WrongPadding);
    }
    Ok(body.slice(..body.len() - padding_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_padding() {
        let tests = [(0, 0), (1, 3), (2, 2), (3, 1), (4, 0), (100, 0), (500, 0)];
        for (n, p) in tests {
            assert_eq!(get_padding_size(n), p, "get_padding_size({n})");
        }
    }
}
