//! Byte-splitting helpers for exercising decoders at chunk boundaries.

/// Split `bytes` into pieces of at most `size` bytes.
pub fn split_every(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

/// Cut `bytes` at each offset in `points` (sorted, clamped to the length).
pub fn split_at_points(bytes: &[u8], points: &[usize]) -> Vec<Vec<u8>> {
    let mut pieces = Vec::with_capacity(points.len() + 1);
    let mut start = 0;
    for &point in points {
        let point = point.clamp(start, bytes.len());
        pieces.push(bytes[start..point].to_vec());
        start = point;
    }
    pieces.push(bytes[start..].to_vec());
    pieces
}

/// Every way to cut `bytes` in two, including the empty halves.
pub fn two_way_splits(bytes: &[u8]) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
    (0..=bytes.len()).map(move |i| (bytes[..i].to_vec(), bytes[i..].to_vec()))
}
