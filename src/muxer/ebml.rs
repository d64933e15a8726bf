//! EBML encoding helpers

/// Encode an EBML element ID.
///
/// IDs carry their own length marker in the leading bits (0x80 for one byte,
/// 0x40 for two, 0x20 for three, 0x10 for four), so encoding is the
/// big-endian bytes without leading zeros.
pub fn encode_id(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(3);
    bytes[skip..].to_vec()
}

/// Encode an element data size as the shortest variable-length integer.
///
/// All-ones values are reserved for "unknown size", so each width holds one
/// less than its full range.
pub fn encode_size(size: u64) -> Vec<u8> {
    for len in 1..=7u32 {
        let limit = (1u64 << (7 * len)) - 1;
        if size < limit {
            let mut bytes = size.to_be_bytes()[8 - len as usize..].to_vec();
            bytes[0] |= 0x80 >> (len - 1);
            return bytes;
        }
    }
    encode_size_fixed8(size)
}

/// Encode a size using the full 8-byte form, so it can be patched in place later
pub fn encode_size_fixed8(size: u64) -> Vec<u8> {
    let mut bytes = size.to_be_bytes();
    bytes[0] = 0x01;
    bytes.to_vec()
}

pub fn element(id: u32, data: &[u8]) -> Vec<u8> {
    let mut result = encode_id(id);
    result.extend(encode_size(data.len() as u64));
    result.extend(data);
    result
}

pub fn uint_element(id: u32, value: u64) -> Vec<u8> {
    element(id, &encode_uint(value))
}

pub fn float_element(id: u32, value: f64) -> Vec<u8> {
    element(id, &value.to_be_bytes())
}

pub fn string_element(id: u32, value: &str) -> Vec<u8> {
    element(id, value.as_bytes())
}

/// Big-endian unsigned integer with no leading zero bytes (at least one byte)
pub fn encode_uint(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    bytes[skip..].to_vec()
}
