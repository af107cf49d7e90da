//! Fr32 padding
//!
//! Every 254 bits of input occupy one 32-byte field element with the two most
//! significant bits zero, so 127 input bytes expand to exactly 128.

/// Unpadded bytes per padded quad
pub const UNPADDED_QUAD: usize = 127;

/// Padded bytes per quad
pub const PADDED_QUAD: usize = 128;

/// Pad one 127-byte quad into 128 bytes
pub fn pad_quad(input: &[u8; UNPADDED_QUAD], out: &mut [u8; PADDED_QUAD]) {
    // Element 0: bits 0..254
    out[..31].copy_from_slice(&input[..31]);
    let mut carry = input[31] >> 6;
    out[31] = input[31] & 0x3f;

    // Element 1: shifted by 2
    let mut v = 0u8;
    for i in 32..64 {
        v = input[i];
        out[i] = (v << 2) | carry;
        carry = v >> 6;
    }
    out[63] &= 0x3f;

    // Element 2: shifted by 4
    carry = v >> 4;
    for i in 64..96 {
        v = input[i];
        out[i] = (v << 4) | carry;
        carry = v >> 4;
    }
    out[95] &= 0x3f;

    // Element 3: shifted by 6
    carry = v >> 2;
    for i in 96..127 {
        v = input[i];
        out[i] = (v << 6) | carry;
        carry = v >> 2;
    }
    out[127] = carry & 0x3f;
}

/// Padded size for an unpadded byte count that is a multiple of 127
pub fn padded_size(unpadded: u64) -> u64 {
    unpadded + unpadded / UNPADDED_QUAD as u64
}

/// Unpadded size for a padded byte count that is a multiple of 128
pub fn unpadded_size(padded: u64) -> u64 {
    padded - padded / PADDED_QUAD as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_quad_stays_zero() {
        let mut out = [0xffu8; PADDED_QUAD];
        pad_quad(&[0u8; UNPADDED_QUAD], &mut out);
        assert_eq!(out, [0u8; PADDED_QUAD]);
    }

    #[test]
    fn test_all_ones_clears_top_bits_of_each_element() {
        let mut out = [0u8; PADDED_QUAD];
        pad_quad(&[0xffu8; UNPADDED_QUAD], &mut out);
        for element in out.chunks(32) {
            assert!(element[..31].iter().all(|&b| b == 0xff));
            assert_eq!(element[31], 0x3f);
        }
    }

    #[test]
    fn test_bit_positions() {
        // bit 254 of the input is bit 0 of element 1
        let mut input = [0u8; UNPADDED_QUAD];
        input[31] = 0b0100_0000;
        let mut out = [0u8; PADDED_QUAD];
        pad_quad(&input, &mut out);
        assert_eq!(out[31], 0);
        assert_eq!(out[32], 1);

        // the last input bit lands on bit 5 of the final byte
        let mut input = [0u8; UNPADDED_QUAD];
        input[126] = 0b1000_0000;
        pad_quad(&input, &mut out);
        assert_eq!(out[127], 0b0010_0000);
        assert!(out[..127].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_size_transforms() {
        assert_eq!(padded_size(127), 128);
        assert_eq!(padded_size(unpadded_size(16 << 20)), 16 << 20);
        assert_eq!(unpadded_size(2048), 2032);
    }
}
