/// Bytes of a report the decoder looks at.
pub const REPORT_LEN: usize = 5;

/// One positional report, straight off the interrupt endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub touch: bool,
    pub x: u32,
    pub y: u32,
}

// Layout: [flags, x lo, x hi, y lo, y hi]; bit 0 of flags is contact.
pub fn decode(report: &[u8; REPORT_LEN]) -> RawSample {
    RawSample {
        touch: report[0] & 0x01 != 0,
        x: u32::from(u16::from_le_bytes([report[1], report[2]])),
        y: u32::from(u16::from_le_bytes([report[3], report[4]])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_touch_and_little_endian_axes() {
        let sample = decode(&[0x01, 0x0a, 0x00, 0x14, 0x00]);
        assert_eq!(
            sample,
            RawSample {
                touch: true,
                x: 10,
                y: 20
            }
        );
    }

    #[test]
    fn only_bit_zero_means_contact() {
        assert!(!decode(&[0xfe, 0, 0, 0, 0]).touch);
        assert!(decode(&[0xff, 0, 0, 0, 0]).touch);
    }

    #[test]
    fn high_bytes_shift_into_place() {
        let sample = decode(&[0x00, 0xf4, 0x0e, 0x50, 0x0f]);
        assert_eq!((sample.x, sample.y), (3828, 3920));
        assert!(!sample.touch);
    }
}
