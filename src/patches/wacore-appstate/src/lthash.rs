use hkdf::Hkdf;
use sha2::Sha256;

#[derive(Clone, Debug)]
pub struct LTHash {
    pub hkdf_info: &'static [u8],
    pub hkdf_size: u8,
}

pub const WAPATCH_INTEGRITY_INFO: &str = "WhatsApp Patch Integrity";
pub const WAPATCH_INTEGRITY: LTHash = LTHash {
    hkdf_info: WAPATCH_INTEGRITY_INFO.as_bytes(),
    hkdf_size: 128,
};

impl LTHash {
    pub fn subtract_then_add(&self, base: &[u8], subtract: &[Vec<u8>], add: &[Vec<u8>]) -> Vec<u8> {
        let mut output = base.to_vec();
        self.subtract_then_add_in_place(&mut output, subtract, add);
        output
    }

    pub fn subtract_then_add_in_place(
        &self,
        base: &mut [u8],
        subtract: &[Vec<u8>],
        add: &[Vec<u8>],
    ) {
        self.multiple_op(base, subtract, true);
        self.multiple_op(base, add, false);
    }

    fn multiple_op(&self, base: &mut [u8], input: &[Vec<u8>], subtract: bool) {
        for item in input {
            let derived = hkdf_sha256(item, None, self.hkdf_info, self.hkdf_size);
            perform_pointwise_with_overflow(base, &derived, subtract);
        }
    }
}

fn perform_pointwise_with_overflow(base: &mut [u8], input: &[u8], subtract: bool) {
    assert_eq!(base.len(), input.len(), "length mismatch");
    assert!(base.len().is_multiple_of(2), "slice lengths must be even");

    // Scalar replacement for the published crate's portable_simd fast path
    // (nightly-only); identical wrapping u16 little-endian semantics.
    let mut i = 0;
    while i < base.len() {
        let x = u16::from_le_bytes([base[i], base[i + 1]]);
        let y = u16::from_le_bytes([input[i], input[i + 1]]);

        let result = if subtract {
            x.wrapping_sub(y)
        } else {
            x.wrapping_add(y)
        };
        let bytes = result.to_le_bytes();
        base[i] = bytes[0];
        base[i + 1] = bytes[1];
        i += 2;
    }
}

fn hkdf_sha256(key: &[u8], salt: Option<&[u8]>, info: &[u8], length: u8) -> Vec<u8> {
    let hk = if let Some(s) = salt {
        Hkdf::<Sha256>::new(Some(s), key)
    } else {
        Hkdf::<Sha256>::new(None, key)
    };
    let mut okm = vec![0u8; length as usize];
    hk.expand(info, &mut okm).expect("hkdf expand");
    okm
}
