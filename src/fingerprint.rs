use sha2::Digest as _;

use crate::surface::PaintOp;

/// SHA-256 fingerprint of a paint-operation stream.
///
/// Compiling the same scene twice with the same inputs yields the same
/// fingerprint; any change in op order, geometry or asset content changes
/// it. Used by the determinism tests and the CLI diagnostics.
pub fn fingerprint_ops(ops: &[PaintOp]) -> String {
    let mut hasher = sha2::Sha256::new();
    for op in ops {
        // Serialization of each op is stable for a given crate version.
        let encoded = serde_json::to_vec(op).expect("paint op serializes");
        hasher.update((encoded.len() as u64).to_le_bytes());
        hasher.update(&encoded);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PaintOp;

    #[test]
    fn equal_streams_have_equal_fingerprints() {
        let ops = vec![
            PaintOp::BeginPage,
            PaintOp::Translate { x: 1.0, y: 2.0 },
            PaintOp::EndPage,
        ];
        assert_eq!(fingerprint_ops(&ops), fingerprint_ops(&ops.clone()));
    }

    #[test]
    fn order_changes_the_fingerprint() {
        let a = vec![PaintOp::BeginPage, PaintOp::EndPage];
        let b = vec![PaintOp::EndPage, PaintOp::BeginPage];
        assert_ne!(fingerprint_ops(&a), fingerprint_ops(&b));
    }

    #[test]
    fn empty_stream_is_stable() {
        assert_eq!(fingerprint_ops(&[]), fingerprint_ops(&[]));
    }
}
