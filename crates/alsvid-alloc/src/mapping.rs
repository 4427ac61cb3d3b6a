//! Logical-to-physical mappings.
//!
//! A [`Mapping`] is a vector indexed by logical qubit holding the physical
//! qubit it lives on, [`UNDEF`] when unassigned. Internally every mapping is
//! padded to the device size with pseudo-logical entries so that SWAP
//! bookkeeping never runs off the end; the driver truncates to the program's
//! real qubit count when reporting.

use std::fmt;

/// Sentinel for an unassigned slot.
pub const UNDEF: u32 = u32::MAX;

/// Logical → physical assignment.
pub type Mapping = Vec<u32>;

/// Physical → logical assignment.
pub type InverseMap = Vec<u32>;

/// The identity mapping over `n` qubits.
pub fn identity_mapping(n: u32) -> Mapping {
    (0..n).collect()
}

/// Invert a mapping into a physical-indexed table.
///
/// Two logical qubits claiming one physical qubit is a programming error.
pub fn invert_mapping(phys: u32, mapping: &[u32]) -> InverseMap {
    let mut inv = vec![UNDEF; phys as usize];
    for (logical, &p) in mapping.iter().enumerate() {
        if p != UNDEF {
            assert!(
                inv[p as usize] == UNDEF,
                "inconsistent mapping: physical {p} claimed twice"
            );
            inv[p as usize] = logical as u32;
        }
    }
    inv
}

/// Assign free physical qubits to every unmapped slot and pad the mapping
/// with pseudo-logical entries up to the device size.
pub fn fill_mapping(mapping: &mut Mapping, phys: u32) {
    let mut used = vec![false; phys as usize];
    for &p in mapping.iter() {
        if p != UNDEF {
            used[p as usize] = true;
        }
    }
    let mut free = (0..phys).filter(|&p| !used[p as usize]);
    for slot in mapping.iter_mut() {
        if *slot == UNDEF {
            *slot = free.next().expect("more logical qubits than physical");
        }
    }
    for p in free {
        mapping.push(p);
    }
}

/// Printable `"a:u, b:v"` form of a mapping.
pub fn mapping_to_string(mapping: &[u32]) -> String {
    let mut out = String::new();
    for (logical, &p) in mapping.iter().enumerate() {
        if logical > 0 {
            out.push_str(", ");
        }
        if p == UNDEF {
            out.push_str(&format!("{logical}:-"));
        } else {
            out.push_str(&format!("{logical}:{p}"));
        }
    }
    out
}

/// Display adapter for mappings.
pub struct MappingDisplay<'a>(pub &'a [u32]);

impl fmt::Display for MappingDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mapping_to_string(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert_eq!(identity_mapping(3), vec![0, 1, 2]);
    }

    #[test]
    fn test_invert_round_trip() {
        let mapping = vec![2, 0, 1];
        let inv = invert_mapping(3, &mapping);
        assert_eq!(inv, vec![1, 2, 0]);
        for (l, &p) in mapping.iter().enumerate() {
            assert_eq!(inv[p as usize] as usize, l);
        }
    }

    #[test]
    fn test_invert_partial() {
        let mapping = vec![1, UNDEF];
        let inv = invert_mapping(3, &mapping);
        assert_eq!(inv, vec![UNDEF, 0, UNDEF]);
    }

    #[test]
    fn test_fill_pads_to_device() {
        let mut mapping = vec![2, UNDEF];
        fill_mapping(&mut mapping, 4);
        assert_eq!(mapping, vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_to_string() {
        assert_eq!(mapping_to_string(&[2, 1, UNDEF]), "0:2, 1:1, 2:-");
    }

    #[test]
    #[should_panic(expected = "inconsistent mapping")]
    fn test_inconsistent_mapping_panics() {
        invert_mapping(2, &[0, 0]);
    }
}
