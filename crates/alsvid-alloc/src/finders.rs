//! Initial-mapping strategies.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use rustc_hash::FxHashMap;

use crate::deps::DepEntry;
use crate::graph::CouplingGraph;
use crate::mapping::{fill_mapping, identity_mapping, Mapping, UNDEF};

/// Strategy producing the initial logical→physical assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFinderKind {
    /// `M[i] = i`.
    Identity,
    /// Uniform shuffle of the identity, driven by the seed.
    Random {
        /// RNG seed.
        seed: u64,
    },
    /// Greedy dependency-frequency matching: frequent pairs grab coupling
    /// edges first, singly-anchored pairs grab free neighbours.
    Weighted,
}

impl MappingFinderKind {
    /// Produce a device-padded mapping.
    pub fn find(&self, g: &CouplingGraph, entries: &[DepEntry]) -> Mapping {
        let p = g.size();
        match self {
            MappingFinderKind::Identity => identity_mapping(p),
            MappingFinderKind::Random { seed } => {
                let mut mapping = identity_mapping(p);
                let mut rng = Pcg64::seed_from_u64(*seed);
                mapping.shuffle(&mut rng);
                mapping
            }
            MappingFinderKind::Weighted => weighted_match(g, entries),
        }
    }
}

fn weighted_match(g: &CouplingGraph, entries: &[DepEntry]) -> Mapping {
    let p = g.size();

    // Count pair frequencies, remembering first-occurrence order.
    let mut freq: FxHashMap<(u32, u32), u32> = FxHashMap::default();
    let mut order: Vec<(u32, u32)> = Vec::new();
    for entry in entries {
        for dep in &entry.deps {
            let key = (dep.from, dep.to);
            let count = freq.entry(key).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }
    }
    // Stable sort keeps first-occurrence order among equal frequencies.
    order.sort_by_key(|key| std::cmp::Reverse(freq[key]));

    let mut mapping = vec![UNDEF; p as usize];
    let mut occupied = vec![false; p as usize];

    fn place(mapping: &mut Mapping, occupied: &mut [bool], logical: u32, phys: u32) {
        mapping[logical as usize] = phys;
        occupied[phys as usize] = true;
    }

    for (a, b) in order {
        let (pa, pb) = (mapping[a as usize], mapping[b as usize]);
        match (pa != UNDEF, pb != UNDEF) {
            (true, true) => {}
            (false, false) => {
                if let Some((u, v)) = g
                    .native_edges()
                    .find(|&(u, v)| !occupied[u as usize] && !occupied[v as usize])
                {
                    place(&mut mapping, &mut occupied, a, u);
                    place(&mut mapping, &mut occupied, b, v);
                }
            }
            (true, false) => {
                if let Some(&v) = g.adj(pa).iter().find(|&&v| !occupied[v as usize]) {
                    place(&mut mapping, &mut occupied, b, v);
                }
            }
            (false, true) => {
                if let Some(&u) = g.adj(pb).iter().find(|&&u| !occupied[u as usize]) {
                    place(&mut mapping, &mut occupied, a, u);
                }
            }
        }
    }

    fill_mapping(&mut mapping, p);
    mapping
}
