//! Shared helpers for integration tests.
#![allow(dead_code)]

use warpflow::analysis::{FlatRecord, RawField, RawRecord};

const SPLITMIX64_GOLDEN: u64 = 0x9e3779b97f4a7c15;
const SPLITMIX64_M1: u64 = 0xbf58476d1ce4e5b9;
const SPLITMIX64_M2: u64 = 0x94d049bb133111eb;

/// SplitMix64; deterministic per seed so shuffles are reproducible.
#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(SPLITMIX64_GOLDEN);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(SPLITMIX64_M1);
        z = (z ^ (z >> 27)).wrapping_mul(SPLITMIX64_M2);
        z ^ (z >> 31)
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound.max(1)
    }

    /// Uniform in [0, 1).
    pub fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Fisher-Yates.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i as u64 + 1) as usize;
            items.swap(i, j);
        }
    }
}

pub fn flat(
    round: u32,
    source: &str,
    target: &str,
    category: &str,
    raw: f64,
    mitigated: f64,
) -> RawRecord {
    RawRecord::Flat(FlatRecord {
        round: Some(RawField::Number(f64::from(round))),
        source: Some(source.to_string()),
        target: Some(target.to_string()),
        category: Some(category.to_string()),
        raw_damage: Some(RawField::Number(raw)),
        mitigated: Some(RawField::Number(mitigated)),
        ..FlatRecord::default()
    })
}

/// A random but well-formed log: non-decreasing rounds, mitigation never above raw.
pub fn random_log(rng: &mut Rng, records: usize) -> Vec<RawRecord> {
    generate_log(rng, records, false)
}

/// Like [random_log], but roughly one record in eight reports an earlier round.
pub fn random_log_with_regressions(rng: &mut Rng, records: usize) -> Vec<RawRecord> {
    generate_log(rng, records, true)
}

fn generate_log(rng: &mut Rng, records: usize, regress: bool) -> Vec<RawRecord> {
    const ENTITIES: [&str; 4] = ["Kirk", "Spock", "Borg Cube", "Gorn"];
    const CATEGORIES: [&str; 3] = ["normal", "isolytic", "apex"];

    let mut round: u32 = 1;
    (0..records)
        .map(|_| {
            if rng.below(5) == 0 {
                round += 1;
            }
            let reported = if regress && round > 1 && rng.below(8) == 0 {
                round - 1 - rng.below(u64::from(round - 1)) as u32
            } else {
                round
            };
            let source = ENTITIES[rng.below(4) as usize];
            let target = ENTITIES[rng.below(4) as usize];
            let category = CATEGORIES[rng.below(3) as usize];
            let raw = (rng.unit() * 10_000.0).round() / 10.0;
            let mitigated = (raw * rng.unit() * 100.0).round() / 100.0;
            flat(reported, source, target, category, raw, mitigated.min(raw))
        })
        .collect()
}
