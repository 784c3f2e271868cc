use std::{collections::BTreeSet, fmt};

use serde::Serialize;

use crate::geometry::{AddressParts, CacheGeometry};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// cycles charged per unit of miss ratio in the AMAT model.
pub const MISS_PENALTY_CYCLES: f64 = 100.0;

/// One direct-mapped slot.
///
/// `resident_offsets` records which offsets of the resident block have been
/// touched so far; an offset not in the set misses even when the tag matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheLine {
    valid: bool,
    tag: u32,
    resident_offsets: BTreeSet<u32>,
}

impl CacheLine {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
    pub fn tag(&self) -> u32 {
        self.tag
    }
    pub fn resident_offsets(&self) -> &BTreeSet<u32> {
        &self.resident_offsets
    }
    fn holds(&self, tag: u32, offset: u32) -> bool {
        self.valid && self.tag == tag && self.resident_offsets.contains(&offset)
    }
    fn fill(&mut self, tag: u32, offset: u32) {
        if self.valid && self.tag != tag {
            self.resident_offsets.clear();
        }
        self.valid = true;
        self.tag = tag;
        self.resident_offsets.insert(offset);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    Miss,
}

impl AccessOutcome {
    pub fn is_hit(self) -> bool {
        matches!(self, Self::Hit)
    }
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOutcome::Hit => write!(f, "hit"),
            AccessOutcome::Miss => write!(f, "miss"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheCounters {
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.accesses)
    }
    pub fn miss_ratio(&self) -> f64 {
        ratio(self.misses, self.accesses)
    }
}

fn ratio(n: u64, total: u64) -> f64 {
    if total == 0 {
        0.
    } else {
        n as f64 / total as f64
    }
}

/// what a single [`CacheModel::access`] observed, with counters as of that access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessResult {
    pub access_count: u64,
    pub address: u32,
    pub parts: AddressParts,
    pub outcome: AccessOutcome,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub miss_ratio: f64,
    pub amat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSnapshot {
    pub index: u32,
    pub valid: bool,
    pub tag: u32,
}

impl fmt::Display for LineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {}: Valid = {} Tag = {}",
            self.index, self.valid as u8, self.tag
        )
    }
}

pub struct CacheModel {
    geometry: CacheGeometry,
    access_cycles: u32,
    lines: Vec<CacheLine>,
    counters: CacheCounters,
}

impl CacheModel {
    /// `access_cycles` only feeds the AMAT formula and is taken as is.
    pub fn new(geometry: CacheGeometry, access_cycles: u32) -> Self {
        Self {
            geometry,
            access_cycles,
            lines: vec![CacheLine::default(); geometry.line_count() as usize],
            counters: CacheCounters::default(),
        }
    }
    pub fn access(&mut self, addr: u32) -> AccessResult {
        self.counters.accesses += 1;
        let parts = self.geometry.decompose(addr);
        // index is masked by the geometry, so it always lies in `lines`
        let line = &mut self.lines[parts.index as usize];
        let outcome = if line.holds(parts.tag, parts.offset) {
            self.counters.hits += 1;
            AccessOutcome::Hit
        } else {
            self.counters.misses += 1;
            line.fill(parts.tag, parts.offset);
            AccessOutcome::Miss
        };
        log::trace!(
            "access #{} {addr:#010x} ({parts}): {outcome}",
            self.counters.accesses
        );
        AccessResult {
            access_count: self.counters.accesses,
            address: addr,
            parts,
            outcome,
            hits: self.counters.hits,
            misses: self.counters.misses,
            hit_ratio: self.hit_ratio(),
            miss_ratio: self.miss_ratio(),
            amat: self.amat(),
        }
    }
    /// invalidates every line and zeroes the counters.
    pub fn reset(&mut self) {
        self.lines.fill(CacheLine::default());
        self.counters = CacheCounters::default();
    }
    pub fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }
    pub fn access_cycles(&self) -> u32 {
        self.access_cycles
    }
    pub fn counters(&self) -> CacheCounters {
        self.counters
    }
    pub fn hit_ratio(&self) -> f64 {
        self.counters.hit_ratio()
    }
    pub fn miss_ratio(&self) -> f64 {
        self.counters.miss_ratio()
    }
    /// `access_cycles + miss_ratio * 100`
    pub fn amat(&self) -> f64 {
        self.access_cycles as f64 + self.miss_ratio() * MISS_PENALTY_CYCLES
    }
    pub fn line(&self, index: u32) -> Option<&CacheLine> {
        self.lines.get(index as usize)
    }
    pub fn lines(&self) -> impl Iterator<Item = LineSnapshot> + '_ {
        self.lines.iter().enumerate().map(|(index, line)| LineSnapshot {
            index: index as u32,
            valid: line.valid,
            tag: line.tag,
        })
    }
}

#[cfg(feature = "stat")]
impl AddStats for CacheModel {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(stat::CacheStat::new(self)));
        buf.push(Box::new(stat::LineTable::new(self)));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use std::fmt;

    use super::{CacheCounters, CacheModel, LineSnapshot};
    use crate::stat::*;

    #[derive(Clone, Copy)]
    pub struct CacheStat {
        counters: CacheCounters,
        amat: f64,
    }

    impl CacheStat {
        pub fn new(model: &CacheModel) -> Self {
            Self {
                counters: model.counters(),
                amat: model.amat(),
            }
        }
    }

    impl Stat for CacheStat {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(CacheStatView { stat: self })
        }
    }

    pub struct CacheStatView<'a> {
        stat: &'a CacheStat,
    }

    impl StatView for CacheStatView<'_> {
        fn header(&self) -> &'static str {
            "cache stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for CacheStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let c = &self.stat.counters;
            let (hit, miss, total) = (c.hits, c.misses, c.accesses);
            let hit_pct = format!("{:.6}", 100. * c.hit_ratio());
            let miss_pct = format!("{:.6}", 100. * c.miss_ratio());
            let amat = self.stat.amat;
            writeln!(f, "    total: {total:>10}")?;
            writeln!(f, "      hit: {hit:>10} ({hit_pct:>10}%)")?;
            writeln!(f, "     miss: {miss:>10} ({miss_pct:>10}%)")?;
            writeln!(f, "     AMAT: {amat:>10.4} cycles")
        }
    }

    /// per-line `valid`/`tag` of the whole cache.
    pub struct LineTable {
        lines: Vec<LineSnapshot>,
    }

    impl LineTable {
        pub fn new(model: &CacheModel) -> Self {
            Self {
                lines: model.lines().collect(),
            }
        }
    }

    impl Stat for LineTable {
        fn view(&self, max_width: usize) -> Box<dyn StatView + '_> {
            Box::new(LineTableView::new(self, max_width))
        }
    }

    pub struct LineTableView<'a> {
        table: &'a LineTable,
        chunk_size: usize,
    }

    impl<'a> LineTableView<'a> {
        pub fn new(table: &'a LineTable, max_width: usize) -> Self {
            Self {
                table,
                chunk_size: Self::chunk_size(max_width),
            }
        }
    }

    impl Width for LineTableView<'_> {
        fn width_by_chunk_size(chunk_size: usize) -> usize {
            chunk_size * 24 + (chunk_size - 1) * 2 + 2
        }
    }

    impl StatView for LineTableView<'_> {
        fn header(&self) -> &'static str {
            "cache lines (format: `index: valid tag`)"
        }
        fn width(&self) -> usize {
            Self::width_by_chunk_size(self.chunk_size)
        }
    }

    impl fmt::Display for LineTableView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let cells: Vec<_> = self
                .table
                .lines
                .iter()
                .map(|l| {
                    let v = if l.valid { 'V' } else { '-' };
                    format!("{:>8}: {v} {:#012x}", l.index, l.tag)
                })
                .collect();
            for chunk in cells.chunks(self.chunk_size) {
                writeln!(f, "  {}", chunk.join(", "))?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use AccessOutcome::*;

    fn model(cache_size: u32, line_size: u32, access_cycles: u32) -> CacheModel {
        CacheModel::new(
            CacheGeometry::new(cache_size, line_size).unwrap(),
            access_cycles,
        )
    }

    fn outcomes(m: &mut CacheModel, addrs: &[u32]) -> Vec<AccessOutcome> {
        addrs.iter().map(|&a| m.access(a).outcome).collect()
    }

    #[test]
    fn test_initial_state() {
        let m = model(16, 4, 1);
        assert_eq!(4, m.lines().count());
        assert!(m.lines().all(|l| !l.valid && l.tag == 0));
        assert_eq!(CacheCounters::default(), m.counters());
        assert_eq!(0., m.hit_ratio());
        assert_eq!(1., m.amat());
    }
    #[test]
    fn test_miss_then_hit() {
        let mut m = model(1024, 32, 3);
        for addr in [0, 0x44, 0xDEAD_BEEF, u32::MAX] {
            assert_eq!(Miss, m.access(addr).outcome, "addr: {addr:#x}");
            assert_eq!(Hit, m.access(addr).outcome, "addr: {addr:#x}");
        }
    }
    #[test]
    fn test_repeated_hit() {
        let mut m = model(16, 4, 1);
        m.access(8);
        let first = m.access(8);
        let second = m.access(8);
        assert_eq!(Hit, second.outcome);
        assert_eq!(first.access_count + 1, second.access_count);
        assert_eq!(first.hits + 1, second.hits);
        assert_eq!(first.misses, second.misses);
    }
    #[test]
    fn test_counters_add_up() {
        let mut m = model(64, 8, 2);
        for addr in [0, 3, 64, 0, 7, 128, 3, 9, 9, 4096, 0] {
            let r = m.access(addr);
            assert_eq!(r.access_count, r.hits + r.misses);
            assert_eq!(m.counters().accesses, m.counters().hits + m.counters().misses);
        }
    }
    #[test]
    fn test_distinct_indices_do_not_conflict() {
        // 16/4: address 4 lives in line 1 with the same tag as address 0
        let mut m = model(16, 4, 1);
        assert_eq!(vec![Miss, Hit, Miss, Hit], outcomes(&mut m, &[0, 0, 4, 0]));
        let c = m.counters();
        assert_eq!((4, 2, 2), (c.accesses, c.hits, c.misses));
    }
    #[test]
    fn test_conflict_eviction() {
        // 0 and 16 share line 0 with tags 0 and 1
        let mut m = model(16, 4, 2);
        assert_eq!(vec![Miss, Hit, Miss, Miss], outcomes(&mut m, &[0, 0, 16, 0]));
        let c = m.counters();
        assert_eq!((4, 1, 3), (c.accesses, c.hits, c.misses));
        assert_eq!(0.75, m.miss_ratio());
        assert_eq!(0.25, m.hit_ratio());
        assert_eq!(77.0, m.amat());
    }
    #[test]
    fn test_conflict_clears_offsets() {
        let mut m = model(16, 4, 1);
        m.access(0);
        m.access(1);
        assert_eq!(2, m.line(0).unwrap().resident_offsets().len());
        m.access(18);
        let line = m.line(0).unwrap();
        assert_eq!(1, line.tag());
        assert_eq!(vec![2], line.resident_offsets().iter().copied().collect::<Vec<_>>());
        // the first block is gone, including offsets already seen
        assert_eq!(Miss, m.access(1).outcome);
        assert_eq!(Miss, m.access(18).outcome);
    }
    #[test]
    fn test_same_tag_accumulates_offsets() {
        let mut m = model(16, 4, 1);
        assert_eq!(
            vec![Miss, Miss, Miss, Hit, Hit],
            outcomes(&mut m, &[0, 1, 3, 1, 0])
        );
        let line = m.line(0).unwrap();
        assert!(line.is_valid());
        assert_eq!(0, line.tag());
        assert_eq!(
            vec![0, 1, 3],
            line.resident_offsets().iter().copied().collect::<Vec<_>>()
        );
    }
    #[test]
    fn test_byte_lines_behave_as_tag_only() {
        let mut m = model(4, 1, 1);
        assert_eq!(
            vec![Miss, Hit, Miss, Miss, Hit],
            outcomes(&mut m, &[5, 5, 9, 5, 5])
        );
    }
    #[test]
    fn test_access_result_snapshot() {
        let mut m = model(16, 4, 2);
        let r = m.access(0x37);
        assert_eq!(1, r.access_count);
        assert_eq!(0x37, r.address);
        assert_eq!(
            AddressParts {
                tag: 3,
                index: 1,
                offset: 3
            },
            r.parts
        );
        assert_eq!((0, 1), (r.hits, r.misses));
        assert_eq!(1., r.miss_ratio);
        assert_eq!(102., r.amat);
        let snapshot: Vec<_> = m.lines().collect();
        assert_eq!(
            LineSnapshot {
                index: 1,
                valid: true,
                tag: 3
            },
            snapshot[1]
        );
        assert_eq!("Line 1: Valid = 1 Tag = 3", snapshot[1].to_string());
        assert_eq!("Line 0: Valid = 0 Tag = 0", snapshot[0].to_string());
    }
    #[test]
    fn test_reset() {
        let mut m = model(16, 4, 1);
        outcomes(&mut m, &[0, 4, 8, 12, 0]);
        m.reset();
        assert_eq!(CacheCounters::default(), m.counters());
        assert!(m.lines().all(|l| !l.valid));
        assert_eq!(Miss, m.access(0).outcome);
    }
    #[test]
    fn test_independent_models() {
        let mut a = model(16, 4, 1);
        let mut b = model(16, 4, 1);
        a.access(0);
        assert_eq!(Hit, a.access(0).outcome);
        assert_eq!(Miss, b.access(0).outcome);
    }
    #[cfg(feature = "stat")]
    #[test]
    fn test_stat_view() {
        let mut m = model(16, 4, 2);
        outcomes(&mut m, &[0, 0, 16, 0]);
        let mut stats = Stats::default();
        m.add_stats(&mut stats);
        let out = stats.view(60).to_string();
        assert!(out.contains("      hit:          1 ( 25.000000%)"), "{out}");
        assert!(out.contains("     miss:          3 ( 75.000000%)"), "{out}");
        assert!(out.contains("AMAT:    77.0000 cycles"), "{out}");
        assert!(out.contains("       0: V 0x0000000000"), "{out}");
        assert!(out.contains("       1: - 0x0000000000"), "{out}");
    }
    #[cfg(feature = "stat")]
    #[test]
    fn test_stat_view_amat_matches_model() {
        let mut m = model(16, 4, 3);
        outcomes(&mut m, &[0, 4, 0]);
        let mut stats = Stats::default();
        m.add_stats(&mut stats);
        let out = stats.view(60).to_string();
        let amat = format!("AMAT: {:>10.4} cycles", m.amat());
        assert!(out.contains(&amat), "{out}");
        assert!(out.contains("   69.6667 cycles"), "{out}");
    }
}
