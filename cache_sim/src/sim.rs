use std::fmt;

use serde::Serialize;

use crate::{
    cache::{AccessResult, CacheCounters, CacheModel, LineSnapshot},
    geometry::CacheGeometry,
    trace::Trace,
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// Feeds addresses to a [`CacheModel`] one at a time.
pub struct Simulator {
    model: CacheModel,
    #[cfg(feature = "stat")]
    stat_builder: stat::SimStatBuilder,
}

impl Simulator {
    pub fn new(model: CacheModel) -> Self {
        log::info!("cache: {}", model.geometry());
        Self {
            model,
            #[cfg(feature = "stat")]
            stat_builder: stat::SimStatBuilder::new(),
        }
    }
    pub fn step(&mut self, addr: u32) -> AccessResult {
        self.model.access(addr)
    }
    /// runs the whole trace in order, calling `on_access` after every access.
    pub fn run<F>(&mut self, trace: &Trace, mut on_access: F)
    where
        F: FnMut(&AccessResult, &CacheModel),
    {
        log::info!("simulating {} accesses.", trace.len());
        for &addr in trace {
            let r = self.step(addr);
            on_access(&r, &self.model);
        }
        #[cfg(feature = "stat")]
        self.stat_builder.stop_timer();
        let c = self.model.counters();
        log::info!(
            "finished simulation. hits: {}, misses: {}, AMAT: {:.4} cycles",
            c.hits,
            c.misses,
            self.model.amat()
        );
    }
    pub fn model(&self) -> &CacheModel {
        &self.model
    }
    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            geometry: *self.model.geometry(),
            access_cycles: self.model.access_cycles(),
            counters: self.model.counters(),
            hit_ratio: self.model.hit_ratio(),
            miss_ratio: self.model.miss_ratio(),
            amat: self.model.amat(),
            lines: self.model.lines().collect(),
        }
    }
    #[cfg(feature = "stat")]
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(self.stat_builder.finish()));
        self.model.add_stats(buf);
    }
}

/// summary of a finished run, serialized as the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub geometry: CacheGeometry,
    pub access_cycles: u32,
    pub counters: CacheCounters,
    pub hit_ratio: f64,
    pub miss_ratio: f64,
    pub amat: f64,
    pub lines: Vec<LineSnapshot>,
}

impl SimulationReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total number of accesses: {}", self.counters.accesses)?;
        writeln!(f, "Hit ratio: {}", self.hit_ratio)?;
        writeln!(f, "Miss ratio: {}", self.miss_ratio)?;
        write!(f, "Average Memory Access Time (AMAT): {} cycles", self.amat)
    }
}

#[cfg(feature = "stat")]
mod stat {
    use std::{fmt, time};

    use crate::stat::*;

    pub struct SimStatBuilder {
        begin: time::Instant,
        elapsed: Option<time::Duration>,
    }

    impl SimStatBuilder {
        pub fn new() -> Self {
            Self {
                begin: time::Instant::now(),
                elapsed: None,
            }
        }
        pub fn stop_timer(&mut self) {
            self.elapsed = Some(time::Instant::now() - self.begin)
        }
        pub fn finish(&self) -> SimStat {
            SimStat {
                elapsed: self
                    .elapsed
                    .unwrap_or_else(|| time::Instant::now() - self.begin),
            }
        }
    }

    pub struct SimStat {
        elapsed: time::Duration,
    }

    impl Stat for SimStat {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
    }

    impl StatView for &'_ SimStat {
        fn header(&self) -> &'static str {
            "simulator stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for &'_ SimStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let ms = format!("{} ms", self.elapsed.as_millis());
            writeln!(f, "  elapsed total: {ms:>9}")
        }
    }
}
