use std::io::{BufRead, Write};

use anyhow::{anyhow, Result};
use cache_sim::{
    config::{CacheConfig, ACCESS_CYCLES_RANGE},
    geometry::{CacheGeometry, GeometryError},
};

peg::parser!(grammar value() for str {
    rule dec() -> u64
        = n:$(quiet!{['0'..='9']+}) {? n.parse().or(Err("decimal number")) }
        / expected!("decimal number")
    rule hex() -> u64
        = quiet!{"0" ['x' | 'X']} n:$(quiet!{['0'..='9' | 'a'..='f' | 'A'..='F']+})
        {? u64::from_str_radix(n, 16).or(Err("hexadecimal number")) }
    rule number() -> u64
        = hex() / dec()
    rule unit() -> u64
        = ['K' | 'k'] ("iB" / "B")? { 1 << 10 }
        / ['M' | 'm'] ("iB" / "B")? { 1 << 20 }
        / ['G' | 'g'] ("iB" / "B")? { 1 << 30 }
        / "B"? { 1 }
    // byte size such as `1024`, `0x400`, `1K` or `1 KiB`
    pub rule size() -> u32
        = _ n:number() _ u:unit() _
        {? n.checked_mul(u).and_then(|v| u32::try_from(v).ok()).ok_or("size below 4GiB") }
    pub rule addr() -> u32
        = _ n:number() _ {? u32::try_from(n).or(Err("32-bit address")) }
    pub rule count() -> u32
        = _ n:dec() _ {? u32::try_from(n).or(Err("32-bit integer")) }

    rule ws() = quiet!{[' ' | '\t' | '\r' | '\n']}
    rule _() = ws()*
});

pub fn parse_size(s: &str) -> Result<u32, String> {
    value::size(s).map_err(|e| e.to_string())
}

pub fn parse_addr(s: &str) -> Result<u32, String> {
    value::addr(s).map_err(|e| e.to_string())
}

fn parse_count(s: &str) -> Result<u32, String> {
    value::count(s).map_err(|e| e.to_string())
}

/// cache parameters collected so far; `None` fields are asked for.
#[derive(Default, Debug, Clone, Copy)]
pub struct PartialConfig {
    pub cache_size: Option<u32>,
    pub line_size: Option<u32>,
    pub access_cycles: Option<u32>,
}

impl PartialConfig {
    pub fn complete(self) -> Option<CacheConfig> {
        Some(CacheConfig {
            cache_size: self.cache_size?,
            line_size: self.line_size?,
            access_cycles: self.access_cycles?,
        })
    }
}

/// Asks for values on `output` until `input` supplies an acceptable one.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
    fn ask<T>(
        &mut self,
        msg: &str,
        parse: impl Fn(&str) -> Result<T, String>,
        check: impl Fn(&T) -> Result<(), String>,
    ) -> Result<T> {
        loop {
            write!(self.output, "{msg}")?;
            self.output.flush()?;
            let mut buf = String::new();
            if self.input.read_line(&mut buf)? == 0 {
                return Err(anyhow!("input closed while waiting for a value"));
            }
            writeln!(self.output)?;
            match parse(&buf).and_then(|v| check(&v).map(|_| v)) {
                Ok(v) => break Ok(v),
                Err(e) => {
                    log::debug!("rejected input {:?}: {e}", buf.trim_end());
                    writeln!(self.output, "Error! {e}")?;
                }
            }
        }
    }
    pub fn complete_config(&mut self, partial: PartialConfig) -> Result<CacheConfig> {
        let cache_size = match partial.cache_size {
            // a given size is never asked again, so it must be usable as is
            Some(v) => {
                if let Some(line_size) = partial.line_size {
                    CacheGeometry::new(v, line_size)?;
                } else if !v.is_power_of_two() {
                    return Err(GeometryError::CacheSizeNotPowerOfTwo(v).into());
                }
                v
            }
            None => self.ask(
                "Enter the size of the cache in bytes: ",
                parse_size,
                |&v| {
                    if v.is_power_of_two() {
                        Ok(())
                    } else {
                        Err("Cache size must be a power of 2".to_owned())
                    }
                },
            )?,
        };
        let line_size = match partial.line_size {
            Some(v) => v,
            None => self.ask("Enter the line size in bytes: ", parse_size, |&v| {
                CacheGeometry::new(cache_size, v)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })?,
        };
        let access_cycles = match partial.access_cycles {
            Some(v) => v,
            None => self.ask(
                "Enter the number of access cycles needed to access the cache (An integer from 1 to 10): ",
                parse_count,
                |v| {
                    if ACCESS_CYCLES_RANGE.contains(v) {
                        Ok(())
                    } else {
                        Err("Number of access cycles must be between 1 and 10".to_owned())
                    }
                },
            )?,
        };
        Ok(CacheConfig {
            cache_size,
            line_size,
            access_cycles,
        })
    }
}
