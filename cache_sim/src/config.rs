use std::ops::RangeInclusive;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cache::CacheModel,
    geometry::{CacheGeometry, GeometryError},
};

pub const ACCESS_CYCLES_RANGE: RangeInclusive<u32> = 1..=10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("number of access cycles must be between 1 and 10 (got {0})")]
    AccessCyclesOutOfRange(u32),
}

/// user supplied cache parameters, not yet checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub cache_size: u32,
    pub line_size: u32,
    pub access_cycles: u32,
}

impl CacheConfig {
    pub fn deser(file: impl std::io::Read) -> Result<Self> {
        Ok(serde_json::from_reader(file)?)
    }
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let geometry = CacheGeometry::new(self.cache_size, self.line_size)?;
        if !ACCESS_CYCLES_RANGE.contains(&self.access_cycles) {
            return Err(ConfigError::AccessCyclesOutOfRange(self.access_cycles));
        }
        Ok(ValidatedConfig {
            geometry,
            access_cycles: self.access_cycles,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedConfig {
    pub geometry: CacheGeometry,
    pub access_cycles: u32,
}

impl ValidatedConfig {
    pub fn build(self) -> CacheModel {
        CacheModel::new(self.geometry, self.access_cycles)
    }
}
