//! Solver configuration.
use std::{fs, path::Path};

use anyhow::{Context as _, Error};

use blitsat_macros::{ConfigUpdate, DocDefault};

use crate::solver::SolverError;

/// Configurable parameters used during solving.
#[derive(DocDefault, ConfigUpdate, Clone, Debug)]
pub struct SolverConfig {
    /// Multiplicative decay for clause activities. (Default: 0.999)
    pub clause_activity_decay: f32,

    /// Scaling factor for luby sequence based restarts (number of conflicts). (Default: 128)
    pub luby_restart_interval_scale: u64,

    /// Keep decision levels on restart when their decision would be repeated. (Default: true)
    pub restart_reuse_trail: bool,

    /// Number of learned long clauses that triggers the first reduction. (Default: 2000)
    pub reduce_init: usize,

    /// Increment of the learned clause limit after each reduction. (Default: 300)
    pub reduce_inc: usize,

    /// Scaling factor for the luby sequence resetting the reduction increment. (Default: 8)
    pub reduce_outer_scale: u64,

    /// Learned clauses with at most this glue are never reduced. (Default: 2)
    pub reduce_keep_glue: usize,

    /// Select reduction victims by activity instead of by glue. (Default: false)
    pub reduce_by_activity: bool,

    /// Learn binary clauses from dominators in the binary implication graph. (Default: true)
    pub hyper_binary_resolution: bool,

    /// Strengthen antecedents on the fly during conflict analysis. (Default: true)
    pub otfs: bool,

    /// Remove implied literals from learned clauses. (Default: true)
    pub minimize: bool,

    /// Phase used for variables that were never assigned. (Default: false)
    pub initial_phase: bool,

    /// Initial word limit of each clause arena. (Default: 1 << 20)
    pub bucket_words: usize,

    /// Hard word limit of each clause arena. (Default: 1 << 30)
    pub max_bucket_words: usize,

    /// Number of conflicts between inprocessing rounds, in addition to the round at the start of
    /// each solve call. (Default: 20000)
    pub inprocess_interval: u64,
}

impl SolverConfig {
    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<(), SolverError> {
        let invalid = |message: &str| Err(SolverError::InvalidConfig(message.to_owned()));

        if !(self.clause_activity_decay > 1.0 / 16.0 && self.clause_activity_decay < 1.0) {
            return invalid("clause_activity_decay must be in the range (0.0625, 1.0)");
        }
        if self.luby_restart_interval_scale == 0 {
            return invalid("luby_restart_interval_scale must be positive");
        }
        if self.reduce_outer_scale == 0 {
            return invalid("reduce_outer_scale must be positive");
        }
        if self.bucket_words == 0 || self.bucket_words > self.max_bucket_words {
            return invalid("bucket_words must be positive and at most max_bucket_words");
        }
        if self.inprocess_interval == 0 {
            return invalid("inprocess_interval must be positive");
        }
        if self.max_bucket_words > u32::max_value() as usize {
            return invalid("max_bucket_words must fit into 32-bit clause offsets");
        }
        Ok(())
    }
}

impl SolverConfigUpdate {
    /// Parse an update from TOML source.
    pub fn from_toml(source: &str) -> Result<SolverConfigUpdate, Error> {
        Ok(toml::from_str(source)?)
    }

    /// Read an update from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<SolverConfigUpdate, Error> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&source).with_context(|| format!("parsing config file {}", path.display()))
    }
}
