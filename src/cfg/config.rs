// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Knobs the component design (§4) treats as given. Loaded from YAML via
/// `FetcherConfig::load_from_file`, the way the teacher's `Config` loads
/// iSCSI login/negotiation parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FetcherConfig {
    /// Single tunable governing per-call socket reads AND the retry budget
    /// (§4.3, §5).
    #[serde(rename = "ReadTimeout", with = "serde_secs")]
    pub read_timeout: Duration,

    /// Bounds the TCP connect step inside `setup_connection`.
    #[serde(rename = "ConnectTimeout", with = "serde_secs")]
    pub connect_timeout: Duration,

    /// This worker's own `host:port`, compared against `MapHost::identifier`
    /// to pick the local-disk path (§4.1 step 3).
    #[serde(rename = "LocalHostPort")]
    pub local_host_port: String,

    /// Toggle named in §4.1 step 3.
    #[serde(rename = "LocalDiskFetchEnabled")]
    pub local_disk_fetch_enabled: bool,

    /// Ordered search list the local-directory allocator (§4.6 step 2)
    /// resolves `pathComponent` against.
    #[serde(rename = "LocalDirs", default)]
    pub local_dirs: Vec<PathBuf>,

    /// Fixed filesystem layout constants from §6.5.
    #[serde(rename = "IndexFileSuffix")]
    pub index_file_suffix: String,
    #[serde(rename = "OutputFileName")]
    pub output_file_name: String,

    /// The "known path prefix" validated in wire-codec parsing (§4.4 step
    /// 1, §6.2).
    #[serde(rename = "MapIdPrefix")]
    pub map_id_prefix: String,

    /// Included verbatim in the fetch URL (§6.1).
    #[serde(rename = "KeepAlive")]
    pub keep_alive: bool,

    /// Caps how many path components one `setup_connection` call batches
    /// into a single multi-fetch URL.
    #[serde(rename = "MaxOutputsPerRequest")]
    pub max_outputs_per_request: usize,
}

impl FetcherConfig {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: FetcherConfig =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants, mirroring the teacher's `ensure!`-based
    /// `validate_and_normalize`.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.read_timeout.is_zero(), "ReadTimeout must be non-zero");
        ensure!(
            !self.connect_timeout.is_zero(),
            "ConnectTimeout must be non-zero"
        );
        ensure!(!self.map_id_prefix.is_empty(), "MapIdPrefix must not be empty");
        ensure!(
            self.max_outputs_per_request >= 1,
            "MaxOutputsPerRequest must be >= 1"
        );
        if self.local_disk_fetch_enabled {
            ensure!(
                !self.local_dirs.is_empty(),
                "LocalDirs must be non-empty when LocalDiskFetchEnabled is true"
            );
        }
        Ok(())
    }
}

/// Serde helper for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
