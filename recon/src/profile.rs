//! Probe configuration — maps a scan mode onto engine feature flags

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ProfileError;

const DEFAULT_METHOD: &str = "GET";
const DEFAULT_THREADS: usize = 10;
const DEFAULT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Lite,
    Full,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Lite => "lite",
            ScanMode::Full => "full",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lite" => Ok(ScanMode::Lite),
            "full" => Ok(ScanMode::Full),
            other => Err(ProfileError::InvalidMode(other.to_string())),
        }
    }
}

/// Immutable flag set handed to the probe engine for one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeProfile {
    pub mode: ScanMode,
    pub method: String,
    pub threads: usize,
    pub retries: u32,
    pub silent: bool,
    pub no_color: bool,
    pub json_output: bool,
    pub asn: bool,
    pub probe: bool,
    pub favicon: bool,
    pub jarm: bool,
    pub tls_grab: bool,
    pub tech_detect: bool,
    pub csp_probe: bool,
    pub http2_probe: bool,
    pub follow_redirects: bool,
}

impl ProbeProfile {
    /// Profile for a mode. Pure: no I/O, same input gives the same flags.
    pub fn select(mode: ScanMode) -> Self {
        let baseline = Self::baseline(mode);
        match mode {
            ScanMode::Lite => baseline,
            ScanMode::Full => Self {
                asn: true,
                probe: true,
                favicon: true,
                jarm: true,
                tls_grab: true,
                tech_detect: true,
                csp_probe: true,
                http2_probe: true,
                follow_redirects: true,
                ..baseline
            },
        }
    }

    /// Like [`ProbeProfile::select`] but from the wire name of the mode
    pub fn select_named(mode: &str) -> Result<Self, ProfileError> {
        Ok(Self::select(mode.parse()?))
    }

    fn baseline(mode: ScanMode) -> Self {
        Self {
            mode,
            method: DEFAULT_METHOD.to_string(),
            threads: DEFAULT_THREADS,
            retries: DEFAULT_RETRIES,
            silent: true,
            no_color: true,
            json_output: true,
            asn: false,
            probe: false,
            favicon: false,
            jarm: false,
            tls_grab: false,
            tech_detect: false,
            csp_probe: false,
            http2_probe: false,
            follow_redirects: false,
        }
    }
}
