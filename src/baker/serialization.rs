//! Baked-Data Text Format
//!
//! Sections in order: the baking mode, then either the bake cluster
//! (current-position mode) or the cluster prefix-sum table (all-clusters
//! mode), then the probe data with nine `r,g,b` coefficient lines per probe:
//!
//! ```text
//! BakingMode AllClusters
//! ClusterFirstProbeIndices 2
//! 0
//! 8
//! ProbeData 16
//! Probe 0
//! 0.1,0.2,0.3
//! ...
//! ```
//!
//! Floats are written with Rust's shortest round-trip formatting, so a
//! serialize/parse cycle reproduces the values exactly.

use std::fmt::Write as _;
use std::path::Path;

use glam::Vec3;

use crate::errors::{CinderError, Result};

use super::{BakingData, BakingMode, DiffuseProbe};
use super::sh::SH_COEFF_COUNT;

impl BakingData {
    /// Renders the textual form.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        match self.mode {
            BakingMode::AllClusters => {
                out.push_str("BakingMode AllClusters\n");
                if let Some(indices) = &self.cluster_first_probe_indices {
                    let _ = writeln!(out, "ClusterFirstProbeIndices {}", indices.len());
                    for index in indices {
                        let _ = writeln!(out, "{index}");
                    }
                }
            }
            BakingMode::CurrentPositionCluster => {
                out.push_str("BakingMode CurrentPositionCluster\n");
                if let Some(cluster) = self.bake_cluster {
                    let _ = writeln!(out, "BakingCluster {cluster}");
                }
            }
        }
        let _ = writeln!(out, "ProbeData {}", self.probes.len());
        for (index, probe) in self.probes.iter().enumerate() {
            let _ = writeln!(out, "Probe {index}");
            for coefficient in &probe.coefficients {
                let _ = writeln!(out, "{},{},{}", coefficient.x, coefficient.y, coefficient.z);
            }
        }
        out
    }

    /// Parses the textual form.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate();

        let mode = match next_tagged(&mut lines, "BakingMode")? {
            ("AllClusters", _) => BakingMode::AllClusters,
            ("CurrentPositionCluster", _) => BakingMode::CurrentPositionCluster,
            (other, line) => {
                return Err(malformed(line, format!("unknown baking mode '{other}'")));
            }
        };

        let mut bake_cluster = None;
        let mut cluster_first_probe_indices = None;

        let probe_count: usize = match mode {
            BakingMode::AllClusters => {
                let (value, line) = next_tagged(&mut lines, "ClusterFirstProbeIndices")?;
                let count: usize = parse_number(value, line)?;
                let mut indices = Vec::with_capacity(count);
                for _ in 0..count {
                    let (text, line) = next_line(&mut lines)?;
                    indices.push(parse_number(text.trim(), line)?);
                }
                cluster_first_probe_indices = Some(indices);
                let (value, line) = next_tagged(&mut lines, "ProbeData")?;
                parse_number(value, line)?
            }
            BakingMode::CurrentPositionCluster => {
                let (tag, value, line) = next_any_tagged(&mut lines)?;
                match tag {
                    "BakingCluster" => {
                        bake_cluster = Some(parse_number(value, line)?);
                        let (value, line) = next_tagged(&mut lines, "ProbeData")?;
                        parse_number(value, line)?
                    }
                    "ProbeData" => parse_number(value, line)?,
                    other => {
                        return Err(malformed(line, format!("unexpected section '{other}'")));
                    }
                }
            }
        };

        let mut probes = Vec::with_capacity(probe_count);
        for probe_index in 0..probe_count {
            let (value, line) = next_tagged(&mut lines, "Probe")?;
            let declared: usize = parse_number(value, line)?;
            if declared != probe_index {
                return Err(malformed(
                    line,
                    format!("probe {declared} out of order, expected {probe_index}"),
                ));
            }
            let mut coefficients = [Vec3::ZERO; SH_COEFF_COUNT];
            for coefficient in &mut coefficients {
                let (text, line) = next_line(&mut lines)?;
                *coefficient = parse_rgb(text.trim(), line)?;
            }
            probes.push(DiffuseProbe {
                coefficients,
                debug_paths: None,
            });
        }

        Ok(BakingData {
            mode,
            bake_cluster,
            cluster_first_probe_indices,
            probes,
        })
    }

    /// Writes the textual form to `path`.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text()).map_err(|e| {
            CinderError::BakingDataIoError(format!("writing {}: {e}", path.display()))
        })
    }

    /// Reads and parses `path`.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CinderError::BakingDataIoError(format!("reading {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }
}

type Lines<'a> = std::iter::Enumerate<std::str::Lines<'a>>;

fn malformed(line: usize, message: impl Into<String>) -> CinderError {
    CinderError::BakingDataIoError(format!("line {}: {}", line + 1, message.into()))
}

fn next_line<'a>(lines: &mut Lines<'a>) -> Result<(&'a str, usize)> {
    for (index, line) in lines.by_ref() {
        if !line.trim().is_empty() {
            return Ok((line, index));
        }
    }
    Err(CinderError::BakingDataIoError(
        "unexpected end of file".to_string(),
    ))
}

/// Next non-empty line, split into `(tag, remainder)`.
fn next_any_tagged<'a>(lines: &mut Lines<'a>) -> Result<(&'a str, &'a str, usize)> {
    let (line, index) = next_line(lines)?;
    let trimmed = line.trim();
    match trimmed.split_once(' ') {
        Some((tag, rest)) => Ok((tag, rest.trim(), index)),
        None => Ok((trimmed, "", index)),
    }
}

/// Next non-empty line, which must start with `tag`; returns the value.
fn next_tagged<'a>(lines: &mut Lines<'a>, tag: &str) -> Result<(&'a str, usize)> {
    let (found, value, index) = next_any_tagged(lines)?;
    if found != tag {
        return Err(malformed(index, format!("expected '{tag}', found '{found}'")));
    }
    Ok((value, index))
}

fn parse_number<T: std::str::FromStr>(text: &str, line: usize) -> Result<T> {
    text.parse()
        .map_err(|_| malformed(line, format!("bad number '{text}'")))
}

fn parse_rgb(text: &str, line: usize) -> Result<Vec3> {
    let mut parts = text.split(',');
    let mut values = [0.0f32; 3];
    for value in &mut values {
        let part = parts
            .next()
            .ok_or_else(|| malformed(line, "coefficient needs three components"))?;
        *value = parse_number(part.trim(), line)?;
    }
    if parts.next().is_some() {
        return Err(malformed(line, "coefficient has more than three components"));
    }
    Ok(Vec3::from_array(values))
}
