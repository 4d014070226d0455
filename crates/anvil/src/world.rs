//! A Java Edition world directory as a [`WorldSource`].
//!
//! Region files live under a per-dimension directory:
//! `region/` (overworld), `DIM-1/region/` (nether), `DIM1/region/` (end), and
//! `dimensions/<namespace>/<path>/region/` for everything else.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use blockscan_engine::error::DecodeError;
use blockscan_engine::source::{ContainerHandle, ContainerRef, WorldSource};
use blockscan_engine::world::{ContainerPos, Dimension, PalettedSection};

use crate::nbt;

/// Parse a dimension given on the command line or in a config file.
///
/// Accepts the vanilla short forms (`overworld`, `nether`, `end`) and any
/// namespaced id; bare names get the `minecraft` namespace.
pub fn parse_dimension(label: &str) -> Dimension {
    match label.trim().to_ascii_lowercase().as_str() {
        "overworld" | "minecraft:overworld" => Dimension::overworld(),
        "nether" | "the_nether" | "minecraft:the_nether" => Dimension::nether(),
        "end" | "the_end" | "minecraft:the_end" => Dimension::end(),
        other if other.contains(':') => Dimension::new(other),
        other => Dimension::new(format!("minecraft:{other}")),
    }
}

/// Parse a region file name (`r.-1.3.mca`).
pub fn parse_region_name(name: &str) -> Option<ContainerPos> {
    let coords = name.strip_prefix("r.")?.strip_suffix(".mca")?;
    let (x, z) = coords.split_once('.')?;
    Some(ContainerPos::new(x.parse().ok()?, z.parse().ok()?))
}

pub struct AnvilWorld {
    root: PathBuf,
    dimensions: Vec<Dimension>,
}

impl AnvilWorld {
    /// Open a world directory. The three vanilla dimensions are always known
    /// (a missing region directory just holds no containers); custom ones
    /// are discovered under `dimensions/`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("world directory {} does not exist", root.display());
        }

        let mut dimensions = vec![Dimension::overworld(), Dimension::nether(), Dimension::end()];
        let custom_root = root.join("dimensions");
        if custom_root.is_dir() {
            for namespace in fs::read_dir(&custom_root)
                .with_context(|| format!("listing {}", custom_root.display()))?
            {
                let namespace = namespace?.path();
                let Some(ns) = namespace.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                discover(&namespace, ns, "", &mut dimensions)?;
            }
        }
        dimensions.sort();
        dimensions.dedup();

        tracing::info!("Opened world {} ({} dimensions)", root.display(), dimensions.len());
        Ok(Self { root, dimensions })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the region files of `dimension`.
    pub fn region_dir(&self, dimension: &Dimension) -> PathBuf {
        match dimension.as_str() {
            Dimension::OVERWORLD => self.root.join("region"),
            Dimension::NETHER => self.root.join("DIM-1").join("region"),
            Dimension::END => self.root.join("DIM1").join("region"),
            id => {
                let (namespace, path) = id.split_once(':').unwrap_or(("minecraft", id));
                let mut dir = self.root.join("dimensions").join(namespace);
                for part in path.split('/') {
                    dir.push(part);
                }
                dir.join("region")
            }
        }
    }
}

/// Walk `dir` for nested `region/` directories, recording each as
/// `namespace:path`.
fn discover(dir: &Path, namespace: &str, path: &str, found: &mut Vec<Dimension>) -> Result<()> {
    if !path.is_empty() && dir.join("region").is_dir() {
        found.push(Dimension::new(format!("{namespace}:{path}")));
    }
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let child = entry?.path();
        let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !child.is_dir() || name == "region" {
            continue;
        }
        let nested = if path.is_empty() {
            name.to_string()
        } else {
            format!("{path}/{name}")
        };
        discover(&child, namespace, &nested, found)?;
    }
    Ok(())
}

impl WorldSource for AnvilWorld {
    type Container = AnvilRegion;

    fn dimensions(&self) -> Vec<Dimension> {
        self.dimensions.clone()
    }

    fn list_containers(&self, dimension: &Dimension) -> Result<Vec<ContainerRef>, DecodeError> {
        let dir = self.region_dir(dimension);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DecodeError::io(dir.display().to_string(), e)),
        };

        let mut containers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DecodeError::io(dir.display().to_string(), e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.ends_with(".mca") {
                continue;
            }
            match parse_region_name(name) {
                Some(pos) => containers.push(ContainerRef::new(dimension.clone(), pos)),
                None => tracing::warn!("Skipping unexpected file in region dir: {}", name),
            }
        }
        containers.sort();
        Ok(containers)
    }

    fn open_container(&self, container: &ContainerRef) -> Result<Option<AnvilRegion>, DecodeError> {
        let path = self.region_dir(&container.dimension).join(container.pos.file_name());
        let what = path.display().to_string();

        match fs::metadata(&path) {
            Ok(meta) if meta.len() == 0 => return Ok(None),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DecodeError::io(what, e)),
        }

        let file = File::open(&path).map_err(|e| DecodeError::io(what.clone(), e))?;
        let region = fastanvil::Region::from_stream(file).map_err(|e| DecodeError::corrupt(what.clone(), e))?;
        Ok(Some(AnvilRegion { region, path: what }))
    }
}

/// One open region file.
pub struct AnvilRegion {
    region: fastanvil::Region<File>,
    path: String,
}

impl ContainerHandle for AnvilRegion {
    type Section = PalettedSection;

    fn decode_chunk(&mut self, local_x: u8, local_z: u8) -> Result<Option<Vec<PalettedSection>>, DecodeError> {
        let what = || format!("chunk ({}, {}) of {}", local_x, local_z, self.path);

        let bytes = self
            .region
            .read_chunk(local_x as usize, local_z as usize)
            .map_err(|e| DecodeError::corrupt(what(), e))?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        nbt::decode_sections(&bytes)
            .map(Some)
            .map_err(|e| DecodeError::corrupt(what(), format!("{e:#}")))
    }
}
