//! Brick database access
//!
//! Geometry and primitive metadata come from either an unpacked DB
//! folder or a packed archive. Both are exposed through one entry map
//! keyed by normalized relative paths.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::core::error::Error;
use crate::core::types::Result;

const GEOMETRY_EXTENSIONS: [&str; 6] = ["g", "g1", "g2", "g3", "g4", "xml"];

/// Relative path of a design's geometry chunk. `index` 0 is the bare
/// `.g` file, higher indices are `.g1`, `.g2`…
pub fn geometry_path(design_id: &str, lod: Option<&str>, index: usize) -> String {
    let suffix = if index == 0 {
        String::new()
    } else {
        index.to_string()
    };
    match lod {
        Some(lod) => format!("brickprimitives/lod{lod}/{design_id}.g{suffix}"),
        None => format!("Primitives/LOD0/{design_id}.g{suffix}"),
    }
}

/// Relative path of a design's primitive metadata
pub fn primitive_path(design_id: &str) -> String {
    format!("Primitives/{design_id}.xml")
}

/// A brick database, folder-backed or archive-backed.
pub enum BrickDb {
    Folder(DbFolder),
    Archive(LifArchive),
}

impl BrickDb {
    /// Open a database location: a directory becomes a folder DB, a
    /// file is parsed as a packed archive.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            info!("opening brick DB folder at {}", path.display());
            Ok(Self::Folder(DbFolder::open(path)?))
        } else {
            info!("opening packed brick DB at {}", path.display());
            Ok(Self::Archive(LifArchive::open(path)?))
        }
    }

    pub fn contains(&self, entry: &str) -> bool {
        match self {
            Self::Folder(db) => db.files.contains_key(entry),
            Self::Archive(db) => db.files.contains_key(entry),
        }
    }

    pub fn read(&self, entry: &str) -> Result<Vec<u8>> {
        match self {
            Self::Folder(db) => db.read(entry),
            Self::Archive(db) => db.read(entry),
        }
    }

    /// Whether the database ships dedicated game LODs under
    /// `brickprimitives/lod<n>/`
    pub fn has_game_lods(&self) -> bool {
        let keys: Box<dyn Iterator<Item = &String>> = match self {
            Self::Folder(db) => Box::new(db.files.keys()),
            Self::Archive(db) => Box::new(db.files.keys()),
        };
        let mut keys = keys;
        keys.any(|k| k.starts_with("brickprimitives/"))
    }
}

/// Unpacked DB folder: geometry and metadata as loose files.
pub struct DbFolder {
    files: HashMap<String, PathBuf>,
}

impl DbFolder {
    pub fn open(root: &Path) -> Result<Self> {
        let mut files = HashMap::new();
        walk(root, root, &mut files)?;
        if files.is_empty() {
            return Err(Error::MissingResource(format!(
                "no geometry files under {}",
                root.display()
            )));
        }
        debug!("DB folder holds {} entries", files.len());
        Ok(Self { files })
    }

    fn read(&self, entry: &str) -> Result<Vec<u8>> {
        let path = self
            .files
            .get(entry)
            .ok_or_else(|| Error::MissingResource(format!("db entry '{entry}'")))?;
        Ok(fs::read(path)?)
    }
}

fn walk(root: &Path, dir: &Path, files: &mut HashMap<String, PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, files)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| GEOMETRY_EXTENSIONS.contains(&e))
        {
            let key = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, path);
        }
    }
    Ok(())
}

/// Packed archive: a directory tree with big-endian headers followed
/// by concatenated file contents.
pub struct LifArchive {
    data: Vec<u8>,
    files: HashMap<String, (usize, usize)>,
}

impl LifArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        if data.len() < 88 || &data[0..4] != b"LIFF" {
            return Err(Error::Format("not a LIFF archive".into()));
        }

        let mut archive = Self {
            data,
            files: HashMap::new(),
        };
        let root_offset = archive.read_u32(72)? as usize + 64;
        let mut state = ParseState {
            packed_offset: 84,
        };
        archive.parse_dir("", root_offset, &mut state)?;
        debug!("archive holds {} entries", archive.files.len());
        Ok(archive)
    }

    fn read(&self, entry: &str) -> Result<Vec<u8>> {
        let &(offset, size) = self
            .files
            .get(entry)
            .ok_or_else(|| Error::MissingResource(format!("archive entry '{entry}'")))?;
        self.data
            .get(offset..offset + size)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::Format(format!("archive entry '{entry}' out of bounds")))
    }

    fn read_u32(&self, offset: usize) -> Result<u32> {
        let bytes = self
            .data
            .get(offset..offset + 4)
            .ok_or_else(|| Error::Format(format!("archive read past end at {offset}")))?;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    fn read_u16(&self, offset: usize) -> Result<u16> {
        let bytes = self
            .data
            .get(offset..offset + 2)
            .ok_or_else(|| Error::Format(format!("archive read past end at {offset}")))?;
        Ok(u16::from_be_bytes(bytes.try_into().unwrap()))
    }

    /// Walk one directory block, registering files and recursing into
    /// subdirectories. Returns the offset just past the block.
    fn parse_dir(&mut self, prefix: &str, offset: usize, state: &mut ParseState) -> Result<usize> {
        let mut offset = offset + if prefix.is_empty() { 36 } else { 4 };
        let count = self.read_u32(offset)?;

        for _ in 0..count {
            offset += 4;
            let entry_type = self.read_u16(offset)?;
            offset += 6;

            // Entry names are 16-bit big-endian characters, zero
            // terminated; only the low bytes carry ASCII.
            let mut name = format!("{prefix}/");
            let mut pos = offset + 1;
            loop {
                let ch = *self
                    .data
                    .get(pos)
                    .ok_or_else(|| Error::Format("archive name past end".into()))?;
                if ch == 0 {
                    break;
                }
                name.push(ch as char);
                pos += 2;
                offset += 2;
            }
            offset += 6;
            state.packed_offset += 20;

            match entry_type {
                1 => {
                    offset = self.parse_dir(&name, offset, state)?;
                }
                2 => {
                    let size = self
                        .read_u32(offset)?
                        .checked_sub(20)
                        .ok_or_else(|| Error::Format("archive entry size underflow".into()))?
                        as usize;
                    let key = name.trim_start_matches('/').to_string();
                    self.files.insert(key, (state.packed_offset, size));
                    offset += 24;
                    state.packed_offset += size;
                }
                other => {
                    return Err(Error::Format(format!(
                        "unknown archive entry type {other}"
                    )));
                }
            }
        }
        Ok(offset)
    }
}

struct ParseState {
    packed_offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_geometry_paths() {
        assert_eq!(geometry_path("3005", None, 0), "Primitives/LOD0/3005.g");
        assert_eq!(geometry_path("3005", None, 2), "Primitives/LOD0/3005.g2");
        assert_eq!(
            geometry_path("3005", Some("1"), 1),
            "brickprimitives/lod1/3005.g1"
        );
        assert_eq!(primitive_path("3005"), "Primitives/3005.xml");
    }

    #[test]
    fn test_db_folder_roundtrip() {
        let dir = TempDir::new().unwrap();
        let lod0 = dir.path().join("Primitives/LOD0");
        fs::create_dir_all(&lod0).unwrap();
        fs::write(lod0.join("3005.g"), b"geometry").unwrap();
        fs::write(dir.path().join("Primitives/3005.xml"), b"<xml/>").unwrap();
        // Files with other extensions are ignored
        fs::write(dir.path().join("Primitives/readme.txt"), b"x").unwrap();

        let db = BrickDb::open(dir.path()).unwrap();
        assert!(db.contains("Primitives/LOD0/3005.g"));
        assert!(db.contains("Primitives/3005.xml"));
        assert!(!db.contains("Primitives/readme.txt"));
        assert!(!db.has_game_lods());
        assert_eq!(db.read("Primitives/LOD0/3005.g").unwrap(), b"geometry");
        assert!(matches!(
            db.read("Primitives/LOD0/9999.g"),
            Err(Error::MissingResource(_))
        ));
    }

    #[test]
    fn test_db_folder_detects_game_lods() {
        let dir = TempDir::new().unwrap();
        let lod = dir.path().join("brickprimitives/lod0");
        fs::create_dir_all(&lod).unwrap();
        fs::write(lod.join("3005.g"), b"geometry").unwrap();

        let db = BrickDb::open(dir.path()).unwrap();
        assert!(db.has_game_lods());
        assert!(db.contains("brickprimitives/lod0/3005.g"));
    }

    fn put_u32(buf: &mut [u8], at: usize, v: u32) {
        buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    fn put_u16(buf: &mut [u8], at: usize, v: u16) {
        buf[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }

    /// Entry names are 16-bit big-endian characters; ASCII sits in the
    /// low byte of each pair.
    fn put_name(buf: &mut [u8], at: usize, name: &str) {
        for (i, ch) in name.bytes().enumerate() {
            buf[at + 1 + 2 * i] = ch;
        }
    }

    /// Archive with one directory ("Primitives") holding one file
    /// ("3005.g"). Content packs after the 84 byte header plus one
    /// 20 byte header per entry; the directory tree sits at byte 140.
    fn minimal_lif() -> Vec<u8> {
        let mut buf = vec![0u8; 268];
        buf[0..4].copy_from_slice(b"LIFF");
        put_u32(&mut buf, 72, 140 - 64); // root block, stored relative to byte 64
        buf[124..132].copy_from_slice(b"geometry");

        // root block: 36 byte header, one subdirectory entry
        put_u32(&mut buf, 176, 1);
        put_u16(&mut buf, 180, 1); // directory
        put_name(&mut buf, 186, "Primitives");
        // subdirectory block: 4 byte header, one file entry
        put_u32(&mut buf, 216, 1);
        put_u16(&mut buf, 220, 2); // file
        put_name(&mut buf, 226, "3005.g");
        put_u32(&mut buf, 244, 8 + 20); // stored size includes the entry header
        buf
    }

    #[test]
    fn test_lif_archive_directory_walk() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("db.lif");
        fs::write(&file, minimal_lif()).unwrap();

        let db = BrickDb::open(&file).unwrap();
        assert!(db.contains("Primitives/3005.g"));
        assert!(!db.has_game_lods());
        assert_eq!(db.read("Primitives/3005.g").unwrap(), b"geometry");
        assert!(matches!(
            db.read("Primitives/9999.g"),
            Err(Error::MissingResource(_))
        ));
    }

    #[test]
    fn test_lif_archive_rejects_bad_magic() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("db.lif");
        fs::write(&file, vec![0u8; 100]).unwrap();
        assert!(matches!(
            BrickDb::open(&file),
            Err(Error::Format(_))
        ));
    }
}
