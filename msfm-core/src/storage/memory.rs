//! In-memory device backend.
//!
//! Each volume has a fixed capacity, so quota checks behave like on a real
//! memory card. Paths of a volume are kept flat in a `BTreeMap` keyed by the
//! volume-relative path (`""` is the root). Faults can be injected per path to
//! exercise failure handling.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use compact_str::CompactString;
use parking_lot::Mutex;

use super::{EntryIter, ReadSeek, StorageBackend};
use crate::fs::dir_entry::{DirEntry, Mode, Timestamp};
use crate::fs::path::split_volume;

#[derive(Debug, Clone)]
enum NodeKind {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    created: Timestamp,
    modified: Timestamp,
}

impl Node {
    fn dir() -> Self {
        let now: Timestamp = Timestamp::now();

        Self {
            kind: NodeKind::Dir,
            created: now,
            modified: now,
        }
    }

    fn file() -> Self {
        let now: Timestamp = Timestamp::now();

        Self {
            kind: NodeKind::File(Vec::new()),
            created: now,
            modified: now,
        }
    }

    const fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Dir)
    }

    fn to_entry(&self, name: &str) -> DirEntry {
        let (is_dir, size, perm) = match &self.kind {
            NodeKind::Dir => (true, 0, 0o777),
            NodeKind::File(data) => (false, data.len() as u64, 0o666),
        };

        DirEntry {
            name: CompactString::new(name),
            is_dir,
            size,
            mode: Mode::new(perm, is_dir),
            created: self.created,
            accessed: self.modified,
            modified: self.modified,
        }
    }
}

#[derive(Debug)]
struct Volume {
    capacity: u64,
    nodes: BTreeMap<String, Node>,
}

impl Volume {
    fn new(capacity: u64) -> Self {
        let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
        nodes.insert(String::new(), Node::dir());

        Self { capacity, nodes }
    }

    fn used(&self) -> u64 {
        self.nodes
            .values()
            .map(|n: &Node| -> u64 {
                match &n.kind {
                    NodeKind::File(data) => data.len() as u64,
                    NodeKind::Dir => 0,
                }
            })
            .sum()
    }

    fn require_parent_dir(&self, key: &str) -> io::Result<()> {
        match self.nodes.get(parent_key(key)) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(io::Error::from(io::ErrorKind::NotADirectory)),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    fn has_children(&self, key: &str) -> bool {
        self.children(key).next().is_some()
    }

    /// Direct children of `key` as `(name, node)`.
    fn children<'a>(&'a self, key: &'a str) -> impl Iterator<Item = (&'a str, &'a Node)> + 'a {
        let prefix: String = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };

        self.nodes
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .filter_map(move |(k, node)| {
                let rest: &str = &k[prefix_len(key)..];

                (!rest.is_empty() && !rest.contains('/')).then_some((rest, node))
            })
    }
}

fn prefix_len(key: &str) -> usize {
    if key.is_empty() { 0 } else { key.len() + 1 }
}

fn parent_key(key: &str) -> &str {
    key.rfind('/').map_or("", |idx: usize| -> &str { &key[..idx] })
}

fn normalize(rest: &str) -> io::Result<String> {
    let mut segments: Vec<&str> = Vec::new();

    for segment in rest.split('/').filter(|s: &&str| !s.is_empty() && *s != ".") {
        if segment == ".." {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }

        segments.push(segment);
    }

    Ok(segments.join("/"))
}

type Volumes = Arc<Mutex<BTreeMap<String, Volume>>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    volumes: Volumes,
    faults: Arc<Mutex<HashSet<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(name: &str, capacity: u64) -> Self {
        let backend: Self = Self::new();
        backend.add_volume(name, capacity);

        backend
    }

    pub fn add_volume(&self, name: &str, capacity: u64) {
        self.volumes
            .lock()
            .insert(name.to_string(), Volume::new(capacity));
    }

    /// Make reads and removals of `path` fail with an I/O error.
    pub fn inject_fault(&self, path: &str) {
        self.faults.lock().insert(path.to_string());
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Convenience for seeding a volume: creates missing parent directories.
    pub fn put_file(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let (volume, key) = self.locate(path)?;
        let mut volumes = self.volumes.lock();
        let vol: &mut Volume = volumes
            .get_mut(&volume)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

        let mut parent: String = String::new();
        for segment in parent_key(&key).split('/').filter(|s: &&str| !s.is_empty()) {
            if !parent.is_empty() {
                parent.push('/');
            }
            parent.push_str(segment);
            vol.nodes.entry(parent.clone()).or_insert_with(Node::dir);
        }

        let mut node: Node = Node::file();
        node.kind = NodeKind::File(data.to_vec());
        vol.nodes.insert(key, node);

        Ok(())
    }

    /// Whole contents of a file.
    pub fn read_all(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::new();
        self.open_read(path)?.read_to_end(&mut buf)?;

        Ok(buf)
    }

    fn locate(&self, path: &str) -> io::Result<(String, String)> {
        let (volume, rest) = split_volume(path).ok_or_else(|| -> io::Error {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("missing volume prefix: {path:?}"),
            )
        })?;

        Ok((volume.to_string(), normalize(rest)?))
    }

    fn is_faulted(&self, path: &str) -> bool {
        self.faults.lock().contains(path)
    }

    fn with_volume_mut<T>(
        &self,
        volume: &str,
        f: impl FnOnce(&mut Volume) -> io::Result<T>,
    ) -> io::Result<T> {
        let mut volumes = self.volumes.lock();
        let vol: &mut Volume = volumes.get_mut(volume).ok_or_else(|| -> io::Error {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("unknown volume {volume:?}"),
            )
        })?;

        f(vol)
    }
}

/// Seekable like the real file but every read fails; stands in for a bad
/// sector.
struct FaultyReader {
    len: u64,
    pos: u64,
}

impl Read for FaultyReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("injected read fault"))
    }
}

impl Seek for FaultyReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target: Option<u64> = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => self.len.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };

        self.pos = target.ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;

        Ok(self.pos)
    }
}

struct MemWriter {
    volumes: Volumes,
    volume: String,
    key: String,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut volumes = self.volumes.lock();
        let vol: &mut Volume = volumes
            .get_mut(&self.volume)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

        if vol.used().saturating_add(buf.len() as u64) > vol.capacity {
            return Err(io::Error::from(io::ErrorKind::StorageFull));
        }

        match vol.nodes.get_mut(&self.key) {
            Some(Node {
                kind: NodeKind::File(data),
                modified,
                ..
            }) => {
                data.extend_from_slice(buf);
                *modified = Timestamp::now();

                Ok(buf.len())
            }

            _ => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open_read(&self, path: &str) -> io::Result<Box<dyn ReadSeek>> {
        let (volume, key) = self.locate(path)?;
        let faulted: bool = self.is_faulted(path);

        self.with_volume_mut(&volume, |vol: &mut Volume| -> io::Result<Box<dyn ReadSeek>> {
            match vol.nodes.get(&key) {
                Some(Node {
                    kind: NodeKind::File(data),
                    ..
                }) => {
                    if faulted {
                        Ok(Box::new(FaultyReader {
                            len: data.len() as u64,
                            pos: 0,
                        }))
                    } else {
                        Ok(Box::new(Cursor::new(data.clone())))
                    }
                }

                Some(_) => Err(io::Error::from(io::ErrorKind::IsADirectory)),

                None => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        })
    }

    fn open_write(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        let (volume, key) = self.locate(path)?;

        self.with_volume_mut(&volume, |vol: &mut Volume| -> io::Result<()> {
            vol.require_parent_dir(&key)?;

            match vol.nodes.get_mut(&key) {
                Some(Node {
                    kind: NodeKind::File(data),
                    ..
                }) => data.clear(),

                Some(_) => return Err(io::Error::from(io::ErrorKind::IsADirectory)),

                None => {
                    vol.nodes.insert(key.clone(), Node::file());
                }
            }

            Ok(())
        })?;

        Ok(Box::new(MemWriter {
            volumes: Arc::clone(&self.volumes),
            volume,
            key,
        }))
    }

    fn stat(&self, path: &str) -> io::Result<DirEntry> {
        let (volume, key) = self.locate(path)?;

        self.with_volume_mut(&volume, |vol: &mut Volume| -> io::Result<DirEntry> {
            let node: &Node = vol
                .nodes
                .get(&key)
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

            let name: &str = key.rsplit('/').next().unwrap_or("");

            Ok(node.to_entry(name))
        })
    }

    fn read_dir<'a>(&'a self, path: &str) -> io::Result<EntryIter<'a>> {
        let (volume, key) = self.locate(path)?;

        let entries: Vec<DirEntry> =
            self.with_volume_mut(&volume, |vol: &mut Volume| -> io::Result<Vec<DirEntry>> {
                match vol.nodes.get(&key) {
                    Some(node) if node.is_dir() => {}
                    Some(_) => return Err(io::Error::from(io::ErrorKind::NotADirectory)),
                    None => return Err(io::Error::from(io::ErrorKind::NotFound)),
                }

                Ok(vol
                    .children(&key)
                    .map(|(name, node)| node.to_entry(name))
                    .collect())
            })?;

        Ok(Box::new(entries.into_iter().map(Ok::<DirEntry, io::Error>)))
    }

    fn make_dir(&self, path: &str) -> io::Result<()> {
        let (volume, key) = self.locate(path)?;

        self.with_volume_mut(&volume, |vol: &mut Volume| -> io::Result<()> {
            if vol.nodes.contains_key(&key) {
                return Err(io::Error::from(io::ErrorKind::AlreadyExists));
            }

            vol.require_parent_dir(&key)?;
            vol.nodes.insert(key, Node::dir());

            Ok(())
        })
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        if self.is_faulted(path) {
            return Err(io::Error::other("injected remove fault"));
        }

        let (volume, key) = self.locate(path)?;

        self.with_volume_mut(&volume, |vol: &mut Volume| -> io::Result<()> {
            match vol.nodes.get(&key) {
                Some(node) if node.is_dir() => Err(io::Error::from(io::ErrorKind::IsADirectory)),
                Some(_) => {
                    vol.nodes.remove(&key);
                    Ok(())
                }
                None => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        })
    }

    fn remove_dir(&self, path: &str) -> io::Result<()> {
        if self.is_faulted(path) {
            return Err(io::Error::other("injected remove fault"));
        }

        let (volume, key) = self.locate(path)?;

        self.with_volume_mut(&volume, |vol: &mut Volume| -> io::Result<()> {
            if key.is_empty() {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }

            match vol.nodes.get(&key) {
                Some(node) if !node.is_dir() => {
                    Err(io::Error::from(io::ErrorKind::NotADirectory))
                }
                Some(_) if vol.has_children(&key) => {
                    Err(io::Error::from(io::ErrorKind::DirectoryNotEmpty))
                }
                Some(_) => {
                    vol.nodes.remove(&key);
                    Ok(())
                }
                None => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        })
    }

    fn rename(&self, src: &str, dest: &str) -> io::Result<()> {
        let (src_volume, src_key) = self.locate(src)?;
        let (dest_volume, dest_key) = self.locate(dest)?;

        if src_volume != dest_volume {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "rename across volumes",
            ));
        }

        self.with_volume_mut(&src_volume, |vol: &mut Volume| -> io::Result<()> {
            if src_key.is_empty() || !vol.nodes.contains_key(&src_key) {
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }

            if vol.nodes.contains_key(&dest_key) {
                return Err(io::Error::from(io::ErrorKind::AlreadyExists));
            }

            if dest_key.starts_with(&format!("{src_key}/")) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot move a directory into itself",
                ));
            }

            vol.require_parent_dir(&dest_key)?;

            let subtree: String = format!("{src_key}/");
            let moved: Vec<String> = vol
                .nodes
                .keys()
                .filter(|k: &&String| **k == src_key || k.starts_with(&subtree))
                .cloned()
                .collect();

            for old in moved {
                if let Some(node) = vol.nodes.remove(&old) {
                    let new_key: String = format!("{dest_key}{}", &old[src_key.len()..]);
                    vol.nodes.insert(new_key, node);
                }
            }

            Ok(())
        })
    }

    fn free_space(&self, volume: &str) -> io::Result<u64> {
        self.with_volume_mut(volume, |vol: &mut Volume| -> io::Result<u64> {
            Ok(vol.capacity.saturating_sub(vol.used()))
        })
    }

    fn total_space(&self, volume: &str) -> io::Result<u64> {
        self.with_volume_mut(volume, |vol: &mut Volume| -> io::Result<u64> { Ok(vol.capacity) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_direct_children_only() {
        let mem = MemoryBackend::with_volume("ms0", 1 << 20);
        mem.put_file("ms0:/PSP/GAME/EBOOT.PBP", b"x").unwrap();
        mem.put_file("ms0:/PSP/a.txt", b"abc").unwrap();
        mem.put_file("ms0:/PSPX.txt", b"z").unwrap();

        let mut names: Vec<String> = mem
            .read_dir("ms0:/PSP")
            .unwrap()
            .map(|e| e.unwrap().name.to_string())
            .collect();
        names.sort();

        assert_eq!(names, vec!["GAME".to_string(), "a.txt".to_string()]);
    }

    #[test]
    fn writes_respect_capacity() {
        let mem = MemoryBackend::with_volume("ms0", 8);
        let mut w = mem.open_write("ms0:/f").unwrap();

        w.write_all(b"12345678").unwrap();
        let err = w.write_all(b"9").unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
        assert_eq!(mem.free_space("ms0").unwrap(), 0);
        assert_eq!(mem.total_space("ms0").unwrap(), 8);
    }

    #[test]
    fn rename_moves_subtree() {
        let mem = MemoryBackend::with_volume("ms0", 1 << 20);
        mem.put_file("ms0:/A/B/c.txt", b"c").unwrap();
        mem.make_dir("ms0:/Z").unwrap();

        mem.rename("ms0:/A", "ms0:/Z/A").unwrap();

        assert!(!mem.exists("ms0:/A"));
        assert_eq!(mem.read_all("ms0:/Z/A/B/c.txt").unwrap(), b"c");
        assert!(mem.rename("ms0:/Z", "ms0:/Z/A/inner").is_err());
    }

    #[test]
    fn remove_dir_requires_empty() {
        let mem = MemoryBackend::with_volume("ms0", 1 << 20);
        mem.put_file("ms0:/D/f", b"1").unwrap();

        let err = mem.remove_dir("ms0:/D").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);

        mem.remove_file("ms0:/D/f").unwrap();
        mem.remove_dir("ms0:/D").unwrap();
        assert!(!mem.exists("ms0:/D"));
    }

    #[test]
    fn injected_faults_fail_reads() {
        let mem = MemoryBackend::with_volume("ms0", 1 << 20);
        mem.put_file("ms0:/bad.bin", b"data").unwrap();
        mem.inject_fault("ms0:/bad.bin");

        assert!(mem.read_all("ms0:/bad.bin").is_err());
        assert!(mem.remove_file("ms0:/bad.bin").is_err());

        mem.clear_faults();
        assert_eq!(mem.read_all("ms0:/bad.bin").unwrap(), b"data");
    }
}
