//! ``src/operators/move_entry.rs``
//!
//! Same-volume moves are a single backend rename. Moves between volumes are
//! refused without touching either side.

use tracing::{info, instrument, warn};

use crate::error::{FsError, FsResult};
use crate::fs::path::volume_prefix;
use crate::operators::progress::Outcome;
use crate::storage::StorageBackend;

#[instrument(level = "debug", skip(backend), fields(backend = backend.name()))]
pub fn move_entry(backend: &dyn StorageBackend, src: &str, dest: &str) -> FsResult<Outcome> {
    let src_volume: &str =
        volume_prefix(src).ok_or_else(|| FsError::invalid_path(src, "missing volume prefix"))?;
    let dest_volume: &str =
        volume_prefix(dest).ok_or_else(|| FsError::invalid_path(dest, "missing volume prefix"))?;

    if src_volume != dest_volume {
        warn!(src_volume, dest_volume, "Refusing cross-volume move");

        return Err(FsError::CrossDeviceMoveUnsupported {
            src: src.to_string(),
            dest: dest.to_string(),
        });
    }

    backend.rename(src, dest).map_err(|e| FsError::io(src, e))?;

    info!("Entry moved");

    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsErrorKind;
    use crate::fs::dir_scanner::list_dir;
    use crate::storage::{HostBackend, MemoryBackend};
    use tempfile::TempDir;

    fn names(backend: &dyn StorageBackend, dir: &str) -> Vec<String> {
        let mut out: Vec<String> = list_dir(backend, dir)
            .unwrap()
            .into_iter()
            .map(|e| e.name.to_string())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn same_volume_move_relocates_entry() {
        let mem = MemoryBackend::with_volume("ms0", 1 << 20);
        mem.put_file("ms0:/PSP/GAME/EBOOT.PBP", b"boot").unwrap();
        mem.make_dir("ms0:/ISO").unwrap();

        let outcome = move_entry(&mem, "ms0:/PSP/GAME", "ms0:/ISO/GAME").unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(names(&mem, "ms0:/ISO"), vec!["GAME".to_string()]);
        assert!(names(&mem, "ms0:/PSP").is_empty());
        assert_eq!(mem.read_all("ms0:/ISO/GAME/EBOOT.PBP").unwrap(), b"boot");
    }

    #[test]
    fn cross_volume_move_touches_nothing() {
        let mem = MemoryBackend::with_volume("ms0", 1 << 20);
        mem.add_volume("ef0", 1 << 20);
        mem.put_file("ms0:/PSP/a.txt", b"a").unwrap();
        mem.make_dir("ef0:/PSP").unwrap();

        let err = move_entry(&mem, "ms0:/PSP/a.txt", "ef0:/PSP/a.txt").unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::CrossDeviceMoveUnsupported);
        assert_eq!(names(&mem, "ms0:/PSP"), vec!["a.txt".to_string()]);
        assert!(names(&mem, "ef0:/PSP").is_empty());
    }

    #[test]
    fn missing_prefix_is_invalid() {
        let mem = MemoryBackend::with_volume("ms0", 1 << 20);

        let err = move_entry(&mem, "PSP/a.txt", "ms0:/a.txt").unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::InvalidPath);
    }

    #[test]
    fn host_rename() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(tmp.path().join("DOCS")).unwrap();
        let host = HostBackend::with_volume("ms0", tmp.path());

        move_entry(&host, "ms0:/a.txt", "ms0:/DOCS/a.txt").unwrap();

        assert!(tmp.path().join("DOCS").join("a.txt").is_file());
        assert!(!tmp.path().join("a.txt").exists());

        let err = move_entry(&host, "ms0:/missing", "ms0:/DOCS/missing").unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotFound);
    }

    #[test]
    fn host_move_onto_existing_name_is_refused() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"new").unwrap();
        std::fs::create_dir(tmp.path().join("DOCS")).unwrap();
        std::fs::write(tmp.path().join("DOCS").join("a.txt"), b"precious").unwrap();
        let host = HostBackend::with_volume("ms0", tmp.path());

        let err = move_entry(&host, "ms0:/a.txt", "ms0:/DOCS/a.txt").unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::Io);
        assert_eq!(
            std::fs::read(tmp.path().join("DOCS").join("a.txt")).unwrap(),
            b"precious"
        );
        assert!(tmp.path().join("a.txt").is_file());
    }
}
