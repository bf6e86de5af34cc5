//! Shared fixtures: a local release feed of real zip packages plus a
//! pre-seeded install root.

use semver::Version;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use updraft::config::UpdraftConfig;
use updraft::layout::InstallRoot;
use updraft::manifest::{MANIFEST_FILE, ReleaseEntry, ReleaseKind, render_manifest};
use updraft::pipeline::UpdateManager;

pub const PACKAGE_ID: &str = "acme-notes";

/// A feed directory plus an install root, both under one tempdir.
pub struct TestEnv {
    _temp: TempDir,
    pub feed_dir: PathBuf,
    pub root_dir: PathBuf,
    pub entries: Vec<ReleaseEntry>,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let feed_dir = temp.path().join("feed");
        let root_dir = temp.path().join("install");
        std::fs::create_dir_all(&feed_dir).unwrap();
        Self {
            _temp: temp,
            feed_dir,
            root_dir,
            entries: Vec::new(),
        }
    }

    /// Publish a zip package to the feed and record its manifest entry.
    /// Call [`TestEnv::commit`] afterwards to (re)write `RELEASES`.
    pub fn publish(&mut self, version: &str, kind: ReleaseKind, files: &[(&str, &[u8])]) {
        self.publish_with_options(version, kind, files, false);
    }

    /// Publish a package whose files carry executable permissions.
    pub fn publish_executable(&mut self, version: &str, files: &[(&str, &[u8])]) {
        self.publish_with_options(version, ReleaseKind::Full, files, true);
    }

    fn publish_with_options(
        &mut self,
        version: &str,
        kind: ReleaseKind,
        files: &[(&str, &[u8])],
        executable: bool,
    ) {
        let version = Version::parse(version).unwrap();
        let entry = ReleaseEntry::new(PACKAGE_ID, version.clone(), kind, String::new(), 0);

        let path = self.feed_dir.join(&entry.filename);
        write_zip(&path, files, executable);

        let bytes = std::fs::read(&path).unwrap();
        self.entries.push(ReleaseEntry::new(
            PACKAGE_ID,
            version,
            kind,
            hex::encode(Sha256::digest(&bytes)),
            bytes.len() as u64,
        ));
    }

    /// Write the `RELEASES` manifest from everything published so far.
    pub fn commit(&self) {
        std::fs::write(self.feed_dir.join(MANIFEST_FILE), render_manifest(&self.entries))
            .unwrap();
    }

    /// Pre-seed an installed version and point the current pointer at it.
    pub fn install_current(&self, version: &str, files: &[(&str, &[u8])]) {
        let version = Version::parse(version).unwrap();
        let root = self.root();
        root.ensure_layout().unwrap();
        let dir = root.version_dir(&version);
        for (name, data) in files {
            let path = dir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, data).unwrap();
        }
        root.set_current(&version).unwrap();
    }

    pub fn config(&self) -> UpdraftConfig {
        let mut config = UpdraftConfig::new(
            PACKAGE_ID,
            self.feed_dir.to_str().unwrap(),
            &self.root_dir,
        );
        config.lock_timeout_secs = 2;
        config
    }

    pub fn manager(&self) -> UpdateManager {
        UpdateManager::new(self.config()).unwrap()
    }

    pub fn root(&self) -> InstallRoot {
        InstallRoot::new(&self.root_dir)
    }

    /// Read a file from the currently selected version directory.
    pub fn current_file(&self, name: &str) -> Vec<u8> {
        let current = self.root().current_dir().unwrap().expect("a current version");
        std::fs::read(current.join(name)).unwrap()
    }

    /// The version the current pointer selects, if any.
    pub fn current_version(&self) -> Option<Version> {
        self.root().current_version().unwrap()
    }
}

fn write_zip(path: &Path, files: &[(&str, &[u8])], executable: bool) {
    use zip::write::SimpleFileOptions;

    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let mut options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    if executable {
        options = options.unix_permissions(0o755);
    }

    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}
