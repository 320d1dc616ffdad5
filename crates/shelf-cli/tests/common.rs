#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use url::Url;
use zip::write::FileOptions;
use zip::ZipWriter;

/// A throwaway storage root, cache and content directory for one test.
pub struct Sandbox {
    temp: TempDir,
}

pub struct SitePackage<'a> {
    pub id: &'a str,
    pub version: &'a str,
    pub body: &'a str,
}

impl Sandbox {
    pub fn new(prefix: &str) -> Self {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .expect("tempdir");
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn storage(&self) -> PathBuf {
        self.root().join("storage")
    }

    pub fn sites(&self) -> PathBuf {
        self.storage().join("nginx")
    }

    pub fn shelf(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("shelf");
        cmd.env("SHELF_STORAGE_ROOT", self.storage())
            .env("SHELF_CACHE_PATH", self.root().join("cache"))
            .env("SHELF_SYSTEMD", "0")
            .env("NO_COLOR", "1")
            .env_remove("SHELF_PACKAGE_CACHES")
            .env_remove("SHELF_INDEX_ROOT")
            .env_remove("SHELF_SITES_ROOT")
            .env_remove("SHELF_MEDIA_ROOT")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn file_url(&self, name: &str) -> String {
        Url::from_file_path(self.root().join(name))
            .expect("absolute path")
            .to_string()
    }

    /// Zips each site and writes a catalog document `<remote>.yml` listing them.
    pub fn publish_sites(&self, remote: &str, sites: &[SitePackage<'_>]) -> String {
        let mut document = String::from("all:\n");
        for site in sites {
            let name = format!("{}-{}.zip", site.id, site.version);
            let zip = self.root().join(&name);
            write_zip(&zip, &[("index.html", site.body.as_bytes())]);
            let _ = write!(
                document,
                "  {}:\n    name: Site {}\n    version: '{}'\n    type: static-site\n    \
                 sha256sum: '{}'\n    url: {}\n",
                site.id,
                site.id,
                site.version,
                sha256(&zip),
                self.file_url(&name)
            );
        }
        let path = self.root().join(format!("{remote}.yml"));
        fs::write(&path, document).expect("write catalog");
        self.file_url(&format!("{remote}.yml"))
    }

    pub fn add_remote(&self, id: &str, url: &str) {
        self.shelf()
            .args(["remotes", "add", id, &format!("Remote {id}"), url])
            .assert()
            .success();
    }
}

pub fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create zip");
    let mut zip = ZipWriter::new(file);
    for (name, contents) in files {
        zip.start_file(*name, FileOptions::default()).expect("start file");
        zip.write_all(contents).expect("write entry");
    }
    zip.finish().expect("finish zip");
}

pub fn sha256(path: &Path) -> String {
    hex::encode(Sha256::digest(fs::read(path).expect("read artifact")))
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn stdout(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

pub fn stderr(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).to_string()
}
