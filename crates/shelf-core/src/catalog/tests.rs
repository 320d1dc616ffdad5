use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use sha2::{Digest, Sha256};
use shelf_domain::{CatalogError, PackageMetadata, PackageSize};
use tempfile::TempDir;
use url::Url;

use super::*;
use crate::handler::LIBRARY_FILE;
use crate::package::{HandlerId, PackageKind};
use crate::settings::{DISPLAYED_PACKAGES_KEY, HOME_PAGE_NAMESPACE};
use crate::testing::{
    recording_effects, test_config, write_media_package, write_zim_package, write_zip,
    RecordingServiceManager, ZimFixture,
};

const EMPTY_LIBRARY: &str = "<?xml version='1.0' encoding='utf-8'?>\n<library/>";

struct Fixture {
    temp: TempDir,
    catalog: Catalog,
    effects: SharedEffects,
    services: Arc<RecordingServiceManager>,
}

impl Fixture {
    fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let config = test_config(temp.path());
        let (effects, services) = recording_effects();
        let catalog = Catalog::open(&config, effects.clone())?;
        Ok(Self {
            temp,
            catalog,
            effects,
            services,
        })
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative)
    }

    /// Writes a remote catalog document and registers it as remote `id`.
    fn publish(&mut self, id: &str, packages: &[(&str, PackageMetadata)]) -> Result<()> {
        let index: BTreeMap<_, _> = packages
            .iter()
            .map(|(package, metadata)| ((*package).to_string(), metadata.clone()))
            .collect();
        let document = serde_yaml::to_string(&BTreeMap::from([("all", index)]))?;
        let path = self.path(&format!("{id}.yml"));
        fs::write(&path, document)?;
        self.catalog.add_remote(id, &format!("Content from {id}"), &file_url(&path))?;
        Ok(())
    }

    fn zim(&self, version: &str, date: &str) -> Result<PackageMetadata> {
        let zip = self.path(&format!("wikipedia.tum-{version}.zip"));
        write_zim_package(
            &zip,
            &ZimFixture::new(&format!("wikipedia_tum_all_nopic_{version}"), date),
        )?;
        Ok(artifact_metadata(&zip, "zipped-zim", "Wikipédia en tumbuka", version))
    }

    fn site(&self, id: &str) -> Result<PackageMetadata> {
        let zip = self.path(&format!("{id}.zip"));
        write_zip(&zip, &[("index.html", format!("<h1>{id}</h1>").as_bytes())])?;
        Ok(artifact_metadata(&zip, "static-site", id, "1"))
    }

    fn library(&self) -> Result<String> {
        Ok(fs::read_to_string(self.path("kiwix").join(LIBRARY_FILE))?)
    }

    fn displayed(&self) -> Result<serde_json::Value> {
        self.catalog
            .settings()
            .get(HOME_PAGE_NAMESPACE, DISPLAYED_PACKAGES_KEY)
    }
}

fn file_url(path: &Path) -> String {
    Url::from_file_path(path)
        .expect("absolute path")
        .to_string()
}

fn sha256(path: &Path) -> String {
    hex::encode(Sha256::digest(fs::read(path).expect("readable artifact")))
}

fn artifact_metadata(zip: &Path, kind: &str, name: &str, version: &str) -> PackageMetadata {
    PackageMetadata {
        version: Some(version.to_string()),
        size: Some(PackageSize::Bytes(fs::metadata(zip).map(|m| m.len()).unwrap_or(0))),
        sha256sum: Some(sha256(zip)),
        kind: Some(kind.to_string()),
        url: Some(file_url(zip)),
        ..PackageMetadata::named(name)
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[test]
fn update_cache_merges_remotes_and_skips_unreachable_ones() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.publish(
        "alpha",
        &[
            ("foovideos", PackageMetadata::named("Videos from Foo")),
            ("shared", PackageMetadata::named("From alpha")),
        ],
    )?;
    fx.publish("beta", &[("shared", PackageMetadata::named("From beta"))])?;
    let missing = fx.path("nowhere.yml");
    fx.catalog.add_remote("gamma", "Gone", &file_url(&missing))?;

    let report = fx.catalog.update_cache()?;

    assert_eq!(report.remotes, vec!["alpha", "beta"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "gamma");
    assert_eq!(fx.catalog.available().len(), 2);
    assert_eq!(
        fx.catalog.available()["shared"].name.as_deref(),
        Some("From beta")
    );
    assert!(fx.catalog.installed().is_empty());
    Ok(())
}

#[test]
fn clear_cache_forgets_both_indexes() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.publish("alpha", &[("foovideos", PackageMetadata::named("Videos from Foo"))])?;
    fx.catalog.update_cache()?;

    let config_root = fx.catalog.storage_root().to_path_buf();
    let state = shelf_domain::CatalogState::load(&config_root.join(CATALOG_FILE))?;
    assert!(state.available.contains_key("foovideos"));

    fx.catalog.clear_cache()?;
    assert!(fx.catalog.available().is_empty());
    let state = shelf_domain::CatalogState::load(&config_root.join(CATALOG_FILE))?;
    assert!(state.available.is_empty());
    Ok(())
}

#[test]
fn install_and_remove_indexed_archive() -> Result<()> {
    let mut fx = Fixture::new()?;
    let zim = fx.zim("2015-08", "2015-08-10")?;
    fx.publish("alpha", &[("wikipedia.tum", zim)])?;
    fx.catalog.update_cache()?;

    let report = fx.catalog.install_packages(&ids(&["wikipedia.tum"]))?;
    assert_eq!(report.processed, vec!["wikipedia.tum"]);
    let kiwix = fx.path("kiwix");
    assert!(kiwix.join("data/content/wikipedia.tum.zim").is_file());
    assert!(kiwix.join("data/library/wikipedia.tum.zim.xml").is_file());
    assert!(kiwix.join("data/index/wikipedia.tum.zim.idx").is_dir());
    let library = fx.library()?;
    assert!(library.contains("path=\"data/content/wikipedia.tum.zim\""));
    assert!(library.contains("indexPath=\"data/index/wikipedia.tum.zim.idx\""));
    assert_eq!(fx.services.restarts(), vec!["kiwix-server"]);
    assert_eq!(fx.displayed()?, json!(["wikipedia.tum"]));

    let again = fx.catalog.install_packages(&ids(&["wikipedia.tum"]))?;
    assert!(again.processed.is_empty());
    assert_eq!(again.skipped[0].reason, "already installed");
    assert_eq!(fx.services.restarts().len(), 1);

    let removed = fx.catalog.remove_packages(&ids(&["wikipedia.tum"]))?;
    assert_eq!(removed.processed, vec!["wikipedia.tum"]);
    assert!(fx.catalog.installed().is_empty());
    assert_eq!(fx.library()?, EMPTY_LIBRARY);
    assert!(!kiwix.join("data").exists());
    assert_eq!(fx.displayed()?, json!([]));
    Ok(())
}

/// Keeps the downloaded artifact as a single file named after the package.
struct PlainFile;

impl PackageKind for PlainFile {
    fn typename(&self) -> &str {
        "plain-file"
    }

    fn handler(&self) -> Option<HandlerId> {
        Some(HandlerId::Nginx)
    }

    fn install(&self, package: &Package, download: &Path, install_dir: &Path) -> Result<()> {
        fs::copy(download, install_dir.join(format!("{}.zip", package.id())))?;
        Ok(())
    }

    fn remove(&self, package: &Package, install_dir: &Path) -> Result<()> {
        fs::remove_file(install_dir.join(format!("{}.zip", package.id())))?;
        Ok(())
    }
}

#[test]
fn registered_custom_kind_installs_through_its_handler() -> Result<()> {
    let mut fx = Fixture::new()?;
    let mut registry = TypeRegistry::with_builtin(fx.effects.clone());
    registry.register(Arc::new(PlainFile));
    fx.catalog =
        Catalog::open(&test_config(fx.temp.path()), fx.effects.clone())?.with_registry(registry);

    let zip = fx.path("notes.zip");
    write_zip(&zip, &[("notes.txt", b"plain")])?;
    let notes = artifact_metadata(&zip, "plain-file", "Notes", "1");
    let site = fx.site("first")?;
    fx.publish("alpha", &[("notes", notes), ("first", site)])?;
    fx.catalog.update_cache()?;

    let report = fx.catalog.install_packages(&ids(&["notes", "first"]))?;
    assert_eq!(report.processed, vec!["notes", "first"]);
    assert_eq!(fs::read(fx.path("nginx/notes.zip"))?, fs::read(&zip)?);
    assert!(fx.path("nginx/first/index.html").is_file());
    assert_eq!(fx.services.restarts(), vec!["nginx"]);

    let removed = fx.catalog.remove_packages(&ids(&["notes"]))?;
    assert_eq!(removed.processed, vec!["notes"]);
    assert!(!fx.path("nginx/notes.zip").exists());
    assert!(fx.path("nginx/first/index.html").is_file());
    Ok(())
}

#[test]
fn upgrade_replaces_content_and_noop_upgrade_touches_nothing() -> Result<()> {
    let mut fx = Fixture::new()?;
    let old = fx.zim("2015-08", "2015-08-10")?;
    fx.publish("alpha", &[("wikipedia.tum", old)])?;
    fx.catalog.update_cache()?;
    fx.catalog.install_packages(&ids(&["wikipedia.tum"]))?;
    assert!(fx.library()?.contains("date=\"2015-08-10\""));

    let noop = fx.catalog.upgrade_packages(&ids(&["wikipedia.tum"]))?;
    assert!(noop.processed.is_empty());
    assert_eq!(noop.skipped[0].reason, "no update available");

    let new = fx.zim("2015-09", "2015-09-10")?;
    fx.publish("alpha", &[("wikipedia.tum", new)])?;
    fx.catalog.update_cache()?;
    assert_eq!(fx.catalog.installed()["wikipedia.tum"].version(), "2015-08");
    assert_eq!(
        fx.catalog
            .list_upgradable(&[])
            .iter()
            .map(|p| p.version().to_string())
            .collect::<Vec<_>>(),
        vec!["2015-09"]
    );

    let report = fx.catalog.upgrade_packages(&ids(&["wikipedia.*"]))?;
    assert_eq!(report.processed, vec!["wikipedia.tum"]);
    assert_eq!(fx.catalog.installed()["wikipedia.tum"].version(), "2015-09");
    let library = fx.library()?;
    assert!(library.contains("date=\"2015-09-10\""));
    assert!(!library.contains("2015-08-10"));
    let content = fs::read_to_string(fx.path("kiwix/data/content/wikipedia.tum.zim"))?;
    assert!(content.contains("2015-09-10"));

    let library_path = fx.path("kiwix").join(LIBRARY_FILE);
    let modified = fs::metadata(&library_path)?.modified()?;
    let restarts = fx.services.restarts().len();
    let noop = fx.catalog.upgrade_packages(&ids(&["wikipedia.tum"]))?;
    assert_eq!(noop.skipped[0].reason, "no update available");
    assert_eq!(fs::metadata(&library_path)?.modified()?, modified);
    assert_eq!(fx.services.restarts().len(), restarts);
    Ok(())
}

#[test]
fn reinstall_repairs_tampered_content() -> Result<()> {
    let mut fx = Fixture::new()?;
    let zim = fx.zim("2015-08", "2015-08-10")?;
    fx.publish("alpha", &[("wikipedia.tum", zim)])?;
    fx.catalog.update_cache()?;
    fx.catalog.install_packages(&ids(&["wikipedia.tum"]))?;

    let content = fx.path("kiwix/data/content/wikipedia.tum.zim");
    let canonical = fs::read(&content)?;
    fs::write(&content, b"tampered")?;
    fs::remove_dir_all(fx.path("kiwix/data/index/wikipedia.tum.zim.idx"))?;

    let report = fx.catalog.reinstall_packages(&ids(&["wikipedia.tum"]))?;
    assert_eq!(report.processed, vec!["wikipedia.tum"]);
    assert_eq!(fs::read(&content)?, canonical);
    assert!(fx.path("kiwix/data/index/wikipedia.tum.zim.idx").is_dir());
    Ok(())
}

#[test]
fn failed_reinstall_keeps_the_installed_copy() -> Result<()> {
    let mut fx = Fixture::new()?;
    let site = fx.site("first")?;
    let zim = fx.zim("2015-08", "2015-08-10")?;
    fx.publish("alpha", &[("first", site), ("wikipedia.tum", zim)])?;
    fx.catalog.update_cache()?;
    fx.catalog.install_packages(&ids(&["first", "wikipedia.tum"]))?;
    let restarts = fx.services.restarts().len();

    let usb = fx.path("usb-stick");
    fs::create_dir_all(&usb)?;
    fs::write(usb.join("first-1"), b"not a zip archive")?;
    write_zip(
        &usb.join("wikipedia.tum-2015-08"),
        &[("data/content/other.zim", b"zim".as_slice())],
    )?;
    fx.catalog.add_package_cache(&usb);

    let report = fx.catalog.reinstall_packages(&ids(&["first", "wikipedia.tum"]))?;

    assert!(report.processed.is_empty());
    let failed: Vec<_> = report.failed.iter().map(|failed| failed.id.as_str()).collect();
    assert_eq!(failed, vec!["first", "wikipedia.tum"]);
    assert!(fx.catalog.installed().contains_key("first"));
    assert!(fx.catalog.installed().contains_key("wikipedia.tum"));
    assert_eq!(
        fs::read_to_string(fx.path("nginx/first/index.html"))?,
        "<h1>first</h1>"
    );
    assert!(fx.path("kiwix/data/content/wikipedia.tum.zim").is_file());
    assert!(fx.path("kiwix/data/index/wikipedia.tum.zim.idx").is_dir());
    assert!(fx.library()?.contains("path=\"data/content/wikipedia.tum.zim\""));
    assert_eq!(fx.services.restarts().len(), restarts);
    Ok(())
}

#[test]
fn one_broken_package_does_not_stop_the_batch() -> Result<()> {
    let mut fx = Fixture::new()?;
    let first = fx.site("first")?;
    let second = fx.site("second")?;
    let bogus = fx.path("bogus.zip");
    fs::write(&bogus, b"this is not a zip archive")?;
    let broken = artifact_metadata(&bogus, "static-site", "Broken", "1");
    fx.publish(
        "alpha",
        &[("first", first), ("broken", broken), ("second", second)],
    )?;
    fx.catalog.update_cache()?;

    let report = fx.catalog.install_packages(&ids(&["*"]))?;

    assert_eq!(report.processed, vec!["first", "second"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "broken");
    assert!(fx.catalog.installed().contains_key("first"));
    assert!(fx.catalog.installed().contains_key("second"));
    assert!(!fx.catalog.installed().contains_key("broken"));
    assert!(fx.path("nginx/first/index.html").is_file());
    assert_eq!(fx.services.restarts(), vec!["nginx"]);
    Ok(())
}

#[test]
fn checksum_mismatch_fails_only_that_package() -> Result<()> {
    let mut fx = Fixture::new()?;
    let good = fx.site("good")?;
    let mut tampered = fx.site("tampered")?;
    tampered.sha256sum = Some("0".repeat(64));
    fx.publish("alpha", &[("good", good), ("tampered", tampered)])?;
    fx.catalog.update_cache()?;

    let report = fx.catalog.install_packages(&ids(&["good", "tampered"]))?;

    assert_eq!(report.processed, vec!["good"]);
    assert!(report.failed[0].error.contains("sha256 mismatch"));
    assert!(!fx.path("cache/packages/tampered-1").exists());
    Ok(())
}

#[test]
fn corrupted_cache_entry_is_fetched_again() -> Result<()> {
    let mut fx = Fixture::new()?;
    let site = fx.site("site")?;
    fx.publish("alpha", &[("site", site)])?;
    fx.catalog.update_cache()?;
    let cached = fx.path("cache/packages/site-1");
    fs::create_dir_all(cached.parent().expect("parent"))?;
    fs::write(&cached, b"partial download")?;

    let report = fx.catalog.install_packages(&ids(&["site"]))?;

    assert_eq!(report.processed, vec!["site"]);
    assert_eq!(sha256(&cached), sha256(&fx.path("site.zip")));
    Ok(())
}

#[test]
fn extra_package_cache_is_used_without_a_url() -> Result<()> {
    let mut fx = Fixture::new()?;
    let mut site = fx.site("usb")?;
    site.url = None;
    fx.publish("alpha", &[("usb", site)])?;
    fx.catalog.update_cache()?;
    let usb = fx.path("usb-stick");
    fs::create_dir_all(&usb)?;
    fs::copy(fx.path("usb.zip"), usb.join("usb-1"))?;

    fx.catalog.add_package_cache(&usb);
    let report = fx.catalog.install_packages(&ids(&["usb"]))?;

    assert_eq!(report.processed, vec!["usb"]);
    assert!(fx.path("nginx/usb/index.html").is_file());
    assert!(!fx.path("cache/packages/usb-1").exists());
    Ok(())
}

#[test]
fn unknown_explicit_id_is_fatal_and_empty_glob_is_not() -> Result<()> {
    let mut fx = Fixture::new()?;
    let site = fx.site("site")?;
    fx.publish("alpha", &[("site", site)])?;
    fx.catalog.update_cache()?;

    let err = fx
        .catalog
        .install_packages(&ids(&["site", "missing"]))
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<CatalogError>(),
        Some(&CatalogError::NoSuchPackage {
            id: "missing".into()
        })
    );
    assert!(fx.catalog.installed().is_empty());

    let report = fx.catalog.install_packages(&ids(&["nothing.*"]))?;
    assert!(report.processed.is_empty() && report.failed.is_empty());

    let err = fx.catalog.remove_packages(&ids(&["site"])).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CatalogError>(),
        Some(CatalogError::NoSuchPackage { .. })
    ));
    Ok(())
}

#[test]
fn missing_type_is_fatal_before_anything_installs() -> Result<()> {
    let mut fx = Fixture::new()?;
    let site = fx.site("site")?;
    let untyped = PackageMetadata {
        kind: None,
        ..fx.site("untyped")?
    };
    fx.publish("alpha", &[("site", site), ("untyped", untyped)])?;
    fx.catalog.update_cache()?;

    let err = fx.catalog.install_packages(&ids(&["*"])).unwrap_err();
    assert_eq!(
        err.downcast_ref::<CatalogError>(),
        Some(&CatalogError::InvalidPackageMetadata {
            id: "untyped".into(),
            field: "type".into()
        })
    );
    assert!(fx.catalog.installed().is_empty());
    Ok(())
}

#[test]
fn media_bundle_documents_are_removed_exactly() -> Result<()> {
    let mut fx = Fixture::new()?;
    let zip = fx.path("medias.zip");
    write_media_package(&zip)?;
    let medias = artifact_metadata(&zip, "zipped-medias", "Test medias", "1");
    fx.publish("alpha", &[("test-media", medias)])?;
    fx.catalog.update_cache()?;
    let documents = fx.effects.documents();
    documents.create(crate::documents::NewDocument {
        title: "unrelated".into(),
        summary: String::new(),
        credits: String::new(),
        kind: shelf_domain::MediaKind::Text,
        lang: None,
        tags: vec!["tag1".into()],
        original: PathBuf::from("/srv/unrelated.txt"),
        preview: None,
        package_id: None,
    })?;

    fx.catalog.install_packages(&ids(&["test-media"]))?;
    for tag in ["tag1", "tag2", "tag3", "tag4"] {
        assert!(
            documents
                .with_tag(tag)?
                .iter()
                .any(|doc| doc.fields.package_id.as_deref() == Some("test-media")),
            "{tag}"
        );
    }
    assert_eq!(documents.for_package("test-media")?.len(), 3);

    fx.catalog.remove_packages(&ids(&["test-media"]))?;
    let remaining = documents.all()?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].fields.title, "unrelated");
    assert!(fx.services.restarts().is_empty());
    Ok(())
}

#[test]
fn installed_metadata_follows_remote_only_for_same_content() -> Result<()> {
    let mut fx = Fixture::new()?;
    let site = fx.site("site")?;
    fx.publish("alpha", &[("site", site.clone())])?;
    fx.catalog.update_cache()?;
    fx.catalog.install_packages(&ids(&["site"]))?;

    let renamed = PackageMetadata {
        name: Some("A better name".into()),
        description: Some("Now with a description".into()),
        ..site.clone()
    };
    fx.publish("alpha", &[("site", renamed.clone())])?;
    let report = fx.catalog.update_cache()?;
    assert_eq!(report.refreshed, vec!["site"]);
    assert_eq!(fx.catalog.installed()["site"], renamed);

    let bumped = PackageMetadata {
        name: Some("Next version".into()),
        version: Some("2".into()),
        ..site
    };
    fx.publish("alpha", &[("site", bumped)])?;
    let report = fx.catalog.update_cache()?;
    assert!(report.refreshed.is_empty());
    assert_eq!(fx.catalog.installed()["site"], renamed);
    Ok(())
}

#[test]
fn listings_accept_globs_and_expose_unhandled_types() -> Result<()> {
    let mut fx = Fixture::new()?;
    let site = fx.site("site.fr")?;
    let other = fx.site("site.en")?;
    let exotic = PackageMetadata {
        kind: Some("zipped-apk".into()),
        ..PackageMetadata::named("Android app")
    };
    fx.publish(
        "alpha",
        &[("site.fr", site), ("site.en", other), ("app", exotic)],
    )?;
    fx.catalog.update_cache()?;

    let names = |packages: Vec<Package>| -> Vec<String> {
        packages.iter().map(|p| p.id().to_string()).collect()
    };
    assert_eq!(names(fx.catalog.list_available(&[])), vec!["app", "site.en", "site.fr"]);
    assert_eq!(
        names(fx.catalog.list_available(&ids(&["site.*"]))),
        vec!["site.en", "site.fr"]
    );
    assert_eq!(names(fx.catalog.list_nothandled(&[])), vec!["app"]);
    assert!(fx.catalog.list_installed(&ids(&["nope"])).is_empty());

    fx.catalog.install_packages(&ids(&["*.fr"]))?;
    assert_eq!(names(fx.catalog.list_installed(&[])), vec!["site.fr"]);
    assert!(fx.catalog.list_upgradable(&[]).is_empty());
    Ok(())
}

#[test]
fn displayed_packages_track_installs_and_removals() -> Result<()> {
    let mut fx = Fixture::new()?;
    let a = fx.site("a")?;
    let b = fx.site("b")?;
    fx.publish("alpha", &[("a", a), ("b", b)])?;
    fx.catalog.update_cache()?;

    fx.catalog.install_packages(&ids(&["b", "a"]))?;
    assert_eq!(fx.displayed()?, json!(["b", "a"]));
    fx.catalog.remove_packages(&ids(&["b"]))?;
    assert_eq!(fx.displayed()?, json!(["a"]));
    Ok(())
}

#[test]
fn mutations_refuse_to_run_while_the_catalog_is_locked() -> Result<()> {
    let mut fx = Fixture::new()?;
    let _held = CatalogLock::acquire(fx.catalog.storage_root())?;

    let err = fx.catalog.update_cache().unwrap_err();
    assert!(err.downcast_ref::<crate::lock::CatalogBusy>().is_some());
    assert!(fx.catalog.list_available(&[]).is_empty());
    Ok(())
}
