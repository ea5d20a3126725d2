// SPDX-License-Identifier: MIT

use super::*;
use tempfile::tempdir;

#[test]
fn section_paths_are_sharded_by_first_two_hex_chars() {
    let dir = tempdir().unwrap();
    let repo = ManifestRepository::new(dir.path());
    let section = repo.section("fdde59862785f9f0ad6e661b9b5746b7");

    assert_eq!(section.manifest_section_dir(), dir.path().join("fd"));
    assert_eq!(
        section.manifest_path("fdde59862785f9f0ad6e661b9b5746b7"),
        dir.path().join("fd").join("fdde59862785f9f0ad6e661b9b5746b7.json")
    );
}

#[test]
fn includes_content_hash_is_stable() {
    let h = |v: &[&str]| {
        ManifestRepository::includes_content_hash_for_hashes(
            &v.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
    };

    assert_eq!(h(&[]), h(&[]));
    assert_eq!(h(&["d88be7edbf"]), h(&["d88be7edbf"]));
    assert_eq!(
        h(&["d88be7edbf", "f6c8bd5733"]),
        h(&["d88be7edbf", "f6c8bd5733"])
    );

    assert_ne!(h(&[]), h(&["d88be7edbf"]));
}

#[test]
fn includes_content_hash_sorts_before_hashing_so_order_does_not_matter() {
    let h = |v: &[&str]| {
        ManifestRepository::includes_content_hash_for_hashes(
            &v.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
    };

    assert_eq!(
        h(&["d88be7edbf", "f6c8bd5733"]),
        h(&["f6c8bd5733", "d88be7edbf"])
    );
}

#[test]
fn includes_content_hash_distinguishes_element_boundaries() {
    let h = |v: &[&str]| {
        ManifestRepository::includes_content_hash_for_hashes(
            &v.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
    };

    assert_ne!(h(&["", "d88be7edbf"]), h(&["d88be7edbf", ""]));
    assert_ne!(h(&["d88be", "7edbf"]), h(&["d88b", "e7edbf"]));
}

fn sample_entry(object_hash: &str) -> ManifestEntry {
    ManifestEntry::new(
        vec![r"somepath\myinclude.h".to_string()],
        "fdde59862785f9f0ad6e661b9b5746b7".to_string(),
        object_hash.to_string(),
    )
}

#[test]
fn store_and_get_manifest_round_trips() {
    let dir = tempdir().unwrap();
    let repo = ManifestRepository::new(dir.path());

    let hash = "8a33738d88be7edbacef48e262bbb5bc";
    let entry = sample_entry("a649723940dc975ebd17167d29a532f8");
    let manifest = Manifest::new(vec![entry.clone()]);

    repo.section(hash).set_manifest(hash, &manifest).unwrap();

    let retrieved = repo.section(hash).get_manifest(hash).unwrap();
    assert_eq!(retrieved.entries()[0], entry);
}

#[test]
fn nonexistent_manifest_is_none() {
    let dir = tempdir().unwrap();
    let repo = ManifestRepository::new(dir.path());
    assert!(repo
        .section("ffffffffffffffffffffffffffffffff")
        .get_manifest("ffffffffffffffffffffffffffffffff")
        .is_none());
}

#[test]
fn broken_manifest_file_is_none() {
    let dir = tempdir().unwrap();
    let repo = ManifestRepository::new(dir.path());
    let section = repo.section("aabbccddaabbccddaabbccddaabbccdd");
    std::fs::create_dir_all(section.manifest_section_dir()).unwrap();
    std::fs::write(
        section.manifest_path("aabbccddaabbccddaabbccddaabbccdd"),
        b"not valid json",
    )
    .unwrap();

    assert!(section
        .get_manifest("aabbccddaabbccddaabbccddaabbccdd")
        .is_none());
}

#[test]
fn version_mismatch_manifest_is_none() {
    let dir = tempdir().unwrap();
    let repo = ManifestRepository::new(dir.path());
    let hash = "0011223344556677889900112233445566";
    let section = repo.section(hash);
    std::fs::create_dir_all(section.manifest_section_dir()).unwrap();
    let stale = serde_json::json!({"version": 999, "entries": []});
    std::fs::write(section.manifest_path(hash), stale.to_string()).unwrap();

    assert!(section.get_manifest(hash).is_none());
}

#[test]
fn touch_moves_entry_to_mru_position() {
    let mut manifest = Manifest::new(vec![
        sample_entry("first"),
        sample_entry("second"),
        sample_entry("third"),
    ]);
    manifest.touch(2);
    assert_eq!(manifest.entries()[0].object_hash, "third");
}

#[test]
fn insert_mru_evicts_oldest_when_full() {
    let mut manifest = Manifest::default();
    for i in 0..100 {
        manifest.insert_mru(sample_entry(&format!("obj{i}")));
    }
    assert_eq!(manifest.entries().len(), 100);
    assert_eq!(manifest.entries()[0].object_hash, "obj99");

    manifest.insert_mru(sample_entry("overflow"));
    assert_eq!(manifest.entries().len(), 100);
    assert_eq!(manifest.entries()[0].object_hash, "overflow");
    assert!(manifest.entries().iter().all(|e| e.object_hash != "obj0"));
}

#[test]
fn clean_retains_only_what_fits_the_budget() {
    let dir = tempdir().unwrap();
    let repo = ManifestRepository::new(dir.path());

    let hash1 = "8a33738d88be7edbacef48e262bbb5bc";
    let hash2 = "0623305942d216c165970948424ae7d1";
    repo.section(hash1)
        .set_manifest(hash1, &Manifest::new(vec![sample_entry("a")]))
        .unwrap();
    repo.section(hash2)
        .set_manifest(hash2, &Manifest::new(vec![sample_entry("b"), sample_entry("c")]))
        .unwrap();

    let retained = repo.clean(240).unwrap();
    assert!(retained <= 240);
    assert_eq!(dir_size(dir.path()), retained);
}

#[test]
fn clean_to_zero_removes_everything() {
    let dir = tempdir().unwrap();
    let repo = ManifestRepository::new(dir.path());
    let hash = "8a33738d88be7edbacef48e262bbb5bc";
    repo.section(hash)
        .set_manifest(hash, &Manifest::new(vec![sample_entry("a")]))
        .unwrap();

    let retained = repo.clean(0).unwrap();
    assert_eq!(retained, 0);
    assert_eq!(dir_size(dir.path()), 0);
}

#[test]
fn manifest_hash_ignores_mp_flags() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("main.cpp");
    std::fs::write(&source, "int main() {}").unwrap();

    let argv = vec!["/c".to_string(), "/MP4".to_string(), "main.cpp".to_string()];
    let argv_no_mp = vec!["/c".to_string(), "main.cpp".to_string()];

    let with_mp = manifest_hash(&source, &argv, "compiler-id", None).unwrap();
    let without_mp = manifest_hash(&source, &argv_no_mp, "compiler-id", None).unwrap();
    assert_eq!(with_mp, without_mp);
}

#[test]
fn manifest_hash_changes_with_compiler_identity() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("main.cpp");
    std::fs::write(&source, "int main() {}").unwrap();
    let argv = vec!["/c".to_string(), "main.cpp".to_string()];

    let a = manifest_hash(&source, &argv, "id-a", None).unwrap();
    let b = manifest_hash(&source, &argv, "id-b", None).unwrap();
    assert_ne!(a, b);
}

#[test]
fn manifest_hash_folds_base_dir_for_portability() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    std::fs::write(dir_a.path().join("main.cpp"), "int main() {}").unwrap();
    std::fs::write(dir_b.path().join("main.cpp"), "int main() {}").unwrap();

    let argv_a = vec![
        "/c".to_string(),
        format!("/I{}", dir_a.path().join("include").display()),
        "main.cpp".to_string(),
    ];
    let argv_b = vec![
        "/c".to_string(),
        format!("/I{}", dir_b.path().join("include").display()),
        "main.cpp".to_string(),
    ];

    let hash_a = manifest_hash(
        &dir_a.path().join("main.cpp"),
        &argv_a,
        "compiler-id",
        Some(dir_a.path()),
    )
    .unwrap();
    let hash_b = manifest_hash(
        &dir_b.path().join("main.cpp"),
        &argv_b,
        "compiler-id",
        Some(dir_b.path()),
    )
    .unwrap();
    assert_eq!(hash_a, hash_b);
}

#[test]
fn entry_key_is_sensitive_to_both_inputs() {
    let a = entry_key("manifest-1", "includes-1");
    let b = entry_key("manifest-2", "includes-1");
    let c = entry_key("manifest-1", "includes-2");
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(a, entry_key("manifest-1", "includes-1"));
}

fn dir_size(root: &std::path::Path) -> u64 {
    let mut size = 0;
    if let Ok(shards) = std::fs::read_dir(root) {
        for shard in shards.flatten() {
            if let Ok(entries) = std::fs::read_dir(shard.path()) {
                for entry in entries.flatten() {
                    size += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }
    }
    size
}
