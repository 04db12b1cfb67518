//! Dataset and asset loading from files.

use core_content::{
    AssetProvider, ContentError, ContentProvider, ROOT_ID, RawAssetDir, TomlContent,
};
use core_render::Rgb565;
use embedded_graphics::pixelcolor::RgbColor;
use pretty_assertions::assert_eq;

const DATASET: &str = r#"
[[record]]
id = 0
title = "Guide"
children = [1, 2]

[[record]]
id = 1
title = "Birds"
body = "Common species of the valley."
children = [3]

[[record]]
id = 2
title = "Plants"

[[record]]
id = 3
title = "Heron"
body = "Grey heron, seen along the river."
"#;

#[test]
fn toml_dataset_round_trip_through_provider() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guide.toml");
    std::fs::write(&path, DATASET).unwrap();

    let content = TomlContent::load(&path).unwrap();
    assert_eq!(content.len(), 4);
    let root = content.lookup(ROOT_ID).unwrap();
    assert_eq!(root.title, "Guide");
    let heron = content.lookup(3).unwrap();
    assert_eq!(heron.parent, Some(1));
    assert!(heron.is_leaf());
    let batch = content.lookup_batch(&[2, 1]).unwrap();
    assert_eq!(batch[0].title, "Plants");
    assert_eq!(batch[1].body, "Common species of the valley.");
}

#[test]
fn toml_errors_are_typed() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(TomlContent::load(&missing), Err(ContentError::Read { .. })));

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "[[record]]\nid = \"zero\"\n").unwrap();
    assert!(matches!(TomlContent::load(&broken), Err(ContentError::Parse { .. })));

    let rootless = dir.path().join("rootless.toml");
    std::fs::write(&rootless, "[[record]]\nid = 4\ntitle = \"x\"\n").unwrap();
    assert!(matches!(TomlContent::load(&rootless), Err(ContentError::MissingRoot)));
}

#[test]
fn raw_asset_dir_decodes_little_endian_rgb565() {
    let dir = tempfile::tempdir().unwrap();
    // 2x1: pure red then pure blue.
    std::fs::write(dir.path().join("flag_2x1.rgb565"), [0x00, 0xF8, 0x1F, 0x00]).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let assets = RawAssetDir::open(dir.path()).unwrap();
    assert_eq!(assets.len(), 1);
    let flag = assets.asset("flag").unwrap();
    assert_eq!((flag.width(), flag.height()), (2, 1));
    assert_eq!(flag.pixel(0, 0), Some(Rgb565::RED));
    assert_eq!(flag.pixel(1, 0), Some(Rgb565::BLUE));
}

#[test]
fn raw_asset_with_wrong_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad_4x4.rgb565"), [0u8; 6]).unwrap();
    assert!(matches!(RawAssetDir::open(dir.path()), Err(ContentError::Asset { .. })));
}
