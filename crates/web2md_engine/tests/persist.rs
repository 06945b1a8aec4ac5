use std::fs;

use web2md_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out").join("nested");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn output_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("file");
    fs::write(&file_path, "x").unwrap();
    assert!(matches!(
        ensure_output_dir(&file_path),
        Err(PersistError::OutputDir(_))
    ));
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("doc.md", "hello").unwrap();
    assert_eq!(first.file_name().unwrap(), "doc.md");
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");

    let second = writer.write("doc.md", "world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
}

#[test]
fn nested_relative_paths_create_parent_dirs() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let path = writer.write("media/cat_48d9.png", [0x89u8, 0x50, 0x4e, 0x47]).unwrap();
    assert_eq!(path, temp.path().join("media").join("cat_48d9.png"));
    assert_eq!(fs::read(&path).unwrap(), vec![0x89, 0x50, 0x4e, 0x47]);
}

#[test]
fn paths_escaping_the_root_are_rejected() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("bundle");
    let writer = AtomicFileWriter::new(root.clone());

    for name in ["../evil.md", "media/../../evil.md", "/etc/evil.md", ""] {
        assert!(
            matches!(writer.write(name, "x"), Err(PersistError::InvalidName(_))),
            "{name:?} should be rejected"
        );
    }
    assert!(!temp.path().join("evil.md").exists());
    assert!(!root.exists());
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("doc.md", "data");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("doc.md").exists());
}
