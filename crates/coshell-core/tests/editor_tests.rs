//! Host filesystem editor integration tests
//!
//! Mirrors the sessioned editor suite: same command vocabulary, same
//! wording, but operating directly under a base directory.

use serde_json::json;

use coshell_core::tools::editor::StrReplaceEditor;
use coshell_core::tools::Tool;

fn fixture() -> (tempfile::TempDir, StrReplaceEditor) {
    let dir = tempfile::tempdir().unwrap();
    let editor = StrReplaceEditor::new(dir.path().to_path_buf());
    (dir, editor)
}

mod create_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_view() {
        let (_dir, editor) = fixture();

        let result = editor
            .execute(json!({
                "command": "create", "path": "t.txt",
                "file_text": "Hello World\nThis is a test\nAnother line"
            }))
            .await;
        assert!(!result.is_error, "{}", result.text_content());
        assert_eq!(result.text_content(), "File created successfully at t.txt");

        let result = editor
            .execute(json!({"command": "view", "path": "t.txt"}))
            .await;
        assert!(result.text_content().contains("1\tHello World"));
        assert!(result.text_content().contains("2\tThis is a test"));
    }

    #[tokio::test]
    async fn test_create_refuses_existing() {
        let (dir, editor) = fixture();
        std::fs::write(dir.path().join("taken.txt"), "already here").unwrap();

        let result = editor
            .execute(json!({"command": "create", "path": "taken.txt", "file_text": "no"}))
            .await;
        assert!(result.is_error);
        assert!(result
            .text_content()
            .contains("File already exists at: taken.txt"));
        // Untouched.
        let content = std::fs::read_to_string(dir.path().join("taken.txt")).unwrap();
        assert_eq!(content, "already here");
    }

    #[tokio::test]
    async fn test_create_nested_path() {
        let (dir, editor) = fixture();

        let result = editor
            .execute(json!({"command": "create", "path": "a/b/c.txt", "file_text": "deep"}))
            .await;
        assert!(!result.is_error, "{}", result.text_content());
        assert!(dir.path().join("a/b/c.txt").is_file());
    }
}

mod str_replace_tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_once() {
        let (dir, editor) = fixture();
        std::fs::write(dir.path().join("f.txt"), "Hello World\nsecond line").unwrap();

        let result = editor
            .execute(json!({
                "command": "str_replace", "path": "f.txt",
                "old_str": "Hello World", "new_str": "Hello Julia"
            }))
            .await;
        assert!(!result.is_error);
        assert_eq!(
            result.text_content(),
            "The file f.txt has been edited successfully."
        );

        let content = std::fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(content, "Hello Julia\nsecond line");
    }

    #[tokio::test]
    async fn test_ambiguity_lists_line_numbers() {
        let (dir, editor) = fixture();
        std::fs::write(dir.path().join("f.txt"), "foo bar\nfoo baz\nfoo qux").unwrap();

        let result = editor
            .execute(json!({
                "command": "str_replace", "path": "f.txt",
                "old_str": "foo", "new_str": "bar"
            }))
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("3 times"));
        assert!(result.text_content().contains("1, 2, 3"));

        // Unchanged on rejection.
        let content = std::fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(content, "foo bar\nfoo baz\nfoo qux");
    }

    #[tokio::test]
    async fn test_replace_all() {
        let (dir, editor) = fixture();
        std::fs::write(dir.path().join("f.txt"), "foo bar\nfoo baz\nfoo qux").unwrap();

        let result = editor
            .execute(json!({
                "command": "str_replace", "path": "f.txt",
                "old_str": "foo", "new_str": "bar", "replace_all": true
            }))
            .await;
        assert!(!result.is_error);
        assert!(result.text_content().contains("Made 3 replacements"));

        let content = std::fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(content, "bar bar\nbar baz\nbar qux");
    }

    #[tokio::test]
    async fn test_replace_preserves_unrelated_bytes() {
        let (dir, editor) = fixture();
        let original = "prefix\u{00e9} target suffix\r\nsecond";
        std::fs::write(dir.path().join("f.txt"), original).unwrap();

        let result = editor
            .execute(json!({
                "command": "str_replace", "path": "f.txt",
                "old_str": "target", "new_str": "changed"
            }))
            .await;
        assert!(!result.is_error);

        let content = std::fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(content, "prefix\u{00e9} changed suffix\r\nsecond");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (_dir, editor) = fixture();
        let result = editor
            .execute(json!({
                "command": "str_replace", "path": "ghost.txt",
                "old_str": "a", "new_str": "b"
            }))
            .await;
        assert!(result.is_error);
        assert!(result
            .text_content()
            .contains("The path ghost.txt does not exist."));
    }

    #[tokio::test]
    async fn test_identical_strings_rejected() {
        let (dir, editor) = fixture();
        std::fs::write(dir.path().join("f.txt"), "same").unwrap();

        let result = editor
            .execute(json!({
                "command": "str_replace", "path": "f.txt",
                "old_str": "same", "new_str": "same"
            }))
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("must be different"));
    }
}

mod view_tests {
    use super::*;

    fn write_twenty_lines(dir: &tempfile::TempDir) {
        let content: String = (1..=20).map(|i| format!("line{i}\n")).collect();
        std::fs::write(dir.path().join("twenty.txt"), content).unwrap();
    }

    #[tokio::test]
    async fn test_view_range_window() {
        let (dir, editor) = fixture();
        write_twenty_lines(&dir);

        let result = editor
            .execute(json!({"command": "view", "path": "twenty.txt", "view_range": [18, -1]}))
            .await;
        let text = result.text_content();
        assert!(text.contains("18\tline18"));
        assert!(text.contains("20\tline20"));
        assert!(!text.contains("17\tline17"));

        let result = editor
            .execute(json!({"command": "view", "path": "twenty.txt", "view_range": [15, 15]}))
            .await;
        let text = result.text_content();
        assert!(text.contains("15\tline15"));
        assert!(!text.contains("16\tline16"));
    }

    #[tokio::test]
    async fn test_view_range_header_reports_total() {
        let (dir, editor) = fixture();
        write_twenty_lines(&dir);

        let result = editor
            .execute(json!({"command": "view", "path": "twenty.txt", "view_range": [2, 4]}))
            .await;
        assert!(result.text_content().contains("lines 2-4 of 20"));
    }

    #[tokio::test]
    async fn test_view_range_validation() {
        let (dir, editor) = fixture();
        write_twenty_lines(&dir);

        let cases = [
            (json!([0, 5]), "should be within the range"),
            (json!([1, 50]), "should be smaller than the number of lines"),
            (json!([10, 5]), "should be larger or equal than its first"),
            (json!([5]), "should be a list of two integers"),
        ];
        for (range, expected) in cases {
            let result = editor
                .execute(json!({"command": "view", "path": "twenty.txt", "view_range": range}))
                .await;
            assert!(result.is_error);
            assert!(result.text_content().contains(expected), "{}", result.text_content());
        }
    }

    #[tokio::test]
    async fn test_view_directory() {
        let (dir, editor) = fixture();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), "x").unwrap();
        std::fs::write(dir.path().join("top.txt"), "y").unwrap();
        std::fs::write(dir.path().join(".hidden"), "z").unwrap();

        let result = editor.execute(json!({"command": "view", "path": "."})).await;
        assert!(!result.is_error, "{}", result.text_content());
        let text = result.text_content();
        assert!(text.contains("top.txt"));
        assert!(text.contains("inner.txt"));
        assert!(!text.contains(".hidden"));

        let result = editor
            .execute(json!({"command": "view", "path": ".", "view_range": [1, 2]}))
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_unknown_command_and_missing_params() {
        let (_dir, editor) = fixture();

        let result = editor
            .execute(json!({"command": "insert", "path": "x"}))
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("Unrecognized command insert"));

        let result = editor.execute(json!({"command": "view"})).await;
        assert!(result.is_error);
        assert!(result.text_content().contains("`path` is required"));
    }
}
