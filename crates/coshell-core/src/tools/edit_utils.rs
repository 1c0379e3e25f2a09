//! Shared helpers for the string-replacement editors
//!
//! Both the host editor and the sessioned editor funnel their
//! view-range validation, occurrence scanning, and replacement through
//! these functions so error wording and numbering stay identical.
//!
//! Occurrence scanning and replacement operate on raw bytes so file
//! content that is not valid UTF-8 survives an edit untouched outside
//! the replaced span.

use serde_json::Value;

/// A validated 1-based inclusive line range. `end` has been resolved:
/// a requested `-1` already became the last line of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRange {
    pub start: usize,
    pub end: usize,
}

/// Validate a raw `view_range` parameter against the file's line count.
///
/// Error messages are user-facing and must stay distinct per failure
/// mode; callers return them verbatim inside the tool envelope.
pub fn parse_view_range(raw: &Value, total_lines: usize) -> Result<ViewRange, String> {
    let items = match raw.as_array() {
        Some(items) if items.len() == 2 => items,
        _ => {
            return Err(format!(
                "Invalid `view_range`: {raw}. It should be a list of two integers."
            ))
        }
    };

    let (start, end) = match (items[0].as_i64(), items[1].as_i64()) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return Err(format!(
                "Invalid `view_range`: {raw}. It should be a list of two integers."
            ))
        }
    };

    if start < 1 || start as usize > total_lines {
        return Err(format!(
            "Invalid `view_range`: {raw}. Its first element `{start}` should be within \
             the range of lines of the file: [1, {total_lines}]"
        ));
    }

    if end == -1 {
        return Ok(ViewRange {
            start: start as usize,
            end: total_lines,
        });
    }

    if end as usize > total_lines {
        return Err(format!(
            "Invalid `view_range`: {raw}. Its second element `{end}` should be smaller \
             than the number of lines in the file: `{total_lines}`"
        ));
    }

    if end < start {
        return Err(format!(
            "Invalid `view_range`: {raw}. Its second element `{end}` should be larger \
             or equal than its first element `{start}`"
        ));
    }

    Ok(ViewRange {
        start: start as usize,
        end: end as usize,
    })
}

/// Byte offsets of every non-overlapping occurrence of `needle`.
pub fn find_occurrences(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut offsets = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return offsets;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if &haystack[i..i + needle.len()] == needle {
            offsets.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    offsets
}

/// 1-based line numbers for the given byte offsets (newlines preceding
/// the offset, plus one).
pub fn occurrence_lines(content: &[u8], offsets: &[usize]) -> Vec<usize> {
    offsets
        .iter()
        .map(|&offset| content[..offset].iter().filter(|&&b| b == b'\n').count() + 1)
        .collect()
}

/// Replace the occurrence starting at `offset`, leaving every other
/// byte untouched.
pub fn replace_at(content: &[u8], offset: usize, old_len: usize, new: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(content.len() - old_len + new.len());
    result.extend_from_slice(&content[..offset]);
    result.extend_from_slice(new);
    result.extend_from_slice(&content[offset + old_len..]);
    result
}

/// Replace every non-overlapping occurrence of `needle`.
pub fn replace_all(content: &[u8], needle: &[u8], new: &[u8]) -> Vec<u8> {
    let offsets = find_occurrences(content, needle);
    let mut result = Vec::with_capacity(content.len());
    let mut cursor = 0;
    for offset in offsets {
        result.extend_from_slice(&content[cursor..offset]);
        result.extend_from_slice(new);
        cursor = offset + needle.len();
    }
    result.extend_from_slice(&content[cursor..]);
    result
}

/// Render lines as `N\tline`, numbering from `start_line`.
pub fn number_lines(text: &str, start_line: usize) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}\t{}", start_line + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}

// User-facing message templates. Both editors return these verbatim so
// their wording never drifts apart.

pub fn path_not_found_message(path: &str) -> String {
    format!("The path {path} does not exist.")
}

pub fn not_found_message(old_str: &str, path: &str) -> String {
    format!("No replacement was performed, old_str `{old_str}` did not appear verbatim in {path}.")
}

pub fn ambiguous_message(old_str: &str, path: &str, lines: &[usize]) -> String {
    let listed = lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "No replacement was performed. old_str `{old_str}` appeared {} times in {path}, \
         on lines: {listed}. Provide a more unique old_str or set replace_all to true.",
        lines.len()
    )
}

pub fn edited_message(path: &str, replacements: usize) -> String {
    if replacements > 1 {
        format!("The file {path} has been edited successfully. Made {replacements} replacements.")
    } else {
        format!("The file {path} has been edited successfully.")
    }
}

pub fn already_exists_message(path: &str) -> String {
    format!("File already exists at: {path}. Cannot overwrite files using command `create`.")
}

pub fn created_message(path: &str) -> String {
    format!("File created successfully at {path}")
}

pub fn view_header(path: &str) -> String {
    format!("Here's the result of running `cat -n` on {path}:")
}

pub fn view_range_header(path: &str, range: ViewRange, total_lines: usize) -> String {
    format!(
        "Here's the result of running `cat -n` on {path} (lines {}-{} of {total_lines}):",
        range.start, range.end
    )
}

pub fn directory_header(path: &str) -> String {
    format!(
        "Here's the files and directories up to 2 levels deep in {path}, \
         excluding hidden items:"
    )
}

pub fn unrecognized_command_message(command: &str) -> String {
    format!(
        "Unrecognized command {command}. The allowed commands for this tool are: \
         view, create, str_replace"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_range_accepts_full_span() {
        let range = parse_view_range(&json!([1, 20]), 20).unwrap();
        assert_eq!(range, ViewRange { start: 1, end: 20 });
    }

    #[test]
    fn test_range_minus_one_means_eof() {
        let range = parse_view_range(&json!([18, -1]), 20).unwrap();
        assert_eq!(range, ViewRange { start: 18, end: 20 });
    }

    #[test]
    fn test_range_single_line() {
        let range = parse_view_range(&json!([15, 15]), 20).unwrap();
        assert_eq!(range, ViewRange { start: 15, end: 15 });
    }

    #[test]
    fn test_range_errors_are_distinct() {
        let not_a_pair = parse_view_range(&json!([5]), 20).unwrap_err();
        assert!(not_a_pair.contains("should be a list of two integers"));

        let start_oob = parse_view_range(&json!([0, 5]), 20).unwrap_err();
        assert!(start_oob.contains("should be within the range"));

        let end_oob = parse_view_range(&json!([1, 50]), 20).unwrap_err();
        assert!(end_oob.contains("should be smaller than the number of lines"));

        let inverted = parse_view_range(&json!([10, 5]), 20).unwrap_err();
        assert!(inverted.contains("should be larger or equal than its first"));
    }

    #[test]
    fn test_find_occurrences_non_overlapping() {
        assert_eq!(find_occurrences(b"aaaa", b"aa"), vec![0, 2]);
        assert_eq!(find_occurrences(b"foo bar foo", b"foo"), vec![0, 8]);
        assert!(find_occurrences(b"abc", b"xyz").is_empty());
        assert!(find_occurrences(b"abc", b"").is_empty());
    }

    #[test]
    fn test_occurrence_lines() {
        let content = b"foo bar\nfoo baz\nfoo qux";
        let offsets = find_occurrences(content, b"foo");
        assert_eq!(occurrence_lines(content, &offsets), vec![1, 2, 3]);
    }

    #[test]
    fn test_replace_at_preserves_other_bytes() {
        let content = b"one two one";
        let replaced = replace_at(content, 8, 3, b"three");
        assert_eq!(replaced, b"one two three");
    }

    #[test]
    fn test_replace_all() {
        let replaced = replace_all(b"foo bar\nfoo baz", b"foo", b"qux");
        assert_eq!(replaced, b"qux bar\nqux baz");
    }

    #[test]
    fn test_number_lines() {
        assert_eq!(number_lines("a\nb", 1), "1\ta\n2\tb");
        assert_eq!(number_lines("x", 15), "15\tx");
    }
}
