use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 写入的字节数
    Written(usize),
    /// 内容为空，没有写入文件
    Empty,
    /// 结果文件已存在，没有覆盖
    Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    /// 只在文件不存在时创建
    CreateNew,
}

/// 两空格缩进，非 ASCII 字符转义为 `\uXXXX`
struct AsciiFormatter<'a>(PrettyFormatter<'a>);

impl Formatter for AsciiFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// 序列化为缩进的 JSON，输出只包含 ASCII 字符
pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buffer = Vec::new();
    let formatter = AsciiFormatter(PrettyFormatter::with_indent(b"  "));
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buffer)?)
}

/// 先写入同目录下的临时文件再重命名，中途退出不会留下不完整的结果文件。
/// 内容为空时不写入。
pub fn write_rendered(text: &str, path: &Path, mode: WriteMode) -> Result<WriteOutcome> {
    if text.is_empty() {
        return Ok(WriteOutcome::Empty);
    }

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    file.write_all(text.as_bytes())
        .and_then(|_| file.as_file().sync_all())
        .with_context(|| format!("failed to write {}", path.display()))?;

    match mode {
        WriteMode::Overwrite => {
            file.persist(path).with_context(|| format!("failed to write {}", path.display()))?;
        }
        WriteMode::CreateNew => match file.persist_noclobber(path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(WriteOutcome::Exists);
            }
            Err(e) => {
                return Err(e.error).with_context(|| format!("failed to write {}", path.display()));
            }
        },
    }
    Ok(WriteOutcome::Written(text.len()))
}

/// 将标注结果写入结果文件
pub fn write_output<T: Serialize + ?Sized>(
    value: &T,
    path: &Path,
    mode: WriteMode,
) -> Result<WriteOutcome> {
    let text = render(value)?;
    write_rendered(&text, path, mode)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn render_escapes_non_ascii() {
        let text = render(&json!({ "description": "Zürich 🗼" })).unwrap();
        assert_eq!(text, "{\n  \"description\": \"Z\\u00fcrich \\ud83d\\uddfc\"\n}");
        assert!(text.is_ascii());

        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["description"], "Zürich 🗼");
    }

    #[test]
    fn render_uses_two_space_indent() {
        let text = render(&json!({ "a": [1, "x\"y"], "b": {} })).unwrap();
        assert_eq!(text, "{\n  \"a\": [\n    1,\n    \"x\\\"y\"\n  ],\n  \"b\": {}\n}");
    }

    #[test]
    fn empty_text_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg.json");
        let outcome = write_rendered("", &path, WriteMode::CreateNew).unwrap();
        assert_eq!(outcome, WriteOutcome::Empty);
        assert!(!path.exists());
    }

    #[test]
    fn overwrite_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "old content that is longer").unwrap();

        let outcome = write_rendered("{}", &path, WriteMode::Overwrite).unwrap();
        assert_eq!(outcome, WriteOutcome::Written(2));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn create_new_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg.json");
        std::fs::write(&path, "keep").unwrap();

        let outcome = write_rendered("{}", &path, WriteMode::CreateNew).unwrap();
        assert_eq!(outcome, WriteOutcome::Exists);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep");
        // 临时文件已被清理
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn writes_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let value = json!({ "responses": [{ "labelAnnotations": [{ "description": "Café" }] }] });

        let outcome = write_output(&value, &path, WriteMode::CreateNew).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(outcome, WriteOutcome::Written(text.len()));
        assert!(text.contains("Caf\\u00e9"));
        assert_eq!(serde_json::from_str::<serde_json::Value>(&text).unwrap(), value);
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        assert!(write_output(&json!({}), &path, WriteMode::Overwrite).is_err());
    }
}
