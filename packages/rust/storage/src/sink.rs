//! The [`Sink`] contract and the file sinks (JSON Lines, CSV).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hanjadeck_shared::{HanjaDeckError, Record, Result};
use tokio::io::AsyncWriteExt;

/// Destination for the records of a pipeline run.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Write `records`, each holding the fields of `field_order` in that order.
    async fn write(&self, field_order: &[String], records: &[Record]) -> Result<()>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Appends one JSON object per record to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for JsonLinesSink {
    async fn write(&self, field_order: &[String], records: &[Record]) -> Result<()> {
        let mut buf = String::new();
        for record in records {
            let line = serde_json::to_string(&record.select(field_order))
                .map_err(|e| HanjaDeckError::parse(e.to_string()))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        append(&self.path, buf.as_bytes()).await?;
        tracing::info!(path = %self.path.display(), records = records.len(), "records written");
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// Writes records as CSV rows, columns in field order.
///
/// The header row is written only when the file is new or empty; later runs
/// append rows. List values are joined with `,` and missing fields are empty.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(field_order: &[String], records: &[Record], header: bool) -> Result<Vec<u8>> {
        let csv_err = |e: csv::Error| HanjaDeckError::Storage(format!("csv: {e}"));

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if header {
            writer.write_record(field_order).map_err(csv_err)?;
        }
        for record in records {
            let row = field_order
                .iter()
                .map(|key| record.get(key).map(|value| value.render()).unwrap_or_default());
            writer.write_record(row).map_err(csv_err)?;
        }
        writer
            .into_inner()
            .map_err(|e| HanjaDeckError::Storage(format!("csv: {e}")))
    }
}

#[async_trait]
impl Sink for CsvSink {
    async fn write(&self, field_order: &[String], records: &[Record]) -> Result<()> {
        let is_new = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(HanjaDeckError::io(&self.path, e)),
        };

        let bytes = Self::encode(field_order, records, is_new)?;
        append(&self.path, &bytes).await?;

        tracing::info!(path = %self.path.display(), records = records.len(), "records written");
        Ok(())
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// Append `bytes` to `path`, creating the file and its parent directories.
async fn append(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HanjaDeckError::io(parent, e))?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| HanjaDeckError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| HanjaDeckError::io(path, e))?;
    file.flush().await.map_err(|e| HanjaDeckError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn appends_records_in_field_order() {
        let dir = std::env::temp_dir().join(format!("hd_jsonl_{}", Uuid::now_v7()));
        let sink = JsonLinesSink::new(dir.join("nested/out.jsonl"));
        let order = vec!["hanja".to_string(), "meaning".to_string()];
        let record: Record = [("meaning", "나무"), ("noise", "x"), ("hanja", "木")]
            .into_iter()
            .collect();

        sink.write(&order, &[record.clone()]).await.expect("first write");
        sink.write(&order, &[record]).await.expect("second write");

        let text = std::fs::read_to_string(sink.path()).expect("read back");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"hanja":"木","meaning":"나무"}"#);
    }

    #[tokio::test]
    async fn csv_header_is_written_once() {
        let dir = std::env::temp_dir().join(format!("hd_csv_{}", Uuid::now_v7()));
        let sink = CsvSink::new(dir.join("deck.csv"));
        let order = vec!["hanja".to_string(), "words".to_string(), "note".to_string()];
        let record: Record = [
            ("words", hanjadeck_shared::FieldValue::from(vec!["나무", "수목"])),
            ("hanja", hanjadeck_shared::FieldValue::from("木")),
        ]
        .into_iter()
        .collect();

        sink.write(&order, &[record.clone()]).await.expect("first write");
        sink.write(&order, &[record]).await.expect("second write");

        let text = std::fs::read_to_string(sink.path()).expect("read back");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["hanja,words,note", "木,\"나무,수목\",", "木,\"나무,수목\","]);
    }
}
