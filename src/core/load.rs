use crate::core::engine::{SyncReport, TableRows};
use crate::core::{ConfigProvider, Storage};
use crate::utils::error::{Result, SyncError};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const ZIP_FILENAME: &str = "sync_output.zip";
pub const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" | "jsonl" => Ok(OutputFormat::Json),
            other => Err(SyncError::InvalidConfigValueError {
                field: "formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: csv, json".to_string(),
            }),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "jsonl",
        }
    }
}

/// 把同步結果寫到 Storage：每個表格一個檔案，加上 manifest
pub struct RowWriter<S: Storage> {
    storage: S,
    formats: Vec<OutputFormat>,
    zip: bool,
}

impl<S: Storage> RowWriter<S> {
    pub fn new(storage: S, formats: &[String], zip: bool) -> Result<Self> {
        let formats = formats
            .iter()
            .map(|f| OutputFormat::parse(f))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            storage,
            formats,
            zip,
        })
    }

    /// 依設定的輸出格式與 zip 選項建立
    pub fn from_config<C: ConfigProvider>(storage: S, config: &C) -> Result<Self> {
        Self::new(storage, config.formats(), config.zip_output())
    }

    /// Returns the names of the files written to storage.
    pub async fn write(&self, report: &SyncReport) -> Result<Vec<String>> {
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        for (name, table) in &report.tables {
            for format in &self.formats {
                let data = match format {
                    OutputFormat::Csv => render_csv(table)?,
                    OutputFormat::Json => render_jsonl(table)?,
                };
                files.push((format!("{}.{}", name, format.extension()), data));
            }
        }
        files.push((MANIFEST_FILENAME.to_string(), render_manifest(report)?));

        if self.zip {
            tracing::debug!("Creating ZIP file with {} files", files.len());
            let zip_data = bundle(&files)?;
            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage.write_file(ZIP_FILENAME, &zip_data).await?;
            return Ok(vec![ZIP_FILENAME.to_string()]);
        }

        let mut written = Vec::with_capacity(files.len());
        for (path, data) in files {
            tracing::debug!("Writing {} ({} bytes)", path, data.len());
            self.storage.write_file(&path, &data).await?;
            written.push(path);
        }
        Ok(written)
    }
}

fn render_csv(table: &TableRows) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.values.iter().map(|v| v.to_text()))?;
    }
    writer
        .into_inner()
        .map_err(|e| SyncError::IoError(e.into_error()))
}

fn render_jsonl(table: &TableRows) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for row in &table.rows {
        let object: serde_json::Map<String, serde_json::Value> = table
            .columns
            .iter()
            .cloned()
            .zip(row.values.iter().map(|v| v.to_json()))
            .collect();
        serde_json::to_writer(&mut out, &object)?;
        out.push(b'\n');
    }
    Ok(out)
}

fn render_manifest(report: &SyncReport) -> Result<Vec<u8>> {
    let row_counts: serde_json::Map<String, serde_json::Value> = report
        .tables
        .iter()
        .map(|(name, table)| (name.clone(), serde_json::Value::from(table.rows.len())))
        .collect();

    let manifest = serde_json::json!({
        "started_at": report.started_at,
        "finished_at": report.finished_at,
        "row_counts": row_counts,
        "resolution_issues": report.resolution_issues,
        "fetch_issues": report.fetch_issues,
    });
    Ok(serde_json::to_vec_pretty(&manifest)?)
}

fn bundle(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{CellValue, Row};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                SyncError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    fn report() -> SyncReport {
        let mut report = SyncReport::new(&[]);
        report.tables.insert(
            "googleworkspace_users".to_string(),
            TableRows {
                columns: vec![
                    "id".to_string(),
                    "first_name".to_string(),
                    "organizations".to_string(),
                ],
                rows: vec![
                    Row {
                        values: vec![
                            CellValue::String("u1".to_string()),
                            CellValue::String("Ann".to_string()),
                            CellValue::Json("[{\"title\":\"Eng\"}]".to_string()),
                        ],
                    },
                    Row {
                        values: vec![
                            CellValue::String("u2".to_string()),
                            CellValue::String("Bo".to_string()),
                            CellValue::Null,
                        ],
                    },
                ],
            },
        );
        report
    }

    #[tokio::test]
    async fn test_writes_csv_and_manifest() {
        let storage = MockStorage::new();
        let writer = RowWriter::new(storage.clone(), &["csv".to_string()], false).unwrap();

        let written = writer.write(&report()).await.unwrap();

        assert_eq!(written, vec!["googleworkspace_users.csv", "manifest.json"]);
        let csv = String::from_utf8(storage.get_file("googleworkspace_users.csv").await.unwrap())
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,first_name,organizations");
        assert_eq!(lines[1], "u1,Ann,\"[{\"\"title\"\":\"\"Eng\"\"}]\"");
        assert_eq!(lines[2], "u2,Bo,");

        let manifest: serde_json::Value =
            serde_json::from_slice(&storage.read_file("manifest.json").await.unwrap()).unwrap();
        assert_eq!(manifest["row_counts"]["googleworkspace_users"], 2);
    }

    #[tokio::test]
    async fn test_writes_json_lines_with_nulls() {
        let storage = MockStorage::new();
        let writer = RowWriter::new(storage.clone(), &["json".to_string()], false).unwrap();

        writer.write(&report()).await.unwrap();

        let data = storage.get_file("googleworkspace_users.jsonl").await.unwrap();
        let rows: Vec<serde_json::Value> = String::from_utf8(data)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["organizations"], "[{\"title\":\"Eng\"}]");
        assert!(rows[1]["organizations"].is_null());
    }

    #[tokio::test]
    async fn test_zip_bundles_all_files() {
        let storage = MockStorage::new();
        let formats = vec!["csv".to_string(), "json".to_string()];
        let writer = RowWriter::new(storage.clone(), &formats, true).unwrap();

        let written = writer.write(&report()).await.unwrap();
        assert_eq!(written, vec![ZIP_FILENAME]);

        let zip_bytes = storage.get_file(ZIP_FILENAME).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let mut file_names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        file_names.sort();

        assert_eq!(
            file_names,
            vec![
                "googleworkspace_users.csv",
                "googleworkspace_users.jsonl",
                "manifest.json"
            ]
        );
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result = RowWriter::new(MockStorage::new(), &["parquet".to_string()], false);
        assert!(matches!(
            result,
            Err(SyncError::InvalidConfigValueError { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_config_uses_formats_and_zip_setting() {
        let storage = MockStorage::new();
        let settings = crate::config::SyncSettings {
            formats: vec!["json".to_string()],
            ..Default::default()
        };
        let writer = RowWriter::from_config(storage.clone(), &settings).unwrap();

        let written = writer.write(&report()).await.unwrap();
        assert_eq!(written, vec!["googleworkspace_users.jsonl", MANIFEST_FILENAME]);

        let zipped = crate::config::SyncSettings {
            zip: true,
            ..Default::default()
        };
        let writer = RowWriter::from_config(storage.clone(), &zipped).unwrap();
        assert_eq!(writer.write(&report()).await.unwrap(), vec![ZIP_FILENAME]);

        let bad = crate::config::SyncSettings {
            formats: vec!["xml".to_string()],
            ..Default::default()
        };
        assert!(RowWriter::from_config(storage, &bad).is_err());
    }
}
