//! CSV rendering of report rows

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::{MetricRow, REPORT_COLUMNS};

/// File name used for a report job's output
pub fn report_file_name(report_id: &str) -> String {
    format!("store_report_{report_id}.csv")
}

/// Render rows as CSV with the fixed seven-column header.
///
/// The header is written even when there are no rows.
pub fn render_csv(rows: &[MetricRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(REPORT_COLUMNS)?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to serialize row for store {}", row.store_id))?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV writer: {}", e.error()))
}

/// Write rows to `dir/store_report_<id>.csv`, creating `dir` if needed
pub async fn write_report(dir: &Path, report_id: &str, rows: &[MetricRow]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create report directory {}", dir.display()))?;

    let path = dir.join(report_file_name(report_id));
    let body = render_csv(rows)?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only_for_empty_report() {
        let body = String::from_utf8(render_csv(&[]).unwrap()).unwrap();
        assert_eq!(
            body,
            "store_id,uptime_last_hour,uptime_last_day,uptime_last_week,\
downtime_last_hour,downtime_last_day,downtime_last_week\n"
        );
    }

    #[test]
    fn test_rows_in_column_order() {
        let rows = vec![MetricRow {
            store_id: "store_1".to_string(),
            uptime_last_hour: 1.0,
            uptime_last_day: 3.0,
            uptime_last_week: 3.0,
            downtime_last_hour: 0.0,
            downtime_last_day: 1.0,
            downtime_last_week: 17.5,
        }];

        let body = String::from_utf8(render_csv(&rows).unwrap()).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(',').count(), 7);
        assert_eq!(lines[1], "store_1,1.0,3.0,3.0,0.0,1.0,17.5");
    }

    #[tokio::test]
    async fn test_write_report_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("reports");

        let path = write_report(&dir, "abc", &[]).await.unwrap();

        assert_eq!(path, dir.join("store_report_abc.csv"));
        assert!(path.exists());
    }
}
