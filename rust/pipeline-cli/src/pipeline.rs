//! Assembles the pipeline described by the command line.

use std::io::Write;
use std::path::PathBuf;

use clap::ValueEnum;
use pipeline_core::{
    BoxedDataset, ConcatTextDataset, Dataset, IndexedTextDataset, PipelineError, Records, Result,
    TextConfig, TextDataset, ZipTextDataset,
};

/// How the input files form one record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Layout {
    /// Lines of the first file, sharded by position
    Lines,
    /// Lines of all files back to back, sharded by position
    Concat,
    /// One row per step across all files, truncated at the shortest
    Zip,
    /// Lines of the first file, sharded into contiguous spans
    Indexed,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub layout: Layout,
    pub shuffle: bool,
    pub shuffle_buffer: Option<usize>,
    pub seed: Option<u64>,
    pub window: Option<usize>,
    pub shift: Option<usize>,
}

/// Every record is a row of fields; single-file layouts produce one field.
pub type Rows = BoxedDataset<'static, Vec<String>>;

pub fn build(paths: &[PathBuf], options: &PipelineOptions, text: &TextConfig) -> Result<Rows> {
    if paths.is_empty() {
        return Err(PipelineError::invalid_argument("at least one input file is required"));
    }

    let mut rows: Rows = match options.layout {
        Layout::Lines => TextDataset::open_with_config(&paths[0], text)?
            .map(|line| vec![line])
            .boxed(),
        Layout::Concat => ConcatTextDataset::open_with_config(paths, text)?
            .map(|line| vec![line])
            .boxed(),
        Layout::Zip => ZipTextDataset::open_with_config(paths, text)?.boxed(),
        Layout::Indexed => IndexedTextDataset::open_with_config(&paths[0], text)?
            .map(|line| vec![line])
            .boxed(),
    };

    if paths.len() > 1 && matches!(options.layout, Layout::Lines | Layout::Indexed) {
        tracing::warn!(
            "Layout {:?} reads only the first of {} files",
            options.layout,
            paths.len()
        );
    }

    if options.shuffle {
        let shuffled = rows.shuffle(options.shuffle_buffer)?;
        rows = match options.seed {
            Some(seed) => shuffled.with_seed(seed).boxed(),
            None => shuffled.boxed(),
        };
    }

    if let Some(size) = options.window {
        rows = rows
            .window(size, options.shift)?
            .map(|window| window.concat())
            .boxed();
    }

    Ok(rows)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub printed: usize,
    pub skipped: usize,
}

/// Writes rows tab-joined, one per line, until `limit` rows are printed.
///
/// Undecodable lines are skipped with a warning; any other error stops the
/// run. No record is pulled once the limit is reached.
pub fn write_rows<W: Write>(
    rows: Records<'_, Vec<String>>,
    out: &mut W,
    limit: Option<usize>,
) -> std::result::Result<WriteSummary, Box<dyn std::error::Error>> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut summary = WriteSummary::default();
    if limit == 0 {
        return Ok(summary);
    }

    for row in rows {
        match row {
            Ok(row) => {
                writeln!(out, "{}", row.join("\t"))?;
                summary.printed += 1;
                if summary.printed >= limit {
                    break;
                }
            }
            Err(e @ PipelineError::Decode { .. }) => {
                tracing::warn!("Skipping record: {}", e);
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::WorkerContext;
    use std::fs;
    use tempfile::TempDir;

    fn options(layout: Layout) -> PipelineOptions {
        PipelineOptions {
            layout,
            shuffle: false,
            shuffle_buffer: None,
            seed: None,
            window: None,
            shift: None,
        }
    }

    fn fixture(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_lines_layout_shards_by_modulo() {
        let dir = TempDir::new().unwrap();
        let path = fixture(&dir, "a.txt", &["a", "b", "c", "d", "e"]);

        let rows = build(&[path], &options(Layout::Lines), &TextConfig::default()).unwrap();
        let ctx = WorkerContext::new(1, 2).ok();
        assert_eq!(
            rows.all_for(ctx).unwrap(),
            vec![vec!["b".to_string()], vec!["d".to_string()]]
        );
    }

    #[test]
    fn test_indexed_layout_shards_by_span() {
        let dir = TempDir::new().unwrap();
        let path = fixture(&dir, "a.txt", &["a", "b", "c", "d", "e"]);

        let rows = build(&[path], &options(Layout::Indexed), &TextConfig::default()).unwrap();
        let ctx = WorkerContext::new(1, 2).ok();
        let out: Vec<String> = rows.all_for(ctx).unwrap().concat();
        assert_eq!(out, vec!["d", "e"]);
    }

    #[test]
    fn test_zip_layout_with_window() {
        let dir = TempDir::new().unwrap();
        let src = fixture(&dir, "src.txt", &["s0", "s1", "s2", "s3"]);
        let tgt = fixture(&dir, "tgt.txt", &["t0", "t1", "t2", "t3"]);

        let mut opts = options(Layout::Zip);
        opts.window = Some(2);
        let rows = build(&[src, tgt], &opts, &TextConfig::default()).unwrap();
        assert_eq!(
            rows.first().unwrap(),
            vec!["s0", "t0", "s1", "t1"]
        );
        assert_eq!(rows.all().unwrap().len(), 2);
    }

    #[test]
    fn test_concat_layout_seeded_shuffle_is_stable() {
        let dir = TempDir::new().unwrap();
        let a = fixture(&dir, "a.txt", &["1", "2", "3"]);
        let b = fixture(&dir, "b.txt", &["4", "5", "6"]);

        let mut opts = options(Layout::Concat);
        opts.shuffle = true;
        opts.seed = Some(11);
        let paths = [a, b];

        let first = build(&paths, &opts, &TextConfig::default()).unwrap().all().unwrap();
        let second = build(&paths, &opts, &TextConfig::default()).unwrap().all().unwrap();
        assert_eq!(first, second);

        let mut values: Vec<String> = first.concat();
        values.sort();
        assert_eq!(values, vec!["1", "2", "3", "4", "5", "6"]);
    }

    fn rows_then_fail(rows: &[&str]) -> Records<'static, Vec<String>> {
        let rows: Vec<Result<Vec<String>>> = rows.iter().map(|r| Ok(vec![r.to_string()])).collect();
        Box::new(rows.into_iter().chain(std::iter::from_fn(|| -> Option<Result<Vec<String>>> {
            panic!("row pulled after the limit was reached")
        })))
    }

    #[test]
    fn test_write_rows_stops_at_limit_without_pulling_more() {
        let mut out = Vec::new();
        let summary = write_rows(rows_then_fail(&["a", "b"]), &mut out, Some(2)).unwrap();
        assert_eq!(summary, WriteSummary { printed: 2, skipped: 0 });
        assert_eq!(String::from_utf8(out).unwrap(), "a\nb\n");

        let mut out = Vec::new();
        let summary = write_rows(rows_then_fail(&[]), &mut out, Some(0)).unwrap();
        assert_eq!(summary.printed, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_rows_skips_undecodable_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.txt");
        fs::write(&path, b"x\n\xff\ny\nz\n").unwrap();
        let rows = build(&[path.clone(), path], &options(Layout::Zip), &TextConfig::default()).unwrap();

        let mut out = Vec::new();
        let summary = write_rows(rows.iter().unwrap(), &mut out, Some(2)).unwrap();
        assert_eq!(summary, WriteSummary { printed: 2, skipped: 1 });
        assert_eq!(String::from_utf8(out).unwrap(), "x\tx\ny\ty\n");
    }

    #[test]
    fn test_missing_input_fails_before_iteration() {
        let paths = [PathBuf::from("/nonexistent/input.txt")];
        assert!(build(&paths, &options(Layout::Lines), &TextConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_window_rejected() {
        let dir = TempDir::new().unwrap();
        let path = fixture(&dir, "a.txt", &["a"]);
        let mut opts = options(Layout::Lines);
        opts.window = Some(0);
        assert!(build(&[path], &opts, &TextConfig::default()).is_err());
    }
}
