use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::artifact::{ensure_dir, set_file_mode_600, write_atomic};
use crate::rotation::{Resolvable, plan_rotation};

/// An append-only JSON-lines file of `T` records.
///
/// Positions handed out by [`RecordLog::load_positioned`] are 1-based
/// physical line numbers, valid until the next rewrite of the file.
#[derive(Debug, Clone)]
pub struct RecordLog<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> RecordLog<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Append one record as a single line. The line is written with one
    /// `write_all` on an append-mode handle so concurrent appenders do not
    /// interleave within a record.
    pub fn append(&self, record: &T) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            ensure_dir(dir)?;
        }

        let mut line = serde_json::to_string(record).context("failed to serialize record")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("failed to open record log: {}", self.path.display()))?;

        set_file_mode_600(&self.path)?;

        file.write_all(line.as_bytes())
            .context("failed to append record")?;
        file.flush().context("failed to flush record append")?;

        Ok(())
    }

    fn read_raw_lines(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .with_context(|| format!("failed to read record log: {}", self.path.display()))?;

        BufReader::new(file)
            .lines()
            .enumerate()
            .map(|(idx, line)| {
                line.with_context(|| {
                    format!(
                        "failed to read line {} from {}",
                        idx + 1,
                        self.path.display()
                    )
                })
            })
            .collect()
    }

    fn parse_line(&self, line: &str, line_number: usize) -> Option<T> {
        if line.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    line_number,
                    %error,
                    "skipping corrupt jsonl line"
                );
                None
            }
        }
    }

    /// Every parseable record with its 1-based line number. Missing files are
    /// empty; corrupt lines are skipped.
    pub fn load_positioned(&self) -> Result<Vec<(usize, T)>> {
        Ok(self
            .read_raw_lines()?
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| {
                self.parse_line(line, idx + 1)
                    .map(|record| (idx + 1, record))
            })
            .collect())
    }

    pub fn load_all(&self) -> Result<Vec<T>> {
        Ok(self
            .load_positioned()?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// The newest `n` parseable records, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<T>> {
        let mut records = self.load_all()?;
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }

    /// Number of non-blank lines, parseable or not.
    pub fn count(&self) -> Result<usize> {
        Ok(self
            .read_raw_lines()?
            .iter()
            .filter(|line| !line.trim().is_empty())
            .count())
    }

    /// Line number of the newest non-blank line.
    pub fn last_position(&self) -> Result<Option<usize>> {
        Ok(self
            .read_raw_lines()?
            .iter()
            .rposition(|line| !line.trim().is_empty())
            .map(|idx| idx + 1))
    }

    /// Newest of the last `window` records satisfying `predicate`, with its
    /// line number.
    pub fn recent_match(
        &self,
        window: usize,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<Option<(usize, T)>> {
        let mut records = self.load_positioned()?;
        let skip = records.len().saturating_sub(window);
        Ok(records
            .split_off(skip)
            .into_iter()
            .rev()
            .find(|(_, record)| predicate(record)))
    }

    /// Rewrite all records atomically.
    pub fn rewrite_all(&self, records: &[T]) -> Result<()> {
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record).context("failed to serialize record")?);
            buffer.push('\n');
        }
        write_atomic(&self.path, buffer.as_bytes())
    }

    /// Mutate one record in place and atomically replace the file.
    ///
    /// The record at `position_hint` is used when it still satisfies
    /// `matches`; otherwise (no hint, or the file was rotated since the hint
    /// was read) the newest record satisfying `matches` is used. Other lines,
    /// including corrupt ones, are written back untouched. Returns the line
    /// that was updated.
    pub fn update_record(
        &self,
        position_hint: Option<usize>,
        matches: impl Fn(&T) -> bool,
        apply: impl FnOnce(&mut T),
    ) -> Result<Option<usize>> {
        let mut lines = self.read_raw_lines()?;

        let at_position = position_hint
            .and_then(|position| position.checked_sub(1))
            .and_then(|idx| lines.get(idx).map(|line| (idx, line)))
            .and_then(|(idx, line)| self.parse_line(line, idx + 1).map(|record| (idx, record)))
            .filter(|(_, record)| matches(record));

        let target = at_position.or_else(|| {
            lines.iter().enumerate().rev().find_map(|(idx, line)| {
                self.parse_line(line, idx + 1)
                    .filter(|record| matches(record))
                    .map(|record| (idx, record))
            })
        });

        let Some((idx, mut record)) = target else {
            return Ok(None);
        };

        apply(&mut record);
        lines[idx] = serde_json::to_string(&record).context("failed to serialize record")?;

        let mut buffer = lines.join("\n");
        buffer.push('\n');
        write_atomic(&self.path, buffer.as_bytes())?;
        Ok(Some(idx + 1))
    }

    /// Keep only the records satisfying `keep`; returns how many were removed.
    pub fn retain(&self, keep: impl Fn(&T) -> bool) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let records = self.load_all()?;
        let before = records.len();
        let kept: Vec<T> = records.into_iter().filter(|record| keep(record)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.rewrite_all(&kept)?;
        }
        Ok(removed)
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl<T: Serialize + DeserializeOwned + Resolvable> RecordLog<T> {
    /// Bound the log to `ceiling` records when it has grown past it.
    /// Returns whether the file was rewritten.
    pub fn rotate(&self, ceiling: usize) -> Result<bool> {
        if self.count()? <= ceiling {
            return Ok(false);
        }

        let records = self.load_all()?;
        let before = records.len();
        let kept = plan_rotation(records, ceiling);
        tracing::debug!(
            path = %self.path.display(),
            before,
            after = kept.len(),
            "rotated record log"
        );
        self.rewrite_all(&kept)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        resolved: bool,
    }

    impl Resolvable for Entry {
        fn is_resolved(&self) -> bool {
            self.resolved
        }
    }

    fn entry(name: &str, resolved: bool) -> Entry {
        Entry {
            name: name.into(),
            resolved,
        }
    }

    fn make_log() -> (tempfile::TempDir, RecordLog<Entry>) {
        let dir = tempfile::tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("sub").join("entries.jsonl"));
        (dir, log)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, log) = make_log();
        assert!(log.load_all().unwrap().is_empty());
        assert_eq!(log.count().unwrap(), 0);
        assert_eq!(log.last_position().unwrap(), None);
        assert!(!log.exists());
    }

    #[test]
    fn test_append_and_load() {
        let (_dir, log) = make_log();
        log.append(&entry("a", false)).unwrap();
        log.append(&entry("b", true)).unwrap();

        let positioned = log.load_positioned().unwrap();
        assert_eq!(positioned.len(), 2);
        assert_eq!(positioned[0].0, 1);
        assert_eq!(positioned[1], (2, entry("b", true)));
        assert_eq!(log.last_position().unwrap(), Some(2));
    }

    #[test]
    fn test_corrupt_line_tolerance() {
        let (_dir, log) = make_log();
        log.append(&entry("valid-one", false)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
            writeln!(file, "{{ this is not valid json").unwrap();
        }
        log.append(&entry("valid-two", false)).unwrap();

        let positioned = log.load_positioned().unwrap();
        assert_eq!(positioned.len(), 2);
        assert_eq!(positioned[1].0, 3);
        assert_eq!(log.count().unwrap(), 3);
    }

    #[test]
    fn test_tail_and_recent_match() {
        let (_dir, log) = make_log();
        for name in ["a", "b", "c", "d"] {
            log.append(&entry(name, false)).unwrap();
        }
        let tail = log.tail(2).unwrap();
        assert_eq!(tail, vec![entry("c", false), entry("d", false)]);
        assert_eq!(
            log.recent_match(2, |e| e.name == "c").unwrap(),
            Some((3, entry("c", false)))
        );
        assert_eq!(log.recent_match(2, |e| e.name == "a").unwrap(), None);
    }

    #[test]
    fn test_update_record_at_position() {
        let (_dir, log) = make_log();
        log.append(&entry("a", false)).unwrap();
        log.append(&entry("b", false)).unwrap();

        let updated = log
            .update_record(Some(1), |e| e.name == "a", |e| e.resolved = true)
            .unwrap();
        assert_eq!(updated, Some(1));
        let all = log.load_all().unwrap();
        assert!(all[0].resolved);
        assert!(!all[1].resolved);
    }

    #[test]
    fn test_update_record_falls_back_to_newest_match() {
        let (_dir, log) = make_log();
        log.append(&entry("x", false)).unwrap();
        log.append(&entry("target", false)).unwrap();
        log.append(&entry("y", false)).unwrap();

        // Stale position (the file shifted); the matching record is found anyway.
        let updated = log
            .update_record(Some(3), |e| e.name == "target", |e| e.resolved = true)
            .unwrap();
        assert_eq!(updated, Some(2));
        assert!(log.load_all().unwrap()[1].resolved);
    }

    #[test]
    fn test_update_record_no_match() {
        let (_dir, log) = make_log();
        log.append(&entry("a", false)).unwrap();
        let updated = log
            .update_record(Some(1), |e| e.name == "zzz", |e| e.resolved = true)
            .unwrap();
        assert_eq!(updated, None);
        assert!(!log.load_all().unwrap()[0].resolved);
    }

    #[test]
    fn test_update_preserves_corrupt_lines() {
        let (_dir, log) = make_log();
        log.append(&entry("a", false)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
            writeln!(file, "garbage").unwrap();
        }
        log.update_record(Some(1), |e| e.name == "a", |e| e.resolved = true)
            .unwrap();
        let raw = fs::read_to_string(log.path()).unwrap();
        assert!(raw.contains("garbage"));
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_rotate_only_past_ceiling() {
        let (_dir, log) = make_log();
        log.append(&entry("a", true)).unwrap();
        log.append(&entry("b", false)).unwrap();
        assert!(!log.rotate(2).unwrap());

        log.append(&entry("c", true)).unwrap();
        assert!(log.rotate(2).unwrap());
        let names: Vec<String> = log.load_all().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_retain_and_remove() {
        let (_dir, log) = make_log();
        log.append(&entry("a", true)).unwrap();
        log.append(&entry("b", false)).unwrap();
        assert_eq!(log.retain(|e| !e.resolved).unwrap(), 1);
        assert_eq!(log.load_all().unwrap(), vec![entry("b", false)]);

        log.remove().unwrap();
        assert!(!log.exists());
        assert_eq!(log.retain(|_| false).unwrap(), 0);
    }
}
