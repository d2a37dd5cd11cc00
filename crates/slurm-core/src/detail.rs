use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::request::OutputStream;

const STDOUT_MARKER: &str = "StdOut=";
const STDERR_MARKER: &str = "StdErr=";
const FIELD_PATTERN: &str = r"(?:^|\s)([A-Za-z][A-Za-z0-9_:/]*)=(\S*)";

static FIELD_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

/// `Key=Value` fields of a job detail report in report order. Values run to the next whitespace;
/// a repeated key keeps its first position and takes the later value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDetailMap {
    fields: Vec<(String, String)>,
}

impl JobDetailMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    fn insert(&mut self, key: &str, value: &str) {
        match self.fields.iter_mut().find(|(name, _)| name == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.fields.push((key.to_string(), value.to_string())),
        }
    }
}

impl Serialize for JobDetailMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPaths {
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl OutputPaths {
    pub fn get(&self, stream: OutputStream) -> Option<&PathBuf> {
        match stream {
            OutputStream::Stdout => self.stdout.as_ref(),
            OutputStream::Stderr => self.stderr.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }
}

pub fn parse_job_detail(report: &str) -> JobDetailMap {
    let mut detail = JobDetailMap::default();
    let Some(pattern) = field_regex() else {
        return detail;
    };
    for line in report.lines() {
        for caps in pattern.captures_iter(line) {
            detail.insert(&caps[1], &caps[2]);
        }
    }
    detail
}

fn field_regex() -> Option<&'static Regex> {
    FIELD_REGEX
        .get_or_init(|| match Regex::new(FIELD_PATTERN) {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::error!(error = %err, "job detail field pattern failed to compile");
                None
            }
        })
        .as_ref()
}

/// Scans for the `StdOut=` and `StdErr=` markers; the last occurrence of each wins.
pub fn extract_output_paths(report: &str) -> OutputPaths {
    let mut paths = OutputPaths::default();
    for line in report.lines() {
        if let Some(path) = marker_value(line, STDOUT_MARKER) {
            paths.stdout = Some(path);
        }
        if let Some(path) = marker_value(line, STDERR_MARKER) {
            paths.stderr = Some(path);
        }
    }
    paths
}

fn marker_value(line: &str, marker: &str) -> Option<PathBuf> {
    let (_, rest) = line.rsplit_once(marker)?;
    let value = rest.split(char::is_whitespace).next()?;
    if value.is_empty() {
        return None;
    }
    Some(PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
JobId=123 JobName=myjob
   UserId=alice(1000) GroupId=alice(1000) MCS_label=N/A
   JobState=RUNNING Reason=None Dependency=(null)
   TRES=cpu=4,mem=16G,node=1,billing=4
   WorkDir=/home/alice
   StdErr=/home/alice/job.err
   StdIn=/dev/null
   StdOut=/home/alice/job.out
";

    #[test]
    fn extracts_both_paths_without_whitespace() {
        let paths = extract_output_paths(REPORT);
        assert_eq!(paths.stdout, Some(PathBuf::from("/home/alice/job.out")));
        assert_eq!(paths.stderr, Some(PathBuf::from("/home/alice/job.err")));
    }

    #[test]
    fn missing_stderr_marker_yields_none() {
        let paths = extract_output_paths("JobId=1\n   StdOut=/tmp/slurm-1.out\n");
        assert_eq!(paths.stdout, Some(PathBuf::from("/tmp/slurm-1.out")));
        assert_eq!(paths.stderr, None);
        assert_eq!(
            paths.get(OutputStream::Stdout),
            Some(&PathBuf::from("/tmp/slurm-1.out"))
        );
    }

    #[test]
    fn last_marker_occurrence_wins() {
        let paths = extract_output_paths("StdOut=/a.out\nStdOut=/b.out\n");
        assert_eq!(paths.stdout, Some(PathBuf::from("/b.out")));
    }

    #[test]
    fn empty_marker_value_is_ignored() {
        let paths = extract_output_paths("   StdOut=\n");
        assert!(paths.is_empty());
    }

    #[test]
    fn detail_map_collects_fields_across_lines() {
        let detail = parse_job_detail(REPORT);
        assert_eq!(detail.get("JobId"), Some("123"));
        assert_eq!(detail.get("UserId"), Some("alice(1000)"));
        assert_eq!(detail.get("TRES"), Some("cpu=4,mem=16G,node=1,billing=4"));
        assert_eq!(detail.get("StdOut"), Some("/home/alice/job.out"));
        assert_eq!(detail.get("Missing"), None);
    }

    #[test]
    fn field_pattern_compiles() {
        assert!(field_regex().is_some());
    }

    #[test]
    fn detail_map_keeps_report_order() {
        let detail = parse_job_detail(REPORT);
        let keys: Vec<_> = detail.iter().map(|(key, _)| key).take(4).collect();
        assert_eq!(keys, ["JobId", "JobName", "UserId", "GroupId"]);

        let json = serde_json::to_string(&parse_job_detail("Zeta=1 Alpha=2\nZeta=3\n"))
            .expect("serialize");
        assert_eq!(json, r#"{"Zeta":"3","Alpha":"2"}"#);
    }

    #[test]
    fn detail_map_later_duplicates_win() {
        let detail = parse_job_detail("A=1\nA=2 B=x\n");
        assert_eq!(detail.get("A"), Some("2"));
        assert_eq!(detail.len(), 2);
    }
}
