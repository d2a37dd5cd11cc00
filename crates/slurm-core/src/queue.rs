//! Parsing of the queue listing printed by `squeue` in its default column layout:
//!
//! ```text
//! JOBID PARTITION     NAME     USER ST       TIME  NODES NODELIST(REASON)
//!   123       gpu    myjob    alice  R       1:23      2 node[01-02]
//! ```

use serde::Serialize;

const MIN_COLUMNS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRow {
    pub job_id: String,
    pub partition: String,
    pub name: String,
    pub user: String,
    pub state: String,
    pub time: String,
    pub nodes: String,
    pub nodelist: String,
}

/// Coarse grouping of state codes, used for row highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStateClass {
    Running,
    Pending,
    Completing,
    Failed,
    Other,
}

impl JobStateClass {
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "R" | "RUNNING" => Self::Running,
            "PD" | "PENDING" => Self::Pending,
            "CG" | "COMPLETING" => Self::Completing,
            "F" | "FAILED" | "TO" | "TIMEOUT" | "NF" | "NODE_FAIL" | "OOM" | "OUT_OF_MEMORY"
            | "BF" | "BOOT_FAIL" | "CA" | "CANCELLED" => Self::Failed,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Pending => "pending",
            Self::Completing => "completing",
            Self::Failed => "failed",
            Self::Other => "other",
        }
    }
}

impl JobRow {
    pub fn state_class(&self) -> JobStateClass {
        JobStateClass::from_code(&self.state)
    }

    fn from_line(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < MIN_COLUMNS || !is_job_id(tokens[0]) {
            return None;
        }
        Some(Self {
            job_id: tokens[0].to_string(),
            partition: tokens[1].to_string(),
            name: tokens[2].to_string(),
            user: tokens[3].to_string(),
            state: tokens[4].to_string(),
            time: tokens[5].to_string(),
            nodes: tokens[6].to_string(),
            nodelist: tokens[7..].join(" "),
        })
    }
}

/// Converts listing text into rows, preserving input order. Header, blank, short and
/// non-numeric lines are skipped whole.
pub fn parse_queue(output: &str) -> Vec<JobRow> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| line.split_whitespace().next() != Some("JOBID"))
        .filter_map(JobRow::from_line)
        .collect()
}

fn is_job_id(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "JOBID PARTITION NAME USER ST TIME NODES NODELIST\n";

    #[test]
    fn parses_single_row() {
        let text = format!("{HEADER}123 gpu myjob alice R 1:23 2 node[01-02]\n");
        let rows = parse_queue(&text);
        assert_eq!(
            rows,
            vec![JobRow {
                job_id: "123".to_string(),
                partition: "gpu".to_string(),
                name: "myjob".to_string(),
                user: "alice".to_string(),
                state: "R".to_string(),
                time: "1:23".to_string(),
                nodes: "2".to_string(),
                nodelist: "node[01-02]".to_string(),
            }]
        );
    }

    #[test]
    fn keeps_input_order_and_count() {
        let text = format!(
            "{HEADER}\
             \x20\x20 30 cpu  a bob PD 0:00 1 (Priority)\n\
             \x20\x20 10 cpu  b bob R  5:00 1 c01\n\
             \n\
             \x20\x20 20 gpu  c eve CG 9:59 4 g[1-4]\n"
        );
        let ids: Vec<_> = parse_queue(&text).into_iter().map(|row| row.job_id).collect();
        assert_eq!(ids, ["30", "10", "20"]);
    }

    #[test]
    fn node_list_with_spaces_is_rejoined() {
        let text = "77 debug job carol PD 0:00 1 (ReqNodeNotAvail, UnavailableNodes:n1)\n";
        let rows = parse_queue(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nodelist, "(ReqNodeNotAvail, UnavailableNodes:n1)");
    }

    #[test]
    fn non_numeric_and_short_lines_are_skipped() {
        let text = "\
JOBID PARTITION NAME USER ST TIME NODES NODELIST
123_4 gpu array alice R 1:00 1 n1
abc gpu x alice R 1:00 1 n1
456 gpu short
789 gpu ok alice R 1:00 1 n2
";
        let rows = parse_queue(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].job_id, "789");
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(parse_queue(HEADER).is_empty());
        assert!(parse_queue("").is_empty());
    }

    #[test]
    fn state_classes_follow_codes() {
        assert_eq!(JobStateClass::from_code("R"), JobStateClass::Running);
        assert_eq!(JobStateClass::from_code("pd"), JobStateClass::Pending);
        assert_eq!(JobStateClass::from_code("CG"), JobStateClass::Completing);
        assert_eq!(JobStateClass::from_code("TO"), JobStateClass::Failed);
        assert_eq!(JobStateClass::from_code("S"), JobStateClass::Other);
    }
}
