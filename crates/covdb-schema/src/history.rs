use covdb_ids::HistoryId;
use serde::{Deserialize, Serialize};

/// Logical name of the running summary record used by squash mode.
pub const SQUASH_SUMMARY_NAME: &str = "merged_summary";

/// Integer property on the squash summary holding the tests merged so far.
pub const TESTS_MERGED_KEY: &str = "TESTS_MERGED";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Test,
    Merge,
    Other,
}

impl HistoryKind {
    pub fn code(self) -> i64 {
        match self {
            HistoryKind::Test => 1,
            HistoryKind::Merge => 2,
            HistoryKind::Other => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(HistoryKind::Test),
            2 => Some(HistoryKind::Merge),
            3 => Some(HistoryKind::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    Ok,
    Warning,
    Error,
    Fatal,
    Missing,
    MergeError,
}

impl TestStatus {
    pub fn code(self) -> i64 {
        match self {
            TestStatus::Ok => 1,
            TestStatus::Warning => 2,
            TestStatus::Error => 3,
            TestStatus::Fatal => 4,
            TestStatus::Missing => 5,
            TestStatus::MergeError => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TestStatus::Ok),
            2 => Some(TestStatus::Warning),
            3 => Some(TestStatus::Error),
            4 => Some(TestStatus::Fatal),
            5 => Some(TestStatus::Missing),
            6 => Some(TestStatus::MergeError),
            _ => None,
        }
    }
}

/// One test execution or merge event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub kind: HistoryKind,
    pub logical_name: String,
    #[serde(default)]
    pub physical_name: Option<String>,
    #[serde(default)]
    pub parent: Option<HistoryId>,
    #[serde(default)]
    pub test_status: TestStatus,
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

impl HistoryRecord {
    pub fn new(kind: HistoryKind, logical_name: impl Into<String>) -> Self {
        Self {
            kind,
            logical_name: logical_name.into(),
            physical_name: None,
            parent: None,
            test_status: TestStatus::Ok,
            seed: None,
            cmd: None,
            date: None,
            user_name: None,
        }
    }

    pub fn test(logical_name: impl Into<String>) -> Self {
        Self::new(HistoryKind::Test, logical_name)
    }

    pub fn merge(logical_name: impl Into<String>) -> Self {
        Self::new(HistoryKind::Merge, logical_name)
    }

    pub fn with_parent(mut self, parent: Option<HistoryId>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_physical_name(mut self, physical_name: impl Into<String>) -> Self {
        self.physical_name = Some(physical_name.into());
        self
    }

    pub fn with_status(mut self, status: TestStatus) -> Self {
        self.test_status = status;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user_name = Some(user.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        for kind in [HistoryKind::Test, HistoryKind::Merge, HistoryKind::Other] {
            assert_eq!(HistoryKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(HistoryKind::from_code(0), None);
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [
            TestStatus::Ok,
            TestStatus::Warning,
            TestStatus::Error,
            TestStatus::Fatal,
            TestStatus::Missing,
            TestStatus::MergeError,
        ] {
            assert_eq!(TestStatus::from_code(status.code()), Some(status));
        }
    }

    #[test]
    fn builders_fill_metadata() {
        let rec = HistoryRecord::test("t1")
            .with_seed("42")
            .with_status(TestStatus::Warning)
            .with_cmd("vsim t1")
            .with_parent(Some(HistoryId(3)));
        assert_eq!(rec.kind, HistoryKind::Test);
        assert_eq!(rec.logical_name, "t1");
        assert_eq!(rec.seed.as_deref(), Some("42"));
        assert_eq!(rec.test_status, TestStatus::Warning);
        assert_eq!(rec.parent, Some(HistoryId(3)));
    }

    #[test]
    fn record_deserializes_with_defaults() {
        let rec: HistoryRecord = serde_json::from_str(r#"{"kind":"merge","logical_name":"m"}"#).unwrap();
        assert_eq!(rec, HistoryRecord::merge("m"));
    }
}
