//! Reading and writing task-set description files.
//!
//! A task-set file is line-oriented; blank lines and lines starting with `#`
//! are ignored. Every other line starts with a kind letter followed by
//! whitespace-separated non-negative integers:
//!
//! | Line        | Meaning                                                   |
//! |-------------|-----------------------------------------------------------|
//! | `P e p`     | periodic task released at `0`, deadline equal to period   |
//! | `P r e p`   | periodic task released at `r`, deadline equal to period   |
//! | `P r e p d` | periodic task released at `r` with relative deadline `d`  |
//! | `D e p d`   | periodic task released at `0` with relative deadline `d`  |
//! | `A r e`     | aperiodic job released at `r`                             |
//!
//! Periodic tasks are named `T1`, `T2`, ... and aperiodic jobs `A1`, `A2`,
//! ... in order of appearance.

use crate::{
    task::{Task, Aperiodic, Time},
    error::{Error, Result}
};

use std::{fmt, fs, path::Path};

/// The contents of a task-set file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskSet {
    pub periodic: Vec<Task>,
    pub aperiodic: Vec<Aperiodic>
}

impl TaskSet {
    /// Parses a task-set description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for the first malformed line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut out = Self::default();

        for (n, line) in text.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let error = |reason: String| Error::Parse { line: n + 1, reason };

            let mut fields = line.split_whitespace();
            let kind = fields.next().unwrap_or_default();
            let values = fields.map(|v| v.parse::<Time>().map_err(|_| {
                error(format!("expected a non-negative integer, found `{v}`"))
            })).collect::<Result<Vec<_>>>()?;

            let id = format!("T{}", out.periodic.len() + 1);

            match (kind, values.as_slice()) {
                ("P", &[e, p]) => out.periodic.push(Task::new(id, e, p)),
                ("P", &[r, e, p]) => out.periodic.push(Task::new(id, e, p).with_release(r)),
                ("P", &[r, e, p, d]) => {
                    out.periodic.push(Task::new(id, e, p).with_release(r).with_deadline(d));
                },
                ("D", &[e, p, d]) => out.periodic.push(Task::new(id, e, p).with_deadline(d)),
                ("A", &[r, e]) => {
                    let id = format!("A{}", out.aperiodic.len() + 1);
                    out.aperiodic.push(Aperiodic::new(id, r, e));
                },
                ("P" | "D" | "A", _) => {
                    return Err(error(format!("wrong number of fields for `{kind}`: {}", values.len())));
                },
                _ => return Err(error(format!("unknown task kind `{kind}`")))
            }
        }

        Ok(out)
    }

    /// Reads and parses the task-set file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Parse`]
    /// if it is malformed.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }
}

/// Writes the task-set in canonical form (`P r e p d` and `A r e` lines),
/// which [`TaskSet::parse`] reads back with the same names as long as the
/// tasks were named in file order.
impl fmt::Display for TaskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.periodic {
            writeln!(f, "P {} {} {} {}", t.release, t.cost, t.period, t.deadline)?;
        }

        for a in &self.aperiodic {
            writeln!(f, "A {} {}", a.release, a.cost)?;
        }

        Ok(())
    }
}
