//! Client-side breakpoint bookkeeping. Ids are assigned by the runtime
//! during verification; one source location may map to several ids, one per
//! hardware instance the line was stamped out into.

use std::collections::BTreeMap;

/// One verified breakpoint.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    /// Server-assigned id, unique within the session.
    pub id: u64,
    /// Absolute (remote) filename.
    pub filename: String,
    pub line_num: u64,
    pub column_num: u64,
    pub valid: bool,
    pub condition: Option<String>,
}

/// Table of verified breakpoints keyed by server id.
#[derive(Debug, Default)]
pub struct BreakpointTable {
    by_id: BTreeMap<u64, Breakpoint>,
}

impl BreakpointTable {
    pub fn insert(&mut self, bp: Breakpoint) {
        self.by_id.insert(bp.id, bp);
    }

    pub fn get(&self, id: u64) -> Option<&Breakpoint> {
        self.by_id.get(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Breakpoint> {
        self.by_id.remove(&id)
    }

    /// Drop every breakpoint of a file, returning the removed ids.
    pub fn remove_file(&mut self, filename: &str) -> Vec<u64> {
        let ids: Vec<u64> = self
            .by_id
            .values()
            .filter(|bp| bp.filename == filename)
            .map(|bp| bp.id)
            .collect();
        for id in &ids {
            self.by_id.remove(id);
        }
        ids
    }

    pub fn set_condition(&mut self, id: u64, condition: Option<String>) {
        if let Some(bp) = self.by_id.get_mut(&id) {
            bp.condition = condition;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.by_id.values()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// A data breakpoint (watchpoint) on one instance-scoped variable. Valid
/// only while its instance appears in the current break context.
#[derive(Debug, Clone)]
pub struct DataBreakpoint {
    /// Composite instance id the watch is keyed to.
    pub instance_id: u64,
    pub var_name: String,
    pub condition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bp(id: u64, filename: &str, line_num: u64, column_num: u64) -> Breakpoint {
        Breakpoint {
            id,
            filename: filename.to_string(),
            line_num,
            column_num,
            valid: true,
            condition: None,
        }
    }

    #[test]
    fn test_remove_file_filters_all_its_ids() {
        let mut table = BreakpointTable::default();
        table.insert(bp(0, "/a.py", 1, 0));
        table.insert(bp(1, "/a.py", 2, 0));
        table.insert(bp(2, "/b.py", 1, 0));

        let removed = table.remove_file("/a.py");
        assert_eq!(removed, vec![0, 1]);
        assert!(table.iter().all(|bp| bp.filename == "/b.py"));
    }

    #[test]
    fn test_condition_update() {
        let mut table = BreakpointTable::default();
        table.insert(bp(0, "/a.py", 1, 4));

        table.set_condition(0, Some("a == 1".to_string()));
        assert_eq!(table.get(0).unwrap().condition.as_deref(), Some("a == 1"));

        table.set_condition(0, None);
        assert_eq!(table.get(0).unwrap().condition, None);
    }
}
