//! The last known break context.
//!
//! Rebuilt atomically from every server-initiated `breakpoint` message: the
//! stop location, the simulation time and one frame set per hardware
//! instance that hit the breakpoint. Everything here is replaced on the
//! next break event.

use indexmap::IndexMap;
use std::collections::HashSet;

use super::proto::{self, BreakEventPayload};
use super::variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    Normal,
    Data,
}

/// Why the simulation stopped, from the front-end's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint,
    DataBreakpoint,
    Exception,
}

/// One nested activation of an instance at the current break. The runtime
/// reports repeated instance ids to express nesting; each repetition
/// appends a scope.
#[derive(Debug, Default, Clone)]
pub struct ScopeVars {
    pub local: IndexMap<String, String>,
    pub generator: IndexMap<String, String>,
}

/// Everything known about one instance at the current break.
#[derive(Debug, Clone)]
pub struct InstanceFrames {
    pub instance_name: String,
    /// Composite breakpoint id (namespace in the upper half).
    pub breakpoint_id: u64,
    pub namespace_id: u64,
    pub kind: BreakpointKind,
    /// Scope 0 is the outermost activation.
    pub scopes: Vec<ScopeVars>,
}

impl InstanceFrames {
    /// The innermost (most recently pushed) scope.
    pub fn top_scope(&self) -> Option<&ScopeVars> {
        self.scopes.last()
    }
}

/// Summary of one ingested break event, used to fan out stop notifications.
#[derive(Debug, Clone)]
pub struct StopSummary {
    pub reason: StopReason,
    pub filename: String,
    pub line_num: u64,
    pub column_num: u64,
    pub time: u64,
    /// `(composite instance id, instance name, composite breakpoint id)`
    /// in the order the server reported them.
    pub instances: Vec<(u64, String, u64)>,
}

#[derive(Debug, Default)]
pub struct BreakState {
    pub filename: String,
    pub line_num: u64,
    pub column_num: u64,
    pub time: u64,
    /// Per-instance frame sets keyed by composite instance id, in server
    /// report order.
    pub instances: IndexMap<u64, InstanceFrames>,
    /// Index into `instances` of the instance in focus.
    pub current_instance: usize,
    /// Variables overridden via `set` since this break; lookups of these
    /// names must go to the server.
    pub set_values: HashSet<String>,
    /// False until the first break event arrives.
    pub stopped: bool,
}

impl BreakState {
    /// Replace the whole context from a break event. Every per-instance map
    /// and the set-override list are cleared before repopulation.
    pub fn ingest(&mut self, payload: BreakEventPayload) -> StopSummary {
        self.instances.clear();
        self.set_values.clear();
        self.current_instance = 0;
        self.stopped = true;

        self.filename = payload.filename.unwrap_or_default();
        self.line_num = payload.line_num;
        self.column_num = payload.column_num;
        self.time = payload.time;

        let mut order = Vec::with_capacity(payload.instances.len());
        let mut any_data = false;

        for inst in payload.instances {
            let instance_id = proto::compose_id(inst.namespace_id, inst.instance_id);
            let breakpoint_id = proto::compose_id(inst.namespace_id, inst.breakpoint_id);
            let kind = match inst.bp_type.as_str() {
                "data" => BreakpointKind::Data,
                _ => BreakpointKind::Normal,
            };
            any_data |= kind == BreakpointKind::Data;

            let entry = self
                .instances
                .entry(instance_id)
                .or_insert_with(|| InstanceFrames {
                    instance_name: inst.instance_name.clone(),
                    breakpoint_id,
                    namespace_id: inst.namespace_id,
                    kind,
                    scopes: Vec::new(),
                });
            entry.scopes.push(ScopeVars {
                local: variable::normalize_map(inst.local),
                generator: variable::normalize_map(inst.generator),
            });

            if !order.iter().any(|(id, _, _)| *id == instance_id) {
                order.push((instance_id, inst.instance_name, breakpoint_id));
            }
        }

        let reason = if payload.reason.as_deref() == Some("exception") {
            StopReason::Exception
        } else if any_data {
            StopReason::DataBreakpoint
        } else {
            StopReason::Breakpoint
        };

        StopSummary {
            reason,
            filename: self.filename.clone(),
            line_num: self.line_num,
            column_num: self.column_num,
            time: self.time,
            instances: order,
        }
    }

    pub fn instance(&self, instance_id: u64) -> Option<&InstanceFrames> {
        self.instances.get(&instance_id)
    }

    /// The instance currently in focus (`thread <iid>` moves it).
    pub fn focused(&self) -> Option<(u64, &InstanceFrames)> {
        self.instances
            .get_index(self.current_instance)
            .map(|(id, frames)| (*id, frames))
    }

    /// Move the focus to the given composite instance id.
    pub fn focus(&mut self, instance_id: u64) -> bool {
        match self.instances.get_index_of(&instance_id) {
            Some(index) => {
                self.current_instance = index;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::proto::InstancePayload;
    use std::collections::HashMap;

    fn instance(
        instance_id: u64,
        breakpoint_id: u64,
        bp_type: &str,
        local: &[(&str, &str)],
    ) -> InstancePayload {
        InstancePayload {
            instance_id,
            instance_name: format!("inst{instance_id}"),
            breakpoint_id,
            namespace_id: 1,
            bp_type: bp_type.to_string(),
            local: local
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            generator: HashMap::new(),
        }
    }

    fn event(instances: Vec<InstancePayload>) -> BreakEventPayload {
        BreakEventPayload {
            filename: Some("/tmp/test.py".to_string()),
            line_num: 5,
            column_num: 0,
            time: 42,
            reason: None,
            instances,
        }
    }

    #[test]
    fn test_ingest_replaces_previous_context() {
        let mut state = BreakState::default();
        state.ingest(event(vec![instance(1, 10, "normal", &[("a", "1")])]));
        state.set_values.insert("a".to_string());
        state.focus(crate::debugger::proto::compose_id(1, 1));

        let summary = state.ingest(event(vec![instance(2, 11, "normal", &[("b", "2")])]));

        assert_eq!(state.instances.len(), 1);
        assert!(state.set_values.is_empty());
        assert_eq!(state.current_instance, 0);
        assert_eq!(summary.instances.len(), 1);
        let iid = crate::debugger::proto::compose_id(1, 2);
        assert!(state.instance(iid).is_some());
        assert!(state.instance(crate::debugger::proto::compose_id(1, 1)).is_none());
    }

    #[test]
    fn test_repeated_instance_appends_scope() {
        let mut state = BreakState::default();
        let summary = state.ingest(event(vec![
            instance(1, 10, "normal", &[("a", "1")]),
            instance(1, 10, "normal", &[("a", "2")]),
        ]));

        let iid = crate::debugger::proto::compose_id(1, 1);
        let frames = state.instance(iid).unwrap();
        assert_eq!(frames.scopes.len(), 2);
        assert_eq!(frames.scopes[0].local.get("a"), Some(&"1".to_string()));
        assert_eq!(frames.top_scope().unwrap().local.get("a"), Some(&"2".to_string()));
        // One stop notification per instance, not per scope.
        assert_eq!(summary.instances.len(), 1);
    }

    #[test]
    fn test_data_breakpoint_reason() {
        let mut state = BreakState::default();
        let summary = state.ingest(event(vec![
            instance(1, 10, "normal", &[]),
            instance(2, 11, "data", &[]),
        ]));
        assert_eq!(summary.reason, StopReason::DataBreakpoint);
    }

    #[test]
    fn test_exception_reason_wins() {
        let mut state = BreakState::default();
        let mut payload = event(vec![instance(1, 10, "data", &[])]);
        payload.reason = Some("exception".to_string());
        let summary = state.ingest(payload);
        assert_eq!(summary.reason, StopReason::Exception);
    }

    #[test]
    fn test_focus_switch() {
        let mut state = BreakState::default();
        state.ingest(event(vec![
            instance(1, 10, "normal", &[]),
            instance(2, 11, "normal", &[]),
        ]));

        let second = crate::debugger::proto::compose_id(1, 2);
        assert!(state.focus(second));
        assert_eq!(state.focused().unwrap().0, second);
        assert!(!state.focus(crate::debugger::proto::compose_id(1, 9)));
    }
}
