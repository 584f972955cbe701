// Run context
// Bookkeeping for one fit/predict run: per-party port values, model
// parameter reports and summaries per component. Owned by the pipeline
// that produced it; artifacts become read-only once deployed.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::component::ComponentKind;
use crate::execution::runner::RunMode;
use crate::party::PartyId;

/// Everything one component produced during a run.
#[derive(Debug, Clone)]
pub struct ComponentRecord {
    pub component: String,
    pub kind: ComponentKind,
    /// Output port values per party.
    pub(crate) outputs: BTreeMap<PartyId, BTreeMap<String, Value>>,
    pub(crate) model_param: Option<Value>,
    pub(crate) summary: Value,
    pub duration: Duration,
}

impl ComponentRecord {
    pub(crate) fn new(component: String, kind: ComponentKind) -> Self {
        Self {
            component,
            kind,
            outputs: BTreeMap::new(),
            model_param: None,
            summary: Value::Null,
            duration: Duration::ZERO,
        }
    }

    /// Model-parameter report, when the component fitted one.
    pub fn model_param(&self) -> Option<&Value> {
        self.model_param.as_ref()
    }

    /// Human-readable run summary.
    pub fn summary(&self) -> &Value {
        &self.summary
    }

    /// One party's value on one output port.
    pub fn output(&self, party: PartyId, port: &str) -> Option<&Value> {
        self.outputs.get(&party).and_then(|ports| ports.get(port))
    }

    pub fn parties(&self) -> impl Iterator<Item = PartyId> + '_ {
        self.outputs.keys().copied()
    }
}

/// State of one completed (or in-flight) run.
#[derive(Debug, Clone)]
pub struct RunContext {
    mode: RunMode,
    records: BTreeMap<String, ComponentRecord>,
}

impl RunContext {
    pub(crate) fn new(mode: RunMode) -> Self {
        Self {
            mode,
            records: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn record(&self, component: &str) -> Option<&ComponentRecord> {
        self.records.get(component)
    }

    pub fn records(&self) -> impl Iterator<Item = &ComponentRecord> {
        self.records.values()
    }

    pub(crate) fn insert(&mut self, record: ComponentRecord) {
        self.records.insert(record.component.clone(), record);
    }

    pub(crate) fn party_output(
        &self,
        component: &str,
        party: PartyId,
        port: &str,
    ) -> Option<&Value> {
        self.records.get(component).and_then(|r| r.output(party, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_are_looked_up_by_component_and_party() {
        let mut ctx = RunContext::new(RunMode::Fit);
        let mut record = ComponentRecord::new("reader_0".to_string(), ComponentKind::Reader);
        record
            .outputs
            .entry(PartyId(9999))
            .or_default()
            .insert("data".to_string(), json!({"rows": 640}));
        ctx.insert(record);

        assert_eq!(
            ctx.party_output("reader_0", PartyId(9999), "data"),
            Some(&json!({"rows": 640}))
        );
        assert_eq!(ctx.party_output("reader_0", PartyId(10000), "data"), None);
        assert_eq!(ctx.party_output("reader_1", PartyId(9999), "data"), None);
        assert!(ctx.record("reader_0").unwrap().model_param().is_none());
    }
}
