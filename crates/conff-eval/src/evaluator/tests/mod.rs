mod test_expressions;
mod test_foreach;
mod test_walker;

use crate::evaluator::{ErrorLog, EvalConfig, Evaluator};
use crate::types::{Mapping, Value};

pub(crate) fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).expect("test YAML must parse")
}

pub(crate) fn mapping(entries: &[(&str, Value)]) -> Mapping {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Resolve a YAML document with the default configuration.
pub(crate) fn resolve(text: &str) -> (Value, ErrorLog) {
    resolve_with(EvalConfig::default(), text)
}

pub(crate) fn resolve_with(config: EvalConfig, text: &str) -> (Value, ErrorLog) {
    let mut errors = ErrorLog::new();
    let value = Evaluator::new(config)
        .parse_value(&yaml(text), &mut errors)
        .expect("document should resolve");
    (value, errors)
}
