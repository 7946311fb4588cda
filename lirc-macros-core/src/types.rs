use crate::error::MacroError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved step kind that pauses the run for a number of milliseconds.
pub const DELAY: &str = "delay";

/// Reserved step kind that splices another macro's sequence in place.
pub const CALL: &str = "call";

// ─── Step ─────────────────────────────────────────────────────

/// One unit of a macro sequence: `[kind, ...args]`.
///
/// In configuration files a step is a heterogeneous list such as
/// `["delay", 500]` or `["gpio", "fan", 1]`. Scalar arguments are
/// stringified on the way in so every device sees a plain `&[String]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<String>")]
pub struct Step {
    pub kind: String,
    pub args: Vec<String>,
}

/// Classification of a step by its first element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind<'a> {
    Delay,
    Call,
    Device(&'a str),
}

impl Step {
    pub fn new<I, S>(kind: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn delay(ms: u64) -> Self {
        Self::new(DELAY, [ms.to_string()])
    }

    pub fn call(name: impl Into<String>) -> Self {
        Self::new(CALL, [name.into()])
    }

    pub fn kind(&self) -> StepKind<'_> {
        match self.kind.as_str() {
            DELAY => StepKind::Delay,
            CALL => StepKind::Call,
            device => StepKind::Device(device),
        }
    }
}

impl TryFrom<Vec<Value>> for Step {
    type Error = MacroError;

    fn try_from(raw: Vec<Value>) -> Result<Self, Self::Error> {
        let mut items = raw.into_iter();
        let kind = match items.next() {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(MacroError::MalformedStep {
                    reason: format!("step kind must be a string, got {other}"),
                })
            }
            None => {
                return Err(MacroError::MalformedStep {
                    reason: "step is empty".to_string(),
                })
            }
        };

        let args = items
            .map(|value| match value {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                other => Err(MacroError::MalformedStep {
                    reason: format!("argument of \"{kind}\" must be a scalar, got {other}"),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { kind, args })
    }
}

impl From<Step> for Vec<String> {
    fn from(step: Step) -> Self {
        let mut out = Vec::with_capacity(step.args.len() + 1);
        out.push(step.kind);
        out.extend(step.args);
        out
    }
}

// ─── MacroDefinition ──────────────────────────────────────────

/// A named macro as it appears in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDefinition {
    pub name: String,
    pub sequence: Vec<Step>,
    #[serde(default)]
    pub hidden: bool,
}

impl MacroDefinition {
    pub fn new(name: impl Into<String>, sequence: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            sequence,
            hidden: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_visible(&self) -> bool {
        !self.hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_stringifies_scalar_args() {
        let step: Step = serde_json::from_str(r#"["gpio", "fan", 1]"#).unwrap();
        assert_eq!(step, Step::new("gpio", ["fan", "1"]));
        assert_eq!(step.kind(), StepKind::Device("gpio"));

        let delay: Step = serde_json::from_str(r#"["delay", 500]"#).unwrap();
        assert_eq!(delay, Step::delay(500));
        assert_eq!(delay.kind(), StepKind::Delay);
    }

    #[test]
    fn test_step_rejects_malformed_records() {
        assert!(serde_json::from_str::<Step>("[]").is_err());
        assert!(serde_json::from_str::<Step>("[1, 2]").is_err());
        assert!(serde_json::from_str::<Step>(r#"["say", {"a": 1}]"#).is_err());
    }

    #[test]
    fn test_step_serializes_flat() {
        let json = serde_json::to_string(&Step::call("b")).unwrap();
        assert_eq!(json, r#"["call","b"]"#);
    }

    #[test]
    fn test_definition_hidden_defaults_to_false() {
        let def: MacroDefinition =
            serde_json::from_str(r#"{"name": "tv on", "sequence": [["tv", "KEY_POWER"]]}"#)
                .unwrap();
        assert!(def.is_visible());
        assert_eq!(def.sequence, vec![Step::new("tv", ["KEY_POWER"])]);

        let hidden: MacroDefinition =
            serde_json::from_str(r#"{"name": "!", "hidden": true, "sequence": []}"#).unwrap();
        assert!(!hidden.is_visible());
    }
}
