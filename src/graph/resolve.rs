// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolution of inputs against recorded resource outputs, other stacks'
//! outputs and deploy-time secrets.

use crate::constants::{COMPUTED_PLACEHOLDER, SECRET_PLACEHOLDER};
use crate::error::{InfraError, Result};
use crate::graph::input::Input;
use crate::graph::stack::StackGraph;
use crate::stack_ref::StackReferences;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::env;

/// Source of secret configuration values.
pub trait SecretSource {
    fn secret(&self, key: &str) -> Option<String>;
}

impl SecretSource for BTreeMap<String, String> {
    fn secret(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Reads secret `pulumi-pat` from `PLATFORM_SECRET_PULUMI_PAT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl EnvSecrets {
    pub fn variable_name(key: &str) -> String {
        format!(
            "PLATFORM_SECRET_{}",
            key.to_ascii_uppercase().replace(['-', '.'], "_")
        )
    }
}

impl SecretSource for EnvSecrets {
    fn secret(&self, key: &str) -> Option<String> {
        env::var(Self::variable_name(key)).ok()
    }
}

/// Outcome of resolving an input. `value` is `None` while anything the input
/// depends on is still unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Option<Value>,
    pub secret: bool,
}

impl Resolved {
    fn known(value: Value, secret: bool) -> Self {
        Self {
            value: Some(value),
            secret,
        }
    }

    fn unknown(secret: bool) -> Self {
        Self {
            value: None,
            secret,
        }
    }

    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }

    /// The value as shown to a reader: secrets and unknowns are masked.
    pub fn display(&self) -> Value {
        match (&self.value, self.secret) {
            (_, true) => Value::String(SECRET_PLACEHOLDER.to_string()),
            (None, false) => Value::String(COMPUTED_PLACEHOLDER.to_string()),
            (Some(v), false) => v.clone(),
        }
    }

    /// The value as stored in state: like [`Resolved::display`], but a known
    /// secret is replaced by a digest so a changed secret shows as a change.
    pub fn fingerprint(&self) -> Value {
        match (&self.value, self.secret) {
            (None, _) => Value::String(COMPUTED_PLACEHOLDER.to_string()),
            (Some(v), true) => Value::String(secret_digest(v)),
            (Some(v), false) => v.clone(),
        }
    }
}

fn secret_digest(value: &Value) -> String {
    let digest = Sha256::digest(as_text(value).as_bytes());
    format!("[secret:sha256:{}]", hex::encode(digest))
}

/// Whether recorded rendered inputs still describe `desired`. A leaf that was
/// still computed when recorded matches whatever it has resolved to since.
pub fn inputs_match(recorded: &Value, desired: &Value) -> bool {
    match (recorded, desired) {
        (Value::String(s), _) if s == COMPUTED_PLACEHOLDER => true,
        (Value::Object(r), Value::Object(d)) => {
            r.len() == d.len()
                && r.iter()
                    .all(|(k, rv)| d.get(k).is_some_and(|dv| inputs_match(rv, dv)))
        }
        (Value::Array(r), Value::Array(d)) => {
            r.len() == d.len() && r.iter().zip(d).all(|(rv, dv)| inputs_match(rv, dv))
        }
        (r, d) => r == d,
    }
}

#[derive(Debug, Clone, Copy)]
enum Masking {
    Display,
    Fingerprint,
}

/// Recorded outputs per resource name.
pub type ResourceOutputs = BTreeMap<String, BTreeMap<String, Value>>;

pub struct ResolveContext<'a> {
    pub graph: &'a StackGraph,
    pub outputs: &'a ResourceOutputs,
    pub stacks: &'a StackReferences,
    pub secrets: &'a dyn SecretSource,
}

impl<'a> ResolveContext<'a> {
    pub fn resolve(&self, input: &Input) -> Result<Resolved> {
        match input {
            Input::Literal(v) => Ok(Resolved::known(v.clone(), false)),
            Input::Output(r) => {
                let secret = self
                    .graph
                    .resource(&r.resource)
                    .is_some_and(|res| res.secret_outputs.contains(&r.attribute));
                Ok(self
                    .outputs
                    .get(&r.resource)
                    .and_then(|attrs| attrs.get(&r.attribute))
                    .map(|v| Resolved::known(v.clone(), secret))
                    .unwrap_or(Resolved::unknown(secret)))
            }
            Input::StackOutput(r) => match self.stacks.get(&r.stack) {
                None => Ok(Resolved::unknown(false)),
                Some(outputs) => {
                    let output = outputs.get(&r.output).ok_or_else(|| {
                        InfraError::MissingStackOutput {
                            stack: r.stack.clone(),
                            output: r.output.clone(),
                        }
                    })?;
                    Ok(match output.known_value() {
                        Some(value) => Resolved::known(value.clone(), output.secret),
                        None => Resolved::unknown(output.secret),
                    })
                }
            },
            Input::ConfigSecret(key) => Ok(self
                .secrets
                .secret(key)
                .map(|v| Resolved::known(Value::String(v), true))
                .unwrap_or(Resolved::unknown(true))),
            Input::Secret(inner) => {
                let resolved = self.resolve(inner)?;
                Ok(Resolved {
                    secret: true,
                    ..resolved
                })
            }
            Input::Template(parts) => {
                let mut out = String::new();
                let mut secret = false;
                let mut known = true;
                for part in parts {
                    let resolved = self.resolve(part)?;
                    secret |= resolved.secret;
                    match resolved.value {
                        Some(v) => out.push_str(&as_text(&v)),
                        None => known = false,
                    }
                }
                Ok(if known {
                    Resolved::known(Value::String(out), secret)
                } else {
                    Resolved::unknown(secret)
                })
            }
            Input::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                let mut secret = false;
                let mut known = true;
                for item in items {
                    let resolved = self.resolve(item)?;
                    secret |= resolved.secret;
                    match resolved.value {
                        Some(v) => values.push(v),
                        None => known = false,
                    }
                }
                Ok(if known {
                    Resolved::known(Value::Array(values), secret)
                } else {
                    Resolved::unknown(secret)
                })
            }
            Input::Map(entries) => {
                let mut values = Map::new();
                let mut secret = false;
                let mut known = true;
                for (key, item) in entries {
                    let resolved = self.resolve(item)?;
                    secret |= resolved.secret;
                    match resolved.value {
                        Some(v) => {
                            values.insert(key.clone(), v);
                        }
                        None => known = false,
                    }
                }
                Ok(if known {
                    Resolved::known(Value::Object(values), secret)
                } else {
                    Resolved::unknown(secret)
                })
            }
            Input::Apply(transform, inner) => {
                let resolved = self.resolve(inner)?;
                let secret = resolved.secret || transform.yields_secret();
                match resolved.value {
                    Some(v) => Ok(Resolved::known(transform.apply(v)?, secret)),
                    None => Ok(Resolved::unknown(secret)),
                }
            }
        }
    }

    /// Render an input for display, masking secret and unknown leaves while
    /// keeping the structure around them visible.
    pub fn render(&self, input: &Input) -> Result<Value> {
        self.render_masked(input, Masking::Display)
    }

    /// Render all inputs of a resource.
    pub fn render_inputs(&self, inputs: &BTreeMap<String, Input>) -> Result<Value> {
        self.render_all(inputs, Masking::Display)
    }

    /// Render all inputs of a resource in the form recorded in state.
    pub fn fingerprint_inputs(&self, inputs: &BTreeMap<String, Input>) -> Result<Value> {
        self.render_all(inputs, Masking::Fingerprint)
    }

    fn render_all(&self, inputs: &BTreeMap<String, Input>, masking: Masking) -> Result<Value> {
        let mut values = Map::new();
        for (key, input) in inputs {
            values.insert(key.clone(), self.render_masked(input, masking)?);
        }
        Ok(Value::Object(values))
    }

    fn render_masked(&self, input: &Input, masking: Masking) -> Result<Value> {
        match input {
            Input::List(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.render_masked(item, masking))
                    .collect::<Result<_>>()?,
            )),
            Input::Map(entries) => {
                let mut values = Map::new();
                for (key, item) in entries {
                    values.insert(key.clone(), self.render_masked(item, masking)?);
                }
                Ok(Value::Object(values))
            }
            other => {
                let resolved = self.resolve(other)?;
                Ok(match masking {
                    Masking::Display => resolved.display(),
                    Masking::Fingerprint => resolved.fingerprint(),
                })
            }
        }
    }

    /// Resolve every export of the stack.
    pub fn resolve_exports(&self) -> Result<BTreeMap<String, Resolved>> {
        self.graph
            .exports()
            .iter()
            .map(|(name, export)| {
                let resolved = self.resolve(&export.value)?;
                Ok((
                    name.clone(),
                    Resolved {
                        secret: resolved.secret || export.secret,
                        ..resolved
                    },
                ))
            })
            .collect()
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::input::StackOutputRef;
    use crate::graph::intent::ResourceIntent;
    use crate::graph::transform::Transform;
    use crate::stack_ref::{OutputValue, StackOutputs};
    use serde_json::json;

    const THING: &str = "test:index:Thing";

    struct Fixture {
        graph: StackGraph,
        outputs: ResourceOutputs,
        stacks: StackReferences,
        secrets: BTreeMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut graph = StackGraph::new("test");
            graph.add(ResourceIntent::new(THING, "alb")).unwrap();
            graph
                .add(ResourceIntent::new(THING, "token").secret_output("data"))
                .unwrap();
            Self {
                graph,
                outputs: ResourceOutputs::new(),
                stacks: StackReferences::default(),
                secrets: BTreeMap::new(),
            }
        }

        fn ctx(&self) -> ResolveContext<'_> {
            ResolveContext {
                graph: &self.graph,
                outputs: &self.outputs,
                stacks: &self.stacks,
                secrets: &self.secrets,
            }
        }
    }

    fn alb_dns() -> Input {
        Input::Output(crate::graph::input::OutputRef {
            resource: "alb".to_string(),
            attribute: "dnsName".to_string(),
        })
    }

    fn stack_output(output: &str) -> Input {
        Input::StackOutput(StackOutputRef {
            stack: "org/gitops/dev".to_string(),
            output: output.to_string(),
        })
    }

    #[test]
    fn test_unapplied_output_is_unknown() {
        let fixture = Fixture::new();
        let resolved = fixture.ctx().resolve(&alb_dns()).unwrap();
        assert!(!resolved.is_known());
        assert_eq!(resolved.display(), json!(COMPUTED_PLACEHOLDER));
    }

    #[test]
    fn test_template_with_recorded_output() {
        let mut fixture = Fixture::new();
        fixture.outputs.insert(
            "alb".to_string(),
            BTreeMap::from([("dnsName".to_string(), json!("lb.example.com"))]),
        );

        let resolved = fixture
            .ctx()
            .resolve(&Input::concat([Input::string("http://"), alb_dns()]))
            .unwrap();
        assert_eq!(resolved.value, Some(json!("http://lb.example.com")));
        assert!(!resolved.secret);
    }

    #[test]
    fn test_template_renders_numbers_without_quotes() {
        let fixture = Fixture::new();
        let resolved = fixture
            .ctx()
            .resolve(&Input::concat([Input::string("port="), Input::from(5432i64)]))
            .unwrap();
        assert_eq!(resolved.value, Some(json!("port=5432")));
    }

    #[test]
    fn test_secret_output_is_masked() {
        let mut fixture = Fixture::new();
        fixture.outputs.insert(
            "token".to_string(),
            BTreeMap::from([("data".to_string(), json!({"token": "ZXlKaGJHY2lPaS5iZWFyZXI="}))]),
        );

        let input = Input::apply(
            Transform::ServiceAccountToken,
            Input::Output(crate::graph::input::OutputRef {
                resource: "token".to_string(),
                attribute: "data".to_string(),
            }),
        );
        let resolved = fixture.ctx().resolve(&input).unwrap();
        assert_eq!(resolved.value, Some(json!("eyJhbGciOi.bearer")));
        assert!(resolved.secret);
        assert_eq!(resolved.display(), json!(SECRET_PLACEHOLDER));
    }

    #[test]
    fn test_cross_stack_output_opaque_until_loaded() {
        let fixture = Fixture::new();
        let resolved = fixture.ctx().resolve(&stack_output("vpc-id")).unwrap();
        assert!(!resolved.is_known());
    }

    #[test]
    fn test_cross_stack_output_resolves_when_loaded() {
        let mut fixture = Fixture::new();
        fixture.stacks.insert(StackOutputs::new(
            "org/gitops/dev",
            BTreeMap::from([(
                "vpc-id".to_string(),
                OutputValue::plain(json!("vpc-123")),
            )]),
        ));

        let resolved = fixture.ctx().resolve(&stack_output("vpc-id")).unwrap();
        assert_eq!(resolved.value, Some(json!("vpc-123")));
    }

    #[test]
    fn test_missing_cross_stack_output_fails() {
        let mut fixture = Fixture::new();
        fixture
            .stacks
            .insert(StackOutputs::new("org/gitops/dev", BTreeMap::new()));

        let err = fixture.ctx().resolve(&stack_output("vpc-id")).unwrap_err();
        assert!(matches!(err, InfraError::MissingStackOutput { output, .. } if output == "vpc-id"));
    }

    #[test]
    fn test_declared_but_unreported_cross_stack_output_is_unknown() {
        let mut fixture = Fixture::new();
        fixture.stacks.insert(StackOutputs::new(
            "org/gitops/dev",
            BTreeMap::from([("vpc-id".to_string(), OutputValue::unknown(false))]),
        ));

        let resolved = fixture.ctx().resolve(&stack_output("vpc-id")).unwrap();
        assert!(!resolved.is_known());
        assert_eq!(resolved.display(), json!(COMPUTED_PLACEHOLDER));
    }

    #[test]
    fn test_config_secret_from_source() {
        let mut fixture = Fixture::new();
        fixture
            .secrets
            .insert("pulumi-pat".to_string(), "pul-abc".to_string());

        let resolved = fixture
            .ctx()
            .resolve(&Input::ConfigSecret("pulumi-pat".to_string()))
            .unwrap();
        assert_eq!(resolved.value, Some(json!("pul-abc")));
        assert!(resolved.secret);
    }

    #[test]
    fn test_render_keeps_structure_around_unknowns() {
        let fixture = Fixture::new();
        let input = Input::map([
            ("name", Input::string("backstage")),
            ("dns", alb_dns()),
            ("password", Input::ConfigSecret("db-password".to_string())),
        ]);

        assert_eq!(
            fixture.ctx().render(&input).unwrap(),
            json!({
                "name": "backstage",
                "dns": COMPUTED_PLACEHOLDER,
                "password": SECRET_PLACEHOLDER
            })
        );
    }

    #[test]
    fn test_fingerprint_tracks_secret_value_without_revealing_it() {
        let mut fixture = Fixture::new();
        let input = Input::map([("password", Input::ConfigSecret("db-password".to_string()))]);
        let inputs = BTreeMap::from([("config".to_string(), input)]);

        let unset = fixture.ctx().fingerprint_inputs(&inputs).unwrap();
        assert_eq!(unset["config"]["password"], json!(COMPUTED_PLACEHOLDER));

        fixture
            .secrets
            .insert("db-password".to_string(), "first".to_string());
        let first = fixture.ctx().fingerprint_inputs(&inputs).unwrap();
        fixture
            .secrets
            .insert("db-password".to_string(), "second".to_string());
        let second = fixture.ctx().fingerprint_inputs(&inputs).unwrap();

        assert_ne!(first, second);
        let text = first.to_string();
        assert!(text.contains("[secret:sha256:"));
        assert!(!text.contains("first"));
        assert_eq!(
            fixture.ctx().render_inputs(&inputs).unwrap()["config"]["password"],
            json!(SECRET_PLACEHOLDER)
        );
    }

    #[test]
    fn test_computed_leaf_matches_resolved_value() {
        let recorded = json!({"vpcId": COMPUTED_PLACEHOLDER, "tags": ["a"]});

        assert!(inputs_match(&recorded, &json!({"vpcId": "vpc-42", "tags": ["a"]})));
        assert!(!inputs_match(&recorded, &json!({"vpcId": "vpc-42", "tags": ["b"]})));
        assert!(!inputs_match(&recorded, &json!({"vpcId": "vpc-42"})));
        assert!(!inputs_match(&json!({"vpcId": "vpc-1"}), &json!({"vpcId": "vpc-42"})));
    }

    #[test]
    fn test_env_secret_variable_name() {
        assert_eq!(
            EnvSecrets::variable_name("pulumi-pat"),
            "PLATFORM_SECRET_PULUMI_PAT"
        );
    }
}
