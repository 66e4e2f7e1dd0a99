// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! IAM policy documents and the ECR lifecycle policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Managed policy giving ECS the rights to pull images and write logs
pub const ECS_TASK_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

pub const ECS_TASKS_SERVICE: &str = "ecs-tasks.amazonaws.com";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Vec<String>>,
    /// Principal type (`Service`, `Federated`, ...) to identifiers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<BTreeMap<String, Vec<String>>>,
    /// Test (`StringEquals`, ...) to variable to accepted values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<BTreeMap<String, BTreeMap<String, Vec<String>>>>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Trust policy letting an AWS service assume the role
pub fn service_assume_role_policy(service: &str) -> PolicyDocument {
    PolicyDocument::new(vec![Statement {
        effect: Effect::Allow,
        action: vec!["sts:AssumeRole".to_string()],
        resource: None,
        principal: Some(BTreeMap::from([(
            "Service".to_string(),
            vec![service.to_string()],
        )])),
        condition: None,
    }])
}

/// Trust policy letting a Kubernetes service account assume the role through
/// the cluster's OIDC provider.
pub fn web_identity_assume_role_policy(
    provider_arn: &str,
    provider_url: &str,
    subject: &str,
) -> PolicyDocument {
    let issuer = provider_url.trim_start_matches("https://");
    PolicyDocument::new(vec![Statement {
        effect: Effect::Allow,
        action: vec!["sts:AssumeRoleWithWebIdentity".to_string()],
        resource: None,
        principal: Some(BTreeMap::from([(
            "Federated".to_string(),
            vec![provider_arn.to_string()],
        )])),
        condition: Some(BTreeMap::from([(
            "StringEquals".to_string(),
            BTreeMap::from([(format!("{}:sub", issuer), vec![subject.to_string()])]),
        )])),
    }])
}

/// Actions granted to the Backstage task role.
///
/// The wildcard set is over-scoped. Narrowing it is an owner decision and must
/// not happen as part of a refactor.
pub const BACKSTAGE_TASK_ACTIONS: &[&str] = &[
    "rds-db:*",
    "s3:*",
    "ecr:*",
    "rds:*",
    "ecs:*",
    "ec2:*",
    "eks:*",
    "iam:*",
    "lambda:*",
    "apigateway:*",
    "ssm:*",
    "autoscaling-plans:*",
    "autoscaling:*",
    "cloudformation:*",
];

pub fn backstage_task_policy() -> PolicyDocument {
    PolicyDocument::new(vec![Statement {
        effect: Effect::Allow,
        action: BACKSTAGE_TASK_ACTIONS.iter().map(|a| a.to_string()).collect(),
        resource: Some(vec!["*".to_string()]),
        principal: None,
        condition: None,
    }])
}

/// Lets the task execution role read the secrets injected into the container.
pub fn secrets_read_policy(secret_arns: Vec<String>) -> PolicyDocument {
    PolicyDocument::new(vec![Statement {
        effect: Effect::Allow,
        action: vec!["secretsmanager:GetSecretValue".to_string()],
        resource: Some(secret_arns),
        principal: None,
        condition: None,
    }])
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LifecyclePolicy {
    pub rules: Vec<LifecycleRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    pub rule_priority: u32,
    pub description: String,
    pub selection: LifecycleSelection,
    pub action: LifecycleAction,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleSelection {
    pub tag_status: String,
    pub count_type: String,
    pub count_number: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LifecycleAction {
    #[serde(rename = "type")]
    pub action_type: String,
}

/// Expire every image beyond the newest `count`.
pub fn keep_last_images(count: u32) -> LifecyclePolicy {
    LifecyclePolicy {
        rules: vec![LifecycleRule {
            rule_priority: 1,
            description: format!("keep last {} images", count),
            selection: LifecycleSelection {
                tag_status: "any".to_string(),
                count_type: "imageCountMoreThan".to_string(),
                count_number: count,
            },
            action: LifecycleAction {
                action_type: "expire".to_string(),
            },
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_assume_role_policy_shape() {
        let doc = serde_json::to_value(service_assume_role_policy(ECS_TASKS_SERVICE)).unwrap();

        assert_eq!(
            doc,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["sts:AssumeRole"],
                    "Principal": {"Service": ["ecs-tasks.amazonaws.com"]}
                }]
            })
        );
    }

    #[test]
    fn test_web_identity_condition_uses_issuer_without_scheme() {
        let doc = web_identity_assume_role_policy(
            "arn:aws:iam::123:oidc-provider/oidc.eks.eu-central-1.amazonaws.com/id/ABC",
            "https://oidc.eks.eu-central-1.amazonaws.com/id/ABC",
            "system:serviceaccount:aws-lb-controller:aws-lb-controller-serviceaccount",
        );

        let condition = doc.statement[0].condition.as_ref().unwrap();
        let equals = condition.get("StringEquals").unwrap();
        assert_eq!(
            equals
                .get("oidc.eks.eu-central-1.amazonaws.com/id/ABC:sub")
                .unwrap(),
            &vec!["system:serviceaccount:aws-lb-controller:aws-lb-controller-serviceaccount"
                .to_string()]
        );
    }

    #[test]
    fn test_backstage_task_policy_keeps_wildcards() {
        let doc = backstage_task_policy();
        assert_eq!(doc.statement[0].action.len(), 14);
        assert!(doc.statement[0].action.contains(&"iam:*".to_string()));
        assert_eq!(doc.statement[0].resource, Some(vec!["*".to_string()]));
    }

    #[test]
    fn test_keep_last_images_policy() {
        let policy = serde_json::to_value(keep_last_images(10)).unwrap();

        assert_eq!(
            policy,
            json!({
                "rules": [{
                    "rulePriority": 1,
                    "description": "keep last 10 images",
                    "selection": {
                        "tagStatus": "any",
                        "countType": "imageCountMoreThan",
                        "countNumber": 10
                    },
                    "action": {"type": "expire"}
                }]
            })
        );
    }
}
