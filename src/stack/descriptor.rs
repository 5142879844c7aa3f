//! Request shape for a single stack deployment.

use crate::error::{Result, StackError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static STACK_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("stack name regex is valid")
});

/// IAM acknowledgements passed through `--capabilities`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// CAPABILITY_IAM
    #[serde(rename = "CAPABILITY_IAM")]
    Iam,
    /// CAPABILITY_NAMED_IAM
    #[serde(rename = "CAPABILITY_NAMED_IAM")]
    NamedIam,
    /// CAPABILITY_AUTO_EXPAND
    #[serde(rename = "CAPABILITY_AUTO_EXPAND")]
    AutoExpand,
}

impl Capability {
    /// Flag value understood by the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
            Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }
}

/// Everything needed to deploy one stack. Built by the caller and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescriptor {
    /// Stack name
    pub name: String,
    /// Target region
    pub region: String,
    /// Template file on disk
    pub template: PathBuf,
    /// Parameter overrides
    pub parameters: BTreeMap<String, String>,
    /// Capability acknowledgements
    pub capabilities: Vec<Capability>,
    /// Bucket for packaging templates larger than the inline limit
    pub artifact_bucket: Option<String>,
    /// Stack tags
    pub tags: BTreeMap<String, String>,
}

impl StackDescriptor {
    /// Create a descriptor with no parameters, capabilities or tags
    pub fn new(name: impl Into<String>, region: impl Into<String>, template: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            template: template.into(),
            parameters: BTreeMap::new(),
            capabilities: Vec::new(),
            artifact_bucket: None,
            tags: BTreeMap::new(),
        }
    }

    /// Add a parameter override
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Add a capability acknowledgement
    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Local preconditions: a valid name and a template that exists
    pub fn validate(&self) -> Result<()> {
        validate_stack_name(&self.name)?;
        if !self.template.is_file() {
            return Err(StackError::TemplateNotFound {
                path: self.template.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Arguments for `aws cloudformation deploy`
    pub fn deploy_args(&self) -> Vec<String> {
        let mut args = crate::aws::args([
            "cloudformation",
            "deploy",
            "--stack-name",
            self.name.as_str(),
            "--region",
            self.region.as_str(),
            "--no-fail-on-empty-changeset",
        ]);
        args.push("--template-file".to_string());
        args.push(self.template.display().to_string());

        if let Some(bucket) = &self.artifact_bucket {
            args.push("--s3-bucket".to_string());
            args.push(bucket.clone());
        }
        if !self.parameters.is_empty() {
            args.push("--parameter-overrides".to_string());
            args.extend(self.parameters.iter().map(|(k, v)| format!("{k}={v}")));
        }
        if !self.capabilities.is_empty() {
            args.push("--capabilities".to_string());
            args.extend(self.capabilities.iter().map(|c| c.as_str().to_string()));
        }
        if !self.tags.is_empty() {
            args.push("--tags".to_string());
            args.extend(self.tags.iter().map(|(k, v)| format!("{k}={v}")));
        }
        args
    }
}

/// Check a name against CloudFormation's naming rules
pub fn validate_stack_name(name: &str) -> Result<()> {
    if STACK_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(StackError::InvalidName {
            name: name.to_string(),
        }
        .into())
    }
}
