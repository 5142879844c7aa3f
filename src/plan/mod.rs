//! Deployment plans: which stacks make up a project and how they relate.
//!
//! A plan is a TOML file:
//!
//! ```toml
//! version = "1.0"
//! project = "orders"
//! region = "us-east-1"
//!
//! [[stacks]]
//! component = "network"
//! template = "templates/network.yaml"
//! parameters = { Environment = "{{environment}}" }
//!
//! [[stacks]]
//! component = "storage"
//! template = "templates/storage.yaml"
//! depends_on = ["network"]
//! capabilities = ["CAPABILITY_IAM"]
//! empty_buckets = ["{{project}}-{{environment}}-data"]
//! ```
//!
//! Stack names are `{project}-{environment}-{component}`. Template paths are
//! relative to the plan file.

mod order;
mod render;

pub use order::deploy_order;
pub use render::{PlanRenderer, RenderContext};

use crate::error::{PlanError, Result};
use crate::stack::{Capability, StackDescriptor, validate_stack_name};
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Plan format understood by this build
pub const PLAN_FORMAT_VERSION: &str = "1.0";

/// Parsed plan file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentPlan {
    /// Plan format version
    #[serde(default = "default_version")]
    pub version: String,
    /// Project name, first part of every stack name
    pub project: String,
    /// Default region; `--region` overrides it
    #[serde(default)]
    pub region: Option<String>,
    /// Stacks in the project
    #[serde(default)]
    pub stacks: Vec<StackSpec>,
    /// Directory the plan was loaded from
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_version() -> String {
    PLAN_FORMAT_VERSION.to_string()
}

/// One stack entry in a plan
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackSpec {
    /// Component name, last part of the stack name
    pub component: String,
    /// Template path, relative to the plan file
    pub template: PathBuf,
    /// Parameter overrides; values may contain placeholders
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Capability acknowledgements
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Components that must be deployed first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Extra stack tags; values may contain placeholders
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Buckets to empty before the stack is deleted
    #[serde(default)]
    pub empty_buckets: Vec<String>,
}

/// A plan entry with placeholders filled in, ready to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStack {
    /// Component name
    pub component: String,
    /// Deploy request
    pub descriptor: StackDescriptor,
    /// Buckets to empty before deletion
    pub empty_buckets: Vec<String>,
}

/// Selection and substitution inputs for [`DeploymentPlan::resolve`]
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions<'a> {
    /// Target environment
    pub environment: &'a str,
    /// Deployment bucket (also `{{bucket_name}}`)
    pub bucket_name: Option<&'a str>,
    /// Overrides the plan region
    pub region: Option<&'a str>,
    /// Only these components; empty means all
    pub components: &'a [String],
}

impl DeploymentPlan {
    /// Read and parse a plan file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PlanError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let contents = fs::read_to_string(path)?;
        let base_dir = path
            .absolutize()?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&contents, path, base_dir)
    }

    /// Parse plan text; `origin` is only used in error messages
    pub fn parse(contents: &str, origin: &Path, base_dir: PathBuf) -> Result<Self> {
        let mut plan: DeploymentPlan = toml::from_str(contents).map_err(|e| PlanError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        plan.base_dir = base_dir;

        if plan.version != PLAN_FORMAT_VERSION {
            return Err(PlanError::Parse {
                path: origin.to_path_buf(),
                reason: format!(
                    "unsupported plan version '{}' (expected {PLAN_FORMAT_VERSION})",
                    plan.version
                ),
            }
            .into());
        }
        deploy_order(&plan.stacks)?;
        Ok(plan)
    }

    /// Declared component names, in file order
    pub fn components(&self) -> Vec<String> {
        self.stacks.iter().map(|s| s.component.clone()).collect()
    }

    /// Stack name for a component in an environment
    pub fn stack_name(&self, environment: &str, component: &str) -> String {
        format!("{}-{}-{}", self.project, environment, component)
    }

    /// Select, order and render stacks for one environment.
    ///
    /// The result is in deploy order. Every placeholder must resolve and every
    /// stack name must be valid; template existence is checked at deploy time.
    pub fn resolve(&self, options: &ResolveOptions<'_>) -> Result<Vec<ResolvedStack>> {
        for requested in options.components {
            if !self.stacks.iter().any(|s| &s.component == requested) {
                return Err(PlanError::UnknownComponent {
                    component: requested.clone(),
                    available: self.components(),
                }
                .into());
            }
        }

        let region = options
            .region
            .map(str::to_string)
            .or_else(|| self.region.clone())
            .ok_or_else(|| PlanError::MissingParameter {
                component: self.project.clone(),
                reason: "no region: set `region` in the plan or pass --region".to_string(),
            })?;

        let renderer = PlanRenderer::new(RenderContext {
            project: self.project.clone(),
            environment: options.environment.to_string(),
            region: region.clone(),
            bucket_name: options.bucket_name.map(str::to_string),
        });

        let mut resolved = Vec::new();
        for index in deploy_order(&self.stacks)? {
            let spec = &self.stacks[index];
            if !options.components.is_empty() && !options.components.contains(&spec.component) {
                continue;
            }
            resolved.push(self.resolve_one(spec, &region, options, &renderer)?);
        }
        Ok(resolved)
    }

    fn resolve_one(
        &self,
        spec: &StackSpec,
        region: &str,
        options: &ResolveOptions<'_>,
        renderer: &PlanRenderer,
    ) -> Result<ResolvedStack> {
        let render = |value: &str| {
            renderer.render(value).map_err(|reason| PlanError::MissingParameter {
                component: spec.component.clone(),
                reason,
            })
        };

        let name = self.stack_name(options.environment, &spec.component);
        validate_stack_name(&name)?;

        let template = spec
            .template
            .absolutize_from(&self.base_dir)?
            .into_owned();

        let mut descriptor = StackDescriptor::new(name, region, template);
        for (key, value) in &spec.parameters {
            descriptor.parameters.insert(key.clone(), render(value)?);
        }
        for capability in &spec.capabilities {
            descriptor = descriptor.with_capability(*capability);
        }
        descriptor.artifact_bucket = options.bucket_name.map(str::to_string);
        descriptor
            .tags
            .insert("Project".to_string(), self.project.clone());
        descriptor
            .tags
            .insert("Environment".to_string(), options.environment.to_string());
        for (key, value) in &spec.tags {
            descriptor.tags.insert(key.clone(), render(value)?);
        }

        let empty_buckets = spec
            .empty_buckets
            .iter()
            .map(|b| render(b))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ResolvedStack {
            component: spec.component.clone(),
            descriptor,
            empty_buckets,
        })
    }
}
