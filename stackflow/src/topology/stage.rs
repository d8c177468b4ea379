//! Stages and the validated pipeline topology.

use super::action::Action;
use crate::errors::{codes, BuildDefectError, ErrorInfo};
use crate::template::{Reference, TemplateValue};
use std::collections::{HashMap, HashSet};

/// A sequential phase of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Unique stage name.
    pub name: String,
    /// Actions in declaration order.
    pub actions: Vec<Action>,
}

impl Stage {
    /// Creates an empty stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Appends an action.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Returns an action by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Renders the stage declaration.
    #[must_use]
    pub fn to_template_value(&self) -> TemplateValue {
        TemplateValue::map([
            ("Name", TemplateValue::from(self.name.as_str())),
            (
                "Actions",
                TemplateValue::List(self.actions.iter().map(Action::to_template_value).collect()),
            ),
        ])
    }
}

/// Ordered stages; stage order is execution order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineTopology {
    stages: Vec<Stage>,
}

impl PipelineTopology {
    /// Creates a topology from stages without validating it.
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns every reference made by any action.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        self.stages
            .iter()
            .flat_map(|s| s.actions.iter())
            .flat_map(Action::references)
            .collect()
    }

    /// Renders the stage list.
    #[must_use]
    pub fn to_template_value(&self) -> TemplateValue {
        TemplateValue::List(self.stages.iter().map(Stage::to_template_value).collect())
    }

    /// Checks naming, run-order and artifact invariants.
    ///
    /// An input artifact must be produced by an earlier stage, or by an
    /// action of the same stage with a strictly lower run-order. Every
    /// artifact is produced exactly once.
    ///
    /// # Errors
    ///
    /// Returns a build defect describing the first violation.
    pub fn validate(&self) -> Result<(), BuildDefectError> {
        if self.stages.is_empty() {
            return Err(defect(codes::EMPTY, "Pipeline has no stages", vec![]));
        }

        let mut stage_names = HashSet::new();
        let mut available: HashSet<&str> = HashSet::new();
        let mut producers: HashMap<&str, String> = HashMap::new();

        for stage in &self.stages {
            if !stage_names.insert(stage.name.as_str()) {
                return Err(defect(
                    codes::DUPLICATE_STAGE,
                    format!("Stage '{}' is declared twice", stage.name),
                    vec![stage.name.clone()],
                ));
            }
            if stage.actions.is_empty() {
                return Err(defect(
                    codes::EMPTY,
                    format!("Stage '{}' has no actions", stage.name),
                    vec![stage.name.clone()],
                ));
            }

            let mut action_names = HashSet::new();
            for action in &stage.actions {
                let subject = format!("{}.{}", stage.name, action.name);
                if !action_names.insert(action.name.as_str()) {
                    return Err(defect(
                        codes::DUPLICATE_ACTION,
                        format!("Action '{subject}' is declared twice"),
                        vec![subject],
                    ));
                }
                if action.run_order == 0 {
                    return Err(defect(
                        codes::INVALID_RUN_ORDER,
                        format!("Action '{subject}' has run-order 0; run-orders start at 1"),
                        vec![subject],
                    ));
                }

                for input in &action.input_artifacts {
                    let produced_in_stage = stage.actions.iter().any(|other| {
                        other.run_order < action.run_order && other.output_artifacts.contains(input)
                    });
                    if !available.contains(input.as_str()) && !produced_in_stage {
                        return Err(defect(
                            codes::UNPRODUCED_ARTIFACT,
                            format!("Action '{subject}' consumes artifact '{input}' before it is produced"),
                            vec![subject, input.clone()],
                        ));
                    }
                }

                for output in &action.output_artifacts {
                    if let Some(previous) = producers.insert(output.as_str(), subject.clone()) {
                        return Err(defect(
                            codes::DUPLICATE_ARTIFACT,
                            format!("Artifact '{output}' is produced by both '{previous}' and '{subject}'"),
                            vec![previous, subject, output.clone()],
                        ));
                    }
                }
            }

            for action in &stage.actions {
                available.extend(action.output_artifacts.iter().map(String::as_str));
            }
        }

        Ok(())
    }
}

fn defect(code: &str, message: impl Into<String>, subjects: Vec<String>) -> BuildDefectError {
    let message = message.into();
    BuildDefectError::new(message.clone())
        .with_subjects(subjects)
        .with_error_info(ErrorInfo::new(code, message))
}
