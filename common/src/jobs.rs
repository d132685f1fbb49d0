// Job registry: loads and validates declarative job definitions from a
// directory of JSON documents.

use crate::errors::ValidationError;
use crate::models::Job;
use crate::schedule::parse_cron_expression;
use crate::substitution::VariableSubstitutor;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// In-memory set of job definitions, keyed by job name
pub struct JobRegistry {
    jobs: BTreeMap<String, Job>,
}

impl JobRegistry {
    pub fn empty() -> Self {
        Self {
            jobs: BTreeMap::new(),
        }
    }

    /// Load every `*.json` definition in `dir`. Jobs without an explicit
    /// timeout get `default_timeout_seconds`. An invalid definition fails
    /// the whole load; a misconfigured runner should not start.
    pub fn load_from_dir(
        dir: &Path,
        default_timeout_seconds: u64,
    ) -> Result<Self, ValidationError> {
        let entries = std::fs::read_dir(dir).map_err(|e| ValidationError::ReadFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut registry = Self::empty();

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let contents =
                std::fs::read_to_string(&path).map_err(|e| ValidationError::ReadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            let mut job: Job = serde_json::from_str(&contents)?;
            if job.timeout_seconds.is_none() {
                job.timeout_seconds = Some(default_timeout_seconds);
            }
            registry.add(job)?;
        }

        info!(job_count = registry.len(), dir = %dir.display(), "Job definitions loaded");
        Ok(registry)
    }

    /// Validate and insert one job definition
    pub fn add(&mut self, job: Job) -> Result<(), ValidationError> {
        validate_job(&job)?;
        if self.jobs.contains_key(&job.name) {
            return Err(ValidationError::DuplicateJobName(job.name));
        }
        if !job.triggers.scheduled && !job.triggers.manual {
            warn!(job = %job.name, "Job has no active trigger and can never run");
        }
        self.jobs.insert(job.name.clone(), job);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Job> {
        self.jobs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Every variable name referenced by any job or step env template.
    /// The bootstrap marks these sensitive in the secret store so their
    /// values are scrubbed from captured output.
    pub fn referenced_env_names(&self, substitutor: &VariableSubstitutor) -> HashSet<String> {
        let mut names = HashSet::new();
        for job in self.jobs.values() {
            for template in job.env.values() {
                names.extend(substitutor.extract_variables(template));
            }
            for step in &job.steps {
                for template in step.env.values() {
                    names.extend(substitutor.extract_variables(template));
                }
            }
        }
        names
    }
}

fn validate_job(job: &Job) -> Result<(), ValidationError> {
    if job.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name".to_string()));
    }

    if job.steps.is_empty() {
        return Err(ValidationError::InvalidFieldValue {
            field: format!("{}.steps", job.name),
            reason: "job must declare at least one step".to_string(),
        });
    }

    let mut step_ids = HashSet::new();
    for step in &job.steps {
        if step.id.trim().is_empty() {
            return Err(ValidationError::MissingField(format!(
                "{}.steps[].id",
                job.name
            )));
        }
        if step.program.trim().is_empty() {
            return Err(ValidationError::MissingField(format!(
                "{}.steps[{}].program",
                job.name, step.id
            )));
        }
        if !step_ids.insert(step.id.as_str()) {
            return Err(ValidationError::InvalidFieldValue {
                field: format!("{}.steps[{}].id", job.name, step.id),
                reason: "duplicate step id".to_string(),
            });
        }
    }

    if job.timeout_seconds() == 0 {
        return Err(ValidationError::InvalidFieldValue {
            field: format!("{}.timeout_seconds", job.name),
            reason: "timeout must be greater than 0".to_string(),
        });
    }

    if let Some(crate::models::Schedule::Cron { expression, .. }) = &job.schedule {
        parse_cron_expression(expression).map_err(|e| ValidationError::InvalidFieldValue {
            field: format!("{}.schedule.expression", job.name),
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStep, TriggerConfig};
    use std::collections::HashMap;

    fn minimal_job(name: &str) -> Job {
        Job {
            name: name.to_string(),
            description: None,
            schedule: None,
            triggers: TriggerConfig {
                scheduled: false,
                manual: true,
            },
            steps: vec![JobStep {
                id: "run".to_string(),
                name: "Run".to_string(),
                program: "/bin/true".to_string(),
                args: vec![],
                working_dir: None,
                env: HashMap::new(),
            }],
            env: HashMap::new(),
            timeout_seconds: Some(60),
            enabled: true,
        }
    }

    #[test]
    fn test_add_and_get() {
        let mut registry = JobRegistry::empty();
        registry.add(minimal_job("sync")).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("sync").is_some());
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = JobRegistry::empty();
        registry.add(minimal_job("sync")).unwrap();
        let result = registry.add(minimal_job("sync"));
        assert!(matches!(result, Err(ValidationError::DuplicateJobName(_))));
    }

    #[test]
    fn test_job_without_steps_rejected() {
        let mut job = minimal_job("empty");
        job.steps.clear();
        let result = JobRegistry::empty().add(job);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_step_ids_rejected() {
        let mut job = minimal_job("dup");
        job.steps.push(job.steps[0].clone());
        let result = JobRegistry::empty().add(job);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_cron_rejected() {
        let mut job = minimal_job("bad-cron");
        job.schedule = Some(crate::models::Schedule::Cron {
            expression: "not a cron".to_string(),
            timezone: chrono_tz::UTC,
            end_date: None,
        });
        let result = JobRegistry::empty().add(job);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut job = minimal_job("zero");
        job.timeout_seconds = Some(0);
        let result = JobRegistry::empty().add(job);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_dir_applies_default_timeout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sync.json"),
            r#"{ "name": "sync", "triggers": { "scheduled": false, "manual": true },
                 "steps": [ { "id": "run", "name": "Run", "program": "/bin/true" } ] }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = JobRegistry::load_from_dir(dir.path(), 1200).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("sync").unwrap().timeout_seconds(), 1200);
    }

    #[test]
    fn test_load_from_dir_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let result = JobRegistry::load_from_dir(dir.path(), 1200);
        assert!(matches!(result, Err(ValidationError::InvalidJson(_))));
    }

    #[test]
    fn test_referenced_env_names() {
        let mut job = minimal_job("secrets");
        job.env
            .insert("REDDIT_USERNAME".to_string(), "${REDDIT_USERNAME}".to_string());
        job.steps[0].env.insert(
            "GOOGLE_CREDS_BASE64".to_string(),
            "${GOOGLE_CREDS_BASE64}".to_string(),
        );
        job.env
            .insert("LITERAL".to_string(), "no placeholder".to_string());

        let mut registry = JobRegistry::empty();
        registry.add(job).unwrap();

        let substitutor = VariableSubstitutor::new().unwrap();
        let names = registry.referenced_env_names(&substitutor);
        assert!(names.contains("REDDIT_USERNAME"));
        assert!(names.contains("GOOGLE_CREDS_BASE64"));
        assert_eq!(names.len(), 2);
    }
}
