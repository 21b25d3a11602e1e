//! Topic layout. Telemetry goes out per project as
//! `projects.<project_id>.measurements`.

pub const PROJECTS_PREFIX: &str = "projects.";

const MEASUREMENTS_SUFFIX: &str = ".measurements";

pub const WORKER_HEALTH: &str = "rulewatch.worker.health";

/// Project id of a measurement topic, `None` for anything else.
pub fn project_of(topic: &str) -> Option<&str> {
    topic
        .strip_prefix(PROJECTS_PREFIX)?
        .strip_suffix(MEASUREMENTS_SUFFIX)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_is_read_from_measurement_topic() {
        assert_eq!(project_of("projects.0b7c-11.measurements"), Some("0b7c-11"));
    }

    #[test]
    fn foreign_topics_have_no_project() {
        assert_eq!(project_of(WORKER_HEALTH), None);
        assert_eq!(project_of("projects..measurements"), None);
        assert_eq!(project_of("projects.p1.commands"), None);
    }
}
