//! Stage 3: entity-type classifier. Returns a set — multi-entity
//! phrasing like "delete all epics, stories and tasks" must be recognized.

use statestore::WorkItemKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityType {
    Project,
    WorkItem(WorkItemKind),
}

pub fn classify_entities(text: &str) -> (Vec<EntityType>, f32) {
    let lower = text.to_lowercase();
    let mut found = Vec::new();

    if lower.contains("project") {
        found.push(EntityType::Project);
    }
    if contains_word(&lower, "epic") || contains_word(&lower, "epics") {
        found.push(EntityType::WorkItem(WorkItemKind::Epic));
    }
    if contains_word(&lower, "story") || contains_word(&lower, "stories") {
        found.push(EntityType::WorkItem(WorkItemKind::Story));
    }
    if contains_word(&lower, "subtask") || contains_word(&lower, "subtasks") {
        found.push(EntityType::WorkItem(WorkItemKind::Subtask));
    } else if contains_word(&lower, "task") || contains_word(&lower, "tasks") {
        found.push(EntityType::WorkItem(WorkItemKind::Task));
    }
    if contains_word(&lower, "milestone") || contains_word(&lower, "milestones") {
        found.push(EntityType::WorkItem(WorkItemKind::Milestone));
    }

    let confidence = if found.is_empty() { 0.0 } else { 0.8 };
    (found, confidence)
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entity() {
        let (entities, confidence) = classify_entities("create project TestProj");
        assert_eq!(entities, vec![EntityType::Project]);
        assert!(confidence > 0.0);
    }

    #[test]
    fn multi_entity_phrasing() {
        let (entities, _) = classify_entities("delete all epics, stories and tasks");
        assert_eq!(
            entities,
            vec![
                EntityType::WorkItem(WorkItemKind::Epic),
                EntityType::WorkItem(WorkItemKind::Story),
                EntityType::WorkItem(WorkItemKind::Task),
            ]
        );
    }

    #[test]
    fn subtask_does_not_double_count_as_task() {
        let (entities, _) = classify_entities("delete all subtasks");
        assert_eq!(entities, vec![EntityType::WorkItem(WorkItemKind::Subtask)]);
    }

    #[test]
    fn no_entity_zero_confidence() {
        let (entities, confidence) = classify_entities("help me");
        assert!(entities.is_empty());
        assert_eq!(confidence, 0.0);
    }
}
