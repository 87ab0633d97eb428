use doer_core::db::open_db_in_memory;
use doer_core::{
    ItemRepoError, ItemValidationError, NewProject, NewSection, NewTask, OrderingScope, Priority,
    ProjectRepository, SqliteProjectRepository, SqliteTaskRepository, TaskRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn repositories_reject_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteProjectRepository::try_new(&conn).err().unwrap();
    assert!(matches!(err, ItemRepoError::Schema(_)));
    assert!(SqliteTaskRepository::try_new(&conn).is_err());
}

#[test]
fn projects_append_in_creation_order() {
    let conn = setup();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let user_id = Uuid::new_v4();

    let work = repo.create_project(&NewProject::new(user_id, "Work")).unwrap();
    let home = repo.create_project(&NewProject::new(user_id, "  Home  ")).unwrap();
    let other_user = repo
        .create_project(&NewProject::new(Uuid::new_v4(), "Elsewhere"))
        .unwrap();

    assert_eq!(work.position, 65536.0);
    assert_eq!(home.position, 131072.0);
    assert_eq!(home.name, "Home");
    assert_eq!(home.color, "#808080");
    assert_eq!(other_user.position, 65536.0);

    let listed: Vec<Uuid> = repo
        .list_projects(user_id, false)
        .unwrap()
        .iter()
        .map(|project| project.id)
        .collect();
    assert_eq!(listed, vec![work.id, home.id]);
}

#[test]
fn inbox_is_created_once_per_user() {
    let conn = setup();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let user_id = Uuid::new_v4();

    let first = repo.get_or_create_inbox(user_id).unwrap();
    let second = repo.get_or_create_inbox(user_id).unwrap();

    assert!(first.is_inbox);
    assert_eq!(first.name, "Inbox");
    assert_eq!(first.id, second.id);
    assert_eq!(repo.list_projects(user_id, true).unwrap().len(), 1);
}

#[test]
fn archived_projects_are_hidden_unless_requested() {
    let conn = setup();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let user_id = Uuid::new_v4();
    let project = repo.create_project(&NewProject::new(user_id, "Old")).unwrap();

    repo.set_project_archived(project.id, true).unwrap();

    assert!(repo.list_projects(user_id, false).unwrap().is_empty());
    let archived = repo.list_projects(user_id, true).unwrap();
    assert_eq!(archived.len(), 1);
    assert!(archived[0].is_archived);
    assert_eq!(archived[0].position, project.position);
}

#[test]
fn create_project_validates_before_writing() {
    let conn = setup();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let user_id = Uuid::new_v4();

    let err = repo.create_project(&NewProject::new(user_id, "   ")).unwrap_err();
    assert!(matches!(
        err,
        ItemRepoError::Validation(ItemValidationError::BlankName)
    ));

    let mut colored = NewProject::new(user_id, "Colored");
    colored.color = Some("red".to_string());
    let err = repo.create_project(&colored).unwrap_err();
    assert!(matches!(
        err,
        ItemRepoError::Validation(ItemValidationError::InvalidColor(_))
    ));

    assert!(repo.list_projects(user_id, true).unwrap().is_empty());
}

#[test]
fn rename_missing_project_returns_not_found() {
    let conn = setup();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    let err = repo.rename_project(missing, "New name").unwrap_err();
    assert!(matches!(err, ItemRepoError::NotFound(id) if id == missing));
}

#[test]
fn sections_append_per_project_and_require_owner() {
    let conn = setup();
    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let project = repo
        .create_project(&NewProject::new(Uuid::new_v4(), "Launch"))
        .unwrap();

    let todo = repo.create_section(&NewSection::new(project.id, "Todo")).unwrap();
    let done = repo.create_section(&NewSection::new(project.id, "Done")).unwrap();
    assert_eq!(todo.position, 65536.0);
    assert_eq!(done.position, 131072.0);

    repo.set_section_collapsed(done.id, true).unwrap();
    let sections = repo.list_sections(project.id).unwrap();
    assert_eq!(sections.len(), 2);
    assert!(sections[1].is_collapsed);

    let missing = Uuid::new_v4();
    let err = repo
        .create_section(&NewSection::new(missing, "Lost"))
        .unwrap_err();
    assert!(matches!(
        err,
        ItemRepoError::OwnerNotFound { kind: "project", id } if id == missing
    ));
}

#[test]
fn tasks_append_per_section_scope() {
    let conn = setup();
    let projects = SqliteProjectRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let project = projects
        .create_project(&NewProject::new(Uuid::new_v4(), "Launch"))
        .unwrap();
    let section = projects
        .create_section(&NewSection::new(project.id, "Todo"))
        .unwrap();

    let loose = tasks.create_task(&NewTask::new(project.id, "Loose")).unwrap();
    let first = tasks
        .create_task(&NewTask::new(project.id, "First").in_section(section.id))
        .unwrap();
    let second = tasks
        .create_task(&NewTask::new(project.id, "Second").in_section(section.id))
        .unwrap();

    assert_eq!(loose.position, 65536.0);
    assert_eq!(first.position, 65536.0);
    assert_eq!(second.position, 131072.0);
    assert_eq!(first.user_id, project.user_id);
    assert_eq!(first.priority, Priority::P4);

    let in_section = tasks
        .list_tasks(&OrderingScope::tasks(project.id, Some(section.id)), true)
        .unwrap();
    let ids: Vec<Uuid> = in_section.iter().map(|task| task.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let unsectioned = tasks
        .list_tasks(&OrderingScope::tasks(project.id, None), true)
        .unwrap();
    assert_eq!(unsectioned.len(), 1);
    assert_eq!(unsectioned[0].id, loose.id);
}

#[test]
fn sub_tasks_use_parent_scope() {
    let conn = setup();
    let projects = SqliteProjectRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let project = projects
        .create_project(&NewProject::new(Uuid::new_v4(), "Launch"))
        .unwrap();
    let section = projects
        .create_section(&NewSection::new(project.id, "Todo"))
        .unwrap();
    let parent = tasks
        .create_task(&NewTask::new(project.id, "Parent").in_section(section.id))
        .unwrap();

    // Section is omitted on input and inherited from the parent.
    let child = tasks
        .create_task(&NewTask::new(project.id, "Child").under_parent(parent.id))
        .unwrap();

    assert_eq!(child.section_id, Some(section.id));
    assert_eq!(child.parent_task_id, Some(parent.id));
    assert_eq!(child.position, 65536.0);
    assert_eq!(
        child.scope(),
        OrderingScope::sub_tasks(project.id, Some(section.id), parent.id)
    );

    let top_level = tasks
        .list_tasks(&OrderingScope::tasks(project.id, Some(section.id)), true)
        .unwrap();
    assert_eq!(top_level.len(), 1);

    tasks.delete_task(parent.id).unwrap();
    assert!(tasks.get_task(child.id).unwrap().is_none());
}

#[test]
fn create_task_checks_owners() {
    let conn = setup();
    let projects = SqliteProjectRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let project = projects
        .create_project(&NewProject::new(Uuid::new_v4(), "Launch"))
        .unwrap();
    let foreign = projects
        .create_project(&NewProject::new(Uuid::new_v4(), "Foreign"))
        .unwrap();
    let foreign_section = projects
        .create_section(&NewSection::new(foreign.id, "Theirs"))
        .unwrap();

    let missing_project = Uuid::new_v4();
    let err = tasks
        .create_task(&NewTask::new(missing_project, "Nowhere"))
        .unwrap_err();
    assert!(matches!(err, ItemRepoError::OwnerNotFound { kind: "project", .. }));

    let err = tasks
        .create_task(&NewTask::new(project.id, "Wrong section").in_section(foreign_section.id))
        .unwrap_err();
    assert!(matches!(err, ItemRepoError::OwnerNotFound { kind: "section", .. }));

    let err = tasks
        .create_task(&NewTask::new(project.id, "Orphan").under_parent(Uuid::new_v4()))
        .unwrap_err();
    assert!(matches!(
        err,
        ItemRepoError::OwnerNotFound {
            kind: "parent task",
            ..
        }
    ));

    let mut bad_date = NewTask::new(project.id, "Dated");
    bad_date.due_date = Some("2024-13-01".to_string());
    let err = tasks.create_task(&bad_date).unwrap_err();
    assert!(matches!(
        err,
        ItemRepoError::Validation(ItemValidationError::InvalidDueDate(_))
    ));
}

#[test]
fn completion_and_text_edits_keep_position() {
    let conn = setup();
    let projects = SqliteProjectRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let project = projects
        .create_project(&NewProject::new(Uuid::new_v4(), "Launch"))
        .unwrap();
    tasks.create_task(&NewTask::new(project.id, "Warmup")).unwrap();
    let task = tasks.create_task(&NewTask::new(project.id, "Ship")).unwrap();

    tasks.set_task_completed(task.id, true).unwrap();
    let completed = tasks.get_task(task.id).unwrap().unwrap();
    assert!(completed.is_completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.position, task.position);

    let scope = OrderingScope::tasks(project.id, None);
    assert_eq!(tasks.list_tasks(&scope, false).unwrap().len(), 1);
    assert_eq!(tasks.list_tasks(&scope, true).unwrap().len(), 2);

    tasks.set_task_completed(task.id, false).unwrap();
    tasks
        .update_task_text(task.id, "Ship it", "before friday")
        .unwrap();
    let reopened = tasks.get_task(task.id).unwrap().unwrap();
    assert!(!reopened.is_completed);
    assert_eq!(reopened.completed_at, None);
    assert_eq!(reopened.title, "Ship it");
    assert_eq!(reopened.description, "before friday");
    assert_eq!(reopened.position, task.position);
}

#[test]
fn deleting_project_cascades_to_sections_and_tasks() {
    let conn = setup();
    let projects = SqliteProjectRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let project = projects
        .create_project(&NewProject::new(Uuid::new_v4(), "Launch"))
        .unwrap();
    let section = projects
        .create_section(&NewSection::new(project.id, "Todo"))
        .unwrap();
    let task = tasks
        .create_task(&NewTask::new(project.id, "Ship").in_section(section.id))
        .unwrap();

    projects.delete_project(project.id).unwrap();

    assert!(projects.get_section(section.id).unwrap().is_none());
    assert!(tasks.get_task(task.id).unwrap().is_none());
    assert!(matches!(
        projects.delete_project(project.id).unwrap_err(),
        ItemRepoError::NotFound(_)
    ));
}
