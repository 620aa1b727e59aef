pub mod project;
pub mod task;
pub mod user;

pub use project::{NewProject, Project, ProjectDetail, ProjectInput, ProjectPatch};
pub use task::{NewTask, Task, TaskInput, TaskPatch, TaskPriority, TaskQuery, TaskStatus};
pub use user::{NewUser, Role, User, UserPatch};
