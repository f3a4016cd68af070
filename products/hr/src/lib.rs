//! HR vertical slice.
//!
//! Owns the employee data model and the record store that keeps the whole
//! collection in a single JSON document.

mod error;
mod model;
mod store;

use serde_json::json;

pub use error::{StoreError, StoreResult};
pub use model::{EmpId, Employee, EmployeeKey, Experience, Skill};
pub use store::{EmployeeStore, Replaced, StoreSettings, DEFAULT_DATA_FILE, env_bool};

/// Demo records used by the `seed` command and by tests.
pub fn demo_employees() -> Vec<Employee> {
    let mut ada = Employee::new(1001);
    ada.emp_code = Some("EMP-1001".into());
    ada.emp_name = Some("Ada Lovelace".into());
    ada.emp_email_id = Some("ada@example.test".into());
    ada.user_name = Some("ada".into());
    ada.emp_city = Some("London".into());
    ada.role_id = Some(json!(1));
    ada.emp_designation_id = Some(json!(2));
    ada.skills.push(Skill {
        emp_skill_id: Some(json!(1)),
        emp_id: Some(json!(1001)),
        skill: Some("Rust".into()),
        total_year_exp: Some(json!(4)),
        last_version_used: Some("1.80".into()),
        ..Skill::default()
    });
    ada.experiences.push(Experience {
        emp_exp_id: Some(json!(1)),
        emp_id: Some(json!(1001)),
        company_name: Some("Analytical Engines Ltd".into()),
        start_date: Some("2019-01-01".into()),
        end_date: Some("2023-06-30".into()),
        designation: Some("Engineer".into()),
        projects_worked_on: Some("Difference engine firmware".into()),
        ..Experience::default()
    });

    let mut grace = Employee::new(1002);
    grace.emp_code = Some("EMP-1002".into());
    grace.emp_name = Some("Grace Hopper".into());
    grace.emp_email_id = Some("grace@example.test".into());
    grace.user_name = Some("grace".into());
    grace.emp_city = Some("Arlington".into());
    grace.role_id = Some(json!(2));
    grace.emp_designation_id = Some(json!(3));

    vec![ada, grace]
}
