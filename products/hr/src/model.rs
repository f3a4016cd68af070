use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Caller-assigned employee primary key.
pub type EmpId = i64;

/// Employee record as stored in the backing document.
///
/// Only `emp_id` is typed. Every other scalar is an opaque JSON value kept
/// exactly as supplied: `None` means the key was absent, `Some(Value::Null)`
/// an explicit `null`. Fields the model does not know about land in `extra`
/// so a stored record reads back unchanged.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub emp_id: EmpId,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_code: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_name: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_email_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_designation_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_contact_no: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_alt_contact_no: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_personal_email_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_exp_total_year: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_exp_total_month: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_city: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_state: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_pin_code: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_address: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_per_city: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_per_state: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_per_pin_code: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_per_address: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub password: Option<Value>,
    #[serde(rename = "ErpEmployeeSkills", default)]
    pub skills: Vec<Skill>,
    #[serde(rename = "ErmEmpExperiences", default)]
    pub experiences: Vec<Experience>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Employee {
    /// Empty record carrying only its key.
    pub fn new(emp_id: EmpId) -> Self {
        Self {
            emp_id,
            ..Self::default()
        }
    }
}

/// Skill row embedded in an employee. `emp_id` only correlates it with the
/// parent; ownership comes from nesting.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_skill_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub skill: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub total_year_exp: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub last_version_used: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Work history row embedded in an employee.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_exp_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emp_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub company_name: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub designation: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub projects_worked_on: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a keyed delete: `{"empId": 7}`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeKey {
    pub emp_id: EmpId,
}

/// A present key keeps its value, `null` included. Absent keys fall back to
/// `None` through `#[serde(default)]`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
