use std::time::Duration;

use products_hr::{EmpId, Employee};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{ClientConfig, ClientError, ClientResult};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

/// Client for `/employees` on an employee records server.
#[derive(Debug, Clone)]
pub struct EmployeeClient {
    client: Client,
    base_url: String,
}

impl EmployeeClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_employees(&self) -> ClientResult<Vec<Employee>> {
        self.send(self.client.get(self.url("/employees"))).await
    }

    pub async fn get_employee_by_id(&self, emp_id: EmpId) -> ClientResult<Employee> {
        self.send(self.client.get(self.url(&format!("/employees/{emp_id}"))))
            .await
    }

    pub async fn add_employee(&self, employee: &Employee) -> ClientResult<Employee> {
        self.send(self.client.post(self.url("/employees")).json(employee))
            .await
    }

    pub async fn update_employee(
        &self,
        emp_id: EmpId,
        employee: &Employee,
    ) -> ClientResult<Employee> {
        self.send(
            self.client
                .put(self.url(&format!("/employees/{emp_id}")))
                .json(employee),
        )
        .await
    }

    pub async fn delete_employee(&self, emp_id: EmpId) -> ClientResult<()> {
        let body: StatusBody = self
            .send(self.client.delete(self.url(&format!("/employees/{emp_id}"))))
            .await?;
        if body.status != "Deleted" {
            return Err(ClientError::InvalidResponse(format!(
                "unexpected delete status {:?}",
                body.status
            )));
        }
        Ok(())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "employee api response");

        if !status.is_success() {
            let text = response.text().await?;
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(match status {
                StatusCode::NOT_FOUND => ClientError::NotFound(message),
                StatusCode::BAD_REQUEST => ClientError::Validation(message),
                StatusCode::CONFLICT => ClientError::Conflict(message),
                StatusCode::SERVICE_UNAVAILABLE => ClientError::StorageUnavailable(message),
                other => ClientError::Server {
                    status: other.as_u16(),
                    message,
                },
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| ClientError::InvalidResponse(err.to_string()))
    }
}
