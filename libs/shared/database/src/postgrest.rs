use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::scheduling::{
    Appointment, AppointmentFilter, AppointmentStatus, AvailabilityException, DateRange,
    NewAppointment, NewAvailabilityException, NewWeeklyAvailability, WeeklyAvailability,
};
use shared_models::time::format_time_of_day;

use crate::error::StoreError;
use crate::store::SchedulingStore;

const WEEKLY_TABLE: &str = "weekly_availability";
const EXCEPTIONS_TABLE: &str = "availability_exceptions";
const APPOINTMENTS_TABLE: &str = "appointments";
const DOCTORS_TABLE: &str = "doctors";

const RETURN_REPRESENTATION: &str = "return=representation";

/// Postgres error codes, as relayed by PostgREST in the error body.
const UNIQUE_VIOLATION_CODE: &str = "23505";
const FOREIGN_KEY_VIOLATION_CODE: &str = "23503";

type Query = Vec<(&'static str, String)>;

fn eq(value: impl ToString) -> String {
    format!("eq.{}", value.to_string())
}

/// [`SchedulingStore`] over a PostgREST endpoint serving `sql/schema.sql`.
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.database_rest_url.trim_end_matches('/').to_string(),
            api_key: config.database_api_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&'static str>) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !self.api_key.is_empty() {
            let key = HeaderValue::from_str(&self.api_key)
                .map_err(|_| StoreError::Unavailable("database API key is not a valid header value".to_string()))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|_| StoreError::Unavailable("database API key is not a valid header value".to_string()))?;
            headers.insert("apikey", key);
            headers.insert(AUTHORIZATION, bearer);
        }

        if let Some(prefer) = prefer {
            headers.insert("Prefer", HeaderValue::from_static(prefer));
        }

        Ok(headers)
    }

    async fn request<T>(
        &self,
        method: Method,
        table: &str,
        query: Query,
        body: Option<Value>,
        prefer: Option<&'static str>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        if self.base_url.is_empty() {
            return Err(StoreError::Unavailable("DATABASE_REST_URL is not configured".to_string()));
        }

        let url = format!("{}/{}", self.base_url, table);
        debug!("{} {} {:?}", method, url, query);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.get_headers(prefer)?)
            .query(&query);

        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await?;
            let code = serde_json::from_str::<Value>(&error_text)
                .ok()
                .and_then(|body| body["code"].as_str().map(str::to_string));

            // PostgREST answers 409 for both constraint kinds.
            match code.as_deref() {
                Some(FOREIGN_KEY_VIOLATION_CODE) => {
                    debug!("Foreign key violation on {}: {}", table, error_text);
                    return Err(StoreError::ForeignKeyViolation(error_text));
                }
                Some(UNIQUE_VIOLATION_CODE) => {
                    debug!("Unique violation on {}: {}", table, error_text);
                    return Err(StoreError::UniqueViolation(error_text));
                }
                None if status.as_u16() == 409 => {
                    debug!("Conflict without error code on {}: {}", table, error_text);
                    return Err(StoreError::UniqueViolation(error_text));
                }
                _ => {}
            }

            error!("Database API error ({}): {}", status, error_text);
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response.json::<T>().await?)
    }

    fn first_row<T>(rows: Vec<T>, table: &str) -> Result<T, StoreError> {
        rows.into_iter().next().ok_or_else(|| StoreError::Api {
            status: 200,
            message: format!("{} write returned no representation", table),
        })
    }
}

#[async_trait]
impl SchedulingStore for PostgrestStore {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, StoreError> {
        let rows: Vec<Value> = self
            .request(
                Method::GET,
                DOCTORS_TABLE,
                vec![("id", eq(doctor_id)), ("select", "id".to_string())],
                None,
                None,
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn find_weekly_availability(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<WeeklyAvailability>, StoreError> {
        self.request(
            Method::GET,
            WEEKLY_TABLE,
            vec![
                ("doctor_id", eq(doctor_id)),
                ("day_of_week", eq(day_of_week)),
                ("active", eq(true)),
                ("order", "start_time.asc".to_string()),
            ],
            None,
            None,
        )
        .await
    }

    async fn list_weekly_availability(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<WeeklyAvailability>, StoreError> {
        self.request(
            Method::GET,
            WEEKLY_TABLE,
            vec![
                ("doctor_id", eq(doctor_id)),
                ("active", eq(true)),
                ("order", "day_of_week.asc,start_time.asc".to_string()),
            ],
            None,
            None,
        )
        .await
    }

    async fn replace_weekly_availability(
        &self,
        doctor_id: Uuid,
        rules: Vec<NewWeeklyAvailability>,
    ) -> Result<Vec<WeeklyAvailability>, StoreError> {
        let deactivated: Vec<Value> = self
            .request(
                Method::PATCH,
                WEEKLY_TABLE,
                vec![("doctor_id", eq(doctor_id)), ("active", eq(true))],
                Some(json!({ "active": false })),
                Some(RETURN_REPRESENTATION),
            )
            .await?;
        debug!("Deactivated {} weekly rules for doctor {}", deactivated.len(), doctor_id);

        if rules.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now().to_rfc3339();
        let rows: Vec<Value> = rules
            .iter()
            .map(|rule| {
                json!({
                    "doctor_id": doctor_id,
                    "day_of_week": rule.day_of_week,
                    "start_time": format_time_of_day(rule.start_time),
                    "end_time": format_time_of_day(rule.end_time),
                    "interval_minutes": rule.interval_minutes,
                    "active": true,
                    "created_at": now,
                })
            })
            .collect();

        self.request(
            Method::POST,
            WEEKLY_TABLE,
            Vec::new(),
            Some(Value::Array(rows)),
            Some(RETURN_REPRESENTATION),
        )
        .await
    }

    async fn find_exception(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<AvailabilityException>, StoreError> {
        let rows: Vec<AvailabilityException> = self
            .request(
                Method::GET,
                EXCEPTIONS_TABLE,
                vec![
                    ("doctor_id", eq(doctor_id)),
                    ("date", eq(date)),
                    ("order", "created_at.desc,seq.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
                None,
                None,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<AvailabilityException>, StoreError> {
        let mut query: Query = vec![("doctor_id", eq(doctor_id))];
        if let Some(from) = range.from {
            query.push(("date", format!("gte.{}", from)));
        }
        if let Some(to) = range.to {
            query.push(("date", format!("lte.{}", to)));
        }
        query.push(("order", "date.asc,created_at.asc".to_string()));

        self.request(Method::GET, EXCEPTIONS_TABLE, query, None, None).await
    }

    async fn get_exception(
        &self,
        exception_id: Uuid,
    ) -> Result<Option<AvailabilityException>, StoreError> {
        let rows: Vec<AvailabilityException> = self
            .request(
                Method::GET,
                EXCEPTIONS_TABLE,
                vec![("id", eq(exception_id))],
                None,
                None,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_exception(
        &self,
        exception: NewAvailabilityException,
    ) -> Result<AvailabilityException, StoreError> {
        let mut body = serde_json::to_value(&exception)?;
        body["created_at"] = json!(Utc::now().to_rfc3339());

        let rows: Vec<AvailabilityException> = self
            .request(
                Method::POST,
                EXCEPTIONS_TABLE,
                Vec::new(),
                Some(body),
                Some(RETURN_REPRESENTATION),
            )
            .await?;
        Self::first_row(rows, EXCEPTIONS_TABLE)
    }

    async fn delete_exception(&self, exception_id: Uuid) -> Result<bool, StoreError> {
        let rows: Vec<Value> = self
            .request(
                Method::DELETE,
                EXCEPTIONS_TABLE,
                vec![("id", eq(exception_id))],
                None,
                Some(RETURN_REPRESENTATION),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn find_booked_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.request(
            Method::GET,
            APPOINTMENTS_TABLE,
            vec![
                ("doctor_id", eq(doctor_id)),
                ("date", eq(date)),
                ("status", format!("neq.{}", AppointmentStatus::Cancelled)),
                ("order", "time.asc".to_string()),
            ],
            None,
            None,
        )
        .await
    }

    async fn find_booked_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, StoreError> {
        let rows: Vec<Appointment> = self
            .request(
                Method::GET,
                APPOINTMENTS_TABLE,
                vec![
                    ("doctor_id", eq(doctor_id)),
                    ("date", eq(date)),
                    ("time", eq(format_time_of_day(time))),
                    ("status", format!("neq.{}", AppointmentStatus::Cancelled)),
                    ("limit", "1".to_string()),
                ],
                None,
                None,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<Appointment, StoreError> {
        let now = Utc::now().to_rfc3339();
        let mut body = serde_json::to_value(&appointment)?;
        body["status"] = json!(AppointmentStatus::Pending);
        body["created_at"] = json!(now);
        body["updated_at"] = json!(now);

        let rows: Vec<Appointment> = self
            .request(
                Method::POST,
                APPOINTMENTS_TABLE,
                Vec::new(),
                Some(body),
                Some(RETURN_REPRESENTATION),
            )
            .await?;
        Self::first_row(rows, APPOINTMENTS_TABLE)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let rows: Vec<Appointment> = self
            .request(
                Method::GET,
                APPOINTMENTS_TABLE,
                vec![("id", eq(appointment_id))],
                None,
                None,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut query: Query = Vec::new();
        if let Some(doctor_id) = filter.doctor_id {
            query.push(("doctor_id", eq(doctor_id)));
        }
        if let Some(patient_id) = filter.patient_id {
            query.push(("patient_id", eq(patient_id)));
        }
        if let Some(date) = filter.date {
            query.push(("date", eq(date)));
        }
        if let Some(status) = filter.status {
            query.push(("status", eq(status)));
        }
        query.push(("order", "date.asc,time.asc".to_string()));

        self.request(Method::GET, APPOINTMENTS_TABLE, query, None, None).await
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        let rows: Vec<Appointment> = self
            .request(
                Method::PATCH,
                APPOINTMENTS_TABLE,
                vec![("id", eq(appointment_id))],
                Some(json!({
                    "status": status,
                    "updated_at": Utc::now().to_rfc3339(),
                })),
                Some(RETURN_REPRESENTATION),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_appointment_slot(
        &self,
        appointment_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, StoreError> {
        let rows: Vec<Appointment> = self
            .request(
                Method::PATCH,
                APPOINTMENTS_TABLE,
                vec![("id", eq(appointment_id))],
                Some(json!({
                    "date": date,
                    "time": format_time_of_day(time),
                    "updated_at": Utc::now().to_rfc3339(),
                })),
                Some(RETURN_REPRESENTATION),
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}
