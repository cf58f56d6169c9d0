use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::core::RequestLedger;
use crate::models::{
    BloodGroup, BloodRequest, CoordinateUpdate, DonationHistory, DonationResponse, Donor, Receiver,
};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Duplicate(String),
}

/// Turn a unique-constraint violation (SQLSTATE 23505) into [`PostgresError::Duplicate`]
fn map_unique_violation(err: sqlx::Error, what: impl FnOnce() -> String) -> PostgresError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return PostgresError::Duplicate(what());
        }
    }
    PostgresError::SqlxError(err)
}

const DONOR_COLUMNS: &str = "id, name, email, contact, blood_group, age, gender, location, \
     latitude, longitude, geocode_stale, available, created_at";

const RECEIVER_COLUMNS: &str =
    "id, name, email, contact, location, latitude, longitude, geocode_stale, created_at";

const REQUEST_COLUMNS: &str = "id, receiver_id, blood_group_needed, quantity_needed, urgency, \
     hospital_name, hospital_location, contact_person, contact_number, needed_by_date, \
     additional_notes, requesting_for, patient_name, patient_relation, status, request_date";

const RESPONSE_COLUMNS: &str = "id, request_id, donor_id, status, donor_notes, receiver_notes, \
     scheduled_date, response_date";

const HISTORY_COLUMNS: &str =
    "id, donor_id, request_id, blood_type, quantity, donation_date, location, status, notes";

/// PostgreSQL client for the registry records
///
/// Multi-row changes (confirmations, cancellations, deletes) run inside a
/// single transaction; deletes remove dependent rows explicitly since the
/// schema has no `ON DELETE CASCADE`.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    // ---- donors ----

    pub async fn insert_donor(&self, donor: &Donor) -> Result<(), PostgresError> {
        let query = format!(
            "INSERT INTO donors ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            DONOR_COLUMNS
        );

        sqlx::query(&query)
            .bind(donor.id)
            .bind(&donor.name)
            .bind(&donor.email)
            .bind(&donor.contact)
            .bind(donor.blood_group)
            .bind(donor.age)
            .bind(&donor.gender)
            .bind(&donor.location)
            .bind(donor.latitude)
            .bind(donor.longitude)
            .bind(donor.geocode_stale)
            .bind(donor.available)
            .bind(donor.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("donor with email {}", donor.email)))?;

        tracing::debug!("Inserted donor {}", donor.id);
        Ok(())
    }

    pub async fn get_donor(&self, donor_id: Uuid) -> Result<Option<Donor>, PostgresError> {
        let query = format!("SELECT {} FROM donors WHERE id = $1", DONOR_COLUMNS);

        let row = sqlx::query(&query)
            .bind(donor_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(donor_from_row).transpose()
    }

    pub async fn require_donor(&self, donor_id: Uuid) -> Result<Donor, PostgresError> {
        self.get_donor(donor_id)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("donor {}", donor_id)))
    }

    /// Available donors, optionally narrowed to one blood group
    pub async fn list_available_donors(
        &self,
        blood_group: Option<BloodGroup>,
    ) -> Result<Vec<Donor>, PostgresError> {
        let query = format!(
            "SELECT {} FROM donors \
             WHERE available = TRUE AND ($1::blood_group IS NULL OR blood_group = $1) \
             ORDER BY created_at",
            DONOR_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(blood_group)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(donor_from_row).collect()
    }

    /// Write every mutable donor field back
    pub async fn update_donor(&self, donor: &Donor) -> Result<(), PostgresError> {
        let query = r#"
            UPDATE donors SET
                name = $2, email = $3, contact = $4, blood_group = $5, age = $6,
                gender = $7, location = $8, latitude = $9, longitude = $10,
                geocode_stale = $11, available = $12
            WHERE id = $1
        "#;

        let result = sqlx::query(query)
            .bind(donor.id)
            .bind(&donor.name)
            .bind(&donor.email)
            .bind(&donor.contact)
            .bind(donor.blood_group)
            .bind(donor.age)
            .bind(&donor.gender)
            .bind(&donor.location)
            .bind(donor.latitude)
            .bind(donor.longitude)
            .bind(donor.geocode_stale)
            .bind(donor.available)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("donor with email {}", donor.email)))?;

        if result.rows_affected() == 0 {
            return Err(PostgresError::NotFound(format!("donor {}", donor.id)));
        }
        Ok(())
    }

    pub async fn set_donor_availability(
        &self,
        donor_id: Uuid,
        available: bool,
    ) -> Result<(), PostgresError> {
        let result = sqlx::query("UPDATE donors SET available = $2 WHERE id = $1")
            .bind(donor_id)
            .bind(available)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PostgresError::NotFound(format!("donor {}", donor_id)));
        }

        tracing::info!("Donor {} availability set to {}", donor_id, available);
        Ok(())
    }

    /// Store coordinates resolved during a search and clear the stale flag
    pub async fn save_donor_coordinates(
        &self,
        updates: &[CoordinateUpdate],
    ) -> Result<(), PostgresError> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for update in updates {
            sqlx::query(
                "UPDATE donors SET latitude = $2, longitude = $3, geocode_stale = FALSE WHERE id = $1",
            )
            .bind(update.donor_id)
            .bind(update.coordinates.latitude)
            .bind(update.coordinates.longitude)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!("Saved coordinates for {} donors", updates.len());
        Ok(())
    }

    /// Delete a donor together with their responses and history
    pub async fn delete_donor(&self, donor_id: Uuid) -> Result<bool, PostgresError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM donation_responses WHERE donor_id = $1")
            .bind(donor_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM donation_history WHERE donor_id = $1")
            .bind(donor_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM donors WHERE id = $1")
            .bind(donor_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- receivers ----

    pub async fn insert_receiver(&self, receiver: &Receiver) -> Result<(), PostgresError> {
        let query = format!(
            "INSERT INTO receivers ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            RECEIVER_COLUMNS
        );

        sqlx::query(&query)
            .bind(receiver.id)
            .bind(&receiver.name)
            .bind(&receiver.email)
            .bind(&receiver.contact)
            .bind(&receiver.location)
            .bind(receiver.latitude)
            .bind(receiver.longitude)
            .bind(receiver.geocode_stale)
            .bind(receiver.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("receiver with email {}", receiver.email)))?;

        Ok(())
    }

    pub async fn get_receiver(&self, receiver_id: Uuid) -> Result<Option<Receiver>, PostgresError> {
        let query = format!("SELECT {} FROM receivers WHERE id = $1", RECEIVER_COLUMNS);

        let row = sqlx::query(&query)
            .bind(receiver_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(receiver_from_row).transpose()
    }

    pub async fn update_receiver(&self, receiver: &Receiver) -> Result<(), PostgresError> {
        let query = r#"
            UPDATE receivers SET
                name = $2, email = $3, contact = $4, location = $5,
                latitude = $6, longitude = $7, geocode_stale = $8
            WHERE id = $1
        "#;

        let result = sqlx::query(query)
            .bind(receiver.id)
            .bind(&receiver.name)
            .bind(&receiver.email)
            .bind(&receiver.contact)
            .bind(&receiver.location)
            .bind(receiver.latitude)
            .bind(receiver.longitude)
            .bind(receiver.geocode_stale)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("receiver with email {}", receiver.email)))?;

        if result.rows_affected() == 0 {
            return Err(PostgresError::NotFound(format!("receiver {}", receiver.id)));
        }
        Ok(())
    }

    /// Delete a receiver, their requests and every response on those requests
    pub async fn delete_receiver(&self, receiver_id: Uuid) -> Result<bool, PostgresError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM donation_responses WHERE request_id IN \
             (SELECT id FROM blood_requests WHERE receiver_id = $1)",
        )
        .bind(receiver_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM blood_requests WHERE receiver_id = $1")
            .bind(receiver_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM receivers WHERE id = $1")
            .bind(receiver_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- requests and responses ----

    /// Persist a newly opened request and any invitations on it
    pub async fn insert_ledger(&self, ledger: &RequestLedger) -> Result<(), PostgresError> {
        let request = ledger.request();
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "INSERT INTO blood_requests ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            REQUEST_COLUMNS
        );

        sqlx::query(&query)
            .bind(request.id)
            .bind(request.receiver_id)
            .bind(request.blood_group_needed)
            .bind(&request.quantity_needed)
            .bind(request.urgency)
            .bind(&request.hospital_name)
            .bind(&request.hospital_location)
            .bind(&request.contact_person)
            .bind(&request.contact_number)
            .bind(request.needed_by_date)
            .bind(&request.additional_notes)
            .bind(request.requesting_for)
            .bind(&request.patient_name)
            .bind(&request.patient_relation)
            .bind(request.status)
            .bind(request.request_date)
            .execute(&mut *tx)
            .await?;

        for response in ledger.responses() {
            upsert_response(&mut tx, response).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Opened request {} for {} blood ({:?})",
            request.id,
            request.blood_group_needed,
            request.urgency
        );
        Ok(())
    }

    /// Load a request together with all of its responses
    pub async fn load_ledger(&self, request_id: Uuid) -> Result<Option<RequestLedger>, PostgresError> {
        let query = format!("SELECT {} FROM blood_requests WHERE id = $1", REQUEST_COLUMNS);

        let Some(row) = sqlx::query(&query)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let request = request_from_row(&row)?;

        let query = format!(
            "SELECT {} FROM donation_responses WHERE request_id = $1 ORDER BY response_date",
            RESPONSE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(request_id)
            .fetch_all(&self.pool)
            .await?;
        let responses = rows.iter().map(response_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(Some(RequestLedger::new(request, responses)))
    }

    pub async fn require_ledger(&self, request_id: Uuid) -> Result<RequestLedger, PostgresError> {
        self.load_ledger(request_id)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("request {}", request_id)))
    }

    /// Write a ledger back after a transition, appending a history entry if one was produced
    ///
    /// Responses are upserted on (request_id, donor_id), so a donor answering
    /// twice still leaves a single row.
    pub async fn save_ledger(
        &self,
        ledger: &RequestLedger,
        history: Option<&DonationHistory>,
    ) -> Result<(), PostgresError> {
        let request = ledger.request();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE blood_requests SET status = $2 WHERE id = $1")
            .bind(request.id)
            .bind(request.status)
            .execute(&mut *tx)
            .await?;

        for response in ledger.responses() {
            upsert_response(&mut tx, response).await?;
        }

        if let Some(entry) = history {
            let query = format!(
                "INSERT INTO donation_history ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                HISTORY_COLUMNS
            );
            sqlx::query(&query)
                .bind(entry.id)
                .bind(entry.donor_id)
                .bind(entry.request_id)
                .bind(entry.blood_type)
                .bind(&entry.quantity)
                .bind(entry.donation_date)
                .bind(&entry.location)
                .bind(&entry.status)
                .bind(&entry.notes)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a request, removing its responses first
    pub async fn delete_request(&self, request_id: Uuid) -> Result<bool, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let responses = sqlx::query("DELETE FROM donation_responses WHERE request_id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM blood_requests WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Deleted request {} and {} responses",
            request_id,
            responses.rows_affected()
        );
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_active_requests(&self) -> Result<Vec<BloodRequest>, PostgresError> {
        let query = format!(
            "SELECT {} FROM blood_requests WHERE status = 'active' ORDER BY request_date DESC",
            REQUEST_COLUMNS
        );

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(request_from_row).collect()
    }

    pub async fn list_requests_for_receiver(
        &self,
        receiver_id: Uuid,
    ) -> Result<Vec<BloodRequest>, PostgresError> {
        let query = format!(
            "SELECT {} FROM blood_requests WHERE receiver_id = $1 ORDER BY request_date DESC",
            REQUEST_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(receiver_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(request_from_row).collect()
    }

    /// Ids of active requests whose needed-by date is before `today`
    pub async fn overdue_request_ids(&self, today: NaiveDate) -> Result<Vec<Uuid>, PostgresError> {
        let rows = sqlx::query(
            "SELECT id FROM blood_requests WHERE status = 'active' AND needed_by_date < $1",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("id").map_err(PostgresError::from))
            .collect()
    }

    /// Request id a response belongs to
    pub async fn request_id_for_response(&self, response_id: Uuid) -> Result<Uuid, PostgresError> {
        let row = sqlx::query("SELECT request_id FROM donation_responses WHERE id = $1")
            .bind(response_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("response {}", response_id)))?;

        Ok(row.try_get("request_id")?)
    }

    pub async fn list_responses_for_donor(
        &self,
        donor_id: Uuid,
    ) -> Result<Vec<DonationResponse>, PostgresError> {
        let query = format!(
            "SELECT {} FROM donation_responses WHERE donor_id = $1 ORDER BY response_date DESC",
            RESPONSE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(donor_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(response_from_row).collect()
    }

    pub async fn responded_request_ids(&self, donor_id: Uuid) -> Result<HashSet<Uuid>, PostgresError> {
        Ok(self
            .list_responses_for_donor(donor_id)
            .await?
            .into_iter()
            .map(|r| r.request_id)
            .collect())
    }

    pub async fn list_history(&self, donor_id: Uuid) -> Result<Vec<DonationHistory>, PostgresError> {
        let query = format!(
            "SELECT {} FROM donation_history WHERE donor_id = $1 ORDER BY donation_date DESC",
            HISTORY_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(donor_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(history_from_row).collect()
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

async fn upsert_response(
    tx: &mut Transaction<'_, Postgres>,
    response: &DonationResponse,
) -> Result<(), PostgresError> {
    let query = r#"
        INSERT INTO donation_responses
            (id, request_id, donor_id, status, donor_notes, receiver_notes, scheduled_date, response_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (request_id, donor_id)
        DO UPDATE SET
            status = EXCLUDED.status,
            donor_notes = EXCLUDED.donor_notes,
            receiver_notes = EXCLUDED.receiver_notes,
            scheduled_date = EXCLUDED.scheduled_date,
            response_date = EXCLUDED.response_date
    "#;

    sqlx::query(query)
        .bind(response.id)
        .bind(response.request_id)
        .bind(response.donor_id)
        .bind(response.status)
        .bind(&response.donor_notes)
        .bind(&response.receiver_notes)
        .bind(response.scheduled_date)
        .bind(response.response_date)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn donor_from_row(row: &PgRow) -> Result<Donor, PostgresError> {
    Ok(Donor {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        contact: row.try_get("contact")?,
        blood_group: row.try_get("blood_group")?,
        age: row.try_get("age")?,
        gender: row.try_get("gender")?,
        location: row.try_get("location")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        geocode_stale: row.try_get("geocode_stale")?,
        available: row.try_get("available")?,
        created_at: row.try_get("created_at")?,
    })
}

fn receiver_from_row(row: &PgRow) -> Result<Receiver, PostgresError> {
    Ok(Receiver {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        contact: row.try_get("contact")?,
        location: row.try_get("location")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        geocode_stale: row.try_get("geocode_stale")?,
        created_at: row.try_get("created_at")?,
    })
}

fn request_from_row(row: &PgRow) -> Result<BloodRequest, PostgresError> {
    Ok(BloodRequest {
        id: row.try_get("id")?,
        receiver_id: row.try_get("receiver_id")?,
        blood_group_needed: row.try_get("blood_group_needed")?,
        quantity_needed: row.try_get("quantity_needed")?,
        urgency: row.try_get("urgency")?,
        hospital_name: row.try_get("hospital_name")?,
        hospital_location: row.try_get("hospital_location")?,
        contact_person: row.try_get("contact_person")?,
        contact_number: row.try_get("contact_number")?,
        needed_by_date: row.try_get("needed_by_date")?,
        additional_notes: row.try_get("additional_notes")?,
        requesting_for: row.try_get("requesting_for")?,
        patient_name: row.try_get("patient_name")?,
        patient_relation: row.try_get("patient_relation")?,
        status: row.try_get("status")?,
        request_date: row.try_get("request_date")?,
    })
}

fn response_from_row(row: &PgRow) -> Result<DonationResponse, PostgresError> {
    Ok(DonationResponse {
        id: row.try_get("id")?,
        request_id: row.try_get("request_id")?,
        donor_id: row.try_get("donor_id")?,
        status: row.try_get("status")?,
        donor_notes: row.try_get("donor_notes")?,
        receiver_notes: row.try_get("receiver_notes")?,
        scheduled_date: row.try_get("scheduled_date")?,
        response_date: row.try_get("response_date")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<DonationHistory, PostgresError> {
    Ok(DonationHistory {
        id: row.try_get("id")?,
        donor_id: row.try_get("donor_id")?,
        request_id: row.try_get("request_id")?,
        blood_type: row.try_get("blood_type")?,
        quantity: row.try_get("quantity")?,
        donation_date: row.try_get("donation_date")?,
        location: row.try_get("location")?,
        status: row.try_get("status")?,
        notes: row.try_get("notes")?,
    })
}
