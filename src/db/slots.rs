//! libSQL-backed store for bookable doctor appointment and lab test slots.
//!
//! Slots are keyed by a `DD-MM-YYYY HH:MM` text timestamp. Every state change
//! is a single conditional `UPDATE` so that two concurrent bookings for the same
//! slot can never both succeed; reschedules run inside one transaction.

use crate::types::{AppError, Result};
use libsql::{Builder, Connection, Database, Rows};
use std::path::Path;

/// An open doctor appointment slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DoctorSlot {
    /// Doctor's name as stored
    pub doctor_name: String,
    /// Specialization, e.g. `cardiologist`
    pub specialization: String,
    /// Time of day, `HH:MM`
    pub time: String,
    /// Fee charged for the consultation
    pub consultation_fee: f64,
}

/// An open lab test slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LabSlot {
    /// Test name as stored
    pub test_name: String,
    /// Time of day, `HH:MM`
    pub time: String,
    /// Price of the test
    pub price: f64,
}

/// Current occupancy of a single slot row.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStatus {
    /// Whether the slot can still be booked
    pub is_available: bool,
    /// Patient holding the slot
    pub patient_to_attend: Option<i64>,
}

/// Result of claiming a doctor slot.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingOutcome {
    /// Slot now belongs to the patient
    Booked {
        /// Fee of the booked consultation
        consultation_fee: f64,
    },
    /// No open slot matched
    Unavailable,
}

/// Result of releasing a doctor slot.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// Slot is open again
    Cancelled,
    /// The patient held no such slot
    NotFound,
}

/// Result of moving an appointment.
#[derive(Debug, Clone, PartialEq)]
pub enum RescheduleOutcome {
    /// Old slot released, new slot held
    Rescheduled {
        /// Fee of the new consultation
        consultation_fee: f64,
    },
    /// The new slot could not be claimed
    NewSlotUnavailable,
    /// The patient held no appointment at the old slot
    NoExistingAppointment,
}

/// Result of claiming a lab slot.
#[derive(Debug, Clone, PartialEq)]
pub enum LabBookingOutcome {
    /// Slot now belongs to the patient
    Booked {
        /// Test name as stored
        test_name: String,
        /// Price of the test
        price: f64,
    },
    /// No open slot matched
    Unavailable,
}

/// Row used to seed the appointment table.
#[derive(Debug, Clone)]
pub struct NewAppointmentSlot {
    /// Doctor's name
    pub doctor_name: String,
    /// Doctor's specialization
    pub specialization: String,
    /// `DD-MM-YYYY HH:MM`
    pub date_slot: String,
    /// Consultation fee
    pub consultation_fee: f64,
    /// Whether the slot starts open
    pub is_available: bool,
    /// Patient already holding the slot
    pub patient_to_attend: Option<i64>,
}

/// Row used to seed the lab test table.
#[derive(Debug, Clone)]
pub struct NewLabSlot {
    /// Test name
    pub test_name: String,
    /// `DD-MM-YYYY HH:MM`
    pub date_slot: String,
    /// Price of the test
    pub price: f64,
    /// Preparation text shown to patients
    pub prerequisites: Option<String>,
}

/// Handle on the slot database.
pub struct SlotStore {
    db: Database,
}

impl SlotStore {
    /// Open (or create) a local database file and make sure both tables exist.
    pub async fn new_local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Persistence(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to open database: {}", e)))?;

        let store = Self { db };
        store.initialize_schema().await?;

        Ok(store)
    }

    /// Fresh connection to the database.
    pub fn connection(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| AppError::Persistence(format!("Failed to get connection: {}", e)))
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS doctor_appointments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doctor_name TEXT NOT NULL,
                specialization TEXT NOT NULL,
                date_slot TEXT NOT NULL,
                is_available INTEGER NOT NULL DEFAULT 1,
                patient_to_attend INTEGER,
                consultation_fee REAL NOT NULL DEFAULT 0,
                UNIQUE(doctor_name, date_slot)
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Persistence(format!("Failed to create doctor_appointments table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS lab_tests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_name TEXT NOT NULL,
                date_slot TEXT NOT NULL,
                is_available INTEGER NOT NULL DEFAULT 1,
                patient_to_attend INTEGER,
                price REAL NOT NULL DEFAULT 0,
                prerequisites TEXT,
                UNIQUE(test_name, date_slot)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to create lab_tests table: {}", e)))?;

        Ok(())
    }

    // Doctor appointment queries

    /// Open slots for one doctor on a `DD-MM-YYYY` day, earliest first.
    pub async fn doctor_availability(&self, doctor_name: &str, date: &str) -> Result<Vec<DoctorSlot>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT doctor_name, specialization, substr(date_slot, 12), consultation_fee
                 FROM doctor_appointments
                 WHERE lower(doctor_name) = lower(?)
                   AND substr(date_slot, 1, 10) = ?
                   AND is_available = 1
                 ORDER BY substr(date_slot, 12)",
                (doctor_name, date),
            )
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to query availability: {}", e)))?;

        collect_doctor_slots(&mut rows).await
    }

    /// Open slots for every doctor of a specialization on a `DD-MM-YYYY` day,
    /// grouped by doctor name.
    pub async fn specialization_availability(
        &self,
        specialization: &str,
        date: &str,
    ) -> Result<Vec<DoctorSlot>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT doctor_name, specialization, substr(date_slot, 12), consultation_fee
                 FROM doctor_appointments
                 WHERE lower(specialization) = lower(?)
                   AND substr(date_slot, 1, 10) = ?
                   AND is_available = 1
                 ORDER BY doctor_name, substr(date_slot, 12)",
                (specialization, date),
            )
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to query availability: {}", e)))?;

        collect_doctor_slots(&mut rows).await
    }

    /// Claim an open slot for a patient.
    ///
    /// The availability check and the claim are the same statement, so a
    /// second identical call reports `Unavailable` rather than double-booking.
    pub async fn book_appointment(
        &self,
        doctor_name: &str,
        date_slot: &str,
        patient_id: i64,
    ) -> Result<BookingOutcome> {
        let conn = self.connection()?;
        claim_appointment(&conn, doctor_name, date_slot, patient_id).await
    }

    /// Release a slot held by this patient.
    pub async fn cancel_appointment(
        &self,
        doctor_name: &str,
        date_slot: &str,
        patient_id: i64,
    ) -> Result<CancelOutcome> {
        let conn = self.connection()?;
        let released = release_appointment(&conn, doctor_name, date_slot, patient_id).await?;

        Ok(if released {
            CancelOutcome::Cancelled
        } else {
            CancelOutcome::NotFound
        })
    }

    /// Move a patient's booking to a new slot in one transaction.
    ///
    /// Nothing changes unless the new slot could be claimed and the old slot
    /// was actually held by the patient.
    pub async fn reschedule_appointment(
        &self,
        doctor_name: &str,
        old_slot: &str,
        new_slot: &str,
        patient_id: i64,
    ) -> Result<RescheduleOutcome> {
        let conn = self.connection()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to begin transaction: {}", e)))?;

        let consultation_fee = match claim_appointment(&tx, doctor_name, new_slot, patient_id).await {
            Ok(BookingOutcome::Booked { consultation_fee }) => consultation_fee,
            Ok(BookingOutcome::Unavailable) => {
                rollback(tx).await?;
                return Ok(RescheduleOutcome::NewSlotUnavailable);
            }
            Err(e) => {
                rollback(tx).await?;
                return Err(e);
            }
        };

        match release_appointment(&tx, doctor_name, old_slot, patient_id).await {
            Ok(true) => {}
            Ok(false) => {
                rollback(tx).await?;
                return Ok(RescheduleOutcome::NoExistingAppointment);
            }
            Err(e) => {
                rollback(tx).await?;
                return Err(e);
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to commit reschedule: {}", e)))?;

        Ok(RescheduleOutcome::Rescheduled { consultation_fee })
    }

    /// Occupancy of one appointment slot, if the row exists.
    pub async fn appointment_status(
        &self,
        doctor_name: &str,
        date_slot: &str,
    ) -> Result<Option<SlotStatus>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT is_available, patient_to_attend FROM doctor_appointments
                 WHERE lower(doctor_name) = lower(?) AND date_slot = ?",
                (doctor_name, date_slot),
            )
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to query slot: {}", e)))?;

        read_status(&mut rows).await
    }

    // Lab test queries

    /// Open lab slots on a `DD-MM-YYYY` day, optionally narrowed to one test.
    pub async fn lab_availability(&self, date: &str, test_name: Option<&str>) -> Result<Vec<LabSlot>> {
        let conn = self.connection()?;
        let mut rows = match test_name {
            Some(test) => conn
                .query(
                    "SELECT test_name, substr(date_slot, 12), price
                     FROM lab_tests
                     WHERE lower(test_name) = lower(?)
                       AND substr(date_slot, 1, 10) = ?
                       AND is_available = 1
                     ORDER BY substr(date_slot, 12)",
                    (test, date),
                )
                .await,
            None => conn
                .query(
                    "SELECT test_name, substr(date_slot, 12), price
                     FROM lab_tests
                     WHERE substr(date_slot, 1, 10) = ?
                       AND is_available = 1
                     ORDER BY test_name, substr(date_slot, 12)",
                    [date],
                )
                .await,
        }
        .map_err(|e| AppError::Persistence(format!("Failed to query lab availability: {}", e)))?;

        let mut slots = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            slots.push(LabSlot {
                test_name: row.get(0)?,
                time: row.get(1)?,
                price: row.get(2)?,
            });
        }
        Ok(slots)
    }

    /// Claim an open lab slot for a patient.
    pub async fn book_lab_test(
        &self,
        test_name: &str,
        date_slot: &str,
        patient_id: i64,
    ) -> Result<LabBookingOutcome> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "UPDATE lab_tests
                 SET is_available = 0, patient_to_attend = ?
                 WHERE lower(test_name) = lower(?)
                   AND date_slot = ?
                   AND is_available = 1
                 RETURNING test_name, price",
                (patient_id, test_name, date_slot),
            )
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to book lab test: {}", e)))?;

        match next_row(&mut rows).await? {
            Some(row) => Ok(LabBookingOutcome::Booked {
                test_name: row.get(0)?,
                price: row.get(1)?,
            }),
            None => Ok(LabBookingOutcome::Unavailable),
        }
    }

    /// Prerequisite text for a test. `None` when the test is unknown,
    /// `Some(None)` when it is known but has no prerequisites recorded.
    pub async fn lab_prerequisites(&self, test_name: &str) -> Result<Option<Option<String>>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT prerequisites FROM lab_tests WHERE lower(test_name) = lower(?) LIMIT 1",
                [test_name],
            )
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to query prerequisites: {}", e)))?;

        match next_row(&mut rows).await? {
            Some(row) => {
                let text: Option<String> = row.get(0)?;
                Ok(Some(text.filter(|t| !t.trim().is_empty())))
            }
            None => Ok(None),
        }
    }

    /// Occupancy of one lab slot, if the row exists.
    pub async fn lab_slot_status(&self, test_name: &str, date_slot: &str) -> Result<Option<SlotStatus>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT is_available, patient_to_attend FROM lab_tests
                 WHERE lower(test_name) = lower(?) AND date_slot = ?",
                (test_name, date_slot),
            )
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to query lab slot: {}", e)))?;

        read_status(&mut rows).await
    }

    // Fixtures

    /// Insert an appointment row.
    pub async fn insert_appointment_slot(&self, slot: &NewAppointmentSlot) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO doctor_appointments
                (doctor_name, specialization, date_slot, is_available, patient_to_attend, consultation_fee)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                slot.doctor_name.as_str(),
                slot.specialization.as_str(),
                slot.date_slot.as_str(),
                slot.is_available as i64,
                slot.patient_to_attend,
                slot.consultation_fee,
            ),
        )
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to insert appointment slot: {}", e)))?;

        Ok(())
    }

    /// Insert an open lab row.
    pub async fn insert_lab_slot(&self, slot: &NewLabSlot) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO lab_tests (test_name, date_slot, is_available, price, prerequisites)
             VALUES (?, ?, 1, ?, ?)",
            (
                slot.test_name.as_str(),
                slot.date_slot.as_str(),
                slot.price,
                slot.prerequisites.clone(),
            ),
        )
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to insert lab slot: {}", e)))?;

        Ok(())
    }
}

async fn claim_appointment(
    conn: &Connection,
    doctor_name: &str,
    date_slot: &str,
    patient_id: i64,
) -> Result<BookingOutcome> {
    let mut rows = conn
        .query(
            "UPDATE doctor_appointments
             SET is_available = 0, patient_to_attend = ?
             WHERE lower(doctor_name) = lower(?)
               AND date_slot = ?
               AND is_available = 1
             RETURNING consultation_fee",
            (patient_id, doctor_name, date_slot),
        )
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to book appointment: {}", e)))?;

    match next_row(&mut rows).await? {
        Some(row) => Ok(BookingOutcome::Booked {
            consultation_fee: row.get(0)?,
        }),
        None => Ok(BookingOutcome::Unavailable),
    }
}

async fn release_appointment(
    conn: &Connection,
    doctor_name: &str,
    date_slot: &str,
    patient_id: i64,
) -> Result<bool> {
    let affected = conn
        .execute(
            "UPDATE doctor_appointments
             SET is_available = 1, patient_to_attend = NULL
             WHERE lower(doctor_name) = lower(?)
               AND date_slot = ?
               AND patient_to_attend = ?",
            (doctor_name, date_slot, patient_id),
        )
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to cancel appointment: {}", e)))?;

    Ok(affected > 0)
}

async fn rollback(tx: libsql::Transaction) -> Result<()> {
    tx.rollback()
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to roll back: {}", e)))
}

async fn next_row(rows: &mut Rows) -> Result<Option<libsql::Row>> {
    rows.next()
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to read row: {}", e)))
}

async fn collect_doctor_slots(rows: &mut Rows) -> Result<Vec<DoctorSlot>> {
    let mut slots = Vec::new();
    while let Some(row) = next_row(rows).await? {
        slots.push(DoctorSlot {
            doctor_name: row.get(0)?,
            specialization: row.get(1)?,
            time: row.get(2)?,
            consultation_fee: row.get(3)?,
        });
    }
    Ok(slots)
}

async fn read_status(rows: &mut Rows) -> Result<Option<SlotStatus>> {
    match next_row(rows).await? {
        Some(row) => {
            let available: i64 = row.get(0)?;
            Ok(Some(SlotStatus {
                is_available: available != 0,
                patient_to_attend: row.get(1)?,
            }))
        }
        None => Ok(None),
    }
}
