//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod mocks;

use medroute::db::{NewAppointmentSlot, NewLabSlot, SlotStore};
use std::sync::Arc;
use tempfile::TempDir;

pub const PATIENT: i64 = 1000082;
pub const OTHER_PATIENT: i64 = 1000097;

/// A slot database in a temp dir, seeded with a small fixed schedule.
///
/// Dr. Sarah Wilson (general_dentist) on 18-12-2024: 10:00 and 10:30 open,
/// 11:00 booked by `OTHER_PATIENT`. Dr. John Doe (cardiologist) on
/// 18-12-2024: 09:00 open. Lab on 20-12-2024: lipid panel 08:00 (fasting
/// required), complete blood count 09:00.
pub async fn seeded_store() -> (Arc<SlotStore>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let store = SlotStore::new_local(dir.path().join("medroute.db"))
        .await
        .expect("open slot store");

    let appointments = [
        ("sarah wilson", "general_dentist", "18-12-2024 10:00", 50.0, true, None),
        ("sarah wilson", "general_dentist", "18-12-2024 10:30", 50.0, true, None),
        ("sarah wilson", "general_dentist", "18-12-2024 11:00", 50.0, false, Some(OTHER_PATIENT)),
        ("john doe", "cardiologist", "18-12-2024 09:00", 120.0, true, None),
    ];
    for (doctor, specialization, slot, fee, open, patient) in appointments {
        store
            .insert_appointment_slot(&NewAppointmentSlot {
                doctor_name: doctor.to_string(),
                specialization: specialization.to_string(),
                date_slot: slot.to_string(),
                consultation_fee: fee,
                is_available: open,
                patient_to_attend: patient,
            })
            .await
            .expect("seed appointment");
    }

    let lab = [
        ("lipid panel", "20-12-2024 08:00", 45.0, Some("Fast for 12 hours before the test.")),
        ("complete blood count", "20-12-2024 09:00", 25.0, None),
    ];
    for (test, slot, price, prerequisites) in lab {
        store
            .insert_lab_slot(&NewLabSlot {
                test_name: test.to_string(),
                date_slot: slot.to_string(),
                price,
                prerequisites: prerequisites.map(str::to_string),
            })
            .await
            .expect("seed lab slot");
    }

    (Arc::new(store), dir)
}
