//! Relational storage for bookable slots.
//!
//! A local libSQL database holds two tables:
//! - `doctor_appointments`: one row per doctor per `DD-MM-YYYY HH:MM` slot
//! - `lab_tests`: one row per test per slot, with price and prerequisite text
//!
//! Bookings flip `is_available` and set `patient_to_attend` with a single
//! conditional update; cancellations clear both.

pub mod slots;

pub use slots::{
    BookingOutcome, CancelOutcome, DoctorSlot, LabBookingOutcome, LabSlot, NewAppointmentSlot,
    NewLabSlot, RescheduleOutcome, SlotStatus, SlotStore,
};
