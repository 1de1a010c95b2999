//! Synthetic enrollment records
//!
//! Enrollments are generated rather than read from a source: each one pairs a
//! known student with a course and fills the business fields with uniformly
//! sampled values. Records are independent of one another, so the sequence
//! can be consumed in any order and restarted at will.

use std::ops::RangeInclusive;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use seed_common::{IdentifierSet, RemoteId};

/// Bounds of the paid amount
pub const AMOUNT_RANGE: RangeInclusive<f64> = 50.0..=500.0;

/// Bounds of the number of lessons of a course
pub const LESSON_COUNT_RANGE: RangeInclusive<u32> = 5..=20;

/// Enrollment dates reach back at most this many days
pub const MAX_BACKDATE_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 3] = [
        EnrollmentStatus::Active,
        EnrollmentStatus::Completed,
        EnrollmentStatus::Cancelled,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Paypal,
    Transfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Card,
        PaymentMethod::Paypal,
        PaymentMethod::Transfer,
    ];
}

/// Lesson progress of an enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Completed share of lessons, in percent with two decimals
    pub porcentaje: f64,
    /// Completed lesson numbers (1-based), ascending
    pub lecciones: Vec<u32>,
    /// Highest completed lesson, 0 when none
    pub ultima_leccion_id: u32,
    pub total_lecciones: u32,
}

/// Enrollment payload as the enrollment service expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub estudiante_id: RemoteId,
    pub curso_id: RemoteId,
    pub estado: EnrollmentStatus,
    pub metodo_pago: PaymentMethod,
    pub monto: f64,
    pub progreso: Progress,
    pub fecha_inscripcion: DateTime<Utc>,
}

/// Where course ids come from
#[derive(Debug, Clone, PartialEq)]
pub enum CoursePool {
    /// Ids of courses that exist remotely
    Known(Vec<RemoteId>),
    /// Any integer of the range, whether or not such a course exists
    Range(RangeInclusive<i64>),
}

impl CoursePool {
    /// Use `ids` when there are any, otherwise fall back to `range`
    pub fn known_or_range(ids: IdentifierSet, range: RangeInclusive<i64>) -> Self {
        if ids.is_empty() {
            CoursePool::Range(range)
        } else {
            CoursePool::Known(ids.into_vec())
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            CoursePool::Known(ids) => ids.is_empty(),
            CoursePool::Range(range) => range.is_empty(),
        }
    }

    fn pick(&self, rng: &mut StdRng) -> RemoteId {
        match self {
            CoursePool::Known(ids) => ids[rng.random_range(0..ids.len())].clone(),
            CoursePool::Range(range) => RemoteId::Int(rng.random_range(range.clone())),
        }
    }
}

/// Round to cent precision
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bounded, restartable source of synthetic enrollments
#[derive(Debug, Clone)]
pub struct EnrollmentGenerator {
    students: Vec<RemoteId>,
    courses: CoursePool,
    count: usize,
    seed: Option<u64>,
}

impl EnrollmentGenerator {
    pub fn new(students: &IdentifierSet, courses: CoursePool, count: usize) -> Self {
        Self {
            students: students.as_slice().to_vec(),
            courses,
            count,
            seed: None,
        }
    }

    /// Make every iteration produce the same business fields
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Records one pass yields; zero when either pool is empty
    pub fn len(&self) -> usize {
        if self.students.is_empty() || self.courses.is_empty() {
            0
        } else {
            self.count
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a fresh pass over the sequence
    pub fn iter(&self) -> EnrollmentIter<'_> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        EnrollmentIter {
            generator: self,
            rng,
            remaining: self.len(),
            now: Utc::now(),
        }
    }

    fn sample(&self, rng: &mut StdRng, now: DateTime<Utc>) -> EnrollmentRecord {
        let estudiante_id = self.students[rng.random_range(0..self.students.len())].clone();
        let curso_id = self.courses.pick(rng);
        let estado = EnrollmentStatus::ALL[rng.random_range(0..EnrollmentStatus::ALL.len())];
        let metodo_pago = PaymentMethod::ALL[rng.random_range(0..PaymentMethod::ALL.len())];
        let monto = round2(rng.random_range(AMOUNT_RANGE));

        let total = rng.random_range(LESSON_COUNT_RANGE);
        let completed = rng.random_range(0..=total);
        let mut lecciones: Vec<u32> =
            rand::seq::index::sample(rng, total as usize, completed as usize)
                .into_iter()
                .map(|index| index as u32 + 1)
                .collect();
        lecciones.sort_unstable();

        let progreso = Progress {
            porcentaje: round2(100.0 * lecciones.len() as f64 / total as f64),
            ultima_leccion_id: lecciones.last().copied().unwrap_or(0),
            lecciones,
            total_lecciones: total,
        };

        let days_back = rng.random_range(0..=MAX_BACKDATE_DAYS);

        EnrollmentRecord {
            estudiante_id,
            curso_id,
            estado,
            metodo_pago,
            monto,
            progreso,
            fecha_inscripcion: now - Duration::days(days_back),
        }
    }
}

/// One pass over an [`EnrollmentGenerator`]
#[derive(Debug)]
pub struct EnrollmentIter<'a> {
    generator: &'a EnrollmentGenerator,
    rng: StdRng,
    remaining: usize,
    now: DateTime<Utc>,
}

impl Iterator for EnrollmentIter<'_> {
    type Item = EnrollmentRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.generator.sample(&mut self.rng, self.now))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EnrollmentIter<'_> {}
