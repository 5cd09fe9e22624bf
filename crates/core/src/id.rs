//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

const JOB_ID_PREFIX: &str = "job-";
const JOB_ID_SUFFIX_LEN: usize = 9;
const JOB_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const USER_ID_MAX_LEN: usize = 128;

/// Identifier of one prediction job.
///
/// Format: `job-<unix_epoch_ms>-<9 lowercase alphanumeric chars>`. The
/// embedded millisecond timestamp makes ids chronologically sortable; the
/// random suffix makes collisions negligible without a store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh id stamped with the current time.
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generate an id for an explicit creation time. Prefer this in tests.
    pub fn generate_at(at: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..JOB_ID_SUFFIX_LEN)
            .map(|_| JOB_ID_ALPHABET[rng.gen_range(0..JOB_ID_ALPHABET.len())] as char)
            .collect();
        Self(format!("{JOB_ID_PREFIX}{}-{suffix}", at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The creation time embedded in the id, in unix milliseconds.
    pub fn timestamp_millis(&self) -> i64 {
        // Shape is validated on construction; a parse failure here would mean
        // the id was built by bypassing `FromStr`/`generate`.
        self.0
            .strip_prefix(JOB_ID_PREFIX)
            .and_then(|rest| rest.rsplit_once('-'))
            .and_then(|(millis, _)| millis.parse().ok())
            .unwrap_or(0)
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(JOB_ID_PREFIX)
            .ok_or_else(|| DomainError::invalid_id("JobId: missing `job-` prefix"))?;
        let (millis, suffix) = rest
            .rsplit_once('-')
            .ok_or_else(|| DomainError::invalid_id("JobId: missing suffix separator"))?;

        if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_id("JobId: timestamp must be decimal digits"));
        }
        if millis.parse::<i64>().is_err() {
            return Err(DomainError::invalid_id("JobId: timestamp out of range"));
        }
        if suffix.len() != JOB_ID_SUFFIX_LEN
            || !suffix
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        {
            return Err(DomainError::invalid_id(
                "JobId: suffix must be 9 lowercase alphanumeric chars",
            ));
        }

        Ok(Self(s.to_string()))
    }
}

/// Identifier of a user as supplied by the caller.
///
/// Opaque to the core: any non-empty trimmed string up to 128 chars. Identity
/// management itself lives outside this system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("UserId: must not be empty"));
        }
        if trimmed.len() > USER_ID_MAX_LEN {
            return Err(DomainError::invalid_id(format!(
                "UserId: longer than {USER_ID_MAX_LEN} chars"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_job_id_round_trips() {
        let id = JobId::generate();
        let parsed: JobId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn job_id_embeds_creation_time() {
        let at = Utc::now();
        let id = JobId::generate_at(at);
        assert_eq!(id.timestamp_millis(), at.timestamp_millis());
    }

    #[test]
    fn job_id_rejects_malformed_input() {
        for bad in [
            "",
            "job-",
            "nope-1700000000000-abcdefghi",
            "job-abc-abcdefghi",
            "job-1700000000000-short",
            "job-1700000000000-ABCDEFGHI",
            "job-1700000000000-abcdefghij",
            "job-1700000000000-abc_efghi",
        ] {
            assert!(bad.parse::<JobId>().is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn user_id_trims_and_validates() {
        let id = UserId::new("  seeker-42  ").unwrap();
        assert_eq!(id.as_str(), "seeker-42");

        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
        assert!(UserId::new("x".repeat(129)).is_err());
    }

    proptest! {
        /// Any (millis, suffix) pair drawn from the valid alphabet parses,
        /// and the embedded timestamp survives the round trip.
        #[test]
        fn valid_shapes_always_parse(
            millis in 0i64..=4_102_444_800_000i64,
            suffix in "[a-z0-9]{9}",
        ) {
            let raw = format!("job-{millis}-{suffix}");
            let id: JobId = raw.parse().unwrap();
            prop_assert_eq!(id.timestamp_millis(), millis);
            prop_assert_eq!(id.as_str(), raw.as_str());
        }

        /// Ids generated at increasing timestamps sort chronologically when
        /// the millisecond widths match (natural ordering for same-epoch ids).
        #[test]
        fn ids_sort_by_embedded_time(a in 1_600_000_000_000i64..1_700_000_000_000i64, delta in 1i64..1_000_000i64) {
            let earlier = JobId::generate_at(DateTime::from_timestamp_millis(a).unwrap());
            let later = JobId::generate_at(DateTime::from_timestamp_millis(a + delta).unwrap());
            prop_assert!(earlier.timestamp_millis() < later.timestamp_millis());
        }
    }
}
